pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod ports;
pub mod queue;
pub mod response;
pub mod state_machine;
pub mod wire;

pub use domain::{
    Account, AuthorizationOutcome, AuthorizationRequest, AuthorizeRequest, BridgeMessage,
    ChainDescriptor, ChainMetadataRecord, ExtrinsicPayload, LookupTicket, MessageKind,
    MessagePayload, MetadataDescriptor, RawBytesPayload, SignerResult, SigningKind,
    SigningOutcome, SigningRequest,
};
pub use error::{BridgeError, ErrorKind};
pub use orchestrator::{BridgeStateMachine, SessionSnapshot};
pub use ports::{DataSourcePort, HostUiPort, PortError, TransportPort};
pub use queue::MessageQueue;
pub use response::{EncodingError, ResponseEncoder, ScriptResponse, DEFAULT_SCRIPT_NAMESPACE};
pub use state_machine::{
    parse_genesis_hash, parse_signature, Effect, Sequences, SessionState, Transition,
};
pub use wire::WireError;
