use alloy::primitives::B256;
use thiserror::Error;

use crate::domain::{
    Account, AuthorizationRequest, ChainDescriptor, ChainMetadataRecord, LookupTicket,
    SigningRequest,
};
use crate::error::ErrorKind;
use crate::response::ScriptResponse;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("session closed")]
    Closed,
}

/// Wallet-side data consumed by the bridge.
///
/// Implementations may be shared between sessions; `store_metadata` must be
/// last-write-wins per genesis hash.
pub trait DataSourcePort {
    fn fetch_accounts(&self) -> Result<Vec<Account>, PortError>;
    fn chain_for(&self, genesis_hash: B256) -> Option<ChainDescriptor>;
    fn chain_for_address(&self, address: &str) -> Option<ChainDescriptor>;
    fn metadata_for(&self, genesis_hash: B256) -> Option<ChainMetadataRecord>;
    fn list_metadata(&self) -> Result<Vec<ChainMetadataRecord>, PortError>;
    fn store_metadata(&self, record: ChainMetadataRecord) -> Result<(), PortError>;
    /// Decision saved for `dapp` by an earlier session. Host adapters use it
    /// to answer prompts; the state machine always asks the host.
    fn remembered_authorization(&self, dapp: &str) -> Result<Option<bool>, PortError>;
    fn persist_authorization(&self, dapp: &str, approved: bool) -> Result<(), PortError>;
    fn resolve_account_for_chain(&self, chain: &ChainDescriptor) -> Option<Account>;
    /// Starts a live spec-version lookup and returns immediately. The result
    /// is delivered later through
    /// [`BridgeStateMachine::complete_spec_version_lookup`](crate::BridgeStateMachine::complete_spec_version_lookup).
    fn request_live_spec_version(
        &self,
        ticket: LookupTicket,
        chain: &ChainDescriptor,
    ) -> Result<(), PortError>;
    fn cancel_live_spec_version(&self, ticket: LookupTicket);
}

/// Human-facing approval surface. Each request awaits exactly one outcome.
pub trait HostUiPort {
    fn request_authorization(&self, request: AuthorizationRequest) -> Result<(), PortError>;
    fn request_signing(&self, request: SigningRequest) -> Result<(), PortError>;
    fn cancel_request(&self, request_id: &str);
}

pub trait TransportPort {
    fn deliver_response(&self, identifier: &str, script: ScriptResponse) -> Result<(), PortError>;
    fn deliver_subscription_push(
        &self,
        request_id: &str,
        script: ScriptResponse,
    ) -> Result<(), PortError>;
    fn deliver_error(
        &self,
        identifier: &str,
        kind: ErrorKind,
        script: ScriptResponse,
    ) -> Result<(), PortError>;
}
