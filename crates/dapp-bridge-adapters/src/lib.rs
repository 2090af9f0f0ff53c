pub mod channels;
pub mod config;
pub mod memory;
pub mod rpc;
pub mod session;

pub use channels::{output_channel, BridgeOutput, ChannelHostUi, ChannelTransport};
pub use config::BridgeConfig;
pub use memory::InMemoryDataSource;
pub use rpc::SpecVersionClient;
pub use session::{
    spawn_session, RememberingHostUi, RuntimeDataSource, RuntimeMachine, SessionHandle,
    SessionInput,
};
