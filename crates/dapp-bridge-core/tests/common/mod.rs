#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use alloy::primitives::B256;

use dapp_bridge_core::{
    Account, AuthorizationOutcome, AuthorizationRequest, AuthorizeRequest, BridgeMessage,
    BridgeStateMachine, ChainDescriptor, ChainMetadataRecord, DataSourcePort, ErrorKind,
    ExtrinsicPayload, HostUiPort, LookupTicket, MessagePayload, MetadataDescriptor, PortError,
    ScriptResponse, SigningRequest, TransportPort,
};

pub const POLKADOT_GENESIS: &str =
    "0x91b171bb158e2d3848fa23a9f1c25182fb8e20313b2c1eb49219da7a70ce90c3";
pub const KUSAMA_GENESIS: &str =
    "0xb0a8d493285c2df73290dfb7e61f870f17b41801197a149ca93654499ea3dafe";
pub const POLKADOT_ADDRESS: &str = "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5";
pub const DAPP_URL: &str = "https://staking.example.org/validators";

/// Routes `tracing` output through the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
pub struct FakeData {
    pub accounts: Vec<Account>,
    pub accounts_unavailable: bool,
    pub chains: Vec<ChainDescriptor>,
    pub chain_accounts: HashMap<B256, Account>,
    pub metadata: BTreeMap<B256, ChainMetadataRecord>,
    pub store_calls: Vec<ChainMetadataRecord>,
    pub remembered: HashMap<String, bool>,
    pub persisted: Vec<(String, bool)>,
    pub lookups: Vec<(LookupTicket, B256)>,
    pub cancelled_lookups: Vec<LookupTicket>,
    pub lookup_issue_fails: bool,
}

#[derive(Debug, Default)]
pub struct FakeDataSource {
    pub data: Mutex<FakeData>,
}

impl FakeDataSource {
    pub fn with_polkadot() -> Self {
        let ds = Self::default();
        {
            let mut g = ds.data.lock().expect("fake data lock");
            let chain = polkadot_chain();
            let account = polkadot_account();
            g.accounts.push(account.clone());
            g.chain_accounts.insert(chain.genesis_hash, account);
            g.chains.push(chain);
        }
        ds
    }

    pub fn data(&self) -> std::sync::MutexGuard<'_, FakeData> {
        self.data.lock().expect("fake data lock")
    }
}

impl DataSourcePort for FakeDataSource {
    fn fetch_accounts(&self) -> Result<Vec<Account>, PortError> {
        let g = self.data();
        if g.accounts_unavailable {
            return Err(PortError::Unavailable("keystore locked".to_owned()));
        }
        Ok(g.accounts.clone())
    }

    fn chain_for(&self, genesis_hash: B256) -> Option<ChainDescriptor> {
        self.data()
            .chains
            .iter()
            .find(|c| c.genesis_hash == genesis_hash)
            .cloned()
    }

    fn chain_for_address(&self, address: &str) -> Option<ChainDescriptor> {
        let g = self.data();
        let genesis_hash = g
            .chain_accounts
            .iter()
            .find(|(_, account)| account.address == address)
            .map(|(hash, _)| *hash)?;
        g.chains.iter().find(|c| c.genesis_hash == genesis_hash).cloned()
    }

    fn metadata_for(&self, genesis_hash: B256) -> Option<ChainMetadataRecord> {
        self.data().metadata.get(&genesis_hash).copied()
    }

    fn list_metadata(&self) -> Result<Vec<ChainMetadataRecord>, PortError> {
        Ok(self.data().metadata.values().copied().collect())
    }

    fn store_metadata(&self, record: ChainMetadataRecord) -> Result<(), PortError> {
        let mut g = self.data();
        g.store_calls.push(record);
        g.metadata.insert(record.genesis_hash, record);
        Ok(())
    }

    fn remembered_authorization(&self, dapp: &str) -> Result<Option<bool>, PortError> {
        Ok(self.data().remembered.get(dapp).copied())
    }

    fn persist_authorization(&self, dapp: &str, approved: bool) -> Result<(), PortError> {
        let mut g = self.data();
        g.persisted.push((dapp.to_owned(), approved));
        g.remembered.insert(dapp.to_owned(), approved);
        Ok(())
    }

    fn resolve_account_for_chain(&self, chain: &ChainDescriptor) -> Option<Account> {
        self.data().chain_accounts.get(&chain.genesis_hash).cloned()
    }

    fn request_live_spec_version(
        &self,
        ticket: LookupTicket,
        chain: &ChainDescriptor,
    ) -> Result<(), PortError> {
        let mut g = self.data();
        if g.lookup_issue_fails {
            return Err(PortError::Unavailable("no node for chain".to_owned()));
        }
        g.lookups.push((ticket, chain.genesis_hash));
        Ok(())
    }

    fn cancel_live_spec_version(&self, ticket: LookupTicket) {
        self.data().cancelled_lookups.push(ticket);
    }
}

/// Fails the next `count` deliveries, then recovers.
#[derive(Debug, Default)]
pub struct FailureBudget {
    remaining: Mutex<usize>,
}

impl FailureBudget {
    pub fn fail_next(&self, count: usize) {
        *self.remaining.lock().expect("budget lock") = count;
    }

    fn check(&self) -> Result<(), PortError> {
        let mut remaining = self.remaining.lock().expect("budget lock");
        if *remaining == 0 {
            return Ok(());
        }
        *remaining -= 1;
        Err(PortError::Transport("transient".to_owned()))
    }
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub authorizations: Mutex<Vec<AuthorizationRequest>>,
    pub signings: Mutex<Vec<SigningRequest>>,
    pub cancelled: Mutex<Vec<String>>,
    pub failures: FailureBudget,
}

impl RecordingHost {
    pub fn authorization_count(&self) -> usize {
        self.authorizations.lock().expect("host lock").len()
    }

    pub fn signing_count(&self) -> usize {
        self.signings.lock().expect("host lock").len()
    }
}

impl HostUiPort for RecordingHost {
    fn request_authorization(&self, request: AuthorizationRequest) -> Result<(), PortError> {
        self.failures.check()?;
        self.authorizations.lock().expect("host lock").push(request);
        Ok(())
    }

    fn request_signing(&self, request: SigningRequest) -> Result<(), PortError> {
        self.failures.check()?;
        self.signings.lock().expect("host lock").push(request);
        Ok(())
    }

    fn cancel_request(&self, request_id: &str) {
        self.cancelled
            .lock()
            .expect("host lock")
            .push(request_id.to_owned());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Response {
        identifier: String,
        script: String,
    },
    Push {
        request_id: String,
        script: String,
    },
    Error {
        identifier: String,
        kind: ErrorKind,
        script: String,
    },
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub deliveries: Mutex<Vec<Delivery>>,
    pub failures: FailureBudget,
}

impl RecordingTransport {
    pub fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.deliveries.lock().expect("transport lock"))
    }

    pub fn count(&self) -> usize {
        self.deliveries.lock().expect("transport lock").len()
    }
}

impl TransportPort for RecordingTransport {
    fn deliver_response(&self, identifier: &str, script: ScriptResponse) -> Result<(), PortError> {
        self.failures.check()?;
        self.deliveries
            .lock()
            .expect("transport lock")
            .push(Delivery::Response {
                identifier: identifier.to_owned(),
                script: script.content,
            });
        Ok(())
    }

    fn deliver_subscription_push(
        &self,
        request_id: &str,
        script: ScriptResponse,
    ) -> Result<(), PortError> {
        self.failures.check()?;
        self.deliveries
            .lock()
            .expect("transport lock")
            .push(Delivery::Push {
                request_id: request_id.to_owned(),
                script: script.content,
            });
        Ok(())
    }

    fn deliver_error(
        &self,
        identifier: &str,
        kind: ErrorKind,
        script: ScriptResponse,
    ) -> Result<(), PortError> {
        self.failures.check()?;
        self.deliveries
            .lock()
            .expect("transport lock")
            .push(Delivery::Error {
                identifier: identifier.to_owned(),
                kind,
                script: script.content,
            });
        Ok(())
    }
}

pub type TestMachine = BridgeStateMachine<FakeDataSource, RecordingHost, RecordingTransport>;

pub fn new_machine() -> TestMachine {
    init_tracing();
    BridgeStateMachine::new(
        FakeDataSource::with_polkadot(),
        RecordingHost::default(),
        RecordingTransport::default(),
    )
}

/// Runs the authorize handshake and clears the recorded response.
pub fn authorized_machine() -> TestMachine {
    let mut machine = new_machine();
    machine.receive(authorize("auth")).expect("authorize");
    machine
        .complete_authorization("auth", AuthorizationOutcome::approved())
        .expect("approve");
    machine.transport.take();
    machine
}

pub fn genesis(raw: &str) -> B256 {
    raw.parse().expect("valid genesis hash")
}

pub fn polkadot_chain() -> ChainDescriptor {
    ChainDescriptor {
        genesis_hash: genesis(POLKADOT_GENESIS),
        name: "Polkadot".to_owned(),
        address_prefix: 0,
        node_url: Some("wss://rpc.polkadot.io".to_owned()),
    }
}

pub fn polkadot_account() -> Account {
    Account {
        address: POLKADOT_ADDRESS.to_owned(),
        name: Some("Stash".to_owned()),
        genesis_hash: None,
        crypto_type: Some("sr25519".to_owned()),
    }
}

pub fn authorize(id: &str) -> BridgeMessage {
    BridgeMessage::new(
        id,
        MessagePayload::Authorize(AuthorizeRequest {
            origin: "Staking Dashboard".to_owned(),
        }),
    )
    .with_source_url(DAPP_URL)
}

pub fn message(id: &str, payload: MessagePayload) -> BridgeMessage {
    BridgeMessage::new(id, payload).with_source_url(DAPP_URL)
}

pub fn provide_metadata(id: &str, genesis_hash: &str, spec_version: u32) -> BridgeMessage {
    message(
        id,
        MessagePayload::ProvideMetadata(MetadataDescriptor {
            chain: "Polkadot".to_owned(),
            genesis_hash: genesis_hash.to_owned(),
            spec_version,
            icon: None,
            ss58_format: Some(0),
            token_decimals: Some(10),
            token_symbol: Some("DOT".to_owned()),
            types: None,
            meta_calls: None,
            chain_type: Some("substrate".to_owned()),
        }),
    )
}

pub fn sign_extrinsic(id: &str, genesis_hash: &str, address: &str) -> BridgeMessage {
    message(
        id,
        MessagePayload::SignExtrinsic(ExtrinsicPayload {
            address: address.to_owned(),
            block_hash: "0x2fad67977d3e2235f745f88f8c4149182f9ee717f871dd5aa66a336049417221"
                .to_owned(),
            block_number: "0x00723632".to_owned(),
            era: "0x2503".to_owned(),
            genesis_hash: genesis_hash.to_owned(),
            method: "0x0503".to_owned(),
            nonce: "0x0000000f".to_owned(),
            spec_version: "0x0000235a".to_owned(),
            tip: "0x00000000000000000000000000000000".to_owned(),
            transaction_version: "0x00000003".to_owned(),
            signed_extensions: vec!["CheckSpecVersion".to_owned(), "CheckNonce".to_owned()],
            version: 4,
        }),
    )
}
