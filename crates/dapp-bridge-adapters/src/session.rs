//! Tokio runtime for one bridge session.
//!
//! The state machine lives inside a single task. Page messages, host
//! decisions and live lookup results all arrive on one input channel, so
//! every entry point is serialized without a lock around the machine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy::primitives::B256;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use dapp_bridge_core::{
    parse_signature, Account, AuthorizationOutcome, AuthorizationRequest, BridgeMessage,
    BridgeStateMachine, ChainDescriptor, ChainMetadataRecord, DataSourcePort, HostUiPort,
    LookupTicket, PortError, SessionSnapshot, SigningOutcome, SigningRequest,
};

use crate::channels::{output_channel, BridgeOutput, ChannelHostUi, ChannelTransport};
use crate::config::BridgeConfig;
use crate::memory::InMemoryDataSource;
use crate::rpc::SpecVersionClient;

#[derive(Debug)]
pub enum SessionInput {
    Message(BridgeMessage),
    AuthorizationDecided {
        request_id: String,
        outcome: AuthorizationOutcome,
    },
    SigningDecided {
        request_id: String,
        outcome: SigningOutcome,
    },
    SpecVersionResolved {
        ticket: LookupTicket,
        live: Result<u32, PortError>,
    },
    PhishingDetected,
    Snapshot(oneshot::Sender<Option<SessionSnapshot>>),
    Restore(SessionSnapshot),
    Close,
}

/// Store-backed data source that resolves live spec versions on the runtime.
///
/// Completions are posted back through a weak sender so an in-flight lookup
/// never keeps a session alive after every handle is gone.
pub struct RuntimeDataSource {
    store: InMemoryDataSource,
    client: SpecVersionClient,
    completions: mpsc::WeakUnboundedSender<SessionInput>,
    lookups: Arc<Mutex<HashMap<LookupTicket, JoinHandle<()>>>>,
}

impl RuntimeDataSource {
    pub fn new(
        store: InMemoryDataSource,
        client: SpecVersionClient,
        completions: mpsc::WeakUnboundedSender<SessionInput>,
    ) -> Self {
        Self {
            store,
            client,
            completions,
            lookups: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &InMemoryDataSource {
        &self.store
    }

    /// Drops bookkeeping for a lookup whose result has arrived.
    pub fn forget_lookup(&self, ticket: LookupTicket) {
        if let Ok(mut g) = self.lookups.lock() {
            g.remove(&ticket);
        }
    }

    pub fn in_flight_lookups(&self) -> usize {
        self.lookups.lock().map(|g| g.len()).unwrap_or_default()
    }
}

impl DataSourcePort for RuntimeDataSource {
    fn fetch_accounts(&self) -> Result<Vec<Account>, PortError> {
        self.store.fetch_accounts()
    }

    fn chain_for(&self, genesis_hash: B256) -> Option<ChainDescriptor> {
        self.store.chain_for(genesis_hash)
    }

    fn chain_for_address(&self, address: &str) -> Option<ChainDescriptor> {
        self.store.chain_for_address(address)
    }

    fn metadata_for(&self, genesis_hash: B256) -> Option<ChainMetadataRecord> {
        self.store.metadata_for(genesis_hash)
    }

    fn list_metadata(&self) -> Result<Vec<ChainMetadataRecord>, PortError> {
        self.store.list_metadata()
    }

    fn store_metadata(&self, record: ChainMetadataRecord) -> Result<(), PortError> {
        self.store.store_metadata(record)
    }

    fn remembered_authorization(&self, dapp: &str) -> Result<Option<bool>, PortError> {
        self.store.remembered_authorization(dapp)
    }

    fn persist_authorization(&self, dapp: &str, approved: bool) -> Result<(), PortError> {
        self.store.persist_authorization(dapp, approved)
    }

    fn resolve_account_for_chain(&self, chain: &ChainDescriptor) -> Option<Account> {
        self.store.resolve_account_for_chain(chain)
    }

    fn request_live_spec_version(
        &self,
        ticket: LookupTicket,
        chain: &ChainDescriptor,
    ) -> Result<(), PortError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PortError::Unavailable(format!("no async runtime: {e}")))?;
        let mut lookups = self
            .lookups
            .lock()
            .map_err(|e| PortError::Transport(format!("lookup table lock poisoned: {e}")))?;

        let client = self.client.clone();
        let chain = chain.clone();
        let completions = self.completions.clone();
        let task = runtime.spawn(async move {
            let live = client.fetch_spec_version(&chain).await;
            if let Err(e) = &live {
                tracing::debug!(chain = %chain.name, error = %e, "spec version lookup failed");
            }
            match completions.upgrade() {
                Some(tx) => {
                    let _ = tx.send(SessionInput::SpecVersionResolved { ticket, live });
                }
                None => tracing::debug!(ticket = ticket.0, "session gone before lookup finished"),
            }
        });
        lookups.insert(ticket, task);
        Ok(())
    }

    fn cancel_live_spec_version(&self, ticket: LookupTicket) {
        let task = self.lookups.lock().ok().and_then(|mut g| g.remove(&ticket));
        if let Some(task) = task {
            task.abort();
            tracing::debug!(ticket = ticket.0, "spec version lookup cancelled");
        }
    }
}

/// Host surface that answers authorization prompts the user already
/// approved for this dApp in an earlier session.
///
/// The approval is posted back as an ordinary decision, so the machine still
/// passes through `Authorizing`. Everything else goes to the human.
pub struct RememberingHostUi {
    inner: ChannelHostUi,
    store: InMemoryDataSource,
    decisions: mpsc::WeakUnboundedSender<SessionInput>,
}

impl RememberingHostUi {
    pub fn new(
        inner: ChannelHostUi,
        store: InMemoryDataSource,
        decisions: mpsc::WeakUnboundedSender<SessionInput>,
    ) -> Self {
        Self {
            inner,
            store,
            decisions,
        }
    }

    fn remembered_approval(&self, dapp: &str) -> bool {
        match self.store.remembered_authorization(dapp) {
            Ok(remembered) => remembered == Some(true),
            Err(e) => {
                tracing::warn!(dapp, error = %e, "failed to read remembered authorization");
                false
            }
        }
    }
}

impl HostUiPort for RememberingHostUi {
    fn request_authorization(&self, request: AuthorizationRequest) -> Result<(), PortError> {
        let remembered = request
            .dapp
            .as_deref()
            .is_some_and(|dapp| self.remembered_approval(dapp));
        if remembered {
            if let Some(tx) = self.decisions.upgrade() {
                tracing::debug!(dapp = ?request.dapp, "authorization remembered, prompt skipped");
                return tx
                    .send(SessionInput::AuthorizationDecided {
                        request_id: request.request_id,
                        outcome: AuthorizationOutcome::approved(),
                    })
                    .map_err(|_| PortError::Closed);
            }
        }
        self.inner.request_authorization(request)
    }

    fn request_signing(&self, request: SigningRequest) -> Result<(), PortError> {
        self.inner.request_signing(request)
    }

    fn cancel_request(&self, request_id: &str) {
        self.inner.cancel_request(request_id);
    }
}

pub type RuntimeMachine =
    BridgeStateMachine<RuntimeDataSource, RememberingHostUi, ChannelTransport>;

/// Cloneable entry point into a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionInput>,
}

impl SessionHandle {
    fn send(&self, input: SessionInput) -> Result<(), PortError> {
        self.tx.send(input).map_err(|_| PortError::Closed)
    }

    pub fn post_message(&self, message: BridgeMessage) -> Result<(), PortError> {
        self.send(SessionInput::Message(message))
    }

    /// Decodes a raw page envelope before posting it.
    pub fn post_raw(&self, raw: Value) -> Result<(), PortError> {
        let message =
            BridgeMessage::from_json(raw).map_err(|e| PortError::Validation(e.to_string()))?;
        self.post_message(message)
    }

    pub fn authorization_decided(
        &self,
        request_id: impl Into<String>,
        outcome: AuthorizationOutcome,
    ) -> Result<(), PortError> {
        self.send(SessionInput::AuthorizationDecided {
            request_id: request_id.into(),
            outcome,
        })
    }

    pub fn signing_decided(
        &self,
        request_id: impl Into<String>,
        outcome: SigningOutcome,
    ) -> Result<(), PortError> {
        self.send(SessionInput::SigningDecided {
            request_id: request_id.into(),
            outcome,
        })
    }

    pub fn signing_approved_hex(
        &self,
        request_id: impl Into<String>,
        signature: &str,
    ) -> Result<(), PortError> {
        let signature = parse_signature(signature).map_err(|e| PortError::Validation(e.to_string()))?;
        self.signing_decided(request_id, SigningOutcome::Approved(signature))
    }

    /// Parks the session state, e.g. when its tab leaves the foreground.
    /// `None` once the session is torn down.
    pub async fn snapshot(&self) -> Result<Option<SessionSnapshot>, PortError> {
        let (reply, answer) = oneshot::channel();
        self.send(SessionInput::Snapshot(reply))?;
        answer.await.map_err(|_| PortError::Closed)
    }

    pub fn restore(&self, snapshot: SessionSnapshot) -> Result<(), PortError> {
        self.send(SessionInput::Restore(snapshot))
    }

    pub fn phishing_detected(&self) -> Result<(), PortError> {
        self.send(SessionInput::PhishingDetected)
    }

    pub fn close(&self) -> Result<(), PortError> {
        self.send(SessionInput::Close)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Starts a session task on the current tokio runtime.
///
/// The session ends on [`SessionHandle::close`] or once every handle is
/// dropped. Either way it is torn down and emits nothing further.
pub fn spawn_session(
    store: InMemoryDataSource,
    client: SpecVersionClient,
    config: &BridgeConfig,
) -> Result<
    (
        SessionHandle,
        mpsc::UnboundedReceiver<BridgeOutput>,
        JoinHandle<()>,
    ),
    PortError,
> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| PortError::Unavailable(format!("no async runtime: {e}")))?;
    store.set_remember_authorizations(config.remember_authorizations)?;

    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (output_tx, output_rx) = output_channel();

    let host = RememberingHostUi::new(
        ChannelHostUi::new(output_tx.clone()),
        store.clone(),
        input_tx.downgrade(),
    );
    let data_source = RuntimeDataSource::new(store, client, input_tx.downgrade());
    let machine = BridgeStateMachine::with_encoder(
        data_source,
        host,
        ChannelTransport::new(output_tx),
        config.encoder(),
    );

    let task = runtime.spawn(run_session(machine, input_rx));
    Ok((SessionHandle { tx: input_tx }, output_rx, task))
}

async fn run_session(
    mut machine: RuntimeMachine,
    mut inputs: mpsc::UnboundedReceiver<SessionInput>,
) {
    tracing::debug!("bridge session started");
    while let Some(input) = inputs.recv().await {
        let result = match input {
            SessionInput::Message(message) => machine.receive(message),
            SessionInput::AuthorizationDecided {
                request_id,
                outcome,
            } => machine.complete_authorization(&request_id, outcome),
            SessionInput::SigningDecided {
                request_id,
                outcome,
            } => machine.complete_signing(&request_id, outcome),
            SessionInput::SpecVersionResolved { ticket, live } => {
                machine.data_source.forget_lookup(ticket);
                machine.complete_spec_version_lookup(ticket, live)
            }
            SessionInput::PhishingDetected => {
                machine.mark_phishing_detected();
                Ok(())
            }
            SessionInput::Snapshot(reply) => {
                if reply.send(machine.snapshot()).is_err() {
                    tracing::debug!("snapshot requester went away");
                }
                Ok(())
            }
            SessionInput::Restore(snapshot) => machine.restore(snapshot),
            SessionInput::Close => break,
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, state = ?machine.state().map(|s| s.name()), "bridge port failure");
        }
    }
    machine.teardown();
    tracing::debug!("bridge session closed");
}
