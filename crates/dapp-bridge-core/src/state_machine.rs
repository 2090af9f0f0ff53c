use alloy::primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    AuthorizationOutcome, AuthorizationRequest, BridgeMessage, ChainMetadataRecord,
    LookupTicket, MessagePayload, MetadataDescriptor, SignerResult, SigningKind, SigningOutcome,
    SigningRequest,
};
use crate::error::BridgeError;
use crate::ports::{DataSourcePort, PortError};
use crate::response::to_payload;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    WaitingAuthorization,
    Authorizing {
        request_id: String,
        dapp: Option<String>,
    },
    Authorized,
    AccountSubscribing {
        request_id: String,
    },
    MetadataNegotiating {
        previous: Box<SessionState>,
        request_id: String,
        candidate: MetadataDescriptor,
        ticket: LookupTicket,
    },
    Signing {
        request_id: String,
        kind: SigningKind,
        previous: Box<SessionState>,
    },
    Denied,
    PhishingDetected,
}

/// Outward event produced by a transition, applied by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Respond { identifier: String, result: Value },
    Fail { identifier: String, error: BridgeError },
    Push { request_id: String, result: Value },
    RequestAuthorization(AuthorizationRequest),
    RequestSigning(SigningRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: SessionState,
    pub effects: Vec<Effect>,
    /// Whether `next` is freshly entered and needs its setup run.
    pub enters: bool,
}

impl Transition {
    pub fn to(next: SessionState) -> Self {
        Self {
            next,
            effects: Vec::new(),
            enters: true,
        }
    }

    pub fn stay(state: SessionState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
            enters: false,
        }
    }

    fn emit(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn respond<T: Serialize>(self, identifier: &str, result: &T) -> Self {
        match to_payload(result) {
            Ok(result) => self.emit(Effect::Respond {
                identifier: identifier.to_owned(),
                result,
            }),
            Err(e) => {
                tracing::warn!(identifier, error = %e, "dropping unencodable response");
                self
            }
        }
    }

    fn push<T: Serialize>(self, request_id: &str, result: &T) -> Self {
        match to_payload(result) {
            Ok(result) => self.emit(Effect::Push {
                request_id: request_id.to_owned(),
                result,
            }),
            Err(e) => {
                tracing::warn!(request_id, error = %e, "dropping unencodable subscription push");
                self
            }
        }
    }

    fn fail(self, identifier: &str, error: BridgeError) -> Self {
        self.emit(Effect::Fail {
            identifier: identifier.to_owned(),
            error,
        })
    }
}

/// Per-session counters for lookup tickets and signer result ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequences {
    lookup: u64,
    signature: u64,
}

impl Sequences {
    pub fn next_ticket(&mut self) -> LookupTicket {
        self.lookup = self.lookup.saturating_add(1);
        LookupTicket(self.lookup)
    }

    pub fn next_signature_id(&mut self) -> u64 {
        self.signature = self.signature.saturating_add(1);
        self.signature
    }
}

impl SessionState {
    pub fn accepts_message(&self) -> bool {
        matches!(
            self,
            SessionState::WaitingAuthorization | SessionState::Authorized
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::WaitingAuthorization => "WaitingAuthorization",
            SessionState::Authorizing { .. } => "Authorizing",
            SessionState::Authorized => "Authorized",
            SessionState::AccountSubscribing { .. } => "AccountSubscribing",
            SessionState::MetadataNegotiating { .. } => "MetadataNegotiating",
            SessionState::Signing { .. } => "Signing",
            SessionState::Denied => "Denied",
            SessionState::PhishingDetected => "PhishingDetected",
        }
    }

    /// Outstanding human request, if the state is waiting on one.
    pub fn pending_host_request(&self) -> Option<&str> {
        match self {
            SessionState::Authorizing { request_id, .. }
            | SessionState::Signing { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    pub fn pending_lookup(&self) -> Option<LookupTicket> {
        match self {
            SessionState::MetadataNegotiating { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }

    pub fn handle<D: DataSourcePort>(
        self,
        message: BridgeMessage,
        data_source: &D,
        seq: &mut Sequences,
    ) -> Transition {
        // The orchestrator only releases messages to accepting states. The
        // other arms answer callers that drive a state directly.
        match self {
            SessionState::WaitingAuthorization => waiting_authorization(message),
            SessionState::Authorized => authorized(message, data_source, seq),
            state @ SessionState::Authorizing { .. } => {
                Transition::stay(state).fail(&message.identifier, BridgeError::BUSY_AUTHORIZING)
            }
            state @ SessionState::AccountSubscribing { .. } => Transition::stay(state).fail(
                &message.identifier,
                BridgeError::ProtocolViolation("busy subscribing accounts"),
            ),
            state @ SessionState::MetadataNegotiating { .. } => {
                Transition::stay(state).fail(&message.identifier, BridgeError::BUSY_NEGOTIATING)
            }
            state @ SessionState::Signing { .. } => {
                Transition::stay(state).fail(&message.identifier, BridgeError::BUSY_SIGNING)
            }
            SessionState::Denied => Transition::stay(SessionState::Denied)
                .fail(&message.identifier, BridgeError::PermissionRejected),
            SessionState::PhishingDetected => {
                tracing::debug!(identifier = %message.identifier, "dropping message after phishing lockdown");
                Transition::stay(SessionState::PhishingDetected)
            }
        }
    }

    /// Setup run when the state is entered. May move on immediately.
    pub fn on_enter<D: DataSourcePort>(&self, data_source: &D) -> Option<Transition> {
        match self {
            SessionState::AccountSubscribing { request_id } => {
                Some(match data_source.fetch_accounts() {
                    Ok(accounts) => {
                        Transition::to(SessionState::Authorized).push(request_id, &accounts)
                    }
                    Err(e) => {
                        tracing::warn!(request_id, error = %e, "account subscription fetch failed");
                        Transition::to(SessionState::Authorized)
                    }
                })
            }
            SessionState::MetadataNegotiating {
                previous,
                request_id,
                candidate,
                ticket,
            } => {
                let back = (**previous).clone();
                let genesis_hash = match parse_genesis_hash(&candidate.genesis_hash) {
                    Ok(hash) => hash,
                    Err(e) => {
                        return Some(Transition::to(back).fail(request_id, e));
                    }
                };
                let Some(chain) = data_source.chain_for(genesis_hash) else {
                    return Some(Transition::to(back).fail(request_id, BridgeError::Unsupported));
                };
                match data_source.request_live_spec_version(*ticket, &chain) {
                    Ok(()) => None,
                    Err(e) => Some(Transition::to(back).fail(
                        request_id,
                        BridgeError::InternalLookupFailure(e.to_string()),
                    )),
                }
            }
            _ => None,
        }
    }

    pub fn complete_authorization<D: DataSourcePort>(
        self,
        request_id: &str,
        outcome: AuthorizationOutcome,
        data_source: &D,
    ) -> Transition {
        match self {
            SessionState::Authorizing {
                request_id: pending,
                dapp,
            } if pending == request_id => {
                if let Some(dapp) = dapp.as_deref() {
                    if let Err(e) = data_source.persist_authorization(dapp, outcome.approved) {
                        tracing::warn!(dapp, error = %e, "failed to persist authorization decision");
                    }
                }
                if outcome.approved {
                    Transition::to(SessionState::Authorized).respond(&pending, &true)
                } else {
                    Transition::to(SessionState::Denied)
                        .fail(&pending, BridgeError::PermissionRejected)
                }
            }
            other => stale(other, request_id),
        }
    }

    pub fn complete_signing(
        self,
        request_id: &str,
        outcome: SigningOutcome,
        seq: &mut Sequences,
    ) -> Transition {
        match self {
            SessionState::Signing {
                request_id: pending,
                previous,
                ..
            } if pending == request_id => match outcome {
                SigningOutcome::Approved(signature) => {
                    let result = SignerResult {
                        id: seq.next_signature_id(),
                        signature,
                    };
                    Transition::to(*previous).respond(&pending, &result)
                }
                SigningOutcome::Rejected => {
                    Transition::to(*previous).fail(&pending, BridgeError::Rejected)
                }
            },
            other => stale(other, request_id),
        }
    }

    pub fn complete_spec_version_lookup<D: DataSourcePort>(
        self,
        ticket: LookupTicket,
        live: Result<u32, PortError>,
        data_source: &D,
    ) -> Transition {
        match self {
            SessionState::MetadataNegotiating {
                previous,
                request_id,
                candidate,
                ticket: pending,
            } if pending == ticket => {
                let back = Transition::to(*previous);
                let genesis_hash = match parse_genesis_hash(&candidate.genesis_hash) {
                    Ok(hash) => hash,
                    Err(e) => return back.fail(&request_id, e),
                };
                match live {
                    Ok(live) if live == candidate.spec_version => {
                        let record = ChainMetadataRecord {
                            genesis_hash,
                            spec_version: live,
                        };
                        let replaced = data_source.metadata_for(genesis_hash);
                        match data_source.store_metadata(record) {
                            Ok(()) => {
                                tracing::debug!(
                                    %genesis_hash,
                                    spec_version = live,
                                    replaced = ?replaced.map(|r| r.spec_version),
                                    "stored negotiated metadata"
                                );
                                back.respond(&request_id, &true)
                            }
                            Err(e) => back.fail(
                                &request_id,
                                BridgeError::InternalLookupFailure(e.to_string()),
                            ),
                        }
                    }
                    Ok(live) => {
                        tracing::debug!(
                            %genesis_hash,
                            candidate = candidate.spec_version,
                            live,
                            "metadata spec version mismatch"
                        );
                        back.fail(&request_id, BridgeError::Unsupported)
                    }
                    Err(e) => back.fail(
                        &request_id,
                        BridgeError::InternalLookupFailure(e.to_string()),
                    ),
                }
            }
            other => {
                tracing::debug!(ticket = ticket.0, state = other.name(), "ignoring stale lookup completion");
                Transition::stay(other)
            }
        }
    }
}

fn stale(state: SessionState, request_id: &str) -> Transition {
    tracing::debug!(request_id, state = state.name(), "ignoring stale host decision");
    Transition::stay(state)
}

fn waiting_authorization(message: BridgeMessage) -> Transition {
    match &message.payload {
        MessagePayload::Authorize(_) => {
            let dapp = message.dapp_identifier();
            let request = AuthorizationRequest {
                request_id: message.identifier.clone(),
                dapp: dapp.clone(),
                source_url: message.source_url.clone(),
            };
            Transition::to(SessionState::Authorizing {
                request_id: message.identifier,
                dapp,
            })
            .emit(Effect::RequestAuthorization(request))
        }
        MessagePayload::ListAccounts
        | MessagePayload::SubscribeAccounts
        | MessagePayload::ListMetadata
        | MessagePayload::ProvideMetadata(_)
        | MessagePayload::SignExtrinsic(_)
        | MessagePayload::SignBytes(_) => {
            Transition::stay(SessionState::WaitingAuthorization)
                .fail(&message.identifier, BridgeError::AUTH_EXPECTED)
        }
    }
}

fn authorized<D: DataSourcePort>(
    message: BridgeMessage,
    data_source: &D,
    seq: &mut Sequences,
) -> Transition {
    let stay = || Transition::stay(SessionState::Authorized);
    let id = message.identifier.as_str();
    match &message.payload {
        MessagePayload::Authorize(_) => stay().respond(id, &true),
        MessagePayload::ListAccounts => match data_source.fetch_accounts() {
            Ok(accounts) => stay().respond(id, &accounts),
            Err(e) => stay().fail(id, BridgeError::InternalLookupFailure(e.to_string())),
        },
        MessagePayload::SubscribeAccounts => Transition::to(SessionState::AccountSubscribing {
            request_id: message.identifier.clone(),
        }),
        MessagePayload::ListMetadata => match data_source.list_metadata() {
            Ok(records) => stay().respond(id, &records),
            Err(e) => stay().fail(id, BridgeError::InternalLookupFailure(e.to_string())),
        },
        MessagePayload::ProvideMetadata(candidate) => {
            Transition::to(SessionState::MetadataNegotiating {
                previous: Box::new(SessionState::Authorized),
                request_id: message.identifier.clone(),
                candidate: candidate.clone(),
                ticket: seq.next_ticket(),
            })
        }
        MessagePayload::SignExtrinsic(payload) => begin_signing(
            &message,
            SigningKind::Extrinsic,
            &payload.address,
            Some(payload.genesis_hash.as_str()),
            payload,
            data_source,
        ),
        MessagePayload::SignBytes(payload) => begin_signing(
            &message,
            SigningKind::Bytes,
            &payload.address,
            payload.genesis_hash.as_deref(),
            payload,
            data_source,
        ),
    }
}

/// Resolves chain and account for a signing request. Any failure drops the
/// message without a response.
fn begin_signing<D: DataSourcePort, T: Serialize>(
    message: &BridgeMessage,
    kind: SigningKind,
    address: &str,
    genesis_hash: Option<&str>,
    operation: &T,
    data_source: &D,
) -> Transition {
    let dropped = |reason: &'static str| {
        tracing::debug!(identifier = %message.identifier, ?kind, reason, "dropping signing request");
        Transition::stay(SessionState::Authorized)
    };

    let chain = match genesis_hash {
        Some(raw) => match parse_genesis_hash(raw) {
            Ok(hash) => data_source.chain_for(hash),
            Err(_) => return dropped("invalid genesis hash"),
        },
        None => data_source.chain_for_address(address),
    };
    let Some(chain) = chain else {
        return dropped("unknown chain");
    };
    let Some(account) = data_source
        .resolve_account_for_chain(&chain)
        .filter(|account| account.address == address)
    else {
        return dropped("no matching account");
    };
    let operation = match to_payload(operation) {
        Ok(value) => value,
        Err(_) => return dropped("unencodable operation"),
    };

    let request = SigningRequest {
        request_id: message.identifier.clone(),
        kind,
        chain,
        account,
        dapp: message.dapp_identifier(),
        operation,
    };
    Transition::to(SessionState::Signing {
        request_id: message.identifier.clone(),
        kind,
        previous: Box::new(SessionState::Authorized),
    })
    .emit(Effect::RequestSigning(request))
}

pub fn parse_genesis_hash(raw: &str) -> Result<B256, BridgeError> {
    raw.trim()
        .parse::<B256>()
        .map_err(|_| BridgeError::InvalidInput("invalid genesis hash".to_owned()))
}

/// Convenience for hosts that hand back hex-encoded signatures.
pub fn parse_signature(raw: &str) -> Result<Bytes, BridgeError> {
    raw.trim()
        .parse::<Bytes>()
        .map_err(|_| BridgeError::InvalidInput("invalid signature".to_owned()))
}
