use serde::{Deserialize, Serialize};

use crate::domain::{AuthorizationOutcome, BridgeMessage, LookupTicket, SigningOutcome};
use crate::ports::{DataSourcePort, HostUiPort, PortError, TransportPort};
use crate::queue::MessageQueue;
use crate::response::ResponseEncoder;
use crate::state_machine::{Effect, Sequences, SessionState, Transition};

/// Parked copy of a session, taken when its page leaves the foreground and
/// restored when it comes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub queue: MessageQueue,
    pub sequences: Sequences,
}

/// Owns one page's session state and message queue.
///
/// All mutation goes through `&mut self`, so a single owner serializes every
/// entry point. A port failure never interrupts a transition or the queue:
/// the remaining effects still run, queued messages are still released, and
/// the first failure is returned once all of that is done.
pub struct BridgeStateMachine<D, H, T>
where
    D: DataSourcePort,
    H: HostUiPort,
    T: TransportPort,
{
    pub data_source: D,
    pub host: H,
    pub transport: T,
    encoder: ResponseEncoder,
    state: Option<SessionState>,
    queue: MessageQueue,
    seq: Sequences,
}

impl<D, H, T> BridgeStateMachine<D, H, T>
where
    D: DataSourcePort,
    H: HostUiPort,
    T: TransportPort,
{
    pub fn new(data_source: D, host: H, transport: T) -> Self {
        Self::with_encoder(data_source, host, transport, ResponseEncoder::default())
    }

    pub fn with_encoder(data_source: D, host: H, transport: T, encoder: ResponseEncoder) -> Self {
        Self {
            data_source,
            host,
            transport,
            encoder,
            state: Some(SessionState::WaitingAuthorization),
            queue: MessageQueue::default(),
            seq: Sequences::default(),
        }
    }

    /// Current state, `None` once the session is torn down.
    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_none()
    }

    pub fn pending_messages(&self) -> usize {
        self.queue.len()
    }

    pub fn receive(&mut self, message: BridgeMessage) -> Result<(), PortError> {
        if self.is_closed() {
            tracing::debug!(identifier = %message.identifier, "message for closed session discarded");
            return Ok(());
        }
        tracing::debug!(identifier = %message.identifier, kind = ?message.kind(), "message queued");
        self.queue.enqueue(message);
        self.try_dispatch_next()
    }

    pub fn complete_authorization(
        &mut self,
        request_id: &str,
        outcome: AuthorizationOutcome,
    ) -> Result<(), PortError> {
        let Some(state) = self.state.take() else {
            return Ok(());
        };
        let transition = state.complete_authorization(request_id, outcome, &self.data_source);
        self.settle(transition)
    }

    pub fn complete_signing(
        &mut self,
        request_id: &str,
        outcome: SigningOutcome,
    ) -> Result<(), PortError> {
        let Some(state) = self.state.take() else {
            return Ok(());
        };
        let transition = state.complete_signing(request_id, outcome, &mut self.seq);
        self.settle(transition)
    }

    pub fn complete_spec_version_lookup(
        &mut self,
        ticket: LookupTicket,
        live: Result<u32, PortError>,
    ) -> Result<(), PortError> {
        let Some(state) = self.state.take() else {
            return Ok(());
        };
        let transition = state.complete_spec_version_lookup(ticket, live, &self.data_source);
        self.settle(transition)
    }

    /// Locks the session down: outstanding work is cancelled, queued
    /// messages are dropped and nothing is answered from here on.
    pub fn mark_phishing_detected(&mut self) {
        match self.state.as_ref() {
            None | Some(SessionState::PhishingDetected) => return,
            Some(_) => {}
        }
        self.cancel_outstanding();
        let dropped = self.queue.drain();
        tracing::warn!(dropped, "phishing detected, bridge session locked");
        self.state = Some(SessionState::PhishingDetected);
    }

    /// Ends the session. Nothing is emitted for it afterwards.
    pub fn teardown(&mut self) {
        if self.is_closed() {
            return;
        }
        self.cancel_outstanding();
        if !self.queue.is_empty() {
            let dropped = self.queue.drain();
            tracing::debug!(dropped, "queued messages dropped");
        }
        tracing::debug!("bridge session torn down");
        self.state = None;
    }

    /// `None` once the session is torn down.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        Some(SessionSnapshot {
            state: self.state.clone()?,
            queue: self.queue.clone(),
            sequences: self.seq.clone(),
        })
    }

    /// Replaces this session with a parked one.
    ///
    /// Work outstanding in the replaced state is cancelled. A restored
    /// metadata negotiation reissues its lookup under the same ticket; a
    /// restored prompt is not re-sent, the host still holds it and its
    /// decision completes the restored session.
    pub fn restore(&mut self, snapshot: SessionSnapshot) -> Result<(), PortError> {
        self.cancel_outstanding();
        let SessionSnapshot {
            state,
            queue,
            sequences,
        } = snapshot;
        tracing::debug!(state = state.name(), queued = queue.len(), "restoring bridge session");
        self.queue = queue;
        self.seq = sequences;
        let resume = Transition {
            enters: state.pending_lookup().is_some(),
            next: state,
            effects: Vec::new(),
        };
        self.settle(resume)
    }

    fn cancel_outstanding(&mut self) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        if let Some(ticket) = state.pending_lookup() {
            self.data_source.cancel_live_spec_version(ticket);
        }
        if let Some(request_id) = state.pending_host_request() {
            self.host.cancel_request(request_id);
        }
    }

    fn settle(&mut self, transition: Transition) -> Result<(), PortError> {
        let applied = self.apply(transition);
        let drained = self.try_dispatch_next();
        applied.and(drained)
    }

    fn try_dispatch_next(&mut self) -> Result<(), PortError> {
        let mut outcome = Ok(());
        loop {
            let accepting = self
                .state
                .as_ref()
                .is_some_and(SessionState::accepts_message);
            let Some(message) = self.queue.pop_if(accepting) else {
                return outcome;
            };
            let Some(state) = self.state.take() else {
                return outcome;
            };
            let transition = state.handle(message, &self.data_source, &mut self.seq);
            outcome = outcome.and(self.apply(transition));
        }
    }

    fn apply(&mut self, transition: Transition) -> Result<(), PortError> {
        let mut outcome = Ok(());
        let mut next = Some(transition);
        while let Some(Transition {
            next: state,
            effects,
            enters,
        }) = next.take()
        {
            tracing::debug!(state = state.name(), effects = effects.len(), "bridge transition");
            self.state = Some(state);
            for effect in effects {
                if let Err(e) = self.dispatch(effect) {
                    tracing::debug!(error = %e, "effect delivery failed");
                    outcome = outcome.and(Err(e));
                }
            }
            if enters {
                next = self
                    .state
                    .as_ref()
                    .and_then(|state| state.on_enter(&self.data_source));
            }
        }
        outcome
    }

    fn dispatch(&self, effect: Effect) -> Result<(), PortError> {
        match effect {
            Effect::Respond { identifier, result } => {
                match self.encoder.response(&identifier, &result) {
                    Ok(script) => self.transport.deliver_response(&identifier, script),
                    Err(e) => {
                        tracing::warn!(%identifier, error = %e, "dropping response");
                        Ok(())
                    }
                }
            }
            Effect::Fail { identifier, error } => match self.encoder.error(&identifier, &error) {
                Ok(script) => self
                    .transport
                    .deliver_error(&identifier, error.kind(), script),
                Err(e) => {
                    tracing::warn!(%identifier, error = %e, "dropping error response");
                    Ok(())
                }
            },
            Effect::Push { request_id, result } => {
                match self.encoder.subscription_push(&request_id, &result) {
                    Ok(script) => self.transport.deliver_subscription_push(&request_id, script),
                    Err(e) => {
                        tracing::warn!(%request_id, error = %e, "dropping subscription push");
                        Ok(())
                    }
                }
            }
            Effect::RequestAuthorization(request) => self.host.request_authorization(request),
            Effect::RequestSigning(request) => self.host.request_signing(request),
        }
    }
}
