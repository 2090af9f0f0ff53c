use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domain::BridgeMessage;

/// Inbound messages awaiting dispatch, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageQueue {
    pending: VecDeque<BridgeMessage>,
}

impl MessageQueue {
    pub fn enqueue(&mut self, message: BridgeMessage) {
        self.pending.push_back(message);
    }

    /// Releases the head only if the current state can take it.
    pub fn pop_if(&mut self, accepting: bool) -> Option<BridgeMessage> {
        if accepting {
            self.pending.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops everything still queued. Used when the session ends or locks.
    pub fn drain(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}
