//! In-flight request bookkeeping
//!
//! Each outstanding request owns one slot keyed by its message id. Responses
//! name the request they answer through `msg_id`; a response without one
//! falls back to the oldest waiting request of the matching kind on its
//! topic. Either way a response only completes a request on its own topic.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::protocol::{ProtocolError, ProtocolResult, RelayMessage, RelayMessageType};

struct Slot {
    /// Response kind that completes this request
    expects: RelayMessageType,
    topic: String,
    seq: u64,
    tx: oneshot::Sender<RelayMessage>,
}

#[derive(Default)]
struct Slots {
    by_id: HashMap<String, Slot>,
    next_seq: u64,
}

/// Map of message id to completion handle
#[derive(Default)]
pub(crate) struct PendingRequests {
    slots: Mutex<Slots>,
}

impl PendingRequests {
    /// Reserve a slot for request `id`
    ///
    /// The returned guard frees the slot when dropped, so a caller that gives
    /// up (timeout, cancelled future, failed publish) leaves nothing behind.
    pub(crate) fn arm(
        self: &Arc<Self>,
        id: &str,
        topic: &str,
        expects: RelayMessageType,
    ) -> (PendingGuard, oneshot::Receiver<RelayMessage>) {
        let (tx, rx) = oneshot::channel();
        {
            let mut slots = self.slots.lock();
            let seq = slots.next_seq;
            slots.next_seq += 1;
            slots.by_id.insert(
                id.to_string(),
                Slot {
                    expects,
                    topic: topic.to_string(),
                    seq,
                    tx,
                },
            );
        }

        let guard = PendingGuard {
            pending: self.clone(),
            id: id.to_string(),
        };
        (guard, rx)
    }

    /// Complete the request a response belongs to
    pub(crate) fn resolve(&self, response: RelayMessage) -> ProtocolResult<()> {
        let kind = response.kind();
        let slot = {
            let mut slots = self.slots.lock();
            let id = match response.msg_id() {
                Some(msg_id) => slots
                    .by_id
                    .get(msg_id)
                    .filter(|slot| slot.expects == kind && slot.topic == response.topic())
                    .map(|_| msg_id.to_string()),
                None => slots
                    .by_id
                    .iter()
                    .filter(|(_, slot)| slot.expects == kind && slot.topic == response.topic())
                    .min_by_key(|(_, slot)| slot.seq)
                    .map(|(id, _)| id.clone()),
            };
            id.and_then(|id| slots.by_id.remove(&id))
        };

        let no_pending = || ProtocolError::NoPendingRequest {
            kind,
            msg_id: response.msg_id().unwrap_or_default().to_string(),
        };

        match slot {
            Some(slot) => slot.tx.send(response.clone()).map_err(|_| no_pending()),
            None => Err(no_pending()),
        }
    }

    /// Number of requests still waiting
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().by_id.len()
    }

    /// Drop every slot; their waiters see a closed channel
    pub(crate) fn clear(&self) -> usize {
        let mut slots = self.slots.lock();
        let cleared = slots.by_id.len();
        slots.by_id.clear();
        cleared
    }

    fn remove(&self, id: &str) {
        self.slots.lock().by_id.remove(id);
    }
}

/// Frees a pending slot on drop
pub(crate) struct PendingGuard {
    pending: Arc<PendingRequests>,
    id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}
