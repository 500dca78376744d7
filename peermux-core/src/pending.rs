//! Correlation table for in-flight requests.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::error::{CallResult, PeerError};

/// In-flight requests keyed by id, each holding the channel that resolves
/// the caller's future.
///
/// Completion consumes the entry, so every request resolves at most once
/// regardless of reply order. Entries for ids the remote never answers are
/// rejected in bulk when the connection closes.
#[derive(Default)]
pub(crate) struct PendingTable {
    entries: HashMap<String, oneshot::Sender<CallResult>>,
}

impl PendingTable {
    /// Registers a new request id and returns the receiver its reply will
    /// arrive on.
    pub fn insert(&mut self, id: String) -> oneshot::Receiver<CallResult> {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(id, tx);
        rx
    }

    /// Resolves the request with the given id. Returns false when no such
    /// request is pending, which the caller should log and otherwise ignore.
    pub fn complete(&mut self, id: &str, outcome: CallResult) -> bool {
        match self.entries.remove(id) {
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Rejects every pending request with [`PeerError::Disconnected`] and
    /// returns how many were rejected.
    pub fn drain(&mut self) -> usize {
        let n = self.entries.len();
        for (_, tx) in self.entries.drain() {
            let _ = tx.send(Err(PeerError::Disconnected));
        }
        n
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
