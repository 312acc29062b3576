//! Request/response correlation for hub invocations.
//!
//! Every outbound invocation gets an id from a monotonically increasing
//! counter, so ids never repeat for the lifetime of a connection. Replies are
//! matched by id and resolve the waiting caller exactly once; the entry is
//! removed on resolution, so a second reply for the same id finds nothing.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::Error;

/// Number of timed-out ids remembered so their late replies are dropped
/// quietly instead of being reported as anomalies.
const EXPIRED_MEMORY: usize = 1024;

pub type Reply = Result<Value, Error>;

/// An invocation waiting for its reply.
#[derive(Debug)]
pub struct PendingInvocation {
    pub hub: String,
    pub method: String,
    pub args: Vec<Value>,
    respond_to: oneshot::Sender<Reply>,
}

#[derive(Debug, Default)]
pub struct Correlator {
    next_id: AtomicU64,
    table: Mutex<Table>,
}

#[derive(Debug, Default)]
struct Table {
    pending: HashMap<u64, PendingInvocation>,
    expired: VecDeque<u64>,
}

/// What happened to an inbound reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Delivered,
    /// The caller gave up (dropped its handle) before the reply arrived.
    Abandoned,
    /// The invocation had already timed out.
    Late,
    /// No invocation with this id was ever pending, or it was already resolved.
    Unknown,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an id and records the pending invocation.
    pub fn register(
        &self,
        hub: &str,
        method: &str,
        args: Vec<Value>,
    ) -> (u64, oneshot::Receiver<Reply>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (respond_to, rx) = oneshot::channel();
        let pending = PendingInvocation {
            hub: hub.to_string(),
            method: method.to_string(),
            args,
            respond_to,
        };
        self.table().pending.insert(id, pending);
        (id, rx)
    }

    pub fn resolve(&self, id: u64, reply: Reply) -> Resolution {
        let mut table = self.table();
        let Some(pending) = table.pending.remove(&id) else {
            if table.expired.contains(&id) {
                debug!(id, "dropping late reply for expired invocation");
                return Resolution::Late;
            }
            warn!(id, "dropping reply for unknown invocation id");
            return Resolution::Unknown;
        };
        drop(table);

        debug!(id, hub = %pending.hub, method = %pending.method, "invocation resolved");
        match pending.respond_to.send(reply) {
            Ok(()) => Resolution::Delivered,
            Err(_) => Resolution::Abandoned,
        }
    }

    /// Removes an invocation whose caller stopped waiting. Returns `true` if
    /// it was still pending.
    pub fn forget(&self, id: u64) -> bool {
        self.table().pending.remove(&id).is_some()
    }

    /// Removes a timed-out invocation and remembers its id.
    pub fn expire(&self, id: u64) {
        let mut table = self.table();
        if table.pending.remove(&id).is_some() {
            if table.expired.len() == EXPIRED_MEMORY {
                table.expired.pop_front();
            }
            table.expired.push_back(id);
        }
    }

    /// Resolves every pending invocation with [`Error::Closed`].
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.table().pending.drain().collect();
        let count = drained.len();
        for (_, pending) in drained {
            let _ = pending.respond_to.send(Err(Error::Closed));
        }
        if count > 0 {
            debug!(count, "failed pending invocations on close");
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.table().pending.len()
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.table().pending.contains_key(&id)
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
