//! Sync protocol engine: push (client changes in) and pull (server changes
//! out), conflict detection, Sync Log and Sync Conflict bookkeeping.

mod model;
mod pull;
mod push;

pub use model::*;

use crate::records::RecordStore;

/// Request-scoped unit of work over one store.
///
/// Push runs the whole batch in one transaction with a savepoint per record,
/// so a failing record never disturbs its siblings.
pub struct SyncEngine<'s, S: RecordStore> {
    store: &'s mut S,
    session: SyncSession,
}

impl<'s, S: RecordStore> SyncEngine<'s, S> {
    pub fn new(store: &'s mut S, session: SyncSession) -> Self {
        Self { store, session }
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }
}
