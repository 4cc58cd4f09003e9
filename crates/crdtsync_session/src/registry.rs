//! Session registry.

use crate::error::{SyncError, SyncResult};
use crdtsync_core::ActorId;
use crdtsync_storage::{DocumentStore, ScopeId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A client's private replica plus its bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Client the session belongs to.
    pub client_id: String,
    /// Generated when the session is created.
    pub session_id: Uuid,
    /// Storage scope of the session replica.
    pub scope: ScopeId,
    /// Creation time.
    pub created_at: SystemTime,
    /// Time of the last commit or pull (creation time until then).
    pub last_sync_time: SystemTime,
}

impl Session {
    /// Actor stamped on edits made through this session.
    pub fn actor(&self) -> ActorId {
        ActorId::from(self.session_id)
    }
}

/// How [`SessionRegistry::with_session`] treats a client without a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    /// Create the session first.
    CreateIfMissing,
    /// Fail with [`SyncError::NoActiveSession`].
    Existing,
}

type Slot = Arc<Mutex<Option<Session>>>;

/// Owns every session and its replica scope.
///
/// Each client id has a slot guarded by its own mutex, held for the whole
/// of any operation on that client, so operations on one client never
/// interleave while different clients proceed in parallel. A registry-wide
/// lifecycle lock is held shared by every operation and exclusively by
/// [`SessionRegistry::reset_all`].
///
/// A slot lives only while its client has a session or a call is opening
/// one; closing a session or failing to open it removes the slot.
pub struct SessionRegistry<S> {
    store: Arc<S>,
    slots: RwLock<HashMap<String, Slot>>,
    lifecycle: RwLock<()>,
}

impl<S: DocumentStore> SessionRegistry<S> {
    /// Creates an empty registry over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            slots: RwLock::new(HashMap::new()),
            lifecycle: RwLock::new(()),
        }
    }

    fn slot(&self, client_id: &str) -> Slot {
        if let Some(slot) = self.slots.read().get(client_id) {
            return Arc::clone(slot);
        }
        Arc::clone(
            self.slots
                .write()
                .entry(client_id.to_string())
                .or_default(),
        )
    }

    fn is_current(&self, client_id: &str, slot: &Slot) -> bool {
        self.slots
            .read()
            .get(client_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Removes an empty slot from the table. Called with the slot locked.
    fn retire(&self, client_id: &str, slot: &Slot) {
        let mut slots = self.slots.write();
        if slots
            .get(client_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            slots.remove(client_id);
        }
    }

    /// Runs `f` on the client's session under the client's lock.
    ///
    /// With [`Access::Existing`] a client without a session never gets a
    /// slot.
    pub(crate) fn with_session<T>(
        &self,
        client_id: &str,
        access: Access,
        f: impl FnOnce(&mut Session) -> SyncResult<T>,
    ) -> SyncResult<T> {
        let _lifecycle = self.lifecycle.read();
        loop {
            let slot = match access {
                Access::CreateIfMissing => self.slot(client_id),
                Access::Existing => match self.slots.read().get(client_id) {
                    Some(slot) => Arc::clone(slot),
                    None => return Err(no_session(client_id)),
                },
            };
            let mut guard = slot.lock();
            // The slot was retired while this call waited for it.
            if !self.is_current(client_id, &slot) {
                continue;
            }

            if guard.is_none() {
                let opened = match access {
                    Access::CreateIfMissing => self.open(client_id),
                    Access::Existing => Err(no_session(client_id)),
                };
                match opened {
                    Ok(session) => *guard = Some(session),
                    Err(e) => {
                        self.retire(client_id, &slot);
                        return Err(e);
                    }
                }
            }

            return match guard.as_mut() {
                Some(session) => f(session),
                None => Err(no_session(client_id)),
            };
        }
    }

    /// Allocates a scope and clones main into it.
    fn open(&self, client_id: &str) -> SyncResult<Session> {
        let session_id = Uuid::new_v4();
        let scope = ScopeId::session(session_id)?;
        let main = ScopeId::main();

        let copied = match self.copy_scope(&main, &scope) {
            Ok(copied) => copied,
            Err(e) => {
                if let Err(cleanup) = self.store.drop_scope(&scope) {
                    warn!(%scope, error = %cleanup, "failed to drop partially cloned scope");
                }
                return Err(e);
            }
        };

        let now = SystemTime::now();
        info!(client_id, %session_id, entities = ?copied, "session created");
        Ok(Session {
            client_id: client_id.to_string(),
            session_id,
            scope,
            created_at: now,
            last_sync_time: now,
        })
    }

    /// Copies every stored document of `from` into `to`, byte for byte.
    fn copy_scope(&self, from: &ScopeId, to: &ScopeId) -> SyncResult<Vec<String>> {
        let mut copied = Vec::new();
        for entity_type in self.store.list_entity_types(from)? {
            if let Some(bytes) = self.store.get(from, &entity_type)? {
                self.store.put(to, &entity_type, bytes)?;
                copied.push(entity_type);
            }
        }
        Ok(copied)
    }

    /// Returns the client's session, creating it if needed.
    ///
    /// Creation is idempotent: while a session exists, every call returns
    /// it unchanged.
    pub fn create_session(&self, client_id: &str) -> SyncResult<Session> {
        self.with_session(client_id, Access::CreateIfMissing, |session| {
            Ok(session.clone())
        })
    }

    /// Returns the client's session, creating it lazily.
    pub fn get_session(&self, client_id: &str) -> SyncResult<Session> {
        self.create_session(client_id)
    }

    /// Returns the client's session without creating one.
    pub fn session(&self, client_id: &str) -> Option<Session> {
        let _lifecycle = self.lifecycle.read();
        let slot = self.slots.read().get(client_id).map(Arc::clone)?;
        let guard = slot.lock();
        guard.clone()
    }

    /// Returns the client's session or [`SyncError::NoActiveSession`].
    pub fn require_session(&self, client_id: &str) -> SyncResult<Session> {
        self.session(client_id).ok_or_else(|| no_session(client_id))
    }

    /// Closes the client's session and drops its replica scope.
    ///
    /// Returns whether a session existed. Uncommitted edits are discarded.
    /// If the scope cannot be dropped the session stays registered.
    pub fn close_session(&self, client_id: &str) -> SyncResult<bool> {
        let _lifecycle = self.lifecycle.read();
        let Some(slot) = self.slots.read().get(client_id).map(Arc::clone) else {
            debug!(client_id, "close requested without a session");
            return Ok(false);
        };
        let mut guard = slot.lock();
        let Some(session) = guard.as_ref() else {
            self.retire(client_id, &slot);
            return Ok(false);
        };

        self.store.drop_scope(&session.scope)?;
        info!(client_id, session_id = %session.session_id, "session closed");
        *guard = None;
        self.retire(client_id, &slot);
        Ok(true)
    }

    /// Closes every session and drops their scopes, then clears the table.
    ///
    /// Returns the number of sessions closed. Scopes that fail to drop are
    /// logged and the first such error is returned after the table is
    /// cleared.
    pub fn reset_all(&self) -> SyncResult<usize> {
        self.reset_with(|| Ok(()))
    }

    /// Like [`SessionRegistry::reset_all`], then runs `after` before any
    /// other operation can start.
    pub(crate) fn reset_with(&self, after: impl FnOnce() -> SyncResult<()>) -> SyncResult<usize> {
        let _lifecycle = self.lifecycle.write();
        let slots: Vec<Slot> = self.slots.write().drain().map(|(_, slot)| slot).collect();

        let mut closed = 0;
        let mut first_error = None;
        for slot in slots {
            let Some(session) = slot.lock().take() else {
                continue;
            };
            closed += 1;
            if let Err(e) = self.store.drop_scope(&session.scope) {
                warn!(client_id = %session.client_id, error = %e, "failed to drop session scope");
                first_error.get_or_insert(SyncError::from(e));
            }
        }
        info!(closed, "all sessions reset");

        if let Some(e) = first_error {
            return Err(e);
        }
        after()?;
        Ok(closed)
    }

    /// Returns a snapshot of every open session, sorted by client id.
    pub fn active_sessions(&self) -> Vec<Session> {
        let _lifecycle = self.lifecycle.read();
        let slots: Vec<Slot> = self.slots.read().values().map(Arc::clone).collect();
        let mut sessions: Vec<Session> = slots
            .iter()
            .filter_map(|slot| slot.lock().clone())
            .collect();
        sessions.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        sessions
    }

    /// Returns the number of open sessions.
    pub fn session_count(&self) -> usize {
        self.active_sessions().len()
    }
}

fn no_session(client_id: &str) -> SyncError {
    SyncError::NoActiveSession {
        client_id: client_id.to_string(),
    }
}
