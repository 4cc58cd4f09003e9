//! Commit and pull between session replicas and main.

use crate::documents::DocumentAccess;
use crate::error::{SyncError, SyncResult};
use crate::locks::KeyedLocks;
use crate::registry::{Access, Session, SessionRegistry};
use crdtsync_core::DocumentEngine;
use crdtsync_storage::{DocumentStore, ScopeId};
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Outcome of committing one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum CommitStatus {
    /// Main had no document; the session document was copied into main.
    Created,
    /// Session and main were merged and the result written to both.
    Merged,
    /// The entity type was not committed; others in the batch may have been.
    Failed {
        /// Why the entity type failed.
        reason: String,
    },
}

/// Outcome of pulling one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum PullStatus {
    /// The session had no document; main was copied in.
    Copied,
    /// Main was merged into the session document.
    Merged,
    /// Main has no document of this type.
    Skipped,
    /// The entity type was not pulled; others in the batch may have been.
    Failed {
        /// Why the entity type failed.
        reason: String,
    },
}

/// Per-entity result of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCommit {
    /// Entity type.
    pub entity_type: String,
    /// What happened to it.
    #[serde(flatten)]
    pub status: CommitStatus,
}

/// Per-entity result of a pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPull {
    /// Entity type.
    pub entity_type: String,
    /// What happened to it.
    #[serde(flatten)]
    pub status: PullStatus,
}

/// Result of [`SyncProtocol::commit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    /// One entry per entity type the session holds, in batch order.
    pub results: Vec<EntityCommit>,
}

impl CommitReport {
    /// Returns the status of one entity type.
    pub fn status(&self, entity_type: &str) -> Option<&CommitStatus> {
        self.results
            .iter()
            .find(|r| r.entity_type == entity_type)
            .map(|r| &r.status)
    }

    /// Returns true if no entity type failed.
    pub fn is_complete(&self) -> bool {
        !self
            .results
            .iter()
            .any(|r| matches!(r.status, CommitStatus::Failed { .. }))
    }
}

/// Result of [`SyncProtocol::pull`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullReport {
    /// One entry per entity type considered, in batch order.
    pub results: Vec<EntityPull>,
}

impl PullReport {
    /// Returns the status of one entity type.
    pub fn status(&self, entity_type: &str) -> Option<&PullStatus> {
        self.results
            .iter()
            .find(|r| r.entity_type == entity_type)
            .map(|r| &r.status)
    }

    /// Returns true if no entity type failed.
    pub fn is_complete(&self) -> bool {
        !self
            .results
            .iter()
            .any(|r| matches!(r.status, PullStatus::Failed { .. }))
    }
}

/// Reconciles session replicas with main.
///
/// `commit` is the only path that writes main. Both directions merge,
/// never overwrite, so concurrent commits of different sessions keep each
/// other's edits. Commits of one entity type are serialized by a lock on
/// the main document.
pub struct SyncProtocol<S, E> {
    sessions: Arc<SessionRegistry<S>>,
    documents: Arc<DocumentAccess<S, E>>,
    main_locks: KeyedLocks<String>,
}

impl<S: DocumentStore, E: DocumentEngine> SyncProtocol<S, E> {
    /// Creates the protocol over shared components.
    pub fn new(sessions: Arc<SessionRegistry<S>>, documents: Arc<DocumentAccess<S, E>>) -> Self {
        Self {
            sessions,
            documents,
            main_locks: KeyedLocks::new(),
        }
    }

    /// Runs `f` with the main document of `entity_type` locked.
    ///
    /// Also used by admin writes to main so they cannot interleave with a
    /// commit's load→merge→store.
    pub(crate) fn with_main_lock<T>(&self, entity_type: &str, f: impl FnOnce() -> T) -> T {
        self.main_locks.with_lock(&entity_type.to_string(), f)
    }

    /// Entity types for a batch: the requested ones (deduplicated, in order)
    /// or every type stored in the session.
    fn batch(&self, session: &Session, requested: Option<&[String]>) -> SyncResult<Vec<String>> {
        match requested {
            Some(types) => {
                let mut batch: Vec<String> = Vec::with_capacity(types.len());
                for entity_type in types {
                    if !batch.contains(entity_type) {
                        batch.push(entity_type.clone());
                    }
                }
                Ok(batch)
            }
            None => self.documents.entity_types(&session.scope),
        }
    }

    /// Pushes the client's session into main.
    ///
    /// For each entity type present in the session: if main has no document
    /// the session document is written to main as is (`Created`); otherwise
    /// the two are merged and the merge written to both main and the
    /// session (`Merged`). Requested types the session does not hold are
    /// skipped. An undecodable document fails only its own entity type; a
    /// storage failure stops the batch.
    ///
    /// # Errors
    ///
    /// [`SyncError::NoActiveSession`] if the client has no session (commit
    /// never creates one), [`SyncError::Interrupted`] if storage failed after
    /// main was written for some entity type, or the storage error itself if
    /// nothing had been written yet.
    pub fn commit(&self, client_id: &str, entity_types: Option<&[String]>) -> SyncResult<CommitReport> {
        self.sessions
            .with_session(client_id, Access::Existing, |session| {
                let batch = self.batch(session, entity_types)?;
                let mut results = Vec::with_capacity(batch.len());

                for entity_type in batch {
                    match self.commit_one(session, &entity_type) {
                        Ok(Some(status)) => {
                            debug!(client_id, entity_type = %entity_type, ?status, "committed");
                            results.push(EntityCommit { entity_type, status });
                        }
                        Ok(None) => {}
                        Err(e) if e.aborts_batch() => {
                            return Err(interrupted(
                                results.iter().map(|r: &EntityCommit| r.entity_type.clone()),
                                e,
                            ))
                        }
                        Err(e) => {
                            warn!(client_id, entity_type = %entity_type, error = %e, "commit failed");
                            results.push(EntityCommit {
                                entity_type,
                                status: CommitStatus::Failed {
                                    reason: e.to_string(),
                                },
                            });
                        }
                    }
                }

                session.last_sync_time = SystemTime::now();
                info!(client_id, entities = results.len(), "commit finished");
                Ok(CommitReport { results })
            })
    }

    fn commit_one(&self, session: &Session, entity_type: &str) -> SyncResult<Option<CommitStatus>> {
        let Some(local) = self.documents.load(&session.scope, entity_type)? else {
            return Ok(None);
        };
        let main = ScopeId::main();

        self.with_main_lock(entity_type, || match self.documents.load(&main, entity_type)? {
            None => {
                self.documents.save(&main, entity_type, &local)?;
                Ok(Some(CommitStatus::Created))
            }
            Some(shared) => {
                let merged = self.documents.engine().merge(&shared, &local)?;
                self.documents.save(&main, entity_type, &merged)?;
                // Main already holds the merge; a failed write-back is partial.
                self.documents
                    .save(&session.scope, entity_type, &merged)
                    .map_err(|e| SyncError::Interrupted {
                        completed: vec![entity_type.to_string()],
                        source: Box::new(e),
                    })?;
                Ok(Some(CommitStatus::Merged))
            }
        })
    }

    /// Fetches main into the client's session, creating the session if
    /// needed.
    ///
    /// For each entity type present in the session (or each requested
    /// type): nothing happens if main has no document (`Skipped`); a
    /// missing session document is copied from main (`Copied`); otherwise
    /// main is merged into the session document (`Merged`). Main is never
    /// written.
    ///
    /// # Errors
    ///
    /// Same storage handling as [`SyncProtocol::commit`].
    pub fn pull(&self, client_id: &str, entity_types: Option<&[String]>) -> SyncResult<PullReport> {
        self.sessions
            .with_session(client_id, Access::CreateIfMissing, |session| {
                let batch = self.batch(session, entity_types)?;
                let mut results = Vec::with_capacity(batch.len());

                for entity_type in batch {
                    match self.pull_one(session, &entity_type) {
                        Ok(status) => {
                            debug!(client_id, entity_type = %entity_type, ?status, "pulled");
                            results.push(EntityPull { entity_type, status });
                        }
                        Err(e) if e.aborts_batch() => {
                            return Err(interrupted(
                                results
                                    .iter()
                                    .filter(|r: &&EntityPull| r.status != PullStatus::Skipped)
                                    .map(|r| r.entity_type.clone()),
                                e,
                            ))
                        }
                        Err(e) => {
                            warn!(client_id, entity_type = %entity_type, error = %e, "pull failed");
                            results.push(EntityPull {
                                entity_type,
                                status: PullStatus::Failed {
                                    reason: e.to_string(),
                                },
                            });
                        }
                    }
                }

                session.last_sync_time = SystemTime::now();
                info!(client_id, entities = results.len(), "pull finished");
                Ok(PullReport { results })
            })
    }

    fn pull_one(&self, session: &Session, entity_type: &str) -> SyncResult<PullStatus> {
        let Some(shared) = self.documents.load(&ScopeId::main(), entity_type)? else {
            return Ok(PullStatus::Skipped);
        };

        match self.documents.load(&session.scope, entity_type)? {
            None => {
                self.documents.save(&session.scope, entity_type, &shared)?;
                Ok(PullStatus::Copied)
            }
            Some(local) => {
                let merged = self.documents.engine().merge(&local, &shared)?;
                self.documents.save(&session.scope, entity_type, &merged)?;
                Ok(PullStatus::Merged)
            }
        }
    }
}

fn interrupted(completed: impl Iterator<Item = String>, error: SyncError) -> SyncError {
    let mut completed: Vec<String> = completed.collect();
    let source = match error {
        SyncError::Interrupted {
            completed: partial,
            source,
        } => {
            completed.extend(partial);
            source
        }
        other => Box::new(other),
    };
    if completed.is_empty() {
        *source
    } else {
        SyncError::Interrupted { completed, source }
    }
}
