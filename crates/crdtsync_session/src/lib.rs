//! # crdtsync Session
//!
//! Session and synchronization engine for crdtsync.
//!
//! This crate provides:
//! - [`SessionRegistry`]: one private replica scope per client, cloned from
//!   main on creation and dropped on close
//! - [`EntityOperations`]: list/add/update/delete against a session replica
//! - [`SyncProtocol`]: `commit` (session → main) and `pull` (main → session)
//! - [`SyncService`]: the three bundled, plus reset and debug dumps
//!
//! ## Architecture
//!
//! Sessions form a star around the shared main replica:
//! 1. A new session starts as a byte-for-byte copy of main
//! 2. Edits only touch the session's own scope
//! 3. `commit` merges the session into main and writes the merge back to both
//! 4. `pull` merges main into the session and never writes main
//!
//! ## Key Invariants
//!
//! - Only `commit` writes the main replica (seeding and reset aside)
//! - Replicas are reconciled by merge, never by overwrite
//! - Operations on one client are serialized; different clients run in parallel
//! - Load→merge→store on main is exclusive per entity type

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod documents;
mod error;
mod locks;
mod operations;
mod protocol;
mod registry;
mod service;

pub use config::SessionConfig;
pub use documents::DocumentAccess;
pub use error::{SyncError, SyncResult};
pub use locks::KeyedLocks;
pub use operations::{AddOutcome, EntityOperations};
pub use protocol::{
    CommitReport, CommitStatus, EntityCommit, EntityPull, PullReport, PullStatus, SyncProtocol,
};
pub use registry::{Session, SessionRegistry};
pub use service::{DocumentDump, SessionDump, SyncService};
