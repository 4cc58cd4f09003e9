//! Configuration for the session engine.

use crdtsync_core::ActorId;

/// Configuration for a [`crate::SyncService`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Write every registered entity type's seed records into main at
    /// startup, for entity types main does not have yet.
    pub seed_on_start: bool,
    /// Actor stamped on edits made directly against main (seeding, reset).
    pub main_actor: ActorId,
}

impl SessionConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            seed_on_start: true,
            main_actor: ActorId::MAIN,
        }
    }

    /// Sets whether main is seeded at startup.
    pub fn with_seed_on_start(mut self, seed: bool) -> Self {
        self.seed_on_start = seed;
        self
    }

    /// Sets the actor used for writes made directly against main.
    pub fn with_main_actor(mut self, actor: ActorId) -> Self {
        self.main_actor = actor;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
