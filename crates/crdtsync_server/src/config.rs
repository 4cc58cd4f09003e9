//! Server configuration.

/// Client id used when a request carries none.
pub const DEFAULT_CLIENT_ID: &str = "default-user";

/// Configuration for the sync server.
///
/// The server is transport-agnostic; listening addresses belong to the
/// embedding transport.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Client id for requests that do not name one.
    pub default_client_id: String,
    /// Maximum number of entity types one commit or pull may name.
    pub max_commit_types: usize,
}

impl ServerConfig {
    /// Creates a configuration with the defaults.
    pub fn new() -> Self {
        Self {
            default_client_id: DEFAULT_CLIENT_ID.to_string(),
            max_commit_types: 64,
        }
    }

    /// Sets the default client id.
    pub fn with_default_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.default_client_id = client_id.into();
        self
    }

    /// Sets the maximum number of entity types per commit or pull.
    pub fn with_max_commit_types(mut self, max: usize) -> Self {
        self.max_commit_types = max;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
