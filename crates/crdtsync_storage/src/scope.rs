//! Replica scope identifiers.

use crate::error::{StorageError, StorageResult};
use std::fmt;

/// Well-known name of the shared main scope.
pub const MAIN_SCOPE: &str = "main";

/// Identifies an isolated storage namespace.
///
/// The shared replica lives in the fixed [`MAIN_SCOPE`]; every session
/// scope is named after its session id. Scope names double as directory
/// names in [`crate::FileStore`], so they are validated on construction.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(String);

impl ScopeId {
    /// Returns the shared main scope.
    #[must_use]
    pub fn main() -> Self {
        Self(MAIN_SCOPE.to_string())
    }

    /// Returns the scope for a session.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the id is not a usable name.
    pub fn session(session_id: impl fmt::Display) -> StorageResult<Self> {
        Self::parse(session_id.to_string())
    }

    /// Parses a scope name read back from a backend or supplied by a user.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the name is empty or contains
    /// path components.
    pub fn parse(name: impl Into<String>) -> StorageResult<Self> {
        let name = name.into();
        check_key(&name)?;
        Ok(Self(name))
    }

    /// Returns true if this is the main scope.
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.0 == MAIN_SCOPE
    }

    /// Returns the scope name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({})", self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Checks that an entity type name can be used as a storage key.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if the name is empty, a relative
/// path component, or contains a path separator.
pub fn validate_entity_type(entity_type: &str) -> StorageResult<()> {
    check_key(entity_type)
}

fn check_key(key: &str) -> StorageResult<()> {
    let reason = if key.is_empty() {
        "empty"
    } else if key == "." || key == ".." {
        "relative path component"
    } else if key.contains(['/', '\\', '\0']) {
        "contains a path separator"
    } else if key.starts_with('.') {
        "leading dot"
    } else {
        return Ok(());
    };
    Err(StorageError::InvalidKey {
        key: key.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_scope_is_well_known() {
        let main = ScopeId::main();
        assert!(main.is_main());
        assert_eq!(main.as_str(), "main");
        assert_eq!(main, ScopeId::parse("main").unwrap());
    }

    #[test]
    fn session_scope_uses_session_id() {
        let scope = ScopeId::session("0b7c7ad0-52f1-4b7e-9d65-3b1c2f8f6e11").unwrap();
        assert!(!scope.is_main());
        assert_eq!(scope.to_string(), "0b7c7ad0-52f1-4b7e-9d65-3b1c2f8f6e11");
    }

    #[test]
    fn rejects_path_like_names() {
        for bad in ["", ".", "..", "a/b", "a\\b", ".hidden"] {
            assert!(
                matches!(ScopeId::parse(bad), Err(StorageError::InvalidKey { .. })),
                "{bad:?} should be rejected"
            );
            assert!(validate_entity_type(bad).is_err());
        }
        assert!(validate_entity_type("todos").is_ok());
    }
}
