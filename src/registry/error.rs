//! Registry error types

use thiserror::Error;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A session with this id is already registered
    #[error("session {0} already registered")]
    DuplicateSession(u64),
}
