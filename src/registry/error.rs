//! Registry error types
//!
//! None of these escape the tracking boundary: `track_connection` and
//! `track_session` log them and return `None`. The `try_` variants surface
//! them for callers that want to branch on the cause.

use super::entry::ConnectionId;
use super::handle::HandleError;

/// Error type for registry operations
#[derive(Debug, Clone)]
pub enum RegistryError {
    /// Session tracked against a parent the registry has never seen
    UnknownParent(ConnectionId),
    /// Lookup of a connection that is not tracked
    ConnectionNotFound(ConnectionId),
    /// A handle could not report a property required for tracking
    ExtractionFailure(HandleError),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::UnknownParent(id) => write!(f, "Unknown parent connection: {}", id),
            RegistryError::ConnectionNotFound(id) => write!(f, "Connection not found: {}", id),
            RegistryError::ExtractionFailure(e) => write!(f, "Extraction failure: {}", e),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::ExtractionFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HandleError> for RegistryError {
    fn from(e: HandleError) -> Self {
        RegistryError::ExtractionFailure(e)
    }
}
