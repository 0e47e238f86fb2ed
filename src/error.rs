//! Error types

use crate::registry::{HandleError, RegistryError};
use crate::tag::TagError;

/// Crate-wide error
#[derive(Debug, Clone)]
pub enum Error {
    /// Correlation tag could not be parsed
    Tag(TagError),
    /// Registry operation failed
    Registry(RegistryError),
    /// Handle could not report a property
    Handle(HandleError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Tag(e) => write!(f, "Tag error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Handle(e) => write!(f, "Handle error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Tag(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Handle(e) => Some(e),
        }
    }
}

impl From<TagError> for Error {
    fn from(e: TagError) -> Self {
        Error::Tag(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<HandleError> for Error {
    fn from(e: HandleError) -> Self {
        Error::Handle(e)
    }
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;
    use crate::registry::ConnectionId;
    use crate::tag::extract_group_key;

    fn key_of(tag: &str) -> Result<String> {
        Ok(extract_group_key(tag)?.as_str().to_string())
    }

    #[test]
    fn test_question_mark_conversion() {
        assert_eq!(key_of("MQCT1234567890ABCDEFQM1_1").unwrap(), "1234567890ABCDEF");

        let err = key_of("").unwrap_err();
        assert!(matches!(err, Error::Tag(_)));
        assert!(err.to_string().starts_with("Tag error: Malformed correlation tag"));
    }

    #[test]
    fn test_source_chain() {
        let err: Error = RegistryError::ExtractionFailure(HandleError::missing("identifier")).into();
        let registry = err.source().unwrap();
        assert!(registry.to_string().contains("Extraction failure"));
        assert!(registry.source().is_some());

        let err: Error = RegistryError::ConnectionNotFound(ConnectionId(3)).into();
        assert_eq!(err.to_string(), "Registry error: Connection not found: CONN-3");
    }
}
