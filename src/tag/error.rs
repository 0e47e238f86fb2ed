//! Tag codec error types

/// Error type for tag parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// The tag is absent, empty, or too short for the requested parse
    Malformed {
        /// What was wrong with the input
        reason: &'static str,
    },
}

impl TagError {
    pub(crate) fn malformed(reason: &'static str) -> Self {
        TagError::Malformed { reason }
    }
}

impl std::fmt::Display for TagError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagError::Malformed { reason } => write!(f, "Malformed correlation tag: {}", reason),
        }
    }
}

impl std::error::Error for TagError {}
