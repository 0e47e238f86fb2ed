//! Registry configuration

use crate::tag::NodeSignatures;

/// Sentinel stored for any property a handle could not report
pub const UNKNOWN: &str = "UNKNOWN";

/// Configuration for the connection registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Identifier signatures used to derive a parent's node
    pub node_signatures: NodeSignatures,

    /// Value stored in place of unreadable properties
    pub unknown_sentinel: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            node_signatures: NodeSignatures::default(),
            unknown_sentinel: UNKNOWN.to_string(),
        }
    }
}

impl RegistryConfig {
    /// Set the identifier signature table
    pub fn node_signatures(mut self, signatures: NodeSignatures) -> Self {
        self.node_signatures = signatures;
        self
    }

    /// Set the unknown sentinel
    pub fn unknown_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.unknown_sentinel = sentinel.into();
        self
    }
}
