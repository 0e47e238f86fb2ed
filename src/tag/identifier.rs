//! Binary connection identifier parsing
//!
//! The broker reports each connection's identifier as a fixed-length hex
//! string (24 bytes, 48 characters). The first 32 characters encode a
//! node-family signature: the `AMQC` eyecatcher followed by the padded name of
//! the node that issued the identifier.

use bytes::Bytes;

/// Expected identifier length in hex characters
pub const IDENTIFIER_HEX_LEN: usize = 48;

/// Number of leading hex characters that carry the node signature
pub const SIGNATURE_HEX_LEN: usize = 32;

/// Bytes of padded node name inside the signature
pub const SIGNATURE_NAME_LEN: usize = 12;

/// Hex encoding of the `AMQC` eyecatcher
pub const EYECATCHER_HEX: &str = "414D5143";

/// Byte range holding the embedded node name (after the eyecatcher)
const EMBEDDED_NAME: std::ops::Range<usize> = 4..12;

/// Outcome of mapping an identifier to a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeHint {
    /// Identifier carried a known signature
    Resolved(String),
    /// No known signature; callers fall back to a separately resolved node
    Unresolved,
}

impl NodeHint {
    /// Resolve the hint, using `fallback` when the identifier was not recognized
    pub fn or_else(self, fallback: impl FnOnce() -> String) -> String {
        match self {
            NodeHint::Resolved(node) => node,
            NodeHint::Unresolved => fallback(),
        }
    }
}

/// Table of known identifier signatures and the canonical node they map to
#[derive(Debug, Clone)]
pub struct NodeSignatures {
    entries: Vec<(String, String)>,
}

impl NodeSignatures {
    /// An empty table: every identifier is unresolved
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a signature prefix (hex, case-insensitive) for `node`
    pub fn with(mut self, prefix_hex: impl Into<String>, node: impl Into<String>) -> Self {
        self.entries
            .push((prefix_hex.into().to_ascii_uppercase(), node.into()));
        self
    }

    /// Add a signature for a node by name
    ///
    /// The prefix is the full signature: `AMQC` followed by the name
    /// space-padded (or truncated) to [`SIGNATURE_NAME_LEN`] bytes.
    pub fn with_node(self, node: &str) -> Self {
        let mut name = node.as_bytes().to_vec();
        name.resize(SIGNATURE_NAME_LEN, b' ');
        let prefix = format!("{}{}", EYECATCHER_HEX, hex::encode_upper(name));
        self.with(prefix, node)
    }

    /// Number of known signatures
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Map a raw identifier to a node hint
    ///
    /// Only the first [`SIGNATURE_HEX_LEN`] characters are inspected. Shorter
    /// identifiers are always unresolved.
    pub fn resolve(&self, raw: &str) -> NodeHint {
        let Some(signature) = raw.get(..SIGNATURE_HEX_LEN) else {
            return NodeHint::Unresolved;
        };
        let signature = signature.to_ascii_uppercase();

        self.entries
            .iter()
            .find(|(prefix, _)| signature.starts_with(prefix.as_str()))
            .map(|(_, node)| NodeHint::Resolved(node.clone()))
            .unwrap_or(NodeHint::Unresolved)
    }
}

impl Default for NodeSignatures {
    /// The three-node reference cluster `QM1`..`QM3`
    fn default() -> Self {
        Self::empty()
            .with_node("QM1")
            .with_node("QM2")
            .with_node("QM3")
    }
}

/// A broker-issued connection identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionIdentifier {
    /// Identifier as reported by the broker
    raw: String,
    /// Decoded bytes, if the identifier is valid hex
    bytes: Option<Bytes>,
}

impl ConnectionIdentifier {
    /// Wrap a raw identifier, decoding it when it is valid hex
    ///
    /// Invalid identifiers are kept verbatim; they simply never resolve to a
    /// node.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let bytes = hex::decode(&raw).ok().map(Bytes::from);
        Self { raw, bytes }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Decoded identifier bytes
    pub fn bytes(&self) -> Option<&Bytes> {
        self.bytes.as_ref()
    }

    /// Whether the identifier is valid hex of the expected length
    pub fn is_well_formed(&self) -> bool {
        self.raw.len() == IDENTIFIER_HEX_LEN && self.bytes.is_some()
    }

    /// Whether the identifier starts with the `AMQC` eyecatcher
    pub fn has_eyecatcher(&self) -> bool {
        self.bytes
            .as_ref()
            .is_some_and(|b| b.starts_with(b"AMQC"))
    }

    /// Map this identifier to a node using `signatures`
    pub fn node_hint(&self, signatures: &NodeSignatures) -> NodeHint {
        signatures.resolve(&self.raw)
    }

    /// Printable name embedded after the eyecatcher, if any
    pub fn embedded_name(&self) -> Option<String> {
        if !self.has_eyecatcher() {
            return None;
        }
        let bytes = self.bytes.as_ref()?.get(EMBEDDED_NAME)?;
        let name: String = bytes
            .iter()
            .filter(|b| b.is_ascii_graphic())
            .map(|&b| char::from(b))
            .collect();

        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

impl std::fmt::Display for ConnectionIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
