//! Correlation tag parsing and group key derivation
//!
//! A broker-issued correlation tag has the shape
//!
//! ```text
//! MQCT 7B4AC66800610040 QM1_2025-09-05_02.13.44
//! ^^^^ ^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^^^^^^^^^
//! magic     handle       node hint + stamp
//! ```
//!
//! Sessions of one physical connection report the same tag as their parent,
//! so the handle portion is what groups them together.

use super::error::TagError;

/// Fixed magic prefix of a well-formed tag
pub const MAGIC_PREFIX: &str = "MQCT";

/// Length of the opaque handle following the magic prefix
pub const HANDLE_LEN: usize = 16;

/// Group key length used when the magic prefix is absent
pub const FALLBACK_KEY_LEN: usize = 20;

/// Reserved key for parents whose tag could not be keyed at all
pub const UNKNOWN_GROUP: &str = "UNKNOWN";

/// Normalized tag prefix that identifies a correlation group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(String);

impl GroupKey {
    /// Create a group key from an already-normalized string
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The reserved key for untaggable parents
    pub fn unknown() -> Self {
        Self(UNKNOWN_GROUP.to_string())
    }

    /// Check if this is the reserved unknown key
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_GROUP
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the group key for a tag
///
/// With the magic prefix, the key is the next 16 characters (the handle).
/// Without it, the key is the first 20 characters, or the whole tag if it is
/// shorter. Only an empty tag, or a bare magic prefix with nothing after it,
/// is rejected.
pub fn extract_group_key(tag: &str) -> Result<GroupKey, TagError> {
    if tag.is_empty() {
        return Err(TagError::malformed("empty tag"));
    }

    let key = match tag.strip_prefix(MAGIC_PREFIX) {
        Some("") => return Err(TagError::malformed("magic prefix without handle")),
        Some(rest) => take_chars(rest, HANDLE_LEN),
        None => take_chars(tag, FALLBACK_KEY_LEN),
    };

    Ok(GroupKey::new(key))
}

/// Group key for an optional tag, falling back to the reserved unknown key
pub fn group_key_or_unknown(tag: Option<&str>) -> GroupKey {
    tag.and_then(|t| extract_group_key(t).ok())
        .unwrap_or_else(GroupKey::unknown)
}

/// Borrow at most `n` characters from the front of `s`
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Structural breakdown of a well-formed tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagParts<'a> {
    /// The 16-character opaque handle
    pub handle: &'a str,
    /// Everything after the handle (node name, separator, stamp)
    pub suffix: &'a str,
}

impl<'a> TagParts<'a> {
    /// Parse a tag that carries the magic prefix and a full handle
    pub fn parse(tag: &'a str) -> Result<Self, TagError> {
        let rest = tag
            .strip_prefix(MAGIC_PREFIX)
            .ok_or_else(|| TagError::malformed("missing magic prefix"))?;

        let handle = take_chars(rest, HANDLE_LEN);
        if handle.chars().count() < HANDLE_LEN {
            return Err(TagError::malformed("handle shorter than 16 characters"));
        }

        Ok(Self {
            handle,
            suffix: &rest[handle.len()..],
        })
    }

    /// Node name embedded before the first `_` of the suffix
    pub fn node_hint(&self) -> Option<&'a str> {
        self.suffix
            .split('_')
            .next()
            .filter(|hint| !hint.is_empty())
    }

    /// Trailing stamp after the first `_`
    pub fn stamp(&self) -> Option<&'a str> {
        self.suffix
            .split_once('_')
            .map(|(_, stamp)| stamp)
            .filter(|stamp| !stamp.is_empty())
    }
}
