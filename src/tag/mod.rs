//! Tag codec
//!
//! Pure parsing of the two broker-issued values every connection carries:
//!
//! - the correlation tag, whose handle portion becomes the [`GroupKey`] that
//!   clusters a parent with its sessions
//! - the binary connection identifier, whose leading signature maps to the
//!   node that issued it
//!
//! Nothing here fails hard. Malformed tags still produce a stable key (or the
//! reserved `UNKNOWN` key), and unrecognized identifiers yield
//! [`NodeHint::Unresolved`] so callers can fall back to the node the client
//! library resolved.

pub mod codec;
pub mod error;
pub mod identifier;

pub use codec::{
    extract_group_key, group_key_or_unknown, GroupKey, TagParts, FALLBACK_KEY_LEN, HANDLE_LEN,
    MAGIC_PREFIX, UNKNOWN_GROUP,
};
pub use error::TagError;
pub use identifier::{ConnectionIdentifier, NodeHint, NodeSignatures, IDENTIFIER_HEX_LEN};
