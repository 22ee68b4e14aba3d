//! Core primitives.
//!
//! Pure helpers with no knowledge of rounds or connections.

pub mod hash;
pub mod money;

// Re-export core types
pub use hash::{Digest32, sha256};
pub use money::Amount;
