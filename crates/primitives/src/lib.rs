#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Core types shared by the editing core: keys, text positions, and immutable
//! buffer snapshots.

/// Identifier types for open documents.
pub mod ids;
/// Key event types and keystroke history.
pub mod key;
/// Zero-based line/column positions.
pub mod position;
/// Character ranges.
pub mod range;
/// Immutable buffer snapshots.
pub mod snapshot;

pub use ids::DocumentId;
pub use key::{Key, KeyCode, KeyHistory, Modifiers, NamedKey};
pub use position::Position;
pub use range::{CharIdx, CharLen, CharRange};
pub use ropey::Rope;
pub use snapshot::{Snapshot, is_token_char};
