//! Text-search query engine
//!
//! Parses search expressions into an operator tree and evaluates them
//! against the per-service inverted indexes, producing scored and
//! class-grouped results.

pub mod index;
pub mod language;
pub mod tree;

pub use index::{IndexItem, IndexManager, InvertedIndex};
pub use language::Language;
pub use tree::{Hit, HitCount, QueryTree};
