//! Scenario documents: an indentation-based text format parsed into a
//! generic tree of scalars, sequences and mappings.
//!
//! # Invariants
//! - A parsed [`GenericNode`] is immutable; nothing downstream mutates it.
//! - Mapping keys are unique. Source order is kept for diagnostics and
//!   emission, but mapping equality ignores it.
//! - [`emit`] output re-parses to a tree equal to its input.
//!
//! The parser only ever sees already-read text. Where that text comes from
//! (bundled resource, disk, network) is the caller's business.

mod emit;
mod error;
mod node;
mod parser;
mod path;

pub use emit::emit;
pub use error::{ParseError, ParseErrorReason};
pub use node::{GenericNode, Mapping, Scalar};
pub use parser::{MAX_NESTING_DEPTH, parse};
pub use path::{NodePath, PathSegment};

pub fn crate_info() -> &'static str {
    concat!("physim-document v", env!("CARGO_PKG_VERSION"))
}
