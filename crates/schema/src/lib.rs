//! Schema validation: checks a generic document tree against a
//! JSON-Schema-style [`SchemaDocument`] and reports every violation found.
//!
//! # Invariants
//! - Validation is pure: neither the tree nor the schema is touched.
//! - All violations are collected in one pass, each with its full path.
//! - An empty [`ValidationReport`] is the only passing result.
//!
//! Unknown mapping keys are tolerated unless a schema sets
//! `additionalProperties: false`.

mod error;
mod report;
mod schema;
mod validate;

pub use error::SchemaError;
pub use report::{ValidationReport, Violation};
pub use schema::{SchemaDocument, TypeName};
pub use validate::validate;

pub fn crate_info() -> &'static str {
    concat!("physim-schema v", env!("CARGO_PKG_VERSION"))
}
