//! Shared value types for the physim engine.
//!
//! Everything here is plain data: vectors, body identifiers and axis-aligned
//! rectangles used by the builder, stepper and render adapter alike.

mod types;

pub use types::{BodyId, Rect, Vector2};

pub fn crate_info() -> &'static str {
    concat!("physim-common v", env!("CARGO_PKG_VERSION"))
}
