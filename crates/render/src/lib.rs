//! Render Adapter: renderer-agnostic interface over simulation snapshots.
//!
//! # Invariants
//! - Renderers cannot mutate the world or a snapshot; data flows one way,
//!   kernel to renderer.
//! - Render output derives only from the world, one snapshot and the view.
//!
//! Drawing backends consume [`Overlay`] geometry (velocity and acceleration
//! arrows, grid lines) in world coordinates. [`DebugTextRenderer`] stands in
//! for a graphical backend in the CLI and in tests.

mod overlay;
mod renderer;

pub use overlay::{Arrow, ArrowKind, Overlay, Segment, arrows, grid, overlay};
pub use renderer::{DebugTextRenderer, OverlayRenderer, RenderView, Renderer};

pub fn crate_info() -> &'static str {
    concat!("physim-render v", env!("CARGO_PKG_VERSION"))
}
