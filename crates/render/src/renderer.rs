use crate::overlay::{Overlay, overlay};
use physim_common::{Rect, Vector2};
use physim_kernel::{PhysicsWorld, SimulationState};
use std::fmt::Write;

/// What part of the world is shown and how overlays are scaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    /// World-space point at the middle of the view.
    pub center: Vector2,
    /// Full width and height of the visible area, in world units.
    pub extent: Vector2,
    /// Arrow length per unit of velocity or acceleration.
    pub vector_scale: f64,
    pub grid_spacing: f64,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            center: Vector2::ZERO,
            extent: Vector2::new(20.0, 20.0),
            vector_scale: 0.1,
            grid_spacing: 1.0,
        }
    }
}

impl RenderView {
    /// A view covering exactly `rect`, with default scaling.
    pub fn framing(rect: Rect) -> Self {
        Self {
            center: rect.center(),
            extent: rect.size(),
            ..Self::default()
        }
    }

    /// The rectangle this view covers.
    pub fn visible_rect(&self) -> Rect {
        let half = self.extent * 0.5;
        Rect::new(self.center - half, self.center + half)
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// A renderer reads a world, one snapshot and a view, and produces output.
/// It never mutates either: data flows from the kernel to the renderer only.
pub trait Renderer {
    type Output;

    fn render(&self, world: &PhysicsWorld, state: &SimulationState, view: &RenderView) -> Self::Output;
}

/// Produces overlay geometry for a drawing backend.
#[derive(Debug, Default)]
pub struct OverlayRenderer;

impl Renderer for OverlayRenderer {
    type Output = Overlay;

    fn render(&self, world: &PhysicsWorld, state: &SimulationState, view: &RenderView) -> Overlay {
        overlay(world, state, view)
    }
}

/// Human-readable dump of a snapshot, for the CLI, logs and tests.
#[derive(Debug, Default)]
pub struct DebugTextRenderer {
    /// Include kinetic/potential energy.
    pub energy: bool,
}

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_energy(mut self) -> Self {
        self.energy = true;
        self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, world: &PhysicsWorld, state: &SimulationState, view: &RenderView) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Simulation State (tick={}, time={:.3}) ===",
            state.tick(),
            state.time()
        );
        if let Some(name) = world.name() {
            let _ = writeln!(out, "Scenario: {name}");
        }
        let _ = writeln!(out, "Bodies: {}", state.len());
        let _ = writeln!(
            out,
            "View: center=({:.1}, {:.1}) extent=({:.1}, {:.1})",
            view.center.x, view.center.y, view.extent.x, view.extent.y
        );
        if self.energy {
            let _ = writeln!(
                out,
                "Energy: kinetic={:.4} potential={:.4} total={:.4}",
                world.kinetic_energy(state),
                world.potential_energy(state),
                world.total_energy(state)
            );
        }
        let visible = view.visible_rect();
        for (id, body) in state.bodies() {
            let (p, v, a) = (body.position, body.velocity, body.acceleration);
            let _ = write!(
                out,
                "  [{id}] pos=({:.3}, {:.3}) vel=({:.3}, {:.3}) acc=({:.3}, {:.3})",
                p.x, p.y, v.x, v.y, a.x, a.y
            );
            out.push_str(if visible.contains(p) { "\n" } else { " (off view)\n" });
        }
        out
    }
}
