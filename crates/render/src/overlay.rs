use crate::renderer::RenderView;
use physim_common::{BodyId, Vector2};
use physim_kernel::{PhysicsWorld, SimulationState};

/// Grids denser than this along one axis are thinned by doubling the spacing.
const MAX_LINES_PER_AXIS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowKind {
    Velocity,
    Acceleration,
}

/// A vector drawn from a body's position.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrow {
    pub body: BodyId,
    pub kind: ArrowKind,
    pub from: Vector2,
    pub to: Vector2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Vector2,
    pub to: Vector2,
}

/// Everything drawn over the bodies for one snapshot, in world coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    pub arrows: Vec<Arrow>,
    pub grid: Vec<Segment>,
}

/// Velocity and acceleration arrows for every body, scaled by
/// `view.vector_scale`. Zero vectors produce no arrow.
pub fn arrows(state: &SimulationState, view: &RenderView) -> Vec<Arrow> {
    let mut out = Vec::new();
    for (id, body) in state.bodies() {
        for (kind, v) in [
            (ArrowKind::Velocity, body.velocity),
            (ArrowKind::Acceleration, body.acceleration),
        ] {
            if v == Vector2::ZERO {
                continue;
            }
            out.push(Arrow {
                body: id.clone(),
                kind,
                from: body.position,
                to: body.position + v * view.vector_scale,
            });
        }
    }
    out
}

/// Grid lines at multiples of `view.grid_spacing` over the world bounds,
/// or over the visible area when the world is unbounded.
pub fn grid(world: &PhysicsWorld, view: &RenderView) -> Vec<Segment> {
    let area = world.bounds().map(|b| b.rect).unwrap_or_else(|| view.visible_rect());
    if !(view.grid_spacing.is_finite() && view.grid_spacing > 0.0) {
        return Vec::new();
    }
    let mut spacing = view.grid_spacing;
    while line_count(area.min.x, area.max.x, spacing) > MAX_LINES_PER_AXIS
        || line_count(area.min.y, area.max.y, spacing) > MAX_LINES_PER_AXIS
    {
        spacing *= 2.0;
    }
    if !spacing.is_finite() {
        return Vec::new();
    }
    if spacing != view.grid_spacing {
        tracing::debug!(requested = view.grid_spacing, used = spacing, "grid spacing widened");
    }

    let mut lines = Vec::new();
    for x in ticks(area.min.x, area.max.x, spacing) {
        lines.push(Segment {
            from: Vector2::new(x, area.min.y),
            to: Vector2::new(x, area.max.y),
        });
    }
    for y in ticks(area.min.y, area.max.y, spacing) {
        lines.push(Segment {
            from: Vector2::new(area.min.x, y),
            to: Vector2::new(area.max.x, y),
        });
    }
    lines
}

pub fn overlay(world: &PhysicsWorld, state: &SimulationState, view: &RenderView) -> Overlay {
    Overlay {
        arrows: arrows(state, view),
        grid: grid(world, view),
    }
}

fn first_index(min: f64, spacing: f64) -> f64 {
    (min / spacing).ceil()
}

/// Counted in `f64` so huge bounds saturate instead of overflowing.
fn line_count(min: f64, max: f64, spacing: f64) -> usize {
    let count = (max / spacing).floor() - first_index(min, spacing) + 1.0;
    if count.is_finite() && count > 0.0 {
        count.min(usize::MAX as f64) as usize
    } else {
        0
    }
}

fn ticks(min: f64, max: f64, spacing: f64) -> impl Iterator<Item = f64> {
    let first = first_index(min, spacing);
    (0..line_count(min, max, spacing)).map(move |i| (first + i as f64) * spacing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use physim_document::parse;
    use physim_kernel::{Stepper, build};

    fn world(text: &str) -> PhysicsWorld {
        build(&parse(text).unwrap()).unwrap()
    }

    #[test]
    fn arrows_scale_and_skip_zero_vectors() {
        let w = world(
            "bodies:\n  - id: a\n    mass: 1\n    position: {x: 1, y: 1}\n    velocity: {x: 2, y: 0}\n  - id: still\n    mass: 1\n    position: {x: 0, y: 0}\nforces:\n  - kind: gravity\n    g: {x: 0, y: -10}\n    targets: [a]\n",
        );
        let state = Stepper::default().initial_state(&w);
        let view = RenderView {
            vector_scale: 0.5,
            ..RenderView::default()
        };
        let arrows = arrows(&state, &view);
        assert_eq!(arrows.len(), 2);
        assert_eq!(arrows[0].kind, ArrowKind::Velocity);
        assert_eq!(arrows[0].to, Vector2::new(2.0, 1.0));
        assert_eq!(arrows[1].kind, ArrowKind::Acceleration);
        assert_eq!(arrows[1].to, Vector2::new(1.0, -4.0));
        assert!(arrows.iter().all(|a| a.body.as_str() == "a"));
    }

    #[test]
    fn grid_covers_bounds() {
        let w = world(
            "bounds:\n  min: {x: -2, y: 0}\n  max: {x: 2, y: 1.5}\n  policy: clamp\nbodies:\n  - id: a\n    mass: 1\n    position: {x: 0, y: 0}\n",
        );
        let lines = grid(&w, &RenderView::default());
        let vertical: Vec<_> = lines.iter().filter(|s| s.from.x == s.to.x).map(|s| s.from.x).collect();
        let horizontal: Vec<_> = lines.iter().filter(|s| s.from.y == s.to.y).map(|s| s.from.y).collect();
        assert_eq!(vertical, [-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(horizontal, [0.0, 1.0]);
        assert!(lines.iter().all(|s| s.from.x >= -2.0 && s.to.x <= 2.0));
    }

    #[test]
    fn unbounded_world_uses_view_extent() {
        let w = world("bodies:\n  - id: a\n    mass: 1\n    position: {x: 0, y: 0}\n");
        let view = RenderView {
            center: Vector2::new(10.0, 0.0),
            extent: Vector2::new(4.0, 2.0),
            grid_spacing: 2.0,
            ..RenderView::default()
        };
        let lines = grid(&w, &view);
        assert_eq!(lines.len(), 3 + 1);
        assert_eq!(lines[0].from, Vector2::new(8.0, -1.0));
    }

    #[test]
    fn dense_grids_are_thinned() {
        let w = world("bodies:\n  - id: a\n    mass: 1\n    position: {x: 0, y: 0}\n");
        let view = RenderView {
            extent: Vector2::new(1000.0, 1000.0),
            grid_spacing: 0.01,
            ..RenderView::default()
        };
        let lines = grid(&w, &view);
        assert!(!lines.is_empty());
        assert!(lines.len() <= 2 * MAX_LINES_PER_AXIS);
        let bad = RenderView {
            grid_spacing: 0.0,
            ..RenderView::default()
        };
        assert!(grid(&w, &bad).is_empty());
    }

    #[test]
    fn huge_bounds_stay_within_line_budget() {
        let w = world(
            "bounds:\n  min: {x: -1e300, y: -1e300}\n  max: {x: 1e300, y: 1e300}\n  policy: wrap\nbodies:\n  - id: a\n    mass: 1\n    position: {x: 0, y: 0}\n",
        );
        let lines = grid(&w, &RenderView::default());
        assert!(!lines.is_empty());
        assert!(lines.len() <= 2 * MAX_LINES_PER_AXIS);
        assert!(lines.iter().all(|s| s.from.x.is_finite() && s.from.y.is_finite()));
    }
}
