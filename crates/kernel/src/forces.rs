//! Force evaluation.
//!
//! Every force is evaluated per body, reading only the shared force
//! definitions and that body's own position and velocity. Accumulation for
//! one body never touches another body's slot.

use crate::world::{Body, BodyKind, Force, PhysicsWorld};
use physim_common::Vector2;

impl Force {
    /// Contribution of this force to `body` at the given kinematic state.
    /// Zero when the force does not target the body.
    pub fn evaluate(&self, body: &Body, position: Vector2, velocity: Vector2, min_distance: f64) -> Vector2 {
        if !self.applies_to(&body.id) {
            return Vector2::ZERO;
        }
        match self {
            Force::Gravity { g, .. } => *g * body.mass,
            Force::Drag { coefficient, .. } => -*coefficient * velocity,
            Force::Spring {
                anchor,
                stiffness,
                rest_length,
                ..
            } => {
                let d = position - *anchor;
                let distance = d.length().max(min_distance);
                -*stiffness * (distance - rest_length) * (d / distance)
            }
        }
    }
}

/// Vector sum of every force acting on `body`.
pub fn net_force(
    world: &PhysicsWorld,
    body: &Body,
    position: Vector2,
    velocity: Vector2,
    min_distance: f64,
) -> Vector2 {
    world
        .forces()
        .iter()
        .map(|f| f.evaluate(body, position, velocity, min_distance))
        .fold(Vector2::ZERO, |acc, f| acc + f)
}

/// Acceleration of `body`, with non-finite results replaced by zero.
/// Fixed bodies never accelerate.
pub fn acceleration(
    world: &PhysicsWorld,
    body: &Body,
    position: Vector2,
    velocity: Vector2,
    min_distance: f64,
) -> Vector2 {
    if body.kind == BodyKind::Fixed {
        return Vector2::ZERO;
    }
    let a = net_force(world, body, position, velocity, min_distance) / body.mass;
    if a.is_finite() {
        a
    } else {
        tracing::warn!(body = %body.id, "non-finite acceleration suppressed");
        Vector2::ZERO
    }
}
