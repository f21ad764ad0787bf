use crate::state::{BodyState, SimulationState};
use physim_common::{BodyId, Rect, Vector2};
use serde::{Deserialize, Serialize};

/// How a body moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    /// Integrated every step.
    #[default]
    Particle,
    /// Pinned at its initial position; forces on it are ignored.
    Fixed,
}

/// A point mass and its initial conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub id: BodyId,
    pub kind: BodyKind,
    /// Always > 0.
    pub mass: f64,
    pub position: Vector2,
    pub velocity: Vector2,
}

/// What happens when a body leaves the bounds rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Hold at the wall and zero the outward velocity component.
    Clamp,
    /// Re-enter from the opposite side.
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub rect: Rect,
    pub policy: BoundaryPolicy,
}

/// Bodies a field force acts on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Targets {
    #[default]
    All,
    Only(Vec<BodyId>),
}

impl Targets {
    pub fn includes(&self, id: &BodyId) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(id),
        }
    }
}

/// A force definition. Evaluation lives in [`crate::forces`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Force {
    /// Uniform field: `m·g`.
    Gravity { g: Vector2, targets: Targets },
    /// Linear drag: `-c·v`.
    Drag { coefficient: f64, targets: Targets },
    /// Hooke spring between a fixed anchor and one body.
    Spring {
        anchor: Vector2,
        body: BodyId,
        stiffness: f64,
        rest_length: f64,
    },
}

impl Force {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Gravity { .. } => "gravity",
            Self::Drag { .. } => "drag",
            Self::Spring { .. } => "spring",
        }
    }

    /// Whether this force acts on body `id`.
    pub fn applies_to(&self, id: &BodyId) -> bool {
        match self {
            Self::Gravity { targets, .. } | Self::Drag { targets, .. } => targets.includes(id),
            Self::Spring { body, .. } => body == id,
        }
    }
}

/// The typed, validated configuration of one scenario.
///
/// Static after construction: stepping reads it and never writes it. Bodies
/// and forces keep document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsWorld {
    name: Option<String>,
    time_scale: f64,
    bounds: Option<Bounds>,
    bodies: Vec<Body>,
    forces: Vec<Force>,
}

impl PhysicsWorld {
    pub(crate) fn new(
        name: Option<String>,
        time_scale: f64,
        bounds: Option<Bounds>,
        bodies: Vec<Body>,
        forces: Vec<Force>,
    ) -> Self {
        Self {
            name,
            time_scale,
            bounds,
            bodies,
            forces,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Multiplier from caller `dt` to simulated time. Always > 0.
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn forces(&self) -> &[Force] {
        &self.forces
    }

    pub fn body(&self, id: &str) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id.as_str() == id)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Sum of `½·m·|v|²` over moving bodies.
    pub fn kinetic_energy(&self, state: &SimulationState) -> f64 {
        self.particles(state)
            .map(|(body, s)| 0.5 * body.mass * s.velocity.length_squared())
            .sum()
    }

    /// Gravity and spring potential. Drag is dissipative and has none.
    pub fn potential_energy(&self, state: &SimulationState) -> f64 {
        let mut total = 0.0;
        for (body, s) in self.particles(state) {
            for force in self.forces.iter().filter(|f| f.applies_to(&body.id)) {
                total += match force {
                    Force::Gravity { g, .. } => -body.mass * g.dot(s.position),
                    Force::Drag { .. } => 0.0,
                    Force::Spring {
                        anchor,
                        stiffness,
                        rest_length,
                        ..
                    } => {
                        let stretch = (s.position - *anchor).length() - rest_length;
                        0.5 * stiffness * stretch * stretch
                    }
                };
            }
        }
        total
    }

    pub fn total_energy(&self, state: &SimulationState) -> f64 {
        self.kinetic_energy(state) + self.potential_energy(state)
    }

    fn particles<'a>(
        &'a self,
        state: &'a SimulationState,
    ) -> impl Iterator<Item = (&'a Body, &'a BodyState)> {
        self.bodies
            .iter()
            .filter(|b| b.kind == BodyKind::Particle)
            .filter_map(move |b| state.body(b.id.as_str()).map(|s| (b, s)))
    }
}
