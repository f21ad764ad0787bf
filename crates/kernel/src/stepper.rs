use crate::config::StepConfig;
use crate::error::StepError;
use crate::forces;
use crate::state::{BodyState, SimulationState};
use crate::world::{Body, BodyKind, BoundaryPolicy, Bounds, PhysicsWorld};
use physim_common::{BodyId, Vector2};
use std::collections::BTreeMap;

/// Advances a [`PhysicsWorld`] with semi-implicit (symplectic) Euler.
///
/// Velocity is updated from the acceleration first, then position from the
/// new velocity. The stepper holds only tuning; the world is never written.
#[derive(Debug, Clone, Default)]
pub struct Stepper {
    config: StepConfig,
}

impl Stepper {
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Tick-0 snapshot: initial conditions plus instantaneous accelerations.
    pub fn initial_state(&self, world: &PhysicsWorld) -> SimulationState {
        let bodies = world
            .bodies()
            .iter()
            .map(|body| {
                let velocity = match body.kind {
                    BodyKind::Particle => body.velocity,
                    BodyKind::Fixed => Vector2::ZERO,
                };
                let state = self.resolve(world, body, body.position, velocity);
                (body.id.clone(), state)
            })
            .collect();
        SimulationState::new(0.0, 0, bodies)
    }

    /// Produce the state `dt · timeScale` seconds after `current`.
    pub fn step(
        &self,
        world: &PhysicsWorld,
        current: &SimulationState,
        dt: f64,
    ) -> Result<SimulationState, StepError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(StepError::InvalidTimestep(dt));
        }
        if dt > self.config.stability_ceiling {
            tracing::warn!(dt, ceiling = self.config.stability_ceiling, "timestep above stability ceiling");
        }
        if let Some(stray) = current.bodies().keys().find(|id| world.body(id.as_str()).is_none()) {
            return Err(StepError::UnknownBody(stray.to_string()));
        }
        let _span = tracing::trace_span!("step", tick = current.tick()).entered();
        let h = dt * world.time_scale();

        // Integrate every body against the current snapshot before any
        // accelerations are computed for the next one.
        let mut moved: Vec<(&Body, Vector2, Vector2)> = Vec::with_capacity(world.body_count());
        for body in world.bodies() {
            let now = current
                .body(body.id.as_str())
                .ok_or_else(|| StepError::UnknownBody(body.id.to_string()))?;
            if body.kind == BodyKind::Fixed {
                moved.push((body, now.position, Vector2::ZERO));
                continue;
            }
            let a = forces::acceleration(world, body, now.position, now.velocity, self.config.min_distance);
            let mut velocity = now.velocity + a * h;
            let mut position = now.position + velocity * h;
            if let Some(bounds) = world.bounds() {
                apply_bounds(bounds, &mut position, &mut velocity);
            }
            moved.push((body, position, velocity));
        }

        let bodies: BTreeMap<BodyId, BodyState> = moved
            .into_iter()
            .map(|(body, position, velocity)| {
                (body.id.clone(), self.resolve(world, body, position, velocity))
            })
            .collect();
        let next = SimulationState::new(current.time() + h, current.tick() + 1, bodies);
        tracing::trace!(time = next.time(), "stepped");
        Ok(next)
    }

    fn resolve(&self, world: &PhysicsWorld, body: &Body, position: Vector2, velocity: Vector2) -> BodyState {
        BodyState {
            position,
            velocity,
            acceleration: forces::acceleration(world, body, position, velocity, self.config.min_distance),
        }
    }
}

/// Step with default tuning.
pub fn step(world: &PhysicsWorld, current: &SimulationState, dt: f64) -> Result<SimulationState, StepError> {
    Stepper::default().step(world, current, dt)
}

fn apply_bounds(bounds: &Bounds, position: &mut Vector2, velocity: &mut Vector2) {
    let (min, max) = (bounds.rect.min, bounds.rect.max);
    match bounds.policy {
        BoundaryPolicy::Clamp => {
            clamp_axis(&mut position.x, &mut velocity.x, min.x, max.x);
            clamp_axis(&mut position.y, &mut velocity.y, min.y, max.y);
        }
        BoundaryPolicy::Wrap => {
            position.x = wrap_axis(position.x, min.x, max.x);
            position.y = wrap_axis(position.y, min.y, max.y);
        }
    }
}

fn clamp_axis(x: &mut f64, v: &mut f64, min: f64, max: f64) {
    if *x < min {
        *x = min;
        *v = v.max(0.0);
    } else if *x > max {
        *x = max;
        *v = v.min(0.0);
    }
}

fn wrap_axis(x: f64, min: f64, max: f64) -> f64 {
    if (min..max).contains(&x) {
        return x;
    }
    let wrapped = min + (x - min).rem_euclid(max - min);
    // Rounding can land exactly on `max`.
    if wrapped < max { wrapped } else { min }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use physim_document::parse;

    const DT: f64 = 1.0 / 60.0;

    fn world(text: &str) -> PhysicsWorld {
        build(&parse(text).unwrap()).unwrap()
    }

    fn run(world: &PhysicsWorld, steps: usize, dt: f64) -> Vec<SimulationState> {
        let stepper = Stepper::default();
        let mut states = vec![stepper.initial_state(world)];
        for _ in 0..steps {
            let next = stepper.step(world, states.last().unwrap(), dt).unwrap();
            states.push(next);
        }
        states
    }

    #[test]
    fn free_body_moves_linearly() {
        let w = world("bodies:\n  - id: a\n    mass: 2\n    position: {x: 1, y: 2}\n    velocity: {x: 3, y: -1}\n");
        let states = run(&w, 250, 0.1);
        for (n, s) in states.iter().enumerate() {
            let b = s.body("a").unwrap();
            assert_eq!(b.velocity, Vector2::new(3.0, -1.0));
            assert_eq!(b.acceleration, Vector2::ZERO);
            let expected = Vector2::new(1.0, 2.0) + Vector2::new(3.0, -1.0) * (0.1 * n as f64);
            assert!((b.position - expected).length() < 1e-9, "step {n}: {:?}", b.position);
        }
        assert_eq!(states[250].tick(), 250);
        assert!((states[250].time() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_updates_before_position() {
        let w = world(
            "bodies:\n  - id: a\n    mass: 1\n    position: {x: 0, y: 0}\nforces:\n  - kind: gravity\n    g: {x: 0, y: -10}\n",
        );
        let next = step(&w, &Stepper::default().initial_state(&w), 0.01).unwrap();
        let b = next.body("a").unwrap();
        assert!((b.velocity.y + 0.1).abs() < 1e-12);
        // Explicit Euler would leave the position at zero after one step.
        assert!((b.position.y + 0.001).abs() < 1e-12);
    }

    #[test]
    fn spring_oscillation_stays_bounded() {
        let w = world(
            "\
bodies:
  - id: bob
    mass: 1
    position: {x: 1, y: 0}
forces:
  - kind: spring
    anchor: {x: 0, y: 0}
    bodyId: bob
    stiffness: 10
",
        );
        let states = run(&w, 1000, DT);
        let e0 = w.total_energy(&states[0]);
        let mut crossed = false;
        for s in &states {
            let x = s.body("bob").unwrap().position.x;
            assert!(x.is_finite() && x.abs() < 1.1, "amplitude grew to {x} at tick {}", s.tick());
            crossed |= x < -0.9;
            let e = w.total_energy(s);
            assert!((e - e0).abs() / e0 < 0.1, "energy drifted to {e} from {e0}");
        }
        assert!(crossed, "body never swung through the anchor");
    }

    #[test]
    fn clamp_holds_at_wall_and_zeroes_outward_velocity() {
        let w = world(
            "\
bounds:
  min: {x: -1, y: -1}
  max: {x: 1, y: 1}
  policy: clamp
bodies:
  - id: a
    mass: 1
    position: {x: 0.95, y: 0}
    velocity: {x: 6, y: 0.5}
",
        );
        let s = run(&w, 3, DT);
        let hit = s[1].body("a").unwrap();
        assert_eq!(hit.position.x, 1.0);
        assert_eq!(hit.velocity, Vector2::new(0.0, 0.5));
        let later = s[3].body("a").unwrap();
        assert_eq!(later.position.x, 1.0);
        assert!(later.position.y > hit.position.y);
    }

    #[test]
    fn clamp_keeps_inward_velocity() {
        let mut position = Vector2::new(-1.5, 0.0);
        let mut velocity = Vector2::new(2.0, 0.0);
        let bounds = Bounds {
            rect: physim_common::Rect::new(Vector2::splat(-1.0), Vector2::splat(1.0)),
            policy: BoundaryPolicy::Clamp,
        };
        apply_bounds(&bounds, &mut position, &mut velocity);
        assert_eq!(position.x, -1.0);
        assert_eq!(velocity.x, 2.0);
    }

    #[test]
    fn wrap_reenters_opposite_side() {
        let w = world(
            "\
bounds:
  min: {x: -1, y: -1}
  max: {x: 1, y: 1}
  policy: wrap
bodies:
  - id: a
    mass: 1
    position: {x: 0.95, y: 0}
    velocity: {x: 6, y: 0}
",
        );
        let s = run(&w, 1, DT);
        let b = s[1].body("a").unwrap();
        assert!((b.position.x + 0.95).abs() < 1e-9, "{:?}", b.position);
        assert_eq!(b.velocity.x, 6.0);
        assert_eq!(wrap_axis(-3.5, -1.0, 1.0), 0.5);
    }

    #[test]
    fn fixed_bodies_never_move() {
        let w = world(
            "\
bodies:
  - id: pin
    kind: fixed
    mass: 1
    position: {x: 2, y: 3}
    velocity: {x: 1, y: 1}
forces:
  - kind: gravity
    g: {x: 0, y: -9.81}
",
        );
        let states = run(&w, 30, DT);
        for s in &states {
            let b = s.body("pin").unwrap();
            assert_eq!(b.position, Vector2::new(2.0, 3.0));
            assert_eq!(b.velocity, Vector2::ZERO);
        }
    }

    #[test]
    fn time_scale_scales_simulated_time() {
        let w = world("timeScale: 0.5\nbodies:\n  - id: a\n    mass: 1\n    position: {x: 0, y: 0}\n    velocity: {x: 1, y: 0}\n");
        let states = run(&w, 10, 0.1);
        assert!((states[10].time() - 0.5).abs() < 1e-12);
        assert!((states[10].body("a").unwrap().position.x - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_positive_timestep() {
        let w = world("bodies:\n  - id: a\n    mass: 1\n    position: {x: 0, y: 0}\n");
        let before = w.clone();
        let s0 = Stepper::default().initial_state(&w);
        for dt in [0.0, -DT, f64::NAN, f64::INFINITY] {
            let err = step(&w, &s0, dt).unwrap_err();
            assert!(matches!(err, StepError::InvalidTimestep(_)));
        }
        assert_eq!(w, before);
    }

    #[test]
    fn large_timestep_is_accepted() {
        let w = world("bodies:\n  - id: a\n    mass: 1\n    position: {x: 0, y: 0}\n    velocity: {x: 1, y: 0}\n");
        let s0 = Stepper::default().initial_state(&w);
        let s1 = step(&w, &s0, 2.0).unwrap();
        assert_eq!(s1.tick(), 1);
        assert_eq!(s1.body("a").unwrap().position.x, 2.0);
    }

    #[test]
    fn rejects_state_from_another_world() {
        let a = world("bodies:\n  - id: a\n    mass: 1\n    position: {x: 0, y: 0}\n");
        let b = world("bodies:\n  - id: b\n    mass: 1\n    position: {x: 0, y: 0}\n");
        let foreign = Stepper::default().initial_state(&b);
        assert_eq!(step(&a, &foreign, DT), Err(StepError::UnknownBody("b".into())));
    }

    #[test]
    fn stepping_is_deterministic() {
        let text = "\
bodies:
  - id: a
    mass: 1
    position: {x: 1, y: 0}
  - id: b
    mass: 3
    position: {x: 0, y: 2}
    velocity: {x: 1, y: 0}
forces:
  - kind: gravity
    g: {x: 0, y: -9.81}
  - kind: drag
    coefficient: 0.3
  - kind: spring
    anchor: {x: 0, y: 0}
    bodyId: a
    stiffness: 5
    restLength: 0.5
";
        let first = run(&world(text), 200, DT);
        let second = run(&world(text), 200, DT);
        assert_eq!(first.last().unwrap().state_hash(), second.last().unwrap().state_hash());
        assert_eq!(first, second);
    }
}
