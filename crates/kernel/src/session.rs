use crate::builder::build;
use crate::config::{EngineConfig, SessionConfig};
use crate::error::{BuildError, LoadError, StepError};
use crate::state::SimulationState;
use crate::stepper::Stepper;
use crate::world::PhysicsWorld;
use physim_document::{GenericNode, parse};
use physim_schema::{SchemaDocument, validate};
use std::collections::VecDeque;

/// One loaded scenario, driven tick by tick.
///
/// Owns the validated tree retained from load time, the world built from
/// it, and the current snapshot. Reset rebuilds from the retained tree.
#[derive(Debug, Clone)]
pub struct Session {
    tree: GenericNode,
    world: PhysicsWorld,
    stepper: Stepper,
    config: SessionConfig,
    state: SimulationState,
    history: VecDeque<SimulationState>,
    accumulator: f64,
}

impl Session {
    /// Parse, validate and build a scenario.
    pub fn load(text: &str, schema: &SchemaDocument, config: EngineConfig) -> Result<Self, LoadError> {
        let _span = tracing::info_span!("load_scenario").entered();
        config.validate()?;
        let tree = parse(text)?;
        let report = validate(&tree, schema);
        if !report.is_valid() {
            tracing::debug!(violations = report.len(), "scenario rejected by schema");
            return Err(LoadError::Invalid(report));
        }
        let world = build(&tree)?;
        let stepper = Stepper::new(config.stepper);
        let state = stepper.initial_state(&world);
        tracing::info!(
            name = world.name().unwrap_or("(unnamed)"),
            bodies = world.body_count(),
            forces = world.forces().len(),
            "scenario loaded"
        );
        Ok(Self {
            tree,
            world,
            stepper,
            config: config.session,
            state,
            history: VecDeque::with_capacity(config.session.history_len),
            accumulator: 0.0,
        })
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// The current snapshot.
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Prior snapshots, oldest first. Never longer than `history_len`.
    pub fn history(&self) -> impl Iterator<Item = &SimulationState> {
        self.history.iter()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Exactly one fixed step of `1 / tick_rate_hz`.
    pub fn tick(&mut self) -> Result<&SimulationState, StepError> {
        self.step_by(self.config.fixed_dt())
    }

    /// One step of an arbitrary `dt`.
    pub fn step_by(&mut self, dt: f64) -> Result<&SimulationState, StepError> {
        let next = self.stepper.step(&self.world, &self.state, dt)?;
        let previous = std::mem::replace(&mut self.state, next);
        while self.history.len() >= self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(previous);
        Ok(&self.state)
    }

    /// Accumulate wall time and take whole fixed steps, at most
    /// `max_substeps` per call. Returns the number of steps taken.
    pub fn advance(&mut self, elapsed: f64) -> Result<u32, StepError> {
        if !(elapsed.is_finite() && elapsed >= 0.0) {
            return Err(StepError::InvalidTimestep(elapsed));
        }
        let dt = self.config.fixed_dt();
        self.accumulator += elapsed;
        let mut steps = 0;
        while self.accumulator >= dt && steps < self.config.max_substeps {
            self.step_by(dt)?;
            self.accumulator -= dt;
            steps += 1;
        }
        if self.accumulator >= dt {
            tracing::debug!(dropped = self.accumulator, "substep cap reached, discarding backlog");
            self.accumulator = 0.0;
        }
        Ok(steps)
    }

    /// Rebuild world and initial state from the retained tree.
    pub fn reset(&mut self) -> Result<(), BuildError> {
        self.world = build(&self.tree)?;
        self.state = self.stepper.initial_state(&self.world);
        self.history.clear();
        self.accumulator = 0.0;
        tracing::debug!("session reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    const FALLING: &str = "\
name: drop
bodies:
  - id: ball
    mass: 1
    position: {x: 0, y: 10}
forces:
  - kind: gravity
    g: {x: 0, y: -9.81}
";

    fn session(config: EngineConfig) -> Session {
        Session::load(FALLING, &SchemaDocument::scenario().unwrap(), config).unwrap()
    }

    #[test]
    fn load_produces_initial_state() {
        let s = session(EngineConfig::default());
        assert_eq!(s.state().tick(), 0);
        assert_eq!(s.state().time(), 0.0);
        let ball = s.state().body("ball").unwrap();
        assert_eq!(ball.position.y, 10.0);
        assert!((ball.acceleration.y + 9.81).abs() < 1e-12);
        assert_eq!(s.history().count(), 0);
    }

    #[test]
    fn load_surfaces_each_stage_error() {
        let schema = SchemaDocument::scenario().unwrap();
        let config = EngineConfig::default();
        assert!(matches!(
            Session::load("bodies:\n\t- x\n", &schema, config),
            Err(LoadError::Parse(_))
        ));
        match Session::load("bodies:\n  - id: a\n", &schema, config) {
            Err(LoadError::Invalid(report)) => assert_eq!(report.len(), 2),
            other => panic!("expected schema violations, got {other:?}"),
        }
        assert!(matches!(
            Session::load("bodies:\n  - id: a\n    mass: -1\n    position: {x: 0, y: 0}\n", &schema, config),
            Err(LoadError::Build(BuildError::InvalidMagnitude(_)))
        ));
    }

    #[test]
    fn load_rejects_invalid_config() {
        let schema = SchemaDocument::scenario().unwrap();
        let mut config = EngineConfig::default();
        config.session.history_len = 0;
        assert!(matches!(
            Session::load(FALLING, &schema, config),
            Err(LoadError::Config(ConfigError::Invalid { field: "session.history_len", .. }))
        ));
        let mut config = EngineConfig::default();
        config.session.tick_rate_hz = f64::NAN;
        assert!(matches!(Session::load(FALLING, &schema, config), Err(LoadError::Config(_))));
    }

    #[test]
    fn tick_advances_one_fixed_step() {
        let mut s = session(EngineConfig::default());
        let state = s.tick().unwrap();
        assert_eq!(state.tick(), 1);
        assert!((state.time() - 1.0 / 60.0).abs() < 1e-15);
        assert_eq!(s.history().count(), 1);
    }

    #[test]
    fn history_is_bounded() {
        let mut config = EngineConfig::default();
        config.session.history_len = 5;
        let mut s = session(config);
        for _ in 0..12 {
            s.tick().unwrap();
        }
        let ticks: Vec<_> = s.history().map(SimulationState::tick).collect();
        assert_eq!(ticks, [7, 8, 9, 10, 11]);
        assert_eq!(s.state().tick(), 12);
    }

    #[test]
    fn advance_accumulates_partial_ticks() {
        let mut s = session(EngineConfig::default());
        let dt = 1.0 / 60.0;
        assert_eq!(s.advance(dt * 0.6).unwrap(), 0);
        assert_eq!(s.advance(dt * 0.6).unwrap(), 1);
        assert_eq!(s.advance(dt * 2.0).unwrap(), 2);
        assert_eq!(s.state().tick(), 3);
        assert_eq!(s.advance(0.0).unwrap(), 0);
        assert!(s.advance(-1.0).is_err());
    }

    #[test]
    fn advance_caps_substeps_and_drops_backlog() {
        let mut s = session(EngineConfig::default());
        assert_eq!(s.advance(1.0).unwrap(), 8);
        assert_eq!(s.state().tick(), 8);
        assert_eq!(s.advance(0.0).unwrap(), 0);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut s = session(EngineConfig::default());
        let initial = s.state().clone();
        for _ in 0..30 {
            s.tick().unwrap();
        }
        s.advance(0.01).unwrap();
        assert_ne!(s.state(), &initial);
        s.reset().unwrap();
        assert_eq!(s.state(), &initial);
        assert_eq!(s.history().count(), 0);
        assert_eq!(s.advance(1.0 / 120.0).unwrap(), 0);
    }

    #[test]
    fn step_by_rejects_bad_dt_without_side_effects() {
        let mut s = session(EngineConfig::default());
        let before = s.state().clone();
        assert!(matches!(s.step_by(0.0), Err(StepError::InvalidTimestep(_))));
        assert_eq!(s.state(), &before);
        assert_eq!(s.history().count(), 0);
    }
}
