//! Physics kernel: typed world model, world builder, simulation stepping and
//! scenario sessions.
//!
//! # Invariants
//! - A [`PhysicsWorld`] is built only from a tree with an empty validation
//!   report, and is never mutated by stepping.
//! - Every force that names a body names one that exists; body ids are unique.
//! - Each step reads one [`SimulationState`] and produces a new one; snapshots
//!   are never modified after creation.
//! - Stepping is deterministic: same world, state and `dt` give a bit-identical
//!   result.

mod builder;
mod config;
mod error;
pub mod forces;
mod session;
mod state;
mod stepper;
mod world;

pub use builder::build;
pub use config::{ConfigError, EngineConfig, SessionConfig, StepConfig};
pub use error::{BuildError, LoadError, StepError};
pub use session::Session;
pub use state::{BodyState, SimulationState};
pub use stepper::{Stepper, step};
pub use world::{Body, BodyKind, BoundaryPolicy, Bounds, Force, PhysicsWorld, Targets};

pub fn crate_info() -> &'static str {
    concat!("physim-kernel v", env!("CARGO_PKG_VERSION"))
}
