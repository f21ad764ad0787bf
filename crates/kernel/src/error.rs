use crate::config::ConfigError;
use physim_document::{NodePath, ParseError};
use physim_schema::ValidationReport;

/// A document that passed validation but describes an impossible world.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("unknown kind `{0}`")]
    UnknownKind(String),
    #[error("reference to unknown body `{0}`")]
    DanglingReference(String),
    #[error("invalid magnitude at {0}")]
    InvalidMagnitude(NodePath),
    #[error("duplicate body id `{0}`")]
    DuplicateBody(String),
    #[error("{path}: {reason}")]
    Malformed { path: NodePath, reason: String },
}

impl BuildError {
    pub(crate) fn malformed(path: &NodePath, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}

/// Precondition failures of a single step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("timestep must be positive and finite, got {0}")]
    InvalidTimestep(f64),
    #[error("state does not match world: body `{0}`")]
    UnknownBody(String),
}

/// Failure anywhere in the parse → validate → build pipeline.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot open scenario: {0}")]
    Parse(#[from] ParseError),
    #[error("scenario does not match its schema:\n{0}")]
    Invalid(ValidationReport),
    #[error("scenario is not physically valid: {0}")]
    Build(#[from] BuildError),
}
