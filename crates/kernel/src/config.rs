use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors from loading or checking engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Stepper tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepConfig {
    /// A `dt` above this is accepted but logged; the stepper never subdivides.
    pub stability_ceiling: f64,
    /// Floor applied to distances used as divisors.
    pub min_distance: f64,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            stability_ceiling: 0.0333,
            min_distance: 1e-9,
        }
    }
}

/// Fixed-tick driving of a [`crate::Session`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub tick_rate_hz: f64,
    /// Snapshots retained for trail rendering.
    pub history_len: usize,
    /// Most fixed steps a single `advance` call may take.
    pub max_substeps: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            history_len: 120,
            max_substeps: 8,
        }
    }
}

impl SessionConfig {
    /// Length of one fixed tick in seconds.
    pub fn fixed_dt(&self) -> f64 {
        1.0 / self.tick_rate_hz
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub stepper: StepConfig,
    pub session: SessionConfig,
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be positive and finite, got {value}"),
        })
    }
}

impl EngineConfig {
    /// Parse and validate YAML text. Missing fields take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("stepper.stability_ceiling", self.stepper.stability_ceiling)?;
        positive("stepper.min_distance", self.stepper.min_distance)?;
        positive("session.tick_rate_hz", self.session.tick_rate_hz)?;
        if self.session.history_len == 0 {
            return Err(ConfigError::Invalid {
                field: "session.history_len",
                reason: "must be at least 1".into(),
            });
        }
        if self.session.max_substeps == 0 {
            return Err(ConfigError::Invalid {
                field: "session.max_substeps",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.stepper.stability_ceiling, 0.0333);
        assert_eq!(config.session.tick_rate_hz, 60.0);
        assert_eq!(config.session.history_len, 120);
        assert_eq!(config.session.max_substeps, 8);
        assert!((config.session.fixed_dt() - 1.0 / 60.0).abs() < 1e-15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str("session:\n  tick_rate_hz: 120\n").unwrap();
        assert_eq!(config.session.tick_rate_hz, 120.0);
        assert_eq!(config.session.history_len, 120);
        assert_eq!(config.stepper, StepConfig::default());
    }

    #[test]
    fn rejects_unknown_and_invalid_fields() {
        assert!(matches!(
            EngineConfig::from_yaml_str("stepper:\n  ceiling: 1\n"),
            Err(ConfigError::Yaml(_))
        ));
        let err = EngineConfig::from_yaml_str("session:\n  tick_rate_hz: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "session.tick_rate_hz", .. }));
        assert!(EngineConfig::from_yaml_str("stepper:\n  min_distance: -1\n").is_err());
        assert!(EngineConfig::from_yaml_str("session:\n  max_substeps: 0\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "stepper:\n  stability_ceiling: 0.1").unwrap();
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.stepper.stability_ceiling, 0.1);

        let missing = EngineConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
