//! Configuration for the scan matcher.

use thiserror::Error;
use tracing::{debug, error};

use crate::optimizer::{LevenbergMarquardtConfig, OptimizerError};

/// Matcher configuration errors, raised by [`ScanMatcherConfig::validate`].
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A cost weight is negative, NaN or infinite
    #[error("Invalid weight '{name}': {value} (must be finite and non-negative)")]
    InvalidWeight { name: &'static str, value: f64 },

    /// The solver settings are inconsistent
    #[error("Invalid solver configuration")]
    Solver(#[from] OptimizerError),
}

impl ConfigError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Weights of the three residual blocks plus the solver settings.
///
/// Weights are fixed at construction of the [`ScanMatcher`](super::ScanMatcher).
/// A weight of 0 disables the corresponding term.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ScanMatcherConfig {
    /// Weight of the occupied-space term, spread over the scan as `w / √N`.
    /// Default: 1.0
    pub occupied_space_weight: f64,

    /// Weight of the translation prior toward the previous pose.
    /// Default: 10.0
    pub translation_weight: f64,

    /// Weight of the heading prior toward the initial estimate.
    /// Default: 40.0
    pub rotation_weight: f64,

    /// Levenberg-Marquardt settings.
    pub solver: LevenbergMarquardtConfig,
}

impl Default for ScanMatcherConfig {
    fn default() -> Self {
        Self {
            occupied_space_weight: 1.0,
            translation_weight: 10.0,
            rotation_weight: 40.0,
            solver: LevenbergMarquardtConfig::default(),
        }
    }
}

impl ScanMatcherConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for the occupied-space weight.
    pub fn with_occupied_space_weight(mut self, weight: f64) -> Self {
        self.occupied_space_weight = weight;
        self
    }

    /// Builder-style setter for the translation prior weight.
    pub fn with_translation_weight(mut self, weight: f64) -> Self {
        self.translation_weight = weight;
        self
    }

    /// Builder-style setter for the rotation prior weight.
    pub fn with_rotation_weight(mut self, weight: f64) -> Self {
        self.rotation_weight = weight;
        self
    }

    /// Builder-style setter for the solver settings.
    pub fn with_solver(mut self, solver: LevenbergMarquardtConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Builder-style setter for the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.solver.max_iterations = max_iterations;
        self
    }

    /// Reject negative or non-finite weights and invalid solver settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("occupied_space_weight", self.occupied_space_weight),
            ("translation_weight", self.translation_weight),
            ("rotation_weight", self.rotation_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        self.solver.validate()?;
        Ok(())
    }

    /// Print configuration parameters (debug level)
    pub fn print_configuration(&self) {
        debug!(
            "Scan matcher weights:\n  Occupied space: {:.3}\n  Translation:    {:.3}\n  Rotation:       {:.3}",
            self.occupied_space_weight, self.translation_weight, self.rotation_weight
        );
        self.solver.print_configuration();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScanMatcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.solver.max_iterations, 20);
        assert_eq!(config.translation_weight, 10.0);
    }

    #[test]
    fn test_zero_weights_are_valid() {
        let config = ScanMatcherConfig::new()
            .with_occupied_space_weight(0.0)
            .with_translation_weight(0.0)
            .with_rotation_weight(0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let cases = [
            (ScanMatcherConfig::new().with_occupied_space_weight(-1.0), "occupied_space_weight"),
            (ScanMatcherConfig::new().with_translation_weight(f64::NAN), "translation_weight"),
            (ScanMatcherConfig::new().with_rotation_weight(f64::INFINITY), "rotation_weight"),
        ];
        for (config, expected) in cases {
            match config.validate() {
                Err(ConfigError::InvalidWeight { name, .. }) => assert_eq!(name, expected),
                other => panic!("expected InvalidWeight for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_solver_settings_rejected() {
        let config = ScanMatcherConfig::new().with_max_iterations(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Solver(OptimizerError::InvalidParameters(_)))
        ));
    }
}
