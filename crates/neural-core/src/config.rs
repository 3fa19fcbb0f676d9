//! Configuration types for compilation, sampling and the runner.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JitConfig {
    /// Fold constants and elide zero-valued statements
    pub optimize: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self { optimize: true }
    }
}

/// Shape of randomly sampled genotypes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Number of sensor body nodes
    pub num_sensors: usize,
    /// Number of effector body nodes
    pub num_effectors: usize,
    /// Number of hidden computing nodes
    pub num_hidden: usize,
    /// Number of links to draw
    pub num_links: usize,
    /// Probability that a drawn link is disabled (0.0 to 1.0)
    pub disabled_rate: f64,
    /// Allow links that point backwards and close cycles
    pub allow_recurrent: bool,
    /// Weights are drawn uniformly from [-weight_range, weight_range]
    pub weight_range: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            num_sensors: 7,
            num_effectors: 2,
            num_hidden: 12,
            num_links: 40,
            disabled_rate: 0.1,
            allow_recurrent: true,
            weight_range: 2.0,
        }
    }
}

impl SampleConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.disabled_rate) {
            return Err(Error::InvalidConfig(format!(
                "disabled_rate must be within [0, 1], got {}",
                self.disabled_rate
            )));
        }
        if !(self.weight_range.is_finite() && self.weight_range > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "weight_range must be positive, got {}",
                self.weight_range
            )));
        }
        if self.num_effectors == 0 {
            return Err(Error::InvalidConfig(
                "at least one effector is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub jit: JitConfig,
    pub sample: SampleConfig,
    /// Placeholder value fed to every sensor
    pub input_value: f64,
    /// Maximum tolerated deviation from the reference network
    pub tolerance: f64,
    /// Number of `exec` calls per evaluator in bench mode
    pub ticks: u64,
    /// Population size in bench mode
    pub population: usize,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            jit: JitConfig::default(),
            sample: SampleConfig::default(),
            input_value: 0.5,
            tolerance: 1e-9,
            ticks: 1_000,
            population: 256,
            seed: 0,
        }
    }
}

impl RunnerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.sample.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        assert!(JitConfig::default().optimize);

        let sample = SampleConfig::default();
        assert_eq!(sample.num_sensors, 7);
        assert!(sample.validate().is_ok());

        let runner = RunnerConfig::default();
        assert_eq!(runner.input_value, 0.5);
        assert_eq!(runner.population, 256);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RunnerConfig =
            serde_json::from_str(r#"{"jit": {"optimize": false}, "ticks": 10}"#).unwrap();
        assert!(!config.jit.optimize);
        assert_eq!(config.ticks, 10);
        assert_eq!(config.sample.num_hidden, 12);
    }

    #[test]
    fn test_sample_validation() {
        let config = SampleConfig {
            disabled_rate: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = SampleConfig {
            num_effectors: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
