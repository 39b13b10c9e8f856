//! Configuration types for dataset generation.
//!
//! A dataset configuration is a single TOML file combining the forward
//! settings consumed by `fw25d-core` with the dataset budget and, optionally,
//! sampler and driver tuning:
//!
//! ```toml
//! [forward]
//! geometry_urf = "geometry.toml"
//! array_type = "Wenner"
//! nx = 64
//! nz = 20
//! Para_pkl = "cache/para.bin"
//! num_k_g = 4
//!
//! [dataset]
//! dataset_dir = "data"
//! num_samples = 1000
//! train_ratio = 0.8
//! valid_ratio = 0.1
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use fw25d_core::io::{read_text, rebase_path, ForwardConfig};

use crate::output::OutputFormat;
use crate::partition::PartitionSizes;

/// Configuration printed by `fw25d example`.
pub const EXAMPLE_CONFIG: &str = r#"[forward]
geometry_urf = "geometry.toml"
array_type = "Wenner"          # all_combination | Wenner | Wenner_Schlumberger | Wenner_Schlumberger_NonInt
nx = 64
nz = 20
Para_pkl = "cache/para.bin"
num_k_g = 4

[dataset]
dataset_dir = "data"
num_samples = 1000
train_ratio = 0.8
valid_ratio = 0.1

[sampler]
sigma_min = 0.001
sigma_max = 1.0
seed = 42

[driver]
threads = 8
verbose = false
dry_run = false
format = "bincode"             # bincode | json
"#;

// ============================================================================
// Sections
// ============================================================================

/// Sample budget and output location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSection {
    /// Root directory; partitions are written to `train/`, `valid/`, `test/`.
    pub dataset_dir: PathBuf,
    pub num_samples: usize,
    pub train_ratio: f64,
    pub valid_ratio: f64,
}

/// Log-uniform conductivity sampler bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SamplerConfig {
    #[serde(default = "default_sigma_min")]
    pub sigma_min: f64,
    #[serde(default = "default_sigma_max")]
    pub sigma_max: f64,
    /// Fixed seed for reproducible datasets; drawn from the OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_sigma_min() -> f64 {
    1e-3
}

fn default_sigma_max() -> f64 {
    1.0
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sigma_min: default_sigma_min(),
            sigma_max: default_sigma_max(),
            seed: None,
        }
    }
}

/// Execution settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverSettings {
    /// Worker threads (default: logical CPU count).
    #[serde(default)]
    pub threads: Option<usize>,

    /// Debug logging.
    #[serde(default)]
    pub verbose: bool,

    /// Resolve and report without writing anything.
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub format: OutputFormat,
}

// ============================================================================
// Dataset Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub forward: ForwardConfig,
    pub dataset: DatasetSection,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub driver: DriverSettings,
}

impl DatasetConfig {
    /// Load, rebase relative paths onto the file's directory, and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = read_text(path)?;
        let mut config = Self::parse(&content)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate; paths are left as written.
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(s)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn rebase(&mut self, base: &Path) {
        self.forward.rebase(base);
        rebase_path(&mut self.dataset.dataset_dir, base);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.forward.validate()?;

        let ds = &self.dataset;
        if ds.dataset_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("dataset_dir must not be empty".into()));
        }
        for (name, ratio) in [("train_ratio", ds.train_ratio), ("valid_ratio", ds.valid_ratio)] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ConfigError::InvalidRatio(format!(
                    "{name} must lie in [0, 1], got {ratio}"
                )));
            }
        }
        if ds.train_ratio + ds.valid_ratio > 1.0 + 1e-12 {
            return Err(ConfigError::InvalidRatio(format!(
                "train_ratio + valid_ratio = {} exceeds 1",
                ds.train_ratio + ds.valid_ratio
            )));
        }

        let s = &self.sampler;
        if !(s.sigma_min.is_finite() && s.sigma_min > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sigma_min must be finite and positive, got {}",
                s.sigma_min
            )));
        }
        if !(s.sigma_max.is_finite() && s.sigma_max >= s.sigma_min) {
            return Err(ConfigError::Invalid(format!(
                "sigma_max must be finite and >= sigma_min, got {}",
                s.sigma_max
            )));
        }

        if self.driver.threads == Some(0) {
            return Err(ConfigError::Invalid("threads must be positive".into()));
        }
        Ok(())
    }

    /// Configured thread count, defaulting to the number of logical CPUs.
    pub fn effective_threads(&self) -> usize {
        self.driver.threads.unwrap_or_else(num_cpus::get)
    }

    pub fn partition_sizes(&self) -> PartitionSizes {
        PartitionSizes::split(
            self.dataset.num_samples,
            self.dataset.train_ratio,
            self.dataset.valid_ratio,
        )
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Forward(#[from] fw25d_core::ConfigError),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid partition ratio: {0}")]
    InvalidRatio(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Tests
// ============================================================================
