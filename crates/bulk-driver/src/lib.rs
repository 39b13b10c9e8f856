//! fw25d Bulk Driver - multi-threaded synthetic dataset generation.
//!
//! Draws conductivity models from a [`ModelSampler`], simulates each one with
//! a shared forward operator, and writes `{inputs, targets}` records into
//! numbered files under `train/`, `valid/` and `test/`.
//!
//! - **Configuration**: one TOML file with `[forward]`, `[dataset]` and
//!   optional `[sampler]` / `[driver]` sections
//! - **Partitioning**: floor-based split of the sample budget
//! - **Path allocation**: next free record number per partition directory
//! - **Parallel execution**: fixed rayon pool, one task per sample, failures
//!   collected without aborting the run

pub mod config;
pub mod driver;
pub mod output;
pub mod partition;
pub mod paths;
pub mod sampler;

pub use config::{ConfigError, DatasetConfig, DriverSettings, SamplerConfig, EXAMPLE_CONFIG};
pub use driver::{
    DatasetDriver, DatasetStats, DriverError, DryRunStats, PartitionStats, TaskError, TaskFailure,
};
pub use output::{read_record, write_record, OutputError, OutputFormat, SampleRecord};
pub use partition::{Partition, PartitionSizes};
pub use paths::{next_free_index, next_free_index_by, NumberedPattern};
pub use sampler::{LogUniformSampler, ModelSampler};
