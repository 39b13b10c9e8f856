//! Multi-threaded dataset driver.
//!
//! Preparation (geometry resolution and operator cache) runs once, before any
//! work is dispatched. Each partition then fans out one task per sample on a
//! fixed rayon pool: validate the field, simulate, write the record. Outcomes
//! flow back over a channel and are collected once the pool has drained, so a
//! failing sample never stops its siblings.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use rayon::prelude::*;

use fw25d_core::geometry::{self, ArrayType};
use fw25d_core::{ForwardError, ForwardKernel, ForwardSimulator};

use crate::config::DatasetConfig;
use crate::output::{write_record, OutputError, OutputFormat, SampleRecord, RECORD_PREFIX};
use crate::partition::{Partition, PartitionSizes};
use crate::paths::NumberedPattern;
use crate::sampler::ModelSampler;

/// Failures listed individually in the summary; the rest are counted.
const REPORTED_FAILURES: usize = 5;

// ============================================================================
// Task Outcomes
// ============================================================================

/// Why a single sample produced no record.
#[derive(Debug, thiserror::Error)]
pub enum TaskFailure {
    #[error("conductivity at cell {position} is {value}; must be finite and positive")]
    InvalidConductivity { position: usize, value: f64 },

    #[error("field has {found} cells, mesh has {expected}")]
    FieldLength { expected: usize, found: usize },

    #[error("simulation failed: {0}")]
    Simulation(#[from] ForwardError),

    #[error("write failed: {0}")]
    Output(#[from] OutputError),

    #[error("sampler produced {produced} of {requested} fields")]
    Shortfall { requested: usize, produced: usize },
}

/// A failed sample and where it would have been written.
#[derive(Debug, thiserror::Error)]
#[error("{partition} sample {index}: {failure}")]
pub struct TaskError {
    pub partition: Partition,
    pub index: usize,
    pub failure: TaskFailure,
}

// ============================================================================
// Pre-Run Report
// ============================================================================

/// Formatted pre-run report for display.
pub struct PreRunReport {
    lines: Vec<String>,
}

impl PreRunReport {
    pub fn build(plan: &RunPlan) -> Self {
        let mut lines = Vec::new();

        lines.push(String::from("╭─────────────────────────────────────────────────╮"));
        lines.push(String::from("│            fw25d Dataset Driver                 │"));
        lines.push(String::from("╰─────────────────────────────────────────────────╯"));
        lines.push(String::new());

        lines.push(format!(
            "  Samples: {}  │  Threads: {}",
            plan.sizes.total(),
            plan.threads
        ));
        lines.push(format!(
            "  Survey: {} │ {} measurements, {} sources │ grid {}×{}",
            plan.array_type, plan.receivers, plan.sources, plan.nx, plan.nz
        ));

        let parts: Vec<_> = plan
            .partitions
            .iter()
            .map(|&(p, count, first)| match count {
                0 => format!("{p}: 0"),
                n => format!("{p}: {n} (#{first}→#{})", first + n - 1),
            })
            .collect();
        lines.push(format!("  Partitions: {}", parts.join(", ")));
        lines.push(format!(
            "  Output: {} → {}",
            plan.format,
            plan.output_dir.display()
        ));
        lines.push(String::new());

        Self { lines }
    }

    pub fn print(&self) {
        for line in &self.lines {
            println!("{}", line);
        }
        let _ = io::stdout().flush();
    }
}

// ============================================================================
// Dataset Driver
// ============================================================================

/// Generates train/valid/test datasets of simulated surveys.
pub struct DatasetDriver<K, S> {
    config: DatasetConfig,
    kernel: Arc<K>,
    sampler: S,
    show_progress: bool,
}

impl<K, S> DatasetDriver<K, S>
where
    K: ForwardKernel,
    S: ModelSampler,
{
    pub fn new(config: DatasetConfig, kernel: Arc<K>, sampler: S) -> Self {
        Self {
            config,
            kernel,
            sampler,
            show_progress: true,
        }
    }

    /// Toggle the pre-run report, progress bars and summary on stdout.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Give the sampler back, e.g. to inspect what it produced.
    pub fn into_sampler(self) -> S {
        self.sampler
    }

    /// Resolve the survey and obtain the operator. Refuses an empty survey.
    pub fn prepare(&self) -> Result<ForwardSimulator<K>, DriverError> {
        let simulator = ForwardSimulator::prepare(&self.config.forward, Arc::clone(&self.kernel))
            .map_err(|e| match e {
                ForwardError::EmptyGeometry { array_type } => {
                    DriverError::EmptyGeometry { array_type }
                }
                other => DriverError::Forward(other),
            })?;
        let ctx = simulator.context();
        debug!(
            "operator {} ({} × {}), {}",
            self.config.forward.para_path.display(),
            ctx.para.q.nrows(),
            ctx.para.q.ncols(),
            ctx.cache_outcome
        );
        Ok(simulator)
    }

    /// Resolve geometry and plan the run without touching the operator cache
    /// or the dataset directory.
    pub fn dry_run(&self) -> Result<DryRunStats, DriverError> {
        let forward = &self.config.forward;
        let raw = forward.read_geometry().map_err(ForwardError::from)?;
        let (set, _) = geometry::resolve(&raw, forward.array_type).map_err(ForwardError::from)?;
        if set.is_empty() {
            return Err(DriverError::EmptyGeometry {
                array_type: forward.array_type,
            });
        }
        Ok(DryRunStats {
            plan: self.plan(set.receiver_count(), set.source_count()),
        })
    }

    fn plan(&self, receivers: usize, sources: usize) -> RunPlan {
        let sizes = self.config.partition_sizes();
        let format = self.config.driver.format;
        let partitions = sizes
            .iter()
            .map(|(p, count)| (p, count, self.pattern(p, format).next_free()))
            .collect();
        RunPlan {
            sizes,
            partitions,
            threads: self.config.effective_threads(),
            receivers,
            sources,
            array_type: self.config.forward.array_type,
            nx: self.config.forward.nx,
            nz: self.config.forward.nz,
            output_dir: self.config.dataset.dataset_dir.clone(),
            format,
        }
    }

    fn pattern(&self, partition: Partition, format: OutputFormat) -> NumberedPattern {
        NumberedPattern::new(
            self.config.dataset.dataset_dir.join(partition.dir_name()),
            RECORD_PREFIX,
            format.extension(),
        )
    }

    /// Generate every partition. Per-sample failures are collected in the
    /// returned stats; only setup failures are errors.
    pub fn run(&mut self) -> Result<DatasetStats, DriverError> {
        let simulator = self.prepare()?;
        let ctx = simulator.context();
        let plan = self.plan(ctx.receiver_count(), ctx.sources.source_count());

        if plan.sizes.total() == 0 {
            warn!("num_samples is 0; nothing to generate");
            return Ok(DatasetStats::default());
        }
        if self.show_progress {
            PreRunReport::build(&plan).print();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(plan.threads)
            .build()
            .map_err(|e| DriverError::ThreadPool(e.to_string()))?;

        let start_time = Instant::now();
        let mut stats = DatasetStats {
            receivers: plan.receivers,
            ..DatasetStats::default()
        };
        for (partition, count) in plan.sizes.iter() {
            if count == 0 {
                continue;
            }
            let part = self.run_partition(&pool, &simulator, partition, count, plan.format)?;
            stats.partitions.push(part);
        }
        stats.total_time = start_time.elapsed();

        self.summarize(&stats);
        Ok(stats)
    }

    fn run_partition(
        &mut self,
        pool: &rayon::ThreadPool,
        simulator: &ForwardSimulator<K>,
        partition: Partition,
        count: usize,
        format: OutputFormat,
    ) -> Result<PartitionStats, DriverError> {
        let pattern = self.pattern(partition, format);
        fs::create_dir_all(&pattern.dir).map_err(|source| OutputError::Io {
            path: pattern.dir.clone(),
            source,
        })?;
        let first_index = pattern.next_free();
        debug!("{partition}: {count} samples starting at #{first_index}");

        let samples = self.sampler.samples(&simulator.context().mesh, count);
        let (tx, rx) = crossbeam_channel::unbounded();
        let pb = progress_bar(count, partition, self.show_progress);
        let start_time = Instant::now();

        pool.install(|| {
            (first_index..first_index + count)
                .zip(samples)
                .par_bridge()
                .for_each_with(tx.clone(), |tx, (index, sigma)| {
                    let outcome = run_task(simulator, &pattern, format, index, &sigma)
                        .map(|()| index)
                        .map_err(|failure| TaskError {
                            partition,
                            index,
                            failure,
                        });
                    if let Err(e) = &outcome {
                        debug!("{e}");
                    }
                    let _ = tx.send(outcome);
                    pb.inc(1);
                });
        });
        drop(tx);
        pb.finish_and_clear();

        let mut written = Vec::with_capacity(count);
        let mut failures = Vec::new();
        for outcome in rx.iter() {
            match outcome {
                Ok(index) => written.push(index),
                Err(e) => failures.push(e),
            }
        }
        written.sort_unstable();
        failures.sort_by_key(|e: &TaskError| e.index);

        let produced = written.len() + failures.len();
        if produced < count {
            failures.push(TaskError {
                partition,
                index: first_index + produced,
                failure: TaskFailure::Shortfall {
                    requested: count,
                    produced,
                },
            });
        }

        info!(
            "{partition}: {}/{count} samples written to {}",
            written.len(),
            pattern.dir.display()
        );

        Ok(PartitionStats {
            partition,
            requested: count,
            first_index,
            written,
            failures,
            elapsed: start_time.elapsed(),
        })
    }

    fn summarize(&self, stats: &DatasetStats) {
        let total_time = stats.total_time.as_secs_f64();
        if self.show_progress {
            println!();
            if stats.failed() == 0 {
                println!("✓ {} samples written in {:.2}s", stats.completed(), total_time);
            } else {
                println!(
                    "⚠ {}/{} samples written, {} failed in {:.2}s",
                    stats.completed(),
                    stats.requested(),
                    stats.failed(),
                    total_time
                );
            }
        }
        info!(
            "dataset complete: {} written, {} failed in {:.2}s",
            stats.completed(),
            stats.failed(),
            total_time
        );

        let mut failures = stats.errors();
        for err in failures.by_ref().take(REPORTED_FAILURES) {
            error!("{err}");
        }
        let rest = failures.count();
        if rest > 0 {
            error!("... and {rest} more failures");
        }
    }
}

/// Validate, simulate and persist one sample.
fn run_task<K: ForwardKernel>(
    simulator: &ForwardSimulator<K>,
    pattern: &NumberedPattern,
    format: OutputFormat,
    index: usize,
    sigma: &[f64],
) -> Result<(), TaskFailure> {
    let expected = simulator.context().cell_count();
    if sigma.len() != expected {
        return Err(TaskFailure::FieldLength {
            expected,
            found: sigma.len(),
        });
    }
    if let Some((position, &value)) = sigma
        .iter()
        .enumerate()
        .find(|(_, s)| !(s.is_finite() && **s > 0.0))
    {
        return Err(TaskFailure::InvalidConductivity { position, value });
    }

    let observations = simulator.simulate(sigma)?;
    let record = SampleRecord::new(observations.iter().copied(), sigma);
    write_record(&pattern.path(index), &record, format)?;
    Ok(())
}

fn progress_bar(len: usize, partition: Partition, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} {prefix:>5} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map(|s| s.progress_chars("█▓░"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_prefix(partition.dir_name());
    pb
}

// ============================================================================
// Statistics
// ============================================================================

/// What a run will do: partition sizes, start indices and survey size.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub sizes: PartitionSizes,
    /// `(partition, count, first index)` in processing order.
    pub partitions: Vec<(Partition, usize, usize)>,
    pub threads: usize,
    pub receivers: usize,
    pub sources: usize,
    pub array_type: ArrayType,
    pub nx: usize,
    pub nz: usize,
    pub output_dir: PathBuf,
    pub format: OutputFormat,
}

/// Outcome of one partition.
#[derive(Debug)]
pub struct PartitionStats {
    pub partition: Partition,
    pub requested: usize,
    pub first_index: usize,
    /// Indices of written records, ascending.
    pub written: Vec<usize>,
    /// Failed samples, ascending by index.
    pub failures: Vec<TaskError>,
    pub elapsed: Duration,
}

/// Statistics from a completed run.
#[derive(Debug, Default)]
pub struct DatasetStats {
    pub partitions: Vec<PartitionStats>,
    /// Length of every `inputs` vector written.
    pub receivers: usize,
    pub total_time: Duration,
}

impl DatasetStats {
    pub fn requested(&self) -> usize {
        self.partitions.iter().map(|p| p.requested).sum()
    }

    pub fn completed(&self) -> usize {
        self.partitions.iter().map(|p| p.written.len()).sum()
    }

    pub fn failed(&self) -> usize {
        self.partitions.iter().map(|p| p.failures.len()).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn errors(&self) -> impl Iterator<Item = &TaskError> {
        self.partitions.iter().flat_map(|p| p.failures.iter())
    }

    pub fn partition(&self, partition: Partition) -> Option<&PartitionStats> {
        self.partitions.iter().find(|p| p.partition == partition)
    }
}

/// Statistics from a dry run.
#[derive(Debug, Clone)]
pub struct DryRunStats {
    pub plan: RunPlan,
}

impl DryRunStats {
    pub fn print_report(&self) {
        PreRunReport::build(&self.plan).print();
        println!("  [DRY RUN - nothing will be written]");
        println!();
    }
}

impl std::fmt::Display for DryRunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plan = &self.plan;
        writeln!(f, "Dry Run Statistics")?;
        writeln!(f, "==================")?;
        writeln!(f, "Samples: {} ({})", plan.sizes.total(), plan.sizes)?;
        writeln!(f, "Threads: {}", plan.threads)?;
        writeln!(f, "Measurements per sample: {}", plan.receivers)?;
        writeln!(f, "Unique sources: {}", plan.sources)?;
        writeln!(f, "\nFirst free index:")?;
        for (partition, count, first) in &plan.partitions {
            writeln!(f, "  {}: #{} ({} samples)", partition, first, count)?;
        }
        Ok(())
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Driver-level errors.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to create thread pool: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("no measurements survive the {array_type} array filter")]
    EmptyGeometry { array_type: ArrayType },

    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

// ============================================================================
// Tests
// ============================================================================
