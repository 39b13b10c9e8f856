use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use log::{info, LevelFilter};

use fw25d_bulk_driver::{DatasetConfig, DatasetDriver, LogUniformSampler, EXAMPLE_CONFIG};
use fw25d_core::{geometry, ForwardSimulator, SensitivityKernel};

fn main() {
    if let Err(err) = run() {
        eprintln!("fw25d error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::MakeDataset(args) => make_dataset(args),
        Command::Prepare(args) => prepare(args),
        Command::Validate(args) => validate(args),
        Command::Example => {
            print!("{EXAMPLE_CONFIG}");
            Ok(())
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Synthetic 2.5D DC resistivity dataset generation."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate random conductivity models into train/valid/test records.
    MakeDataset(MakeDatasetArgs),
    /// Build or refresh the forward operator cache only.
    Prepare(ConfigArgs),
    /// Load a configuration and report the resolved survey.
    Validate(ConfigArgs),
    /// Print an example configuration.
    Example,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Path to the dataset TOML configuration
    #[arg(short, long)]
    config: PathBuf,
    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct MakeDatasetArgs {
    #[command(flatten)]
    common: ConfigArgs,
    /// Resolve and report without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Worker threads (overrides [driver] threads)
    #[arg(short, long)]
    threads: Option<usize>,
}

/// `RUST_LOG` wins; otherwise info, or debug when verbose.
fn init_logging(verbose: bool) {
    let default = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(default)
        .parse_default_env()
        .init();
}

fn load(args: &ConfigArgs) -> Result<DatasetConfig, Box<dyn std::error::Error>> {
    let config = DatasetConfig::from_file(&args.config)?;
    init_logging(args.verbose || config.driver.verbose);
    info!("loaded config {}", args.config.display());
    Ok(config)
}

fn make_dataset(args: MakeDatasetArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load(&args.common)?;
    if let Some(threads) = args.threads {
        if threads == 0 {
            return Err("--threads must be positive".into());
        }
        config.driver.threads = Some(threads);
    }
    let dry_run = args.dry_run || config.driver.dry_run;

    let sampler = LogUniformSampler::from_config(&config.sampler);
    let mut driver = DatasetDriver::new(config, Arc::new(SensitivityKernel::new()), sampler);

    if dry_run {
        driver.dry_run()?.print_report();
        return Ok(());
    }

    let stats = driver.run()?;
    if !stats.is_success() {
        return Err(format!(
            "{} of {} samples failed",
            stats.failed(),
            stats.requested()
        )
        .into());
    }
    Ok(())
}

fn prepare(args: ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load(&args)?;
    let simulator = ForwardSimulator::prepare(&config.forward, Arc::new(SensitivityKernel::new()))?;
    let ctx = simulator.context();
    println!(
        "operator {} {}: {} measurements × {} cells",
        config.forward.para_path.display(),
        ctx.cache_outcome,
        ctx.receiver_count(),
        ctx.cell_count()
    );
    Ok(())
}

fn validate(args: ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load(&args)?;
    let forward = &config.forward;
    let raw = forward.read_geometry()?;
    let (set, report) = geometry::resolve(&raw, forward.array_type)?;

    println!("config OK: {}", args.config.display());
    println!(
        "  electrodes: {} ({} current, {} potential)",
        raw.electrodes.len(),
        raw.current.len(),
        raw.potential.len()
    );
    println!(
        "  quadruples: {} → {} at surface → {} accepted ({})",
        report.quadruples, report.at_surface, report.accepted, forward.array_type
    );
    println!(
        "  measurements: {}  │  unique sources: {}",
        set.receiver_count(),
        set.source_count()
    );
    println!("  grid: {}×{}", forward.nx, forward.nz);
    println!("  partitions: {}", config.partition_sizes());
    if set.is_empty() {
        return Err("no measurements survive the array filter".into());
    }
    Ok(())
}
