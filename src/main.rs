//! Ising scan driver: produce series, dump spin configurations, or estimate
//! autocorrelation times of previously written series.
//
//  Compile & run:  `cargo run --release -- metropolis --sizes 8,12 --bins 4`

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ising::config::{Algorithm, Observable, SimConfig, SpinDumpConfig};
use ising::coordinator::Coordinator;
use ising::lattice::InitialState;

#[derive(Parser)]
#[command(name = "ising", about = "2D Ising Monte Carlo and autocorrelation analysis")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Single-spin-flip series (magnetization and energy)
    Metropolis(ScanArgs),
    /// Cluster-update magnetization series
    Wolff(ScanArgs),
    /// Full spin configurations from cluster updates
    SpinDump(DumpArgs),
    /// Autocorrelation function and time of written series
    Autocorr(AutocorrArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// JSON file with a full configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Samples per unit
    #[arg(long)]
    sweeps: Option<usize>,

    /// Equilibration steps (Metropolis) or clusters (Wolff)
    #[arg(long)]
    eq_steps: Option<usize>,

    /// Metropolis steps between samples
    #[arg(long)]
    stride: Option<usize>,

    /// Wolff clusters between samples
    #[arg(long)]
    cluster_cycles: Option<usize>,

    #[arg(long, value_delimiter = ',')]
    temperatures: Option<Vec<f64>>,

    #[arg(long, value_delimiter = ',')]
    sizes: Option<Vec<usize>>,

    /// Independent replicas per (size, temperature)
    #[arg(long)]
    bins: Option<usize>,

    /// Largest lag of the autocorrelation function
    #[arg(long)]
    cutoff: Option<usize>,

    /// Metropolis cold-start threshold temperature
    #[arg(long)]
    cold_start_below: Option<f64>,

    /// Start Wolff chains from a random configuration
    #[arg(long)]
    hot_start: bool,

    /// Flip Wolff cluster sites while the cluster grows
    #[arg(long)]
    immediate_flips: bool,

    /// Master seed; drawn from OS entropy when absent
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Directory of the series files
    #[arg(long, default_value = "data")]
    out_dir: PathBuf,

    #[arg(long)]
    no_progress: bool,
}

impl ScanArgs {
    fn resolve(&self, algorithm: Algorithm) -> Result<SimConfig, Box<dyn std::error::Error>> {
        let mut cfg = match &self.config {
            Some(path) => SimConfig::from_json_file(path)?,
            None => SimConfig::preset(algorithm),
        };
        if let Some(v) = self.sweeps {
            cfg.sweeps = v;
        }
        if let Some(v) = self.eq_steps {
            cfg.eq_steps = v;
        }
        if let Some(v) = self.stride {
            cfg.stride = v;
        }
        if let Some(v) = self.cluster_cycles {
            cfg.cluster_cycles = v;
        }
        if let Some(v) = &self.temperatures {
            cfg.temperatures = v.clone();
        }
        if let Some(v) = &self.sizes {
            cfg.sizes = v.clone();
        }
        if let Some(v) = self.bins {
            cfg.bins = v;
        }
        if let Some(v) = self.cutoff {
            cfg.cutoff = v;
        }
        if let Some(v) = self.cold_start_below {
            cfg.cold_start_below = v;
        }
        if self.hot_start {
            cfg.wolff_start = InitialState::Disordered;
        }
        if self.immediate_flips {
            cfg.immediate_flips = true;
        }
        if self.workers.is_some() {
            cfg.workers = self.workers;
        }
        cfg.seed = match (self.seed, &self.config) {
            (Some(seed), _) => seed,
            (None, Some(_)) => cfg.seed,
            (None, None) => rand::random(),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Args)]
struct DumpArgs {
    /// JSON file with a full configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_delimiter = ',')]
    sizes: Option<Vec<usize>>,

    #[arg(long, value_delimiter = ',')]
    temperatures: Option<Vec<f64>>,

    /// Warm-up clusters before the first snapshot
    #[arg(long)]
    warmup: Option<usize>,

    /// Snapshots per (size, temperature)
    #[arg(long)]
    samples: Option<usize>,

    /// Clusters between snapshots per size, as `L:cycles`
    #[arg(long, value_delimiter = ',')]
    cycles: Option<Vec<String>>,

    /// Clusters between snapshots for sizes not listed in --cycles
    #[arg(long)]
    default_cycles: Option<usize>,

    #[arg(long)]
    hot_start: bool,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, default_value = "SpinConfiguration")]
    out_dir: PathBuf,

    #[arg(long)]
    no_progress: bool,
}

impl DumpArgs {
    fn resolve(&self) -> Result<SpinDumpConfig, Box<dyn std::error::Error>> {
        let mut cfg = match &self.config {
            Some(path) => SpinDumpConfig::from_json_file(path)?,
            None => SpinDumpConfig::default(),
        };
        if let Some(v) = &self.sizes {
            cfg.sizes = v.clone();
        }
        if let Some(v) = &self.temperatures {
            cfg.temperatures = v.clone();
        }
        if let Some(v) = self.warmup {
            cfg.warmup = v;
        }
        if let Some(v) = self.samples {
            cfg.samples = v;
        }
        if let Some(v) = self.default_cycles {
            cfg.default_cycles = v;
        }
        if let Some(pairs) = &self.cycles {
            cfg.cycles.clear();
            for pair in pairs {
                let (l, nc) = pair
                    .split_once(':')
                    .ok_or_else(|| format!("--cycles entry {pair:?} is not L:cycles"))?;
                cfg.cycles.insert(l.trim().parse()?, nc.trim().parse()?);
            }
        }
        if self.hot_start {
            cfg.start = InitialState::Disordered;
        }
        if self.workers.is_some() {
            cfg.workers = self.workers;
        }
        cfg.seed = match (self.seed, &self.config) {
            (Some(seed), _) => seed,
            (None, Some(_)) => cfg.seed,
            (None, None) => rand::random(),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Args)]
struct AutocorrArgs {
    /// Algorithm that produced the series
    #[arg(long, value_enum, default_value = "metropolis")]
    algorithm: Algorithm,

    #[arg(long, value_enum, default_value = "magnetization")]
    observable: Observable,

    /// Where results are written
    #[arg(long, default_value = "AutoCorrelation")]
    results_dir: PathBuf,

    #[command(flatten)]
    scan: ScanArgs,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Metropolis(args) => run_scan(Algorithm::Metropolis, &args),
        Command::Wolff(args) => run_scan(Algorithm::Wolff, &args),
        Command::SpinDump(args) => {
            let cfg = args.resolve()?;
            info!("Configuration:\n{cfg:#?}");
            let coordinator = Coordinator::new(cfg.workers)?.with_progress(!args.no_progress);
            let reports = coordinator.dump_spin_configurations(&cfg, &args.out_dir)?;
            let written = reports.iter().filter(|r| r.outcome.is_ok()).count();
            info!(
                written,
                total = reports.len(),
                dir = %args.out_dir.display(),
                "spin dump complete"
            );
            Ok(())
        }
        Command::Autocorr(args) => {
            let cfg = args.scan.resolve(args.algorithm)?;
            info!("Configuration:\n{cfg:#?}");
            let coordinator = Coordinator::new(cfg.workers)?.with_progress(!args.scan.no_progress);
            let report = coordinator.analyze(
                &cfg,
                args.algorithm,
                args.observable,
                &args.scan.out_dir,
                &args.results_dir,
            )?;
            for stat in &report.aggregated {
                info!(
                    size = stat.size,
                    temperature = stat.temperature,
                    bins = stat.bins,
                    "tau = {:.4} ± {:.4}",
                    stat.tau_mean,
                    stat.tau_err
                );
            }
            for (key, err) in report.failures() {
                warn!(%key, kind = %err.kind(), "excluded from aggregation");
            }
            for file in &report.files {
                info!(file = %file.display(), "written");
            }
            Ok(())
        }
    }
}

fn run_scan(algorithm: Algorithm, args: &ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = args.resolve(algorithm)?;
    info!("Configuration:\n{cfg:#?}");

    let coordinator = Coordinator::new(cfg.workers)?.with_progress(!args.no_progress);
    let reports = coordinator.simulate(&cfg, algorithm, &args.out_dir)?;
    let ok = reports.iter().filter(|r| r.outcome.is_ok()).count();
    info!(
        ok,
        failed = reports.len() - ok,
        dir = %args.out_dir.display(),
        "Scan complete"
    );
    Ok(())
}
