//! Dispatch of independent (bin, size, temperature) units onto a bounded
//! worker pool, plus the persistence and aggregation that follow the barrier.
//!
//! Every unit receives the configuration by value (behind an `Arc`) and owns
//! its spins, its RNG and its series. Workers report back over a channel; the
//! coordinator waits for all reports before estimating or aggregating.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::aggregate::{aggregate, AggregatedStatistic};
use crate::autocorrelation::{self, AutocorrelationResult};
use crate::config::{Algorithm, Observable, SimConfig, SpinDumpConfig};
use crate::error::SimError;
use crate::io::{self, ResultMap, SpinDumpWriter};
use crate::lattice::{InitialState, Lattice};
use crate::metropolis::MetropolisChain;
use crate::utils::rng::{stream_id, unit_rng};
use crate::wolff::{FlipOrder, WolffChain};

/// Identity of one independent replica.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunKey {
    pub bin: usize,
    pub size: usize,
    pub temperature: f64,
    /// Position of `size` in the configured size list.
    pub size_idx: usize,
    /// Position of `temperature` in the configured temperature list.
    pub temp_idx: usize,
}

impl RunKey {
    pub fn stream(&self) -> u64 {
        stream_id(self.bin, self.size_idx, self.temp_idx)
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bin={} L={} T={:.3}", self.bin, self.size, self.temperature)
    }
}

/// All keys of a scan, bins outermost.
pub fn run_keys(sizes: &[usize], temperatures: &[f64], bins: usize) -> Vec<RunKey> {
    let mut keys = Vec::with_capacity(bins * sizes.len() * temperatures.len());
    for bin in 0..bins {
        for (size_idx, &size) in sizes.iter().enumerate() {
            for (temp_idx, &temperature) in temperatures.iter().enumerate() {
                keys.push(RunKey {
                    bin,
                    size,
                    temperature,
                    size_idx,
                    temp_idx,
                });
            }
        }
    }
    keys
}

/// What one unit produced, or why it did not.
#[derive(Debug)]
pub struct UnitReport<T> {
    pub key: RunKey,
    pub outcome: Result<T, SimError>,
}

/// Bounded pool with explicit submission; results come back over a channel.
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// `None` sizes the pool to the available hardware parallelism.
    pub fn new(workers: Option<usize>) -> Result<Self, SimError> {
        let n = match workers {
            Some(0) => return Err(SimError::config("worker count must be at least 1")),
            Some(n) => n,
            None => std::thread::available_parallelism().map_or(1, |n| n.get()),
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .thread_name(|i| format!("ising-worker-{i}"))
            .build()
            .map_err(|err| SimError::config(format!("cannot start worker pool: {err}")))?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Submit every task, then block until all results are in. Output order
    /// matches task order.
    pub fn run_all<T, R, F>(&self, tasks: Vec<T>, job: F, progress: &ProgressBar) -> Vec<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let total = tasks.len();
        let job = Arc::new(job);
        let (tx, rx) = mpsc::channel();

        for (idx, task) in tasks.into_iter().enumerate() {
            let tx = tx.clone();
            let job = Arc::clone(&job);
            self.pool.spawn(move || {
                let out = job(task);
                // receiver outlives every sender; a failed send means it panicked
                let _ = tx.send((idx, out));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        for (idx, out) in rx {
            slots[idx] = Some(out);
            progress.inc(1);
        }
        progress.finish();
        slots.into_iter().flatten().collect()
    }
}

/// Outcome of an autocorrelation pass over a whole scan.
#[derive(Debug)]
pub struct AnalysisReport {
    pub units: Vec<UnitReport<AutocorrelationResult>>,
    pub aggregated: Vec<AggregatedStatistic>,
    pub files: Vec<PathBuf>,
}

impl AnalysisReport {
    pub fn failures(&self) -> impl Iterator<Item = (&RunKey, &SimError)> {
        self.units
            .iter()
            .filter_map(|u| u.outcome.as_ref().err().map(|e| (&u.key, e)))
    }
}

/// Runs scans on a [`WorkerPool`].
#[derive(Debug)]
pub struct Coordinator {
    pool: WorkerPool,
    show_progress: bool,
}

impl Coordinator {
    pub fn new(workers: Option<usize>) -> Result<Self, SimError> {
        Ok(Self {
            pool: WorkerPool::new(workers)?,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    fn progress(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::with_template(" {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]")
        {
            bar.set_style(style);
        }
        bar
    }

    /// Produce and persist the observable series of every unit.
    pub fn simulate(
        &self,
        cfg: &SimConfig,
        algorithm: Algorithm,
        out_dir: &Path,
    ) -> Result<Vec<UnitReport<Vec<PathBuf>>>, SimError> {
        cfg.validate()?;
        fs::create_dir_all(out_dir).map_err(SimError::io_at(out_dir))?;

        let keys = run_keys(&cfg.sizes, &cfg.temperatures, cfg.bins);
        info!(
            units = keys.len(),
            workers = self.pool.workers(),
            ?algorithm,
            seed = cfg.seed,
            "dispatching simulation units"
        );

        let lattices: Arc<Vec<Arc<Lattice>>> =
            Arc::new(cfg.sizes.iter().map(|&l| Arc::new(Lattice::new(l))).collect());
        let cfg = Arc::new(cfg.clone());
        let out_dir = out_dir.to_path_buf();

        let bar = self.progress(keys.len());
        let reports = self.pool.run_all(
            keys,
            move |key: RunKey| {
                debug!(%key, "unit started");
                let lattice = Arc::clone(&lattices[key.size_idx]);
                let outcome = simulate_unit(&cfg, algorithm, lattice, &out_dir, &key);
                debug!(%key, ok = outcome.is_ok(), "unit finished");
                UnitReport { key, outcome }
            },
            &bar,
        );

        log_summary("simulation", &reports);
        Ok(reports)
    }

    /// Dump full Wolff configurations for every (size, temperature) pair.
    pub fn dump_spin_configurations(
        &self,
        cfg: &SpinDumpConfig,
        out_dir: &Path,
    ) -> Result<Vec<UnitReport<PathBuf>>, SimError> {
        cfg.validate()?;
        fs::create_dir_all(out_dir).map_err(SimError::io_at(out_dir))?;

        let keys = run_keys(&cfg.sizes, &cfg.temperatures, 1);
        info!(units = keys.len(), workers = self.pool.workers(), "dispatching spin dumps");

        let cfg = Arc::new(cfg.clone());
        let out_dir = out_dir.to_path_buf();
        let bar = self.progress(keys.len());
        let reports = self.pool.run_all(
            keys,
            move |key: RunKey| {
                let outcome = dump_unit(&cfg, &out_dir, &key);
                UnitReport { key, outcome }
            },
            &bar,
        );

        log_summary("spin dump", &reports);
        Ok(reports)
    }

    /// Estimate autocorrelations of every persisted series, then aggregate
    /// the successful bins per (size, temperature) and write the results.
    pub fn analyze(
        &self,
        cfg: &SimConfig,
        algorithm: Algorithm,
        observable: Observable,
        series_dir: &Path,
        out_dir: &Path,
    ) -> Result<AnalysisReport, SimError> {
        cfg.validate()?;
        fs::create_dir_all(out_dir).map_err(SimError::io_at(out_dir))?;

        let keys = run_keys(&cfg.sizes, &cfg.temperatures, cfg.bins);
        info!(
            units = keys.len(),
            ?observable,
            ?algorithm,
            cutoff = cfg.cutoff,
            "estimating autocorrelations"
        );

        let shared = Arc::new(cfg.clone());
        let dir = series_dir.to_path_buf();
        let bar = self.progress(keys.len());
        let units = self.pool.run_all(
            keys,
            move |key: RunKey| {
                let name = io::series_file_name(
                    key.bin, key.size, key.temperature, observable, algorithm, &shared,
                );
                let outcome = io::read_series(&dir.join(name))
                    .and_then(|series| autocorrelation::estimate(&series, shared.cutoff));
                UnitReport { key, outcome }
            },
            &bar,
        );
        log_summary("autocorrelation", &units);

        // Barrier passed: every bin of every key is in.
        let successes = units
            .iter()
            .filter_map(|u| u.outcome.as_ref().ok().map(|r| (u.key.size_idx, u.key.temp_idx, r)));
        let aggregated = aggregate(&cfg.sizes, &cfg.temperatures, successes);

        let (tau_map, rho_map) = result_maps(cfg, &units);
        let files = vec![
            out_dir.join(io::tau_file_name(observable, algorithm, cfg)),
            out_dir.join(io::rho_file_name(observable, algorithm, cfg)),
            out_dir.join(io::stats_file_name(observable, algorithm, cfg)),
            out_dir.join(io::table_file_name(observable, algorithm, cfg)),
        ];
        io::write_json(&files[0], &tau_map)?;
        io::write_json(&files[1], &rho_map)?;
        io::write_json(&files[2], &aggregated)?;
        io::write_tau_table(&files[3], &aggregated)?;

        Ok(AnalysisReport {
            units,
            aggregated,
            files,
        })
    }
}

fn simulate_unit(
    cfg: &SimConfig,
    algorithm: Algorithm,
    lattice: Arc<Lattice>,
    out_dir: &Path,
    key: &RunKey,
) -> Result<Vec<PathBuf>, SimError> {
    let mut rng = unit_rng(cfg.seed, key.stream());
    let path_for = |observable| {
        out_dir.join(io::series_file_name(
            key.bin, key.size, key.temperature, observable, algorithm, cfg,
        ))
    };

    match algorithm {
        Algorithm::Metropolis => {
            let start = InitialState::for_temperature(key.temperature, cfg.cold_start_below);
            let mut chain = MetropolisChain::new(lattice, key.temperature, start, &mut rng);
            let series = chain.run(cfg.total_steps(), cfg.eq_steps, cfg.stride, &mut rng);
            debug!(%key, acceptance = chain.acceptance_rate(), "metropolis run done");

            let m_path = path_for(Observable::Magnetization);
            let e_path = path_for(Observable::Energy);
            io::write_series(&m_path, &series.magnetization)?;
            io::write_series(&e_path, &series.energy)?;
            Ok(vec![m_path, e_path])
        }
        Algorithm::Wolff => {
            let order = if cfg.immediate_flips {
                FlipOrder::Immediate
            } else {
                FlipOrder::Deferred
            };
            let mut chain = WolffChain::new(lattice, key.temperature, cfg.wolff_start, &mut rng)
                .with_flip_order(order);
            let series =
                chain.run_magnetization(cfg.sweeps, cfg.eq_steps, cfg.cluster_cycles, &mut rng);
            debug!(%key, mean_cluster = chain.mean_cluster_size(), "wolff run done");

            let m_path = path_for(Observable::Magnetization);
            io::write_series(&m_path, &series)?;
            Ok(vec![m_path])
        }
    }
}

fn dump_unit(cfg: &SpinDumpConfig, out_dir: &Path, key: &RunKey) -> Result<PathBuf, SimError> {
    let cycles = cfg.cycles_for(key.size);
    let path = out_dir.join(io::spin_dump_file_name(key.size, key.temperature, cycles));
    let mut rng = unit_rng(cfg.seed, key.stream());

    let lattice = Arc::new(Lattice::new(key.size));
    let mut chain = WolffChain::new(lattice, key.temperature, cfg.start, &mut rng);
    let mut writer = SpinDumpWriter::create(&path)?;
    chain.run_configuration_dump(cfg.warmup, cfg.samples, cycles, &mut writer, &mut rng)?;
    writer.finish()?;
    Ok(path)
}

fn result_maps(
    cfg: &SimConfig,
    units: &[UnitReport<AutocorrelationResult>],
) -> (ResultMap<f64>, ResultMap<Vec<f64>>) {
    let mut tau_map: ResultMap<f64> = BTreeMap::new();
    let mut rho_map: ResultMap<Vec<f64>> = BTreeMap::new();
    for bin in 0..cfg.bins {
        for &t in &cfg.temperatures {
            let tkey = io::temperature_key(t);
            tau_map.entry(bin).or_default().insert(tkey.clone(), vec![None; cfg.sizes.len()]);
            rho_map.entry(bin).or_default().insert(tkey, vec![None; cfg.sizes.len()]);
        }
    }

    for unit in units {
        let Ok(result) = &unit.outcome else { continue };
        let tkey = io::temperature_key(unit.key.temperature);
        if let Some(slot) = tau_map.get_mut(&unit.key.bin).and_then(|m| m.get_mut(&tkey)) {
            slot[unit.key.size_idx] = Some(result.tau);
        }
        if let Some(slot) = rho_map.get_mut(&unit.key.bin).and_then(|m| m.get_mut(&tkey)) {
            slot[unit.key.size_idx] = Some(result.rho.clone());
        }
    }
    (tau_map, rho_map)
}

fn log_summary<T>(stage: &str, reports: &[UnitReport<T>]) {
    let mut failed = 0usize;
    for report in reports {
        if let Err(err) = &report.outcome {
            failed += 1;
            error!(
                stage,
                bin = report.key.bin,
                size = report.key.size,
                temperature = report.key.temperature,
                kind = %err.kind(),
                "unit failed: {err}"
            );
        }
    }
    info!(stage, total = reports.len(), failed, "all units reported");
}
