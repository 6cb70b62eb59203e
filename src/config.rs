// config.rs - Run parameters, passed by value into every unit

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::lattice::InitialState;

/// Update scheme that produced a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Algorithm {
    Metropolis,
    Wolff,
}

impl Algorithm {
    /// Tag used in file names.
    pub fn label(self) -> &'static str {
        match self {
            Algorithm::Metropolis => "SingleFlip",
            Algorithm::Wolff => "Wolff",
        }
    }
}

/// Scalar observable recorded along a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Observable {
    Magnetization,
    Energy,
}

impl Observable {
    pub fn label(self) -> &'static str {
        match self {
            Observable::Magnetization => "Magnetization",
            Observable::Energy => "Energy",
        }
    }
}

/// Parameters of a series-producing scan (single source of truth).
///
/// For Metropolis `sweeps` counts samples `stride` steps apart after
/// `eq_steps` single-flip attempts. For Wolff `sweeps` counts samples
/// `cluster_cycles` clusters apart after `eq_steps` clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub sweeps: usize,
    pub eq_steps: usize,
    pub stride: usize,
    pub cluster_cycles: usize,
    pub temperatures: Vec<f64>,
    pub sizes: Vec<usize>,
    pub bins: usize,
    pub cutoff: usize,
    /// Metropolis starts ordered strictly below this temperature.
    pub cold_start_below: f64,
    pub wolff_start: InitialState,
    /// Wolff scalar runs flip sites as they join the cluster.
    pub immediate_flips: bool,
    pub seed: u64,
    /// Worker threads; `None` means available hardware parallelism.
    pub workers: Option<usize>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::metropolis()
    }
}

impl SimConfig {
    pub fn metropolis() -> Self {
        Self {
            sweeps: 20_000,
            eq_steps: 10_000,
            stride: 400,
            cluster_cycles: 1,
            temperatures: vec![1.0, 2.269, 3.0],
            sizes: (8..=20).step_by(2).collect(),
            bins: 10,
            cutoff: 500,
            cold_start_below: 1.1,
            wolff_start: InitialState::Ordered,
            immediate_flips: false,
            seed: 0,
            workers: None,
        }
    }

    pub fn wolff() -> Self {
        Self {
            sweeps: 2_000,
            eq_steps: 100,
            stride: 1,
            cluster_cycles: 1,
            sizes: (8..=40).step_by(4).collect(),
            cutoff: 100,
            ..Self::metropolis()
        }
    }

    pub fn preset(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Metropolis => Self::metropolis(),
            Algorithm::Wolff => Self::wolff(),
        }
    }

    /// Single-flip attempts of one Metropolis unit.
    pub fn total_steps(&self) -> usize {
        self.sweeps * self.stride + self.eq_steps
    }

    /// Spacing between samples as written into file names.
    pub fn sample_spacing(&self, algorithm: Algorithm) -> usize {
        match algorithm {
            Algorithm::Metropolis => self.stride,
            Algorithm::Wolff => self.cluster_cycles,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SimError> {
        let text = fs::read_to_string(path).map_err(SimError::io_at(path))?;
        serde_json::from_str(&text).map_err(SimError::io_at(path))
    }

    pub fn validate(&self) -> Result<(), SimError> {
        validate_grid(&self.sizes, &self.temperatures)?;
        for (name, value) in [
            ("bins", self.bins),
            ("stride", self.stride),
            ("cluster_cycles", self.cluster_cycles),
            ("cutoff", self.cutoff),
        ] {
            if value == 0 {
                return Err(SimError::config(format!("{name} must be at least 1")));
            }
        }
        if !self.cold_start_below.is_finite() {
            return Err(SimError::config("cold start threshold must be finite"));
        }
        validate_workers(self.workers)
    }
}

/// Parameters of the configuration-dump scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpinDumpConfig {
    pub sizes: Vec<usize>,
    pub temperatures: Vec<f64>,
    pub warmup: usize,
    pub samples: usize,
    /// Clusters between snapshots, per lattice size.
    pub cycles: BTreeMap<usize, usize>,
    /// Used for sizes missing from `cycles`.
    pub default_cycles: usize,
    pub start: InitialState,
    pub seed: u64,
    pub workers: Option<usize>,
}

impl Default for SpinDumpConfig {
    fn default() -> Self {
        Self {
            sizes: vec![20, 40, 60, 80, 100],
            temperatures: temperature_range(1.6, 3.0, 0.1),
            warmup: 2_000,
            samples: 100,
            cycles: BTreeMap::from([(20, 20), (40, 60), (60, 100), (80, 150), (100, 200)]),
            default_cycles: 20,
            start: InitialState::Ordered,
            seed: 0,
            workers: None,
        }
    }
}

impl SpinDumpConfig {
    pub fn cycles_for(&self, size: usize) -> usize {
        self.cycles.get(&size).copied().unwrap_or(self.default_cycles)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, SimError> {
        let text = fs::read_to_string(path).map_err(SimError::io_at(path))?;
        serde_json::from_str(&text).map_err(SimError::io_at(path))
    }

    pub fn validate(&self) -> Result<(), SimError> {
        validate_grid(&self.sizes, &self.temperatures)?;
        if self.default_cycles == 0 || self.cycles.values().any(|&c| c == 0) {
            return Err(SimError::config("cycles between samples must be at least 1"));
        }
        validate_workers(self.workers)
    }
}

/// `start, start + step, …` while below `stop` (half-open, like `arange`).
pub fn temperature_range(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let mut out = Vec::new();
    if !(step > 0.0) {
        return out;
    }
    let mut i = 0usize;
    loop {
        let t = start + step * i as f64;
        if t >= stop - 1e-10 {
            break;
        }
        out.push(t);
        i += 1;
    }
    out
}

fn validate_grid(sizes: &[usize], temperatures: &[f64]) -> Result<(), SimError> {
    if sizes.is_empty() {
        return Err(SimError::config("size list is empty"));
    }
    if temperatures.is_empty() {
        return Err(SimError::config("temperature list is empty"));
    }
    if let Some(&l) = sizes.iter().find(|&&l| l == 0) {
        return Err(SimError::config(format!("lattice size L={l} must be positive")));
    }
    if let Some(&t) = temperatures.iter().find(|&&t| !(t > 0.0 && t.is_finite())) {
        return Err(SimError::config(format!(
            "temperature T={t} must be positive and finite"
        )));
    }
    Ok(())
}

fn validate_workers(workers: Option<usize>) -> Result<(), SimError> {
    if workers == Some(0) {
        return Err(SimError::config("worker count must be at least 1"));
    }
    Ok(())
}
