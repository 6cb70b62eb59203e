// io.rs - Line-delimited series, spin dumps, result files and their names

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use serde::Serialize;

use crate::aggregate::AggregatedStatistic;
use crate::config::{Algorithm, Observable, SimConfig};
use crate::error::SimError;
use crate::lattice::Spin;
use crate::wolff::SnapshotSink;

// -----------------------------------------------------------------------------
// File names
// -----------------------------------------------------------------------------

/// `{bin}-{Observable}_{L}L_{T}T_{sweeps}Nsw_{eq}Neq_{spacing}Nfl-{Algorithm}.dat`
pub fn series_file_name(
    bin: usize,
    size: usize,
    temperature: f64,
    observable: Observable,
    algorithm: Algorithm,
    cfg: &SimConfig,
) -> String {
    format!(
        "{bin}-{obs}_{size}L_{temperature:.3}T_{sw}Nsw_{eq}Neq_{fl}Nfl-{alg}.dat",
        obs = observable.label(),
        sw = cfg.sweeps,
        eq = cfg.eq_steps,
        fl = cfg.sample_spacing(algorithm),
        alg = algorithm.label(),
    )
}

/// Shared suffix of the result files of one analysis.
fn result_stem(observable: Observable, algorithm: Algorithm, cfg: &SimConfig) -> String {
    format!(
        "{obs}_{sw}Nsw_{eq}Neq_{fl}Nfl-{alg}",
        obs = observable.label(),
        sw = cfg.sweeps,
        eq = cfg.eq_steps,
        fl = cfg.sample_spacing(algorithm),
        alg = algorithm.label(),
    )
}

pub fn tau_file_name(observable: Observable, algorithm: Algorithm, cfg: &SimConfig) -> String {
    format!("AutoCtau-{}.json", result_stem(observable, algorithm, cfg))
}

pub fn rho_file_name(observable: Observable, algorithm: Algorithm, cfg: &SimConfig) -> String {
    format!("AutoCrho-{}.json", result_stem(observable, algorithm, cfg))
}

pub fn stats_file_name(observable: Observable, algorithm: Algorithm, cfg: &SimConfig) -> String {
    format!("AutoCstats-{}.json", result_stem(observable, algorithm, cfg))
}

pub fn table_file_name(observable: Observable, algorithm: Algorithm, cfg: &SimConfig) -> String {
    format!("AutoCtau-{}.csv", result_stem(observable, algorithm, cfg))
}

pub fn spin_dump_file_name(size: usize, temperature: f64, cycles: usize) -> String {
    format!("spin_config_{size}L_{temperature:.1}T_{cycles}flips.dat")
}

/// Temperature key used in result mappings.
pub fn temperature_key(temperature: f64) -> String {
    format!("{temperature:.3}")
}

// -----------------------------------------------------------------------------
// Scalar series
// -----------------------------------------------------------------------------

/// Write one value per line. `f64` display is the shortest string that parses
/// back to the same value.
pub fn write_series(path: &Path, values: &[f64]) -> Result<(), SimError> {
    let file = File::create(path).map_err(SimError::io_at(path))?;
    let mut out = BufWriter::new(file);
    for v in values {
        writeln!(out, "{v}").map_err(SimError::io_at(path))?;
    }
    out.flush().map_err(SimError::io_at(path))
}

/// Read a line-delimited series. Blank lines are skipped; anything else that
/// does not parse as a number is an error.
pub fn read_series(path: &Path) -> Result<Vec<f64>, SimError> {
    let file = File::open(path).map_err(SimError::io_at(path))?;
    let mut values = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(SimError::io_at(path))?;
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let value = text.parse::<f64>().map_err(|err| SimError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("line {}: {text:?}: {err}", lineno + 1),
            ),
        })?;
        values.push(value);
    }
    Ok(values)
}

// -----------------------------------------------------------------------------
// Spin snapshots
// -----------------------------------------------------------------------------

/// Appends one line of space-separated spins per snapshot. The file is
/// truncated on creation and closed when the writer is dropped.
#[derive(Debug)]
pub struct SpinDumpWriter {
    path: PathBuf,
    out: BufWriter<File>,
    written: usize,
}

impl SpinDumpWriter {
    pub fn create(path: &Path) -> Result<Self, SimError> {
        let file = File::create(path).map_err(SimError::io_at(path))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<usize, SimError> {
        self.out.flush().map_err(SimError::io_at(&self.path))?;
        Ok(self.written)
    }
}

impl SnapshotSink for SpinDumpWriter {
    fn record(&mut self, spins: &[Spin]) -> Result<(), SimError> {
        let mut line = String::with_capacity(spins.len() * 3);
        for (i, s) in spins.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            line.push_str(if *s > 0 { "1" } else { "-1" });
        }
        writeln!(self.out, "{line}").map_err(SimError::io_at(&self.path))?;
        self.written += 1;
        Ok(())
    }
}

/// Load every snapshot of a spin dump.
pub fn read_spin_dump(path: &Path) -> Result<Vec<Vec<Spin>>, SimError> {
    let text = fs::read_to_string(path).map_err(SimError::io_at(path))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split_whitespace()
                .map(|tok| match tok {
                    "1" => Ok(1),
                    "-1" => Ok(-1),
                    other => Err(SimError::Io {
                        path: path.to_path_buf(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!("not a spin: {other:?}"),
                        ),
                    }),
                })
                .collect()
        })
        .collect()
}

// -----------------------------------------------------------------------------
// Results
// -----------------------------------------------------------------------------

/// bin → temperature → value per size position (`None` for a failed unit).
pub type ResultMap<V> = BTreeMap<usize, BTreeMap<String, Vec<Option<V>>>>;

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), SimError> {
    let file = File::create(path).map_err(SimError::io_at(path))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, value).map_err(SimError::io_at(path))?;
    out.flush().map_err(SimError::io_at(path))
}

/// `size,temperature,bins,tau_mean,tau_err`, one row per key.
pub fn write_tau_table(path: &Path, stats: &[AggregatedStatistic]) -> Result<(), SimError> {
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .map_err(SimError::io_at(path))?;
    wtr.write_record(["size", "temperature", "bins", "tau_mean", "tau_err"])
        .map_err(SimError::io_at(path))?;
    for s in stats {
        wtr.write_record(&[
            s.size.to_string(),
            s.temperature.to_string(),
            s.bins.to_string(),
            s.tau_mean.to_string(),
            s.tau_err.to_string(),
        ])
        .map_err(SimError::io_at(path))?;
    }
    wtr.flush().map_err(SimError::io_at(path))
}
