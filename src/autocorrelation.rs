// autocorrelation.rs - Autocorrelation function and integrated autocorrelation time

use serde::{Deserialize, Serialize};

use crate::error::{Degeneracy, SimError};

/// Offset the tau sum starts from. `rho(0)` is not added on top, so values
/// are 1 lower than estimators that sum from lag 0 with the same offset.
pub const TAU_OFFSET: f64 = 1.5;

/// At or below this spread of the last two lags the geometric tail is skipped.
pub const TAIL_TOLERANCE: f64 = 1e-15;

/// Smallest `|1 - r|` the tail correction accepts; anything closer to 1 is
/// reported as [`Degeneracy::FlatTail`].
pub const FLAT_RATIO_TOLERANCE: f64 = 1e-12;

/// Variance below this fraction of `<O²>` is rounding noise of a constant series.
const VARIANCE_FLOOR: f64 = 1e-12;

/// Correlation sequence and integrated time of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocorrelationResult {
    /// `rho(0..k)`, truncated before the first non-positive lag.
    pub rho: Vec<f64>,
    pub tau: f64,
    /// Length of the input series.
    pub samples: usize,
}

/// Moments of a scalar time series plus lagged products on demand.
#[derive(Debug, Clone, Copy)]
pub struct Autocorrelation<'a> {
    data: &'a [f64],
    mean: f64,
    variance: f64,
}

impl<'a> Autocorrelation<'a> {
    /// Compute `<O>` and `<O²> - <O>²`. A non-positive variance (including an
    /// empty series) is a [`Degeneracy::ZeroVariance`].
    pub fn new(data: &'a [f64]) -> Result<Self, SimError> {
        let m = data.len() as f64;
        let mean = data.iter().sum::<f64>() / m;
        let mean_sq = data.iter().map(|&x| x * x).sum::<f64>() / m;
        let variance = mean_sq - mean * mean;

        if data.is_empty() || !(variance > VARIANCE_FLOOR * mean_sq) {
            return Err(Degeneracy::ZeroVariance {
                variance: if variance.is_nan() { 0.0 } else { variance },
            }
            .into());
        }
        Ok(Self { data, mean, variance })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// `(1/(M-j)) Σ_{i<M-j} O_i O_{i+j}`. Requires `lag < M`.
    pub fn unnormalized(&self, lag: usize) -> f64 {
        let pairs = self.data.len() - lag;
        let sum: f64 = self.data[..pairs]
            .iter()
            .zip(&self.data[lag..])
            .map(|(a, b)| a * b)
            .sum();
        sum / pairs as f64
    }

    /// Normalised correlation `rho(lag)`.
    pub fn rho(&self, lag: usize) -> f64 {
        (self.unnormalized(lag) - self.mean * self.mean) / self.variance
    }

    /// Effective cutoff `min(M, cutoff)`.
    pub fn window(&self, cutoff: usize) -> usize {
        self.data.len().min(cutoff)
    }

    /// Untruncated `rho(0..window)`.
    pub fn correlation_function(&self, cutoff: usize) -> Vec<f64> {
        (0..self.window(cutoff)).map(|t| self.rho(t)).collect()
    }

    /// Scan lags until the first non-positive correlation, accumulating tau.
    /// Lags past the truncation point are never evaluated.
    pub fn estimate(&self, cutoff: usize) -> Result<AutocorrelationResult, SimError> {
        let (rho, tau) = scan(self.window(cutoff), |t| self.rho(t))?;
        Ok(AutocorrelationResult {
            rho,
            tau,
            samples: self.data.len(),
        })
    }
}

/// Estimate correlation sequence and tau of `series` up to `cutoff` lags.
pub fn estimate(series: &[f64], cutoff: usize) -> Result<AutocorrelationResult, SimError> {
    Autocorrelation::new(series)?.estimate(cutoff)
}

/// Integrated time from an already computed correlation sequence.
pub fn integrated_time(rho: &[f64]) -> Result<f64, SimError> {
    scan(rho.len(), |t| rho[t]).map(|(_, tau)| tau)
}

/// `rho(0)` is 1 by construction and is folded into [`TAU_OFFSET`]; positive
/// lags from 1 on are summed. At the first non-positive lag `t` the remaining
/// decay is modelled as geometric with ratio `rho(t-1)/rho(t-2)`. Two equal
/// lags (within [`TAIL_TOLERANCE`]) get no correction; a ratio that differs
/// from 1 by less than [`FLAT_RATIO_TOLERANCE`] is degenerate.
fn scan(
    window: usize,
    mut rho_at: impl FnMut(usize) -> f64,
) -> Result<(Vec<f64>, f64), SimError> {
    let mut kept: Vec<f64> = Vec::with_capacity(window);
    let mut tau = TAU_OFFSET;

    for t in 0..window {
        let r = rho_at(t);
        if r > 0.0 {
            if t > 0 {
                tau += r;
            }
            kept.push(r);
            continue;
        }

        if t < 2 {
            return Err(Degeneracy::ShortHistory { lag: t }.into());
        }
        let last = kept[t - 1];
        let before = kept[t - 2];
        if (last - before).abs() > TAIL_TOLERANCE {
            let denominator = 1.0 - last / before;
            if denominator.abs() < FLAT_RATIO_TOLERANCE {
                return Err(Degeneracy::FlatTail { lag: t }.into());
            }
            let correction = -last / denominator;
            if !correction.is_finite() {
                return Err(Degeneracy::NonFiniteTail { lag: t }.into());
            }
            tau += correction;
        }
        break;
    }

    Ok((kept, tau))
}
