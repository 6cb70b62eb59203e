// aggregate.rs - Mean and standard error of tau / rho across independent bins

use std::collections::BTreeMap;

use serde::Serialize;

use crate::autocorrelation::AutocorrelationResult;

/// Cross-bin statistics for one (size, temperature) key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedStatistic {
    pub size: usize,
    pub temperature: f64,
    /// Number of bins that contributed.
    pub bins: usize,
    pub tau_mean: f64,
    pub tau_err: f64,
    /// Element-wise over the lags every contributing bin reached.
    pub rho_mean: Vec<f64>,
    pub rho_err: Vec<f64>,
}

/// Arithmetic mean and `σ_pop / √n` of `values`. Empty input gives NaNs.
pub fn mean_and_err(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt() / n.sqrt())
}

/// Combine the per-bin results of a single key.
///
/// Bins truncate their rho sequences at different lags, so rho statistics
/// cover the common prefix only. Returns `None` when no bin is available.
pub fn aggregate_key(
    size: usize,
    temperature: f64,
    results: &[&AutocorrelationResult],
) -> Option<AggregatedStatistic> {
    if results.is_empty() {
        return None;
    }

    let taus: Vec<f64> = results.iter().map(|r| r.tau).collect();
    let (tau_mean, tau_err) = mean_and_err(&taus);

    let common = results.iter().map(|r| r.rho.len()).min().unwrap_or(0);
    let (rho_mean, rho_err): (Vec<f64>, Vec<f64>) = (0..common)
        .map(|t| {
            let column: Vec<f64> = results.iter().map(|r| r.rho[t]).collect();
            mean_and_err(&column)
        })
        .unzip();

    Some(AggregatedStatistic {
        size,
        temperature,
        bins: results.len(),
        tau_mean,
        tau_err,
        rho_mean,
        rho_err,
    })
}

/// Group successful per-bin results by (size, temperature) and aggregate each
/// group. Output is ordered by size, then temperature, following the order of
/// the input sizes and temperatures.
pub fn aggregate<'a, I>(
    sizes: &[usize],
    temperatures: &[f64],
    results: I,
) -> Vec<AggregatedStatistic>
where
    I: IntoIterator<Item = (usize, usize, &'a AutocorrelationResult)>,
{
    // keyed by (size index, temperature index)
    let mut groups: BTreeMap<(usize, usize), Vec<&AutocorrelationResult>> = BTreeMap::new();
    for (size_idx, temp_idx, result) in results {
        groups.entry((size_idx, temp_idx)).or_default().push(result);
    }

    groups
        .into_iter()
        .filter_map(|((s, t), group)| aggregate_key(sizes[s], temperatures[t], &group))
        .collect()
}
