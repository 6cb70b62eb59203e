// metropolis.rs - Single-spin-flip Metropolis chain for the 2D Ising model

use std::sync::Arc;

use rand::Rng;

use crate::energy::{flip_delta, total_energy};
use crate::lattice::{InitialState, Lattice, Spins};

/// Lifecycle of one chain. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Equilibrating,
    Sampling,
    Done,
}

/// Returned by [`MetropolisChain::step`], allows O(1) book‑keeping in the driver.
#[derive(Debug, Clone, Copy)]
pub struct StepInfo {
    pub site: usize,
    pub accepted: bool,
    pub delta_e: i64, // 0 if rejected
}

/// Energy and magnetization samples, recorded in lock-step.
#[derive(Debug, Clone, Default)]
pub struct MetropolisSeries {
    pub energy: Vec<f64>,
    pub magnetization: Vec<f64>,
}

/// Metropolis acceptance test at temperature `t` (k_B = J = 1).
///
/// Downhill and neutral moves are always taken; uphill moves with
/// probability `exp(-dE/T)`. The exponent is strictly negative here.
#[inline]
pub fn accept(delta_e: i64, temperature: f64, rng: &mut impl Rng) -> bool {
    if delta_e <= 0 {
        true
    } else {
        rng.gen::<f64>() < (-(delta_e as f64) / temperature).exp()
    }
}

/// One Markov chain: spins, running energy and temperature.
#[derive(Debug, Clone)]
pub struct MetropolisChain {
    lattice: Arc<Lattice>,
    spins: Spins,
    temperature: f64,
    energy: i64,
    magnetization: i64,
    phase: Phase,
    attempts: u64,
    accepted: u64,
}

impl MetropolisChain {
    /// Prepare the initial state and compute its energy once.
    pub fn new(
        lattice: Arc<Lattice>,
        temperature: f64,
        start: InitialState,
        rng: &mut impl Rng,
    ) -> Self {
        let spins = Spins::prepare(lattice.n_sites(), start, rng);
        Self::from_spins(lattice, temperature, spins)
    }

    /// Start from an explicit configuration.
    pub fn from_spins(lattice: Arc<Lattice>, temperature: f64, spins: Spins) -> Self {
        assert_eq!(spins.len(), lattice.n_sites(), "spin array does not fit lattice");
        let energy = total_energy(&lattice, &spins);
        let magnetization = spins.magnetization();
        Self {
            lattice,
            spins,
            temperature,
            energy,
            magnetization,
            phase: Phase::Initializing,
            attempts: 0,
            accepted: 0,
        }
    }

    /// Attempt one flip of a uniformly chosen site.
    pub fn step(&mut self, rng: &mut impl Rng) -> StepInfo {
        let site = rng.gen_range(0..self.lattice.n_sites());
        let delta_e = flip_delta(&self.lattice, &self.spins, site);
        self.attempts += 1;

        if accept(delta_e, self.temperature, rng) {
            self.spins.flip(site);
            self.energy += delta_e;
            self.magnetization += 2 * self.spins.get(site) as i64;
            self.accepted += 1;
            StepInfo { site, accepted: true, delta_e }
        } else {
            StepInfo { site, accepted: false, delta_e: 0 }
        }
    }

    /// Run `total_steps` attempts. Samples `(E, M)` at every step index
    /// `≥ eq_steps` that is a multiple of `sample_stride`.
    pub fn run(
        &mut self,
        total_steps: usize,
        eq_steps: usize,
        sample_stride: usize,
        rng: &mut impl Rng,
    ) -> MetropolisSeries {
        assert!(sample_stride > 0, "sample stride must be positive");
        let expected = total_steps.saturating_sub(eq_steps) / sample_stride + 1;
        let mut series = MetropolisSeries {
            energy: Vec::with_capacity(expected),
            magnetization: Vec::with_capacity(expected),
        };

        self.phase = Phase::Equilibrating;
        for step in 0..total_steps {
            self.step(rng);
            if step >= eq_steps {
                self.phase = Phase::Sampling;
                if step % sample_stride == 0 {
                    series.energy.push(self.energy as f64);
                    series.magnetization.push(self.magnetization as f64);
                }
            }
        }
        self.phase = Phase::Done;
        series
    }

    /// Running energy maintained from accepted deltas.
    #[inline(always)]
    pub fn energy(&self) -> i64 {
        self.energy
    }

    #[inline(always)]
    pub fn magnetization(&self) -> i64 {
        self.magnetization
    }

    pub fn spins(&self) -> &Spins {
        &self.spins
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Fraction of accepted attempts since construction.
    pub fn acceptance_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempts as f64
        }
    }
}
