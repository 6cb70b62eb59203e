// wolff.rs - Wolff single-cluster updates for the 2D Ising model
//
// Cluster growth keeps an explicit stack of pending sites and a membership
// array indexed by site, so each pop and each membership test is O(1).

use std::sync::Arc;

use rand::Rng;

use crate::error::SimError;
use crate::lattice::{InitialState, Lattice, Spin, Spins};

/// When cluster members are flipped relative to the growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlipOrder {
    /// Grow the whole cluster first, then flip every member once.
    #[default]
    Deferred,
    /// Flip each site as it joins, testing candidates against the seed's
    /// original value. Same distribution as `Deferred`.
    Immediate,
}

/// Bond activation probability `1 - exp(-2/T)` at coupling 1.
#[inline]
pub fn bond_probability(temperature: f64) -> f64 {
    1.0 - (-2.0 / temperature).exp()
}

/// Receives one full spin configuration per sample.
pub trait SnapshotSink {
    fn record(&mut self, spins: &[Spin]) -> Result<(), SimError>;
}

impl SnapshotSink for Vec<Vec<Spin>> {
    fn record(&mut self, spins: &[Spin]) -> Result<(), SimError> {
        self.push(spins.to_vec());
        Ok(())
    }
}

/// Cluster-update Markov chain.
#[derive(Debug, Clone)]
pub struct WolffChain {
    lattice: Arc<Lattice>,
    spins: Spins,
    p_add: f64,
    order: FlipOrder,
    stack: Vec<usize>,
    in_cluster: Vec<bool>,
    cluster: Vec<usize>,
    grown: u64,
    flipped_total: u64,
}

impl WolffChain {
    pub fn new(
        lattice: Arc<Lattice>,
        temperature: f64,
        start: InitialState,
        rng: &mut impl Rng,
    ) -> Self {
        let spins = Spins::prepare(lattice.n_sites(), start, rng);
        Self::from_spins(lattice, temperature, spins)
    }

    pub fn from_spins(lattice: Arc<Lattice>, temperature: f64, spins: Spins) -> Self {
        assert_eq!(spins.len(), lattice.n_sites(), "spin array does not fit lattice");
        let n = lattice.n_sites();
        Self {
            lattice,
            spins,
            p_add: bond_probability(temperature),
            order: FlipOrder::Deferred,
            stack: Vec::with_capacity(n),
            in_cluster: vec![false; n],
            cluster: Vec::with_capacity(n),
            grown: 0,
            flipped_total: 0,
        }
    }

    pub fn with_flip_order(mut self, order: FlipOrder) -> Self {
        self.order = order;
        self
    }

    /// Grow and flip one cluster; returns its size.
    pub fn grow_cluster(&mut self, rng: &mut impl Rng) -> usize {
        let seed = rng.gen_range(0..self.lattice.n_sites());
        match self.order {
            FlipOrder::Deferred => self.grow_deferred(seed, rng),
            FlipOrder::Immediate => self.grow_immediate(seed, rng),
        }
        self.grown += 1;
        self.flipped_total += self.cluster.len() as u64;
        self.cluster.len()
    }

    fn grow_deferred(&mut self, seed: usize, rng: &mut impl Rng) {
        let target = self.spins.get(seed);
        self.cluster.clear();
        self.stack.clear();
        self.stack.push(seed);
        self.cluster.push(seed);
        self.in_cluster[seed] = true;

        while let Some(j) = self.stack.pop() {
            for &l in self.lattice.neighbors(j) {
                if self.spins.get(l) == target
                    && !self.in_cluster[l]
                    && rng.gen::<f64>() < self.p_add
                {
                    self.in_cluster[l] = true;
                    self.stack.push(l);
                    self.cluster.push(l);
                }
            }
        }

        for &site in &self.cluster {
            self.spins.flip(site);
            self.in_cluster[site] = false;
        }
    }

    fn grow_immediate(&mut self, seed: usize, rng: &mut impl Rng) {
        // A flipped site no longer equals `target`, which is what keeps it
        // from joining twice.
        let target = self.spins.get(seed);
        self.cluster.clear();
        self.stack.clear();
        self.spins.flip(seed);
        self.stack.push(seed);
        self.cluster.push(seed);

        while let Some(j) = self.stack.pop() {
            for &l in self.lattice.neighbors(j) {
                if self.spins.get(l) == target && rng.gen::<f64>() < self.p_add {
                    self.spins.flip(l);
                    self.stack.push(l);
                    self.cluster.push(l);
                }
            }
        }
    }

    /// Equilibrate for `eq_cycles` clusters, then record `M = Σ s` after every
    /// `cycles_per_sample` clusters, `total_samples` times.
    pub fn run_magnetization(
        &mut self,
        total_samples: usize,
        eq_cycles: usize,
        cycles_per_sample: usize,
        rng: &mut impl Rng,
    ) -> Vec<f64> {
        for _ in 0..eq_cycles {
            self.grow_cluster(rng);
        }
        let mut series = Vec::with_capacity(total_samples);
        for _ in 0..total_samples {
            for _ in 0..cycles_per_sample {
                self.grow_cluster(rng);
            }
            series.push(self.spins.magnetization() as f64);
        }
        series
    }

    /// Warm up for `n_warmup` clusters, then hand `n_samples` full
    /// configurations to `sink`, `cycles_between_samples` clusters apart.
    /// Always uses deferred flips regardless of the configured order.
    pub fn run_configuration_dump<S: SnapshotSink + ?Sized>(
        &mut self,
        n_warmup: usize,
        n_samples: usize,
        cycles_between_samples: usize,
        sink: &mut S,
        rng: &mut impl Rng,
    ) -> Result<(), SimError> {
        let previous = std::mem::replace(&mut self.order, FlipOrder::Deferred);
        for _ in 0..n_warmup {
            self.grow_cluster(rng);
        }
        let mut outcome = Ok(());
        for _ in 0..n_samples {
            for _ in 0..cycles_between_samples {
                self.grow_cluster(rng);
            }
            outcome = sink.record(self.spins.as_slice());
            if outcome.is_err() {
                break;
            }
        }
        self.order = previous;
        outcome
    }

    pub fn spins(&self) -> &Spins {
        &self.spins
    }

    pub fn bond_probability(&self) -> f64 {
        self.p_add
    }

    pub fn flip_order(&self) -> FlipOrder {
        self.order
    }

    /// Sites of the most recent cluster, in the order they joined.
    pub fn last_cluster(&self) -> &[usize] {
        &self.cluster
    }

    /// Mean cluster size over every growth so far.
    pub fn mean_cluster_size(&self) -> f64 {
        if self.grown == 0 {
            0.0
        } else {
            self.flipped_total as f64 / self.grown as f64
        }
    }
}
