// lattice.rs - Periodic square lattice and the spin array living on it

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Site variable, always `+1` or `-1`.
pub type Spin = i8;

/// Immutable 4-neighbour adjacency of an `L × L` torus, row-major sites.
#[derive(Debug, Clone)]
pub struct Lattice {
    side: usize,
    neighbors: Vec<[usize; 4]>,
}

impl Lattice {
    /// Build the adjacency for side `l`. Neighbours are stored in the order
    /// east, north, west, south. `l = 1` yields a site that neighbours itself.
    pub fn new(l: usize) -> Self {
        let n = l * l;
        let neighbors = (0..n)
            .map(|i| {
                let row = i / l;
                let col = i % l;
                [
                    row * l + (col + 1) % l,
                    (i + l) % n,
                    row * l + (col + l - 1) % l,
                    (i + n - l) % n,
                ]
            })
            .collect();
        Self { side: l, neighbors }
    }

    #[inline(always)]
    pub fn side(&self) -> usize {
        self.side
    }

    /// Number of sites N = L².
    #[inline(always)]
    pub fn n_sites(&self) -> usize {
        self.neighbors.len()
    }

    #[inline(always)]
    pub fn neighbors(&self, i: usize) -> &[usize; 4] {
        &self.neighbors[i]
    }
}

/// How a run seeds its spin array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitialState {
    /// Every spin `+1` (cold start).
    Ordered,
    /// Every spin independently `±1` with probability ½ (hot start).
    Disordered,
}

impl InitialState {
    /// Cold start strictly below `threshold`, hot start otherwise.
    pub fn for_temperature(temperature: f64, threshold: f64) -> Self {
        if temperature < threshold {
            InitialState::Ordered
        } else {
            InitialState::Disordered
        }
    }
}

/// Spin configuration owned by exactly one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spins {
    values: Vec<Spin>,
}

impl Spins {
    pub fn ordered(n: usize) -> Self {
        Self { values: vec![1; n] }
    }

    pub fn disordered(n: usize, rng: &mut impl Rng) -> Self {
        let values = (0..n)
            .map(|_| if rng.gen_bool(0.5) { 1 } else { -1 })
            .collect();
        Self { values }
    }

    pub fn prepare(n: usize, state: InitialState, rng: &mut impl Rng) -> Self {
        match state {
            InitialState::Ordered => Self::ordered(n),
            InitialState::Disordered => Self::disordered(n, rng),
        }
    }

    /// Wrap an explicit array. Any value other than `+1`/`-1` is rejected.
    pub fn from_values(values: Vec<Spin>) -> Option<Self> {
        values
            .iter()
            .all(|&s| s == 1 || s == -1)
            .then_some(Self { values })
    }

    #[inline(always)]
    pub fn get(&self, i: usize) -> Spin {
        self.values[i]
    }

    #[inline(always)]
    pub fn flip(&mut self, i: usize) {
        self.values[i] = -self.values[i];
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Σ s_i over all sites.
    pub fn magnetization(&self) -> i64 {
        self.values.iter().map(|&s| s as i64).sum()
    }

    pub fn as_slice(&self) -> &[Spin] {
        &self.values
    }
}
