// energy.rs - Nearest-neighbour Ising energy, coupling J = 1, no field

use crate::lattice::{Lattice, Spins};

/// Local energy `-s_i Σ_nbr s_nbr` of site `i`.
#[inline]
pub fn local_energy(lattice: &Lattice, spins: &Spins, i: usize) -> i64 {
    let field: i64 = lattice
        .neighbors(i)
        .iter()
        .map(|&j| spins.get(j) as i64)
        .sum();
    -(spins.get(i) as i64) * field
}

/// Total energy; every bond is seen from both ends, hence the halving.
pub fn total_energy(lattice: &Lattice, spins: &Spins) -> i64 {
    let doubled: i64 = (0..lattice.n_sites())
        .map(|i| local_energy(lattice, spins, i))
        .sum();
    doubled / 2
}

/// Energy change caused by flipping site `i`.
///
/// Equals `-2 · local_energy(i)` whenever no site is its own neighbour
/// (L ≥ 2). Self-bonds on the one-site torus are left out because flipping
/// both of their ends changes nothing, which keeps incremental bookkeeping
/// identical to [`total_energy`] for every L.
#[inline]
pub fn flip_delta(lattice: &Lattice, spins: &Spins, i: usize) -> i64 {
    let field: i64 = lattice
        .neighbors(i)
        .iter()
        .filter(|&&j| j != i)
        .map(|&j| spins.get(j) as i64)
        .sum();
    2 * spins.get(i) as i64 * field
}
