use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use ising::lattice::{InitialState, Lattice, Spin, Spins};
use ising::wolff::{bond_probability, FlipOrder, WolffChain};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Connected same-spin domain containing `seed`.
fn domain(lattice: &Lattice, spins: &Spins, seed: usize) -> HashSet<usize> {
    let target = spins.get(seed);
    let mut seen = HashSet::from([seed]);
    let mut queue = VecDeque::from([seed]);
    while let Some(j) = queue.pop_front() {
        for &l in lattice.neighbors(j) {
            if spins.get(l) == target && seen.insert(l) {
                queue.push_back(l);
            }
        }
    }
    seen
}

#[test]
fn test_bond_probability() {
    assert!((bond_probability(2.0) - (1.0 - (-1.0f64).exp())).abs() < 1e-15);
    assert!(bond_probability(1e6) < 1e-5);
    assert_eq!(bond_probability(0.05), 1.0);
}

#[test]
fn test_each_site_flipped_at_most_once() {
    let mut rng = ChaCha20Rng::seed_from_u64(31);
    let lattice = Arc::new(Lattice::new(8));
    for order in [FlipOrder::Deferred, FlipOrder::Immediate] {
        let mut chain =
            WolffChain::new(Arc::clone(&lattice), 2.269, InitialState::Disordered, &mut rng)
                .with_flip_order(order);
        for _ in 0..300 {
            let before = chain.spins().clone();
            let size = chain.grow_cluster(&mut rng);

            let cluster = chain.last_cluster();
            let members: HashSet<usize> = cluster.iter().copied().collect();
            assert_eq!(members.len(), cluster.len(), "{order:?}: duplicate member");
            assert_eq!(size, cluster.len());

            let changed: HashSet<usize> = (0..lattice.n_sites())
                .filter(|&i| before.get(i) != chain.spins().get(i))
                .collect();
            assert_eq!(changed, members, "{order:?}: flipped sites differ from cluster");

            // all members carried the seed's value before the move
            let target = before.get(cluster[0]);
            assert!(cluster.iter().all(|&i| before.get(i) == target));
        }
    }
}

#[test]
fn test_infinite_temperature_cluster_is_seed() {
    let mut rng = ChaCha20Rng::seed_from_u64(32);
    let lattice = Arc::new(Lattice::new(8));
    let mut chain = WolffChain::new(lattice, 1e6, InitialState::Ordered, &mut rng);
    let singles = (0..1_000).filter(|_| chain.grow_cluster(&mut rng) == 1).count();
    assert!(singles >= 990, "only {singles} single-site clusters");
}

#[test]
fn test_zero_temperature_cluster_is_domain() {
    let mut rng = ChaCha20Rng::seed_from_u64(33);
    let lattice = Arc::new(Lattice::new(8));
    for _ in 0..50 {
        let spins = Spins::prepare(lattice.n_sites(), InitialState::Disordered, &mut rng);
        let mut chain = WolffChain::from_spins(Arc::clone(&lattice), 0.05, spins.clone());
        chain.grow_cluster(&mut rng);

        let cluster: HashSet<usize> = chain.last_cluster().iter().copied().collect();
        let seed = chain.last_cluster()[0];
        assert_eq!(cluster, domain(&lattice, &spins, seed));
    }
}

#[test]
fn test_flip_orders_give_identical_trajectories() {
    let lattice = Arc::new(Lattice::new(10));
    let start = Spins::prepare(100, InitialState::Disordered, &mut ChaCha20Rng::seed_from_u64(9));

    let mut deferred = WolffChain::from_spins(Arc::clone(&lattice), 2.269, start.clone());
    let mut immediate = WolffChain::from_spins(Arc::clone(&lattice), 2.269, start)
        .with_flip_order(FlipOrder::Immediate);
    let mut rng_a = ChaCha20Rng::seed_from_u64(10);
    let mut rng_b = ChaCha20Rng::seed_from_u64(10);

    for step in 0..500 {
        let a = deferred.grow_cluster(&mut rng_a);
        let b = immediate.grow_cluster(&mut rng_b);
        assert_eq!(a, b, "cluster size at step {step}");
        assert_eq!(deferred.spins(), immediate.spins(), "configuration at step {step}");
    }
}

#[test]
fn test_magnetization_series() {
    let mut rng = ChaCha20Rng::seed_from_u64(34);
    let lattice = Arc::new(Lattice::new(6));
    let n = lattice.n_sites() as i64;
    let mut chain = WolffChain::new(lattice, 2.269, InitialState::Ordered, &mut rng);
    let series = chain.run_magnetization(250, 20, 3, &mut rng);

    assert_eq!(series.len(), 250);
    for &m in &series {
        let m = m as i64;
        assert!(m.abs() <= n);
        assert_eq!((m - n).rem_euclid(2), 0, "M must have the parity of N");
    }
    assert_eq!(*series.last().unwrap() as i64, chain.spins().magnetization());
    assert!(chain.mean_cluster_size() >= 1.0);
}

#[test]
fn test_ordered_phase_below_tc() {
    let mut rng = ChaCha20Rng::seed_from_u64(35);
    let lattice = Arc::new(Lattice::new(16));
    let n = lattice.n_sites() as f64;
    let mut chain = WolffChain::new(lattice, 1.5, InitialState::Ordered, &mut rng);
    let series = chain.run_magnetization(2_000, 200, 1, &mut rng);
    // clusters flip the whole magnetised domain, so only |m| stays away from 0
    let mean_abs = series.iter().map(|m| m.abs()).sum::<f64>() / series.len() as f64 / n;
    assert!(mean_abs > 0.9, "<|m|> = {mean_abs:.3} at T=1.5");
}

#[test]
fn test_disordered_phase_above_tc() {
    let mut rng = ChaCha20Rng::seed_from_u64(36);
    let lattice = Arc::new(Lattice::new(16));
    let n = lattice.n_sites() as f64;
    let mut chain = WolffChain::new(lattice, 4.0, InitialState::Ordered, &mut rng);
    let series = chain.run_magnetization(2_000, 20_000, 50, &mut rng);
    let mean = series.iter().sum::<f64>() / series.len() as f64 / n;
    assert!(mean.abs() < 0.1, "<m> = {mean:.3} at T=4.0");
}

#[test]
fn test_configuration_dump_into_memory() {
    let mut rng = ChaCha20Rng::seed_from_u64(37);
    let lattice = Arc::new(Lattice::new(5));
    let mut chain = WolffChain::new(lattice, 2.0, InitialState::Ordered, &mut rng)
        .with_flip_order(FlipOrder::Immediate);

    let mut snapshots: Vec<Vec<Spin>> = Vec::new();
    chain
        .run_configuration_dump(50, 12, 4, &mut snapshots, &mut rng)
        .unwrap();

    assert_eq!(snapshots.len(), 12);
    assert!(snapshots.iter().all(|s| s.len() == 25));
    assert!(snapshots.iter().flatten().all(|&s| s == 1 || s == -1));
    assert_eq!(snapshots.last().unwrap().as_slice(), chain.spins().as_slice());
    // the configured order is restored afterwards
    assert_eq!(chain.flip_order(), FlipOrder::Immediate);
}
