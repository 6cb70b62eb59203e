use std::collections::HashSet;
use std::fs;

use indicatif::ProgressBar;
use ising::config::{Algorithm, Observable, SimConfig, SpinDumpConfig};
use ising::coordinator::{run_keys, Coordinator, WorkerPool};
use ising::io::{read_series, read_spin_dump, series_file_name, write_series};
use ising::lattice::InitialState;
use ising::ErrorKind;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64;
use tempfile::tempdir;

fn small_scan() -> SimConfig {
    SimConfig {
        sweeps: 50,
        eq_steps: 100,
        stride: 16,
        temperatures: vec![1.0, 3.0],
        sizes: vec![4],
        bins: 2,
        cutoff: 20,
        seed: 9,
        workers: Some(2),
        ..SimConfig::metropolis()
    }
}

fn correlated(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let mut value = 0.0;
    (0..len)
        .map(|_| {
            value = 0.5 * value + noise.sample(&mut rng);
            value
        })
        .collect()
}

#[test]
fn test_run_keys_cover_the_grid_once() {
    let keys = run_keys(&[8, 12, 16], &[1.0, 2.269], 4);
    assert_eq!(keys.len(), 24);
    assert_eq!((keys[0].bin, keys[0].size, keys[0].temperature), (0, 8, 1.0));
    assert_eq!((keys[1].bin, keys[1].size, keys[1].temperature), (0, 8, 2.269));
    assert_eq!(keys[23].bin, 3);

    let streams: HashSet<u64> = keys.iter().map(|k| k.stream()).collect();
    assert_eq!(streams.len(), keys.len());
    assert_eq!(keys[2].to_string(), "bin=0 L=12 T=1.000");
}

#[test]
fn test_worker_pool() {
    let err = WorkerPool::new(Some(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(Coordinator::new(Some(0)).is_err());

    let pool = WorkerPool::new(Some(3)).unwrap();
    assert_eq!(pool.workers(), 3);
    let out = pool.run_all((0..50u64).collect(), |x| x * x, &ProgressBar::hidden());
    assert_eq!(out, (0..50u64).map(|x| x * x).collect::<Vec<_>>());

    assert!(WorkerPool::new(None).unwrap().workers() >= 1);
}

#[test]
fn test_invalid_scan_is_rejected_before_dispatch() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("never");
    let cfg = SimConfig {
        sizes: vec![],
        ..small_scan()
    };

    let coordinator = Coordinator::new(Some(1)).unwrap();
    let err = coordinator.simulate(&cfg, Algorithm::Metropolis, &out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!out.exists());
}

#[test]
fn test_metropolis_scan_writes_every_series() {
    let dir = tempdir().unwrap();
    let cfg = small_scan();
    let coordinator = Coordinator::new(cfg.workers).unwrap();
    let reports = coordinator.simulate(&cfg, Algorithm::Metropolis, dir.path()).unwrap();

    assert_eq!(reports.len(), 4);
    for report in &reports {
        let files = report.outcome.as_ref().unwrap();
        assert_eq!(files.len(), 2);
    }

    for bin in 0..cfg.bins {
        for &t in &cfg.temperatures {
            for obs in [Observable::Magnetization, Observable::Energy] {
                let name = series_file_name(bin, 4, t, obs, Algorithm::Metropolis, &cfg);
                let series = read_series(&dir.path().join(&name)).unwrap();
                assert_eq!(series.len(), cfg.sweeps, "{name}");
            }
        }
    }

    // cold start at T = 1 on a 4x4 lattice stays near saturation
    let name = series_file_name(0, 4, 1.0, Observable::Magnetization, Algorithm::Metropolis, &cfg);
    let m = read_series(&dir.path().join(name)).unwrap();
    assert!(m.iter().sum::<f64>() / m.len() as f64 > 12.0);
}

#[test]
fn test_results_do_not_depend_on_worker_count() {
    let cfg = small_scan();
    let one = tempdir().unwrap();
    let many = tempdir().unwrap();

    Coordinator::new(Some(1))
        .unwrap()
        .simulate(&cfg, Algorithm::Wolff, one.path())
        .unwrap();
    Coordinator::new(Some(4))
        .unwrap()
        .simulate(&cfg, Algorithm::Wolff, many.path())
        .unwrap();

    for bin in 0..cfg.bins {
        for &t in &cfg.temperatures {
            let name =
                series_file_name(bin, 4, t, Observable::Magnetization, Algorithm::Wolff, &cfg);
            let a = fs::read_to_string(one.path().join(&name)).unwrap();
            let b = fs::read_to_string(many.path().join(&name)).unwrap();
            assert_eq!(a, b, "{name}");
        }
    }

    let name = series_file_name(0, 4, 1.0, Observable::Energy, Algorithm::Wolff, &cfg);
    assert!(!one.path().join(name).exists());
}

#[test]
fn test_analysis_excludes_failed_bins() {
    let series_dir = tempdir().unwrap();
    let results_dir = tempdir().unwrap();
    let cfg = SimConfig {
        sizes: vec![4, 8],
        temperatures: vec![2.0],
        bins: 3,
        cutoff: 20,
        workers: Some(2),
        ..SimConfig::metropolis()
    };
    let path = |bin, size| {
        series_dir.path().join(series_file_name(
            bin,
            size,
            2.0,
            Observable::Magnetization,
            Algorithm::Metropolis,
            &cfg,
        ))
    };

    write_series(&path(0, 4), &correlated(5000, 1)).unwrap();
    write_series(&path(1, 4), &correlated(5000, 2)).unwrap();
    write_series(&path(2, 4), &vec![16.0; 5000]).unwrap();
    write_series(&path(0, 8), &correlated(5000, 3)).unwrap();
    // bin 1 of L=8 is missing
    write_series(&path(2, 8), &correlated(5000, 4)).unwrap();

    let report = Coordinator::new(cfg.workers)
        .unwrap()
        .analyze(
            &cfg,
            Algorithm::Metropolis,
            Observable::Magnetization,
            series_dir.path(),
            results_dir.path(),
        )
        .unwrap();

    assert_eq!(report.units.len(), 6);
    let failures: Vec<_> = report.failures().map(|(k, e)| (k.bin, k.size, e.kind())).collect();
    assert_eq!(failures.len(), 2);
    assert!(failures.contains(&(2, 4, ErrorKind::NumericDegeneracy)));
    assert!(failures.contains(&(1, 8, ErrorKind::Io)));

    assert_eq!(report.aggregated.len(), 2);
    for stat in &report.aggregated {
        assert_eq!(stat.bins, 2);
        // rho(1) of the generating process is 0.5
        assert!(stat.tau_mean > 1.5 && stat.tau_mean < 4.0, "tau = {}", stat.tau_mean);
        assert_eq!(stat.rho_mean[0], 1.0);
    }

    assert_eq!(report.files.len(), 4);
    for file in &report.files {
        assert!(file.exists(), "{}", file.display());
    }
    let tau: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report.files[0]).unwrap()).unwrap();
    assert!(tau["2"]["2.000"][0].is_null());
    assert!(tau["2"]["2.000"][1].is_number());
    assert!(tau["1"]["2.000"][1].is_null());
    assert!(tau["0"]["2.000"][0].is_number());
}

#[test]
fn test_spin_dump_scan() {
    let dir = tempdir().unwrap();
    let cfg = SpinDumpConfig {
        sizes: vec![4, 6],
        temperatures: vec![2.0, 3.0],
        warmup: 10,
        samples: 5,
        cycles: [(6, 3)].into_iter().collect(),
        default_cycles: 2,
        start: InitialState::Disordered,
        seed: 1,
        workers: Some(2),
    };
    let reports = Coordinator::new(cfg.workers)
        .unwrap()
        .dump_spin_configurations(&cfg, dir.path())
        .unwrap();
    assert_eq!(reports.len(), 4);

    let small = dir.path().join("spin_config_4L_2.0T_2flips.dat");
    let snapshots = read_spin_dump(&small).unwrap();
    assert_eq!(snapshots.len(), 5);
    assert!(snapshots.iter().all(|s| s.len() == 16));

    let large = read_spin_dump(&dir.path().join("spin_config_6L_3.0T_3flips.dat")).unwrap();
    assert_eq!(large.len(), 5);
    assert!(large.iter().all(|s| s.len() == 36));

    // rerunning truncates instead of appending
    Coordinator::new(Some(1))
        .unwrap()
        .dump_spin_configurations(&cfg, dir.path())
        .unwrap();
    assert_eq!(read_spin_dump(&small).unwrap(), snapshots);
}
