use ising::config::{temperature_range, Algorithm, SimConfig, SpinDumpConfig};
use ising::lattice::InitialState;
use ising::ErrorKind;
use tempfile::tempdir;

#[test]
fn test_presets_are_valid() {
    for alg in [Algorithm::Metropolis, Algorithm::Wolff] {
        SimConfig::preset(alg).validate().unwrap();
    }
    SpinDumpConfig::default().validate().unwrap();

    let cfg = SimConfig::metropolis();
    assert_eq!(cfg.sizes, vec![8, 10, 12, 14, 16, 18, 20]);
    assert_eq!(cfg.total_steps(), 20_000 * 400 + 10_000);
    assert_eq!(cfg.sample_spacing(Algorithm::Metropolis), 400);
    assert_eq!(SimConfig::wolff().sizes.last(), Some(&40));
    assert_eq!(SimConfig::wolff().sample_spacing(Algorithm::Wolff), 1);
}

#[test]
fn test_invalid_parameters_are_rejected() {
    let breakages: Vec<fn(&mut SimConfig)> = vec![
        |c: &mut SimConfig| c.sizes = vec![8, 0],
        |c: &mut SimConfig| c.sizes.clear(),
        |c: &mut SimConfig| c.temperatures.clear(),
        |c: &mut SimConfig| c.temperatures = vec![1.0, 0.0],
        |c: &mut SimConfig| c.temperatures = vec![-2.0],
        |c: &mut SimConfig| c.temperatures = vec![f64::NAN],
        |c: &mut SimConfig| c.temperatures = vec![f64::INFINITY],
        |c: &mut SimConfig| c.bins = 0,
        |c: &mut SimConfig| c.stride = 0,
        |c: &mut SimConfig| c.cutoff = 0,
        |c: &mut SimConfig| c.workers = Some(0),
    ];
    for (i, breakage) in breakages.into_iter().enumerate() {
        let mut cfg = SimConfig::metropolis();
        breakage(&mut cfg);
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration, "case {i}: {cfg:?}");
    }

    let dump = SpinDumpConfig {
        cycles: [(20, 0)].into_iter().collect(),
        ..SpinDumpConfig::default()
    };
    assert_eq!(dump.validate().unwrap_err().kind(), ErrorKind::Configuration);
}

#[test]
fn test_temperature_range_is_half_open() {
    let temps = temperature_range(1.6, 3.0, 0.1);
    assert_eq!(temps.len(), 14);
    assert_eq!(temps[0], 1.6);
    assert!((temps[13] - 2.9).abs() < 1e-9);
    assert!(temperature_range(1.0, 1.0, 0.1).is_empty());
    assert!(temperature_range(1.0, 2.0, 0.0).is_empty());
}

#[test]
fn test_cycles_per_size() {
    let cfg = SpinDumpConfig::default();
    assert_eq!(cfg.cycles_for(20), 20);
    assert_eq!(cfg.cycles_for(60), 100);
    assert_eq!(cfg.cycles_for(100), 200);
    assert_eq!(cfg.cycles_for(32), cfg.default_cycles);
}

#[test]
fn test_initial_state_threshold() {
    assert_eq!(InitialState::for_temperature(1.0, 1.1), InitialState::Ordered);
    assert_eq!(InitialState::for_temperature(1.1, 1.1), InitialState::Disordered);
    assert_eq!(InitialState::for_temperature(2.269, 1.1), InitialState::Disordered);
}

#[test]
fn test_json_config_files() {
    let dir = tempdir().unwrap();

    let full = SimConfig {
        seed: 42,
        bins: 3,
        ..SimConfig::wolff()
    };
    let path = dir.path().join("full.json");
    std::fs::write(&path, serde_json::to_string_pretty(&full).unwrap()).unwrap();
    assert_eq!(SimConfig::from_json_file(&path).unwrap(), full);

    // omitted fields fall back to the defaults
    let path = dir.path().join("partial.json");
    std::fs::write(&path, r#"{ "sizes": [4, 6], "seed": 7 }"#).unwrap();
    let partial = SimConfig::from_json_file(&path).unwrap();
    assert_eq!(partial.sizes, vec![4, 6]);
    assert_eq!(partial.seed, 7);
    assert_eq!(partial.sweeps, SimConfig::default().sweeps);

    let path = dir.path().join("dump.json");
    std::fs::write(&path, r#"{ "cycles": { "8": 5 }, "samples": 3 }"#).unwrap();
    let dump = SpinDumpConfig::from_json_file(&path).unwrap();
    assert_eq!(dump.cycles_for(8), 5);
    assert_eq!(dump.samples, 3);

    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ sizes: ").unwrap();
    assert_eq!(SimConfig::from_json_file(&path).unwrap_err().kind(), ErrorKind::Io);
    assert_eq!(
        SimConfig::from_json_file(&dir.path().join("absent.json")).unwrap_err().kind(),
        ErrorKind::Io
    );
}
