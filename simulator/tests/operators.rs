use std::fs;

use approx::assert_relative_eq;
use gpe_common::{parse_toml, ParameterStore};
use gpe_simulator::{
    kernels::{cmult, cmult_density, DensityParams, EvolutionMode},
    operators::{
        GaugeFormula, GaugeKind, OperatorContext, OperatorSet, PotentialFormula, PotentialOperator,
        WavefunctionKind,
    },
    utils::{
        complex::magnitude,
        error::{OperatorError, Slot},
        grid::{check_complex_for_nans, field_norm, renormalize, DEFAULT_BLOCK_SIZE},
        io::write_operator_file,
    },
    wavefunction::build_wavefunction,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn store(toml: &str) -> ParameterStore {
    ParameterStore::from_toml(&parse_toml(toml).unwrap()).unwrap()
}

const TORUS_TOML: &str = r#"
x_dim = 32
y_dim = 32
z_dim = 16
dims = 3
omega = 0.2
atoms = 1000

[operators]
potential = "torus"
gauge = "ring"
wavefunction = "torus"
"#;

#[test]
fn torus_configuration_builds() {
    init_logger();
    let store = store(TORUS_TOML);
    let set = OperatorSet::build(&store).unwrap();
    assert_eq!(
        set.handles.potential,
        PotentialOperator::Formula(PotentialFormula::Torus)
    );
    assert_eq!(set.handles.gauge, GaugeKind::Formula(GaugeFormula::Ring));
    assert_eq!(set.handles.wavefunction, WavefunctionKind::Torus);
    assert_eq!(set.kinetic.dim(), (32, 32, 16));
    assert!(set.gauge.az.iter().all(|&a| a == 0.0));
    assert!(set.potential.iter().all(|&v| v >= 0.0));

    let ctx = OperatorContext::new(&store).unwrap();
    let psi = build_wavefunction(&ctx, set.handles.wavefunction, |_| 0.0);
    assert!(check_complex_for_nans(&psi));
}

#[test]
fn file_backed_operators() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = |name: &str| dir.path().join(name).to_string_lossy().into_owned();

    // Reference grids from the formula-driven operators
    let reference = OperatorSet::build(&store("x_dim = 8\ny_dim = 6\ndims = 2\nomega = 0.7\n")).unwrap();
    write_operator_file(&path("Ax"), &reference.gauge.ax).unwrap();
    write_operator_file(&path("Ay"), &reference.gauge.ay).unwrap();
    write_operator_file(&path("V"), &reference.potential).unwrap();

    let toml = format!(
        "x_dim = 8\ny_dim = 6\ndims = 2\nomega = 0.7\n\n[operators]\npotential = \"file\"\ngauge = \"file\"\n\n[files]\nax = {:?}\nay = {:?}\nv = {:?}\n",
        path("Ax"),
        path("Ay"),
        path("V")
    );
    let from_files = OperatorSet::build(&store(&toml)).unwrap();
    assert_eq!(from_files.gauge, reference.gauge);
    assert_eq!(from_files.potential, reference.potential);
    assert_eq!(from_files.momentum_gauge, reference.momentum_gauge);

    // Wrong length
    fs::write(path("V"), "1.0\n2.0\n").unwrap();
    assert!(matches!(
        OperatorSet::build(&store(&toml)),
        Err(OperatorError::FileLength {
            expected: 48,
            found: 2,
            ..
        })
    ));
}

#[test]
fn file_gauge_needs_az_in_3d() {
    let dir = tempfile::tempdir().unwrap();
    let ax = dir.path().join("Ax").to_string_lossy().into_owned();
    fs::write(&ax, "0\n".repeat(8)).unwrap();

    let toml = format!(
        "x_dim = 2\ny_dim = 2\nz_dim = 2\ndims = 3\n\n[operators]\ngauge = \"file\"\n\n[files]\nax = {ax:?}\nay = {ax:?}\n"
    );
    assert!(matches!(
        OperatorSet::build(&store(&toml)),
        Err(OperatorError::MissingFile { slot: Slot::Az })
    ));
}

#[test]
fn gauge_config_file() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("gauge.cfg").to_string_lossy().into_owned();
    fs::write(&config, "Ax = -y * omega * omegaX\nAy = x*omega*omegaY\n# no Az\n").unwrap();

    let toml = format!(
        "x_dim = 16\ny_dim = 16\ndims = 2\nomega = 0.4\n\n[operators]\ngauge = \"dynamic\"\n\n[dynamic]\nconfig = {config:?}\n"
    );
    let dynamic = OperatorSet::build(&store(&toml)).unwrap();
    let rotation = OperatorSet::build(&store("x_dim = 16\ny_dim = 16\ndims = 2\nomega = 0.4\n")).unwrap();
    for (d, r) in dynamic.potential.iter().zip(rotation.potential.iter()) {
        assert_relative_eq!(*d, *r, max_relative = 1e-12);
    }
}

#[test]
fn unknown_selector_stops_construction() {
    let toml = "x_dim = 4\ny_dim = 4\ndims = 2\n\n[operators]\nkinetic = \"rotation_K4d\"\n";
    match OperatorSet::build(&store(toml)) {
        Err(OperatorError::UnknownOperator { slot, name }) => {
            assert_eq!(slot, Slot::Kinetic);
            assert_eq!(name, "rotation_K4d");
        }
        other => panic!("expected an unknown operator, got {other:?}"),
    }
}

#[test]
fn potential_half_steps_keep_state_normalized() {
    init_logger();
    let store = store("x_dim = 32\ny_dim = 32\ndims = 2\natoms = 5000\nomega = 0.3\n");
    let set = OperatorSet::build(&store).unwrap();
    let ctx = OperatorContext::new(&store).unwrap();
    let dr = store.real("dr").unwrap();
    let dt = 1e-5;

    let mut psi = build_wavefunction(&ctx, set.handles.wavefunction, |_| 0.0);
    renormalize(&mut psi, dr, 1.0, DEFAULT_BLOCK_SIZE).unwrap();

    // Real time: unit-modulus factors leave the norm alone
    let real = set.evolution_factors(dt, EvolutionMode::Real).unwrap();
    let params = DensityParams::from_store(&store, dt, EvolutionMode::Real).unwrap();
    let stepped = cmult_density(&real.potential, &psi, &params).unwrap();
    for (s, p) in stepped.iter().zip(psi.iter()) {
        assert_relative_eq!(magnitude(*s), magnitude(*p), max_relative = 1e-10);
    }

    // Imaginary time: the norm drops and renormalization restores it
    let imaginary = set.evolution_factors(dt, EvolutionMode::Imaginary).unwrap();
    let mut relaxed = psi.clone();
    for _ in 0..10 {
        relaxed = cmult(&imaginary.potential, &relaxed).unwrap();
        let before = renormalize(&mut relaxed, dr, 1.0, DEFAULT_BLOCK_SIZE).unwrap();
        assert!(before <= 1.0 + 1e-12);
    }
    assert_relative_eq!(
        field_norm(&relaxed, dr, DEFAULT_BLOCK_SIZE).unwrap(),
        1.0,
        max_relative = 1e-10
    );
    assert!(check_complex_for_nans(&relaxed));
}
