use approx::assert_relative_eq;
use gpe_common::{parse_toml, ParameterStore};
use gpe_simulator::{
    operators::{OperatorContext, WavefunctionKind},
    utils::grid::{check_norm, field_norm, multipass_sum, renormalize, DEFAULT_BLOCK_SIZE},
    wavefunction::build_wavefunction,
};
use std::f64::consts::FRAC_PI_2;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn store(toml: &str) -> ParameterStore {
    ParameterStore::from_toml(&parse_toml(toml).unwrap()).unwrap()
}

#[test]
fn gaussian_integral_2d() {
    init_logger();
    let store = store("x_dim = 128\ny_dim = 96\ndims = 2\natoms = 10000\ngamma_y = 1.0\n");
    let ctx = OperatorContext::new(&store).unwrap();
    let psi = build_wavefunction(&ctx, WavefunctionKind::Standard2d, |_| 0.3);

    let dr = store.real("dr").unwrap();
    let sigma_x = ctx.rxy * ctx.a0x;
    let sigma_y = ctx.rxy * ctx.a0y;
    let expected = FRAC_PI_2 * sigma_x * sigma_y;

    for block_size in [2, 7, 64, DEFAULT_BLOCK_SIZE, 1 << 16] {
        let norm = field_norm(&psi, dr, block_size).unwrap();
        assert_relative_eq!(norm, expected, max_relative = 1e-9);
    }
}

#[test]
fn gaussian_integral_3d() {
    init_logger();
    let store = store("x_dim = 64\ny_dim = 64\nz_dim = 64\ndims = 3\natoms = 10000\nomega_z = 12.566\n");
    let ctx = OperatorContext::new(&store).unwrap();
    let psi = build_wavefunction(&ctx, WavefunctionKind::Standard3d, |at| {
        ctx.x[at.i].atan2(ctx.y[at.j])
    });

    let dr = store.real("dr").unwrap();
    let sigma = [ctx.a0x, ctx.a0y, ctx.a0z].map(|a0| ctx.rxy * a0);
    let expected = FRAC_PI_2.powf(1.5) * sigma[0] * sigma[1] * sigma[2];

    let norm = field_norm(&psi, dr, DEFAULT_BLOCK_SIZE).unwrap();
    assert_relative_eq!(norm, expected, max_relative = 1e-8);
}

#[test]
fn renormalized_state_hits_target() {
    init_logger();
    let store = store("x_dim = 64\ny_dim = 64\ndims = 2\nnorm_target = 2.5\n");
    let ctx = OperatorContext::new(&store).unwrap();
    let mut psi = build_wavefunction(&ctx, WavefunctionKind::Standard2d, |_| 0.0);
    let dr = store.real("dr").unwrap();
    let target = store.real("norm_target").unwrap();

    let before = renormalize(&mut psi, dr, target, DEFAULT_BLOCK_SIZE).unwrap();
    assert!(before > 0.0);
    assert!(check_norm(&psi, dr, target, 1e-10).unwrap());

    // A second pass finds the target already met
    let again = renormalize(&mut psi, dr, target, 3).unwrap();
    assert_relative_eq!(again, target, max_relative = 1e-12);
}

#[test]
fn uniform_sum_over_odd_lengths() {
    for n in [1, 2, 3, 511, 512, 513, 100_003] {
        let values = vec![0.5_f64; n];
        for block_size in [2, 3, 512] {
            let reduction = multipass_sum(&values, block_size).unwrap();
            assert_relative_eq!(reduction.sum, 0.5 * n as f64, max_relative = 1e-12);
        }
    }
}
