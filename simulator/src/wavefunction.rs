//! Initial condensate states.
//!
//! Each builder is a Gaussian envelope `e` times the phase `e^{-iΦ}`, with
//! widths `σ = Rxy·a0` per axis. The envelope is not normalized; call
//! [`renormalize`](crate::utils::grid::renormalize) on the built field.

use num::Complex;

use crate::{
    operators::{torus_radius, OperatorContext, WavefunctionKind},
    utils::grid::{ComplexField, GridIndex},
};

/// `e·cos Φ - i·e·sin Φ`
fn with_phase(envelope: f64, phi: f64) -> Complex<f64> {
    Complex::new(envelope * phi.cos(), -envelope * phi.sin())
}

pub fn standard_2d(ctx: &OperatorContext, phi: f64, at: GridIndex) -> Complex<f64> {
    let (x, y, _) = ctx.position(at);
    let sx = x / (ctx.rxy * ctx.a0x);
    let sy = y / (ctx.rxy * ctx.a0y);
    with_phase((-(sx * sx + sy * sy)).exp(), phi)
}

pub fn standard_3d(ctx: &OperatorContext, phi: f64, at: GridIndex) -> Complex<f64> {
    let (x, y, z) = ctx.position(at);
    let sx = x / (ctx.rxy * ctx.a0x);
    let sy = y / (ctx.rxy * ctx.a0y);
    let sz = z / (ctx.rxy * ctx.a0z);
    with_phase((-(sx * sx + sy * sy + sz * sz)).exp(), phi)
}

/// Gaussian tube around the torus core, half as wide as the standard state.
pub fn torus(ctx: &OperatorContext, phi: f64, at: GridIndex) -> Complex<f64> {
    let (_, _, z) = ctx.position(at);
    let sr = torus_radius(ctx, at) / (0.5 * ctx.rxy * ctx.a0x);
    let sz = z / (0.5 * ctx.rxy * ctx.a0z);
    with_phase((-(sr * sr + sz * sz)).exp(), phi)
}

impl WavefunctionKind {
    pub fn evaluate(self, ctx: &OperatorContext, phi: f64, at: GridIndex) -> Complex<f64> {
        match self {
            WavefunctionKind::Standard2d => standard_2d(ctx, phi, at),
            WavefunctionKind::Standard3d => standard_3d(ctx, phi, at),
            WavefunctionKind::Torus => torus(ctx, phi, at),
        }
    }
}

/// Evaluates `kind` over the whole grid with the phase `phase(at)` at each
/// site.
pub fn build_wavefunction<P>(
    ctx: &OperatorContext,
    kind: WavefunctionKind,
    phase: P,
) -> ComplexField<f64>
where
    P: Fn(GridIndex) -> f64,
{
    log::info!("Building {kind:?} wavefunction");
    ComplexField::from_shape_fn(ctx.shape.dim(), |(i, j, k)| {
        let at = GridIndex::new(i, j, k);
        kind.evaluate(ctx, phase(at), at)
    })
}

#[test]
fn test_phase_convention() {
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    let store = crate::operators::context::test_store("x_dim = 8\ny_dim = 8\ndims = 2\n");
    let ctx = OperatorContext::new(&store).unwrap();
    let at = GridIndex::new(4, 4, 0);

    // Grid centre, envelope 1
    assert_eq!(standard_2d(&ctx, 0.0, at), Complex::new(1.0, 0.0));
    let rotated = standard_2d(&ctx, FRAC_PI_2, at);
    assert_relative_eq!(rotated.re, 0.0, epsilon = 1e-15);
    assert_relative_eq!(rotated.im, -1.0);
}

#[test]
fn test_envelope_decays() {
    let store = crate::operators::context::test_store("x_dim = 16\ny_dim = 16\nz_dim = 16\ndims = 3\n");
    let ctx = OperatorContext::new(&store).unwrap();
    let psi = build_wavefunction(&ctx, WavefunctionKind::Standard3d, |_| 0.0);
    let centre = psi[[8, 8, 8]].re;
    assert_eq!(centre, 1.0);
    assert!(psi[[0, 8, 8]].re < centre);
    assert!(psi[[8, 2, 8]].re < psi[[8, 5, 8]].re);
    assert!(psi.iter().all(|z| z.im == 0.0));
}

#[test]
fn test_torus_peaks_on_core() {
    let store = crate::operators::context::test_store(
        "x_dim = 4\ny_dim = 4\nz_dim = 2\ndims = 3\nbox_size = 2.0\n",
    );
    let ctx = OperatorContext::new(&store).unwrap();
    // x = y = [-2, -1, 0, 1] and z = [-2, 0], so (1, 2, 1) sits on the core
    let psi = build_wavefunction(&ctx, WavefunctionKind::Torus, |_| 0.0);
    assert_eq!(psi[[1, 2, 1]], Complex::new(1.0, 0.0));
    assert!(psi[[2, 2, 1]].re < 1.0);
}
