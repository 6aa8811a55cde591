use super::{context::OperatorContext, dispatch::PotentialFormula, gauge::GaugeGrids};
use crate::utils::grid::GridIndex;

impl PotentialFormula {
    /// Potential at one site. `gauge` holds the already-built vector
    /// potential.
    pub fn evaluate(self, ctx: &OperatorContext, gauge: &GaugeGrids, at: GridIndex) -> f64 {
        match self {
            PotentialFormula::Harmonic => harmonic_v(ctx, gauge, at),
            PotentialFormula::Harmonic3d => harmonic_v3d(ctx, gauge, at),
            PotentialFormula::HarmonicDimensionless => harmonic_v_dimensionless(ctx, gauge, at),
            PotentialFormula::HarmonicGauge => harmonic_gauge_v(ctx, at),
            PotentialFormula::Torus => torus_v(ctx, gauge, at),
        }
    }
}

pub fn harmonic_v(ctx: &OperatorContext, gauge: &GaugeGrids, at: GridIndex) -> f64 {
    let (x, y, _) = ctx.position(at);
    let (ax, ay, _) = gauge.at(at);
    let v_x = ctx.omega_x * (x + ctx.x0_shift);
    let v_y = ctx.gamma_y * ctx.omega_y * (y + ctx.y0_shift);
    0.5 * ctx.mass * (v_x * v_x + v_y * v_y) + 0.5 * ctx.mass * (ax * ax + ay * ay)
}

pub fn harmonic_v3d(ctx: &OperatorContext, gauge: &GaugeGrids, at: GridIndex) -> f64 {
    let (x, y, z) = ctx.position(at);
    let (ax, ay, az) = gauge.at(at);
    let v_x = ctx.omega_x * (x + ctx.x0_shift);
    let v_y = ctx.gamma_y * ctx.omega_y * (y + ctx.y0_shift);
    let v_z = ctx.gamma_y * ctx.omega_z * (z + ctx.z0_shift);
    0.5 * ctx.mass * (v_x * v_x + v_y * v_y + v_z * v_z)
        + 0.5 * ctx.mass * (ax * ax + ay * ay + az * az)
}

/// Same trap with `m = 1`; shifts do not apply.
pub fn harmonic_v_dimensionless(ctx: &OperatorContext, gauge: &GaugeGrids, at: GridIndex) -> f64 {
    let (x, y, _) = ctx.position(at);
    let (ax, ay, _) = gauge.at(at);
    let v_x = ctx.omega_x * x;
    let v_y = ctx.gamma_y * ctx.omega_y * y;
    0.5 * (v_x * v_x + v_y * v_y) + 0.5 * (ax * ax + ay * ay)
}

/// Trap seen in the rotating frame, trap frequencies reduced by the rotation.
pub fn harmonic_gauge_v(ctx: &OperatorContext, at: GridIndex) -> f64 {
    let (x, y, _) = ctx.position(at);
    let o_x = ctx.omega_x - ctx.omega * ctx.omega_x;
    let o_y = ctx.omega_y - ctx.omega * ctx.omega_y;
    let v_x = o_x * x;
    let v_y = ctx.gamma_y * o_y * y;
    0.5 * ctx.mass * (v_x * v_x + v_y * v_y)
}

/// Signed distance from the torus core in the xy plane. The core radius is
/// `½·xMax·fudge`, centred on `(x0_shift, y0_shift)`.
pub fn torus_radius(ctx: &OperatorContext, at: GridIndex) -> f64 {
    let (x, y, _) = ctx.position(at);
    let dx = x - ctx.x0_shift;
    let dy = y - ctx.y0_shift;
    (dx * dx + dy * dy).sqrt() - 0.5 * ctx.x_max * ctx.fudge
}

pub fn torus_v(ctx: &OperatorContext, gauge: &GaugeGrids, at: GridIndex) -> f64 {
    let (_, _, z) = ctx.position(at);
    let (ax, ay, az) = gauge.at(at);
    let omega_r = (ctx.omega_x * ctx.omega_x + ctx.omega_y * ctx.omega_y).sqrt();
    let v_r = omega_r * torus_radius(ctx, at);
    let v_z = omega_r * (z + ctx.z0_shift);
    0.5 * ctx.mass * (v_r * v_r + v_z * v_z) + 0.5 * ctx.mass * (ax * ax + ay * ay + az * az)
}

#[cfg(test)]
fn shifted_store(shift: f64) -> gpe_common::ParameterStore {
    super::context::test_store(&format!(
        "x_dim = 8\ny_dim = 8\nz_dim = 4\ndims = 3\nx0_shift = {shift:e}\ny0_shift = {shift:e}\nz0_shift = {shift:e}\n"
    ))
}

#[test]
fn test_harmonic_at_grid_origin() {
    let store = super::context::test_store("x_dim = 8\ny_dim = 8\ndims = 2\ngamma_y = 1.5\n");
    let ctx = OperatorContext::new(&store).unwrap();
    let gauge = GaugeGrids::zeros(ctx.shape.dim());
    let at = GridIndex::new(0, 0, 0);
    let (x0, y0, _) = ctx.position(at);

    let expected = 0.5
        * ctx.mass
        * (ctx.omega_x * ctx.omega_x * x0 * x0
            + ctx.gamma_y * ctx.gamma_y * ctx.omega_y * ctx.omega_y * y0 * y0);
    approx::assert_relative_eq!(
        PotentialFormula::Harmonic.evaluate(&ctx, &gauge, at),
        expected,
        max_relative = 1e-14
    );
}

#[test]
fn test_gauge_adds_to_potential() {
    use approx::assert_relative_eq;

    let store = shifted_store(0.0);
    let ctx = OperatorContext::new(&store).unwrap();
    let zero = GaugeGrids::zeros(ctx.shape.dim());
    let mut gauge = GaugeGrids::zeros(ctx.shape.dim());
    gauge.ax.fill(1e-3);
    gauge.ay.fill(-2e-3);
    gauge.az.fill(5e-4);

    let at = GridIndex::new(3, 1, 2);
    let a_squared = 1e-6 + 4e-6 + 2.5e-7;
    for potential in [PotentialFormula::Harmonic3d, PotentialFormula::Torus] {
        assert_relative_eq!(
            potential.evaluate(&ctx, &gauge, at),
            potential.evaluate(&ctx, &zero, at) + 0.5 * ctx.mass * a_squared,
            max_relative = 1e-9
        );
    }
}

#[test]
fn test_shift_moves_trap_centre() {
    let shift = 1e-6;
    let store = shifted_store(shift);
    let ctx = OperatorContext::new(&store).unwrap();
    let gauge = GaugeGrids::zeros(ctx.shape.dim());

    // Harmonic traps are centred on -shift; the torus core on +shift
    let unshifted = shifted_store(0.0);
    let reference = OperatorContext::new(&unshifted).unwrap();
    let at = GridIndex::new(2, 5, 1);
    let (x, y, z) = ctx.position(at);
    let v_x = ctx.omega_x * (x + shift);
    let v_y = ctx.omega_y * (y + shift);
    let v_z = ctx.omega_z * (z + shift);
    approx::assert_relative_eq!(
        harmonic_v3d(&ctx, &gauge, at),
        0.5 * ctx.mass * (v_x * v_x + v_y * v_y + v_z * v_z),
        max_relative = 1e-12
    );
    assert_ne!(torus_radius(&ctx, at), torus_radius(&reference, at));
}

#[test]
fn test_rotating_frame_potential() {
    let store = super::context::test_store("x_dim = 8\ny_dim = 8\ndims = 2\nomega = 1.0\n");
    let ctx = OperatorContext::new(&store).unwrap();
    // Rotating at the trap frequency cancels the trap
    for at in ctx.shape.indices() {
        assert_eq!(harmonic_gauge_v(&ctx, at), 0.0);
    }
}

#[test]
fn test_torus_minimum_on_core() {
    let store = super::context::test_store("x_dim = 4\ny_dim = 4\ndims = 2\nbox_size = 2.0\n");
    let ctx = OperatorContext::new(&store).unwrap();
    // x = [-2, -1, 0, 1], core radius 1
    assert_eq!(torus_radius(&ctx, GridIndex::new(1, 2, 0)), 0.0);
    assert_eq!(torus_radius(&ctx, GridIndex::new(2, 2, 0)), -1.0);
    let gauge = GaugeGrids::zeros(ctx.shape.dim());
    assert_eq!(torus_v(&ctx, &gauge, GridIndex::new(1, 2, 0)), 0.0);
}

#[test]
fn test_dimensionless_potential_values() {
    let store = super::context::test_store(
        "x_dim = 4\ny_dim = 4\ndims = 2\nbox_size = 2.0\nomega_x = 2.0\nomega_y = 3.0\ngamma_y = 0.5\nx0_shift = 1.0\n",
    );
    let ctx = OperatorContext::new(&store).unwrap();
    let mut gauge = GaugeGrids::zeros(ctx.shape.dim());
    let at = GridIndex::new(0, 1, 0);

    // x = -2, y = -1: ½((2·-2)² + (0.5·3·-1)²), no mass and no shift
    assert_eq!(harmonic_v_dimensionless(&ctx, &gauge, at), 9.125);

    gauge.ax.fill(1.0);
    gauge.ay.fill(2.0);
    assert_eq!(
        PotentialFormula::HarmonicDimensionless.evaluate(&ctx, &gauge, at),
        9.125 + 2.5
    );
}

#[test]
fn test_rotating_frame_potential_values() {
    let store = super::context::test_store(
        "x_dim = 4\ny_dim = 4\ndims = 2\nbox_size = 2.0\nmass = 2.0\nomega = 0.5\nomega_x = 2.0\nomega_y = 4.0\n",
    );
    let ctx = OperatorContext::new(&store).unwrap();

    // Reduced frequencies 1 and 2 at x = -2, y = -1: ½·2·(2² + 2²)
    assert_eq!(harmonic_gauge_v(&ctx, GridIndex::new(0, 1, 0)), 8.0);
    assert_eq!(harmonic_gauge_v(&ctx, GridIndex::new(2, 2, 0)), 0.0);
}
