use gpe_common::HBAR;

use super::{context::OperatorContext, dispatch::KineticOperator};
use crate::utils::grid::GridIndex;

impl KineticOperator {
    /// Kinetic energy at one momentum-space site.
    pub fn evaluate(self, ctx: &OperatorContext, at: GridIndex) -> f64 {
        match self {
            KineticOperator::Rotation => rotation_k(ctx, at),
            KineticOperator::Rotation3d => rotation_k3d(ctx, at),
            KineticOperator::RotationDimensionless => rotation_k_dimensionless(ctx, at),
            KineticOperator::RotationGauge => rotation_gauge_k(ctx, at),
        }
    }
}

/// `ħ²/(2m)·(xp² + yp²)`
pub fn rotation_k(ctx: &OperatorContext, at: GridIndex) -> f64 {
    let (xp, yp, _) = ctx.momentum(at);
    HBAR * HBAR / (2.0 * ctx.mass) * (xp * xp + yp * yp)
}

pub fn rotation_k3d(ctx: &OperatorContext, at: GridIndex) -> f64 {
    let (xp, yp, zp) = ctx.momentum(at);
    HBAR * HBAR / (2.0 * ctx.mass) * (xp * xp + yp * yp + zp * zp)
}

pub fn rotation_k_dimensionless(ctx: &OperatorContext, at: GridIndex) -> f64 {
    let (xp, yp, _) = ctx.momentum(at);
    0.5 * (xp * xp + yp * yp)
}

/// Kinetic term in the rotating frame with the gauge field folded in,
/// `(p - mA)²/(2m)` with `A` the rotation gauge, halved.
pub fn rotation_gauge_k(ctx: &OperatorContext, at: GridIndex) -> f64 {
    let (xp, yp, _) = ctx.momentum(at);
    let (x, y, _) = ctx.position(at);
    let omega_0 = ctx.omega * ctx.omega_x;
    let m = ctx.mass;

    let p1 = HBAR * HBAR * (xp * xp + yp * yp);
    let p2 = m * m * omega_0 * omega_0 * (x * x + y * y);
    let p3 = 2.0 * HBAR * m * omega_0 * (xp * y - yp * x);

    (p1 + p2 + p3) / (2.0 * m) * 0.5
}

#[test]
fn test_kinetic_at_zero_momentum() {
    let store = super::context::test_store("x_dim = 8\ny_dim = 8\ndims = 2\n");
    let ctx = OperatorContext::new(&store).unwrap();
    let origin = GridIndex::new(0, 0, 0);
    assert_eq!(rotation_k(&ctx, origin), 0.0);
    assert_eq!(rotation_k_dimensionless(&ctx, origin), 0.0);
    // No rotation leaves only the momentum term
    assert_eq!(rotation_gauge_k(&ctx, origin), 0.0);
}

#[test]
fn test_kinetic_values() {
    use approx::assert_relative_eq;

    let store = super::context::test_store("x_dim = 8\ny_dim = 8\nz_dim = 4\ndims = 3\n");
    let ctx = OperatorContext::new(&store).unwrap();
    let at = GridIndex::new(1, 2, 3);
    let (xp, yp, zp) = ctx.momentum(at);

    assert_relative_eq!(
        rotation_k3d(&ctx, at),
        rotation_k(&ctx, at) + HBAR * HBAR / (2.0 * ctx.mass) * zp * zp,
        max_relative = 1e-12
    );
    assert_relative_eq!(
        KineticOperator::RotationDimensionless.evaluate(&ctx, at),
        0.5 * (xp * xp + yp * yp)
    );

    // Without rotation the gauge kinetic term is half the plain one
    assert_relative_eq!(
        rotation_gauge_k(&ctx, at),
        0.5 * rotation_k(&ctx, at),
        max_relative = 1e-12
    );
}

#[test]
fn test_rotating_frame_kinetic() {
    use approx::assert_relative_eq;

    let store = super::context::test_store("x_dim = 8\ny_dim = 8\ndims = 2\nomega = 0.5\n");
    let ctx = OperatorContext::new(&store).unwrap();
    let at = GridIndex::new(5, 2, 0);
    let (xp, yp, _) = ctx.momentum(at);
    let (x, y, _) = ctx.position(at);

    // (p - mA)^2 / 4m with A = omega_0 * (-y, x)
    let omega_0 = ctx.omega * ctx.omega_x;
    let px = HBAR * xp + ctx.mass * omega_0 * y;
    let py = HBAR * yp - ctx.mass * omega_0 * x;
    assert_relative_eq!(
        rotation_gauge_k(&ctx, at),
        (px * px + py * py) / (4.0 * ctx.mass),
        max_relative = 1e-9
    );
}
