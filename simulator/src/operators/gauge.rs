use std::f64::consts::{FRAC_PI_2, PI};

use gpe_common::HBAR;
use ndarray::{Array3, Zip};

use super::{context::OperatorContext, dispatch::GaugeFormula};
use crate::{
    parser::{BoundExpression, EvalError},
    utils::grid::{GridIndex, OperatorGrid},
};

/// Component of the vector potential.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Component {
    X,
    Y,
    Z,
}

/// Per-site vector potential, one grid per component.
#[derive(Clone, Debug, PartialEq)]
pub struct GaugeGrids {
    pub ax: OperatorGrid,
    pub ay: OperatorGrid,
    pub az: OperatorGrid,
}

impl GaugeGrids {
    pub fn zeros(dim: (usize, usize, usize)) -> Self {
        GaugeGrids {
            ax: Array3::zeros(dim),
            ay: Array3::zeros(dim),
            az: Array3::zeros(dim),
        }
    }

    /// `(Ax, Ay, Az)` at one site.
    pub fn at(&self, at: GridIndex) -> (f64, f64, f64) {
        let index = [at.i, at.j, at.k];
        (self.ax[index], self.ay[index], self.az[index])
    }

    /// Momentum-weighted grids `pAx = Ax·xp`, `pAy = Ay·yp`, `pAz = Az·zp`.
    pub fn momentum_weighted(&self, ctx: &OperatorContext) -> GaugeGrids {
        let weight = |grid: &OperatorGrid, component: Component| {
            let mut out = grid.clone();
            Zip::indexed(&mut out).for_each(|(i, j, k), value| {
                let (xp, yp, zp) = ctx.momentum(GridIndex::new(i, j, k));
                *value *= match component {
                    Component::X => xp,
                    Component::Y => yp,
                    Component::Z => zp,
                };
            });
            out
        };
        GaugeGrids {
            ax: weight(&self.ax, Component::X),
            ay: weight(&self.ay, Component::Y),
            az: weight(&self.az, Component::Z),
        }
    }
}

/// Compiled `dynamic` gauge expressions. A missing `Az` evaluates to 0.
#[derive(Clone, Debug, PartialEq)]
pub struct DynamicGauge {
    pub ax: BoundExpression,
    pub ay: BoundExpression,
    pub az: Option<BoundExpression>,
}

impl GaugeFormula {
    /// Value of one component at one site.
    pub fn evaluate(self, ctx: &OperatorContext, component: Component, at: GridIndex) -> f64 {
        match self {
            GaugeFormula::Rotation => rotation(ctx, component, at),
            GaugeFormula::Ring => ring(ctx, component, at),
            GaugeFormula::Constant => 0.0,
            GaugeFormula::Test => test_gauge(ctx, component, at),
            GaugeFormula::Fiber2d => fiber2d(component),
        }
    }
}

/// Rigid rotation about the z axis.
pub fn rotation(ctx: &OperatorContext, component: Component, at: GridIndex) -> f64 {
    let (x, y, _) = ctx.position(at);
    match component {
        Component::X => -y * ctx.omega * ctx.omega_x,
        Component::Y => x * ctx.omega * ctx.omega_y,
        Component::Z => 0.0,
    }
}

/// Azimuthal angle used by the ring gauge, measured from the y axis.
///
/// The quadrant correction only adds π for `y < 0`, so the result lies in
/// `(-π/2, 3π/2]`.
pub fn ring_angle(x: f64, y: f64) -> f64 {
    if y == 0.0 {
        if x == 0.0 {
            0.0
        } else if x > 0.0 {
            FRAC_PI_2
        } else {
            -FRAC_PI_2
        }
    } else {
        let angle = (x / y).atan();
        if y < 0.0 {
            angle + PI
        } else {
            angle
        }
    }
}

const RING_SCALE: f64 = 1e9;
const RING_FALLOFF: f64 = 1e5;
const RING_CAP: f64 = 1e-3;

/// Field of a thin ring: `1/(|ρ|·1e5)` capped at `1e-3`, where `ρ` is the
/// scaled radius projected onto the component's direction.
pub fn ring(ctx: &OperatorContext, component: Component, at: GridIndex) -> f64 {
    let (x, y, _) = ctx.position(at);
    let theta = ring_angle(x, y);
    let radius = (RING_SCALE * x * x + RING_SCALE * y * y).sqrt();
    let rho = match component {
        Component::X => radius * theta.cos(),
        Component::Y => radius * theta.sin(),
        Component::Z => return 0.0,
    };
    if rho == 0.0 {
        return RING_CAP;
    }
    (1.0 / (rho.abs() * RING_FALLOFF)).min(RING_CAP)
}

pub fn test_gauge(ctx: &OperatorContext, component: Component, at: GridIndex) -> f64 {
    match component {
        Component::X => {
            let (_, y, _) = ctx.position(at);
            ((1e4 * y).sin() + 1.0) * ctx.omega_x * ctx.y_max * ctx.omega
        }
        Component::Y | Component::Z => 0.0,
    }
}

pub fn fiber2d(component: Component) -> f64 {
    match component {
        Component::X => HBAR,
        Component::Y | Component::Z => 0.0,
    }
}

impl DynamicGauge {
    pub fn evaluate(&self, component: Component, at: GridIndex) -> Result<f64, EvalError> {
        match component {
            Component::X => self.ax.evaluate(at),
            Component::Y => self.ay.evaluate(at),
            Component::Z => match &self.az {
                Some(az) => az.evaluate(at),
                None => Ok(0.0),
            },
        }
    }
}

/// Discrete 2D curl `(Ay[i,j] - Ay[i+1,j]) - (Ax[i,j] - Ax[i,j+1])` on the
/// `k = 0` plane. The last row and column are left 0.
pub fn curl_2d(ax: &OperatorGrid, ay: &OperatorGrid) -> OperatorGrid {
    let (x_dim, y_dim, _) = ax.dim();
    let mut curl = Array3::zeros((x_dim, y_dim, 1));
    Zip::indexed(&mut curl).for_each(|(i, j, _), value| {
        if i + 1 < x_dim && j + 1 < y_dim {
            *value = (ay[[i, j, 0]] - ay[[i + 1, j, 0]]) - (ax[[i, j, 0]] - ax[[i, j + 1, 0]]);
        }
    });
    curl
}

#[test]
fn test_ring_angle() {
    assert_eq!(ring_angle(0.0, 0.0), 0.0);
    assert_eq!(ring_angle(2.0, 0.0), FRAC_PI_2);
    assert_eq!(ring_angle(-2.0, 0.0), -FRAC_PI_2);
    assert_eq!(ring_angle(0.0, 1.0), 0.0);
    assert_eq!(ring_angle(0.0, -1.0), PI);
    assert!((ring_angle(1.0, 1.0) - PI / 4.0).abs() < 1e-15);
    assert!((ring_angle(1.0, -1.0) - 3.0 * PI / 4.0).abs() < 1e-15);
    for x in [-1e-300, -1.0, 0.0, 1.0, 1e300] {
        for y in [-1e-300, -1.0, 0.0, 1.0, 1e300] {
            assert!(!ring_angle(x, y).is_nan());
        }
    }
}

#[test]
fn test_ring_finite_at_origin() {
    // Put a site exactly on the origin
    let mut store = super::context::test_store("x_dim = 4\ny_dim = 4\ndims = 2\n");
    store.store("x", vec![-1e-6, 0.0, 1e-6, 2e-6]);
    store.store("y", vec![-1e-6, 0.0, 1e-6, 2e-6]);
    let ctx = OperatorContext::new(&store).unwrap();

    let origin = GridIndex::new(1, 1, 0);
    assert_eq!(ring(&ctx, Component::X, origin), RING_CAP);
    assert_eq!(ring(&ctx, Component::Y, origin), RING_CAP);
    for at in ctx.shape.indices() {
        for component in [Component::X, Component::Y, Component::Z] {
            let value = ring(&ctx, component, at);
            assert!(value.is_finite());
            assert!((0.0..=RING_CAP).contains(&value));
        }
    }
}

#[test]
fn test_rotation_gauge() {
    let store = super::context::test_store("x_dim = 8\ny_dim = 8\ndims = 2\nomega = 0.5\n");
    let ctx = OperatorContext::new(&store).unwrap();
    let at = GridIndex::new(2, 6, 0);
    let (x, y, _) = ctx.position(at);
    assert_eq!(
        GaugeFormula::Rotation.evaluate(&ctx, Component::X, at),
        -y * 0.5 * ctx.omega_x
    );
    assert_eq!(
        GaugeFormula::Rotation.evaluate(&ctx, Component::Y, at),
        x * 0.5 * ctx.omega_y
    );
    assert_eq!(GaugeFormula::Rotation.evaluate(&ctx, Component::Z, at), 0.0);
    assert_eq!(GaugeFormula::Constant.evaluate(&ctx, Component::X, at), 0.0);
    assert_eq!(GaugeFormula::Fiber2d.evaluate(&ctx, Component::X, at), HBAR);
}

#[test]
fn test_curl_of_rotation() {
    use approx::assert_relative_eq;

    // A = (-y, x) has a uniform curl
    let (x_dim, y_dim) = (6, 5);
    let ax = Array3::from_shape_fn((x_dim, y_dim, 1), |(_, j, _)| -(j as f64));
    let ay = Array3::from_shape_fn((x_dim, y_dim, 1), |(i, _, _)| i as f64);
    let curl = curl_2d(&ax, &ay);
    for ((i, j, _), value) in curl.indexed_iter() {
        if i + 1 < x_dim && j + 1 < y_dim {
            assert_relative_eq!(*value, -2.0);
        } else {
            assert_eq!(*value, 0.0);
        }
    }
}

#[test]
fn test_momentum_weighted() {
    let store = super::context::test_store("x_dim = 4\ny_dim = 4\ndims = 2\n");
    let ctx = OperatorContext::new(&store).unwrap();
    let dim = ctx.shape.dim();
    let grids = GaugeGrids {
        ax: Array3::from_elem(dim, 2.0),
        ay: Array3::from_elem(dim, -1.0),
        az: Array3::from_elem(dim, 3.0),
    };
    let weighted = grids.momentum_weighted(&ctx);
    for at in ctx.shape.indices() {
        let (xp, yp, zp) = ctx.momentum(at);
        assert_eq!(weighted.at(at), (2.0 * xp, -yp, 3.0 * zp));
    }
}

#[test]
fn test_sinusoidal_gauge_values() {
    let mut store = super::context::test_store(
        "x_dim = 4\ny_dim = 4\ndims = 2\nbox_size = 2.0\nomega = 0.5\nomega_x = 2.0\n",
    );
    store.store("y", vec![-2.0, -1.0, 0.0, FRAC_PI_2 * 1e-4]);
    let ctx = OperatorContext::new(&store).unwrap();

    // (sin(1e4·y) + 1)·ωx·yMax·ω with ωx·yMax·ω = 2
    assert_eq!(test_gauge(&ctx, Component::X, GridIndex::new(0, 2, 0)), 2.0);
    approx::assert_relative_eq!(
        test_gauge(&ctx, Component::X, GridIndex::new(1, 3, 0)),
        4.0,
        max_relative = 1e-12
    );
    assert_eq!(test_gauge(&ctx, Component::Y, GridIndex::new(1, 3, 0)), 0.0);
}

#[test]
fn test_ring_below_cap() {
    let mut store = super::context::test_store("x_dim = 4\ny_dim = 4\ndims = 2\n");
    store.store("x", vec![-1e-4, 0.0, 1e-4, 2e-4]);
    store.store("y", vec![-1e-4, 0.0, 1e-4, 2e-4]);
    let ctx = OperatorContext::new(&store).unwrap();

    // x = y = 1e-4: radius sqrt(20), projected onto either axis sqrt(10)
    let at = GridIndex::new(2, 2, 0);
    let expected = 1.0 / (10f64.sqrt() * RING_FALLOFF);
    assert!(expected < RING_CAP);
    approx::assert_relative_eq!(ring(&ctx, Component::X, at), expected, max_relative = 1e-12);
    approx::assert_relative_eq!(ring(&ctx, Component::Y, at), expected, max_relative = 1e-12);

    // On the y axis only the x projection is nonzero
    let on_axis = GridIndex::new(1, 2, 0);
    approx::assert_relative_eq!(
        ring(&ctx, Component::X, on_axis),
        expected,
        max_relative = 1e-12
    );
    assert_eq!(ring(&ctx, Component::Y, on_axis), RING_CAP);
}
