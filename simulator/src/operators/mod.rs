//! Operator grids for the split-step evolution.
//!
//! [`OperatorSet::build`] resolves the configured operator kinds, builds the
//! vector potential first (the potentials read it), then the potential, the
//! kinetic grid and the momentum-weighted gauge grids. Construction happens
//! once; afterwards every grid is shared read-only.

pub mod context;
pub mod dispatch;
pub mod gauge;
pub mod kinetic;
pub mod potential;

use gpe_common::{ParameterStore, HBAR};
use ndarray::Array3;
use num::Complex;

pub use context::OperatorContext;
pub use dispatch::{
    resolve, GaugeFormula, GaugeKind, KineticOperator, OperatorHandles, PotentialFormula,
    PotentialOperator, WavefunctionKind,
};
pub use gauge::{curl_2d, ring_angle, Component, DynamicGauge, GaugeGrids};
pub use potential::torus_radius;

use crate::{
    kernels::EvolutionMode,
    parser::{BoundExpression, EvalError, Expression},
    utils::{
        complex::phase_factor,
        error::{OperatorError, RuntimeError, Slot},
        grid::{check_for_nans, ComplexField, GridIndex, GridShape, OperatorGrid},
        io::read_operator_file,
    },
};

/// Every precomputed operator grid.
#[derive(Clone, Debug)]
pub struct OperatorSet {
    pub handles: OperatorHandles,
    pub shape: GridShape,
    /// Kinetic energy in momentum space
    pub kinetic: OperatorGrid,
    pub potential: OperatorGrid,
    pub gauge: GaugeGrids,
    /// `Ax·xp`, `Ay·yp`, `Az·zp`
    pub momentum_gauge: GaugeGrids,
}

/// Half-step multipliers for the kinetic and potential stages.
#[derive(Clone, Debug)]
pub struct EvolutionFactors {
    pub kinetic: ComplexField<f64>,
    pub potential: ComplexField<f64>,
}

impl OperatorSet {
    pub fn build(store: &ParameterStore) -> Result<Self, OperatorError> {
        let handles = resolve(store)?;
        let ctx = OperatorContext::new(store)?;
        log::info!(
            "Building operators on a {}x{}x{} grid ({:?})",
            ctx.shape.x_dim,
            ctx.shape.y_dim,
            ctx.shape.z_dim,
            ctx.dimensions
        );

        let gauge = build_gauge(&ctx, handles.gauge)?;
        let potential = build_potential(&ctx, handles.potential, &gauge)?;
        let kinetic = evaluate_grid(ctx.shape, |at| handles.kinetic.evaluate(&ctx, at));
        let momentum_gauge = gauge.momentum_weighted(&ctx);

        let grids = [
            &kinetic,
            &potential,
            &gauge.ax,
            &gauge.ay,
            &gauge.az,
            &momentum_gauge.ax,
            &momentum_gauge.ay,
            &momentum_gauge.az,
        ];
        if !grids.into_iter().all(|grid| check_for_nans(grid)) {
            log::error!("Operator construction produced non-finite values");
            return Err(RuntimeError::NanOrInf.into());
        }

        Ok(OperatorSet {
            handles,
            shape: ctx.shape,
            kinetic,
            potential,
            gauge,
            momentum_gauge,
        })
    }

    /// `exp(-G·dt/(2ħ))` in imaginary time or `exp(-i·G·dt/(2ħ))` in real
    /// time, for `G` the kinetic and potential grids.
    pub fn evolution_factors(
        &self,
        dt: f64,
        mode: EvolutionMode,
    ) -> Result<EvolutionFactors, RuntimeError> {
        let scale = dt / (2.0 * HBAR);
        let factor = |energy: f64| match mode {
            EvolutionMode::Imaginary => Complex::new((-energy * scale).exp(), 0.0),
            EvolutionMode::Real => phase_factor(-energy * scale),
        };
        let factors = EvolutionFactors {
            kinetic: self.kinetic.mapv(factor),
            potential: self.potential.mapv(factor),
        };
        let finite = |field: &ComplexField<f64>| {
            field
                .iter()
                .all(|z| z.re.is_finite() && z.im.is_finite())
        };
        if !(finite(&factors.kinetic) && finite(&factors.potential)) {
            return Err(RuntimeError::NanOrInf);
        }
        Ok(factors)
    }

    /// Curl of the in-plane vector potential; see [`curl_2d`].
    pub fn curl(&self) -> OperatorGrid {
        curl_2d(&self.gauge.ax, &self.gauge.ay)
    }
}

/// Evaluates `f` at every site.
pub fn evaluate_grid<F>(shape: GridShape, f: F) -> OperatorGrid
where
    F: Fn(GridIndex) -> f64,
{
    Array3::from_shape_fn(shape.dim(), |(i, j, k)| f(GridIndex::new(i, j, k)))
}

/// Evaluates `f` at every site. The first error wins.
pub fn try_evaluate_grid<F>(shape: GridShape, f: F) -> Result<OperatorGrid, EvalError>
where
    F: Fn(GridIndex) -> Result<f64, EvalError>,
{
    let mut error = None;
    let grid = Array3::from_shape_fn(shape.dim(), |(i, j, k)| {
        if error.is_some() {
            return 0.0;
        }
        f(GridIndex::new(i, j, k)).unwrap_or_else(|err| {
            error = Some(err);
            0.0
        })
    });
    match error {
        Some(err) => Err(err),
        None => Ok(grid),
    }
}

fn required_file<'a>(
    store: &'a ParameterStore,
    key: &str,
    slot: Slot,
) -> Result<&'a str, OperatorError> {
    store
        .optional_string(key)?
        .ok_or(OperatorError::MissingFile { slot })
}

fn compile(
    store: &ParameterStore,
    source: &str,
    slot: Slot,
) -> Result<BoundExpression, OperatorError> {
    let expression =
        Expression::parse(source).map_err(|err| OperatorError::Parse { slot, err })?;
    log::debug!("Parsed {slot} = {}", expression.source());
    Ok(expression.bind(store)?)
}

/// Compiles the `Axstring`, `Aystring` and `Azstring` expressions.
pub fn dynamic_gauge(ctx: &OperatorContext) -> Result<DynamicGauge, OperatorError> {
    let store = ctx.store();
    let required = |key: &str, slot: Slot| -> Result<_, OperatorError> {
        let source = store
            .optional_string(key)?
            .ok_or(OperatorError::MissingExpression { slot })?;
        compile(store, source, slot)
    };
    let ax = required("Axstring", Slot::Ax)?;
    let ay = required("Aystring", Slot::Ay)?;
    let az = match store.optional_string("Azstring")? {
        Some(source) => Some(compile(store, source, Slot::Az)?),
        None => {
            if ctx.is_3d() {
                log::warn!("No Azstring for the dynamic gauge, Az is set to 0");
            }
            None
        }
    };
    Ok(DynamicGauge { ax, ay, az })
}

fn build_gauge(ctx: &OperatorContext, kind: GaugeKind) -> Result<GaugeGrids, OperatorError> {
    let shape = ctx.shape;
    let store = ctx.store();
    let grids = match kind {
        GaugeKind::File => {
            let ax = read_operator_file(required_file(store, "Axfile", Slot::Ax)?, shape)?;
            let ay = read_operator_file(required_file(store, "Ayfile", Slot::Ay)?, shape)?;
            let az = if ctx.is_3d() {
                read_operator_file(required_file(store, "Azfile", Slot::Az)?, shape)?
            } else {
                match store.optional_string("Azfile")? {
                    Some(path) => read_operator_file(path, shape)?,
                    None => Array3::zeros(shape.dim()),
                }
            };
            GaugeGrids { ax, ay, az }
        }
        GaugeKind::Dynamic => {
            let dynamic = dynamic_gauge(ctx)?;
            GaugeGrids {
                ax: try_evaluate_grid(shape, |at| dynamic.evaluate(Component::X, at))?,
                ay: try_evaluate_grid(shape, |at| dynamic.evaluate(Component::Y, at))?,
                az: try_evaluate_grid(shape, |at| dynamic.evaluate(Component::Z, at))?,
            }
        }
        GaugeKind::Formula(formula) => GaugeGrids {
            ax: evaluate_grid(shape, |at| formula.evaluate(ctx, Component::X, at)),
            ay: evaluate_grid(shape, |at| formula.evaluate(ctx, Component::Y, at)),
            az: evaluate_grid(shape, |at| formula.evaluate(ctx, Component::Z, at)),
        },
    };
    log::info!("Built {kind:?} gauge");
    Ok(grids)
}

fn build_potential(
    ctx: &OperatorContext,
    kind: PotentialOperator,
    gauge: &GaugeGrids,
) -> Result<OperatorGrid, OperatorError> {
    let grid = match kind {
        PotentialOperator::File => {
            let path = required_file(ctx.store(), "Vfile", Slot::Potential)?;
            read_operator_file(path, ctx.shape)?
        }
        PotentialOperator::Formula(formula) => {
            evaluate_grid(ctx.shape, |at| formula.evaluate(ctx, gauge, at))
        }
    };
    log::info!("Built {kind:?} potential");
    Ok(grid)
}

#[cfg(test)]
use context::test_store;

#[test]
fn test_build_default_operators() {
    use approx::assert_relative_eq;

    let store = test_store("x_dim = 16\ny_dim = 16\ndims = 2\nomega = 0.5\n");
    let set = OperatorSet::build(&store).unwrap();
    let ctx = OperatorContext::new(&store).unwrap();
    assert_eq!(set.shape, GridShape::new(16, 16, 1));
    assert_eq!(set.kinetic.dim(), (16, 16, 1));

    // The potential reads the rotation gauge
    let at = GridIndex::new(3, 11, 0);
    let (x, y, _) = ctx.position(at);
    let a_x = -y * ctx.omega * ctx.omega_x;
    let a_y = x * ctx.omega * ctx.omega_y;
    assert_eq!(set.gauge.at(at).0, a_x);
    let trap = 0.5 * ctx.mass * (ctx.omega_x * ctx.omega_x * x * x + ctx.omega_y * ctx.omega_y * y * y);
    assert_relative_eq!(
        set.potential[[3, 11, 0]],
        trap + 0.5 * ctx.mass * (a_x * a_x + a_y * a_y),
        max_relative = 1e-12
    );

    let (xp, _, _) = ctx.momentum(at);
    assert_eq!(set.momentum_gauge.ax[[3, 11, 0]], a_x * xp);
}

#[test]
fn test_harmonic_with_constant_gauge() {
    use approx::assert_abs_diff_eq;

    let mut store = test_store("x_dim = 8\ny_dim = 8\ndims = 2\ngamma_y = 2.0\n");
    store.store("Afn", "constant");
    let set = OperatorSet::build(&store).unwrap();
    let ctx = OperatorContext::new(&store).unwrap();

    let (x0, y0, _) = ctx.position(GridIndex::new(0, 0, 0));
    let expected = 0.5
        * ctx.mass
        * (ctx.omega_x * ctx.omega_x * x0 * x0 + 4.0 * ctx.omega_y * ctx.omega_y * y0 * y0);
    assert_abs_diff_eq!(set.potential[[0, 0, 0]], expected, epsilon = expected * 1e-14);
    assert!(set.gauge.ax.iter().all(|&a| a == 0.0));
}

#[test]
fn test_dynamic_gauge_matches_rotation() {
    use approx::assert_relative_eq;

    let toml = "x_dim = 8\ny_dim = 8\ndims = 2\nomega = 0.5\n\n[operators]\ngauge = \"dynamic\"\n\n[dynamic]\nax = \"-y*omega*omegaX\"\nay = \"x*omega*omegaY\"\n";
    let dynamic = OperatorSet::build(&test_store(toml)).unwrap();
    let rotation =
        OperatorSet::build(&test_store("x_dim = 8\ny_dim = 8\ndims = 2\nomega = 0.5\n")).unwrap();

    for (d, r) in dynamic.gauge.ax.iter().zip(rotation.gauge.ax.iter()) {
        assert_relative_eq!(*d, *r, max_relative = 1e-12);
    }
    for (d, r) in dynamic.gauge.ay.iter().zip(rotation.gauge.ay.iter()) {
        assert_relative_eq!(*d, *r, max_relative = 1e-12);
    }
    assert!(dynamic.gauge.az.iter().all(|&a| a == 0.0));
}

#[test]
fn test_dynamic_gauge_errors() {
    let mut store = test_store("x_dim = 4\ny_dim = 4\ndims = 2\n");
    store.store("Afn", "dynamic");
    assert!(matches!(
        OperatorSet::build(&store),
        Err(OperatorError::MissingExpression { slot: Slot::Ax })
    ));

    store.store("Axstring", "sin(x");
    store.store("Aystring", "0");
    assert!(matches!(
        OperatorSet::build(&store),
        Err(OperatorError::Parse { slot: Slot::Ax, .. })
    ));

    store.store("Axstring", "x*unknown");
    assert!(matches!(
        OperatorSet::build(&store),
        Err(OperatorError::Eval {
            err: EvalError::UnresolvedVariable { .. }
        })
    ));

    store.store("Axstring", "1/x");
    store.store("x", vec![-1.0, 0.0, 1.0, 2.0]);
    assert!(matches!(
        OperatorSet::build(&store),
        Err(OperatorError::Eval {
            err: EvalError::DivisionByZero
        })
    ));
}

#[test]
fn test_file_mode_requires_files() {
    let mut store = test_store("x_dim = 4\ny_dim = 4\ndims = 2\n");
    store.store("Vfn", "file");
    assert!(matches!(
        OperatorSet::build(&store),
        Err(OperatorError::MissingFile {
            slot: Slot::Potential
        })
    ));

    let mut store = test_store("x_dim = 4\ny_dim = 4\ndims = 2\n");
    store.store("Afn", "file");
    store.store("Axfile", "/nonexistent/Ax.dat");
    assert!(matches!(
        OperatorSet::build(&store),
        Err(OperatorError::FileRead { .. })
    ));
}

#[test]
fn test_evolution_factors() {
    use crate::utils::complex::magnitude;
    use approx::assert_relative_eq;

    let store = test_store("x_dim = 8\ny_dim = 8\ndims = 2\n");
    let set = OperatorSet::build(&store).unwrap();
    let dt = 1e-4;

    let real = set.evolution_factors(dt, EvolutionMode::Real).unwrap();
    for z in real.kinetic.iter().chain(real.potential.iter()) {
        assert_relative_eq!(magnitude(*z), 1.0, epsilon = 1e-12);
    }

    let imaginary = set.evolution_factors(dt, EvolutionMode::Imaginary).unwrap();
    for (z, v) in imaginary.potential.iter().zip(set.potential.iter()) {
        assert_eq!(z.im, 0.0);
        assert_relative_eq!(z.re, (-v * dt / (2.0 * HBAR)).exp(), max_relative = 1e-12);
        assert!(z.re <= 1.0);
    }
    // Zero momentum is left alone
    assert_eq!(imaginary.kinetic[[0, 0, 0]], Complex::new(1.0, 0.0));
}
