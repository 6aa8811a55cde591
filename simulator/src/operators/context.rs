use gpe_common::{CommonError, Dimensions, ParameterStore};
use num::FromPrimitive;

use crate::utils::grid::{GridIndex, GridShape};

/// Read-only view over a [`ParameterStore`] with everything the evaluators
/// need resolved up front, so a missing key fails here and not per site.
#[derive(Clone, Debug)]
pub struct OperatorContext<'a> {
    store: &'a ParameterStore,
    pub shape: GridShape,
    pub dimensions: Dimensions,

    pub mass: f64,
    pub omega: f64,
    pub omega_x: f64,
    pub omega_y: f64,
    pub omega_z: f64,
    pub gamma_y: f64,
    pub x0_shift: f64,
    pub y0_shift: f64,
    pub z0_shift: f64,
    pub fudge: f64,

    pub x_max: f64,
    pub y_max: f64,
    pub z_max: f64,
    pub a0x: f64,
    pub a0y: f64,
    pub a0z: f64,
    pub rxy: f64,

    pub x: &'a [f64],
    pub y: &'a [f64],
    pub z: &'a [f64],
    pub xp: &'a [f64],
    pub yp: &'a [f64],
    pub zp: &'a [f64],
}

impl<'a> OperatorContext<'a> {
    pub fn new(store: &'a ParameterStore) -> Result<Self, CommonError> {
        let shape = GridShape::from_store(store)?;
        let dimnum = store.int("dimnum")?;
        let dimensions = Dimensions::from_i64(dimnum).ok_or(CommonError::InvalidDimensions {
            dims: dimnum.max(0) as usize,
        })?;

        // Every coordinate array must cover its axis
        let axis = move |name: &'static str, len: usize| -> Result<&'a [f64], CommonError> {
            let values = store.real_array(name)?;
            if values.len() != len {
                return Err(CommonError::InvalidGridSize {
                    name,
                    value: values.len(),
                });
            }
            Ok(values)
        };

        Ok(OperatorContext {
            store,
            shape,
            dimensions,
            mass: store.real("mass")?,
            omega: store.real("omega")?,
            omega_x: store.real("omegaX")?,
            omega_y: store.real("omegaY")?,
            omega_z: store.real("omegaZ")?,
            gamma_y: store.real("gammaY")?,
            x0_shift: store.real("x0_shift")?,
            y0_shift: store.real("y0_shift")?,
            z0_shift: store.real("z0_shift")?,
            fudge: store.real("fudge")?,
            x_max: store.real("xMax")?,
            y_max: store.real("yMax")?,
            z_max: store.real("zMax")?,
            a0x: store.real("a0x")?,
            a0y: store.real("a0y")?,
            a0z: store.real("a0z")?,
            rxy: store.real("Rxy")?,
            x: axis("x", shape.x_dim)?,
            y: axis("y", shape.y_dim)?,
            z: axis("z", shape.z_dim)?,
            xp: axis("xp", shape.x_dim)?,
            yp: axis("yp", shape.y_dim)?,
            zp: axis("zp", shape.z_dim)?,
        })
    }

    pub fn store(&self) -> &'a ParameterStore {
        self.store
    }

    /// Position `(x, y, z)` of a site.
    pub fn position(&self, at: GridIndex) -> (f64, f64, f64) {
        (self.x[at.i], self.y[at.j], self.z[at.k])
    }

    /// Momentum `(xp, yp, zp)` of a site.
    pub fn momentum(&self, at: GridIndex) -> (f64, f64, f64) {
        (self.xp[at.i], self.yp[at.j], self.zp[at.k])
    }

    pub fn is_3d(&self) -> bool {
        self.dimensions == Dimensions::Three
    }
}

#[cfg(test)]
pub(crate) fn test_store(toml: &str) -> ParameterStore {
    let toml = gpe_common::parse_toml(toml).unwrap();
    ParameterStore::from_toml(&toml).unwrap()
}

#[test]
fn test_context_resolves_store() {
    let store = test_store("x_dim = 16\ny_dim = 8\ndims = 2\nomega = 0.25\n");
    let ctx = OperatorContext::new(&store).unwrap();
    assert_eq!(ctx.shape, GridShape::new(16, 8, 1));
    assert_eq!(ctx.dimensions, Dimensions::Two);
    assert!(!ctx.is_3d());
    assert_eq!(ctx.omega, 0.25);
    assert_eq!(ctx.position(GridIndex::new(0, 0, 0)).0, -ctx.x_max);
    assert_eq!(ctx.position(GridIndex::new(3, 2, 0)).2, 0.0);
}

#[test]
fn test_context_missing_key() {
    let mut store = ParameterStore::new();
    store.store("xDim", 4usize);
    store.store("yDim", 4usize);
    store.store("zDim", 1usize);
    store.store("dimnum", 2usize);
    assert!(matches!(
        OperatorContext::new(&store),
        Err(CommonError::UnknownParameter { .. })
    ));

    // Coordinate arrays that do not cover the grid
    let mut store = test_store("x_dim = 4\ny_dim = 4\ndims = 2\n");
    store.store("x", vec![0.0, 1.0]);
    assert!(matches!(
        OperatorContext::new(&store),
        Err(CommonError::InvalidGridSize { name: "x", value: 2 })
    ));
}
