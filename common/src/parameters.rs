use std::f64::consts::PI;

use num::FromPrimitive;
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::{
    constants::*,
    error::CommonError,
    gauge::{compact_expression, read_gauge_config, GaugeExpressions},
    store::ParameterStore,
};

#[derive(Copy, Clone, Debug, Serialize, Deserialize, FromPrimitive, ToPrimitive, PartialEq, Eq)]
pub enum Dimensions {
    Two = 2,
    Three = 3,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TomlParameters {
    /// Number of grid points along x
    pub x_dim: usize,
    /// Number of grid points along y
    pub y_dim: usize,
    /// Number of grid points along z (ignored in 2D)
    pub z_dim: Option<usize>,
    /// Dimensionality of grid
    pub dims: usize,

    /// Rotation rate as a fraction of the trapping frequency
    #[serde(default)]
    pub omega: f64,
    /// Trap anisotropy
    #[serde(default = "default_one")]
    pub gamma_y: f64,
    #[serde(default = "default_trap_frequency")]
    pub omega_x: f64,
    #[serde(default = "default_trap_frequency")]
    pub omega_y: f64,
    #[serde(default = "default_trap_frequency")]
    pub omega_z: f64,

    /// Atomic mass (kg)
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// Number of atoms in the condensate
    #[serde(default = "default_atoms")]
    pub atoms: usize,
    /// s-wave scattering length (m)
    #[serde(default = "default_scattering_length")]
    pub scattering_length: f64,
    /// Scaling of the nonlinear interaction term
    #[serde(default = "default_one")]
    pub interaction: f64,

    /// Half-width of the box. Derived from the condensate size when absent.
    pub box_size: Option<f64>,
    #[serde(default)]
    pub x0_shift: f64,
    #[serde(default)]
    pub y0_shift: f64,
    #[serde(default)]
    pub z0_shift: f64,
    /// Scales the ring radius of toroidal traps
    #[serde(default = "default_one")]
    pub fudge: f64,
    /// Target value of the discrete wavefunction norm
    #[serde(default = "default_one")]
    pub norm_target: f64,
    /// Use the dimensionless kinetic/potential variants
    #[serde(default = "bool::default")]
    pub dimensionless: bool,

    /// Operator selectors
    #[serde(default)]
    pub operators: OperatorSelection,

    /// Files for the `file` potential/gauge modes
    #[serde(default)]
    pub files: OperatorFiles,

    /// Expressions for the `dynamic` gauge
    #[serde(default)]
    pub dynamic: DynamicGauge,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct OperatorSelection {
    pub kinetic: Option<String>,
    pub potential: Option<String>,
    pub gauge: Option<String>,
    pub wavefunction: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct OperatorFiles {
    pub ax: Option<String>,
    pub ay: Option<String>,
    pub az: Option<String>,
    pub v: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DynamicGauge {
    pub ax: Option<String>,
    pub ay: Option<String>,
    pub az: Option<String>,
    /// Gauge config file; entries given inline take priority
    pub config: Option<String>,
}

fn default_one() -> f64 {
    1.0
}

fn default_trap_frequency() -> f64 {
    DEFAULT_TRAP_FREQUENCY
}

fn default_mass() -> f64 {
    RB87_MASS
}

fn default_atoms() -> usize {
    1
}

fn default_scattering_length() -> f64 {
    RB87_SCATTERING_LENGTH
}

/// This function reads toml files
pub fn read_toml(path: &str) -> Result<TomlParameters, CommonError> {
    // Read toml config file
    let toml_contents: &str =
        &std::fs::read_to_string(path).map_err(|_| CommonError::TomlReadError {
            path: path.to_string(),
        })?;

    parse_toml(toml_contents)
}

pub fn parse_toml(contents: &str) -> Result<TomlParameters, CommonError> {
    toml::from_str(contents).map_err(|e| CommonError::TomlParseError {
        msg: format!("{e:?}"),
    })
}

impl TomlParameters {
    pub fn dimensions(&self) -> Result<Dimensions, CommonError> {
        Dimensions::from_usize(self.dims)
            .ok_or(CommonError::InvalidDimensions { dims: self.dims })
    }

    /// Selector strings for (K, V, A, Wfc), filling in the defaults for the
    /// configured dimensionality.
    pub fn selectors(&self) -> Result<[String; 4], CommonError> {
        let dims = self.dimensions()?;
        let (kinetic, potential, wavefunction) = match (dims, self.dimensionless) {
            (Dimensions::Two, false) => ("rotation_K", "harmonic_V", "standard_2d"),
            (Dimensions::Two, true) => (
                "rotation_K_dimensionless",
                "harmonic_V_dimensionless",
                "standard_2d",
            ),
            (Dimensions::Three, _) => ("rotation_K3d", "harmonic_V3d", "standard_3d"),
        };
        let ops = &self.operators;
        Ok([
            ops.kinetic.clone().unwrap_or_else(|| kinetic.to_string()),
            ops.potential.clone().unwrap_or_else(|| potential.to_string()),
            ops.gauge.clone().unwrap_or_else(|| "rotation".to_string()),
            ops.wavefunction
                .clone()
                .unwrap_or_else(|| wavefunction.to_string()),
        ])
    }

    /// Merges inline dynamic gauge expressions with the optional gauge config file.
    pub fn gauge_expressions(&self) -> Result<GaugeExpressions, CommonError> {
        let from_file = match &self.dynamic.config {
            Some(path) => read_gauge_config(path)?,
            None => GaugeExpressions::default(),
        };
        let inline = |s: &Option<String>| s.as_deref().map(compact_expression);
        Ok(GaugeExpressions {
            ax: inline(&self.dynamic.ax).or(from_file.ax),
            ay: inline(&self.dynamic.ay).or(from_file.ay),
            az: inline(&self.dynamic.az).or(from_file.az),
        })
    }
}

/// Coordinates of one axis.
struct Axis {
    coordinates: Vec<f64>,
    momenta: Vec<f64>,
    spacing: f64,
    momentum_spacing: f64,
}

impl Axis {
    /// Position grid `-max + i*d` and momentum grid in FFT order. A singleton
    /// axis collapses to `[0]` with unit spacing.
    fn new(n: usize, max: f64) -> Axis {
        if n == 1 {
            return Axis {
                coordinates: vec![0.0],
                momenta: vec![0.0],
                spacing: 1.0,
                momentum_spacing: 0.0,
            };
        }
        let spacing = 2.0 * max / n as f64;
        let momentum_spacing = PI / max;
        let coordinates = (0..n).map(|i| -max + i as f64 * spacing).collect();
        let momenta = (0..n)
            .map(|i| {
                if i < n / 2 {
                    i as f64 * momentum_spacing
                } else {
                    (i as f64 - n as f64) * momentum_spacing
                }
            })
            .collect();
        Axis {
            coordinates,
            momenta,
            spacing,
            momentum_spacing,
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<f64, CommonError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(CommonError::InvalidParameter { name, value })
    }
}

fn grid_size(name: &'static str, value: usize) -> Result<usize, CommonError> {
    if value == 0 {
        Err(CommonError::InvalidGridSize { name, value })
    } else {
        Ok(value)
    }
}

impl ParameterStore {
    /// Builds the store from parsed toml, deriving length scales, box size,
    /// coordinate arrays and the cell volume element.
    pub fn from_toml(toml: &TomlParameters) -> Result<ParameterStore, CommonError> {
        let dims = toml.dimensions()?;
        let x_dim = grid_size("x_dim", toml.x_dim)?;
        let y_dim = grid_size("y_dim", toml.y_dim)?;
        let z_dim = match dims {
            Dimensions::Two => {
                if matches!(toml.z_dim, Some(n) if n != 1) {
                    log::warn!("z_dim is ignored for 2D grids");
                }
                1
            }
            Dimensions::Three => grid_size("z_dim", toml.z_dim.unwrap_or(0))?,
        };

        let mass = positive("mass", toml.mass)?;
        let omega_x = positive("omega_x", toml.omega_x)?;
        let omega_y = positive("omega_y", toml.omega_y)?;
        let omega_z = positive("omega_z", toml.omega_z)?;
        let scattering_length = positive("scattering_length", toml.scattering_length)?;
        let norm_target = positive("norm_target", toml.norm_target)?;
        if toml.atoms == 0 {
            return Err(CommonError::InvalidParameter {
                name: "atoms",
                value: 0.0,
            });
        }
        if toml.dimensionless && dims == Dimensions::Three {
            log::warn!("dimensionless is only available for 2D grids and is ignored");
        }

        // Harmonic oscillator lengths
        let a0x = (HBAR / (2.0 * mass * omega_x)).sqrt();
        let a0y = (HBAR / (2.0 * mass * omega_y)).sqrt();
        let a0z = (HBAR / (2.0 * mass * omega_z)).sqrt();

        // Thomas-Fermi radius in units of the oscillator length
        let rxy = positive(
            "Rxy",
            (15.0 * toml.atoms as f64 * scattering_length * (mass * omega_z / HBAR).sqrt())
                .powf(0.2),
        )?;

        let (x_max, y_max, z_max) = match toml.box_size {
            Some(size) => {
                let size = positive("box_size", size)?;
                (size, size, size)
            }
            None => (
                positive("xMax", 6.0 * rxy * a0x)?,
                positive("yMax", 6.0 * rxy * a0y)?,
                positive("zMax", 6.0 * rxy * a0z)?,
            ),
        };
        let x = Axis::new(x_dim, x_max);
        let y = Axis::new(y_dim, y_max);
        let z = Axis::new(z_dim, z_max);
        let dr = x.spacing * y.spacing * z.spacing;

        let [kinetic, potential, gauge, wavefunction] = toml.selectors()?;

        let mut store = ParameterStore::new();
        store.store("xDim", x_dim);
        store.store("yDim", y_dim);
        store.store("zDim", z_dim);
        store.store("dimnum", dims as usize);
        store.store("atoms", toml.atoms);

        store.store("omega", toml.omega);
        store.store("gammaY", toml.gamma_y);
        store.store("omegaX", omega_x);
        store.store("omegaY", omega_y);
        store.store("omegaZ", omega_z);
        store.store("mass", mass);
        store.store("a_s", scattering_length);
        store.store("interaction", toml.interaction);
        store.store("x0_shift", toml.x0_shift);
        store.store("y0_shift", toml.y0_shift);
        store.store("z0_shift", toml.z0_shift);
        store.store("fudge", toml.fudge);
        store.store("norm_target", norm_target);
        store.store("dimensionless", toml.dimensionless);

        store.store("a0x", a0x);
        store.store("a0y", a0y);
        store.store("a0z", a0z);
        store.store("Rxy", rxy);
        store.store("xMax", x_max);
        store.store("yMax", y_max);
        store.store("zMax", z_max);
        store.store("dx", x.spacing);
        store.store("dy", y.spacing);
        store.store("dz", z.spacing);
        store.store("dpx", x.momentum_spacing);
        store.store("dpy", y.momentum_spacing);
        store.store("dpz", z.momentum_spacing);
        store.store("dr", dr);

        store.store("x", x.coordinates);
        store.store("y", y.coordinates);
        store.store("z", z.coordinates);
        store.store("xp", x.momenta);
        store.store("yp", y.momenta);
        store.store("zp", z.momenta);

        store.store("Kfn", kinetic);
        store.store("Vfn", potential);
        store.store("Afn", gauge);
        store.store("Wfcfn", wavefunction);

        let files = [
            ("Axfile", &toml.files.ax),
            ("Ayfile", &toml.files.ay),
            ("Azfile", &toml.files.az),
            ("Vfile", &toml.files.v),
        ];
        for (key, path) in files {
            if let Some(path) = path {
                store.store(key, path.as_str());
            }
        }

        let expressions = toml.gauge_expressions()?;
        let strings = [
            ("Axstring", expressions.ax),
            ("Aystring", expressions.ay),
            ("Azstring", expressions.az),
        ];
        for (key, expression) in strings {
            if let Some(expression) = expression {
                store.store(key, expression);
            }
        }

        log::info!("built parameter store for a {x_dim}x{y_dim}x{z_dim} grid");
        Ok(store)
    }
}

#[cfg(test)]
const SAMPLE_TOML: &str = r#"
x_dim = 64
y_dim = 32
dims = 2
omega = 0.5
gamma_y = 1.0

[operators]
gauge = "dynamic"

[dynamic]
ax = "-y * omega * omegaX"
ay = "x*omega*omegaY"
"#;

#[test]
fn test_deserialize_toml() {
    let toml = parse_toml(SAMPLE_TOML).unwrap();
    assert_eq!(toml.x_dim, 64);
    assert_eq!(toml.dimensions().unwrap(), Dimensions::Two);
    assert_eq!(toml.omega_x, DEFAULT_TRAP_FREQUENCY);
    assert_eq!(toml.atoms, 1);
    assert_eq!(toml.operators.gauge.as_deref(), Some("dynamic"));
    assert_eq!(
        toml.selectors().unwrap(),
        [
            "rotation_K".to_string(),
            "harmonic_V".to_string(),
            "dynamic".to_string(),
            "standard_2d".to_string()
        ]
    );
}

#[test]
fn test_store_from_toml() {
    use approx::assert_relative_eq;

    let toml = parse_toml(SAMPLE_TOML).unwrap();
    let store = ParameterStore::from_toml(&toml).unwrap();

    assert_eq!(store.int("xDim").unwrap(), 64);
    assert_eq!(store.int("zDim").unwrap(), 1);
    assert_eq!(store.string("Axstring").unwrap(), "-y*omega*omegaX");
    assert!(store.optional_string("Azstring").unwrap().is_none());

    // Coordinates
    let x = store.real_array("x").unwrap();
    let x_max = store.real("xMax").unwrap();
    let dx = store.real("dx").unwrap();
    assert_eq!(x.len(), 64);
    assert_relative_eq!(x[0], -x_max);
    assert_relative_eq!(x[32], 0.0, epsilon = 1e-12 * x_max);
    assert_relative_eq!(dx, 2.0 * x_max / 64.0);
    assert_eq!(store.real_array("z").unwrap(), &[0.0]);

    // Momenta in FFT order
    let xp = store.real_array("xp").unwrap();
    let dpx = store.real("dpx").unwrap();
    assert_eq!(xp[0], 0.0);
    assert_relative_eq!(xp[31], 31.0 * dpx);
    assert_relative_eq!(xp[32], -32.0 * dpx);

    // Cell volume element
    assert_relative_eq!(
        store.real("dr").unwrap(),
        dx * store.real("dy").unwrap()
    );
}

#[test]
fn test_three_dimensional_defaults() {
    let toml = parse_toml("x_dim = 8\ny_dim = 8\nz_dim = 8\ndims = 3\n").unwrap();
    let store = ParameterStore::from_toml(&toml).unwrap();
    assert_eq!(store.string("Kfn").unwrap(), "rotation_K3d");
    assert_eq!(store.string("Vfn").unwrap(), "harmonic_V3d");
    assert_eq!(store.string("Wfcfn").unwrap(), "standard_3d");
    assert_eq!(store.real_array("z").unwrap().len(), 8);
}

#[test]
fn test_invalid_configuration() {
    let toml = parse_toml("x_dim = 8\ny_dim = 8\ndims = 4\n").unwrap();
    assert!(matches!(
        ParameterStore::from_toml(&toml),
        Err(CommonError::InvalidDimensions { dims: 4 })
    ));

    let toml = parse_toml("x_dim = 8\ny_dim = 8\ndims = 3\n").unwrap();
    assert!(matches!(
        ParameterStore::from_toml(&toml),
        Err(CommonError::InvalidGridSize { name: "z_dim", .. })
    ));

    let toml = parse_toml("x_dim = 8\ny_dim = 8\ndims = 2\nmass = 0.0\n").unwrap();
    assert!(matches!(
        ParameterStore::from_toml(&toml),
        Err(CommonError::InvalidParameter { name: "mass", .. })
    ));

    // No atoms means no condensate size and a zero-width box
    let toml = parse_toml("x_dim = 8\ny_dim = 8\ndims = 2\natoms = 0\n").unwrap();
    assert!(matches!(
        ParameterStore::from_toml(&toml),
        Err(CommonError::InvalidParameter { name: "atoms", .. })
    ));

    let toml = parse_toml("x_dim = 8\ny_dim = 8\ndims = 2\nnorm_target = 0.0\n").unwrap();
    assert!(matches!(
        ParameterStore::from_toml(&toml),
        Err(CommonError::InvalidParameter { name: "norm_target", .. })
    ));

    let toml = parse_toml("x_dim = 8\ny_dim = 8\ndims = 2\nbox_size = 0.0\n").unwrap();
    assert!(matches!(
        ParameterStore::from_toml(&toml),
        Err(CommonError::InvalidParameter { name: "box_size", .. })
    ));
}

#[test]
fn test_grid_spacings_finite() {
    let toml = parse_toml("x_dim = 8\ny_dim = 8\ndims = 2\n").unwrap();
    let store = ParameterStore::from_toml(&toml).unwrap();
    for key in ["dx", "dy", "dpx", "dpy", "dr"] {
        let value = store.real(key).unwrap();
        assert!(value.is_finite() && value > 0.0, "{key} = {value}");
    }
    for key in ["x", "y", "xp", "yp"] {
        assert!(store.real_array(key).unwrap().iter().all(|v| v.is_finite()));
    }
}

#[test]
fn test_dimensionless_ignored_in_3d() {
    let toml =
        parse_toml("x_dim = 8\ny_dim = 8\nz_dim = 8\ndims = 3\ndimensionless = true\n").unwrap();
    let store = ParameterStore::from_toml(&toml).unwrap();
    assert_eq!(store.string("Kfn").unwrap(), "rotation_K3d");
    assert_eq!(store.string("Vfn").unwrap(), "harmonic_V3d");
}
