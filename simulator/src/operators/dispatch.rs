use std::str::FromStr;

use gpe_common::ParameterStore;

use crate::utils::error::{OperatorError, Slot};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KineticOperator {
    Rotation,
    Rotation3d,
    RotationDimensionless,
    RotationGauge,
}

/// Potentials given in closed form at every site.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PotentialFormula {
    Harmonic,
    Harmonic3d,
    HarmonicDimensionless,
    HarmonicGauge,
    Torus,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PotentialOperator {
    Formula(PotentialFormula),
    /// Read from `Vfile`
    File,
}

/// Vector potentials given in closed form at every site.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GaugeFormula {
    Rotation,
    Ring,
    Constant,
    Test,
    Fiber2d,
}

/// One selector drives all three vector-potential components.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GaugeKind {
    Formula(GaugeFormula),
    /// Compiled from `Axstring`, `Aystring` and `Azstring`
    Dynamic,
    /// Read from `Axfile`, `Ayfile` and `Azfile`
    File,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WavefunctionKind {
    Standard2d,
    Standard3d,
    Torus,
}

fn unknown(slot: Slot, name: &str) -> OperatorError {
    OperatorError::UnknownOperator {
        slot,
        name: name.to_string(),
    }
}

impl FromStr for KineticOperator {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rotation_K" => Ok(KineticOperator::Rotation),
            "rotation_K3d" => Ok(KineticOperator::Rotation3d),
            "rotation_K_dimensionless" => Ok(KineticOperator::RotationDimensionless),
            "rotation_gauge_K" => Ok(KineticOperator::RotationGauge),
            _ => Err(unknown(Slot::Kinetic, s)),
        }
    }
}

impl FromStr for PotentialOperator {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "harmonic_V" => Ok(PotentialFormula::Harmonic.into()),
            "harmonic_V3d" => Ok(PotentialFormula::Harmonic3d.into()),
            "harmonic_V_dimensionless" => Ok(PotentialFormula::HarmonicDimensionless.into()),
            "harmonic_gauge_V" => Ok(PotentialFormula::HarmonicGauge.into()),
            "torus_V" | "torus" => Ok(PotentialFormula::Torus.into()),
            "file" => Ok(PotentialOperator::File),
            _ => Err(unknown(Slot::Potential, s)),
        }
    }
}

impl FromStr for GaugeKind {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rotation" => Ok(GaugeFormula::Rotation.into()),
            "ring" => Ok(GaugeFormula::Ring.into()),
            "constant" => Ok(GaugeFormula::Constant.into()),
            "test" => Ok(GaugeFormula::Test.into()),
            "fiber2d" => Ok(GaugeFormula::Fiber2d.into()),
            "dynamic" => Ok(GaugeKind::Dynamic),
            "file" => Ok(GaugeKind::File),
            _ => Err(unknown(Slot::Gauge, s)),
        }
    }
}

impl From<PotentialFormula> for PotentialOperator {
    fn from(formula: PotentialFormula) -> Self {
        PotentialOperator::Formula(formula)
    }
}

impl From<GaugeFormula> for GaugeKind {
    fn from(formula: GaugeFormula) -> Self {
        GaugeKind::Formula(formula)
    }
}

impl FromStr for WavefunctionKind {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard_2d" => Ok(WavefunctionKind::Standard2d),
            "standard_3d" => Ok(WavefunctionKind::Standard3d),
            "torus" => Ok(WavefunctionKind::Torus),
            _ => Err(unknown(Slot::Wavefunction, s)),
        }
    }
}

/// The operator kinds named by the store's `Kfn`, `Vfn`, `Afn` and `Wfcfn`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OperatorHandles {
    pub kinetic: KineticOperator,
    pub potential: PotentialOperator,
    pub gauge: GaugeKind,
    pub wavefunction: WavefunctionKind,
}

pub fn resolve(store: &ParameterStore) -> Result<OperatorHandles, OperatorError> {
    let handles = OperatorHandles {
        kinetic: store.string("Kfn")?.parse()?,
        potential: store.string("Vfn")?.parse()?,
        gauge: store.string("Afn")?.parse()?,
        wavefunction: store.string("Wfcfn")?.parse()?,
    };
    log::info!(
        "Resolved operators: K = {:?}, V = {:?}, A = {:?}, wfc = {:?}",
        handles.kinetic,
        handles.potential,
        handles.gauge,
        handles.wavefunction
    );
    Ok(handles)
}

#[test]
fn test_every_selector_resolves() {
    for name in [
        "rotation_K",
        "rotation_K3d",
        "rotation_K_dimensionless",
        "rotation_gauge_K",
    ] {
        assert!(name.parse::<KineticOperator>().is_ok(), "{name}");
    }
    for name in [
        "harmonic_V",
        "harmonic_V3d",
        "harmonic_V_dimensionless",
        "harmonic_gauge_V",
        "torus_V",
        "torus",
        "file",
    ] {
        assert!(name.parse::<PotentialOperator>().is_ok(), "{name}");
    }
    for name in [
        "rotation", "ring", "constant", "test", "fiber2d", "dynamic", "file",
    ] {
        assert!(name.parse::<GaugeKind>().is_ok(), "{name}");
    }
    for name in ["standard_2d", "standard_3d", "torus"] {
        assert!(name.parse::<WavefunctionKind>().is_ok(), "{name}");
    }
    assert_eq!(
        "torus".parse::<PotentialOperator>().unwrap(),
        PotentialOperator::Formula(PotentialFormula::Torus)
    );
}

#[test]
fn test_grid_backed_kinds_have_no_formula() {
    assert_eq!(
        "file".parse::<PotentialOperator>().unwrap(),
        PotentialOperator::File
    );
    assert_eq!("file".parse::<GaugeKind>().unwrap(), GaugeKind::File);
    assert_eq!("dynamic".parse::<GaugeKind>().unwrap(), GaugeKind::Dynamic);
    assert_eq!(
        "constant".parse::<GaugeKind>().unwrap(),
        GaugeKind::Formula(GaugeFormula::Constant)
    );
}

#[test]
fn test_unknown_selectors_rejected() {
    for name in ["", "rotation", "Rotation_K", "rotation_K "] {
        assert!(matches!(
            name.parse::<KineticOperator>(),
            Err(OperatorError::UnknownOperator {
                slot: Slot::Kinetic,
                ..
            })
        ));
    }
    assert!(matches!(
        "harmonic".parse::<PotentialOperator>(),
        Err(OperatorError::UnknownOperator {
            slot: Slot::Potential,
            ..
        })
    ));
    assert!(matches!(
        "magnetic".parse::<GaugeKind>(),
        Err(OperatorError::UnknownOperator { slot: Slot::Gauge, name }) if name == "magnetic"
    ));
    assert!(matches!(
        "standard".parse::<WavefunctionKind>(),
        Err(OperatorError::UnknownOperator {
            slot: Slot::Wavefunction,
            ..
        })
    ));
}

#[test]
fn test_resolve_from_store() {
    let mut store = super::context::test_store("x_dim = 4\ny_dim = 4\ndims = 2\n");
    let handles = resolve(&store).unwrap();
    assert_eq!(handles.kinetic, KineticOperator::Rotation);
    assert_eq!(
        handles.potential,
        PotentialOperator::Formula(PotentialFormula::Harmonic)
    );
    assert_eq!(handles.gauge, GaugeKind::Formula(GaugeFormula::Rotation));
    assert_eq!(handles.wavefunction, WavefunctionKind::Standard2d);

    store.store("Vfn", "parabolic");
    assert!(matches!(
        resolve(&store),
        Err(OperatorError::UnknownOperator {
            slot: Slot::Potential,
            ..
        })
    ));
}
