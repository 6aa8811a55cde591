//! Elementwise multiply kernels applied to the wavefunction each step.
//!
//! Every kernel is a parallel map with one work item per grid site and no
//! cross-site dependency. Inputs must share one shape; the output always has
//! that shape too.

use std::f64::consts::PI;

use gpe_common::{ParameterStore, HBAR};
use ndarray::{Array3, Zip};
use num::{Float, FromPrimitive};
#[cfg(test)]
use num::Complex;

use crate::utils::{
    complex::{complex_mult, magnitude_squared, phase_factor, real_comp_mult},
    error::{OperatorError, RuntimeError},
    grid::{ensure_same_shape, ComplexField},
};

/// Real-time propagation or imaginary-time relaxation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EvolutionMode {
    Real,
    Imaginary,
}

/// Scalars entering the density-dependent (nonlinear) multiply.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DensityParams {
    pub dt: f64,
    pub mass: f64,
    pub omega_z: f64,
    /// Number of atoms in the condensate
    pub atoms: f64,
    pub scattering_length: f64,
    /// Scaling of the interaction term
    pub interaction: f64,
    pub mode: EvolutionMode,
}

impl DensityParams {
    pub fn from_store(
        store: &ParameterStore,
        dt: f64,
        mode: EvolutionMode,
    ) -> Result<Self, OperatorError> {
        Ok(DensityParams {
            dt,
            mass: store.real("mass")?,
            omega_z: store.real("omegaZ")?,
            atoms: store.int("atoms")? as f64,
            scattering_length: store.real("a_s")?,
            interaction: store.real("interaction")?,
            mode,
        })
    }

    /// Coefficient multiplying `|ψ|²` in the mean-field energy,
    /// `½N·4πħ²(a_s/m)·sqrt(mω_z/(2πħ))`, scaled by the interaction factor.
    pub fn coupling(&self) -> f64 {
        0.5 * self.atoms
            * 4.0
            * HBAR
            * HBAR
            * PI
            * (self.scattering_length / self.mass)
            * (self.mass * self.omega_z / (2.0 * PI * HBAR)).sqrt()
            * self.interaction
    }
}

/// `out = a · b`
pub fn cmult<T>(a: &ComplexField<T>, b: &ComplexField<T>) -> Result<ComplexField<T>, RuntimeError>
where
    T: Float + Send + Sync,
{
    let mut out = ComplexField::<T>::zeros(a.raw_dim());
    cmult_into(a, b, &mut out)?;
    Ok(out)
}

pub fn cmult_into<T>(
    a: &ComplexField<T>,
    b: &ComplexField<T>,
    out: &mut ComplexField<T>,
) -> Result<(), RuntimeError>
where
    T: Float + Send + Sync,
{
    ensure_same_shape(a, b)?;
    ensure_same_shape(a, out)?;
    Zip::from(out)
        .and(a)
        .and(b)
        .par_for_each(|o, &x, &y| *o = complex_mult(x, y));
    Ok(())
}

/// `out = ψ · e^{iφ}`
pub fn cmult_phi<T>(psi: &ComplexField<T>, phi: &Array3<T>) -> Result<ComplexField<T>, RuntimeError>
where
    T: Float + Send + Sync,
{
    let mut out = ComplexField::<T>::zeros(psi.raw_dim());
    cmult_phi_into(psi, phi, &mut out)?;
    Ok(out)
}

pub fn cmult_phi_into<T>(
    psi: &ComplexField<T>,
    phi: &Array3<T>,
    out: &mut ComplexField<T>,
) -> Result<(), RuntimeError>
where
    T: Float + Send + Sync,
{
    ensure_same_shape(psi, phi)?;
    ensure_same_shape(psi, out)?;
    Zip::from(out)
        .and(psi)
        .and(phi)
        .par_for_each(|o, &z, &p| *o = complex_mult(z, phase_factor(p)));
    Ok(())
}

/// `out = op · ψ · n(ψ)` where the nonlinear factor is `exp(-g|ψ|²dt/ħ)` in
/// imaginary time and `exp(-i g|ψ|²dt/ħ)` in real time.
pub fn cmult_density<T>(
    op: &ComplexField<T>,
    psi: &ComplexField<T>,
    params: &DensityParams,
) -> Result<ComplexField<T>, RuntimeError>
where
    T: Float + FromPrimitive + Send + Sync,
{
    let mut out = ComplexField::<T>::zeros(psi.raw_dim());
    cmult_density_into(op, psi, &mut out, params)?;
    Ok(out)
}

pub fn cmult_density_into<T>(
    op: &ComplexField<T>,
    psi: &ComplexField<T>,
    out: &mut ComplexField<T>,
    params: &DensityParams,
) -> Result<(), RuntimeError>
where
    T: Float + FromPrimitive + Send + Sync,
{
    ensure_same_shape(op, psi)?;
    ensure_same_shape(op, out)?;

    let scale = T::from_f64(params.coupling() * params.dt / HBAR).ok_or(RuntimeError::NanOrInf)?;
    if !scale.is_finite() {
        return Err(RuntimeError::NanOrInf);
    }

    match params.mode {
        EvolutionMode::Imaginary => Zip::from(out).and(op).and(psi).par_for_each(|o, &g, &z| {
            let damping = (-scale * magnitude_squared(z)).exp();
            *o = real_comp_mult(damping, complex_mult(g, z));
        }),
        EvolutionMode::Real => Zip::from(out).and(op).and(psi).par_for_each(|o, &g, &z| {
            let rotation = phase_factor(-scale * magnitude_squared(z));
            *o = complex_mult(complex_mult(g, z), rotation);
        }),
    }
    Ok(())
}

/// Multiplies every site by `factor` in place, e.g. `1/N` after an inverse
/// transform.
pub fn scale<T>(field: &mut ComplexField<T>, factor: T)
where
    T: Float + Send + Sync,
{
    field.par_mapv_inplace(|z| real_comp_mult(factor, z));
}

#[cfg(test)]
fn sample_field(shape: (usize, usize, usize)) -> ComplexField<f64> {
    ComplexField::from_shape_fn(shape, |(i, j, k)| {
        Complex::new(
            (i as f64 * 0.4 + k as f64).cos(),
            (j as f64 * 0.9 - k as f64).sin(),
        )
    })
}

#[cfg(test)]
fn test_params(mode: EvolutionMode) -> DensityParams {
    DensityParams {
        dt: 1e-4,
        mass: gpe_common::RB87_MASS,
        omega_z: 6.283,
        atoms: 1e4,
        scattering_length: gpe_common::RB87_SCATTERING_LENGTH,
        interaction: 1.0,
        mode,
    }
}

#[test]
fn test_cmult_matches_pointwise_product() {
    let a = sample_field((6, 5, 3));
    let b = a.mapv(|z| z * Complex::new(0.5, -2.0));
    let out = cmult(&a, &b).unwrap();
    for ((o, x), y) in out.iter().zip(a.iter()).zip(b.iter()) {
        assert_eq!(*o, *x * *y);
    }
}

#[test]
fn test_cmult_rejects_mismatched_shapes() {
    let a = sample_field((4, 4, 1));
    let b = sample_field((2, 8, 1));
    assert_eq!(
        cmult(&a, &b),
        Err(RuntimeError::ShapeMismatch {
            expected: [4, 4, 1],
            found: [2, 8, 1]
        })
    );
}

#[test]
fn test_cmult_phi_preserves_magnitude() {
    use crate::utils::complex::magnitude;
    use approx::assert_relative_eq;

    let psi = sample_field((8, 8, 1));
    let phi = Array3::from_shape_fn((8, 8, 1), |(i, j, _)| (i * j) as f64 * 0.1);
    let out = cmult_phi(&psi, &phi).unwrap();
    for (o, z) in out.iter().zip(psi.iter()) {
        assert_relative_eq!(magnitude(*o), magnitude(*z), max_relative = 1e-12);
    }

    // A phase of pi flips the sign
    let flip = Array3::from_elem((8, 8, 1), std::f64::consts::PI);
    let out = cmult_phi(&psi, &flip).unwrap();
    for (o, z) in out.iter().zip(psi.iter()) {
        assert_relative_eq!(o.re, -z.re, epsilon = 1e-12);
        assert_relative_eq!(o.im, -z.im, epsilon = 1e-12);
    }
}

#[test]
fn test_density_branches() {
    use crate::utils::complex::magnitude;
    use approx::assert_relative_eq;

    let psi = sample_field((8, 4, 2)).mapv(|z| z * 1e3);
    let identity = ComplexField::from_elem(psi.raw_dim(), Complex::new(1.0, 0.0));

    // Real time only rotates the phase
    let params = test_params(EvolutionMode::Real);
    let out = cmult_density(&identity, &psi, &params).unwrap();
    for (o, z) in out.iter().zip(psi.iter()) {
        assert_relative_eq!(magnitude(*o), magnitude(*z), max_relative = 1e-12);
    }

    // Imaginary time damps denser sites harder
    let params = test_params(EvolutionMode::Imaginary);
    let scale = params.coupling() * params.dt / HBAR;
    let out = cmult_density(&identity, &psi, &params).unwrap();
    for (o, z) in out.iter().zip(psi.iter()) {
        let expected = magnitude(*z) * (-scale * z.norm_sqr()).exp();
        assert_relative_eq!(magnitude(*o), expected, max_relative = 1e-12);
        assert!(magnitude(*o) <= magnitude(*z));
    }
}

#[test]
fn test_real_time_density_phase() {
    use approx::assert_relative_eq;

    let psi = sample_field((8, 4, 2)).mapv(|z| z * 1e3);
    let identity = ComplexField::from_elem(psi.raw_dim(), Complex::new(1.0, 0.0));

    // Long step so the nonlinear phase is of order one
    let params = DensityParams {
        dt: 100.0,
        ..test_params(EvolutionMode::Real)
    };
    let scale = params.coupling() * params.dt / HBAR;
    let out = cmult_density(&identity, &psi, &params).unwrap();
    let mut largest_phase: f64 = 0.0;
    for (o, z) in out.iter().zip(psi.iter()) {
        let phase = -scale * z.norm_sqr();
        let expected = *z * Complex::new(phase.cos(), phase.sin());
        assert_relative_eq!(o.re, expected.re, epsilon = 1e-9);
        assert_relative_eq!(o.im, expected.im, epsilon = 1e-9);
        largest_phase = largest_phase.max(phase.abs());
    }
    assert!(largest_phase > 1e-3);
}

#[test]
fn test_scale() {
    let mut field = sample_field((4, 4, 1));
    let original = field.clone();
    scale(&mut field, 0.25);
    for (s, z) in field.iter().zip(original.iter()) {
        assert_eq!(*s, *z * 0.25);
    }
}
