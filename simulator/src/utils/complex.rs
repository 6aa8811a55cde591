//! Scalar helpers on complex amplitudes. Every function is pure and touches a
//! single site, so they can be called from any parallel kernel.

use num::{Complex, Float};

/// `|a + ib| = sqrt(a² + b²)`
#[inline]
pub fn magnitude<T: Float>(z: Complex<T>) -> T {
    (z.re * z.re + z.im * z.im).sqrt()
}

/// `|a + ib|² = a² + b²`, without the square root.
#[inline]
pub fn magnitude_squared<T: Float>(z: Complex<T>) -> T {
    z.re * z.re + z.im * z.im
}

/// Negates the imaginary part only.
#[inline]
pub fn conjugate<T: Float>(z: Complex<T>) -> Complex<T> {
    Complex::new(z.re, -z.im)
}

/// Real scalar times complex number.
#[inline]
pub fn real_comp_mult<T: Float>(scalar: T, z: Complex<T>) -> Complex<T> {
    Complex::new(scalar * z.re, scalar * z.im)
}

#[inline]
pub fn complex_mult<T: Float>(a: Complex<T>, b: Complex<T>) -> Complex<T> {
    Complex::new(a.re * b.re - a.im * b.im, a.re * b.im + a.im * b.re)
}

/// Unit phase factor `e^{iφ}`.
#[inline]
pub fn phase_factor<T: Float>(phi: T) -> Complex<T> {
    Complex::new(phi.cos(), phi.sin())
}

#[cfg(test)]
fn samples() -> Vec<Complex<f64>> {
    let mut values = vec![];
    for re in [-3.5, -1.0, 0.0, 1e-8, 2.0, 7.25] {
        for im in [-4.0, -0.5, 0.0, 3.0, 1e6] {
            values.push(Complex::new(re, im));
        }
    }
    values
}

#[test]
fn test_magnitude_identities() {
    use approx::assert_relative_eq;

    for z in samples() {
        assert_eq!(magnitude(conjugate(z)), magnitude(z));
        assert_relative_eq!(
            magnitude_squared(z),
            magnitude(z).powi(2),
            max_relative = 1e-12
        );
        assert_eq!(conjugate(conjugate(z)), z);
    }
}

#[test]
fn test_magnitude_matches_num() {
    use approx::assert_relative_eq;

    for z in samples() {
        assert_relative_eq!(magnitude(z), z.norm(), max_relative = 1e-14);
        assert_eq!(conjugate(z), z.conj());
    }
}

#[test]
fn test_products() {
    let a = Complex::new(1.0_f32, 2.0);
    let b = Complex::new(-3.0_f32, 0.5);
    assert_eq!(complex_mult(a, b), a * b);
    assert_eq!(real_comp_mult(2.0, a), Complex::new(2.0, 4.0));

    let unit = phase_factor(std::f64::consts::FRAC_PI_2);
    assert!((unit.re).abs() < 1e-15);
    assert!((unit.im - 1.0).abs() < 1e-15);
}
