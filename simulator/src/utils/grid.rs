use std::ops::Add;

use gpe_common::{CommonError, ParameterStore};
use ndarray::{Array3, Zip};
use num::{Complex, Float, Zero};
use rayon::prelude::*;

use super::{
    complex::{magnitude_squared, real_comp_mult},
    error::RuntimeError,
};

/// Wavefunction-shaped complex data, laid out `(x, y, z)` in standard order.
pub type ComplexField<T> = Array3<Complex<T>>;

/// One precomputed real value per grid site.
pub type OperatorGrid = Array3<f64>;

/// Number of partial sums folded together per block in one reduction pass.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GridIndex {
    pub i: usize,
    pub j: usize,
    /// Always 0 on 2D grids
    pub k: usize,
}

impl GridIndex {
    pub fn new(i: usize, j: usize, k: usize) -> Self {
        GridIndex { i, j, k }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GridShape {
    pub x_dim: usize,
    pub y_dim: usize,
    /// 1 on 2D grids
    pub z_dim: usize,
}

impl GridShape {
    pub fn new(x_dim: usize, y_dim: usize, z_dim: usize) -> Self {
        GridShape {
            x_dim,
            y_dim,
            z_dim,
        }
    }

    pub fn from_store(store: &ParameterStore) -> Result<Self, CommonError> {
        let dim = |key: &'static str| -> Result<usize, CommonError> {
            let value = store.int(key)?;
            if value < 1 {
                return Err(CommonError::InvalidGridSize {
                    name: key,
                    value: value.max(0) as usize,
                });
            }
            Ok(value as usize)
        };
        Ok(GridShape::new(dim("xDim")?, dim("yDim")?, dim("zDim")?))
    }

    pub fn of<A>(array: &Array3<A>) -> Self {
        let (x_dim, y_dim, z_dim) = array.dim();
        GridShape::new(x_dim, y_dim, z_dim)
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        (self.x_dim, self.y_dim, self.z_dim)
    }

    pub fn len(&self) -> usize {
        self.x_dim * self.y_dim * self.z_dim
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `i*yDim*zDim + j*zDim + k`, which reduces to `i*yDim + j` in 2D. This
    /// is the memory order of a standard-layout `Array3`.
    pub fn linear_index(&self, index: GridIndex) -> usize {
        index.i * self.y_dim * self.z_dim + index.j * self.z_dim + index.k
    }

    pub fn grid_index(&self, linear: usize) -> GridIndex {
        let k = linear % self.z_dim;
        let j = (linear / self.z_dim) % self.y_dim;
        let i = linear / (self.y_dim * self.z_dim);
        GridIndex { i, j, k }
    }

    /// All indices in linearization order.
    pub fn indices(&self) -> impl Iterator<Item = GridIndex> {
        let shape = *self;
        (0..shape.len()).map(move |linear| shape.grid_index(linear))
    }

    fn as_array(&self) -> [usize; 3] {
        [self.x_dim, self.y_dim, self.z_dim]
    }
}

/// Refuses to pair arrays whose linearizations would disagree.
pub fn ensure_same_shape<A, B>(
    expected: &Array3<A>,
    found: &Array3<B>,
) -> Result<(), RuntimeError> {
    let (expected, found) = (GridShape::of(expected), GridShape::of(found));
    if expected != found {
        return Err(RuntimeError::ShapeMismatch {
            expected: expected.as_array(),
            found: found.as_array(),
        });
    }
    Ok(())
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Reduction<T> {
    pub sum: T,
    /// Number of passes (barriers) the reduction took
    pub passes: usize,
}

/// Multi-pass tree reduction. Every pass folds disjoint blocks of
/// `block_size` partial sums in parallel; the collect at the end of a pass is
/// the barrier before the next one reads the partials.
///
/// The summation order depends on `block_size`, so results agree across block
/// sizes only up to rounding.
pub fn multipass_sum<T>(values: &[T], block_size: usize) -> Result<Reduction<T>, RuntimeError>
where
    T: Copy + Send + Sync + Zero + Add<Output = T>,
{
    if block_size < 2 {
        return Err(RuntimeError::InvalidBlockSize { block_size });
    }
    if values.is_empty() {
        return Ok(Reduction {
            sum: T::zero(),
            passes: 0,
        });
    }

    let block_sum = |block: &[T]| block.iter().fold(T::zero(), |acc, &v| acc + v);

    let mut partials: Vec<T> = values.par_chunks(block_size).map(block_sum).collect();
    let mut passes = 1;
    while partials.len() > 1 {
        partials = partials.par_chunks(block_size).map(block_sum).collect();
        passes += 1;
    }
    log::debug!("reduced {} values in {passes} passes", values.len());

    Ok(Reduction {
        sum: partials[0],
        passes,
    })
}

/// `|ψ|²` at every site.
pub fn density<T>(field: &ComplexField<T>) -> Array3<T>
where
    T: Float + Send + Sync,
{
    let mut density = Array3::<T>::zeros(field.raw_dim());
    Zip::from(&mut density)
        .and(field)
        .par_for_each(|d, &z| *d = magnitude_squared(z));
    density
}

/// Discrete norm `Σ|ψ|²·dr`.
pub fn field_norm<T>(field: &ComplexField<T>, dr: T, block_size: usize) -> Result<T, RuntimeError>
where
    T: Float + Send + Sync,
{
    // Freshly allocated, so the raw vec is in linearization order
    let values = density(field).into_raw_vec();
    Ok(multipass_sum(&values, block_size)?.sum * dr)
}

/// Rescales `field` so that `Σ|ψ|²·dr == target` and returns the norm it had
/// before. Degenerate norms are rejected and leave the field untouched.
pub fn renormalize<T>(
    field: &mut ComplexField<T>,
    dr: T,
    target: T,
    block_size: usize,
) -> Result<T, RuntimeError>
where
    T: Float + Send + Sync,
{
    let norm = field_norm(field, dr, block_size)?;
    if !norm.is_finite() {
        return Err(RuntimeError::NanOrInf);
    }
    if norm < T::min_positive_value() {
        return Err(RuntimeError::DegenerateNorm {
            norm: norm.to_f64().unwrap_or(0.0),
        });
    }

    let factor = (target / norm).sqrt();
    if !(factor.is_finite() && factor > T::zero()) {
        return Err(RuntimeError::NanOrInf);
    }
    field.par_mapv_inplace(|z| real_comp_mult(factor, z));

    Ok(norm)
}

/// Whether `Σ|ψ|²·dr` is within `tolerance` of `target`.
pub fn check_norm<T>(
    field: &ComplexField<T>,
    dr: T,
    target: T,
    tolerance: T,
) -> Result<bool, RuntimeError>
where
    T: Float + Send + Sync,
{
    let norm = field_norm(field, dr, DEFAULT_BLOCK_SIZE)?;
    Ok((norm - target).abs() < tolerance)
}

/// True when no amplitude is NaN or infinite.
pub fn check_complex_for_nans<T>(field: &ComplexField<T>) -> bool
where
    T: Float + Send + Sync,
{
    field
        .par_iter()
        .all(|z| z.re.is_finite() && z.im.is_finite())
}

/// True when no value is NaN or infinite.
pub fn check_for_nans<T>(grid: &Array3<T>) -> bool
where
    T: Float + Send + Sync,
{
    grid.par_iter().all(|v| v.is_finite())
}

#[test]
fn test_linearization_matches_layout() {
    let shape = GridShape::new(3, 4, 5);
    let array = Array3::from_shape_fn(shape.dim(), |(i, j, k)| (i, j, k));
    let flat = array.as_slice().unwrap();
    for index in shape.indices() {
        let linear = shape.linear_index(index);
        assert_eq!(flat[linear], (index.i, index.j, index.k));
        assert_eq!(shape.grid_index(linear), index);
    }

    // 2D linearization
    let shape = GridShape::new(4, 6, 1);
    assert_eq!(shape.linear_index(GridIndex::new(2, 5, 0)), 2 * 6 + 5);
}

#[test]
fn test_uniform_sum_independent_of_block_size() {
    use approx::assert_relative_eq;

    let c = 0.37_f64;
    for n in [1, 7, 1000, 65536, 100_003] {
        let values = vec![c; n];
        for block_size in [2, 3, 16, 256, DEFAULT_BLOCK_SIZE, 4096] {
            let reduction = multipass_sum(&values, block_size).unwrap();
            assert_relative_eq!(reduction.sum, c * n as f64, max_relative = 1e-12);
        }
    }
}

#[test]
fn test_pass_count() {
    let values = vec![1_u64; 1024];
    assert_eq!(multipass_sum(&values, 2).unwrap().passes, 10);
    assert_eq!(multipass_sum(&values, 32).unwrap().passes, 2);
    assert_eq!(multipass_sum(&values, 1024).unwrap().passes, 1);
    assert_eq!(multipass_sum(&values, 2).unwrap().sum, 1024);

    let empty: Vec<f64> = vec![];
    assert_eq!(multipass_sum(&empty, 2).unwrap().passes, 0);
    assert_eq!(
        multipass_sum(&values, 1),
        Err(RuntimeError::InvalidBlockSize { block_size: 1 })
    );
}

#[test]
fn test_normalize_2d() {
    use approx::assert_abs_diff_eq;

    // Define type, size
    type T = f32;
    const S: usize = 8;
    let dr = (1.0 / S as T).powi(2);

    let mut field = ComplexField::<T>::from_elem((S, S, 1), Complex::new(1.0, 1.0));
    let before = renormalize(&mut field, dr, 1.0, 4).unwrap();

    assert_abs_diff_eq!(before, 2.0, epsilon = 1e-5);
    assert_eq!(field.dim(), (S, S, 1));
    assert!(check_norm(&field, dr, 1.0, 1e-5).unwrap());
}

#[test]
fn test_normalize_3d_f64() {
    use approx::assert_abs_diff_eq;

    type T = f64;
    const S: usize = 8;
    let dr = (1.0 / S as T).powi(3);

    let mut field =
        ComplexField::<T>::from_shape_fn((S, S, S), |(i, j, k)| {
            Complex::new(i as T + 1.0, (j * k) as T)
        });
    renormalize(&mut field, dr, 3.5, DEFAULT_BLOCK_SIZE).unwrap();

    assert_abs_diff_eq!(
        field_norm(&field, dr, DEFAULT_BLOCK_SIZE).unwrap(),
        3.5,
        epsilon = 1e-12
    );
}

#[test]
fn test_renormalize_is_idempotent() {
    use approx::assert_abs_diff_eq;

    let dr = 0.01;
    let mut field =
        ComplexField::<f64>::from_shape_fn((16, 16, 1), |(i, j, _)| {
            Complex::new((i as f64 * 0.3).sin(), (j as f64 * 0.7).cos())
        });
    renormalize(&mut field, dr, 1.0, 2).unwrap();
    let once = field.clone();
    renormalize(&mut field, dr, 1.0, 64).unwrap();

    for (a, b) in once.iter().zip(field.iter()) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
        assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-12);
    }
}

#[test]
fn test_renormalize_rejects_degenerate_fields() {
    let mut zero = ComplexField::<f64>::zeros((4, 4, 1));
    assert_eq!(
        renormalize(&mut zero, 0.1, 1.0, 2),
        Err(RuntimeError::DegenerateNorm { norm: 0.0 })
    );
    assert!(check_complex_for_nans(&zero));

    let mut poisoned = ComplexField::<f64>::from_elem((4, 4, 1), Complex::new(1.0, 0.0));
    poisoned[[1, 2, 0]] = Complex::new(f64::NAN, 0.0);
    assert!(!check_complex_for_nans(&poisoned));
    assert_eq!(
        renormalize(&mut poisoned, 0.1, 1.0, 2),
        Err(RuntimeError::NanOrInf)
    );
}
