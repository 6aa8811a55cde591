//! Core of a split-step Fourier Gross-Pitaevskii solver: operator grids,
//! elementwise evolution kernels, the parallel norm reduction and the
//! expression language behind dynamic gauge fields.
//!
//! The transforms and the step ordering live with the caller; this crate
//! provides the pieces a step is assembled from.

pub mod kernels;
pub mod operators;
pub mod parser;
pub mod utils;
pub mod wavefunction;

pub use kernels::{DensityParams, EvolutionMode};
pub use operators::{EvolutionFactors, OperatorContext, OperatorSet};
pub use utils::error::{OperatorError, RuntimeError};
pub use utils::grid::{ComplexField, GridIndex, GridShape, OperatorGrid};
