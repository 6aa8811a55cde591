use gpe_common::CommonError;
use thiserror::Error;

use crate::parser::{EvalError, ParseError};

/// Failures of the per-step kernels.
#[derive(Error, Debug, PartialEq)]
pub enum RuntimeError {
    #[error("A NaN or Inf value was produced")]
    NanOrInf,

    #[error("Field shapes differ: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        expected: [usize; 3],
        found: [usize; 3],
    },

    #[error("Cannot renormalize a field with norm {norm:e}")]
    DegenerateNorm { norm: f64 },

    #[error("Reduction block size must be at least 2, got {block_size}")]
    InvalidBlockSize { block_size: usize },
}

/// Which operator slot a selector or file belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Kinetic,
    Potential,
    Ax,
    Ay,
    Az,
    Gauge,
    Wavefunction,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Slot::Kinetic => "K",
            Slot::Potential => "V",
            Slot::Ax => "Ax",
            Slot::Ay => "Ay",
            Slot::Az => "Az",
            Slot::Gauge => "A",
            Slot::Wavefunction => "wfc",
        };
        f.write_str(name)
    }
}

/// Failures while building operators. None of them are recoverable: the
/// evolution must not start.
#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Unknown {slot} operator {name:?}")]
    UnknownOperator { slot: Slot, name: String },

    #[error("No file configured for the {slot} operator")]
    MissingFile { slot: Slot },

    #[error("Unable to read operator file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to write operator file {path}: {source}")]
    FileWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Operator file {path} has {found} values, grid needs {expected}")]
    FileLength {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("Operator file {path}, line {line}: {content:?} is not a real number")]
    FileParse {
        path: String,
        line: usize,
        content: String,
    },

    #[error("No expression configured for the dynamic {slot} gauge")]
    MissingExpression { slot: Slot },

    #[error("Failed to parse {slot} expression: {err}")]
    Parse {
        slot: Slot,
        #[source]
        err: ParseError,
    },

    #[error("Failed to evaluate expression: {err}")]
    Eval {
        #[from]
        err: EvalError,
    },

    #[error("Error in common: {err}")]
    Common {
        #[from]
        err: CommonError,
    },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
