use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Unable to load toml: {path}")]
    TomlReadError { path: String },

    #[error("Unable to parse toml: {msg}")]
    TomlParseError { msg: String },

    #[error("Unknown parameter {name:?}")]
    UnknownParameter { name: String },

    #[error("Parameter {name:?} is not of type {expected}")]
    ParameterType { name: String, expected: &'static str },

    #[error("Invalid number of dimensions (expected 2 or 3, got {dims})")]
    InvalidDimensions { dims: usize },

    #[error("Invalid grid size {name} = {value}")]
    InvalidGridSize { name: &'static str, value: usize },

    #[error("Parameter {name} must be positive and finite, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Unable to load gauge config: {path}")]
    GaugeConfigReadError { path: String },

    #[error("Malformed gauge config line {line}: {content:?}")]
    GaugeConfigFormat { line: usize, content: String },
}
