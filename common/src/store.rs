use std::collections::BTreeMap;
use std::fmt::Display;

use crate::error::CommonError;

/// A single typed entry in the [`ParameterStore`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    RealArray(Vec<f64>),
    Bool(bool),
    Str(String),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::RealArray(_) => "real array",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
        }
    }
}

/// Name to typed-value mapping holding grid dimensions, physical constants,
/// coordinate arrays and operator selectors.
///
/// Built once (see [`ParameterStore::from_toml`](crate::ParameterStore::from_toml))
/// and then only ever shared by reference.
#[derive(Clone, Debug, Default)]
pub struct ParameterStore {
    values: BTreeMap<String, Value>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a parameter. Only meant for the construction phase.
    pub fn store(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    fn get(&self, name: &str) -> Result<&Value, CommonError> {
        self.values
            .get(name)
            .ok_or_else(|| CommonError::UnknownParameter {
                name: name.to_string(),
            })
    }

    fn mismatch(name: &str, expected: &'static str) -> CommonError {
        CommonError::ParameterType {
            name: name.to_string(),
            expected,
        }
    }

    pub fn int(&self, name: &str) -> Result<i64, CommonError> {
        match self.get(name)? {
            Value::Int(v) => Ok(*v),
            _ => Err(Self::mismatch(name, "int")),
        }
    }

    pub fn real(&self, name: &str) -> Result<f64, CommonError> {
        match self.get(name)? {
            Value::Real(v) => Ok(*v),
            _ => Err(Self::mismatch(name, "real")),
        }
    }

    pub fn real_array(&self, name: &str) -> Result<&[f64], CommonError> {
        match self.get(name)? {
            Value::RealArray(v) => Ok(v),
            _ => Err(Self::mismatch(name, "real array")),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool, CommonError> {
        match self.get(name)? {
            Value::Bool(v) => Ok(*v),
            _ => Err(Self::mismatch(name, "bool")),
        }
    }

    pub fn string(&self, name: &str) -> Result<&str, CommonError> {
        match self.get(name)? {
            Value::Str(v) => Ok(v),
            _ => Err(Self::mismatch(name, "string")),
        }
    }

    /// Like [`ParameterStore::string`], but an absent key is not an error.
    pub fn optional_string(&self, name: &str) -> Result<Option<&str>, CommonError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(Value::Str(v)) => Ok(Some(v)),
            Some(_) => Err(Self::mismatch(name, "string")),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_real(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(Value::Real(_)))
    }

    pub fn is_real_array(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(Value::RealArray(_)))
    }

    /// All known keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }
}

impl Display for ParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", "-".repeat(40))?;
        for (name, value) in &self.values {
            match value {
                Value::RealArray(v) => {
                    writeln!(f, "{name:<16} = [{} x {}]", value.type_name(), v.len())?
                }
                Value::Int(v) => writeln!(f, "{name:<16} = {v}")?,
                Value::Real(v) => writeln!(f, "{name:<16} = {v:e}")?,
                Value::Bool(v) => writeln!(f, "{name:<16} = {v}")?,
                Value::Str(v) => writeln!(f, "{name:<16} = {v}")?,
            }
        }
        writeln!(f, "{}", "-".repeat(40))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::RealArray(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

#[test]
fn test_typed_accessors() {
    let mut store = ParameterStore::new();
    store.store("xDim", 64_usize);
    store.store("mass", 1.5);
    store.store("x", vec![0.0, 1.0]);
    store.store("gpe", true);
    store.store("Afn", "rotation");

    assert_eq!(store.int("xDim").unwrap(), 64);
    assert_eq!(store.real("mass").unwrap(), 1.5);
    assert_eq!(store.real_array("x").unwrap(), &[0.0, 1.0]);
    assert!(store.boolean("gpe").unwrap());
    assert_eq!(store.string("Afn").unwrap(), "rotation");
    assert!(store.is_real("mass"));
    assert!(!store.is_real("x"));
    assert!(store.is_real_array("x"));
    assert_eq!(store.keys(), vec!["Afn", "gpe", "mass", "x", "xDim"]);
}

#[test]
fn test_unknown_and_mistyped_keys() {
    let mut store = ParameterStore::new();
    store.store("mass", 1.5);

    assert!(matches!(
        store.real("omega"),
        Err(CommonError::UnknownParameter { name }) if name == "omega"
    ));
    assert!(matches!(
        store.int("mass"),
        Err(CommonError::ParameterType { expected: "int", .. })
    ));
    assert_eq!(store.optional_string("Azstring").unwrap(), None);
}
