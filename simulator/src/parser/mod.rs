//! Arithmetic expressions over grid coordinates and stored scalars, used to
//! build dynamic gauge fields such as `Ax = -y*omega` or `Az = exp(x)*sin(z)`.
//!
//! An expression is parsed once, bound once against a [`ParameterStore`] and
//! then evaluated at every grid site. Evaluation is flat: there is no operator
//! precedence and an operator applies to everything to its right, so
//! `2*3+4 == 2*(3+4)` and `8-2-1 == 8-(2-1)`. Brackets (round or square) group
//! explicitly. A leading `-` negates the rest of the expression.
//!
//! Names bind as follows:
//! - `x`/`xp`/`px`, `y`/`yp`/`py` and `z`/`zp`/`pz` read the stored
//!   coordinate or momentum arrays at the site index of that axis.
//! - any other name must be a real scalar in the store.
//! - `sin`, `cos`, `tan`, `exp`, `erf`, `sqrt` and `sign` are functions and
//!   must be followed by a bracketed argument.

mod expr;
mod lexer;

use gpe_common::ParameterStore;
use thiserror::Error;

use crate::utils::grid::GridIndex;

pub use expr::{Axis, BoundExpr, Expr, Function, MAX_DEPTH};
pub use lexer::{tokenize, Bracket, Operator, Token, TokenKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Empty expression")]
    Empty,

    #[error("Unexpected character {character:?} at position {position}")]
    UnexpectedCharacter { position: usize, character: char },

    #[error("Invalid number {text:?} at position {position}")]
    InvalidNumber { position: usize, text: String },

    #[error("Unmatched closing bracket at position {position}, remaining input {remainder:?}")]
    UnmatchedClosing { position: usize, remainder: String },

    #[error("Bracket opened at position {position} is never closed")]
    UnclosedBracket { position: usize },

    #[error("Bracket opened at position {open} is closed by a different bracket at position {close}")]
    MismatchedBracket { open: usize, close: usize },

    #[error("Unexpected {token} at position {position}")]
    UnexpectedToken { position: usize, token: String },

    #[error("Expression ends where an operand is expected")]
    UnexpectedEnd,

    #[error("Unknown function {name:?} at position {position}")]
    UnknownFunction { position: usize, name: String },

    #[error("Function {name} at position {position} needs a bracketed argument")]
    MissingArgument { position: usize, name: String },

    #[error("Expression nests deeper than {limit} levels at position {position}")]
    TooDeep { position: usize, limit: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Could not find variable {name:?}, known parameters are {known:?}")]
    UnresolvedVariable { name: String, known: Vec<String> },

    #[error("{function} is undefined for argument {argument}")]
    Domain {
        function: &'static str,
        argument: f64,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Index {index} is out of range for the {axis} axis of length {len}")]
    IndexOutOfRange { axis: Axis, index: usize, len: usize },

    #[error("Expression produced a non-finite value {value}")]
    NonFinite { value: f64 },
}

/// Either stage of turning text into a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Parsed expression together with its source text.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    source: String,
    tree: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let tree = Expr::parse(source)?;
        Ok(Expression {
            source: source.to_string(),
            tree,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &Expr {
        &self.tree
    }

    /// Resolves every name against `store`.
    pub fn bind(&self, store: &ParameterStore) -> Result<BoundExpression, EvalError> {
        let tree = self.tree.bind(store).map_err(|err| {
            log::error!("Cannot bind {:?}: {}", self.source, err);
            err
        })?;
        Ok(BoundExpression {
            source: self.source.clone(),
            tree,
        })
    }
}

/// Expression whose names all resolved; safe to evaluate from many threads.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundExpression {
    source: String,
    tree: BoundExpr,
}

impl BoundExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, index: GridIndex) -> Result<f64, EvalError> {
        let value = self.tree.evaluate(index)?;
        if !value.is_finite() {
            return Err(EvalError::NonFinite { value });
        }
        Ok(value)
    }
}

/// Parses, binds and evaluates `source` at a single site.
pub fn evaluate_expression(
    source: &str,
    store: &ParameterStore,
    index: GridIndex,
) -> Result<f64, ExpressionError> {
    Ok(Expression::parse(source)?.bind(store)?.evaluate(index)?)
}

#[cfg(test)]
fn test_store() -> ParameterStore {
    let mut store = ParameterStore::new();
    store.store("omega", 0.5);
    store.store("dx", 0.25);
    store.store("x", vec![-2.0, -1.0, 0.0, 1.0]);
    store.store("y", vec![-4.0, 0.0, 4.0]);
    store.store("z", vec![0.0]);
    store.store("xp", vec![0.0, 1.5, -3.0, -1.5]);
    store.store("yp", vec![0.0, 2.0, -2.0]);
    store.store("zp", vec![0.0]);
    store.store("xDim", 4usize);
    store
}

#[cfg(test)]
fn eval_at(source: &str, i: usize, j: usize) -> Result<f64, ExpressionError> {
    evaluate_expression(source, &test_store(), GridIndex::new(i, j, 0))
}

#[test]
fn test_literals_and_functions() {
    use approx::assert_abs_diff_eq;

    assert_eq!(eval_at("2+3", 0, 0), Ok(5.0));
    assert_eq!(eval_at("sin(0)", 0, 0), Ok(0.0));
    assert_eq!(eval_at("(1+2)*2", 0, 0), Ok(6.0));
    assert_eq!(eval_at("1.5e2", 0, 0), Ok(150.0));
    assert_eq!(eval_at("sqrt[16]", 0, 0), Ok(4.0));
    assert_eq!(eval_at("sign(-3)", 0, 0), Ok(-1.0));
    assert_eq!(eval_at("sign(0)", 0, 0), Ok(0.0));
    assert_abs_diff_eq!(eval_at("exp(1)", 0, 0).unwrap(), std::f64::consts::E, epsilon = 1e-15);
    assert_abs_diff_eq!(eval_at("erf(0.5)", 0, 0).unwrap(), 0.520_499_877_813_046_5, epsilon = 1e-12);
    assert_abs_diff_eq!(eval_at("cos(tan(0))", 0, 0).unwrap(), 1.0, epsilon = 1e-15);
}

#[test]
fn test_flat_evaluation_order() {
    assert_eq!(eval_at("2+3*4", 0, 0), Ok(14.0));
    assert_eq!(eval_at("2*3+4", 0, 0), Ok(14.0));
    assert_eq!(eval_at("8-2-1", 0, 0), Ok(7.0));
    assert_eq!(eval_at("12/2/3", 0, 0), Ok(18.0));
    assert_eq!(eval_at("(8-2)-1", 0, 0), Ok(5.0));
    // Leading minus negates everything after it
    assert_eq!(eval_at("-2+1", 0, 0), Ok(-3.0));
    assert_eq!(eval_at("2*-3", 0, 0), Ok(-6.0));
}

#[test]
fn test_variables() {
    // x[3] = 1, y[2] = 4
    assert_eq!(eval_at("x", 3, 2), Ok(1.0));
    assert_eq!(eval_at("-x+1", 3, 0), Ok(-2.0));
    assert_eq!(eval_at("-y*omega", 0, 2), Ok(-2.0));
    assert_eq!(eval_at("x*y", 0, 0), Ok(8.0));
    assert_eq!(eval_at("px", 1, 0), Ok(1.5));
    assert_eq!(eval_at("xp", 1, 0), Ok(1.5));
    assert_eq!(eval_at("py*dx", 0, 1), Ok(0.5));
    assert_eq!(eval_at("z", 0, 0), Ok(0.0));
}

#[test]
fn test_bind_errors() {
    let store = test_store();
    match Expression::parse("x*gamma").unwrap().bind(&store) {
        Err(EvalError::UnresolvedVariable { name, known }) => {
            assert_eq!(name, "gamma");
            assert!(known.contains(&"omega".to_string()));
        }
        other => panic!("expected an unresolved variable, got {other:?}"),
    }
    // Integer parameters are not scalars
    assert!(matches!(
        Expression::parse("xDim").unwrap().bind(&store),
        Err(EvalError::UnresolvedVariable { .. })
    ));
}

#[test]
fn test_eval_errors() {
    assert_eq!(
        eval_at("sqrt(0-4)", 0, 0),
        Err(ExpressionError::Eval(EvalError::Domain {
            function: "sqrt",
            argument: -4.0
        }))
    );
    assert_eq!(eval_at("1/x", 2, 0), Err(ExpressionError::Eval(EvalError::DivisionByZero)));
    assert!(matches!(
        eval_at("exp(1000)", 0, 0),
        Err(ExpressionError::Eval(EvalError::NonFinite { .. }))
    ));
    assert!(matches!(
        eval_at("x", 7, 0),
        Err(ExpressionError::Eval(EvalError::IndexOutOfRange {
            axis: Axis::X,
            index: 7,
            len: 4
        }))
    ));
}

#[test]
fn test_parse_errors() {
    assert_eq!(Expression::parse("  "), Err(ParseError::Empty));
    assert_eq!(
        Expression::parse("1+2)*3"),
        Err(ParseError::UnmatchedClosing {
            position: 3,
            remainder: ")*3".into()
        })
    );
    assert_eq!(
        Expression::parse("(1+2"),
        Err(ParseError::UnclosedBracket { position: 0 })
    );
    assert_eq!(
        Expression::parse("(1+2]"),
        Err(ParseError::MismatchedBracket { open: 0, close: 4 })
    );
    assert_eq!(Expression::parse("1+"), Err(ParseError::UnexpectedEnd));
    assert_eq!(
        Expression::parse("log(2)"),
        Err(ParseError::UnknownFunction {
            position: 0,
            name: "log".into()
        })
    );
    assert_eq!(
        Expression::parse("sin+1"),
        Err(ParseError::MissingArgument {
            position: 0,
            name: "sin".into()
        })
    );
    assert!(matches!(
        Expression::parse("2 3"),
        Err(ParseError::UnexpectedToken { position: 2, .. })
    ));
}

#[test]
fn test_nesting_limit() {
    let chain = format!("{}1", "1+".repeat(99));
    assert_eq!(eval_at(&chain, 0, 0), Ok(100.0));

    let chain = format!("{}1", "1+".repeat(200_000));
    assert_eq!(
        Expression::parse(&chain),
        Err(ParseError::TooDeep {
            position: 2 * MAX_DEPTH,
            limit: MAX_DEPTH
        })
    );

    let nested = format!("{}1{}", "(".repeat(300), ")".repeat(300));
    assert_eq!(
        Expression::parse(&nested),
        Err(ParseError::TooDeep {
            position: MAX_DEPTH,
            limit: MAX_DEPTH
        })
    );
}
