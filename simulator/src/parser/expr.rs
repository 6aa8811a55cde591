use gpe_common::ParameterStore;

use super::{
    lexer::{tokenize, Bracket, Operator, Token, TokenKind},
    EvalError, ParseError,
};
use crate::utils::grid::GridIndex;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    Erf,
    Sqrt,
    Sign,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "tan" => Some(Function::Tan),
            "exp" => Some(Function::Exp),
            "erf" => Some(Function::Erf),
            "sqrt" => Some(Function::Sqrt),
            "sign" => Some(Function::Sign),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Exp => "exp",
            Function::Erf => "erf",
            Function::Sqrt => "sqrt",
            Function::Sign => "sign",
        }
    }

    pub fn apply(self, argument: f64) -> Result<f64, EvalError> {
        Ok(match self {
            Function::Sin => argument.sin(),
            Function::Cos => argument.cos(),
            Function::Tan => argument.tan(),
            Function::Exp => argument.exp(),
            Function::Erf => libm::erf(argument),
            Function::Sqrt => {
                if argument < 0.0 {
                    return Err(EvalError::Domain {
                        function: self.name(),
                        argument,
                    });
                }
                argument.sqrt()
            }
            // f64::signum maps 0 to 1
            Function::Sign => {
                if argument > 0.0 {
                    1.0
                } else if argument < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
        })
    }
}

/// Grid axis a coordinate variable indexes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self, site: GridIndex) -> usize {
        match self {
            Axis::X => site.i,
            Axis::Y => site.j,
            Axis::Z => site.k,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        })
    }
}

/// Maps a coordinate name to its axis and the array it reads.
fn coordinate(name: &str) -> Option<(Axis, &'static str)> {
    match name {
        "x" => Some((Axis::X, "x")),
        "y" => Some((Axis::Y, "y")),
        "z" => Some((Axis::Z, "z")),
        "xp" | "px" => Some((Axis::X, "xp")),
        "yp" | "py" => Some((Axis::Y, "yp")),
        "zp" | "pz" => Some((Axis::Z, "zp")),
        _ => None,
    }
}

/// Unresolved syntax tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable {
        name: String,
        position: usize,
    },
    Negate(Box<Expr>),
    Binary {
        op: Operator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        argument: Box<Expr>,
    },
}

impl Expr {
    pub fn parse(source: &str) -> Result<Expr, ParseError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(ParseError::Empty);
        }
        let mut parser = Parser {
            source,
            tokens: &tokens,
            cursor: 0,
            depth: 0,
        };
        let expr = parser.expression()?;
        // Only a closing bracket can stop an expression early
        if let Some(token) = parser.peek() {
            return Err(ParseError::UnmatchedClosing {
                position: token.position,
                remainder: source[token.position..].to_string(),
            });
        }
        Ok(expr)
    }

    pub fn bind(&self, store: &ParameterStore) -> Result<BoundExpr, EvalError> {
        Ok(match self {
            Expr::Number(v) => BoundExpr::Constant(*v),
            Expr::Variable { name, .. } => {
                if let Some((axis, array)) = coordinate(name) {
                    if store.is_real_array(array) {
                        let values = store.real_array(array).map_err(|_| unresolved(name, store))?;
                        return Ok(BoundExpr::Coordinate {
                            axis,
                            values: values.to_vec(),
                        });
                    }
                }
                if store.is_real(name) {
                    let value = store.real(name).map_err(|_| unresolved(name, store))?;
                    BoundExpr::Constant(value)
                } else {
                    return Err(unresolved(name, store));
                }
            }
            Expr::Negate(inner) => BoundExpr::Negate(Box::new(inner.bind(store)?)),
            Expr::Binary { op, lhs, rhs } => BoundExpr::Binary {
                op: *op,
                lhs: Box::new(lhs.bind(store)?),
                rhs: Box::new(rhs.bind(store)?),
            },
            Expr::Call { function, argument } => BoundExpr::Call {
                function: *function,
                argument: Box::new(argument.bind(store)?),
            },
        })
    }
}

fn unresolved(name: &str, store: &ParameterStore) -> EvalError {
    EvalError::UnresolvedVariable {
        name: name.to_string(),
        known: store.keys().into_iter().map(String::from).collect(),
    }
}

/// Nesting limit for operator chains, signs and brackets together.
pub const MAX_DEPTH: usize = 256;

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    cursor: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.cursor)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.cursor);
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<Expr, ParseError> {
        if self.depth == MAX_DEPTH {
            return Err(ParseError::TooDeep {
                position: self.peek().map_or(self.source.len(), |token| token.position),
                limit: MAX_DEPTH,
            });
        }
        self.depth += 1;
        let expr = self.chain();
        self.depth -= 1;
        expr
    }

    /// `expr := '-' expr | operand [op expr]`
    fn chain(&mut self) -> Result<Expr, ParseError> {
        if let Some(Token {
            kind: TokenKind::Op(Operator::Sub),
            ..
        }) = self.peek()
        {
            self.cursor += 1;
            return Ok(Expr::Negate(Box::new(self.expression()?)));
        }

        let lhs = self.operand()?;
        match self.peek() {
            None
            | Some(Token {
                kind: TokenKind::Close(_),
                ..
            }) => Ok(lhs),
            Some(Token {
                kind: TokenKind::Op(op),
                ..
            }) => {
                let op = *op;
                self.cursor += 1;
                let rhs = self.expression()?;
                Ok(Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            Some(token) => Err(ParseError::UnexpectedToken {
                position: token.position,
                token: token.kind.to_string(),
            }),
        }
    }

    fn operand(&mut self) -> Result<Expr, ParseError> {
        let token = self.next().ok_or(ParseError::UnexpectedEnd)?;
        match &token.kind {
            TokenKind::Number(v) => Ok(Expr::Number(*v)),
            TokenKind::Ident(name) => {
                let function = Function::from_name(name);
                match (self.peek(), function) {
                    (
                        Some(Token {
                            kind: TokenKind::Open(bracket),
                            position,
                        }),
                        Some(function),
                    ) => {
                        self.cursor += 1;
                        let argument = self.group(*bracket, *position)?;
                        Ok(Expr::Call {
                            function,
                            argument: Box::new(argument),
                        })
                    }
                    (
                        Some(Token {
                            kind: TokenKind::Open(_),
                            ..
                        }),
                        None,
                    ) => Err(ParseError::UnknownFunction {
                        position: token.position,
                        name: name.clone(),
                    }),
                    (_, Some(_)) => Err(ParseError::MissingArgument {
                        position: token.position,
                        name: name.clone(),
                    }),
                    (_, None) => Ok(Expr::Variable {
                        name: name.clone(),
                        position: token.position,
                    }),
                }
            }
            TokenKind::Open(bracket) => self.group(*bracket, token.position),
            TokenKind::Close(_) => Err(ParseError::UnmatchedClosing {
                position: token.position,
                remainder: self.source[token.position..].to_string(),
            }),
            TokenKind::Op(_) => Err(ParseError::UnexpectedToken {
                position: token.position,
                token: token.kind.to_string(),
            }),
        }
    }

    /// Parses up to and including the bracket closing the one at `open`.
    fn group(&mut self, bracket: Bracket, open: usize) -> Result<Expr, ParseError> {
        let inner = self.expression()?;
        match self.next() {
            Some(Token {
                kind: TokenKind::Close(closing),
                position,
            }) => {
                if *closing != bracket {
                    return Err(ParseError::MismatchedBracket {
                        open,
                        close: *position,
                    });
                }
                Ok(inner)
            }
            _ => Err(ParseError::UnclosedBracket { position: open }),
        }
    }
}

/// Tree with every name resolved to a constant or a coordinate array.
#[derive(Clone, Debug, PartialEq)]
pub enum BoundExpr {
    Constant(f64),
    Coordinate {
        axis: Axis,
        values: Vec<f64>,
    },
    Negate(Box<BoundExpr>),
    Binary {
        op: Operator,
        lhs: Box<BoundExpr>,
        rhs: Box<BoundExpr>,
    },
    Call {
        function: Function,
        argument: Box<BoundExpr>,
    },
}

impl BoundExpr {
    pub fn evaluate(&self, site: GridIndex) -> Result<f64, EvalError> {
        match self {
            BoundExpr::Constant(v) => Ok(*v),
            BoundExpr::Coordinate { axis, values } => {
                let index = axis.index(site);
                values.get(index).copied().ok_or(EvalError::IndexOutOfRange {
                    axis: *axis,
                    index,
                    len: values.len(),
                })
            }
            BoundExpr::Negate(inner) => Ok(-inner.evaluate(site)?),
            BoundExpr::Binary { op, lhs, rhs } => {
                let lhs = lhs.evaluate(site)?;
                let rhs = rhs.evaluate(site)?;
                if *op == Operator::Div && rhs == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(op.apply(lhs, rhs))
            }
            BoundExpr::Call { function, argument } => function.apply(argument.evaluate(site)?),
        }
    }
}

#[test]
fn test_tree_shape() {
    let expr = Expr::parse("-x+1").unwrap();
    assert_eq!(
        expr,
        Expr::Negate(Box::new(Expr::Binary {
            op: Operator::Add,
            lhs: Box::new(Expr::Variable {
                name: "x".into(),
                position: 1
            }),
            rhs: Box::new(Expr::Number(1.0)),
        }))
    );

    let nested = Expr::parse("sin([x])").unwrap();
    assert_eq!(
        nested,
        Expr::Call {
            function: Function::Sin,
            argument: Box::new(Expr::Variable {
                name: "x".into(),
                position: 5
            }),
        }
    );
}
