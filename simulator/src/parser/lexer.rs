use super::ParseError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Operator::Add => lhs + rhs,
            Operator::Sub => lhs - rhs,
            Operator::Mul => lhs * rhs,
            Operator::Div => lhs / rhs,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bracket {
    Round,
    Square,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Ident(String),
    Op(Operator),
    Open(Bracket),
    Close(Bracket),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset into the source
    pub position: usize,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Number(v) => write!(f, "number {v}"),
            TokenKind::Ident(name) => write!(f, "name {name:?}"),
            TokenKind::Op(op) => write!(f, "operator '{}'", op.symbol()),
            TokenKind::Open(Bracket::Round) => f.write_str("'('"),
            TokenKind::Open(Bracket::Square) => f.write_str("'['"),
            TokenKind::Close(Bracket::Round) => f.write_str("')'"),
            TokenKind::Close(Bracket::Square) => f.write_str("']'"),
        }
    }
}

/// Splits `source` into tokens, skipping whitespace.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = source.as_bytes();
    let mut tokens = vec![];
    let mut position = 0;

    while position < bytes.len() {
        let c = bytes[position];
        let start = position;
        let kind = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                position += 1;
                continue;
            }
            b'+' => TokenKind::Op(Operator::Add),
            b'-' => TokenKind::Op(Operator::Sub),
            b'*' => TokenKind::Op(Operator::Mul),
            b'/' => TokenKind::Op(Operator::Div),
            b'(' => TokenKind::Open(Bracket::Round),
            b'[' => TokenKind::Open(Bracket::Square),
            b')' => TokenKind::Close(Bracket::Round),
            b']' => TokenKind::Close(Bracket::Square),
            b'0'..=b'9' | b'.' => {
                position = scan_number(bytes, position);
                let text = &source[start..position];
                let value = text.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
                    position: start,
                    text: text.to_string(),
                })?;
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    position: start,
                });
                continue;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while position < bytes.len()
                    && (bytes[position].is_ascii_alphanumeric() || bytes[position] == b'_')
                {
                    position += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(source[start..position].to_string()),
                    position: start,
                });
                continue;
            }
            _ => {
                // Report the whole (possibly multi-byte) character
                let character = source[start..].chars().next().unwrap_or('?');
                return Err(ParseError::UnexpectedCharacter {
                    position: start,
                    character,
                });
            }
        };
        tokens.push(Token {
            kind,
            position: start,
        });
        position += 1;
    }

    Ok(tokens)
}

/// Digits and dots, then an optional exponent. The exponent is only taken
/// when a digit follows it, so `2e` stays a number followed by a name.
fn scan_number(bytes: &[u8], mut position: usize) -> usize {
    while position < bytes.len() && (bytes[position].is_ascii_digit() || bytes[position] == b'.') {
        position += 1;
    }
    if position < bytes.len() && (bytes[position] == b'e' || bytes[position] == b'E') {
        let mut exponent = position + 1;
        if exponent < bytes.len() && (bytes[exponent] == b'+' || bytes[exponent] == b'-') {
            exponent += 1;
        }
        if exponent < bytes.len() && bytes[exponent].is_ascii_digit() {
            position = exponent;
            while position < bytes.len() && bytes[position].is_ascii_digit() {
                position += 1;
            }
        }
    }
    position
}

#[test]
fn test_tokenize() {
    let tokens = tokenize("sin( x)*2.5e-3 - [omega]").unwrap();
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Ident("sin".into()),
            TokenKind::Open(Bracket::Round),
            TokenKind::Ident("x".into()),
            TokenKind::Close(Bracket::Round),
            TokenKind::Op(Operator::Mul),
            TokenKind::Number(2.5e-3),
            TokenKind::Op(Operator::Sub),
            TokenKind::Open(Bracket::Square),
            TokenKind::Ident("omega".into()),
            TokenKind::Close(Bracket::Square),
        ]
    );
    assert_eq!(tokens[2].position, 5);
}

#[test]
fn test_tokenize_errors() {
    assert_eq!(
        tokenize("1.2.3"),
        Err(ParseError::InvalidNumber {
            position: 0,
            text: "1.2.3".into()
        })
    );
    assert_eq!(
        tokenize("x^2"),
        Err(ParseError::UnexpectedCharacter {
            position: 1,
            character: '^'
        })
    );
}
