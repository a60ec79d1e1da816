use super::ast::{Expression, Operator, Restriction, Target};
use super::error::FilterParseError;
use std::fmt;

/// Result of parsing filter text, classified by grammar category
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// A bare field reference with no comparison
    Field(Target),
    /// A full boolean expression
    Expression(Expression),
}

impl fmt::Display for Parsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parsed::Field(target) => write!(f, "field {target}"),
            Parsed::Expression(expr) => write!(f, "expression {expr}"),
        }
    }
}

/// Characters that end a bare word
pub(crate) fn is_reserved(c: char) -> bool {
    matches!(c, '(' | ')' | '"' | '=' | '!' | ':' | '<' | '>')
}

/// Parse filter text.
///
/// Operator precedence, loosest first: `AND`, juxtaposition (implicit AND),
/// `OR`, then `NOT`/`-`. A field without a comparison is only accepted as the
/// whole input.
pub fn parse(input: &str) -> Result<Parsed, FilterParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(FilterParseError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    if let Ok(target) = parser.parse_path()
        && parser.at_end()
    {
        return Ok(Parsed::Field(target));
    }

    parser.pos = 0;
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(Parsed::Expression(expr)),
        Some(token) => Err(token.unexpected("end of input")),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    LParen,
    RParen,
    Minus,
    And,
    Or,
    Not,
    Comparator(Operator),
    Word(String),
    Str(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
    /// Preceded by whitespace or the start of input
    spaced: bool,
}

impl Token {
    fn text(&self) -> String {
        match &self.kind {
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
            TokenKind::Minus => "-".to_string(),
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
            TokenKind::Not => "NOT".to_string(),
            TokenKind::Comparator(op) => op.to_string(),
            TokenKind::Word(w) => w.clone(),
            TokenKind::Str(s) => format!("\"{s}\""),
        }
    }

    fn unexpected(&self, expected: &'static str) -> FilterParseError {
        FilterParseError::UnexpectedToken {
            pos: self.pos,
            found: self.text(),
            expected,
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, FilterParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    let mut spaced = true;

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            spaced = true;
            continue;
        }

        let kind = match c {
            '(' => {
                chars.next();
                TokenKind::LParen
            }
            ')' => {
                chars.next();
                TokenKind::RParen
            }
            '-' => {
                chars.next();
                TokenKind::Minus
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, 'r')) => value.push('\r'),
                            Some((_, other)) => value.push(other),
                            None => break,
                        },
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(FilterParseError::UnterminatedString(pos));
                }
                TokenKind::Str(value)
            }
            '=' | '!' | ':' | '<' | '>' => {
                chars.next();
                let next = chars.peek().map(|&(_, c)| c);
                let (op, two_chars) = match (c, next) {
                    ('=', Some('~')) => (Operator::Matches, true),
                    ('=', _) => (Operator::Eq, false),
                    ('!', Some('=')) => (Operator::Ne, true),
                    ('!', Some('~')) => (Operator::NotMatches, true),
                    ('!', _) => return Err(FilterParseError::UnexpectedChar { pos, ch: c }),
                    (':', _) => (Operator::Has, false),
                    ('<', Some('=')) => (Operator::Le, true),
                    ('<', _) => (Operator::Lt, false),
                    ('>', Some('=')) => (Operator::Ge, true),
                    _ => (Operator::Gt, false),
                };
                if two_chars {
                    chars.next();
                }
                TokenKind::Comparator(op)
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || is_reserved(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                match word.as_str() {
                    "AND" => TokenKind::And,
                    "OR" => TokenKind::Or,
                    "NOT" => TokenKind::Not,
                    _ => TokenKind::Word(word),
                }
            }
        };

        tokens.push(Token { kind, pos, spaced });
        spaced = false;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect_next(&mut self, expected: &'static str) -> Result<Token, FilterParseError> {
        self.advance()
            .ok_or(FilterParseError::UnexpectedEnd(expected))
    }

    fn parse_expression(&mut self) -> Result<Expression, FilterParseError> {
        let mut items = self.parse_sequence()?;
        while self.peek_kind() == Some(&TokenKind::And) {
            self.advance();
            items.extend(self.parse_sequence()?);
        }
        Ok(collapse(items, Expression::Conjunction))
    }

    fn parse_sequence(&mut self) -> Result<Vec<Expression>, FilterParseError> {
        let mut items = vec![self.parse_factor()?];
        while matches!(
            self.peek_kind(),
            Some(
                TokenKind::Word(_)
                    | TokenKind::Str(_)
                    | TokenKind::LParen
                    | TokenKind::Not
                    | TokenKind::Minus
            )
        ) {
            items.push(self.parse_factor()?);
        }
        Ok(items)
    }

    fn parse_factor(&mut self) -> Result<Expression, FilterParseError> {
        let mut items = vec![self.parse_term()?];
        while self.peek_kind() == Some(&TokenKind::Or) {
            self.advance();
            items.push(self.parse_term()?);
        }
        Ok(collapse(items, Expression::Disjunction))
    }

    fn parse_term(&mut self) -> Result<Expression, FilterParseError> {
        if matches!(self.peek_kind(), Some(TokenKind::Not | TokenKind::Minus)) {
            self.advance();
            let child = self.parse_primitive()?;
            return Ok(Expression::Negation(Box::new(child)));
        }
        self.parse_primitive()
    }

    fn parse_primitive(&mut self) -> Result<Expression, FilterParseError> {
        if self.peek_kind() == Some(&TokenKind::LParen) {
            self.advance();
            let expr = self.parse_expression()?;
            let close = self.expect_next("')'")?;
            if close.kind != TokenKind::RParen {
                return Err(close.unexpected("')'"));
            }
            return Ok(expr);
        }

        let lhs = self.parse_path()?;
        let operator = match self.peek_kind() {
            Some(TokenKind::Comparator(op)) => *op,
            _ => return Err(FilterParseError::BareField(lhs.to_string())),
        };
        self.advance();
        let rhs = self.parse_value()?;
        Ok(Expression::Restriction(Restriction::new(lhs, operator, rhs)))
    }

    /// Adjacent words and strings form one path; dots inside words separate segments
    fn parse_path(&mut self) -> Result<Target, FilterParseError> {
        enum Part {
            Segment(String),
            Dot,
        }

        let first = self.expect_next("a field")?;
        if !matches!(first.kind, TokenKind::Word(_) | TokenKind::Str(_)) {
            return Err(first.unexpected("a field"));
        }

        let mut raw = String::new();
        let mut parts = Vec::new();
        let mut token = Some(first);
        while let Some(t) = token {
            match t.kind {
                TokenKind::Word(word) => {
                    raw.push_str(&word);
                    for (i, piece) in word.split('.').enumerate() {
                        if i > 0 {
                            parts.push(Part::Dot);
                        }
                        if !piece.is_empty() {
                            parts.push(Part::Segment(piece.to_string()));
                        }
                    }
                }
                TokenKind::Str(s) => {
                    raw.push('"');
                    raw.push_str(&s);
                    raw.push('"');
                    parts.push(Part::Segment(s));
                }
                _ => break,
            }

            token = match self.peek() {
                Some(next)
                    if !next.spaced
                        && matches!(next.kind, TokenKind::Word(_) | TokenKind::Str(_)) =>
                {
                    self.advance()
                }
                _ => None,
            };
        }

        // Segments and dots must alternate, starting and ending with a segment.
        let mut segments = Vec::new();
        let mut expect_segment = true;
        for part in parts {
            match (part, expect_segment) {
                (Part::Segment(s), true) => {
                    segments.push(s);
                    expect_segment = false;
                }
                (Part::Dot, false) => expect_segment = true,
                _ => return Err(FilterParseError::EmptySegment(raw)),
            }
        }
        if expect_segment {
            return Err(FilterParseError::EmptySegment(raw));
        }

        Target::new(segments)
    }

    fn parse_value(&mut self) -> Result<String, FilterParseError> {
        let token = self.expect_next("a value")?;
        match token.kind {
            TokenKind::Word(word) => Ok(word),
            TokenKind::Str(s) => Ok(s),
            TokenKind::Minus => match self.peek() {
                Some(Token {
                    kind: TokenKind::Word(word),
                    spaced: false,
                    ..
                }) => {
                    let value = format!("-{word}");
                    self.advance();
                    Ok(value)
                }
                Some(next) => Err(next.unexpected("a value")),
                None => Err(FilterParseError::UnexpectedEnd("a value")),
            },
            _ => Err(token.unexpected("a value")),
        }
    }
}

fn collapse(mut items: Vec<Expression>, wrap: fn(Vec<Expression>) -> Expression) -> Expression {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}
