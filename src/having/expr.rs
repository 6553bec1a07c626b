//! HAVING expression tree
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or_expr   := and_expr (("or" | "||") and_expr)*
//! and_expr  := not_expr (("and" | "&&") not_expr)*
//! not_expr  := ("not" | "!") not_expr | cmp_expr
//! cmp_expr  := sum (cmp_op sum)*          -- chained: a < b < c
//! sum       := product (("+" | "-") product)*
//! product   := unary (("*" | "/") unary)*
//! unary     := "-" unary | primary
//! primary   := number | identifier | "true" | "false" | "(" or_expr ")"
//! ```
//!
//! Identifiers are `f_vect` names such as `1_sum_quant`; they are resolved
//! through a lookup at evaluation time, never substituted into text.

use crate::error::{EmfError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Subtract => write!(f, "-"),
            BinaryOp::Multiply => write!(f, "*"),
            BinaryOp::Divide => write!(f, "/"),
            BinaryOp::Eq => write!(f, "="),
            BinaryOp::NotEq => write!(f, "!="),
            BinaryOp::Lt => write!(f, "<"),
            BinaryOp::LtEq => write!(f, "<="),
            BinaryOp::Gt => write!(f, ">"),
            BinaryOp::GtEq => write!(f, ">="),
            BinaryOp::And => write!(f, "AND"),
            BinaryOp::Or => write!(f, "OR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Negate,
}

/// Parsed HAVING expression
#[derive(Debug, Clone, PartialEq)]
pub enum HavingExpr {
    Number(f64),
    Boolean(bool),
    /// Reference to an `f_vect` identifier
    Aggregate(String),
    Unary {
        op: UnaryOp,
        expr: Box<HavingExpr>,
    },
    Binary {
        left: Box<HavingExpr>,
        op: BinaryOp,
        right: Box<HavingExpr>,
    },
}

/// Result of evaluating a (sub)expression
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Datum {
    Number(f64),
    Bool(bool),
}

impl Datum {
    pub fn as_f64(&self) -> f64 {
        match self {
            Datum::Number(v) => *v,
            Datum::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// True for `true` and any non-zero number
    pub fn is_truthy(&self) -> bool {
        match self {
            Datum::Number(v) => *v != 0.0,
            Datum::Bool(b) => *b,
        }
    }
}

impl HavingExpr {
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(EmfError::HavingParse(format!(
                "unexpected '{}' after end of expression",
                tok
            )));
        }
        Ok(expr)
    }

    /// Every aggregate identifier the expression references
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            HavingExpr::Aggregate(id) => {
                if !out.contains(&id.as_str()) {
                    out.push(id);
                }
            }
            HavingExpr::Unary { expr, .. } => expr.collect_identifiers(out),
            HavingExpr::Binary { left, right, .. } => {
                left.collect_identifiers(out);
                right.collect_identifiers(out);
            }
            HavingExpr::Number(_) | HavingExpr::Boolean(_) => {}
        }
    }

    pub fn evaluate(&self, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<Datum> {
        match self {
            HavingExpr::Number(v) => Ok(Datum::Number(*v)),
            HavingExpr::Boolean(b) => Ok(Datum::Bool(*b)),
            HavingExpr::Aggregate(id) => lookup(id).map(Datum::Number).ok_or_else(|| {
                EmfError::HavingEvaluation(format!("'{}' is not an aggregate in F-VECT", id))
            }),
            HavingExpr::Unary { op, expr } => {
                let v = expr.evaluate(lookup)?;
                Ok(match op {
                    UnaryOp::Not => Datum::Bool(!v.is_truthy()),
                    UnaryOp::Negate => Datum::Number(-v.as_f64()),
                })
            }
            HavingExpr::Binary { left, op, right } => {
                let l = left.evaluate(lookup)?;
                match op {
                    BinaryOp::And => {
                        if !l.is_truthy() {
                            return Ok(Datum::Bool(false));
                        }
                        Ok(Datum::Bool(right.evaluate(lookup)?.is_truthy()))
                    }
                    BinaryOp::Or => {
                        if l.is_truthy() {
                            return Ok(Datum::Bool(true));
                        }
                        Ok(Datum::Bool(right.evaluate(lookup)?.is_truthy()))
                    }
                    _ => {
                        let a = l.as_f64();
                        let b = right.evaluate(lookup)?.as_f64();
                        Ok(match op {
                            BinaryOp::Add => Datum::Number(a + b),
                            BinaryOp::Subtract => Datum::Number(a - b),
                            BinaryOp::Multiply => Datum::Number(a * b),
                            BinaryOp::Divide => {
                                if b == 0.0 {
                                    return Err(EmfError::HavingEvaluation(
                                        "division by zero".into(),
                                    ));
                                }
                                Datum::Number(a / b)
                            }
                            BinaryOp::Eq => Datum::Bool(a == b),
                            BinaryOp::NotEq => Datum::Bool(a != b),
                            BinaryOp::Lt => Datum::Bool(a < b),
                            BinaryOp::LtEq => Datum::Bool(a <= b),
                            BinaryOp::Gt => Datum::Bool(a > b),
                            BinaryOp::GtEq => Datum::Bool(a >= b),
                            BinaryOp::And => Datum::Bool(a != 0.0 && b != 0.0),
                            BinaryOp::Or => Datum::Bool(a != 0.0 || b != 0.0),
                        })
                    }
                }
            }
        }
    }

    /// Evaluate and reduce to a keep/drop decision
    pub fn is_satisfied(&self, lookup: &dyn Fn(&str) -> Option<f64>) -> Result<bool> {
        Ok(self.evaluate(lookup)?.is_truthy())
    }
}

impl fmt::Display for HavingExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HavingExpr::Number(v) => write!(f, "{}", v),
            HavingExpr::Boolean(b) => write!(f, "{}", b),
            HavingExpr::Aggregate(id) => write!(f, "{}", id),
            HavingExpr::Unary { op: UnaryOp::Not, expr } => write!(f, "NOT {}", expr),
            HavingExpr::Unary { op: UnaryOp::Negate, expr } => write!(f, "-{}", expr),
            HavingExpr::Binary { left, op, right } => write!(f, "({} {} {})", left, op, right),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(BinaryOp),
    Not,
    True,
    False,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(v) => write!(f, "{}", v),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Op(op) => write!(f, "{}", op),
            Token::Not => write!(f, "NOT"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            let start = i;
            while i < chars.len() {
                if chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.' {
                    i += 1;
                } else if matches!(chars[i], '+' | '-')
                    && is_exponent_sign(&chars[start..i], chars.get(i + 1).copied())
                {
                    i += 1;
                } else {
                    break;
                }
            }
            let word: String = chars[start..i].iter().collect();
            tokens.push(word_token(word)?);
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('>', Some('=')) => (Token::Op(BinaryOp::GtEq), 2),
            ('<', Some('=')) => (Token::Op(BinaryOp::LtEq), 2),
            ('<', Some('>')) => (Token::Op(BinaryOp::NotEq), 2),
            ('!', Some('=')) => (Token::Op(BinaryOp::NotEq), 2),
            ('=', Some('=')) => (Token::Op(BinaryOp::Eq), 2),
            ('&', Some('&')) => (Token::Op(BinaryOp::And), 2),
            ('|', Some('|')) => (Token::Op(BinaryOp::Or), 2),
            ('=', _) => (Token::Op(BinaryOp::Eq), 1),
            ('>', _) => (Token::Op(BinaryOp::Gt), 1),
            ('<', _) => (Token::Op(BinaryOp::Lt), 1),
            ('+', _) => (Token::Op(BinaryOp::Add), 1),
            ('-', _) => (Token::Op(BinaryOp::Subtract), 1),
            ('*', _) => (Token::Op(BinaryOp::Multiply), 1),
            ('/', _) => (Token::Op(BinaryOp::Divide), 1),
            ('!', _) => (Token::Not, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            _ => {
                return Err(EmfError::HavingParse(format!(
                    "unexpected character '{}' at position {}",
                    c, i
                )))
            }
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

/// True when `word` is a numeric literal ending in an exponent marker and
/// the sign at the cursor is followed by a digit, as in `1e-5`
fn is_exponent_sign(word: &[char], after_sign: Option<char>) -> bool {
    let numeric = word
        .first()
        .is_some_and(|c| c.is_ascii_digit() || *c == '.');
    numeric
        && !word.contains(&'_')
        && matches!(word.last().copied(), Some('e' | 'E'))
        && after_sign.is_some_and(|c| c.is_ascii_digit())
}

fn word_token(word: String) -> Result<Token> {
    match word.to_ascii_lowercase().as_str() {
        "and" => return Ok(Token::Op(BinaryOp::And)),
        "or" => return Ok(Token::Op(BinaryOp::Or)),
        "not" => return Ok(Token::Not),
        "true" => return Ok(Token::True),
        "false" => return Ok(Token::False),
        _ => {}
    }

    let numeric_start = word.starts_with(|c: char| c.is_ascii_digit() || c == '.');
    if numeric_start && !word.contains('_') {
        return word
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| EmfError::HavingParse(format!("invalid number '{}'", word)));
    }

    Ok(Token::Ident(word))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn peek_op(&self) -> Option<BinaryOp> {
        match self.peek() {
            Some(Token::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn parse_or(&mut self) -> Result<HavingExpr> {
        let mut left = self.parse_and()?;
        while self.peek_op() == Some(BinaryOp::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = binary(left, BinaryOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<HavingExpr> {
        let mut left = self.parse_not()?;
        while self.peek_op() == Some(BinaryOp::And) {
            self.pos += 1;
            let right = self.parse_not()?;
            left = binary(left, BinaryOp::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<HavingExpr> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let expr = self.parse_not()?;
            return Ok(HavingExpr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<HavingExpr> {
        let mut left = self.parse_sum()?;
        let mut result: Option<HavingExpr> = None;

        while let Some(op) = self.peek_op().filter(BinaryOp::is_comparison) {
            self.pos += 1;
            let right = self.parse_sum()?;
            let cmp = binary(std::mem::replace(&mut left, right.clone()), op, right);
            result = Some(match result {
                Some(prev) => binary(prev, BinaryOp::And, cmp),
                None => cmp,
            });
        }

        Ok(result.unwrap_or(left))
    }

    fn parse_sum(&mut self) -> Result<HavingExpr> {
        let mut left = self.parse_product()?;
        while let Some(op) = self
            .peek_op()
            .filter(|op| matches!(op, BinaryOp::Add | BinaryOp::Subtract))
        {
            self.pos += 1;
            let right = self.parse_product()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_product(&mut self) -> Result<HavingExpr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self
            .peek_op()
            .filter(|op| matches!(op, BinaryOp::Multiply | BinaryOp::Divide))
        {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<HavingExpr> {
        if self.peek_op() == Some(BinaryOp::Subtract) {
            self.pos += 1;
            let expr = self.parse_unary()?;
            return Ok(HavingExpr::Unary {
                op: UnaryOp::Negate,
                expr: Box::new(expr),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<HavingExpr> {
        match self.next() {
            Some(Token::Number(v)) => Ok(HavingExpr::Number(v)),
            Some(Token::Ident(id)) => Ok(HavingExpr::Aggregate(id)),
            Some(Token::True) => Ok(HavingExpr::Boolean(true)),
            Some(Token::False) => Ok(HavingExpr::Boolean(false)),
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(expr),
                    _ => Err(EmfError::HavingParse("missing ')'".into())),
                }
            }
            Some(tok) => Err(EmfError::HavingParse(format!("unexpected '{}'", tok))),
            None => Err(EmfError::HavingParse("unexpected end of expression".into())),
        }
    }
}

fn binary(left: HavingExpr, op: BinaryOp, right: HavingExpr) -> HavingExpr {
    HavingExpr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(id: &str) -> Option<f64> {
        match id {
            "1_count_quant" => Some(1.0),
            "2_sum_quant" => Some(5.0),
            "1_sum_quant" => Some(10.0),
            "1_avg_quant" => Some(2.5),
            _ => None,
        }
    }

    fn eval(text: &str) -> Result<bool> {
        HavingExpr::parse(text)?.is_satisfied(&lookup)
    }

    #[test]
    fn test_simple_comparison() {
        assert!(eval("1_count_quant>0").unwrap());
        assert!(eval("2_sum_quant > 4").unwrap());
        assert!(!eval("2_sum_quant > 5").unwrap());
        assert!(eval("2_sum_quant = 5").unwrap());
        assert!(eval("2_sum_quant == 5").unwrap());
        assert!(eval("2_sum_quant <> 4").unwrap());
    }

    #[test]
    fn test_identifiers_do_not_collide() {
        let expr = HavingExpr::parse("1_sum_quant > 2 * 2_sum_quant - 1").unwrap();
        assert_eq!(expr.identifiers(), vec!["1_sum_quant", "2_sum_quant"]);
        assert!(expr.is_satisfied(&lookup).unwrap());
        assert!(!eval("1_sum_quant > 2 * 2_sum_quant").unwrap());
    }

    #[test]
    fn test_logical_operators() {
        assert!(eval("1_count_quant > 0 and 2_sum_quant > 4").unwrap());
        assert!(eval("1_count_quant > 5 or 2_sum_quant > 4").unwrap());
        assert!(eval("not 1_count_quant > 5").unwrap());
        assert!(eval("1_count_quant > 0 && !(2_sum_quant < 1)").unwrap());
        assert!(!eval("1_count_quant > 0 AND 2_sum_quant > 100").unwrap());
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert!(eval("1_sum_quant - 2_sum_quant * 2 = 0").unwrap());
        assert!(eval("(1_sum_quant - 2_sum_quant) * 2 = 10").unwrap());
        assert!(eval("-1_avg_quant < 0").unwrap());
        assert!(eval("1_avg_quant = 2.5").unwrap());
    }

    #[test]
    fn test_signed_exponent() {
        assert!(eval("1_avg_quant > 1e-5").unwrap());
        assert!(eval("1_sum_quant = 1E+1").unwrap());
        assert!(eval("2_sum_quant-1 = 4").unwrap());
        assert!(matches!(
            HavingExpr::parse("1_avg_quant > 1e-5").unwrap(),
            HavingExpr::Binary { .. }
        ));
    }

    #[test]
    fn test_chained_comparison() {
        assert!(eval("0 < 2_sum_quant < 10").unwrap());
        assert!(!eval("0 < 2_sum_quant < 3").unwrap());
    }

    #[test]
    fn test_bare_number_truthiness() {
        assert!(eval("1_count_quant").unwrap());
        assert!(!eval("0").unwrap());
    }

    #[test]
    fn test_unknown_identifier_is_error() {
        let err = eval("3_max_quant > 1").unwrap_err();
        assert!(matches!(err, EmfError::HavingEvaluation(_)));
    }

    #[test]
    fn test_division_by_zero_is_error() {
        let err = eval("1_sum_quant / 0 > 1").unwrap_err();
        assert!(matches!(err, EmfError::HavingEvaluation(_)));
    }

    #[test]
    fn test_parse_errors() {
        for text in ["1_sum_quant >", "(1_sum_quant > 1", "1_sum_quant > 1)", "a ; b", "1.2.3 > 1"] {
            let err = HavingExpr::parse(text).unwrap_err();
            assert!(matches!(err, EmfError::HavingParse(_)), "{}", text);
        }
    }
}
