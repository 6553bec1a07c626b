//! Per-scan predicate evaluation
//!
//! A grouping variable's condition is a conjunction of single-attribute
//! comparisons joined by the literal token `" and "`:
//!
//! ```text
//! 1.state='NY' and quant>=5
//! ```
//!
//! `-` or an empty string is always true. The scan qualifier before the last
//! `.` of an attribute is stripped and not checked against the scan number.

use crate::catalog::{AttributeType, Row, SchemaCatalog, Value, DATE_FORMAT};
use crate::error::{EmfError, Result};
use crate::spec::is_empty_clause;
use std::cmp::Ordering;
use std::fmt;

/// Conjunction separator inside a condition
pub const AND_TOKEN: &str = " and ";

/// Comparison operators, in the order they are tried when splitting a clause
pub const OPERATOR_PRIORITY: [CompareOp; 6] = [
    CompareOp::GtEq,
    CompareOp::LtEq,
    CompareOp::NotEq,
    CompareOp::Eq,
    CompareOp::Gt,
    CompareOp::Lt,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }

    pub fn is_ordering(&self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::NotEq)
    }

    /// Apply the operator to an already computed ordering
    pub fn matches(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// One `attribute <op> literal` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub attribute: String,
    pub op: CompareOp,
    pub literal: String,
}

impl Comparison {
    /// Parse a single clause such as `2.state = 'NJ'`
    pub fn parse(clause: &str) -> Result<Self> {
        let op = OPERATOR_PRIORITY
            .iter()
            .copied()
            .find(|op| clause.contains(op.symbol()))
            .ok_or_else(|| {
                EmfError::MalformedPredicate(format!("no comparison operator in '{}'", clause))
            })?;

        let sides: Vec<&str> = clause.split(op.symbol()).collect();
        if sides.len() != 2 {
            return Err(EmfError::MalformedPredicate(format!(
                "'{}' does not split into two sides on '{}'",
                clause, op
            )));
        }

        let left = sides[0].trim();
        let attribute = match left.rfind('.') {
            Some(pos) => left[pos + 1..].trim(),
            None => left,
        };
        if attribute.is_empty() {
            return Err(EmfError::MalformedPredicate(format!(
                "missing attribute in '{}'",
                clause
            )));
        }

        Ok(Self {
            attribute: attribute.to_string(),
            op,
            literal: strip_quotes(sides[1].trim()).trim().to_string(),
        })
    }

    pub fn evaluate(&self, row: &Row, catalog: &SchemaCatalog) -> Result<bool> {
        let ty = catalog.lookup(&self.attribute)?;
        let value = row
            .get(&self.attribute)
            .ok_or_else(|| EmfError::UnknownAttribute(format!("row has no '{}'", self.attribute)))?;

        if value.is_null() {
            return Ok(false);
        }

        let ordering = match ty {
            AttributeType::String => {
                let actual = value.to_string();
                actual.trim().cmp(self.literal.as_str())
            }
            AttributeType::Integer => {
                let actual = coerce_i64(value, &self.attribute)?;
                let expected: i64 = self.literal.parse().map_err(|_| {
                    EmfError::TypeMismatch(format!(
                        "'{}' is not an integer literal for '{}'",
                        self.literal, self.attribute
                    ))
                })?;
                actual.cmp(&expected)
            }
            AttributeType::Float => {
                let actual = coerce_f64(value, &self.attribute)?;
                let expected: f64 = self.literal.parse().map_err(|_| {
                    EmfError::TypeMismatch(format!(
                        "'{}' is not a numeric literal for '{}'",
                        self.literal, self.attribute
                    ))
                })?;
                actual.partial_cmp(&expected).ok_or_else(|| {
                    EmfError::TypeMismatch(format!("'{}' compared against NaN", self.attribute))
                })?
            }
            AttributeType::Date => {
                if self.op.is_ordering() {
                    return Err(EmfError::NotImplemented(format!(
                        "ordering comparison '{}' on date attribute '{}'",
                        self.op, self.attribute
                    )));
                }
                let actual = match value {
                    Value::Date(d) => d.format(DATE_FORMAT).to_string(),
                    other => other.to_string().trim().to_string(),
                };
                actual.as_str().cmp(self.literal.as_str())
            }
        };

        Ok(self.op.matches(ordering))
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}'{}'", self.attribute, self.op, self.literal)
    }
}

/// A compiled scan condition: every comparison must hold
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<Comparison>,
}

impl Predicate {
    /// Predicate that accepts every row
    pub fn always_true() -> Self {
        Self::default()
    }

    pub fn parse(condition: &str) -> Result<Self> {
        if is_empty_clause(condition) {
            return Ok(Self::always_true());
        }

        let clauses = condition
            .split(AND_TOKEN)
            .map(Comparison::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { clauses })
    }

    pub fn clauses(&self) -> &[Comparison] {
        &self.clauses
    }

    pub fn is_always_true(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn evaluate(&self, row: &Row, catalog: &SchemaCatalog) -> Result<bool> {
        for clause in &self.clauses {
            if !clause.evaluate(row, catalog)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "true");
        }
        let parts: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(AND_TOKEN))
    }
}

/// Parse and evaluate a condition string against one row
pub fn evaluate(row: &Row, condition: &str, catalog: &SchemaCatalog) -> Result<bool> {
    Predicate::parse(condition)?.evaluate(row, catalog)
}

fn strip_quotes(s: &str) -> &str {
    let s = s.strip_prefix(['\'', '"']).unwrap_or(s);
    s.strip_suffix(['\'', '"']).unwrap_or(s)
}

fn coerce_i64(value: &Value, attribute: &str) -> Result<i64> {
    match value {
        Value::Int(v) => Ok(*v),
        Value::Str(s) => s.trim().parse().map_err(|_| {
            EmfError::TypeMismatch(format!("'{}' value '{}' is not an integer", attribute, s))
        }),
        other => Err(EmfError::TypeMismatch(format!(
            "'{}' expected integer, got {}",
            attribute,
            other.type_name()
        ))),
    }
}

fn coerce_f64(value: &Value, attribute: &str) -> Result<f64> {
    match value {
        Value::Int(_) | Value::Float(_) => Ok(value.as_f64().unwrap_or(f64::NAN)),
        Value::Str(s) => s.trim().parse().map_err(|_| {
            EmfError::TypeMismatch(format!("'{}' value '{}' is not numeric", attribute, s))
        }),
        other => Err(EmfError::TypeMismatch(format!(
            "'{}' expected float, got {}",
            attribute,
            other.type_name()
        ))),
    }
}
