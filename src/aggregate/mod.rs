//! Aggregate accumulators
//!
//! Each `f_vect` entry owns one `AggregateState` per group. Updates are pure:
//! `update` returns the post-state and leaves committing it to the caller, so
//! a row whose update fails part way through never leaves a group half-updated.

use crate::catalog::Value;
use crate::error::{EmfError, Result};
use std::fmt;
use std::str::FromStr;

/// Aggregate function kinds supported in `f_vect`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Count,
    Sum,
    Max,
    Min,
    Avg,
}

impl AggregateKind {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateKind::Count => "count",
            AggregateKind::Sum => "sum",
            AggregateKind::Max => "max",
            AggregateKind::Min => "min",
            AggregateKind::Avg => "avg",
        }
    }
}

impl FromStr for AggregateKind {
    type Err = EmfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Ok(AggregateKind::Count),
            "sum" => Ok(AggregateKind::Sum),
            "max" => Ok(AggregateKind::Max),
            "min" => Ok(AggregateKind::Min),
            "avg" => Ok(AggregateKind::Avg),
            other => Err(EmfError::InvalidSpecification(format!(
                "unknown aggregate kind '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Partial aggregate for one group and one `f_vect` entry
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateState {
    Count(i64),
    Sum(Value),
    Max(Value),
    Min(Value),
    /// Running sum and count, finalized once after all scans
    Avg { sum: Value, count: i64 },
}

impl AggregateState {
    /// Initial state for a freshly admitted group
    pub fn new(kind: AggregateKind) -> Self {
        match kind {
            AggregateKind::Count => AggregateState::Count(0),
            AggregateKind::Sum => AggregateState::Sum(Value::Int(0)),
            AggregateKind::Max => AggregateState::Max(Value::Float(f64::NEG_INFINITY)),
            AggregateKind::Min => AggregateState::Min(Value::Float(f64::INFINITY)),
            AggregateKind::Avg => AggregateState::Avg {
                sum: Value::Int(0),
                count: 0,
            },
        }
    }

    pub fn kind(&self) -> AggregateKind {
        match self {
            AggregateState::Count(_) => AggregateKind::Count,
            AggregateState::Sum(_) => AggregateKind::Sum,
            AggregateState::Max(_) => AggregateKind::Max,
            AggregateState::Min(_) => AggregateKind::Min,
            AggregateState::Avg { .. } => AggregateKind::Avg,
        }
    }

    /// Fold one row value into the state, returning the post-state
    ///
    /// `value` is the row's value for the aggregate's field. COUNT ignores it,
    /// so a row lacking the field still counts.
    pub fn update(&self, value: Option<&Value>) -> Result<AggregateState> {
        match self {
            AggregateState::Count(n) => Ok(AggregateState::Count(n + 1)),
            AggregateState::Sum(acc) => Ok(AggregateState::Sum(add(acc, numeric(value)?))),
            AggregateState::Max(acc) => {
                let v = numeric(value)?;
                Ok(AggregateState::Max(pick(acc, v, |a, b| b > a)))
            }
            AggregateState::Min(acc) => {
                let v = numeric(value)?;
                Ok(AggregateState::Min(pick(acc, v, |a, b| b < a)))
            }
            AggregateState::Avg { sum, count } => Ok(AggregateState::Avg {
                sum: add(sum, numeric(value)?),
                count: count + 1,
            }),
        }
    }

    /// Final scalar value of the aggregate
    ///
    /// AVG divides the running sum by the running count; an empty AVG
    /// finalizes to `0` instead of dividing by zero.
    pub fn finalize(&self) -> Value {
        match self {
            AggregateState::Count(n) => Value::Int(*n),
            AggregateState::Sum(v) | AggregateState::Max(v) | AggregateState::Min(v) => v.clone(),
            AggregateState::Avg { sum, count } => {
                if *count == 0 {
                    Value::Int(0)
                } else {
                    Value::Float(sum.as_f64().unwrap_or(0.0) / *count as f64)
                }
            }
        }
    }

    /// Finalized value as f64, used by HAVING
    pub fn finalize_f64(&self) -> f64 {
        self.finalize().as_f64().unwrap_or(0.0)
    }
}

fn numeric(value: Option<&Value>) -> Result<&Value> {
    match value {
        Some(v) if v.is_numeric() => Ok(v),
        Some(v) => Err(EmfError::TypeMismatch(format!(
            "expected a numeric value, got {} '{}'",
            v.type_name(),
            v
        ))),
        None => Err(EmfError::TypeMismatch(
            "expected a numeric value, field is missing".into(),
        )),
    }
}

/// Integer + integer stays integer; anything else promotes to float
fn add(acc: &Value, v: &Value) -> Value {
    match (acc, v) {
        (Value::Int(a), Value::Int(b)) => match a.checked_add(*b) {
            Some(sum) => Value::Int(sum),
            None => Value::Float(*a as f64 + *b as f64),
        },
        _ => Value::Float(acc.as_f64().unwrap_or(0.0) + v.as_f64().unwrap_or(0.0)),
    }
}

/// Keep whichever value wins `better`, keeping its type
fn pick(acc: &Value, v: &Value, better: impl Fn(f64, f64) -> bool) -> Value {
    let a = acc.as_f64().unwrap_or(f64::NAN);
    let b = v.as_f64().unwrap_or(f64::NAN);
    if acc.is_null() || better(a, b) {
        v.clone()
    } else {
        acc.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(kind: AggregateKind, values: &[Value]) -> AggregateState {
        values
            .iter()
            .fold(AggregateState::new(kind), |s, v| s.update(Some(v)).unwrap())
    }

    #[test]
    fn test_initial_states() {
        assert_eq!(AggregateState::new(AggregateKind::Count).finalize(), Value::Int(0));
        assert_eq!(AggregateState::new(AggregateKind::Sum).finalize(), Value::Int(0));
        assert_eq!(
            AggregateState::new(AggregateKind::Max).finalize(),
            Value::Float(f64::NEG_INFINITY)
        );
        assert_eq!(
            AggregateState::new(AggregateKind::Min).finalize(),
            Value::Float(f64::INFINITY)
        );
    }

    #[test]
    fn test_count_ignores_value() {
        let s = AggregateState::new(AggregateKind::Count)
            .update(None)
            .unwrap()
            .update(Some(&Value::Str("x".into())))
            .unwrap();
        assert_eq!(s.finalize(), Value::Int(2));
    }

    #[test]
    fn test_sum_keeps_integers() {
        let s = fold(AggregateKind::Sum, &[Value::Int(10), Value::Int(5)]);
        assert_eq!(s.finalize(), Value::Int(15));

        let s = fold(AggregateKind::Sum, &[Value::Int(1), Value::Float(0.5)]);
        assert_eq!(s.finalize(), Value::Float(1.5));
    }

    #[test]
    fn test_sum_rejects_strings() {
        let s = AggregateState::new(AggregateKind::Sum);
        let err = s.update(Some(&Value::Str("ten".into()))).unwrap_err();
        assert!(matches!(err, EmfError::TypeMismatch(_)));
        assert!(s.update(None).is_err());
    }

    #[test]
    fn test_max_min() {
        let values = [Value::Int(3), Value::Int(9), Value::Int(1)];
        assert_eq!(fold(AggregateKind::Max, &values).finalize(), Value::Int(9));
        assert_eq!(fold(AggregateKind::Min, &values).finalize(), Value::Int(1));
    }

    #[test]
    fn test_avg_deferred() {
        let s = fold(AggregateKind::Avg, &[Value::Int(1), Value::Int(2)]);
        assert_eq!(
            s,
            AggregateState::Avg {
                sum: Value::Int(3),
                count: 2
            }
        );
        assert_eq!(s.finalize(), Value::Float(1.5));
    }

    #[test]
    fn test_avg_zero_count_is_zero() {
        let s = AggregateState::new(AggregateKind::Avg);
        assert_eq!(s.finalize(), Value::Int(0));
        assert_eq!(s.finalize_f64(), 0.0);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("AVG".parse::<AggregateKind>().unwrap(), AggregateKind::Avg);
        assert!("median".parse::<AggregateKind>().is_err());
    }
}
