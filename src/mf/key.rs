//! Typed composite group keys

use crate::catalog::Value;
use chrono::NaiveDate;
use ordered_float::OrderedFloat;
use std::fmt;

/// One grouping-attribute value inside a key
///
/// Strings are trimmed so `"NY "` and `"NY"` land in the same group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupValue {
    Null,
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Date(NaiveDate),
}

impl From<&Value> for GroupValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => GroupValue::Null,
            Value::Int(v) => GroupValue::Int(*v),
            Value::Float(v) => GroupValue::Float(OrderedFloat(*v)),
            Value::Str(s) => GroupValue::Str(s.trim().to_string()),
            Value::Date(d) => GroupValue::Date(*d),
        }
    }
}

impl fmt::Display for GroupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupValue::Null => write!(f, "NULL"),
            GroupValue::Int(v) => write!(f, "{}", v),
            GroupValue::Float(v) => write!(f, "{}", v),
            GroupValue::Str(v) => write!(f, "{}", v),
            GroupValue::Date(v) => write!(f, "{}", Value::Date(*v)),
        }
    }
}

/// Ordered tuple of grouping-attribute values
///
/// Equality and hashing are structural: `Int(1)` and `Str("1")` are
/// different keys even though they print the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    values: Vec<GroupValue>,
}

impl GroupKey {
    pub fn new(values: Vec<GroupValue>) -> Self {
        Self { values }
    }

    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        Self::new(values.into_iter().map(GroupValue::from).collect())
    }

    pub fn values(&self) -> &[GroupValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stringified components, the sort key for result rows
    pub fn sort_strings(&self) -> Vec<String> {
        self.values.iter().map(|v| v.to_string()).collect()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.sort_strings().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_trimmed_strings_share_a_key() {
        let a = GroupKey::from_values(&[Value::Str("NY ".into())]);
        let b = GroupKey::from_values(&[Value::Str("NY".into())]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_shapes_do_not_collide() {
        let int_key = GroupKey::from_values(&[Value::Int(1)]);
        let str_key = GroupKey::from_values(&[Value::Str("1".into())]);
        assert_ne!(int_key, str_key);
        assert_eq!(int_key.sort_strings(), str_key.sort_strings());

        // Concatenation would merge ("a_b", "c") with ("a", "b_c")
        let left = GroupKey::from_values(&[Value::from("a_b"), Value::from("c")]);
        let right = GroupKey::from_values(&[Value::from("a"), Value::from("b_c")]);
        let set: HashSet<GroupKey> = [left, right].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display() {
        let key = GroupKey::from_values(&[Value::from("A"), Value::Int(3)]);
        assert_eq!(key.to_string(), "(A, 3)");
        assert_eq!(key.len(), 2);
    }
}
