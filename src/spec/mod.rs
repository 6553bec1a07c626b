//! Query specification for EMF queries
//!
//! A `QuerySpec` is the validated description of one EMF query: the output
//! attributes, the grouping attributes, one predicate per grouping variable,
//! the aggregate vector (`f_vect`) and the HAVING clause.

mod file;

pub use file::*;

use crate::aggregate::AggregateKind;
use crate::error::{EmfError, Result};
use std::collections::HashSet;
use std::fmt;

/// Text used for "no condition" / "no HAVING"
pub const NO_CLAUSE: &str = "-";

/// True when a condition or HAVING string means "no filter"
pub fn is_empty_clause(clause: &str) -> bool {
    let clause = clause.trim();
    clause.is_empty() || clause == NO_CLAUSE
}

/// One parsed `f_vect` identifier: `<scan>_<kind>_<field>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateSpec {
    /// Identifier as written, used for output columns and HAVING lookups
    pub id: String,
    /// 1-based grouping variable this aggregate belongs to
    pub scan: usize,
    pub kind: AggregateKind,
    pub field: String,
}

impl AggregateSpec {
    /// Parse an identifier, checking its scan index against `n`
    pub fn parse(id: &str, num_grouping_vars: usize) -> Result<Self> {
        let id = id.trim();
        let mut parts = id.splitn(3, '_');
        let (scan, kind, field) = match (parts.next(), parts.next(), parts.next()) {
            (Some(s), Some(k), Some(f)) if !s.is_empty() && !f.is_empty() => (s, k, f),
            _ => {
                return Err(EmfError::InvalidSpecification(format!(
                    "aggregate '{}' is not of the form <scan>_<kind>_<field>",
                    id
                )))
            }
        };

        let scan: usize = scan.parse().map_err(|_| {
            EmfError::InvalidSpecification(format!(
                "aggregate '{}' has a non-numeric scan index '{}'",
                id, scan
            ))
        })?;
        if scan == 0 || scan > num_grouping_vars {
            return Err(EmfError::InvalidSpecification(format!(
                "aggregate '{}' references grouping variable {} but n = {}",
                id, scan, num_grouping_vars
            )));
        }

        let kind: AggregateKind = kind.parse()?;

        Ok(Self {
            id: id.to_string(),
            scan,
            kind,
            field: field.to_string(),
        })
    }

    /// Whether this aggregate is fed by the 0-based scan loop index
    pub fn belongs_to_scan(&self, scan_index: usize) -> bool {
        self.scan == scan_index + 1
    }
}

/// Validated, immutable EMF query specification
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    select_attrs: Vec<String>,
    num_grouping_vars: usize,
    grouping_attrs: Vec<String>,
    aggregates: Vec<AggregateSpec>,
    conditions: Vec<String>,
    having: String,
}

impl QuerySpec {
    /// Build and validate a specification
    pub fn try_new<S: Into<String>>(
        select_attrs: impl IntoIterator<Item = S>,
        num_grouping_vars: usize,
        grouping_attrs: impl IntoIterator<Item = S>,
        f_vect: impl IntoIterator<Item = S>,
        conditions: impl IntoIterator<Item = S>,
        having: impl Into<String>,
    ) -> Result<Self> {
        let select_attrs = trimmed(select_attrs);
        let grouping_attrs = trimmed(grouping_attrs);
        let f_vect = trimmed(f_vect);
        let conditions: Vec<String> = conditions.into_iter().map(|c| c.into().trim().to_string()).collect();
        let having = having.into().trim().to_string();

        if num_grouping_vars == 0 {
            return Err(EmfError::InvalidSpecification(
                "number of grouping variables must be at least 1".into(),
            ));
        }
        if grouping_attrs.is_empty() {
            return Err(EmfError::InvalidSpecification(
                "at least one grouping attribute is required".into(),
            ));
        }
        if conditions.len() != num_grouping_vars {
            return Err(EmfError::InvalidSpecification(format!(
                "expected {} conditions (one per grouping variable), got {}",
                num_grouping_vars,
                conditions.len()
            )));
        }

        let mut seen = HashSet::new();
        let mut aggregates = Vec::with_capacity(f_vect.len());
        for id in &f_vect {
            let agg = AggregateSpec::parse(id, num_grouping_vars)?;
            if !seen.insert(agg.id.clone()) {
                return Err(EmfError::InvalidSpecification(format!(
                    "aggregate '{}' appears more than once",
                    agg.id
                )));
            }
            aggregates.push(agg);
        }

        for attr in &select_attrs {
            if !grouping_attrs.contains(attr) && !seen.contains(attr) {
                return Err(EmfError::InvalidSpecification(format!(
                    "select attribute '{}' is neither a grouping attribute nor an aggregate",
                    attr
                )));
            }
        }

        Ok(Self {
            select_attrs,
            num_grouping_vars,
            grouping_attrs,
            aggregates,
            conditions,
            having,
        })
    }

    /// Build a specification from the delimited strings used on the prompt:
    /// comma-separated lists, `;`-separated conditions.
    pub fn from_delimited(
        select_attrs: &str,
        num_grouping_vars: &str,
        grouping_attrs: &str,
        f_vect: &str,
        conditions: &str,
        having: &str,
    ) -> Result<Self> {
        Self::from_sections(
            select_attrs,
            num_grouping_vars,
            grouping_attrs,
            f_vect,
            conditions.split(';').map(str::to_string).collect(),
            having,
        )
    }

    /// Build a specification from raw section text with one entry per
    /// condition. Empty conditions are kept and match every row.
    pub fn from_sections(
        select_attrs: &str,
        num_grouping_vars: &str,
        grouping_attrs: &str,
        f_vect: &str,
        conditions: Vec<String>,
        having: &str,
    ) -> Result<Self> {
        let n: usize = num_grouping_vars.trim().parse().map_err(|_| {
            EmfError::InvalidSpecification(format!(
                "number of grouping variables '{}' is not a positive integer",
                num_grouping_vars.trim()
            ))
        })?;

        Self::try_new(
            split_list(select_attrs, ','),
            n,
            split_list(grouping_attrs, ','),
            split_list(f_vect, ',')
                .into_iter()
                .map(|f| f.to_lowercase())
                .collect::<Vec<_>>(),
            conditions,
            having,
        )
    }

    pub fn select_attrs(&self) -> &[String] {
        &self.select_attrs
    }

    pub fn num_grouping_vars(&self) -> usize {
        self.num_grouping_vars
    }

    pub fn grouping_attrs(&self) -> &[String] {
        &self.grouping_attrs
    }

    pub fn aggregates(&self) -> &[AggregateSpec] {
        &self.aggregates
    }

    /// Aggregate identifiers in `f_vect` order
    pub fn f_vect(&self) -> impl Iterator<Item = &str> {
        self.aggregates.iter().map(|a| a.id.as_str())
    }

    pub fn aggregate_index(&self, id: &str) -> Option<usize> {
        self.aggregates.iter().position(|a| a.id == id)
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    /// Condition for a 0-based scan index
    pub fn condition(&self, scan_index: usize) -> Option<&str> {
        self.conditions.get(scan_index).map(String::as_str)
    }

    pub fn having(&self) -> &str {
        &self.having
    }

    pub fn has_having(&self) -> bool {
        !is_empty_clause(&self.having)
    }

    pub fn is_grouping_attr(&self, name: &str) -> bool {
        self.grouping_attrs.iter().any(|g| g == name)
    }
}

/// Renders the six-section file format read by `parse_spec_str`
impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let having = if self.having.is_empty() {
            NO_CLAUSE
        } else {
            self.having.as_str()
        };
        writeln!(f, "{}", SECTION_SELECT)?;
        writeln!(f, "{}", self.select_attrs.join(", "))?;
        writeln!(f, "{}", SECTION_NUM_VARS)?;
        writeln!(f, "{}", self.num_grouping_vars)?;
        writeln!(f, "{}", SECTION_GROUPING)?;
        writeln!(f, "{}", self.grouping_attrs.join(", "))?;
        writeln!(f, "{}", SECTION_F_VECT)?;
        let ids: Vec<&str> = self.f_vect().collect();
        writeln!(f, "{}", ids.join(", "))?;
        writeln!(f, "{}", SECTION_CONDITIONS)?;
        for cond in &self.conditions {
            let cond = if cond.is_empty() { NO_CLAUSE } else { cond.as_str() };
            writeln!(f, "{}", cond)?;
        }
        writeln!(f, "{}", SECTION_HAVING)?;
        write!(f, "{}", having)
    }
}

fn trimmed<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.into().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn split_list(s: &str, sep: char) -> Vec<String> {
    s.split(sep)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}
