//! MF-Structure (the H-table)
//!
//! Maps each group key to its accumulator state. Groups are admitted only on
//! the first scan, which enumerates the group universe; later scans add
//! contributions to groups that already exist and drop everything else.

mod key;

pub use key::*;

use crate::aggregate::AggregateState;
use crate::catalog::{Row, Value};
use crate::error::{EmfError, Result};
use crate::spec::QuerySpec;
use hashbrown::HashMap;
use std::sync::Arc;

/// Default number of decimal digits averages are rounded to in results
pub const DEFAULT_AVG_PRECISION: u32 = 2;

/// Accumulator state for one group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEntry {
    /// Grouping-attribute values as first seen, untrimmed
    values: Vec<Value>,
    /// One state per `f_vect` entry, in `f_vect` order
    states: Vec<AggregateState>,
}

impl GroupEntry {
    fn new(values: Vec<Value>, spec: &QuerySpec) -> Self {
        let states = spec
            .aggregates()
            .iter()
            .map(|a| AggregateState::new(a.kind))
            .collect();
        Self { values, states }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn states(&self) -> &[AggregateState] {
        &self.states
    }

    pub fn state(&self, index: usize) -> Option<&AggregateState> {
        self.states.get(index)
    }
}

/// What `process_tuple` did with a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleOutcome {
    /// The row's group exists and its aggregates were updated
    Updated,
    /// The row's group was never seen on the first scan
    Ignored,
}

/// One output row: `(attribute, value)` pairs in `select_attrs` order
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    values: Vec<(String, Value)>,
}

impl ResultRow {
    pub fn new(values: Vec<(String, Value)>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The H-table
#[derive(Debug, Clone)]
pub struct MfStructure {
    spec: Arc<QuerySpec>,
    groups: HashMap<GroupKey, GroupEntry>,
    avg_precision: u32,
}

impl MfStructure {
    pub fn new(spec: Arc<QuerySpec>) -> Self {
        Self {
            spec,
            groups: HashMap::new(),
            avg_precision: DEFAULT_AVG_PRECISION,
        }
    }

    pub fn with_avg_precision(mut self, digits: u32) -> Self {
        self.avg_precision = digits;
        self
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub fn shared_spec(&self) -> Arc<QuerySpec> {
        self.spec.clone()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains_key(&self, key: &GroupKey) -> bool {
        self.groups.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.groups.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &GroupEntry)> {
        self.groups.iter()
    }

    /// Look up a group by its grouping-attribute values
    pub fn group(&self, values: &[Value]) -> Option<&GroupEntry> {
        self.groups.get(&GroupKey::from_values(values))
    }

    /// Finalized aggregate values of one group, keyed by `f_vect` identifier
    pub fn finalized_aggregates(&self, values: &[Value]) -> Option<Vec<(String, Value)>> {
        let entry = self.group(values)?;
        Some(
            self.spec
                .aggregates()
                .iter()
                .zip(entry.states.iter())
                .map(|(agg, state)| (agg.id.clone(), state.finalize()))
                .collect(),
        )
    }

    /// Build the group key of a row from the grouping attributes
    pub fn group_key(&self, row: &Row) -> Result<GroupKey> {
        let values = self
            .spec
            .grouping_attrs()
            .iter()
            .map(|attr| {
                row.get(attr).map(GroupValue::from).ok_or_else(|| {
                    EmfError::UnknownAttribute(format!("row has no grouping attribute '{}'", attr))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(GroupKey::new(values))
    }

    /// Fold one row that satisfied the condition of `scan_index` (0-based)
    ///
    /// On scan 0 an unseen key allocates a fresh group. The row then updates
    /// every aggregate whose identifier prefix is `scan_index + 1`. If any
    /// update fails the row is rejected and no state changes.
    pub fn process_tuple(&mut self, row: &Row, scan_index: usize) -> Result<TupleOutcome> {
        let key = self.group_key(row)?;

        if !self.groups.contains_key(&key) {
            if scan_index != 0 {
                return Ok(TupleOutcome::Ignored);
            }
            let values = self
                .spec
                .grouping_attrs()
                .iter()
                .map(|attr| row.get(attr).cloned().unwrap_or(Value::Null))
                .collect();
            let entry = GroupEntry::new(values, &self.spec);
            self.groups.insert(key.clone(), entry);
        }

        let entry = self
            .groups
            .get_mut(&key)
            .ok_or_else(|| EmfError::Internal(format!("group {} vanished", key)))?;

        let mut updates = Vec::new();
        for (i, agg) in self.spec.aggregates().iter().enumerate() {
            if agg.belongs_to_scan(scan_index) {
                let next = entry.states[i]
                    .update(row.get(&agg.field))
                    .map_err(|e| annotate(e, &agg.id))?;
                updates.push((i, next));
            }
        }
        for (i, next) in updates {
            entry.states[i] = next;
        }

        Ok(TupleOutcome::Updated)
    }

    /// Keep only the groups for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&GroupKey, &GroupEntry) -> bool) {
        self.groups.retain(|k, v| keep(k, v));
    }

    /// Project `select_attrs` for every group, sorted by grouping attributes
    ///
    /// Ordering uses the stored grouping values as text, untrimmed. Padded
    /// strings therefore sort by their padding.
    pub fn get_results(&self) -> Vec<ResultRow> {
        let mut keyed: Vec<(Vec<String>, &GroupKey, &GroupEntry)> = self
            .groups
            .iter()
            .map(|(k, e)| (e.values.iter().map(Value::to_string).collect(), k, e))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        keyed
            .into_iter()
            .map(|(_, _, entry)| self.project(entry))
            .collect()
    }

    fn project(&self, entry: &GroupEntry) -> ResultRow {
        let spec = &self.spec;
        let values = spec
            .select_attrs()
            .iter()
            .map(|attr| {
                let value = if let Some(pos) = spec.grouping_attrs().iter().position(|g| g == attr) {
                    entry.values[pos].clone()
                } else if let Some(idx) = spec.aggregate_index(attr) {
                    match entry.states[idx].finalize() {
                        Value::Float(v) if matches!(entry.states[idx], AggregateState::Avg { .. }) => {
                            Value::Float(round_to(v, self.avg_precision))
                        }
                        other => other,
                    }
                } else {
                    Value::Null
                };
                (attr.clone(), value)
            })
            .collect();
        ResultRow::new(values)
    }
}

fn annotate(err: EmfError, id: &str) -> EmfError {
    match err {
        EmfError::TypeMismatch(msg) => EmfError::TypeMismatch(format!("{}: {}", id, msg)),
        other => other,
    }
}

/// Round half to even at `digits` decimal places
fn round_to(v: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (v * factor).round_ties_even() / factor
}
