//! Scan orchestration
//!
//! `EmfContext` runs one full scan of the row source per grouping variable,
//! feeding rows that satisfy that variable's condition into the H-table, then
//! applies HAVING and materializes the result.

mod results;

pub use results::*;

use crate::catalog::SchemaCatalog;
use crate::error::Result;
use crate::having::{HavingEvaluator, HavingPolicy};
use crate::mf::{MfStructure, TupleOutcome, DEFAULT_AVG_PRECISION};
use crate::predicate::Predicate;
use crate::source::RowSource;
use crate::spec::{QuerySpec, NO_CLAUSE};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// What happens to groups whose HAVING predicate cannot be evaluated
    pub having_policy: HavingPolicy,
    /// Decimal digits averages are rounded to in results
    pub avg_precision: u32,
    /// Attribute types used to coerce condition literals
    pub catalog: SchemaCatalog,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            having_policy: HavingPolicy::default(),
            avg_precision: DEFAULT_AVG_PRECISION,
            catalog: SchemaCatalog::sales(),
        }
    }
}

/// Counters for one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// 1-based grouping variable number
    pub scan: usize,
    pub condition: String,
    pub rows_read: usize,
    /// Rows that satisfied the condition, including ignored ones
    pub rows_matched: usize,
    /// Matching rows whose group was not created by the first scan
    pub rows_ignored: usize,
    /// Rows skipped because evaluation or aggregation failed
    pub rows_rejected: usize,
    pub elapsed: Duration,
}

/// Entry point for running EMF queries
#[derive(Debug, Clone, Default)]
pub struct EmfContext {
    config: EngineConfig,
}

impl EmfContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn with_having_policy(mut self, policy: HavingPolicy) -> Self {
        self.config.having_policy = policy;
        self
    }

    pub fn with_avg_precision(mut self, digits: u32) -> Self {
        self.config.avg_precision = digits;
        self
    }

    pub fn with_catalog(mut self, catalog: SchemaCatalog) -> Self {
        self.config.catalog = catalog;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every scan and return the populated H-table, before HAVING
    pub fn run(
        &self,
        source: &dyn RowSource,
        spec: impl Into<Arc<QuerySpec>>,
    ) -> Result<MfStructure> {
        let (mf, _) = self.run_scans(source, spec.into())?;
        Ok(mf)
    }

    /// Run the full query: scans, HAVING and materialization
    pub fn execute(
        &self,
        source: &dyn RowSource,
        spec: impl Into<Arc<QuerySpec>>,
    ) -> Result<QueryResult> {
        let spec = spec.into();
        let total_start = Instant::now();
        let mut metrics = QueryMetrics::default();

        let scan_start = Instant::now();
        let (mut mf, scan_stats) = self.run_scans(source, spec.clone())?;
        metrics.scan_time = scan_start.elapsed();

        let having_start = Instant::now();
        let having_stats =
            HavingEvaluator::new(spec.having(), self.config.having_policy).apply(&mut mf);
        metrics.having_time = having_start.elapsed();

        let materialize_start = Instant::now();
        let rows = mf.get_results();
        metrics.materialize_time = materialize_start.elapsed();
        metrics.total_time = total_start.elapsed();

        debug!(
            groups = rows.len(),
            total_ms = metrics.total_time.as_millis() as u64,
            "query finished"
        );

        Ok(QueryResult {
            columns: spec.select_attrs().to_vec(),
            rows,
            scan_stats,
            having_stats,
            metrics,
        })
    }

    fn run_scans(
        &self,
        source: &dyn RowSource,
        spec: Arc<QuerySpec>,
    ) -> Result<(MfStructure, Vec<ScanStats>)> {
        let mut mf =
            MfStructure::new(spec.clone()).with_avg_precision(self.config.avg_precision);
        let mut all_stats = Vec::with_capacity(spec.num_grouping_vars());

        for scan_index in 0..spec.num_grouping_vars() {
            let condition = spec.condition(scan_index).unwrap_or(NO_CLAUSE);
            let stats = self.scan_once(source, &mut mf, scan_index, condition)?;
            debug!(
                scan = stats.scan,
                condition,
                rows_read = stats.rows_read,
                matched = stats.rows_matched,
                ignored = stats.rows_ignored,
                rejected = stats.rows_rejected,
                groups = mf.len(),
                "scan complete"
            );
            all_stats.push(stats);
        }

        Ok((mf, all_stats))
    }

    fn scan_once(
        &self,
        source: &dyn RowSource,
        mf: &mut MfStructure,
        scan_index: usize,
        condition: &str,
    ) -> Result<ScanStats> {
        let start = Instant::now();
        let mut stats = ScanStats {
            scan: scan_index + 1,
            condition: condition.to_string(),
            ..Default::default()
        };

        // An unparseable condition matches nothing; every row is rejected
        let predicate = match Predicate::parse(condition) {
            Ok(predicate) => Some(predicate),
            Err(error) => {
                warn!(scan = stats.scan, condition, %error, "condition could not be parsed");
                None
            }
        };

        for row in source.scan()? {
            let row = row?;
            stats.rows_read += 1;

            let Some(predicate) = &predicate else {
                stats.rows_rejected += 1;
                continue;
            };

            let outcome = predicate
                .evaluate(&row, &self.config.catalog)
                .and_then(|matched| {
                    if matched {
                        mf.process_tuple(&row, scan_index).map(Some)
                    } else {
                        Ok(None)
                    }
                });

            match outcome {
                Ok(None) => {}
                Ok(Some(TupleOutcome::Updated)) => stats.rows_matched += 1,
                Ok(Some(TupleOutcome::Ignored)) => {
                    stats.rows_matched += 1;
                    stats.rows_ignored += 1;
                }
                Err(error) if error.is_row_level() => {
                    stats.rows_rejected += 1;
                    warn!(scan = stats.scan, row = stats.rows_read, %error, "row rejected");
                }
                Err(error) => return Err(error),
            }
        }

        stats.elapsed = start.elapsed();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Row, Value};
    use crate::error::EmfError;
    use crate::source::{MemoryRowSource, RowIter};

    fn sale(cust: &str, state: &str, quant: i64) -> Row {
        Row::new()
            .with("cust", cust)
            .with("state", state)
            .with("quant", quant)
    }

    fn spec(having: &str) -> QuerySpec {
        QuerySpec::try_new(
            vec!["cust", "1_count_quant", "2_sum_quant", "2_avg_quant"],
            2,
            vec!["cust"],
            vec!["1_count_quant", "2_sum_quant", "2_avg_quant"],
            vec!["1.state='NY'", "2.state='NJ'"],
            having,
        )
        .unwrap()
    }

    fn source() -> MemoryRowSource {
        MemoryRowSource::new(vec![
            sale("A", "NY", 10),
            sale("A", "NJ", 5),
            sale("B", "NY", 7),
        ])
    }

    #[test]
    fn test_run_populates_h_table() {
        let mf = EmfContext::new().run(&source(), spec("-")).unwrap();
        assert_eq!(mf.len(), 2);
        let aggs = mf.finalized_aggregates(&[Value::from("A")]).unwrap();
        assert_eq!(aggs[0], ("1_count_quant".to_string(), Value::Int(1)));
        assert_eq!(aggs[1], ("2_sum_quant".to_string(), Value::Int(5)));
    }

    #[test]
    fn test_execute_collects_stats() {
        let mut rows = source();
        rows.push(sale("C", "NJ", 3));
        let result = EmfContext::new().execute(&rows, spec("-")).unwrap();

        assert_eq!(result.row_count(), 2);
        assert_eq!(result.scan_stats.len(), 2);
        assert_eq!(result.scan_stats[0].rows_read, 4);
        assert_eq!(result.scan_stats[0].rows_matched, 2);
        assert_eq!(result.scan_stats[1].rows_matched, 2);
        assert_eq!(result.scan_stats[1].rows_ignored, 1);
        assert_eq!(result.having_stats.retained, 2);
    }

    #[test]
    fn test_type_mismatch_rejects_row() {
        let mut rows = source();
        rows.push(
            Row::new()
                .with("cust", "A")
                .with("state", "NJ")
                .with("quant", "lots"),
        );
        let result = EmfContext::new().execute(&rows, spec("-")).unwrap();

        assert_eq!(result.scan_stats[1].rows_rejected, 1);
        // The rejected row left A's scan-2 aggregates untouched
        assert_eq!(result.rows[0].get("2_sum_quant"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_malformed_condition_matches_nothing() {
        let spec = QuerySpec::try_new(
            vec!["cust", "1_count_quant", "2_count_quant"],
            2,
            vec!["cust"],
            vec!["1_count_quant", "2_count_quant"],
            vec!["-", "state NJ"],
            "-",
        )
        .unwrap();
        let result = EmfContext::new().execute(&source(), spec).unwrap();

        assert_eq!(result.row_count(), 2);
        assert_eq!(result.scan_stats[1].rows_rejected, 3);
        assert_eq!(result.rows[0].get("2_count_quant"), Some(&Value::Int(0)));
    }

    #[test]
    fn test_having_policy_from_config() {
        let open = EmfContext::new().execute(&source(), spec("9_sum_quant > 1")).unwrap();
        assert_eq!(open.row_count(), 2);

        let closed = EmfContext::new()
            .with_having_policy(HavingPolicy::FailClosed)
            .execute(&source(), spec("9_sum_quant > 1"))
            .unwrap();
        assert_eq!(closed.row_count(), 0);
        assert_eq!(closed.having_stats.failed, 2);
    }

    #[derive(Debug)]
    struct FailingSource;

    impl RowSource for FailingSource {
        fn scan(&self) -> Result<RowIter<'_>> {
            let rows = vec![
                Ok(sale("A", "NY", 1)),
                Err(EmfError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "truncated",
                ))),
            ];
            Ok(Box::new(rows.into_iter()))
        }
    }

    #[test]
    fn test_source_error_is_fatal() {
        let err = EmfContext::new().execute(&FailingSource, spec("-")).unwrap_err();
        assert!(matches!(err, EmfError::Io(_)));
    }
}
