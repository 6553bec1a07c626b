//! Output formatting for query results
//!
//! Supports multiple output formats:
//! - Table: Pretty-printed ASCII table (default)
//! - CSV: Comma-separated values
//! - JSON: JSON array of objects
//! - Vertical: One column per line (useful for wide results)

use crate::catalog::Value;
use crate::engine::QueryResult;
use crate::mf::ResultRow;
use std::io::{self, Write};
use std::str::FromStr;

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Pretty-printed ASCII table
    #[default]
    Table,
    /// Comma-separated values
    Csv,
    /// JSON array of objects
    Json,
    /// Vertical format (one column per line)
    Vertical,
}

impl OutputFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Vertical => "vertical",
        }
    }

    /// Get all format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &["table", "csv", "json", "vertical"]
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "t" => Ok(Self::Table),
            "csv" | "c" => Ok(Self::Csv),
            "json" | "j" => Ok(Self::Json),
            "vertical" | "v" => Ok(Self::Vertical),
            other => Err(format!(
                "unknown format '{}' (expected one of: {})",
                other,
                Self::all_names().join(", ")
            )),
        }
    }
}

/// Writes a `QueryResult` in one of the supported formats
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    format: OutputFormat,
    max_rows: Option<usize>,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            max_rows: None,
        }
    }

    /// Set maximum rows to display
    pub fn with_max_rows(mut self, max: usize) -> Self {
        self.max_rows = Some(max);
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn set_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    /// Format the result and write to stdout
    pub fn print(&self, result: &QueryResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        self.write(&mut stdout, result)
    }

    pub fn write<W: Write>(&self, writer: &mut W, result: &QueryResult) -> io::Result<()> {
        match self.format {
            OutputFormat::Table => self.write_table(writer, result),
            OutputFormat::Csv => self.write_csv(writer, result),
            OutputFormat::Json => self.write_json(writer, result),
            OutputFormat::Vertical => self.write_vertical(writer, result),
        }
    }

    pub fn format_to_string(&self, result: &QueryResult) -> String {
        let mut buffer = Vec::new();
        let _ = self.write(&mut buffer, result);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Per-scan counters and timings, one line each
    pub fn write_summary<W: Write>(&self, writer: &mut W, result: &QueryResult) -> io::Result<()> {
        for scan in &result.scan_stats {
            writeln!(
                writer,
                "scan {} [{}]: {} read, {} matched, {} ignored, {} rejected in {:?}",
                scan.scan,
                scan.condition,
                scan.rows_read,
                scan.rows_matched,
                scan.rows_ignored,
                scan.rows_rejected,
                scan.elapsed
            )?;
        }
        let having = &result.having_stats;
        writeln!(
            writer,
            "having: {} evaluated, {} retained, {} dropped, {} failed",
            having.evaluated, having.retained, having.dropped, having.failed
        )?;
        writeln!(
            writer,
            "{} row(s) in {:?} (scans {:?}, having {:?}, materialize {:?})",
            result.row_count(),
            result.metrics.total_time,
            result.metrics.scan_time,
            result.metrics.having_time,
            result.metrics.materialize_time
        )
    }

    fn visible_rows<'a>(&self, result: &'a QueryResult) -> &'a [ResultRow] {
        match self.max_rows {
            Some(max) if max < result.rows.len() => &result.rows[..max],
            _ => &result.rows,
        }
    }

    /// Write as pretty-printed table
    fn write_table<W: Write>(&self, writer: &mut W, result: &QueryResult) -> io::Result<()> {
        let batch = result.to_record_batch().map_err(io::Error::other)?;
        let shown = self.visible_rows(result).len();
        let batch = batch.slice(0, shown);

        let display = arrow::util::pretty::pretty_format_batches(&[batch])
            .map_err(io::Error::other)?;
        writeln!(writer, "{}", display)?;

        if shown < result.row_count() {
            writeln!(writer, "... ({} more rows)", result.row_count() - shown)?;
        }
        Ok(())
    }

    /// Write as CSV
    fn write_csv<W: Write>(&self, writer: &mut W, result: &QueryResult) -> io::Result<()> {
        writeln!(writer, "{}", result.columns.join(","))?;
        for row in self.visible_rows(result) {
            let values: Vec<String> = result
                .columns
                .iter()
                .map(|c| csv_value(row.get(c)))
                .collect();
            writeln!(writer, "{}", values.join(","))?;
        }
        Ok(())
    }

    /// Write as JSON array of objects
    fn write_json<W: Write>(&self, writer: &mut W, result: &QueryResult) -> io::Result<()> {
        let rows = self.visible_rows(result);
        if rows.is_empty() {
            return writeln!(writer, "[]");
        }

        writeln!(writer, "[")?;
        for (i, row) in rows.iter().enumerate() {
            let fields: Vec<String> = result
                .columns
                .iter()
                .map(|c| format!("{}: {}", json_string(c), json_value(row.get(c))))
                .collect();
            let separator = if i + 1 < rows.len() { "," } else { "" };
            writeln!(writer, "  {{{}}}{}", fields.join(", "), separator)?;
        }
        writeln!(writer, "]")
    }

    /// Write in vertical format (one column per line)
    fn write_vertical<W: Write>(&self, writer: &mut W, result: &QueryResult) -> io::Result<()> {
        let width = result.columns.iter().map(|c| c.len()).max().unwrap_or(0);

        for (i, row) in self.visible_rows(result).iter().enumerate() {
            writeln!(writer, "*************************** {} ***************************", i + 1)?;
            for column in &result.columns {
                let value = row.get(column).unwrap_or(&Value::Null);
                writeln!(writer, "{:>width$}: {}", column, value, width = width)?;
            }
        }
        Ok(())
    }
}

fn csv_value(value: Option<&Value>) -> String {
    let value = match value {
        None | Some(Value::Null) => return String::new(),
        Some(v) => v.to_string(),
    };

    // Quote if contains comma, quote, or newline
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

fn json_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn json_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::Int(v)) => v.to_string(),
        Some(Value::Float(v)) if v.is_finite() => v.to_string(),
        Some(Value::Float(_)) => "null".to_string(),
        Some(v) => json_string(&v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::having::HavingStats;
    use crate::engine::QueryMetrics;

    fn result() -> QueryResult {
        let row = |cust: &str, sum: Value| {
            ResultRow::new(vec![
                ("cust".to_string(), Value::from(cust)),
                ("1_sum_quant".to_string(), sum),
            ])
        };
        QueryResult {
            columns: vec!["cust".into(), "1_sum_quant".into()],
            rows: vec![
                row("Sam", Value::Int(12)),
                row("Bloom, Jr", Value::Int(3)),
                row("Helen", Value::Null),
            ],
            scan_stats: vec![],
            having_stats: HavingStats::default(),
            metrics: QueryMetrics::default(),
        }
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert_eq!("TABLE".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert_eq!("c".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("v".parse::<OutputFormat>(), Ok(OutputFormat::Vertical));
        assert!("invalid".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_csv_output() {
        let output = OutputFormatter::new(OutputFormat::Csv).format_to_string(&result());

        assert!(output.starts_with("cust,1_sum_quant\n"));
        assert!(output.contains("Sam,12\n"));
        assert!(output.contains("\"Bloom, Jr\",3\n"));
        assert!(output.contains("Helen,\n"));
    }

    #[test]
    fn test_json_output() {
        let output = OutputFormatter::new(OutputFormat::Json).format_to_string(&result());

        assert!(output.starts_with("[\n"));
        assert!(output.contains("{\"cust\": \"Sam\", \"1_sum_quant\": 12},"));
        assert!(output.contains("\"1_sum_quant\": null}"));
        assert!(output.trim_end().ends_with(']'));
    }

    #[test]
    fn test_vertical_output() {
        let output = OutputFormatter::new(OutputFormat::Vertical).format_to_string(&result());

        assert!(output.contains("*** 1 ***"));
        assert!(output.contains("*** 3 ***"));
        assert!(output.contains("       cust: Sam"));
        assert!(output.contains("1_sum_quant: NULL"));
    }

    #[test]
    fn test_table_output() {
        let output = OutputFormatter::new(OutputFormat::Table).format_to_string(&result());

        assert!(output.contains("+"));
        assert!(output.contains("1_sum_quant"));
        assert!(output.contains("Sam"));
    }

    #[test]
    fn test_max_rows() {
        let csv = OutputFormatter::new(OutputFormat::Csv)
            .with_max_rows(2)
            .format_to_string(&result());
        assert_eq!(csv.lines().count(), 3);

        let table = OutputFormatter::new(OutputFormat::Table)
            .with_max_rows(1)
            .format_to_string(&result());
        assert!(table.contains("... (2 more rows)"));
        assert!(!table.contains("Helen"));
    }

    #[test]
    fn test_empty_result() {
        let mut empty = result();
        empty.rows.clear();

        let json = OutputFormatter::new(OutputFormat::Json).format_to_string(&empty);
        assert_eq!(json.trim(), "[]");

        let csv = OutputFormatter::new(OutputFormat::Csv).format_to_string(&empty);
        assert_eq!(csv, "cust,1_sum_quant\n");
    }

    #[test]
    fn test_summary() {
        let mut buffer = Vec::new();
        OutputFormatter::default()
            .write_summary(&mut buffer, &result())
            .unwrap();
        let summary = String::from_utf8(buffer).unwrap();
        assert!(summary.contains("3 row(s)"));
        assert!(summary.contains("having: 0 evaluated"));
    }
}
