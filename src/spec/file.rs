//! Six-section query specification file reader
//!
//! ```text
//! SELECT ATTRIBUTE(S):
//! cust, 1_sum_quant, 2_sum_quant
//! NUMBER OF GROUPING VARIABLES(n):
//! 2
//! GROUPING ATTRIBUTES(V):
//! cust
//! F-VECT([F]):
//! 1_sum_quant, 2_sum_quant
//! SELECT CONDITION-VECT([C]):
//! 1.state='NY'
//! 2.state='NJ'
//! HAVING CLAUSE (G):
//! 1_sum_quant > 2_sum_quant
//! ```

use super::QuerySpec;
use crate::error::{EmfError, Result};
use std::path::Path;

pub const SECTION_SELECT: &str = "SELECT ATTRIBUTE(S):";
pub const SECTION_NUM_VARS: &str = "NUMBER OF GROUPING VARIABLES(n):";
pub const SECTION_GROUPING: &str = "GROUPING ATTRIBUTES(V):";
pub const SECTION_F_VECT: &str = "F-VECT([F]):";
pub const SECTION_CONDITIONS: &str = "SELECT CONDITION-VECT([C]):";
pub const SECTION_HAVING: &str = "HAVING CLAUSE (G):";

/// Read and validate a query specification file
pub fn parse_spec_file(path: impl AsRef<Path>) -> Result<QuerySpec> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    parse_spec_str(&contents)
}

/// Parse the six-section specification text
pub fn parse_spec_str(contents: &str) -> Result<QuerySpec> {
    let lines: Vec<&str> = contents.lines().map(str::trim).collect();

    let mut select = None;
    let mut num_vars = None;
    let mut grouping = None;
    let mut f_vect = None;
    let mut conditions: Option<Vec<String>> = None;
    let mut having = None;

    let mut idx = 0;
    while idx < lines.len() {
        match lines[idx] {
            SECTION_SELECT => {
                select = Some(value_after(&lines, idx, SECTION_SELECT)?);
                idx += 1;
            }
            SECTION_NUM_VARS => {
                num_vars = Some(value_after(&lines, idx, SECTION_NUM_VARS)?);
                idx += 1;
            }
            SECTION_GROUPING => {
                grouping = Some(value_after(&lines, idx, SECTION_GROUPING)?);
                idx += 1;
            }
            SECTION_F_VECT => {
                f_vect = Some(value_after(&lines, idx, SECTION_F_VECT)?);
                idx += 1;
            }
            SECTION_CONDITIONS => {
                let mut conds = Vec::new();
                while idx + 1 < lines.len() && lines[idx + 1] != SECTION_HAVING {
                    idx += 1;
                    conds.push(lines[idx].to_string());
                }
                conditions = Some(conds);
            }
            SECTION_HAVING => {
                having = Some(value_after(&lines, idx, SECTION_HAVING)?);
                idx += 1;
            }
            _ => {}
        }
        idx += 1;
    }

    let select = required(select, SECTION_SELECT)?;
    let num_vars = required(num_vars, SECTION_NUM_VARS)?;
    let grouping = required(grouping, SECTION_GROUPING)?;
    let f_vect = required(f_vect, SECTION_F_VECT)?;
    let conditions = required(conditions, SECTION_CONDITIONS)?;
    let having = required(having, SECTION_HAVING)?;

    QuerySpec::from_sections(select, num_vars, grouping, f_vect, conditions, having)
}

fn value_after<'a>(lines: &[&'a str], idx: usize, section: &str) -> Result<&'a str> {
    lines.get(idx + 1).copied().ok_or_else(|| {
        EmfError::InvalidSpecification(format!("section '{}' has no value", section))
    })
}

fn required<T>(value: Option<T>, section: &str) -> Result<T> {
    value.ok_or_else(|| EmfError::InvalidSpecification(format!("missing section '{}'", section)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregateKind;

    const SAMPLE: &str = "SELECT ATTRIBUTE(S):
cust, 1_count_quant, 2_sum_quant, 3_max_quant
NUMBER OF GROUPING VARIABLES(n):
3
GROUPING ATTRIBUTES(V):
cust
F-VECT([F]):
1_COUNT_quant, 2_sum_quant, 3_max_quant
SELECT CONDITION-VECT([C]):
1.state = 'NY'
2.state = 'NJ'
3.state = 'CT'
HAVING CLAUSE (G):
-
";

    #[test]
    fn test_parse_sample() {
        let spec = parse_spec_str(SAMPLE).unwrap();
        assert_eq!(spec.select_attrs().len(), 4);
        assert_eq!(spec.num_grouping_vars(), 3);
        assert_eq!(spec.grouping_attrs(), &["cust".to_string()]);
        assert_eq!(spec.aggregates()[0].id, "1_count_quant");
        assert_eq!(spec.aggregates()[2].kind, AggregateKind::Max);
        assert_eq!(spec.conditions()[2], "3.state = 'CT'");
        assert!(!spec.has_having());
    }

    #[test]
    fn test_display_round_trip() {
        let spec = parse_spec_str(SAMPLE).unwrap();
        let reparsed = parse_spec_str(&spec.to_string()).unwrap();
        assert_eq!(spec, reparsed);
    }

    #[test]
    fn test_missing_section() {
        let text = SAMPLE.replace("HAVING CLAUSE (G):\n-\n", "");
        let err = parse_spec_str(&text).unwrap_err();
        assert!(matches!(err, EmfError::InvalidSpecification(msg) if msg.contains("HAVING")));
    }

    #[test]
    fn test_condition_count_checked() {
        let text = SAMPLE.replace("3.state = 'CT'\n", "");
        assert!(parse_spec_str(&text).is_err());
    }

    #[test]
    fn test_blank_condition_line_matches_everything() {
        let text = SAMPLE.replace("2.state = 'NJ'\n", "\n");
        let spec = parse_spec_str(&text).unwrap();
        assert_eq!(spec.conditions().len(), 3);
        assert_eq!(spec.conditions()[1], "");
        assert_eq!(spec.conditions()[2], "3.state = 'CT'");
    }

    #[test]
    fn test_semicolon_inside_literal() {
        let text = SAMPLE.replace("2.state = 'NJ'", "2.prod = 'a;b'");
        let spec = parse_spec_str(&text).unwrap();
        assert_eq!(spec.conditions().len(), 3);
        assert_eq!(spec.conditions()[1], "2.prod = 'a;b'");
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("query.txt");
        std::fs::write(&path, SAMPLE).unwrap();
        let spec = parse_spec_file(&path).unwrap();
        assert_eq!(spec.num_grouping_vars(), 3);

        let err = parse_spec_file(dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, EmfError::Io(_)));
    }
}
