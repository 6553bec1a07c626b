//! Interactive entry of the six query fields

use super::SpecHelper;
use crate::catalog::SchemaCatalog;
use crate::error::{EmfError, Result};
use crate::spec::QuerySpec;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::collections::VecDeque;

/// The prompts, in the order the fields are read
pub const FIELD_PROMPTS: [&str; 6] = [
    "SELECT ATTRIBUTE(S) (comma-separated): ",
    "NUMBER OF GROUPING VARIABLES(n): ",
    "GROUPING ATTRIBUTES(V) (comma-separated): ",
    "F-VECT([F]) (comma-separated): ",
    "SELECT CONDITION-VECT([C]) (';'-separated, '-' for none): ",
    "HAVING CLAUSE (G) ('-' for none): ",
];

/// Source of prompted lines; `None` means the user ended input
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Line reader backed by a rustyline editor with history
pub struct EditorReader {
    editor: Editor<SpecHelper, DefaultHistory>,
}

impl EditorReader {
    pub fn new(catalog: &SchemaCatalog) -> Result<Self> {
        let mut editor: Editor<SpecHelper, DefaultHistory> =
            Editor::new().map_err(readline_error)?;
        editor.set_helper(Some(SpecHelper::new(catalog)));
        Ok(Self { editor })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(readline_error(e)),
        }
    }
}

/// Scripted answers, mainly for tests and piped input
impl LineReader for VecDeque<String> {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        Ok(self.pop_front())
    }
}

/// Ask for the six fields and validate them into a query
///
/// Returns `Ok(None)` when input ends before every field is answered.
pub fn prompt_spec(reader: &mut dyn LineReader) -> Result<Option<QuerySpec>> {
    let mut answers = Vec::with_capacity(FIELD_PROMPTS.len());
    for prompt in FIELD_PROMPTS {
        match reader.read_line(prompt)? {
            Some(line) => answers.push(line),
            None => return Ok(None),
        }
    }

    QuerySpec::from_delimited(
        &answers[0],
        &answers[1],
        &answers[2],
        &answers[3],
        &answers[4],
        &answers[5],
    )
    .map(Some)
}

fn readline_error(e: ReadlineError) -> EmfError {
    match e {
        ReadlineError::Io(io) => EmfError::Io(io),
        other => EmfError::Internal(format!("line editor: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(lines: &[&str]) -> VecDeque<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_prompt_builds_spec() {
        let mut reader = script(&[
            "cust, 1_sum_quant, 2_avg_quant",
            "2",
            "cust",
            "1_sum_quant, 2_AVG_quant",
            "1.state='NY'; 2.state='NJ'",
            "-",
        ]);
        let spec = prompt_spec(&mut reader).unwrap().unwrap();

        assert_eq!(spec.num_grouping_vars(), 2);
        assert_eq!(spec.conditions(), ["1.state='NY'", "2.state='NJ'"]);
        assert_eq!(spec.f_vect().collect::<Vec<_>>(), vec!["1_sum_quant", "2_avg_quant"]);
        assert!(!spec.has_having());
    }

    #[test]
    fn test_prompt_ends_early() {
        let mut reader = script(&["cust", "1"]);
        assert!(prompt_spec(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_prompt_rejects_invalid_spec() {
        let mut reader = script(&["cust", "two", "cust", "1_sum_quant", "-", "-"]);
        let err = prompt_spec(&mut reader).unwrap_err();
        assert!(matches!(err, EmfError::InvalidSpecification(_)));
    }
}
