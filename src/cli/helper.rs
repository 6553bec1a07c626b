//! Line-editor helper for interactive query entry: completion of attribute
//! names and aggregate identifiers, plus highlighting of conditions

use crate::aggregate::AggregateKind;
use crate::catalog::SchemaCatalog;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::borrow::Cow;

/// Aggregate kinds offered after `<scan>_`
const AGGREGATE_NAMES: [AggregateKind; 5] = [
    AggregateKind::Count,
    AggregateKind::Sum,
    AggregateKind::Max,
    AggregateKind::Min,
    AggregateKind::Avg,
];

/// Connectives highlighted in conditions and HAVING
const KEYWORDS: &[&str] = &["and", "or", "not"];

#[derive(Debug, Clone)]
pub struct SpecHelper {
    attributes: Vec<String>,
    highlighting_enabled: bool,
}

impl SpecHelper {
    pub fn new(catalog: &SchemaCatalog) -> Self {
        let mut attributes: Vec<String> = catalog.names().map(str::to_string).collect();
        attributes.sort();
        Self {
            attributes,
            highlighting_enabled: true,
        }
    }

    pub fn set_highlighting(&mut self, enabled: bool) {
        self.highlighting_enabled = enabled;
    }

    /// Candidates for the word under the cursor
    ///
    /// `2_s` completes to aggregate kinds (`2_sum_`), `2_sum_q` to attribute
    /// names (`2_sum_quant`), anything else to attribute names and keywords.
    fn get_completions(&self, word: &str) -> Vec<Pair> {
        let parts: Vec<&str> = word.splitn(3, '_').collect();
        let is_scan = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

        let candidates: Vec<String> = match parts.as_slice() {
            [scan, kind] if is_scan(*scan) => AGGREGATE_NAMES
                .iter()
                .map(|k| k.name())
                .filter(|name| name.starts_with(&kind.to_lowercase()))
                .map(|name| format!("{}_{}_", scan, name))
                .collect(),
            [scan, kind, field] if is_scan(*scan) => self
                .attributes
                .iter()
                .filter(|attr| attr.starts_with(*field))
                .map(|attr| format!("{}_{}_{}", scan, kind, attr))
                .collect(),
            _ => {
                let lower = word.to_lowercase();
                self.attributes
                    .iter()
                    .map(String::as_str)
                    .chain(KEYWORDS.iter().copied())
                    .filter(|name| !word.is_empty() && name.starts_with(&lower))
                    .map(str::to_string)
                    .collect()
            }
        };

        candidates
            .into_iter()
            .map(|c| Pair {
                display: c.clone(),
                replacement: c,
            })
            .collect()
    }

    fn is_keyword(word: &str) -> bool {
        KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(word))
    }

    /// `<digits>_<kind>_...`
    fn is_aggregate_id(word: &str) -> bool {
        let mut parts = word.splitn(3, '_');
        let scan = parts.next().unwrap_or_default();
        let kind = parts.next().unwrap_or_default();
        !scan.is_empty()
            && scan.chars().all(|c| c.is_ascii_digit())
            && parts.next().is_some()
            && kind.parse::<AggregateKind>().is_ok()
    }
}

impl Completer for SpecHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_to_cursor = &line[..pos];
        let word_start = line_to_cursor
            .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
            .map(|i| i + 1)
            .unwrap_or(0);

        Ok((word_start, self.get_completions(&line[word_start..pos])))
    }
}

impl Highlighter for SpecHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if !self.highlighting_enabled || line.trim().is_empty() {
            return Cow::Borrowed(line);
        }

        let mut result = String::with_capacity(line.len() * 2);
        let mut chars = line.chars().peekable();
        let mut in_string = false;
        let mut quote = '\'';

        while let Some(c) = chars.next() {
            if in_string {
                result.push(c);
                if c == quote {
                    result.push_str("\x1b[0m");
                    in_string = false;
                }
            } else if c == '\'' || c == '"' {
                // String literal - green
                in_string = true;
                quote = c;
                result.push_str("\x1b[32m");
                result.push(c);
            } else if c.is_alphanumeric() || c == '_' {
                let mut word = String::from(c);
                while let Some(&nc) = chars.peek() {
                    if nc.is_alphanumeric() || nc == '_' {
                        word.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }

                if Self::is_aggregate_id(&word) {
                    // Aggregate - yellow
                    result.push_str(&format!("\x1b[33m{}\x1b[0m", word));
                } else if Self::is_keyword(&word) {
                    // Connective - bold blue
                    result.push_str(&format!("\x1b[1;34m{}\x1b[0m", word));
                } else if word.chars().all(|ch| ch.is_ascii_digit()) {
                    // Number - magenta
                    result.push_str(&format!("\x1b[35m{}\x1b[0m", word));
                } else {
                    result.push_str(&word);
                }
            } else {
                result.push(c);
            }
        }

        if in_string {
            result.push_str("\x1b[0m");
        }

        Cow::Owned(result)
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        Cow::Owned(format!("\x1b[1;36m{}\x1b[0m", prompt))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        self.highlighting_enabled
    }
}

impl Hinter for SpecHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Validator for SpecHelper {}

impl Helper for SpecHelper {}

#[cfg(test)]
mod tests {
    use super::*;

    fn helper() -> SpecHelper {
        SpecHelper::new(&SchemaCatalog::sales())
    }

    fn replacements(word: &str) -> Vec<String> {
        helper()
            .get_completions(word)
            .into_iter()
            .map(|p| p.replacement)
            .collect()
    }

    #[test]
    fn test_attribute_completions() {
        assert_eq!(replacements("cu"), vec!["cust"]);
        assert_eq!(replacements("an"), vec!["and"]);
        assert!(replacements("").is_empty());
    }

    #[test]
    fn test_aggregate_completions() {
        assert_eq!(replacements("2_m"), vec!["2_max_", "2_min_"]);
        assert_eq!(replacements("1_sum_q"), vec!["1_sum_quant"]);
        assert_eq!(replacements("1_avg_").len(), 8);
    }

    #[test]
    fn test_aggregate_detection() {
        assert!(SpecHelper::is_aggregate_id("1_sum_quant"));
        assert!(SpecHelper::is_aggregate_id("12_AVG_quant"));
        assert!(!SpecHelper::is_aggregate_id("1_median_quant"));
        assert!(!SpecHelper::is_aggregate_id("quant"));
        assert!(!SpecHelper::is_aggregate_id("1_sum"));
    }

    #[test]
    fn test_highlighting() {
        let h = helper();
        let line = h.highlight("1.state='NY' and 1_sum_quant > 10", 0);
        assert!(line.contains("\x1b[32m'NY'"));
        assert!(line.contains("\x1b[1;34mand"));
        assert!(line.contains("\x1b[33m1_sum_quant"));
        assert!(line.contains("\x1b[35m10"));

        let mut plain = helper();
        plain.set_highlighting(false);
        assert_eq!(plain.highlight("state='NY'", 0), "state='NY'");
    }
}
