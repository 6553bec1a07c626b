//! Command-line support: interactive query entry and result output
//!
//! Provides:
//! - Completion of attribute names and aggregate identifiers
//! - Highlighting of conditions and HAVING clauses
//! - Prompted entry of the six query fields
//! - Output format options (table, CSV, JSON, vertical)

mod helper;
mod output;
mod prompt;

pub use helper::SpecHelper;
pub use output::{OutputFormat, OutputFormatter};
pub use prompt::{prompt_spec, EditorReader, LineReader, FIELD_PROMPTS};
