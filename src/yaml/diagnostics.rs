//! Diagnostics for entity files that fail to parse

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// An entity file that could not be read, pointing at the offending spot
#[derive(Debug, Error, Diagnostic)]
#[error("invalid entity file {filename}: {message}")]
#[diagnostic(code(partdb::yaml::syntax))]
pub struct YamlSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    filename: String,
    message: String,
}

impl YamlSyntaxError {
    pub fn from_serde_error(err: &serde_yml::Error, source: &str, filename: &str) -> Self {
        let offset = err
            .location()
            .map(|loc| byte_offset(source, loc.line(), loc.column()))
            .unwrap_or(0);
        let message = err.to_string();

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1).min(source.len().max(1))),
            help: hint(&message),
            filename: filename.to_string(),
            message,
        }
    }

    /// Parser message without the file name
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Byte offset of a 1-based line/column, clamped to the source
fn byte_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let rest = &source[line_start.min(source.len())..];
    let within = rest
        .char_indices()
        .take_while(|(_, c)| *c != '\n')
        .nth(column.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    (line_start + within).min(source.len())
}

/// Suggest a fix for messages we see often in hand-edited entity files
fn hint(message: &str) -> Option<String> {
    let lower = message.to_lowercase();
    let hint = if lower.contains("missing field `id`") {
        "Every entity needs an `id`; restore it from version control or recreate the entity"
    } else if lower.contains("missing field") {
        "A required field was removed; compare with a file created by `partdb`"
    } else if lower.contains("unknown variant") {
        "Check the spelling of enumerated values such as `status` (draft, planning, in_production, finished, archived)"
    } else if lower.contains("invalid type") && lower.contains("amount") {
        "Amounts are plain numbers, e.g. `amount: 12` or `amount: 0.5`"
    } else if lower.contains("tab") {
        "Indent with spaces, not tabs"
    } else if lower.contains("duplicate key") {
        "A key appears twice in the same mapping"
    } else if lower.contains("mapping values are not allowed") {
        "Quote values that contain ':'"
    } else {
        return None;
    };
    Some(hint.to_string())
}
