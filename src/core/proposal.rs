//! Proposals: validating an assistant reply into a candidate dataset
//!
//! The assistant itself lives outside this crate. What arrives here is its
//! reply, a JSON document carrying a chat message and optionally a whole new
//! dataset. The reply is untrusted: it is checked for shape, marker keys are
//! stripped and new columns are admitted or refused per [`ColumnPolicy`].

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::dataset::{CellValue, Dataset, Row};
use crate::core::preview::{ADDED_MARKER, MODIFIED_MARKER};
use crate::core::staging::{Staged, StagingError, StagingStore};

/// How a candidate may extend the column list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColumnPolicy {
    /// New columns are appended to the dataset's column list
    #[default]
    Extend,
    /// New columns make the candidate invalid
    Reject,
}

impl std::fmt::Display for ColumnPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnPolicy::Extend => write!(f, "extend"),
            ColumnPolicy::Reject => write!(f, "reject"),
        }
    }
}

/// An assistant reply
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub message: String,
    /// `None` means the reply carries no data change
    pub candidate: Option<Dataset>,
}

/// Source of proposals
pub trait ProposalService {
    fn propose(&mut self, original: &Dataset, instruction: &str) -> Result<Proposal, ProposalError>;
}

/// Errors produced while obtaining or validating a proposal
#[derive(Debug, Error, Diagnostic)]
pub enum ProposalError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] CandidateSyntaxError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Staging(#[from] StagingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON syntax error in a reply, pointing at the failing location
#[derive(Debug, Error, Diagnostic)]
#[error("Reply is not valid JSON: {message}")]
#[diagnostic(code(fmeca::proposal::syntax))]
pub struct CandidateSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    message: String,
}

impl CandidateSyntaxError {
    pub fn from_serde_error(err: &serde_json::Error, source: &str, filename: &str) -> Self {
        let offset = line_col_to_offset(source, err.line(), err.column());
        let message = err.to_string();

        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            help: generate_help(&message),
            message,
        }
    }
}

/// Convert a 1-based line/column to a byte offset, clamped to the source
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let mut line_start = 0;
    for (current, text) in source.split_inclusive('\n').enumerate() {
        if current + 1 == line {
            let col = column.saturating_sub(1).min(text.len().saturating_sub(1));
            return line_start + col;
        }
        line_start += text.len();
    }
    source.len().saturating_sub(1)
}

fn generate_help(message: &str) -> Option<String> {
    let msg = message.to_lowercase();

    if msg.contains("trailing comma") {
        return Some("Remove the comma after the last element".to_string());
    }
    if msg.contains("eof while parsing") {
        return Some("The reply looks truncated; check that every [ and { is closed".to_string());
    }
    if msg.contains("key must be a string") {
        return Some("Object keys must be double-quoted strings".to_string());
    }
    if msg.contains("expected value") {
        return Some("Strings must use double quotes; null, true and false are lowercase".to_string());
    }

    None
}

/// Validate a JSON candidate against the original dataset's columns.
///
/// The candidate must be an array of flat objects. `null` cells are treated
/// as absent, booleans become text and the UI's marker keys are dropped.
/// The resulting column list is the original one followed by any new columns
/// in first-seen order.
pub fn parse_candidate(
    value: &Value,
    original_columns: &[String],
    policy: ColumnPolicy,
) -> Result<Dataset, StagingError> {
    let Value::Array(items) = value else {
        return Err(StagingError::MalformedCandidate {
            reason: format!("expected an array of row objects, found {}", json_kind(value)),
        });
    };

    let mut rows = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Value::Object(fields) = item else {
            return Err(StagingError::MalformedCandidate {
                reason: format!("row {} is {}, not an object", index, json_kind(item)),
            });
        };

        let mut row = Row::new();
        for (column, cell) in fields {
            if column == ADDED_MARKER || column == MODIFIED_MARKER {
                continue;
            }
            let value = match cell {
                Value::Null => continue,
                Value::String(s) => CellValue::Text(s.clone()),
                Value::Bool(b) => CellValue::Text(b.to_string()),
                Value::Number(n) => CellValue::from(n),
                Value::Array(_) | Value::Object(_) => {
                    return Err(StagingError::MalformedCandidate {
                        reason: format!("row {} column '{}' holds a nested value", index, column),
                    });
                }
            };
            row.set(column.as_str(), value);
        }
        rows.push(row);
    }

    let mut dataset = Dataset::new(original_columns.to_vec(), rows);
    let new_columns = dataset.undeclared_columns();
    if !new_columns.is_empty() && policy == ColumnPolicy::Reject {
        return Err(StagingError::UnknownColumns {
            columns: new_columns,
        });
    }
    dataset.adopt_row_columns();

    debug!(rows = dataset.len(), columns = dataset.columns.len(), "validated candidate");
    Ok(dataset)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse a reply document.
///
/// Accepts either `{"message": ..., "candidate": [...]}` or a bare array of
/// rows. A missing or `null` candidate means no data change.
pub fn parse_reply(
    source: &str,
    filename: &str,
    original_columns: &[String],
    policy: ColumnPolicy,
) -> Result<Proposal, ProposalError> {
    let value: Value = serde_json::from_str(source)
        .map_err(|e| CandidateSyntaxError::from_serde_error(&e, source, filename))?;

    match value {
        Value::Array(_) => Ok(Proposal {
            message: String::new(),
            candidate: Some(parse_candidate(&value, original_columns, policy)?),
        }),
        Value::Object(mut reply) => {
            let message = match reply.remove("message") {
                Some(Value::String(s)) => s,
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let candidate = match reply.remove("candidate") {
                None | Some(Value::Null) => None,
                Some(candidate) => Some(parse_candidate(&candidate, original_columns, policy)?),
            };
            Ok(Proposal { message, candidate })
        }
        other => Err(StagingError::MalformedCandidate {
            reason: format!(
                "expected a reply object or an array of rows, found {}",
                json_kind(&other)
            ),
        }
        .into()),
    }
}

/// Proposal service backed by a reply file already written by the assistant
#[derive(Debug, Clone)]
pub struct ReplyFile {
    path: PathBuf,
    policy: ColumnPolicy,
}

impl ReplyFile {
    pub fn new(path: impl Into<PathBuf>, policy: ColumnPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProposalService for ReplyFile {
    fn propose(&mut self, original: &Dataset, _instruction: &str) -> Result<Proposal, ProposalError> {
        let source = std::fs::read_to_string(&self.path)?;
        let filename = self.path.display().to_string();
        parse_reply(&source, &filename, &original.columns, self.policy)
    }
}

/// Stage a proposal's candidate, if it carries one.
///
/// A proposal without a candidate never reaches the diff engine.
pub fn apply_proposal(
    store: &mut StagingStore,
    proposal: Proposal,
) -> Result<Option<&Staged>, StagingError> {
    match proposal.candidate {
        Some(candidate) => store.stage_candidate(candidate),
        None => {
            info!("proposal carries no data change");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diff::DiffEngine;
    use crate::core::staging::Phase;
    use crate::core::testing::{fmeca_columns, fmeca_row, with_columns};
    use serde_json::json;

    #[test]
    fn test_parse_candidate_accepts_rows() {
        let value = json!([
            {"AssetType": "Pump", "Component": "Seal", "FLOC": "P-100", "Severity": 7},
            {"AssetType": "Fan", "FLOC": "F-200", "Effect": null, "Critical": true}
        ]);

        let ds = parse_candidate(&value, &fmeca_columns(), ColumnPolicy::Extend).unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[0].get("Severity"), Some(&CellValue::Number(7.0)));
        assert_eq!(ds.rows[1].get("Effect"), None);
        assert_eq!(ds.rows[1].text("Critical"), "true");
        assert_eq!(&ds.columns[..fmeca_columns().len()], &fmeca_columns()[..]);
        assert_eq!(ds.columns.last().map(String::as_str), Some("Critical"));
    }

    #[test]
    fn test_parse_candidate_keeps_large_integers_exact() {
        let value: Value =
            serde_json::from_str(r#"[{"FLOC": "A", "Tag": 9007199254740993}]"#).unwrap();

        let ds = parse_candidate(&value, &[], ColumnPolicy::Extend).unwrap();

        assert_eq!(ds.rows[0].text("Tag"), "9007199254740993");
        let original = Dataset::from_rows(vec![Row::from([("FLOC", "A"), ("Tag", "9007199254740993")])]);
        assert!(DiffEngine::default().diff(&original, &ds).is_empty());
    }

    #[test]
    fn test_parse_candidate_rejects_non_array() {
        let err = parse_candidate(&json!({"rows": []}), &[], ColumnPolicy::Extend).unwrap_err();
        match err {
            StagingError::MalformedCandidate { reason } => assert!(reason.contains("an object")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_candidate_rejects_non_object_rows() {
        let err = parse_candidate(&json!([{"FLOC": "A"}, "B"]), &[], ColumnPolicy::Extend).unwrap_err();
        match err {
            StagingError::MalformedCandidate { reason } => assert!(reason.contains("row 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_candidate_rejects_nested_values() {
        let err = parse_candidate(&json!([{"FLOC": ["A"]}]), &[], ColumnPolicy::Extend).unwrap_err();
        assert!(matches!(err, StagingError::MalformedCandidate { .. }));
    }

    #[test]
    fn test_parse_candidate_strips_markers() {
        let value = json!([{"FLOC": "A", "isAddedRow": true, "hasModifiedCells": false}]);
        let ds = parse_candidate(&value, &["FLOC".to_string()], ColumnPolicy::Reject).unwrap();

        assert_eq!(ds.columns, vec!["FLOC".to_string()]);
        assert_eq!(ds.rows[0], Row::from([("FLOC", "A")]));
    }

    #[test]
    fn test_reject_policy_refuses_new_columns() {
        let value = json!([{"FLOC": "A", "Task": "Inspect"}]);
        let err = parse_candidate(&value, &["FLOC".to_string()], ColumnPolicy::Reject).unwrap_err();
        match err {
            StagingError::UnknownColumns { columns } => assert_eq!(columns, vec!["Task".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reply_shapes() {
        let columns = fmeca_columns();

        let reply = parse_reply(
            r#"{"message": "Raised severity", "candidate": [{"FLOC": "A"}]}"#,
            "reply.json",
            &columns,
            ColumnPolicy::Extend,
        )
        .unwrap();
        assert_eq!(reply.message, "Raised severity");
        assert_eq!(reply.candidate.map(|c| c.len()), Some(1));

        let chat_only = parse_reply(
            r#"{"message": "The table looks complete"}"#,
            "reply.json",
            &columns,
            ColumnPolicy::Extend,
        )
        .unwrap();
        assert!(chat_only.candidate.is_none());

        let bare = parse_reply(r#"[{"FLOC": "A"}]"#, "reply.json", &columns, ColumnPolicy::Extend).unwrap();
        assert!(bare.message.is_empty());
        assert!(bare.candidate.is_some());
    }

    #[test]
    fn test_parse_reply_syntax_error_points_at_location() {
        let source = "{\n  \"candidate\": [\n    {\"FLOC\": \"A\",}\n  ]\n}";
        let err = parse_reply(source, "reply.json", &[], ColumnPolicy::Extend).unwrap_err();

        match err {
            ProposalError::Syntax(e) => {
                let offset = e.span.offset();
                assert!(offset > 0 && offset < source.len());
                assert_eq!(source[..offset].matches('\n').count(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_line_col_to_offset() {
        let source = "line1\nline2\nline3";
        assert_eq!(line_col_to_offset(source, 1, 1), 0);
        assert_eq!(line_col_to_offset(source, 2, 1), 6);
        assert_eq!(line_col_to_offset(source, 3, 3), 14);
        assert_eq!(line_col_to_offset(source, 9, 1), source.len() - 1);
    }

    #[test]
    fn test_apply_proposal_without_candidate_skips_diff() {
        let mut store = StagingStore::new(with_columns(vec![fmeca_row("Pump", "Seal", "P-100", "3")]));
        let proposal = Proposal {
            message: "No changes needed".into(),
            candidate: None,
        };

        assert!(apply_proposal(&mut store, proposal).unwrap().is_none());
        assert_eq!(store.phase(), Phase::Idle);
    }

    #[test]
    fn test_reply_file_service() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reply.json");
        std::fs::write(
            &path,
            r#"{"message": "ok", "candidate": [{"AssetType": "Pump", "Component": "Seal", "FLOC": "P-100", "Severity": "9"}]}"#,
        )
        .unwrap();

        let original = with_columns(vec![fmeca_row("Pump", "Seal", "P-100", "3")]);
        let mut store = StagingStore::new(original.clone());
        let mut service = ReplyFile::new(&path, ColumnPolicy::Extend);

        let proposal = service.propose(&original, "raise severity").unwrap();
        let staged = apply_proposal(&mut store, proposal).unwrap().unwrap();
        assert_eq!(staged.changeset.modified.len(), 1);
        assert_eq!(staged.changeset.modified[0].column, "Severity");
    }
}
