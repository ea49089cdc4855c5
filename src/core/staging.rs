//! Staging store: holds at most one in-flight changeset per dataset
//!
//! The store owns the original dataset and, while a proposal is pending, the
//! proposed dataset, its changeset and a snapshot of the original taken at
//! staging time. The original is never touched while a changeset is staged,
//! which is what makes revert instantaneous.

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use ulid::Ulid;

use crate::core::dataset::{CellValue, Dataset, Row};
use crate::core::diff::{Changeset, DiffEngine};
use crate::core::merge::ChangeMerger;
use crate::core::persistence::PersistenceError;
use crate::core::preview::Preview;

/// Errors raised by staging, merging and commit operations
#[derive(Debug, Error, Diagnostic)]
pub enum StagingError {
    #[error("A changeset is already staged")]
    #[diagnostic(
        code(fmeca::staging::already_staged),
        help("Accept or revert the pending changeset before staging another proposal")
    )]
    AlreadyStaged,

    #[error("The staged changeset is already being committed")]
    #[diagnostic(code(fmeca::staging::already_committing))]
    AlreadyCommitting,

    #[error("No changeset is staged")]
    #[diagnostic(code(fmeca::staging::not_staged))]
    NotStaged,

    #[error("Commit ticket {ticket} does not belong to the staged changeset")]
    #[diagnostic(code(fmeca::staging::stale_ticket))]
    StaleTicket { ticket: Ulid },

    #[error("Failed to persist dataset: {0}")]
    #[diagnostic(
        code(fmeca::staging::persistence),
        help("The changeset is still staged; retry the accept or revert it")
    )]
    Persistence(#[from] PersistenceError),

    #[error("Malformed candidate dataset: {reason}")]
    #[diagnostic(code(fmeca::staging::malformed_candidate))]
    MalformedCandidate { reason: String },

    #[error("Row {index} not found (dataset has {len} rows)")]
    #[diagnostic(code(fmeca::staging::row_not_found))]
    RowNotFound { index: usize, len: usize },

    #[error("Column '{column}' not found")]
    #[diagnostic(code(fmeca::staging::column_not_found))]
    ColumnNotFound { column: String },

    #[error("Candidate introduces columns not in the dataset: {}", columns.join(", "))]
    #[diagnostic(
        code(fmeca::staging::unknown_columns),
        help("Set `column_policy: extend` to accept new columns")
    )]
    UnknownColumns { columns: Vec<String> },
}

/// A pending proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staged {
    pub id: Ulid,

    pub staged_at: DateTime<Utc>,

    /// The candidate dataset, kept in step with direct edits
    pub proposed: Dataset,

    pub changeset: Changeset,

    /// Original dataset as it was when the proposal was staged
    pub previous: Dataset,
}

/// Lifecycle of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Staged,
    Committing,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Staged => write!(f, "staged"),
            Phase::Committing => write!(f, "committing"),
        }
    }
}

/// Per-dataset staging state
#[derive(Debug)]
pub struct StagingStore {
    pub(crate) engine: DiffEngine,
    pub(crate) original: Dataset,
    pub(crate) staged: Option<Staged>,
    /// Set while a commit ticket is outstanding
    pub(crate) committing: Option<Ulid>,
}

impl StagingStore {
    /// Store using the default FMECA row identity
    pub fn new(original: Dataset) -> Self {
        Self::with_engine(original, DiffEngine::default())
    }

    pub fn with_engine(original: Dataset, engine: DiffEngine) -> Self {
        Self::restore(original, engine, None)
    }

    /// Rebuild a store around a previously staged proposal
    pub fn restore(original: Dataset, engine: DiffEngine, staged: Option<Staged>) -> Self {
        Self {
            engine,
            original,
            staged,
            committing: None,
        }
    }

    pub fn engine(&self) -> &DiffEngine {
        &self.engine
    }

    pub fn original(&self) -> &Dataset {
        &self.original
    }

    pub fn staged(&self) -> Option<&Staged> {
        self.staged.as_ref()
    }

    pub fn changeset(&self) -> Option<&Changeset> {
        self.staged.as_ref().map(|s| &s.changeset)
    }

    pub fn proposed(&self) -> Option<&Dataset> {
        self.staged.as_ref().map(|s| &s.proposed)
    }

    pub fn previous(&self) -> Option<&Dataset> {
        self.staged.as_ref().map(|s| &s.previous)
    }

    pub fn has_staged_changes(&self) -> bool {
        self.staged.is_some()
    }

    pub fn phase(&self) -> Phase {
        match (&self.staged, self.committing) {
            (_, Some(_)) => Phase::Committing,
            (Some(_), None) => Phase::Staged,
            (None, None) => Phase::Idle,
        }
    }

    pub(crate) fn ensure_not_committing(&self) -> Result<(), StagingError> {
        if self.committing.is_some() {
            return Err(StagingError::AlreadyCommitting);
        }
        Ok(())
    }

    /// Stage a candidate together with its precomputed diff.
    ///
    /// Fails with [`StagingError::AlreadyStaged`] while another changeset is
    /// pending; the pending one is left intact.
    pub fn stage(&mut self, candidate: Dataset, changeset: Changeset) -> Result<&Staged, StagingError> {
        self.ensure_not_committing()?;
        if self.staged.is_some() {
            return Err(StagingError::AlreadyStaged);
        }

        let mut proposed = candidate;
        proposed.adopt_row_columns();
        let staged = Staged {
            id: Ulid::new(),
            staged_at: Utc::now(),
            proposed,
            changeset,
            previous: self.original.clone(),
        };
        info!(
            id = %staged.id,
            summary = %staged.changeset.summary(),
            "staged changeset"
        );
        Ok(self.staged.insert(staged))
    }

    /// Diff `candidate` against the original and stage the result.
    ///
    /// A candidate identical to the original stages nothing and returns
    /// `Ok(None)`.
    pub fn stage_candidate(&mut self, candidate: Dataset) -> Result<Option<&Staged>, StagingError> {
        self.ensure_not_committing()?;
        if self.staged.is_some() {
            return Err(StagingError::AlreadyStaged);
        }

        let changeset = self.engine.diff(&self.original, &candidate);
        if changeset.is_empty() && changeset.new_columns.is_empty() {
            info!("proposal matches the current dataset, nothing staged");
            return Ok(None);
        }
        self.stage(candidate, changeset).map(Some)
    }

    /// Derive the preview from `(original, changeset)`
    pub fn preview(&self) -> Preview {
        match &self.staged {
            Some(staged) => Preview::build(&self.original, &staged.changeset),
            None => Preview::idle(&self.original),
        }
    }

    /// Replace the original dataset wholesale, e.g. on import
    pub fn replace_original(&mut self, dataset: Dataset) -> Result<(), StagingError> {
        self.ensure_not_committing()?;
        if self.staged.is_some() {
            return Err(StagingError::AlreadyStaged);
        }
        self.original = dataset;
        Ok(())
    }

    /// Drop the proposal, its changeset and the snapshot
    pub fn clear(&mut self) {
        self.staged = None;
        self.committing = None;
    }

    /// Apply a direct cell edit.
    ///
    /// `row` is a preview index. While idle the original is edited in place;
    /// while staged the edit is folded into the changeset.
    pub fn edit_cell(
        &mut self,
        row: usize,
        column: &str,
        value: impl Into<CellValue>,
    ) -> Result<(), StagingError> {
        self.ensure_not_committing()?;
        let value = value.into();

        match self.staged.as_mut() {
            Some(staged) => {
                ChangeMerger::new(&self.engine).merge_direct_edit(
                    &self.original,
                    staged,
                    row,
                    column,
                    value,
                )
            }
            None => {
                if !self.original.has_column(column) {
                    return Err(StagingError::ColumnNotFound {
                        column: column.to_string(),
                    });
                }
                let len = self.original.len();
                let Some(target) = self.original.rows.get_mut(row) else {
                    warn!(row, len, "dropping edit to missing row");
                    return Err(StagingError::RowNotFound { index: row, len });
                };
                target.set(column, value);
                Ok(())
            }
        }
    }

    /// Delete a row by preview index. Returns the removed row.
    pub fn delete_row(&mut self, row: usize) -> Result<Row, StagingError> {
        self.ensure_not_committing()?;

        match self.staged.as_mut() {
            Some(staged) => {
                ChangeMerger::new(&self.engine).merge_row_delete(&self.original, staged, row)
            }
            None => {
                let len = self.original.len();
                if row >= len {
                    warn!(row, len, "dropping delete of missing row");
                    return Err(StagingError::RowNotFound { index: row, len });
                }
                Ok(self.original.rows.remove(row))
            }
        }
    }
}
