//! Diff engine: classify the difference between an original dataset and a
//! proposed candidate as added rows, deleted rows and modified cells
//!
//! Rows are paired by [`RowIdentity`] key rather than by position, so a
//! candidate that reorders rows or edits non-key fields produces cell
//! modifications instead of delete + add pairs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::debug;

use crate::core::dataset::{values_equal, CellValue, Dataset, Row};
use crate::core::identity::{CompositeKey, RowIdentity, RowKey};

/// A single cell whose value differs between original and candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellChange {
    /// Row position in the proposed (candidate) dataset
    pub row_index: usize,

    /// Row position in the original dataset
    pub original_index: usize,

    pub column: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<CellValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<CellValue>,
}

/// A candidate row with no counterpart in the original
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedRow {
    /// Row position in the proposed dataset
    pub row_index: usize,
    pub row: Row,
}

/// An original row with no counterpart in the candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedRow {
    pub original_index: usize,
    pub row: Row,
}

/// An original row and the candidate row it was matched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPair {
    pub original_index: usize,
    pub proposed_index: usize,
}

/// The staged diff between an original dataset and a proposal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    #[serde(default)]
    pub added: Vec<AddedRow>,

    #[serde(default)]
    pub deleted: Vec<DeletedRow>,

    #[serde(default)]
    pub modified: Vec<CellChange>,

    /// Rows present on both sides, ordered by original index
    #[serde(default)]
    pub matched: Vec<RowPair>,

    /// Candidate columns the original does not declare
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_columns: Vec<String>,
}

impl Changeset {
    /// No added, deleted or modified entries
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }

    pub fn summary(&self) -> ChangeSummary {
        let rows: BTreeSet<usize> = self.modified.iter().map(|c| c.original_index).collect();
        ChangeSummary {
            added: self.added.len(),
            deleted: self.deleted.len(),
            modified_cells: self.modified.len(),
            modified_rows: rows.len(),
        }
    }

    /// Look up the modification recorded for an original cell
    pub fn modification(&self, original_index: usize, column: &str) -> Option<&CellChange> {
        self.modified
            .iter()
            .find(|c| c.original_index == original_index && c.column == column)
    }

    /// The candidate row an original row was matched to
    pub fn proposed_index_of(&self, original_index: usize) -> Option<usize> {
        self.matched
            .iter()
            .find(|p| p.original_index == original_index)
            .map(|p| p.proposed_index)
    }
}

/// Counts for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub added: usize,
    pub deleted: usize,
    pub modified_cells: usize,
    pub modified_rows: usize,
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} deleted, {} cell(s) modified in {} row(s)",
            self.added, self.deleted, self.modified_cells, self.modified_rows
        )
    }
}

/// Computes [`Changeset`]s using a pluggable row identity
#[derive(Debug)]
pub struct DiffEngine {
    identity: Box<dyn RowIdentity>,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(Box::new(CompositeKey::fmeca()))
    }
}

impl DiffEngine {
    pub fn new(identity: Box<dyn RowIdentity>) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &dyn RowIdentity {
        self.identity.as_ref()
    }

    /// Diff `candidate` against `original`.
    ///
    /// Pure and deterministic. An empty candidate against a non-empty
    /// original deletes every row; rejecting empty proposals is the caller's
    /// decision.
    pub fn diff(&self, original: &Dataset, candidate: &Dataset) -> Changeset {
        // Values under columns the candidate's rows carry but never declared
        // are still compared, so they cannot reach the dataset unreviewed
        let mut columns = original.merged_columns(candidate);
        for column in candidate.undeclared_columns() {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        let pairs = self.pair_rows(&original.rows, &candidate.rows, &columns);

        let mut changeset = Changeset {
            new_columns: columns
                .iter()
                .filter(|c| !original.has_column(c))
                .cloned()
                .collect(),
            ..Default::default()
        };
        let mut claimed = vec![false; candidate.rows.len()];

        for (original_index, pair) in pairs.into_iter().enumerate() {
            let before = &original.rows[original_index];
            match pair {
                Some(proposed_index) => {
                    claimed[proposed_index] = true;
                    changeset.matched.push(RowPair {
                        original_index,
                        proposed_index,
                    });
                    changeset.modified.extend(compare_rows(
                        original_index,
                        proposed_index,
                        before,
                        &candidate.rows[proposed_index],
                        &columns,
                    ));
                }
                None => changeset.deleted.push(DeletedRow {
                    original_index,
                    row: before.clone(),
                }),
            }
        }

        changeset.added = candidate
            .rows
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed[*i])
            .map(|(row_index, row)| AddedRow {
                row_index,
                row: row.clone(),
            })
            .collect();

        debug!(
            original_rows = original.len(),
            candidate_rows = candidate.len(),
            added = changeset.added.len(),
            deleted = changeset.deleted.len(),
            modified = changeset.modified.len(),
            "computed diff"
        );

        changeset
    }

    /// Pair each original row with at most one candidate row sharing its key.
    ///
    /// When several rows share a key, exact (null-equivalent) full-row
    /// matches are paired first; the remaining rows pair with the first
    /// unclaimed candidate of that key, in order.
    pub fn pair_rows(
        &self,
        original: &[Row],
        candidate: &[Row],
        columns: &[String],
    ) -> Vec<Option<usize>> {
        let mut by_key: HashMap<RowKey, Vec<usize>> = HashMap::new();
        for (index, row) in candidate.iter().enumerate() {
            by_key
                .entry(self.identity.key_of(row))
                .or_default()
                .push(index);
        }

        let keys: Vec<RowKey> = original.iter().map(|r| self.identity.key_of(r)).collect();
        let mut claimed = vec![false; candidate.len()];
        let mut pairs: Vec<Option<usize>> = vec![None; original.len()];

        // Exact matches first
        for (i, row) in original.iter().enumerate() {
            let Some(slots) = by_key.get(&keys[i]) else {
                continue;
            };
            if let Some(&j) = slots
                .iter()
                .find(|&&j| !claimed[j] && row.equivalent(&candidate[j], columns))
            {
                claimed[j] = true;
                pairs[i] = Some(j);
            }
        }

        // Then positional
        for (i, pair) in pairs.iter_mut().enumerate() {
            if pair.is_some() {
                continue;
            }
            let Some(slots) = by_key.get(&keys[i]) else {
                continue;
            };
            if let Some(&j) = slots.iter().find(|&&j| !claimed[j]) {
                claimed[j] = true;
                *pair = Some(j);
            }
        }

        pairs
    }
}

/// Field-by-field comparison of a matched pair over `columns`
pub fn compare_rows(
    original_index: usize,
    proposed_index: usize,
    before: &Row,
    after: &Row,
    columns: &[String],
) -> Vec<CellChange> {
    columns
        .iter()
        .filter(|c| !values_equal(before.get(c), after.get(c)))
        .map(|c| CellChange {
            row_index: proposed_index,
            original_index,
            column: c.clone(),
            old_value: before.get(c).cloned(),
            new_value: after.get(c).cloned(),
        })
        .collect()
}
