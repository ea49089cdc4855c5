//! Change merger: folds direct user edits into a staged changeset
//!
//! While a proposal is staged the user may still edit cells or delete rows
//! in the preview. Each edit is applied to the proposed dataset and recorded
//! in the changeset so that the preview always shows the latest value for
//! every cell. Edits to the same cell are last-write-wins.

use tracing::{debug, warn};

use crate::core::dataset::{values_equal, CellValue, Dataset, Row};
use crate::core::diff::{CellChange, Changeset, DeletedRow, DiffEngine, RowPair};
use crate::core::staging::{Staged, StagingError};

/// Which changeset entry a preview row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// Position in `changeset.matched`
    Matched(usize),
    /// Position in `changeset.added`
    Added(usize),
}

/// Merges direct edits into a staged proposal
pub struct ChangeMerger<'a> {
    engine: &'a DiffEngine,
}

impl<'a> ChangeMerger<'a> {
    pub fn new(engine: &'a DiffEngine) -> Self {
        Self { engine }
    }

    /// Map a preview index to a changeset entry. Preview rows are the matched
    /// rows in original order followed by the added rows.
    fn locate(changeset: &Changeset, preview_index: usize) -> Result<Target, StagingError> {
        let matched = changeset.matched.len();
        let len = matched + changeset.added.len();
        if preview_index < matched {
            Ok(Target::Matched(preview_index))
        } else if preview_index < len {
            Ok(Target::Added(preview_index - matched))
        } else {
            warn!(row = preview_index, len, "edit targets a row that is not in the preview");
            Err(StagingError::RowNotFound {
                index: preview_index,
                len,
            })
        }
    }

    /// Fold a single cell edit into the staged proposal.
    ///
    /// Edits to key columns change the row's identity; the changeset is then
    /// recomputed from `(original, proposed)` so rows that now match (or no
    /// longer match) are classified correctly.
    pub fn merge_direct_edit(
        &self,
        original: &Dataset,
        staged: &mut Staged,
        preview_index: usize,
        column: &str,
        value: CellValue,
    ) -> Result<(), StagingError> {
        if !staged.proposed.has_column(column) && !original.has_column(column) {
            return Err(StagingError::ColumnNotFound {
                column: column.to_string(),
            });
        }

        let target = Self::locate(&staged.changeset, preview_index)?;
        let proposed_index = match target {
            Target::Matched(p) => staged.changeset.matched[p].proposed_index,
            Target::Added(k) => staged.changeset.added[k].row_index,
        };
        let proposed_len = staged.proposed.len();
        let Some(proposed_row) = staged.proposed.rows.get_mut(proposed_index) else {
            return Err(StagingError::RowNotFound {
                index: proposed_index,
                len: proposed_len,
            });
        };

        proposed_row.set(column, value.clone());
        staged.proposed.ensure_column(column);

        if self.engine.identity().is_key_column(column) {
            self.resync(original, staged);
            return Ok(());
        }

        match target {
            Target::Added(k) => {
                // Whole row is already flagged as added; no cell bookkeeping
                staged.changeset.added[k].row.set(column, value);
            }
            Target::Matched(p) => {
                let pair = staged.changeset.matched[p];
                let before = original.row(pair.original_index).ok_or(StagingError::RowNotFound {
                    index: pair.original_index,
                    len: original.len(),
                })?;
                record_modification(&mut staged.changeset, pair, before, column, value);
            }
        }

        Ok(())
    }

    /// Fold a row deletion into the staged proposal. Returns the removed
    /// proposed row.
    ///
    /// Removing an added row un-adds it. Removing an original row moves it to
    /// `deleted` and drops its cell modifications.
    pub fn merge_row_delete(
        &self,
        original: &Dataset,
        staged: &mut Staged,
        preview_index: usize,
    ) -> Result<Row, StagingError> {
        let target = Self::locate(&staged.changeset, preview_index)?;
        let proposed_index = match target {
            Target::Matched(p) => staged.changeset.matched[p].proposed_index,
            Target::Added(k) => staged.changeset.added[k].row_index,
        };
        if proposed_index >= staged.proposed.len() {
            return Err(StagingError::RowNotFound {
                index: proposed_index,
                len: staged.proposed.len(),
            });
        }

        let changeset = &mut staged.changeset;
        match target {
            Target::Added(k) => {
                changeset.added.remove(k);
            }
            Target::Matched(p) => {
                let pair = changeset.matched[p];
                let row = original
                    .row(pair.original_index)
                    .cloned()
                    .ok_or(StagingError::RowNotFound {
                        index: pair.original_index,
                        len: original.len(),
                    })?;
                changeset.matched.remove(p);
                changeset
                    .modified
                    .retain(|c| c.original_index != pair.original_index);
                let at = changeset
                    .deleted
                    .partition_point(|d| d.original_index < pair.original_index);
                changeset.deleted.insert(
                    at,
                    DeletedRow {
                        original_index: pair.original_index,
                        row,
                    },
                );
            }
        }

        let removed = staged.proposed.rows.remove(proposed_index);
        shift_proposed_indices(&mut staged.changeset, proposed_index);

        // A deleted original row may now share a key with an added row
        if self.key_collision(&staged.changeset) {
            self.resync(original, staged);
        }

        Ok(removed)
    }

    fn key_collision(&self, changeset: &Changeset) -> bool {
        let identity = self.engine.identity();
        changeset.added.iter().any(|a| {
            let key = identity.key_of(&a.row);
            changeset
                .deleted
                .iter()
                .any(|d| identity.key_of(&d.row) == key)
        })
    }

    fn resync(&self, original: &Dataset, staged: &mut Staged) {
        staged.changeset = self.engine.diff(original, &staged.proposed);
        debug!(
            summary = %staged.changeset.summary(),
            "recomputed changeset after identity change"
        );
    }
}

/// Upsert a cell modification for a matched row. An edit back to the
/// original value removes the entry.
fn record_modification(
    changeset: &mut Changeset,
    pair: RowPair,
    before: &Row,
    column: &str,
    value: CellValue,
) {
    let old = before.get(column);
    let existing = changeset
        .modified
        .iter()
        .position(|c| c.original_index == pair.original_index && c.column == column);

    if values_equal(old, Some(&value)) {
        if let Some(pos) = existing {
            changeset.modified.remove(pos);
        }
        return;
    }

    match existing {
        Some(pos) => changeset.modified[pos].new_value = Some(value),
        None => changeset.modified.push(CellChange {
            row_index: pair.proposed_index,
            original_index: pair.original_index,
            column: column.to_string(),
            old_value: old.cloned(),
            new_value: Some(value),
        }),
    }
}

/// Close the gap left by removing proposed row `removed`
fn shift_proposed_indices(changeset: &mut Changeset, removed: usize) {
    for added in &mut changeset.added {
        if added.row_index > removed {
            added.row_index -= 1;
        }
    }
    for pair in &mut changeset.matched {
        if pair.proposed_index > removed {
            pair.proposed_index -= 1;
        }
    }
    for change in &mut changeset.modified {
        if change.row_index > removed {
            change.row_index -= 1;
        }
    }
}
