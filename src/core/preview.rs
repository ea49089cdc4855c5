//! Preview view: original rows with staged modifications overlaid and added
//! rows appended, annotated for highlighting
//!
//! A preview is always derived from `(original, Changeset)` and is never a
//! source of truth. Rendering markers live beside the row, not inside it, so
//! converting back to a [`Dataset`] cannot leak them into storage.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

use crate::core::dataset::{CellValue, Dataset, Row};
use crate::core::diff::{CellChange, Changeset, DeletedRow};

/// Marker key the UI uses to flag added rows
pub const ADDED_MARKER: &str = "isAddedRow";

/// Marker key the UI uses to flag rows with modified cells
pub const MODIFIED_MARKER: &str = "hasModifiedCells";

/// Remove rendering markers from a row that came from outside
pub fn strip_markers(row: &mut Row) {
    row.remove(ADDED_MARKER);
    row.remove(MODIFIED_MARKER);
}

/// Remove rendering markers from rows and the column list
pub fn strip_dataset_markers(dataset: &mut Dataset) {
    dataset
        .columns
        .retain(|c| c != ADDED_MARKER && c != MODIFIED_MARKER);
    for row in &mut dataset.rows {
        strip_markers(row);
    }
}

/// Where a preview row comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowOrigin {
    /// An original row, possibly with modified cells
    Original {
        original_index: usize,
        proposed_index: usize,
    },
    /// A row that only exists in the proposal
    Added { proposed_index: usize },
}

/// One rendered row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewRow {
    pub row: Row,
    pub origin: RowOrigin,
    pub modified_columns: BTreeSet<String>,
}

impl PreviewRow {
    pub fn is_added_row(&self) -> bool {
        matches!(self.origin, RowOrigin::Added { .. })
    }

    pub fn has_modified_cells(&self) -> bool {
        !self.modified_columns.is_empty()
    }

    pub fn is_modified(&self, column: &str) -> bool {
        self.modified_columns.contains(column)
    }
}

/// The merged view of original + staged changeset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub columns: Vec<String>,
    pub rows: Vec<PreviewRow>,
    /// Rows the changeset removes; shown separately, not part of the result
    pub deleted: Vec<DeletedRow>,
}

impl Preview {
    /// Preview of a dataset with nothing staged
    pub fn idle(original: &Dataset) -> Self {
        Self {
            columns: original.columns.clone(),
            rows: original
                .rows
                .iter()
                .enumerate()
                .map(|(i, row)| PreviewRow {
                    row: row.clone(),
                    origin: RowOrigin::Original {
                        original_index: i,
                        proposed_index: i,
                    },
                    modified_columns: BTreeSet::new(),
                })
                .collect(),
            deleted: Vec::new(),
        }
    }

    /// Rebuild the preview from the original dataset and a changeset.
    ///
    /// Matched rows appear in original order with modifications applied,
    /// followed by added rows in proposal order.
    pub fn build(original: &Dataset, changeset: &Changeset) -> Self {
        let mut columns = original.columns.clone();
        for column in &changeset.new_columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }

        let mut changes: HashMap<usize, Vec<&CellChange>> = HashMap::new();
        for change in &changeset.modified {
            changes.entry(change.original_index).or_default().push(change);
        }

        let mut rows = Vec::with_capacity(changeset.matched.len() + changeset.added.len());
        for pair in &changeset.matched {
            let Some(source) = original.row(pair.original_index) else {
                continue;
            };
            let mut row = source.clone();
            let mut modified_columns = BTreeSet::new();
            for change in changes.get(&pair.original_index).into_iter().flatten() {
                row.set_value(&change.column, change.new_value.clone());
                modified_columns.insert(change.column.clone());
            }
            rows.push(PreviewRow {
                row,
                origin: RowOrigin::Original {
                    original_index: pair.original_index,
                    proposed_index: pair.proposed_index,
                },
                modified_columns,
            });
        }

        for added in &changeset.added {
            rows.push(PreviewRow {
                row: added.row.clone(),
                origin: RowOrigin::Added {
                    proposed_index: added.row_index,
                },
                modified_columns: BTreeSet::new(),
            });
        }

        Self {
            columns,
            rows,
            deleted: changeset.deleted.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Plain dataset, markers dropped
    pub fn to_dataset(&self) -> Dataset {
        Dataset::new(
            self.columns.clone(),
            self.rows.iter().map(|r| r.row.clone()).collect(),
        )
    }

    pub fn into_dataset(self) -> Dataset {
        Dataset::new(self.columns, self.rows.into_iter().map(|r| r.row).collect())
    }

    /// Rows as JSON objects carrying the UI's marker keys
    pub fn to_marked_json(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|r| {
                let mut obj = Map::new();
                for (column, value) in r.row.iter() {
                    obj.insert(column.to_string(), cell_json(value));
                }
                obj.insert(ADDED_MARKER.to_string(), Value::Bool(r.is_added_row()));
                obj.insert(MODIFIED_MARKER.to_string(), Value::Bool(r.has_modified_cells()));
                Value::Object(obj)
            })
            .collect()
    }
}

fn cell_json(value: &CellValue) -> Value {
    match value {
        CellValue::Text(s) => Value::String(s.clone()),
        CellValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

impl Changeset {
    /// Apply this changeset to `original`, producing the accepted dataset
    pub fn apply(&self, original: &Dataset) -> Dataset {
        Preview::build(original, self).into_dataset()
    }
}
