//! Row identity: deriving a key that recognizes the same real-world row
//! across two snapshots of a dataset
//!
//! FMECA rows have no intrinsic primary key. The default strategy builds a
//! composite key from the columns engineers treat as identifying (asset type,
//! component, location code). Comparing every field instead would make any
//! edited row look new. Where a dataset carries a genuine row ID column,
//! [`IdColumn`] can be used instead without touching the diff algorithm.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::dataset::Row;

/// Columns that identify an FMECA row
pub const DEFAULT_KEY_COLUMNS: [&str; 3] = ["AssetType", "Component", "FLOC"];

/// A derived row identifier. One segment per key column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey(Vec<String>);

impl RowKey {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True when every segment is empty
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(String::is_empty)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" / "))
    }
}

/// Strategy for deriving a [`RowKey`]
///
/// Implementations must be pure and total: a row missing some key columns
/// still produces a key (missing columns contribute empty segments).
pub trait RowIdentity: fmt::Debug + Send + Sync {
    fn key_of(&self, row: &Row) -> RowKey;

    /// Columns that participate in the key
    fn key_columns(&self) -> &[String];

    fn is_key_column(&self, column: &str) -> bool {
        self.key_columns().iter().any(|c| c == column)
    }
}

/// Composite key over a fixed list of columns
#[derive(Debug, Clone)]
pub struct CompositeKey {
    columns: Vec<String>,
}

impl CompositeKey {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Asset type + component + location code
    pub fn fmeca() -> Self {
        Self::new(DEFAULT_KEY_COLUMNS)
    }
}

impl Default for CompositeKey {
    fn default() -> Self {
        Self::fmeca()
    }
}

impl RowIdentity for CompositeKey {
    fn key_of(&self, row: &Row) -> RowKey {
        RowKey(
            self.columns
                .iter()
                .map(|c| row.text(c).trim().to_string())
                .collect(),
        )
    }

    fn key_columns(&self) -> &[String] {
        &self.columns
    }
}

/// Identity taken from a single stable row-ID column
#[derive(Debug, Clone)]
pub struct IdColumn {
    // Single element; kept as a Vec so key_columns can hand out a slice
    column: Vec<String>,
}

impl IdColumn {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: vec![column.into()],
        }
    }
}

impl RowIdentity for IdColumn {
    fn key_of(&self, row: &Row) -> RowKey {
        RowKey(vec![row.text(&self.column[0]).trim().to_string()])
    }

    fn key_columns(&self) -> &[String] {
        &self.column
    }
}
