//! Schema-less tabular data: cells, rows and datasets
//!
//! Rows are plain column → value maps with no compile-time schema. The
//! display order of columns is tracked separately on the [`Dataset`].

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// A scalar cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// String form used for display and for comparison
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Text(s) => Cow::Borrowed(s.as_str()),
            CellValue::Number(n) => Cow::Owned(n.to_string()),
        }
    }

    /// An empty string is indistinguishable from an absent value
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// Largest integer magnitude an `f64` holds exactly
const MAX_EXACT_INTEGER: u64 = 1 << 53;

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        if n.unsigned_abs() <= MAX_EXACT_INTEGER {
            CellValue::Number(n as f64)
        } else {
            CellValue::Text(n.to_string())
        }
    }
}

impl From<&serde_json::Number> for CellValue {
    /// Integers an `f64` cannot hold exactly are kept as their digits
    fn from(n: &serde_json::Number) -> Self {
        if let Some(i) = n.as_i64() {
            return CellValue::from(i);
        }
        if let Some(u) = n.as_u64() {
            return CellValue::Text(u.to_string());
        }
        match n.as_f64() {
            Some(f) => CellValue::Number(f),
            None => CellValue::Text(n.to_string()),
        }
    }
}

/// Compare two optional cells under null-equivalence.
///
/// Absent and `""` are the same value; numbers and text compare by their
/// string form, so `3` equals `"3"`.
pub fn values_equal(a: Option<&CellValue>, b: Option<&CellValue>) -> bool {
    let a = a.map(CellValue::as_text).unwrap_or(Cow::Borrowed(""));
    let b = b.map(CellValue::as_text).unwrap_or(Cow::Borrowed(""));
    a == b
}

/// A single row: column name → value
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, CellValue>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.0.get(column)
    }

    /// Cell text, with absent cells reading as `""`
    pub fn text(&self, column: &str) -> String {
        self.get(column)
            .map(|v| v.as_text().into_owned())
            .unwrap_or_default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.0.insert(column.into(), value.into());
    }

    /// Set or clear a cell; `None` removes it
    pub fn set_value(&mut self, column: &str, value: Option<CellValue>) {
        match value {
            Some(v) => {
                self.0.insert(column.to_string(), v);
            }
            None => {
                self.0.remove(column);
            }
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<CellValue> {
        self.0.remove(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Null-equivalent equality over the given columns
    pub fn equivalent(&self, other: &Row, columns: &[String]) -> bool {
        columns
            .iter()
            .all(|c| values_equal(self.get(c), other.get(c)))
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // JSON null means "no value", same as a missing key
        let raw = BTreeMap::<String, Option<CellValue>>::deserialize(deserializer)?;
        Ok(Row(raw
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect()))
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row(iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }
}

impl<K: Into<String>, V: Into<CellValue>, const N: usize> From<[(K, V); N]> for Row {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// An ordered sequence of rows plus an ordered column list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Display order of columns; preserved across save/load
    #[serde(default)]
    pub columns: Vec<String>,

    #[serde(default)]
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Build a dataset whose column list is every key seen in `rows`,
    /// in first-seen order
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut dataset = Self {
            columns: Vec::new(),
            rows,
        };
        dataset.adopt_row_columns();
        dataset
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Append a column if missing. Returns true when it was added.
    pub fn ensure_column(&mut self, column: &str) -> bool {
        if self.has_column(column) {
            return false;
        }
        self.columns.push(column.to_string());
        true
    }

    /// Row keys that are not declared in the column list, in first-seen order
    pub fn undeclared_columns(&self) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for row in &self.rows {
            for column in row.columns() {
                if !self.has_column(column) && !found.iter().any(|c| c == column) {
                    found.push(column.to_string());
                }
            }
        }
        found
    }

    /// Declare every column that appears in a row. Returns the new columns.
    pub fn adopt_row_columns(&mut self) -> Vec<String> {
        let added = self.undeclared_columns();
        self.columns.extend(added.iter().cloned());
        added
    }

    /// This dataset's columns followed by any of `other`'s columns not
    /// already present
    pub fn merged_columns(&self, other: &Dataset) -> Vec<String> {
        let mut columns = self.columns.clone();
        for column in &other.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_equivalence() {
        let empty = CellValue::from("");
        assert!(values_equal(None, Some(&empty)));
        assert!(values_equal(Some(&empty), None));
        assert!(values_equal(None, None));
        assert!(!values_equal(None, Some(&CellValue::from("x"))));
    }

    #[test]
    fn test_number_and_text_compare_by_string() {
        let n = CellValue::from(3i64);
        let t = CellValue::from("3");
        assert!(values_equal(Some(&n), Some(&t)));
        assert!(!values_equal(Some(&CellValue::from(3.5)), Some(&t)));
    }

    #[test]
    fn test_large_integers_keep_their_digits() {
        let big: serde_json::Number = serde_json::from_str("9007199254740993").unwrap();
        assert_eq!(CellValue::from(&big), CellValue::Text("9007199254740993".into()));

        let huge: serde_json::Number = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(CellValue::from(&huge).as_text(), "18446744073709551615");

        let small: serde_json::Number = serde_json::from_str("42").unwrap();
        assert_eq!(CellValue::from(&small), CellValue::Number(42.0));
        assert_eq!(CellValue::from(i64::MAX).as_text(), i64::MAX.to_string());
    }

    #[test]
    fn test_row_text_defaults_to_empty() {
        let row = Row::from([("FLOC", "A")]);
        assert_eq!(row.text("FLOC"), "A");
        assert_eq!(row.text("Component"), "");
    }

    #[test]
    fn test_row_deserialize_drops_nulls() {
        let row: Row =
            serde_json::from_str(r#"{"FLOC": "A", "Severity": 5, "Notes": null}"#).unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("Severity"), Some(&CellValue::Number(5.0)));
        assert!(row.get("Notes").is_none());
    }

    #[test]
    fn test_row_equivalent_ignores_blank_vs_absent() {
        let a = Row::from([("FLOC", "A"), ("Notes", "")]);
        let b = Row::from([("FLOC", "A")]);
        let columns = vec!["FLOC".to_string(), "Notes".to_string()];
        assert!(a.equivalent(&b, &columns));
    }

    #[test]
    fn test_from_rows_collects_columns() {
        let ds = Dataset::from_rows(vec![
            Row::from([("FLOC", "A")]),
            Row::from([("Component", "Pump"), ("FLOC", "B")]),
        ]);
        assert_eq!(ds.columns, vec!["FLOC".to_string(), "Component".to_string()]);
    }

    #[test]
    fn test_merged_columns_keeps_original_order_first() {
        let a = Dataset::new(vec!["FLOC".into(), "Component".into()], vec![]);
        let b = Dataset::new(vec!["Component".into(), "Severity".into()], vec![]);
        assert_eq!(
            a.merged_columns(&b),
            vec!["FLOC".to_string(), "Component".to_string(), "Severity".to_string()]
        );
    }
}
