//! Spreadsheet import/export
//!
//! CSV cells are read as text; empty cells are left absent so a round trip
//! through a spreadsheet never introduces modifications.

use csv::{ReaderBuilder, WriterBuilder};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use crate::core::dataset::{CellValue, Dataset, Row};
use crate::core::persistence::PersistenceError;
use crate::core::preview::strip_dataset_markers;

/// Read a dataset from CSV with a header row
pub fn read_csv<R: Read>(reader: R) -> Result<Dataset, PersistenceError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mut columns: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers.iter() {
        if !header.is_empty() && !columns.iter().any(|c| c == header) {
            columns.push(header.to_string());
        }
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let mut row = Row::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            if header.is_empty() || field.is_empty() {
                continue;
            }
            row.set(header, CellValue::from(field));
        }
        rows.push(row);
    }

    let mut dataset = Dataset::new(columns, rows);
    strip_dataset_markers(&mut dataset);
    Ok(dataset)
}

/// Write a dataset as CSV. Absent cells are written empty.
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> Result<(), PersistenceError> {
    let mut columns = dataset.columns.clone();
    columns.extend(dataset.undeclared_columns());

    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(&columns)?;
    for row in &dataset.rows {
        wtr.write_record(columns.iter().map(|c| row.text(c)))?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonDataset {
    Full(Dataset),
    Rows(Vec<Row>),
}

/// Load a dataset from a `.csv` or `.json` file.
///
/// JSON may be a saved dataset (`{"columns": [...], "rows": [...]}`) or a
/// bare array of row objects.
pub fn load_dataset_file(path: &Path) -> Result<Dataset, PersistenceError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let mut dataset = if is_csv {
        read_csv(BufReader::new(File::open(path)?))?
    } else {
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<JsonDataset>(&content)? {
            JsonDataset::Full(mut dataset) => {
                dataset.adopt_row_columns();
                dataset
            }
            JsonDataset::Rows(rows) => Dataset::from_rows(rows),
        }
    };
    strip_dataset_markers(&mut dataset);
    Ok(dataset)
}
