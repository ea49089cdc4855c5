//! Dataset persistence backends
//!
//! Every backend implements full-replace semantics: `save` overwrites all
//! stored rows and columns, so saving the same dataset twice is a no-op in
//! effect. Merging happens in the staging core, never in storage.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::core::dataset::{CellValue, Dataset, Row};

/// Errors from a storage backend
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Save rejected: {0}")]
    Rejected(String),
}

/// Load/save contract for a single dataset
pub trait Persistence {
    /// Replace the stored dataset with `dataset`
    fn save(&mut self, dataset: &Dataset) -> Result<(), PersistenceError>;

    /// Load the stored dataset; an empty store yields an empty dataset
    fn load(&self) -> Result<Dataset, PersistenceError>;
}

/// Available storage backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Json,
    Sqlite,
}

impl Backend {
    pub fn file_name(&self) -> &'static str {
        match self {
            Backend::Json => "dataset.json",
            Backend::Sqlite => "dataset.db",
        }
    }

    /// Open this backend's store inside `dir`
    pub fn open(&self, dir: &Path) -> Result<Box<dyn Persistence>, PersistenceError> {
        let path = dir.join(self.file_name());
        Ok(match self {
            Backend::Json => Box::new(JsonFileStore::new(path)),
            Backend::Sqlite => Box::new(SqliteStore::open(&path)?),
        })
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Json => write!(f, "json"),
            Backend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Backend::Json),
            "sqlite" => Ok(Backend::Sqlite),
            _ => Err(format!("Unknown backend '{}'. Supported: json, sqlite", s)),
        }
    }
}

/// Dataset stored as a single pretty-printed JSON document
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persistence for JsonFileStore {
    fn save(&mut self, dataset: &Dataset) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(dataset)?;

        // Write-then-rename so a failed save never truncates the old file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), rows = dataset.len(), "saved dataset");
        Ok(())
    }

    fn load(&self) -> Result<Dataset, PersistenceError> {
        if !self.path.exists() {
            return Ok(Dataset::default());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Dataset stored in SQLite as column, row and cell tables
pub struct SqliteStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS dataset_columns (
                position INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS dataset_rows (
                row_index INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS dataset_cells (
                row_index INTEGER NOT NULL,
                column_name TEXT NOT NULL,
                text_value TEXT,
                number_value REAL,
                PRIMARY KEY (row_index, column_name)
            );
            "#,
        )?;
        Ok(Self { conn })
    }
}

impl Persistence for SqliteStore {
    fn save(&mut self, dataset: &Dataset) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            r#"
            DELETE FROM dataset_cells;
            DELETE FROM dataset_rows;
            DELETE FROM dataset_columns;
            "#,
        )?;

        {
            let mut insert_column =
                tx.prepare("INSERT INTO dataset_columns (position, name) VALUES (?1, ?2)")?;
            for (position, name) in dataset.columns.iter().enumerate() {
                insert_column.execute(params![position as i64, name])?;
            }

            let mut insert_row = tx.prepare("INSERT INTO dataset_rows (row_index) VALUES (?1)")?;
            let mut insert_cell = tx.prepare(
                "INSERT INTO dataset_cells (row_index, column_name, text_value, number_value)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (index, row) in dataset.rows.iter().enumerate() {
                insert_row.execute(params![index as i64])?;
                for (column, value) in row.iter() {
                    let (text, number) = match value {
                        CellValue::Text(s) => (Some(s.as_str()), None),
                        CellValue::Number(n) => (None, Some(*n)),
                    };
                    insert_cell.execute(params![index as i64, column, text, number])?;
                }
            }
        }

        tx.commit()?;
        debug!(rows = dataset.len(), "saved dataset to sqlite");
        Ok(())
    }

    fn load(&self) -> Result<Dataset, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM dataset_columns ORDER BY position")?;
        let columns = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT row_index FROM dataset_rows ORDER BY row_index")?;
        let indices = stmt
            .query_map([], |r| r.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut rows: Vec<Row> = vec![Row::new(); indices.len()];

        let mut stmt = self.conn.prepare(
            "SELECT row_index, column_name, text_value, number_value FROM dataset_cells",
        )?;
        let cells = stmt.query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, Option<String>>(2)?,
                r.get::<_, Option<f64>>(3)?,
            ))
        })?;

        for cell in cells {
            let (index, column, text, number) = cell?;
            let Ok(position) = indices.binary_search(&index) else {
                continue;
            };
            let value = match (text, number) {
                (Some(text), _) => CellValue::Text(text),
                (None, Some(number)) => CellValue::Number(number),
                (None, None) => continue,
            };
            rows[position].set(column, value);
        }

        Ok(Dataset::new(columns, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Dataset {
        let mut first = Row::from([("FLOC", "P-100"), ("Component", "Seal")]);
        first.set("Severity", CellValue::from(7i64));
        Dataset::new(
            vec!["FLOC".into(), "Component".into(), "Severity".into()],
            vec![first, Row::new(), Row::from([("FLOC", "F-200")])],
        )
    }

    #[test]
    fn test_json_store_roundtrip() {
        let dir = tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("dataset.json"));

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn test_json_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope.json"));
        assert_eq!(store.load().unwrap(), Dataset::default());
    }

    #[test]
    fn test_json_store_save_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("dataset.json"));

        store.save(&sample()).unwrap();
        let first = fs::read(store.path()).unwrap();
        store.save(&sample()).unwrap();
        assert_eq!(fs::read(store.path()).unwrap(), first);
    }

    #[test]
    fn test_sqlite_store_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.save(&sample()).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, sample());
        assert_eq!(loaded.rows[0].get("Severity"), Some(&CellValue::Number(7.0)));
    }

    #[test]
    fn test_sqlite_store_fully_replaces() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.save(&sample()).unwrap();

        let smaller = Dataset::new(vec!["FLOC".into()], vec![Row::from([("FLOC", "X")])]);
        store.save(&smaller).unwrap();

        assert_eq!(store.load().unwrap(), smaller);
    }

    #[test]
    fn test_backend_opens_in_directory() {
        let dir = tempdir().unwrap();
        for backend in [Backend::Json, Backend::Sqlite] {
            let mut store = backend.open(dir.path()).unwrap();
            store.save(&sample()).unwrap();
            assert_eq!(store.load().unwrap(), sample());
            assert!(dir.path().join(backend.file_name()).exists());
        }
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("SQLite".parse::<Backend>().unwrap(), Backend::Sqlite);
        assert!("postgres".parse::<Backend>().is_err());
    }
}
