//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

use crate::core::diff::DiffEngine;
use crate::core::identity::{CompositeKey, IdColumn, RowIdentity, DEFAULT_KEY_COLUMNS};
use crate::core::persistence::Backend;
use crate::core::proposal::ColumnPolicy;
use crate::core::Project;

/// FMECA configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Columns whose combined values identify a row
    pub key_columns: Option<Vec<String>>,

    /// Stable row-id column; takes precedence over `key_columns`
    pub id_column: Option<String>,

    /// Whether proposals may introduce new columns
    pub column_policy: Option<ColumnPolicy>,

    /// Storage backend for the dataset
    pub backend: Option<Backend>,

    /// Default output format
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from all sources, discovering the project from
    /// the current directory
    pub fn load() -> Self {
        Self::load_for(Project::discover().ok().as_ref())
    }

    /// Load configuration from all sources, merging in priority order
    pub fn load_for(project: Option<&Project>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/fmeca/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 3. Project config (.fmeca/config.yaml)
        if let Some(project) = project {
            if let Some(project_config) = Self::read_file(&project.config_path()) {
                config.merge(project_config);
            }
        }

        // 4. Environment variables
        config.merge_env(|name| std::env::var(name).ok());

        config
    }

    fn read_file(path: &std::path::Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                None
            }
        }
    }

    fn merge_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(keys) = var("FMECA_KEY_COLUMNS") {
            let columns: Vec<String> = keys
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if !columns.is_empty() {
                self.key_columns = Some(columns);
            }
        }
        if let Some(backend) = var("FMECA_BACKEND") {
            match backend.parse::<Backend>() {
                Ok(backend) => self.backend = Some(backend),
                Err(e) => warn!("FMECA_BACKEND: {}", e),
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "fmeca")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.key_columns.is_some() {
            self.key_columns = other.key_columns;
        }
        if other.id_column.is_some() {
            self.id_column = other.id_column;
        }
        if other.column_policy.is_some() {
            self.column_policy = other.column_policy;
        }
        if other.backend.is_some() {
            self.backend = other.backend;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
    }

    pub fn key_columns(&self) -> Vec<String> {
        match &self.key_columns {
            Some(columns) if !columns.is_empty() => columns.clone(),
            _ => DEFAULT_KEY_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn column_policy(&self) -> ColumnPolicy {
        self.column_policy.unwrap_or_default()
    }

    pub fn backend(&self) -> Backend {
        self.backend.unwrap_or_default()
    }

    /// Row identity strategy selected by `id_column` / `key_columns`
    pub fn row_identity(&self) -> Box<dyn RowIdentity> {
        match self.id_column.as_deref().map(str::trim) {
            Some(column) if !column.is_empty() => Box::new(IdColumn::new(column)),
            _ => Box::new(CompositeKey::new(self.key_columns())),
        }
    }

    pub fn diff_engine(&self) -> DiffEngine {
        DiffEngine::new(self.row_identity())
    }
}
