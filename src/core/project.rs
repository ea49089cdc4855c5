//! Project discovery and structure

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the directory that marks a project root
pub const PROJECT_DIR: &str = ".fmeca";

/// Represents an FMECA staging project
#[derive(Debug)]
pub struct Project {
    /// Root directory of the project (parent of .fmeca/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if root.join(PROJECT_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }
        Self::create(root)
    }

    /// Initialize even if .fmeca/ exists, resetting its config and
    /// discarding any staged changeset. The dataset is kept.
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let project = Self::create(root)?;

        let staged = project.staged_path();
        if staged.exists() {
            std::fs::remove_file(&staged).map_err(|e| ProjectError::IoError(e.to_string()))?;
        }
        Ok(project)
    }

    fn create(root: PathBuf) -> Result<Self, ProjectError> {
        let dir = root.join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        Ok(Self { root })
    }

    fn default_config() -> &'static str {
        r#"# FMECA Project Configuration

# Columns whose combined values identify a row
# key_columns: [AssetType, Component, FLOC]

# Use a single stable row-id column instead of key_columns
# id_column: ""

# What to do when a proposal introduces new columns (extend, reject)
# column_policy: extend

# Storage backend for the dataset (json, sqlite)
# backend: json

# Default output format (auto, yaml, tsv, json, csv, md)
# default_format: auto
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .fmeca directory, which also holds the stored dataset
    pub fn fmeca_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.fmeca_dir().join("config.yaml")
    }

    /// File holding the pending changeset between invocations
    pub fn staged_path(&self) -> PathBuf {
        self.fmeca_dir().join("staged.json")
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("not an FMECA project (searched from {searched_from:?}). Run 'fmeca init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("FMECA project already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}
