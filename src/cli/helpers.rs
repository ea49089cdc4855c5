//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use clap::ValueEnum;
use miette::Result;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{Config, Project, Session};

/// Find the project from `--project` or the current directory
pub fn open_project(global: &GlobalOpts) -> Result<Project> {
    match &global.project {
        Some(path) => Project::discover_from(path),
        None => Project::discover(),
    }
    .map_err(|e| miette::miette!("{}", e))
}

/// Open the project's session, refusing stale staged state
pub fn open_session(global: &GlobalOpts) -> Result<(Session, Config)> {
    let project = open_project(global)?;
    let config = Config::load_for(Some(&project));
    let session = Session::open(project, &config)?;
    Ok((session, config))
}

/// Open the project's session, discarding staged state that no longer applies
pub fn open_session_lenient(global: &GlobalOpts) -> Result<Session> {
    let project = open_project(global)?;
    let config = Config::load_for(Some(&project));
    Ok(Session::open_lenient(project, &config)?)
}

/// Resolve `--format auto` against the configured default
pub fn effective_format(global: &GlobalOpts, config: &Config) -> OutputFormat {
    if global.format != OutputFormat::Auto {
        return global.format;
    }
    config
        .default_format
        .as_deref()
        .and_then(|f| OutputFormat::from_str(f, true).ok())
        .unwrap_or(OutputFormat::Auto)
}

/// Truncate a string to max_len characters, adding "..." if truncated
///
/// Useful for table columns that need fixed-width output.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
