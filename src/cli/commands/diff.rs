//! `fmeca diff` command - Diff two dataset files

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::effective_format;
use crate::cli::table::format_changeset;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::spreadsheet::load_dataset_file;
use crate::core::{Config, Project};

#[derive(clap::Args, Debug)]
pub struct DiffArgs {
    /// Original dataset (CSV or JSON)
    pub original: PathBuf,

    /// Candidate dataset (CSV or JSON)
    pub candidate: PathBuf,

    /// Key columns, comma-separated (default: from config)
    #[arg(long, value_delimiter = ',')]
    pub key: Vec<String>,
}

pub fn run(args: DiffArgs, global: &GlobalOpts) -> Result<()> {
    // Project is optional here; it only contributes config
    let project = match &global.project {
        Some(path) => Project::discover_from(path).ok(),
        None => Project::discover().ok(),
    };
    let mut config = Config::load_for(project.as_ref());
    if !args.key.is_empty() {
        config.key_columns = Some(args.key.clone());
        config.id_column = None;
    }

    let load = |path: &PathBuf| {
        load_dataset_file(path).map_err(|e| miette::miette!("Failed to read {}: {}", path.display(), e))
    };
    let original = load(&args.original)?;
    let candidate = load(&args.candidate)?;

    let engine = config.diff_engine();
    let changeset = engine.diff(&original, &candidate);

    match effective_format(global, &config) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&changeset).into_diagnostic()?);
        }
        OutputFormat::Yaml => print!("{}", serde_yml::to_string(&changeset).into_diagnostic()?),
        _ => {
            if changeset.is_empty() && changeset.new_columns.is_empty() {
                if !global.quiet {
                    println!("{} No differences", style("✓").green());
                }
                return Ok(());
            }
            print!(
                "{}",
                format_changeset(&changeset, &original, &candidate, engine.identity())
            );
            if !global.quiet {
                println!();
                println!("{}", style(changeset.summary()).dim());
            }
        }
    }
    Ok(())
}
