//! `fmeca import` command - Replace the dataset from a spreadsheet

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::open_session;
use crate::cli::GlobalOpts;
use crate::core::spreadsheet::load_dataset_file;

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// CSV or JSON file to import
    pub file: PathBuf,
}

pub fn run(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    let (mut session, _config) = open_session(global)?;

    let dataset = load_dataset_file(&args.file)
        .map_err(|e| miette::miette!("Failed to read {}: {}", args.file.display(), e))?;
    let (rows, columns) = (dataset.len(), dataset.columns.len());
    session.import(dataset)?;

    if !global.quiet {
        println!(
            "{} Imported {} row(s), {} column(s) from {}",
            style("✓").green(),
            style(rows).cyan(),
            columns,
            style(args.file.display()).cyan()
        );
    }
    Ok(())
}
