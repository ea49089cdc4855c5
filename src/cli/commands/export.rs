//! `fmeca export` command - Write the dataset as CSV

use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use crate::cli::helpers::open_session;
use crate::cli::GlobalOpts;
use crate::core::spreadsheet::write_csv;

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Output file (default: stdout)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Export the staged preview instead of the current dataset
    #[arg(long)]
    pub preview: bool,
}

pub fn run(args: ExportArgs, global: &GlobalOpts) -> Result<()> {
    let (session, _config) = open_session(global)?;
    let store = session.store();

    let dataset = if args.preview {
        store.preview().into_dataset()
    } else {
        store.original().clone()
    };

    match &args.output {
        Some(path) => {
            let file = File::create(path).into_diagnostic()?;
            write_csv(&dataset, BufWriter::new(file)).map_err(|e| miette::miette!("{}", e))?;
            if !global.quiet {
                eprintln!(
                    "{} Exported {} row(s) to {}",
                    style("✓").green(),
                    style(dataset.len()).cyan(),
                    style(path.display()).cyan()
                );
            }
        }
        None => write_csv(&dataset, std::io::stdout()).map_err(|e| miette::miette!("{}", e))?,
    }
    Ok(())
}
