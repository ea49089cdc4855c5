//! `fmeca show` command - Print the dataset or the staged preview

use console::style;
use miette::Result;

use crate::cli::helpers::{effective_format, open_session};
use crate::cli::table::{output_preview, TableConfig};
use crate::cli::GlobalOpts;
use crate::core::preview::Preview;

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Show the staged preview: modifications overlaid, added rows appended
    #[arg(long, short = 'p')]
    pub preview: bool,

    /// Maximum column width in table output
    #[arg(long, default_value = "30")]
    pub max_width: usize,
}

pub fn run(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let (session, config) = open_session(global)?;
    let store = session.store();

    let preview = if args.preview {
        if !store.has_staged_changes() && !global.quiet {
            eprintln!("{} Nothing staged; showing the current dataset", style("!").yellow());
        }
        store.preview()
    } else {
        Preview::idle(store.original())
    };

    let table = TableConfig {
        max_width: args.max_width,
        show_summary: !global.quiet,
    };
    output_preview(&preview, effective_format(global, &config), &table)
}
