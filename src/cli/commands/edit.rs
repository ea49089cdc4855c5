//! `fmeca edit` command - Direct cell edit

use console::style;
use miette::Result;

use crate::cli::helpers::open_session;
use crate::cli::GlobalOpts;
use crate::core::CellValue;

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Row index as shown by `fmeca show` (or `show --preview` while staged)
    pub row: usize,

    /// Column name
    pub column: String,

    /// New value; an empty string clears the cell
    pub value: String,
}

pub fn run(args: EditArgs, global: &GlobalOpts) -> Result<()> {
    let (mut session, _config) = open_session(global)?;
    session.edit(args.row, &args.column, CellValue::from(args.value.as_str()))?;

    if !global.quiet {
        let target = if session.store().has_staged_changes() {
            "staged changeset"
        } else {
            "dataset"
        };
        println!(
            "{} Set {} on row {} in the {}",
            style("✓").green(),
            style(&args.column).cyan(),
            args.row,
            target
        );
    }
    Ok(())
}
