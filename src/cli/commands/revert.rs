//! `fmeca revert` command - Discard the staged changeset

use console::style;
use miette::Result;

use crate::cli::helpers::open_session_lenient;
use crate::cli::GlobalOpts;

#[derive(clap::Args, Debug)]
pub struct RevertArgs {}

pub fn run(_args: RevertArgs, global: &GlobalOpts) -> Result<()> {
    // Lenient so a stale or corrupt staged file can always be discarded
    let mut session = open_session_lenient(global)?;
    let had_staged = session.project().staged_path().exists();

    session.revert()?;

    if had_staged {
        println!("{} Reverted staged changeset", style("✓").green());
    } else if !global.quiet {
        println!("{} Nothing staged", style("✓").green());
    }
    Ok(())
}
