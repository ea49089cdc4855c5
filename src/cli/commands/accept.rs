//! `fmeca accept` command - Commit the staged changeset

use console::style;
use miette::Result;

use crate::cli::helpers::open_session;
use crate::cli::GlobalOpts;

#[derive(clap::Args, Debug)]
pub struct AcceptArgs {}

pub fn run(_args: AcceptArgs, global: &GlobalOpts) -> Result<()> {
    let (mut session, _config) = open_session(global)?;
    let summary = session
        .store()
        .changeset()
        .map(|c| c.summary())
        .unwrap_or_default();

    session.accept()?;

    println!("{} Accepted changeset: {}", style("✓").green(), summary);
    Ok(())
}
