//! `fmeca delete` command - Delete a row

use console::style;
use miette::Result;

use crate::cli::helpers::open_session;
use crate::cli::GlobalOpts;

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Row index as shown by `fmeca show` (or `show --preview` while staged)
    pub row: usize,
}

pub fn run(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let (mut session, _config) = open_session(global)?;
    let removed = session.delete(args.row)?;

    if !global.quiet {
        let key = session.store().engine().identity().key_of(&removed);
        println!(
            "{} Deleted row {} ({})",
            style("✓").green(),
            args.row,
            style(key).cyan()
        );
    }
    Ok(())
}
