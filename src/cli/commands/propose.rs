//! `fmeca propose` command - Stage an assistant's proposed dataset

use console::style;
use miette::Result;
use std::path::PathBuf;
use tracing::info;

use crate::cli::helpers::open_session;
use crate::cli::GlobalOpts;
use crate::core::proposal::{ProposalService, ReplyFile};

#[derive(clap::Args, Debug)]
pub struct ProposeArgs {
    /// Assistant reply: {"message": ..., "candidate": [...]} or a bare array of rows
    pub reply: PathBuf,

    /// The instruction the reply answers, kept for the log
    #[arg(long, short = 'm')]
    pub instruction: Option<String>,
}

pub fn run(args: ProposeArgs, global: &GlobalOpts) -> Result<()> {
    let (mut session, config) = open_session(global)?;
    let instruction = args.instruction.unwrap_or_default();
    info!(reply = %args.reply.display(), instruction = %instruction, "reading proposal");

    let mut service = ReplyFile::new(&args.reply, config.column_policy());
    let proposal = service.propose(session.store().original(), &instruction)?;

    if !proposal.message.is_empty() && !global.quiet {
        println!("{} {}", style("→").blue(), proposal.message);
    }
    let has_candidate = proposal.candidate.is_some();

    match session.propose(proposal)? {
        Some(summary) => {
            println!("{} Staged changeset: {}", style("✓").green(), summary);
            if !global.quiet {
                println!();
                println!("  {} Review the changes", style("fmeca show --preview").yellow());
                println!("  {} Commit them", style("fmeca accept").yellow());
                println!("  {} Discard them", style("fmeca revert").yellow());
            }
        }
        None if has_candidate => {
            println!(
                "{} Proposal matches the current dataset; nothing staged",
                style("✓").green()
            );
        }
        None => {
            println!("{} Reply carries no data change", style("✓").green());
        }
    }
    Ok(())
}
