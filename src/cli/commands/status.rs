//! `fmeca status` command - What is staged

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{effective_format, open_session};
use crate::cli::table::format_changeset;
use crate::cli::{GlobalOpts, OutputFormat};

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// List every staged change, not just the counts
    #[arg(long)]
    pub detailed: bool,
}

pub fn run(args: StatusArgs, global: &GlobalOpts) -> Result<()> {
    let (session, config) = open_session(global)?;
    let store = session.store();
    let original = store.original();

    match effective_format(global, &config) {
        OutputFormat::Json => {
            let staged = store.staged().map(|s| {
                serde_json::json!({
                    "id": s.id.to_string(),
                    "staged_at": s.staged_at,
                    "summary": s.changeset.summary(),
                    "new_columns": s.changeset.new_columns,
                })
            });
            let status = serde_json::json!({
                "phase": store.phase(),
                "rows": original.len(),
                "columns": original.columns,
                "backend": config.backend().to_string(),
                "key_columns": store.engine().identity().key_columns(),
                "staged": staged,
            });
            println!("{}", serde_json::to_string_pretty(&status).into_diagnostic()?);
        }
        _ => {
            println!("{}", style("FMECA Project Status").bold().underlined());
            println!("{}", "═".repeat(40));
            println!(
                "Dataset:  {} row(s), {} column(s) ({})",
                style(original.len()).cyan(),
                original.columns.len(),
                config.backend()
            );
            println!(
                "Key:      {}",
                store.engine().identity().key_columns().join(" + ")
            );

            match store.staged() {
                None => println!("Staged:   {}", style("nothing").dim()),
                Some(staged) => {
                    println!(
                        "Staged:   {} ({})",
                        style(staged.changeset.summary()).yellow(),
                        staged.staged_at.format("%Y-%m-%d %H:%M UTC")
                    );
                    println!("Id:       {}", style(staged.id).dim());
                    if args.detailed {
                        println!();
                        print!(
                            "{}",
                            format_changeset(
                                &staged.changeset,
                                original,
                                &staged.proposed,
                                store.engine().identity()
                            )
                        );
                    }
                }
            }
        }
    }
    Ok(())
}
