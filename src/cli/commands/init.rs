//! `fmeca init` command - Initialize a new FMECA project

use console::style;
use miette::{IntoDiagnostic, Result};
use std::io::Write;

use crate::core::persistence::Backend;
use crate::core::project::{Project, ProjectError};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Storage backend to record in the project config
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Force initialization even if .fmeca/ already exists
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    // Create directory if it doesn't exist
    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    let project = if args.force {
        Project::init_force(&path)
    } else {
        Project::init(&path)
    };

    match project {
        Ok(project) => {
            if let Some(backend) = args.backend {
                let mut config = std::fs::OpenOptions::new()
                    .append(true)
                    .open(project.config_path())
                    .into_diagnostic()?;
                writeln!(config, "backend: {}", backend).into_diagnostic()?;
            }

            println!(
                "{} Initialized FMECA project at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            println!();
            println!("Next steps:");
            println!(
                "  {} Load an existing FMECA table",
                style("fmeca import table.csv").yellow()
            );
            println!(
                "  {} Stage an assistant's proposed edits",
                style("fmeca propose reply.json").yellow()
            );
            println!(
                "  {} Review the staged changes",
                style("fmeca show --preview").yellow()
            );
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} FMECA project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!("Use {} to reinitialize", style("fmeca init --force").yellow());
            Ok(())
        }
        Err(e) => Err(miette::miette!("{}", e)),
    }
}
