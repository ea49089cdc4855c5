//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    accept::AcceptArgs, completions::CompletionsArgs, delete::DeleteArgs, diff::DiffArgs,
    edit::EditArgs, export::ExportArgs, import::ImportArgs, init::InitArgs, propose::ProposeArgs,
    revert::RevertArgs, show::ShowArgs, status::StatusArgs,
};

#[derive(Parser)]
#[command(name = "fmeca")]
#[command(author, version, about = "FMECA staging engine")]
#[command(long_about = "Review AI-proposed edits to FMECA tables as staged changesets that are accepted or reverted as a whole.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .fmeca/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new FMECA project
    Init(InitArgs),

    /// Replace the dataset with a CSV or JSON file
    Import(ImportArgs),

    /// Write the dataset (or the staged preview) as CSV
    Export(ExportArgs),

    /// Show the dataset, or the staged preview with highlights
    Show(ShowArgs),

    /// Diff two dataset files without staging anything
    Diff(DiffArgs),

    /// Stage the candidate dataset from an assistant reply
    Propose(ProposeArgs),

    /// Edit a single cell
    Edit(EditArgs),

    /// Delete a row
    Delete(DeleteArgs),

    /// Commit the staged changeset
    Accept(AcceptArgs),

    /// Discard the staged changeset
    Revert(RevertArgs),

    /// Show what is staged
    Status(StatusArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (table on a terminal)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
}
