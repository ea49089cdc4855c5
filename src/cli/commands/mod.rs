//! CLI command implementations

pub mod accept;
pub mod completions;
pub mod delete;
pub mod diff;
pub mod edit;
pub mod export;
pub mod import;
pub mod init;
pub mod propose;
pub mod revert;
pub mod show;
pub mod status;
