//! FMECA Stage: review AI-proposed edits to FMECA tables
//!
//! An assistant proposes a whole new version of a failure-mode table. This
//! crate diffs the proposal against the live dataset by derived row
//! identity, stages the result as a reviewable changeset, folds direct user
//! edits into it, and accepts or reverts it atomically.

pub mod cli;
pub mod core;
