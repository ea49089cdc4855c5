//! Core module - the diff/staging engine and its collaborators

pub mod config;
pub mod controller;
pub mod dataset;
pub mod diff;
pub mod identity;
pub mod merge;
pub mod persistence;
pub mod preview;
pub mod project;
pub mod proposal;
pub mod session;
pub mod spreadsheet;
pub mod staging;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use controller::CommitTicket;
pub use dataset::{values_equal, CellValue, Dataset, Row};
pub use diff::{AddedRow, CellChange, ChangeSummary, Changeset, DeletedRow, DiffEngine, RowPair};
pub use identity::{CompositeKey, IdColumn, RowIdentity, RowKey};
pub use merge::ChangeMerger;
pub use persistence::{Backend, JsonFileStore, Persistence, PersistenceError, SqliteStore};
pub use preview::{Preview, PreviewRow, RowOrigin};
pub use project::{Project, ProjectError};
pub use proposal::{ColumnPolicy, Proposal, ProposalError, ProposalService, ReplyFile};
pub use session::{Session, SessionError};
pub use staging::{Phase, Staged, StagingError, StagingStore};
