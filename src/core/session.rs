//! On-disk session: the stored dataset plus any pending changeset
//!
//! A [`StagingStore`] only lives as long as the process. The session
//! persists the staged part to `.fmeca/staged.json` between invocations,
//! tagged with a fingerprint of the dataset it was staged against so a
//! changeset is never replayed onto a dataset that changed underneath it.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::core::dataset::{CellValue, Dataset, Row};
use crate::core::diff::ChangeSummary;
use crate::core::persistence::{Persistence, PersistenceError};
use crate::core::preview::strip_dataset_markers;
use crate::core::project::{Project, ProjectError};
use crate::core::proposal::{apply_proposal, Proposal};
use crate::core::staging::{Staged, StagingError, StagingStore};

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("Storage error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Staging(#[from] StagingError),

    #[error("The staged changeset was made against a different version of the dataset")]
    #[diagnostic(
        code(fmeca::session::stale),
        help("Run `fmeca revert` to discard it, then propose again")
    )]
    StaleStaged,

    #[error("Staged changeset file is unreadable: {0}")]
    #[diagnostic(
        code(fmeca::session::corrupt),
        help("Run `fmeca revert` to discard it")
    )]
    CorruptStaged(String),
}

/// Contents of `.fmeca/staged.json`
#[derive(Debug, Serialize, Deserialize)]
struct StagedFile {
    dataset_sha256: String,
    staged: Staged,
}

/// Content hash of a dataset
pub fn fingerprint(dataset: &Dataset) -> Result<String, PersistenceError> {
    let content = serde_json::to_string(dataset)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// A project's dataset, backend and staging state
pub struct Session {
    project: Project,
    backend: Box<dyn Persistence>,
    store: StagingStore,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("project", &self.project)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a session, refusing staged state that no longer applies
    pub fn open(project: Project, config: &Config) -> Result<Self, SessionError> {
        Self::open_inner(project, config, false)
    }

    /// Open a session, discarding staged state that is stale or unreadable
    pub fn open_lenient(project: Project, config: &Config) -> Result<Self, SessionError> {
        Self::open_inner(project, config, true)
    }

    fn open_inner(project: Project, config: &Config, lenient: bool) -> Result<Self, SessionError> {
        let backend = config.backend().open(&project.fmeca_dir())?;
        let original = backend.load()?;

        let staged = match Self::read_staged(&project, &original) {
            Ok(staged) => staged,
            Err(e) if lenient => {
                warn!(error = %e, "discarding staged changeset");
                None
            }
            Err(e) => return Err(e),
        };

        debug!(
            rows = original.len(),
            staged = staged.is_some(),
            backend = %config.backend(),
            "opened session"
        );
        Ok(Self {
            project,
            backend,
            store: StagingStore::restore(original, config.diff_engine(), staged),
        })
    }

    fn read_staged(project: &Project, original: &Dataset) -> Result<Option<Staged>, SessionError> {
        let path = project.staged_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(PersistenceError::from)?;
        let file: StagedFile =
            serde_json::from_str(&content).map_err(|e| SessionError::CorruptStaged(e.to_string()))?;

        if file.dataset_sha256 != fingerprint(original)? {
            if Self::already_committed(&file.staged, original) {
                info!(id = %file.staged.id, "staged changeset was already accepted, removing");
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(error = %e, "could not remove staged changeset file");
                }
                return Ok(None);
            }
            return Err(SessionError::StaleStaged);
        }
        Ok(Some(file.staged))
    }

    /// An accept that saved the dataset but failed to remove `staged.json`
    /// leaves the stored dataset equal to the cleaned proposal
    fn already_committed(staged: &Staged, original: &Dataset) -> bool {
        let mut committed = staged.proposed.clone();
        strip_dataset_markers(&mut committed);
        &committed == original
    }

    /// Write or remove `staged.json` to match the store
    fn save_staged(&self) -> Result<(), SessionError> {
        let path = self.project.staged_path();
        match self.store.staged() {
            Some(staged) => {
                let file = StagedFile {
                    dataset_sha256: fingerprint(self.store.original())?,
                    staged: staged.clone(),
                };
                let content = serde_json::to_string_pretty(&file).map_err(PersistenceError::from)?;
                std::fs::write(&path, content).map_err(PersistenceError::from)?;
            }
            None => {
                if path.exists() {
                    std::fs::remove_file(&path).map_err(PersistenceError::from)?;
                }
            }
        }
        Ok(())
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn store(&self) -> &StagingStore {
        &self.store
    }

    /// Replace the dataset wholesale. Refused while a changeset is staged.
    pub fn import(&mut self, dataset: Dataset) -> Result<(), SessionError> {
        if self.store.has_staged_changes() {
            return Err(StagingError::AlreadyStaged.into());
        }
        self.backend.save(&dataset)?;
        self.store.replace_original(dataset)?;
        Ok(())
    }

    /// Stage a proposal. Returns the staged summary, or `None` if nothing
    /// was staged.
    pub fn propose(&mut self, proposal: Proposal) -> Result<Option<ChangeSummary>, SessionError> {
        let summary = apply_proposal(&mut self.store, proposal)?.map(|s| s.changeset.summary());
        self.save_staged()?;
        Ok(summary)
    }

    /// Direct cell edit; persisted to the dataset when idle, to the staged
    /// changeset otherwise
    pub fn edit(&mut self, row: usize, column: &str, value: CellValue) -> Result<(), SessionError> {
        self.store.edit_cell(row, column, value)?;
        self.persist_edit()
    }

    pub fn delete(&mut self, row: usize) -> Result<Row, SessionError> {
        let removed = self.store.delete_row(row)?;
        self.persist_edit()?;
        Ok(removed)
    }

    fn persist_edit(&mut self) -> Result<(), SessionError> {
        if self.store.has_staged_changes() {
            self.save_staged()
        } else {
            self.backend.save(self.store.original())?;
            Ok(())
        }
    }

    pub fn accept(&mut self) -> Result<(), SessionError> {
        let backend = &mut self.backend;
        self.store.accept(|dataset| backend.save(dataset))?;
        self.save_staged()
    }

    pub fn revert(&mut self) -> Result<(), SessionError> {
        self.store.revert()?;
        self.save_staged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::persistence::Backend;
    use crate::core::staging::Phase;
    use crate::core::testing::{fmeca_row, with_columns};
    use tempfile::TempDir;

    fn setup(backend: Backend) -> (TempDir, Config) {
        let tmp = tempfile::tempdir().unwrap();
        Project::init(tmp.path()).unwrap();
        let config = Config {
            backend: Some(backend),
            ..Default::default()
        };
        (tmp, config)
    }

    fn open(tmp: &TempDir, config: &Config) -> Result<Session, SessionError> {
        Session::open(Project::discover_from(tmp.path()).unwrap(), config)
    }

    fn seeded() -> Dataset {
        with_columns(vec![
            fmeca_row("Pump", "Seal", "P-100", "3"),
            fmeca_row("Fan", "Motor", "F-200", "5"),
        ])
    }

    fn proposal() -> Proposal {
        Proposal {
            message: "Raise seal severity".into(),
            candidate: Some(with_columns(vec![
                fmeca_row("Pump", "Seal", "P-100", "8"),
                fmeca_row("Fan", "Motor", "F-200", "5"),
            ])),
        }
    }

    #[test]
    fn test_staged_state_survives_reopen() {
        let (tmp, config) = setup(Backend::Json);
        let mut session = open(&tmp, &config).unwrap();
        session.import(seeded()).unwrap();

        let summary = session.propose(proposal()).unwrap().unwrap();
        assert_eq!(summary.modified_cells, 1);

        let mut session = open(&tmp, &config).unwrap();
        assert_eq!(session.store().phase(), Phase::Staged);
        session.edit(1, "Severity", CellValue::from("6")).unwrap();

        let mut session = open(&tmp, &config).unwrap();
        assert_eq!(session.store().changeset().unwrap().modified.len(), 2);
        session.accept().unwrap();

        let session = open(&tmp, &config).unwrap();
        assert_eq!(session.store().phase(), Phase::Idle);
        assert_eq!(session.store().original().rows[0].text("Severity"), "8");
        assert_eq!(session.store().original().rows[1].text("Severity"), "6");
        assert!(!session.project().staged_path().exists());
    }

    #[test]
    fn test_stale_staged_state_is_refused() {
        let (tmp, config) = setup(Backend::Sqlite);
        let mut session = open(&tmp, &config).unwrap();
        session.import(seeded()).unwrap();
        session.propose(proposal()).unwrap();

        // Dataset changes behind the staged changeset's back
        let mut backend = config.backend().open(&tmp.path().join(".fmeca")).unwrap();
        backend.save(&Dataset::default()).unwrap();

        assert!(matches!(open(&tmp, &config), Err(SessionError::StaleStaged)));

        let project = Project::discover_from(tmp.path()).unwrap();
        let mut session = Session::open_lenient(project, &config).unwrap();
        assert_eq!(session.store().phase(), Phase::Idle);
        session.revert().unwrap();
        assert!(open(&tmp, &config).is_ok());
    }

    #[test]
    fn test_committed_but_unremoved_staged_file_is_cleared() {
        let (tmp, config) = setup(Backend::Json);
        let mut session = open(&tmp, &config).unwrap();
        session.import(seeded()).unwrap();
        session.propose(proposal()).unwrap();

        // Accept saved the dataset, then died before removing staged.json
        let committed = proposal().candidate.unwrap();
        let mut backend = config.backend().open(&tmp.path().join(".fmeca")).unwrap();
        backend.save(&committed).unwrap();

        let session = open(&tmp, &config).unwrap();
        assert_eq!(session.store().phase(), Phase::Idle);
        assert_eq!(session.store().original(), &committed);
        assert!(!session.project().staged_path().exists());
    }

    #[test]
    fn test_idle_edit_is_saved_to_backend() {
        let (tmp, config) = setup(Backend::Json);
        let mut session = open(&tmp, &config).unwrap();
        session.import(seeded()).unwrap();

        session.edit(0, "Severity", CellValue::from("9")).unwrap();
        let removed = session.delete(1).unwrap();
        assert_eq!(removed.text("FLOC"), "F-200");

        let session = open(&tmp, &config).unwrap();
        assert_eq!(session.store().original().len(), 1);
        assert_eq!(session.store().original().rows[0].text("Severity"), "9");
    }

    #[test]
    fn test_import_refused_while_staged() {
        let (tmp, config) = setup(Backend::Json);
        let mut session = open(&tmp, &config).unwrap();
        session.import(seeded()).unwrap();
        session.propose(proposal()).unwrap();

        assert!(matches!(
            session.import(Dataset::default()),
            Err(SessionError::Staging(StagingError::AlreadyStaged))
        ));
    }

    #[test]
    fn test_revert_removes_staged_file() {
        let (tmp, config) = setup(Backend::Json);
        let mut session = open(&tmp, &config).unwrap();
        session.import(seeded()).unwrap();
        session.propose(proposal()).unwrap();
        assert!(session.project().staged_path().exists());

        session.revert().unwrap();
        assert!(!session.project().staged_path().exists());
        assert_eq!(session.store().original(), &seeded());
    }
}
