//! Accept / revert: resolving a staged changeset
//!
//! Accept is the only operation that can fail, and it fails atomically: the
//! original is replaced only after persistence succeeds. The commit is split
//! into [`StagingStore::begin_accept`] and [`StagingStore::finish_accept`] so
//! callers that persist asynchronously can hold a [`CommitTicket`] across the
//! wait; every other mutation is refused until the ticket is finished.

use tracing::{info, warn};
use ulid::Ulid;

use crate::core::dataset::Dataset;
use crate::core::persistence::PersistenceError;
use crate::core::preview::strip_dataset_markers;
use crate::core::staging::{StagingError, StagingStore};

/// Proof that a commit is in flight, carrying the cleaned dataset to persist
#[derive(Debug)]
#[must_use = "a commit ticket must be passed to finish_accept"]
pub struct CommitTicket {
    id: Ulid,
    dataset: Dataset,
}

impl CommitTicket {
    /// Id of the staged changeset being committed
    pub fn id(&self) -> Ulid {
        self.id
    }

    /// The proposal with rendering markers stripped
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}

impl StagingStore {
    /// Start committing the staged proposal
    pub fn begin_accept(&mut self) -> Result<CommitTicket, StagingError> {
        self.ensure_not_committing()?;
        let staged = self.staged.as_ref().ok_or(StagingError::NotStaged)?;

        let mut dataset = staged.proposed.clone();
        strip_dataset_markers(&mut dataset);

        self.committing = Some(staged.id);
        Ok(CommitTicket {
            id: staged.id,
            dataset,
        })
    }

    /// Finish a commit with the outcome of persisting the ticket's dataset.
    ///
    /// On success the cleaned proposal becomes the original and the store is
    /// cleared. On failure the staged changeset is left exactly as it was.
    pub fn finish_accept(
        &mut self,
        ticket: CommitTicket,
        outcome: Result<(), PersistenceError>,
    ) -> Result<(), StagingError> {
        if self.committing != Some(ticket.id) {
            return Err(StagingError::StaleTicket { ticket: ticket.id });
        }
        self.committing = None;

        match outcome {
            Ok(()) => {
                self.original = ticket.dataset;
                self.staged = None;
                info!(id = %ticket.id, rows = self.original.len(), "accepted changeset");
                Ok(())
            }
            Err(e) => {
                warn!(id = %ticket.id, error = %e, "accept failed, changeset remains staged");
                Err(StagingError::Persistence(e))
            }
        }
    }

    /// Persist the staged proposal with `persist` and commit it
    pub fn accept<F>(&mut self, persist: F) -> Result<(), StagingError>
    where
        F: FnOnce(&Dataset) -> Result<(), PersistenceError>,
    {
        let ticket = self.begin_accept()?;
        let outcome = persist(ticket.dataset());
        self.finish_accept(ticket, outcome)
    }

    /// Discard the staged proposal. The original is untouched.
    ///
    /// Only refused while a commit is in flight.
    pub fn revert(&mut self) -> Result<(), StagingError> {
        self.ensure_not_committing()?;
        if let Some(staged) = self.staged.take() {
            info!(id = %staged.id, "reverted changeset");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::Row;
    use crate::core::preview::ADDED_MARKER;
    use crate::core::staging::Phase;
    use crate::core::testing::{fmeca_row, with_columns};

    fn staged_store() -> StagingStore {
        let original = with_columns(vec![Row::from([
            ("FLOC", "A"),
            ("Component", "Pump"),
            ("Severity", "3"),
        ])]);
        let candidate = with_columns(vec![Row::from([
            ("FLOC", "A"),
            ("Component", "Pump"),
            ("Severity", "5"),
        ])]);
        let mut store = StagingStore::new(original);
        store.stage_candidate(candidate).unwrap();
        store
    }

    fn network_error() -> PersistenceError {
        PersistenceError::Rejected("connection reset".to_string())
    }

    #[test]
    fn test_accept_replaces_original() {
        let mut store = staged_store();
        let mut saved = None;

        store
            .accept(|d| {
                saved = Some(d.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(store.phase(), Phase::Idle);
        assert_eq!(store.original().rows[0].text("Severity"), "5");
        assert_eq!(saved.as_ref(), Some(store.original()));
    }

    #[test]
    fn test_failed_accept_leaves_state_untouched() {
        let mut store = staged_store();
        let original = store.original().clone();
        let staged = serde_json::to_vec(store.staged().unwrap()).unwrap();

        let err = store.accept(|_| Err(network_error())).unwrap_err();

        assert!(matches!(err, StagingError::Persistence(_)));
        assert_eq!(store.original(), &original);
        assert!(store.has_staged_changes());
        assert_eq!(store.phase(), Phase::Staged);
        assert_eq!(serde_json::to_vec(store.staged().unwrap()).unwrap(), staged);

        // Retry succeeds
        store.accept(|_| Ok(())).unwrap();
        assert_eq!(store.original().rows[0].text("Severity"), "5");
    }

    #[test]
    fn test_concurrent_accept_is_rejected() {
        let mut store = staged_store();
        let ticket = store.begin_accept().unwrap();
        assert_eq!(store.phase(), Phase::Committing);

        assert!(matches!(store.begin_accept(), Err(StagingError::AlreadyCommitting)));
        assert!(matches!(
            store.edit_cell(0, "Severity", "1"),
            Err(StagingError::AlreadyCommitting)
        ));
        assert!(matches!(store.delete_row(0), Err(StagingError::AlreadyCommitting)));
        assert!(matches!(store.revert(), Err(StagingError::AlreadyCommitting)));

        store.finish_accept(ticket, Ok(())).unwrap();
        assert_eq!(store.phase(), Phase::Idle);
    }

    #[test]
    fn test_ticket_from_another_store_is_stale() {
        let mut a = staged_store();
        let mut b = staged_store();
        let _ticket_a = a.begin_accept().unwrap();
        let ticket_b = b.begin_accept().unwrap();

        assert!(matches!(
            a.finish_accept(ticket_b, Ok(())),
            Err(StagingError::StaleTicket { .. })
        ));
        assert_eq!(a.phase(), Phase::Committing);
    }

    #[test]
    fn test_accept_without_staged_changes() {
        let mut store = StagingStore::new(with_columns(vec![fmeca_row("Pump", "Seal", "P-1", "3")]));
        assert!(matches!(store.accept(|_| Ok(())), Err(StagingError::NotStaged)));
    }

    #[test]
    fn test_revert_is_pure() {
        let original = with_columns(vec![fmeca_row("Pump", "Seal", "P-100", "3")]);
        let mut store = StagingStore::new(original.clone());
        let before = store.preview();

        store
            .stage_candidate(with_columns(vec![fmeca_row("Pump", "Seal", "P-100", "9")]))
            .unwrap();
        store.edit_cell(0, "Severity", "7").unwrap();
        store.revert().unwrap();

        assert_eq!(store.original(), &original);
        assert_eq!(store.preview(), before);
        assert_eq!(store.phase(), Phase::Idle);

        // Reverting with nothing staged is a no-op
        store.revert().unwrap();
    }

    #[test]
    fn test_accept_strips_markers() {
        let original = with_columns(vec![fmeca_row("Pump", "Seal", "P-100", "3")]);
        let mut candidate = with_columns(vec![fmeca_row("Pump", "Seal", "P-100", "3")]);
        let mut added = fmeca_row("Fan", "Motor", "F-200", "4");
        added.set(ADDED_MARKER, "true");
        candidate.rows.push(added);
        candidate.ensure_column(ADDED_MARKER);

        let mut store = StagingStore::new(original.clone());
        let cs = store.engine().diff(&original, &candidate);
        store.stage(candidate, cs).unwrap();
        store.accept(|_| Ok(())).unwrap();

        assert!(!store.original().has_column(ADDED_MARKER));
        assert!(store.original().rows.iter().all(|r| r.get(ADDED_MARKER).is_none()));
        assert_eq!(store.original().len(), 2);
    }
}
