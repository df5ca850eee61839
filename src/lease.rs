//! Lease state machine.
//!
//! Claim, submit, and cancel are each a single compare-and-set against the
//! store — never a read followed by an unconditional write, which is
//! exactly the race this protocol exists to prevent. On a CAS miss the
//! manager re-reads the item once to name the conflict.

use crate::error::{Error, Result};
use crate::model::{Status, WorkId, WorkItem};
use crate::store::WorkStore;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub struct LeaseManager {
    store: Arc<dyn WorkStore>,
}

impl LeaseManager {
    pub fn new(store: Arc<dyn WorkStore>) -> Self {
        Self { store }
    }

    /// Reserve an unassigned item for a worker: `Unassigned -> InProgress`.
    ///
    /// For any id, at most one concurrent claim succeeds; the rest observe
    /// `AlreadyInProgress` (or `AlreadyComplete` once finished).
    pub async fn claim(&self, id: WorkId) -> Result<WorkItem> {
        let won = self
            .store
            .compare_and_set_status(id, Status::Unassigned, Status::InProgress, None)
            .await?;
        if !won {
            return Err(self.conflict(id, Status::Unassigned).await);
        }
        info!(%id, "claimed");
        self.store.get(id).await
    }

    /// Record the transcript: `InProgress -> Complete`.
    pub async fn submit(&self, id: WorkId, result_locator: &str) -> Result<WorkItem> {
        if result_locator.is_empty() {
            return Err(Error::Other(
                "result locator must be non-empty on completion".to_string(),
            ));
        }
        let won = self
            .store
            .compare_and_set_status(id, Status::InProgress, Status::Complete, Some(result_locator))
            .await?;
        if !won {
            return Err(self.conflict(id, Status::InProgress).await);
        }
        info!(%id, result_locator, "completed");
        self.store.get(id).await
    }

    /// Abandon a lease: `InProgress -> Unassigned`. The item becomes
    /// eligible for sampling again. This is the only rollback; nothing
    /// performs it implicitly.
    pub async fn cancel(&self, id: WorkId) -> Result<WorkItem> {
        let won = self
            .store
            .compare_and_set_status(id, Status::InProgress, Status::Unassigned, None)
            .await?;
        if !won {
            return Err(self.conflict(id, Status::InProgress).await);
        }
        info!(%id, "cancelled, back in the pool");
        self.store.get(id).await
    }

    /// Reconciliation pass: cancel every in-progress item whose lease is
    /// older than `idle_for`. Operator-driven only — there is no automatic
    /// lease expiry in the protocol itself.
    pub async fn reclaim_stale(&self, idle_for: Duration) -> Result<Vec<WorkId>> {
        let cutoff = Utc::now() - idle_for;
        let stale = self.store.stale_in_progress(cutoff).await?;

        let mut reclaimed = Vec::new();
        for item in stale {
            // Per-item CAS: a worker submitting concurrently wins.
            match self
                .store
                .compare_and_set_status(item.id, Status::InProgress, Status::Unassigned, None)
                .await
            {
                Ok(true) => {
                    warn!(id = %item.id, claimed_at = ?item.claimed_at, "reclaimed stale lease");
                    reclaimed.push(item.id);
                }
                Ok(false) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(reclaimed)
    }

    /// Name the conflict that made a CAS miss: re-read the item and map its
    /// current status to the typed error for the attempted transition.
    async fn conflict(&self, id: WorkId, expected: Status) -> Error {
        let current = match self.store.get(id).await {
            Ok(item) => item.status,
            Err(e) => return e,
        };
        match (expected, current) {
            (_, Status::Complete) => Error::AlreadyComplete(id),
            (Status::Unassigned, _) => Error::AlreadyInProgress(id),
            (_, _) => Error::NotInProgress(id),
        }
    }
}
