//! Dispatcher: the service front behind the HTTP API.
//!
//! Authenticates each request against the shared access credential, routes
//! to the sampler and lease manager, and orchestrates the sample-then-claim
//! sequence for `request_work`. Request handling is stateless — every call
//! carries the item id (or language) and nothing is held across requests;
//! correctness is delegated to the store's compare-and-set.

use crate::artifact::ArtifactStore;
use crate::error::{Error, Result};
use crate::lease::LeaseManager;
use crate::model::{Status, WorkId, WorkItem};
use crate::sampler::{Draw, Sampler};
use crate::store::WorkStore;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, error, info};

/// How many draws `request_work` attempts before reporting no work. Each
/// retry covers one lost claim race or one drained group.
const SAMPLE_ATTEMPTS: usize = 3;

pub struct Dispatcher {
    store: Arc<dyn WorkStore>,
    artifacts: Arc<dyn ArtifactStore>,
    sampler: Sampler,
    leases: LeaseManager,
    credential: SecretString,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn WorkStore>,
        artifacts: Arc<dyn ArtifactStore>,
        credential: SecretString,
    ) -> Self {
        Self {
            sampler: Sampler::new(Arc::clone(&store)),
            leases: LeaseManager::new(Arc::clone(&store)),
            store,
            artifacts,
            credential,
        }
    }

    /// Shared-credential equality check. A trust-boundary simplification,
    /// not a security model: no per-worker identity, no rate limiting.
    fn authenticate(&self, credential: &str) -> Result<()> {
        if credential == self.credential.expose_secret() {
            Ok(())
        } else {
            Err(Error::AuthInvalid)
        }
    }

    /// Sample an unassigned item for `language` and claim it atomically.
    ///
    /// A candidate that loses its claim race (another worker got the item
    /// between the draw and the CAS) triggers a re-draw; a group drained
    /// between the two sampling stages is excluded from the next draw.
    /// After a bounded number of attempts the caller gets `NoWorkAvailable`.
    pub async fn request_work(&self, language: &str, credential: &str) -> Result<WorkItem> {
        self.authenticate(credential)?;

        let mut exclude_groups: Vec<String> = Vec::new();
        for attempt in 1..=SAMPLE_ATTEMPTS {
            match self.sampler.draw(language, &exclude_groups).await? {
                Draw::Candidate(candidate) => {
                    match self.leases.claim(candidate.id).await {
                        Ok(item) => {
                            info!(id = %item.id, language, group_key = %item.group_key, "work dispatched");
                            return Ok(item);
                        }
                        Err(Error::AlreadyInProgress(id)) | Err(Error::AlreadyComplete(id)) => {
                            debug!(%id, attempt, "lost claim race, re-sampling");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Draw::Drained(group) => {
                    debug!(group, attempt, "group drained mid-draw, excluding");
                    exclude_groups.push(group);
                }
                Draw::Empty => return Err(Error::NoWorkAvailable),
            }
        }
        Err(Error::NoWorkAvailable)
    }

    /// Explicitly mark an item in progress. Distinct from `request_work`
    /// for workers that fetched metadata without committing to the work.
    pub async fn confirm_claim(&self, id: WorkId, credential: &str) -> Result<WorkItem> {
        self.authenticate(credential)?;
        self.leases.claim(id).await
    }

    /// Persist the uploaded transcript, then complete the item.
    ///
    /// The artifact write happens strictly before the completing
    /// transition, so a persist failure never leaves an item `Complete`
    /// without its transcript. The item's status is untouched on failure.
    pub async fn submit_result(
        &self,
        id: WorkId,
        credential: &str,
        data: &[u8],
    ) -> Result<WorkItem> {
        self.authenticate(credential)?;

        let item = self.store.get(id).await?;
        match item.status {
            Status::InProgress => {}
            Status::Complete => return Err(Error::AlreadyComplete(id)),
            Status::Unassigned => return Err(Error::NotInProgress(id)),
        }

        let locator = self.artifacts.persist(&item, data).await?;

        match self.leases.submit(id, &locator).await {
            Ok(item) => Ok(item),
            Err(e) => {
                // The transcript is on disk but the item raced out of
                // InProgress. Manual reconciliation picks these up.
                error!(%id, locator, %e, "artifact persisted but completion failed");
                Err(e)
            }
        }
    }

    /// Abandon a lease, returning the item to the unassigned pool.
    pub async fn cancel(&self, id: WorkId, credential: &str) -> Result<WorkItem> {
        self.authenticate(credential)?;
        self.leases.cancel(id).await
    }
}
