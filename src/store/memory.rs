//! In-memory work item store.
//!
//! Implements the same contract as the Postgres store behind a single
//! mutex, which makes every compare-and-set trivially atomic. Used by the
//! test suites and for local experiments without a database. The rng is
//! seedable so sampling distributions can be checked deterministically.

use crate::error::{Error, Result};
use crate::model::{NewWorkItem, Status, WorkId, WorkItem};
use crate::store::WorkStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Mutex;

/// In-memory store state.
struct Inner {
    /// All items, keyed by id. BTreeMap keeps iteration order stable so a
    /// seeded rng produces reproducible draws.
    items: BTreeMap<WorkId, WorkItem>,
    rng: StdRng,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Store with a fixed sampling seed, for deterministic tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: BTreeMap::new(),
                rng,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkStore for MemoryStore {
    async fn insert(&self, new: NewWorkItem) -> Result<WorkItem> {
        let item = new.build();
        let mut inner = self.inner.lock().await;
        inner.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get(&self, id: WorkId) -> Result<WorkItem> {
        let inner = self.inner.lock().await;
        inner
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("work item {id}")))
    }

    async fn sample_group(
        &self,
        language: &str,
        exclude_groups: &[String],
    ) -> Result<Option<String>> {
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;

        let groups: BTreeSet<&str> = inner
            .items
            .values()
            .filter(|item| item.status == Status::Unassigned && item.language == language)
            .map(|item| item.group_key.as_str())
            .filter(|group| !exclude_groups.iter().any(|ex| ex == group))
            .collect();

        if groups.is_empty() {
            return Ok(None);
        }
        let idx = inner.rng.gen_range(0..groups.len());
        Ok(groups.into_iter().nth(idx).map(String::from))
    }

    async fn sample_unassigned(
        &self,
        language: &str,
        group_key: &str,
    ) -> Result<Option<WorkItem>> {
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;

        let candidates: Vec<&WorkItem> = inner
            .items
            .values()
            .filter(|item| {
                item.status == Status::Unassigned
                    && item.language == language
                    && item.group_key == group_key
            })
            .collect();

        if candidates.is_empty() {
            return Ok(None);
        }
        let idx = inner.rng.gen_range(0..candidates.len());
        Ok(Some(candidates[idx].clone()))
    }

    async fn compare_and_set_status(
        &self,
        id: WorkId,
        expected: Status,
        new: Status,
        result_locator: Option<&str>,
    ) -> Result<bool> {
        if !expected.can_transition_to(new) {
            return Err(Error::InvalidTransition {
                from: expected,
                to: new,
            });
        }

        let mut inner = self.inner.lock().await;
        let Some(item) = inner.items.get_mut(&id) else {
            return Ok(false);
        };
        if item.status != expected {
            return Ok(false);
        }

        let now = Utc::now();
        item.status = new;
        item.result_locator = result_locator.map(String::from);
        item.claimed_at = (new == Status::InProgress).then_some(now);
        item.updated_at = now;
        Ok(true)
    }

    async fn list(
        &self,
        status: Option<Status>,
        language: Option<&str>,
        limit: i64,
    ) -> Result<Vec<WorkItem>> {
        let inner = self.inner.lock().await;
        let mut items: Vec<WorkItem> = inner
            .items
            .values()
            .filter(|item| status.is_none_or(|s| item.status == s))
            .filter(|item| language.is_none_or(|l| item.language == l))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }

    async fn stale_in_progress(&self, claimed_before: DateTime<Utc>) -> Result<Vec<WorkItem>> {
        let inner = self.inner.lock().await;
        let mut items: Vec<WorkItem> = inner
            .items
            .values()
            .filter(|item| {
                item.status == Status::InProgress
                    && item.claimed_at.is_some_and(|at| at < claimed_before)
            })
            .cloned()
            .collect();
        items.sort_by_key(|item| item.claimed_at);
        Ok(items)
    }
}
