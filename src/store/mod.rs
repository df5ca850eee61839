//! Work item store port.
//!
//! The store is the only shared mutable resource in the system. Everything
//! the lease state machine needs is expressed through this trait so the
//! sampler, lease manager, and dispatcher run unchanged against Postgres in
//! production and the in-memory store in tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::Db;

use crate::error::Result;
use crate::model::{NewWorkItem, Status, WorkId, WorkItem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable table of work items. `compare_and_set_status` is the single
/// mutator; all lifecycle transitions go through it.
#[async_trait]
pub trait WorkStore: Send + Sync {
    /// Insert a new item with status `Unassigned`.
    async fn insert(&self, new: NewWorkItem) -> Result<WorkItem>;

    /// Fetch an item by id. `NotFound` if unknown.
    async fn get(&self, id: WorkId) -> Result<WorkItem>;

    /// Pick one group key uniformly at random among distinct groups that
    /// still have unassigned items for `language`, skipping `exclude_groups`.
    async fn sample_group(
        &self,
        language: &str,
        exclude_groups: &[String],
    ) -> Result<Option<String>>;

    /// Pick one unassigned item uniformly at random within a group. The
    /// status filter is re-applied here, so a concurrent claim between the
    /// two sampling stages yields `None` rather than a stale read.
    async fn sample_unassigned(
        &self,
        language: &str,
        group_key: &str,
    ) -> Result<Option<WorkItem>>;

    /// Atomically move `id` from `expected` to `new`, recording
    /// `result_locator` alongside. Returns false (no-op) when the current
    /// status does not match `expected` — the mechanism that prevents
    /// double-assignment. Transitions outside the legal table fail with
    /// `InvalidTransition` without touching the row.
    ///
    /// Entering `InProgress` stamps `claimed_at`; leaving it clears the stamp.
    async fn compare_and_set_status(
        &self,
        id: WorkId,
        expected: Status,
        new: Status,
        result_locator: Option<&str>,
    ) -> Result<bool>;

    /// List items, newest first, optionally filtered by status and language.
    async fn list(
        &self,
        status: Option<Status>,
        language: Option<&str>,
        limit: i64,
    ) -> Result<Vec<WorkItem>>;

    /// In-progress items whose lease is older than `claimed_before`.
    async fn stale_in_progress(&self, claimed_before: DateTime<Utc>) -> Result<Vec<WorkItem>>;
}
