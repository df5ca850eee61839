//! Stratified work sampling.
//!
//! Items are not drawn uniformly by raw count: a group (author/publisher)
//! is drawn first, then an item uniformly within that group. Groups with
//! disproportionately many episodes would otherwise dominate early draws
//! and skew dataset diversity.

use crate::error::Result;
use crate::model::WorkItem;
use crate::store::WorkStore;
use std::sync::Arc;

/// Outcome of a single two-stage draw.
#[derive(Debug)]
pub enum Draw {
    /// An unassigned candidate. Still unclaimed as of the read; the caller
    /// must claim it through the lease manager before handing it out.
    Candidate(WorkItem),
    /// The drawn group had no unassigned items left — another claimer got
    /// there between the two stages. The caller may retry, excluding it.
    Drained(String),
    /// No group has unassigned work for this language.
    Empty,
}

pub struct Sampler {
    store: Arc<dyn WorkStore>,
}

impl Sampler {
    pub fn new(store: Arc<dyn WorkStore>) -> Self {
        Self { store }
    }

    /// One stratified draw: pick a group uniformly among groups that still
    /// have unassigned items, then an item uniformly within it. Stage two
    /// re-filters for `unassigned`, so concurrent mutation between the
    /// stages degrades to `Drained` rather than a stale read.
    pub async fn draw(&self, language: &str, exclude_groups: &[String]) -> Result<Draw> {
        let Some(group) = self.store.sample_group(language, exclude_groups).await? else {
            return Ok(Draw::Empty);
        };

        match self.store.sample_unassigned(language, &group).await? {
            Some(item) => Ok(Draw::Candidate(item)),
            None => Ok(Draw::Drained(group)),
        }
    }
}
