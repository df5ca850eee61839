//! Core data model.
//!
//! A work item is one transcribable episode. It has identity, sampling keys
//! (group + language), locators for the input audio, and a lifecycle status
//! that is the single source of truth for assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A unit of transcription work tracked by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique identifier.
    pub id: WorkId,

    /// Publisher/author key used for stratified sampling. Immutable.
    pub group_key: String,

    /// Locale tag; partition key for sampling. Immutable.
    pub language: String,

    /// Reference to the original input audio (e.g. the feed's media URL).
    pub source_locator: String,

    /// Reference to the cached copy of the input audio. Immutable once set.
    pub cache_locator: String,

    /// Current lifecycle status.
    pub status: Status,

    /// Locator of the produced transcript. `Some` iff status is `Complete`.
    pub result_locator: Option<String>,

    /// When the current lease was taken. Set on claim, cleared on cancel.
    pub claimed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Newtype for work item IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkId(pub Uuid);

impl WorkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for WorkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for WorkId {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Eligible for sampling, no worker holds it.
    Unassigned,
    /// Leased to a worker; excluded from sampling until submit or cancel.
    InProgress,
    /// Transcript recorded. Terminal.
    Complete,
}

impl Status {
    /// Can transition from self to `to`?
    ///
    /// `InProgress -> Unassigned` is the single permitted rollback and only
    /// ever happens through an explicit cancel.
    pub fn can_transition_to(self, to: Status) -> bool {
        use Status::*;
        matches!(
            (self, to),
            (Unassigned, InProgress) | (InProgress, Complete) | (InProgress, Unassigned)
        )
    }

    /// Is this a terminal status?
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Complete)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Unassigned => "unassigned",
            Status::InProgress => "in_progress",
            Status::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Status {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unassigned" => Ok(Status::Unassigned),
            "in_progress" => Ok(Status::InProgress),
            "complete" => Ok(Status::Complete),
            other => Err(crate::error::Error::Other(format!(
                "unknown status: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for creating new work items. Used by the ingestion side.
pub struct NewWorkItem {
    pub(crate) group_key: String,
    pub(crate) language: String,
    pub(crate) source_locator: String,
    pub(crate) cache_locator: String,
}

impl NewWorkItem {
    pub fn new(group_key: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            group_key: group_key.into(),
            language: language.into(),
            source_locator: String::new(),
            cache_locator: String::new(),
        }
    }

    pub fn source_locator(mut self, locator: impl Into<String>) -> Self {
        self.source_locator = locator.into();
        self
    }

    pub fn cache_locator(mut self, locator: impl Into<String>) -> Self {
        self.cache_locator = locator.into();
        self
    }

    /// Materialize the item with a fresh id, `Unassigned` status, timestamps.
    pub fn build(self) -> WorkItem {
        let now = Utc::now();
        WorkItem {
            id: WorkId::new(),
            group_key: self.group_key,
            language: self.language,
            source_locator: self.source_locator,
            cache_locator: self.cache_locator,
            status: Status::Unassigned,
            result_locator: None,
            claimed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
