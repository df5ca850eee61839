//! Error types for scribeq.
//!
//! Business-rule violations (auth, state conflicts, not-found) are typed
//! variants the dispatcher reports to callers without crashing. Store
//! connectivity failures surface as `StoreUnavailable` and are left to the
//! caller to retry.

use crate::model::{Status, WorkId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid credential")]
    AuthInvalid,

    #[error("no work available")]
    NoWorkAvailable,

    #[error("work item not found: {0}")]
    NotFound(String),

    #[error("work item {0} is already in progress")]
    AlreadyInProgress(WorkId),

    #[error("work item {0} is already complete")]
    AlreadyComplete(WorkId),

    #[error("work item {0} is not in progress")]
    NotInProgress(WorkId),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("artifact persist failure: {0}")]
    ArtifactPersist(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
