//! # scribeq
//!
//! Work-leasing dispatcher for distributed transcription workers.
//!
//! A pool of independent workers polls the dispatcher for untranscribed
//! episodes. Each item moves through `unassigned -> in_progress ->
//! complete`, with every transition a single compare-and-set against the
//! Postgres-backed work item store, so no two workers ever receive the
//! same item.

pub mod api;
pub mod artifact;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lease;
pub mod model;
pub mod sampler;
pub mod store;
pub mod telemetry;
