//! # Storage
//!
//! In-process persistence for generation jobs.
//!
//! [`InMemoryJobRepository`] implements [`gen_core::JobRepository`]: jobs are
//! keyed by id, stage logs are append-only per job and deduplicated by
//! `log_id`, and every persisted artifact gets a fresh artifact and version id.

mod job_repository;

pub use job_repository::{InMemoryJobRepository, StoredArtifact};
