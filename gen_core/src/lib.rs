//! # Generation Core
//!
//! Shared types and port traits for the generation orchestration pipeline.
//!
//! This crate provides:
//! - Job, stage log and completion types shared by every layer
//! - Port traits for persistence, pricing, usage recording and validation
//!
//! Nothing in here performs I/O; adapters live in `providers`, `storage` and
//! `observability`.

pub mod traits;
pub mod types;

pub use traits::{ArtifactValidator, CostEstimator, JobRepository, UsageRecorder};
pub use types::{
    ArtifactRef, CompletionRequest, GenerationJob, JobParams, JobStatus, LlmResult, LlmUsage,
    StageLog, StageStatus, TokenUsage, UsageRecord
};
