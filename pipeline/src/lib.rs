//! # Generation Pipeline
//!
//! Drives a [`gen_core::GenerationJob`] through its ordered stages.
//!
//! Each stage resolves its model list, checks the projected cost against the
//! job budget, calls the fallback orchestrator, logs every provider attempt
//! and persists the job. The last stage persists the combined artifact.

pub mod coordinator;
pub mod stages;
pub mod validation;

pub use coordinator::PipelineCoordinator;
pub use stages::{StagePrompt, build_prompt, context_slice, parse_stage_output, resolve_models};
pub use validation::StageOutputValidator;
