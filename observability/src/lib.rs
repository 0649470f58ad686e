//! # Observability
//!
//! Metrics and cost accounting for the generation pipeline:
//! - [`GenerationTelemetry`]: `metrics` counters and histograms per provider,
//!   model and stage
//! - [`install_prometheus_recorder`]: Prometheus text exposition handle
//! - [`PricingTable`]: per-model USD pricing, the default `CostEstimator`
//! - [`CostTracker`]: in-process usage ledger, the default `UsageRecorder`

pub mod cost_tracking;
pub mod telemetry;

pub use cost_tracking::{CostEntry, CostSummary, CostTracker, PricingTable, estimate_tokens};
pub use telemetry::{GenerationTelemetry, install_prometheus_recorder};
