//! # Cost Tracking
//!
//! Per-model pricing for budget checks and an in-process ledger of provider
//! usage with per-job, per-provider and per-model breakdowns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use config::{ModelPricing, PricingConfig};
use errors::SinkError;
use gen_core::{CostEstimator, UsageRecord, UsageRecorder};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Rough token count for text when the vendor offers no counter: one token
/// per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> u64 {
    text.chars().count().div_ceil(4) as u64
}

/// USD prices per 1k tokens, keyed by model name.
///
/// Lookup is exact first, then the longest configured prefix (so a dated
/// snapshot such as `gpt-4o-mini-2024-07-18` bills as `gpt-4o-mini`), then
/// the default price.
#[derive(Debug, Clone)]
pub struct PricingTable {
    default: ModelPricing,
    models: HashMap<String, ModelPricing>
}

impl PricingTable {
    pub fn new(default: ModelPricing) -> Self {
        Self {
            default,
            models: HashMap::new()
        }
    }

    pub fn from_config(config: &PricingConfig) -> Self {
        Self {
            default: config.default,
            models: config
                .models
                .iter()
                .map(|(name, pricing)| (name.clone(), *pricing))
                .collect()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, pricing: ModelPricing) -> Self {
        self.models.insert(model.into(), pricing);
        self
    }

    pub fn price_for(&self, model: &str) -> ModelPricing {
        if let Some(pricing) = self.models.get(model) {
            return *pricing;
        }
        self.models
            .iter()
            .filter(|(name, _)| model.starts_with(name.as_str()))
            .max_by_key(|(name, _)| name.len())
            .map(|(_, pricing)| *pricing)
            .unwrap_or(self.default)
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}

impl CostEstimator for PricingTable {
    fn estimate_cost_usd(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let pricing = self.price_for(model);
        (prompt_tokens as f64 / 1000.0) * pricing.prompt_per_1k
            + (completion_tokens as f64 / 1000.0) * pricing.completion_per_1k
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostEntry {
    pub job_id: Uuid,
    pub stage: String,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>
}

impl From<&UsageRecord> for CostEntry {
    fn from(record: &UsageRecord) -> Self {
        Self {
            job_id: record.job_id,
            stage: record.stage.clone(),
            provider: record.provider.clone(),
            model: record.model.clone(),
            prompt_tokens: record.prompt_tokens,
            completion_tokens: record.completion_tokens,
            cost_usd: record.cost_usd,
            latency_ms: record.latency_ms,
            timestamp: record.recorded_at
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CostSummary {
    pub calls: usize,
    pub total_cost_usd: f64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub by_provider: HashMap<String, f64>,
    pub by_model: HashMap<String, f64>,
    pub by_stage: HashMap<String, f64>
}

impl CostSummary {
    fn from_entries<'a>(entries: impl Iterator<Item = &'a CostEntry>) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            summary.calls += 1;
            summary.total_cost_usd += entry.cost_usd;
            summary.prompt_tokens += entry.prompt_tokens;
            summary.completion_tokens += entry.completion_tokens;
            *summary
                .by_provider
                .entry(entry.provider.clone())
                .or_insert(0.0) += entry.cost_usd;
            *summary.by_model.entry(entry.model.clone()).or_insert(0.0) += entry.cost_usd;
            *summary.by_stage.entry(entry.stage.clone()).or_insert(0.0) += entry.cost_usd;
        }
        summary
    }
}

/// Append-only usage ledger held in memory.
#[derive(Debug, Default)]
pub struct CostTracker {
    entries: RwLock<Vec<CostEntry>>
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_usage(&self, record: &UsageRecord) {
        let entry = CostEntry::from(record);
        tracing::debug!(
            job_id = %entry.job_id,
            provider = %entry.provider,
            model = %entry.model,
            "Recorded cost: ${:.6}",
            entry.cost_usd
        );
        self.entries.write().push(entry);
    }

    pub fn entries_for_job(&self, job_id: Uuid) -> Vec<CostEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect()
    }

    pub fn job_summary(&self, job_id: Uuid) -> CostSummary {
        let entries = self.entries.read();
        CostSummary::from_entries(entries.iter().filter(|e| e.job_id == job_id))
    }

    pub fn summary(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> CostSummary {
        let entries = self.entries.read();
        CostSummary::from_entries(
            entries
                .iter()
                .filter(|e| e.timestamp >= start && e.timestamp <= end)
        )
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl UsageRecorder for CostTracker {
    async fn record(&self, record: &UsageRecord) -> Result<(), SinkError> {
        self.record_usage(record);
        Ok(())
    }
}
