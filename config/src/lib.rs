//! # Configuration System
//!
//! Centralized configuration management for the generation service.
//!
//! This crate provides:
//! - Configuration structures for providers, resilience, pipeline and server
//! - Environment variable loading (12-factor app principles)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (CLI > env > file > defaults)
//! - Configuration validation

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;
pub mod validation;

pub use config::{
    CircuitBreakerConfig, Config, ModelPricing, ObservabilityConfig, PipelineConfig,
    PricingConfig, ProviderEndpointConfig, ProvidersConfig, RateLimitConfig, ServerConfig,
    StageConfig, default_stages
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::load_from_env;
pub use precedence::merge_configs;
pub use validation::validate;
