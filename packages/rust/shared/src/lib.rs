//! Shared types, error model, and configuration for Prospector.
//!
//! This crate is the foundation depended on by all other Prospector crates.
//! It provides:
//! - [`ProspectorError`] — the unified error type
//! - Domain types ([`IdealCustomerProfile`], [`Candidate`], [`MissionId`])
//! - Configuration ([`AppConfig`], config loading, API-key pre-flight)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ApolloConfig, DefaultsConfig, OpenRouterConfig, ScoringConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
    resolve_db_path, validate_api_keys,
};
pub use error::{ProspectorError, Result};
pub use types::{CURRENT_SCHEMA_VERSION, Candidate, IdealCustomerProfile, MissionId};
