//! Shared types, error model, and configuration for landingsync.
//!
//! This crate is the foundation depended on by all other landingsync crates.
//! It provides:
//! - [`LandingSyncError`], the unified error type
//! - Domain types ([`Location`], [`LocationSet`], [`PageRow`], [`PublishReport`], [`RunId`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClientErrorPolicy, DefaultsConfig, DudaConfig, DudaEnvironment, HeadingStyle,
    HubSpotConfig, OpenAiConfig, PublishingConfig, RunConfig, Secret, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{LandingSyncError, Result};
pub use types::{
    BatchOutcome, FailedBatch, Location, LocationSet, PageRequest, PageRow, PageRunResult,
    PublishReport, RunId, RunStatus,
};
