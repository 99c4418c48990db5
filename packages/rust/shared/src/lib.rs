//! Shared types, error model, and configuration for coursemap.
//!
//! This crate is the foundation depended on by all other coursemap crates.
//! It provides:
//! - [`CourseMapError`], the unified error type
//! - Domain types ([`CourseRecord`], [`StoredCourse`], [`Major`], [`Difficulty`])
//! - Configuration ([`AppConfig`], [`ServeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CatalogConfig, DatabaseConfig, MajorSource, ServeConfig, ServerConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{CourseMapError, Result};
pub use types::{CourseRecord, Difficulty, Major, Requirement, StoredCourse};
