//! Configuration for the term-atlas glyph atlas.
//!
//! This crate provides:
//!
//! - `AtlasConfig`: cell size, capacity, and label of a texture atlas
//! - Grid-based sizing (`AtlasConfig::for_grid`)
//! - YAML loading and saving with defaults for missing fields
//! - Log level selection shared with the binary

pub mod atlas_config;
pub mod defaults;
pub mod error;
mod log_level;
mod persistence;

// Re-export main types for convenience
pub use atlas_config::AtlasConfig;
pub use error::ConfigError;
pub use log_level::LogLevel;
