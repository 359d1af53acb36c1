//! Default value functions for configuration.
//!
//! Each function backs a `#[serde(default = "crate::defaults::...")]`
//! attribute on `AtlasConfig`, so a partial YAML file still loads.

mod atlas;

// ── Atlas geometry ─────────────────────────────────────────────────────────
pub use atlas::{capacity, cell_height, cell_width, headroom_percent, label, log_level};
