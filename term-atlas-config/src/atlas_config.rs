//! Atlas geometry and sizing.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::log_level::LogLevel;

/// Geometry and diagnostics settings for one glyph atlas.
///
/// Cell size and capacity are fixed for the lifetime of an atlas; changing
/// them means building a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// Cell width in pixels
    #[serde(default = "crate::defaults::cell_width")]
    pub cell_width: u32,

    /// Cell height in pixels
    #[serde(default = "crate::defaults::cell_height")]
    pub cell_height: u32,

    /// Number of cells in the atlas
    #[serde(default = "crate::defaults::capacity")]
    pub capacity: usize,

    /// Slots provisioned beyond one full grid, as a percentage of the grid
    #[serde(default = "crate::defaults::headroom_percent")]
    pub headroom_percent: u32,

    /// Diagnostic label for textures and log lines
    #[serde(default = "crate::defaults::label")]
    pub label: String,

    /// Log verbosity for the binary
    #[serde(default = "crate::defaults::log_level")]
    pub log_level: LogLevel,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            cell_width: crate::defaults::cell_width(),
            cell_height: crate::defaults::cell_height(),
            capacity: crate::defaults::capacity(),
            headroom_percent: crate::defaults::headroom_percent(),
            label: crate::defaults::label(),
            log_level: crate::defaults::log_level(),
        }
    }
}

impl AtlasConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size an atlas for a terminal grid.
    ///
    /// `cell_size` is in points and is scaled to pixels (rounded up). Capacity
    /// covers every visible cell plus `headroom_percent` so that glyphs from
    /// the previous frame can survive while new ones arrive.
    pub fn for_grid(cell_size: (f32, f32), cols: usize, rows: usize, scale: f32) -> Self {
        let defaults = Self::default();
        let cell_width = (cell_size.0 * scale).ceil().max(1.0) as u32;
        let cell_height = (cell_size.1 * scale).ceil().max(1.0) as u32;
        Self {
            cell_width,
            cell_height,
            capacity: Self::capacity_for(cols, rows, defaults.headroom_percent),
            ..defaults
        }
    }

    /// Cells needed for a `cols x rows` grid plus headroom.
    pub fn capacity_for(cols: usize, rows: usize, headroom_percent: u32) -> usize {
        let visible = cols.saturating_mul(rows).max(1);
        visible.saturating_add(visible.saturating_mul(headroom_percent as usize) / 100)
    }

    pub fn with_cell_size(mut self, width: u32, height: u32) -> Self {
        self.cell_width = width;
        self.cell_height = height;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Reject geometry no atlas can be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cell_width == 0 || self.cell_height == 0 {
            return Err(ConfigError::Validation(format!(
                "cell size must be non-zero, got {}x{}",
                self.cell_width, self.cell_height
            )));
        }
        if self.capacity == 0 {
            return Err(ConfigError::Validation(
                "capacity must be at least 1".to_string(),
            ));
        }
        if self.label.trim().is_empty() {
            return Err(ConfigError::Validation("label must not be empty".to_string()));
        }
        Ok(())
    }

    /// Whether this atlas can hold every glyph of a `cols x rows` grid at once.
    pub fn fits_grid(&self, cols: usize, rows: usize) -> bool {
        self.capacity >= cols.saturating_mul(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_adds_headroom() {
        assert_eq!(AtlasConfig::capacity_for(80, 24, 50), 2880);
        assert_eq!(AtlasConfig::capacity_for(10, 10, 0), 100);
        assert_eq!(AtlasConfig::capacity_for(0, 0, 50), 1);
    }

    #[test]
    fn for_grid_scales_cell_size() {
        let config = AtlasConfig::for_grid((7.5, 15.2), 100, 30, 2.0);
        assert_eq!(config.cell_width, 15);
        assert_eq!(config.cell_height, 31);
        assert_eq!(config.capacity, 4500);
        assert!(config.fits_grid(100, 30));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let config = AtlasConfig::new().with_capacity(0);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_zero_cell() {
        let config = AtlasConfig::new().with_cell_size(0, 10);
        assert!(config.validate().is_err());
        assert!(AtlasConfig::default().validate().is_ok());
    }
}
