//! Command-line interface for term-atlas.
//!
//! The binary drives the glyph atlas through a headless frame loop over a
//! synthetic terminal grid and reports cache statistics.

use clap::Parser;
use std::path::PathBuf;
use term_atlas_config::{AtlasConfig, LogLevel};

/// term-atlas - glyph atlas frame-loop driver
#[derive(Parser, Debug)]
#[command(name = "term-atlas")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Grid width in cells
    #[arg(long, default_value_t = 80)]
    pub cols: usize,

    /// Grid height in cells
    #[arg(long, default_value_t = 24)]
    pub rows: usize,

    /// Number of frames to prepare
    #[arg(long, default_value_t = 60)]
    pub frames: usize,

    /// Atlas capacity in cells (default: sized from the grid plus headroom)
    #[arg(long, value_name = "CELLS")]
    pub capacity: Option<usize>,

    /// Use a headless wgpu device instead of the in-memory backend
    #[arg(long)]
    pub gpu: bool,

    /// Atlas config file (default: the platform config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level: off, error, warn, info, debug, trace (or 0-4)
    #[arg(long, value_name = "LEVEL", value_parser = parse_log_level)]
    pub log_level: Option<LogLevel>,
}

fn parse_log_level(value: &str) -> Result<LogLevel, String> {
    LogLevel::parse(value).ok_or_else(|| format!("unknown log level '{value}'"))
}

impl Cli {
    /// Atlas config for this run: the loaded file, resized for the grid.
    ///
    /// Cell size comes from the file; capacity from `--capacity` or from the
    /// grid size and the file's headroom.
    pub fn atlas_config(&self, base: AtlasConfig) -> AtlasConfig {
        let capacity = self.capacity.unwrap_or_else(|| {
            AtlasConfig::capacity_for(self.cols, self.rows, base.headroom_percent)
        });
        base.with_capacity(capacity)
    }
}
