use anyhow::{Context, Result};
use clap::Parser;
use term_atlas::cli::Cli;
use term_atlas::debug;
use term_atlas::frame_loop::{FrameReport, SyntheticGrid, run_frames};
use term_atlas_config::AtlasConfig;
use term_atlas_render::{AtlasDevice, CpuAtlasDevice, TextRenderer, WgpuAtlasDevice};
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    // Parse CLI arguments first (before logging init for cleaner output)
    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => AtlasConfig::load_from(path)
            .with_context(|| format!("loading atlas config from {}", path.display()))?,
        None => AtlasConfig::load().context("loading atlas config")?,
    };

    // CLI --log-level takes highest precedence, then DEBUG_LEVEL, then config.
    let level = debug::resolve_level(cli.log_level, debug::env_level(), base.log_level);
    debug::init_log_bridge(level);
    log::info!("Starting term-atlas {}", term_atlas::VERSION);

    let config = cli.atlas_config(base);
    config.validate().context("invalid atlas configuration")?;

    let report = if cli.gpu {
        // Create Tokio runtime for async device creation
        let runtime = Runtime::new()?;
        let device = runtime
            .block_on(WgpuAtlasDevice::request_headless())
            .context("creating headless wgpu device")?;
        run(device, &config, &cli)?
    } else {
        run(CpuAtlasDevice::default(), &config, &cli)?
    };

    println!("{report}");
    Ok(())
}

fn run<D: AtlasDevice>(device: D, config: &AtlasConfig, cli: &Cli) -> Result<FrameReport> {
    let renderer = TextRenderer::from_config(device, config)
        .with_context(|| format!("building atlas '{}'", config.label))?;
    if !config.fits_grid(cli.cols, cli.rows) {
        log::warn!(
            "Atlas capacity {} is smaller than the {}x{} grid; frames may fail",
            config.capacity,
            cli.cols,
            cli.rows
        );
    }

    let mut grid = SyntheticGrid::new(cli.cols, cli.rows, config.cell_width, config.cell_height);
    run_frames(&renderer, &mut grid, cli.frames)
        .with_context(|| format!("running {} frames", cli.frames))
}
