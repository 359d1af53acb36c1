// Library exports for testing and potential library use

/// Application version (root crate version, for use by sub-crates).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod debug;
pub mod frame_loop;

pub use frame_loop::{FrameReport, SyntheticGrid, run_frames};
