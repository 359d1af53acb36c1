//! Default values for atlas geometry and diagnostics.

pub fn cell_width() -> u32 {
    16
}

pub fn cell_height() -> u32 {
    32
}

pub fn capacity() -> usize {
    // 80x24 grid at 50% headroom
    2880
}

pub fn headroom_percent() -> u32 {
    50 // Extra slots beyond one full screen, for churn between frames
}

pub fn label() -> String {
    "glyph atlas".to_string()
}

pub fn log_level() -> crate::LogLevel {
    crate::LogLevel::Off
}
