//! Typed error types for term-atlas-render.
//!
//! Every variant here reports a protocol violation by a caller or a
//! misconfigured cache. Nothing in the crate retries on any of them.

use thiserror::Error;

/// Top-level error type for the glyph atlas and its preparation pipeline.
#[derive(Debug, Error)]
pub enum AtlasError {
    // -----------------------------------------------------------------------
    // Allocator
    // -----------------------------------------------------------------------
    /// Every slot is locked or was already claimed this frame, so a new glyph
    /// cannot be placed without corrupting another one.
    ///
    /// The capacity must cover the number of distinct glyphs visible in a
    /// single frame plus headroom for churn.
    #[error(
        "Texture atlas '{label}' exhausted: all {capacity} slots are in use by the current frame"
    )]
    CapacityExhausted {
        /// Diagnostic label of the atlas.
        label: String,
        /// Number of cells in the atlas.
        capacity: usize,
    },

    /// `unlock_slot` was called for a slot that holds no lock, or for an index
    /// outside `[0, capacity)`.
    #[error("Invalid unlock of slot {index} in atlas '{label}'")]
    InvalidUnlock {
        /// Diagnostic label of the atlas.
        label: String,
        /// Slot index passed by the caller.
        index: usize,
    },

    /// Locks from a previous frame were still held when a new frame started.
    /// A context was never released.
    #[error("Atlas '{label}' has {count} slot(s) still locked from a previous frame")]
    StaleLocks {
        /// Diagnostic label of the atlas.
        label: String,
        /// Number of slots with a non-zero lock count.
        count: usize,
    },

    // -----------------------------------------------------------------------
    // Preparation context
    // -----------------------------------------------------------------------
    /// A second context was opened while another one is still preparing or
    /// awaiting its blit.
    #[error("A preparation context is already in progress for atlas '{0}'")]
    PreparationInProgress(String),

    /// A context operation was called in the wrong state.
    #[error("Context is {actual}, expected {expected}")]
    InvalidContextState {
        /// State required by the operation.
        expected: &'static str,
        /// State the context was in.
        actual: &'static str,
    },

    /// The glyph key and attribute buffers for a row differ in length.
    #[error("Row {row}: {keys} glyph keys but {attributes} attributes")]
    RowLengthMismatch {
        /// Row index.
        row: usize,
        /// Length of the key buffer.
        keys: usize,
        /// Length of the attribute buffer.
        attributes: usize,
    },

    // -----------------------------------------------------------------------
    // Backing store
    // -----------------------------------------------------------------------
    /// A rasterized bitmap does not fit the cell or its pixel buffer has the
    /// wrong length.
    #[error("Invalid bitmap {width}x{height} ({actual} bytes) for {cell_width}x{cell_height} cell")]
    InvalidBitmap {
        /// Bitmap width in pixels.
        width: u32,
        /// Bitmap height in pixels.
        height: u32,
        /// Actual byte count received.
        actual: usize,
        /// Cell width in pixels.
        cell_width: u32,
        /// Cell height in pixels.
        cell_height: u32,
    },

    /// The requested capacity cannot be laid out within the device's texture
    /// size limit.
    #[error("Atlas of {capacity} {cell_width}x{cell_height} cells exceeds texture limit {max_dimension}")]
    AtlasTooLarge {
        /// Requested number of cells.
        capacity: usize,
        /// Cell width in pixels.
        cell_width: u32,
        /// Cell height in pixels.
        cell_height: u32,
        /// Maximum 2D texture dimension supported by the device.
        max_dimension: u32,
    },

    /// Cell size or capacity is zero.
    #[error("Invalid atlas geometry: {0}")]
    InvalidGeometry(String),

    /// The device dropped the blit completion signal without firing it
    /// (device lost or queue destroyed).
    #[error("Blit completion for atlas '{0}' was never signalled")]
    BlitAbandoned(String),

    /// The wgpu device could not be created or polled.
    #[error("GPU device error: {0}")]
    DeviceError(String),
}

impl From<wgpu::RequestDeviceError> for AtlasError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        AtlasError::DeviceError(e.to_string())
    }
}
