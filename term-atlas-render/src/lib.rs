//! GPU glyph atlas for the term-atlas terminal renderer.
//!
//! This crate caches rasterized terminal glyphs in a fixed-capacity texture
//! atlas and reuses them across frames:
//!
//! - Slot allocation with per-frame locking and LRU eviction
//! - A stage array for new glyphs and an asynchronous stage-to-atlas blit
//! - A per-frame preparation context that resolves rows to atlas slots
//! - wgpu and in-memory backing stores

pub mod error;
pub mod glyph;
pub mod staging;
pub mod text_renderer;
pub mod texture_array;
pub mod texture_map;

// Re-export main public types
pub use error::AtlasError;
pub use glyph::{Bitmap, GlyphAttributes, GlyphKey, GlyphRasterizer};
pub use staging::{BlitSignal, BlitTicket};
pub use text_renderer::{
    ContextState, GlyphInstance, PlacedGlyph, RowDataSource, TextRenderer, TextRendererContext,
};
pub use texture_array::{
    ArrayRole, AtlasDevice, CellGrid, CpuAtlasDevice, CpuTextureArray, TextureArray,
    WgpuAtlasDevice, WgpuTextureArray,
};
pub use texture_map::{AtlasStats, TextureMap};

// Re-export the configuration type used by the constructors
pub use term_atlas_config::AtlasConfig;
