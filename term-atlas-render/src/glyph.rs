//! Glyph identity, per-cell attributes, and rasterized bitmaps.

use crate::error::AtlasError;

/// Identity of a renderable glyph cell.
///
/// Used only as a cache key. Colours live in [`GlyphAttributes`] so that the
/// same glyph drawn in different colours shares one atlas slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GlyphKey {
    /// Character code (or the first code point of a cluster).
    pub code: u32,
    /// Multi-codepoint grapheme cluster.
    pub is_complex: bool,
    /// Cell is a slice of an inline image.
    pub image: bool,
    /// Box-drawing character rendered procedurally.
    pub box_drawing: bool,
}

impl GlyphKey {
    pub fn new(code: u32) -> Self {
        Self {
            code,
            ..Default::default()
        }
    }

    pub fn from_char(c: char) -> Self {
        Self::new(c as u32)
    }

    pub fn complex(mut self) -> Self {
        self.is_complex = true;
        self
    }

    pub fn image(mut self) -> Self {
        self.image = true;
        self
    }

    pub fn box_drawing(mut self) -> Self {
        self.box_drawing = true;
        self
    }

    /// Whether the rendered pixels depend on the cell's column.
    ///
    /// Box-drawing and image glyphs are drawn per cell, and complex clusters
    /// may be ligature fragments, so the column becomes part of their cache key.
    pub fn is_column_sensitive(&self) -> bool {
        self.is_complex || self.image || self.box_drawing
    }
}

/// Cache key actually stored in the slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotKey {
    pub(crate) glyph: GlyphKey,
    pub(crate) column: Option<u32>,
}

impl SlotKey {
    pub(crate) fn new(glyph: GlyphKey, column: u32) -> Self {
        Self {
            glyph,
            column: glyph.is_column_sensitive().then_some(column),
        }
    }
}

/// Per-cell foreground and background colours, RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GlyphAttributes {
    pub foreground: [u8; 4],
    pub background: [u8; 4],
}

impl GlyphAttributes {
    pub fn new(foreground: [u8; 4], background: [u8; 4]) -> Self {
        Self {
            foreground,
            background,
        }
    }

    /// Foreground as normalized floats for instance data.
    pub fn foreground_f32(&self) -> [f32; 4] {
        self.foreground.map(|c| c as f32 / 255.0)
    }

    pub fn background_f32(&self) -> [f32; 4] {
        self.background.map(|c| c as f32 / 255.0)
    }
}

/// CPU-side RGBA8 bitmap produced by a rasterizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Wrap raw RGBA8 pixels. `pixels.len()` must be `width * height * 4`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, AtlasError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(AtlasError::InvalidBitmap {
                width,
                height,
                actual: pixels.len(),
                cell_width: width,
                cell_height: height,
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A bitmap filled with a single RGBA colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Copy this bitmap into a zeroed `cell_width x cell_height` buffer,
    /// anchored at the top-left corner.
    ///
    /// The padding is transparent so a reused cell never shows leftovers of
    /// the glyph it previously held.
    pub(crate) fn padded_to_cell(
        &self,
        cell_width: u32,
        cell_height: u32,
    ) -> Result<Vec<u8>, AtlasError> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.width > cell_width || self.height > cell_height || self.pixels.len() != expected {
            return Err(AtlasError::InvalidBitmap {
                width: self.width,
                height: self.height,
                actual: self.pixels.len(),
                cell_width,
                cell_height,
            });
        }
        if self.width == cell_width && self.height == cell_height {
            return Ok(self.pixels.clone());
        }

        let row_bytes = self.width as usize * 4;
        let cell_row_bytes = cell_width as usize * 4;
        let mut out = vec![0u8; cell_row_bytes * cell_height as usize];
        for (y, src) in self.pixels.chunks_exact(row_bytes.max(1)).enumerate() {
            let start = y * cell_row_bytes;
            out[start..start + row_bytes].copy_from_slice(src);
        }
        Ok(out)
    }
}

/// Produces a bitmap for a glyph on a cache miss.
///
/// Called synchronously, only on misses, and never while the implementation
/// could observe the cache (it receives nothing but the column).
pub trait GlyphRasterizer {
    fn rasterize(&mut self, column: u32) -> Bitmap;
}

impl<F> GlyphRasterizer for F
where
    F: FnMut(u32) -> Bitmap,
{
    fn rasterize(&mut self, column: u32) -> Bitmap {
        self(column)
    }
}
