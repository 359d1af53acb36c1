use crate::glyph::{Bitmap, GlyphAttributes, GlyphKey};

/// Supplies terminal rows to [`super::TextRenderer::prepare_rows`].
pub trait RowDataSource {
    /// `(columns, rows)` of the visible grid.
    fn grid_size(&self) -> (usize, usize);

    /// Fill parallel buffers for `row`: one key and one attribute entry per
    /// column, plus per-cell background colours for the background pass.
    /// The buffers arrive empty.
    fn glyph_row(
        &mut self,
        row: usize,
        keys: &mut Vec<GlyphKey>,
        attributes: &mut Vec<GlyphAttributes>,
        backgrounds: &mut Vec<[f32; 4]>,
    );

    /// Rasterize the glyph at (`row`, `column`). Called on atlas misses only.
    fn rasterize(&mut self, row: usize, column: u32) -> Bitmap;
}
