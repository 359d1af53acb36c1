//! Fixed-capacity arrays of fixed-size texture cells.
//!
//! Each atlas owns two arrays with identical geometry: the persistent array
//! that draws sample from, and the stage that receives freshly rasterized
//! glyphs until the next blit. Cells are addressed by slot index and laid out
//! row-major in a single 2D texture.

mod cpu;
mod gpu;

pub use cpu::{CpuAtlasDevice, CpuTextureArray};
pub use gpu::{WgpuAtlasDevice, WgpuTextureArray};

use crate::error::AtlasError;
use crate::staging::BlitTicket;

/// Which of the two arrays is being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayRole {
    /// Read by draws; only written by blits.
    Persistent,
    /// Scratch destination for new glyphs; source of blits.
    Stage,
}

impl ArrayRole {
    pub fn suffix(&self) -> &'static str {
        match self {
            ArrayRole::Persistent => "array",
            ArrayRole::Stage => "stage",
        }
    }
}

/// Placement of cells inside the backing texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellGrid {
    pub cell_width: u32,
    pub cell_height: u32,
    pub capacity: usize,
    /// Cells per texture row.
    pub columns: u32,
    /// Texture rows of cells.
    pub rows: u32,
}

impl CellGrid {
    /// Lay out `capacity` cells within a square texture limit of `max_dimension`.
    pub fn new(
        cell_width: u32,
        cell_height: u32,
        capacity: usize,
        max_dimension: u32,
    ) -> Result<Self, AtlasError> {
        if cell_width == 0 || cell_height == 0 {
            return Err(AtlasError::InvalidGeometry(format!(
                "cell size {cell_width}x{cell_height}"
            )));
        }
        if capacity == 0 {
            return Err(AtlasError::InvalidGeometry("capacity 0".to_string()));
        }

        let too_large = || AtlasError::AtlasTooLarge {
            capacity,
            cell_width,
            cell_height,
            max_dimension,
        };

        let columns = (max_dimension / cell_width).min(u32::try_from(capacity).unwrap_or(u32::MAX));
        if columns == 0 {
            return Err(too_large());
        }
        let rows = capacity.div_ceil(columns as usize);
        let rows = u32::try_from(rows).map_err(|_| too_large())?;
        if rows.checked_mul(cell_height).is_none_or(|h| h > max_dimension) {
            return Err(too_large());
        }

        Ok(Self {
            cell_width,
            cell_height,
            capacity,
            columns,
            rows,
        })
    }

    /// Texture size in pixels.
    pub fn texture_size(&self) -> (u32, u32) {
        (self.columns * self.cell_width, self.rows * self.cell_height)
    }

    /// Bytes in one RGBA8 cell.
    pub fn cell_bytes(&self) -> usize {
        self.cell_width as usize * self.cell_height as usize * 4
    }

    /// Pixel origin of a cell's top-left corner.
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        (
            (index % self.columns) * self.cell_width,
            (index / self.columns) * self.cell_height,
        )
    }

    /// Normalized `[u_min, v_min, u_max, v_max]` for sampling a cell.
    pub fn uv_rect(&self, index: usize) -> [f32; 4] {
        let (x, y) = self.cell_origin(index);
        let (w, h) = self.texture_size();
        let (w, h) = (w as f32, h as f32);
        [
            x as f32 / w,
            y as f32 / h,
            (x + self.cell_width) as f32 / w,
            (y + self.cell_height) as f32 / h,
        ]
    }
}

/// A backing texture of cells.
pub trait TextureArray {
    fn grid(&self) -> &CellGrid;
}

/// Device capable of hosting an atlas: creates arrays, writes stage cells,
/// and copies stage cells into the persistent array.
pub trait AtlasDevice {
    type Array: TextureArray;

    fn create_array(
        &self,
        label: &str,
        role: ArrayRole,
        cell_width: u32,
        cell_height: u32,
        capacity: usize,
    ) -> Result<Self::Array, AtlasError>;

    /// Write one cell. `pixels` is exactly `grid().cell_bytes()` long.
    fn write_cell(&self, array: &mut Self::Array, index: usize, pixels: &[u8]);

    /// Copy `indices` from `stage` into `array`. `indices` is never empty.
    ///
    /// The returned ticket completes once the device finished the copy.
    fn blit(
        &self,
        label: &str,
        stage: &Self::Array,
        array: &mut Self::Array,
        indices: &[usize],
    ) -> BlitTicket;
}
