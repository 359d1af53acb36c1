//! In-memory backing store with a synchronous blit.
//!
//! Used by headless runs and tests: cell contents can be read back and the
//! blit ticket is already complete when `blit` returns.

use super::{ArrayRole, AtlasDevice, CellGrid, TextureArray};
use crate::error::AtlasError;
use crate::staging::BlitTicket;

/// Default texture dimension limit, matching common desktop GPUs.
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

#[derive(Debug, Clone, Copy)]
pub struct CpuAtlasDevice {
    max_dimension: u32,
}

impl Default for CpuAtlasDevice {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

impl CpuAtlasDevice {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }
}

#[derive(Debug, Clone)]
pub struct CpuTextureArray {
    label: String,
    role: ArrayRole,
    grid: CellGrid,
    cells: Vec<Vec<u8>>,
}

impl CpuTextureArray {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn role(&self) -> ArrayRole {
        self.role
    }

    /// RGBA8 contents of one cell.
    pub fn cell(&self, index: usize) -> &[u8] {
        &self.cells[index]
    }
}

impl TextureArray for CpuTextureArray {
    fn grid(&self) -> &CellGrid {
        &self.grid
    }
}

impl AtlasDevice for CpuAtlasDevice {
    type Array = CpuTextureArray;

    fn create_array(
        &self,
        label: &str,
        role: ArrayRole,
        cell_width: u32,
        cell_height: u32,
        capacity: usize,
    ) -> Result<CpuTextureArray, AtlasError> {
        let grid = CellGrid::new(cell_width, cell_height, capacity, self.max_dimension)?;
        Ok(CpuTextureArray {
            label: format!("{label} {}", role.suffix()),
            role,
            grid,
            cells: vec![vec![0u8; grid.cell_bytes()]; capacity],
        })
    }

    fn write_cell(&self, array: &mut CpuTextureArray, index: usize, pixels: &[u8]) {
        array.cells[index].copy_from_slice(pixels);
    }

    fn blit(
        &self,
        label: &str,
        stage: &CpuTextureArray,
        array: &mut CpuTextureArray,
        indices: &[usize],
    ) -> BlitTicket {
        for &index in indices {
            array.cells[index].copy_from_slice(&stage.cells[index]);
        }
        let (ticket, signal) = BlitTicket::pending(label, indices.to_vec(), None);
        signal.fire();
        ticket
    }
}
