//! wgpu backing store.
//!
//! Both arrays are single `Rgba8Unorm` textures. Stage writes go through
//! `Queue::write_texture`; the blit encodes one texture-to-texture copy per
//! dirty cell and completes its ticket from `Queue::on_submitted_work_done`.

use std::sync::Arc;

use super::{ArrayRole, AtlasDevice, CellGrid, TextureArray};
use crate::error::AtlasError;
use crate::staging::BlitTicket;

/// Texel format of both arrays.
pub const ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Clone)]
pub struct WgpuAtlasDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl WgpuAtlasDevice {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Create a device without a surface, for offscreen use.
    pub async fn request_headless() -> Result<Self, AtlasError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| AtlasError::DeviceError(format!("no adapter: {e}")))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("term-atlas device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                ..Default::default()
            })
            .await?;

        log::info!("Using GPU adapter: {}", adapter.get_info().name);
        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }
}

pub struct WgpuTextureArray {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    grid: CellGrid,
}

impl WgpuTextureArray {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// View for binding the array in the text pipeline.
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    fn copy_info(&self, index: usize) -> wgpu::TexelCopyTextureInfo<'_> {
        let (x, y) = self.grid.cell_origin(index);
        wgpu::TexelCopyTextureInfo {
            texture: &self.texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        }
    }

    fn cell_extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.grid.cell_width,
            height: self.grid.cell_height,
            depth_or_array_layers: 1,
        }
    }
}

impl TextureArray for WgpuTextureArray {
    fn grid(&self) -> &CellGrid {
        &self.grid
    }
}

impl AtlasDevice for WgpuAtlasDevice {
    type Array = WgpuTextureArray;

    fn create_array(
        &self,
        label: &str,
        role: ArrayRole,
        cell_width: u32,
        cell_height: u32,
        capacity: usize,
    ) -> Result<WgpuTextureArray, AtlasError> {
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        let grid = CellGrid::new(cell_width, cell_height, capacity, max_dimension)?;
        let (width, height) = grid.texture_size();

        let usage = match role {
            ArrayRole::Persistent => {
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST
            }
            ArrayRole::Stage => wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST,
        };

        let texture_label = format!("{label} {}", role.suffix());
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&texture_label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ATLAS_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        log::debug!(
            "Created {texture_label}: {width}x{height} px, {capacity} cells of {cell_width}x{cell_height}"
        );

        Ok(WgpuTextureArray {
            texture,
            view,
            grid,
        })
    }

    fn write_cell(&self, array: &mut WgpuTextureArray, index: usize, pixels: &[u8]) {
        self.queue.write_texture(
            array.copy_info(index),
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * array.grid.cell_width),
                rows_per_image: Some(array.grid.cell_height),
            },
            array.cell_extent(),
        );
    }

    fn blit(
        &self,
        label: &str,
        stage: &WgpuTextureArray,
        array: &mut WgpuTextureArray,
        indices: &[usize],
    ) -> BlitTicket {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("atlas blit encoder"),
            });
        for &index in indices {
            encoder.copy_texture_to_texture(
                stage.copy_info(index),
                array.copy_info(index),
                array.cell_extent(),
            );
        }
        // Pending write_texture calls to the stage are flushed ahead of this
        // submission, so the copies see the new pixels.
        self.queue.submit(std::iter::once(encoder.finish()));

        let device = Arc::clone(&self.device);
        let (ticket, signal) = BlitTicket::pending(
            label,
            indices.to_vec(),
            Some(Box::new(move |block| {
                let poll_type = if block {
                    wgpu::PollType::wait_indefinitely()
                } else {
                    wgpu::PollType::Poll
                };
                let _ = device.poll(poll_type);
            })),
        );
        self.queue.on_submitted_work_done(move || signal.fire());
        ticket
    }
}
