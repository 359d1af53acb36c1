//! Row-level text renderer: feeds terminal rows into the glyph atlas.
//!
//! Usage per frame:
//!
//! ```rust,no_run
//! # use term_atlas_render::{Bitmap, CpuAtlasDevice, GlyphAttributes, GlyphKey, TextRenderer};
//! # fn main() -> Result<(), term_atlas_render::AtlasError> {
//! let renderer = TextRenderer::new(CpuAtlasDevice::default(), "text", 8, 16, 512)?;
//! let keys = vec![GlyphKey::from_char('a'); 80];
//! let attrs = vec![GlyphAttributes::default(); 80];
//!
//! let mut context = renderer.begin_frame()?;
//! renderer.set_glyph_keys(&mut context, 0, &keys, &attrs, &mut |_col: u32| {
//!     Bitmap::solid(8, 16, [255; 4])
//! })?;
//! renderer.prepare_for_draw(&mut context, |ready| {
//!     let _instances = ready.instances();
//!     // encode the draw here
//! })?;
//! renderer.release_context(context)?;
//! # Ok(())
//! # }
//! ```

mod context;
mod data_source;

pub use context::{ContextState, GlyphInstance, PlacedGlyph, TextRendererContext};
pub use data_source::RowDataSource;

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};
use term_atlas_config::AtlasConfig;

use crate::error::AtlasError;
use crate::glyph::{GlyphAttributes, GlyphKey, GlyphRasterizer};
use crate::texture_array::AtlasDevice;
use crate::texture_map::TextureMap;

pub struct TextRenderer<D: AtlasDevice> {
    texture_map: Mutex<TextureMap<D>>,
    /// Set while a context is preparing or awaiting its blit.
    pub(crate) preparing: AtomicBool,
}

impl<D: AtlasDevice> TextRenderer<D> {
    pub fn new(
        device: D,
        label: impl Into<String>,
        cell_width: u32,
        cell_height: u32,
        capacity: usize,
    ) -> Result<Self, AtlasError> {
        Ok(Self::with_texture_map(TextureMap::new(
            device,
            label,
            cell_width,
            cell_height,
            capacity,
        )?))
    }

    pub fn from_config(device: D, config: &AtlasConfig) -> Result<Self, AtlasError> {
        Ok(Self::with_texture_map(TextureMap::from_config(
            device, config,
        )?))
    }

    pub fn with_texture_map(texture_map: TextureMap<D>) -> Self {
        Self {
            texture_map: Mutex::new(texture_map),
            preparing: AtomicBool::new(false),
        }
    }

    /// Whether a context is currently preparing or awaiting its blit.
    pub fn is_preparing(&self) -> bool {
        self.preparing.load(Ordering::Acquire)
    }

    pub fn label(&self) -> String {
        self.texture_map.lock().label().to_string()
    }

    pub fn texture_map(&self) -> MutexGuard<'_, TextureMap<D>> {
        self.texture_map.lock()
    }

    /// Replace the atlas with one built for a new cell size or capacity.
    ///
    /// Takes `&mut self`, so no context can be alive while the atlas is
    /// swapped.
    pub fn set_cell_size(&mut self, config: &AtlasConfig) -> Result<(), AtlasError>
    where
        D: Clone,
    {
        let device = self.texture_map.get_mut().device().clone();
        let map = TextureMap::from_config(device, config)?;
        log::info!(
            "Rebuilt texture map '{}' for {}x{} cells",
            config.label,
            config.cell_width,
            config.cell_height
        );
        *self.texture_map.get_mut() = map;
        Ok(())
    }

    /// Open the context for a new frame.
    ///
    /// Fails if another context is still preparing, or if the previous
    /// frame's context was never released.
    pub fn begin_frame(&self) -> Result<TextRendererContext<'_, D>, AtlasError> {
        if self
            .preparing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AtlasError::PreparationInProgress(self.label()));
        }

        let (label, frame) = {
            let mut map = self.texture_map.lock();
            if let Err(e) = map.start_new_frame() {
                self.preparing.store(false, Ordering::Release);
                return Err(e);
            }
            (map.label().to_string(), map.frame())
        };
        Ok(TextRendererContext::new(self, label, frame))
    }

    /// Resolve one row of glyph keys into `context`.
    pub fn set_glyph_keys<R>(
        &self,
        context: &mut TextRendererContext<'_, D>,
        row: usize,
        keys: &[GlyphKey],
        attributes: &[GlyphAttributes],
        rasterizer: &mut R,
    ) -> Result<(), AtlasError>
    where
        R: GlyphRasterizer + ?Sized,
    {
        debug_assert!(context.belongs_to(self));
        context.set_glyph_keys(row, keys, attributes, rasterizer)
    }

    /// Blit staged glyphs, wait for the device, then run `completion` with
    /// the ready context.
    pub fn prepare_for_draw<F>(
        &self,
        context: &mut TextRendererContext<'_, D>,
        completion: F,
    ) -> Result<(), AtlasError>
    where
        F: FnOnce(&TextRendererContext<'_, D>),
    {
        debug_assert!(context.belongs_to(self));
        context.prepare_for_draw()?;
        context.wait_ready()?;
        completion(context);
        Ok(())
    }

    /// Open a context and feed it every row of `source`.
    ///
    /// If a row fails the context is released before the error is returned.
    pub fn prepare_rows<S>(&self, source: &mut S) -> Result<TextRendererContext<'_, D>, AtlasError>
    where
        S: RowDataSource + ?Sized,
    {
        let mut context = self.begin_frame()?;
        if let Err(e) = Self::feed_rows(&mut context, source) {
            if let Err(release_err) = context.release() {
                log::warn!("Releasing failed frame: {release_err}");
            }
            return Err(e);
        }
        Ok(context)
    }

    fn feed_rows<S>(context: &mut TextRendererContext<'_, D>, source: &mut S) -> Result<(), AtlasError>
    where
        S: RowDataSource + ?Sized,
    {
        let (width, rows) = source.grid_size();
        let mut keys = Vec::with_capacity(width);
        let mut attributes = Vec::with_capacity(width);

        for row in 0..rows {
            keys.clear();
            attributes.clear();
            let mut backgrounds = Vec::with_capacity(width);
            source.glyph_row(row, &mut keys, &mut attributes, &mut backgrounds);
            let mut rasterizer = |column: u32| source.rasterize(row, column);
            context.set_glyph_keys(row, &keys, &attributes, &mut rasterizer)?;
            context.set_background_row(row, backgrounds)?;
        }
        Ok(())
    }

    /// Unlock every slot `context` locked.
    pub fn release_context(&self, context: TextRendererContext<'_, D>) -> Result<(), AtlasError> {
        debug_assert!(context.belongs_to(self));
        context.release()
    }
}
