//! Per-frame glyph preparation context.
//!
//! A context resolves one frame's rows to atlas slots, triggers the blit that
//! makes new glyphs visible, and releases its slot locks once the draw has
//! been issued. It borrows its [`TextRenderer`], so it can never outlive the
//! atlas it locked slots in.

use std::sync::atomic::Ordering;

use bytemuck::{Pod, Zeroable};
use parking_lot::MutexGuard;

use super::TextRenderer;
use crate::error::AtlasError;
use crate::glyph::{GlyphAttributes, GlyphKey, GlyphRasterizer};
use crate::staging::BlitTicket;
use crate::texture_array::AtlasDevice;
use crate::texture_map::TextureMap;

/// Lifecycle of a [`TextRendererContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Rows are being resolved to slots.
    Preparing,
    /// The blit was issued; new glyphs are not yet visible to draws.
    AwaitingBlit,
    /// The blit completed; resolved glyphs may be drawn.
    Ready,
    /// The blit was abandoned; nothing may be drawn. Only release remains.
    Failed,
    /// Locks released; the context is spent.
    Consumed,
}

impl ContextState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextState::Preparing => "preparing",
            ContextState::AwaitingBlit => "awaiting blit",
            ContextState::Ready => "ready",
            ContextState::Failed => "failed",
            ContextState::Consumed => "consumed",
        }
    }
}

/// One glyph resolved to an atlas slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedGlyph {
    pub row: usize,
    pub column: u32,
    pub key: GlyphKey,
    pub slot: usize,
    pub attributes: GlyphAttributes,
}

/// Instance data for one glyph quad, in pixels and atlas UVs.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlyphInstance {
    pub position: [f32; 2],
    pub size: [f32; 2],
    pub tex_min: [f32; 2],
    pub tex_max: [f32; 2],
    pub color: [f32; 4],
}

pub struct TextRendererContext<'r, D: AtlasDevice> {
    renderer: &'r TextRenderer<D>,
    /// Atlas label, for logging without taking the map lock.
    label: String,
    state: ContextState,
    frame: u64,
    glyphs: Vec<PlacedGlyph>,
    backgrounds: Vec<(usize, Vec<[f32; 4]>)>,
    /// Every lock taken by this context, one entry per lock.
    locked: Vec<usize>,
    ticket: Option<BlitTicket>,
}

impl<'r, D: AtlasDevice> TextRendererContext<'r, D> {
    pub(super) fn new(renderer: &'r TextRenderer<D>, label: String, frame: u64) -> Self {
        Self {
            renderer,
            label,
            state: ContextState::Preparing,
            frame,
            glyphs: Vec::new(),
            backgrounds: Vec::new(),
            locked: Vec::new(),
            ticket: None,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Frame number of the atlas when this context was opened.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(super) fn belongs_to(&self, renderer: &TextRenderer<D>) -> bool {
        std::ptr::eq(self.renderer, renderer)
    }

    /// Number of locks this context currently holds.
    pub fn lock_count(&self) -> usize {
        self.locked.len()
    }

    fn expect_state(&self, expected: ContextState) -> Result<(), AtlasError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AtlasError::InvalidContextState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }

    /// Resolve one row of glyphs to locked slots.
    ///
    /// `rasterizer` runs for cache misses only. It must not touch the
    /// renderer: the atlas is locked for the whole row. If a lookup fails the
    /// locks taken so far stay recorded and are dropped by [`Self::release`].
    pub fn set_glyph_keys<R>(
        &mut self,
        row: usize,
        keys: &[GlyphKey],
        attributes: &[GlyphAttributes],
        rasterizer: &mut R,
    ) -> Result<(), AtlasError>
    where
        R: GlyphRasterizer + ?Sized,
    {
        self.expect_state(ContextState::Preparing)?;
        if keys.len() != attributes.len() {
            return Err(AtlasError::RowLengthMismatch {
                row,
                keys: keys.len(),
                attributes: attributes.len(),
            });
        }

        let mut map = self.renderer.texture_map();
        self.glyphs.reserve(keys.len());
        for (column, (key, attrs)) in keys.iter().zip(attributes).enumerate() {
            let column = column as u32;
            let slot = map.find_or_allocate_locked_slot(key, column, rasterizer)?;
            self.locked.push(slot);
            self.glyphs.push(PlacedGlyph {
                row,
                column,
                key: *key,
                slot,
                attributes: *attrs,
            });
        }
        Ok(())
    }

    /// Keep a row of background colours for the background pass.
    pub fn set_background_row(&mut self, row: usize, colors: Vec<[f32; 4]>) -> Result<(), AtlasError> {
        self.expect_state(ContextState::Preparing)?;
        self.backgrounds.push((row, colors));
        Ok(())
    }

    /// Issue the blit for every glyph staged while preparing.
    pub fn prepare_for_draw(&mut self) -> Result<(), AtlasError> {
        self.expect_state(ContextState::Preparing)?;
        let ticket = self.renderer.texture_map().blit_staged_textures();
        log::trace!(
            "Context for frame {}: {} glyph(s), blit of {} cell(s) issued",
            self.frame,
            self.glyphs.len(),
            ticket.cell_count()
        );
        self.ticket = Some(ticket);
        self.state = ContextState::AwaitingBlit;
        Ok(())
    }

    /// Non-blocking check for blit completion. Moves to `Ready` when done.
    pub fn poll_ready(&mut self) -> Result<bool, AtlasError> {
        match self.state {
            ContextState::Ready => Ok(true),
            ContextState::AwaitingBlit => {
                let Some(ticket) = self.ticket.as_mut() else {
                    return Err(self.missing_ticket());
                };
                match ticket.is_complete() {
                    Ok(true) => {
                        self.ticket = None;
                        self.become_ready();
                        Ok(true)
                    }
                    Ok(false) => Ok(false),
                    Err(e) => {
                        let cells = ticket.cells().to_vec();
                        self.ticket = None;
                        Err(self.fail_blit(&cells, e))
                    }
                }
            }
            _ => Err(AtlasError::InvalidContextState {
                expected: ContextState::AwaitingBlit.as_str(),
                actual: self.state.as_str(),
            }),
        }
    }

    /// Block until the blit completed. Moves to `Ready`.
    pub fn wait_ready(&mut self) -> Result<(), AtlasError> {
        if self.state == ContextState::Ready {
            return Ok(());
        }
        self.expect_state(ContextState::AwaitingBlit)?;
        let Some(ticket) = self.ticket.take() else {
            return Err(self.missing_ticket());
        };
        let cells = ticket.cells().to_vec();
        if let Err(e) = ticket.wait() {
            return Err(self.fail_blit(&cells, e));
        }
        self.become_ready();
        Ok(())
    }

    fn missing_ticket(&self) -> AtlasError {
        AtlasError::InvalidContextState {
            expected: "awaiting blit with a pending ticket",
            actual: self.state.as_str(),
        }
    }

    /// The copy never finished: the persistent cells behind this frame's
    /// new glyphs are stale. Restage them for the next blit and park the
    /// context in `Failed` so none of its glyphs can be drawn.
    fn fail_blit(&mut self, cells: &[usize], error: AtlasError) -> AtlasError {
        log::error!("Context for frame {}: {error}", self.frame);
        self.renderer.texture_map().restage(cells);
        self.state = ContextState::Failed;
        self.renderer.preparing.store(false, Ordering::Release);
        error
    }

    fn become_ready(&mut self) {
        self.state = ContextState::Ready;
        // The next frame may start preparing; our locks stay until release.
        self.renderer.preparing.store(false, Ordering::Release);
    }

    /// Glyphs resolved by this context, in submission order.
    pub fn glyphs(&self) -> Result<&[PlacedGlyph], AtlasError> {
        self.expect_state(ContextState::Ready)?;
        Ok(&self.glyphs)
    }

    /// Resolved glyphs of one row.
    pub fn row(&self, row: usize) -> Result<impl Iterator<Item = &PlacedGlyph>, AtlasError> {
        Ok(self.glyphs()?.iter().filter(move |g| g.row == row))
    }

    /// Background rows handed in while preparing.
    pub fn backgrounds(&self) -> &[(usize, Vec<[f32; 4]>)] {
        &self.backgrounds
    }

    /// Build draw instances for every resolved glyph.
    pub fn instances(&self) -> Result<Vec<GlyphInstance>, AtlasError> {
        let glyphs = self.glyphs()?;
        let map = self.renderer.texture_map();
        let grid = *map.grid();
        let (w, h) = (grid.cell_width as f32, grid.cell_height as f32);
        Ok(glyphs
            .iter()
            .map(|g| {
                let [u0, v0, u1, v1] = grid.uv_rect(g.slot);
                GlyphInstance {
                    position: [g.column as f32 * w, g.row as f32 * h],
                    size: [w, h],
                    tex_min: [u0, v0],
                    tex_max: [u1, v1],
                    color: g.attributes.foreground_f32(),
                }
            })
            .collect())
    }

    /// The atlas this context allocates from.
    pub fn texture_map(&self) -> MutexGuard<'r, TextureMap<D>> {
        self.renderer.texture_map()
    }

    /// Unlock every slot this context locked and consume it.
    ///
    /// Call once the draw that read the glyphs has been issued. A context
    /// still awaiting its blit waits for it first so no slot is released
    /// mid-copy.
    pub fn release(mut self) -> Result<(), AtlasError> {
        if let Some(ticket) = self.ticket.take() {
            let cells = ticket.cells().to_vec();
            if let Err(e) = ticket.wait() {
                log::warn!("Releasing context for frame {}: {e}", self.frame);
                self.renderer.texture_map().restage(&cells);
            }
        }
        if matches!(
            self.state,
            ContextState::Preparing | ContextState::AwaitingBlit
        ) {
            self.renderer.preparing.store(false, Ordering::Release);
        }

        let mut first_error = None;
        {
            let mut map = self.renderer.texture_map();
            for index in self.locked.drain(..) {
                if let Err(e) = map.unlock_slot(index) {
                    first_error.get_or_insert(e);
                }
            }
        }
        self.state = ContextState::Consumed;
        first_error.map_or(Ok(()), Err)
    }
}

impl<D: AtlasDevice> Drop for TextRendererContext<'_, D> {
    fn drop(&mut self) {
        if self.state == ContextState::Consumed {
            return;
        }
        if matches!(
            self.state,
            ContextState::Preparing | ContextState::AwaitingBlit
        ) {
            self.renderer.preparing.store(false, Ordering::Release);
        }
        if !self.locked.is_empty() {
            log::warn!(
                "Context for frame {} dropped without release; {} lock(s) left in '{}'",
                self.frame,
                self.locked.len(),
                self.label
            );
        }
    }
}
