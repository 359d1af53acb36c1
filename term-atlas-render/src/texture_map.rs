//! Glyph slot allocator over a fixed-capacity texture atlas.
//!
//! Maps glyph keys to slot indices, locks slots for the frame that uses them,
//! and evicts the least-recently-used unlocked slot once every cell is taken.
//! New glyphs are written into the stage array and only become visible in
//! the persistent array after [`TextureMap::blit_staged_textures`] completes.

use std::collections::{BTreeSet, HashMap};

use term_atlas_config::AtlasConfig;

use crate::error::AtlasError;
use crate::glyph::{GlyphKey, GlyphRasterizer, SlotKey};
use crate::staging::{BlitTicket, StagingArea};
use crate::texture_array::{ArrayRole, AtlasDevice, CellGrid, TextureArray};

#[derive(Debug, Clone, Default)]
struct Slot {
    key: Option<SlotKey>,
    /// Outstanding locks taken by the current frame.
    locks: u32,
    /// Frame number of the last allocation or hit.
    last_used: u64,
}

/// Running counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtlasStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Blits that copied at least one cell.
    pub blits: u64,
    pub cells_blitted: u64,
}

pub struct TextureMap<D: AtlasDevice> {
    device: D,
    label: String,
    array: D::Array,
    stage: D::Array,
    slots: Vec<Slot>,
    index_of: HashMap<SlotKey, usize>,
    free: BTreeSet<usize>,
    staging: StagingArea,
    frame: u64,
    stats: AtlasStats,
}

impl<D: AtlasDevice> TextureMap<D> {
    /// Create an empty atlas of `capacity` cells of `cell_width x cell_height` pixels.
    ///
    /// Geometry is fixed for the lifetime of the map; a new cell size needs a
    /// new map.
    pub fn new(
        device: D,
        label: impl Into<String>,
        cell_width: u32,
        cell_height: u32,
        capacity: usize,
    ) -> Result<Self, AtlasError> {
        let label = label.into();
        let array = device.create_array(
            &label,
            ArrayRole::Persistent,
            cell_width,
            cell_height,
            capacity,
        )?;
        let stage = device.create_array(&label, ArrayRole::Stage, cell_width, cell_height, capacity)?;

        log::info!("Texture map '{label}': {capacity} cells of {cell_width}x{cell_height}");

        Ok(Self {
            device,
            label,
            array,
            stage,
            slots: vec![Slot::default(); capacity],
            index_of: HashMap::with_capacity(capacity),
            free: (0..capacity).collect(),
            staging: StagingArea::default(),
            frame: 0,
            stats: AtlasStats::default(),
        })
    }

    pub fn from_config(device: D, config: &AtlasConfig) -> Result<Self, AtlasError> {
        Self::new(
            device,
            config.label.clone(),
            config.cell_width,
            config.cell_height,
            config.capacity,
        )
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// The persistent array read by draws.
    pub fn array(&self) -> &D::Array {
        &self.array
    }

    pub fn stage(&self) -> &D::Array {
        &self.stage
    }

    pub fn grid(&self) -> &CellGrid {
        self.array.grid()
    }

    /// Texture coordinates of a slot in the persistent array.
    pub fn uv_rect(&self, index: usize) -> [f32; 4] {
        self.grid().uv_rect(index)
    }

    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        self.grid().cell_origin(index)
    }

    pub fn occupied(&self) -> usize {
        self.index_of.len()
    }

    /// Slots holding at least one lock.
    pub fn locked_count(&self) -> usize {
        self.slots.iter().filter(|s| s.locks > 0).count()
    }

    pub fn lock_count(&self, index: usize) -> u32 {
        self.slots.get(index).map_or(0, |s| s.locks)
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn stats(&self) -> AtlasStats {
        self.stats
    }

    /// Cells written to the stage and not yet blitted.
    pub fn staged_count(&self) -> usize {
        self.staging.len()
    }

    /// Slot currently holding `key` at `column`, without locking it.
    pub fn slot_for(&self, key: &GlyphKey, column: u32) -> Option<usize> {
        self.index_of.get(&SlotKey::new(*key, column)).copied()
    }

    /// Begin a new frame.
    ///
    /// Occupancy survives; per-frame protection from eviction resets. Any lock
    /// left over from the previous frame is reported, not cleared, since a
    /// draw may still be reading that slot.
    pub fn start_new_frame(&mut self) -> Result<(), AtlasError> {
        let count = self.locked_count();
        if count > 0 {
            log::error!(
                "Texture map '{}': {count} stale lock(s) at start of frame {}",
                self.label,
                self.frame + 1
            );
            return Err(AtlasError::StaleLocks {
                label: self.label.clone(),
                count,
            });
        }
        self.frame += 1;
        Ok(())
    }

    /// Return the slot holding `key`, locked for the current frame.
    ///
    /// On a miss the rasterizer is called once, its bitmap is written to the
    /// stage cell of the chosen slot, and the slot is tagged with the key.
    /// The index is valid for the rest of the frame even before the blit.
    pub fn find_or_allocate_locked_slot<R>(
        &mut self,
        key: &GlyphKey,
        column: u32,
        rasterizer: &mut R,
    ) -> Result<usize, AtlasError>
    where
        R: GlyphRasterizer + ?Sized,
    {
        let slot_key = SlotKey::new(*key, column);
        if let Some(&index) = self.index_of.get(&slot_key) {
            let slot = &mut self.slots[index];
            slot.locks += 1;
            slot.last_used = self.frame;
            self.stats.hits += 1;
            return Ok(index);
        }

        let index = self.choose_destination()?;

        let grid = *self.stage.grid();
        let pixels = rasterizer
            .rasterize(column)
            .padded_to_cell(grid.cell_width, grid.cell_height)?;

        if let Some(old) = self.slots[index].key.take() {
            self.index_of.remove(&old);
            self.stats.evictions += 1;
            log::debug!(
                "Texture map '{}': evicting {:?} from slot {index} for {:?}",
                self.label,
                old,
                slot_key
            );
        }
        self.free.remove(&index);

        self.device.write_cell(&mut self.stage, index, &pixels);
        self.staging.mark(index);

        self.slots[index] = Slot {
            key: Some(slot_key),
            locks: 1,
            last_used: self.frame,
        };
        self.index_of.insert(slot_key, index);
        self.stats.misses += 1;
        Ok(index)
    }

    /// Lowest free slot, else the least-recently-used evictable one.
    fn choose_destination(&self) -> Result<usize, AtlasError> {
        if let Some(&index) = self.free.first() {
            return Ok(index);
        }

        // Ties on last_used go to the lowest index because min_by_key keeps
        // the first minimum.
        self.slots
            .iter()
            .enumerate()
            .filter(|(index, slot)| {
                slot.locks == 0 && slot.last_used < self.frame && !self.staging.is_dirty(*index)
            })
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(index, _)| index)
            .ok_or_else(|| {
                log::error!(
                    "Texture map '{}' exhausted: {} slots, {} locked",
                    self.label,
                    self.capacity(),
                    self.locked_count()
                );
                AtlasError::CapacityExhausted {
                    label: self.label.clone(),
                    capacity: self.capacity(),
                }
            })
    }

    /// Release one lock on `index`.
    pub fn unlock_slot(&mut self, index: usize) -> Result<(), AtlasError> {
        match self.slots.get_mut(index) {
            Some(slot) if slot.locks > 0 => {
                slot.locks -= 1;
                Ok(())
            }
            _ => {
                log::error!("Texture map '{}': invalid unlock of slot {index}", self.label);
                Err(AtlasError::InvalidUnlock {
                    label: self.label.clone(),
                    index,
                })
            }
        }
    }

    /// Copy every stage cell written since the last blit into the persistent
    /// array.
    ///
    /// Returns at once; the ticket completes when the device has finished.
    /// With nothing staged no device work is issued and the ticket is
    /// already complete.
    pub fn blit_staged_textures(&mut self) -> BlitTicket {
        let indices = self.staging.drain();
        if indices.is_empty() {
            return BlitTicket::ready(&self.label);
        }

        log::debug!(
            "Texture map '{}': blitting {} cell(s) for frame {}",
            self.label,
            indices.len(),
            self.frame
        );
        self.stats.blits += 1;
        self.stats.cells_blitted += indices.len() as u64;
        self.device
            .blit(&self.label, &self.stage, &mut self.array, &indices)
    }

    /// Put cells of a blit that never completed back on the staging list.
    ///
    /// Their stage cells still hold the pixels of the slot's current key, so
    /// the next blit copies them again. Empty slots are skipped.
    pub(crate) fn restage(&mut self, indices: &[usize]) {
        let mut count = 0;
        for &index in indices {
            if self.slots.get(index).is_some_and(|slot| slot.key.is_some()) {
                self.staging.mark(index);
                count += 1;
            }
        }
        log::warn!(
            "Texture map '{}': restaged {count} cell(s) from an abandoned blit",
            self.label
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::Bitmap;
    use crate::texture_array::CpuAtlasDevice;

    fn map(capacity: usize) -> TextureMap<CpuAtlasDevice> {
        TextureMap::new(CpuAtlasDevice::default(), "test", 1, 1, capacity).unwrap()
    }

    fn solid(value: u8) -> impl FnMut(u32) -> Bitmap {
        move |_| Bitmap::solid(1, 1, [value; 4])
    }

    #[test]
    fn free_slots_fill_lowest_first() {
        let mut map = map(3);
        map.start_new_frame().unwrap();
        let a = map
            .find_or_allocate_locked_slot(&GlyphKey::from_char('a'), 0, &mut solid(1))
            .unwrap();
        let b = map
            .find_or_allocate_locked_slot(&GlyphKey::from_char('b'), 1, &mut solid(2))
            .unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(map.occupied(), 2);
        assert_eq!(map.staged_count(), 2);
    }

    #[test]
    fn hit_increments_lock_without_rasterizing() {
        let mut map = map(2);
        map.start_new_frame().unwrap();
        let key = GlyphKey::from_char('x');
        let mut calls = 0;
        let mut raster = |_: u32| {
            calls += 1;
            Bitmap::solid(1, 1, [9; 4])
        };
        let first = map.find_or_allocate_locked_slot(&key, 0, &mut raster).unwrap();
        let second = map.find_or_allocate_locked_slot(&key, 4, &mut raster).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls, 1);
        assert_eq!(map.lock_count(first), 2);
        assert_eq!(map.stats().hits, 1);
        assert_eq!(map.stats().misses, 1);
    }

    #[test]
    fn unlock_of_unlocked_slot_is_rejected() {
        let mut map = map(2);
        assert!(matches!(
            map.unlock_slot(0),
            Err(AtlasError::InvalidUnlock { index: 0, .. })
        ));
        assert!(matches!(
            map.unlock_slot(7),
            Err(AtlasError::InvalidUnlock { index: 7, .. })
        ));
    }

    #[test]
    fn stale_locks_block_new_frame() {
        let mut map = map(2);
        map.start_new_frame().unwrap();
        map.find_or_allocate_locked_slot(&GlyphKey::from_char('a'), 0, &mut solid(1))
            .unwrap();
        assert!(matches!(
            map.start_new_frame(),
            Err(AtlasError::StaleLocks { count: 1, .. })
        ));
        // Not silently cleared.
        assert_eq!(map.locked_count(), 1);
        map.unlock_slot(0).unwrap();
        assert!(map.start_new_frame().is_ok());
    }

    #[test]
    fn unlocked_slot_is_not_evicted_in_the_frame_that_used_it() {
        let mut map = map(1);
        map.start_new_frame().unwrap();
        let index = map
            .find_or_allocate_locked_slot(&GlyphKey::from_char('a'), 0, &mut solid(1))
            .unwrap();
        map.unlock_slot(index).unwrap();
        let _ = map.blit_staged_textures();
        assert!(matches!(
            map.find_or_allocate_locked_slot(&GlyphKey::from_char('b'), 0, &mut solid(2)),
            Err(AtlasError::CapacityExhausted { capacity: 1, .. })
        ));
    }

    #[test]
    fn staged_slot_is_not_evicted_before_blit() {
        let mut map = map(1);
        map.start_new_frame().unwrap();
        map.find_or_allocate_locked_slot(&GlyphKey::from_char('a'), 0, &mut solid(1))
            .unwrap();
        map.unlock_slot(0).unwrap();
        map.start_new_frame().unwrap();
        assert!(matches!(
            map.find_or_allocate_locked_slot(&GlyphKey::from_char('b'), 0, &mut solid(2)),
            Err(AtlasError::CapacityExhausted { .. })
        ));
        map.blit_staged_textures().wait().unwrap();
        assert_eq!(
            map.find_or_allocate_locked_slot(&GlyphKey::from_char('b'), 0, &mut solid(2))
                .unwrap(),
            0
        );
    }

    #[test]
    fn eviction_prefers_least_recently_used() {
        let mut map = map(3);
        let keys: Vec<_> = ['a', 'b', 'c'].into_iter().map(GlyphKey::from_char).collect();

        map.start_new_frame().unwrap();
        for key in &keys {
            map.find_or_allocate_locked_slot(key, 0, &mut solid(1)).unwrap();
        }
        for index in 0..3 {
            map.unlock_slot(index).unwrap();
        }
        map.blit_staged_textures().wait().unwrap();

        // Frame 2 touches 'a' only, so 'b' (slot 1) becomes the oldest.
        map.start_new_frame().unwrap();
        map.find_or_allocate_locked_slot(&keys[0], 0, &mut solid(1)).unwrap();
        map.unlock_slot(0).unwrap();
        map.blit_staged_textures().wait().unwrap();

        map.start_new_frame().unwrap();
        let d = map
            .find_or_allocate_locked_slot(&GlyphKey::from_char('d'), 0, &mut solid(4))
            .unwrap();
        assert_eq!(d, 1);
        assert_eq!(map.slot_for(&keys[1], 0), None);
        assert_eq!(map.stats().evictions, 1);
    }

    #[test]
    fn oversized_bitmap_leaves_map_untouched() {
        let mut map = map(2);
        map.start_new_frame().unwrap();
        let result = map.find_or_allocate_locked_slot(&GlyphKey::from_char('a'), 0, &mut |_: u32| {
            Bitmap::solid(2, 2, [1; 4])
        });
        assert!(matches!(result, Err(AtlasError::InvalidBitmap { .. })));
        assert_eq!(map.occupied(), 0);
        assert_eq!(map.staged_count(), 0);
        assert_eq!(map.locked_count(), 0);
    }

    #[test]
    fn empty_blit_issues_no_device_work() {
        let mut map = map(2);
        let ticket = map.blit_staged_textures();
        assert_eq!(ticket.cell_count(), 0);
        assert!(ticket.wait().is_ok());
        assert_eq!(map.stats().blits, 0);
    }

    #[test]
    fn restage_marks_occupied_cells_dirty_again() {
        let mut map = map(3);
        map.start_new_frame().unwrap();
        let a = map
            .find_or_allocate_locked_slot(&GlyphKey::from_char('a'), 0, &mut solid(7))
            .unwrap();
        let ticket = map.blit_staged_textures();
        assert_eq!(ticket.cells(), &[a]);
        assert_eq!(map.staged_count(), 0);

        // Slot 2 was never allocated and is not restaged.
        map.restage(&[a, 2]);
        assert_eq!(map.staged_count(), 1);

        map.unlock_slot(a).unwrap();
        map.start_new_frame().unwrap();
        let ticket = map.blit_staged_textures();
        assert_eq!(ticket.cells(), &[a]);
        ticket.wait().unwrap();
        assert_eq!(map.array().cell(a), &[7, 7, 7, 7]);
    }
}
