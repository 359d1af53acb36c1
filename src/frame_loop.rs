//! Headless frame loop over a synthetic terminal grid.
//!
//! Each frame scrolls the grid by one line, feeds every row through the
//! renderer, waits for the staging blit, builds the draw instances and then
//! releases the frame's slot locks.

use std::fmt;

use term_atlas_render::{
    AtlasDevice, AtlasError, AtlasStats, Bitmap, GlyphAttributes, GlyphKey, RowDataSource,
    TextRenderer,
};

const TEXT: &[&str] = &[
    "$ cargo build --release",
    "   Compiling term-atlas v0.1.0",
    "    Finished `release` profile [optimized] target(s) in 4.21s",
    "$ ls -la",
    "drwxr-xr-x  6 user staff   192 Oct 16 09:12 src",
    "-rw-r--r--  1 user staff  1834 Oct 16 09:10 Cargo.toml",
    "$ git log --oneline | head -3",
    "e3a1f0c Lock atlas slots per frame",
    "9b2c4d1 Pad short glyph bitmaps",
    "71f8e2a Blit staged cells in one submission",
    "$ echo \"δ λ π → ∞\"",
    "δ λ π → ∞",
];

const FG: [u8; 4] = [0xd0, 0xd0, 0xd0, 0xff];
const BG: [u8; 4] = [0x1e, 0x1e, 0x1e, 0xff];
const STATUS_FG: [u8; 4] = [0x20, 0x20, 0x20, 0xff];
const STATUS_BG: [u8; 4] = [0x8a, 0xb4, 0xf8, 0xff];

/// Scrolling text grid whose bottom row is a box-drawn status line.
pub struct SyntheticGrid {
    cols: usize,
    rows: usize,
    cell_width: u32,
    cell_height: u32,
    scroll: usize,
    lines: Vec<Vec<char>>,
    rasterized: usize,
}

impl SyntheticGrid {
    pub fn new(cols: usize, rows: usize, cell_width: u32, cell_height: u32) -> Self {
        Self {
            cols,
            rows,
            cell_width,
            cell_height,
            scroll: 0,
            lines: TEXT.iter().map(|line| line.chars().collect()).collect(),
            rasterized: 0,
        }
    }

    /// Scroll so that `line` of the text is at the top.
    pub fn scroll_to(&mut self, line: usize) {
        self.scroll = line;
    }

    /// Glyphs rasterized so far.
    pub fn rasterized(&self) -> usize {
        self.rasterized
    }

    fn is_status_row(&self, row: usize) -> bool {
        self.rows > 1 && row + 1 == self.rows
    }

    fn status_char(&self, column: usize) -> char {
        let label: Vec<char> = format!(" line {} ", self.scroll).chars().collect();
        match column.checked_sub(2) {
            Some(i) if i < label.len() => label[i],
            _ => '─',
        }
    }

    fn char_at(&self, row: usize, column: usize) -> char {
        if self.is_status_row(row) {
            return self.status_char(column);
        }
        let line = &self.lines[(self.scroll + row) % self.lines.len()];
        line.get(column).copied().unwrap_or(' ')
    }

    /// Bitmap for one character: a glyph-coloured block with a transparent
    /// border, so distinct codes produce distinct cells.
    fn glyph_bitmap(&self, c: char) -> Bitmap {
        let (w, h) = (self.cell_width, self.cell_height);
        let code = c as u32;
        let ink = [
            (code & 0xff) as u8,
            ((code >> 8) & 0xff) as u8,
            ((code >> 16) & 0xff) as u8,
            0xff,
        ];
        let mut pixels = vec![0u8; (w * h * 4) as usize];
        if c != ' ' {
            for y in 1..h.saturating_sub(1) {
                for x in 1..w.saturating_sub(1) {
                    let at = ((y * w + x) * 4) as usize;
                    pixels[at..at + 4].copy_from_slice(&ink);
                }
            }
        }
        Bitmap {
            width: w,
            height: h,
            pixels,
        }
    }
}

impl RowDataSource for SyntheticGrid {
    fn grid_size(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    fn glyph_row(
        &mut self,
        row: usize,
        keys: &mut Vec<GlyphKey>,
        attributes: &mut Vec<GlyphAttributes>,
        backgrounds: &mut Vec<[f32; 4]>,
    ) {
        let status = self.is_status_row(row);
        let (fg, bg) = if status {
            (STATUS_FG, STATUS_BG)
        } else {
            (FG, BG)
        };
        let background = GlyphAttributes::new(fg, bg).background_f32();
        for column in 0..self.cols {
            let c = self.char_at(row, column);
            let key = GlyphKey::from_char(c);
            keys.push(if c == '─' { key.box_drawing() } else { key });
            attributes.push(GlyphAttributes::new(fg, bg));
            backgrounds.push(background);
        }
    }

    fn rasterize(&mut self, row: usize, column: u32) -> Bitmap {
        self.rasterized += 1;
        self.glyph_bitmap(self.char_at(row, column as usize))
    }
}

/// Totals from a frame loop run.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frames: usize,
    pub instances: usize,
    pub rasterized: usize,
    pub occupied: usize,
    pub capacity: usize,
    pub stats: AtlasStats,
}

impl FrameReport {
    /// Fraction of lookups served from the atlas.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.stats.hits + self.stats.misses;
        if lookups == 0 {
            0.0
        } else {
            self.stats.hits as f64 / lookups as f64
        }
    }
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "frames:        {}", self.frames)?;
        writeln!(f, "instances:     {}", self.instances)?;
        writeln!(f, "rasterized:    {}", self.rasterized)?;
        writeln!(
            f,
            "hits/misses:   {}/{} ({:.1}% hit rate)",
            self.stats.hits,
            self.stats.misses,
            self.hit_rate() * 100.0
        )?;
        writeln!(f, "evictions:     {}", self.stats.evictions)?;
        writeln!(
            f,
            "blits:         {} ({} cells)",
            self.stats.blits, self.stats.cells_blitted
        )?;
        write!(f, "occupancy:     {}/{}", self.occupied, self.capacity)
    }
}

/// Prepare, draw and release `frames` frames of `grid`.
pub fn run_frames<D: AtlasDevice>(
    renderer: &TextRenderer<D>,
    grid: &mut SyntheticGrid,
    frames: usize,
) -> Result<FrameReport, AtlasError> {
    let mut instances = 0;
    for frame in 0..frames {
        grid.scroll_to(frame);
        let mut context = renderer.prepare_rows(grid)?;

        let mut built = Ok(0);
        let drawn = renderer.prepare_for_draw(&mut context, |ready| {
            built = ready.instances().map(|batch| batch.len());
        });
        let released = renderer.release_context(context);
        drawn?;
        released?;
        instances += built?;
        log::trace!("Frame {frame} prepared");
    }

    let map = renderer.texture_map();
    let report = FrameReport {
        frames,
        instances,
        rasterized: grid.rasterized(),
        occupied: map.occupied(),
        capacity: map.capacity(),
        stats: map.stats(),
    };
    log::info!(
        "Ran {} frames on '{}': {} hits, {} misses, {} evictions",
        frames,
        map.label(),
        report.stats.hits,
        report.stats.misses,
        report.stats.evictions
    );
    Ok(report)
}
