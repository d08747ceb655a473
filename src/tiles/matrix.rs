//! Tile grids.
//!
//! One frame at one scale is a `rows x cols` matrix of tiles. Each tile is
//! in exactly one of three states (empty, fetch in flight, or loaded),
//! captured in a single tagged slot rather than parallel arrays, so the
//! bookkeeping cannot drift out of shape.

use crate::compositor::{Bitmap, RequestId};
use crate::core::geometry::{Rect, Size};

/// Per-tile lifecycle state
#[derive(Debug, Clone)]
pub enum TileSlot {
    Empty,
    Pending(RequestId),
    Loaded(Bitmap),
}

impl TileSlot {
    pub fn is_empty(&self) -> bool {
        matches!(self, TileSlot::Empty)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, TileSlot::Pending(_))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, TileSlot::Loaded(_))
    }
}

/// A row-major matrix of tile slots
#[derive(Debug)]
pub struct TileGrid {
    rows: usize,
    cols: usize,
    slots: Vec<TileSlot>,
}

impl TileGrid {
    /// Sizes a grid to cover `content` (in scaled pixels) with tiles of
    /// `tile_size`.
    pub fn for_content(content: Size, tile_size: Size) -> Self {
        let cols = (content.width / tile_size.width).ceil().max(0.0) as usize;
        let rows = (content.height / tile_size.height).ceil().max(0.0) as usize;
        Self {
            rows,
            cols,
            slots: vec![TileSlot::Empty; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn position(&self, index: usize) -> (usize, usize) {
        (index / self.cols, index % self.cols)
    }

    pub fn get(&self, index: usize) -> &TileSlot {
        &self.slots[index]
    }

    pub fn set(&mut self, index: usize, slot: TileSlot) {
        self.slots[index] = slot;
    }

    /// The inclusive (row, col) span of tiles overlapping `rect`, or None
    /// when the rect misses the grid entirely.
    pub fn tile_range(&self, rect: &Rect, tile_size: Size) -> Option<(usize, usize, usize, usize)> {
        if rect.is_empty() || self.slots.is_empty() {
            return None;
        }
        let col_start = (rect.min.x / tile_size.width).floor().max(0.0) as usize;
        let row_start = (rect.min.y / tile_size.height).floor().max(0.0) as usize;
        if col_start >= self.cols || row_start >= self.rows {
            return None;
        }
        // Exclusive max edge: a rect ending exactly on a tile boundary does
        // not touch the next tile.
        let col_end = (((rect.max.x / tile_size.width).ceil() as usize).max(col_start + 1) - 1)
            .min(self.cols - 1);
        let row_end = (((rect.max.y / tile_size.height).ceil() as usize).max(row_start + 1) - 1)
            .min(self.rows - 1);
        Some((row_start, col_start, row_end, col_end))
    }

    /// The rect (in scaled pixels) covered by one tile
    pub fn tile_rect(&self, row: usize, col: usize, tile_size: Size) -> Rect {
        Rect::from_coords(
            col as f64 * tile_size.width,
            row as f64 * tile_size.height,
            (col + 1) as f64 * tile_size.width,
            (row + 1) as f64 * tile_size.height,
        )
    }

    /// Snapshot of loaded bitmaps for the render model
    pub fn snapshot(&self) -> Vec<Option<Bitmap>> {
        self.slots
            .iter()
            .map(|slot| match slot {
                TileSlot::Loaded(bitmap) => Some(bitmap.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn loaded_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_loaded()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &TileSlot)> {
        self.slots.iter().enumerate()
    }
}

/// A row-major boolean grid matching a [`TileGrid`]'s shape
#[derive(Debug, Clone)]
pub struct BitGrid {
    rows: usize,
    cols: usize,
    bits: Vec<bool>,
}

impl BitGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            bits: vec![false; rows * cols],
        }
    }

    pub fn matches_shape(&self, grid: &TileGrid) -> bool {
        self.rows == grid.rows() && self.cols == grid.cols()
    }

    pub fn get(&self, index: usize) -> bool {
        self.bits[index]
    }

    pub fn set(&mut self, index: usize, value: bool) {
        self.bits[index] = value;
    }

    pub fn clear(&mut self) {
        self.bits.fill(false);
    }

    /// Indices of the in-bounds four-neighborhood of a tile
    pub fn neighbors(&self, index: usize) -> Vec<usize> {
        let row = index / self.cols;
        let col = index % self.cols;
        let mut out = Vec::with_capacity(4);
        if row > 0 {
            out.push(index - self.cols);
        }
        if row + 1 < self.rows {
            out.push(index + self.cols);
        }
        if col > 0 {
            out.push(index - 1);
        }
        if col + 1 < self.cols {
            out.push(index + 1);
        }
        out
    }
}
