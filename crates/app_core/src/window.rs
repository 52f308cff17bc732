//! Virtualized grid window
//!
//! Maps a scroll offset and fixed grid geometry to the contiguous range of
//! rows (and item indices) that has to be materialized. Holds no per-item
//! state.

use std::ops::Range;

/// Horizontal padding around a thumbnail cell
const CELL_PADDING: f32 = 16.0;

#[derive(Debug, Clone, PartialEq)]
pub struct VirtualWindow {
    columns: usize,
    row_height: f32,
    viewport_height: f32,
    overscan_rows: usize,
    scroll_offset: f32,
    item_count: usize,
}

impl VirtualWindow {
    pub fn new(columns: usize, row_height: f32, viewport_height: f32, overscan_rows: usize) -> Self {
        Self {
            columns: columns.max(1),
            row_height: row_height.max(1.0),
            viewport_height: viewport_height.max(0.0),
            overscan_rows,
            scroll_offset: 0.0,
            item_count: 0,
        }
    }

    /// Columns that fit in `width` for a given thumbnail size
    pub fn columns_for_width(width: f32, thumbnail_size: f32) -> usize {
        (width / (thumbnail_size + CELL_PADDING)).max(1.0) as usize
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn row_height(&self) -> f32 {
        self.row_height
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// `ceil(n / c)`
    pub fn row_count(&self) -> usize {
        self.item_count.div_ceil(self.columns)
    }

    pub fn content_height(&self) -> f32 {
        self.row_count() as f32 * self.row_height
    }

    fn max_scroll(&self) -> f32 {
        (self.content_height() - self.viewport_height).max(0.0)
    }

    pub fn row_of(&self, index: usize) -> usize {
        index / self.columns
    }

    /// Rows intersecting the viewport
    pub fn visible_rows(&self) -> Range<usize> {
        let rows = self.row_count();
        if rows == 0 {
            return 0..0;
        }
        let first = (self.scroll_offset / self.row_height).floor() as usize;
        let end = ((self.scroll_offset + self.viewport_height) / self.row_height).ceil() as usize;
        first.min(rows)..end.clamp(first.min(rows), rows)
    }

    /// Visible rows widened by the overscan margin
    pub fn materialized_rows(&self) -> Range<usize> {
        let visible = self.visible_rows();
        let start = visible.start.saturating_sub(self.overscan_rows);
        let end = (visible.end + self.overscan_rows).min(self.row_count());
        start..end.max(start)
    }

    /// Item indices in one row; the last row may be short
    pub fn row_items(&self, row: usize) -> Range<usize> {
        let start = (row * self.columns).min(self.item_count);
        let end = (start + self.columns).min(self.item_count);
        start..end
    }

    /// `row * c + col`, or `None` past the end of the collection
    pub fn cell(&self, row: usize, col: usize) -> Option<usize> {
        if col >= self.columns {
            return None;
        }
        let index = row * self.columns + col;
        (index < self.item_count).then_some(index)
    }

    /// Flat item range to render
    pub fn materialized_items(&self) -> Range<usize> {
        let rows = self.materialized_rows();
        if rows.is_empty() {
            return 0..0;
        }
        self.row_items(rows.start).start..self.row_items(rows.end - 1).end
    }

    pub fn scroll_to(&mut self, offset: f32) {
        self.scroll_offset = offset.clamp(0.0, self.max_scroll());
    }

    /// Minimal scroll bringing `index`'s row fully into view.
    /// Returns true if the offset changed.
    pub fn scroll_into_view(&mut self, index: usize) -> bool {
        if index >= self.item_count {
            return false;
        }
        let top = self.row_of(index) as f32 * self.row_height;
        let bottom = top + self.row_height;
        let before = self.scroll_offset;

        if top < self.scroll_offset {
            self.scroll_to(top);
        } else if bottom > self.scroll_offset + self.viewport_height {
            self.scroll_to(bottom - self.viewport_height);
        }
        self.scroll_offset != before
    }

    pub fn set_item_count(&mut self, count: usize) {
        self.item_count = count;
        self.remeasure(None);
    }

    /// Change the column count, keeping the first visible item on screen
    pub fn set_columns(&mut self, columns: usize) {
        let columns = columns.max(1);
        if columns == self.columns {
            return;
        }
        let anchor = self.row_items(self.visible_rows().start).start;
        self.columns = columns;
        self.remeasure(Some(anchor));
    }

    pub fn set_row_height(&mut self, row_height: f32) {
        let row_height = row_height.max(1.0);
        if row_height == self.row_height {
            return;
        }
        let anchor = self.row_items(self.visible_rows().start).start;
        self.row_height = row_height;
        self.remeasure(Some(anchor));
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(0.0);
        self.remeasure(None);
    }

    fn remeasure(&mut self, anchor: Option<usize>) {
        match anchor {
            Some(index) if index < self.item_count => {
                self.scroll_to(self.row_of(index) as f32 * self.row_height)
            }
            _ => self.scroll_to(self.scroll_offset),
        }
    }
}
