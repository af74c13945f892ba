//! Sparse row-indexed cell storage for editable worksheets

use std::collections::BTreeMap;

use super::{CellData, CellRange, CellValue};
use crate::style::StyleId;

/// Row index -> (column index -> cell). Absence means blank.
///
/// Ordered maps give row-major iteration for free, which is the order the
/// sheet XML must be written in.
#[derive(Debug, Clone, Default)]
pub struct CellStore {
    rows: BTreeMap<u32, BTreeMap<u16, CellData>>,
    len: usize,
}

impl CellStore {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell
    pub fn get(&self, row: u32, col: u16) -> Option<&CellData> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Get a cell mutably
    pub fn get_mut(&mut self, row: u32, col: u16) -> Option<&mut CellData> {
        self.rows.get_mut(&row).and_then(|r| r.get_mut(&col))
    }

    /// Whether a cell record exists at (row, col)
    pub fn contains(&self, row: u32, col: u16) -> bool {
        self.get(row, col).is_some()
    }

    /// Store a full cell record, returning the previous one
    pub fn set(&mut self, row: u32, col: u16, data: CellData) -> Option<CellData> {
        let old = self.rows.entry(row).or_default().insert(col, data);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    /// Replace the value of a cell, keeping its style
    pub fn set_value(&mut self, row: u32, col: u16, value: CellValue) {
        match self.get_mut(row, col) {
            Some(cell) => cell.value = value,
            None => {
                self.set(row, col, CellData::new(value));
            }
        }
    }

    /// Replace the style of a cell, keeping its value
    pub fn set_style(&mut self, row: u32, col: u16, style: Option<StyleId>) {
        match self.get_mut(row, col) {
            Some(cell) => cell.style = style,
            None if style.is_some() => {
                self.set(
                    row,
                    col,
                    CellData {
                        value: CellValue::Blank,
                        style,
                    },
                );
            }
            None => {}
        }
    }

    /// Remove a cell
    pub fn remove(&mut self, row: u32, col: u16) -> Option<CellData> {
        let cols = self.rows.get_mut(&row)?;
        let removed = cols.remove(&col);
        if cols.is_empty() {
            self.rows.remove(&row);
        }
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Number of stored cells
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Smallest range covering every stored cell
    pub fn used_range(&self) -> Option<CellRange> {
        let min_row = *self.rows.keys().next()?;
        let max_row = *self.rows.keys().next_back()?;
        let mut min_col = u16::MAX;
        let mut max_col = 0u16;
        for cols in self.rows.values() {
            if let (Some(&first), Some(&last)) = (cols.keys().next(), cols.keys().next_back()) {
                min_col = min_col.min(first);
                max_col = max_col.max(last);
            }
        }
        Some(CellRange::from_indices(min_row, min_col, max_row, max_col))
    }

    /// Iterate over all cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.rows
            .iter()
            .flat_map(|(&row, cols)| cols.iter().map(move |(&col, data)| (row, col, data)))
    }

    /// Iterate over rows that hold at least one cell
    pub fn rows(&self) -> impl Iterator<Item = (u32, &BTreeMap<u16, CellData>)> {
        self.rows.iter().map(|(&r, cols)| (r, cols))
    }

    /// Iterate over the cells of one row
    pub fn row(&self, row: u32) -> impl Iterator<Item = (u16, &CellData)> {
        self.rows
            .get(&row)
            .into_iter()
            .flat_map(|cols| cols.iter().map(|(&c, d)| (c, d)))
    }

    /// Iterate over the cells inside a rectangle, row-major
    pub fn iter_range(&self, range: CellRange) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.rows
            .range(range.start.row..=range.end.row)
            .flat_map(move |(&row, cols)| {
                cols.range(range.start.col..=range.end.col)
                    .map(move |(&col, data)| (row, col, data))
            })
    }

    /// Remove every cell
    pub fn clear(&mut self) {
        self.rows.clear();
        self.len = 0;
    }
}
