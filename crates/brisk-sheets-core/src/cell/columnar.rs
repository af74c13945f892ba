//! Column-oriented, read-only cell storage.
//!
//! Populated by the read-only loader straight from sheet XML so that no
//! [`CellData`](super::CellData) is ever built. Each column keeps separate
//! `(row, value)` arrays per value type, appended in ascending row order and
//! searched with binary search.

use std::collections::BTreeMap;

use super::{CellError, CellRange};
use crate::strings::StringId;
use crate::style::StyleId;

/// The typed arrays of one column
#[derive(Debug, Clone, Default)]
pub struct ColumnData {
    pub numbers: Vec<(u32, f64)>,
    pub strings: Vec<(u32, StringId)>,
    pub bools: Vec<(u32, bool)>,
    pub text: Vec<(u32, String)>,
    pub errors: Vec<(u32, CellError)>,
    /// Explicit cell styles; needed to tell dates from plain numbers
    pub styles: Vec<(u32, StyleId)>,
}

fn find<T>(items: &[(u32, T)], row: u32) -> Option<&T> {
    items
        .binary_search_by_key(&row, |(r, _)| *r)
        .ok()
        .map(|i| &items[i].1)
}

impl ColumnData {
    /// Number of values held in the column
    pub fn len(&self) -> usize {
        self.numbers.len() + self.strings.len() + self.bools.len() + self.text.len() + self.errors.len()
    }

    /// Whether the column holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row`
    pub fn get(&self, row: u32) -> ColumnarValue<'_> {
        if let Some(&n) = find(&self.numbers, row) {
            return ColumnarValue::Number(n);
        }
        if let Some(&id) = find(&self.strings, row) {
            return ColumnarValue::SharedString(id);
        }
        if let Some(&b) = find(&self.bools, row) {
            return ColumnarValue::Bool(b);
        }
        if let Some(t) = find(&self.text, row) {
            return ColumnarValue::Text(t);
        }
        if let Some(&e) = find(&self.errors, row) {
            return ColumnarValue::Error(e);
        }
        ColumnarValue::Blank
    }

    /// Explicit style at `row`
    pub fn style(&self, row: u32) -> Option<StyleId> {
        find(&self.styles, row).copied()
    }

    fn sort(&mut self) {
        fn sort_rows<T>(v: &mut [(u32, T)]) {
            if !v.windows(2).all(|w| w[0].0 < w[1].0) {
                v.sort_by_key(|(r, _)| *r);
            }
        }
        sort_rows(&mut self.numbers);
        sort_rows(&mut self.strings);
        sort_rows(&mut self.bools);
        sort_rows(&mut self.text);
        sort_rows(&mut self.errors);
        sort_rows(&mut self.styles);
    }
}

/// A value read from columnar storage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnarValue<'a> {
    Blank,
    Number(f64),
    SharedString(StringId),
    Bool(bool),
    Text(&'a str),
    Error(CellError),
}

/// A worksheet held as per-column arrays
#[derive(Debug, Clone, Default)]
pub struct ColumnarSheet {
    name: String,
    dimension: Option<CellRange>,
    columns: BTreeMap<u16, ColumnData>,
    projection: Option<Vec<u16>>,
    row_cap: Option<u32>,
    truncated: bool,
}

impl ColumnarSheet {
    /// Create an empty sheet, optionally restricted to `projection` columns
    /// and to rows below `row_cap`
    pub fn new<S: Into<String>>(name: S, projection: Option<Vec<u16>>, row_cap: Option<u32>) -> Self {
        let projection = projection.map(|mut cols| {
            cols.sort_unstable();
            cols.dedup();
            cols
        });
        Self {
            name: name.into(),
            projection,
            row_cap,
            ..Self::default()
        }
    }

    /// Sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `col` is loaded under the projection
    pub fn is_projected(&self, col: u16) -> bool {
        match &self.projection {
            Some(cols) => cols.binary_search(&col).is_ok(),
            None => true,
        }
    }

    /// Whether `row` is below the row cap
    pub fn accepts_row(&self, row: u32) -> bool {
        self.row_cap.map_or(true, |cap| row < cap)
    }

    /// The projected columns, if a projection was requested
    pub fn projection(&self) -> Option<&[u16]> {
        self.projection.as_deref()
    }

    /// Full extent of the sheet, including unprojected columns and rows
    /// beyond the cap
    pub fn dimension(&self) -> Option<CellRange> {
        self.dimension
    }

    /// Record the sheet extent
    pub fn set_dimension(&mut self, range: Option<CellRange>) {
        self.dimension = range;
    }

    /// Grow the recorded extent to include (row, col)
    pub fn extend_dimension(&mut self, row: u32, col: u16) {
        let cell = CellRange::single(row, col);
        self.dimension = Some(match self.dimension {
            Some(d) => d.union(&cell),
            None => cell,
        });
    }

    /// Whether loading stopped at the row cap
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Mark the sheet as cut short by the row cap
    pub fn set_truncated(&mut self) {
        self.truncated = true;
    }

    /// Mutable access to a column's arrays, creating it on first use
    pub fn column_mut(&mut self, col: u16) -> &mut ColumnData {
        self.columns.entry(col).or_default()
    }

    /// A column's arrays
    pub fn column(&self, col: u16) -> Option<&ColumnData> {
        self.columns.get(&col)
    }

    /// Iterate over loaded columns
    pub fn columns(&self) -> impl Iterator<Item = (u16, &ColumnData)> {
        self.columns.iter().map(|(&c, d)| (c, d))
    }

    /// Value at (row, col); blank for unprojected columns and capped rows
    pub fn get(&self, row: u32, col: u16) -> ColumnarValue<'_> {
        if !self.accepts_row(row) {
            return ColumnarValue::Blank;
        }
        self.columns
            .get(&col)
            .map_or(ColumnarValue::Blank, |c| c.get(row))
    }

    /// Explicit style at (row, col)
    pub fn style(&self, row: u32, col: u16) -> Option<StyleId> {
        self.columns.get(&col).and_then(|c| c.style(row))
    }

    /// Number of loaded values
    pub fn value_count(&self) -> usize {
        self.columns.values().map(ColumnData::len).sum()
    }

    /// Restore ascending row order if a producer appended out of order
    pub fn finish(&mut self) {
        for data in self.columns.values_mut() {
            data.sort();
        }
    }
}
