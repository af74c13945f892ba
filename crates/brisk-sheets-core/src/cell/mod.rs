//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] / [`CellData`] - The value stored in a cell and its style reference
//! - [`CellAddress`] / [`CellRange`] - A1 addressing (e.g. "A1", "A1:B10")
//! - [`CellStore`] - Sparse editable storage
//! - [`ColumnarSheet`] - Column-oriented read-only storage
//! - [`CellView`] - Borrowed, resolved view of a cell

mod address;
mod columnar;
mod storage;
mod value;
mod view;

pub use address::{
    check_position, column_letters, parse_column_letters, push_column_letters, push_row_number,
    quote_sheet_name, split_sheet_qualifier, CellAddress, CellPos, CellRange, RangeArg,
};
pub use columnar::{ColumnData, ColumnarSheet, ColumnarValue};
pub use storage::CellStore;
pub use value::{CachedValue, CellData, CellError, CellValue, Formula, FormulaKind, Value};
pub use view::CellView;
