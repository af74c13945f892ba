//! # brisk-sheets-core
//!
//! Core data structures for the brisk-sheets xlsx library. Nothing in this
//! crate touches the filesystem; the package format lives in
//! `brisk-sheets-xlsx`.
//!
//! This crate provides the fundamental types used throughout brisk-sheets:
//! - [`CellValue`] / [`CellView`] - What a cell stores and how it reads back
//! - [`CellAddress`] and [`CellRange`] - Cell addressing and ranges
//! - [`FormatDescriptor`] / [`FormatRepository`] - Immutable formats and their pool
//! - [`SharedStringTable`] - The workbook's string pool
//! - [`SharedFormulaManager`] - Shared formula groups and the reference rebaser
//! - [`Workbook`], [`Worksheet`] - The main document structures
//! - [`DirtyManager`] - Which package parts an edit touched
//!
//! ## Example
//!
//! ```rust
//! use brisk_sheets_core::{StyleBuilder, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let header = workbook.intern_style(StyleBuilder::new().bold(true).build().unwrap());
//! let mut sheet = workbook.add_sheet("Report").unwrap();
//!
//! // Using string addresses
//! sheet.set_value("A1", "Hello").unwrap();
//! sheet.set_cell_format("A1", header).unwrap();
//!
//! // Or using row/column indices (0-based)
//! sheet.set_value((1, 0), 3.14).unwrap();
//! sheet.set_formula((1, 1), "=A2*2").unwrap();
//! ```

pub mod cell;
pub mod column;
pub mod date;
pub mod defined_name;
pub mod dirty;
pub mod error;
pub mod formula;
pub mod handle;
pub mod image;
pub mod options;
pub mod properties;
pub mod row;
pub mod strings;
pub mod style;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{
    CachedValue, CellAddress, CellData, CellError, CellPos, CellRange, CellStore, CellValue,
    CellView, ColumnarSheet, ColumnarValue, Formula, FormulaKind, RangeArg, Value,
};
pub use column::ColumnProps;
pub use defined_name::{DefinedName, DefinedNames, NameScope};
pub use dirty::{DirtyManager, Part};
pub use error::{Error, ErrorKind, Result};
pub use formula::{SharedFormula, SharedFormulaManager, SharedFormulaStats};
pub use handle::{SheetMut, SheetRef};
pub use image::{Anchor, AnchorKind, AnchorPoint, Extent, Image, ImageFormat};
pub use options::{CompressionBackend, ReadOptions, WorkbookOptions};
pub use properties::{CustomProperties, CustomValue, DocProperties};
pub use row::RowProps;
pub use strings::{SharedStringTable, StringId};
pub use workbook::{AccessMode, CalcSettings, SheetKey, Workbook, WorkbookParts, WorkbookSettings};
pub use worksheet::{
    FreezePanes, PageMargins, PageOrientation, PageSetup, RawElement, Selection, SheetVisibility,
    Worksheet,
};

// Re-export all style types for convenience
pub use style::{
    Alignment, Border, BorderEdge, BorderLineStyle, Color, Fill, Font, FormatDescriptor,
    FormatRepository, HorizontalAlignment, NumberFormat, PatternType, StyleBuilder, StyleId,
    Underline, VerticalAlignment,
};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
