//! # brisk-sheets
//!
//! A Rust library for authoring, editing and bulk-reading `.xlsx` workbooks.
//!
//! Three ways in:
//!
//! - [`Document::create`] - a new workbook; every save generates the whole
//!   package
//! - [`Document::open_for_edit`] - an existing workbook; saves regenerate
//!   only the parts an edit touched and copy the rest from the source file
//! - [`open_read_only`] - columnar sheets for fast scans, with optional
//!   column projection and row cap
//!
//! ## Example
//!
//! ```rust,no_run
//! use brisk_sheets::prelude::*;
//!
//! # fn main() -> brisk_sheets::Result<()> {
//! let mut doc = Document::create("report.xlsx");
//! let bold = doc.intern_style(StyleBuilder::new().bold(true).build()?);
//! let mut sheet = doc.add_sheet("Data")?;
//! sheet.set_value("A1", "Hello")?;
//! sheet.set_cell_format("A1", bold)?;
//! sheet.set_value("B1", 42.0)?;
//! let report = doc.save()?;
//! println!("{} bytes", report.bytes_written);
//!
//! let mut doc = Document::open_for_edit("report.xlsx")?;
//! doc.sheet_mut("Data")?.set_value("C1", true)?;
//! doc.save()?;
//! # Ok(())
//! # }
//! ```

mod document;
pub mod prelude;

pub use document::{open_read_only, open_read_only_with, Document};

/// The core model, for items not re-exported here
pub use brisk_sheets_core as core;

pub use brisk_sheets_core::{
    AccessMode, Alignment, Anchor, AnchorKind, Border, BorderEdge, BorderLineStyle, CachedValue,
    CellAddress, CellData, CellError, CellRange, CellValue, CellView, Color, ColumnarSheet,
    ColumnarValue, CompressionBackend, CustomProperties, CustomValue, DefinedName, DirtyManager,
    DocProperties, ErrorKind, Fill, Font, FormatDescriptor, FormatRepository, FreezePanes,
    HorizontalAlignment, Image, ImageFormat, NameScope, NumberFormat, PageOrientation, PageSetup,
    Part, PatternType, ReadOptions, SharedStringTable, SheetMut, SheetRef, SheetVisibility,
    StringId, StyleBuilder, StyleId, Underline, Value, VerticalAlignment, Workbook,
    WorkbookOptions, Worksheet, MAX_COLS, MAX_ROWS, MAX_SHEET_NAME_LEN,
};

pub use brisk_sheets_xlsx::{
    ReadIssue, ReadOnlyWorkbook, ReadReport, SaveReport, XlsxError, XlsxReader, XlsxWriter,
};

/// Every fallible operation of the facade fails with an [`XlsxError`];
/// model errors arrive as [`XlsxError::Core`]
pub type Error = XlsxError;

pub type Result<T> = std::result::Result<T, Error>;
