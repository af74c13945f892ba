//! Prelude module - common imports for brisk-sheets users
//!
//! ```rust
//! use brisk_sheets::prelude::*;
//! ```

pub use crate::{
    open_read_only,
    open_read_only_with,
    CellAddress,
    CellRange,
    CellView,
    Color,
    ColumnarValue,
    CompressionBackend,
    // Main types
    Document,
    // Error types
    Error,
    Fill,
    HorizontalAlignment,
    Image,
    NumberFormat,
    ReadOnlyWorkbook,
    ReadOptions,
    Result,
    SaveReport,
    SheetVisibility,
    // Style types
    StyleBuilder,
    StyleId,
    VerticalAlignment,
    Workbook,
    WorkbookOptions,
};
