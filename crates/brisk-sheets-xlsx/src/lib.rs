//! # brisk-sheets-xlsx
//!
//! The `.xlsx` package format for brisk-sheets: DEFLATE engines, a ZIP
//! writer and reader, a streaming XML writer and SAX dispatch, one codec per
//! package part, and the three entry points built on them:
//!
//! - [`XlsxWriter`] - saves a workbook, copying clean parts from its source
//! - [`XlsxReader`] - loads a package for edit
//! - [`ReadOnlyWorkbook`] - loads a package into columnar sheets

pub mod archive;
pub mod compression;
pub mod error;
pub mod package;
pub mod parts;
pub mod read_only;
pub mod reader;
pub mod writer;
pub mod xml;

pub use error::{XlsxError, XlsxResult};
pub use package::SourcePackage;
pub use read_only::ReadOnlyWorkbook;
pub use reader::{LoadedWorkbook, ReadIssue, ReadReport, XlsxReader};
pub use writer::{SaveReport, XlsxWriter};
