//! Error types for brisk-sheets-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// The error classes every failure in the library falls into.
///
/// Both the core [`Error`] and the package-level error of the xlsx crate map
/// onto this set through their `kind()` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Illegal row/column/address, malformed range, out-of-domain option
    InvalidArgument,
    /// Sheet, defined name, image or style that does not exist
    NotFound,
    /// ZIP structural error, bad CRC, truncated entry, unsupported method
    Archive,
    /// XML well-formedness violation or unexpected element
    Xml,
    /// DEFLATE backend failure
    Compression,
    /// Underlying filesystem or stream failure
    Io,
    /// Operation not legal in the current mode
    InvalidState,
    /// Invariant violation; should be unreachable
    Internal,
}

/// Errors that can occur in brisk-sheets-core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Row index out of bounds
    #[error("Row index {0} out of bounds (max: {1})")]
    RowOutOfBounds(u32, u32),

    /// Column index out of bounds
    #[error("Column index {0} out of bounds (max: {1})")]
    ColumnOutOfBounds(u32, u16),

    /// Address qualified with a sheet other than the one being operated on
    #[error("Address {address} refers to sheet '{qualifier}', not '{sheet}'")]
    ForeignSheet {
        address: String,
        qualifier: String,
        sheet: String,
    },

    /// Invalid sheet name
    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// Duplicate sheet name
    #[error("Sheet name already exists: {0}")]
    DuplicateSheetName(String),

    /// Invalid defined name
    #[error("Invalid defined name: {0}")]
    InvalidName(String),

    /// Defined name already present in the same scope
    #[error("Defined name already exists in this scope: {0}")]
    DuplicateName(String),

    /// A numeric option or value outside its permitted domain
    #[error("Invalid value for {what}: {reason}")]
    InvalidValue {
        what: &'static str,
        reason: String,
    },

    /// Merge range overlapping an existing merge
    #[error("Merge range {0} overlaps an existing merged region")]
    MergeOverlap(String),

    /// Image bytes that match no supported format
    #[error("Unsupported image format (magic bytes {0:02X?})")]
    UnsupportedImage(Vec<u8>),

    /// Image header that could not be decoded
    #[error("Malformed {format} image: {reason}")]
    MalformedImage {
        format: &'static str,
        reason: String,
    },

    /// Sheet index out of bounds
    #[error("Sheet index {0} out of bounds (count: {1})")]
    SheetOutOfBounds(usize, usize),

    /// Sheet not found by name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Defined name not found
    #[error("Defined name not found: {0}")]
    NameNotFound(String),

    /// Image index not found on a sheet
    #[error("Image {0} not found on sheet '{1}'")]
    ImageNotFound(usize, String),

    /// Style id never issued by the repository
    #[error("Style id {0} not found")]
    StyleNotFound(u32),

    /// Shared formula index not registered on the sheet
    #[error("Shared formula si={0} not found")]
    SharedFormulaNotFound(u32),

    /// Operation not legal in the workbook's access mode
    #[error("Operation '{operation}' is not allowed in {mode} mode")]
    InvalidState {
        operation: &'static str,
        mode: &'static str,
    },

    /// Invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new internal error with a message
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Create an invalid-value error
    pub fn invalid_value<S: Into<String>>(what: &'static str, reason: S) -> Self {
        Error::InvalidValue {
            what,
            reason: reason.into(),
        }
    }

    /// The error class this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAddress(_)
            | Error::InvalidRange(_)
            | Error::RowOutOfBounds(..)
            | Error::ColumnOutOfBounds(..)
            | Error::ForeignSheet { .. }
            | Error::InvalidSheetName(_)
            | Error::DuplicateSheetName(_)
            | Error::InvalidName(_)
            | Error::DuplicateName(_)
            | Error::InvalidValue { .. }
            | Error::MergeOverlap(_)
            | Error::UnsupportedImage(_)
            | Error::MalformedImage { .. } => ErrorKind::InvalidArgument,
            Error::SheetOutOfBounds(..)
            | Error::SheetNotFound(_)
            | Error::NameNotFound(_)
            | Error::ImageNotFound(..)
            | Error::StyleNotFound(_)
            | Error::SharedFormulaNotFound(_) => ErrorKind::NotFound,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            Error::InvalidAddress("1A".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            Error::SheetNotFound("Nope".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(Error::StyleNotFound(9).kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::UnsupportedImage(vec![0, 1]).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(Error::internal("boom").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_display() {
        let err = Error::ForeignSheet {
            address: "Other!A1".into(),
            qualifier: "Other".into(),
            sheet: "Data".into(),
        };
        assert_eq!(
            err.to_string(),
            "Address Other!A1 refers to sheet 'Other', not 'Data'"
        );
    }
}
