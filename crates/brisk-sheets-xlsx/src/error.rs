//! XLSX error types

use brisk_sheets_core::ErrorKind;
use thiserror::Error;

/// Result type for XLSX operations
pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

/// Errors that can occur during XLSX reading/writing
#[derive(Debug, Error)]
pub enum XlsxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Structural ZIP problem, optionally tied to one entry
    #[error("Archive error{}: {reason}", entry.as_deref().map(|e| format!(" in '{}'", e)).unwrap_or_default())]
    Archive {
        entry: Option<String>,
        reason: String,
    },

    /// Malformed XML in a part
    #[error("XML error in '{part}': {reason}")]
    Xml { part: String, reason: String },

    /// DEFLATE engine failure
    #[error("Compression error: {0}")]
    Compression(String),

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// Option outside its domain (compression level, backend)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Core error
    #[error(transparent)]
    Core(#[from] brisk_sheets_core::Error),
}

impl XlsxError {
    /// Archive error attached to an entry
    pub fn archive<E: Into<String>, R: Into<String>>(entry: E, reason: R) -> Self {
        XlsxError::Archive {
            entry: Some(entry.into()),
            reason: reason.into(),
        }
    }

    /// Archive error about the container as a whole
    pub fn archive_format<R: Into<String>>(reason: R) -> Self {
        XlsxError::Archive {
            entry: None,
            reason: reason.into(),
        }
    }

    /// XML error in `part`
    pub fn xml<P: Into<String>, R: ToString>(part: P, reason: R) -> Self {
        XlsxError::Xml {
            part: part.into(),
            reason: reason.to_string(),
        }
    }

    /// The error class this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            XlsxError::Io(_) => ErrorKind::Io,
            XlsxError::Archive { .. } | XlsxError::MissingPart(_) => ErrorKind::Archive,
            XlsxError::Xml { .. } => ErrorKind::Xml,
            XlsxError::Compression(_) => ErrorKind::Compression,
            XlsxError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            XlsxError::Core(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_archive_display_names_entry() {
        let err = XlsxError::archive("xl/workbook.xml", "CRC mismatch");
        assert_eq!(
            err.to_string(),
            "Archive error in 'xl/workbook.xml': CRC mismatch"
        );
        assert_eq!(
            XlsxError::archive_format("no end of central directory").to_string(),
            "Archive error: no end of central directory"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(XlsxError::archive("a", "b").kind(), ErrorKind::Archive);
        assert_eq!(XlsxError::xml("p", "bad").kind(), ErrorKind::Xml);
        assert_eq!(
            XlsxError::Compression("oops".into()).kind(),
            ErrorKind::Compression
        );
        assert_eq!(
            XlsxError::Core(brisk_sheets_core::Error::SheetNotFound("x".into())).kind(),
            ErrorKind::NotFound
        );
    }
}
