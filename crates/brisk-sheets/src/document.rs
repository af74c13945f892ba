use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use brisk_sheets_core::{AccessMode, ReadOptions, Workbook, WorkbookOptions};
use brisk_sheets_xlsx::{
    ReadOnlyWorkbook, ReadReport, SaveReport, SourcePackage, XlsxReader, XlsxWriter,
};

use crate::Result;

/// A workbook tied to a file.
///
/// Dereferences to [`Workbook`], so sheets, styles, names and properties are
/// edited directly on the document. A document opened for edit keeps the
/// package it was loaded from; after each save the written package becomes
/// the source for the next one.
#[derive(Debug)]
pub struct Document {
    workbook: Workbook,
    source: Option<SourcePackage>,
    path: PathBuf,
    read_report: ReadReport,
}

impl Document {
    /// A new, empty workbook that will be saved to `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Self {
        Self::create_with(path, WorkbookOptions::default())
    }

    pub fn create_with<P: AsRef<Path>>(path: P, options: WorkbookOptions) -> Self {
        Self {
            workbook: Workbook::with_options(options),
            source: None,
            path: path.as_ref().to_path_buf(),
            read_report: ReadReport::default(),
        }
    }

    /// Load an existing package for editing
    pub fn open_for_edit<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_for_edit_with(path, ReadOptions::default(), WorkbookOptions::default())
    }

    pub fn open_for_edit_with<P: AsRef<Path>>(
        path: P,
        read: ReadOptions,
        options: WorkbookOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let loaded = XlsxReader::new()
            .with_options(read)
            .with_workbook_options(options)
            .read_file(path)?;
        Ok(Self {
            workbook: loaded.workbook,
            source: Some(loaded.source),
            path: path.to_path_buf(),
            read_report: loaded.report,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.workbook.mode()
    }

    /// Problems met while loading; empty for created documents
    pub fn read_report(&self) -> &ReadReport {
        &self.read_report
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn workbook_mut(&mut self) -> &mut Workbook {
        &mut self.workbook
    }

    pub fn into_workbook(self) -> Workbook {
        self.workbook
    }

    /// Write the package to the document's path
    pub fn save(&mut self) -> Result<SaveReport> {
        let path = self.path.clone();
        self.write_to(&path)
    }

    /// Write the package to `path`, which becomes the document's path
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<SaveReport> {
        let path = path.as_ref().to_path_buf();
        let report = self.write_to(&path)?;
        self.path = path;
        Ok(report)
    }

    /// The package as it would be saved, leaving the document untouched
    pub fn to_bytes(&self) -> Result<(Vec<u8>, SaveReport)> {
        self.writer().to_bytes()
    }

    fn writer(&self) -> XlsxWriter<'_> {
        let writer = XlsxWriter::new(&self.workbook);
        match &self.source {
            Some(source) => writer.with_source(source),
            None => writer,
        }
    }

    fn write_to(&mut self, path: &Path) -> Result<SaveReport> {
        let report = self.writer().write_file(path)?;
        log::debug!(
            "saved {} ({} bytes, {} regenerated, {} copied)",
            path.display(),
            report.bytes_written,
            report.regenerated.len(),
            report.copied.len()
        );
        if let Some(source) = &self.source {
            let next = source.successor(std::fs::read(path)?)?;
            self.source = Some(next);
            self.workbook.mark_saved();
            self.workbook.set_sheet_parts(report.sheet_parts.clone());
        }
        Ok(report)
    }
}

impl Deref for Document {
    type Target = Workbook;

    fn deref(&self) -> &Workbook {
        &self.workbook
    }
}

impl DerefMut for Document {
    fn deref_mut(&mut self) -> &mut Workbook {
        &mut self.workbook
    }
}

/// Open a package read-only with every column and row
pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<ReadOnlyWorkbook> {
    open_read_only_with(path, &ReadOptions::default())
}

/// Open a package read-only, projected and capped by `options`
pub fn open_read_only_with<P: AsRef<Path>>(
    path: P,
    options: &ReadOptions,
) -> Result<ReadOnlyWorkbook> {
    ReadOnlyWorkbook::open(path, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_then_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");

        let mut doc = Document::create(&path);
        assert_eq!(doc.mode(), AccessMode::Create);
        doc.add_sheet("Data").unwrap().set_value("A1", "Hello").unwrap();
        let report = doc.save().unwrap();
        assert!(report.copied.is_empty());
        assert_eq!(report.bytes_written, std::fs::metadata(&path).unwrap().len());

        let mut doc = Document::open_for_edit(&path).unwrap();
        assert_eq!(doc.mode(), AccessMode::Edit);
        assert!(doc.read_report().is_clean());
        doc.sheet_mut("Data").unwrap().set_value("B1", 42.0).unwrap();
        let report = doc.save().unwrap();
        assert!(report.regenerated.contains(&"xl/worksheets/sheet1.xml".to_string()));
        assert!(report.copied.contains(&"xl/styles.xml".to_string()));
        assert!(!doc.dirty().any());

        let doc = Document::open_for_edit(&path).unwrap();
        let sheet = doc.sheet("Data").unwrap();
        assert_eq!(sheet.cell("A1").unwrap().as_text(), Some("Hello"));
        assert_eq!(sheet.cell("B1").unwrap().as_number(), Some(42.0));
    }

    #[test]
    fn test_save_as_moves_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.xlsx");
        let second = dir.path().join("b.xlsx");

        let mut doc = Document::create(&first);
        doc.add_sheet("S").unwrap();
        doc.save_as(&second).unwrap();
        assert_eq!(doc.path(), second.as_path());
        assert!(!first.exists());
        assert!(second.exists());
    }
}
