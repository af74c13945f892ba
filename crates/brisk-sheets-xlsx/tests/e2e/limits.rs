//! Grid corners, large sheets and malformed input.

use brisk_sheets_core::{CellRange, ReadOptions, Workbook, MAX_COLS, MAX_ROWS};
use brisk_sheets_xlsx::{ReadOnlyWorkbook, XlsxError, XlsxReader, XlsxWriter};
use pretty_assertions::assert_eq;

use crate::{foreign_parts, text, unzip, zip_parts};

#[test]
fn test_grid_corners_round_trip() {
    let mut wb = Workbook::new();
    {
        let mut sheet = wb.add_sheet("Corners").unwrap();
        sheet.set_value("A1", "first").unwrap();
        sheet.set_value("XFD1048576", "last").unwrap();
        assert!(sheet.set_value((MAX_ROWS, 0), 1.0).is_err());
        assert!(sheet.set_value((0, MAX_COLS), 1.0).is_err());
        assert!(sheet.set_value("XFE1", 1.0).is_err());
    }
    let (bytes, _) = XlsxWriter::new(&wb).to_bytes().unwrap();
    let xml = text(&unzip(&bytes), "xl/worksheets/sheet1.xml");
    assert!(xml.contains(r#"<dimension ref="A1:XFD1048576"/>"#), "{}", xml);
    assert!(xml.contains(r#"<row r="1048576""#));
    assert!(xml.contains(r#"r="XFD1048576""#));

    let loaded = XlsxReader::new().read_bytes(bytes.clone()).unwrap();
    let sheet = loaded.workbook.sheet(0).unwrap();
    assert_eq!(sheet.cell("XFD1048576").unwrap().as_text(), Some("last"));
    assert_eq!(sheet.used_range(), CellRange::parse("A1:XFD1048576").ok());

    let read_only = ReadOnlyWorkbook::from_bytes(bytes, &ReadOptions::default()).unwrap();
    assert_eq!(read_only.text(0, MAX_ROWS - 1, MAX_COLS - 1), Some("last"));
}

#[test]
fn test_many_sheets_parse_in_parallel() {
    let mut wb = Workbook::new();
    for s in 0..12 {
        let mut sheet = wb.add_sheet(&format!("S{}", s)).unwrap();
        for r in 0..500u32 {
            sheet.set_value((r, 0), f64::from(r * s)).unwrap();
        }
    }
    let (bytes, report) = XlsxWriter::new(&wb).to_bytes().unwrap();
    assert_eq!(report.cells, 12 * 500);

    let parallel = XlsxReader::new().read_bytes(bytes.clone()).unwrap();
    let serial = XlsxReader::new()
        .with_options(ReadOptions {
            parallel_sheets: false,
            ..ReadOptions::default()
        })
        .read_bytes(bytes)
        .unwrap();
    assert_eq!(parallel.report.cells, 12 * 500);
    for i in 0..12 {
        let a = parallel.workbook.worksheet(i).unwrap();
        let b = serial.workbook.worksheet(i).unwrap();
        assert_eq!(a.name(), b.name());
        assert_eq!(
            a.iter_cells().collect::<Vec<_>>(),
            b.iter_cells().collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_missing_workbook_part() {
    let parts: Vec<_> = foreign_parts()
        .into_iter()
        .filter(|(name, _)| *name != "xl/workbook.xml")
        .collect();
    let err = XlsxReader::new().read_bytes(zip_parts(&parts)).unwrap_err();
    assert!(matches!(err, XlsxError::MissingPart(_)), "{}", err);
}

#[test]
fn test_malformed_sheet_names_its_part() {
    let parts: Vec<_> = foreign_parts()
        .into_iter()
        .map(|(name, body)| {
            if name == "xl/worksheets/sheet2.xml" {
                (name, "<worksheet><sheetData><row></sheetData>".to_string())
            } else {
                (name, body)
            }
        })
        .collect();
    let err = XlsxReader::new().read_bytes(zip_parts(&parts)).unwrap_err();
    assert!(err.to_string().contains("xl/worksheets/sheet2.xml"), "{}", err);
}

#[test]
fn test_not_a_zip() {
    let err = XlsxReader::new()
        .read_bytes(b"definitely not a package".to_vec())
        .unwrap_err();
    assert!(matches!(err, XlsxError::Archive { .. }), "{}", err);
}
