//! Create-mode packages as another consumer sees them.

use brisk_sheets_core::{
    CellRange, CompressionBackend, StyleBuilder, Workbook, WorkbookOptions,
};
use brisk_sheets_xlsx::parts::content_types::ContentTypes;
use brisk_sheets_xlsx::{XlsxReader, XlsxWriter};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use crate::{entry_order, text, unzip};

fn sample(options: WorkbookOptions) -> Workbook {
    let mut wb = Workbook::with_options(options);
    let bold = wb.intern_style(StyleBuilder::new().bold(true).build().unwrap());
    {
        let mut sheet = wb.add_sheet("Sales").unwrap();
        sheet.set_value("A1", "Region").unwrap();
        sheet.set_cell_format("A1", bold).unwrap();
        sheet.set_value("B1", "Amount").unwrap();
        for r in 1..200u32 {
            sheet.set_value((r, 0), format!("R{}", r % 7)).unwrap();
            sheet.set_value((r, 1), f64::from(r) * 1.5).unwrap();
        }
        let day = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap().and_hms_opt(12, 0, 0).unwrap();
        sheet.set_date("D1", day).unwrap();
    }
    wb.add_sheet("Summary").unwrap().set_formula("A1", "=SUM(Sales!B:B)").unwrap();
    wb.properties_mut().title = Some("Sales".to_string());
    wb
}

#[test]
fn test_every_part_is_declared() {
    let (bytes, report) = XlsxWriter::new(&sample(WorkbookOptions::default()))
        .to_bytes()
        .unwrap();
    let entries = unzip(&bytes);
    assert_eq!(entries.len(), report.entries);

    let ct = ContentTypes::parse(entries["[Content_Types].xml"].as_slice()).unwrap();
    for name in entries.keys() {
        if name != "[Content_Types].xml" {
            assert!(ct.content_type_of(name).is_some(), "{} has no content type", name);
        }
    }
    // every entry parses as XML
    for (name, data) in &entries {
        let mut reader = quick_xml::Reader::from_reader(data.as_slice());
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Eof) => break,
                Ok(_) => buf.clear(),
                Err(e) => panic!("{} is not well-formed: {}", name, e),
            }
        }
    }
}

#[test]
fn test_archive_order_is_fixed() {
    let (bytes, _) = XlsxWriter::new(&sample(WorkbookOptions::default()))
        .to_bytes()
        .unwrap();
    assert_eq!(
        entry_order(&bytes),
        vec![
            "[Content_Types].xml",
            "_rels/.rels",
            "xl/workbook.xml",
            "xl/_rels/workbook.xml.rels",
            "xl/styles.xml",
            "xl/sharedStrings.xml",
            "xl/worksheets/sheet1.xml",
            "xl/worksheets/sheet2.xml",
            "docProps/core.xml",
            "docProps/app.xml",
        ]
    );
}

#[test]
fn test_output_is_deterministic_across_engines_settings() {
    for options in [
        WorkbookOptions::default(),
        WorkbookOptions::default().with_streaming(true).with_row_buffer_size(7),
        WorkbookOptions::default()
            .with_backend(CompressionBackend::Portable)
            .with_compression_level(9),
    ] {
        let wb = sample(options);
        let first = XlsxWriter::new(&wb).to_bytes().unwrap().0;
        let second = XlsxWriter::new(&wb).to_bytes().unwrap().0;
        assert_eq!(first, second);
    }
}

#[test]
fn test_compression_levels_agree_on_content() {
    let stored = XlsxWriter::new(&sample(WorkbookOptions::default().with_compression_level(0)))
        .to_bytes()
        .unwrap()
        .0;
    let best = XlsxWriter::new(&sample(WorkbookOptions::default().with_compression_level(9)))
        .to_bytes()
        .unwrap()
        .0;
    assert!(best.len() < stored.len());
    assert_eq!(unzip(&stored), unzip(&best));
}

#[test]
fn test_shared_strings_counts() {
    let (bytes, _) = XlsxWriter::new(&sample(WorkbookOptions::default()))
        .to_bytes()
        .unwrap();
    let sst = text(&unzip(&bytes), "xl/sharedStrings.xml");
    // 2 headers plus 7 distinct region labels; 201 string cells
    assert!(sst.contains(r#"count="201""#), "{}", sst);
    assert!(sst.contains(r#"uniqueCount="9""#), "{}", sst);
}

#[test]
fn test_shared_formula_round_trip() {
    let mut wb = Workbook::new();
    {
        let mut sheet = wb.add_sheet("Calc").unwrap();
        for r in 0..100u32 {
            sheet.set_value((r, 0), f64::from(r)).unwrap();
            sheet.set_value((r, 1), 1.0).unwrap();
        }
        sheet.create_shared_formula("C1:C100", "=A1+B1").unwrap();
        assert_eq!(sheet.shared_formula_stats().cells, 100);
    }
    let (bytes, _) = XlsxWriter::new(&wb).to_bytes().unwrap();
    let xml = text(&unzip(&bytes), "xl/worksheets/sheet1.xml");
    assert!(xml.contains(r#"ref="C1:C100""#), "{}", xml);
    assert_eq!(xml.matches(r#"t="shared""#).count(), 100);
    assert_eq!(xml.matches("A1+B1").count(), 1);

    let loaded = XlsxReader::new().read_bytes(bytes).unwrap();
    let sheet = loaded.workbook.sheet("Calc").unwrap();
    assert_eq!(sheet.formula("C1").unwrap().as_deref(), Some("A1+B1"));
    assert_eq!(sheet.formula("C50").unwrap().as_deref(), Some("A50+B50"));
    assert_eq!(sheet.formula("C100").unwrap().as_deref(), Some("A100+B100"));
    assert_eq!(
        loaded.workbook.worksheet(0).unwrap().shared_formula_stats().cells,
        100
    );
}

#[test]
fn test_merges_and_print_area_survive() {
    let mut wb = Workbook::new();
    {
        let mut sheet = wb.add_sheet("Layout").unwrap();
        sheet.set_value("A1", "Title").unwrap();
        sheet.merge("A1:D1").unwrap();
        sheet.set_print_area("A1:D20").unwrap();
    }
    let (bytes, _) = XlsxWriter::new(&wb).to_bytes().unwrap();
    let mut loaded = XlsxReader::new().read_bytes(bytes).unwrap();
    let ws = loaded.workbook.worksheet(0).unwrap();
    assert_eq!(ws.merged_regions(), &[CellRange::parse("A1:D1").unwrap()]);
    assert_eq!(ws.print_area(), Some(CellRange::parse("A1:D20").unwrap()));

    let mut sheet = loaded.workbook.sheet_mut("Layout").unwrap();
    assert!(sheet.unmerge("$A$1:$D$1").unwrap());
    assert!(sheet.worksheet().merged_regions().is_empty());
}
