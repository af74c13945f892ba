//! Edit-mode saves on top of a package this library did not write.

use brisk_sheets_core::{AccessMode, StyleBuilder};
use brisk_sheets_xlsx::{LoadedWorkbook, SourcePackage, XlsxReader, XlsxWriter};
use pretty_assertions::assert_eq;

use crate::{foreign_package, foreign_parts, text, unzip, zip_parts};

fn load(bytes: Vec<u8>) -> LoadedWorkbook {
    let loaded = XlsxReader::new().read_bytes(bytes).unwrap();
    assert!(loaded.report.is_clean(), "{:?}", loaded.report.issues);
    loaded
}

#[test]
fn test_foreign_package_loads() {
    let loaded = load(foreign_package());
    let wb = &loaded.workbook;
    assert_eq!(wb.mode(), AccessMode::Edit);
    assert_eq!(wb.sheet_names(), vec!["Data", "Notes"]);

    let data = wb.sheet("Data").unwrap();
    assert_eq!(data.cell("A1").unwrap().as_text(), Some("Total"));
    assert_eq!(data.cell("B2").unwrap().as_number(), Some(42.0));
    assert_eq!(data.formula("B1").unwrap().as_deref(), Some("B2*2"));
    assert_eq!(data.cell("B1").unwrap().as_number(), Some(84.0));
    let format = data.cell_format("A1").unwrap();
    assert!(format.font().bold);
    assert!(!format.fill().is_none());

    assert_eq!(wb.properties().title.as_deref(), Some("Quarterly"));
    assert_eq!(wb.properties().company.as_deref(), Some("Acme"));
    assert!(!wb.dirty().any());
}

#[test]
fn test_untouched_save_copies_every_part() {
    let original = foreign_package();
    let loaded = load(original.clone());
    let (bytes, report) = XlsxWriter::new(&loaded.workbook)
        .with_source(&loaded.source)
        .to_bytes()
        .unwrap();

    assert!(report.regenerated.is_empty(), "{:?}", report.regenerated);
    assert!(report.dropped.is_empty());
    assert_eq!(report.engine.calls, 0);
    assert_eq!(unzip(&bytes), unzip(&original));
}

#[test]
fn test_single_cell_edit_regenerates_one_sheet() {
    let mut loaded = load(foreign_package());
    loaded
        .workbook
        .sheet_mut("Data")
        .unwrap()
        .set_value("C3", 7.0)
        .unwrap();
    let (bytes, report) = XlsxWriter::new(&loaded.workbook)
        .with_source(&loaded.source)
        .to_bytes()
        .unwrap();

    assert!(report.regenerated.contains(&"xl/worksheets/sheet1.xml".to_string()));
    for part in [
        "xl/worksheets/sheet2.xml",
        "xl/theme/theme1.xml",
        "xl/styles.xml",
        "xl/sharedStrings.xml",
        "xl/workbook.xml",
        "docProps/core.xml",
        "docProps/app.xml",
    ] {
        assert!(report.copied.contains(&part.to_string()), "{} not copied", part);
    }
    // formulas may depend on the edited cell
    assert_eq!(report.dropped, vec!["xl/calcChain.xml".to_string()]);

    let entries = unzip(&bytes);
    let source = unzip(&foreign_package());
    assert!(!entries.contains_key("xl/calcChain.xml"));
    assert!(!text(&entries, "[Content_Types].xml").contains("calcChain"));
    assert!(!text(&entries, "xl/_rels/workbook.xml.rels").contains("calcChain"));
    assert_eq!(entries["xl/theme/theme1.xml"], source["xl/theme/theme1.xml"]);
    assert_eq!(entries["xl/styles.xml"], source["xl/styles.xml"]);

    let reloaded = load(bytes);
    let data = reloaded.workbook.sheet("Data").unwrap();
    assert_eq!(data.cell("C3").unwrap().as_number(), Some(7.0));
    assert_eq!(data.cell("A1").unwrap().as_text(), Some("Total"));
    assert_eq!(data.formula("B1").unwrap().as_deref(), Some("B2*2"));
}

#[test]
fn test_new_style_does_not_collide_with_source_styles() {
    let mut loaded = load(foreign_package());
    let italic = loaded
        .workbook
        .intern_style(StyleBuilder::new().italic(true).build().unwrap());
    assert_eq!(italic.0, 2);
    {
        let mut data = loaded.workbook.sheet_mut("Data").unwrap();
        data.set_value("C1", "note").unwrap();
        data.set_cell_format("C1", italic).unwrap();
    }
    let (bytes, report) = XlsxWriter::new(&loaded.workbook)
        .with_source(&loaded.source)
        .to_bytes()
        .unwrap();
    assert!(report.regenerated.contains(&"xl/styles.xml".to_string()));
    assert!(report.regenerated.contains(&"xl/sharedStrings.xml".to_string()));

    let styles = text(&unzip(&bytes), "xl/styles.xml");
    assert!(styles.contains(r#"<cellXfs count="3">"#), "{}", styles);
    assert!(styles.contains("cellStyles"));

    let reloaded = load(bytes);
    let data = reloaded.workbook.sheet("Data").unwrap();
    let a1 = data.cell_format("A1").unwrap();
    assert!(a1.font().bold);
    assert!(!a1.fill().is_none());
    let c1 = data.cell_format("C1").unwrap();
    assert!(c1.font().italic);
    assert!(!c1.font().bold);
    assert_eq!(data.cell("C1").unwrap().as_text(), Some("note"));
}

#[test]
fn test_unknown_parts_are_carried_over() {
    let mut parts = foreign_parts();
    parts.push((
        "customXml/item1.xml",
        "<b:Sources xmlns:b=\"urn:bibliography\"/>".to_string(),
    ));
    parts.push(("xl/printerSettings/printerSettings1.bin", "\u{1}\u{2}\u{3}".to_string()));
    let original = zip_parts(&parts);

    let mut loaded = load(original.clone());
    loaded
        .workbook
        .sheet_mut(1)
        .unwrap()
        .set_value("B1", true)
        .unwrap();
    let (bytes, report) = XlsxWriter::new(&loaded.workbook)
        .with_source(&loaded.source)
        .to_bytes()
        .unwrap();

    let entries = unzip(&bytes);
    let source = unzip(&original);
    for part in ["customXml/item1.xml", "xl/printerSettings/printerSettings1.bin"] {
        assert!(report.copied.contains(&part.to_string()));
        assert_eq!(entries[part], source[part]);
    }
}

#[test]
fn test_removing_a_sheet_drops_its_part() {
    let mut loaded = load(foreign_package());
    loaded.workbook.remove_sheet("Notes").unwrap();
    let (bytes, report) = XlsxWriter::new(&loaded.workbook)
        .with_source(&loaded.source)
        .to_bytes()
        .unwrap();

    assert!(report.dropped.contains(&"xl/worksheets/sheet2.xml".to_string()));
    assert!(report.dropped.contains(&"xl/calcChain.xml".to_string()));
    assert_eq!(report.sheet_parts, vec!["xl/worksheets/sheet1.xml".to_string()]);

    let entries = unzip(&bytes);
    assert!(!entries.contains_key("xl/worksheets/sheet2.xml"));
    let workbook = text(&entries, "xl/workbook.xml");
    assert!(!workbook.contains("Notes"));

    let reloaded = load(bytes);
    assert_eq!(reloaded.workbook.sheet_names(), vec!["Data"]);
}

#[test]
fn test_saves_chain_through_successor_packages() {
    let mut loaded = load(foreign_package());
    loaded
        .workbook
        .sheet_mut("Data")
        .unwrap()
        .set_value("D4", 1.0)
        .unwrap();
    let (first, report) = XlsxWriter::new(&loaded.workbook)
        .with_source(&loaded.source)
        .to_bytes()
        .unwrap();
    let next: SourcePackage = loaded.source.successor(first.clone()).unwrap();
    let mut wb = loaded.workbook;
    wb.mark_saved();
    wb.set_sheet_parts(report.sheet_parts);

    wb.sheet_mut("Notes").unwrap().set_value("A2", 2.0).unwrap();
    let (second, report) = XlsxWriter::new(&wb).with_source(&next).to_bytes().unwrap();
    assert!(report.copied.contains(&"xl/worksheets/sheet1.xml".to_string()));
    assert!(report.regenerated.contains(&"xl/worksheets/sheet2.xml".to_string()));
    assert_eq!(
        unzip(&second)["xl/worksheets/sheet1.xml"],
        unzip(&first)["xl/worksheets/sheet1.xml"]
    );

    let reloaded = load(second);
    assert_eq!(
        reloaded.workbook.sheet("Data").unwrap().cell("D4").unwrap().as_number(),
        Some(1.0)
    );
    assert_eq!(
        reloaded.workbook.sheet("Notes").unwrap().cell("A2").unwrap().as_number(),
        Some(2.0)
    );
}
