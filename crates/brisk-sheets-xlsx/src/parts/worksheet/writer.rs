use std::io::Write;
use std::iter::Peekable;

use brisk_sheets_core::cell::{push_column_letters, push_row_number};
use brisk_sheets_core::formula::{EmissionPlan, MemberEmission};
use brisk_sheets_core::image::DEFAULT_ROW_HEIGHT;
use brisk_sheets_core::{
    CachedValue, CellData, CellValue, FormulaKind, PageOrientation, RowProps, Worksheet,
};

use super::ELEMENT_ORDER;
use crate::error::XlsxResult;
use crate::parts::shared_strings::needs_space_preserve;
use crate::parts::{write_color, write_extra_root_attrs, write_preserved, write_unplaced};
use crate::xml::{ns, XmlWriter};

/// Everything the sheet writer needs beyond the sheet itself
#[derive(Debug, Clone, Copy)]
pub struct SheetWriteContext<'a> {
    pub sheet: &'a Worksheet,
    /// The sheet is the workbook's active tab
    pub selected: bool,
    /// Relationship id of the sheet's drawing part
    pub drawing_rel_id: Option<&'a str>,
    /// Extra root attributes of the source part
    pub root_attrs: &'a [(String, String)],
    /// Push buffered output to the sink every this many rows
    pub row_flush: Option<usize>,
}

/// Counts gathered while writing a sheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SheetStats {
    pub rows: u64,
    pub cells: u64,
    /// Cells referencing the shared string table
    pub string_refs: u64,
}

pub fn write_worksheet<W: Write>(ctx: &SheetWriteContext<'_>, sink: W) -> XlsxResult<(W, SheetStats)> {
    let sheet = ctx.sheet;
    let mut xml = XmlWriter::new(sink);
    let mut stats = SheetStats::default();
    xml.declaration();
    xml.start("worksheet")
        .attr_raw("xmlns", ns::MAIN)
        .attr_raw("xmlns:r", ns::REL);
    write_extra_root_attrs(&mut xml, ctx.root_attrs, &["xmlns", "xmlns:r"]);

    let preserved = sheet.preserved_elements();
    for &element in ELEMENT_ORDER {
        match element {
            "sheetPr" => write_sheet_pr(&mut xml, sheet),
            "dimension" => {
                xml.start("dimension")
                    .attr_raw("ref", &sheet.dimension().to_a1_string())
                    .end();
            }
            "sheetViews" => write_sheet_views(&mut xml, sheet, ctx.selected),
            "sheetFormatPr" => {
                xml.start("sheetFormatPr");
                if let Some(width) = sheet.default_column_width() {
                    xml.attr_num("defaultColWidth", width);
                }
                xml.attr_num(
                    "defaultRowHeight",
                    sheet.default_row_height().unwrap_or(DEFAULT_ROW_HEIGHT),
                )
                .attr_flag("customHeight", sheet.default_row_height().is_some())
                .end();
            }
            "cols" => write_cols(&mut xml, sheet),
            "sheetData" => write_sheet_data(&mut xml, sheet, ctx.row_flush, &mut stats)?,
            "autoFilter" => {
                if let Some(range) = sheet.autofilter() {
                    xml.start("autoFilter").attr_raw("ref", &range.to_a1_string()).end();
                }
            }
            "mergeCells" => {
                let merges = sheet.merged_regions();
                if !merges.is_empty() {
                    xml.start("mergeCells").attr_int("count", merges.len());
                    for range in merges {
                        xml.start("mergeCell").attr_raw("ref", &range.to_a1_string()).end();
                    }
                    xml.end();
                }
            }
            "printOptions" => {
                let setup = sheet.page_setup();
                if setup.has_print_options() {
                    xml.start("printOptions")
                        .attr_flag("horizontalCentered", setup.center_horizontally)
                        .attr_flag("verticalCentered", setup.center_vertically)
                        .attr_flag("headings", setup.print_headings)
                        .attr_flag("gridLines", setup.print_gridlines)
                        .end();
                }
            }
            "pageMargins" => {
                let m = sheet.page_setup().margins.unwrap_or_default();
                xml.start("pageMargins")
                    .attr_num("left", m.left)
                    .attr_num("right", m.right)
                    .attr_num("top", m.top)
                    .attr_num("bottom", m.bottom)
                    .attr_num("header", m.header)
                    .attr_num("footer", m.footer)
                    .end();
            }
            "pageSetup" => {
                let setup = sheet.page_setup();
                if setup.has_page_setup() {
                    xml.start("pageSetup");
                    if let Some(size) = setup.paper_size {
                        xml.attr_int("paperSize", size);
                    }
                    if let Some(scale) = setup.scale {
                        xml.attr_int("scale", scale);
                    }
                    if setup.fits_to_page() {
                        // 0 lets Excel choose that dimension
                        xml.attr_int("fitToWidth", setup.fit_to_width.unwrap_or(0))
                            .attr_int("fitToHeight", setup.fit_to_height.unwrap_or(0));
                    }
                    match setup.orientation {
                        Some(PageOrientation::Portrait) => {
                            xml.attr_raw("orientation", "portrait");
                        }
                        Some(PageOrientation::Landscape) => {
                            xml.attr_raw("orientation", "landscape");
                        }
                        None => {}
                    }
                    xml.end();
                }
            }
            "drawing" => {
                if let Some(id) = ctx.drawing_rel_id {
                    xml.start("drawing").attr("r:id", id).end();
                }
            }
            other => write_preserved(&mut xml, preserved, other),
        }
    }
    write_unplaced(&mut xml, preserved, ELEMENT_ORDER);
    xml.end();
    Ok((xml.finish()?, stats))
}

fn write_sheet_pr<W: Write>(xml: &mut XmlWriter<W>, sheet: &Worksheet) {
    let fit = sheet.page_setup().fits_to_page();
    let tab = sheet.tab_color();
    if tab.is_none() && !fit {
        return;
    }
    xml.start("sheetPr");
    if let Some(color) = &tab {
        write_color(xml, "tabColor", color);
    }
    if fit {
        xml.start("pageSetUpPr").attr_raw("fitToPage", "1").end();
    }
    xml.end();
}

fn cell_ref(buf: &mut String, row: u32, col: u16) -> &str {
    buf.clear();
    push_column_letters(buf, col);
    push_row_number(buf, row);
    buf
}

fn write_sheet_views<W: Write>(xml: &mut XmlWriter<W>, sheet: &Worksheet, selected: bool) {
    let mut buf = String::with_capacity(12);
    xml.start("sheetViews").start("sheetView");
    if !sheet.show_grid_lines() {
        xml.attr_raw("showGridLines", "0");
    }
    xml.attr_flag("tabSelected", selected).attr_raw("workbookViewId", "0");

    let mut active_pane = None;
    if let Some(panes) = sheet.freeze_panes() {
        let pane = match (panes.row > 0, panes.col > 0) {
            (true, true) => "bottomRight",
            (true, false) => "bottomLeft",
            _ => "topRight",
        };
        xml.start("pane");
        if panes.col > 0 {
            xml.attr_int("xSplit", panes.col);
        }
        if panes.row > 0 {
            xml.attr_int("ySplit", panes.row);
        }
        xml.attr_raw("topLeftCell", cell_ref(&mut buf, panes.row, panes.col))
            .attr_raw("activePane", pane)
            .attr_raw("state", "frozen")
            .end();
        active_pane = Some(pane);
    }
    if let Some(selection) = sheet.selection() {
        xml.start("selection");
        if let Some(pane) = active_pane {
            xml.attr_raw("pane", pane);
        }
        let (row, col) = selection.active;
        xml.attr_raw("activeCell", cell_ref(&mut buf, row, col));
        let sqref = selection
            .ranges
            .iter()
            .map(|r| r.to_a1_string())
            .collect::<Vec<_>>()
            .join(" ");
        xml.attr_raw("sqref", &sqref).end();
    }
    xml.end().end();
}

fn write_cols<W: Write>(xml: &mut XmlWriter<W>, sheet: &Worksheet) {
    let columns = sheet.columns();
    if columns.is_empty() {
        return;
    }
    let default_width = sheet
        .default_column_width()
        .unwrap_or(brisk_sheets_core::image::DEFAULT_COLUMN_WIDTH);
    xml.start("cols");
    for (first, last, props) in columns.spans() {
        xml.start("col")
            .attr_int("min", u32::from(first) + 1)
            .attr_int("max", u32::from(last) + 1)
            .attr_num("width", props.width.unwrap_or(default_width));
        if let Some(style) = props.style {
            xml.attr_int("style", style.0);
        }
        xml.attr_flag("hidden", props.hidden)
            .attr_flag("bestFit", props.best_fit)
            .attr_raw("customWidth", if props.width.is_some() { "1" } else { "0" });
        if props.outline_level > 0 {
            xml.attr_int("outlineLevel", props.outline_level);
        }
        xml.attr_flag("collapsed", props.collapsed).end();
    }
    xml.end();
}

/// Rows that have cells, properties or both, in order
struct RowMerge<'a, C, P>
where
    C: Iterator<Item = (u32, &'a std::collections::BTreeMap<u16, CellData>)>,
    P: Iterator<Item = (u32, &'a RowProps)>,
{
    cells: Peekable<C>,
    props: Peekable<P>,
}

type MergedRow<'a> = (
    u32,
    Option<&'a std::collections::BTreeMap<u16, CellData>>,
    Option<&'a RowProps>,
);

impl<'a, C, P> Iterator for RowMerge<'a, C, P>
where
    C: Iterator<Item = (u32, &'a std::collections::BTreeMap<u16, CellData>)>,
    P: Iterator<Item = (u32, &'a RowProps)>,
{
    type Item = MergedRow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let next_cells = self.cells.peek().map(|(r, _)| *r);
        let next_props = self.props.peek().map(|(r, _)| *r);
        match (next_cells, next_props) {
            (None, None) => None,
            (Some(c), Some(p)) if c == p => {
                let (row, cells) = self.cells.next()?;
                let (_, props) = self.props.next()?;
                Some((row, Some(cells), Some(props)))
            }
            (Some(c), Some(p)) if p < c => self.props.next().map(|(r, p)| (r, None, Some(p))),
            (Some(_), _) => self.cells.next().map(|(r, c)| (r, Some(c), None)),
            (None, Some(_)) => self.props.next().map(|(r, p)| (r, None, Some(p))),
        }
    }
}

fn write_sheet_data<W: Write>(
    xml: &mut XmlWriter<W>,
    sheet: &Worksheet,
    row_flush: Option<usize>,
    stats: &mut SheetStats,
) -> XlsxResult<()> {
    let store = sheet.cells();
    let plan = sheet.shared_formulas().emission_plan(store);
    let rows = RowMerge {
        cells: store.rows().peekable(),
        props: sheet.rows().peekable(),
    };

    let mut buf = String::with_capacity(12);
    let mut since_flush = 0usize;
    xml.start("sheetData");
    for (row, cells, props) in rows {
        xml.start("row").attr_int("r", row + 1);
        if let Some(props) = props {
            if let Some(style) = props.style {
                xml.attr_int("s", style.0).attr_raw("customFormat", "1");
            }
            if let Some(height) = props.height {
                xml.attr_num("ht", height).attr_raw("customHeight", "1");
            }
            xml.attr_flag("hidden", props.hidden);
            if props.outline_level > 0 {
                xml.attr_int("outlineLevel", props.outline_level);
            }
            xml.attr_flag("collapsed", props.collapsed);
        }
        for (&col, data) in cells.into_iter().flatten() {
            if data.value.is_blank() && data.style.is_none() {
                continue;
            }
            write_cell(xml, &mut buf, &plan, row, col, data, stats);
        }
        xml.end();
        stats.rows += 1;

        since_flush += 1;
        if row_flush.is_some_and(|n| since_flush >= n) {
            xml.flush()?;
            since_flush = 0;
        }
    }
    xml.end();
    Ok(())
}

fn write_cell<W: Write>(
    xml: &mut XmlWriter<W>,
    buf: &mut String,
    plan: &EmissionPlan,
    row: u32,
    col: u16,
    data: &CellData,
    stats: &mut SheetStats,
) {
    stats.cells += 1;
    xml.start("c").attr_raw("r", cell_ref(buf, row, col));
    if let Some(style) = data.style.filter(|s| s.0 > 0) {
        xml.attr_int("s", style.0);
    }
    match &data.value {
        CellValue::Blank => {}
        CellValue::Number(n) if n.is_finite() => {
            xml.start("v").number(*n).end();
        }
        CellValue::Number(_) => {
            xml.attr_raw("t", "e").start("v").text_raw("#NUM!").end();
        }
        CellValue::Bool(b) => {
            xml.attr_raw("t", "b")
                .start("v")
                .text_raw(if *b { "1" } else { "0" })
                .end();
        }
        CellValue::SharedString(id) => {
            stats.string_refs += 1;
            xml.attr_raw("t", "s").start("v").int(id.0).end();
        }
        CellValue::InlineString(text) => {
            xml.attr_raw("t", "inlineStr").start("is").start("t");
            if needs_space_preserve(text) {
                xml.attr_raw("xml:space", "preserve");
            }
            xml.cell_text(text).end().end();
        }
        CellValue::Error(e) => {
            xml.attr_raw("t", "e").start("v").text_raw(e.as_str()).end();
        }
        CellValue::Formula(formula) => {
            match &formula.cached {
                Some(CachedValue::Text(_)) => {
                    xml.attr_raw("t", "str");
                }
                Some(CachedValue::Bool(_)) => {
                    xml.attr_raw("t", "b");
                }
                Some(CachedValue::Error(_)) => {
                    xml.attr_raw("t", "e");
                }
                Some(CachedValue::Number(_)) | None => {}
            }
            match &formula.kind {
                FormulaKind::Single(text) => {
                    xml.start("f").cell_text(text).end();
                }
                FormulaKind::Array { text, range } => {
                    xml.start("f")
                        .attr_raw("t", "array")
                        .attr_raw("ref", &range.to_a1_string())
                        .cell_text(text)
                        .end();
                }
                FormulaKind::Shared { si } => match plan.member(*si, row, col) {
                    Some(MemberEmission::Anchor(group)) => {
                        xml.start("f")
                            .attr_raw("t", "shared")
                            .attr_raw("ref", &group.range.to_a1_string())
                            .attr_int("si", group.si)
                            .cell_text(&group.text)
                            .end();
                    }
                    Some(MemberEmission::Follower(si)) => {
                        xml.start("f").attr_raw("t", "shared").attr_int("si", si).end();
                    }
                    Some(MemberEmission::Plain(text)) => {
                        xml.start("f").cell_text(text).end();
                    }
                    None => log::warn!(
                        "cell in row {} column {} references missing shared formula {}",
                        row + 1,
                        u32::from(col) + 1,
                        si
                    ),
                },
            }
            match &formula.cached {
                Some(CachedValue::Number(n)) if n.is_finite() => {
                    xml.start("v").number(*n).end();
                }
                Some(CachedValue::Number(_)) | None => {}
                Some(CachedValue::Bool(b)) => {
                    xml.start("v").text_raw(if *b { "1" } else { "0" }).end();
                }
                Some(CachedValue::Text(t)) => {
                    xml.start("v").cell_text(t).end();
                }
                Some(CachedValue::Error(e)) => {
                    xml.start("v").text_raw(e.as_str()).end();
                }
            }
        }
    }
    xml.end();
}

#[cfg(test)]
mod tests {
    use super::*;
    use brisk_sheets_core::{
        CellRange, Color, Formula, PageMargins, PageSetup, Selection, StringId, StyleId,
    };
    use brisk_sheets_core::worksheet::RawElement;
    use pretty_assertions::assert_eq;

    fn render(sheet: &Worksheet) -> String {
        let ctx = SheetWriteContext {
            sheet,
            selected: true,
            drawing_rel_id: None,
            root_attrs: &[],
            row_flush: None,
        };
        let (bytes, _) = write_worksheet(&ctx, Vec::new()).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_empty_sheet() {
        let sheet = Worksheet::new("Empty");
        let xml = render(&sheet);
        assert!(xml.contains(r#"<dimension ref="A1"/>"#));
        assert!(xml.contains(r#"<sheetView tabSelected="1" workbookViewId="0"/>"#));
        assert!(xml.contains(r#"<sheetFormatPr defaultRowHeight="15"/>"#));
        assert!(xml.contains("<sheetData/>"));
        assert!(xml.contains(
            r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#
        ));
        assert!(!xml.contains("<cols"));
    }

    #[test]
    fn test_cell_encodings() {
        let mut sheet = Worksheet::new("Data");
        sheet.set_value_at(0, 0, CellValue::Number(1.5)).unwrap();
        sheet.set_value_at(0, 1, CellValue::SharedString(StringId(3))).unwrap();
        sheet.set_value_at(0, 2, CellValue::Bool(true)).unwrap();
        sheet
            .set_value_at(1, 0, CellValue::InlineString(Box::new(" pad".to_string())))
            .unwrap();
        sheet
            .set_value_at(1, 1, CellValue::Error(brisk_sheets_core::CellError::Div0))
            .unwrap();
        sheet
            .set_value_at(
                1,
                2,
                CellValue::Formula(Box::new(
                    Formula::new("=A1&\"x\"").with_cached(CachedValue::Text("1.5x".into())),
                )),
            )
            .unwrap();
        sheet.set_style_at(2, 3, Some(StyleId(2))).unwrap();

        let (bytes, stats) = write_worksheet(
            &SheetWriteContext {
                sheet: &sheet,
                selected: false,
                drawing_rel_id: None,
                root_attrs: &[],
                row_flush: Some(1),
            },
            Vec::new(),
        )
        .unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        assert_eq!(stats, SheetStats { rows: 3, cells: 7, string_refs: 1 });
        assert!(xml.contains(r#"<dimension ref="A1:D3"/>"#));
        assert!(xml.contains(r#"<c r="A1"><v>1.5</v></c>"#));
        assert!(xml.contains(r#"<c r="B1" t="s"><v>3</v></c>"#));
        assert!(xml.contains(r#"<c r="C1" t="b"><v>1</v></c>"#));
        assert!(xml.contains(r#"<c r="A2" t="inlineStr"><is><t xml:space="preserve"> pad</t></is></c>"#));
        assert!(xml.contains(r#"<c r="B2" t="e"><v>#DIV/0!</v></c>"#));
        assert!(xml.contains(r#"<c r="C2" t="str"><f>A1&amp;"x"</f><v>1.5x</v></c>"#));
        assert!(xml.contains(r#"<row r="3"><c r="D3" s="2"/></row>"#));
    }

    #[test]
    fn test_shared_formula_emission() {
        let mut sheet = Worksheet::new("F");
        for row in 0..3 {
            sheet.set_value_at(row, 0, CellValue::Number(f64::from(row))).unwrap();
        }
        sheet
            .create_shared_formula(CellRange::parse("B1:B3").unwrap(), "A1*2")
            .unwrap();
        let xml = render(&sheet);
        assert!(xml.contains(r#"<c r="B1"><f t="shared" ref="B1:B3" si="0">A1*2</f></c>"#));
        assert!(xml.contains(r#"<c r="B2"><f t="shared" si="0"/></c>"#));
        assert!(xml.contains(r#"<c r="B3"><f t="shared" si="0"/></c>"#));
    }

    #[test]
    fn test_rows_and_columns() {
        let mut sheet = Worksheet::new("Layout");
        sheet.set_row_height(4, 30.0).unwrap();
        sheet.set_row_hidden(6, true).unwrap();
        sheet.set_value_at(4, 0, CellValue::Number(1.0)).unwrap();
        sheet.set_column_width(1, 20.0).unwrap();
        sheet.set_column_hidden(3, true).unwrap();
        let xml = render(&sheet);
        assert!(xml.contains(r#"<row r="5" ht="30" customHeight="1"><c r="A5"><v>1</v></c></row>"#));
        assert!(xml.contains(r#"<row r="7" hidden="1"/>"#));
        assert!(xml.contains(r#"<col min="2" max="2" width="20" customWidth="1"/>"#));
        assert!(xml.contains(r#"<col min="4" max="4" width="8.43" hidden="1" customWidth="0"/>"#));
        let cols = xml.find("<cols>").unwrap();
        let data = xml.find("<sheetData>").unwrap();
        assert!(cols < data);
    }

    #[test]
    fn test_views_and_print_settings() {
        let mut sheet = Worksheet::new("View");
        sheet.set_freeze_panes(1, 2).unwrap();
        sheet.set_selection(Some(Selection::cell(5, 2))).unwrap();
        sheet.set_show_grid_lines(false);
        sheet.set_tab_color(Some(Color::rgb(0xFF, 0, 0)));
        sheet.set_autofilter(Some(CellRange::parse("A1:C1").unwrap()));
        sheet.merge_cells(CellRange::parse("A3:B4").unwrap()).unwrap();
        sheet
            .set_page_setup(PageSetup {
                orientation: Some(PageOrientation::Landscape),
                fit_to_width: Some(1),
                margins: Some(PageMargins {
                    left: 0.5,
                    ..PageMargins::default()
                }),
                print_gridlines: true,
                ..PageSetup::default()
            })
            .unwrap();
        let xml = render(&sheet);
        assert!(xml.contains(r#"<sheetPr><tabColor rgb="FFFF0000"/><pageSetUpPr fitToPage="1"/></sheetPr>"#));
        assert!(xml.contains(
            r#"<pane xSplit="2" ySplit="1" topLeftCell="C2" activePane="bottomRight" state="frozen"/>"#
        ));
        assert!(xml.contains(r#"<selection pane="bottomRight" activeCell="C6" sqref="C6"/>"#));
        assert!(xml.contains(r#"showGridLines="0""#));
        assert!(xml.contains(r#"<autoFilter ref="A1:C1"/>"#));
        assert!(xml.contains(r#"<mergeCells count="1"><mergeCell ref="A3:B4"/></mergeCells>"#));
        assert!(xml.contains(r#"<printOptions gridLines="1"/>"#));
        assert!(xml.contains(r#"<pageMargins left="0.5""#));
        assert!(xml.contains(
            r#"<pageSetup fitToWidth="1" fitToHeight="0" orientation="landscape"/>"#
        ));
    }

    #[test]
    fn test_preserved_elements_in_schema_order() {
        let mut sheet = Worksheet::new("Keep");
        sheet.set_preserved_elements(vec![
            RawElement {
                name: "extLst".into(),
                xml: b"<extLst><ext uri=\"{A}\"/></extLst>".to_vec(),
            },
            RawElement {
                name: "conditionalFormatting".into(),
                xml: b"<conditionalFormatting sqref=\"A1\"/>".to_vec(),
            },
        ]);
        let xml = render(&sheet);
        let cf = xml.find("<conditionalFormatting").unwrap();
        let margins = xml.find("<pageMargins").unwrap();
        let ext = xml.find("<extLst>").unwrap();
        assert!(cf < margins && margins < ext);
        assert!(xml.ends_with("</extLst></worksheet>"));
    }

    #[test]
    fn test_drawing_reference() {
        let sheet = Worksheet::new("Pics");
        let ctx = SheetWriteContext {
            sheet: &sheet,
            selected: false,
            drawing_rel_id: Some("rId3"),
            root_attrs: &[("xmlns:x14ac".to_string(), "urn:x14ac".to_string())],
            row_flush: None,
        };
        let (bytes, _) = write_worksheet(&ctx, Vec::new()).unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains(r#"<drawing r:id="rId3"/>"#));
        assert!(xml.contains(r#"xmlns:x14ac="urn:x14ac""#));
    }
}
