use brisk_sheets_core::worksheet::RawElement;
use brisk_sheets_core::{
    CachedValue, CellAddress, CellData, CellRange, CellValue, Formula, FormulaKind, PageMargins,
    PageOrientation, PageSetup, Selection, StringId, StyleId, Worksheet, MAX_COLS,
};
use quick_xml::events::BytesStart;

use super::{
    iso_date_serial, parse_cell_ref, parse_error_value, CellType, FormulaType, RawCell, RawRow,
    SheetDataReader, MODELED,
};
use crate::error::XlsxResult;
use crate::parts::parse_color;
use crate::xml::reader::{
    attr, attr_bool, attr_f64, attr_u32, decode_excel_escapes, parse_part, qualified_attrs, Flow,
    PartHandler,
};

/// Workbook-level facts a sheet parse checks cell data against
#[derive(Debug, Clone, Copy)]
pub struct SheetParseContext {
    pub date1904: bool,
    /// Number of cell formats; larger style indices are dropped
    pub style_count: usize,
    /// Number of shared strings; larger indices are dropped
    pub string_count: usize,
}

/// Result of reading one sheet for editing
#[derive(Debug)]
pub struct ParsedSheet {
    pub worksheet: Worksheet,
    /// `r:id` of the sheet's `<drawing>`
    pub drawing_rel_id: Option<String>,
    /// Root attributes, namespace declarations included
    pub root_attrs: Vec<(String, String)>,
    /// Recoverable problems found in the part
    pub issues: Vec<String>,
}

/// Read a worksheet part into an editable [`Worksheet`] called `name`
pub fn parse_worksheet(
    part: &str,
    name: &str,
    xml: &[u8],
    ctx: &SheetParseContext,
) -> XlsxResult<ParsedSheet> {
    let mut handler = SheetHandler::new(name, *ctx);
    parse_part(part, xml, &mut handler)?;
    let mut parsed = handler.finish();
    parsed.worksheet.set_source_part(Some(part.to_string()));
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    SheetPr,
    SheetViews,
    Cols,
    SheetData,
    MergeCells,
}

struct SheetHandler {
    sheet: Worksheet,
    ctx: SheetParseContext,
    depth: usize,
    section: Section,
    data: SheetDataReader,
    page: PageSetup,
    fit_to_page: bool,
    in_first_view: bool,
    seen_view: bool,
    active_pane: Option<String>,
    selection: Option<(Option<String>, Selection)>,
    drawing_rel_id: Option<String>,
    root_attrs: Vec<(String, String)>,
    preserved: Vec<RawElement>,
    issues: Vec<String>,
}

impl SheetHandler {
    fn new(name: &str, ctx: SheetParseContext) -> Self {
        Self {
            sheet: Worksheet::new(name),
            ctx,
            depth: 0,
            section: Section::None,
            data: SheetDataReader::default(),
            page: PageSetup::default(),
            fit_to_page: false,
            in_first_view: false,
            seen_view: false,
            active_pane: None,
            selection: None,
            drawing_rel_id: None,
            root_attrs: Vec::new(),
            preserved: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn style(&mut self, index: Option<u32>, at: &str) -> Option<StyleId> {
        let index = index?;
        if (index as usize) < self.ctx.style_count {
            Some(StyleId(index))
        } else {
            self.issues
                .push(format!("{}: style index {} does not exist", at, index));
            None
        }
    }

    fn top_level(&mut self, e: &BytesStart<'_>, name: &str) -> Flow {
        if !MODELED.contains(&name) {
            return Flow::Capture;
        }
        self.section = match name {
            "sheetPr" => Section::SheetPr,
            "sheetViews" => Section::SheetViews,
            "cols" => Section::Cols,
            "sheetData" => Section::SheetData,
            "mergeCells" => Section::MergeCells,
            _ => Section::None,
        };
        match name {
            "sheetFormatPr" => {
                if attr_bool(e, b"customHeight").unwrap_or(false) {
                    let height = attr_f64(e, b"defaultRowHeight");
                    if self.sheet.set_default_row_height(height).is_err() {
                        self.issues.push("default row height out of range".to_string());
                    }
                }
                if let Some(width) = attr_f64(e, b"defaultColWidth") {
                    if self.sheet.set_default_column_width(Some(width)).is_err() {
                        self.issues.push("default column width out of range".to_string());
                    }
                }
            }
            "autoFilter" => {
                if let Some(range) = attr(e, b"ref").and_then(|r| CellRange::parse(&r).ok()) {
                    self.sheet.set_autofilter(Some(range));
                }
            }
            "printOptions" => {
                self.page.print_gridlines = attr_bool(e, b"gridLines").unwrap_or(false);
                self.page.print_headings = attr_bool(e, b"headings").unwrap_or(false);
                self.page.center_horizontally = attr_bool(e, b"horizontalCentered").unwrap_or(false);
                self.page.center_vertically = attr_bool(e, b"verticalCentered").unwrap_or(false);
            }
            "pageMargins" => {
                let d = PageMargins::default();
                let margins = PageMargins {
                    left: attr_f64(e, b"left").unwrap_or(d.left),
                    right: attr_f64(e, b"right").unwrap_or(d.right),
                    top: attr_f64(e, b"top").unwrap_or(d.top),
                    bottom: attr_f64(e, b"bottom").unwrap_or(d.bottom),
                    header: attr_f64(e, b"header").unwrap_or(d.header),
                    footer: attr_f64(e, b"footer").unwrap_or(d.footer),
                };
                self.page.margins = (margins != d).then_some(margins);
            }
            "pageSetup" => {
                self.page.paper_size = attr_u32(e, b"paperSize");
                self.page.scale = attr_u32(e, b"scale");
                self.page.orientation = match attr(e, b"orientation").as_deref() {
                    Some("landscape") => Some(PageOrientation::Landscape),
                    Some("portrait") => Some(PageOrientation::Portrait),
                    _ => None,
                };
                // schema default for both is 1; 0 means automatic
                let dim = |v: Option<u32>| match v.unwrap_or(1) {
                    0 => None,
                    n => Some(n),
                };
                self.page.fit_to_width = dim(attr_u32(e, b"fitToWidth"));
                self.page.fit_to_height = dim(attr_u32(e, b"fitToHeight"));
            }
            "drawing" => self.drawing_rel_id = attr(e, b"id").map(|v| v.into_owned()),
            _ => {}
        }
        Flow::Continue
    }

    fn nested(&mut self, e: &BytesStart<'_>, empty: bool) {
        match self.section {
            Section::SheetData => {
                if let Some(row) = self.data.start(e, empty) {
                    self.apply_row(row);
                }
            }
            Section::SheetPr => match e.local_name().as_ref() {
                b"tabColor" => self.sheet.set_tab_color(Some(parse_color(e))),
                b"pageSetUpPr" => self.fit_to_page = attr_bool(e, b"fitToPage").unwrap_or(false),
                _ => {}
            },
            Section::SheetViews => self.view_element(e),
            Section::Cols if e.local_name().as_ref() == b"col" => self.apply_col(e),
            Section::MergeCells if e.local_name().as_ref() == b"mergeCell" => {
                let Some(r) = attr(e, b"ref") else { return };
                match CellRange::parse(&r) {
                    Ok(range) => {
                        if let Err(err) = self.sheet.merge_cells(range) {
                            self.issues.push(format!("merge {} dropped: {}", r, err));
                        }
                    }
                    Err(_) => self.issues.push(format!("unreadable merge range '{}'", r)),
                }
            }
            _ => {}
        }
    }

    fn view_element(&mut self, e: &BytesStart<'_>) {
        match e.local_name().as_ref() {
            b"sheetView" => {
                // Only the first view is modeled
                self.in_first_view = !self.seen_view;
                self.seen_view = true;
                if self.in_first_view {
                    let grid = attr_bool(e, b"showGridLines").unwrap_or(true);
                    self.sheet.set_show_grid_lines(grid);
                }
            }
            b"pane" if self.in_first_view => {
                let frozen = matches!(attr(e, b"state").as_deref(), Some("frozen" | "frozenSplit"));
                if frozen {
                    let rows = attr_f64(e, b"ySplit").unwrap_or(0.0).max(0.0) as u32;
                    let cols = attr_f64(e, b"xSplit").unwrap_or(0.0).max(0.0) as u32;
                    let cols = cols.min(u32::from(MAX_COLS) - 1) as u16;
                    if self.sheet.set_freeze_panes(rows, cols).is_err() {
                        self.issues.push("frozen pane outside the grid".to_string());
                    }
                    self.active_pane = attr(e, b"activePane").map(|p| p.into_owned());
                }
            }
            b"selection" if self.in_first_view => {
                let pane = attr(e, b"pane").map(|p| p.into_owned());
                // a later selection only wins when it belongs to the active pane
                let replace = match &self.selection {
                    None => true,
                    Some((current, _)) => current != &self.active_pane && pane == self.active_pane,
                };
                if !replace {
                    return;
                }
                let active = attr(e, b"activeCell").and_then(|a| parse_cell_ref(&a));
                let ranges: Vec<CellRange> = attr(e, b"sqref")
                    .map(|s| {
                        s.split_whitespace()
                            .filter_map(|r| CellRange::parse(r).ok())
                            .collect()
                    })
                    .unwrap_or_default();
                if let Some(active) = active {
                    let ranges = if ranges.is_empty() {
                        vec![CellRange::single(active.0, active.1)]
                    } else {
                        ranges
                    };
                    self.selection = Some((pane, Selection { active, ranges }));
                }
            }
            _ => {}
        }
    }

    fn apply_col(&mut self, e: &BytesStart<'_>) {
        let (Some(min), Some(max)) = (attr_u32(e, b"min"), attr_u32(e, b"max")) else {
            self.issues.push("column record without min/max".to_string());
            return;
        };
        let limit = u32::from(MAX_COLS);
        if min == 0 || min > limit {
            self.issues.push(format!("column span {}..{} is outside the grid", min, max));
            return;
        }
        let first = (min - 1) as u16;
        let last = (max.clamp(min, limit) - 1) as u16;

        let custom_width = attr_bool(e, b"customWidth");
        let width = attr_f64(e, b"width").filter(|_| custom_width.unwrap_or(true));
        let style = self.style(attr_u32(e, b"style"), "column");
        let hidden = attr_bool(e, b"hidden").unwrap_or(false);
        let best_fit = attr_bool(e, b"bestFit").unwrap_or(false);
        let outline_level = attr_u32(e, b"outlineLevel").unwrap_or(0).min(7) as u8;
        let collapsed = attr_bool(e, b"collapsed").unwrap_or(false);
        let result = self.sheet.update_columns(first, last, |props| {
            props.width = width;
            props.style = style;
            props.hidden = hidden;
            props.best_fit = best_fit;
            props.outline_level = outline_level;
            props.collapsed = collapsed;
        });
        if let Err(err) = result {
            self.issues.push(format!("column span {}..{} dropped: {}", min, max, err));
        }
    }

    fn apply_row(&mut self, raw: RawRow) {
        let style = if raw.custom_format {
            self.style(raw.style, "row")
        } else {
            None
        };
        let height = raw.height.filter(|_| raw.custom_height);
        if style.is_none() && height.is_none() && !raw.hidden && raw.outline_level == 0 && !raw.collapsed {
            return;
        }
        let result = self.sheet.update_row(raw.row, |props| {
            props.height = height;
            props.style = style;
            props.hidden = raw.hidden;
            props.outline_level = raw.outline_level;
            props.collapsed = raw.collapsed;
        });
        if let Err(err) = result {
            self.issues.push(format!("row {} properties dropped: {}", raw.row + 1, err));
        }
    }

    fn store_cell(&mut self, raw: RawCell) {
        let at = CellAddress::new(raw.row, raw.col).to_a1_string();
        let style = self.style(raw.style, &at);
        let value = self.cell_value(&raw, &at);
        if value.is_blank() && style.is_none() {
            return;
        }
        self.sheet
            .cells_mut()
            .set(raw.row, raw.col, CellData { value, style });
    }

    fn cell_value(&mut self, raw: &RawCell, at: &str) -> CellValue {
        if let Some(formula) = &raw.formula {
            let text = decode_excel_escapes(&formula.text).into_owned();
            let kind = match formula.kind {
                FormulaType::Normal if !text.is_empty() => Some(FormulaKind::Single(text)),
                FormulaType::Normal => None,
                FormulaType::Array => {
                    let range = formula
                        .reference
                        .as_deref()
                        .and_then(|r| CellRange::parse(r).ok())
                        .unwrap_or_else(|| CellRange::single(raw.row, raw.col));
                    Some(FormulaKind::Array { text, range })
                }
                FormulaType::Shared => match formula.si {
                    Some(si) => {
                        if !text.is_empty() {
                            let range = formula
                                .reference
                                .as_deref()
                                .and_then(|r| CellRange::parse(r).ok())
                                .unwrap_or_else(|| CellRange::single(raw.row, raw.col));
                            self.sheet
                                .shared_formulas_mut()
                                .register(si, (raw.row, raw.col), range, text);
                        }
                        Some(FormulaKind::Shared { si })
                    }
                    None if !text.is_empty() => Some(FormulaKind::Single(text)),
                    None => {
                        self.issues.push(format!("{}: shared formula without an index", at));
                        None
                    }
                },
                FormulaType::DataTable => {
                    self.issues
                        .push(format!("{}: data table formula kept as its value", at));
                    None
                }
            };
            if let Some(kind) = kind {
                let cached = self.cached_value(raw, at);
                return CellValue::Formula(Box::new(Formula { kind, cached }));
            }
        }
        self.plain_value(raw, at)
    }

    fn cached_value(&mut self, raw: &RawCell, at: &str) -> Option<CachedValue> {
        let v = raw.value.as_deref()?;
        match raw.cell_type {
            CellType::Str | CellType::InlineStr => {
                Some(CachedValue::Text(decode_excel_escapes(v).into_owned()))
            }
            CellType::Bool => Some(CachedValue::Bool(v.trim() == "1")),
            CellType::Error => parse_error_value(v, &mut self.issues).map(CachedValue::Error),
            CellType::Number => v.trim().parse().ok().map(CachedValue::Number),
            CellType::Date => iso_date_serial(v, self.ctx.date1904).map(CachedValue::Number),
            CellType::SharedString => {
                self.issues
                    .push(format!("{}: formula result typed as a shared string", at));
                None
            }
        }
    }

    fn plain_value(&mut self, raw: &RawCell, at: &str) -> CellValue {
        let value = raw.value.as_deref();
        match raw.cell_type {
            CellType::Number => match value.map(|v| v.trim().parse::<f64>()) {
                Some(Ok(n)) => CellValue::Number(n),
                Some(Err(_)) => {
                    self.issues.push(format!("{}: unreadable number", at));
                    CellValue::Blank
                }
                None => CellValue::Blank,
            },
            CellType::SharedString => match value.and_then(|v| v.trim().parse::<u32>().ok()) {
                Some(id) if (id as usize) < self.ctx.string_count => {
                    CellValue::SharedString(StringId(id))
                }
                Some(id) => {
                    self.issues
                        .push(format!("{}: shared string {} does not exist", at, id));
                    CellValue::Blank
                }
                None => CellValue::Blank,
            },
            CellType::Bool => match value {
                Some(v) => CellValue::Bool(v.trim() == "1" || v.trim() == "true"),
                None => CellValue::Blank,
            },
            CellType::Error => value
                .and_then(|v| parse_error_value(v, &mut self.issues))
                .map_or(CellValue::Blank, CellValue::Error),
            CellType::Str => match value {
                Some(v) => CellValue::InlineString(Box::new(decode_excel_escapes(v).into_owned())),
                None => CellValue::Blank,
            },
            CellType::InlineStr => match raw.inline.as_deref() {
                Some(text) => {
                    CellValue::InlineString(Box::new(decode_excel_escapes(text).into_owned()))
                }
                None => CellValue::Blank,
            },
            CellType::Date => match value.and_then(|v| iso_date_serial(v, self.ctx.date1904)) {
                Some(serial) => CellValue::Number(serial),
                None => {
                    self.issues.push(format!("{}: unreadable date", at));
                    CellValue::Blank
                }
            },
        }
    }

    fn finish(mut self) -> ParsedSheet {
        self.page.fit_to_width = self.page.fit_to_width.filter(|_| self.fit_to_page);
        self.page.fit_to_height = self.page.fit_to_height.filter(|_| self.fit_to_page);
        if self.fit_to_page && !self.page.fits_to_page() {
            // both dimensions automatic
            self.page.fit_to_width = Some(1);
            self.page.fit_to_height = Some(1);
        }
        let page = std::mem::take(&mut self.page);
        if let Err(err) = self.sheet.set_page_setup(page) {
            self.issues.push(format!("page setup dropped: {}", err));
        }
        if let Some((_, selection)) = self.selection.take() {
            if self.sheet.set_selection(Some(selection)).is_err() {
                self.issues.push("selection outside the grid".to_string());
            }
        }
        self.detach_orphan_members();

        let mut issues = std::mem::take(&mut self.data.issues);
        issues.append(&mut self.issues);
        self.sheet.set_preserved_elements(self.preserved);
        ParsedSheet {
            worksheet: self.sheet,
            drawing_rel_id: self.drawing_rel_id,
            root_attrs: self.root_attrs,
            issues,
        }
    }

    /// Shared members whose group never got an anchor keep only their
    /// cached result
    fn detach_orphan_members(&mut self) {
        let orphans: Vec<(u32, u16, u32)> = self
            .sheet
            .cells()
            .iter()
            .filter_map(|(row, col, data)| {
                let si = data.value.shared_index()?;
                self.sheet
                    .shared_formulas()
                    .get(si)
                    .is_none()
                    .then_some((row, col, si))
            })
            .collect();
        for (row, col, si) in orphans {
            self.issues.push(format!(
                "{}: shared formula {} has no anchor",
                CellAddress::new(row, col).to_a1_string(),
                si
            ));
            if let Some(data) = self.sheet.cells_mut().get_mut(row, col) {
                let cached = match &data.value {
                    CellValue::Formula(f) => f.cached.clone(),
                    _ => None,
                };
                data.value = match cached {
                    Some(CachedValue::Number(n)) => CellValue::Number(n),
                    Some(CachedValue::Bool(b)) => CellValue::Bool(b),
                    Some(CachedValue::Text(t)) => CellValue::InlineString(Box::new(t)),
                    Some(CachedValue::Error(e)) => CellValue::Error(e),
                    None => CellValue::Blank,
                };
            }
        }
    }
}

impl PartHandler for SheetHandler {
    fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> XlsxResult<Flow> {
        let flow = match self.depth {
            0 => {
                self.root_attrs = qualified_attrs(e);
                Flow::Continue
            }
            1 => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                self.top_level(e, &name)
            }
            _ => {
                self.nested(e, empty);
                Flow::Continue
            }
        };
        if flow == Flow::Continue {
            self.depth += 1;
        }
        Ok(flow)
    }

    fn end(&mut self, name: &[u8]) -> XlsxResult<()> {
        self.depth = self.depth.saturating_sub(1);
        match self.depth {
            1 => self.section = Section::None,
            d if d >= 2 && self.section == Section::SheetData => {
                if let Some(cell) = self.data.end(name) {
                    self.store_cell(cell);
                }
            }
            d if d >= 2 && self.section == Section::SheetViews && name == b"sheetView" => {
                self.in_first_view = false;
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> XlsxResult<()> {
        if self.section == Section::SheetData {
            self.data.text(text);
        }
        Ok(())
    }

    fn captured(&mut self, name: &[u8], xml: &[u8]) -> XlsxResult<()> {
        self.preserved.push(RawElement {
            name: String::from_utf8_lossy(name).into_owned(),
            xml: xml.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parts::worksheet::{write_worksheet, SheetWriteContext};
    use brisk_sheets_core::{CellError, Color, FreezePanes};
    use pretty_assertions::assert_eq;

    const CTX: SheetParseContext = SheetParseContext {
        date1904: false,
        style_count: 4,
        string_count: 2,
    };

    fn parse(xml: &str) -> ParsedSheet {
        parse_worksheet("xl/worksheets/sheet1.xml", "Sheet1", xml.as_bytes(), &CTX).unwrap()
    }

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" mc:Ignorable="x14ac" xmlns:x14ac="http://schemas.microsoft.com/office/spreadsheetml/2009/9/ac">{}</worksheet>"#,
            body
        )
    }

    #[test]
    fn test_values_and_types() {
        let parsed = parse(&wrap(
            r#"<sheetData><row r="1" x14ac:dyDescent="0.25"><c r="A1"><v>42</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="b"><v>0</v></c><c r="D1" t="e"><v>#N/A</v></c></row><row r="2"><c r="A2" t="inlineStr"><is><t>in_x000D_line</t></is></c><c r="B2" t="str"><v>plain</v></c><c r="C2" t="d"><v>2024-01-15</v></c><c r="D2" s="3"/></row></sheetData>"#,
        ));
        assert!(parsed.issues.is_empty(), "{:?}", parsed.issues);
        let ws = &parsed.worksheet;
        let value = |r, c| ws.cell_at(r, c).map(|d| d.value.clone());
        assert_eq!(value(0, 0), Some(CellValue::Number(42.0)));
        assert_eq!(value(0, 1), Some(CellValue::SharedString(StringId(1))));
        assert_eq!(value(0, 2), Some(CellValue::Bool(false)));
        assert_eq!(value(0, 3), Some(CellValue::Error(CellError::Na)));
        assert_eq!(value(1, 0), Some(CellValue::InlineString(Box::new("in\rline".into()))));
        assert_eq!(value(1, 1), Some(CellValue::InlineString(Box::new("plain".into()))));
        assert_eq!(value(1, 2), Some(CellValue::Number(45306.0)));
        assert_eq!(ws.cell_at(1, 3).and_then(|d| d.style), Some(StyleId(3)));
        assert_eq!(ws.source_part(), Some("xl/worksheets/sheet1.xml"));
        assert!(parsed.root_attrs.iter().any(|(k, _)| k == "xmlns:x14ac"));
    }

    #[test]
    fn test_formulas() {
        let parsed = parse(&wrap(
            r#"<sheetData><row r="1"><c r="A1"><f>SUM(B1:B3)</f><v>6</v></c><c r="B1"><f t="shared" ref="B1:B3" si="0">C1+1</f><v>1</v></c><c r="C1" t="str"><f>"a"&amp;"b"</f><v>ab</v></c></row><row r="2"><c r="B2"><f t="shared" si="0"/><v>2</v></c><c r="D2"><f t="array" ref="D2:D3">A1:A2*2</f><v>12</v></c></row><row r="3"><c r="B3"><f t="shared" si="0"/><v>3</v></c><c r="E3"><f t="shared" si="7"/><v>9</v></c></row></sheetData>"#,
        ));
        let ws = &parsed.worksheet;
        assert_eq!(ws.formula_at(0, 0).as_deref(), Some("SUM(B1:B3)"));
        assert_eq!(ws.formula_at(1, 1).as_deref(), Some("C2+1"));
        assert_eq!(ws.formula_at(2, 1).as_deref(), Some("C3+1"));
        assert_eq!(ws.formula_at(0, 2).as_deref(), Some("\"a\"&\"b\""));
        let array = ws.cell_at(1, 3).and_then(|d| d.value.as_formula()).unwrap();
        assert_eq!(
            array.kind,
            FormulaKind::Array {
                text: "A1:A2*2".into(),
                range: CellRange::parse("D2:D3").unwrap()
            }
        );
        assert_eq!(array.cached, Some(CachedValue::Number(12.0)));
        let text = ws.cell_at(0, 2).and_then(|d| d.value.as_formula()).unwrap();
        assert_eq!(text.cached, Some(CachedValue::Text("ab".into())));
        // orphan member keeps its value
        assert_eq!(ws.cell_at(2, 4).map(|d| d.value.clone()), Some(CellValue::Number(9.0)));
        assert_eq!(parsed.issues.len(), 1);
    }

    #[test]
    fn test_bad_indices_are_reported() {
        let parsed = parse(&wrap(
            r#"<sheetData><row r="1"><c r="A1" t="s"><v>9</v></c><c r="B1" s="40"><v>1</v></c><c r="C1" t="e"><v>#WHAT</v></c></row></sheetData>"#,
        ));
        let ws = &parsed.worksheet;
        assert!(ws.cell_at(0, 0).is_none());
        assert_eq!(ws.cell_at(0, 1).map(|d| (d.value.clone(), d.style)), Some((CellValue::Number(1.0), None)));
        assert_eq!(parsed.issues.len(), 3);
    }

    #[test]
    fn test_layout_and_views() {
        let parsed = parse(&wrap(
            r#"<sheetPr><tabColor theme="5"/><pageSetUpPr fitToPage="1"/></sheetPr><dimension ref="A1:C3"/><sheetViews><sheetView showGridLines="0" workbookViewId="0"><pane xSplit="1" ySplit="2" topLeftCell="B3" activePane="bottomRight" state="frozen"/><selection pane="topRight" activeCell="B1" sqref="B1"/><selection pane="bottomRight" activeCell="C4" sqref="C4:D5 F6"/></sheetView></sheetViews><sheetFormatPr defaultRowHeight="18" customHeight="1" defaultColWidth="10"/><cols><col min="1" max="3" width="12.5" customWidth="1"/><col min="4" max="16384" width="9" style="2"/></cols><sheetData><row r="2" ht="25" customHeight="1" hidden="1" s="1" customFormat="1"/><row r="3" ht="15"/></sheetData><autoFilter ref="A1:C1"><filterColumn colId="0"/></autoFilter><mergeCells count="2"><mergeCell ref="A5:B6"/><mergeCell ref="B6:C7"/></mergeCells><printOptions gridLines="1"/><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/><pageSetup orientation="landscape" fitToHeight="0" r:id="rId9"/><drawing r:id="rId2"/><tableParts count="1"><tablePart r:id="rId4"/></tableParts>"#,
        ));
        let ws = &parsed.worksheet;
        assert_eq!(ws.tab_color(), Some(Color::theme(5, 0.0)));
        assert!(!ws.show_grid_lines());
        assert_eq!(ws.freeze_panes(), Some(FreezePanes { row: 2, col: 1 }));
        let selection = ws.selection().unwrap();
        assert_eq!(selection.active, (3, 2));
        assert_eq!(selection.ranges.len(), 2);
        assert_eq!(ws.default_row_height(), Some(18.0));
        assert_eq!(ws.default_column_width(), Some(10.0));
        assert_eq!(ws.column_width(2), 12.5);
        assert_eq!(ws.column_style(5000), Some(StyleId(2)));
        assert_eq!(ws.column_props(5000).and_then(|p| p.width), Some(9.0));
        let row = ws.row_props(1).unwrap();
        assert_eq!((row.height, row.hidden, row.style), (Some(25.0), true, Some(StyleId(1))));
        assert!(ws.row_props(2).is_none());
        assert_eq!(ws.autofilter(), CellRange::parse("A1:C1").ok());
        assert_eq!(ws.merged_regions(), &[CellRange::parse("A5:B6").unwrap()]);
        let page = ws.page_setup();
        assert!(page.print_gridlines);
        assert_eq!(page.margins, None);
        assert_eq!(page.orientation, Some(PageOrientation::Landscape));
        assert_eq!((page.fit_to_width, page.fit_to_height), (Some(1), None));
        assert_eq!(parsed.drawing_rel_id.as_deref(), Some("rId2"));
        let preserved: Vec<&str> = ws.preserved_elements().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(preserved, vec!["tableParts"]);
        // the overlapping merge
        assert_eq!(parsed.issues.len(), 1);
    }

    #[test]
    fn test_write_then_read_keeps_the_model() {
        let source = parse(&wrap(
            r#"<sheetViews><sheetView workbookViewId="0"><pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/></sheetView></sheetViews><sheetData><row r="1"><c r="A1" s="1"><v>1</v></c><c r="B1"><f t="shared" ref="B1:B2" si="3">A1*2</f><v>2</v></c></row><row r="2"><c r="B2"><f t="shared" si="3"/><v>4</v></c></row></sheetData><conditionalFormatting sqref="A1"><cfRule type="cellIs" priority="1" operator="greaterThan"><formula>0</formula></cfRule></conditionalFormatting>"#,
        ));
        let ctx = SheetWriteContext {
            sheet: &source.worksheet,
            selected: false,
            drawing_rel_id: None,
            root_attrs: &source.root_attrs,
            row_flush: None,
        };
        let (bytes, _) = write_worksheet(&ctx, Vec::new()).unwrap();
        let again = parse_worksheet("xl/worksheets/sheet1.xml", "Sheet1", &bytes, &CTX).unwrap();
        assert!(again.issues.is_empty(), "{:?}", again.issues);
        let (a, b) = (&source.worksheet, &again.worksheet);
        let cells = |ws: &Worksheet| {
            ws.iter_cells()
                .map(|(r, c, _)| (r, c, ws.formula_at(r, c).map(|f| f.into_owned())))
                .collect::<Vec<_>>()
        };
        assert_eq!(cells(a), cells(b));
        assert_eq!(a.freeze_panes(), b.freeze_panes());
        assert_eq!(a.preserved_elements(), b.preserved_elements());
        assert_eq!(b.cell_at(0, 0).and_then(|d| d.style), Some(StyleId(1)));
    }
}
