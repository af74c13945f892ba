use brisk_sheets_core::{CellRange, ColumnarSheet, StringId, StyleId};
use quick_xml::events::BytesStart;

use super::reader::SheetParseContext;
use super::{iso_date_serial, parse_error_value, CellType, RawCell, SheetDataReader};
use crate::error::XlsxResult;
use crate::xml::reader::{attr, decode_excel_escapes, parse_part, Flow, PartHandler};

/// Stream a worksheet part into `sheet`, honoring its column projection and
/// row cap. Returns recoverable problems found on the way.
///
/// Formula cells contribute their cached results. Reading stops at the first
/// row past the cap; everything after `<sheetData>` is skipped.
pub fn parse_columnar(
    part: &str,
    xml: &[u8],
    sheet: &mut ColumnarSheet,
    ctx: &SheetParseContext,
) -> XlsxResult<Vec<String>> {
    let mut handler = ColumnarHandler {
        sheet,
        ctx: *ctx,
        depth: 0,
        in_data: false,
        data: SheetDataReader::default(),
        issues: Vec::new(),
    };
    parse_part(part, xml, &mut handler)?;
    handler.sheet.finish();
    let mut issues = handler.data.issues;
    issues.append(&mut handler.issues);
    Ok(issues)
}

struct ColumnarHandler<'a> {
    sheet: &'a mut ColumnarSheet,
    ctx: SheetParseContext,
    depth: usize,
    in_data: bool,
    data: SheetDataReader,
    issues: Vec<String>,
}

impl ColumnarHandler<'_> {
    fn push(&mut self, raw: RawCell) {
        self.sheet.extend_dimension(raw.row, raw.col);
        if !self.sheet.is_projected(raw.col) {
            return;
        }
        let row = raw.row;
        if let Some(s) = raw.style.filter(|&s| s > 0) {
            if (s as usize) < self.ctx.style_count {
                self.sheet.column_mut(raw.col).styles.push((row, StyleId(s)));
            }
        }
        let Some(value) = raw.value.as_deref() else {
            if raw.cell_type == CellType::InlineStr {
                if let Some(text) = raw.inline.as_deref() {
                    let text = decode_excel_escapes(text).into_owned();
                    self.sheet.column_mut(raw.col).text.push((row, text));
                }
            }
            return;
        };
        let has_formula = raw.formula.is_some();
        match raw.cell_type {
            CellType::Number => {
                if let Ok(n) = value.trim().parse::<f64>() {
                    self.sheet.column_mut(raw.col).numbers.push((row, n));
                }
            }
            CellType::SharedString if !has_formula => match value.trim().parse::<u32>() {
                Ok(id) if (id as usize) < self.ctx.string_count => {
                    self.sheet.column_mut(raw.col).strings.push((row, StringId(id)));
                }
                _ => self.issues.push(format!("row {}: bad shared string '{}'", row + 1, value)),
            },
            CellType::SharedString => {}
            CellType::Bool => {
                let b = value.trim() == "1" || value.trim() == "true";
                self.sheet.column_mut(raw.col).bools.push((row, b));
            }
            CellType::Error => {
                if let Some(e) = parse_error_value(value, &mut self.issues) {
                    self.sheet.column_mut(raw.col).errors.push((row, e));
                }
            }
            CellType::Str | CellType::InlineStr => {
                let text = decode_excel_escapes(value).into_owned();
                self.sheet.column_mut(raw.col).text.push((row, text));
            }
            CellType::Date => match iso_date_serial(value, self.ctx.date1904) {
                Some(serial) => self.sheet.column_mut(raw.col).numbers.push((row, serial)),
                None => self.issues.push(format!("row {}: unreadable date", row + 1)),
            },
        }
    }
}

impl PartHandler for ColumnarHandler<'_> {
    fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> XlsxResult<Flow> {
        let flow = match self.depth {
            0 => Flow::Continue,
            1 => match e.local_name().as_ref() {
                b"dimension" => {
                    if let Some(range) = attr(e, b"ref").and_then(|r| CellRange::parse(&r).ok()) {
                        self.sheet.set_dimension(Some(range));
                    }
                    Flow::Continue
                }
                b"sheetData" => {
                    self.in_data = true;
                    Flow::Continue
                }
                _ => Flow::Capture,
            },
            _ => {
                if let Some(row) = self.data.start(e, empty) {
                    if !self.sheet.accepts_row(row.row) {
                        self.sheet.set_truncated();
                        return Ok(Flow::Stop);
                    }
                }
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
        if self.in_data && self.depth >= 2 {
            if let Some(cell) = self.data.end(name) {
                self.push(cell);
            }
        } else if self.depth == 1 && name == b"sheetData" {
            self.in_data = false;
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> XlsxResult<()> {
        if self.in_data {
            self.data.text(text);
        }
        Ok(())
    }
}
