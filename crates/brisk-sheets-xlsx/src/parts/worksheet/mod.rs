//! `xl/worksheets/sheetN.xml`.
//!
//! The writer regenerates the whole part from a [`Worksheet`]. Two readers
//! share the `<sheetData>` scanner in this module: [`parse_worksheet`] builds
//! an editable sheet, [`parse_columnar`] fills a read-only
//! [`ColumnarSheet`](brisk_sheets_core::ColumnarSheet) without building
//! cells.
//!
//! [`Worksheet`]: brisk_sheets_core::Worksheet

mod columnar;
mod reader;
mod writer;

pub use columnar::parse_columnar;
pub use reader::{parse_worksheet, ParsedSheet, SheetParseContext};
pub use writer::{write_worksheet, SheetStats, SheetWriteContext};

use brisk_sheets_core::date::datetime_to_serial;
use brisk_sheets_core::{CellError, MAX_COLS, MAX_ROWS};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use quick_xml::events::BytesStart;

use crate::xml::reader::{attr, attr_bool, attr_f64, attr_u32};

/// Children of `<worksheet>` in schema order
pub(crate) const ELEMENT_ORDER: &[&str] = &[
    "sheetPr",
    "dimension",
    "sheetViews",
    "sheetFormatPr",
    "cols",
    "sheetData",
    "sheetCalcPr",
    "sheetProtection",
    "protectedRanges",
    "scenarios",
    "autoFilter",
    "sortState",
    "dataConsolidate",
    "customSheetViews",
    "mergeCells",
    "phoneticPr",
    "conditionalFormatting",
    "dataValidations",
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

/// Elements the codec interprets; everything else is carried verbatim
pub(crate) const MODELED: &[&str] = &[
    "sheetPr",
    "dimension",
    "sheetViews",
    "sheetFormatPr",
    "cols",
    "sheetData",
    "autoFilter",
    "mergeCells",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "drawing",
];

/// Zero-based (row, col) of an `A1` reference; `None` when malformed or
/// outside the grid
pub(crate) fn parse_cell_ref(s: &str) -> Option<(u32, u16)> {
    let b = s.as_bytes();
    let mut i = 0;
    let mut col: u32 = 0;
    while i < b.len() && b[i].is_ascii_alphabetic() {
        col = col * 26 + u32::from(b[i].to_ascii_uppercase() - b'A' + 1);
        i += 1;
        if i > 3 {
            return None;
        }
    }
    if i == 0 || i == b.len() {
        return None;
    }
    let mut row: u32 = 0;
    for &d in &b[i..] {
        if !d.is_ascii_digit() {
            return None;
        }
        row = row.checked_mul(10)?.checked_add(u32::from(d - b'0'))?;
    }
    if row == 0 || row > MAX_ROWS || col > u32::from(MAX_COLS) {
        return None;
    }
    Some((row - 1, (col - 1) as u16))
}

/// The `t` attribute of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum CellType {
    #[default]
    Number,
    SharedString,
    Bool,
    Error,
    /// Formula string result
    Str,
    InlineStr,
    /// ISO 8601 date
    Date,
}

impl CellType {
    fn parse(s: &str) -> Self {
        match s {
            "s" => CellType::SharedString,
            "b" => CellType::Bool,
            "e" => CellType::Error,
            "str" => CellType::Str,
            "inlineStr" => CellType::InlineStr,
            "d" => CellType::Date,
            _ => CellType::Number,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormulaType {
    Normal,
    Shared,
    Array,
    DataTable,
}

#[derive(Debug, Clone)]
pub(crate) struct RawFormula {
    pub kind: FormulaType,
    pub text: String,
    pub reference: Option<String>,
    pub si: Option<u32>,
}

/// A `<c>` element as scanned
#[derive(Debug, Clone, Default)]
pub(crate) struct RawCell {
    pub row: u32,
    pub col: u16,
    pub style: Option<u32>,
    pub cell_type: CellType,
    pub value: Option<String>,
    pub inline: Option<String>,
    pub formula: Option<RawFormula>,
}

/// A `<row>` start tag as scanned; `row` is zero-based
#[derive(Debug, Clone, Default)]
pub(crate) struct RawRow {
    pub row: u32,
    pub height: Option<f64>,
    pub custom_height: bool,
    pub hidden: bool,
    pub style: Option<u32>,
    pub custom_format: bool,
    pub outline_level: u8,
    pub collapsed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TextTarget {
    #[default]
    None,
    Value,
    Formula,
    Inline,
}

/// Streaming scanner for the contents of `<sheetData>`.
///
/// Rows and cells without an `r` attribute continue from the previous one.
#[derive(Debug, Default)]
pub(crate) struct SheetDataReader {
    row: Option<u32>,
    next_col: u32,
    cell: Option<RawCell>,
    target: TextTarget,
    in_inline: bool,
    phonetic_depth: usize,
    pub issues: Vec<String>,
}

impl SheetDataReader {
    /// Handle a start tag inside `<sheetData>`. Returns the row when `e`
    /// opens one.
    pub fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> Option<RawRow> {
        match e.local_name().as_ref() {
            b"row" => Some(self.start_row(e)),
            b"c" => {
                self.start_cell(e);
                None
            }
            b"v" if !empty && self.cell.is_some() => {
                self.target = TextTarget::Value;
                None
            }
            b"f" => {
                if let Some(cell) = self.cell.as_mut() {
                    let kind = match attr(e, b"t").as_deref() {
                        Some("shared") => FormulaType::Shared,
                        Some("array") => FormulaType::Array,
                        Some("dataTable") => FormulaType::DataTable,
                        _ => FormulaType::Normal,
                    };
                    cell.formula = Some(RawFormula {
                        kind,
                        text: String::new(),
                        reference: attr(e, b"ref").map(|r| r.into_owned()),
                        si: attr_u32(e, b"si"),
                    });
                    if !empty {
                        self.target = TextTarget::Formula;
                    }
                }
                None
            }
            b"is" => {
                self.in_inline = true;
                if let Some(cell) = self.cell.as_mut() {
                    cell.inline.get_or_insert_with(String::new);
                }
                None
            }
            b"rPh" => {
                self.phonetic_depth += 1;
                None
            }
            b"t" if self.in_inline && self.phonetic_depth == 0 && !empty => {
                self.target = TextTarget::Inline;
                None
            }
            _ => None,
        }
    }

    fn start_row(&mut self, e: &BytesStart<'_>) -> RawRow {
        let row = match attr_u32(e, b"r") {
            Some(r) if r >= 1 && r <= MAX_ROWS => r - 1,
            Some(r) => {
                self.issues.push(format!("row number {} is outside the grid", r));
                self.row.map_or(0, |p| p + 1)
            }
            None => self.row.map_or(0, |p| p + 1),
        };
        self.row = Some(row);
        self.next_col = 0;
        RawRow {
            row,
            height: attr_f64(e, b"ht"),
            custom_height: attr_bool(e, b"customHeight").unwrap_or(false),
            hidden: attr_bool(e, b"hidden").unwrap_or(false),
            style: attr_u32(e, b"s"),
            custom_format: attr_bool(e, b"customFormat").unwrap_or(false),
            outline_level: attr_u32(e, b"outlineLevel").unwrap_or(0).min(7) as u8,
            collapsed: attr_bool(e, b"collapsed").unwrap_or(false),
        }
    }

    fn start_cell(&mut self, e: &BytesStart<'_>) {
        let position = match attr(e, b"r") {
            Some(r) => match parse_cell_ref(&r) {
                Some(pos) => Some(pos),
                None => {
                    self.issues.push(format!("unreadable cell reference '{}'", r));
                    None
                }
            },
            None => {
                let row = self.row.unwrap_or(0);
                (self.next_col < u32::from(MAX_COLS)).then_some((row, self.next_col as u16))
            }
        };
        self.cell = position.map(|(row, col)| {
            self.next_col = u32::from(col) + 1;
            RawCell {
                row,
                col,
                style: attr_u32(e, b"s"),
                cell_type: attr(e, b"t").map_or(CellType::Number, |t| CellType::parse(&t)),
                ..RawCell::default()
            }
        });
    }

    /// Handle an end tag. Returns the finished cell on `</c>`.
    pub fn end(&mut self, name: &[u8]) -> Option<RawCell> {
        match name {
            b"v" | b"f" | b"t" => self.target = TextTarget::None,
            b"is" => self.in_inline = false,
            b"rPh" => self.phonetic_depth = self.phonetic_depth.saturating_sub(1),
            b"c" => {
                self.target = TextTarget::None;
                self.in_inline = false;
                return self.cell.take();
            }
            _ => {}
        }
        None
    }

    pub fn text(&mut self, text: &str) {
        let Some(cell) = self.cell.as_mut() else {
            return;
        };
        match self.target {
            TextTarget::None => {}
            TextTarget::Value => cell.value.get_or_insert_with(String::new).push_str(text),
            TextTarget::Formula => {
                if let Some(f) = cell.formula.as_mut() {
                    f.text.push_str(text);
                }
            }
            TextTarget::Inline => cell.inline.get_or_insert_with(String::new).push_str(text),
        }
    }
}

/// Serial number of an ISO 8601 `t="d"` value. A bare time is a fraction
/// of a day.
pub(crate) fn iso_date_serial(text: &str, date1904: bool) -> Option<f64> {
    let text = text.trim().trim_end_matches('Z');
    if !text.contains('-') {
        let time = NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .ok()?;
        return Some(f64::from(time.num_seconds_from_midnight()) / 86_400.0);
    }
    let dt = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Some(datetime_to_serial(dt, date1904))
}

/// Error literal of an `e` cell, reporting unknown ones
pub(crate) fn parse_error_value(text: &str, issues: &mut Vec<String>) -> Option<CellError> {
    let parsed = CellError::parse(text.trim());
    if parsed.is_none() {
        issues.push(format!("unknown error value '{}'", text));
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::XlsxResult;
    use crate::xml::reader::{parse_part, Flow, PartHandler};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Collect {
        data: SheetDataReader,
        rows: Vec<RawRow>,
        cells: Vec<RawCell>,
    }

    impl PartHandler for Collect {
        fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> XlsxResult<Flow> {
            if let Some(row) = self.data.start(e, empty) {
                self.rows.push(row);
            }
            Ok(Flow::Continue)
        }

        fn end(&mut self, name: &[u8]) -> XlsxResult<()> {
            if let Some(cell) = self.data.end(name) {
                self.cells.push(cell);
            }
            Ok(())
        }

        fn text(&mut self, text: &str) -> XlsxResult<()> {
            self.data.text(text);
            Ok(())
        }
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("xfd1048576"), Some((1_048_575, 16_383)));
        assert_eq!(parse_cell_ref("AA10"), Some((9, 26)));
        assert_eq!(parse_cell_ref("XFE1"), None);
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("A1048577"), None);
        assert_eq!(parse_cell_ref("ABCD1"), None);
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("B"), None);
    }

    #[test]
    fn test_scan_implicit_positions() {
        let xml = br#"<sheetData><row><c><v>1</v></c><c t="s"><v>0</v></c></row><row r="5"><c r="C5" t="inlineStr"><is><t>x</t><rPh><t>ignored</t></rPh></is></c><c><f>C5&amp;"!"</f><v>x!</v></c></row></sheetData>"#;
        let mut c = Collect::default();
        parse_part("sheet.xml", xml, &mut c).unwrap();
        assert_eq!(c.rows.iter().map(|r| r.row).collect::<Vec<_>>(), vec![0, 4]);
        let positions: Vec<(u32, u16)> = c.cells.iter().map(|c| (c.row, c.col)).collect();
        assert_eq!(positions, vec![(0, 0), (0, 1), (4, 2), (4, 3)]);
        assert_eq!(c.cells[1].cell_type, CellType::SharedString);
        assert_eq!(c.cells[2].inline.as_deref(), Some("x"));
        let f = c.cells[3].formula.as_ref().unwrap();
        assert_eq!(f.text, "C5&\"!\"");
        assert_eq!(c.cells[3].value.as_deref(), Some("x!"));
        assert!(c.data.issues.is_empty());
    }

    #[test]
    fn test_scan_shared_formula_attrs() {
        let xml = br#"<sheetData><row r="1"><c r="B1"><f t="shared" ref="B1:B3" si="0">A1*2</f><v>2</v></c></row><row r="2"><c r="B2"><f t="shared" si="0"/><v>4</v></c></row></sheetData>"#;
        let mut c = Collect::default();
        parse_part("sheet.xml", xml, &mut c).unwrap();
        let anchor = c.cells[0].formula.as_ref().unwrap();
        assert_eq!(anchor.kind, FormulaType::Shared);
        assert_eq!(anchor.reference.as_deref(), Some("B1:B3"));
        let follower = c.cells[1].formula.as_ref().unwrap();
        assert_eq!((follower.si, follower.text.as_str()), (Some(0), ""));
    }

    #[test]
    fn test_bad_reference_is_reported() {
        let xml = br#"<sheetData><row r="1"><c r="A0"><v>1</v></c></row></sheetData>"#;
        let mut c = Collect::default();
        parse_part("sheet.xml", xml, &mut c).unwrap();
        assert!(c.cells.is_empty());
        assert_eq!(c.data.issues.len(), 1);
    }

    #[test]
    fn test_iso_date_serial() {
        assert_eq!(iso_date_serial("2024-01-15", false), Some(45306.0));
        assert_eq!(iso_date_serial("2024-01-15T12:00:00Z", false), Some(45306.5));
        assert_eq!(iso_date_serial("06:00:00", false), Some(0.25));
        assert_eq!(iso_date_serial("garbage", false), None);
    }
}
