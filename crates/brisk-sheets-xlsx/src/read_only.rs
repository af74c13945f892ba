//! Read-only loading into columnar sheets.
//!
//! No [`Workbook`](brisk_sheets_core::Workbook) is built: each worksheet is
//! streamed into a [`ColumnarSheet`], honoring the column projection and row
//! cap of the [`ReadOptions`]. The type has no mutators, so writes are
//! rejected at compile time.

use std::path::Path;

use brisk_sheets_core::{
    CellRange, ColumnarSheet, ColumnarValue, DocProperties, FormatRepository, ReadOptions,
    SharedStringTable, SheetVisibility, StringId,
};

use crate::error::XlsxResult;
use crate::package::{rel_type, resolve_target, SourcePackage};
use crate::parts::doc_props::{parse_app, parse_core};
use crate::parts::shared_strings::parse_shared_strings;
use crate::parts::styles::parse_styles;
use crate::parts::workbook::parse_workbook;
use crate::parts::worksheet::{parse_columnar, SheetParseContext};
use crate::reader::{parse_sheets, sheet_parts, ReadReport};

/// A workbook opened read-only
///
/// ```no_run
/// use brisk_sheets_core::{ColumnarValue, ReadOptions};
/// use brisk_sheets_xlsx::ReadOnlyWorkbook;
///
/// let options = ReadOptions::default().with_projection([0, 2]).with_row_cap(10_000);
/// let wb = ReadOnlyWorkbook::open("big.xlsx", &options).unwrap();
/// let sheet = wb.sheet(0).unwrap();
/// if let ColumnarValue::Number(n) = sheet.get(1, 2) {
///     println!("C2 = {}", n);
/// }
/// ```
#[derive(Debug)]
pub struct ReadOnlyWorkbook {
    sheets: Vec<ColumnarSheet>,
    visibility: Vec<SheetVisibility>,
    strings: SharedStringTable,
    styles: FormatRepository,
    properties: DocProperties,
    date1904: bool,
    active_sheet: usize,
    report: ReadReport,
}

impl ReadOnlyWorkbook {
    /// Open a package file
    pub fn open<P: AsRef<Path>>(path: P, options: &ReadOptions) -> XlsxResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        log::debug!(
            "read-only: {} ({} bytes)",
            path.as_ref().display(),
            bytes.len()
        );
        Self::from_bytes(bytes, options)
    }

    /// Open package bytes
    pub fn from_bytes(bytes: Vec<u8>, options: &ReadOptions) -> XlsxResult<Self> {
        let source = SourcePackage::index(bytes)?;
        let archive = source.archive()?;
        let mut report = ReadReport::default();

        let workbook_part = source.workbook_part();
        let info = parse_workbook(workbook_part, &archive.read(workbook_part)?)?;
        let strings = match source.shared_strings_part() {
            Some(part) => parse_shared_strings(part, &archive.read(part)?)?,
            None => SharedStringTable::new(),
        };
        let styles = match source.styles_part() {
            Some(part) => {
                let mut parsed = parse_styles(part, &archive.read(part)?)?;
                report.extend(part, std::mem::take(&mut parsed.issues));
                FormatRepository::from_source(parsed.cell_xfs, None)
            }
            None => FormatRepository::new(),
        };

        let jobs = sheet_parts(&source, &info.sheets)?;
        let ctx = SheetParseContext {
            date1904: info.settings.date_1904,
            style_count: styles.len(),
            string_count: strings.len(),
        };
        let loaded = parse_sheets(options, &jobs, |(info, part)| {
            let xml = archive.read(part)?;
            let mut sheet =
                ColumnarSheet::new(info.name.clone(), options.projection.clone(), options.row_cap);
            let issues = parse_columnar(part, &xml, &mut sheet, &ctx)?;
            log::debug!(
                "read-only: parsed {} ({} values{})",
                part,
                sheet.value_count(),
                if sheet.is_truncated() { ", truncated" } else { "" }
            );
            Ok((sheet, issues))
        })?;

        let mut sheets = Vec::with_capacity(loaded.len());
        for ((_, part), (sheet, issues)) in jobs.iter().zip(loaded) {
            report.extend(part, issues);
            report.cells += sheet.value_count() as u64;
            sheets.push(sheet);
        }
        report.sheets = sheets.len();

        let part_of = |rel: &str| {
            source
                .root_rels()
                .find_type(rel)
                .map(|r| resolve_target("", &r.target))
                .filter(|p| archive.contains(p))
        };
        let mut properties = DocProperties::default();
        if let Some(part) = part_of(rel_type::CORE_PROPS) {
            parse_core(&part, &archive.read(&part)?, &mut properties)?;
        }
        if let Some(part) = part_of(rel_type::APP_PROPS) {
            parse_app(&part, &archive.read(&part)?, &mut properties)?;
        }

        Ok(Self {
            visibility: info.sheets.iter().map(|s| s.visibility).collect(),
            sheets,
            strings,
            styles,
            properties,
            date1904: info.settings.date_1904,
            active_sheet: info.active_tab,
            report,
        })
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(ColumnarSheet::name).collect()
    }

    /// Sheet by position
    pub fn sheet(&self, index: usize) -> Option<&ColumnarSheet> {
        self.sheets.get(index)
    }

    /// Sheet by name, case-insensitively
    pub fn sheet_by_name(&self, name: &str) -> Option<&ColumnarSheet> {
        self.sheets
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }

    pub fn sheets(&self) -> impl Iterator<Item = &ColumnarSheet> {
        self.sheets.iter()
    }

    pub fn visibility(&self, index: usize) -> Option<SheetVisibility> {
        self.visibility.get(index).copied()
    }

    pub fn active_sheet(&self) -> usize {
        self.active_sheet
    }

    /// Full extent of a sheet as declared or observed, projection ignored
    pub fn dimension(&self, index: usize) -> Option<CellRange> {
        self.sheets.get(index).and_then(ColumnarSheet::dimension)
    }

    pub fn strings(&self) -> &SharedStringTable {
        &self.strings
    }

    /// Text of a shared string
    pub fn string(&self, id: StringId) -> Option<&str> {
        self.strings.get(id)
    }

    pub fn styles(&self) -> &FormatRepository {
        &self.styles
    }

    pub fn properties(&self) -> &DocProperties {
        &self.properties
    }

    pub fn date1904(&self) -> bool {
        self.date1904
    }

    /// Problems met while loading
    pub fn report(&self) -> &ReadReport {
        &self.report
    }

    /// Text of a string cell, shared or inline
    pub fn text(&self, sheet: usize, row: u32, col: u16) -> Option<&str> {
        match self.sheets.get(sheet)?.get(row, col) {
            ColumnarValue::SharedString(id) => self.strings.get(id),
            ColumnarValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Whether a numeric cell carries a date format
    pub fn is_date(&self, sheet: usize, row: u32, col: u16) -> bool {
        let Some(sheet) = self.sheets.get(sheet) else {
            return false;
        };
        matches!(sheet.get(row, col), ColumnarValue::Number(_))
            && sheet
                .style(row, col)
                .is_some_and(|s| self.styles.is_date_style(s))
    }
}
