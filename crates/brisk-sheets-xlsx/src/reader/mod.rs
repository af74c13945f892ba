//! XLSX reader: loads a package into an editable [`Workbook`].
//!
//! Shared strings and styles are parsed first, serially; worksheets are then
//! parsed in parallel, each worker owning the sheet it builds. Problems that
//! only affect one item (a bad style index, an unreadable picture) are
//! recorded in the [`ReadReport`] and the load carries on.

use std::path::Path;
use std::sync::Arc;

use brisk_sheets_core::{
    CustomProperties, DefinedNames, DocProperties, FormatRepository, Image, ImageFormat,
    ReadOptions, SharedStringTable, Workbook, WorkbookOptions, WorkbookParts, Worksheet,
};
use rayon::prelude::*;

use crate::archive::ZipArchive;
use crate::error::{XlsxError, XlsxResult};
use crate::package::{rel_type, rels_path_for, resolve_target, SourcePackage};
use crate::parts::doc_props::{parse_app, parse_core, parse_custom};
use crate::parts::drawing::parse_drawing;
use crate::parts::relationships::Relationships;
use crate::parts::shared_strings::parse_shared_strings;
use crate::parts::styles::parse_styles;
use crate::parts::workbook::{parse_workbook, SheetInfo, FILTER_DATABASE, PRINT_AREA};
use crate::parts::worksheet::{parse_worksheet, ParsedSheet, SheetParseContext};

/// A recoverable problem met while reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadIssue {
    /// Part the problem was found in
    pub part: String,
    pub message: String,
}

/// Everything a load noticed but did not fail on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadReport {
    pub issues: Vec<ReadIssue>,
    pub sheets: usize,
    pub cells: u64,
}

impl ReadReport {
    /// Whether the load met no problems
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub(crate) fn push<P: Into<String>, M: Into<String>>(&mut self, part: P, message: M) {
        let issue = ReadIssue {
            part: part.into(),
            message: message.into(),
        };
        log::warn!("read: {}: {}", issue.part, issue.message);
        self.issues.push(issue);
    }

    pub(crate) fn extend(&mut self, part: &str, messages: Vec<String>) {
        for message in messages {
            self.push(part, message);
        }
    }
}

/// A workbook loaded for edit, with the package it came from
#[derive(Debug)]
pub struct LoadedWorkbook {
    pub workbook: Workbook,
    /// Source of the parts a save copies instead of regenerating
    pub source: SourcePackage,
    pub report: ReadReport,
}

/// Loads packages for edit
///
/// ```no_run
/// use brisk_sheets_xlsx::XlsxReader;
///
/// let loaded = XlsxReader::new().read_file("report.xlsx").unwrap();
/// for issue in &loaded.report.issues {
///     eprintln!("{}: {}", issue.part, issue.message);
/// }
/// println!("{} sheets", loaded.workbook.sheet_count());
/// ```
#[derive(Debug, Clone, Default)]
pub struct XlsxReader {
    options: ReadOptions,
    workbook_options: WorkbookOptions,
}

impl XlsxReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parallelism settings; projection and row cap only apply to read-only
    /// loads
    pub fn with_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    /// Options the loaded workbook saves with
    pub fn with_workbook_options(mut self, options: WorkbookOptions) -> Self {
        self.workbook_options = options;
        self
    }

    /// Read a workbook from a file path
    pub fn read_file<P: AsRef<Path>>(&self, path: P) -> XlsxResult<LoadedWorkbook> {
        let bytes = std::fs::read(path.as_ref())?;
        log::debug!("read: {} ({} bytes)", path.as_ref().display(), bytes.len());
        self.read_bytes(bytes)
    }

    /// Read a workbook from package bytes
    pub fn read_bytes(&self, bytes: Vec<u8>) -> XlsxResult<LoadedWorkbook> {
        let mut source = SourcePackage::index(bytes)?;
        let mut report = ReadReport::default();
        let (parts, sheet_attrs, workbook_attrs) = {
            let archive = source.archive()?;
            self.load(&source, &archive, &mut report)?
        };
        source.set_workbook_root_attrs(workbook_attrs);
        for (part, attrs) in sheet_attrs {
            if let Some(sheet) = source.sheet_mut(&part) {
                sheet.root_attrs = attrs;
            }
        }
        report.sheets = parts.worksheets.len();
        report.cells = parts.worksheets.iter().map(|ws| ws.cell_count() as u64).sum();
        let workbook = Workbook::from_parts(parts, self.workbook_options.clone());
        Ok(LoadedWorkbook {
            workbook,
            source,
            report,
        })
    }

    #[allow(clippy::type_complexity)]
    fn load(
        &self,
        source: &SourcePackage,
        archive: &ZipArchive<'_>,
        report: &mut ReadReport,
    ) -> XlsxResult<(WorkbookParts, Vec<(String, Vec<(String, String)>)>, Vec<(String, String)>)> {
        let workbook_part = source.workbook_part();
        let info = parse_workbook(workbook_part, &archive.read(workbook_part)?)?;

        let strings = match source.shared_strings_part() {
            Some(part) => parse_shared_strings(part, &archive.read(part)?)?,
            None => SharedStringTable::new(),
        };
        let styles = match source.styles_part() {
            Some(part) => {
                let bytes = archive.read(part)?;
                let mut parsed = parse_styles(part, &bytes)?;
                report.extend(part, std::mem::take(&mut parsed.issues));
                parsed.into_repository(bytes)
            }
            None => FormatRepository::new(),
        };

        let jobs = sheet_parts(source, &info.sheets)?;
        let ctx = SheetParseContext {
            date1904: info.settings.date_1904,
            style_count: styles.len(),
            string_count: strings.len(),
        };
        let parsed = parse_sheets(&self.options, &jobs, |(info, part)| {
            let xml = archive.read(part)?;
            let parsed = parse_worksheet(part, &info.name, &xml, &ctx)?;
            log::debug!("read: parsed {} ({} cells)", part, parsed.worksheet.cell_count());
            Ok(parsed)
        })?;

        let mut worksheets = Vec::with_capacity(parsed.len());
        let mut sheet_attrs = Vec::with_capacity(parsed.len());
        for ((info, part), sheet) in jobs.iter().zip(parsed) {
            let ParsedSheet {
                mut worksheet,
                root_attrs,
                issues,
                ..
            } = sheet;
            report.extend(part, issues);
            worksheet.set_visibility(info.visibility);
            load_images(source, archive, part, &mut worksheet, report)?;
            sheet_attrs.push((part.clone(), root_attrs));
            worksheets.push(worksheet);
        }

        let mut names = DefinedNames::new();
        for name in info.names {
            let sheet = name.local_sheet.and_then(|i| worksheets.get_mut(i));
            if name.name.eq_ignore_ascii_case(FILTER_DATABASE) {
                continue;
            }
            if name.name.eq_ignore_ascii_case(PRINT_AREA) {
                if let Some(ws) = sheet {
                    if let Some(range) = name.single_range_on(ws.name()) {
                        ws.set_print_area(Some(range));
                        continue;
                    }
                }
            }
            let label = name.name.clone();
            if let Err(e) = names.define_or_update(name.into_defined_name()) {
                report.push(workbook_part, format!("defined name '{}' dropped: {}", label, e));
            }
        }

        let (properties, custom_properties) = load_properties(source, archive, report)?;
        let parts = WorkbookParts {
            worksheets,
            styles,
            strings,
            properties,
            custom_properties,
            names,
            settings: info.settings,
            active_sheet: info.active_tab,
            preserved: info.preserved,
        };
        Ok((parts, sheet_attrs, info.root_attrs))
    }
}

/// Pair each `<sheet>` with its worksheet part
pub(crate) fn sheet_parts<'i>(
    source: &SourcePackage,
    sheets: &'i [SheetInfo],
) -> XlsxResult<Vec<(&'i SheetInfo, String)>> {
    sheets
        .iter()
        .map(|info| {
            let rel = source.workbook_rels().get(&info.rel_id).ok_or_else(|| {
                XlsxError::xml(
                    source.workbook_part(),
                    format!("sheet '{}' points at unknown relationship '{}'", info.name, info.rel_id),
                )
            })?;
            let part = resolve_target(source.workbook_part(), &rel.target);
            if !source.contains(&part) {
                return Err(XlsxError::MissingPart(part));
            }
            Ok((info, part))
        })
        .collect()
}

/// Run `parse` over every job, on a worker pool when the options allow it.
/// Results keep job order.
pub(crate) fn parse_sheets<J, T, F>(options: &ReadOptions, jobs: &[J], parse: F) -> XlsxResult<Vec<T>>
where
    J: Sync,
    T: Send,
    F: Fn(&J) -> XlsxResult<T> + Sync + Send,
{
    if !options.parallel_sheets || jobs.len() < 2 {
        return jobs.iter().map(parse).collect();
    }
    if options.parse_threads == 0 {
        return jobs.par_iter().map(parse).collect();
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.parse_threads)
        .build()
        .map_err(|e| XlsxError::InvalidArgument(format!("parse thread pool: {}", e)))?;
    pool.install(|| jobs.par_iter().map(parse).collect())
}

/// Rebuild the pictures of a sheet from its drawing and media
fn load_images(
    source: &SourcePackage,
    archive: &ZipArchive<'_>,
    part: &str,
    worksheet: &mut Worksheet,
    report: &mut ReadReport,
) -> XlsxResult<()> {
    let Some(drawing) = source.sheet(part).and_then(|s| s.drawing.as_deref()) else {
        return Ok(());
    };
    let parsed = parse_drawing(drawing, &archive.read(drawing)?)?;
    if parsed.foreign_anchors > 0 {
        log::debug!(
            "read: {} has {} non-picture anchors",
            drawing,
            parsed.foreign_anchors
        );
    }
    if parsed.pictures.is_empty() {
        return Ok(());
    }
    let rels_part = rels_path_for(drawing);
    let rels = if archive.contains(&rels_part) {
        Relationships::parse(&rels_part, &archive.read(&rels_part)?)?
    } else {
        Relationships::new()
    };
    for picture in parsed.pictures {
        let Some(rel) = rels.get(&picture.embed).filter(|r| !r.external) else {
            report.push(drawing, format!("picture points at unknown relationship '{}'", picture.embed));
            continue;
        };
        let media = resolve_target(drawing, &rel.target);
        if !archive.contains(&media) {
            report.push(drawing, format!("missing media part '{}'", media));
            continue;
        }
        let data = archive.read(&media)?;
        let format = match ImageFormat::sniff(&data) {
            Ok(format) => format,
            Err(e) => {
                let guessed = media
                    .rsplit_once('.')
                    .and_then(|(_, ext)| ImageFormat::from_extension(ext));
                match guessed {
                    Some(format) => {
                        report.push(&media, format!("{}; keeping it as {}", e, format.extension()));
                        format
                    }
                    None => {
                        report.push(&media, e.to_string());
                        continue;
                    }
                }
            }
        };
        let mut image = Image::from_parts(Arc::from(data), format, picture.anchor);
        image.name = picture.name;
        image.description = picture.description;
        worksheet.add_image(image);
    }
    Ok(())
}

/// Core, extended and custom properties, through the root relationships
fn load_properties(
    source: &SourcePackage,
    archive: &ZipArchive<'_>,
    report: &mut ReadReport,
) -> XlsxResult<(DocProperties, CustomProperties)> {
    let part_of = |rel: &str| {
        source
            .root_rels()
            .find_type(rel)
            .filter(|r| !r.external)
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
    let custom = match part_of(rel_type::CUSTOM_PROPS) {
        Some(part) => {
            let (custom, issues) = parse_custom(&part, &archive.read(&part)?)?;
            report.extend(&part, issues);
            custom
        }
        None => CustomProperties::new(),
    };
    Ok((properties, custom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::XlsxWriter;
    use brisk_sheets_core::{
        AccessMode, CellRange, CustomValue, Part, SheetVisibility, StyleBuilder,
    };
    use pretty_assertions::assert_eq;

    fn round_trip(wb: &Workbook) -> LoadedWorkbook {
        let (bytes, _) = XlsxWriter::new(wb).to_bytes().unwrap();
        XlsxReader::new().read_bytes(bytes).unwrap()
    }

    #[test]
    fn test_minimal_round_trip() {
        let mut wb = Workbook::new();
        {
            let mut sheet = wb.add_sheet("Data").unwrap();
            sheet.set_value("A1", "Hello").unwrap();
            sheet.set_value((0, 1), 42.0).unwrap();
        }
        let loaded = round_trip(&wb);
        assert!(loaded.report.is_clean(), "{:?}", loaded.report.issues);
        assert_eq!(loaded.report.sheets, 1);
        assert_eq!(loaded.report.cells, 2);
        let wb = loaded.workbook;
        assert_eq!(wb.mode(), AccessMode::Edit);
        assert!(!wb.dirty().any());
        let sheet = wb.sheet("Data").unwrap();
        assert_eq!(sheet.cell("A1").unwrap().as_text(), Some("Hello"));
        assert_eq!(sheet.cell("B1").unwrap().as_number(), Some(42.0));
    }

    #[test]
    fn test_workbook_level_state() {
        let mut wb = Workbook::new();
        let bold = wb.intern_style(StyleBuilder::new().bold(true).build().unwrap());
        {
            let mut sheet = wb.add_sheet("One").unwrap();
            sheet.set_value("A1", 1.0).unwrap();
            sheet.set_cell_format("A1", bold).unwrap();
            sheet.set_print_area("A1:C10").unwrap();
        }
        wb.add_sheet("Two").unwrap();
        wb.add_sheet("Secret").unwrap();
        wb.set_sheet_visibility("Secret", SheetVisibility::Hidden).unwrap();
        wb.set_active_sheet(1usize).unwrap();
        wb.define_name("Total", "One!$A$1").unwrap();
        wb.properties_mut().title = Some("Quarterly".into());
        wb.set_custom_property("Reviewed", true).unwrap();

        let loaded = round_trip(&wb);
        assert!(loaded.report.is_clean(), "{:?}", loaded.report.issues);
        let wb = loaded.workbook;
        assert_eq!(wb.sheet_names(), vec!["One", "Two", "Secret"]);
        assert_eq!(wb.active_sheet(), 1);
        assert_eq!(wb.worksheet(2).unwrap().visibility(), SheetVisibility::Hidden);
        assert_eq!(wb.worksheet(0).unwrap().print_area(), CellRange::parse("A1:C10").ok());
        // the print area comes back as sheet state, not as a user name
        assert_eq!(wb.defined_names().len(), 1);
        assert_eq!(wb.defined_name("total", 0).unwrap().formula, "One!$A$1");
        assert_eq!(wb.properties().title.as_deref(), Some("Quarterly"));
        assert_eq!(wb.custom_properties().get("Reviewed"), Some(&CustomValue::Bool(true)));
        let style = wb.worksheet(0).unwrap().cell_at(0, 0).unwrap().style.unwrap();
        assert!(wb.style(style).unwrap().font().bold);
        assert!(wb.styles().matches_source());
    }

    #[test]
    fn test_images_round_trip() {
        const PNG_2X3: &[u8] = &[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0x08, 0x06, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut wb = Workbook::new();
        let image = Image::from_bytes(PNG_2X3.to_vec()).unwrap().with_name("Logo");
        wb.add_sheet("Pics").unwrap().insert_image("C4", image).unwrap();

        let loaded = round_trip(&wb);
        assert!(loaded.report.is_clean(), "{:?}", loaded.report.issues);
        let images = loaded.workbook.worksheet(0).unwrap().images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].data(), PNG_2X3);
        assert_eq!(images[0].dimensions(), (2, 3));
        assert_eq!(images[0].name.as_deref(), Some("Logo"));
        assert_eq!(images[0].anchor.from_cell(), Some((3, 2)));
        assert!(!loaded.workbook.dirty().is_dirty(Part::Drawing(0)));
    }

    #[test]
    fn test_parallel_and_serial_agree() {
        let mut wb = Workbook::new();
        for s in 0..4 {
            let mut sheet = wb.add_sheet(&format!("S{}", s)).unwrap();
            for r in 0..50u32 {
                sheet.set_value((r, 0), f64::from(r * s)).unwrap();
                sheet.set_value((r, 1), format!("s{}r{}", s, r)).unwrap();
            }
        }
        let (bytes, _) = XlsxWriter::new(&wb).to_bytes().unwrap();
        let serial = XlsxReader::new()
            .with_options(ReadOptions::default().with_parallel_sheets(false))
            .read_bytes(bytes.clone())
            .unwrap();
        let pooled = XlsxReader::new()
            .with_options(ReadOptions::default().with_parse_threads(2))
            .read_bytes(bytes)
            .unwrap();
        for (a, b) in serial.workbook.worksheets().zip(pooled.workbook.worksheets()) {
            assert_eq!(a.name(), b.name());
            assert_eq!(a.iter_cells().collect::<Vec<_>>(), b.iter_cells().collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_dangling_sheet_relationship() {
        let mut wb = Workbook::new();
        wb.add_sheet("Only").unwrap();
        let (bytes, _) = XlsxWriter::new(&wb).to_bytes().unwrap();
        // rewrite the package without the worksheet part
        let archive = ZipArchive::new(&bytes).unwrap();
        let mut zip = crate::archive::ZipWriter::new(
            Vec::new(),
            brisk_sheets_core::CompressionBackend::Portable,
            6,
        )
        .unwrap();
        for name in archive.names() {
            if name != "xl/worksheets/sheet1.xml" {
                zip.add_entry(name, &archive.read(name).unwrap()).unwrap();
            }
        }
        let (broken, _) = zip.finish().unwrap();
        let err = XlsxReader::new().read_bytes(broken).unwrap_err();
        assert!(matches!(err, XlsxError::MissingPart(ref p) if p == "xl/worksheets/sheet1.xml"));
    }
}
