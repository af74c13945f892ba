//! XLSX writer: turns a [`Workbook`] into a package.
//!
//! Every entry is planned before the first byte is written: part names,
//! relationship ids and what gets regenerated versus copied. Without a
//! source package every part is generated. With one (edit mode), parts the
//! [`DirtyManager`](brisk_sheets_core::DirtyManager) reports clean are
//! copied from the source archive without recompression, and entries the
//! model does not know about are carried over in source order.

use std::io::{BufWriter, Write};
use std::path::Path;

use ahash::AHashSet;
use brisk_sheets_core::{CellValue, Error, Part, Workbook, Worksheet};

use crate::archive::{ZipArchive, ZipWriter};
use crate::compression::EngineStats;
use crate::error::{XlsxError, XlsxResult};
use crate::package::{
    self, content_type, next_free_name, rel_type, relative_target, rels_path_for,
    resolve_target, SourcePackage, SourceSheet,
};
use crate::parts::content_types::ContentTypes;
use crate::parts::doc_props::{write_app, write_core, write_custom};
use crate::parts::drawing::write_drawing;
use crate::parts::relationships::Relationships;
use crate::parts::shared_strings::write_shared_strings;
use crate::parts::styles::write_styles;
use crate::parts::workbook::{write_workbook, SheetEntry};
use crate::parts::worksheet::{write_worksheet, SheetWriteContext};

/// What a save did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    /// Archive size in bytes
    pub bytes_written: u64,
    pub entries: usize,
    /// Parts generated from the model, in archive order
    pub regenerated: Vec<String>,
    /// Parts copied from the source package
    pub copied: Vec<String>,
    /// Source parts left out of the new package
    pub dropped: Vec<String>,
    /// Worksheet part of each sheet, by position
    pub sheet_parts: Vec<String>,
    /// Cells written by regenerated sheets
    pub cells: u64,
    pub engine: EngineStats,
}

/// Writes a workbook, optionally on top of the package it was loaded from
///
/// ```
/// use brisk_sheets_core::Workbook;
/// use brisk_sheets_xlsx::XlsxWriter;
///
/// let mut wb = Workbook::new();
/// wb.add_sheet("Data").unwrap().set_value("A1", "Hello").unwrap();
/// let (bytes, report) = XlsxWriter::new(&wb).to_bytes().unwrap();
/// assert!(bytes.starts_with(b"PK"));
/// assert!(report.regenerated.contains(&"xl/worksheets/sheet1.xml".to_string()));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct XlsxWriter<'a> {
    workbook: &'a Workbook,
    source: Option<&'a SourcePackage>,
}

impl<'a> XlsxWriter<'a> {
    pub fn new(workbook: &'a Workbook) -> Self {
        Self {
            workbook,
            source: None,
        }
    }

    /// Copy clean parts from `source` instead of regenerating them
    pub fn with_source(mut self, source: &'a SourcePackage) -> Self {
        self.source = Some(source);
        self
    }

    /// Write the package into memory
    pub fn to_bytes(&self) -> XlsxResult<(Vec<u8>, SaveReport)> {
        self.write(Vec::with_capacity(64 * 1024))
    }

    /// Write the package to `path` atomically.
    ///
    /// The archive goes to a temporary file in the destination directory,
    /// which replaces `path` only once it is complete. On error the temporary
    /// file is removed and `path` is untouched.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> XlsxResult<SaveReport> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let temp = tempfile::NamedTempFile::new_in(dir)?;
        let (sink, report) = self.write(BufWriter::with_capacity(256 * 1024, temp))?;
        let temp = sink.into_inner().map_err(|e| XlsxError::Io(e.into_error()))?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| XlsxError::Io(e.error))?;
        log::debug!(
            "save: {} ({} entries, {} bytes)",
            path.display(),
            report.entries,
            report.bytes_written
        );
        Ok(report)
    }

    /// Write the package to `sink`
    pub fn write<W: Write>(&self, sink: W) -> XlsxResult<(W, SaveReport)> {
        let wb = self.workbook;
        if wb.sheet_count() == 0 {
            return Err(Error::InvalidState {
                operation: "save a workbook without sheets",
                mode: wb.mode().as_str(),
            }
            .into());
        }
        let archive = match self.source {
            Some(src) => Some(src.archive()?),
            None => None,
        };
        let plan = Plan::build(wb, self.source)?;
        let options = wb.options();
        let zip = ZipWriter::new(sink, options.backend, options.compression_level)?;
        let mut emitter = Emitter {
            zip,
            archive: archive.as_ref(),
            report: SaveReport::default(),
        };
        plan.emit(wb, self.source, &mut emitter)?;

        let Emitter {
            zip, mut report, ..
        } = emitter;
        let (sink, stats) = zip.finish()?;
        report.bytes_written = stats.bytes_written;
        report.entries = stats.entries;
        report.engine = stats.engine;
        report.dropped = plan.dropped;
        report.sheet_parts = plan.sheets.iter().map(|s| s.part.clone()).collect();
        Ok((sink, report))
    }
}

/// The ZIP writer plus the source archive and the running report
struct Emitter<'s, W: Write> {
    zip: ZipWriter<W>,
    archive: Option<&'s ZipArchive<'s>>,
    report: SaveReport,
}

impl<W: Write> Emitter<'_, W> {
    fn put(&mut self, name: &str, data: &[u8]) -> XlsxResult<()> {
        self.zip.add_entry(name, data)?;
        log::debug!("save: regenerated {} ({} bytes)", name, data.len());
        self.report.regenerated.push(name.to_string());
        Ok(())
    }

    fn copy(&mut self, name: &str) -> XlsxResult<()> {
        let archive = self
            .archive
            .ok_or_else(|| Error::internal(format!("no source archive to copy '{}' from", name)))?;
        self.zip.add_raw(name, archive.raw(name)?)?;
        log::debug!("save: copied {}", name);
        self.report.copied.push(name.to_string());
        Ok(())
    }

    fn source_has(&self, name: &str) -> bool {
        self.archive.is_some_and(|a| a.contains(name))
    }
}

/// How a part reaches the new package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Write,
    Copy,
}

/// Drawing of one sheet in the new package
#[derive(Debug)]
enum DrawingPlan {
    None,
    /// Drawing, its rels and media carried over unchanged
    Copy { part: String, media: Vec<String> },
    /// Drawing regenerated from the sheet's images; one media part each
    Write {
        part: String,
        rels: Relationships,
        media: Vec<String>,
    },
}

#[derive(Debug)]
struct SheetPlan<'a> {
    part: String,
    rel_id: String,
    source: Option<&'a SourceSheet>,
    action: Action,
    rels: Relationships,
    /// `None` when the sheet has no rels part
    rels_action: Option<Action>,
    drawing_rel_id: Option<String>,
    drawing: DrawingPlan,
}

/// Every decision about the new package, made before writing
#[derive(Debug)]
struct Plan<'a> {
    content_types: ContentTypes,
    content_types_action: Action,
    root_rels: Relationships,
    root_rels_action: Action,
    workbook_part: String,
    workbook_action: Action,
    workbook_rels: Relationships,
    workbook_rels_action: Action,
    styles_part: String,
    styles_action: Action,
    /// `None` when the workbook has no strings
    shared_strings: Option<(String, Action)>,
    sheets: Vec<SheetPlan<'a>>,
    /// (part, kind) of regenerated document properties
    doc_props: Vec<(String, Part)>,
    /// Source entries carried over because nothing above claims them
    passthrough: Vec<String>,
    dropped: Vec<String>,
}

impl<'a> Plan<'a> {
    fn build(wb: &'a Workbook, source: Option<&'a SourcePackage>) -> XlsxResult<Self> {
        let dirty = |part: Part| source.is_none() || wb.dirty().is_dirty(part);
        let mut taken: AHashSet<String> = source
            .map(|s| s.entries().iter().cloned().collect())
            .unwrap_or_default();
        let mut claimed: AHashSet<String> = AHashSet::new();
        let mut drop_candidates: Vec<String> = Vec::new();

        let workbook_part = source
            .map(|s| s.workbook_part().to_string())
            .unwrap_or_else(|| package::WORKBOOK.to_string());

        // sheets, drawings and media
        let mut sheets: Vec<SheetPlan<'a>> = Vec::with_capacity(wb.sheet_count());
        for (index, ws) in wb.worksheets().enumerate() {
            let existing = source.and_then(|src| {
                ws.source_part()
                    .and_then(|p| src.sheet(p))
                    .filter(|s| !claimed.contains(&s.part))
            });
            let part = match existing {
                Some(s) => s.part.clone(),
                None => next_free_name("xl/worksheets/sheet", ".xml", |n| taken.contains(n)),
            };
            taken.insert(part.clone());
            claimed.insert(part.clone());
            let plan = plan_sheet(index, ws, part, existing, &dirty, &mut taken, &mut drop_candidates);
            claimed.insert(rels_path_for(&plan.part));
            match &plan.drawing {
                DrawingPlan::None => {}
                DrawingPlan::Copy { part, media } | DrawingPlan::Write { part, media, .. } => {
                    claimed.insert(part.clone());
                    claimed.insert(rels_path_for(part));
                    claimed.extend(media.iter().cloned());
                }
            }
            sheets.push(plan);
        }

        let any_sheet_written = sheets.iter().any(|s| s.action == Action::Write);
        let mut removed_sheet = false;
        if let Some(src) = source {
            for old in src.sheets() {
                if sheets.iter().any(|s| s.part == old.part) {
                    continue;
                }
                removed_sheet = true;
                drop_candidates.extend(old.owned_parts());
                drop_candidates.extend(old.media.iter().cloned());
                drop_candidates.extend(
                    old.rels
                        .iter()
                        .filter(|r| !r.external)
                        .map(|r| resolve_target(&old.part, &r.target)),
                );
            }
        }

        // workbook rels
        let styles_part = source
            .and_then(|s| s.styles_part())
            .unwrap_or(package::STYLES)
            .to_string();
        let has_strings = !wb.strings().is_empty();
        let sst_part = source
            .and_then(|s| s.shared_strings_part())
            .unwrap_or(package::SHARED_STRINGS)
            .to_string();
        let calc_chain = source.and_then(|src| {
            src.workbook_rels()
                .find_type(rel_type::CALC_CHAIN)
                .map(|r| resolve_target(&workbook_part, &r.target))
        });
        let drop_calc_chain = calc_chain.is_some() && (any_sheet_written || removed_sheet);

        let mut workbook_rels = match source {
            Some(src) => {
                let mut rels = src.workbook_rels().clone();
                rels.retain(|r| {
                    r.rel_type != rel_type::WORKSHEET
                        || r.external
                        || sheets
                            .iter()
                            .any(|s| s.source.is_some() && s.part == resolve_target(&workbook_part, &r.target))
                });
                rels
            }
            None => Relationships::new(),
        };
        for plan in &mut sheets {
            plan.rel_id = match plan.source.and_then(|_| source?.workbook_rel_id(&plan.part)) {
                Some(id) if workbook_rels.contains_id(id) => id.to_string(),
                _ => workbook_rels.add(rel_type::WORKSHEET, relative_target(&workbook_part, &plan.part)),
            };
        }
        if workbook_rels.find_type(rel_type::STYLES).is_none() {
            workbook_rels.add(rel_type::STYLES, relative_target(&workbook_part, &styles_part));
        }
        if has_strings {
            if workbook_rels.find_type(rel_type::SHARED_STRINGS).is_none() {
                workbook_rels.add(
                    rel_type::SHARED_STRINGS,
                    relative_target(&workbook_part, &sst_part),
                );
            }
        } else {
            workbook_rels.remove_type(rel_type::SHARED_STRINGS);
            drop_candidates.push(sst_part.clone());
        }
        if drop_calc_chain {
            workbook_rels.remove_type(rel_type::CALC_CHAIN);
            drop_candidates.extend(calc_chain.clone());
        }
        let workbook_rels_action = changed(
            source.map(|s| s.workbook_rels()),
            &workbook_rels,
            dirty(Part::WorkbookRels),
        );

        // document properties
        let mut root_rels = source
            .map(|s| s.root_rels().clone())
            .unwrap_or_default();
        if root_rels.find_type(rel_type::OFFICE_DOCUMENT).is_none() {
            root_rels.add(rel_type::OFFICE_DOCUMENT, workbook_part.clone());
        }
        let mut doc_props = Vec::new();
        for (kind, rel, default_part) in [
            (Part::CoreProps, rel_type::CORE_PROPS, package::CORE_PROPS),
            (Part::AppProps, rel_type::APP_PROPS, package::APP_PROPS),
            (Part::CustomProps, rel_type::CUSTOM_PROPS, package::CUSTOM_PROPS),
        ] {
            let existing = root_rels
                .find_type(rel)
                .map(|r| resolve_target("", &r.target));
            let empty_custom = kind == Part::CustomProps && wb.custom_properties().is_empty();
            if empty_custom {
                if dirty(kind) {
                    if let Some(part) = existing {
                        root_rels.remove_type(rel);
                        drop_candidates.push(part);
                    }
                }
                continue;
            }
            if !dirty(kind) && existing.is_some() {
                continue;
            }
            let part = match existing {
                Some(part) => part,
                None => {
                    root_rels.add(rel, default_part);
                    default_part.to_string()
                }
            };
            claimed.insert(part.clone());
            doc_props.push((part, kind));
        }
        let root_rels_action = changed(source.map(|s| s.root_rels()), &root_rels, dirty(Part::RootRels));

        // content types
        let mut content_types = source
            .map(|s| s.content_types().clone())
            .unwrap_or_else(ContentTypes::new);
        let dropped: Vec<String> = {
            let mut seen = AHashSet::new();
            drop_candidates
                .into_iter()
                .filter(|p| !claimed.contains(p) && source.is_some_and(|s| s.contains(p)))
                .filter(|p| seen.insert(p.clone()))
                .collect()
        };
        content_types.retain_overrides(|p| !dropped.iter().any(|d| d == p));
        ensure_override(&mut content_types, &workbook_part, content_type::WORKBOOK);
        ensure_override(&mut content_types, &styles_part, content_type::STYLES);
        if has_strings {
            ensure_override(&mut content_types, &sst_part, content_type::SHARED_STRINGS);
        }
        for (ws, plan) in wb.worksheets().zip(&sheets) {
            ensure_override(&mut content_types, &plan.part, content_type::WORKSHEET);
            if let DrawingPlan::Write { part, media, .. } = &plan.drawing {
                ensure_override(&mut content_types, part, content_type::DRAWING);
                for (name, image) in media.iter().zip(ws.images()) {
                    let format = image.format();
                    if content_types.content_type_of(name).is_none() {
                        content_types.add_default(format.extension(), format.content_type());
                    }
                }
            }
        }
        for (part, kind) in &doc_props {
            let ct = match kind {
                Part::CoreProps => content_type::CORE_PROPS,
                Part::AppProps => content_type::APP_PROPS,
                _ => content_type::CUSTOM_PROPS,
            };
            ensure_override(&mut content_types, part, ct);
        }
        let content_types_action = changed(
            source.map(|s| s.content_types()),
            &content_types,
            dirty(Part::ContentTypes),
        );

        let copy_or_write = |part: Part, name: &str| {
            if !dirty(part) && source.is_some_and(|s| s.contains(name)) {
                Action::Copy
            } else {
                Action::Write
            }
        };
        let workbook_action = copy_or_write(Part::Workbook, &workbook_part);
        let styles_action = copy_or_write(Part::Styles, &styles_part);
        let shared_strings = has_strings.then(|| {
            let action = copy_or_write(Part::SharedStrings, &sst_part);
            (sst_part.clone(), action)
        });

        for name in [
            package::CONTENT_TYPES.to_string(),
            package::ROOT_RELS.to_string(),
            rels_path_for(&workbook_part),
            workbook_part.clone(),
            styles_part.clone(),
            sst_part.clone(),
        ] {
            claimed.insert(name);
        }
        let passthrough = source
            .map(|src| {
                src.entries()
                    .iter()
                    .filter(|e| !e.ends_with('/'))
                    .filter(|e| !claimed.contains(*e) && !dropped.contains(e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(Plan {
            content_types,
            content_types_action,
            root_rels,
            root_rels_action,
            workbook_part,
            workbook_action,
            workbook_rels,
            workbook_rels_action,
            styles_part,
            styles_action,
            shared_strings,
            sheets,
            doc_props,
            passthrough,
            dropped,
        })
    }

    fn emit<W: Write>(
        &self,
        wb: &Workbook,
        source: Option<&SourcePackage>,
        out: &mut Emitter<'_, W>,
    ) -> XlsxResult<()> {
        write_or_copy(out, package::CONTENT_TYPES, self.content_types_action, || {
            self.content_types.to_bytes()
        })?;
        write_or_copy(out, package::ROOT_RELS, self.root_rels_action, || self.root_rels.to_bytes())?;

        write_or_copy(out, &self.workbook_part, self.workbook_action, || {
            let entries: Vec<SheetEntry<'_>> = wb
                .worksheets()
                .zip(&self.sheets)
                .enumerate()
                .map(|(i, (ws, plan))| SheetEntry {
                    name: ws.name(),
                    sheet_id: i as u32 + 1,
                    rel_id: &plan.rel_id,
                    visibility: ws.visibility(),
                })
                .collect();
            let root_attrs = source.map(|s| s.workbook_root_attrs()).unwrap_or(&[]);
            write_workbook(wb, &entries, root_attrs, Vec::with_capacity(2048))
        })?;
        write_or_copy(
            out,
            &rels_path_for(&self.workbook_part),
            self.workbook_rels_action,
            || self.workbook_rels.to_bytes(),
        )?;

        write_or_copy(out, &self.styles_part, self.styles_action, || {
            let styles = wb.styles();
            match styles.copied_styles() {
                Some(copied) if styles.matches_source() => Ok(copied.part.clone()),
                _ => write_styles(styles, Vec::with_capacity(8192)),
            }
        })?;

        if let Some((part, action)) = &self.shared_strings {
            write_or_copy(out, part, *action, || {
                let refs: u64 = wb.worksheets().map(string_refs).sum();
                write_shared_strings(wb.strings(), refs, Vec::with_capacity(wb.strings().len() * 16))
            })?;
        }

        let options = wb.options();
        for (i, (ws, plan)) in wb.worksheets().zip(&self.sheets).enumerate() {
            match plan.action {
                Action::Copy => out.copy(&plan.part)?,
                Action::Write => {
                    let ctx = SheetWriteContext {
                        sheet: ws,
                        selected: i == wb.active_sheet(),
                        drawing_rel_id: plan.drawing_rel_id.as_deref(),
                        root_attrs: plan.source.map(|s| s.root_attrs.as_slice()).unwrap_or(&[]),
                        row_flush: options.streaming.then_some(options.row_buffer_size.max(1)),
                    };
                    let stats = if options.streaming {
                        out.zip.start_entry(&plan.part, None)?;
                        let (_, stats) = write_worksheet(&ctx, out.zip.entry_sink())?;
                        out.zip.finish_entry()?;
                        log::debug!("save: streamed {} ({} rows)", plan.part, stats.rows);
                        out.report.regenerated.push(plan.part.clone());
                        stats
                    } else {
                        let (buf, stats) = write_worksheet(&ctx, Vec::with_capacity(ws.cell_count() * 32 + 1024))?;
                        out.put(&plan.part, &buf)?;
                        stats
                    };
                    out.report.cells += stats.cells;
                }
            }
            if let Some(action) = plan.rels_action {
                write_or_copy(out, &rels_path_for(&plan.part), action, || plan.rels.to_bytes())?;
            }
        }

        let mut media_queue: Vec<(&str, &[u8])> = Vec::new();
        let mut media_copies: Vec<&str> = Vec::new();
        for (ws, plan) in wb.worksheets().zip(&self.sheets) {
            match &plan.drawing {
                DrawingPlan::None => {}
                DrawingPlan::Copy { part, media } => {
                    out.copy(part)?;
                    let rels = rels_path_for(part);
                    if out.source_has(&rels) {
                        out.copy(&rels)?;
                    }
                    media_copies.extend(media.iter().map(String::as_str).filter(|m| out.source_has(m)));
                }
                DrawingPlan::Write { part, rels, media } => {
                    let pictures: Vec<_> = ws
                        .images()
                        .iter()
                        .zip(rels.iter())
                        .map(|(image, rel)| (image, rel.id.as_str()))
                        .collect();
                    let xml = write_drawing(&pictures, Vec::with_capacity(1024 * pictures.len().max(1)))?;
                    out.put(part, &xml)?;
                    out.put(&rels_path_for(part), &rels.to_bytes()?)?;
                    media_queue.extend(
                        media
                            .iter()
                            .map(String::as_str)
                            .zip(ws.images().iter().map(|img| img.data())),
                    );
                }
            }
        }
        let mut media_done: AHashSet<&str> = AHashSet::new();
        for name in media_copies {
            if media_done.insert(name) {
                out.copy(name)?;
            }
        }
        for (name, data) in media_queue {
            if media_done.insert(name) {
                out.put(name, data)?;
            }
        }

        for (part, kind) in &self.doc_props {
            let bytes = match kind {
                Part::CoreProps => write_core(wb.properties(), Vec::with_capacity(1024))?,
                Part::AppProps => write_app(wb.properties(), &wb.sheet_names(), Vec::with_capacity(1024))?,
                _ => write_custom(wb.custom_properties(), Vec::with_capacity(1024))?,
            };
            out.put(part, &bytes)?;
        }

        for name in &self.passthrough {
            out.copy(name)?;
        }
        Ok(())
    }
}

fn plan_sheet<'a, D>(
    index: usize,
    ws: &Worksheet,
    part: String,
    existing: Option<&'a SourceSheet>,
    dirty: &D,
    taken: &mut AHashSet<String>,
    drop_candidates: &mut Vec<String>,
) -> SheetPlan<'a>
where
    D: Fn(Part) -> bool,
{
    let mut rels = existing.map(|s| s.rels.clone()).unwrap_or_default();
    let source_drawing = existing.and_then(|s| s.drawing.as_ref());
    let drawing_dirty = existing.is_none() || dirty(Part::Drawing(index));
    let images = ws.images();

    let drawing = if !drawing_dirty && source_drawing.is_some() {
        match (source_drawing, existing) {
            (Some(d), Some(s)) => DrawingPlan::Copy {
                part: d.clone(),
                media: s.media.clone(),
            },
            _ => DrawingPlan::None,
        }
    } else if images.is_empty() {
        if let (Some(d), Some(s)) = (source_drawing, existing) {
            drop_candidates.push(d.clone());
            drop_candidates.push(rels_path_for(d));
            drop_candidates.extend(s.media.iter().cloned());
        }
        DrawingPlan::None
    } else {
        let part = match source_drawing {
            Some(d) => d.clone(),
            None => next_free_name("xl/drawings/drawing", ".xml", |n| taken.contains(n)),
        };
        taken.insert(part.clone());
        if let Some(s) = existing {
            drop_candidates.extend(s.media.iter().cloned());
        }
        let mut drawing_rels = Relationships::new();
        let mut media = Vec::with_capacity(images.len());
        for image in images {
            let suffix = format!(".{}", image.format().extension());
            let name = next_free_name("xl/media/image", &suffix, |n| taken.contains(n));
            taken.insert(name.clone());
            drawing_rels.add(rel_type::IMAGE, relative_target(&part, &name));
            media.push(name);
        }
        DrawingPlan::Write {
            part,
            rels: drawing_rels,
            media,
        }
    };

    let old_drawing_id = existing.and_then(|s| s.drawing_rel_id.clone());
    let drawing_rel_id = match &drawing {
        DrawingPlan::None => {
            if let Some(id) = &old_drawing_id {
                rels.retain(|r| &r.id != id);
            }
            None
        }
        DrawingPlan::Copy { .. } => old_drawing_id.clone(),
        DrawingPlan::Write { part: d, .. } => match &old_drawing_id {
            Some(id) if rels.contains_id(id) => Some(id.clone()),
            _ => Some(rels.add(rel_type::DRAWING, relative_target(&part, d))),
        },
    };

    let action = if existing.is_none() || dirty(Part::Sheet(index)) || drawing_rel_id != old_drawing_id {
        Action::Write
    } else {
        Action::Copy
    };
    let rels_part = rels_path_for(&part);
    let rels_action = if rels.is_empty() {
        if existing.is_some() {
            drop_candidates.push(rels_part);
        }
        None
    } else {
        Some(changed(existing.map(|s| &s.rels), &rels, dirty(Part::SheetRels(index))))
    };

    SheetPlan {
        part,
        rel_id: String::new(),
        source: existing,
        action,
        rels,
        rels_action,
        drawing_rel_id,
        drawing,
    }
}

/// Copy when the model equals the source one and nothing marked it dirty
fn changed<T: PartialEq>(source: Option<&T>, model: &T, dirty: bool) -> Action {
    match source {
        Some(src) if !dirty && src == model => Action::Copy,
        _ => Action::Write,
    }
}

/// Declare `part` unless the package already types it explicitly
fn ensure_override(types: &mut ContentTypes, part: &str, content_type: &str) {
    if !types.overrides().any(|(p, _)| p == part) {
        types.add_override(part, content_type);
    }
}

fn write_or_copy<W, F>(out: &mut Emitter<'_, W>, name: &str, action: Action, render: F) -> XlsxResult<()>
where
    W: Write,
    F: FnOnce() -> XlsxResult<Vec<u8>>,
{
    match action {
        Action::Copy if out.source_has(name) => out.copy(name),
        _ => {
            let bytes = render()?;
            out.put(name, &bytes)
        }
    }
}

/// Cells of `ws` that point into the shared string table
fn string_refs(ws: &Worksheet) -> u64 {
    ws.iter_cells()
        .filter(|(_, _, cell)| matches!(cell.value, CellValue::SharedString(_)))
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use brisk_sheets_core::{Image, WorkbookOptions};
    use pretty_assertions::assert_eq;

    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89,
    ];

    fn sample() -> Workbook {
        let mut wb = Workbook::new();
        let mut sheet = wb.add_sheet("Data").unwrap();
        sheet.set_value("A1", "Hello").unwrap();
        sheet.set_value("B1", 42.0).unwrap();
        wb
    }

    fn read_entry(bytes: &[u8], name: &str) -> String {
        let archive = ZipArchive::new(bytes).unwrap();
        String::from_utf8(archive.read(name).unwrap()).unwrap()
    }

    #[test]
    fn test_create_mode_layout() {
        let (bytes, report) = XlsxWriter::new(&sample()).to_bytes().unwrap();
        let archive = ZipArchive::new(&bytes).unwrap();
        let names: Vec<&str> = archive.names().collect();
        assert_eq!(
            names,
            vec![
                "[Content_Types].xml",
                "_rels/.rels",
                "xl/workbook.xml",
                "xl/_rels/workbook.xml.rels",
                "xl/styles.xml",
                "xl/sharedStrings.xml",
                "xl/worksheets/sheet1.xml",
                "docProps/core.xml",
                "docProps/app.xml",
            ]
        );
        assert!(report.copied.is_empty());
        assert_eq!(report.sheet_parts, vec!["xl/worksheets/sheet1.xml".to_string()]);
        assert_eq!(report.cells, 2);
        assert_eq!(report.entries, 9);

        let rels = read_entry(&bytes, "xl/_rels/workbook.xml.rels");
        assert!(rels.contains(r#"Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml""#));
        let types = read_entry(&bytes, "[Content_Types].xml");
        assert!(types.contains(r#"<Override PartName="/xl/worksheets/sheet1.xml""#));
        assert!(types.contains(r#"<Override PartName="/xl/sharedStrings.xml""#));
        let sst = read_entry(&bytes, "xl/sharedStrings.xml");
        assert!(sst.contains(r#"count="1" uniqueCount="1""#));
    }

    #[test]
    fn test_no_strings_omits_sst() {
        let mut wb = Workbook::new();
        wb.add_sheet("Numbers").unwrap().set_value("A1", 1.0).unwrap();
        let (bytes, _) = XlsxWriter::new(&wb).to_bytes().unwrap();
        let archive = ZipArchive::new(&bytes).unwrap();
        assert!(!archive.contains("xl/sharedStrings.xml"));
        assert!(!read_entry(&bytes, "[Content_Types].xml").contains("sharedStrings"));
        assert!(!read_entry(&bytes, "xl/_rels/workbook.xml.rels").contains("sharedStrings"));
    }

    #[test]
    fn test_empty_workbook_is_rejected() {
        let err = XlsxWriter::new(&Workbook::new()).to_bytes().unwrap_err();
        assert_eq!(err.kind(), brisk_sheets_core::ErrorKind::InvalidState);
    }

    #[test]
    fn test_save_twice_identical() {
        let wb = sample();
        let (a, _) = XlsxWriter::new(&wb).to_bytes().unwrap();
        let (b, _) = XlsxWriter::new(&wb).to_bytes().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_streaming_parts_match_buffered() {
        let mut wb = Workbook::new();
        {
            let mut sheet = wb.add_sheet("Rows").unwrap();
            for r in 0..300u32 {
                sheet.set_value((r, 0), f64::from(r)).unwrap();
                sheet.set_value((r, 1), format!("row {}", r % 7)).unwrap();
            }
        }
        let (buffered, _) = XlsxWriter::new(&wb).to_bytes().unwrap();
        wb.set_options(WorkbookOptions::default().with_streaming(true).with_row_buffer_size(50));
        let (streamed, _) = XlsxWriter::new(&wb).to_bytes().unwrap();
        let a = ZipArchive::new(&buffered).unwrap();
        let b = ZipArchive::new(&streamed).unwrap();
        for name in a.names() {
            assert_eq!(a.read(name).unwrap(), b.read(name).unwrap(), "{}", name);
        }
    }

    #[test]
    fn test_images_become_drawing_and_media() {
        let mut wb = sample();
        let image = Image::from_bytes(PNG_1X1.to_vec()).unwrap();
        wb.sheet_mut("Data")
            .unwrap()
            .insert_image("B3", image)
            .unwrap();
        let (bytes, _) = XlsxWriter::new(&wb).to_bytes().unwrap();
        let archive = ZipArchive::new(&bytes).unwrap();
        assert!(archive.contains("xl/drawings/drawing1.xml"));
        assert!(archive.contains("xl/drawings/_rels/drawing1.xml.rels"));
        assert_eq!(archive.read("xl/media/image1.png").unwrap(), PNG_1X1);
        let sheet_rels = read_entry(&bytes, "xl/worksheets/_rels/sheet1.xml.rels");
        assert!(sheet_rels.contains(r#"Target="../drawings/drawing1.xml""#));
        assert!(read_entry(&bytes, "xl/worksheets/sheet1.xml").contains(r#"<drawing r:id="rId1"/>"#));
        let types = read_entry(&bytes, "[Content_Types].xml");
        assert!(types.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        assert!(types.contains(r#"<Override PartName="/xl/drawings/drawing1.xml""#));
    }

    #[test]
    fn test_atomic_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        std::fs::write(&path, b"previous").unwrap();

        // a failing save leaves the old file alone
        assert!(XlsxWriter::new(&Workbook::new()).write_file(&path).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"previous");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let report = XlsxWriter::new(&sample()).write_file(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, report.bytes_written);
        assert!(ZipArchive::new(&bytes).unwrap().contains("xl/workbook.xml"));
    }
}
