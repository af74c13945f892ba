//! Package layout: well-known part names, content types, relationship
//! types, path arithmetic, and the index of a source package opened for
//! edit.

use std::collections::BTreeMap;

use crate::archive::ZipArchive;
use crate::error::{XlsxError, XlsxResult};
use crate::parts::content_types::ContentTypes;
use crate::parts::relationships::Relationships;

pub const CONTENT_TYPES: &str = "[Content_Types].xml";
pub const ROOT_RELS: &str = "_rels/.rels";
pub const WORKBOOK: &str = "xl/workbook.xml";
pub const STYLES: &str = "xl/styles.xml";
pub const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
pub const CALC_CHAIN: &str = "xl/calcChain.xml";
pub const CORE_PROPS: &str = "docProps/core.xml";
pub const APP_PROPS: &str = "docProps/app.xml";
pub const CUSTOM_PROPS: &str = "docProps/custom.xml";

/// Content types of the parts this crate writes
pub mod content_type {
    pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
    pub const XML: &str = "application/xml";
    pub const WORKBOOK: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
    pub const WORKSHEET: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
    pub const STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
    pub const SHARED_STRINGS: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
    pub const CALC_CHAIN: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml";
    pub const DRAWING: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";
    pub const CORE_PROPS: &str = "application/vnd.openxmlformats-package.core-properties+xml";
    pub const APP_PROPS: &str =
        "application/vnd.openxmlformats-officedocument.extended-properties+xml";
    pub const CUSTOM_PROPS: &str =
        "application/vnd.openxmlformats-officedocument.custom-properties+xml";
}

/// Relationship types
pub mod rel_type {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const WORKSHEET: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
    pub const STYLES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
    pub const SHARED_STRINGS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
    pub const CALC_CHAIN: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain";
    pub const DRAWING: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    pub const CORE_PROPS: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
    pub const APP_PROPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
    pub const CUSTOM_PROPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/custom-properties";
}

/// `xl/worksheets/sheet3.xml` -> `xl/worksheets/_rels/sheet3.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that owns the rels.
///
/// Absolute targets (`/xl/media/a.png`) lose the leading slash; relative
/// ones are joined to the owner's directory with `..` segments collapsed.
pub fn resolve_target(owner: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut segments: Vec<&str> = match owner.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Target of `to` as written in the rels of `from`
pub fn relative_target(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = match from.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let to_segments: Vec<&str> = to.split('/').collect();
    let common = from_dir
        .iter()
        .zip(&to_segments)
        .take_while(|(a, b)| a == b)
        .count();
    let mut out = String::with_capacity(to.len() + 8);
    for _ in common..from_dir.len() {
        out.push_str("../");
    }
    out.push_str(&to_segments[common..].join("/"));
    out
}

/// First `{prefix}{n}{suffix}` with n >= 1 not taken
pub fn next_free_name<F>(prefix: &str, suffix: &str, taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let mut n = 1usize;
    loop {
        let name = format!("{}{}{}", prefix, n, suffix);
        if !taken(&name) {
            return name;
        }
        n += 1;
    }
}

/// What a source worksheet part owns in the package
#[derive(Debug, Clone, Default)]
pub struct SourceSheet {
    /// Worksheet part path
    pub part: String,
    /// Its relationships, empty when the sheet had no rels part
    pub rels: Relationships,
    /// Drawing part, when the sheet had one
    pub drawing: Option<String>,
    /// Relationship id of the drawing in the sheet rels
    pub drawing_rel_id: Option<String>,
    /// Media parts the drawing links to
    pub media: Vec<String>,
    /// Extra root attributes of the worksheet element
    pub root_attrs: Vec<(String, String)>,
}

impl SourceSheet {
    pub fn rels_part(&self) -> String {
        rels_path_for(&self.part)
    }

    /// Every part that belongs to this sheet alone
    pub fn owned_parts(&self) -> Vec<String> {
        let mut parts = vec![self.part.clone(), self.rels_part()];
        if let Some(drawing) = &self.drawing {
            parts.push(drawing.clone());
            parts.push(rels_path_for(drawing));
        }
        parts
    }
}

/// A package opened for edit: the file bytes plus what the loader learned
/// about their layout. The bytes stay in memory so that saving over the
/// source path never reads from a file being replaced.
#[derive(Debug, Clone)]
pub struct SourcePackage {
    bytes: Vec<u8>,
    /// Entry names in archive order
    entries: Vec<String>,
    content_types: ContentTypes,
    /// Root relationships as loaded
    root_rels: Relationships,
    /// Workbook part path, found through the root rels
    workbook_part: String,
    /// Workbook relationships as loaded
    workbook_rels: Relationships,
    workbook_root_attrs: Vec<(String, String)>,
    styles_part: Option<String>,
    shared_strings_part: Option<String>,
    /// Worksheet part path -> ownership
    sheets: BTreeMap<String, SourceSheet>,
}

impl SourcePackage {
    /// Wrap package bytes without looking past the central directory; fails
    /// when the bytes are not a readable ZIP
    pub fn new(bytes: Vec<u8>) -> XlsxResult<Self> {
        let entries = ZipArchive::new(&bytes)?
            .names()
            .map(str::to_string)
            .collect();
        Ok(Self {
            bytes,
            entries,
            content_types: ContentTypes::new(),
            root_rels: Relationships::default(),
            workbook_part: WORKBOOK.to_string(),
            workbook_rels: Relationships::default(),
            workbook_root_attrs: Vec::new(),
            styles_part: None,
            shared_strings_part: None,
            sheets: BTreeMap::new(),
        })
    }

    /// Wrap package bytes and learn their layout: content types, the
    /// relationship graph from the root down to drawings and media.
    ///
    /// Only relationship and content-type parts are parsed; cell data is
    /// left alone.
    pub fn index(bytes: Vec<u8>) -> XlsxResult<Self> {
        let mut pkg = Self::new(bytes)?;
        let archive = pkg.archive()?;
        if !archive.contains(CONTENT_TYPES) {
            return Err(XlsxError::MissingPart(CONTENT_TYPES.to_string()));
        }
        let content_types = ContentTypes::parse(&archive.read(CONTENT_TYPES)?)?;

        let root_rels = read_rels(&archive, ROOT_RELS)?;
        let workbook_part = root_rels
            .find_type(rel_type::OFFICE_DOCUMENT)
            .map(|r| resolve_target("", &r.target))
            .unwrap_or_else(|| WORKBOOK.to_string());
        if !archive.contains(&workbook_part) {
            return Err(XlsxError::MissingPart(workbook_part));
        }

        let workbook_rels = read_rels(&archive, &rels_path_for(&workbook_part))?;
        let internal = |rel_type: &str| {
            workbook_rels
                .iter()
                .find(|r| r.rel_type == rel_type && !r.external)
                .map(|r| resolve_target(&workbook_part, &r.target))
                .filter(|p| archive.contains(p))
        };
        let styles_part = internal(rel_type::STYLES);
        let shared_strings_part = internal(rel_type::SHARED_STRINGS);

        let mut sheets = BTreeMap::new();
        for rel in workbook_rels
            .iter()
            .filter(|r| r.rel_type == rel_type::WORKSHEET && !r.external)
        {
            let part = resolve_target(&workbook_part, &rel.target);
            if !archive.contains(&part) {
                continue;
            }
            let sheet = index_sheet(&archive, part)?;
            sheets.insert(sheet.part.clone(), sheet);
        }
        drop(archive);

        pkg.content_types = content_types;
        pkg.root_rels = root_rels;
        pkg.workbook_part = workbook_part;
        pkg.workbook_rels = workbook_rels;
        pkg.styles_part = styles_part;
        pkg.shared_strings_part = shared_strings_part;
        pkg.sheets = sheets;
        Ok(pkg)
    }

    /// Index `bytes`, a package just saved from this one, carrying over the
    /// root attributes learned when this package was parsed
    pub fn successor(&self, bytes: Vec<u8>) -> XlsxResult<Self> {
        let mut next = Self::index(bytes)?;
        next.workbook_root_attrs = self.workbook_root_attrs.clone();
        for (part, sheet) in &mut next.sheets {
            if let Some(old) = self.sheets.get(part) {
                sheet.root_attrs = old.root_attrs.clone();
            }
        }
        Ok(next)
    }

    /// The archive over the package bytes
    pub fn archive(&self) -> XlsxResult<ZipArchive<'_>> {
        ZipArchive::new(&self.bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e == name)
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    pub fn workbook_part(&self) -> &str {
        &self.workbook_part
    }

    pub fn styles_part(&self) -> Option<&str> {
        self.styles_part.as_deref()
    }

    pub fn shared_strings_part(&self) -> Option<&str> {
        self.shared_strings_part.as_deref()
    }

    pub fn workbook_root_attrs(&self) -> &[(String, String)] {
        &self.workbook_root_attrs
    }

    pub fn set_workbook_root_attrs(&mut self, attrs: Vec<(String, String)>) {
        self.workbook_root_attrs = attrs;
    }

    pub fn sheet(&self, part: &str) -> Option<&SourceSheet> {
        self.sheets.get(part)
    }

    pub fn sheet_mut(&mut self, part: &str) -> Option<&mut SourceSheet> {
        self.sheets.get_mut(part)
    }

    pub fn sheets(&self) -> impl Iterator<Item = &SourceSheet> {
        self.sheets.values()
    }

    pub fn add_sheet(&mut self, sheet: SourceSheet) {
        self.sheets.insert(sheet.part.clone(), sheet);
    }

    pub fn workbook_rels(&self) -> &Relationships {
        &self.workbook_rels
    }

    pub fn set_workbook_rels(&mut self, rels: Relationships) {
        self.workbook_rels = rels;
    }

    pub fn root_rels(&self) -> &Relationships {
        &self.root_rels
    }

    pub fn set_root_rels(&mut self, rels: Relationships) {
        self.root_rels = rels;
    }

    /// Relationship id under which the workbook links `part`
    pub fn workbook_rel_id(&self, part: &str) -> Option<&str> {
        self.workbook_rels
            .iter()
            .find(|r| !r.external && resolve_target(&self.workbook_part, &r.target) == part)
            .map(|r| r.id.as_str())
    }

    /// Read a whole entry; a missing entry is `MissingPart`
    pub fn read(&self, name: &str) -> XlsxResult<Vec<u8>> {
        let archive = self.archive()?;
        if !archive.contains(name) {
            return Err(XlsxError::MissingPart(name.to_string()));
        }
        archive.read(name)
    }
}

/// Relationships of a rels part; an absent part has none
fn read_rels(archive: &ZipArchive<'_>, name: &str) -> XlsxResult<Relationships> {
    if archive.contains(name) {
        Relationships::parse(name, &archive.read(name)?)
    } else {
        Ok(Relationships::new())
    }
}

fn index_sheet(archive: &ZipArchive<'_>, part: String) -> XlsxResult<SourceSheet> {
    let rels = read_rels(archive, &rels_path_for(&part))?;
    let mut sheet = SourceSheet {
        part,
        rels,
        ..SourceSheet::default()
    };
    let drawing = sheet
        .rels
        .iter()
        .find(|r| r.rel_type == rel_type::DRAWING && !r.external)
        .map(|r| (r.id.clone(), resolve_target(&sheet.part, &r.target)))
        .filter(|(_, target)| archive.contains(target));
    if let Some((id, drawing)) = drawing {
        let drawing_rels = read_rels(archive, &rels_path_for(&drawing))?;
        sheet.media = drawing_rels
            .iter()
            .filter(|r| r.rel_type == rel_type::IMAGE && !r.external)
            .map(|r| resolve_target(&drawing, &r.target))
            .collect();
        sheet.drawing_rel_id = Some(id);
        sheet.drawing = Some(drawing);
    }
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rels_path_for() {
        assert_eq!(
            rels_path_for("xl/worksheets/sheet3.xml"),
            "xl/worksheets/_rels/sheet3.xml.rels"
        );
        assert_eq!(rels_path_for("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(rels_path_for("root.xml"), "_rels/root.xml.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("xl/workbook.xml", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            resolve_target("xl/drawings/drawing1.xml", "../media/image1.png"),
            "xl/media/image1.png"
        );
        assert_eq!(
            resolve_target("xl/workbook.xml", "/xl/worksheets/sheet2.xml"),
            "xl/worksheets/sheet2.xml"
        );
        assert_eq!(resolve_target("", "xl/workbook.xml"), "xl/workbook.xml");
    }

    #[test]
    fn test_relative_target() {
        assert_eq!(
            relative_target("xl/workbook.xml", "xl/worksheets/sheet1.xml"),
            "worksheets/sheet1.xml"
        );
        assert_eq!(
            relative_target("xl/worksheets/sheet1.xml", "xl/drawings/drawing1.xml"),
            "../drawings/drawing1.xml"
        );
        assert_eq!(relative_target("", "xl/workbook.xml"), "xl/workbook.xml");
        for (from, to) in [
            ("xl/drawings/drawing2.xml", "xl/media/image9.jpeg"),
            ("xl/workbook.xml", "xl/styles.xml"),
        ] {
            assert_eq!(resolve_target(from, &relative_target(from, to)), to);
        }
    }

    #[test]
    fn test_next_free_name() {
        let taken = ["xl/media/image1.png", "xl/media/image2.png"];
        let name = next_free_name("xl/media/image", ".png", |n| taken.contains(&n));
        assert_eq!(name, "xl/media/image3.png");
    }

    #[test]
    fn test_source_package_rejects_garbage() {
        let err = SourcePackage::new(b"definitely not a zip".to_vec()).unwrap_err();
        assert_eq!(err.kind(), brisk_sheets_core::ErrorKind::Archive);
    }
}
