//! `xl/styles.xml`
//!
//! The repository holds complete descriptors; the styles part wants them
//! split into shared sub-tables (number formats, fonts, fills, borders)
//! referenced by index from each `xf` record. Writing builds those tables
//! with a dedupe map per kind; reading reverses the split.

use std::io::Write;

use ahash::AHashMap;
use brisk_sheets_core::style::{
    rotation_from_wire, rotation_to_wire, Alignment, Border, BorderEdge, BorderLineStyle, Color,
    CopiedStyles, Fill, Font, FontScheme, FontScript, FormatDescriptor, FormatRepository,
    HorizontalAlignment, NumberFormat, PatternType, Protection, ReadingOrder, StyleBuilder,
    Underline, VerticalAlignment, FIRST_CUSTOM_FORMAT_ID,
};
use quick_xml::events::BytesStart;

use crate::error::XlsxResult;
use crate::parts::{parse_color, write_color, write_extra_root_attrs};
use crate::xml::reader::{
    attr, attr_bool, attr_f64, attr_u32, parse_part, qualified_attrs, Flow, PartHandler,
};
use crate::xml::{ns, XmlWriter};

/// Top-level children the codec rebuilds from the model
const MODELED: &[&str] = &["numFmts", "fonts", "fills", "borders", "cellStyleXfs", "cellXfs"];

/// Sub-table indices of one `xf` record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct XfIds {
    num_fmt: u16,
    font: u32,
    fill: u32,
    border: u32,
}

/// Deduplicated sub-tables for a set of descriptors
struct StyleTables<'a> {
    num_fmts: Vec<(u16, &'a str)>,
    num_fmt_ids: AHashMap<&'a str, u16>,
    fonts: Vec<&'a Font>,
    font_ids: AHashMap<&'a Font, u32>,
    fills: Vec<&'a Fill>,
    fill_ids: AHashMap<&'a Fill, u32>,
    borders: Vec<&'a Border>,
    border_ids: AHashMap<&'a Border, u32>,
}

impl<'a> StyleTables<'a> {
    fn new(default_fill: &'a Fill, gray125: &'a Fill, default_border: &'a Border) -> Self {
        let mut tables = Self {
            num_fmts: Vec::new(),
            num_fmt_ids: AHashMap::new(),
            fonts: Vec::new(),
            font_ids: AHashMap::new(),
            fills: Vec::new(),
            fill_ids: AHashMap::new(),
            borders: Vec::new(),
            border_ids: AHashMap::new(),
        };
        // Consumers expect fills 0 and 1 to be none and gray125
        tables.fill(default_fill);
        tables.fill(gray125);
        tables.border(default_border);
        tables
    }

    fn fill(&mut self, fill: &'a Fill) -> u32 {
        if let Some(&id) = self.fill_ids.get(fill) {
            return id;
        }
        let id = self.fills.len() as u32;
        self.fills.push(fill);
        self.fill_ids.insert(fill, id);
        id
    }

    fn font(&mut self, font: &'a Font) -> u32 {
        if let Some(&id) = self.font_ids.get(font) {
            return id;
        }
        let id = self.fonts.len() as u32;
        self.fonts.push(font);
        self.font_ids.insert(font, id);
        id
    }

    fn border(&mut self, border: &'a Border) -> u32 {
        if let Some(&id) = self.border_ids.get(border) {
            return id;
        }
        let id = self.borders.len() as u32;
        self.borders.push(border);
        self.border_ids.insert(border, id);
        id
    }

    fn num_fmt(&mut self, format: &'a NumberFormat) -> u16 {
        match format {
            NumberFormat::BuiltIn(id) => *id,
            NumberFormat::Custom(code) => {
                if let Some(&id) = self.num_fmt_ids.get(code.as_str()) {
                    return id;
                }
                let id = FIRST_CUSTOM_FORMAT_ID + self.num_fmts.len() as u16;
                self.num_fmts.push((id, code));
                self.num_fmt_ids.insert(code, id);
                id
            }
        }
    }

    fn register(&mut self, descriptor: &'a FormatDescriptor) -> XfIds {
        XfIds {
            num_fmt: self.num_fmt(descriptor.number_format()),
            font: self.font(descriptor.font()),
            fill: self.fill(descriptor.fill()),
            border: self.border(descriptor.border()),
        }
    }
}

/// Write a normalized styles part for every descriptor in `repo`, in id
/// order. Source fragments kept by an edit-mode load (`cellStyles`,
/// `dxfs`, ...) are re-emitted; the source's named-style records are
/// re-indexed against the new sub-tables.
pub fn write_styles<W: Write>(repo: &FormatRepository, sink: W) -> XlsxResult<W> {
    let source = match repo.copied_styles() {
        Some(copied) => Some(parse_styles(crate::package::STYLES, &copied.part)?),
        None => None,
    };
    let default_style_xf = [FormatDescriptor::default()];
    let style_xfs: &[FormatDescriptor] = match &source {
        Some(parsed) if !parsed.style_xfs.is_empty() => &parsed.style_xfs,
        _ => &default_style_xf,
    };

    let default_fill = Fill::default();
    let gray125 = Fill::gray125();
    let default_border = Border::default();
    let mut tables = StyleTables::new(&default_fill, &gray125, &default_border);
    let cell_ids: Vec<(XfIds, &FormatDescriptor)> = repo
        .iter()
        .map(|(_, d)| (tables.register(d), d))
        .collect();
    let style_ids: Vec<(XfIds, &FormatDescriptor)> =
        style_xfs.iter().map(|d| (tables.register(d), d)).collect();

    let mut xml = XmlWriter::new(sink);
    xml.declaration();
    xml.start("styleSheet").attr_raw("xmlns", ns::MAIN);
    if let Some(parsed) = &source {
        write_extra_root_attrs(&mut xml, &parsed.root_attrs, &["xmlns"]);
    }

    if !tables.num_fmts.is_empty() {
        xml.start("numFmts").attr_int("count", tables.num_fmts.len());
        for (id, code) in &tables.num_fmts {
            xml.start("numFmt")
                .attr_int("numFmtId", *id)
                .attr("formatCode", code)
                .end();
        }
        xml.end();
    }

    xml.start("fonts").attr_int("count", tables.fonts.len());
    for font in &tables.fonts {
        write_font(&mut xml, font);
    }
    xml.end();

    xml.start("fills").attr_int("count", tables.fills.len());
    for fill in &tables.fills {
        write_fill(&mut xml, fill);
    }
    xml.end();

    xml.start("borders").attr_int("count", tables.borders.len());
    for border in &tables.borders {
        write_border(&mut xml, border);
    }
    xml.end();

    xml.start("cellStyleXfs").attr_int("count", style_ids.len());
    for (ids, descriptor) in &style_ids {
        write_xf(&mut xml, *ids, descriptor, false);
    }
    xml.end();

    xml.start("cellXfs").attr_int("count", cell_ids.len());
    for (ids, descriptor) in &cell_ids {
        write_xf(&mut xml, *ids, descriptor, true);
    }
    xml.end();

    let fragment = |name: &str| source.as_ref().and_then(|p| p.fragment(name));
    match fragment("cellStyles") {
        Some(bytes) => {
            xml.raw(bytes);
        }
        None => {
            xml.start("cellStyles").attr_int("count", 1);
            xml.start("cellStyle")
                .attr_raw("name", "Normal")
                .attr_int("xfId", 0)
                .attr_int("builtinId", 0)
                .end();
            xml.end();
        }
    }
    match fragment("dxfs") {
        Some(bytes) => {
            xml.raw(bytes);
        }
        None => {
            xml.start("dxfs").attr_int("count", 0).end();
        }
    }
    match fragment("tableStyles") {
        Some(bytes) => {
            xml.raw(bytes);
        }
        None => {
            xml.start("tableStyles")
                .attr_int("count", 0)
                .attr_raw("defaultTableStyle", "TableStyleMedium2")
                .attr_raw("defaultPivotStyle", "PivotStyleLight16")
                .end();
        }
    }
    for name in ["colors", "extLst"] {
        if let Some(bytes) = fragment(name) {
            xml.raw(bytes);
        }
    }

    xml.end();
    xml.finish()
}

fn write_font<W: Write>(xml: &mut XmlWriter<W>, font: &Font) {
    xml.start("font");
    if font.bold {
        xml.start("b").end();
    }
    if font.italic {
        xml.start("i").end();
    }
    if font.strike {
        xml.start("strike").end();
    }
    match font.underline {
        Underline::None => {}
        Underline::Single => {
            xml.start("u").end();
        }
        other => {
            xml.val_element("u", other.as_str());
        }
    }
    if font.script != FontScript::Baseline {
        xml.val_element("vertAlign", font.script.as_str());
    }
    xml.start("sz").attr_num("val", font.size).end();
    if !font.color.is_auto() {
        write_color(xml, "color", &font.color);
    }
    xml.val_element("name", &font.name);
    if let Some(family) = font.family {
        xml.start("family").attr_int("val", family).end();
    }
    if font.scheme != FontScheme::None {
        xml.val_element("scheme", font.scheme.as_str());
    }
    xml.end();
}

fn write_fill<W: Write>(xml: &mut XmlWriter<W>, fill: &Fill) {
    xml.start("fill").start("patternFill");
    xml.attr_raw("patternType", fill.pattern.as_str());
    if !fill.fg.is_auto() {
        write_color(xml, "fgColor", &fill.fg);
    }
    if !fill.bg.is_auto() {
        write_color(xml, "bgColor", &fill.bg);
    }
    xml.end().end();
}

fn write_border_edge<W: Write>(xml: &mut XmlWriter<W>, tag: &'static str, edge: &BorderEdge) {
    xml.start(tag);
    if !edge.is_none() {
        xml.attr_raw("style", edge.style.as_str());
        write_color(xml, "color", &edge.color);
    }
    xml.end();
}

fn write_border<W: Write>(xml: &mut XmlWriter<W>, border: &Border) {
    xml.start("border")
        .attr_flag("diagonalUp", !border.diagonal_up.is_none())
        .attr_flag("diagonalDown", !border.diagonal_down.is_none());
    write_border_edge(xml, "left", &border.left);
    write_border_edge(xml, "right", &border.right);
    write_border_edge(xml, "top", &border.top);
    write_border_edge(xml, "bottom", &border.bottom);
    write_border_edge(xml, "diagonal", &border.diagonal());
    xml.end();
}

fn write_alignment<W: Write>(xml: &mut XmlWriter<W>, alignment: &Alignment) {
    xml.start("alignment");
    if alignment.horizontal != HorizontalAlignment::General {
        xml.attr_raw("horizontal", alignment.horizontal.as_str());
    }
    if alignment.vertical != VerticalAlignment::Bottom {
        xml.attr_raw("vertical", alignment.vertical.as_str());
    }
    if alignment.rotation != 0 {
        xml.attr_int("textRotation", rotation_to_wire(alignment.rotation));
    }
    xml.attr_flag("wrapText", alignment.wrap);
    if alignment.indent > 0 {
        xml.attr_int("indent", alignment.indent);
    }
    xml.attr_flag("shrinkToFit", alignment.shrink);
    if alignment.reading_order != ReadingOrder::ContextDependent {
        xml.attr_int("readingOrder", alignment.reading_order.code());
    }
    xml.end();
}

fn write_xf<W: Write>(xml: &mut XmlWriter<W>, ids: XfIds, descriptor: &FormatDescriptor, cell_xf: bool) {
    let alignment = descriptor.alignment();
    let protection = descriptor.protection();
    let custom_protection = protection != Protection::default();

    xml.start("xf")
        .attr_int("numFmtId", ids.num_fmt)
        .attr_int("fontId", ids.font)
        .attr_int("fillId", ids.fill)
        .attr_int("borderId", ids.border);
    if cell_xf {
        xml.attr_int("xfId", 0);
        xml.attr_flag("applyNumberFormat", ids.num_fmt != 0)
            .attr_flag("applyFont", ids.font != 0)
            .attr_flag("applyFill", ids.fill != 0)
            .attr_flag("applyBorder", ids.border != 0)
            .attr_flag("applyAlignment", !alignment.is_default())
            .attr_flag("applyProtection", custom_protection);
    }
    if !alignment.is_default() {
        write_alignment(xml, alignment);
    }
    if custom_protection {
        xml.start("protection");
        if !protection.locked {
            xml.attr_raw("locked", "0");
        }
        xml.attr_flag("hidden", protection.hidden).end();
    }
    xml.end();
}

/// Styles recovered from a source part
#[derive(Debug, Clone, Default)]
pub struct ParsedStyles {
    /// `cellXfs` in record order; cell `s` attributes index this
    pub cell_xfs: Vec<FormatDescriptor>,
    /// `cellStyleXfs` in record order
    pub style_xfs: Vec<FormatDescriptor>,
    /// Unmodeled top-level elements by name, in source order
    pub fragments: Vec<(String, Vec<u8>)>,
    pub root_attrs: Vec<(String, String)>,
    /// Records that could not be turned into a valid descriptor
    pub issues: Vec<String>,
}

impl ParsedStyles {
    pub fn fragment(&self, name: &str) -> Option<&[u8]> {
        self.fragments
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.as_slice())
    }

    /// Repository whose ids equal the source `cellXfs` indices
    pub fn into_repository(self, part: Vec<u8>) -> FormatRepository {
        let copied = CopiedStyles {
            part,
            source_len: self.cell_xfs.len() as u32,
            fragments: self.fragments,
        };
        FormatRepository::from_source(self.cell_xfs, Some(copied))
    }
}

pub fn parse_styles(part: &str, xml: &[u8]) -> XlsxResult<ParsedStyles> {
    let mut handler = StylesHandler::default();
    parse_part(part, xml, &mut handler)?;
    Ok(handler.finish())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    NumFmts,
    Fonts,
    Fills,
    Borders,
    StyleXfs,
    CellXfs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Left,
    Right,
    Top,
    Bottom,
    Diagonal,
}

#[derive(Debug, Clone, Default)]
struct RawXf {
    num_fmt: u32,
    font: u32,
    fill: u32,
    border: u32,
    alignment: Alignment,
    protection: Protection,
}

/// A font as read: every field starts unset rather than at the model's
/// default, so what the file omits stays omitted
fn blank_font() -> Font {
    Font {
        name: String::new(),
        size: 11.0,
        bold: false,
        italic: false,
        underline: Underline::None,
        strike: false,
        script: FontScript::Baseline,
        color: Color::Auto,
        family: None,
        scheme: FontScheme::None,
    }
}

struct StylesHandler {
    depth: usize,
    section: Section,
    custom_formats: AHashMap<u32, String>,
    fonts: Vec<Font>,
    fills: Vec<Fill>,
    borders: Vec<Border>,
    style_xfs: Vec<RawXf>,
    cell_xfs: Vec<RawXf>,
    font: Option<Font>,
    fill: Option<Fill>,
    gradient: bool,
    border: Option<Border>,
    diagonal_up: bool,
    diagonal_down: bool,
    edge: Option<Edge>,
    xf: Option<RawXf>,
    fragments: Vec<(String, Vec<u8>)>,
    root_attrs: Vec<(String, String)>,
}

impl Default for StylesHandler {
    fn default() -> Self {
        Self {
            depth: 0,
            section: Section::None,
            custom_formats: AHashMap::new(),
            fonts: Vec::new(),
            fills: Vec::new(),
            borders: Vec::new(),
            style_xfs: Vec::new(),
            cell_xfs: Vec::new(),
            font: None,
            fill: None,
            gradient: false,
            border: None,
            diagonal_up: false,
            diagonal_down: false,
            edge: None,
            xf: None,
            fragments: Vec::new(),
            root_attrs: Vec::new(),
        }
    }
}

impl StylesHandler {
    fn edge_mut(&mut self) -> Option<&mut BorderEdge> {
        let border = self.border.as_mut()?;
        match self.edge? {
            Edge::Left => Some(&mut border.left),
            Edge::Right => Some(&mut border.right),
            Edge::Top => Some(&mut border.top),
            Edge::Bottom => Some(&mut border.bottom),
            Edge::Diagonal => Some(&mut border.diagonal_up),
        }
    }

    fn number_format(&self, id: u32) -> Option<NumberFormat> {
        if id < u32::from(FIRST_CUSTOM_FORMAT_ID) {
            return Some(NumberFormat::BuiltIn(id as u16));
        }
        self.custom_formats
            .get(&id)
            .map(|code| NumberFormat::custom(code.as_str()))
    }

    fn resolve(&self, xf: &RawXf, issues: &mut Vec<String>) -> FormatDescriptor {
        let mut font = self.fonts.get(xf.font as usize).cloned().unwrap_or_default();
        if font.name.is_empty() {
            font.name = Font::default().name;
        }
        if !(Font::MIN_SIZE..=Font::MAX_SIZE).contains(&font.size) {
            font.size = font.size.clamp(Font::MIN_SIZE, Font::MAX_SIZE);
        }
        let number_format = self.number_format(xf.num_fmt).unwrap_or_else(|| {
            issues.push(format!("unknown number format id {}", xf.num_fmt));
            NumberFormat::default()
        });
        let built = StyleBuilder::new()
            .font(font)
            .fill(self.fills.get(xf.fill as usize).cloned().unwrap_or_default())
            .border(self.borders.get(xf.border as usize).cloned().unwrap_or_default())
            .alignment(xf.alignment.clone())
            .number_format(number_format)
            .locked(xf.protection.locked)
            .hidden(xf.protection.hidden)
            .build();
        built.unwrap_or_else(|e| {
            issues.push(format!("style record replaced by the default: {}", e));
            FormatDescriptor::default()
        })
    }

    fn finish(self) -> ParsedStyles {
        let mut issues = Vec::new();
        let cell_xfs = self
            .cell_xfs
            .iter()
            .map(|xf| self.resolve(xf, &mut issues))
            .collect();
        let style_xfs = self
            .style_xfs
            .iter()
            .map(|xf| self.resolve(xf, &mut issues))
            .collect();
        for issue in &issues {
            log::warn!("styles: {}", issue);
        }
        ParsedStyles {
            cell_xfs,
            style_xfs,
            fragments: self.fragments,
            root_attrs: self.root_attrs,
            issues,
        }
    }

    fn start_in_font(&mut self, name: &[u8], e: &BytesStart<'_>) {
        let Some(font) = self.font.as_mut() else {
            return;
        };
        let flag = || attr_bool(e, b"val").unwrap_or(true);
        match name {
            b"b" => font.bold = flag(),
            b"i" => font.italic = flag(),
            b"strike" => font.strike = flag(),
            b"u" => font.underline = attr(e, b"val").map_or(Underline::Single, |v| Underline::parse(&v)),
            b"vertAlign" => {
                font.script = attr(e, b"val").map_or(FontScript::Baseline, |v| FontScript::parse(&v))
            }
            b"sz" => {
                if let Some(size) = attr_f64(e, b"val") {
                    font.size = size;
                }
            }
            b"color" => font.color = parse_color(e),
            b"name" | b"rFont" => font.name = attr(e, b"val").unwrap_or_default().into_owned(),
            b"family" => font.family = attr_u32(e, b"val").map(|v| v.min(255) as u8),
            b"scheme" => font.scheme = attr(e, b"val").map_or(FontScheme::None, |v| FontScheme::parse(&v)),
            _ => {}
        }
    }

    fn start_in_fill(&mut self, name: &[u8], e: &BytesStart<'_>) {
        let Some(fill) = self.fill.as_mut() else {
            return;
        };
        match name {
            b"patternFill" => {
                fill.pattern = attr(e, b"patternType").map_or(PatternType::None, |p| PatternType::parse(&p));
            }
            b"fgColor" => fill.fg = parse_color(e),
            b"bgColor" => fill.bg = parse_color(e),
            b"gradientFill" => self.gradient = true,
            // A gradient degrades to a solid fill in its first stop color
            b"color" if self.gradient && fill.pattern == PatternType::None => {
                *fill = Fill::solid(parse_color(e));
            }
            _ => {}
        }
    }

    fn start_in_border(&mut self, name: &[u8], e: &BytesStart<'_>) {
        let edge = match name {
            b"left" | b"start" => Some(Edge::Left),
            b"right" | b"end" => Some(Edge::Right),
            b"top" => Some(Edge::Top),
            b"bottom" => Some(Edge::Bottom),
            b"diagonal" => Some(Edge::Diagonal),
            _ => None,
        };
        if let Some(edge) = edge {
            self.edge = Some(edge);
            let style = attr(e, b"style").map_or(BorderLineStyle::None, |s| BorderLineStyle::parse(&s));
            if let Some(slot) = self.edge_mut() {
                slot.style = style;
            }
        } else if name == b"color" {
            let color = parse_color(e);
            if let Some(slot) = self.edge_mut() {
                slot.color = color;
            }
        }
    }

    fn start_in_xf(&mut self, name: &[u8], e: &BytesStart<'_>) {
        let Some(xf) = self.xf.as_mut() else {
            if name == b"xf" {
                self.xf = Some(RawXf {
                    num_fmt: attr_u32(e, b"numFmtId").unwrap_or(0),
                    font: attr_u32(e, b"fontId").unwrap_or(0),
                    fill: attr_u32(e, b"fillId").unwrap_or(0),
                    border: attr_u32(e, b"borderId").unwrap_or(0),
                    ..RawXf::default()
                });
            }
            return;
        };
        match name {
            b"alignment" => {
                let a = &mut xf.alignment;
                if let Some(h) = attr(e, b"horizontal") {
                    a.horizontal = HorizontalAlignment::parse(&h);
                }
                if let Some(v) = attr(e, b"vertical") {
                    a.vertical = VerticalAlignment::parse(&v);
                }
                a.wrap = attr_bool(e, b"wrapText").unwrap_or(false);
                a.shrink = attr_bool(e, b"shrinkToFit").unwrap_or(false);
                a.indent = attr_u32(e, b"indent").map_or(0, |i| i.min(255) as u8);
                a.rotation = attr_u32(e, b"textRotation")
                    .map_or(0, |r| rotation_from_wire(r.min(u32::from(u16::MAX)) as u16));
                a.reading_order = attr_u32(e, b"readingOrder")
                    .map_or(ReadingOrder::ContextDependent, |r| ReadingOrder::from_code(r.min(255) as u8));
            }
            b"protection" => {
                xf.protection.locked = attr_bool(e, b"locked").unwrap_or(true);
                xf.protection.hidden = attr_bool(e, b"hidden").unwrap_or(false);
            }
            _ => {}
        }
    }
}

impl PartHandler for StylesHandler {
    fn start(&mut self, e: &BytesStart<'_>, _empty: bool) -> XlsxResult<Flow> {
        let local = e.local_name();
        let name = local.as_ref();
        if self.depth == 0 {
            self.root_attrs = qualified_attrs(e);
        } else if self.depth == 1 {
            self.section = match name {
                b"numFmts" => Section::NumFmts,
                b"fonts" => Section::Fonts,
                b"fills" => Section::Fills,
                b"borders" => Section::Borders,
                b"cellStyleXfs" => Section::StyleXfs,
                b"cellXfs" => Section::CellXfs,
                _ => return Ok(Flow::Capture),
            };
        }
        self.depth += 1;

        match self.section {
            Section::NumFmts if name == b"numFmt" => {
                if let (Some(id), Some(code)) = (attr_u32(e, b"numFmtId"), attr(e, b"formatCode")) {
                    self.custom_formats.insert(id, code.into_owned());
                }
            }
            Section::Fonts => {
                if name == b"font" && self.depth == 3 {
                    self.font = Some(blank_font());
                } else {
                    self.start_in_font(name, e);
                }
            }
            Section::Fills => {
                if name == b"fill" && self.depth == 3 {
                    self.fill = Some(Fill::default());
                    self.gradient = false;
                } else {
                    self.start_in_fill(name, e);
                }
            }
            Section::Borders => {
                if name == b"border" && self.depth == 3 {
                    self.border = Some(Border::default());
                    self.diagonal_up = attr_bool(e, b"diagonalUp").unwrap_or(false);
                    self.diagonal_down = attr_bool(e, b"diagonalDown").unwrap_or(false);
                    self.edge = None;
                } else {
                    self.start_in_border(name, e);
                }
            }
            Section::StyleXfs | Section::CellXfs => self.start_in_xf(name, e),
            _ => {}
        }
        Ok(Flow::Continue)
    }

    fn end(&mut self, name: &[u8]) -> XlsxResult<()> {
        let depth = self.depth;
        self.depth = self.depth.saturating_sub(1);
        match (self.section, name) {
            (Section::Fonts, b"font") if depth == 3 => {
                if let Some(font) = self.font.take() {
                    self.fonts.push(font);
                }
            }
            (Section::Fills, b"fill") if depth == 3 => {
                if let Some(fill) = self.fill.take() {
                    self.fills.push(fill);
                }
            }
            (Section::Borders, b"border") if depth == 3 => {
                if let Some(mut border) = self.border.take() {
                    let diagonal = border.diagonal_up;
                    border.diagonal_up = if self.diagonal_up { diagonal } else { BorderEdge::default() };
                    border.diagonal_down = if self.diagonal_down { diagonal } else { BorderEdge::default() };
                    self.borders.push(border);
                }
            }
            (Section::StyleXfs, b"xf") if depth == 3 => {
                if let Some(xf) = self.xf.take() {
                    self.style_xfs.push(xf);
                }
            }
            (Section::CellXfs, b"xf") if depth == 3 => {
                if let Some(xf) = self.xf.take() {
                    self.cell_xfs.push(xf);
                }
            }
            _ => {}
        }
        if depth == 2 {
            self.section = Section::None;
        }
        Ok(())
    }

    fn captured(&mut self, name: &[u8], xml: &[u8]) -> XlsxResult<()> {
        let name = String::from_utf8_lossy(name).into_owned();
        if !MODELED.contains(&name.as_str()) {
            self.fragments.push((name, xml.to_vec()));
        }
        Ok(())
    }
}
