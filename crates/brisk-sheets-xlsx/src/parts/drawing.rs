//! `xl/drawings/drawingN.xml`: picture anchors.
//!
//! Only pictures are modeled. A regenerated drawing holds exactly the
//! sheet's images; shapes and charts from a source drawing survive only
//! while the drawing part is copied unchanged.

use std::io::Write;

use brisk_sheets_core::image::px_to_emu;
use brisk_sheets_core::{Anchor, AnchorPoint, Extent, Image};
use quick_xml::events::BytesStart;

use crate::error::XlsxResult;
use crate::xml::reader::{attr, parse_part, Flow, PartHandler};
use crate::xml::{ns, XmlWriter};

/// Write a drawing holding `pictures`, each paired with the relationship id
/// of its media part
pub fn write_drawing<W: Write>(pictures: &[(&Image, &str)], sink: W) -> XlsxResult<W> {
    let mut xml = XmlWriter::new(sink);
    xml.declaration();
    xml.start("xdr:wsDr")
        .attr_raw("xmlns:xdr", ns::DRAWING)
        .attr_raw("xmlns:a", ns::DRAWING_MAIN)
        .attr_raw("xmlns:r", ns::REL);
    for (index, (image, rel_id)) in pictures.iter().enumerate() {
        let size = image.extent().unwrap_or_else(|| natural_extent(image));
        match image.anchor {
            Anchor::OneCell { from, ext } => {
                xml.start("xdr:oneCellAnchor");
                write_point(&mut xml, "xdr:from", &from);
                xml.start("xdr:ext").attr_int("cx", ext.cx).attr_int("cy", ext.cy).end();
            }
            Anchor::TwoCell { from, to } => {
                xml.start("xdr:twoCellAnchor").attr_raw("editAs", "oneCell");
                write_point(&mut xml, "xdr:from", &from);
                write_point(&mut xml, "xdr:to", &to);
            }
            Anchor::Absolute { x, y, ext } => {
                xml.start("xdr:absoluteAnchor");
                xml.start("xdr:pos").attr_int("x", x).attr_int("y", y).end();
                xml.start("xdr:ext").attr_int("cx", ext.cx).attr_int("cy", ext.cy).end();
            }
        }
        write_picture(&mut xml, index, image, rel_id, size);
        xml.start("xdr:clientData").end();
        xml.end();
    }
    xml.end();
    xml.finish()
}

fn write_point<W: Write>(xml: &mut XmlWriter<W>, tag: &'static str, p: &AnchorPoint) {
    xml.start(tag);
    xml.start("xdr:col").int(p.col).end();
    xml.start("xdr:colOff").int(p.col_offset).end();
    xml.start("xdr:row").int(p.row).end();
    xml.start("xdr:rowOff").int(p.row_offset).end();
    xml.end();
}

fn write_picture<W: Write>(xml: &mut XmlWriter<W>, index: usize, image: &Image, rel_id: &str, size: Extent) {
    let default_name;
    let name = match &image.name {
        Some(n) => n.as_str(),
        None => {
            default_name = format!("Picture {}", index + 1);
            default_name.as_str()
        }
    };
    xml.start("xdr:pic").start("xdr:nvPicPr");
    // id 1 belongs to the drawing itself
    xml.start("xdr:cNvPr").attr_int("id", index + 2).attr("name", name);
    if let Some(descr) = &image.description {
        xml.attr("descr", descr);
    }
    xml.end();
    xml.start("xdr:cNvPicPr")
        .start("a:picLocks")
        .attr_raw("noChangeAspect", "1")
        .end()
        .end();
    xml.end();

    xml.start("xdr:blipFill");
    xml.start("a:blip").attr("r:embed", rel_id).end();
    xml.start("a:stretch").start("a:fillRect").end().end();
    xml.end();

    xml.start("xdr:spPr").start("a:xfrm");
    xml.start("a:off").attr_raw("x", "0").attr_raw("y", "0").end();
    xml.start("a:ext").attr_int("cx", size.cx).attr_int("cy", size.cy).end();
    xml.end();
    xml.start("a:prstGeom").attr_raw("prst", "rect").start("a:avLst").end().end();
    xml.end();
    xml.end();
}

/// A picture read from a drawing
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingPicture {
    pub anchor: Anchor,
    /// `r:embed` id of the media part
    pub embed: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDrawing {
    pub pictures: Vec<DrawingPicture>,
    /// Anchors holding shapes, charts or anything else that is not a picture
    pub foreign_anchors: usize,
}

pub fn parse_drawing(part: &str, xml: &[u8]) -> XlsxResult<ParsedDrawing> {
    let mut handler = DrawingHandler::default();
    parse_part(part, xml, &mut handler)?;
    Ok(handler.out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    OneCell,
    TwoCell,
    Absolute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Col,
    ColOff,
    Row,
    RowOff,
}

#[derive(Default)]
struct DrawingHandler {
    out: ParsedDrawing,
    kind: Option<Kind>,
    from: AnchorPoint,
    to: AnchorPoint,
    in_to: bool,
    field: Option<Field>,
    ext: Extent,
    pos: (i64, i64),
    in_xfrm: bool,
    is_picture: bool,
    embed: Option<String>,
    name: Option<String>,
    description: Option<String>,
}

impl DrawingHandler {
    fn reset(&mut self, kind: Kind) {
        self.kind = Some(kind);
        self.from = AnchorPoint::default();
        self.to = AnchorPoint::default();
        self.ext = Extent::default();
        self.pos = (0, 0);
        self.is_picture = false;
        self.embed = None;
        self.name = None;
        self.description = None;
    }

    fn close_anchor(&mut self) {
        let Some(kind) = self.kind.take() else { return };
        let embed = match (self.is_picture, self.embed.take()) {
            (true, Some(embed)) => embed,
            _ => {
                self.out.foreign_anchors += 1;
                return;
            }
        };
        let anchor = match kind {
            Kind::OneCell => Anchor::OneCell {
                from: self.from,
                ext: self.ext,
            },
            Kind::TwoCell => Anchor::TwoCell {
                from: self.from,
                to: self.to,
            },
            Kind::Absolute => Anchor::Absolute {
                x: self.pos.0,
                y: self.pos.1,
                ext: self.ext,
            },
        };
        self.out.pictures.push(DrawingPicture {
            anchor,
            embed,
            name: self.name.take(),
            description: self.description.take(),
        });
    }
}

fn emu(e: &BytesStart<'_>, key: &[u8]) -> i64 {
    attr(e, key).and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

impl PartHandler for DrawingHandler {
    fn start(&mut self, e: &BytesStart<'_>, _empty: bool) -> XlsxResult<Flow> {
        match e.local_name().as_ref() {
            b"oneCellAnchor" => self.reset(Kind::OneCell),
            b"twoCellAnchor" => self.reset(Kind::TwoCell),
            b"absoluteAnchor" => self.reset(Kind::Absolute),
            b"from" => self.in_to = false,
            b"to" => self.in_to = true,
            b"col" => self.field = Some(Field::Col),
            b"colOff" => self.field = Some(Field::ColOff),
            b"row" => self.field = Some(Field::Row),
            b"rowOff" => self.field = Some(Field::RowOff),
            b"xfrm" => self.in_xfrm = true,
            // the anchor's own extent precedes the picture; later `ext`s
            // belong to transforms and extension lists
            b"ext" if !self.in_xfrm && !self.is_picture && self.kind.is_some() => {
                self.ext = Extent {
                    cx: emu(e, b"cx"),
                    cy: emu(e, b"cy"),
                };
            }
            b"pos" => self.pos = (emu(e, b"x"), emu(e, b"y")),
            b"pic" => self.is_picture = true,
            b"cNvPr" if self.is_picture => {
                self.name = attr(e, b"name").map(|v| v.into_owned());
                self.description = attr(e, b"descr").map(|v| v.into_owned());
            }
            b"blip" if self.is_picture => self.embed = attr(e, b"embed").map(|v| v.into_owned()),
            _ => {}
        }
        Ok(Flow::Continue)
    }

    fn end(&mut self, name: &[u8]) -> XlsxResult<()> {
        match name {
            b"oneCellAnchor" | b"twoCellAnchor" | b"absoluteAnchor" => self.close_anchor(),
            b"col" | b"colOff" | b"row" | b"rowOff" => self.field = None,
            b"xfrm" => self.in_xfrm = false,
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> XlsxResult<()> {
        let Some(field) = self.field else {
            return Ok(());
        };
        let Ok(value) = text.trim().parse::<i64>() else {
            return Ok(());
        };
        let point = if self.in_to { &mut self.to } else { &mut self.from };
        match field {
            Field::Col => point.col = value.clamp(0, i64::from(u16::MAX)) as u16,
            Field::Row => point.row = value.clamp(0, i64::from(u32::MAX)) as u32,
            Field::ColOff => point.col_offset = value,
            Field::RowOff => point.row_offset = value,
        }
        Ok(())
    }
}

/// EMU extent of a picture shown at its natural pixel size
pub fn natural_extent(image: &Image) -> Extent {
    let (w, h) = image.dimensions();
    Extent {
        cx: px_to_emu(f64::from(w)),
        cy: px_to_emu(f64::from(h)),
    }
}
