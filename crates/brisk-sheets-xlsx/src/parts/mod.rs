//! Codecs for the individual package parts.
//!
//! Each module pairs a writer (model to XML) with a parser (XML to model).
//! Writers only see what they need to emit; package layout decisions such
//! as part names and relationship ids are made by the save pipeline and
//! passed in.

pub mod content_types;
pub mod doc_props;
pub mod drawing;
pub mod relationships;
pub mod shared_strings;
pub mod styles;
pub mod workbook;
pub mod worksheet;

use std::io::Write;

use brisk_sheets_core::style::{Color, Tint};
use brisk_sheets_core::worksheet::RawElement;
use quick_xml::events::BytesStart;

use crate::xml::reader::{attr, attr_f64, attr_u32, parse_bool};
use crate::xml::XmlWriter;

/// Write `<tag .../>` for a color. `Auto` becomes `auto="1"`.
pub(crate) fn write_color<W: Write>(xml: &mut XmlWriter<W>, tag: &'static str, color: &Color) {
    xml.start(tag);
    match color {
        Color::Auto => {
            xml.attr_raw("auto", "1");
        }
        Color::Rgb(_) => {
            if let Some(hex) = color.argb_hex() {
                xml.attr_raw("rgb", &hex);
            }
        }
        Color::Indexed(i) => {
            xml.attr_int("indexed", *i);
        }
        Color::Theme { index, tint } => {
            xml.attr_int("theme", *index);
            if !tint.is_zero() {
                xml.attr_num("tint", tint.value());
            }
        }
    }
    xml.end();
}

/// Read the color attributes of a `color`/`fgColor`/`tabColor` element.
///
/// `rgb` wins over `theme`, which wins over `indexed`; an element with none
/// of them is automatic.
pub(crate) fn parse_color(e: &BytesStart<'_>) -> Color {
    if let Some(rgb) = attr(e, b"rgb") {
        if let Some(c) = Color::from_hex(&rgb) {
            return c;
        }
    }
    if let Some(index) = attr_u32(e, b"theme") {
        let tint = attr_f64(e, b"tint").unwrap_or(0.0);
        return Color::Theme {
            index: index.min(u32::from(u8::MAX)) as u8,
            tint: Tint::new(tint),
        };
    }
    if let Some(index) = attr_u32(e, b"indexed") {
        return Color::Indexed(index.min(u32::from(u8::MAX)) as u8);
    }
    if attr(e, b"auto").is_some_and(|v| parse_bool(&v)) {
        return Color::Auto;
    }
    Color::Auto
}

/// Write every preserved element called `name`, in source order
pub(crate) fn write_preserved<W: Write>(xml: &mut XmlWriter<W>, preserved: &[RawElement], name: &str) {
    for element in preserved.iter().filter(|e| e.name == name) {
        xml.raw(&element.xml);
    }
}

/// Write preserved elements whose names appear nowhere in `known`; they go
/// before the closing tag of the root
pub(crate) fn write_unplaced<W: Write>(xml: &mut XmlWriter<W>, preserved: &[RawElement], known: &[&str]) {
    for element in preserved
        .iter()
        .filter(|e| !known.contains(&e.name.as_str()))
    {
        xml.raw(&element.xml);
    }
}

/// Root attributes carried over from a source part, minus the ones the
/// writer sets itself
pub(crate) fn write_extra_root_attrs<W: Write>(
    xml: &mut XmlWriter<W>,
    attrs: &[(String, String)],
    skip: &[&str],
) {
    for (name, value) in attrs {
        if !skip.contains(&name.as_str()) {
            xml.attr(name, value);
        }
    }
}
