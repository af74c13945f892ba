//! `[Content_Types].xml`

use std::io::Write;

use quick_xml::events::BytesStart;

use crate::error::XlsxResult;
use crate::package::content_type;
use crate::xml::reader::{attr, parse_part, Flow, PartHandler};
use crate::xml::{ns, XmlWriter};

/// Extension defaults and per-part overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// (extension, content type), in insertion order
    defaults: Vec<(String, String)>,
    /// (part name without leading slash, content type)
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    /// The two defaults every package carries
    pub fn new() -> Self {
        let mut ct = Self::default();
        ct.add_default("rels", content_type::RELATIONSHIPS);
        ct.add_default("xml", content_type::XML);
        ct
    }

    pub fn add_default(&mut self, extension: &str, content_type: &str) {
        let extension = extension.to_ascii_lowercase();
        if !self.defaults.iter().any(|(e, _)| *e == extension) {
            self.defaults.push((extension, content_type.to_string()));
        }
    }

    /// Set the type of one part, replacing an earlier override
    pub fn add_override(&mut self, part: &str, content_type: &str) {
        let part = part.trim_start_matches('/');
        match self.overrides.iter_mut().find(|(p, _)| p == part) {
            Some(entry) => entry.1 = content_type.to_string(),
            None => self
                .overrides
                .push((part.to_string(), content_type.to_string())),
        }
    }

    pub fn remove_override(&mut self, part: &str) {
        let part = part.trim_start_matches('/');
        self.overrides.retain(|(p, _)| p != part);
    }

    pub fn retain_overrides<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.overrides.retain(|(p, _)| keep(p));
    }

    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides.iter().map(|(p, t)| (p.as_str(), t.as_str()))
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defaults.iter().map(|(e, t)| (e.as_str(), t.as_str()))
    }

    /// Content type of a part: its override, else its extension default
    pub fn content_type_of(&self, part: &str) -> Option<&str> {
        let part = part.trim_start_matches('/');
        if let Some((_, t)) = self.overrides.iter().find(|(p, _)| p == part) {
            return Some(t);
        }
        let ext = part.rsplit_once('.')?.1.to_ascii_lowercase();
        self.defaults
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, t)| t.as_str())
    }

    pub fn write<W: Write>(&self, sink: W) -> XlsxResult<W> {
        let mut xml = XmlWriter::new(sink);
        xml.declaration();
        xml.start("Types").attr_raw("xmlns", ns::CONTENT_TYPES);
        for (ext, ct) in &self.defaults {
            xml.start("Default")
                .attr("Extension", ext)
                .attr("ContentType", ct)
                .end();
        }
        let mut part_name = String::with_capacity(64);
        for (part, ct) in &self.overrides {
            part_name.clear();
            part_name.push('/');
            part_name.push_str(part);
            xml.start("Override")
                .attr("PartName", &part_name)
                .attr("ContentType", ct)
                .end();
        }
        xml.end();
        xml.finish()
    }

    pub fn to_bytes(&self) -> XlsxResult<Vec<u8>> {
        self.write(Vec::with_capacity(1024))
    }

    pub fn parse(xml: &[u8]) -> XlsxResult<Self> {
        let mut handler = Handler::default();
        parse_part(crate::package::CONTENT_TYPES, xml, &mut handler)?;
        Ok(handler.types)
    }
}

#[derive(Default)]
struct Handler {
    types: ContentTypes,
}

impl PartHandler for Handler {
    fn start(&mut self, e: &BytesStart<'_>, _empty: bool) -> XlsxResult<Flow> {
        match e.local_name().as_ref() {
            b"Default" => {
                if let (Some(ext), Some(ct)) = (attr(e, b"Extension"), attr(e, b"ContentType")) {
                    self.types.add_default(&ext, &ct);
                }
            }
            b"Override" => {
                if let (Some(part), Some(ct)) = (attr(e, b"PartName"), attr(e, b"ContentType")) {
                    self.types.add_override(&part, &ct);
                }
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }
}
