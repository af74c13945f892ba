//! Relationship parts (`_rels/*.rels`)

use std::io::Write;

use quick_xml::events::BytesStart;

use crate::error::XlsxResult;
use crate::xml::reader::{attr, parse_part, Flow, PartHandler};
use crate::xml::{ns, XmlWriter};

/// One `<Relationship>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Target as written (relative to the owning part unless external)
    pub target: String,
    pub external: bool,
}

/// A relationships part in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    rels: Vec<Relationship>,
}

impl Relationships {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.id == id)
    }

    /// First relationship of a type
    pub fn find_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.rel_type == rel_type)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Append with an explicit id
    pub fn push(&mut self, id: impl Into<String>, rel_type: &str, target: impl Into<String>) {
        self.rels.push(Relationship {
            id: id.into(),
            rel_type: rel_type.to_string(),
            target: target.into(),
            external: false,
        });
    }

    pub fn push_relationship(&mut self, rel: Relationship) {
        self.rels.push(rel);
    }

    /// Append under the first free `rIdN`; returns the id
    pub fn add(&mut self, rel_type: &str, target: impl Into<String>) -> String {
        let id = self.next_id();
        self.push(id.clone(), rel_type, target);
        id
    }

    /// Smallest `rIdN` above every numbered id in use
    pub fn next_id(&self) -> String {
        let max = self
            .rels
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }

    /// Drop every relationship of a type
    pub fn remove_type(&mut self, rel_type: &str) {
        self.rels.retain(|r| r.rel_type != rel_type);
    }

    pub fn retain<F: FnMut(&Relationship) -> bool>(&mut self, f: F) {
        self.rels.retain(f);
    }

    pub fn write<W: Write>(&self, sink: W) -> XlsxResult<W> {
        let mut xml = XmlWriter::new(sink);
        xml.declaration();
        xml.start("Relationships").attr_raw("xmlns", ns::PKG_REL);
        for rel in &self.rels {
            xml.start("Relationship")
                .attr("Id", &rel.id)
                .attr("Type", &rel.rel_type)
                .attr("Target", &rel.target);
            if rel.external {
                xml.attr_raw("TargetMode", "External");
            }
            xml.end();
        }
        xml.end();
        xml.finish()
    }

    pub fn to_bytes(&self) -> XlsxResult<Vec<u8>> {
        self.write(Vec::with_capacity(256 + self.rels.len() * 160))
    }

    pub fn parse(part: &str, xml: &[u8]) -> XlsxResult<Self> {
        let mut handler = RelsHandler::default();
        parse_part(part, xml, &mut handler)?;
        Ok(handler.rels)
    }
}

#[derive(Default)]
struct RelsHandler {
    rels: Relationships,
}

impl PartHandler for RelsHandler {
    fn start(&mut self, e: &BytesStart<'_>, _empty: bool) -> XlsxResult<Flow> {
        if e.local_name().as_ref() == b"Relationship" {
            let id = attr(e, b"Id").unwrap_or_default();
            let rel_type = attr(e, b"Type").unwrap_or_default();
            let target = attr(e, b"Target").unwrap_or_default();
            let external = attr(e, b"TargetMode").is_some_and(|m| m == "External");
            if !id.is_empty() {
                self.rels.push_relationship(Relationship {
                    id: id.into_owned(),
                    rel_type: rel_type.into_owned(),
                    target: target.into_owned(),
                    external,
                });
            }
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::rel_type;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_next_id_skips_used() {
        let mut rels = Relationships::new();
        rels.push("rId3", rel_type::STYLES, "styles.xml");
        rels.push("custom", rel_type::IMAGE, "x.png");
        assert_eq!(rels.add(rel_type::WORKSHEET, "worksheets/sheet1.xml"), "rId4");
        assert_eq!(rels.next_id(), "rId5");
    }

    #[test]
    fn test_write_and_parse() {
        let mut rels = Relationships::new();
        rels.add(rel_type::WORKSHEET, "worksheets/sheet1.xml");
        rels.push_relationship(Relationship {
            id: "rId9".into(),
            rel_type: "http://example.com/link".into(),
            target: "https://example.com/?a=1&b=2".into(),
            external: true,
        });
        let bytes = rels.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(r#"Target="https://example.com/?a=1&amp;b=2" TargetMode="External""#));

        let back = Relationships::parse("_rels/.rels", &bytes).unwrap();
        assert_eq!(back, rels);
        assert_eq!(back.find_type(rel_type::WORKSHEET).unwrap().id, "rId1");
    }
}
