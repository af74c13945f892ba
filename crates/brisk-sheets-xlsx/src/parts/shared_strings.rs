//! `xl/sharedStrings.xml`

use std::io::Write;

use brisk_sheets_core::{SharedStringTable, StringId};
use quick_xml::events::BytesStart;

use crate::error::XlsxResult;
use crate::xml::reader::{attr_u32, decode_excel_escapes, parse_part, Flow, PartHandler};
use crate::xml::{ns, XmlWriter};

/// Whether text needs `xml:space="preserve"` to keep its whitespace
pub(crate) fn needs_space_preserve(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

/// Write the table. `count` is the number of cells referencing it.
pub fn write_shared_strings<W: Write>(strings: &SharedStringTable, count: u64, sink: W) -> XlsxResult<W> {
    let mut xml = XmlWriter::new(sink);
    xml.declaration();
    xml.start("sst")
        .attr_raw("xmlns", ns::MAIN)
        .attr_int("count", count.max(strings.len() as u64))
        .attr_int("uniqueCount", strings.len());
    for (id, text) in strings.iter() {
        xml.start("si");
        match strings.rich_markup(id) {
            Some(body) => {
                xml.raw(body);
            }
            None => {
                xml.start("t");
                if needs_space_preserve(text) {
                    xml.attr_raw("xml:space", "preserve");
                }
                xml.cell_text(text).end();
            }
        }
        xml.end();
    }
    xml.end();
    xml.finish()
}

/// Read a table; ids equal source positions
pub fn parse_shared_strings(part: &str, xml: &[u8]) -> XlsxResult<SharedStringTable> {
    let mut handler = SstHandler::default();
    parse_part(part, xml, &mut handler)?;
    let mut table = SharedStringTable::from_source(handler.entries);
    for (index, body) in handler.rich {
        table.set_rich_markup(StringId(index as u32), body);
    }
    Ok(table)
}

#[derive(Default)]
struct SstHandler {
    entries: Vec<String>,
    /// (entry index, `<si>` body) of rich-text entries
    rich: Vec<(usize, Vec<u8>)>,
}

impl PartHandler for SstHandler {
    fn start(&mut self, e: &BytesStart<'_>, _empty: bool) -> XlsxResult<Flow> {
        match e.local_name().as_ref() {
            b"sst" => {
                if let Some(unique) = attr_u32(e, b"uniqueCount") {
                    self.entries.reserve(unique.min(1 << 20) as usize);
                }
                Ok(Flow::Continue)
            }
            b"si" => Ok(Flow::Capture),
            _ => Ok(Flow::Continue),
        }
    }

    fn captured(&mut self, _name: &[u8], xml: &[u8]) -> XlsxResult<()> {
        let mut item = ItemHandler::default();
        parse_part(crate::package::SHARED_STRINGS, xml, &mut item)?;
        let index = self.entries.len();
        if item.rich {
            if let Some(body) = si_body(xml) {
                self.rich.push((index, body.to_vec()));
            }
        }
        self.entries.push(decode_excel_escapes(&item.text).into_owned());
        Ok(())
    }
}

/// Markup between `<si ...>` and `</si>`
fn si_body(xml: &[u8]) -> Option<&[u8]> {
    let open_end = xml.iter().position(|&b| b == b'>')?;
    if xml[..open_end].ends_with(b"/") {
        return None;
    }
    let close = xml.iter().rposition(|&b| b == b'<')?;
    (close > open_end).then(|| &xml[open_end + 1..close])
}

/// Text of one `<si>`: the concatenated `t` runs, phonetic runs excluded
#[derive(Default)]
struct ItemHandler {
    text: String,
    in_t: bool,
    phonetic_depth: usize,
    rich: bool,
}

impl PartHandler for ItemHandler {
    fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> XlsxResult<Flow> {
        match e.local_name().as_ref() {
            b"t" if self.phonetic_depth == 0 => self.in_t = !empty,
            b"r" => self.rich = true,
            b"rPh" => {
                self.rich = true;
                self.phonetic_depth += 1;
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }

    fn end(&mut self, name: &[u8]) -> XlsxResult<()> {
        match name {
            b"t" => self.in_t = false,
            b"rPh" => self.phonetic_depth = self.phonetic_depth.saturating_sub(1),
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> XlsxResult<()> {
        if self.in_t {
            self.text.push_str(text);
        }
        Ok(())
    }
}
