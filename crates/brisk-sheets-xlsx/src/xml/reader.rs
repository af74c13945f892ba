//! Event dispatch over a part's XML.
//!
//! [`parse_part`] runs a `quick-xml` reader over the part bytes and hands
//! every event to a [`PartHandler`]. Handlers look at local names only, so
//! prefixed producers (`x:c`) parse the same as unprefixed ones. A handler
//! can ask for an element to be captured: the driver then skips its subtree
//! and passes the element's exact source bytes back, which is how unmodeled
//! markup survives a regenerated part.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{XlsxError, XlsxResult};

/// What the driver does after a start tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep dispatching children
    Continue,
    /// Skip the subtree and report its raw bytes via `captured`
    Capture,
    /// Stop reading the part
    Stop,
}

/// Receiver of a part's parse events
pub trait PartHandler {
    /// Start tag, or an empty element when `empty` (no `end` call follows
    /// for empty elements unless the handler continues)
    fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> XlsxResult<Flow>;

    /// End tag, by local name
    fn end(&mut self, _name: &[u8]) -> XlsxResult<()> {
        Ok(())
    }

    /// Unescaped text between tags
    fn text(&mut self, _text: &str) -> XlsxResult<()> {
        Ok(())
    }

    /// Raw markup of an element the handler asked to capture
    fn captured(&mut self, _name: &[u8], _xml: &[u8]) -> XlsxResult<()> {
        Ok(())
    }
}

/// Drive `handler` over `xml`. `part` names the part in errors.
pub fn parse_part<H: PartHandler>(part: &str, xml: &[u8], handler: &mut H) -> XlsxResult<()> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    reader.check_end_names(true);
    let err = |e: quick_xml::Error, at: usize| {
        XlsxError::xml(part, format!("{} (at byte {})", e, at))
    };

    loop {
        let before = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(e)) => match handler.start(&e, false)? {
                Flow::Continue => {}
                Flow::Stop => break,
                Flow::Capture => {
                    let start = element_start(xml, before);
                    reader
                        .read_to_end(e.name())
                        .map_err(|x| err(x, reader.buffer_position()))?;
                    let end = reader.buffer_position();
                    handler.captured(e.local_name().as_ref(), &xml[start..end])?;
                }
            },
            Ok(Event::Empty(e)) => match handler.start(&e, true)? {
                Flow::Continue => handler.end(e.local_name().as_ref())?,
                Flow::Stop => break,
                Flow::Capture => {
                    let start = element_start(xml, before);
                    let end = reader.buffer_position();
                    handler.captured(e.local_name().as_ref(), &xml[start..end])?;
                }
            },
            Ok(Event::End(e)) => handler.end(e.local_name().as_ref())?,
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|x| err(x, reader.buffer_position()))?;
                handler.text(&text)?;
            }
            Ok(Event::CData(t)) => {
                let text = String::from_utf8_lossy(&t);
                handler.text(&text)?;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(err(e, reader.buffer_position())),
            _ => {}
        }
    }
    Ok(())
}

fn element_start(xml: &[u8], from: usize) -> usize {
    xml[from.min(xml.len())..]
        .iter()
        .position(|&b| b == b'<')
        .map_or(from, |i| from + i)
}

/// Value of the attribute with local name `key`
pub fn attr<'a>(e: &'a BytesStart<'_>, key: &[u8]) -> Option<Cow<'a, str>> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
}

/// Attribute with an exact qualified name (`r:id`), for the few places a
/// local name is ambiguous
pub fn attr_qualified(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(Cow::into_owned))
}

/// Every attribute as (local name, value)
pub fn attrs(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .filter_map(|a| {
            let key = std::str::from_utf8(a.key.local_name().as_ref()).ok()?.to_string();
            let value = a.unescape_value().ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

/// Every attribute under its qualified name, namespace declarations included
pub fn qualified_attrs(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .filter_map(|a| {
            let key = std::str::from_utf8(a.key.as_ref()).ok()?.to_string();
            let value = a.unescape_value().ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

pub fn attr_u32(e: &BytesStart<'_>, key: &[u8]) -> Option<u32> {
    attr(e, key).and_then(|v| v.trim().parse().ok())
}

pub fn attr_f64(e: &BytesStart<'_>, key: &[u8]) -> Option<f64> {
    attr(e, key).and_then(|v| v.trim().parse().ok())
}

/// OOXML boolean: "1"/"true" are true, "0"/"false" false
pub fn attr_bool(e: &BytesStart<'_>, key: &[u8]) -> Option<bool> {
    attr(e, key).map(|v| parse_bool(&v))
}

pub fn parse_bool(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "on")
}

/// Decode `_xHHHH_` escapes; `_x005F_` yields a literal underscore, so an
/// escaped `_x005F_x0041_` reads back as `_x0041_`
pub fn decode_excel_escapes(s: &str) -> Cow<'_, str> {
    if !s.contains("_x") {
        return Cow::Borrowed(s);
    }
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    let mut copied = 0;
    while i < bytes.len() {
        if bytes[i] == b'_'
            && bytes.get(i + 1) == Some(&b'x')
            && bytes.get(i + 6) == Some(&b'_')
            && bytes[i + 2..i + 6].iter().all(u8::is_ascii_hexdigit)
        {
            let decoded = std::str::from_utf8(&bytes[i + 2..i + 6])
                .ok()
                .and_then(|h| u32::from_str_radix(h, 16).ok())
                .and_then(char::from_u32);
            if let Some(c) = decoded {
                out.push_str(&s[copied..i]);
                out.push(c);
                i += 7;
                copied = i;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&s[copied..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        captured: Vec<(String, String)>,
    }

    impl PartHandler for Recorder {
        fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> XlsxResult<Flow> {
            let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
            if name == "extLst" {
                return Ok(Flow::Capture);
            }
            self.events.push(format!("{}{}", if empty { "empty " } else { "start " }, name));
            Ok(Flow::Continue)
        }

        fn end(&mut self, name: &[u8]) -> XlsxResult<()> {
            self.events.push(format!("end {}", String::from_utf8_lossy(name)));
            Ok(())
        }

        fn text(&mut self, text: &str) -> XlsxResult<()> {
            self.events.push(format!("text {}", text));
            Ok(())
        }

        fn captured(&mut self, name: &[u8], xml: &[u8]) -> XlsxResult<()> {
            self.captured.push((
                String::from_utf8_lossy(name).into_owned(),
                String::from_utf8_lossy(xml).into_owned(),
            ));
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_with_prefixes() {
        let xml = br#"<x:root xmlns:x="urn:x"><x:t>a &amp; b</x:t><x:e/></x:root>"#;
        let mut rec = Recorder::default();
        parse_part("test.xml", xml, &mut rec).unwrap();
        assert_eq!(
            rec.events,
            vec![
                "start root",
                "start t",
                "text a & b",
                "end t",
                "empty e",
                "end e",
                "end root"
            ]
        );
    }

    #[test]
    fn test_capture_returns_exact_bytes() {
        let xml = br#"<root><a/> <extLst><ext uri="{X}"><y>1</y></ext></extLst><b/></root>"#;
        let mut rec = Recorder::default();
        parse_part("test.xml", xml, &mut rec).unwrap();
        assert_eq!(
            rec.captured,
            vec![(
                "extLst".to_string(),
                r#"<extLst><ext uri="{X}"><y>1</y></ext></extLst>"#.to_string()
            )]
        );
        assert!(rec.events.contains(&"empty b".to_string()));
    }

    struct StopAt(usize, Vec<String>);

    impl PartHandler for StopAt {
        fn start(&mut self, e: &BytesStart<'_>, _empty: bool) -> XlsxResult<Flow> {
            if self.1.len() == self.0 {
                return Ok(Flow::Stop);
            }
            self.1.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            Ok(Flow::Continue)
        }
    }

    #[test]
    fn test_stop_ends_dispatch() {
        let mut h = StopAt(2, Vec::new());
        // the unclosed tail is never read
        parse_part("test.xml", b"<root><a/><b/><c><", &mut h).unwrap();
        assert_eq!(h.1, vec!["root", "a"]);
    }

    #[test]
    fn test_malformed_names_part() {
        let mut rec = Recorder::default();
        let err = parse_part("xl/workbook.xml", b"<a><b></a>", &mut rec).unwrap_err();
        assert_eq!(err.kind(), brisk_sheets_core::ErrorKind::Xml);
        assert!(err.to_string().contains("xl/workbook.xml"));
    }

    #[test]
    fn test_attr_helpers() {
        let xml = br#"<c r="B2" s="3" t="s" r:id="rId1" x="1" flag="true"/>"#;
        let mut reader = Reader::from_reader(&xml[..]);
        let Ok(Event::Empty(e)) = reader.read_event() else {
            panic!("expected an empty element");
        };
        assert_eq!(attr(&e, b"s").as_deref(), Some("3"));
        assert_eq!(attr_u32(&e, b"s"), Some(3));
        assert_eq!(attr_bool(&e, b"flag"), Some(true));
        assert_eq!(attr_qualified(&e, b"r:id").as_deref(), Some("rId1"));
        assert_eq!(attr(&e, b"missing"), None);
        assert_eq!(attrs(&e).len(), 6);
    }

    #[test]
    fn test_decode_excel_escapes() {
        assert_eq!(decode_excel_escapes("plain"), "plain");
        assert_eq!(decode_excel_escapes("a_x0001_b"), "a\u{1}b");
        assert_eq!(decode_excel_escapes("line_x000D_\n"), "line\r\n");
        assert_eq!(decode_excel_escapes("_x005F_x0041_"), "_x0041_");
        assert_eq!(decode_excel_escapes("_xZZZZ_"), "_xZZZZ_");
        assert_eq!(decode_excel_escapes("tail_x00"), "tail_x00");
    }
}
