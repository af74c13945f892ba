//! Streaming XML emitter

use std::io::{self, Write};

use crate::error::{XlsxError, XlsxResult};

/// Default bytes buffered before a flush to the sink
pub const DEFAULT_BUFFER: usize = 64 * 1024;

const DECLARATION: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\r\n";

/// Escaping context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    /// Element text
    Text,
    /// Cell and shared string text: also protects literal `_xHHHH_` and
    /// encodes CR so it survives line-end normalization
    CellText,
    /// Attribute value
    Attr,
}

fn is_hex4(b: &[u8]) -> bool {
    b.len() >= 4 && b[..4].iter().all(u8::is_ascii_hexdigit)
}

fn push_excel_escape(out: &mut Vec<u8>, c: u32) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    out.extend_from_slice(b"_x");
    for shift in [12, 8, 4, 0] {
        out.push(HEX[((c >> shift) & 0xF) as usize]);
    }
    out.push(b'_');
}

fn escape_into(out: &mut Vec<u8>, s: &str, mode: Escape) {
    let bytes = s.as_bytes();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let replacement: Option<&[u8]> = match b {
            b'&' => Some(b"&amp;"),
            b'<' => Some(b"&lt;"),
            b'>' => Some(b"&gt;"),
            b'"' if mode == Escape::Attr => Some(b"&quot;"),
            b'\'' if mode == Escape::Attr => Some(b"&apos;"),
            b'\t' if mode == Escape::Attr => Some(b"&#9;"),
            b'\n' if mode == Escape::Attr => Some(b"&#10;"),
            b'\r' if mode == Escape::Attr => Some(b"&#13;"),
            b'\r' if mode == Escape::CellText => Some(b"_x000D_"),
            b'\t' | b'\n' | b'\r' => None,
            0x00..=0x1F => Some(b""),
            b'_' if mode == Escape::CellText
                && bytes.get(i + 1) == Some(&b'x')
                && is_hex4(&bytes[(i + 2).min(bytes.len())..])
                && bytes.get(i + 6) == Some(&b'_') =>
            {
                Some(b"_x005F_")
            }
            _ => None,
        };
        if let Some(rep) = replacement {
            out.extend_from_slice(&bytes[start..i]);
            if rep.is_empty() {
                push_excel_escape(out, u32::from(b));
            } else {
                out.extend_from_slice(rep);
            }
            start = i + 1;
        }
    }
    out.extend_from_slice(&bytes[start..]);
}

/// Incremental XML writer over any `io::Write` sink.
///
/// Keeps an element stack so [`end`](Self::end) always closes the right
/// tag; an element with no children is closed as `<a/>`. Output is buffered
/// and handed to the sink whenever the buffer passes its capacity. Methods
/// chain; the first I/O failure is kept and reported by
/// [`flush`](Self::flush) or [`finish`](Self::finish).
pub struct XmlWriter<W: Write> {
    sink: W,
    buf: Vec<u8>,
    capacity: usize,
    stack: Vec<&'static str>,
    tag_open: bool,
    error: Option<io::Error>,
    written: u64,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_capacity(sink, DEFAULT_BUFFER)
    }

    pub fn with_capacity(sink: W, capacity: usize) -> Self {
        Self {
            sink,
            buf: Vec::with_capacity(capacity.min(DEFAULT_BUFFER)),
            capacity: capacity.max(1),
            stack: Vec::with_capacity(16),
            tag_open: false,
            error: None,
            written: 0,
        }
    }

    /// Standard declaration used by every part
    pub fn declaration(&mut self) -> &mut Self {
        self.buf.extend_from_slice(DECLARATION);
        self
    }

    fn close_start_tag(&mut self) {
        if self.tag_open {
            self.buf.push(b'>');
            self.tag_open = false;
        }
    }

    fn maybe_flush(&mut self) {
        if self.buf.len() >= self.capacity {
            self.drain();
        }
    }

    fn drain(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        if self.error.is_none() {
            if let Err(e) = self.sink.write_all(&self.buf) {
                self.error = Some(e);
            } else {
                self.written += self.buf.len() as u64;
            }
        }
        self.buf.clear();
    }

    /// Open an element; attributes may follow until children are written
    pub fn start(&mut self, name: &'static str) -> &mut Self {
        self.close_start_tag();
        self.buf.push(b'<');
        self.buf.extend_from_slice(name.as_bytes());
        self.stack.push(name);
        self.tag_open = true;
        self
    }

    /// Attribute on the element just opened
    pub fn attr(&mut self, name: &str, value: &str) -> &mut Self {
        debug_assert!(self.tag_open, "attribute '{}' outside a start tag", name);
        self.buf.push(b' ');
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.extend_from_slice(b"=\"");
        escape_into(&mut self.buf, value, Escape::Attr);
        self.buf.push(b'"');
        self
    }

    /// Attribute whose value needs no escaping (numbers, fixed keywords)
    pub fn attr_raw(&mut self, name: &str, value: &str) -> &mut Self {
        self.buf.push(b' ');
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.extend_from_slice(b"=\"");
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(b'"');
        self
    }

    pub fn attr_int<I: itoa::Integer>(&mut self, name: &str, value: I) -> &mut Self {
        let mut fmt = itoa::Buffer::new();
        let s = fmt.format(value);
        self.buf.push(b' ');
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.extend_from_slice(b"=\"");
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(b'"');
        self
    }

    pub fn attr_num(&mut self, name: &str, value: f64) -> &mut Self {
        let mut fmt = NumberBuffer::new();
        let s = fmt.format(value);
        self.buf.push(b' ');
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.extend_from_slice(b"=\"");
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(b'"');
        self
    }

    /// `name="1"` when `value`, nothing otherwise
    pub fn attr_flag(&mut self, name: &str, value: bool) -> &mut Self {
        if value {
            self.attr_raw(name, "1");
        }
        self
    }

    /// Escaped element text
    pub fn text(&mut self, text: &str) -> &mut Self {
        self.close_start_tag();
        escape_into(&mut self.buf, text, Escape::Text);
        self.maybe_flush();
        self
    }

    /// Escaped text of a cell value or shared string
    pub fn cell_text(&mut self, text: &str) -> &mut Self {
        self.close_start_tag();
        escape_into(&mut self.buf, text, Escape::CellText);
        self.maybe_flush();
        self
    }

    /// Unescaped text, for numbers and keywords
    pub fn text_raw(&mut self, text: &str) -> &mut Self {
        self.close_start_tag();
        self.buf.extend_from_slice(text.as_bytes());
        self.maybe_flush();
        self
    }

    pub fn number(&mut self, value: f64) -> &mut Self {
        let mut fmt = NumberBuffer::new();
        let s = fmt.format(value);
        self.text_raw(s)
    }

    pub fn int<I: itoa::Integer>(&mut self, value: I) -> &mut Self {
        let mut fmt = itoa::Buffer::new();
        let s = fmt.format(value);
        self.close_start_tag();
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Pre-serialized markup, written verbatim
    pub fn raw(&mut self, markup: &[u8]) -> &mut Self {
        self.close_start_tag();
        self.buf.extend_from_slice(markup);
        self.maybe_flush();
        self
    }

    /// Close the innermost open element
    pub fn end(&mut self) -> &mut Self {
        match self.stack.pop() {
            Some(_) if self.tag_open => {
                self.buf.extend_from_slice(b"/>");
                self.tag_open = false;
            }
            Some(name) => {
                self.buf.extend_from_slice(b"</");
                self.buf.extend_from_slice(name.as_bytes());
                self.buf.push(b'>');
            }
            None => {
                if self.error.is_none() {
                    self.error = Some(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "end() without an open element",
                    ));
                }
            }
        }
        self.maybe_flush();
        self
    }

    /// `<name>text</name>`
    pub fn text_element(&mut self, name: &'static str, text: &str) -> &mut Self {
        self.start(name).text(text).end()
    }

    /// `<name val="value"/>`
    pub fn val_element(&mut self, name: &'static str, value: &str) -> &mut Self {
        self.start(name).attr("val", value).end()
    }

    /// Depth of the element stack
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Bytes handed to the sink so far
    pub fn bytes_written(&self) -> u64 {
        self.written + self.buf.len() as u64
    }

    /// Push buffered bytes to the sink
    pub fn flush(&mut self) -> XlsxResult<()> {
        self.close_start_tag();
        self.drain();
        if let Some(e) = self.error.take() {
            return Err(XlsxError::Io(e));
        }
        self.sink.flush()?;
        Ok(())
    }

    /// Flush and return the sink; every element must be closed
    pub fn finish(mut self) -> XlsxResult<W> {
        if let Some(open) = self.stack.last() {
            return Err(XlsxError::Core(brisk_sheets_core::Error::internal(format!(
                "XML element <{}> left open",
                open
            ))));
        }
        self.flush()?;
        Ok(self.sink)
    }
}

/// Shortest round-tripping text for a finite double: integers without a
/// fraction, everything else through `ryu`
pub struct NumberBuffer {
    int: itoa::Buffer,
    float: ryu::Buffer,
}

impl NumberBuffer {
    pub fn new() -> Self {
        Self {
            int: itoa::Buffer::new(),
            float: ryu::Buffer::new(),
        }
    }

    pub fn format(&mut self, value: f64) -> &str {
        if value.fract() == 0.0 && value.abs() < 1e15 {
            return self.int.format(value as i64);
        }
        let s = self.float.format(value);
        s.strip_suffix(".0").unwrap_or(s)
    }
}

impl Default for NumberBuffer {
    fn default() -> Self {
        Self::new()
    }
}
