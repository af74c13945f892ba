//! ZIP archive writer

use std::io::Write;

use ahash::AHashSet;
use brisk_sheets_core::CompressionBackend;

use super::{
    put_u16, put_u32, RawEntry, CENTRAL_HEADER_SIG, DATA_DESCRIPTOR_SIG, DOS_DATE, DOS_TIME,
    END_OF_CENTRAL_DIR_SIG, FLAG_DATA_DESCRIPTOR, FLAG_UTF8, METHOD_DEFLATED, METHOD_STORED,
    VERSION_NEEDED,
};
use crate::compression::{Deflater, EngineStats};
use crate::error::{XlsxError, XlsxResult};

/// Central directory record of a written entry
#[derive(Debug, Clone)]
struct CentralRecord {
    name: String,
    flags: u16,
    method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    offset: u32,
}

/// Entry opened with [`ZipWriter::start_entry`]
struct OpenEntry {
    name: String,
    flags: u16,
    offset: u32,
    size_hint: Option<usize>,
    hasher: crc32fast::Hasher,
    uncompressed: u64,
    compressed: u64,
}

/// Totals for a finished archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub entries: usize,
    /// Uncompressed bytes of every entry
    pub bytes_in: u64,
    /// Bytes written to the sink, framing included
    pub bytes_written: u64,
    pub engine: EngineStats,
}

/// Writes a ZIP archive to `W`.
///
/// Entries are added either whole ([`add_entry`](Self::add_entry), sizes and
/// CRC in the local header) or streamed
/// ([`start_entry`](Self::start_entry) / [`write_chunk`](Self::write_chunk) /
/// [`finish_entry`](Self::finish_entry), sizes in a trailing data
/// descriptor). The central directory lists entries in insertion order.
/// Timestamps are fixed, so equal input gives equal bytes.
pub struct ZipWriter<W: Write> {
    sink: W,
    offset: u64,
    records: Vec<CentralRecord>,
    names: AHashSet<String>,
    deflater: Deflater,
    open: Option<OpenEntry>,
    header: Vec<u8>,
    compressed: Vec<u8>,
    bytes_in: u64,
}

fn flags_for(name: &str) -> u16 {
    if name.is_ascii() {
        0
    } else {
        FLAG_UTF8
    }
}

fn to_u32(value: u64, entry: &str, what: &str) -> XlsxResult<u32> {
    u32::try_from(value).map_err(|_| {
        XlsxError::archive(
            entry,
            format!("{} exceeds 4 GiB; ZIP64 output is not supported", what),
        )
    })
}

impl<W: Write> ZipWriter<W> {
    /// Create a writer compressing with `backend` at `level`
    pub fn new(sink: W, backend: CompressionBackend, level: u8) -> XlsxResult<Self> {
        Ok(Self {
            sink,
            offset: 0,
            records: Vec::new(),
            names: AHashSet::new(),
            deflater: Deflater::new(backend, level)?,
            open: None,
            header: Vec::with_capacity(128),
            compressed: Vec::new(),
            bytes_in: 0,
        })
    }

    /// Number of entries written so far
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether an entry with this name was already added
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn check_name(&self, name: &str) -> XlsxResult<()> {
        if self.open.is_some() {
            return Err(XlsxError::archive(
                name,
                "another entry is still open for streaming",
            ));
        }
        if name.is_empty() || name.starts_with('/') || name.contains('\\') {
            return Err(XlsxError::archive(
                name,
                "entry names must be relative and use forward slashes",
            ));
        }
        if name.len() > usize::from(u16::MAX) {
            return Err(XlsxError::archive(name, "entry name too long"));
        }
        if self.names.contains(name) {
            return Err(XlsxError::archive(name, "duplicate entry name"));
        }
        if self.records.len() >= usize::from(u16::MAX) {
            return Err(XlsxError::archive(
                name,
                "more than 65535 entries needs ZIP64",
            ));
        }
        Ok(())
    }

    fn emit(&mut self, bytes_from_header: bool, data: &[u8]) -> XlsxResult<()> {
        if bytes_from_header {
            self.sink.write_all(&self.header)?;
            self.offset += self.header.len() as u64;
        }
        if !data.is_empty() {
            self.sink.write_all(data)?;
            self.offset += data.len() as u64;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_local_header(
        &mut self,
        name: &str,
        flags: u16,
        method: u16,
        crc32: u32,
        compressed_size: u32,
        uncompressed_size: u32,
    ) -> XlsxResult<u32> {
        let offset = to_u32(self.offset, name, "archive offset")?;
        self.header.clear();
        put_u32(&mut self.header, super::LOCAL_HEADER_SIG);
        put_u16(&mut self.header, VERSION_NEEDED);
        put_u16(&mut self.header, flags);
        put_u16(&mut self.header, method);
        put_u16(&mut self.header, DOS_TIME);
        put_u16(&mut self.header, DOS_DATE);
        put_u32(&mut self.header, crc32);
        put_u32(&mut self.header, compressed_size);
        put_u32(&mut self.header, uncompressed_size);
        put_u16(&mut self.header, name.len() as u16);
        put_u16(&mut self.header, 0);
        self.header.extend_from_slice(name.as_bytes());
        self.emit(true, &[])?;
        Ok(offset)
    }

    /// Add a complete entry, compressed in memory
    pub fn add_entry(&mut self, name: &str, data: &[u8]) -> XlsxResult<()> {
        self.check_name(name)?;
        let uncompressed_size = to_u32(data.len() as u64, name, "entry size")?;
        let crc32 = crc32fast::hash(data);

        let mut compressed = std::mem::take(&mut self.compressed);
        compressed.clear();
        let mut method = METHOD_STORED;
        if self.deflater.level() > 0 && !data.is_empty() {
            self.deflater
                .engine_for(Some(data.len()))?
                .compress(data, &mut compressed)
                .map_err(|e| XlsxError::archive(name, e.to_string()))?;
            if compressed.len() < data.len() {
                method = METHOD_DEFLATED;
            }
        }
        let payload: &[u8] = if method == METHOD_DEFLATED {
            &compressed
        } else {
            data
        };
        let compressed_size = to_u32(payload.len() as u64, name, "compressed size")?;

        let flags = flags_for(name);
        let offset = self.write_local_header(
            name,
            flags,
            method,
            crc32,
            compressed_size,
            uncompressed_size,
        )?;
        self.names.insert(name.to_string());
        let result = self.emit(false, payload);
        self.compressed = compressed;
        result?;

        log::trace!(
            "zip: {} ({} -> {} bytes, method {})",
            name,
            uncompressed_size,
            compressed_size,
            method
        );
        self.bytes_in += u64::from(uncompressed_size);
        self.records.push(CentralRecord {
            name: name.to_string(),
            flags,
            method,
            crc32,
            compressed_size,
            uncompressed_size,
            offset,
        });
        Ok(())
    }

    /// Copy an entry from another archive without recompressing it
    pub fn add_raw(&mut self, name: &str, raw: RawEntry<'_>) -> XlsxResult<()> {
        self.check_name(name)?;
        if raw.method != METHOD_STORED && raw.method != METHOD_DEFLATED {
            return Err(XlsxError::archive(
                name,
                format!("unsupported compression method {}", raw.method),
            ));
        }
        let compressed_size = to_u32(raw.data.len() as u64, name, "compressed size")?;
        let flags = flags_for(name);
        let offset = self.write_local_header(
            name,
            flags,
            raw.method,
            raw.crc32,
            compressed_size,
            raw.uncompressed_size,
        )?;
        self.names.insert(name.to_string());
        self.emit(false, raw.data)?;
        log::trace!("zip: {} copied ({} bytes)", name, compressed_size);
        self.bytes_in += u64::from(raw.uncompressed_size);
        self.records.push(CentralRecord {
            name: name.to_string(),
            flags,
            method: raw.method,
            crc32: raw.crc32,
            compressed_size,
            uncompressed_size: raw.uncompressed_size,
            offset,
        });
        Ok(())
    }

    /// Open a streamed entry. The local header carries zero sizes and the
    /// data-descriptor flag; `size_hint` only steers engine selection.
    pub fn start_entry(&mut self, name: &str, size_hint: Option<usize>) -> XlsxResult<()> {
        self.check_name(name)?;
        let flags = flags_for(name) | FLAG_DATA_DESCRIPTOR;
        let offset = self.write_local_header(name, flags, METHOD_DEFLATED, 0, 0, 0)?;
        self.names.insert(name.to_string());
        self.open = Some(OpenEntry {
            name: name.to_string(),
            flags,
            offset,
            size_hint,
            hasher: crc32fast::Hasher::new(),
            uncompressed: 0,
            compressed: 0,
        });
        Ok(())
    }

    fn pump(&mut self, data: &[u8], finish: bool) -> XlsxResult<()> {
        let Some(open) = self.open.as_mut() else {
            return Err(XlsxError::archive_format("no entry is open for streaming"));
        };
        open.hasher.update(data);
        open.uncompressed += data.len() as u64;
        let size_hint = open.size_hint;

        let mut compressed = std::mem::take(&mut self.compressed);
        compressed.clear();
        let engine_result = self
            .deflater
            .engine_for(size_hint)
            .and_then(|engine| engine.compress_chunk(data, &mut compressed, finish));
        let result = engine_result.and_then(|_| self.emit(false, &compressed));
        if let Some(open) = self.open.as_mut() {
            open.compressed += compressed.len() as u64;
        }
        self.compressed = compressed;
        result
    }

    /// Append uncompressed bytes to the open entry
    pub fn write_chunk(&mut self, data: &[u8]) -> XlsxResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.pump(data, false)
    }

    /// Close the open entry and write its data descriptor
    pub fn finish_entry(&mut self) -> XlsxResult<()> {
        self.pump(&[], true)?;
        let Some(open) = self.open.take() else {
            return Err(XlsxError::archive_format("no entry is open for streaming"));
        };
        let crc32 = open.hasher.finalize();
        let uncompressed_size = to_u32(open.uncompressed, &open.name, "entry size")?;
        let compressed_size = to_u32(open.compressed, &open.name, "compressed size")?;

        self.header.clear();
        put_u32(&mut self.header, DATA_DESCRIPTOR_SIG);
        put_u32(&mut self.header, crc32);
        put_u32(&mut self.header, compressed_size);
        put_u32(&mut self.header, uncompressed_size);
        self.emit(true, &[])?;

        log::trace!(
            "zip: {} streamed ({} -> {} bytes)",
            open.name,
            uncompressed_size,
            compressed_size
        );
        self.bytes_in += u64::from(uncompressed_size);
        self.records.push(CentralRecord {
            name: open.name,
            flags: open.flags,
            method: METHOD_DEFLATED,
            crc32,
            compressed_size,
            uncompressed_size,
            offset: open.offset,
        });
        Ok(())
    }

    /// `io::Write` adapter over the open streamed entry
    pub fn entry_sink(&mut self) -> EntrySink<'_, W> {
        EntrySink { writer: self }
    }

    /// Counters so far
    pub fn stats(&self) -> ArchiveStats {
        ArchiveStats {
            entries: self.records.len(),
            bytes_in: self.bytes_in,
            bytes_written: self.offset,
            engine: self.deflater.stats(),
        }
    }

    /// Write the central directory and end record; returns the sink
    pub fn finish(mut self) -> XlsxResult<(W, ArchiveStats)> {
        if let Some(open) = &self.open {
            return Err(XlsxError::archive(
                open.name.clone(),
                "entry still open when the archive was finished",
            ));
        }
        let cd_offset = to_u32(self.offset, "central directory", "archive offset")?;
        let records = std::mem::take(&mut self.records);
        for r in &records {
            self.header.clear();
            put_u32(&mut self.header, CENTRAL_HEADER_SIG);
            put_u16(&mut self.header, VERSION_NEEDED); // made by: DOS, 2.0
            put_u16(&mut self.header, VERSION_NEEDED);
            put_u16(&mut self.header, r.flags);
            put_u16(&mut self.header, r.method);
            put_u16(&mut self.header, DOS_TIME);
            put_u16(&mut self.header, DOS_DATE);
            put_u32(&mut self.header, r.crc32);
            put_u32(&mut self.header, r.compressed_size);
            put_u32(&mut self.header, r.uncompressed_size);
            put_u16(&mut self.header, r.name.len() as u16);
            put_u16(&mut self.header, 0); // extra
            put_u16(&mut self.header, 0); // comment
            put_u16(&mut self.header, 0); // disk
            put_u16(&mut self.header, 0); // internal attrs
            put_u32(&mut self.header, 0); // external attrs
            put_u32(&mut self.header, r.offset);
            self.header.extend_from_slice(r.name.as_bytes());
            self.emit(true, &[])?;
        }
        let cd_size = to_u32(self.offset - u64::from(cd_offset), "central directory", "size")?;
        let count = records.len() as u16;

        self.header.clear();
        put_u32(&mut self.header, END_OF_CENTRAL_DIR_SIG);
        put_u16(&mut self.header, 0);
        put_u16(&mut self.header, 0);
        put_u16(&mut self.header, count);
        put_u16(&mut self.header, count);
        put_u32(&mut self.header, cd_size);
        put_u32(&mut self.header, cd_offset);
        put_u16(&mut self.header, 0);
        self.emit(true, &[])?;
        self.sink.flush()?;

        self.records = records;
        let stats = self.stats();
        log::debug!(
            "zip: finished {} entries, {} bytes",
            stats.entries,
            stats.bytes_written
        );
        Ok((self.sink, stats))
    }
}

/// Forwards writes to the open entry of a [`ZipWriter`]
pub struct EntrySink<'a, W: Write> {
    writer: &'a mut ZipWriter<W>,
}

impl<W: Write> Write for EntrySink<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write_chunk(buf).map_err(|e| match e {
            XlsxError::Io(io) => io,
            other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ZipArchive;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Read};

    fn writer() -> ZipWriter<Vec<u8>> {
        ZipWriter::new(Vec::new(), CompressionBackend::Portable, 6).unwrap()
    }

    #[test]
    fn test_buffered_entries_open_with_zip_crate() {
        let mut zw = writer();
        zw.add_entry("[Content_Types].xml", b"<Types/>").unwrap();
        zw.add_entry("xl/workbook.xml", &b"<workbook/>".repeat(100)).unwrap();
        let (bytes, stats) = zw.finish().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.bytes_written, bytes.len() as u64);

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "[Content_Types].xml");
        let mut text = String::new();
        archive
            .by_name("xl/workbook.xml")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "<workbook/>".repeat(100));
    }

    #[test]
    fn test_streamed_entry_has_descriptor() {
        let mut zw = writer();
        zw.start_entry("xl/worksheets/sheet1.xml", None).unwrap();
        for i in 0..500 {
            zw.write_chunk(format!("<row r=\"{}\"/>", i + 1).as_bytes()).unwrap();
        }
        zw.finish_entry().unwrap();
        let (bytes, _) = zw.finish().unwrap();

        // bit 3 in the local header flags
        assert_eq!(bytes[6] & 0x08, 0x08);
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.clone())).unwrap();
        let mut text = String::new();
        archive
            .by_name("xl/worksheets/sheet1.xml")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.starts_with("<row r=\"1\"/>"));
        assert!(text.ends_with("<row r=\"500\"/>"));

        let ours = ZipArchive::new(&bytes).unwrap();
        assert_eq!(ours.read("xl/worksheets/sheet1.xml").unwrap(), text.into_bytes());
    }

    #[test]
    fn test_rejects_bad_names() {
        let mut zw = writer();
        zw.add_entry("a.xml", b"").unwrap();
        assert!(zw.add_entry("a.xml", b"").is_err());
        assert!(zw.add_entry("/abs.xml", b"").is_err());
        assert!(zw.add_entry("dir\\file.xml", b"").is_err());
    }

    /// Refuses writes while `fail` is set
    struct FlakySink {
        fail: std::rc::Rc<std::cell::Cell<bool>>,
        buf: Vec<u8>,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.fail.get() {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            self.buf.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_entry_can_be_retried() {
        let fail = std::rc::Rc::new(std::cell::Cell::new(true));
        let sink = FlakySink {
            fail: fail.clone(),
            buf: Vec::new(),
        };
        let mut zw = ZipWriter::new(sink, CompressionBackend::Portable, 6).unwrap();
        assert!(matches!(zw.add_entry("a.xml", b"<a/>"), Err(XlsxError::Io(_))));
        assert!(!zw.contains("a.xml"));
        assert!(zw.start_entry("b.xml", None).is_err());
        assert!(!zw.contains("b.xml"));

        fail.set(false);
        zw.add_entry("a.xml", b"<a/>").unwrap();
        assert!(zw.add_entry("a.xml", b"<a/>").is_err());
        let (sink, stats) = zw.finish().unwrap();
        assert_eq!(stats.entries, 1);
        let ours = ZipArchive::new(&sink.buf).unwrap();
        assert_eq!(ours.read("a.xml").unwrap(), b"<a/>".to_vec());
    }

    #[test]
    fn test_open_entry_blocks_others() {
        let mut zw = writer();
        zw.start_entry("one.xml", None).unwrap();
        assert!(zw.add_entry("two.xml", b"x").is_err());
        let err = match zw.finish() {
            Err(e) => e,
            Ok(_) => panic!("finish with an open entry must fail"),
        };
        assert!(err.to_string().contains("one.xml"));
    }

    #[test]
    fn test_deterministic() {
        let build = || {
            let mut zw = writer();
            zw.add_entry("a.xml", &b"abc".repeat(1000)).unwrap();
            zw.start_entry("b.xml", Some(10)).unwrap();
            zw.write_chunk(b"streamed").unwrap();
            zw.finish_entry().unwrap();
            zw.finish().unwrap().0
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_utf8_flag() {
        let mut zw = writer();
        zw.add_entry("xl/media/bild\u{00e4}.png", b"x").unwrap();
        let (bytes, _) = zw.finish().unwrap();
        let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
        assert_eq!(flags & FLAG_UTF8, FLAG_UTF8);
    }

    #[test]
    fn test_entry_sink() {
        let mut zw = writer();
        zw.start_entry("s.xml", None).unwrap();
        write!(zw.entry_sink(), "<x>{}</x>", 42).unwrap();
        zw.finish_entry().unwrap();
        let (bytes, _) = zw.finish().unwrap();
        let ours = ZipArchive::new(&bytes).unwrap();
        assert_eq!(ours.read("s.xml").unwrap(), b"<x>42</x>");
    }
}
