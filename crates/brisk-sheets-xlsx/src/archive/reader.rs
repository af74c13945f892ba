//! ZIP archive reader over an in-memory package

use std::io::{self, Read};

use ahash::AHashMap;
use flate2::read::DeflateDecoder;

use super::{
    get_u16, get_u32, RawEntry, CENTRAL_HEADER_LEN, CENTRAL_HEADER_SIG, END_OF_CENTRAL_DIR_LEN,
    END_OF_CENTRAL_DIR_SIG, FLAG_ENCRYPTED, LOCAL_HEADER_LEN, LOCAL_HEADER_SIG, METHOD_DEFLATED,
    METHOD_STORED, ZIP64_LOCATOR_SIG,
};
use crate::compression::inflate;
use crate::error::{XlsxError, XlsxResult};

/// Largest archive comment; bounds the backward EOCD scan
const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// One entry as listed by the central directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub name: String,
    pub method: u16,
    pub flags: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    header_offset: u32,
}

impl ZipEntry {
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// Reads a ZIP archive held in memory.
///
/// The central directory is indexed on construction; entry data is only
/// located and decompressed when asked for.
#[derive(Debug)]
pub struct ZipArchive<'a> {
    data: &'a [u8],
    entries: Vec<ZipEntry>,
    index: AHashMap<String, usize>,
}

fn find_end_record(data: &[u8]) -> XlsxResult<usize> {
    if data.len() < END_OF_CENTRAL_DIR_LEN {
        return Err(XlsxError::archive_format(
            "file is too small to be a ZIP archive",
        ));
    }
    let last = data.len() - END_OF_CENTRAL_DIR_LEN;
    let first = last.saturating_sub(MAX_COMMENT_LEN);
    // Scan backwards; a candidate is valid when its comment ends at EOF
    for pos in (first..=last).rev() {
        if get_u32(data, pos) == Some(END_OF_CENTRAL_DIR_SIG) {
            let comment = get_u16(data, pos + 20).map_or(usize::MAX, usize::from);
            if pos + END_OF_CENTRAL_DIR_LEN + comment <= data.len() {
                return Ok(pos);
            }
        }
    }
    Err(XlsxError::archive_format(
        "end of central directory record not found",
    ))
}

impl<'a> ZipArchive<'a> {
    /// Index the archive in `data`
    pub fn new(data: &'a [u8]) -> XlsxResult<Self> {
        let eocd = find_end_record(data)?;
        if eocd >= 20 && get_u32(data, eocd - 20) == Some(ZIP64_LOCATOR_SIG) {
            return Err(XlsxError::archive_format(
                "ZIP64 archives are not supported",
            ));
        }
        let field16 = |at: usize| get_u16(data, eocd + at).unwrap_or(0);
        let field32 = |at: usize| get_u32(data, eocd + at).unwrap_or(0);
        let (disk, cd_disk) = (field16(4), field16(6));
        let count = field16(10);
        let cd_size = field32(12);
        let cd_offset = field32(16);
        if count == u16::MAX || cd_size == u32::MAX || cd_offset == u32::MAX {
            return Err(XlsxError::archive_format(
                "ZIP64 archives are not supported",
            ));
        }
        if disk != 0 || cd_disk != 0 {
            return Err(XlsxError::archive_format(
                "multi-disk archives are not supported",
            ));
        }
        let cd_start = cd_offset as usize;
        let cd_end = cd_start + cd_size as usize;
        if cd_end > eocd {
            return Err(XlsxError::archive_format(
                "central directory extends past its end record",
            ));
        }

        let mut entries = Vec::with_capacity(usize::from(count));
        let mut index = AHashMap::with_capacity(usize::from(count));
        let mut pos = cd_start;
        for _ in 0..count {
            let truncated = || XlsxError::archive_format("truncated central directory");
            if get_u32(data, pos) != Some(CENTRAL_HEADER_SIG) {
                return Err(XlsxError::archive_format(format!(
                    "bad central directory signature at offset {}",
                    pos
                )));
            }
            let flags = get_u16(data, pos + 8).ok_or_else(truncated)?;
            let method = get_u16(data, pos + 10).ok_or_else(truncated)?;
            let crc32 = get_u32(data, pos + 16).ok_or_else(truncated)?;
            let compressed_size = get_u32(data, pos + 20).ok_or_else(truncated)?;
            let uncompressed_size = get_u32(data, pos + 24).ok_or_else(truncated)?;
            let name_len = usize::from(get_u16(data, pos + 28).ok_or_else(truncated)?);
            let extra_len = usize::from(get_u16(data, pos + 30).ok_or_else(truncated)?);
            let comment_len = usize::from(get_u16(data, pos + 32).ok_or_else(truncated)?);
            let header_offset = get_u32(data, pos + 42).ok_or_else(truncated)?;
            let name_start = pos + CENTRAL_HEADER_LEN;
            let name_bytes = data
                .get(name_start..name_start + name_len)
                .ok_or_else(truncated)?;
            let name = String::from_utf8_lossy(name_bytes).into_owned();

            if compressed_size == u32::MAX
                || uncompressed_size == u32::MAX
                || header_offset == u32::MAX
            {
                return Err(XlsxError::archive(name, "ZIP64 entries are not supported"));
            }
            if flags & FLAG_ENCRYPTED != 0 {
                return Err(XlsxError::archive(name, "encrypted entries are not supported"));
            }

            index.entry(name.clone()).or_insert(entries.len());
            entries.push(ZipEntry {
                name,
                method,
                flags,
                crc32,
                compressed_size,
                uncompressed_size,
                header_offset,
            });
            pos = name_start + name_len + extra_len + comment_len;
        }
        if entries.len() != usize::from(count) {
            return Err(XlsxError::archive_format("entry count mismatch"));
        }
        log::trace!("zip: indexed {} entries", entries.len());
        Ok(Self {
            data,
            entries,
            index,
        })
    }

    /// Entries in central directory order
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Entry names in central directory order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name.strip_prefix('/').unwrap_or(name))
    }

    pub fn entry(&self, name: &str) -> Option<&ZipEntry> {
        self.index
            .get(name.strip_prefix('/').unwrap_or(name))
            .map(|&i| &self.entries[i])
    }

    fn require(&self, name: &str) -> XlsxResult<&ZipEntry> {
        self.entry(name)
            .ok_or_else(|| XlsxError::MissingPart(name.to_string()))
    }

    /// Locate the compressed bytes of an entry, checking its local header
    fn payload(&self, entry: &ZipEntry) -> XlsxResult<&'a [u8]> {
        let data = self.data;
        let at = entry.header_offset as usize;
        if get_u32(data, at) != Some(LOCAL_HEADER_SIG) {
            return Err(XlsxError::archive(&entry.name, "bad local header signature"));
        }
        let truncated = || XlsxError::archive(&entry.name, "truncated local header");
        let name_len = usize::from(get_u16(data, at + 26).ok_or_else(truncated)?);
        let extra_len = usize::from(get_u16(data, at + 28).ok_or_else(truncated)?);
        let name_start = at + LOCAL_HEADER_LEN;
        let local_name = data
            .get(name_start..name_start + name_len)
            .ok_or_else(truncated)?;
        if local_name != entry.name.as_bytes() {
            return Err(XlsxError::archive(
                &entry.name,
                format!(
                    "local header names '{}'",
                    String::from_utf8_lossy(local_name)
                ),
            ));
        }
        let start = name_start + name_len + extra_len;
        data.get(start..start + entry.compressed_size as usize)
            .ok_or_else(|| XlsxError::archive(&entry.name, "entry data is truncated"))
    }

    /// Compressed bytes and metadata of an entry, for copying it verbatim
    pub fn raw(&self, name: &str) -> XlsxResult<RawEntry<'a>> {
        let entry = self.require(name)?;
        Ok(RawEntry {
            method: entry.method,
            crc32: entry.crc32,
            uncompressed_size: entry.uncompressed_size,
            data: self.payload(entry)?,
        })
    }

    /// Decompress an entry completely, verifying size and CRC
    pub fn read(&self, name: &str) -> XlsxResult<Vec<u8>> {
        let entry = self.require(name)?;
        let payload = self.payload(entry)?;
        let bytes = match entry.method {
            METHOD_STORED => payload.to_vec(),
            METHOD_DEFLATED => inflate(payload, entry.uncompressed_size as usize)
                .map_err(|e| XlsxError::archive(&entry.name, e.to_string()))?,
            other => {
                return Err(XlsxError::archive(
                    &entry.name,
                    format!("unsupported compression method {}", other),
                ))
            }
        };
        if bytes.len() != entry.uncompressed_size as usize {
            return Err(XlsxError::archive(
                &entry.name,
                format!(
                    "size mismatch: expected {} bytes, got {}",
                    entry.uncompressed_size,
                    bytes.len()
                ),
            ));
        }
        let crc = crc32fast::hash(&bytes);
        if crc != entry.crc32 {
            return Err(XlsxError::archive(
                &entry.name,
                format!("CRC mismatch: expected {:08x}, got {:08x}", entry.crc32, crc),
            ));
        }
        Ok(bytes)
    }

    /// Streaming reader over an entry's uncompressed bytes. Size and CRC are
    /// checked when the stream reaches its end.
    pub fn open(&self, name: &str) -> XlsxResult<EntryReader<'a>> {
        let entry = self.require(name)?;
        let payload = self.payload(entry)?;
        let source = match entry.method {
            METHOD_STORED => Source::Stored(payload),
            METHOD_DEFLATED => Source::Deflated(Box::new(DeflateDecoder::new(payload))),
            other => {
                return Err(XlsxError::archive(
                    &entry.name,
                    format!("unsupported compression method {}", other),
                ))
            }
        };
        Ok(EntryReader {
            name: entry.name.clone(),
            source,
            hasher: crc32fast::Hasher::new(),
            read: 0,
            expected_size: u64::from(entry.uncompressed_size),
            expected_crc: entry.crc32,
            verified: false,
        })
    }
}

enum Source<'a> {
    Stored(&'a [u8]),
    Deflated(Box<DeflateDecoder<&'a [u8]>>),
}

/// Byte source returned by [`ZipArchive::open`]
pub struct EntryReader<'a> {
    name: String,
    source: Source<'a>,
    hasher: crc32fast::Hasher,
    read: u64,
    expected_size: u64,
    expected_crc: u32,
    verified: bool,
}

impl EntryReader<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn verify(&mut self) -> io::Result<()> {
        if self.verified {
            return Ok(());
        }
        self.verified = true;
        let crc = self.hasher.clone().finalize();
        if self.read != self.expected_size || crc != self.expected_crc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "entry '{}' failed verification ({} of {} bytes, CRC {:08x} vs {:08x})",
                    self.name, self.read, self.expected_size, crc, self.expected_crc
                ),
            ));
        }
        Ok(())
    }
}

impl Read for EntryReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.source {
            Source::Stored(rest) => rest.read(buf)?,
            Source::Deflated(decoder) => decoder.read(buf)?,
        };
        if n == 0 && !buf.is_empty() {
            self.verify()?;
            return Ok(0);
        }
        self.hasher.update(&buf[..n]);
        self.read += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ZipWriter;
    use brisk_sheets_core::{CompressionBackend, ErrorKind};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::io::{Cursor, Write};

    fn build(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zw = ZipWriter::new(Vec::new(), CompressionBackend::Portable, 6).unwrap();
        for (name, data) in entries {
            zw.add_entry(name, data).unwrap();
        }
        zw.finish().unwrap().0
    }

    #[test]
    fn test_reads_zip_crate_output() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let deflated = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            let stored = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            zip.start_file("xl/workbook.xml", deflated).unwrap();
            zip.write_all(&b"<workbook/>".repeat(50)).unwrap();
            zip.start_file("docProps/app.xml", stored).unwrap();
            zip.write_all(b"<Properties/>").unwrap();
            zip.set_comment("written by the zip crate");
            zip.finish().unwrap();
        }
        let bytes = cursor.into_inner();
        let archive = ZipArchive::new(&bytes).unwrap();
        assert_eq!(
            archive.names().collect::<Vec<_>>(),
            vec!["xl/workbook.xml", "docProps/app.xml"]
        );
        assert_eq!(archive.read("xl/workbook.xml").unwrap(), b"<workbook/>".repeat(50));
        assert_eq!(archive.read("docProps/app.xml").unwrap(), b"<Properties/>");
    }

    #[test]
    fn test_missing_entry() {
        let bytes = build(&[("a.xml", b"a")]);
        let archive = ZipArchive::new(&bytes).unwrap();
        assert!(matches!(archive.read("b.xml"), Err(XlsxError::MissingPart(_))));
        assert!(archive.contains("/a.xml"));
    }

    #[test]
    fn test_crc_mismatch_names_entry() {
        let mut bytes = build(&[("data.bin", b"0123456789")]);
        // stored entry (deflate would not shrink it); flip a payload byte
        let payload_at = LOCAL_HEADER_LEN + "data.bin".len();
        bytes[payload_at] ^= 0xFF;
        let archive = ZipArchive::new(&bytes).unwrap();
        let err = archive.read("data.bin").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Archive);
        assert!(err.to_string().contains("data.bin"));
        assert!(err.to_string().contains("CRC"));

        let mut reader = archive.open("data.bin").unwrap();
        let mut sink = Vec::new();
        assert!(reader.read_to_end(&mut sink).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(
            ZipArchive::new(b"not a zip").unwrap_err().kind(),
            ErrorKind::Archive
        );
        assert!(ZipArchive::new(&[0u8; 100]).is_err());
    }

    #[test]
    fn test_truncated_archive() {
        let bytes = build(&[("a.xml", &b"hello world ".repeat(100))]);
        assert!(ZipArchive::new(&bytes[..bytes.len() - 5]).is_err());
    }

    #[test]
    fn test_encrypted_flag_rejected() {
        let mut bytes = build(&[("secret.xml", b"x")]);
        let eocd = find_end_record(&bytes).unwrap();
        let cd = get_u32(&bytes, eocd + 16).unwrap() as usize;
        bytes[cd + 8] |= 1;
        let err = ZipArchive::new(&bytes).unwrap_err();
        assert!(err.to_string().contains("secret.xml"));
    }

    #[test]
    fn test_zip64_locator_rejected() {
        let mut bytes = build(&[("a.xml", b"x")]);
        let eocd = find_end_record(&bytes).unwrap();
        let mut locator = Vec::new();
        locator.extend_from_slice(&ZIP64_LOCATOR_SIG.to_le_bytes());
        locator.extend_from_slice(&[0u8; 16]);
        bytes.splice(eocd..eocd, locator);
        let err = ZipArchive::new(&bytes).unwrap_err();
        assert!(err.to_string().contains("ZIP64"));
    }

    #[test]
    fn test_streaming_open() {
        let body = b"<sheetData/>".repeat(1000);
        let bytes = build(&[("s.xml", &body)]);
        let archive = ZipArchive::new(&bytes).unwrap();
        let mut reader = archive.open("s.xml").unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, body);
        assert_eq!(reader.name(), "s.xml");
    }

    #[test]
    fn test_raw_copy() {
        let body = b"copy me ".repeat(400);
        let source = build(&[("p.xml", &body)]);
        let archive = ZipArchive::new(&source).unwrap();
        let mut zw = ZipWriter::new(Vec::new(), CompressionBackend::Portable, 1).unwrap();
        zw.add_raw("p.xml", archive.raw("p.xml").unwrap()).unwrap();
        let (copy, _) = zw.finish().unwrap();
        assert_eq!(ZipArchive::new(&copy).unwrap().read("p.xml").unwrap(), body);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn prop_crc_and_sizes_hold(
            parts in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..2048), 1..6)
        ) {
            let names: Vec<String> = (0..parts.len()).map(|i| format!("part{}.bin", i)).collect();
            let entries: Vec<(&str, &[u8])> = names
                .iter()
                .zip(&parts)
                .map(|(n, p)| (n.as_str(), p.as_slice()))
                .collect();
            let bytes = build(&entries);
            let archive = ZipArchive::new(&bytes).unwrap();
            prop_assert_eq!(archive.len(), parts.len());
            for (entry, data) in archive.entries().iter().zip(&parts) {
                prop_assert_eq!(entry.crc32, crc32fast::hash(data));
                prop_assert_eq!(entry.uncompressed_size as usize, data.len());
                prop_assert_eq!(&archive.read(&entry.name).unwrap(), data);
            }
        }
    }
}
