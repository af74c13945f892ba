//! ZIP container: writer (buffered and streaming entries) and reader.
//!
//! Only what OOXML packages need: stored and deflated entries, no ZIP64, no
//! encryption. Both sides use the same little-endian record layouts below.

mod reader;
mod writer;

pub use reader::{EntryReader, ZipArchive, ZipEntry};
pub use writer::{ArchiveStats, ZipWriter};

pub(crate) const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
pub(crate) const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
pub(crate) const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;
pub(crate) const ZIP64_LOCATOR_SIG: u32 = 0x0706_4b50;
pub(crate) const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;

pub(crate) const LOCAL_HEADER_LEN: usize = 30;
pub(crate) const CENTRAL_HEADER_LEN: usize = 46;
pub(crate) const END_OF_CENTRAL_DIR_LEN: usize = 22;

/// Version 2.0: deflate
pub(crate) const VERSION_NEEDED: u16 = 20;

/// General purpose flag bits
pub(crate) const FLAG_ENCRYPTED: u16 = 1;
pub(crate) const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
pub(crate) const FLAG_UTF8: u16 = 1 << 11;

/// DOS time 00:00:00 and date 1980-01-01, fixed for reproducible output
pub(crate) const DOS_TIME: u16 = 0;
pub(crate) const DOS_DATE: u16 = (1 << 5) | 1;

/// Compression methods
pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATED: u16 = 8;

/// An entry's compressed payload plus the metadata needed to copy it into
/// another archive without recompressing
#[derive(Debug, Clone, Copy)]
pub struct RawEntry<'a> {
    pub method: u16,
    pub crc32: u32,
    pub uncompressed_size: u32,
    pub data: &'a [u8],
}

pub(crate) fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn get_u16(buf: &[u8], at: usize) -> Option<u16> {
    buf.get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn get_u32(buf: &[u8], at: usize) -> Option<u32> {
    buf.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
