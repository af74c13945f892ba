//! Archive laws checked against the `zip` crate.

use std::io::{Cursor, Read, Write};

use brisk_sheets_core::CompressionBackend;
use brisk_sheets_xlsx::archive::{ZipArchive, ZipWriter, METHOD_DEFLATED, METHOD_STORED};
use proptest::prelude::*;

fn payloads() -> impl Strategy<Value = Vec<Vec<u8>>> {
    let text = "[a-c<>/ ]{0,600}".prop_map(String::into_bytes);
    let binary = prop::collection::vec(any::<u8>(), 0..600);
    prop::collection::vec(prop_oneof![text, binary], 1..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_entries_survive_both_readers(data in payloads(), level in 0u8..=9, stream in any::<bool>()) {
        let mut zip = ZipWriter::new(Vec::new(), CompressionBackend::Portable, level).unwrap();
        for (i, payload) in data.iter().enumerate() {
            let name = format!("xl/part{}.xml", i);
            if stream {
                zip.start_entry(&name, None).unwrap();
                for chunk in payload.chunks(97) {
                    zip.write_chunk(chunk).unwrap();
                }
                zip.finish_entry().unwrap();
            } else {
                zip.add_entry(&name, payload).unwrap();
            }
        }
        let (bytes, stats) = zip.finish().unwrap();

        prop_assert_eq!(stats.entries, data.len());
        prop_assert_eq!(stats.bytes_in, data.iter().map(|d| d.len() as u64).sum::<u64>());
        prop_assert_eq!(stats.bytes_written, bytes.len() as u64);

        let ours = ZipArchive::new(&bytes).unwrap();
        let mut theirs = zip::ZipArchive::new(Cursor::new(&bytes)).unwrap();
        for (i, payload) in data.iter().enumerate() {
            let name = format!("xl/part{}.xml", i);
            prop_assert_eq!(&ours.read(&name).unwrap(), payload);

            let entry = ours.entry(&name).unwrap();
            prop_assert_eq!(entry.crc32, crc32fast::hash(payload));
            prop_assert_eq!(entry.uncompressed_size as usize, payload.len());
            prop_assert!(entry.method == METHOD_STORED || entry.method == METHOD_DEFLATED);
            if !stream {
                // stored whenever deflate would not shrink the payload
                prop_assert!(entry.compressed_size as usize <= payload.len());
            }

            let mut file = theirs.by_name(&name).unwrap();
            prop_assert_eq!(file.crc32(), entry.crc32);
            let mut read = Vec::new();
            file.read_to_end(&mut read).unwrap();
            prop_assert_eq!(&read, payload);
        }
    }

    #[test]
    fn test_raw_copy_is_byte_exact(data in payloads()) {
        let mut zip = ZipWriter::new(Vec::new(), CompressionBackend::Portable, 6).unwrap();
        for (i, payload) in data.iter().enumerate() {
            zip.add_entry(&format!("p{}", i), payload).unwrap();
        }
        let (first, _) = zip.finish().unwrap();

        let source = ZipArchive::new(&first).unwrap();
        let mut copy = ZipWriter::new(Vec::new(), CompressionBackend::Portable, 1).unwrap();
        for name in source.names() {
            copy.add_raw(name, source.raw(name).unwrap()).unwrap();
        }
        let (second, stats) = copy.finish().unwrap();
        prop_assert_eq!(stats.engine.calls, 0);
        prop_assert_eq!(first, second);
    }
}

#[test]
fn test_foreign_archive_is_readable() {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::<()>::default()
        .compression_method(zip::CompressionMethod::Deflated);
    writer.start_file("a.xml", options).unwrap();
    writer.write_all(&b"<a>hello</a>".repeat(200)).unwrap();
    writer.start_file("b.bin", options.compression_method(zip::CompressionMethod::Stored)).unwrap();
    writer.write_all(&[0, 1, 2, 3]).unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let archive = ZipArchive::new(&bytes).unwrap();
    assert_eq!(archive.names().collect::<Vec<_>>(), vec!["a.xml", "b.bin"]);
    assert_eq!(archive.read("a.xml").unwrap(), b"<a>hello</a>".repeat(200));
    assert_eq!(archive.read("b.bin").unwrap(), vec![0, 1, 2, 3]);
    assert!(archive.read("c.xml").is_err());
}

#[test]
fn test_fixed_timestamps_make_output_reproducible() {
    let build = || {
        let mut zip = ZipWriter::new(Vec::new(), CompressionBackend::Auto, 6).unwrap();
        zip.add_entry("x.xml", b"<x/>").unwrap();
        zip.finish().unwrap().0
    };
    assert_eq!(build(), build());
}
