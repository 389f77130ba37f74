use protopack::{
    summarize_file, ChunkReader, PackError, PackReader, PackWriter, ReadOptions,
    TypeDescriptor, SPECIAL_SECTION,
};
use std::fs::File;
use std::io::{BufReader, Cursor};
use tempfile::NamedTempFile;

const HEADER_LEN: usize = 11; // 9 magic bytes + major + minor

#[test]
fn test_write_and_read_roundtrip() {
    let temp_file = NamedTempFile::new().unwrap();
    let pack_path = temp_file.path().to_path_buf();

    {
        let file = File::create(&pack_path).unwrap();
        let mut writer = PackWriter::new(file).unwrap();
        let id = writer.declare_type(&TypeDescriptor::new("Event")).unwrap();
        assert_eq!(id, 1);
        writer.write_entry(3, id, b"hello").unwrap();
        writer.close().unwrap();
    }

    {
        let file = File::open(&pack_path).unwrap();
        let mut reader = PackReader::new(BufReader::new(file)).unwrap();
        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.section, 3);
        assert_eq!(entry.type_id, 1);
        assert_eq!(entry.descriptor.name, "Event");
        assert_eq!(entry.payload, b"hello");
        assert!(reader.next_entry().unwrap().is_none());
    }
}

#[test]
fn test_entries_come_back_in_write_order() {
    let temp_file = NamedTempFile::new().unwrap();
    let pack_path = temp_file.path().to_path_buf();

    {
        let file = File::create(&pack_path).unwrap();
        let mut writer = PackWriter::new(file).unwrap();
        let id = writer.declare_type(&TypeDescriptor::new("Event")).unwrap();
        writer.write_entry(5, id, b"a").unwrap();
        writer.write_entry(5, id, b"bb").unwrap();
        writer.write_entry(7, id, b"ccc").unwrap();
        writer.close().unwrap();
    }

    {
        let file = File::open(&pack_path).unwrap();
        let mut reader = PackReader::new(BufReader::new(file)).unwrap();
        let seen: Vec<(u64, Vec<u8>)> = reader
            .entries()
            .map(|e| e.map(|entry| (entry.section, entry.payload)).unwrap())
            .collect();
        assert_eq!(
            seen,
            vec![
                (5, b"a".to_vec()),
                (5, b"bb".to_vec()),
                (7, b"ccc".to_vec()),
            ]
        );
    }
}

#[test]
fn test_declarations_hit_the_wire_once() {
    let temp_file = NamedTempFile::new().unwrap();
    let pack_path = temp_file.path().to_path_buf();

    let desc = TypeDescriptor::with_schema("trace.Event", vec![9, 9]);
    {
        let file = File::create(&pack_path).unwrap();
        let mut writer = PackWriter::new(file).unwrap();
        for payload in [b"one".as_slice(), b"two", b"three"] {
            writer.append(4, &desc, payload).unwrap();
        }
        writer.close().unwrap();
    }

    let bytes = std::fs::read(&pack_path).unwrap();
    let mut chunks = ChunkReader::new(Cursor::new(&bytes[HEADER_LEN..]));
    let mut declarations = 0;
    let mut entries = 0;
    while let Some(chunk) = chunks.next_chunk().unwrap() {
        if chunk.section == SPECIAL_SECTION {
            declarations += 1;
        } else {
            entries += 1;
        }
    }
    assert_eq!(declarations, 1);
    assert_eq!(entries, 3);
}

#[test]
fn test_truncated_pack_reports_offset_then_latches() {
    let temp_file = NamedTempFile::new().unwrap();
    let pack_path = temp_file.path().to_path_buf();

    {
        let file = File::create(&pack_path).unwrap();
        let mut writer = PackWriter::new(file).unwrap();
        let id = writer.declare_type(&TypeDescriptor::new("Event")).unwrap();
        writer.write_entry(2, id, b"survives").unwrap();
        writer.write_entry(2, id, b"this one is cut off").unwrap();
        writer.close().unwrap();
    }

    let mut bytes = std::fs::read(&pack_path).unwrap();
    bytes.truncate(bytes.len() - 4);
    let cut_len = bytes.len() as u64;
    std::fs::write(&pack_path, &bytes).unwrap();

    {
        let file = File::open(&pack_path).unwrap();
        let mut reader = PackReader::new(BufReader::new(file)).unwrap();
        assert_eq!(reader.next_entry().unwrap().unwrap().payload, b"survives");
        match reader.next_entry() {
            Err(PackError::Truncated { offset, what }) => {
                assert_eq!(offset, cut_len);
                assert_eq!(what, "chunk payload");
            }
            other => panic!("expected Truncated, got {other:?}"),
        }
        assert!(matches!(reader.next_entry(), Err(PackError::Failed)));
    }
}

#[test]
fn test_header_tampering_is_detected() {
    let temp_file = NamedTempFile::new().unwrap();
    let pack_path = temp_file.path().to_path_buf();

    {
        let file = File::create(&pack_path).unwrap();
        let mut writer = PackWriter::new(file).unwrap();
        writer.append(1, &TypeDescriptor::new("Event"), b"x").unwrap();
        writer.close().unwrap();
    }
    let pristine = std::fs::read(&pack_path).unwrap();

    // Flipped magic byte.
    let mut bad_magic = pristine.clone();
    bad_magic[0] ^= 0x20;
    std::fs::write(&pack_path, &bad_magic).unwrap();
    assert!(matches!(
        PackReader::new(BufReader::new(File::open(&pack_path).unwrap())),
        Err(PackError::IncorrectMagic(_))
    ));

    // Bumped minor version: rejected strictly, readable with the opt-in.
    let mut newer_minor = pristine.clone();
    newer_minor[10] = 5;
    std::fs::write(&pack_path, &newer_minor).unwrap();
    assert!(matches!(
        PackReader::new(BufReader::new(File::open(&pack_path).unwrap())),
        Err(PackError::UnknownVersion(_))
    ));
    let mut lenient = PackReader::with_options(
        BufReader::new(File::open(&pack_path).unwrap()),
        ReadOptions {
            accept_newer_minor: true,
        },
    )
    .unwrap();
    assert_eq!(lenient.version().minor, 5);
    assert_eq!(lenient.next_entry().unwrap().unwrap().payload, b"x");
}

#[test]
fn test_header_only_pack_is_empty_not_an_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let pack_path = temp_file.path().to_path_buf();

    {
        let file = File::create(&pack_path).unwrap();
        let writer = PackWriter::new(file).unwrap();
        writer.close().unwrap();
    }
    assert_eq!(std::fs::metadata(&pack_path).unwrap().len(), HEADER_LEN as u64);

    let file = File::open(&pack_path).unwrap();
    let mut reader = PackReader::new(BufReader::new(file)).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.registry().is_empty());

    let summary = summarize_file(&pack_path).unwrap();
    assert_eq!(summary.chunk_count, 0);
    assert!(!summary.truncated);
}

#[test]
fn test_summary_matches_written_content() {
    let temp_file = NamedTempFile::new().unwrap();
    let pack_path = temp_file.path().to_path_buf();

    {
        let file = File::create(&pack_path).unwrap();
        let mut writer = PackWriter::new(file).unwrap();
        let event = writer.declare_type(&TypeDescriptor::new("Event")).unwrap();
        let blob = writer
            .declare_type(&TypeDescriptor::with_schema("Blob", vec![0; 4]))
            .unwrap();
        writer.write_entry(5, event, b"aaaa").unwrap();
        writer.write_entry(6, blob, b"bb").unwrap();
        writer.write_entry(5, event, b"c").unwrap();
        writer.close().unwrap();
    }

    let summary = summarize_file(&pack_path).unwrap();
    assert_eq!(summary.chunk_count, 5);
    assert_eq!(summary.declaration_count, 2);
    assert_eq!(summary.entry_count, 3);
    assert_eq!(summary.payload_bytes, 7);
    assert_eq!(
        summary.stream_bytes,
        std::fs::metadata(&pack_path).unwrap().len()
    );

    let sections: Vec<u64> = summary.sections.iter().map(|s| s.id).collect();
    assert_eq!(sections, vec![SPECIAL_SECTION, 5, 6]);

    assert_eq!(summary.types.len(), 2);
    assert_eq!(summary.types[0].name, "Event");
    assert_eq!(summary.types[0].entries, 2);
    assert_eq!(summary.types[1].schema_len, 4);
}

#[test]
fn test_entry_relay_is_byte_identical() {
    let src_file = NamedTempFile::new().unwrap();
    let dst_file = NamedTempFile::new().unwrap();

    // Built through append so declarations sit at first use, the same
    // placement a relay produces.
    {
        let file = File::create(src_file.path()).unwrap();
        let mut writer = PackWriter::new(file).unwrap();
        let event = TypeDescriptor::new("Event");
        let frame = TypeDescriptor::with_schema("Frame", vec![1]);
        writer.append(2, &event, b"first").unwrap();
        writer.append(3, &frame, b"second").unwrap();
        writer.append(2, &event, b"third").unwrap();
        writer.close().unwrap();
    }

    {
        let mut reader =
            PackReader::new(BufReader::new(File::open(src_file.path()).unwrap())).unwrap();
        let mut writer = PackWriter::new(File::create(dst_file.path()).unwrap()).unwrap();
        for entry in reader.entries() {
            let entry = entry.unwrap();
            writer
                .append(entry.section, &entry.descriptor, &entry.payload)
                .unwrap();
        }
        writer.close().unwrap();
    }

    let src_bytes = std::fs::read(src_file.path()).unwrap();
    let dst_bytes = std::fs::read(dst_file.path()).unwrap();
    assert_eq!(src_bytes, dst_bytes);
}
