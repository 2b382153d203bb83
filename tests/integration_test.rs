use std::collections::HashMap;

use gcc_ocf::dirpack::{self, pack_dir_classic, pack_dir_single_text_only, DirPackOptions};
use gcc_ocf::gca::GcaReader;
use gcc_ocf::pipeline::{compress_with_pipeline, decompress, PipelineSpec, PIPELINE_SCHEMA};
use gcc_ocf::topdb::PlanSpec;
use gcc_ocf::verify::{self, VerifyLevel};

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

#[test]
fn pack_and_unpack_a_single_file_round_trips() {
    init_tracing();
    let data = b"the quick brown fox jumps over the lazy dog".repeat(8);
    let spec = PipelineSpec {
        spec: PIPELINE_SCHEMA.to_string(),
        name: None,
        layer: "vc0".to_string(),
        codec: Some("zlib".to_string()),
        stream_codecs: None,
        mbn: None,
    };
    let container_bytes = compress_with_pipeline(&data, &spec).unwrap();
    assert!(container_bytes.len() < data.len());
    let decoded = decompress(&container_bytes).unwrap();
    assert_eq!(decoded, data);

    verify::verify_container(&container_bytes, VerifyLevel::Full).unwrap();
}

#[test]
fn directory_pack_classic_then_verify_full() {
    init_tracing();
    let src = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("notes.txt"), b"one\ntwo\none\nthree\n".repeat(3)).unwrap();
    std::fs::write(src.path().join("log.txt"), b"event 1\nevent 2\nevent 1\n".repeat(3)).unwrap();

    let files = dirpack::walk_files(src.path()).unwrap();
    assert_eq!(files.len(), 2);

    let mut candidate_pools = HashMap::new();
    candidate_pools.insert(
        "textish".to_string(),
        vec![
            PlanSpec {
                layer: "bytes".to_string(),
                codec: Some("zlib".to_string()),
                stream_codecs: None,
                note: Some("bytes-zlib".to_string()),
            },
            PlanSpec {
                layer: "lines_dict".to_string(),
                codec: Some("zlib".to_string()),
                stream_codecs: None,
                note: Some("lines-dict-zlib".to_string()),
            },
        ],
    );

    let out = tempfile::tempdir().unwrap();
    let mut opts = DirPackOptions {
        buckets: 1,
        ..Default::default()
    };
    opts.candidate_pools = candidate_pools;
    pack_dir_classic(&files, out.path(), &opts).unwrap();

    verify::verify_dir_classic(out.path(), VerifyLevel::Full).unwrap();

    let archive_bytes = std::fs::read(out.path().join("bucket_0000.gca")).unwrap();
    let reader = GcaReader::open(&archive_bytes).unwrap();
    assert_eq!(reader.iter_entries().count(), 2);
}

#[test]
fn single_container_text_only_dir_pack_round_trips() {
    init_tracing();
    let src = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("a.txt"), b"alpha 1\n").unwrap();
    std::fs::write(src.path().join("b.txt"), b"beta 22\n").unwrap();

    let files = dirpack::walk_files(src.path()).unwrap();
    let (container_bytes, index) = pack_dir_single_text_only(&files).unwrap();
    let decoded = decompress(&container_bytes).unwrap();
    for entry in &index.entries {
        let slice = &decoded[entry.offset as usize..(entry.offset + entry.length) as usize];
        let expected = files.iter().find(|(rel, _)| rel == &entry.rel).unwrap();
        assert_eq!(slice, expected.1.as_slice());
    }
}

#[test]
fn tampered_archive_blob_fails_full_verify_but_not_light() {
    init_tracing();
    let files = vec![("only.txt".to_string(), b"stable content for tampering test\n".repeat(4))];
    let mut candidate_pools = HashMap::new();
    candidate_pools.insert(
        "textish".to_string(),
        vec![PlanSpec {
            layer: "bytes".to_string(),
            codec: Some("zlib".to_string()),
            stream_codecs: None,
            note: None,
        }],
    );
    let out = tempfile::tempdir().unwrap();
    let mut opts = DirPackOptions {
        buckets: 1,
        ..Default::default()
    };
    opts.candidate_pools = candidate_pools;
    pack_dir_classic(&files, out.path(), &opts).unwrap();

    let archive_path = out.path().join("bucket_0000.gca");
    let mut archive_bytes = std::fs::read(&archive_path).unwrap();
    archive_bytes[0] ^= 0xff;
    std::fs::write(&archive_path, &archive_bytes).unwrap();

    verify::verify_dir_classic(out.path(), VerifyLevel::Light).unwrap();
    assert!(verify::verify_dir_classic(out.path(), VerifyLevel::Full).is_err());
}
