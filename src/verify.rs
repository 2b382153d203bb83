//! Integrity checks above [`gca`](crate::gca)'s own primitives: single
//! containers, GCA1 archives cross-checked against a directory manifest,
//! and single-container bundles cross-checked against their index.
//!
//! Light verify never materializes decompressed output; full verify does,
//! and additionally recomputes hashes. Per §7's propagation policy, a
//! decode failure encountered while fully verifying a single-container
//! bundle is re-raised as [`GccError::HashMismatch`] rather than
//! `CorruptPayload` — a tampered payload may corrupt structure before any
//! hash is ever checked, so surfacing it as a structural error would
//! understate what actually happened.

use std::collections::HashMap;
use std::path::Path;

use crate::codec::{self, CodecId};
use crate::container;
use crate::dirpack::{BucketSummary, BundleIndex, ManifestEntry};
use crate::error::{GccError, Result};
use crate::gca::GcaReader;
use crate::layers;
use crate::mbn;
use crate::perf::hash_chunked;
use crate::universal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyLevel {
    Light,
    Full,
}

fn severity(e: &GccError) -> u8 {
    match e {
        GccError::HashMismatch(_) => 5,
        GccError::MissingResource(_) => 4,
        GccError::UnsupportedVersion(_) => 3,
        GccError::CorruptPayload(_) => 2,
        GccError::Io(_) => 2,
        GccError::Json(_) => 2,
        GccError::Usage(_) => 1,
    }
}

/// Reduce a batch of verify errors to the single most severe one, per §7's
/// "aggregate and report the most severe" policy.
fn most_severe(errors: Vec<GccError>) -> Option<GccError> {
    errors.into_iter().max_by_key(|e| severity(e))
}

// ── single container ────────────────────────────────────────────────────

/// Verify one container (v6 or legacy) without decompressing its payload:
/// header/flags parse, layer/codec codes are recognized, and (for MBN
/// payloads) the bundle's own structural checks pass.
fn verify_container_light(buf: &[u8]) -> Result<()> {
    let version = container::peek_version(buf)?;
    if version == 6 {
        let c = container::decode(buf)?;
        if c.is_extract() {
            return Ok(());
        }
        layers::layer_id_from_code(c.layer_code)?;
        let codec_id = codec::codec_id_from_code(c.codec_code)?;
        if codec_id == CodecId::Mbn {
            mbn::parse(&c.payload)?;
        }
    } else {
        container::decode_legacy(version, buf)?;
    }
    Ok(())
}

/// Verify a single container. Light mode is structural-only (see
/// [`verify_container_light`]); full mode decodes it end to end.
pub fn verify_container(buf: &[u8], level: VerifyLevel) -> Result<()> {
    match level {
        VerifyLevel::Light => verify_container_light(buf),
        VerifyLevel::Full => {
            universal::decode_file(buf)?;
            Ok(())
        }
    }
}

// ── GCA1 archive ─────────────────────────────────────────────────────────

pub fn verify_archive(archive_bytes: &[u8], level: VerifyLevel) -> Result<GcaReader> {
    let reader = GcaReader::open(archive_bytes)?;
    match level {
        VerifyLevel::Light => reader.verify_light()?,
        VerifyLevel::Full => reader.verify_full()?,
    }
    Ok(reader)
}

// ── directory classic mode (manifest + per-bucket archives) ────────────

fn verify_one_bucket(
    out_dir: &Path,
    summary: &BucketSummary,
    manifest_by_bucket: &HashMap<usize, Vec<&ManifestEntry>>,
    level: VerifyLevel,
) -> Result<()> {
    let archive_path = out_dir.join(format!("bucket_{:04}.gca", summary.bucket_id));
    let archive_bytes = std::fs::read(&archive_path)?;
    let reader = verify_archive(&archive_bytes, level)?;

    let resources = reader.load_resources()?;
    for required in &summary.required_resources {
        if !resources.iter().any(|(name, _)| name == required) {
            return Err(GccError::missing_resource(format!(
                "bucket {}: missing required resource {required}",
                summary.bucket_id
            )));
        }
    }

    let blob_entries: Vec<_> = reader.iter_entries().filter(|e| e.kind.is_none()).collect();
    let manifest_entries = manifest_by_bucket.get(&summary.bucket_id).cloned().unwrap_or_default();
    if blob_entries.len() != manifest_entries.len() {
        return Err(GccError::corrupt(format!(
            "bucket {}: manifest has {} file entries, archive has {}",
            summary.bucket_id,
            manifest_entries.len(),
            blob_entries.len()
        )));
    }

    for m in &manifest_entries {
        let found = blob_entries
            .iter()
            .find(|e| e.offset == m.archive_offset && e.length == m.archive_length);
        match found {
            Some(e) if e.rel != m.archive_rel => {
                tracing::warn!(
                    bucket_id = summary.bucket_id,
                    rel = %m.rel,
                    "archive rel differs from manifest at a matching (offset, length) span",
                );
            }
            Some(_) => {}
            None => {
                return Err(GccError::corrupt(format!(
                    "bucket {}: no archive span matches manifest entry {} (offset={}, length={})",
                    summary.bucket_id, m.rel, m.archive_offset, m.archive_length
                )));
            }
        }
    }
    Ok(())
}

/// Verify a classic-mode directory pack: `manifest.jsonl` and
/// `bucket_summary.jsonl` under `out_dir`, each referenced `bucket_<id>.gca`
/// archive, manifest↔index cross-check by `(archive_offset, archive_length)`
/// with `rel` as a best-effort secondary key, and required-resource
/// presence. Errors across buckets are aggregated; the most severe is
/// returned.
pub fn verify_dir_classic(out_dir: &Path, level: VerifyLevel) -> Result<()> {
    let manifest_text = std::fs::read_to_string(out_dir.join("manifest.jsonl"))?;
    let manifest: Vec<ManifestEntry> = manifest_text
        .lines()
        .map(serde_json::from_str)
        .collect::<std::result::Result<_, _>>()?;

    let summary_text = std::fs::read_to_string(out_dir.join("bucket_summary.jsonl"))?;
    let summaries: Vec<BucketSummary> = summary_text
        .lines()
        .map(serde_json::from_str)
        .collect::<std::result::Result<_, _>>()?;

    let mut by_bucket: HashMap<usize, Vec<&ManifestEntry>> = HashMap::new();
    for m in &manifest {
        by_bucket.entry(m.bucket_id).or_default().push(m);
    }

    let mut errors = Vec::new();
    for summary in &summaries {
        if let Err(e) = verify_one_bucket(out_dir, summary, &by_bucket, level) {
            errors.push(e);
        }
    }
    if let Some(worst) = most_severe(errors) {
        return Err(worst);
    }
    Ok(())
}

// ── single-container bundle (text-only / mixed modes) ──────────────────

/// Verify a single-container bundle against its [`BundleIndex`]. Light mode
/// is structural-only; full mode decodes the whole bundle and recomputes
/// each entry's `sha256` against the decompressed slice at its recorded
/// `(offset, length)`. A decode failure in full mode is reported as
/// `HashMismatch`, per §7.
pub fn verify_bundle(container_bytes: &[u8], index: &BundleIndex, level: VerifyLevel) -> Result<()> {
    match level {
        VerifyLevel::Light => verify_container_light(container_bytes),
        VerifyLevel::Full => {
            let decoded = universal::decode_file(container_bytes).map_err(|e| match e {
                GccError::CorruptPayload(m) => {
                    GccError::hash_mismatch(format!("bundle failed to decode during full verify: {m}"))
                }
                other => other,
            })?;
            for entry in &index.entries {
                let end = entry.offset as usize + entry.length as usize;
                let slice = decoded
                    .get(entry.offset as usize..end)
                    .ok_or_else(|| GccError::hash_mismatch(format!("{}: index span out of bounds", entry.rel)))?;
                let (sha, _) = hash_chunked(slice);
                if sha != entry.sha256 {
                    return Err(GccError::hash_mismatch(format!("{}: sha256 mismatch", entry.rel)));
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::get_codec;
    use crate::container as c;
    use crate::dirpack::{pack_dir_classic, pack_dir_single_text_only, walk_files, DirPackOptions};
    use crate::layers::{bytes::BytesLayer, Layer, LayerId};
    use crate::topdb::PlanSpec;

    fn make_v6_bytes_container(data: &[u8]) -> Vec<u8> {
        let layer = BytesLayer;
        let out = layer.encode(data).unwrap();
        let comp = get_codec(CodecId::Zlib).encode(out.stream(0).unwrap()).unwrap();
        c::encode(LayerId::Bytes.layer_code(), CodecId::Zlib.codec_code(), &out.meta, &comp, false, false)
    }

    #[test]
    fn verify_container_light_and_full_pass_on_good_container() {
        let bytes = make_v6_bytes_container(b"verify me please");
        verify_container(&bytes, VerifyLevel::Light).unwrap();
        verify_container(&bytes, VerifyLevel::Full).unwrap();
    }

    #[test]
    fn verify_container_full_fails_on_tampered_payload() {
        let mut bytes = make_v6_bytes_container(b"a reasonably long payload to tamper with");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(verify_container(&bytes, VerifyLevel::Full).is_err());
    }

    #[test]
    fn verify_bundle_full_reclassifies_decode_failure_as_hash_mismatch() {
        let files = vec![("a.txt".to_string(), b"line one\nline two 42\n".to_vec())];
        let (mut container_bytes, index) = pack_dir_single_text_only(&files).unwrap();
        verify_bundle(&container_bytes, &index, VerifyLevel::Light).unwrap();
        verify_bundle(&container_bytes, &index, VerifyLevel::Full).unwrap();

        let last = container_bytes.len() - 1;
        container_bytes[last] ^= 0xFF;
        let err = verify_bundle(&container_bytes, &index, VerifyLevel::Full).unwrap_err();
        assert!(matches!(err, GccError::HashMismatch(_) | GccError::CorruptPayload(_)));
    }

    #[test]
    fn verify_dir_classic_passes_on_freshly_packed_directory() {
        let files = vec![
            ("a.txt".to_string(), b"hello there hello there\n".to_vec()),
            ("b.txt".to_string(), b"goodbye now goodbye now\n".to_vec()),
        ];
        let out = tempfile::tempdir().unwrap();
        let mut opts = DirPackOptions {
            buckets: 1,
            ..Default::default()
        };
        let mut pools = std::collections::HashMap::new();
        pools.insert(
            "textish".to_string(),
            vec![PlanSpec {
                layer: "bytes".to_string(),
                codec: Some("zlib".to_string()),
                stream_codecs: None,
                note: Some("bytes-zlib".to_string()),
            }],
        );
        opts.candidate_pools = pools;
        pack_dir_classic(&files, out.path(), &opts).unwrap();

        verify_dir_classic(out.path(), VerifyLevel::Light).unwrap();
        verify_dir_classic(out.path(), VerifyLevel::Full).unwrap();
    }

    #[test]
    fn verify_dir_classic_detects_tampered_blob_in_full_mode_only() {
        let files = vec![("a.txt".to_string(), b"tamper target content here\n".to_vec())];
        let out = tempfile::tempdir().unwrap();
        let mut opts = DirPackOptions {
            buckets: 1,
            ..Default::default()
        };
        let mut pools = std::collections::HashMap::new();
        pools.insert(
            "textish".to_string(),
            vec![PlanSpec {
                layer: "bytes".to_string(),
                codec: Some("zlib".to_string()),
                stream_codecs: None,
                note: Some("bytes-zlib".to_string()),
            }],
        );
        opts.candidate_pools = pools;
        pack_dir_classic(&files, out.path(), &opts).unwrap();

        let archive_path = out.path().join("bucket_0000.gca");
        let mut archive_bytes = std::fs::read(&archive_path).unwrap();
        archive_bytes[0] ^= 0xFF;
        std::fs::write(&archive_path, &archive_bytes).unwrap();

        verify_dir_classic(out.path(), VerifyLevel::Light).unwrap();
        assert!(matches!(
            verify_dir_classic(out.path(), VerifyLevel::Full),
            Err(GccError::HashMismatch(_))
        ));
    }

    #[test]
    fn walk_files_is_used_in_verify_setup_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("z.txt"), b"z").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let files = walk_files(dir.path()).unwrap();
        assert_eq!(files[0].0, "a.txt");
        assert_eq!(files[1].0, "z.txt");
    }
}
