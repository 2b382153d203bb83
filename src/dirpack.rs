//! Directory packer: fingerprint + bucketize + per-bucket autopick, emitting
//! either a GCA1 archive per bucket (classic mode) or a single self-
//! contained bundle (text-only / mixed single-container modes).
//!
//! **Bucket key (design decision, recorded in `DESIGN.md`).** Files are
//! assigned to buckets by `hash(fingerprint) mod N` and separately
//! classified into a `bucket_type`; autopick then looks up a cache keyed by
//! `(bucket_type, profile)` — which only makes sense if a physical bucket is
//! homogeneous in `bucket_type`. This implementation therefore keys each
//! physical bucket by `(bucket_type, hash(fingerprint) mod N)`: the
//! fingerprint still subdivides a type's files across up to `N` buckets for
//! parallelism-sized batches, but no bucket ever mixes textish and
//! binaryish content under one pipeline choice.

use std::collections::{BTreeMap, HashMap};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::codec::CodecId;
use crate::container;
use crate::error::{GccError, Result};
use crate::gca::{GcaReader, GcaWriter};
use crate::layers::tpl_lines::{self, TemplateDict};
use crate::layers::LayerId;
use crate::mbn::{self, STYPE_META};
use crate::perf::hash_chunked;
use crate::pipeline::{self, PipelineSpec};
use crate::topdb::{PlanSpec, TopDb, TopDbEntry};
use crate::universal;

pub const DIR_PIPELINE_SCHEMA: &str = "gcc-ocf.dir_pipeline.v1";
pub const DIR_BUNDLE_INDEX_SCHEMA: &str = "gcc-ocf.dir_bundle_index.v1";

// ── bucket_type classification ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketType {
    Textish,
    MixedTextNums,
    Binaryish,
}

impl BucketType {
    pub fn name(self) -> &'static str {
        match self {
            BucketType::Textish => "textish",
            BucketType::MixedTextNums => "mixed_text_nums",
            BucketType::Binaryish => "binaryish",
        }
    }
}

/// Classify `data` as textish / mixed_text_nums / binaryish by UTF-8
/// validity, digit density, and printable-byte ratio.
pub fn classify(data: &[u8]) -> BucketType {
    let text = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => return BucketType::Binaryish,
    };
    if text.is_empty() {
        return BucketType::Textish;
    }
    let len = text.len() as f64;
    let digit_count = text.bytes().filter(u8::is_ascii_digit).count() as f64;
    let printable_count = text
        .bytes()
        .filter(|&b| b == b'\n' || b == b'\t' || b == b'\r' || (0x20..0x7f).contains(&b) || b >= 0x80)
        .count() as f64;

    if printable_count / len < 0.85 {
        return BucketType::Binaryish;
    }
    if digit_count / len > 0.15 {
        return BucketType::MixedTextNums;
    }
    BucketType::Textish
}

// ── fingerprint ──────────────────────────────────────────────────────────

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

const SHINGLE_LEN: usize = 4;

/// A SimHash-like content signature: hash each overlapping 4-byte shingle,
/// then vote each of its 64 bits into a running tally, and set the output
/// bit wherever the vote is positive. Similar inputs land on nearby
/// signatures; this crate only needs determinism and a stable `mod N`
/// spread, not near-duplicate detection, so the shingle width and the
/// per-bit voting rule are not load-bearing beyond that.
pub fn fingerprint(data: &[u8]) -> u64 {
    if data.is_empty() {
        return fnv1a64(data);
    }
    if data.len() < SHINGLE_LEN {
        return fnv1a64(data);
    }
    let mut votes = [0i32; 64];
    for window in data.windows(SHINGLE_LEN) {
        let h = fnv1a64(window);
        for (bit, vote) in votes.iter_mut().enumerate() {
            if (h >> bit) & 1 == 1 {
                *vote += 1;
            } else {
                *vote -= 1;
            }
        }
    }
    let mut sig = 0u64;
    for (bit, &vote) in votes.iter().enumerate() {
        if vote > 0 {
            sig |= 1 << bit;
        }
    }
    sig
}

// ── configuration ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AutopickOptions {
    pub enabled: bool,
    pub sample_n: usize,
    pub top_k: usize,
    pub top_db_max: usize,
    pub refresh_top: bool,
}

impl Default for AutopickOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_n: 3,
            top_k: 2,
            top_db_max: 12,
            refresh_top: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    pub enabled: bool,
    pub k: u32,
}

#[derive(Debug, Clone)]
pub struct DirPackOptions {
    pub buckets: usize,
    pub archive: bool,
    pub autopick: AutopickOptions,
    pub candidate_pools: HashMap<String, Vec<PlanSpec>>,
    pub resources: HashMap<String, ResourceOptions>,
    pub top_db_path: Option<PathBuf>,
}

impl Default for DirPackOptions {
    fn default() -> Self {
        Self {
            buckets: 8,
            archive: true,
            autopick: AutopickOptions::default(),
            candidate_pools: HashMap::new(),
            resources: HashMap::new(),
            top_db_path: None,
        }
    }
}

/// JSON shape of a directory pipeline spec (schema [`DIR_PIPELINE_SCHEMA`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirPipelineSpec {
    pub schema: String,
    pub buckets: usize,
    pub archive: bool,
    pub autopick: AutopickSpec,
    #[serde(default)]
    pub candidate_pools: HashMap<String, Vec<PlanSpec>>,
    #[serde(default)]
    pub resources: HashMap<String, ResourceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AutopickSpec {
    pub enabled: bool,
    pub sample_n: usize,
    pub top_k: usize,
    pub top_db_max: usize,
    #[serde(default)]
    pub refresh_top: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSpec {
    pub enabled: bool,
    #[serde(default)]
    pub k: u32,
}

/// Validate a parsed [`DirPipelineSpec`] and lower it to runtime
/// [`DirPackOptions`]. `top_k` is always clamped to 2 regardless of the
/// requested value.
pub fn dir_pack_options_from_spec(spec: &DirPipelineSpec) -> Result<DirPackOptions> {
    if spec.schema != DIR_PIPELINE_SCHEMA {
        return Err(GccError::usage(format!(
            "unrecognized dir pipeline spec schema {:?}, expected {DIR_PIPELINE_SCHEMA:?}",
            spec.schema
        )));
    }
    if !(1..=8).contains(&spec.autopick.sample_n) {
        return Err(GccError::usage(format!(
            "autopick.sample_n {} outside 1..=8",
            spec.autopick.sample_n
        )));
    }
    let resources = spec
        .resources
        .iter()
        .map(|(k, v)| (k.clone(), ResourceOptions { enabled: v.enabled, k: v.k }))
        .collect();
    Ok(DirPackOptions {
        buckets: spec.buckets.max(1),
        archive: spec.archive,
        autopick: AutopickOptions {
            enabled: spec.autopick.enabled,
            sample_n: spec.autopick.sample_n,
            top_k: 2,
            top_db_max: spec.autopick.top_db_max,
            refresh_top: spec.autopick.refresh_top,
        },
        candidate_pools: spec.candidate_pools.clone(),
        resources,
        top_db_path: None,
    })
}

// ── directory walk ──────────────────────────────────────────────────────

/// Read every regular file under `root`, returning `(rel, bytes)` pairs in
/// deterministic lexicographic order by `rel`.
pub fn walk_files(root: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| GccError::usage(format!("directory walk error: {e}")))?;
        if entry.file_type().is_file() {
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let data = std::fs::read(entry.path())?;
            out.push((rel, data));
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

// ── autopick ─────────────────────────────────────────────────────────────

fn plan_to_pipeline_spec(plan: &PlanSpec) -> PipelineSpec {
    PipelineSpec {
        spec: pipeline::PIPELINE_SCHEMA.to_string(),
        name: plan.note.clone(),
        layer: plan.layer.clone(),
        codec: plan.codec.clone(),
        stream_codecs: plan.stream_codecs.clone(),
        mbn: None,
    }
}

/// Compress `samples` under every candidate plan, score by total compressed
/// size, and return the winner plus its score. Candidates a sample isn't
/// representable by (e.g. a text-only layer on binary data) are dropped
/// rather than failing the whole pick. Ties favor the lowest size, then the
/// lexicographically-earliest plan `note` (absent note sorts as `""`).
pub fn autopick(samples: &[&[u8]], candidates: &[PlanSpec]) -> Result<(PlanSpec, u64)> {
    if candidates.is_empty() {
        return Err(GccError::usage("autopick: candidate pool is empty"));
    }
    let mut scored: Vec<(u64, &PlanSpec)> = Vec::new();
    for plan in candidates {
        let spec = plan_to_pipeline_spec(plan);
        let mut total = 0u64;
        let mut ok = true;
        for sample in samples {
            match pipeline::compress_with_pipeline(sample, &spec) {
                Ok(c) => total += c.len() as u64,
                Err(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            scored.push((total, plan));
        }
    }
    if scored.is_empty() {
        return Err(GccError::usage("autopick: no candidate plan succeeded on the sample"));
    }
    scored.sort_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| {
            let na = a.1.note.as_deref().unwrap_or("");
            let nb = b.1.note.as_deref().unwrap_or("");
            na.cmp(nb)
        })
    });
    let (size, plan) = scored[0];
    tracing::debug!(size, layer = %plan.layer, "autopick winner chosen");
    Ok((plan.clone(), size))
}

fn profile_key_for(datas: &[&Vec<u8>]) -> String {
    let mut total_bytes = 0u64;
    let mut total_text_len = 0u64;
    let mut total_digit = 0u64;
    let mut total_printable = 0u64;
    for d in datas {
        total_bytes += d.len() as u64;
        if let Ok(text) = std::str::from_utf8(d) {
            total_text_len += text.len() as u64;
            total_digit += text.bytes().filter(u8::is_ascii_digit).count() as u64;
            total_printable += text
                .bytes()
                .filter(|&b| (0x20..0x7f).contains(&b) || b == b'\n' || b == b'\t' || b >= 0x80)
                .count() as u64;
        }
    }
    let len_bucket = if total_bytes == 0 { 0 } else { 64 - total_bytes.leading_zeros() };
    let digit_bucket = if total_text_len == 0 { 0 } else { total_digit * 10 / total_text_len };
    let printable_bucket = if total_text_len == 0 { 0 } else { total_printable * 10 / total_text_len };
    format!("{len_bucket:x}-{digit_bucket:x}-{printable_bucket:x}")
}

fn resolve_plan(
    bucket_type: BucketType,
    profile_key: &str,
    datas: &[&Vec<u8>],
    opts: &DirPackOptions,
    top_db: &mut TopDb,
) -> Result<PlanSpec> {
    let candidates = opts.candidate_pools.get(bucket_type.name()).ok_or_else(|| {
        GccError::usage(format!("no candidate pool configured for bucket type {}", bucket_type.name()))
    })?;

    if !opts.autopick.enabled {
        return candidates
            .first()
            .cloned()
            .ok_or_else(|| GccError::usage(format!("candidate pool for {} is empty", bucket_type.name())));
    }

    if !opts.autopick.refresh_top {
        if let Some(plan) = top_db.lookup(bucket_type.name(), profile_key) {
            tracing::debug!(bucket_type = bucket_type.name(), profile_key, "top_db cache hit");
            return Ok(plan.clone());
        }
    }

    let sample_n = opts.autopick.sample_n.clamp(1, 8).min(datas.len().max(1));
    let samples: Vec<&[u8]> = datas.iter().take(sample_n).map(|d| d.as_slice()).collect();
    let (winner, total) = autopick(&samples, candidates)?;
    top_db.insert(
        TopDbEntry {
            bucket_type: bucket_type.name().to_string(),
            profile_key: profile_key.to_string(),
            plan: winner.clone(),
            sample_total_size: total,
        },
        opts.autopick.top_db_max,
    );
    Ok(winner)
}

// ── classic (bucketed archive) mode ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub rel: String,
    pub bucket_id: usize,
    pub archive_rel: String,
    pub archive_offset: u64,
    pub archive_length: u64,
    pub input_sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSummary {
    pub bucket_id: usize,
    pub bucket_type: String,
    pub plan: PlanSpec,
    pub required_resources: Vec<String>,
    pub file_count: usize,
}

fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let mut f = std::fs::File::create(path)?;
    for item in items {
        writeln!(f, "{}", serde_json::to_string(item)?)?;
    }
    Ok(())
}

fn read_jsonl<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let text = std::fs::read_to_string(path)?;
    text.lines()
        .map(serde_json::from_str)
        .collect::<std::result::Result<_, _>>()
        .map_err(Into::into)
}

fn group_files(files: &[(String, Vec<u8>)], n: usize) -> BTreeMap<(BucketType, usize), Vec<usize>> {
    let n = n.max(1);
    let mut groups: BTreeMap<(BucketType, usize), Vec<usize>> = BTreeMap::new();
    for (idx, (_, data)) in files.iter().enumerate() {
        let bt = classify(data);
        let sub = (fingerprint(data) % n as u64) as usize;
        groups.entry((bt, sub)).or_default().push(idx);
    }
    groups
}

fn dict_to_bytes(dict: &TemplateDict) -> Vec<u8> {
    tpl_lines::encode_template_list(dict.templates())
}

/// Encode one file under a bucket-shared `tpl_lines_shared_v0` dictionary.
/// Bypasses [`pipeline::compress_with_pipeline`] the same way
/// [`tpl_lines::encode_shared`]'s own docs say it must: the shared
/// dictionary is a side channel the uniform pipeline spec has no field for.
fn encode_tpl_shared_container(data: &[u8], dict: &mut TemplateDict, codec_name: &str) -> Result<Vec<u8>> {
    let codec_id = CodecId::from_name(codec_name)
        .ok_or_else(|| GccError::usage(format!("unknown codec {codec_name:?}")))?;
    let out = tpl_lines::encode_shared(data, dict)?;
    let mut raw_streams = Vec::with_capacity(out.streams.len() + 1);
    for (stype, bytes) in &out.streams {
        raw_streams.push(mbn::encode_stream(*stype, codec_id, bytes)?);
    }
    raw_streams.push(mbn::encode_stream(STYPE_META, CodecId::Raw, &out.meta)?);
    let bundle = mbn::serialize(&raw_streams);
    Ok(container::encode(
        LayerId::TplLinesSharedV0.layer_code(),
        CodecId::Mbn.codec_code(),
        &[],
        &bundle,
        false,
        false,
    ))
}

/// Classic directory pack: bucket files, autopick (or fixed-first-candidate)
/// a plan per bucket, emit one GCA1 archive per bucket plus a top-level
/// manifest and bucket summary. `files` is assumed already walked in
/// deterministic order (see [`walk_files`]); the bucket/file order inside
/// each archive follows that same order.
pub fn pack_dir_classic(files: &[(String, Vec<u8>)], out_dir: &Path, opts: &DirPackOptions) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;
    let groups = group_files(files, opts.buckets);

    let top_db_path = opts.top_db_path.clone().unwrap_or_else(|| out_dir.join("top_db.json"));
    let mut top_db = TopDb::load(&top_db_path)?;

    let mut manifest_entries = Vec::new();
    let mut summaries = Vec::new();

    for (bucket_idx, ((bucket_type, _sub), indices)) in groups.into_iter().enumerate() {
        let datas: Vec<&Vec<u8>> = indices.iter().map(|&i| &files[i].1).collect();
        let profile_key = profile_key_for(&datas);
        let plan = resolve_plan(bucket_type, &profile_key, &datas, opts, &mut top_db)?;

        let mut writer = GcaWriter::new();
        let mut required_resources = Vec::new();
        let mut shared_dict = (plan.layer == "tpl_lines_shared_v0").then(TemplateDict::new);
        let mut offset_cursor = 0u64;

        for (slot, &idx) in indices.iter().enumerate() {
            let (rel, data) = &files[idx];
            let container_bytes = if let Some(dict) = shared_dict.as_mut() {
                encode_tpl_shared_container(data, dict, plan.codec.as_deref().unwrap_or("zlib"))?
            } else {
                pipeline::compress_with_pipeline(data, &plan_to_pipeline_spec(&plan))?
            };
            let blob_rel = format!("bucket_{bucket_idx:04}/{slot:06}.gcc");
            let length = container_bytes.len() as u64;
            writer.add_blob(&blob_rel, &container_bytes, true);
            let (sha, _) = hash_chunked(data);
            manifest_entries.push(ManifestEntry {
                rel: rel.clone(),
                bucket_id: bucket_idx,
                archive_rel: blob_rel,
                archive_offset: offset_cursor,
                archive_length: length,
                input_sha256: sha,
            });
            offset_cursor += length;
        }

        if let Some(dict) = &shared_dict {
            if !dict.is_empty() {
                writer.add_resource("tpl_dict_v1", &dict_to_bytes(dict));
                required_resources.push("tpl_dict_v1".to_string());
            }
        }

        let archive_bytes = writer.finish()?;
        std::fs::write(out_dir.join(format!("bucket_{bucket_idx:04}.gca")), &archive_bytes)?;

        tracing::debug!(bucket_idx, bucket_type = bucket_type.name(), files = indices.len(), "bucket packed");

        summaries.push(BucketSummary {
            bucket_id: bucket_idx,
            bucket_type: bucket_type.name().to_string(),
            plan,
            required_resources,
            file_count: indices.len(),
        });
    }

    write_jsonl(&out_dir.join("manifest.jsonl"), &manifest_entries)?;
    write_jsonl(&out_dir.join("bucket_summary.jsonl"), &summaries)?;
    top_db.save(&top_db_path)?;
    Ok(())
}

/// Decode one `tpl_lines_shared_v0` blob's MBN streams against a running
/// bucket-level dictionary, bypassing [`crate::layers::Layer::decode`] the
/// same way [`encode_tpl_shared_container`] bypasses `Layer::encode` — the
/// self-contained layer decode assumes a full per-file vocabulary, which a
/// shared-dictionary blob doesn't carry.
fn decode_tpl_shared_container(blob: &[u8], dict: &mut TemplateDict) -> Result<Vec<u8>> {
    let c = container::decode(blob)?;
    let raw_streams = mbn::parse(&c.payload)?;
    let mut streams = Vec::with_capacity(raw_streams.len());
    let mut meta = Vec::new();
    for s in &raw_streams {
        let decoded = mbn::decode_stream(s)?;
        if s.stype == STYPE_META {
            meta = decoded;
        } else {
            streams.push((s.stype, decoded));
        }
    }
    tpl_lines::decode_shared(&streams, &meta, dict)
}

/// Inverse of [`pack_dir_classic`]: read `manifest.jsonl` and
/// `bucket_summary.jsonl` under `archive_dir`, then reconstruct every input
/// file under `out_dir` at its original `rel` path.
///
/// A `tpl_lines_shared_v0` bucket's blobs only carry *new* templates per
/// file (see [`tpl_lines::decode_shared`]), so its files are replayed
/// through one running [`TemplateDict`] in the same order they were packed
/// in — manifest entries for a bucket are always contiguous and in pack
/// order, since [`pack_dir_classic`] appends them that way. Every other
/// layer is self-contained and decodes independently via
/// [`universal::decode_file`].
pub fn unpack_dir_classic(archive_dir: &Path, out_dir: &Path) -> Result<()> {
    let manifest: Vec<ManifestEntry> = read_jsonl(&archive_dir.join("manifest.jsonl"))?;
    let summaries: Vec<BucketSummary> = read_jsonl(&archive_dir.join("bucket_summary.jsonl"))?;
    let summary_by_id: HashMap<usize, &BucketSummary> = summaries.iter().map(|s| (s.bucket_id, s)).collect();

    let mut by_bucket: BTreeMap<usize, Vec<&ManifestEntry>> = BTreeMap::new();
    for m in &manifest {
        by_bucket.entry(m.bucket_id).or_default().push(m);
    }

    for (bucket_id, entries) in by_bucket {
        let summary = summary_by_id
            .get(&bucket_id)
            .ok_or_else(|| GccError::corrupt(format!("bucket {bucket_id} missing from bucket_summary.jsonl")))?;
        let archive_bytes = std::fs::read(archive_dir.join(format!("bucket_{bucket_id:04}.gca")))?;
        let reader = GcaReader::open(&archive_bytes)?;

        let mut shared_dict = (summary.plan.layer == "tpl_lines_shared_v0").then(TemplateDict::new);

        for entry in entries {
            let blob = reader.get_blob(&entry.archive_rel)?;
            let data = match shared_dict.as_mut() {
                Some(dict) => decode_tpl_shared_container(blob, dict)?,
                None => universal::decode_file(blob)?,
            };

            let out_path = out_dir.join(&entry.rel);
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out_path, &data)?;
        }
    }
    Ok(())
}

// ── single-container modes ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleIndexEntry {
    pub rel: String,
    pub offset: u64,
    pub length: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleIndex {
    pub schema: String,
    pub entries: Vec<BundleIndexEntry>,
}

fn text_only_pipeline_spec() -> PipelineSpec {
    let mut stream_codecs = HashMap::new();
    stream_codecs.insert("NUMS".to_string(), "num_v1".to_string());
    PipelineSpec {
        spec: pipeline::PIPELINE_SCHEMA.to_string(),
        name: Some("dir_single_text_only".to_string()),
        layer: "split_text_nums".to_string(),
        codec: Some("zlib".to_string()),
        stream_codecs: Some(stream_codecs),
        mbn: Some(true),
    }
}

fn binary_pipeline_spec() -> PipelineSpec {
    PipelineSpec {
        spec: pipeline::PIPELINE_SCHEMA.to_string(),
        name: Some("dir_single_mixed_binary".to_string()),
        layer: "bytes".to_string(),
        codec: Some("zstd".to_string()),
        stream_codecs: None,
        mbn: Some(false),
    }
}

/// Build the deterministic concatenation + index for a set of files,
/// without compressing yet. Files are re-sorted by `rel` here so callers
/// may pass an unsorted subset (e.g. the text-only or binary partition of a
/// mixed pack).
fn concat_with_index(files: &[(String, Vec<u8>)]) -> (Vec<u8>, Vec<BundleIndexEntry>) {
    let mut sorted: Vec<&(String, Vec<u8>)> = files.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut concat = Vec::new();
    let mut entries = Vec::with_capacity(sorted.len());
    for (rel, data) in sorted {
        let offset = concat.len() as u64;
        concat.extend_from_slice(data);
        let (sha, _) = hash_chunked(data);
        entries.push(BundleIndexEntry {
            rel: rel.clone(),
            offset,
            length: data.len() as u64,
            sha256: sha,
        });
    }
    (concat, entries)
}

/// Single-container text-only mode: every input must be valid UTF-8 (else
/// `Usage`, exit 2); emits one `split_text_nums` + MBN `{TEXT:zlib,
/// NUMS:num_v1}` container over the deterministic concatenation.
pub fn pack_dir_single_text_only(files: &[(String, Vec<u8>)]) -> Result<(Vec<u8>, BundleIndex)> {
    for (rel, data) in files {
        if std::str::from_utf8(data).is_err() {
            return Err(GccError::usage(format!(
                "{rel}: not valid UTF-8, text-only mode refuses binary input"
            )));
        }
    }
    let (concat, entries) = concat_with_index(files);
    let container_bytes = pipeline::compress_with_pipeline(&concat, &text_only_pipeline_spec())?;
    Ok((
        container_bytes,
        BundleIndex {
            schema: DIR_BUNDLE_INDEX_SCHEMA.to_string(),
            entries,
        },
    ))
}

/// Single-container mixed mode: partition by UTF-8 validity into a text
/// bundle (`split_text_nums` + MBN) and a binary bundle (`bytes` + zstd),
/// each with its own index.
pub fn pack_dir_single_mixed(
    files: &[(String, Vec<u8>)],
) -> Result<(Option<(Vec<u8>, BundleIndex)>, Option<(Vec<u8>, BundleIndex)>)> {
    let mut text_files = Vec::new();
    let mut bin_files = Vec::new();
    for (rel, data) in files {
        if std::str::from_utf8(data).is_ok() {
            text_files.push((rel.clone(), data.clone()));
        } else {
            bin_files.push((rel.clone(), data.clone()));
        }
    }

    let text_bundle = if text_files.is_empty() {
        None
    } else {
        Some(pack_dir_single_text_only(&text_files)?)
    };

    let bin_bundle = if bin_files.is_empty() {
        None
    } else {
        let (concat, entries) = concat_with_index(&bin_files);
        let container_bytes = pipeline::compress_with_pipeline(&concat, &binary_pipeline_spec())?;
        Some((
            container_bytes,
            BundleIndex {
                schema: DIR_BUNDLE_INDEX_SCHEMA.to_string(),
                entries,
            },
        ))
    };

    Ok((text_bundle, bin_bundle))
}
