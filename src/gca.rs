//! GCA1 bucket archive: concatenated blobs, a zlib-compressed JSONL index,
//! and a fixed 16-byte trailer.
//!
//! ```text
//! [blob0][blob1]...[index_zlib][trailer]
//! trailer := "GCA1" | u64 LE index_len | u32 LE CRC32(index_zlib)
//! ```
//!
//! The index is read from the end: the trailer gives its length and a
//! checksum, so a reader never has to scan forward through blob data to
//! find it.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{GccError, Result};
use crate::perf::{hash_chunked, WriteBuffer};

const TRAILER_MAGIC: &[u8; 4] = b"GCA1";
const TRAILER_LEN: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryRecord {
    pub rel: String,
    pub offset: u64,
    pub length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_crc32: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrailerRecord {
    pub kind: String,
    pub schema: String,
    pub entries: u64,
    pub index_body_sha256: String,
}

/// Accumulates blobs and resources, then emits the finished archive bytes.
#[derive(Default)]
pub struct GcaWriter {
    body: Vec<u8>,
    entries: Vec<EntryRecord>,
}

impl GcaWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a self-contained blob (typically a v6 container), recording
    /// its span plus optional integrity fields.
    pub fn add_blob(&mut self, rel: &str, data: &[u8], with_integrity: bool) {
        let offset = self.body.len() as u64;
        self.body.extend_from_slice(data);
        let (blob_sha256, blob_crc32) = if with_integrity {
            let (sha, crc) = hash_chunked(data);
            (Some(sha), Some(crc))
        } else {
            (None, None)
        };
        self.entries.push(EntryRecord {
            rel: rel.to_string(),
            offset,
            length: data.len() as u64,
            kind: None,
            res_name: None,
            blob_sha256,
            blob_crc32,
        });
    }

    /// Append a bucket-level shared resource under `__res__/NAME`.
    pub fn add_resource(&mut self, name: &str, data: &[u8]) {
        let offset = self.body.len() as u64;
        self.body.extend_from_slice(data);
        self.entries.push(EntryRecord {
            rel: format!("__res__/{name}"),
            offset,
            length: data.len() as u64,
            kind: Some("resource".to_string()),
            res_name: Some(name.to_string()),
            blob_sha256: None,
            blob_crc32: None,
        });
    }

    /// Serialize blobs + index + trailer into the final archive bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut index_body = String::new();
        for entry in &self.entries {
            let line = serde_json::to_string(entry)?;
            index_body.push_str(&line);
            index_body.push('\n');
        }

        let (index_body_sha256, _) = hash_chunked(index_body.as_bytes());

        let trailer_record = TrailerRecord {
            kind: "trailer".to_string(),
            schema: "gca.index_trailer.v1".to_string(),
            entries: self.entries.len() as u64,
            index_body_sha256,
        };
        index_body.push_str(&serde_json::to_string(&trailer_record)?);
        index_body.push('\n');

        let index_zlib = zlib_compress(index_body.as_bytes())?;

        let mut crc = crc32fast::Hasher::new();
        crc.update(&index_zlib);
        let crc32 = crc.finalize();

        // The body is already one contiguous buffer; route the remaining
        // small, separately-computed pieces (index + trailer) through a
        // WriteBuffer so they land as a single trailing write rather than
        // several tiny `extend_from_slice` calls.
        let capacity = self.body.len() + index_zlib.len() + TRAILER_LEN;
        let mut writer = WriteBuffer::new(Vec::with_capacity(capacity), 4096);
        writer
            .write_all(&self.body)
            .map_err(|e| GccError::corrupt(format!("gca archive assembly: {e}")))?;
        writer
            .write_all(&index_zlib)
            .map_err(|e| GccError::corrupt(format!("gca archive assembly: {e}")))?;
        writer
            .write_all(TRAILER_MAGIC)
            .map_err(|e| GccError::corrupt(format!("gca archive assembly: {e}")))?;
        writer
            .write_all(&(index_zlib.len() as u64).to_le_bytes())
            .map_err(|e| GccError::corrupt(format!("gca archive assembly: {e}")))?;
        writer
            .write_all(&crc32.to_le_bytes())
            .map_err(|e| GccError::corrupt(format!("gca archive assembly: {e}")))?;
        writer
            .into_inner()
            .map_err(|e| GccError::corrupt(format!("gca archive assembly: {e}")))
    }
}

fn zlib_compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(6));
    enc.write_all(data)
        .map_err(|e| GccError::corrupt(format!("gca index zlib encode: {e}")))?;
    enc.finish()
        .map_err(|e| GccError::corrupt(format!("gca index zlib encode: {e}")))
}

fn zlib_decompress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| GccError::corrupt(format!("gca index zlib decode: {e}")))?;
    Ok(out)
}

/// A parsed, read-only GCA1 archive.
pub struct GcaReader {
    body: Vec<u8>,
    entries: Vec<EntryRecord>,
    trailer: TrailerRecord,
}

impl GcaReader {
    /// Parse the trailer, inflate and parse the index, and validate
    /// everything except per-blob hashes (that is [`verify_full`]'s job).
    pub fn open(buf: &[u8]) -> Result<Self> {
        if buf.len() < TRAILER_LEN {
            return Err(GccError::corrupt("GCA1 file shorter than trailer"));
        }
        let trailer_start = buf.len() - TRAILER_LEN;
        let trailer_bytes = &buf[trailer_start..];
        if &trailer_bytes[0..4] != TRAILER_MAGIC {
            return Err(GccError::corrupt("GCA1 trailer magic mismatch"));
        }
        let index_len = u64::from_le_bytes(trailer_bytes[4..12].try_into().unwrap()) as usize;
        let crc_expected = u32::from_le_bytes(trailer_bytes[12..16].try_into().unwrap());

        if index_len > trailer_start {
            return Err(GccError::corrupt("GCA1 index_len exceeds file size"));
        }
        let index_start = trailer_start - index_len;
        let index_zlib = &buf[index_start..trailer_start];

        let mut crc = crc32fast::Hasher::new();
        crc.update(index_zlib);
        if crc.finalize() != crc_expected {
            return Err(GccError::corrupt("GCA1 compressed index CRC32 mismatch"));
        }

        let index_body = zlib_decompress(index_zlib)?;
        let index_text = std::str::from_utf8(&index_body)
            .map_err(|_| GccError::corrupt("GCA1 index is not valid UTF-8"))?;

        let mut lines: Vec<&str> = index_text.lines().collect();
        let trailer_line = lines
            .pop()
            .ok_or_else(|| GccError::corrupt("GCA1 index has no trailer record"))?;
        let trailer: TrailerRecord = serde_json::from_str(trailer_line)?;

        let mut entry_body = String::new();
        for line in &lines {
            entry_body.push_str(line);
            entry_body.push('\n');
        }
        let (recomputed, _) = hash_chunked(entry_body.as_bytes());
        if recomputed != trailer.index_body_sha256 {
            return Err(GccError::corrupt("GCA1 index_body_sha256 mismatch"));
        }
        if trailer.entries as usize != lines.len() {
            return Err(GccError::corrupt("GCA1 trailer entry count mismatch"));
        }

        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            entries.push(serde_json::from_str(line)?);
        }

        Ok(GcaReader {
            body: buf[..trailer_start - index_len].to_vec(),
            entries,
            trailer,
        })
    }

    pub fn iter_entries(&self) -> impl Iterator<Item = &EntryRecord> {
        self.entries.iter()
    }

    pub fn trailer(&self) -> &TrailerRecord {
        &self.trailer
    }

    pub fn get_blob(&self, rel: &str) -> Result<&[u8]> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.rel == rel)
            .ok_or_else(|| GccError::missing_resource(format!("no entry named {rel}")))?;
        self.slice_for(entry)
    }

    fn slice_for(&self, entry: &EntryRecord) -> Result<&[u8]> {
        let start = entry.offset as usize;
        let end = start
            .checked_add(entry.length as usize)
            .ok_or_else(|| GccError::corrupt("entry length overflow"))?;
        self.body
            .get(start..end)
            .ok_or_else(|| GccError::corrupt(format!("entry {} span out of bounds", entry.rel)))
    }

    pub fn load_resources(&self) -> Result<Vec<(String, &[u8])>> {
        let mut out = Vec::new();
        for entry in &self.entries {
            if entry.kind.as_deref() == Some("resource") {
                let name = entry
                    .res_name
                    .clone()
                    .ok_or_else(|| GccError::corrupt("resource entry missing res_name"))?;
                out.push((name, self.slice_for(entry)?));
            }
        }
        Ok(out)
    }

    /// Light verify: trailer already validated by [`open`]; this adds a
    /// structural bounds check over every entry's span.
    pub fn verify_light(&self) -> Result<()> {
        for entry in &self.entries {
            self.slice_for(entry)?;
        }
        Ok(())
    }

    /// Full verify: light plus per-blob `sha256`/`crc32` recomputation
    /// against the index fields, where present.
    pub fn verify_full(&self) -> Result<()> {
        self.verify_light()?;
        for entry in &self.entries {
            let data = self.slice_for(entry)?;
            if entry.blob_sha256.is_some() || entry.blob_crc32.is_some() {
                let (actual_sha, actual_crc) = hash_chunked(data);
                if let Some(expected_sha) = &entry.blob_sha256 {
                    if &actual_sha != expected_sha {
                        return Err(GccError::hash_mismatch(format!(
                            "blob {} sha256 mismatch",
                            entry.rel
                        )));
                    }
                }
                if let Some(expected_crc) = entry.blob_crc32 {
                    if actual_crc != expected_crc {
                        return Err(GccError::hash_mismatch(format!(
                            "blob {} crc32 mismatch",
                            entry.rel
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Human-readable summary used by the `info`/`list` CLI surface.
pub fn describe(reader: &GcaReader) -> String {
    let blob_count = reader.entries.iter().filter(|e| e.kind.is_none()).count();
    let resource_count = reader.entries.iter().filter(|e| e.kind.as_deref() == Some("resource")).count();
    format!(
        "GCA1 archive: {} blob(s), {} resource(s), schema {}",
        blob_count, resource_count, reader.trailer.schema
    )
}
