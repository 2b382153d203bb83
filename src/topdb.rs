//! The "TOP db": a small persistent cache of winning autopick plans, keyed
//! by `(bucket_type, profile_key)`, so repeated directory packs of similar
//! content don't have to re-run autopick's sampling every time.
//!
//! Schema fixed by this implementation (see `DESIGN.md`): a single JSON
//! file holding [`TopDb`], read once at the
//! start of a directory pack and written back atomically (temp file in the
//! destination's directory, then renamed over it) at the end.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const TOP_DB_VERSION: u32 = 1;

/// A candidate (or winning) pipeline, same shape as a `candidate_pools`
/// entry in a directory pipeline spec.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PlanSpec {
    pub layer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_codecs: Option<std::collections::HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopDbEntry {
    pub bucket_type: String,
    pub profile_key: String,
    pub plan: PlanSpec,
    pub sample_total_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopDb {
    pub version: u32,
    pub entries: Vec<TopDbEntry>,
}

impl Default for TopDb {
    fn default() -> Self {
        Self {
            version: TOP_DB_VERSION,
            entries: Vec::new(),
        }
    }
}

impl TopDb {
    /// Load a TOP db from `path`. A missing file is not an error — it reads
    /// as an empty db, matching a fresh directory-packer cache.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)?;
        let db: TopDb = serde_json::from_slice(&bytes)?;
        Ok(db)
    }

    /// Look up the cached winning plan for a `(bucket_type, profile_key)`
    /// pair, if one has been recorded.
    pub fn lookup(&self, bucket_type: &str, profile_key: &str) -> Option<&PlanSpec> {
        self.entries
            .iter()
            .find(|e| e.bucket_type == bucket_type && e.profile_key == profile_key)
            .map(|e| &e.plan)
    }

    /// Record (or replace) the winning plan for a `(bucket_type,
    /// profile_key)` pair, then evict the least-recently-inserted entries
    /// down to `max_entries` if that pushed the db over budget. Insertion
    /// order in `entries` doubles as recency: a replaced key moves to the
    /// back, the oldest untouched key sits at the front and is evicted
    /// first.
    pub fn insert(&mut self, entry: TopDbEntry, max_entries: usize) {
        self.entries
            .retain(|e| !(e.bucket_type == entry.bucket_type && e.profile_key == entry.profile_key));
        self.entries.push(entry);
        if self.entries.len() > max_entries {
            let overflow = self.entries.len() - max_entries;
            self.entries.drain(0..overflow);
        }
    }

    /// Serialize to `path` atomically: write to a `NamedTempFile` in the
    /// same directory as `path`, then rename over it. A reader can never
    /// observe a partially-written db.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, self)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(layer: &str, note: &str) -> PlanSpec {
        PlanSpec {
            layer: layer.to_string(),
            codec: Some("zlib".to_string()),
            stream_codecs: None,
            note: Some(note.to_string()),
        }
    }

    #[test]
    fn missing_file_loads_empty_db() {
        let dir = tempfile::tempdir().unwrap();
        let db = TopDb::load(&dir.path().join("nope.json")).unwrap();
        assert!(db.entries.is_empty());
        assert_eq!(db.version, TOP_DB_VERSION);
    }

    #[test]
    fn insert_then_lookup_roundtrips() {
        let mut db = TopDb::default();
        db.insert(
            TopDbEntry {
                bucket_type: "textish".to_string(),
                profile_key: "abc123".to_string(),
                plan: plan("lines_dict", "p1"),
                sample_total_size: 42,
            },
            12,
        );
        let found = db.lookup("textish", "abc123").unwrap();
        assert_eq!(found.layer, "lines_dict");
    }

    #[test]
    fn insert_replaces_existing_key_and_moves_to_back() {
        let mut db = TopDb::default();
        db.insert(
            TopDbEntry {
                bucket_type: "textish".to_string(),
                profile_key: "k".to_string(),
                plan: plan("bytes", "first"),
                sample_total_size: 10,
            },
            12,
        );
        db.insert(
            TopDbEntry {
                bucket_type: "textish".to_string(),
                profile_key: "k".to_string(),
                plan: plan("lines_dict", "second"),
                sample_total_size: 5,
            },
            12,
        );
        assert_eq!(db.entries.len(), 1);
        assert_eq!(db.lookup("textish", "k").unwrap().layer, "lines_dict");
    }

    #[test]
    fn eviction_drops_oldest_first() {
        let mut db = TopDb::default();
        for i in 0..5 {
            db.insert(
                TopDbEntry {
                    bucket_type: "textish".to_string(),
                    profile_key: format!("k{i}"),
                    plan: plan("bytes", "p"),
                    sample_total_size: 1,
                },
                3,
            );
        }
        assert_eq!(db.entries.len(), 3);
        assert!(db.lookup("textish", "k0").is_none());
        assert!(db.lookup("textish", "k1").is_none());
        assert!(db.lookup("textish", "k4").is_some());
    }

    #[test]
    fn save_then_load_roundtrips_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top.json");
        let mut db = TopDb::default();
        db.insert(
            TopDbEntry {
                bucket_type: "binaryish".to_string(),
                profile_key: "zz".to_string(),
                plan: plan("bytes", "raw-fallback"),
                sample_total_size: 999,
            },
            12,
        );
        db.save(&path).unwrap();
        let loaded = TopDb::load(&path).unwrap();
        assert_eq!(loaded.lookup("binaryish", "zz").unwrap().layer, "bytes");
    }

    #[test]
    fn rejects_unknown_fields() {
        let json = r#"{"version":1,"entries":[{"bucket_type":"x","profile_key":"y","plan":{"layer":"bytes"},"sample_total_size":0,"extra":true}]}"#;
        let parsed: std::result::Result<TopDb, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }
}
