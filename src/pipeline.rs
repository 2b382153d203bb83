//! File-mode pipeline engine: run a [`PipelineSpec`] end to end, choosing
//! between the non-MBN single-stream container shape and an MBN bundle the
//! way [`crate::container`]/[`crate::mbn`] define it.
//!
//! Decompression needs no pipeline-aware counterpart: a v6 container is
//! self-describing regardless of which spec produced it, so
//! [`crate::universal::decode_file`] already reads anything this module
//! writes. [`decompress`] just forwards to it for API symmetry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::codec::{get_codec, num, CodecId};
use crate::container;
use crate::error::{GccError, Result};
use crate::layers::{get_layer, LayerId};
use crate::mbn::{self, RawStream, STYPE_CONS, STYPE_IDS, STYPE_MAIN, STYPE_MASK, STYPE_META, STYPE_NUMS, STYPE_TPL, STYPE_VOWELS};

pub const PIPELINE_SCHEMA: &str = "gcc-ocf.pipeline.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSpec {
    pub spec: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub layer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_codecs: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbn: Option<bool>,
}

fn stype_from_name(name: &str) -> Option<u8> {
    match name {
        "MAIN" => Some(STYPE_MAIN),
        "MASK" => Some(STYPE_MASK),
        "VOWELS" => Some(STYPE_VOWELS),
        "CONS" => Some(STYPE_CONS),
        "TEXT" => Some(crate::mbn::STYPE_TEXT),
        "NUMS" => Some(STYPE_NUMS),
        "TPL" => Some(STYPE_TPL),
        "IDS" => Some(STYPE_IDS),
        "META" => Some(STYPE_META),
        _ => None,
    }
}

fn resolve_stream_codecs(spec: &PipelineSpec) -> Result<HashMap<u8, CodecId>> {
    let mut map = HashMap::new();
    let Some(named) = &spec.stream_codecs else {
        return Ok(map);
    };
    for (name, codec_name) in named {
        let stype = stype_from_name(name)
            .ok_or_else(|| GccError::usage(format!("stream_codecs: unknown stream name {name:?}")))?;
        let codec_id = CodecId::from_name(codec_name)
            .ok_or_else(|| GccError::usage(format!("stream_codecs: unknown codec {codec_name:?}")))?;
        map.insert(stype, codec_id);
    }
    Ok(map)
}

/// Compress `data` per `spec`, returning a complete v6 container.
pub fn compress_with_pipeline(data: &[u8], spec: &PipelineSpec) -> Result<Vec<u8>> {
    if spec.spec != PIPELINE_SCHEMA {
        return Err(GccError::usage(format!(
            "unrecognized pipeline spec schema {:?}, expected {PIPELINE_SCHEMA:?}",
            spec.spec
        )));
    }
    let layer_id = LayerId::from_name(&spec.layer)
        .ok_or_else(|| GccError::usage(format!("unknown layer {:?}", spec.layer)))?;
    let layer = get_layer(layer_id);
    let out = layer.encode(data)?;

    let default_codec_name = spec.codec.as_deref().unwrap_or("zlib");
    let default_codec = CodecId::from_name(default_codec_name)
        .ok_or_else(|| GccError::usage(format!("unknown codec {default_codec_name:?}")))?;
    let stream_codecs = resolve_stream_codecs(spec)?;

    let forbid_mbn = spec.mbn == Some(false);
    let mut use_mbn = match spec.mbn {
        Some(true) => true,
        Some(false) => {
            if out.streams.len() > 1 {
                return Err(GccError::usage(
                    "mbn: false forbids MBN framing but the layer produced more than one stream",
                ));
            }
            false
        }
        None => out.streams.len() > 1 || spec.stream_codecs.is_some(),
    };

    // A non-MBN single-stream payload has exactly one side channel in the
    // header (the meta slot). If the chosen codec is num_v1, that slot is
    // claimed by its mode byte, leaving nowhere for a non-empty layer meta
    // to live — forced into MBN instead (see crate::universal docs), unless
    // MBN was explicitly forbidden, in which case it's unrepresentable.
    if !use_mbn && !out.meta.is_empty() {
        let (stype0, _) = out
            .streams
            .first()
            .ok_or_else(|| GccError::usage("layer produced no streams"))?;
        let stream_codec = stream_codecs.get(stype0).copied().unwrap_or(default_codec);
        if stream_codec == CodecId::NumV1 {
            if forbid_mbn {
                return Err(GccError::usage(
                    "mbn: false forbids MBN framing but num_v1's mode byte and the layer's own meta both need the header meta slot",
                ));
            }
            use_mbn = true;
        }
    }

    if use_mbn {
        encode_mbn_container(layer_id, &out, &stream_codecs, default_codec)
    } else {
        encode_single_container(layer_id, &out, &stream_codecs, default_codec)
    }
}

fn is_numeric_stype(stype: u8) -> bool {
    matches!(stype, STYPE_NUMS | STYPE_IDS)
}

fn encode_mbn_container(
    layer_id: LayerId,
    out: &crate::layers::LayerOutput,
    stream_codecs: &HashMap<u8, CodecId>,
    default_codec: CodecId,
) -> Result<Vec<u8>> {
    let mut raw_streams: Vec<RawStream> = Vec::with_capacity(out.streams.len() + 1);
    for (stype, bytes) in &out.streams {
        let codec_id = stream_codecs.get(stype).copied().unwrap_or(default_codec);
        let raw = if codec_id.needs_side_channel_meta() {
            if !is_numeric_stype(*stype) {
                return Err(GccError::usage(format!(
                    "num_v1 assigned to non-numeric stream stype {stype}"
                )));
            }
            let values = num::decode_v0(bytes)?;
            mbn::encode_num_stream(*stype, codec_id, &values)?
        } else {
            mbn::encode_stream(*stype, codec_id, bytes)?
        };
        raw_streams.push(raw);
    }
    if !out.meta.is_empty() {
        let meta_codec = stream_codecs
            .get(&STYPE_META)
            .copied()
            .filter(|c| !c.needs_side_channel_meta())
            .unwrap_or(if default_codec.needs_side_channel_meta() { CodecId::Zlib } else { default_codec });
        raw_streams.push(mbn::encode_stream(STYPE_META, meta_codec, &out.meta)?);
    }

    let bundle = mbn::serialize(&raw_streams);
    Ok(container::encode(layer_id.layer_code(), CodecId::Mbn.codec_code(), &[], &bundle, false, false))
}

fn encode_single_container(
    layer_id: LayerId,
    out: &crate::layers::LayerOutput,
    stream_codecs: &HashMap<u8, CodecId>,
    default_codec: CodecId,
) -> Result<Vec<u8>> {
    let (stype0, bytes0) = out
        .streams
        .first()
        .ok_or_else(|| GccError::usage("layer produced no streams"))?;
    let codec_id = stream_codecs.get(stype0).copied().unwrap_or(default_codec);

    if codec_id.needs_side_channel_meta() {
        if !is_numeric_stype(*stype0) {
            return Err(GccError::usage("num_v1 assigned to a non-numeric single stream"));
        }
        let values = num::decode_v0(bytes0)?;
        let (mode, payload) = num::encode_v1(&values);
        Ok(container::encode(layer_id.layer_code(), codec_id.codec_code(), &[mode], &payload, false, false))
    } else {
        let comp = get_codec(codec_id).encode(bytes0)?;
        Ok(container::encode(layer_id.layer_code(), codec_id.codec_code(), &out.meta, &comp, false, false))
    }
}

/// Decompress any container this module (or the universal decoder's other
/// sources) produced. Thin forward to [`crate::universal::decode_file`].
pub fn decompress(buf: &[u8]) -> Result<Vec<u8>> {
    crate::universal::decode_file(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(layer: &str, codec: Option<&str>, mbn: Option<bool>) -> PipelineSpec {
        PipelineSpec {
            spec: PIPELINE_SCHEMA.to_string(),
            name: None,
            layer: layer.to_string(),
            codec: codec.map(|s| s.to_string()),
            stream_codecs: None,
            mbn,
        }
    }

    #[test]
    fn single_stream_bytes_layer_default_zlib_no_mbn() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(4);
        let s = spec("bytes", None, None);
        let container_bytes = compress_with_pipeline(&data, &s).unwrap();
        let c = container::decode(&container_bytes).unwrap();
        assert_eq!(c.codec_code, CodecId::Zlib.codec_code());
        assert_eq!(decompress(&container_bytes).unwrap(), data);
    }

    #[test]
    fn multi_stream_layer_auto_selects_mbn() {
        let data = b"Hello, World! 123".to_vec();
        let s = spec("vc0", Some("zlib"), None);
        let container_bytes = compress_with_pipeline(&data, &s).unwrap();
        let c = container::decode(&container_bytes).unwrap();
        assert_eq!(c.codec_code, CodecId::Mbn.codec_code());
        assert_eq!(decompress(&container_bytes).unwrap(), data);
    }

    #[test]
    fn forced_mbn_true_on_single_stream_layer() {
        let data = b"arbitrary bytes".to_vec();
        let s = spec("bytes", Some("raw"), Some(true));
        let container_bytes = compress_with_pipeline(&data, &s).unwrap();
        let c = container::decode(&container_bytes).unwrap();
        assert_eq!(c.codec_code, CodecId::Mbn.codec_code());
        assert_eq!(decompress(&container_bytes).unwrap(), data);
    }

    #[test]
    fn forced_mbn_false_on_multi_stream_layer_errors() {
        let data = b"Hello, World!".to_vec();
        let s = spec("vc0", None, Some(false));
        assert!(compress_with_pipeline(&data, &s).is_err());
    }

    #[test]
    fn explicit_stream_codecs_forces_mbn_even_for_single_stream_layer() {
        let data = b"abcabcabcabc".to_vec();
        let mut s = spec("bytes", Some("zlib"), None);
        let mut stream_codecs = HashMap::new();
        stream_codecs.insert("MAIN".to_string(), "raw".to_string());
        s.stream_codecs = Some(stream_codecs);
        let container_bytes = compress_with_pipeline(&data, &s).unwrap();
        let c = container::decode(&container_bytes).unwrap();
        assert_eq!(c.codec_code, CodecId::Mbn.codec_code());
        assert_eq!(decompress(&container_bytes).unwrap(), data);
    }

    #[test]
    fn num_v1_default_codec_collides_with_layer_meta_forces_mbn() {
        // lines_dict is single-stream (IDS) but always carries a non-empty
        // meta (the vocab). num_v1's mode byte would also need the header
        // meta slot, so this must be forced into MBN even though `mbn` was
        // left to auto and the layer produced only one stream.
        let data = b"one\ntwo\none\nthree\n".to_vec();
        let s = spec("lines_dict", Some("num_v1"), None);
        let container_bytes = compress_with_pipeline(&data, &s).unwrap();
        let c = container::decode(&container_bytes).unwrap();
        assert_eq!(c.codec_code, CodecId::Mbn.codec_code());
        assert_eq!(decompress(&container_bytes).unwrap(), data);
    }

    #[test]
    fn num_v1_meta_collision_with_mbn_forbidden_is_usage_error() {
        let data = b"one\ntwo\none\n".to_vec();
        let s = spec("lines_dict", Some("num_v1"), Some(false));
        assert!(matches!(compress_with_pipeline(&data, &s), Err(GccError::Usage(_))));
    }

    #[test]
    fn split_text_nums_with_named_stream_codecs_roundtrips() {
        let data = b"abc123def0xyz".to_vec();
        let mut s = spec("split_text_nums", Some("zlib"), None);
        let mut stream_codecs = HashMap::new();
        stream_codecs.insert("NUMS".to_string(), "num_v1".to_string());
        s.stream_codecs = Some(stream_codecs);
        let container_bytes = compress_with_pipeline(&data, &s).unwrap();
        let c = container::decode(&container_bytes).unwrap();
        assert_eq!(c.codec_code, CodecId::Mbn.codec_code());
        assert_eq!(decompress(&container_bytes).unwrap(), data);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let json = r#"{"spec":"gcc-ocf.pipeline.v1","layer":"bytes","bogus":1}"#;
        let parsed: std::result::Result<PipelineSpec, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn deserializes_minimal_spec_with_defaults() {
        let json = r#"{"spec":"gcc-ocf.pipeline.v1","layer":"bytes"}"#;
        let parsed: PipelineSpec = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.layer, "bytes");
        assert!(parsed.codec.is_none());
        assert!(parsed.stream_codecs.is_none());
        assert!(parsed.mbn.is_none());
    }

    #[test]
    fn unknown_layer_name_is_usage_error() {
        let s = spec("not_a_real_layer", None, None);
        assert!(matches!(compress_with_pipeline(b"x", &s), Err(GccError::Usage(_))));
    }
}
