//! Universal reader: decodes any container this crate's writer has ever
//! produced (v6) plus the read-only legacy generations (v1-v5), without the
//! caller needing to know in advance which one a given file is.
//!
//! [`decode_file`] is the single entry point. It peeks the version byte,
//! dispatches to [`container::decode`] or [`container::decode_legacy`], then
//! reassembles the layer's streams — either by parsing an MBN bundle or by
//! treating the container payload itself as the lone stream — and calls the
//! layer's `decode`.

use crate::codec::{self, num, CodecId};
use crate::container::{self, LegacyContainer};
use crate::error::{GccError, Result};
use crate::layers::{self, Layer, LayerId};
use crate::mbn::{self, STYPE_META};

/// Decode a container of any supported version back to its original bytes.
///
/// `F_KIND_EXTRACT` payloads (v6 only) are returned as-is: they mark an
/// out-of-scope lossy artifact with no further decode step.
pub fn decode_file(buf: &[u8]) -> Result<Vec<u8>> {
    let version = container::peek_version(buf)?;
    if version == 6 {
        let c = container::decode(buf)?;
        if c.is_extract() {
            return Ok(c.payload);
        }
        let layer_id = layers::layer_id_from_code(c.layer_code)?;
        let layer = layers::get_layer(layer_id);
        let codec_id = codec::codec_id_from_code(c.codec_code)?;

        let (streams, meta) = if codec_id == CodecId::Mbn {
            split_mbn_bundle(&c.payload, &c.meta)?
        } else {
            (
                vec![(layer.single_stream_stype(), decode_single_stream(codec_id, &c.payload, &c.meta)?)],
                single_stream_meta(codec_id, &c.meta),
            )
        };

        layer.decode(&streams, &meta)
    } else if (1..=5).contains(&version) {
        let legacy = container::decode_legacy(version, buf)?;
        decode_legacy_payload(&legacy)
    } else {
        Err(GccError::unsupported_version(format!(
            "container version {version} outside 1..=6"
        )))
    }
}

/// Parse an MBN bundle into the `(stype, bytes)` list a [`Layer::decode`]
/// expects, pulling the `META` stream out as the layer's `meta` blob if
/// present. A bundle with no `META` stream falls back to the container
/// header's own `meta` field (the layer had nothing to say there, or its
/// meta travelled outside the bundle entirely).
fn split_mbn_bundle(payload: &[u8], header_meta: &[u8]) -> Result<(Vec<(u8, Vec<u8>)>, Vec<u8>)> {
    let raw_streams = mbn::parse(payload)?;
    let mut streams = Vec::with_capacity(raw_streams.len());
    let mut meta = header_meta.to_vec();
    for s in &raw_streams {
        let decoded = mbn::decode_stream(s)?;
        if s.stype == STYPE_META {
            meta = decoded;
        } else {
            streams.push((s.stype, decoded));
        }
    }
    Ok((streams, meta))
}

/// Decompress the non-MBN single-stream v6 payload. `num_v1`'s mode byte
/// lives in the container header's meta slot (see module docs on
/// [`codec::CodecId::needs_side_channel_meta`]), so it is intercepted here
/// rather than going through the generic codec registry.
fn decode_single_stream(codec_id: CodecId, payload: &[u8], header_meta: &[u8]) -> Result<Vec<u8>> {
    if codec_id == CodecId::NumV1 {
        let mode = *header_meta
            .first()
            .ok_or_else(|| GccError::corrupt("num_v1 single-stream payload missing mode byte in header meta"))?;
        let values = num::decode_v1(mode, payload)?;
        return Ok(num::encode_v0(&values));
    }
    codec::get_codec(codec_id).decode_unchecked(payload)
}

/// The `meta` to hand the layer for a non-MBN single-stream payload: for
/// `num_v1` the header meta slot was consumed by the mode byte, so the layer
/// sees an empty meta (as it does in the MBN path, where the mode byte lives
/// in the stream's own `meta`, not the bundle's). Every other codec passes
/// the header meta straight through, since it belongs to the layer.
fn single_stream_meta(codec_id: CodecId, header_meta: &[u8]) -> Vec<u8> {
    if codec_id == CodecId::NumV1 {
        Vec::new()
    } else {
        header_meta.to_vec()
    }
}

/// Decode a legacy (v1-v5) container. All three legacy kinds carry a single
/// logical stream; `KIND_BYTES` is the layer's raw MAIN bytes, the two
/// `KIND_IDS_*` variants are a `num_v0`-coded id sequence plus a vocabulary
/// that legacy readers re-resolve into tokens before the layer ever sees
/// them, matching the `words_it`/`syllables_it`/`lines_dict` decode shape in
/// [`layers::dict_text`] (layer-specific joining: `lines_dict` re-joins with
/// `\n`, everything else concatenates).
fn decode_legacy_payload(legacy: &LegacyContainer) -> Result<Vec<u8>> {
    let layer_id = layers::layer_id_from_code(legacy.layer_code)?;
    let codec_id = codec::codec_id_from_code(legacy.codec_code)?;

    match legacy.kind {
        container::KIND_BYTES => {
            let bytes = codec::get_codec(codec_id).decode_unchecked(&legacy.ids_payload)?;
            let layer = layers::get_layer(layer_id);
            layer.decode(&[(layer.single_stream_stype(), bytes)], &[])
        }
        container::KIND_IDS_META_VOCAB | container::KIND_IDS_INLINE_VOCAB => {
            let canonical = codec::get_codec(codec_id).decode_unchecked(&legacy.ids_payload)?;
            let ids = num::decode_v0(&canonical)?;
            let mut tokens = Vec::with_capacity(ids.len());
            for id in &ids {
                let tok = legacy
                    .vocab
                    .get(*id as usize)
                    .ok_or_else(|| GccError::corrupt(format!("legacy id {id} out of vocab range")))?;
                tokens.push(tok.as_str());
            }
            let joined = if layer_id == LayerId::LinesDict {
                tokens.join("\n")
            } else {
                tokens.concat()
            };
            Ok(joined.into_bytes())
        }
        other => Err(GccError::corrupt(format!("unknown legacy kind byte {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{get_codec, CodecId};
    use crate::container::{self as c, KIND_BYTES, KIND_IDS_INLINE_VOCAB, KIND_IDS_META_VOCAB};
    use crate::layers::{bytes::BytesLayer, get_layer, Layer, LayerId};
    use crate::varint::write_varint;

    #[test]
    fn decodes_v6_non_mbn_bytes_layer() {
        let layer = BytesLayer;
        let data = b"hello universal reader".to_vec();
        let out = layer.encode(&data).unwrap();
        let comp = get_codec(CodecId::Zlib).encode(out.stream(0).unwrap()).unwrap();
        let bytes = c::encode(LayerId::Bytes.layer_code(), CodecId::Zlib.codec_code(), &out.meta, &comp, false, false);
        assert_eq!(decode_file(&bytes).unwrap(), data);
    }

    #[test]
    fn decodes_v6_mbn_vc0_layer() {
        let layer = get_layer(LayerId::Vc0);
        let data = b"the quick brown fox".to_vec();
        let out = layer.encode(&data).unwrap();
        let mut raw_streams = Vec::new();
        for (stype, bytes) in &out.streams {
            raw_streams.push(mbn::encode_stream(*stype, CodecId::Zlib, bytes).unwrap());
        }
        let bundle = mbn::serialize(&raw_streams);
        let bytes = c::encode(LayerId::Vc0.layer_code(), CodecId::Mbn.codec_code(), &out.meta, &bundle, false, false);
        assert_eq!(decode_file(&bytes).unwrap(), data);
    }

    #[test]
    fn decodes_v6_non_mbn_num_v1_side_channel() {
        let values: Vec<u64> = (0..50).map(|i| i * 2).collect();
        let (mode, payload) = num::encode_v1(&values);
        let header_meta = vec![mode];
        let bytes = c::encode(
            LayerId::LinesRle.layer_code(),
            CodecId::NumV1.codec_code(),
            &header_meta,
            &payload,
            false,
            false,
        );
        let c = container::decode(&bytes).unwrap();
        let codec_id = codec::codec_id_from_code(c.codec_code).unwrap();
        let decoded = decode_single_stream(codec_id, &c.payload, &c.meta).unwrap();
        assert_eq!(num::decode_v0(&decoded).unwrap(), values);
        assert!(single_stream_meta(codec_id, &c.meta).is_empty());
    }

    #[test]
    fn kind_extract_returns_raw_payload() {
        let bytes = c::encode(0, CodecId::Raw.codec_code(), &[], b"lossy artifact", true, false);
        assert_eq!(decode_file(&bytes).unwrap(), b"lossy artifact");
    }

    #[test]
    fn decodes_legacy_kind_bytes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GCC");
        bytes.push(3);
        bytes.push(0);
        bytes.push(LayerId::Bytes.layer_code());
        bytes.push(CodecId::Raw.codec_code());
        bytes.push(KIND_BYTES);
        bytes.extend_from_slice(b"legacy raw bytes");
        assert_eq!(decode_file(&bytes).unwrap(), b"legacy raw bytes");
    }

    #[test]
    fn decodes_legacy_kind_ids_meta_vocab() {
        let ids = num::encode_v0(&[0, 1, 0, 2]);
        let comp = get_codec(CodecId::Raw).encode(&ids).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GCC");
        bytes.push(5);
        bytes.push(0);
        bytes.push(LayerId::WordsIt.layer_code());
        bytes.push(CodecId::Raw.codec_code());
        bytes.push(KIND_IDS_META_VOCAB);
        let vocab = "cat\ndog\nbird";
        write_varint(&mut bytes, vocab.len() as u64);
        bytes.extend_from_slice(vocab.as_bytes());
        bytes.extend_from_slice(&comp);
        assert_eq!(decode_file(&bytes).unwrap(), b"catdogcatbird");
    }

    #[test]
    fn decodes_legacy_lines_dict_rejoins_with_newline() {
        let ids = num::encode_v0(&[0, 1, 0]);
        let comp = get_codec(CodecId::Raw).encode(&ids).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GCC");
        bytes.push(4);
        bytes.push(0);
        bytes.push(LayerId::LinesDict.layer_code());
        bytes.push(CodecId::Raw.codec_code());
        bytes.push(KIND_IDS_INLINE_VOCAB);
        write_varint(&mut bytes, 2);
        write_varint(&mut bytes, 0);
        write_varint(&mut bytes, 3);
        bytes.extend_from_slice(b"one");
        write_varint(&mut bytes, 1);
        write_varint(&mut bytes, 3);
        bytes.extend_from_slice(b"two");
        bytes.extend_from_slice(&comp);
        assert_eq!(decode_file(&bytes).unwrap(), b"one\ntwo\none");
    }

    #[test]
    fn unknown_version_is_unsupported() {
        let bytes = b"GCC\x09\x00\x00\x00".to_vec();
        assert!(matches!(decode_file(&bytes), Err(GccError::UnsupportedVersion(_))));
    }
}
