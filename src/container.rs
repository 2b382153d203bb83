//! Container v6 framing, plus read-only support for legacy v1–v5 payload
//! kinds.
//!
//! ```text
//! v6 header: "GCC" | version(=6) | flags | layer_code | codec_code
//!   F_HAS_META        (0x01): varint(meta_len) | meta_bytes
//!   F_HAS_PAYLOAD_LEN  (0x02): varint(payload_len)            [before payload]
//!   F_KIND_EXTRACT     (0x80): payload is an out-of-scope lossy artifact
//! payload: meta-less suffix, length given by F_HAS_PAYLOAD_LEN or EOF
//! ```
//!
//! The writer in this crate never emits anything but v6; legacy decoding
//! exists purely so a universal reader can open files produced by earlier
//! format generations.

use crate::error::{GccError, Result};
use crate::varint::{read_varint, write_varint};

const MAGIC: &[u8; 3] = b"GCC";
const VERSION: u8 = 6;

pub const F_HAS_META: u8 = 0x01;
pub const F_HAS_PAYLOAD_LEN: u8 = 0x02;
pub const F_KIND_EXTRACT: u8 = 0x80;

const KNOWN_FLAGS: u8 = F_HAS_META | F_HAS_PAYLOAD_LEN | F_KIND_EXTRACT;

/// A decoded v6 header plus its payload slice.
#[derive(Debug, Clone)]
pub struct ContainerV6 {
    pub layer_code: u8,
    pub codec_code: u8,
    pub flags: u8,
    pub meta: Vec<u8>,
    pub payload: Vec<u8>,
}

impl ContainerV6 {
    pub fn is_extract(&self) -> bool {
        self.flags & F_KIND_EXTRACT != 0
    }
}

/// Read the version byte without committing to a full decode — used by a
/// universal reader to pick between the v6 path and [`decode_legacy`].
pub fn peek_version(buf: &[u8]) -> Result<u8> {
    if buf.len() < 4 || &buf[0..3] != MAGIC {
        return Err(GccError::corrupt("GCC magic mismatch"));
    }
    Ok(buf[3])
}

/// Encode a v6 container. `set_payload_len` controls whether
/// `F_HAS_PAYLOAD_LEN` is set (writer's choice; spec default is off).
pub fn encode(
    layer_code: u8,
    codec_code: u8,
    meta: &[u8],
    payload: &[u8],
    kind_extract: bool,
    set_payload_len: bool,
) -> Vec<u8> {
    let mut flags = 0u8;
    if !meta.is_empty() {
        flags |= F_HAS_META;
    }
    if set_payload_len {
        flags |= F_HAS_PAYLOAD_LEN;
    }
    if kind_extract {
        flags |= F_KIND_EXTRACT;
    }

    let mut out = Vec::with_capacity(7 + meta.len() + payload.len() + 8);
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.push(flags);
    out.push(layer_code);
    out.push(codec_code);

    if flags & F_HAS_META != 0 {
        write_varint(&mut out, meta.len() as u64);
        out.extend_from_slice(meta);
    }
    if flags & F_HAS_PAYLOAD_LEN != 0 {
        write_varint(&mut out, payload.len() as u64);
    }
    out.extend_from_slice(payload);
    out
}

/// Decode a v6 container. A magic mismatch is reported as `CorruptPayload`
/// (non-`GCC` data never reaches the version check); a `GCC`-prefixed file
/// with a version outside `1..=6` is `UnsupportedVersion`; a reserved flag
/// bit set on a v6 file is also `UnsupportedVersion`. A well-formed legacy
/// (v1-v5) file is also reported as `UnsupportedVersion` here — this
/// function only speaks v6; a universal reader dispatches to
/// [`decode_legacy`] itself after peeking the version byte (see
/// [`crate::universal`]).
pub fn decode(buf: &[u8]) -> Result<ContainerV6> {
    if buf.len() < 3 || &buf[0..3] != MAGIC {
        return Err(GccError::corrupt("GCC magic mismatch"));
    }
    let version = *buf
        .get(3)
        .ok_or_else(|| GccError::corrupt("container header truncated"))?;
    if !(1..=6).contains(&version) {
        return Err(GccError::unsupported_version(format!(
            "container version {version} outside 1..=6"
        )));
    }
    if version != VERSION {
        return Err(GccError::unsupported_version(format!(
            "container version {version} is a legacy format, use the universal decoder"
        )));
    }

    let flags = *buf
        .get(4)
        .ok_or_else(|| GccError::corrupt("container header truncated"))?;
    if flags & !KNOWN_FLAGS != 0 {
        return Err(GccError::unsupported_version(format!(
            "reserved v6 flag bits set: {flags:#04x}"
        )));
    }
    let layer_code = *buf
        .get(5)
        .ok_or_else(|| GccError::corrupt("container header truncated"))?;
    let codec_code = *buf
        .get(6)
        .ok_or_else(|| GccError::corrupt("container header truncated"))?;

    let mut pos = 7;
    let meta = if flags & F_HAS_META != 0 {
        let mlen = read_varint(buf, &mut pos)? as usize;
        let end = pos
            .checked_add(mlen)
            .ok_or_else(|| GccError::corrupt("meta length overflow"))?;
        let slice = buf
            .get(pos..end)
            .ok_or_else(|| GccError::corrupt("meta bytes out of bounds"))?
            .to_vec();
        pos = end;
        slice
    } else {
        Vec::new()
    };

    let payload = if flags & F_HAS_PAYLOAD_LEN != 0 {
        let plen = read_varint(buf, &mut pos)? as usize;
        let end = pos
            .checked_add(plen)
            .ok_or_else(|| GccError::corrupt("payload length overflow"))?;
        buf.get(pos..end)
            .ok_or_else(|| GccError::corrupt("payload bytes out of bounds"))?
            .to_vec()
    } else {
        buf.get(pos..)
            .ok_or_else(|| GccError::corrupt("payload bytes out of bounds"))?
            .to_vec()
    };

    Ok(ContainerV6 {
        layer_code,
        codec_code,
        flags,
        meta,
        payload,
    })
}

/// Legacy kind bytes for `version in 1..=5`, read-only.
pub const KIND_BYTES: u8 = 0;
pub const KIND_IDS_META_VOCAB: u8 = 1;
pub const KIND_IDS_INLINE_VOCAB: u8 = 2;

/// A decoded legacy (v1-v5) container. Legacy files have no `F_HAS_META`
/// concept; their only framing beyond the fixed header is the `kind` byte
/// and whatever that kind's payload shape implies.
#[derive(Debug, Clone)]
pub struct LegacyContainer {
    pub version: u8,
    pub layer_code: u8,
    pub codec_code: u8,
    pub kind: u8,
    /// For `KIND_BYTES`: the codec-compressed MAIN stream.
    /// For `KIND_IDS_META_VOCAB`/`KIND_IDS_INLINE_VOCAB`: the codec-
    /// compressed `num_v0` id sequence (vocab is decoded separately, see
    /// [`LegacyContainer::vocab`]).
    pub ids_payload: Vec<u8>,
    pub vocab: Vec<String>,
}

/// Decode a legacy (v1-v5) container whose version byte the caller has
/// already read from `buf[3]`.
pub fn decode_legacy(version: u8, buf: &[u8]) -> Result<LegacyContainer> {
    // Legacy header: "GCC" | version | flags(unused, always 0) | layer_code
    // | codec_code | kind, matching the v6 fixed-header prefix length so a
    // universal reader can share the magic/version read above.
    let layer_code = *buf
        .get(5)
        .ok_or_else(|| GccError::corrupt("legacy header truncated"))?;
    let codec_code = *buf
        .get(6)
        .ok_or_else(|| GccError::corrupt("legacy header truncated"))?;
    let kind = *buf
        .get(7)
        .ok_or_else(|| GccError::corrupt("legacy header truncated"))?;
    let mut pos = 8;

    match kind {
        KIND_BYTES => Ok(LegacyContainer {
            version,
            layer_code,
            codec_code,
            kind,
            ids_payload: buf.get(pos..).unwrap_or(&[]).to_vec(),
            vocab: Vec::new(),
        }),
        KIND_IDS_META_VOCAB => {
            let vocab_len = read_varint(buf, &mut pos)? as usize;
            let end = pos
                .checked_add(vocab_len)
                .ok_or_else(|| GccError::corrupt("vocab length overflow"))?;
            let vocab_bytes = buf
                .get(pos..end)
                .ok_or_else(|| GccError::corrupt("vocab bytes out of bounds"))?;
            let vocab_text = std::str::from_utf8(vocab_bytes)
                .map_err(|_| GccError::corrupt("legacy vocab is not valid UTF-8"))?;
            let vocab: Vec<String> = vocab_text.split('\n').map(|s| s.to_string()).collect();
            pos = end;
            Ok(LegacyContainer {
                version,
                layer_code,
                codec_code,
                kind,
                ids_payload: buf.get(pos..).unwrap_or(&[]).to_vec(),
                vocab,
            })
        }
        KIND_IDS_INLINE_VOCAB => {
            let vocab_count = read_varint(buf, &mut pos)?;
            let mut vocab = Vec::with_capacity(vocab_count as usize);
            for _ in 0..vocab_count {
                let _id = read_varint(buf, &mut pos)?;
                let tlen = read_varint(buf, &mut pos)? as usize;
                let end = pos
                    .checked_add(tlen)
                    .ok_or_else(|| GccError::corrupt("token length overflow"))?;
                let token_bytes = buf
                    .get(pos..end)
                    .ok_or_else(|| GccError::corrupt("token bytes out of bounds"))?;
                let token = std::str::from_utf8(token_bytes)
                    .map_err(|_| GccError::corrupt("legacy inline token is not valid UTF-8"))?;
                vocab.push(token.to_string());
                pos = end;
            }
            Ok(LegacyContainer {
                version,
                layer_code,
                codec_code,
                kind,
                ids_payload: buf.get(pos..).unwrap_or(&[]).to_vec(),
                vocab,
            })
        }
        other => Err(GccError::corrupt(format!("unknown legacy kind byte {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_c_v6_header_empty_meta() {
        let payload = b"MBN...placeholder...".to_vec();
        let bytes = encode(6, 4, &[], &payload, false, false);
        assert_eq!(&bytes[0..7], &[0x47, 0x43, 0x43, 0x06, 0x00, 0x06, 0x04]);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.layer_code, 6);
        assert_eq!(decoded.codec_code, 4);
        assert!(decoded.meta.is_empty());
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn roundtrip_with_meta_and_payload_len() {
        let bytes = encode(2, 1, b"some meta", b"some payload bytes", false, true);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.meta, b"some meta");
        assert_eq!(decoded.payload, b"some payload bytes");
        assert_eq!(decoded.flags, F_HAS_META | F_HAS_PAYLOAD_LEN);
    }

    #[test]
    fn roundtrip_kind_extract_flag() {
        let bytes = encode(0, 3, &[], b"lossy", true, false);
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.is_extract());
    }

    #[test]
    fn flag_bits_never_change_recovered_tuple() {
        for set_len in [false, true] {
            let bytes = encode(6, 4, b"m", b"payload-data", false, set_len);
            let decoded = decode(&bytes).unwrap();
            assert_eq!(decoded.layer_code, 6);
            assert_eq!(decoded.codec_code, 4);
            assert_eq!(decoded.meta, b"m");
            assert_eq!(decoded.payload, b"payload-data");
        }
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let bytes = b"XYZ\x06\x00\x00\x00".to_vec();
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn version_zero_is_unsupported() {
        let bytes = b"GCC\x00\x00\x00\x00".to_vec();
        assert!(matches!(
            decode(&bytes),
            Err(GccError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn version_seven_is_unsupported() {
        let bytes = b"GCC\x07\x00\x00\x00".to_vec();
        assert!(matches!(
            decode(&bytes),
            Err(GccError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn reserved_flag_bit_is_unsupported() {
        let mut bytes = encode(0, 0, &[], b"x", false, false);
        bytes[4] |= 0x40; // reserved bit
        assert!(matches!(
            decode(&bytes),
            Err(GccError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn legacy_kind_bytes_roundtrip() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GCC");
        bytes.push(3); // version
        bytes.push(0); // flags (unused)
        bytes.push(0); // layer_code
        bytes.push(3); // codec_code raw
        bytes.push(KIND_BYTES);
        bytes.extend_from_slice(b"compressed-bytes");
        let legacy = decode_legacy(3, &bytes).unwrap();
        assert_eq!(legacy.kind, KIND_BYTES);
        assert_eq!(legacy.ids_payload, b"compressed-bytes");
        assert!(legacy.vocab.is_empty());
    }

    #[test]
    fn legacy_kind_ids_meta_vocab_roundtrip() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GCC");
        bytes.push(5);
        bytes.push(0);
        bytes.push(1);
        bytes.push(5); // codec num_v0
        bytes.push(KIND_IDS_META_VOCAB);
        let vocab = "the\nquick\nfox";
        write_varint(&mut bytes, vocab.len() as u64);
        bytes.extend_from_slice(vocab.as_bytes());
        bytes.extend_from_slice(&[1, 2, 3]);
        let legacy = decode_legacy(5, &bytes).unwrap();
        assert_eq!(legacy.vocab, vec!["the", "quick", "fox"]);
        assert_eq!(legacy.ids_payload, vec![1, 2, 3]);
    }

    #[test]
    fn legacy_kind_ids_inline_vocab_roundtrip() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GCC");
        bytes.push(4);
        bytes.push(0);
        bytes.push(1);
        bytes.push(5);
        bytes.push(KIND_IDS_INLINE_VOCAB);
        write_varint(&mut bytes, 2); // vocab_count
        write_varint(&mut bytes, 0); // id
        write_varint(&mut bytes, 3); // token_len
        bytes.extend_from_slice(b"cat");
        write_varint(&mut bytes, 1);
        write_varint(&mut bytes, 3);
        bytes.extend_from_slice(b"dog");
        bytes.extend_from_slice(&[9, 9]);
        let legacy = decode_legacy(4, &bytes).unwrap();
        assert_eq!(legacy.vocab, vec!["cat", "dog"]);
        assert_eq!(legacy.ids_payload, vec![9, 9]);
    }

    #[test]
    fn unknown_legacy_kind_is_corrupt() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"GCC");
        bytes.push(2);
        bytes.push(0);
        bytes.push(0);
        bytes.push(0);
        bytes.push(99);
        assert!(decode_legacy(2, &bytes).is_err());
    }
}
