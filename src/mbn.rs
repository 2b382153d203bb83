//! MBN ("Multi Bundle"): a self-describing multi-stream payload.
//!
//! ```text
//! "MBN" | varint(nstreams) | stream...
//! stream := u8 stype | u8 codec | varint ulen | varint clen | varint mlen
//!         | mlen bytes meta | clen bytes comp
//! ```
//!
//! This module owns the bundle's framing and its per-stream codec
//! dispatch. Structural parsing ([`parse`]) never decompresses — it only
//! validates that the frame is well-formed (bounds, `stype` uniqueness).
//! Decompression happens stream-by-stream via [`decode_stream`], which is
//! where an unknown `codec` code turns into `CorruptPayload`.

use std::collections::HashSet;

use crate::codec::{self, num, CodecId};
use crate::error::{GccError, Result};
use crate::varint::{read_varint, write_varint};

pub const STYPE_MAIN: u8 = 0;
pub const STYPE_MASK: u8 = 1;
pub const STYPE_VOWELS: u8 = 2;
pub const STYPE_CONS: u8 = 3;
pub const STYPE_TEXT: u8 = 10;
pub const STYPE_NUMS: u8 = 11;
pub const STYPE_TPL: u8 = 20;
pub const STYPE_IDS: u8 = 21;
pub const STYPE_META: u8 = 250;

const MAGIC: &[u8; 3] = b"MBN";

/// One structurally-parsed MBN stream entry. `comp`/`meta` are still
/// compressed/side-channel bytes — call [`decode_stream`] to get the
/// canonical decompressed bytes.
#[derive(Debug, Clone)]
pub struct RawStream {
    pub stype: u8,
    pub codec_code: u8,
    pub ulen: u64,
    pub meta: Vec<u8>,
    pub comp: Vec<u8>,
}

/// Parse an MBN buffer into its stream list. Strict: every varint must
/// terminate within the buffer, every declared length must fit, and
/// duplicate `stype` values are rejected. Unknown `stype` values are kept
/// (tolerated — the layer decides whether to use them); unknown `codec`
/// codes are *not* rejected here, only on [`decode_stream`] — structure is
/// validated first, content second.
pub fn parse(buf: &[u8]) -> Result<Vec<RawStream>> {
    if buf.len() < 3 || &buf[0..3] != MAGIC {
        return Err(GccError::corrupt("MBN magic mismatch"));
    }
    let mut pos = 3;
    let nstreams = read_varint(buf, &mut pos)?;
    if nstreams == 0 {
        return Err(GccError::corrupt("MBN bundle declares zero streams"));
    }

    let mut streams = Vec::with_capacity(nstreams as usize);
    let mut seen_stypes = HashSet::new();

    for _ in 0..nstreams {
        let stype = *buf
            .get(pos)
            .ok_or_else(|| GccError::corrupt("MBN stream header truncated"))?;
        pos += 1;
        let codec_code = *buf
            .get(pos)
            .ok_or_else(|| GccError::corrupt("MBN stream header truncated"))?;
        pos += 1;

        let ulen = read_varint(buf, &mut pos)?;
        let clen = read_varint(buf, &mut pos)?;
        let mlen = read_varint(buf, &mut pos)?;

        if !seen_stypes.insert(stype) {
            return Err(GccError::corrupt(format!("duplicate stype {stype} in MBN bundle")));
        }

        let meta_end = pos
            .checked_add(mlen as usize)
            .ok_or_else(|| GccError::corrupt("MBN mlen overflow"))?;
        let meta = buf
            .get(pos..meta_end)
            .ok_or_else(|| GccError::corrupt("MBN meta bytes out of bounds"))?
            .to_vec();
        pos = meta_end;

        let comp_end = pos
            .checked_add(clen as usize)
            .ok_or_else(|| GccError::corrupt("MBN clen overflow"))?;
        let comp = buf
            .get(pos..comp_end)
            .ok_or_else(|| GccError::corrupt("MBN comp bytes out of bounds"))?
            .to_vec();
        pos = comp_end;

        streams.push(RawStream {
            stype,
            codec_code,
            ulen,
            meta,
            comp,
        });
    }

    Ok(streams)
}

/// Serialize already-compressed streams into an MBN buffer.
pub fn serialize(streams: &[RawStream]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    write_varint(&mut out, streams.len() as u64);
    for s in streams {
        out.push(s.stype);
        out.push(s.codec_code);
        write_varint(&mut out, s.ulen);
        write_varint(&mut out, s.comp.len() as u64);
        write_varint(&mut out, s.meta.len() as u64);
        out.extend_from_slice(&s.meta);
        out.extend_from_slice(&s.comp);
    }
    out
}

/// Compress `raw_bytes` for a generic (non-`num_v1`) codec into a
/// [`RawStream`] ready for [`serialize`].
pub fn encode_stream(stype: u8, codec_id: CodecId, raw_bytes: &[u8]) -> Result<RawStream> {
    if codec_id.needs_side_channel_meta() {
        return Err(GccError::usage(
            "num_v1 streams must be built with encode_num_stream, not encode_stream",
        ));
    }
    let comp = codec::get_codec(codec_id).encode(raw_bytes)?;
    Ok(RawStream {
        stype,
        codec_code: codec_id.codec_code(),
        ulen: raw_bytes.len() as u64,
        meta: Vec::new(),
        comp,
    })
}

/// Compress an integer sequence with `num_v0` or `num_v1`. The canonical
/// decompressed form (and hence `ulen`) is always [`num::encode_v0`]'s
/// plain-varint output, regardless of which of the two codecs is chosen.
pub fn encode_num_stream(stype: u8, codec_id: CodecId, values: &[u64]) -> Result<RawStream> {
    let canonical = num::encode_v0(values);
    match codec_id {
        CodecId::NumV0 => Ok(RawStream {
            stype,
            codec_code: CodecId::NumV0.codec_code(),
            ulen: canonical.len() as u64,
            meta: Vec::new(),
            comp: canonical,
        }),
        CodecId::NumV1 => {
            let (mode, payload) = num::encode_v1(values);
            Ok(RawStream {
                stype,
                codec_code: CodecId::NumV1.codec_code(),
                ulen: canonical.len() as u64,
                meta: vec![mode],
                comp: payload,
            })
        }
        other => Err(GccError::usage(format!(
            "{} is not a numeric codec",
            other.name()
        ))),
    }
}

/// Decompress a stream to its canonical bytes, validating `ulen`. For
/// numeric codecs the canonical bytes are [`num::encode_v0`]'s plain-varint
/// form — callers that want `Vec<u64>` should pass the result through
/// [`num::decode_v0`].
pub fn decode_stream(s: &RawStream) -> Result<Vec<u8>> {
    let codec_id = codec::codec_id_from_code(s.codec_code)?;
    if codec_id == CodecId::NumV1 {
        let mode = *s
            .meta
            .first()
            .ok_or_else(|| GccError::corrupt("num_v1 stream missing mode byte in meta"))?;
        let values = num::decode_v1(mode, &s.comp)?;
        let canonical = num::encode_v0(&values);
        if canonical.len() as u64 != s.ulen {
            return Err(GccError::corrupt(format!(
                "num_v1 decompressed length {} does not match declared ulen {}",
                canonical.len(),
                s.ulen
            )));
        }
        return Ok(canonical);
    }
    codec::get_codec(codec_id).decode(&s.comp, s.ulen)
}

/// Find the first stream with a given `stype`, if any.
pub fn find<'a>(streams: &'a [RawStream], stype: u8) -> Option<&'a RawStream> {
    streams.iter().find(|s| s.stype == stype)
}
