//! Codec registry: a closed, numerically-identified set of byte-to-byte
//! compressors.
//!
//! # Identity rules
//! Every codec carries a stable `codec_code: u8` (0..=7, see [`CodecId`]).
//! That code is:
//!   - Written into the v6 container header and every MBN stream entry.
//!   - The authoritative on-disk identity — never negotiated, never a
//!     string name.
//!
//! A reader that encounters a `codec_code` it does not recognise fails with
//! `CorruptPayload` immediately. There is no fallback and no partial decode.
//!
//! # Numeric codecs
//! `num_v0`/`num_v1` ([`num`]) do not go through the generic [`Codec`] trait:
//! their "decompressed" form for an integer stream is itself the canonical
//! plain-varint byte encoding (`num::encode_v0`), and `num_v1` needs a
//! one-byte mode selector carried *outside* the compressed payload (in the
//! MBN per-stream `meta` field, or the v6 container meta slot for a
//! single-stream file). Callers that own that side-channel — [`crate::mbn`]
//! and [`crate::container`] — call `num::encode_v1`/`num::decode_v1`
//! directly instead of going through [`get_codec`].

pub mod huffman;
pub mod num;

use crate::error::{GccError, Result};

/// Runtime codec discriminant. `codec_code()` is the frozen on-disk value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    Huffman,
    Zstd,
    ZstdTight,
    Raw,
    Mbn,
    NumV0,
    Zlib,
    NumV1,
}

impl CodecId {
    #[inline]
    pub fn codec_code(self) -> u8 {
        match self {
            CodecId::Huffman => 0,
            CodecId::Zstd => 1,
            CodecId::ZstdTight => 2,
            CodecId::Raw => 3,
            CodecId::Mbn => 4,
            CodecId::NumV0 => 5,
            CodecId::Zlib => 6,
            CodecId::NumV1 => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CodecId::Huffman),
            1 => Some(CodecId::Zstd),
            2 => Some(CodecId::ZstdTight),
            3 => Some(CodecId::Raw),
            4 => Some(CodecId::Mbn),
            5 => Some(CodecId::NumV0),
            6 => Some(CodecId::Zlib),
            7 => Some(CodecId::NumV1),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CodecId::Huffman => "huffman",
            CodecId::Zstd => "zstd",
            CodecId::ZstdTight => "zstd_tight",
            CodecId::Raw => "raw",
            CodecId::Mbn => "mbn",
            CodecId::NumV0 => "num_v0",
            CodecId::Zlib => "zlib",
            CodecId::NumV1 => "num_v1",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "huffman" => Some(CodecId::Huffman),
            "zstd" => Some(CodecId::Zstd),
            "zstd_tight" => Some(CodecId::ZstdTight),
            "raw" => Some(CodecId::Raw),
            "mbn" => Some(CodecId::Mbn),
            "num_v0" => Some(CodecId::NumV0),
            "zlib" => Some(CodecId::Zlib),
            "num_v1" => Some(CodecId::NumV1),
            _ => None,
        }
    }

    /// True for codecs whose compression/decompression is handled outside
    /// the generic [`Codec`] trait (see module docs).
    pub fn needs_side_channel_meta(self) -> bool {
        matches!(self, CodecId::NumV1)
    }
}

/// Default zlib compression level (spec: implementation MAY pick level 6).
pub const DEFAULT_ZLIB_LEVEL: u32 = 6;

/// Default zstd compression level.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Byte-to-byte compressor contract. `decode` is handed the expected
/// decompressed length (`ulen`) both as a hint and as a post-condition.
/// `decode_unchecked` is the same decompression without that post-condition,
/// for callers (the non-MBN single-stream v6 payload) that carry no `ulen`
/// field of their own; `decode`'s default impl is just `decode_unchecked`
/// plus the length check.
pub trait Codec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decode_unchecked(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decode(&self, data: &[u8], ulen: u64) -> Result<Vec<u8>> {
        let out = self.decode_unchecked(data)?;
        check_ulen(out.len() as u64, ulen)?;
        Ok(out)
    }
}

struct RawCodec;
impl Codec for RawCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
    fn decode_unchecked(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

struct ZlibCodec;
impl Codec for ZlibCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(DEFAULT_ZLIB_LEVEL));
        enc.write_all(data)
            .map_err(|e| GccError::corrupt(format!("zlib encode: {e}")))?;
        enc.finish()
            .map_err(|e| GccError::corrupt(format!("zlib encode: {e}")))
    }
    fn decode_unchecked(&self, data: &[u8]) -> Result<Vec<u8>> {
        use flate2::read::ZlibDecoder;
        use std::io::Read;
        let mut out = Vec::new();
        ZlibDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| GccError::corrupt(format!("zlib decode: {e}")))?;
        Ok(out)
    }
}

struct ZstdCodec {
    tight: bool,
}
impl Codec for ZstdCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if self.tight {
            // zstd_tight: no content-size field, no checksum — saves frame
            // overhead on tiny inputs.
            let mut encoder = zstd::Encoder::new(Vec::new(), DEFAULT_ZSTD_LEVEL)
                .map_err(|e| GccError::corrupt(format!("zstd encode: {e}")))?;
            encoder
                .include_contentsize(false)
                .map_err(|e| GccError::corrupt(format!("zstd encode: {e}")))?;
            encoder
                .include_checksum(false)
                .map_err(|e| GccError::corrupt(format!("zstd encode: {e}")))?;
            use std::io::Write;
            encoder
                .write_all(data)
                .map_err(|e| GccError::corrupt(format!("zstd encode: {e}")))?;
            encoder
                .finish()
                .map_err(|e| GccError::corrupt(format!("zstd encode: {e}")))
        } else {
            zstd::encode_all(data, DEFAULT_ZSTD_LEVEL)
                .map_err(|e| GccError::corrupt(format!("zstd encode: {e}")))
        }
    }
    fn decode_unchecked(&self, data: &[u8]) -> Result<Vec<u8>> {
        // Both plain and tight frames decode through the same path.
        zstd::decode_all(data).map_err(|e| GccError::corrupt(format!("zstd decode: {e}")))
    }
}

struct HuffmanCodec;
impl Codec for HuffmanCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(huffman::encode(data))
    }
    fn decode_unchecked(&self, data: &[u8]) -> Result<Vec<u8>> {
        huffman::decode(data)
    }
}

/// `num_v0`'s "compression" is its own canonical varint form: a stream
/// handed to this codec is already expected to be the plain-varint encoding
/// of an integer sequence (see [`num::encode_v0`]), so `encode`/`decode` are
/// both identity, modulo the `ulen` post-condition.
struct NumV0Codec;
impl Codec for NumV0Codec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
    fn decode_unchecked(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

struct MbnMetaCodec;
impl Codec for MbnMetaCodec {
    fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
    fn decode_unchecked(&self, data: &[u8]) -> Result<Vec<u8>> {
        // `mbn` is a meta-codec: its "payload" is itself a bundle, parsed by
        // the mbn module, not decompressed here.
        Ok(data.to_vec())
    }
}

fn check_ulen(actual: u64, expected: u64) -> Result<()> {
    if actual != expected {
        return Err(GccError::corrupt(format!(
            "decompressed length {actual} does not match declared ulen {expected}"
        )));
    }
    Ok(())
}

/// Resolve a [`CodecId`] to its [`Codec`] implementation.
///
/// # Panics
/// Never panics, but [`CodecId::NumV1`] has no generic-trait implementation
/// (see module docs) — callers must check
/// [`CodecId::needs_side_channel_meta`] first and route through
/// [`num::encode_v1`]/[`num::decode_v1`] instead.
pub fn get_codec(id: CodecId) -> Box<dyn Codec> {
    match id {
        CodecId::Huffman => Box::new(HuffmanCodec),
        CodecId::Zstd => Box::new(ZstdCodec { tight: false }),
        CodecId::ZstdTight => Box::new(ZstdCodec { tight: true }),
        CodecId::Raw => Box::new(RawCodec),
        CodecId::Mbn => Box::new(MbnMetaCodec),
        CodecId::NumV0 => Box::new(NumV0Codec),
        CodecId::Zlib => Box::new(ZlibCodec),
        CodecId::NumV1 => Box::new(NumV0Codec), // placeholder; never invoked, see needs_side_channel_meta
    }
}

/// Resolve a raw on-disk `codec_code` byte, failing hard on unknown codes —
/// no fallback, matching the "fail hard, no negotiation" contract.
pub fn codec_id_from_code(code: u8) -> Result<CodecId> {
    CodecId::from_code(code).ok_or_else(|| GccError::corrupt(format!("unknown codec_code {code}")))
}
