//! Numeric stream codecs: `num_v0` and `num_v1`.
//!
//! These operate on `&[u64]`, not `&[u8]` — the "decompressed" form of an
//! integer stream is *defined* as [`encode_v0`]'s plain-varint output, so a
//! `num_v0`-coded stream's `comp` bytes already equal that canonical form.
//! `num_v1` transforms the integer sequence before varint-encoding it and
//! needs a one-byte mode selector carried by the caller (MBN per-stream
//! `meta`, or the v6 container meta slot) — see [`super`] module docs.

use crate::error::{GccError, Result};
use crate::varint::{read_varint, write_varint};

/// Plain sequence of unsigned LEB128 varints, one per integer, no framing.
pub fn encode_v0(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    for &v in values {
        write_varint(&mut out, v);
    }
    out
}

/// Inverse of [`encode_v0`]: consumes the entire buffer as a run of varints.
pub fn decode_v0(buf: &[u8]) -> Result<Vec<u64>> {
    let mut values = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        values.push(read_varint(buf, &mut pos)?);
    }
    Ok(values)
}

const MODE_PLAIN: u8 = 0;
const MODE_DELTA: u8 = 1;
const MODE_ZIGZAG: u8 = 2;
const MODE_RLE: u8 = 3;

#[inline]
fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

#[inline]
fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

fn encode_delta(values: &[u64]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut prev: i64 = 0;
    for &v in values {
        let cur = i64::try_from(v).ok()?;
        let d = cur.checked_sub(prev)?;
        if d < 0 {
            return None;
        }
        write_varint(&mut out, d as u64);
        prev = cur;
    }
    Some(out)
}

fn decode_delta(buf: &[u8]) -> Result<Vec<u64>> {
    let mut values = Vec::new();
    let mut pos = 0;
    let mut prev: i64 = 0;
    while pos < buf.len() {
        let d = read_varint(buf, &mut pos)? as i64;
        prev = prev
            .checked_add(d)
            .ok_or_else(|| GccError::corrupt("num_v1 delta overflow"))?;
        values.push(prev as u64);
    }
    Ok(values)
}

fn encode_zigzag(values: &[u64]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut prev: i64 = 0;
    for &v in values {
        let cur = i64::try_from(v).ok()?;
        let d = cur.checked_sub(prev)?;
        write_varint(&mut out, zigzag_encode(d));
        prev = cur;
    }
    Some(out)
}

fn decode_zigzag(buf: &[u8]) -> Result<Vec<u64>> {
    let mut values = Vec::new();
    let mut pos = 0;
    let mut prev: i64 = 0;
    while pos < buf.len() {
        let zz = read_varint(buf, &mut pos)?;
        let d = zigzag_decode(zz);
        prev = prev
            .checked_add(d)
            .ok_or_else(|| GccError::corrupt("num_v1 zigzag overflow"))?;
        values.push(prev as u64);
    }
    Ok(values)
}

fn encode_rle(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < values.len() {
        let v = values[i];
        let mut run: u64 = 1;
        while i + (run as usize) < values.len() && values[i + run as usize] == v {
            run += 1;
        }
        write_varint(&mut out, run);
        write_varint(&mut out, v);
        i += run as usize;
    }
    out
}

fn decode_rle(buf: &[u8]) -> Result<Vec<u64>> {
    let mut values = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        let run = read_varint(buf, &mut pos)?;
        let v = read_varint(buf, &mut pos)?;
        for _ in 0..run {
            values.push(v);
        }
    }
    Ok(values)
}

/// Pick whichever of plain/delta/zigzag/rle yields the smallest payload for
/// this sequence, returning its mode byte alongside the encoded bytes. Ties
/// favor the lower mode number.
pub fn encode_v1(values: &[u64]) -> (u8, Vec<u8>) {
    let mut best_mode = MODE_PLAIN;
    let mut best = encode_v0(values);

    let mut consider = |mode: u8, candidate: Vec<u8>, best_mode: &mut u8, best: &mut Vec<u8>| {
        if candidate.len() < best.len() {
            *best_mode = mode;
            *best = candidate;
        }
    };

    if let Some(delta) = encode_delta(values) {
        consider(MODE_DELTA, delta, &mut best_mode, &mut best);
    }
    if let Some(zigzag) = encode_zigzag(values) {
        consider(MODE_ZIGZAG, zigzag, &mut best_mode, &mut best);
    }
    let rle = encode_rle(values);
    consider(MODE_RLE, rle, &mut best_mode, &mut best);

    (best_mode, best)
}

/// Inverse of [`encode_v1`]; `mode` comes from the side-channel byte the
/// caller stashed alongside the compressed payload.
pub fn decode_v1(mode: u8, buf: &[u8]) -> Result<Vec<u64>> {
    match mode {
        MODE_PLAIN => decode_v0(buf),
        MODE_DELTA => decode_delta(buf),
        MODE_ZIGZAG => decode_zigzag(buf),
        MODE_RLE => decode_rle(buf),
        other => Err(GccError::corrupt(format!("unknown num_v1 mode {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v0_roundtrip_empty_and_values() {
        assert_eq!(decode_v0(&encode_v0(&[])).unwrap(), Vec::<u64>::new());
        let values = vec![0, 1, 127, 128, 300, 1 << 30];
        assert_eq!(decode_v0(&encode_v0(&values)).unwrap(), values);
    }

    #[test]
    fn v1_roundtrip_monotonic_prefers_delta_or_better() {
        let values: Vec<u64> = (0..100).map(|i| i * 3).collect();
        let (mode, payload) = encode_v1(&values);
        let decoded = decode_v1(mode, &payload).unwrap();
        assert_eq!(decoded, values);
        assert!(payload.len() < encode_v0(&values).len());
    }

    #[test]
    fn v1_roundtrip_non_monotonic_uses_zigzag() {
        let values = vec![10, 3, 50, 1, 1, 1, 99];
        let (mode, payload) = encode_v1(&values);
        assert_eq!(decode_v1(mode, &payload).unwrap(), values);
    }

    #[test]
    fn v1_roundtrip_repeated_run_prefers_rle() {
        let values = vec![7u64; 500];
        let (mode, payload) = encode_v1(&values);
        assert_eq!(mode, MODE_RLE);
        assert_eq!(decode_v1(mode, &payload).unwrap(), values);
    }

    #[test]
    fn v1_unknown_mode_is_corrupt() {
        assert!(decode_v1(250, &[1, 2, 3]).is_err());
    }
}
