//! `split_text_nums`: pulls maximal ASCII-digit runs out of text, leaving a
//! sentinel in their place and a parallel integer stream.
//!
//! `TEXT` is everything except digit runs, with each run replaced by a
//! single `0x00` sentinel byte; `NUMS` holds the parsed value of each run in
//! order. `0x00` is reserved for the sentinel, so input containing a
//! literal NUL byte is not representable — and a digit run whose leading
//! zeros are lost by plain decimal parsing (e.g. `"007"` -> `7`, three
//! characters wide vs. one) would not round-trip, since `NUMS` carries only
//! the parsed magnitude (see scenario in the module tests). [`applicable`]
//! checks both conditions up front so callers can fall back to another
//! layer instead of silently producing a lossy transform.

use super::{Layer, LayerOutput};
use crate::error::{GccError, Result};
use crate::mbn::{STYPE_NUMS, STYPE_TEXT};

use crate::codec::num;

const SENTINEL: u8 = 0x00;

pub struct SplitTextNumsLayer;

/// True iff `data` can be round-tripped by this layer: valid UTF-8, no
/// literal NUL bytes, and every digit run's decimal rendering reproduces
/// its original width (no leading zeros being discarded).
pub(crate) fn applicable(data: &[u8]) -> bool {
    if std::str::from_utf8(data).is_err() {
        return false;
    }
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if b == SENTINEL {
            return false;
        }
        if b.is_ascii_digit() {
            let start = i;
            while i < data.len() && data[i].is_ascii_digit() {
                i += 1;
            }
            let run = &data[start..i];
            match std::str::from_utf8(run).unwrap().parse::<u64>() {
                Ok(v) => {
                    if v.to_string().len() != run.len() {
                        return false;
                    }
                }
                Err(_) => return false,
            }
        } else {
            i += 1;
        }
    }
    true
}

pub(crate) fn split(data: &[u8]) -> (Vec<u8>, Vec<u64>) {
    let mut text = Vec::new();
    let mut nums = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if b.is_ascii_digit() {
            let start = i;
            while i < data.len() && data[i].is_ascii_digit() {
                i += 1;
            }
            let run = &data[start..i];
            let value: u64 = std::str::from_utf8(run).unwrap().parse().unwrap();
            nums.push(value);
            text.push(SENTINEL);
        } else {
            text.push(b);
            i += 1;
        }
    }
    (text, nums)
}

impl Layer for SplitTextNumsLayer {
    fn layer_code(&self) -> u8 {
        6
    }
    fn name(&self) -> &'static str {
        "split_text_nums"
    }

    fn encode(&self, data: &[u8]) -> Result<LayerOutput> {
        if !applicable(data) {
            return Err(GccError::usage(
                "split_text_nums: input is not representable by this layer, choose another",
            ));
        }
        let (text, nums) = split(data);
        Ok(LayerOutput {
            streams: vec![(STYPE_TEXT, text), (STYPE_NUMS, num::encode_v0(&nums))],
            meta: Vec::new(),
        })
    }

    fn decode(&self, streams: &[(u8, Vec<u8>)], _meta: &[u8]) -> Result<Vec<u8>> {
        let find = |stype: u8| streams.iter().find(|(s, _)| *s == stype).map(|(_, b)| b.as_slice());
        let text = find(STYPE_TEXT).ok_or_else(|| GccError::corrupt("split_text_nums: missing TEXT stream"))?;
        let nums_bytes = find(STYPE_NUMS).ok_or_else(|| GccError::corrupt("split_text_nums: missing NUMS stream"))?;
        let nums = num::decode_v0(nums_bytes)?;

        let mut out = Vec::with_capacity(text.len());
        let mut ni = 0;
        for &b in text {
            if b == SENTINEL {
                let v = *nums
                    .get(ni)
                    .ok_or_else(|| GccError::corrupt("split_text_nums: NUMS stream exhausted"))?;
                out.extend_from_slice(v.to_string().as_bytes());
                ni += 1;
            } else {
                out.push(b);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_e_split_text_nums_roundtrip() {
        let layer = SplitTextNumsLayer;
        let data = b"abc123def0xyz".to_vec();
        let out = layer.encode(&data).unwrap();
        assert_eq!(out.stream(STYPE_TEXT).unwrap(), b"abc\x00def\x00xyz");
        let nums = num::decode_v0(out.stream(STYPE_NUMS).unwrap()).unwrap();
        assert_eq!(nums, vec![123, 0]);
        let back = layer.decode(&out.streams, &out.meta).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn roundtrip_no_digits() {
        let layer = SplitTextNumsLayer;
        let data = b"no digits here".to_vec();
        let out = layer.encode(&data).unwrap();
        assert!(out.stream(STYPE_NUMS).unwrap().is_empty());
        let back = layer.decode(&out.streams, &out.meta).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn roundtrip_empty() {
        let layer = SplitTextNumsLayer;
        let out = layer.encode(&[]).unwrap();
        let back = layer.decode(&out.streams, &out.meta).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn leading_zero_run_is_inapplicable() {
        assert!(!applicable(b"id007done"));
        let layer = SplitTextNumsLayer;
        assert!(layer.encode(b"id007done").is_err());
    }

    #[test]
    fn literal_nul_byte_is_inapplicable() {
        assert!(!applicable(b"a\x00b"));
    }

    #[test]
    fn non_utf8_is_inapplicable() {
        assert!(!applicable(&[0xff, 0xfe]));
    }
}
