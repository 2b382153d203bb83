//! `vc0`: classifies each input byte as an ASCII vowel or not, separating
//! the payload into two piles (`VOWELS`, `CONS`) and a `MASK` walk order.
//!
//! "Consonant" here covers everything that is not an ASCII vowel letter —
//! actual consonants, digits, punctuation, whitespace, and non-ASCII bytes
//! all land in `CONS`. This keeps the transform total and lossless without
//! needing a third payload stream for "other".

use super::{Layer, LayerOutput};
use crate::error::{GccError, Result};
use crate::mbn::{STYPE_CONS, STYPE_MASK, STYPE_VOWELS};

pub struct Vc0Layer;

fn is_ascii_vowel(b: u8) -> bool {
    matches!(b, b'a' | b'e' | b'i' | b'o' | b'u' | b'A' | b'E' | b'I' | b'O' | b'U')
}

impl Layer for Vc0Layer {
    fn layer_code(&self) -> u8 {
        1
    }
    fn name(&self) -> &'static str {
        "vc0"
    }

    fn encode(&self, data: &[u8]) -> Result<LayerOutput> {
        let mut mask = Vec::with_capacity(data.len());
        let mut vowels = Vec::new();
        let mut cons = Vec::new();
        for &b in data {
            if is_ascii_vowel(b) {
                mask.push(0u8);
                vowels.push(b);
            } else {
                mask.push(1u8);
                cons.push(b);
            }
        }
        Ok(LayerOutput {
            streams: vec![(STYPE_MASK, mask), (STYPE_VOWELS, vowels), (STYPE_CONS, cons)],
            meta: Vec::new(),
        })
    }

    fn decode(&self, streams: &[(u8, Vec<u8>)], _meta: &[u8]) -> Result<Vec<u8>> {
        let find = |stype: u8| streams.iter().find(|(s, _)| *s == stype).map(|(_, b)| b.as_slice());
        let mask_bytes = find(STYPE_MASK).ok_or_else(|| GccError::corrupt("vc0 layer: missing MASK stream"))?;
        let vowels = find(STYPE_VOWELS).ok_or_else(|| GccError::corrupt("vc0 layer: missing VOWELS stream"))?;
        let cons = find(STYPE_CONS).ok_or_else(|| GccError::corrupt("vc0 layer: missing CONS stream"))?;

        let mut out = Vec::with_capacity(mask_bytes.len());
        let (mut vi, mut ci) = (0usize, 0usize);
        for &m in mask_bytes {
            match m {
                0 => {
                    let b = *vowels
                        .get(vi)
                        .ok_or_else(|| GccError::corrupt("vc0 layer: VOWELS stream exhausted"))?;
                    out.push(b);
                    vi += 1;
                }
                1 => {
                    let b = *cons
                        .get(ci)
                        .ok_or_else(|| GccError::corrupt("vc0 layer: CONS stream exhausted"))?;
                    out.push(b);
                    ci += 1;
                }
                other => {
                    return Err(GccError::corrupt(format!("vc0 layer: invalid mask byte {other}")));
                }
            }
        }
        Ok(out)
    }
}
