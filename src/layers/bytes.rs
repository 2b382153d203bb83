//! `bytes`: the identity layer. One stream, `MAIN`, untouched.

use super::{Layer, LayerOutput};
use crate::error::{GccError, Result};
use crate::mbn::STYPE_MAIN;

pub struct BytesLayer;

impl Layer for BytesLayer {
    fn layer_code(&self) -> u8 {
        0
    }
    fn name(&self) -> &'static str {
        "bytes"
    }

    fn encode(&self, data: &[u8]) -> Result<LayerOutput> {
        Ok(LayerOutput {
            streams: vec![(STYPE_MAIN, data.to_vec())],
            meta: Vec::new(),
        })
    }

    fn decode(&self, streams: &[(u8, Vec<u8>)], _meta: &[u8]) -> Result<Vec<u8>> {
        streams
            .iter()
            .find(|(s, _)| *s == STYPE_MAIN)
            .map(|(_, b)| b.clone())
            .ok_or_else(|| GccError::corrupt("bytes layer: missing MAIN stream"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_arbitrary_bytes() {
        let layer = BytesLayer;
        let data = vec![0u8, 1, 2, 255, 254, 0, 10];
        let out = layer.encode(&data).unwrap();
        assert!(out.meta.is_empty());
        let back = layer.decode(&out.streams, &out.meta).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn roundtrip_empty() {
        let layer = BytesLayer;
        let out = layer.encode(&[]).unwrap();
        let back = layer.decode(&out.streams, &out.meta).unwrap();
        assert!(back.is_empty());
    }
}
