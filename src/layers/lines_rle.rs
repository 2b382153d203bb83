//! `lines_rle`: run-length-encodes consecutive duplicate lines.
//!
//! `TEXT` holds one line per run (newline-joined), `NUMS` holds each run's
//! repeat count. `meta`'s first byte records whether the original input
//! ended with a trailing newline, since splitting on `\n` alone loses that
//! bit.

use super::{Layer, LayerOutput};
use crate::codec::num;
use crate::error::{GccError, Result};
use crate::mbn::{STYPE_NUMS, STYPE_TEXT};

pub struct LinesRleLayer;

fn split_lines(text: &str) -> (Vec<&str>, bool) {
    if text.is_empty() {
        return (Vec::new(), false);
    }
    let trailing_newline = text.ends_with('\n');
    let body = if trailing_newline { &text[..text.len() - 1] } else { text };
    (body.split('\n').collect(), trailing_newline)
}

fn run_length_encode(lines: &[&str]) -> (Vec<String>, Vec<u64>) {
    let mut runs = Vec::new();
    let mut counts = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let mut count: u64 = 1;
        while i + (count as usize) < lines.len() && lines[i + count as usize] == line {
            count += 1;
        }
        runs.push(line.to_string());
        counts.push(count);
        i += count as usize;
    }
    (runs, counts)
}

impl Layer for LinesRleLayer {
    fn layer_code(&self) -> u8 {
        5
    }
    fn name(&self) -> &'static str {
        "lines_rle"
    }

    fn encode(&self, data: &[u8]) -> Result<LayerOutput> {
        let text = super::require_utf8(data, "lines_rle")?;
        let (lines, trailing_newline) = split_lines(text);
        if lines.iter().any(|l| l.contains('\u{0}')) {
            return Err(GccError::usage("lines_rle: NUL byte in a line, layer inapplicable"));
        }
        let (runs, counts) = run_length_encode(&lines);

        let text_stream = runs.join("\n").into_bytes();
        let meta = vec![trailing_newline as u8];

        Ok(LayerOutput {
            streams: vec![(STYPE_TEXT, text_stream), (STYPE_NUMS, num::encode_v0(&counts))],
            meta,
        })
    }

    fn decode(&self, streams: &[(u8, Vec<u8>)], meta: &[u8]) -> Result<Vec<u8>> {
        let find = |stype: u8| streams.iter().find(|(s, _)| *s == stype).map(|(_, b)| b.as_slice());
        let text_bytes = find(STYPE_TEXT).ok_or_else(|| GccError::corrupt("lines_rle: missing TEXT stream"))?;
        let counts_bytes = find(STYPE_NUMS).ok_or_else(|| GccError::corrupt("lines_rle: missing NUMS stream"))?;
        let counts = num::decode_v0(counts_bytes)?;
        let trailing_newline = *meta.first().unwrap_or(&0) != 0;

        if text_bytes.is_empty() && counts.is_empty() {
            return Ok(Vec::new());
        }

        let text = std::str::from_utf8(text_bytes).map_err(|_| GccError::corrupt("lines_rle: TEXT is not valid UTF-8"))?;
        let runs: Vec<&str> = text.split('\n').collect();
        if runs.len() != counts.len() {
            return Err(GccError::corrupt("lines_rle: run count does not match NUMS length"));
        }

        let mut out_lines = Vec::new();
        for (line, &count) in runs.iter().zip(counts.iter()) {
            for _ in 0..count {
                out_lines.push(*line);
            }
        }
        let mut out = out_lines.join("\n");
        if trailing_newline {
            out.push('\n');
        }
        Ok(out.into_bytes())
    }
}
