//! `syllables_it`, `words_it`, `lines_dict`: tokenize input at a fixed
//! granularity, build a first-appearance vocabulary, and emit an integer-ID
//! sequence plus the vocabulary in `meta`.
//!
//! `words_it`/`syllables_it` tokens form an exact partition of the input
//! (whitespace runs are tokens too), so reconstruction is plain
//! concatenation. `lines_dict` tokens are lines with the separating `\n`
//! stripped, so reconstruction re-joins with `\n` and restores the
//! original trailing-newline bit from `meta`'s leading byte.

use std::collections::HashMap;

use super::{Layer, LayerOutput};
use crate::codec::num;
use crate::error::{GccError, Result};
use crate::mbn::STYPE_IDS;
use crate::varint::{read_varint, write_varint};

#[derive(Clone, Copy, PartialEq, Eq)]
enum DictKind {
    SyllablesIt,
    WordsIt,
    LinesDict,
}

pub struct DictTextLayer {
    kind: DictKind,
}

impl DictTextLayer {
    pub fn syllables_it() -> Self {
        DictTextLayer { kind: DictKind::SyllablesIt }
    }
    pub fn words_it() -> Self {
        DictTextLayer { kind: DictKind::WordsIt }
    }
    pub fn lines_dict() -> Self {
        DictTextLayer { kind: DictKind::LinesDict }
    }
}

fn is_it_vowel(c: char) -> bool {
    matches!(
        c,
        'a' | 'e' | 'i' | 'o' | 'u' | 'A' | 'E' | 'I' | 'O' | 'U' | 'à' | 'è' | 'é' | 'ì' | 'ò' | 'ù' | 'À'
            | 'È' | 'É' | 'Ì' | 'Ò' | 'Ù'
    )
}

/// Split into alternating whitespace / non-whitespace runs, a partition of
/// the whole string.
fn tokenize_alternating(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut in_ws: Option<bool> = None;
    for c in text.chars() {
        let ws = c.is_whitespace();
        match in_ws {
            Some(cur) if cur == ws => buf.push(c),
            Some(_) => {
                tokens.push(std::mem::take(&mut buf));
                buf.push(c);
                in_ws = Some(ws);
            }
            None => {
                buf.push(c);
                in_ws = Some(ws);
            }
        }
    }
    if !buf.is_empty() {
        tokens.push(buf);
    }
    tokens
}

/// Further split non-whitespace tokens into syllable-sized sub-tokens using
/// a simple V.CV boundary heuristic; whitespace tokens pass through whole.
fn syllabify(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut syllables = Vec::new();
    let mut buf = String::new();
    let mut buf_has_vowel = false;
    for i in 0..chars.len() {
        let c = chars[i];
        let vowel = is_it_vowel(c);
        if buf_has_vowel && !vowel && i + 1 < chars.len() && is_it_vowel(chars[i + 1]) {
            syllables.push(std::mem::take(&mut buf));
            buf_has_vowel = false;
        }
        buf.push(c);
        if vowel {
            buf_has_vowel = true;
        }
    }
    if !buf.is_empty() {
        syllables.push(buf);
    }
    syllables
}

fn tokens_for(kind: DictKind, text: &str) -> Vec<String> {
    match kind {
        DictKind::WordsIt => tokenize_alternating(text),
        DictKind::SyllablesIt => tokenize_alternating(text)
            .into_iter()
            .flat_map(|t| {
                if t.chars().next().map(|c| c.is_whitespace()).unwrap_or(false) {
                    vec![t]
                } else {
                    syllabify(&t)
                }
            })
            .collect(),
        DictKind::LinesDict => {
            if text.is_empty() {
                Vec::new()
            } else {
                let body = text.strip_suffix('\n').unwrap_or(text);
                body.split('\n').map(|s| s.to_string()).collect()
            }
        }
    }
}

fn encode_vocab(vocab: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for tok in vocab {
        let bytes = tok.as_bytes();
        write_varint(&mut out, bytes.len() as u64);
        out.extend_from_slice(bytes);
    }
    out
}

fn decode_vocab(buf: &[u8]) -> Result<Vec<String>> {
    let mut vocab = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        let len = read_varint(buf, &mut pos)? as usize;
        let end = pos
            .checked_add(len)
            .ok_or_else(|| GccError::corrupt("dict vocab entry length overflow"))?;
        let slice = buf
            .get(pos..end)
            .ok_or_else(|| GccError::corrupt("dict vocab entry out of bounds"))?;
        let s = std::str::from_utf8(slice)
            .map_err(|_| GccError::corrupt("dict vocab entry is not valid UTF-8"))?;
        vocab.push(s.to_string());
        pos = end;
    }
    Ok(vocab)
}

impl Layer for DictTextLayer {
    fn layer_code(&self) -> u8 {
        match self.kind {
            DictKind::SyllablesIt => 2,
            DictKind::WordsIt => 3,
            DictKind::LinesDict => 4,
        }
    }
    fn name(&self) -> &'static str {
        match self.kind {
            DictKind::SyllablesIt => "syllables_it",
            DictKind::WordsIt => "words_it",
            DictKind::LinesDict => "lines_dict",
        }
    }

    fn encode(&self, data: &[u8]) -> Result<LayerOutput> {
        let text = super::require_utf8(data, self.name())?;
        let tokens = tokens_for(self.kind, text);

        let mut vocab = Vec::new();
        let mut index: HashMap<&str, u64> = HashMap::new();
        let mut ids = Vec::with_capacity(tokens.len());
        for tok in &tokens {
            let id = match index.get(tok.as_str()) {
                Some(&id) => id,
                None => {
                    let id = vocab.len() as u64;
                    vocab.push(tok.clone());
                    index.insert(tok.as_str(), id);
                    id
                }
            };
            ids.push(id);
        }

        let mut meta = Vec::new();
        if self.kind == DictKind::LinesDict {
            meta.push(text.ends_with('\n') as u8);
        }
        meta.extend(encode_vocab(&vocab));

        Ok(LayerOutput {
            streams: vec![(STYPE_IDS, num::encode_v0(&ids))],
            meta,
        })
    }

    fn single_stream_stype(&self) -> u8 {
        STYPE_IDS
    }

    fn decode(&self, streams: &[(u8, Vec<u8>)], meta: &[u8]) -> Result<Vec<u8>> {
        let ids_bytes = streams
            .iter()
            .find(|(s, _)| *s == STYPE_IDS)
            .map(|(_, b)| b.as_slice())
            .ok_or_else(|| GccError::corrupt(format!("{}: missing IDS stream", self.name())))?;
        let ids = num::decode_v0(ids_bytes)?;

        let (trailing_newline, vocab_bytes) = if self.kind == DictKind::LinesDict {
            let flag = *meta.first().ok_or_else(|| GccError::corrupt("lines_dict: missing trailing-newline byte"))? != 0;
            (flag, meta.get(1..).unwrap_or(&[]))
        } else {
            (false, meta)
        };
        let vocab = decode_vocab(vocab_bytes)?;

        let mut tokens = Vec::with_capacity(ids.len());
        for id in ids {
            let tok = vocab
                .get(id as usize)
                .ok_or_else(|| GccError::corrupt(format!("{}: id {} out of vocab range", self.name(), id)))?;
            tokens.push(tok.as_str());
        }

        let out = match self.kind {
            DictKind::LinesDict => {
                let mut s = tokens.join("\n");
                if trailing_newline {
                    s.push('\n');
                }
                s
            }
            _ => tokens.concat(),
        };
        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_it_roundtrip() {
        let layer = DictTextLayer::words_it();
        let data = "the quick brown fox, the quick fox!".as_bytes().to_vec();
        let out = layer.encode(&data).unwrap();
        let back = layer.decode(&out.streams, &out.meta).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn syllables_it_roundtrip() {
        let layer = DictTextLayer::syllables_it();
        let data = "la mamma mangia la pasta".as_bytes().to_vec();
        let out = layer.encode(&data).unwrap();
        let back = layer.decode(&out.streams, &out.meta).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn lines_dict_roundtrip_with_and_without_trailing_newline() {
        let layer = DictTextLayer::lines_dict();
        for data in [b"one\ntwo\none\nthree\n".to_vec(), b"one\ntwo\none".to_vec()] {
            let out = layer.encode(&data).unwrap();
            let back = layer.decode(&out.streams, &out.meta).unwrap();
            assert_eq!(back, data);
        }
    }

    #[test]
    fn lines_dict_dedups_repeated_lines_in_vocab() {
        let layer = DictTextLayer::lines_dict();
        let data = b"a\nb\na\na\nb\n".to_vec();
        let out = layer.encode(&data).unwrap();
        let ids = num::decode_v0(out.stream(crate::mbn::STYPE_IDS).unwrap()).unwrap();
        assert_eq!(ids, vec![0, 1, 0, 0, 1]);
    }

    #[test]
    fn roundtrip_empty() {
        for layer in [DictTextLayer::words_it(), DictTextLayer::syllables_it(), DictTextLayer::lines_dict()] {
            let out = layer.encode(&[]).unwrap();
            let back = layer.decode(&out.streams, &out.meta).unwrap();
            assert!(back.is_empty());
        }
    }

    #[test]
    fn non_utf8_is_rejected() {
        let layer = DictTextLayer::words_it();
        assert!(layer.encode(&[0xff, 0xfe]).is_err());
    }
}
