//! `tpl_lines_v0` / `tpl_lines_shared_v0`: per-line templating.
//!
//! Each line is reduced to a skeleton (digit runs replaced by the same
//! `0x00` sentinel [`super::split_text_nums`] uses, reused here at line
//! granularity) plus the digit runs' values. Distinct skeletons form a
//! per-file template vocabulary (`TPL`, newline-joined); `IDS` holds the
//! per-line template id, `NUMS` the flattened numeric fields in line order.
//! `meta`'s first byte is the trailing-newline flag.
//!
//! Both layer codes share this self-contained wire shape — a file is always
//! independently decodable. `tpl_lines_shared_v0` additionally supports a
//! bucket-level [`TemplateDict`] via [`encode_shared`]/[`decode_shared`],
//! used by the directory packer to reuse template ids across files in a
//! bucket (a resource entry in the GCA1 archive, not part of this layer's
//! own file format). That path bypasses the generic [`super::Layer`]
//! registry the way `num_v1` bypasses the generic [`crate::codec::Codec`]
//! trait — both need a side channel the uniform per-file contract doesn't
//! carry.

use std::collections::HashMap;

use super::split_text_nums;
use super::{Layer, LayerOutput};
use crate::codec::num;
use crate::error::{GccError, Result};
use crate::mbn::{STYPE_IDS, STYPE_NUMS, STYPE_TPL};
use crate::varint::{read_varint, write_varint};

/// Length-prefix each skeleton rather than newline-joining them. A plain
/// `join("\n")` cannot tell "zero templates" apart from "one template whose
/// skeleton happens to be empty" (e.g. a file made only of blank lines) — both
/// serialize to the same empty buffer.
pub(crate) fn encode_template_list(templates: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for t in templates {
        let bytes = t.as_bytes();
        write_varint(&mut out, bytes.len() as u64);
        out.extend_from_slice(bytes);
    }
    out
}

fn decode_template_list(buf: &[u8]) -> Result<Vec<String>> {
    let mut templates = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        let len = read_varint(buf, &mut pos)? as usize;
        let end = pos
            .checked_add(len)
            .ok_or_else(|| GccError::corrupt("tpl_lines: template entry length overflow"))?;
        let slice = buf
            .get(pos..end)
            .ok_or_else(|| GccError::corrupt("tpl_lines: template entry out of bounds"))?;
        let s = std::str::from_utf8(slice).map_err(|_| GccError::corrupt("tpl_lines: template entry is not valid UTF-8"))?;
        templates.push(s.to_string());
        pos = end;
    }
    Ok(templates)
}

pub struct TplLinesLayer {
    pub shared: bool,
}

fn split_lines(text: &str) -> (Vec<&str>, bool) {
    if text.is_empty() {
        return (Vec::new(), false);
    }
    let trailing_newline = text.ends_with('\n');
    let body = if trailing_newline { &text[..text.len() - 1] } else { text };
    (body.split('\n').collect(), trailing_newline)
}

fn build(lines: &[&str], layer_name: &str) -> Result<(Vec<String>, Vec<u64>, Vec<u64>)> {
    let mut vocab: Vec<String> = Vec::new();
    let mut index: HashMap<String, u64> = HashMap::new();
    let mut ids = Vec::with_capacity(lines.len());
    let mut nums = Vec::new();

    for &line in lines {
        if !split_text_nums::applicable(line.as_bytes()) {
            return Err(GccError::usage(format!(
                "{layer_name}: a line is not representable by this layer, choose another"
            )));
        }
        let (skeleton_bytes, line_nums) = split_text_nums::split(line.as_bytes());
        let skeleton = String::from_utf8(skeleton_bytes).expect("ascii/utf8 preserved by split_text_nums::split");
        let id = match index.get(&skeleton) {
            Some(&id) => id,
            None => {
                let id = vocab.len() as u64;
                vocab.push(skeleton.clone());
                index.insert(skeleton, id);
                id
            }
        };
        ids.push(id);
        nums.extend(line_nums);
    }
    Ok((vocab, ids, nums))
}

/// Expand a skeleton's `0x00` sentinels back to decimal digits, byte by
/// byte — skeletons may contain multi-byte UTF-8 sequences (e.g. accented
/// letters), so this must not go through `char` casts of individual bytes.
fn expand_skeleton(skeleton: &str, nums: &[u64], ni: &mut usize) -> Result<Vec<u8>> {
    let mut line = Vec::with_capacity(skeleton.len());
    for &b in skeleton.as_bytes() {
        if b == 0x00 {
            let v = *nums
                .get(*ni)
                .ok_or_else(|| GccError::corrupt("tpl_lines: NUMS stream exhausted"))?;
            line.extend_from_slice(v.to_string().as_bytes());
            *ni += 1;
        } else {
            line.push(b);
        }
    }
    Ok(line)
}

fn reconstruct(vocab: &[String], ids: &[u64], nums: &[u64]) -> Result<Vec<Vec<u8>>> {
    let mut lines = Vec::with_capacity(ids.len());
    let mut ni = 0;
    for &id in ids {
        let skeleton = vocab
            .get(id as usize)
            .ok_or_else(|| GccError::corrupt(format!("tpl_lines: template id {id} out of range")))?;
        lines.push(expand_skeleton(skeleton, nums, &mut ni)?);
    }
    Ok(lines)
}

impl Layer for TplLinesLayer {
    fn layer_code(&self) -> u8 {
        if self.shared {
            8
        } else {
            7
        }
    }
    fn name(&self) -> &'static str {
        if self.shared {
            "tpl_lines_shared_v0"
        } else {
            "tpl_lines_v0"
        }
    }

    fn encode(&self, data: &[u8]) -> Result<LayerOutput> {
        let text = super::require_utf8(data, self.name())?;
        let (lines, trailing_newline) = split_lines(text);
        let (vocab, ids, nums) = build(&lines, self.name())?;

        let tpl_stream = encode_template_list(&vocab);
        Ok(LayerOutput {
            streams: vec![
                (STYPE_TPL, tpl_stream),
                (STYPE_IDS, num::encode_v0(&ids)),
                (STYPE_NUMS, num::encode_v0(&nums)),
            ],
            meta: vec![trailing_newline as u8],
        })
    }

    fn decode(&self, streams: &[(u8, Vec<u8>)], meta: &[u8]) -> Result<Vec<u8>> {
        let find = |stype: u8| streams.iter().find(|(s, _)| *s == stype).map(|(_, b)| b.as_slice());
        let tpl_bytes = find(STYPE_TPL).ok_or_else(|| GccError::corrupt("tpl_lines: missing TPL stream"))?;
        let ids_bytes = find(STYPE_IDS).ok_or_else(|| GccError::corrupt("tpl_lines: missing IDS stream"))?;
        let nums_bytes = find(STYPE_NUMS).ok_or_else(|| GccError::corrupt("tpl_lines: missing NUMS stream"))?;
        let trailing_newline = *meta.first().ok_or_else(|| GccError::corrupt("tpl_lines: missing meta byte"))? != 0;

        let vocab = decode_template_list(tpl_bytes)?;
        let ids = num::decode_v0(ids_bytes)?;
        let nums = num::decode_v0(nums_bytes)?;

        let lines = reconstruct(&vocab, &ids, &nums)?;
        let mut out = lines.join(&b"\n"[..]);
        if trailing_newline {
            out.push(b'\n');
        }
        Ok(out)
    }
}

/// Bucket-level template dictionary shared across files packed together,
/// used by the directory packer's `tpl_lines_shared_v0` path. Stored as a
/// GCA1 resource (`__res__/tpl_dict_v1` or similar), not inside any single
/// file's container.
#[derive(Debug, Clone, Default)]
pub struct TemplateDict {
    templates: Vec<String>,
    index: HashMap<String, u64>,
}

impl TemplateDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert(&mut self, skeleton: &str) -> u64 {
        if let Some(&id) = self.index.get(skeleton) {
            return id;
        }
        let id = self.templates.len() as u64;
        self.templates.push(skeleton.to_string());
        self.index.insert(skeleton.to_string(), id);
        id
    }

    pub fn get(&self, id: u64) -> Option<&str> {
        self.templates.get(id as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// The full template list in id order, for a bucket-level snapshot
    /// (e.g. the `tpl_dict_v1` GCA1 resource).
    pub fn templates(&self) -> &[String] {
        &self.templates
    }
}

/// Encode using a shared, cross-file template dictionary: ids reference
/// `dict` (extended in place with any new skeletons), and `TPL` carries only
/// the newly-added templates for this file rather than the full vocabulary.
pub fn encode_shared(data: &[u8], dict: &mut TemplateDict) -> Result<LayerOutput> {
    let text = super::require_utf8(data, "tpl_lines_shared_v0")?;
    let (lines, trailing_newline) = split_lines(text);

    let mut ids = Vec::with_capacity(lines.len());
    let mut nums = Vec::new();
    let mut new_templates = Vec::new();

    for &line in &lines {
        if !split_text_nums::applicable(line.as_bytes()) {
            return Err(GccError::usage(
                "tpl_lines_shared_v0: a line is not representable by this layer, choose another",
            ));
        }
        let (skeleton_bytes, line_nums) = split_text_nums::split(line.as_bytes());
        let skeleton = String::from_utf8(skeleton_bytes).expect("ascii/utf8 preserved by split_text_nums::split");
        let before = dict.len();
        let id = dict.get_or_insert(&skeleton);
        if id as usize >= before {
            new_templates.push(skeleton);
        }
        ids.push(id);
        nums.extend(line_nums);
    }

    let tpl_stream = encode_template_list(&new_templates);
    Ok(LayerOutput {
        streams: vec![
            (STYPE_TPL, tpl_stream),
            (STYPE_IDS, num::encode_v0(&ids)),
            (STYPE_NUMS, num::encode_v0(&nums)),
        ],
        meta: vec![trailing_newline as u8],
    })
}

/// Inverse of [`encode_shared`]. `TPL` here carries only new templates, so
/// `dict` must already hold every id below this file's minimum referenced
/// id (the packer is responsible for replaying files in the order they were
/// encoded so the dictionary stays in sync).
pub fn decode_shared(streams: &[(u8, Vec<u8>)], meta: &[u8], dict: &mut TemplateDict) -> Result<Vec<u8>> {
    let find = |stype: u8| streams.iter().find(|(s, _)| *s == stype).map(|(_, b)| b.as_slice());
    let tpl_bytes = find(STYPE_TPL).ok_or_else(|| GccError::corrupt("tpl_lines_shared_v0: missing TPL stream"))?;
    let ids_bytes = find(STYPE_IDS).ok_or_else(|| GccError::corrupt("tpl_lines_shared_v0: missing IDS stream"))?;
    let nums_bytes = find(STYPE_NUMS).ok_or_else(|| GccError::corrupt("tpl_lines_shared_v0: missing NUMS stream"))?;
    let trailing_newline = *meta.first().ok_or_else(|| GccError::corrupt("tpl_lines_shared_v0: missing meta byte"))? != 0;

    for skeleton in decode_template_list(tpl_bytes)? {
        dict.get_or_insert(&skeleton);
    }

    let ids = num::decode_v0(ids_bytes)?;
    let nums = num::decode_v0(nums_bytes)?;

    let mut lines = Vec::with_capacity(ids.len());
    let mut ni = 0;
    for id in ids {
        let skeleton = dict
            .get(id)
            .ok_or_else(|| GccError::corrupt(format!("tpl_lines_shared_v0: template id {id} not in dict")))?
            .to_string();
        lines.push(expand_skeleton(&skeleton, &nums, &mut ni)?);
    }

    let mut out = lines.join(&b"\n"[..]);
    if trailing_newline {
        out.push(b'\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_v0_repeated_template() {
        let layer = TplLinesLayer { shared: false };
        let data = b"user 1 logged in\nuser 2 logged in\nuser 3 logged out\n".to_vec();
        let out = layer.encode(&data).unwrap();
        let ids = num::decode_v0(out.stream(STYPE_IDS).unwrap()).unwrap();
        assert_eq!(ids, vec![0, 0, 1]);
        let back = layer.decode(&out.streams, &out.meta).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn roundtrip_no_trailing_newline() {
        let layer = TplLinesLayer { shared: false };
        let data = b"a 1 b\na 2 b".to_vec();
        let out = layer.encode(&data).unwrap();
        let back = layer.decode(&out.streams, &out.meta).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn roundtrip_empty() {
        let layer = TplLinesLayer { shared: false };
        let out = layer.encode(&[]).unwrap();
        let back = layer.decode(&out.streams, &out.meta).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn roundtrip_newline_only_input_single_empty_template() {
        // A lone "\n" is one line with an empty skeleton: vocab == [""].
        // The old newline-joined TPL stream serialized that the same as an
        // empty vocab; the length-prefixed form must tell them apart.
        let layer = TplLinesLayer { shared: false };
        for data in [b"\n".to_vec(), b"\n\n".to_vec()] {
            let out = layer.encode(&data).unwrap();
            assert!(!out.stream(STYPE_TPL).unwrap().is_empty());
            let back = layer.decode(&out.streams, &out.meta).unwrap();
            assert_eq!(back, data);
        }
    }

    #[test]
    fn shared_dict_reused_across_files() {
        let mut dict = TemplateDict::new();
        let a = encode_shared(b"req 1 ok\nreq 2 ok\n", &mut dict).unwrap();
        assert_eq!(dict.len(), 1);
        let b = encode_shared(b"req 3 ok\nreq 4 fail\n", &mut dict).unwrap();
        assert_eq!(dict.len(), 2);
        // Second file reuses template 0 and introduces template 1 only once.
        assert!(b.stream(STYPE_TPL).unwrap().len() < a.stream(STYPE_TPL).unwrap().len() + 20);

        let mut replay_dict = TemplateDict::new();
        let back_a = decode_shared(&a.streams, &a.meta, &mut replay_dict).unwrap();
        assert_eq!(back_a, b"req 1 ok\nreq 2 ok\n");
        let back_b = decode_shared(&b.streams, &b.meta, &mut replay_dict).unwrap();
        assert_eq!(back_b, b"req 3 ok\nreq 4 fail\n");
    }

    #[test]
    fn leading_zero_line_is_rejected() {
        let layer = TplLinesLayer { shared: false };
        assert!(layer.encode(b"code 007 done\n").is_err());
    }
}
