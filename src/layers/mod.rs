//! Semantic layers: reversible transforms from raw bytes to a set of named
//! streams plus optional metadata.
//!
//! Every layer implements [`Layer`]: `encode` splits input into
//! `(stype, bytes)` pairs plus a `meta` blob, `decode` reverses it exactly.
//! For streams whose natural content is an integer sequence (`NUMS`, `IDS`)
//! the canonical `bytes` form is always [`crate::codec::num::encode_v0`]'s
//! plain-varint encoding — any codec can then compress those bytes, and
//! `num_v0`/`num_v1`-aware callers (see [`crate::mbn`]) can recover the
//! integers directly.

pub mod bytes;
pub mod dict_text;
pub mod lines_rle;
pub mod split_text_nums;
pub mod tpl_lines;
pub mod vc0;

use crate::error::{GccError, Result};

/// Output of a layer's `encode`: streams in the order they should be
/// written, plus an optional metadata blob.
#[derive(Debug, Clone, Default)]
pub struct LayerOutput {
    pub streams: Vec<(u8, Vec<u8>)>,
    pub meta: Vec<u8>,
}

impl LayerOutput {
    pub fn stream(&self, stype: u8) -> Option<&[u8]> {
        self.streams
            .iter()
            .find(|(s, _)| *s == stype)
            .map(|(_, b)| b.as_slice())
    }
}

pub trait Layer {
    fn layer_code(&self) -> u8;
    fn name(&self) -> &'static str;
    fn encode(&self, data: &[u8]) -> Result<LayerOutput>;
    fn decode(&self, streams: &[(u8, Vec<u8>)], meta: &[u8]) -> Result<Vec<u8>>;

    /// The `stype` this layer uses when its output happens to be a single
    /// stream. The non-MBN single-stream v6 payload carries no `stype`
    /// field of its own, so the universal decoder asks the layer instead.
    /// Layers that always produce more than one stream never have this
    /// called; the default (`MAIN`) covers [`bytes::BytesLayer`].
    fn single_stream_stype(&self) -> u8 {
        crate::mbn::STYPE_MAIN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerId {
    Bytes,
    Vc0,
    SyllablesIt,
    WordsIt,
    LinesDict,
    LinesRle,
    SplitTextNums,
    TplLinesV0,
    TplLinesSharedV0,
}

impl LayerId {
    pub fn layer_code(self) -> u8 {
        match self {
            LayerId::Bytes => 0,
            LayerId::Vc0 => 1,
            LayerId::SyllablesIt => 2,
            LayerId::WordsIt => 3,
            LayerId::LinesDict => 4,
            LayerId::LinesRle => 5,
            LayerId::SplitTextNums => 6,
            LayerId::TplLinesV0 => 7,
            LayerId::TplLinesSharedV0 => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(LayerId::Bytes),
            1 => Some(LayerId::Vc0),
            2 => Some(LayerId::SyllablesIt),
            3 => Some(LayerId::WordsIt),
            4 => Some(LayerId::LinesDict),
            5 => Some(LayerId::LinesRle),
            6 => Some(LayerId::SplitTextNums),
            7 => Some(LayerId::TplLinesV0),
            8 => Some(LayerId::TplLinesSharedV0),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LayerId::Bytes => "bytes",
            LayerId::Vc0 => "vc0",
            LayerId::SyllablesIt => "syllables_it",
            LayerId::WordsIt => "words_it",
            LayerId::LinesDict => "lines_dict",
            LayerId::LinesRle => "lines_rle",
            LayerId::SplitTextNums => "split_text_nums",
            LayerId::TplLinesV0 => "tpl_lines_v0",
            LayerId::TplLinesSharedV0 => "tpl_lines_shared_v0",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "bytes" => Some(LayerId::Bytes),
            "vc0" => Some(LayerId::Vc0),
            "syllables_it" => Some(LayerId::SyllablesIt),
            "words_it" => Some(LayerId::WordsIt),
            "lines_dict" => Some(LayerId::LinesDict),
            "lines_rle" => Some(LayerId::LinesRle),
            "split_text_nums" => Some(LayerId::SplitTextNums),
            "tpl_lines_v0" => Some(LayerId::TplLinesV0),
            "tpl_lines_shared_v0" => Some(LayerId::TplLinesSharedV0),
            _ => None,
        }
    }
}

/// Resolve a [`LayerId`] to its [`Layer`] implementation. `tpl_lines_shared_v0`
/// resolves to a self-contained, per-file instance here (its own template
/// table inline in `meta`, same wire shape as `tpl_lines_v0`); the
/// bucket-shared-dictionary variant used by the directory packer calls
/// [`tpl_lines::encode_shared`]/[`tpl_lines::decode_shared`] directly,
/// bypassing this registry (see that module's docs).
pub fn get_layer(id: LayerId) -> Box<dyn Layer> {
    match id {
        LayerId::Bytes => Box::new(bytes::BytesLayer),
        LayerId::Vc0 => Box::new(vc0::Vc0Layer),
        LayerId::SyllablesIt => Box::new(dict_text::DictTextLayer::syllables_it()),
        LayerId::WordsIt => Box::new(dict_text::DictTextLayer::words_it()),
        LayerId::LinesDict => Box::new(dict_text::DictTextLayer::lines_dict()),
        LayerId::LinesRle => Box::new(lines_rle::LinesRleLayer),
        LayerId::SplitTextNums => Box::new(split_text_nums::SplitTextNumsLayer),
        LayerId::TplLinesV0 => Box::new(tpl_lines::TplLinesLayer { shared: false }),
        LayerId::TplLinesSharedV0 => Box::new(tpl_lines::TplLinesLayer { shared: true }),
    }
}

pub fn layer_id_from_code(code: u8) -> Result<LayerId> {
    LayerId::from_code(code).ok_or_else(|| GccError::corrupt(format!("unknown layer_code {code}")))
}

/// Require the input to be valid UTF-8, returning the `&str` view. Several
/// layers are text-centric and must report "inapplicable" on non-UTF-8 input
/// rather than attempt a lossy transform.
pub(crate) fn require_utf8<'a>(data: &'a [u8], layer_name: &str) -> Result<&'a str> {
    std::str::from_utf8(data)
        .map_err(|_| GccError::usage(format!("{layer_name}: input is not valid UTF-8, layer inapplicable")))
}
