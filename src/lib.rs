//! gcc-ocf: a layered lossless compression framework — semantic layers,
//! numeric codecs, a self-describing multi-stream payload (MBN), a v6
//! container format, a bucket archive (GCA1), and a directory packer that
//! picks a compression plan per bucket via sampling ("autopick").
//!
//! Top-level entry points: [`pipeline::compress_with_pipeline`] /
//! [`universal::decode_file`] for single files, [`dirpack`] for directories,
//! [`gca`] for the archive format directly, [`verify`] for integrity checks
//! above [`gca`]'s primitives.

pub mod codec;
pub mod container;
pub mod dirpack;
pub mod error;
pub mod gca;
pub mod layers;
pub mod mbn;
pub mod perf;
pub mod pipeline;
pub mod topdb;
pub mod universal;
pub mod varint;
pub mod verify;

pub use error::{GccError, Result};
pub use pipeline::{compress_with_pipeline, decompress, PipelineSpec};
pub use universal::decode_file;
