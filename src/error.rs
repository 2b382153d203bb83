//! Error taxonomy — one enum, one exit code mapping, no silent retries.
//!
//! Every fallible public entry point returns `Result<T, GccError>`. The CLI
//! binary is the only place that calls [`GccError::exit_code`]; library code
//! never calls `std::process::exit`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GccError>;

#[derive(Error, Debug)]
pub enum GccError {
    /// Invalid spec, bad argument, text-only mode on binary input.
    #[error("usage error: {0}")]
    Usage(String),

    /// Structural violation: bad magic, truncated varint, out-of-bounds
    /// length, unknown codec code, ulen mismatch, JSONL parse failure.
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    /// Container version outside 1..=6, or a reserved v6 flag bit is set.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    /// A bucket-level resource referenced by a layer is not present in the
    /// archive.
    #[error("missing resource: {0}")]
    MissingResource(String),

    /// Integrity failure: index CRC, index body SHA-256, blob SHA/CRC, or a
    /// decode-before-hash failure encountered during full verify.
    #[error("hash mismatch: {0}")]
    HashMismatch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GccError {
    pub fn usage(msg: impl Into<String>) -> Self {
        GccError::Usage(msg.into())
    }
    pub fn corrupt(msg: impl Into<String>) -> Self {
        GccError::CorruptPayload(msg.into())
    }
    pub fn unsupported_version(msg: impl Into<String>) -> Self {
        GccError::UnsupportedVersion(msg.into())
    }
    pub fn missing_resource(msg: impl Into<String>) -> Self {
        GccError::MissingResource(msg.into())
    }
    pub fn hash_mismatch(msg: impl Into<String>) -> Self {
        GccError::HashMismatch(msg.into())
    }

    /// Stable process exit code for this error, per the §6 taxonomy table.
    /// `Io`/`Json` have no dedicated exit code of their own; they are treated
    /// as structural corruption (10) unless the call site already mapped
    /// them to something more specific.
    pub fn exit_code(&self) -> i32 {
        match self {
            GccError::Usage(_) => 2,
            GccError::CorruptPayload(_) => 10,
            GccError::UnsupportedVersion(_) => 11,
            GccError::MissingResource(_) => 12,
            GccError::HashMismatch(_) => 13,
            GccError::Io(_) => 10,
            GccError::Json(_) => 10,
        }
    }
}
