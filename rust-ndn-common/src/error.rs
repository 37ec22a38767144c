//! Error types for the rust-ndn stack.

use thiserror::Error;

/// All recognizable failure kinds across the codec, engine and router.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed TLV or invalid component syntax.
    #[error("format error: {0}")]
    Format(String),

    /// A length field overshoots the enclosing wire bounds.
    #[error("buffer overflow: needed {needed} bytes, {available} available")]
    BufferOverflow { needed: usize, available: usize },

    /// A critical type number the parser does not understand.
    #[error("unrecognized critical field type {0}")]
    UnrecognizedCriticalField(u64),

    /// An ordered parser advanced past a required field without seeing it.
    #[error("required field {0} was skipped")]
    SkipRequired(&'static str),

    /// A feature the runtime declines.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// Nonsensical names or arguments passed to an API.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    Network(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("security error: {0}")]
    Security(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("face is down")]
    FaceDown,

    #[error("no public key available")]
    NoPublicKey,

    /// A handler is already attached for the prefix.
    #[error("multiple handlers for the same prefix")]
    MultipleHandlers,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a `Format` error.
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }
}
