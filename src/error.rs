//! Error types for the LLSN codec.

/// Errors that can occur while encoding or decoding LLSN packets.
///
/// Any failure aborts the whole call: in buffer mode no partial output is
/// returned, in channel mode the chunk channel is closed without a
/// completion sentinel.
#[derive(Debug, thiserror::Error)]
pub enum LlsnError {
    /// Truncated stream, unknown type tag, or a decoder state invariant
    /// was violated.
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// The packet's version nibble does not match the supported encoder
    /// version.
    #[error("unsupported packet version: {0}")]
    UnsupportedVersion(u8),

    /// A value kind with no mapping into the wire tag space, or a reserved
    /// tag the codec does not materialize.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// A string or blob payload exceeds its hard length limit.
    #[error("length limit exceeded: {0}")]
    Limit(String),

    /// Invalid UTF-8 in a string payload, or an arithmetic overflow while
    /// unpacking a variable-length integer.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Error from the underlying byte source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No chunk arrived on the source channel within the inactivity window.
    #[error("timed out waiting for stream data")]
    Timeout,
}

impl LlsnError {
    /// Shorthand for a `Malformed` error with a formatted message.
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}
