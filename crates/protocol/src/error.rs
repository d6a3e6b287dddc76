//! Error types for the wire protocol.

/// Errors produced while decoding the frame stream.
///
/// Any of these means the stream can no longer be trusted; the owner is
/// expected to drop the connection rather than resynchronize.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(u32),

    #[error("invalid frame length: {0}")]
    InvalidLength(u32),

    #[error("truncated frame header")]
    TruncatedHeader,

    #[error("decompression failed: {0}")]
    Decompress(std::io::Error),

    #[error("command body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
