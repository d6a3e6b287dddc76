//! Error type shared by all transport bindings.

use tokio_tungstenite::tungstenite;

/// Errors from connecting to or moving bytes over a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("invalid handshake header: {0}")]
    Header(#[from] tungstenite::http::header::InvalidHeaderValue),

    #[error("connection timed out")]
    Timeout,
}

impl TransportError {
    /// True when the error is a recognized normal-closure shape rather than
    /// a fault: the peer tore the stream down without a handshake, or the
    /// socket was already closed locally.
    pub fn is_benign_close(&self) -> bool {
        match self {
            Self::Ws(tungstenite::Error::ConnectionClosed)
            | Self::Ws(tungstenite::Error::AlreadyClosed) => true,
            Self::Ws(tungstenite::Error::Protocol(
                tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
            )) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}
