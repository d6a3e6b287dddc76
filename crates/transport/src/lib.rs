//! Byte-stream bindings for the chat connection.
//!
//! Three bindings share one contract: connect to a host/port, expose a
//! `send(bytes)` primitive and an incoming chunk stream, close on demand.
//! The session layer owns retry policy; a failed connect here is final.

mod error;
mod tcp;
mod ws;

use std::net::IpAddr;
use std::time::Duration;

use bytes::Bytes;
use futures_util::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub use error::TransportError;
pub use ws::{random_forwarded_ip, random_user_agent};

/// Deadline for the initial connect (and WS upgrade).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read buffer size for the raw TCP binding.
const TCP_READ_BUF: usize = 4096;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Which binding a session uses, with the platform's default ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Ws,
    Wss,
}

impl TransportKind {
    /// Default port when no host entry supplied one.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Tcp => 2243,
            Self::Ws => 2244,
            Self::Wss => 443,
        }
    }
}

/// Opens a transport of the given kind.
///
/// The raw TCP binding dials the resolved `ip`; the WebSocket bindings dial
/// by hostname (TLS needs the name, and the resolver warmed the cache).
pub async fn connect(
    kind: TransportKind,
    host: &str,
    ip: IpAddr,
    port: u16,
) -> Result<(TransportWriter, TransportReader), TransportError> {
    match kind {
        TransportKind::Tcp => tcp::connect(ip, port).await,
        TransportKind::Ws => ws::connect(host, port, false).await,
        TransportKind::Wss => ws::connect(host, port, true).await,
    }
}

/// Write half of an open transport.
pub enum TransportWriter {
    Tcp(OwnedWriteHalf),
    Ws(SplitSink<WsStream, Message>),
}

impl TransportWriter {
    /// Sends one frame (one binary message on the WS bindings).
    pub async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        match self {
            Self::Tcp(write) => {
                write.write_all(frame).await?;
                Ok(())
            }
            Self::Ws(sink) => {
                sink.send(Message::Binary(Bytes::copy_from_slice(frame)))
                    .await?;
                Ok(())
            }
        }
    }

    /// Closes the transport. Errors during teardown are ignored; the peer
    /// may already be gone.
    pub async fn close(&mut self) {
        match self {
            Self::Tcp(write) => {
                let _ = write.shutdown().await;
            }
            Self::Ws(sink) => {
                let _ = sink.send(Message::Close(None)).await;
                let _ = sink.close().await;
            }
        }
    }
}

/// Anything that yields incoming byte chunks.
///
/// `Ok(Some(chunk))` is data, `Ok(None)` is a clean end of stream. The
/// receive pump is generic over this so tests can script chunk sequences.
pub trait ByteSource: Send {
    fn recv(
        &mut self,
    ) -> impl std::future::Future<Output = Result<Option<Bytes>, TransportError>> + Send;
}

/// Read half of an open transport.
pub enum TransportReader {
    Tcp(OwnedReadHalf),
    Ws(SplitStream<WsStream>),
}

impl ByteSource for TransportReader {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self {
            Self::Tcp(read) => {
                let mut buf = vec![0u8; TCP_READ_BUF];
                let n = read.read(&mut buf).await?;
                if n == 0 {
                    return Ok(None);
                }
                buf.truncate(n);
                Ok(Some(Bytes::from(buf)))
            }
            Self::Ws(stream) => loop {
                match stream.next().await {
                    Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                    Some(Ok(Message::Close(_))) | None => return Ok(None),
                    // Text, ping and pong frames carry no protocol bytes.
                    Some(Ok(_)) => continue,
                    Some(Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)) => {
                        return Ok(None);
                    }
                    Some(Err(e)) => return Err(e.into()),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_per_kind() {
        assert_eq!(TransportKind::Tcp.default_port(), 2243);
        assert_eq!(TransportKind::Ws.default_port(), 2244);
        assert_eq!(TransportKind::Wss.default_port(), 443);
    }
}
