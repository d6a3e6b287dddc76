//! Raw TCP binding.

use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpStream;
use tracing::debug;

use crate::error::TransportError;
use crate::{CONNECT_TIMEOUT, TransportReader, TransportWriter};

/// Opens a raw socket to the resolved address. No extra handshake; the
/// join frame is the first thing on the wire.
pub(crate) async fn connect(
    ip: IpAddr,
    port: u16,
) -> Result<(TransportWriter, TransportReader), TransportError> {
    let addr = SocketAddr::new(ip, port);
    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::Timeout)??;
    debug!(%addr, "tcp transport connected");

    let (read, write) = stream.into_split();
    Ok((TransportWriter::Tcp(write), TransportReader::Tcp(read)))
}
