//! Outbound writer pump — owns the transport's write half.

use blive_transport::TransportWriter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::DownHook;

/// Drains queued frames into the transport. A write failure means the
/// connection is gone; the session's failure path takes over.
pub(crate) async fn writer_pump(
    mut writer: TransportWriter,
    mut write_rx: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
    on_down: DownHook,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = write_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = writer.send(&frame).await {
                            warn!(error = %e, "transport write failed");
                            on_down();
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    writer.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    async fn tcp_writer(listener: &TcpListener) -> (TransportWriter, TcpStream) {
        let addr = listener.local_addr().unwrap();
        let (client, server) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (_, write) = client.unwrap().into_split();
        let (server, _) = server.unwrap();
        (TransportWriter::Tcp(write), server)
    }

    #[tokio::test]
    async fn frames_reach_the_wire_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (writer, mut server) = tcp_writer(&listener).await;

        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(writer_pump(writer, rx, cancel.clone(), Box::new(|| {})));

        tx.send(b"one".to_vec()).await.unwrap();
        tx.send(b"two".to_vec()).await.unwrap();

        let mut buf = [0u8; 6];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"onetwo");

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
    }

    #[tokio::test]
    async fn closing_the_sender_stops_the_pump() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (writer, mut server) = tcp_writer(&listener).await;

        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(writer_pump(writer, rx, cancel, Box::new(|| {})));

        drop(tx);
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");

        // The transport was shut down on exit.
        let mut buf = [0u8; 1];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
    }
}
