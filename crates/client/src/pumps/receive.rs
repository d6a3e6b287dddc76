//! Receive pump — transport chunks in, dispatched messages out.

use std::sync::Arc;

use blive_protocol::{FrameDecoder, Payload};
use blive_transport::ByteSource;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::DownHook;
use crate::dispatch::Dispatcher;

/// Reads the transport until it ends, feeding the frame decoder and
/// dispatching each decoded payload in arrival order.
///
/// Clean stream end and recognized normal closures exit quietly; protocol
/// and transport errors are logged. Either way the exit routes through the
/// session's (idempotent) failure path — no error escapes the pump.
pub(crate) async fn receive_pump<R: ByteSource>(
    mut reader: R,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    on_down: DownHook,
) {
    let mut decoder = FrameDecoder::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = reader.recv() => {
                match chunk {
                    Ok(Some(chunk)) => {
                        if let Err(e) = decoder.push(&chunk) {
                            warn!(error = %e, "frame stream corrupted");
                            break;
                        }
                        while let Some(payload) = decoder.next() {
                            match payload {
                                Payload::Command(json) => dispatcher.dispatch_command(&json),
                                Payload::Popularity(count) => {
                                    dispatcher.dispatch_popularity(count);
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        debug!("transport stream ended");
                        break;
                    }
                    Err(e) if e.is_benign_close() => {
                        debug!(error = %e, "transport closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "transport read error");
                        break;
                    }
                }
            }
        }
    }

    on_down();
}
