//! Keepalive pump — one empty heartbeat frame every 30 seconds.

use std::time::Duration;

use blive_protocol::heartbeat_frame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::DownHook;

/// Cadence required by the platform.
pub(crate) const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Sends a heartbeat immediately after joining, then one per interval.
/// Stops the instant the connection's cancel token fires; a closed write
/// queue means the writer died, which is a transport failure.
pub(crate) async fn heartbeat_pump(
    write_tx: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
    on_down: DownHook,
) {
    let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if write_tx.send(heartbeat_frame()).await.is_err() {
                    debug!("write queue closed, stopping heartbeat");
                    on_down();
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn drain(rx: &mut mpsc::Receiver<Vec<u8>>) -> usize {
        let mut count = 0;
        while let Ok(frame) = rx.try_recv() {
            assert_eq!(frame, heartbeat_frame());
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn one_heartbeat_per_tick_and_none_after_cancel() {
        tokio::time::pause();

        let (tx, mut rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(heartbeat_pump(tx, cancel.clone(), Box::new(|| {})));

        // The first frame goes out right after joining.
        settle().await;
        assert_eq!(drain(&mut rx), 1);

        // Exactly one frame per 30-second tick.
        for _ in 0..3 {
            tokio::time::advance(HEARTBEAT_INTERVAL).await;
            settle().await;
            assert_eq!(drain(&mut rx), 1);
        }

        // Nothing more once cancelled.
        cancel.cancel();
        settle().await;
        tokio::time::advance(HEARTBEAT_INTERVAL).await;
        settle().await;
        assert_eq!(drain(&mut rx), 0);

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn closed_queue_fires_down_hook() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired_hook = fired.clone();
        let cancel = CancellationToken::new();

        heartbeat_pump(
            tx,
            cancel,
            Box::new(move || {
                fired_hook.store(true, std::sync::atomic::Ordering::SeqCst);
            }),
        )
        .await;

        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    }
}
