//! One logical connection to a room.
//!
//! A session spans many transports across reconnects: connect resolves the
//! token and host, opens the transport, sends the join frame and spawns
//! the pumps; any failure after that funnels through one idempotent
//! disconnect transition which optionally re-enters connect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use blive_api::HostEntry;
use blive_protocol::{JoinBody, join_frame};
use blive_transport::TransportKind;

use crate::caches::SharedCaches;
use crate::dispatch::Dispatcher;
use crate::error::ClientError;
use crate::messages::Message;
use crate::classify::MessageKind;
use crate::pumps;

/// Chat host used when no credentials (and therefore no host list) exist.
pub const ANONYMOUS_CHAT_HOST: &str = "broadcastlv.chat.bilibili.com";

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Identity and behavior of one session. Immutable once the session is
/// constructed.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub room_id: u64,
    /// Room owner's user id as supplied by the caller.
    pub uid: u64,
    /// Browser session cookie; without it the session joins anonymously.
    pub cookie: Option<String>,
    /// User id behind the cookie, stamped into the join body.
    pub cookie_uid: Option<u64>,
    pub transport: TransportKind,
    /// Re-enter connect after an unexpected disconnect.
    pub reconnect: bool,
}

impl SessionConfig {
    pub fn new(room_id: u64) -> Self {
        Self {
            room_id,
            uid: 0,
            cookie: None,
            cookie_uid: None,
            transport: TransportKind::Wss,
            reconnect: true,
        }
    }
}

/// Handle to one session. Cheap to clone; dropping the last clone cancels
/// the pumps.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    shared: Arc<SharedCaches>,
    dispatcher: Arc<Dispatcher>,
    state: Mutex<ConnectionState>,
    /// Re-entrancy guard: at most one connect attempt in flight.
    connecting: AtomicBool,
    connected: AtomicBool,
    /// Set by [`Session::disconnect`]; suppresses the reconnect path.
    explicit_close: AtomicBool,
    /// Cancel token of the current connection's pumps.
    cancel: Mutex<CancellationToken>,
    /// Replaces the anonymous default host (relays, tests).
    host_override: Mutex<Option<HostEntry>>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Ok(cancel) = self.cancel.lock() {
            cancel.cancel();
        }
    }
}

impl Session {
    pub fn new(config: SessionConfig, shared: Arc<SharedCaches>) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(config.room_id));
        Self {
            inner: Arc::new(SessionInner {
                config,
                shared,
                dispatcher,
                state: Mutex::new(ConnectionState::Disconnected),
                connecting: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                explicit_close: AtomicBool::new(false),
                cancel: Mutex::new(CancellationToken::new()),
                host_override: Mutex::new(None),
            }),
        }
    }

    pub fn room_id(&self) -> u64 {
        self.inner.config.room_id
    }

    pub fn state(&self) -> ConnectionState {
        self.inner
            .state
            .lock()
            .map(|s| *s)
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Registers a typed message listener `(room_id, kind, message)`.
    pub fn on_message(
        &self,
        listener: impl Fn(u64, MessageKind, &Message) + Send + Sync + 'static,
    ) {
        self.inner.dispatcher.on_message(listener);
    }

    /// Registers a raw interception hook; returning `true` swallows the
    /// envelope before typed dispatch.
    pub fn on_raw(&self, listener: impl Fn(u64, &str) -> bool + Send + Sync + 'static) {
        self.inner.dispatcher.on_raw(listener);
    }

    /// Registers a disconnect notification listener.
    pub fn on_disconnect(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner.dispatcher.on_disconnect(listener);
    }

    /// Overrides the anonymous chat host.
    pub fn set_chat_host(&self, host: HostEntry) {
        if let Ok(mut guard) = self.inner.host_override.lock() {
            *guard = Some(host);
        }
    }

    /// Connects to the room.
    ///
    /// Returns `false` (with a logged warning) on failure, and immediately
    /// when the session is already connected or a connect is in flight —
    /// concurrent calls never open a second transport.
    pub async fn connect(&self) -> bool {
        if self.inner.connected.load(Ordering::SeqCst) {
            debug!(room_id = self.room_id(), "already connected");
            return false;
        }
        if self.inner.connecting.swap(true, Ordering::SeqCst) {
            debug!(room_id = self.room_id(), "connect already in flight");
            return false;
        }

        self.set_state(ConnectionState::Connecting);
        let result = self.establish().await;
        self.inner.connecting.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(room_id = self.room_id(), error = %e, "connect failed");
                self.set_state(ConnectionState::Disconnected);
                false
            }
        }
    }

    /// Explicitly disconnects. Idempotent; fires the disconnect
    /// notification but never the reconnect path.
    pub fn disconnect(&self) {
        self.inner.explicit_close.store(true, Ordering::SeqCst);
        if !self.inner.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        self.cancel_pumps();
        self.set_state(ConnectionState::Disconnected);
        self.inner.dispatcher.notify_disconnect();
    }

    async fn establish(&self) -> Result<(), ClientError> {
        let cfg = &self.inner.config;
        let shared = &self.inner.shared;

        // Stale tracking id is refreshed here; a failure inside is logged
        // and the join proceeds without one.
        let buvid = shared.tracking_id().await;

        let (token, host) = match &cfg.cookie {
            Some(cookie) => {
                let info = blive_api::fetch_danmu_info(
                    shared.http(),
                    shared.signer(),
                    cfg.room_id,
                    Some(cookie),
                )
                .await?;
                let host = pick_host(&info.host_list)
                    .cloned()
                    .ok_or(ClientError::NoHosts)?;
                (Some(info.token), host)
            }
            None => (None, self.default_host()),
        };

        let port = match cfg.transport {
            TransportKind::Tcp => host.port,
            TransportKind::Ws => host.ws_port,
            TransportKind::Wss => host.wss_port,
        };

        let addrs = shared
            .resolve(&host.host, port)
            .await
            .map_err(ClientError::Dns)?;
        let ip = addrs.first().copied().ok_or(ClientError::NoHosts)?;

        let (mut writer, reader) =
            blive_transport::connect(cfg.transport, &host.host, ip, port).await?;

        // The join frame is always the first bytes on a fresh transport.
        // The platform acks it only implicitly: a bad token shows up as a
        // disconnect, not as a synchronous error.
        let join = match &token {
            Some(token) => JoinBody::authenticated(
                cfg.room_id,
                cfg.cookie_uid.unwrap_or(0),
                token,
                buvid.as_deref().unwrap_or(""),
            ),
            None => JoinBody::anonymous(cfg.room_id),
        };
        writer.send(&join_frame(&join)?).await?;

        let cancel = CancellationToken::new();
        if let Ok(mut guard) = self.inner.cancel.lock() {
            *guard = cancel.clone();
        }
        self.inner.explicit_close.store(false, Ordering::SeqCst);
        self.inner.connected.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
        info!(room_id = cfg.room_id, host = %host.host, port, "session connected");

        let (write_tx, write_rx) = mpsc::channel::<Vec<u8>>(64);

        tokio::spawn(pumps::writer::writer_pump(
            writer,
            write_rx,
            cancel.clone(),
            self.down_hook(),
        ));
        tokio::spawn(pumps::heartbeat::heartbeat_pump(
            write_tx,
            cancel.clone(),
            self.down_hook(),
        ));
        tokio::spawn(pumps::receive::receive_pump(
            reader,
            self.inner.dispatcher.clone(),
            cancel,
            self.down_hook(),
        ));
        Ok(())
    }

    fn down_hook(&self) -> pumps::DownHook {
        let session = self.clone();
        Box::new(move || session.transport_down())
    }

    /// Failure path shared by all pumps. The swap makes the transition
    /// exactly-once: whichever pump loses the race is a no-op, so the
    /// disconnect notification never fires twice for one connection.
    fn transport_down(&self) {
        if !self.inner.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        self.cancel_pumps();
        self.set_state(ConnectionState::Disconnected);
        self.inner.dispatcher.notify_disconnect();

        if self.inner.config.reconnect && !self.inner.explicit_close.load(Ordering::SeqCst) {
            // Immediate re-entry; backoff is the outer caller's concern.
            let session = self.clone();
            tokio::spawn(async move {
                if !session.connect().await {
                    warn!(room_id = session.room_id(), "reconnect attempt failed");
                }
            });
        }
    }

    fn cancel_pumps(&self) {
        if let Ok(cancel) = self.inner.cancel.lock() {
            cancel.cancel();
        }
    }

    fn set_state(&self, new_state: ConnectionState) {
        if let Ok(mut guard) = self.inner.state.lock() {
            *guard = new_state;
        }
    }

    fn default_host(&self) -> HostEntry {
        let overridden = self
            .inner
            .host_override
            .lock()
            .ok()
            .and_then(|guard| guard.clone());
        overridden.unwrap_or_else(|| HostEntry {
            host: ANONYMOUS_CHAT_HOST.to_string(),
            port: TransportKind::Tcp.default_port(),
            ws_port: TransportKind::Ws.default_port(),
            wss_port: TransportKind::Wss.default_port(),
        })
    }
}

/// Selection is randomized among candidates.
fn pick_host(hosts: &[HostEntry]) -> Option<&HostEntry> {
    if hosts.is_empty() {
        return None;
    }
    let idx = rand::thread_rng().gen_range(0..hosts.len());
    hosts.get(idx)
}
