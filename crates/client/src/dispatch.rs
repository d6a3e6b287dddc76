//! Synchronous message dispatch.
//!
//! Listeners are explicit registration lists invoked in order. The raw
//! hook runs before classification and can swallow an envelope entirely.
//! Nothing a listener does (error or panic) may reach the receive pump.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::RwLock;

use blive_protocol::CommandEnvelope;
use tracing::{error, warn};

use crate::classify::{MessageKind, factory};
use crate::messages::Message;

/// Typed message listener: `(room_id, kind, message)`.
pub type MessageListener = Box<dyn Fn(u64, MessageKind, &Message) + Send + Sync>;

/// Raw interception hook: `(room_id, raw_json) -> handled`. Returning
/// `true` stops dispatch for that envelope.
pub type RawListener = Box<dyn Fn(u64, &str) -> bool + Send + Sync>;

/// Disconnect notification listener.
pub type DisconnectListener = Box<dyn Fn() + Send + Sync>;

/// Listener registry and dispatch entry points for one session.
pub struct Dispatcher {
    room_id: u64,
    listeners: RwLock<Vec<MessageListener>>,
    raw: RwLock<Vec<RawListener>>,
    disconnect: RwLock<Vec<DisconnectListener>>,
}

impl Dispatcher {
    pub fn new(room_id: u64) -> Self {
        Self {
            room_id,
            listeners: RwLock::new(Vec::new()),
            raw: RwLock::new(Vec::new()),
            disconnect: RwLock::new(Vec::new()),
        }
    }

    pub fn on_message(&self, listener: impl Fn(u64, MessageKind, &Message) + Send + Sync + 'static) {
        write_guard(&self.listeners).push(Box::new(listener));
    }

    pub fn on_raw(&self, listener: impl Fn(u64, &str) -> bool + Send + Sync + 'static) {
        write_guard(&self.raw).push(Box::new(listener));
    }

    pub fn on_disconnect(&self, listener: impl Fn() + Send + Sync + 'static) {
        write_guard(&self.disconnect).push(Box::new(listener));
    }

    /// Classifies and dispatches one decoded command string.
    ///
    /// Parse and extraction failures are this message's problem only: they
    /// are logged and the message is dropped, the stream continues.
    pub(crate) fn dispatch_command(&self, json: &str) {
        for hook in read_guard(&self.raw).iter() {
            let handled = catch_unwind(AssertUnwindSafe(|| hook(self.room_id, json)));
            match handled {
                Ok(true) => return,
                Ok(false) => {}
                Err(_) => error!(room_id = self.room_id, "raw listener panicked"),
            }
        }

        let envelope = match CommandEnvelope::parse(json) {
            Ok(env) => env,
            Err(e) => {
                warn!(room_id = self.room_id, error = %e, "unparseable command envelope");
                return;
            }
        };

        let kind = envelope.cmd().map_or(MessageKind::Generic, MessageKind::classify);
        let payload = match factory(kind)(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    room_id = self.room_id,
                    cmd = envelope.cmd().unwrap_or(""),
                    error = %e,
                    "message construction failed"
                );
                return;
            }
        };
        let message = Message::command(envelope, payload);

        // Guard purchases also fire the legacy event, same payload.
        if kind == MessageKind::UserToast {
            self.emit(MessageKind::GuardBuy, &message);
        }
        self.emit(kind, &message);
    }

    /// Dispatches a room-popularity value from a heartbeat ack.
    pub(crate) fn dispatch_popularity(&self, count: u32) {
        let message = Message::popularity(count);
        self.emit(MessageKind::Popularity, &message);
    }

    /// Fires the disconnect notification.
    pub(crate) fn notify_disconnect(&self) {
        for listener in read_guard(&self.disconnect).iter() {
            if catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                error!(room_id = self.room_id, "disconnect listener panicked");
            }
        }
    }

    fn emit(&self, kind: MessageKind, message: &Message) {
        for listener in read_guard(&self.listeners).iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(self.room_id, kind, message))).is_err() {
                error!(room_id = self.room_id, kind = ?kind, "message listener panicked");
            }
        }
    }
}

fn read_guard<T>(lock: &RwLock<Vec<T>>) -> std::sync::RwLockReadGuard<'_, Vec<T>> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_guard<T>(lock: &RwLock<Vec<T>>) -> std::sync::RwLockWriteGuard<'_, Vec<T>> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
