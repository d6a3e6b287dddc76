//! Live chat client: session lifecycle, message classification, dispatch.
//!
//! Construct a [`SharedCaches`] once per process, then one [`Session`]
//! per room. Register listeners, call [`Session::connect`], and decoded
//! events arrive on the typed callback in wire order.

pub mod caches;
pub mod classify;
pub mod dispatch;
mod error;
pub mod messages;
mod pumps;
pub mod session;

pub use blive_api::HostEntry;
pub use blive_transport::TransportKind;

pub use caches::SharedCaches;
pub use classify::MessageKind;
pub use dispatch::{DisconnectListener, MessageListener, RawListener};
pub use error::{ClassificationError, ClientError};
pub use messages::{Message, MessagePayload};
pub use session::{ANONYMOUS_CHAT_HOST, ConnectionState, Session, SessionConfig};
