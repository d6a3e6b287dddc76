//! Per-connection pumps: outbound writer, keepalive, frame receiver.
//!
//! Each connected session runs the three pumps as independent tasks over
//! one transport. They stop on cancellation and route every failure into
//! the session's disconnect path; nothing escapes them uncaught.

pub(crate) mod heartbeat;
pub(crate) mod receive;
pub(crate) mod writer;

/// Hook into the session's failure path. Idempotent on the session side,
/// so every pump may call it on the way out.
pub(crate) type DownHook = Box<dyn Fn() + Send + Sync>;
