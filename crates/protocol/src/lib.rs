//! Wire protocol for the live chat connection.
//!
//! Frame layout, outbound frame encoders, the incremental decoder with
//! recursive decompression, and the command envelope.

pub mod codec;
pub mod envelope;
mod error;
pub mod frame;

pub use codec::{FrameDecoder, MAX_FRAME_LEN, Payload};
pub use envelope::CommandEnvelope;
pub use error::ProtocolError;
pub use frame::{
    FrameHeader, HEADER_LEN, JoinBody, Opcode, encode_frame, heartbeat_frame, join_frame,
};
