//! Binary frame format for the chat server connection.
//!
//! # Wire format
//!
//! ```text
//! [4 bytes BE: total_len (header + body)]
//! [2 bytes BE: header_len, always 16]
//! [2 bytes BE: version (0/1 plain, 2 deflate, 3 brotli)]
//! [4 bytes BE: op]
//! [4 bytes BE: seq, always 1]
//! [total_len - 16 bytes: body]
//! ```

use serde::Serialize;

use crate::error::ProtocolError;

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 16;

/// Version stamped on every outbound frame, matching the web client.
pub const SEND_VERSION: u16 = 2;

/// Sequence parameter, constant on this protocol.
pub const SEQUENCE: u32 = 1;

/// `protover` advertised in the authenticated join body.
pub const JOIN_PROTOVER: u32 = 3;

/// Body format discriminators carried in the header's version field.
pub mod body_format {
    /// Plain body (both values appear in the wild).
    pub const PLAIN_0: u16 = 0;
    pub const PLAIN_1: u16 = 1;
    /// Deflate-compressed body with a 2-byte prefix before the stream.
    pub const DEFLATE: u16 = 2;
    /// Brotli-compressed body.
    pub const BROTLI: u16 = 3;
}

/// Operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Client keepalive, empty body.
    Heartbeat,
    /// Server keepalive ack carrying the room popularity as a BE u32.
    HeartbeatAck,
    /// Command envelope (JSON).
    Command,
    /// Join/auth packet, first frame after connecting.
    Join,
}

impl Opcode {
    pub fn from_u32(op: u32) -> Option<Self> {
        match op {
            2 => Some(Self::Heartbeat),
            3 => Some(Self::HeartbeatAck),
            5 => Some(Self::Command),
            7 => Some(Self::Join),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::Heartbeat => 2,
            Self::HeartbeatAck => 3,
            Self::Command => 5,
            Self::Join => 7,
        }
    }
}

/// Decoded 16-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub total_len: u32,
    pub header_len: u16,
    pub version: u16,
    pub op: u32,
    pub seq: u32,
}

impl FrameHeader {
    /// Decodes a header from the first [`HEADER_LEN`] bytes of `buf`.
    ///
    /// Field extraction is explicit big-endian reads; the slice must be
    /// contiguous (callers normalize multi-segment buffers first).
    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HEADER_LEN {
            return Err(ProtocolError::TruncatedHeader);
        }
        Ok(Self {
            total_len: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            header_len: u16::from_be_bytes([buf[4], buf[5]]),
            version: u16::from_be_bytes([buf[6], buf[7]]),
            op: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            seq: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }

    /// Body length declared by this header.
    pub fn body_len(&self) -> usize {
        self.total_len as usize - HEADER_LEN
    }
}

/// Encodes one outbound frame with the standard version and sequence.
pub fn encode_frame(op: Opcode, body: &[u8]) -> Vec<u8> {
    let total = HEADER_LEN + body.len();
    let mut frame = Vec::with_capacity(total);
    frame.extend_from_slice(&(total as u32).to_be_bytes());
    frame.extend_from_slice(&(HEADER_LEN as u16).to_be_bytes());
    frame.extend_from_slice(&SEND_VERSION.to_be_bytes());
    frame.extend_from_slice(&op.as_u32().to_be_bytes());
    frame.extend_from_slice(&SEQUENCE.to_be_bytes());
    frame.extend_from_slice(body);
    frame
}

/// Encodes the empty-body heartbeat frame.
pub fn heartbeat_frame() -> Vec<u8> {
    encode_frame(Opcode::Heartbeat, &[])
}

/// Encodes the join frame carrying `body` as JSON.
pub fn join_frame(body: &JoinBody) -> Result<Vec<u8>, serde_json::Error> {
    let json = serde_json::to_vec(body)?;
    Ok(encode_frame(Opcode::Join, &json))
}

/// JSON body of the join frame.
///
/// The anonymous shape carries only the room id; the authenticated shape
/// adds the token, tracking id and platform discriminators.
#[derive(Debug, Clone, Serialize)]
pub struct JoinBody {
    pub roomid: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protover: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buvid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<u32>,
}

impl JoinBody {
    /// Join body for a room without credentials.
    pub fn anonymous(room_id: u64) -> Self {
        Self {
            roomid: room_id,
            uid: None,
            protover: None,
            key: None,
            buvid: None,
            platform: None,
            kind: None,
        }
    }

    /// Join body when a token was negotiated.
    pub fn authenticated(room_id: u64, uid: u64, token: &str, buvid: &str) -> Self {
        Self {
            roomid: room_id,
            uid: Some(uid),
            protover: Some(JOIN_PROTOVER),
            key: Some(token.to_string()),
            buvid: Some(buvid.to_string()),
            platform: Some("web".to_string()),
            kind: Some(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let frame = encode_frame(Opcode::Join, b"{}");
        let header = FrameHeader::parse(&frame).unwrap();
        assert_eq!(header.total_len, 18);
        assert_eq!(header.header_len, 16);
        assert_eq!(header.version, SEND_VERSION);
        assert_eq!(header.op, Opcode::Join.as_u32());
        assert_eq!(header.seq, SEQUENCE);
        assert_eq!(header.body_len(), 2);
        assert_eq!(&frame[HEADER_LEN..], b"{}");
    }

    #[test]
    fn header_fields_are_big_endian() {
        let frame = encode_frame(Opcode::Command, &[0u8; 0x0102 - 16]);
        assert_eq!(&frame[..4], &[0x00, 0x00, 0x01, 0x02]);
        assert_eq!(&frame[4..6], &[0x00, 0x10]);
        assert_eq!(&frame[8..12], &[0x00, 0x00, 0x00, 0x05]);
    }

    #[test]
    fn truncated_header_rejected() {
        let err = FrameHeader::parse(&[0u8; 15]).unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedHeader));
    }

    #[test]
    fn heartbeat_frame_is_header_only() {
        let frame = heartbeat_frame();
        assert_eq!(frame.len(), HEADER_LEN);
        let header = FrameHeader::parse(&frame).unwrap();
        assert_eq!(header.op, Opcode::Heartbeat.as_u32());
        assert_eq!(header.body_len(), 0);
    }

    #[test]
    fn anonymous_join_body_carries_only_room_id() {
        let body = JoinBody::anonymous(92613);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"roomid": 92613}));
    }

    #[test]
    fn authenticated_join_body_shape() {
        let body = JoinBody::authenticated(92613, 42, "tok", "XY123");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "roomid": 92613,
                "uid": 42,
                "protover": 3,
                "key": "tok",
                "buvid": "XY123",
                "platform": "web",
                "type": 2,
            })
        );
    }

    #[test]
    fn opcode_u32_roundtrip() {
        for op in [
            Opcode::Heartbeat,
            Opcode::HeartbeatAck,
            Opcode::Command,
            Opcode::Join,
        ] {
            assert_eq!(Opcode::from_u32(op.as_u32()), Some(op));
        }
        assert_eq!(Opcode::from_u32(99), None);
    }
}
