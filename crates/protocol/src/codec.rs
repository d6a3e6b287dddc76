//! Incremental frame decoder.
//!
//! Consumes bytes from the transport in whatever chunk sizes they arrive,
//! yields complete decoded payloads, and recursively re-parses compressed
//! bodies (one outer frame may bundle many inner frames).

use std::collections::VecDeque;
use std::io::Read;

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, HEADER_LEN, Opcode, body_format};

/// Largest frame the decoder accepts. A declared length beyond this cannot
/// be addressed without signed overflow on the wire and fails closed.
pub const MAX_FRAME_LEN: u32 = i32::MAX as u32;

/// The first two bytes of a version-2 body precede the actual deflate
/// stream. Platform quirk, undocumented; preserved as observed.
const DEFLATE_BODY_SKIP: usize = 2;

/// One decoded unit from the frame stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A JSON command envelope, to be classified downstream.
    Command(String),
    /// Room popularity carried by a heartbeat ack.
    Popularity(u32),
}

/// Streaming decoder over an append-only byte buffer.
///
/// Feed chunks with [`push`](Self::push), then drain decoded payloads with
/// [`next`](Self::next). Payloads come out strictly in arrival order,
/// including the inner frames of compressed bodies.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    ready: VecDeque<Payload>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk from the transport and decodes every frame that is
    /// now complete. Partial frames stay buffered for the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), ProtocolError> {
        self.buf.extend_from_slice(chunk);
        while let Some((header, body)) = split_frame(&mut self.buf)? {
            decode_body(&header, &body, &mut self.ready)?;
        }
        Ok(())
    }

    /// Next decoded payload, if any.
    pub fn next(&mut self) -> Option<Payload> {
        self.ready.pop_front()
    }

    /// Drops buffered bytes and queued payloads.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.ready.clear();
    }
}

/// Splits one complete frame off the front of `buf`, or returns `None` when
/// more bytes are needed.
fn split_frame(buf: &mut BytesMut) -> Result<Option<(FrameHeader, BytesMut)>, ProtocolError> {
    if buf.len() < 4 {
        return Ok(None);
    }
    let total = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if total > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(total));
    }
    if (total as usize) < HEADER_LEN {
        return Err(ProtocolError::InvalidLength(total));
    }
    if buf.len() < total as usize {
        return Ok(None);
    }
    let header = FrameHeader::parse(&buf[..HEADER_LEN])?;
    buf.advance(HEADER_LEN);
    let body = buf.split_to(total as usize - HEADER_LEN);
    Ok(Some((header, body)))
}

fn decode_body(
    header: &FrameHeader,
    body: &[u8],
    ready: &mut VecDeque<Payload>,
) -> Result<(), ProtocolError> {
    match (header.version, Opcode::from_u32(header.op)) {
        (body_format::DEFLATE, Some(Opcode::Command)) => {
            if body.len() < DEFLATE_BODY_SKIP {
                return Err(ProtocolError::InvalidLength(header.total_len));
            }
            let mut inflated = Vec::new();
            flate2::read::DeflateDecoder::new(&body[DEFLATE_BODY_SKIP..])
                .read_to_end(&mut inflated)
                .map_err(ProtocolError::Decompress)?;
            decode_nested(&inflated, ready)
        }
        (body_format::BROTLI, Some(Opcode::Command)) => {
            let mut decompressed = Vec::new();
            brotli::Decompressor::new(body, 4096)
                .read_to_end(&mut decompressed)
                .map_err(ProtocolError::Decompress)?;
            decode_nested(&decompressed, ready)
        }
        (_, Some(Opcode::Command)) => {
            let json = String::from_utf8(body.to_vec())?;
            ready.push_back(Payload::Command(json));
            Ok(())
        }
        (_, Some(Opcode::HeartbeatAck)) => {
            if body.len() < 4 {
                return Err(ProtocolError::InvalidLength(header.total_len));
            }
            let count = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
            ready.push_back(Payload::Popularity(count));
            Ok(())
        }
        _ => {
            trace!(op = header.op, version = header.version, "ignoring frame");
            Ok(())
        }
    }
}

/// Re-runs frame parsing over a decompressed body. Inner frame lengths are
/// strictly bounded by the enclosing buffer, so the recursion terminates.
fn decode_nested(data: &[u8], ready: &mut VecDeque<Payload>) -> Result<(), ProtocolError> {
    let mut inner = BytesMut::from(data);
    while let Some((header, body)) = split_frame(&mut inner)? {
        decode_body(&header, &body, ready)?;
    }
    if !inner.is_empty() {
        debug!(
            remaining = inner.len(),
            "dropping trailing bytes after nested frames"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::frame::{SEND_VERSION, encode_frame};

    fn command_frame(json: &str) -> Vec<u8> {
        encode_frame(Opcode::Command, json.as_bytes())
    }

    /// Builds a version-2 frame whose body is `[2 skip bytes][deflate(inner)]`.
    fn deflated_frame(inner: &[u8]) -> Vec<u8> {
        let mut compressed = vec![0x78, 0x01];
        let mut encoder =
            flate2::write::DeflateEncoder::new(&mut compressed, flate2::Compression::default());
        encoder.write_all(inner).unwrap();
        encoder.finish().unwrap();
        // encode_frame stamps version 2 already.
        encode_frame(Opcode::Command, &compressed)
    }

    /// Builds a version-3 frame whose body is brotli-compressed `inner`.
    fn brotli_frame(inner: &[u8]) -> Vec<u8> {
        let mut compressed = Vec::new();
        {
            let mut writer = brotli::CompressorWriter::new(&mut compressed, 4096, 5, 22);
            writer.write_all(inner).unwrap();
        }
        let mut frame = encode_frame(Opcode::Command, &compressed);
        frame[6..8].copy_from_slice(&body_format::BROTLI.to_be_bytes());
        frame
    }

    /// Rewrites the version field so the body is treated as plain.
    fn as_plain(mut frame: Vec<u8>) -> Vec<u8> {
        frame[6..8].copy_from_slice(&body_format::PLAIN_0.to_be_bytes());
        frame
    }

    #[test]
    fn command_roundtrip() {
        let mut decoder = FrameDecoder::new();
        decoder
            .push(&as_plain(command_frame(r#"{"cmd":"LIVE"}"#)))
            .unwrap();
        assert_eq!(
            decoder.next(),
            Some(Payload::Command(r#"{"cmd":"LIVE"}"#.into()))
        );
        assert_eq!(decoder.next(), None);
    }

    #[test]
    fn popularity_ack_decodes_big_endian() {
        let mut decoder = FrameDecoder::new();
        let mut frame = encode_frame(Opcode::HeartbeatAck, &[0x00, 0x01, 0x00, 0x02]);
        frame[6..8].copy_from_slice(&body_format::PLAIN_1.to_be_bytes());
        decoder.push(&frame).unwrap();
        assert_eq!(decoder.next(), Some(Payload::Popularity(0x0001_0002)));
    }

    #[test]
    fn one_byte_at_a_time_yields_one_command() {
        let frame = as_plain(command_frame(r#"{"cmd":"WATCHED_CHANGE"}"#));
        let mut decoder = FrameDecoder::new();
        for b in &frame {
            decoder.push(std::slice::from_ref(b)).unwrap();
        }
        assert_eq!(
            decoder.next(),
            Some(Payload::Command(r#"{"cmd":"WATCHED_CHANGE"}"#.into()))
        );
        assert_eq!(decoder.next(), None);
    }

    #[test]
    fn split_header_and_body_across_pushes() {
        let frame = as_plain(command_frame(r#"{"cmd":"PREPARING"}"#));
        let mut decoder = FrameDecoder::new();
        decoder.push(&frame[..10]).unwrap();
        assert_eq!(decoder.next(), None);
        decoder.push(&frame[10..20]).unwrap();
        assert_eq!(decoder.next(), None);
        decoder.push(&frame[20..]).unwrap();
        assert!(matches!(decoder.next(), Some(Payload::Command(_))));
    }

    #[test]
    fn two_frames_in_one_chunk() {
        let mut bytes = as_plain(command_frame(r#"{"cmd":"A"}"#));
        bytes.extend_from_slice(&as_plain(command_frame(r#"{"cmd":"B"}"#)));
        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes).unwrap();
        assert_eq!(decoder.next(), Some(Payload::Command(r#"{"cmd":"A"}"#.into())));
        assert_eq!(decoder.next(), Some(Payload::Command(r#"{"cmd":"B"}"#.into())));
        assert_eq!(decoder.next(), None);
    }

    #[test]
    fn deflated_body_yields_inner_frames_in_order() {
        let mut inner = as_plain(command_frame(r#"{"cmd":"DANMU_MSG"}"#));
        inner.extend_from_slice(&as_plain(command_frame(r#"{"cmd":"SEND_GIFT"}"#)));

        let mut decoder = FrameDecoder::new();
        decoder.push(&deflated_frame(&inner)).unwrap();

        assert_eq!(
            decoder.next(),
            Some(Payload::Command(r#"{"cmd":"DANMU_MSG"}"#.into()))
        );
        assert_eq!(
            decoder.next(),
            Some(Payload::Command(r#"{"cmd":"SEND_GIFT"}"#.into()))
        );
        assert_eq!(decoder.next(), None);
    }

    #[test]
    fn brotli_body_yields_inner_frames() {
        let mut inner = as_plain(command_frame(r#"{"cmd":"INTERACT_WORD"}"#));
        inner.extend_from_slice(&as_plain(command_frame(r#"{"cmd":"LIKE_INFO_V3_UPDATE"}"#)));

        let mut decoder = FrameDecoder::new();
        decoder.push(&brotli_frame(&inner)).unwrap();

        assert_eq!(
            decoder.next(),
            Some(Payload::Command(r#"{"cmd":"INTERACT_WORD"}"#.into()))
        );
        assert_eq!(
            decoder.next(),
            Some(Payload::Command(r#"{"cmd":"LIKE_INFO_V3_UPDATE"}"#.into()))
        );
    }

    #[test]
    fn deflated_frame_split_byte_by_byte() {
        let inner = as_plain(command_frame(r#"{"cmd":"NOTICE_MSG"}"#));
        let frame = deflated_frame(&inner);
        let mut decoder = FrameDecoder::new();
        for b in &frame {
            decoder.push(std::slice::from_ref(b)).unwrap();
        }
        assert_eq!(
            decoder.next(),
            Some(Payload::Command(r#"{"cmd":"NOTICE_MSG"}"#.into()))
        );
    }

    #[test]
    fn oversized_length_fails_closed() {
        let mut decoder = FrameDecoder::new();
        let err = decoder.push(&0x8000_0000u32.to_be_bytes()).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge(0x8000_0000)));
    }

    #[test]
    fn undersized_length_rejected() {
        let mut decoder = FrameDecoder::new();
        let err = decoder.push(&8u32.to_be_bytes()).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidLength(8)));
    }

    #[test]
    fn corrupt_deflate_body_errors() {
        let mut frame = encode_frame(Opcode::Command, &[0x78, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]);
        frame[6..8].copy_from_slice(&body_format::DEFLATE.to_be_bytes());
        let mut decoder = FrameDecoder::new();
        assert!(matches!(
            decoder.push(&frame),
            Err(ProtocolError::Decompress(_))
        ));
    }

    #[test]
    fn unknown_op_is_ignored() {
        let total = (HEADER_LEN + 3) as u32;
        let mut frame = Vec::new();
        frame.extend_from_slice(&total.to_be_bytes());
        frame.extend_from_slice(&(HEADER_LEN as u16).to_be_bytes());
        frame.extend_from_slice(&body_format::PLAIN_1.to_be_bytes());
        frame.extend_from_slice(&8u32.to_be_bytes());
        frame.extend_from_slice(&1u32.to_be_bytes());
        frame.extend_from_slice(&[1, 2, 3]);

        let mut decoder = FrameDecoder::new();
        decoder.push(&frame).unwrap();
        assert_eq!(decoder.next(), None);

        // The buffer advanced past the ignored frame.
        decoder
            .push(&as_plain(command_frame(r#"{"cmd":"LIVE"}"#)))
            .unwrap();
        assert!(matches!(decoder.next(), Some(Payload::Command(_))));
    }

    #[test]
    fn send_version_matches_deflate_discriminator() {
        // Outbound frames are stamped with the deflate discriminator even
        // for plain bodies, matching the web client.
        assert_eq!(SEND_VERSION, body_format::DEFLATE);
    }
}
