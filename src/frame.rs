// ABOUTME: Wire framing shared by the parent and both child engines
// ABOUTME: One frame shape for requests, responses and events: id | length | payload

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// Reserved id marking a frame as an event (child -> parent, uncorrelated).
pub const EVENT_ID: u32 = 0;

/// Size in bytes of the fixed frame header (`id` + `length`, both `u32`).
pub const HEADER_LEN: usize = 8;

/// Upper bound on a single frame's payload length, guarding against unbounded
/// allocation driven by a corrupt or hostile peer. Matches the role played by
/// `MAX_PDU_SIZE` in this crate's lineage.
pub const DEFAULT_MAX_PAYLOAD_LEN: u32 = 64 * 1024 * 1024;

/// The header portion of a frame, decoded independently of its payload so the
/// caller can decide whether enough bytes are buffered before slicing out the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub id: u32,
    pub length: u32,
}

impl FrameHeader {
    pub const SIZE: usize = HEADER_LEN;

    /// Attempt to decode a header from the front of `buf` without consuming it.
    pub fn peek(buf: &[u8]) -> Result<Option<Self>, FrameError> {
        if buf.len() < Self::SIZE {
            return Ok(None);
        }
        let mut cursor = buf;
        let id = cursor.get_u32();
        let length = cursor.get_u32();
        Ok(Some(FrameHeader { id, length }))
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32(self.id);
        dst.put_u32(self.length);
    }
}

/// A single decoded frame: either an event (`id == `[`EVENT_ID`]) or a
/// request/response correlated by `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: u32,
    pub payload: Bytes,
}

impl Frame {
    pub fn is_event(&self) -> bool {
        self.id == EVENT_ID
    }

    /// Encode a non-event frame (request or response) carrying `id`.
    ///
    /// `id` must be non-zero; this is an invariant enforced by callers (the
    /// request id allocator in the parent never hands out zero).
    pub fn encode(id: u32, payload: &[u8], max_payload_len: u32) -> Result<Bytes, FrameError> {
        Self::encode_raw(id, payload, max_payload_len)
    }

    /// Encode an event frame (`id` forced to [`EVENT_ID`]).
    pub fn encode_event(payload: &[u8], max_payload_len: u32) -> Result<Bytes, FrameError> {
        Self::encode_raw(EVENT_ID, payload, max_payload_len)
    }

    fn encode_raw(id: u32, payload: &[u8], max_payload_len: u32) -> Result<Bytes, FrameError> {
        let length = payload.len() as u32;
        if length > max_payload_len {
            return Err(FrameError::PayloadTooLarge {
                length,
                max: max_payload_len,
            });
        }
        let mut dst = BytesMut::with_capacity(HEADER_LEN + payload.len());
        FrameHeader { id, length }.encode(&mut dst);
        dst.put_slice(payload);
        Ok(dst.freeze())
    }

    /// Try to decode one complete frame from the front of `buf`, returning
    /// `None` when fewer than a full frame's worth of bytes is buffered.
    ///
    /// On success, the consumed bytes (header + payload) are split off the
    /// front of `buf` in place; the caller never re-scans from the start.
    pub fn decode(
        buf: &mut BytesMut,
        max_payload_len: u32,
    ) -> Result<Option<Frame>, FrameError> {
        let header = match FrameHeader::peek(buf)? {
            Some(h) => h,
            None => return Ok(None),
        };
        if header.length > max_payload_len {
            return Err(FrameError::PayloadTooLarge {
                length: header.length,
                max: max_payload_len,
            });
        }
        let total = HEADER_LEN + header.length as usize;
        if buf.len() < total {
            return Ok(None);
        }
        let mut frame_bytes = buf.split_to(total);
        frame_bytes.advance(HEADER_LEN);
        Ok(Some(Frame {
            id: header.id,
            payload: frame_bytes.freeze(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_frame() {
        let encoded = Frame::encode(7, b"hello", DEFAULT_MAX_PAYLOAD_LEN).unwrap();
        let mut buf = BytesMut::from(&encoded[..]);
        let decoded = Frame::decode(&mut buf, DEFAULT_MAX_PAYLOAD_LEN)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.id, 7);
        assert_eq!(&decoded.payload[..], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn reports_incomplete_until_the_full_frame_arrives() {
        let encoded = Frame::encode(1, b"0123456789", DEFAULT_MAX_PAYLOAD_LEN).unwrap();
        let mut buf = BytesMut::from(&encoded[..encoded.len() - 1]);
        assert!(Frame::decode(&mut buf, DEFAULT_MAX_PAYLOAD_LEN)
            .unwrap()
            .is_none());
        buf.extend_from_slice(&encoded[encoded.len() - 1..]);
        let decoded = Frame::decode(&mut buf, DEFAULT_MAX_PAYLOAD_LEN)
            .unwrap()
            .unwrap();
        assert_eq!(&decoded.payload[..], b"0123456789");
    }

    #[test]
    fn decodes_every_frame_in_a_concatenated_stream() {
        let mut wire = BytesMut::new();
        for i in 0..5u32 {
            wire.extend_from_slice(&Frame::encode(i + 1, b"x", DEFAULT_MAX_PAYLOAD_LEN).unwrap());
        }
        let mut count = 0;
        while let Some(frame) = Frame::decode(&mut wire, DEFAULT_MAX_PAYLOAD_LEN).unwrap() {
            assert_eq!(frame.id, count as u32 + 1);
            count += 1;
        }
        assert_eq!(count, 5);
        assert!(wire.is_empty());
    }

    #[test]
    fn event_frames_use_id_zero() {
        let encoded = Frame::encode_event(b"tick", DEFAULT_MAX_PAYLOAD_LEN).unwrap();
        let mut buf = BytesMut::from(&encoded[..]);
        let decoded = Frame::decode(&mut buf, DEFAULT_MAX_PAYLOAD_LEN)
            .unwrap()
            .unwrap();
        assert!(decoded.is_event());
    }

    #[test]
    fn rejects_a_payload_over_the_configured_cap() {
        let err = Frame::encode(1, &vec![0u8; 16], 8).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { length: 16, max: 8 }));
    }

    #[test]
    fn empty_payload_is_legal() {
        let encoded = Frame::encode(1, b"", DEFAULT_MAX_PAYLOAD_LEN).unwrap();
        let mut buf = BytesMut::from(&encoded[..]);
        let decoded = Frame::decode(&mut buf, DEFAULT_MAX_PAYLOAD_LEN)
            .unwrap()
            .unwrap();
        assert!(decoded.payload.is_empty());
    }
}
