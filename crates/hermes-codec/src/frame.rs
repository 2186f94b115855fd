//! RFC 6455 §5.2 base framing.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```
//!
//! Inbound frames are decoded from whatever bytes one transport read
//! produced, so a [`Frame`] may hold only a prefix of its declared payload.
//! The remainder is read afterwards and unmasked with [`Frame::unmask`],
//! passing the number of payload bytes already consumed as the offset.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::bits;
use crate::error::{CodecError, CodecResult};
use crate::opcode::OpCode;

/// Largest possible header: 2 fixed bytes, 8 length bytes, 4 mask bytes.
pub const MAX_HEADER_LEN: usize = 14;

/// Largest payload length expressible in the 7-bit length field.
const MAX_INLINE_LEN: usize = 125;

const LEN_16_MARKER: u8 = 126;
const LEN_64_MARKER: u8 = 127;

/// A decoded WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    first: u8,
    second: u8,
    opcode: OpCode,
    payload_length: u64,
    mask_key: Option<[u8; 4]>,
    header_len: usize,
    payload: Bytes,
}

impl Frame {
    /// Decodes a frame from raw bytes.
    ///
    /// The payload is unmasked with offset 0 and bounded by the declared
    /// payload length; any bytes past it belong to the next frame and are
    /// left untouched (see [`Frame::consumed`]).
    pub fn decode(raw: &[u8]) -> CodecResult<Self> {
        if raw.len() < 2 {
            return Err(CodecError::too_short(raw.len()));
        }
        let (first, second) = (raw[0], raw[1]);

        let opcode = OpCode::from(bits::extract(first, 4, 4));
        if !opcode.is_known() {
            return Err(CodecError::unknown_opcode(opcode.value()));
        }

        let header_len = required_header_len(second);
        if raw.len() < header_len {
            return Err(CodecError::truncated(header_len, raw.len()));
        }

        let base_len = bits::extract(second, 1, 7);
        let mut cursor = 2;
        let payload_length = match base_len {
            LEN_16_MARKER => {
                let value = u16::from_be_bytes([raw[2], raw[3]]);
                cursor += 2;
                u64::from(value)
            }
            LEN_64_MARKER => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&raw[2..10]);
                cursor += 8;
                u64::from_be_bytes(buf)
            }
            literal => u64::from(literal),
        };

        let mask_key = if bits::get_bit(second, 7) {
            let key = [raw[cursor], raw[cursor + 1], raw[cursor + 2], raw[cursor + 3]];
            cursor += 4;
            Some(key)
        } else {
            None
        };
        debug_assert_eq!(cursor, header_len);

        let available = &raw[header_len..];
        let take = usize::try_from(payload_length).map_or(available.len(), |declared| {
            declared.min(available.len())
        });

        let mut payload = BytesMut::from(&available[..take]);
        if let Some(key) = mask_key {
            apply_mask(&mut payload, key, 0);
        }

        Ok(Self {
            first,
            second,
            opcode,
            payload_length,
            mask_key,
            header_len,
            payload: payload.freeze(),
        })
    }

    /// Whether the FIN bit is set.
    pub fn is_final(&self) -> bool {
        bits::get_bit(self.first, 7)
    }

    /// The frame opcode.
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Whether the MASK bit is set.
    pub fn is_masked(&self) -> bool {
        self.mask_key.is_some()
    }

    /// The masking key, if the frame is masked.
    pub fn mask_key(&self) -> Option<[u8; 4]> {
        self.mask_key
    }

    /// The payload length declared in the header.
    pub fn payload_length(&self) -> u64 {
        self.payload_length
    }

    /// The unmasked payload bytes held by this frame.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consumes the frame, returning its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Size of the header (fixed bytes, extended length and mask key).
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Number of input bytes this frame was decoded from.
    pub fn consumed(&self) -> usize {
        self.header_len + self.payload.len()
    }

    /// Payload bytes declared but not yet held by this frame.
    pub fn remaining(&self) -> u64 {
        self.payload_length - self.payload.len() as u64
    }

    /// Whether this is a close frame.
    pub fn is_close(&self) -> bool {
        self.opcode == OpCode::Close
    }

    /// Whether this is a ping frame.
    pub fn is_ping(&self) -> bool {
        self.opcode == OpCode::Ping
    }

    /// Whether this is a pong frame.
    pub fn is_pong(&self) -> bool {
        self.opcode == OpCode::Pong
    }

    /// Unmasks a later chunk of this frame's payload.
    ///
    /// `offset` is the number of payload bytes of this frame that preceded
    /// `data`. Unmasked frames return the bytes unchanged.
    pub fn unmask(&self, data: Bytes, offset: u64) -> Bytes {
        match self.mask_key {
            Some(key) => {
                let mut buf = BytesMut::from(&data[..]);
                apply_mask(&mut buf, key, offset);
                buf.freeze()
            }
            None => data,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame {{ opcode: {}, final: {}, masked: {}, length: {}, held: {}, header: [{} | {}] }}",
            self.opcode,
            self.is_final(),
            self.is_masked(),
            self.payload_length,
            self.payload.len(),
            bits::bits_string(self.first),
            bits::bits_string(self.second),
        )
    }
}

/// Header size required by the second header byte (extended length + mask).
fn required_header_len(second: u8) -> usize {
    let extended = match bits::extract(second, 1, 7) {
        LEN_16_MARKER => 2,
        LEN_64_MARKER => 8,
        _ => 0,
    };
    let mask = if bits::get_bit(second, 7) { 4 } else { 0 };
    2 + extended + mask
}

/// Returns the full header length announced by `raw`, or `None` when fewer
/// than the two fixed header bytes are available.
pub fn header_len(raw: &[u8]) -> Option<usize> {
    raw.get(1).map(|second| required_header_len(*second))
}

/// XORs `data` with `key`, starting at key position `offset mod 4`.
///
/// Applying the same key and offset twice restores the input.
pub fn apply_mask(data: &mut [u8], key: [u8; 4], offset: u64) {
    let start = (offset % 4) as usize;
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[(start + i) % 4];
    }
}

/// Generates a random masking key.
pub fn generate_mask() -> [u8; 4] {
    rand::random()
}

/// Encodes a single masked client frame.
pub fn encode(opcode: OpCode, fin: bool, mask_key: [u8; 4], payload: &[u8]) -> Bytes {
    let len = payload.len();
    let mut out = BytesMut::with_capacity(MAX_HEADER_LEN + len);

    out.put_u8(bits::set_bit(opcode.value() & 0x0F, 7, fin));

    if len <= MAX_INLINE_LEN {
        out.put_u8(bits::enable_bit(len as u8, 7));
    } else if let Ok(short) = u16::try_from(len) {
        out.put_u8(bits::enable_bit(LEN_16_MARKER, 7));
        out.put_u16(short);
    } else {
        out.put_u8(bits::enable_bit(LEN_64_MARKER, 7));
        out.put_u64(len as u64);
    }

    out.put_slice(&mask_key);
    let start = out.len();
    out.put_slice(payload);
    apply_mask(&mut out[start..], mask_key, 0);
    out.freeze()
}

/// Encodes the frames of one outgoing message.
///
/// The masking key is chosen once per message and reused for every chunk.
/// The first chunk carries the message opcode, later chunks carry
/// [`OpCode::Continuation`].
#[derive(Debug, Clone)]
pub struct MessageEncoder {
    opcode: OpCode,
    mask_key: [u8; 4],
    frames: usize,
}

impl MessageEncoder {
    /// Starts a message with a fresh random masking key.
    pub fn new(opcode: OpCode) -> Self {
        Self::with_mask(opcode, generate_mask())
    }

    /// Starts a message with a given masking key.
    pub fn with_mask(opcode: OpCode, mask_key: [u8; 4]) -> Self {
        Self {
            opcode,
            mask_key,
            frames: 0,
        }
    }

    /// The masking key used for this message.
    pub fn mask_key(&self) -> [u8; 4] {
        self.mask_key
    }

    /// Number of frames encoded so far.
    pub fn frames_encoded(&self) -> usize {
        self.frames
    }

    /// Encodes the next chunk of the message.
    pub fn encode(&mut self, fin: bool, payload: &[u8]) -> Bytes {
        let opcode = if self.frames == 0 {
            self.opcode
        } else {
            OpCode::Continuation
        };
        self.frames += 1;
        encode(opcode, fin, self.mask_key, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASK: [u8; 4] = [0x37, 0xFA, 0x21, 0x3D];

    #[test]
    fn test_rfc_single_frame_unmasked_text() {
        // RFC 6455 §5.7: unmasked "Hello"
        let raw = [0x81, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F];
        let frame = Frame::decode(&raw).unwrap();
        assert!(frame.is_final());
        assert_eq!(frame.opcode(), OpCode::Text);
        assert!(!frame.is_masked());
        assert_eq!(frame.payload().as_ref(), b"Hello");
        assert_eq!(frame.remaining(), 0);
    }

    #[test]
    fn test_rfc_single_frame_masked_text() {
        // RFC 6455 §5.7: masked "Hello"
        let raw = [
            0x81, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58,
        ];
        let frame = Frame::decode(&raw).unwrap();
        assert_eq!(frame.mask_key(), Some(MASK));
        assert_eq!(frame.payload().as_ref(), b"Hello");
    }

    #[test]
    fn test_encode_matches_rfc_example() {
        let encoded = encode(OpCode::Text, true, MASK, b"Hello");
        assert_eq!(
            encoded.as_ref(),
            &[0x81, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58]
        );
    }

    #[test]
    fn test_rfc_fragmented_unmasked_text() {
        let first = Frame::decode(&[0x01, 0x03, 0x48, 0x65, 0x6C]).unwrap();
        assert!(!first.is_final());
        assert_eq!(first.opcode(), OpCode::Text);

        let last = Frame::decode(&[0x80, 0x02, 0x6C, 0x6F]).unwrap();
        assert!(last.is_final());
        assert_eq!(last.opcode(), OpCode::Continuation);
        assert_eq!(last.payload().as_ref(), b"lo");
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            Frame::decode(&[0x81]),
            Err(CodecError::MalformedFrame(_))
        ));
        assert!(Frame::decode(&[]).is_err());
    }

    #[test]
    fn test_decode_reserved_opcode() {
        let err = Frame::decode(&[0x04, 0x00, 0x20, 0x20, 0x20, 0x20]).unwrap_err();
        assert_eq!(err, CodecError::unknown_opcode(0x4));
    }

    #[test]
    fn test_decode_truncated_extended_length() {
        // Declares a 16-bit length but supplies only one length byte.
        let err = Frame::decode(&[0x82, 0x7E, 0x01]).unwrap_err();
        assert_eq!(err, CodecError::truncated(4, 3));

        // Declares a 64-bit length but supplies four length bytes.
        assert!(Frame::decode(&[0x82, 0x7F, 0, 0, 0, 1]).is_err());
    }

    #[test]
    fn test_decode_truncated_mask() {
        let err = Frame::decode(&[0x81, 0x85, 0x37, 0xFA]).unwrap_err();
        assert_eq!(err, CodecError::truncated(6, 4));
    }

    #[test]
    fn test_decode_partial_payload() {
        let encoded = encode(OpCode::Binary, true, MASK, &[7u8; 300]);
        let frame = Frame::decode(&encoded[..100]).unwrap();
        assert_eq!(frame.payload_length(), 300);
        assert_eq!(frame.header_len(), 8);
        assert_eq!(frame.payload().len(), 92);
        assert_eq!(frame.remaining(), 208);
        assert!(frame.payload().iter().all(|b| *b == 7));
    }

    #[test]
    fn test_unmask_continues_at_offset() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let encoded = encode(OpCode::Binary, true, MASK, &payload);

        let split = 8 + 123;
        let frame = Frame::decode(&encoded[..split]).unwrap();
        let mut received = frame.payload().to_vec();
        let mut offset = received.len() as u64;

        for chunk in encoded[split..].chunks(77) {
            let plain = frame.unmask(Bytes::copy_from_slice(chunk), offset);
            offset += plain.len() as u64;
            received.extend_from_slice(&plain);
        }
        assert_eq!(received, payload);
    }

    #[test]
    fn test_decode_ignores_trailing_frame() {
        let mut raw = encode(OpCode::Text, true, MASK, b"one").to_vec();
        raw.extend_from_slice(&encode(OpCode::Text, true, MASK, b"two"));

        let first = Frame::decode(&raw).unwrap();
        assert_eq!(first.payload().as_ref(), b"one");
        assert_eq!(first.consumed(), 9);

        let second = Frame::decode(&raw[first.consumed()..]).unwrap();
        assert_eq!(second.payload().as_ref(), b"two");
    }

    #[test]
    fn test_header_len() {
        assert_eq!(header_len(&[0x81]), None);
        assert_eq!(header_len(&[0x81, 0x05]), Some(2));
        assert_eq!(header_len(&[0x81, 0x85]), Some(6));
        assert_eq!(header_len(&[0x81, 0x7E]), Some(4));
        assert_eq!(header_len(&[0x81, 0xFF]), Some(14));
    }

    #[test]
    fn test_length_field_boundaries() {
        let frame = encode(OpCode::Binary, true, MASK, &[0u8; 125]);
        assert_eq!(frame[1] & 0x7F, 125);
        assert_eq!(frame.len(), 2 + 4 + 125);

        let frame = encode(OpCode::Binary, true, MASK, &[0u8; 126]);
        assert_eq!(frame[1] & 0x7F, 126);
        assert_eq!(&frame[2..4], &[0x00, 0x7E]);
        assert_eq!(frame.len(), 2 + 2 + 4 + 126);

        let frame = encode(OpCode::Binary, true, MASK, &[0u8; 65535]);
        assert_eq!(frame[1] & 0x7F, 126);
        assert_eq!(&frame[2..4], &[0xFF, 0xFF]);

        let frame = encode(OpCode::Binary, true, MASK, &[0u8; 65536]);
        assert_eq!(frame[1] & 0x7F, 127);
        assert_eq!(&frame[2..10], &[0, 0, 0, 0, 0, 1, 0, 0]);
        assert_eq!(frame.len(), 2 + 8 + 4 + 65536);
    }

    #[test]
    fn test_encode_always_masks_and_clears_reserved_bits() {
        let frame = encode(OpCode::Ping, false, MASK, b"");
        assert_eq!(frame[0], 0x09);
        assert_eq!(frame[1], 0x80);
        assert_eq!(&frame[2..6], &MASK);
    }

    #[test]
    fn test_message_encoder_reuses_mask() {
        let mut encoder = MessageEncoder::new(OpCode::Text);
        let mask = encoder.mask_key();

        let first = Frame::decode(&encoder.encode(false, b"Hel")).unwrap();
        let second = Frame::decode(&encoder.encode(false, b"l")).unwrap();
        let last = Frame::decode(&encoder.encode(true, b"o")).unwrap();

        assert_eq!(first.opcode(), OpCode::Text);
        assert_eq!(second.opcode(), OpCode::Continuation);
        assert_eq!(last.opcode(), OpCode::Continuation);
        assert!(!first.is_final() && !second.is_final() && last.is_final());
        for frame in [&first, &second, &last] {
            assert_eq!(frame.mask_key(), Some(mask));
        }
        assert_eq!(encoder.frames_encoded(), 3);
    }

    #[test]
    fn test_display_includes_header_bits() {
        let frame = Frame::decode(&[0x89, 0x00]).unwrap();
        let text = frame.to_string();
        assert!(text.contains("ping"));
        assert!(text.contains("1 0 0 0 1 0 0 1"));
    }
}
