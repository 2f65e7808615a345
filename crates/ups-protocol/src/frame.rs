//! Frame encoding/decoding utilities.
//!
//! Commands travel host → UPS as a start byte, a length, the payload and a
//! checksum:
//!
//! ```text
//! +------+-----+-------------------+-----+
//! | 0xAB | len | payload[0..len]   | sum |
//! +------+-----+-------------------+-----+
//! ```
//!
//! Responses come back on the interrupt stream with the echoed opcode and a
//! sequence byte in the header:
//!
//! ```text
//! +------+--------+-----+-----+-------------------+-----+
//! | 0xAB | opcode | len | seq | payload[0..len]   | sum |
//! +------+--------+-----+-----+-------------------+-----+
//! ```
//!
//! In both directions the checksum makes the byte-wise sum of the whole frame
//! zero modulo 256. A response may be split over several frames; the high bit
//! of `seq` marks the last one.

use std::io::{self, Read};

use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, trace};

use crate::constants::*;
use crate::error::*;

/// Compute the checksum byte for `bytes`.
///
/// The result is the value that brings the byte-wise sum of `bytes` plus the
/// checksum itself to zero modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |c, &b| c.wrapping_sub(b))
}

/// Check that a complete frame, checksum included, sums to zero.
pub fn verify(frame: &[u8]) -> bool {
    frame.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)) == 0
}

/// Opcode the UPS echoes in responses to a request for `opcode`.
pub fn response_opcode(opcode: u8) -> u8 {
    opcode.wrapping_sub(RESPONSE_OPCODE_OFFSET)
}

// ============================================================================
// Command Frames
// ============================================================================

/// An encoded host → UPS command frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    bytes: Vec<u8>,
}

impl CommandFrame {
    /// Build the 4-byte frame that asks the UPS to report `opcode`.
    pub fn read_request(opcode: u8) -> Self {
        Self::build(&[opcode])
    }

    /// Build a frame carrying an arbitrary command payload.
    pub fn write_request(payload: &[u8]) -> ProtocolResult<Self> {
        if payload.len() > MAX_COMMAND_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge {
                max: MAX_COMMAND_PAYLOAD,
                actual: payload.len(),
            });
        }
        Ok(Self::build(payload))
    }

    fn build(payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(payload.len() + 3);
        bytes.put_u8(START_BYTE);
        bytes.put_u8(payload.len() as u8);
        bytes.put_slice(payload);
        let sum = checksum(&bytes);
        bytes.put_u8(sum);
        CommandFrame { bytes }
    }

    /// The full frame as transmitted.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the frame, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The command payload carried by the frame.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[2..self.bytes.len() - 1]
    }

    /// The trailing checksum byte.
    pub fn checksum(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    /// Total frame length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Frames always hold at least start, length and checksum.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

// ============================================================================
// Response Decoding
// ============================================================================

/// A blocking source of single bytes.
///
/// Implemented for every [`Read`]; end of stream is reported as
/// [`io::ErrorKind::UnexpectedEof`]. Wrap unbuffered readers in a
/// [`std::io::BufReader`].
pub trait ByteSource {
    /// Read the next byte, blocking until one is available.
    fn read_byte(&mut self) -> io::Result<u8>;
}

impl<R: Read + ?Sized> ByteSource for R {
    fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }
}

/// What happened to one physical frame read from the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Header opcode did not match; the frame was abandoned and scanning
    /// resumes at the next start byte.
    Resync,
    /// A valid non-final fragment was appended.
    Fragment,
    /// The final fragment was appended; the response is complete.
    Complete,
}

/// Reassembles one logical response from the interrupt byte stream.
///
/// Stray bytes before a start byte and frames with a foreign opcode are
/// skipped. A checksum failure aborts decoding, since the stream can no
/// longer be trusted to sit on a frame boundary.
#[derive(Debug)]
pub struct ResponseDecoder {
    opcode: u8,
    echo: u8,
    max_payload: usize,
    buffer: BytesMut,
    skipped_bytes: usize,
    resyncs: usize,
    fragments: usize,
}

impl ResponseDecoder {
    /// Create a decoder for the response to `opcode`, accepting at most
    /// `max_payload` reassembled bytes.
    pub fn new(opcode: u8, max_payload: usize) -> Self {
        ResponseDecoder {
            opcode,
            echo: response_opcode(opcode),
            max_payload,
            buffer: BytesMut::with_capacity(max_payload.min(MAX_RESPONSE_PAYLOAD)),
            skipped_bytes: 0,
            resyncs: 0,
            fragments: 0,
        }
    }

    /// Read one physical frame and fold it into the response.
    pub fn next_frame<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> ProtocolResult<FrameOutcome> {
        // Scan for the start byte, discarding any preceding garbage
        loop {
            let byte = next(source)?;
            if byte == START_BYTE {
                break;
            }
            self.skipped_bytes += 1;
            trace!("discarding stray byte 0x{:02X}", byte);
        }

        let opcode = next(source)?;
        if opcode != self.echo {
            self.resyncs += 1;
            debug!(
                "resync: opcode 0x{:02X} does not answer request 0x{:02X}",
                opcode, self.opcode
            );
            return Ok(FrameOutcome::Resync);
        }

        let len = next(source)?;
        let seq = next(source)?;
        let mut sum = START_BYTE
            .wrapping_add(opcode)
            .wrapping_add(len)
            .wrapping_add(seq);
        trace!("frame header: opcode=0x{:02X} len={} seq=0x{:02X}", opcode, len, seq);

        let needed = self.buffer.len() + len as usize;
        if needed > self.max_payload {
            return Err(ProtocolError::ResponseTooLarge {
                max: self.max_payload,
                needed,
            });
        }

        for _ in 0..len {
            let byte = next(source)?;
            self.buffer.put_u8(byte);
            sum = sum.wrapping_add(byte);
        }

        sum = sum.wrapping_add(next(source)?);
        if sum != 0 {
            return Err(ProtocolError::CorruptFrame {
                opcode: self.opcode,
                sum,
            });
        }

        self.fragments += 1;
        if seq & FINAL_FRAGMENT == 0 {
            debug!(
                "fragment {} for 0x{:02X}: {} bytes so far",
                self.fragments,
                self.opcode,
                self.buffer.len()
            );
            Ok(FrameOutcome::Fragment)
        } else {
            Ok(FrameOutcome::Complete)
        }
    }

    /// Read frames until the final fragment arrives and return the payload.
    pub fn decode<S: ByteSource + ?Sized>(mut self, source: &mut S) -> ProtocolResult<Bytes> {
        loop {
            if self.next_frame(source)? == FrameOutcome::Complete {
                debug!(
                    "response 0x{:02X}: {} bytes in {} fragment(s), {} stray byte(s), {} resync(s)",
                    self.opcode,
                    self.buffer.len(),
                    self.fragments,
                    self.skipped_bytes,
                    self.resyncs
                );
                return Ok(self.buffer.freeze());
            }
        }
    }

    /// Bytes accumulated so far.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes discarded while hunting for a start byte.
    pub fn skipped_bytes(&self) -> usize {
        self.skipped_bytes
    }

    /// Frames abandoned because of an opcode mismatch.
    pub fn resyncs(&self) -> usize {
        self.resyncs
    }

    /// Frames accepted into the response.
    pub fn fragments(&self) -> usize {
        self.fragments
    }
}

fn next<S: ByteSource + ?Sized>(source: &mut S) -> ProtocolResult<u8> {
    source.read_byte().map_err(ProtocolError::from_read)
}

/// Read the complete response to `opcode` from `source`.
pub fn decode_response<S: ByteSource + ?Sized>(
    source: &mut S,
    opcode: u8,
    max_payload: usize,
) -> ProtocolResult<Bytes> {
    ResponseDecoder::new(opcode, max_payload).decode(source)
}

/// Encode a response frame as the UPS would send it.
///
/// Used to build test streams and simulated devices.
pub fn encode_response(opcode: u8, payload: &[u8], final_fragment: bool) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + RESPONSE_HEADER_SIZE + 1);
    buf.put_u8(START_BYTE);
    buf.put_u8(response_opcode(opcode));
    buf.put_u8(payload.len() as u8);
    buf.put_u8(if final_fragment { FINAL_FRAGMENT } else { 0 });
    buf.put_slice(payload);
    let sum = checksum(&buf);
    buf.put_u8(sum);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const OP: u8 = OP_STATUS;

    #[test]
    fn test_read_request_layout() {
        let frame = CommandFrame::read_request(0x33);
        assert_eq!(frame.as_bytes(), &[0xAB, 0x01, 0x33, 0x21]);
        assert_eq!(frame.payload(), &[0x33]);
        assert!(verify(frame.as_bytes()));
    }

    #[test]
    fn test_write_request_checksum_any_length() {
        for len in [0usize, 1, 17, 64, MAX_COMMAND_PAYLOAD] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 37 + 5) as u8).collect();
            let frame = CommandFrame::write_request(&payload).expect("payload fits");
            assert_eq!(frame.len(), len + 3);
            assert_eq!(frame.as_bytes()[1] as usize, len);
            assert_eq!(frame.payload(), &payload[..]);
            assert!(verify(frame.as_bytes()));
        }
    }

    #[test]
    fn test_write_request_too_large() {
        let payload = [0u8; MAX_COMMAND_PAYLOAD + 1];
        match CommandFrame::write_request(&payload) {
            Err(ProtocolError::PayloadTooLarge { max, actual }) => {
                assert_eq!(max, 124);
                assert_eq!(actual, 125);
            }
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_checksum_zero_sum() {
        let bytes = [0xAB, 0x02, 0xFF, 0x10];
        let c = checksum(&bytes);
        let mut frame = bytes.to_vec();
        frame.push(c);
        assert!(verify(&frame));
        frame[2] ^= 0x01;
        assert!(!verify(&frame));
    }

    #[test]
    fn test_response_opcode_wraps() {
        assert_eq!(response_opcode(0x33), 0x03);
        assert_eq!(response_opcode(0x40), 0x10);
        assert_eq!(response_opcode(0x10), 0xE0);
    }

    #[test]
    fn test_decode_single_frame() {
        let stream = encode_response(OP, &[0x50, 0x81], true);
        let payload = decode_response(&mut Cursor::new(stream), OP, QUERY_MAX_PAYLOAD).unwrap();
        assert_eq!(&payload[..], &[0x50, 0x81]);
    }

    #[test]
    fn test_decode_skips_leading_noise() {
        let frame = encode_response(OP, b"hello", true);
        let mut noisy = vec![0x00, 0x13, 0xFF, 0x7E, 0x03];
        noisy.extend_from_slice(&frame);

        let clean = decode_response(&mut Cursor::new(frame), OP, 64).unwrap();

        let mut decoder = ResponseDecoder::new(OP, 64);
        let mut source = Cursor::new(noisy.clone());
        assert_eq!(decoder.next_frame(&mut source).unwrap(), FrameOutcome::Complete);
        assert_eq!(decoder.skipped_bytes(), 5);

        let resynced = decode_response(&mut Cursor::new(noisy), OP, 64).unwrap();
        assert_eq!(clean, resynced);
    }

    #[test]
    fn test_decode_absorbs_foreign_opcode() {
        let mut stream = encode_response(OP_METERS, &[1, 2, 3], true);
        stream.extend_from_slice(&encode_response(OP, &[0xF0, 0x08], true));

        let mut decoder = ResponseDecoder::new(OP, 64);
        let mut source = Cursor::new(stream.clone());
        assert_eq!(decoder.next_frame(&mut source).unwrap(), FrameOutcome::Resync);
        assert_eq!(decoder.resyncs(), 1);

        let payload = decode_response(&mut Cursor::new(stream), OP, 64).unwrap();
        assert_eq!(&payload[..], &[0xF0, 0x08]);
    }

    #[test]
    fn test_decode_reassembles_fragments() {
        let mut stream = encode_response(OP, b"AAAA", false);
        stream.push(0x55);
        stream.extend_from_slice(&encode_response(OP, b"BB", true));

        let payload = decode_response(&mut Cursor::new(stream), OP, 64).unwrap();
        assert_eq!(&payload[..], b"AAAABB");
    }

    #[test]
    fn test_decode_empty_final_fragment() {
        let mut stream = encode_response(OP, b"xyz", false);
        stream.extend_from_slice(&encode_response(OP, &[], true));
        let payload = decode_response(&mut Cursor::new(stream), OP, 64).unwrap();
        assert_eq!(&payload[..], b"xyz");
    }

    #[test]
    fn test_corrupt_checksum_is_fatal() {
        let mut stream = encode_response(OP, &[0x50, 0x01], true);
        let last = stream.len() - 1;
        stream[last] = stream[last].wrapping_add(1);
        // A good frame afterwards must not rescue the call.
        stream.extend_from_slice(&encode_response(OP, &[0x50, 0x01], true));

        match decode_response(&mut Cursor::new(stream), OP, 64) {
            Err(ProtocolError::CorruptFrame { opcode, sum }) => {
                assert_eq!(opcode, OP);
                assert_eq!(sum, 1);
            }
            other => panic!("expected CorruptFrame, got {:?}", other),
        }
    }

    #[test]
    fn test_response_too_large_across_fragments() {
        let mut stream = encode_response(OP, &[0u8; 6], false);
        stream.extend_from_slice(&encode_response(OP, &[0u8; 6], true));

        match decode_response(&mut Cursor::new(stream), OP, 10) {
            Err(ProtocolError::ResponseTooLarge { max, needed }) => {
                assert_eq!(max, 10);
                assert_eq!(needed, 12);
            }
            other => panic!("expected ResponseTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_closed_before_start() {
        let err = decode_response(&mut Cursor::new(vec![0x00, 0x01]), OP, 64).unwrap_err();
        assert!(matches!(err, ProtocolError::StreamClosed));
    }

    #[test]
    fn test_stream_closed_mid_frame() {
        let stream = encode_response(OP, b"truncated", true);
        let cut = &stream[..stream.len() - 3];
        let err = decode_response(&mut Cursor::new(cut.to_vec()), OP, 64).unwrap_err();
        assert!(matches!(err, ProtocolError::StreamClosed));
    }

    #[test]
    fn test_stream_closed_waiting_for_final_fragment() {
        let stream = encode_response(OP, b"part", false);
        let err = decode_response(&mut Cursor::new(stream), OP, 64).unwrap_err();
        assert!(matches!(err, ProtocolError::StreamClosed));
    }
}
