//! Protocol error types.

use std::io;

use thiserror::Error;

/// Errors that can occur when working with the UPS protocol.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Command payload does not fit in a single command frame.
    #[error("command payload too large: maximum {max} bytes, got {actual}")]
    PayloadTooLarge {
        /// Maximum allowed payload length.
        max: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// The byte stream ended or timed out before a response was complete.
    #[error("stream closed before response was complete")]
    StreamClosed,

    /// Reassembled response would not fit the caller's buffer.
    #[error("response too large: maximum {max} bytes, needed {needed}")]
    ResponseTooLarge {
        /// Capacity supplied by the caller.
        max: usize,
        /// Bytes the response would have needed.
        needed: usize,
    },

    /// A frame failed checksum verification.
    #[error("corrupt frame for opcode 0x{opcode:02X}: checksum sum 0x{sum:02X}")]
    CorruptFrame {
        /// Opcode the response was requested with.
        opcode: u8,
        /// Byte-wise sum over the frame, which should have been zero.
        sum: u8,
    },

    /// Capability descriptor did not decode to exactly its payload length.
    #[error("malformed descriptor at offset {offset} of {len}: {reason}")]
    MalformedDescriptor {
        /// Cursor position when decoding stopped.
        offset: usize,
        /// Total payload length.
        len: usize,
        /// What went wrong.
        reason: &'static str,
    },

    /// Payload is too short to hold the fields of its response type.
    #[error("payload too short: expected at least {expected} bytes, got {actual}")]
    ShortPayload {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Transport failure other than stream closure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Classify an I/O error from a read on the response stream.
    ///
    /// End of stream and timeouts surface as [`ProtocolError::StreamClosed`];
    /// everything else is a transport error.
    pub fn from_read(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted => ProtocolError::StreamClosed,
            _ => ProtocolError::Io(err),
        }
    }
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
