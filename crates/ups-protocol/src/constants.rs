//! Protocol constants
//!
//! Framing bytes, size limits, and query opcodes used by the UPS protocol.

// ============================================================================
// Framing
// ============================================================================

/// First byte of every command and response frame.
pub const START_BYTE: u8 = 0xAB;

/// Largest command payload. Start, length and checksum bring a full frame
/// to the 128-byte command descriptor limit.
pub const MAX_COMMAND_PAYLOAD: usize = 124;

/// Largest payload a single response frame can carry.
pub const MAX_RESPONSE_PAYLOAD: usize = 251;

/// Responses echo the request opcode minus this value.
pub const RESPONSE_OPCODE_OFFSET: u8 = 0x30;

/// Sequence-byte bit marking the last fragment of a response.
pub const FINAL_FRAGMENT: u8 = 0x80;

/// Response header: start, opcode, length, sequence.
pub const RESPONSE_HEADER_SIZE: usize = 4;

// ============================================================================
// Query Opcodes (host → UPS)
// ============================================================================

/// Capability descriptor.
pub const OP_CAPABILITIES: u8 = 0x31;
/// Overall status and topology flags.
pub const OP_STATUS: u8 = 0x33;
/// Numeric meter registers.
pub const OP_METERS: u8 = 0x34;
/// Supported command list.
pub const OP_COMMAND_LIST: u8 = 0x40;

// ============================================================================
// Response Buffer Limits
// ============================================================================

/// Reassembly limit for the capability descriptor.
pub const CAPABILITIES_MAX_PAYLOAD: usize = 4096;

/// Reassembly limit for the short status-style responses.
pub const QUERY_MAX_PAYLOAD: usize = 128;

// ============================================================================
// VA Rating
// ============================================================================

/// The descriptor reports the VA rating in units of this many VA.
pub const VA_RATING_UNIT: u32 = 50;
