//! Read queries and the small responses that are not status or descriptor.

use std::fmt;

use bytes::Bytes;

use crate::constants::*;
use crate::error::*;
use crate::frame::CommandFrame;

/// Read queries the host can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    /// Capability descriptor.
    Capabilities,
    /// Supported command list.
    CommandList,
    /// Overall status and topology flags.
    Status,
    /// Numeric meter registers.
    Meters,
}

impl Query {
    /// Opcode sent in the read request.
    pub fn opcode(self) -> u8 {
        match self {
            Query::Capabilities => OP_CAPABILITIES,
            Query::CommandList => OP_COMMAND_LIST,
            Query::Status => OP_STATUS,
            Query::Meters => OP_METERS,
        }
    }

    /// Largest reassembled response accepted for this query.
    pub fn max_payload(self) -> usize {
        match self {
            Query::Capabilities => CAPABILITIES_MAX_PAYLOAD,
            _ => QUERY_MAX_PAYLOAD,
        }
    }

    /// Encode the read request for this query.
    pub fn frame(self) -> CommandFrame {
        CommandFrame::read_request(self.opcode())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Query::Capabilities => "capabilities",
            Query::CommandList => "command list",
            Query::Status => "status",
            Query::Meters => "meters",
        };
        write!(f, "{} (0x{:02X})", name, self.opcode())
    }
}

/// Opcodes the UPS reports as supported.
///
/// Byte 0 is the count and byte 1 is reserved; opcodes follow from byte 2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandList {
    /// Count reported by the device.
    pub count: u8,
    /// Supported opcodes, at most `count` of them.
    pub commands: Vec<u8>,
}

impl CommandList {
    /// Decode a command-list payload.
    pub fn decode(data: &[u8]) -> ProtocolResult<Self> {
        if data.len() < 2 {
            return Err(ProtocolError::ShortPayload {
                expected: 2,
                actual: data.len(),
            });
        }
        let count = data[0];
        let commands = data[2..].iter().take(count as usize).copied().collect();
        Ok(CommandList { count, commands })
    }

    /// Whether the UPS lists `opcode`.
    pub fn supports(&self, opcode: u8) -> bool {
        self.commands.contains(&opcode)
    }
}

impl fmt::Display for CommandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#cmds={}", self.count)?;
        for cmd in &self.commands {
            write!(f, " 0x{:02X}", cmd)?;
        }
        Ok(())
    }
}

/// Raw numeric meter registers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeterBlock {
    raw: Bytes,
}

impl MeterBlock {
    /// Wrap a meter payload.
    pub fn new(raw: Bytes) -> Self {
        MeterBlock { raw }
    }

    /// Register bytes as received.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Number of register bytes.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Registers read as little-endian 16-bit words. A trailing odd byte is
    /// dropped.
    pub fn words(&self) -> impl Iterator<Item = u16> + '_ {
        self.raw
            .chunks_exact(2)
            .map(|w| u16::from_le_bytes([w[0], w[1]]))
    }
}

impl fmt::Display for MeterBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} byte meter block", self.raw.len())
    }
}
