//! Query orchestration for one UPS.
//!
//! A [`UpsSession`] owns its transport and whatever it has learned about the
//! device. Each query sends a read request and reassembles the response from
//! the transport's byte stream. Nothing is retried: the first error ends the
//! session.

use std::io;

use bytes::Bytes;
use tracing::{debug, info};
use ups_protocol::{
    decode_response, ByteSource, CommandFrame, CommandList, DeviceDescriptor, MeterBlock, Query,
    StatusSnapshot, CAPABILITIES_MAX_PAYLOAD, QUERY_MAX_PAYLOAD,
};

use crate::error::*;

/// A request/response channel to a UPS.
///
/// `send` delivers one encoded command frame; responses are read back one
/// byte at a time through [`ByteSource`].
pub trait Transport: ByteSource {
    /// Deliver a complete command frame.
    fn send(&mut self, frame: &[u8]) -> io::Result<()>;
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Limits and start-up behaviour for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Read the capability descriptor before the status queries.
    pub query_capabilities: bool,
    /// Reassembly limit for the capability descriptor.
    pub capabilities_max_payload: usize,
    /// Reassembly limit for every other query.
    pub query_max_payload: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            query_capabilities: true,
            capabilities_max_payload: CAPABILITIES_MAX_PAYLOAD,
            query_max_payload: QUERY_MAX_PAYLOAD,
        }
    }
}

impl SessionConfig {
    /// Reassembly limit for `query`.
    pub fn max_payload(&self, query: Query) -> usize {
        match query {
            Query::Capabilities => self.capabilities_max_payload,
            _ => self.query_max_payload,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Results of one status poll.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Commands the UPS reports as supported.
    pub commands: CommandList,
    /// Overall status and topology.
    pub status: StatusSnapshot,
    /// Raw meter registers.
    pub meters: MeterBlock,
}

/// A query session bound to one transport.
pub struct UpsSession<T> {
    transport: T,
    config: SessionConfig,
    descriptor: Option<DeviceDescriptor>,
}

impl<T: Transport> UpsSession<T> {
    /// Create a session with default limits.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Create a session with explicit limits.
    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        UpsSession {
            transport,
            config,
            descriptor: None,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Descriptor read by [`UpsSession::capabilities`], if any.
    pub fn descriptor(&self) -> Option<&DeviceDescriptor> {
        self.descriptor.as_ref()
    }

    /// Release the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Issue `query` and return its reassembled payload.
    pub fn read(&mut self, query: Query) -> MonitorResult<Bytes> {
        let frame = query.frame();
        debug!(%query, "sending read request");
        self.transport
            .send(frame.as_bytes())
            .map_err(MonitorError::Send)?;

        let payload = decode_response(
            &mut self.transport,
            query.opcode(),
            self.config.max_payload(query),
        )?;
        debug!(%query, len = payload.len(), "response complete");
        Ok(payload)
    }

    /// Send a configuration command. No response is read.
    pub fn write(&mut self, payload: &[u8]) -> MonitorResult<()> {
        let frame = CommandFrame::write_request(payload)?;
        debug!(len = payload.len(), "sending write command");
        self.transport
            .send(frame.as_bytes())
            .map_err(MonitorError::Send)
    }

    /// Read and keep the capability descriptor.
    pub fn capabilities(&mut self) -> MonitorResult<&DeviceDescriptor> {
        let payload = self.read(Query::Capabilities)?;
        let descriptor = DeviceDescriptor::decode(&payload)?;
        info!(id = %descriptor.id, va = descriptor.va_rating, "device capabilities");
        Ok(self.descriptor.insert(descriptor))
    }

    /// Read the supported command list.
    pub fn command_list(&mut self) -> MonitorResult<CommandList> {
        let payload = self.read(Query::CommandList)?;
        Ok(CommandList::decode(&payload)?)
    }

    /// Read overall status and topology.
    pub fn status(&mut self) -> MonitorResult<StatusSnapshot> {
        let payload = self.read(Query::Status)?;
        let status = StatusSnapshot::decode(&payload)?;
        info!(overall = %status.overall, topology = %status.topology, "status");
        Ok(status)
    }

    /// Read the raw meter registers.
    pub fn meters(&mut self) -> MonitorResult<MeterBlock> {
        Ok(MeterBlock::new(self.read(Query::Meters)?))
    }

    /// Poll command list, status and meters, in that order.
    pub fn snapshot(&mut self) -> MonitorResult<Snapshot> {
        let commands = self.command_list()?;
        let status = self.status()?;
        let meters = self.meters()?;
        Ok(Snapshot {
            commands,
            status,
            meters,
        })
    }
}
