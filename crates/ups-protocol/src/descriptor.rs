//! Capability descriptor reported in response to [`OP_CAPABILITIES`].
//!
//! The descriptor is a length-prefixed record: counts and size bytes decide
//! how far the following fields extend, so it must be read strictly in order.
//! All multi-byte integers are little-endian.
//!
//! ```text
//! ncpu | cpu[2*ncpu] | wflag | va(1|2) | phase[2] | idlen | id[idlen]
//! nmap | map[nmap] | nalarm | alarm[nalarm] | cfg:u16 | nstat | stat[nstat]
//! almlog:u16 | evtlog:u16 | topo:u16 | rsvd | cmdlst:u16 | outlet:u16 | almblk:u16
//! ```

use std::fmt;

use bytes::Buf;
use log::warn;

use crate::constants::*;
use crate::error::*;

/// Encoding width of the VA rating field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingWidth {
    /// One byte. Selected by a non-zero width flag; not yet confirmed
    /// against a device capture.
    Narrow,
    /// Two bytes, little-endian. Selected by a zero width flag.
    Wide,
}

impl From<u8> for RatingWidth {
    fn from(flag: u8) -> Self {
        if flag != 0 {
            RatingWidth::Narrow
        } else {
            RatingWidth::Wide
        }
    }
}

/// Device capabilities decoded from the capability descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Number of CPUs in the UPS.
    pub cpu_count: u8,
    /// Per-CPU entries, kept opaque.
    pub cpu_table: Vec<[u8; 2]>,
    /// How the VA rating was encoded.
    pub rating_width: Option<RatingWidth>,
    /// Output rating in VA.
    pub va_rating: u32,
    /// Output phase information (not interpreted).
    pub output_phase_info: [u8; 2],
    /// Device identifier.
    pub id: String,
    /// Number of status-map entries.
    pub map_count: u8,
    /// Number of alarm-table entries.
    pub alarm_count: u8,
    /// Size of the configuration block in bytes.
    pub config_block_size: u16,
    /// Size of the statistics map in bytes.
    pub stat_map_size: u8,
    /// Size of the alarm log in bytes.
    pub alarm_log_size: u16,
    /// Size of the custom event log in bytes.
    pub event_log_size: u16,
    /// Size of the topology block in bytes.
    pub topology_block_size: u16,
    /// Size of the command-list block in bytes.
    pub command_list_size: u16,
    /// Size of the outlet-monitoring block in bytes.
    pub outlet_block_size: u16,
    /// Size of the alarm block in bytes.
    pub alarm_block_size: u16,
}

impl DeviceDescriptor {
    /// Decode a reassembled capability payload.
    ///
    /// Fails with [`ProtocolError::MalformedDescriptor`] if any field runs past
    /// the end of `data` or if bytes remain once the last field is read.
    pub fn decode(data: &[u8]) -> ProtocolResult<Self> {
        let mut r = FieldReader::new(data);
        let mut desc = DeviceDescriptor::default();

        desc.cpu_count = r.u8()?;
        for _ in 0..desc.cpu_count {
            let entry = r.take(2)?;
            desc.cpu_table.push([entry[0], entry[1]]);
        }

        let width = RatingWidth::from(r.u8()?);
        let raw = match width {
            RatingWidth::Narrow => {
                warn!("descriptor uses the narrow VA rating encoding; rating may be inaccurate");
                r.u8()? as u32
            }
            RatingWidth::Wide => r.u16_le()? as u32,
        };
        desc.rating_width = Some(width);
        desc.va_rating = VA_RATING_UNIT * raw;

        let phase = r.take(2)?;
        desc.output_phase_info = [phase[0], phase[1]];

        let id_len = r.u8()? as usize;
        desc.id = String::from_utf8_lossy(r.take(id_len)?).to_string();

        desc.map_count = r.u8()?;
        r.skip(desc.map_count as usize)?;

        desc.alarm_count = r.u8()?;
        r.skip(desc.alarm_count as usize)?;

        desc.config_block_size = r.u16_le()?;

        desc.stat_map_size = r.u8()?;
        r.skip(desc.stat_map_size as usize)?;

        desc.alarm_log_size = r.u16_le()?;
        desc.event_log_size = r.u16_le()?;
        desc.topology_block_size = r.u16_le()?;
        r.skip(1)?;
        desc.command_list_size = r.u16_le()?;
        desc.outlet_block_size = r.u16_le()?;
        desc.alarm_block_size = r.u16_le()?;

        r.finish()?;
        Ok(desc)
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "id={}", self.id)?;
        writeln!(f, "#cpus={}", self.cpu_count)?;
        writeln!(f, "{}VA", self.va_rating)?;
        writeln!(f, "#maps={}", self.map_count)?;
        writeln!(f, "#alarms={}", self.alarm_count)?;
        writeln!(f, "{} byte config block", self.config_block_size)?;
        writeln!(f, "{} byte statistics map", self.stat_map_size)?;
        writeln!(f, "{} byte alarm log", self.alarm_log_size)?;
        writeln!(f, "{} byte custom event log", self.event_log_size)?;
        writeln!(f, "{} byte topology block", self.topology_block_size)?;
        writeln!(f, "{} byte command list block", self.command_list_size)?;
        writeln!(f, "{} byte outlet monitoring block", self.outlet_block_size)?;
        write!(f, "{} byte alarm block", self.alarm_block_size)
    }
}

/// Bounds-checked cursor over a descriptor payload.
struct FieldReader<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        FieldReader { buf, len: buf.len() }
    }

    fn offset(&self) -> usize {
        self.len - self.buf.remaining()
    }

    fn need(&self, n: usize) -> ProtocolResult<()> {
        if self.buf.remaining() < n {
            return Err(ProtocolError::MalformedDescriptor {
                offset: self.offset(),
                len: self.len,
                reason: "field runs past end of payload",
            });
        }
        Ok(())
    }

    fn u8(&mut self) -> ProtocolResult<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16_le(&mut self) -> ProtocolResult<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    fn take(&mut self, n: usize) -> ProtocolResult<&'a [u8]> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn skip(&mut self, n: usize) -> ProtocolResult<()> {
        self.need(n)?;
        self.buf.advance(n);
        Ok(())
    }

    fn finish(self) -> ProtocolResult<()> {
        if self.buf.has_remaining() {
            return Err(ProtocolError::MalformedDescriptor {
                offset: self.offset(),
                len: self.len,
                reason: "trailing bytes after last field",
            });
        }
        Ok(())
    }
}
