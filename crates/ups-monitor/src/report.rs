//! Human-readable report output.

use std::io::{self, Write};

use ups_protocol::DeviceDescriptor;

use crate::session::Snapshot;

/// Write the descriptor (if one was read) and a status snapshot to `out`.
pub fn write_report<W: Write>(
    out: &mut W,
    descriptor: Option<&DeviceDescriptor>,
    snapshot: &Snapshot,
) -> io::Result<()> {
    if let Some(desc) = descriptor {
        writeln!(out, "{}", desc)?;
    }
    writeln!(out, "{}", snapshot.status)?;
    Ok(())
}
