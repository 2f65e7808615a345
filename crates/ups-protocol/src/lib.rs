//! UPS USB Vendor Protocol
//!
//! This crate provides types and utilities for talking to UPS controllers that
//! expose a small framed command protocol over USB. Commands go out as control
//! transfers; responses come back on an interrupt endpoint as a byte stream.
//!
//! # Protocol Overview
//!
//! - **Command frames** (host → UPS): `0xAB`, length, payload, checksum
//! - **Response frames** (UPS → host): `0xAB`, echoed opcode, length,
//!   sequence, payload, checksum
//!
//! Every frame sums to zero modulo 256. A response may span several frames;
//! the decoder skips noise and frames for other opcodes, and concatenates
//! fragments until one carries the final-fragment bit.
//!
//! # Example
//!
//! ```rust,ignore
//! use ups_protocol::{decode_response, Query, StatusSnapshot};
//!
//! let frame = Query::Status.frame();
//! transport.send(frame.as_bytes())?;
//!
//! let payload = decode_response(&mut stream, Query::Status.opcode(), Query::Status.max_payload())?;
//! let status = StatusSnapshot::decode(&payload)?;
//! println!("{}", status);
//! ```

mod commands;
mod constants;
mod descriptor;
mod error;
mod frame;
mod status;

pub use commands::*;
pub use constants::*;
pub use descriptor::*;
pub use error::*;
pub use frame::*;
pub use status::*;
