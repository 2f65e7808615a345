//! Error types for the monitor.

use std::io;

use thiserror::Error;
use ups_protocol::ProtocolError;

/// Errors that end a monitoring session.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Protocol-level failure while reading or decoding a response.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The command frame could not be delivered.
    #[error("failed to send command: {0}")]
    Send(#[source] io::Error),

    /// USB stack error while opening or configuring the device.
    #[error("USB error: {0}")]
    Usb(String),

    /// No device matched the selector.
    #[error("no USB device at {0}")]
    DeviceNotFound(String),

    /// The device has no interrupt IN endpoint to read responses from.
    #[error("could not find interrupt endpoint")]
    NoInterruptEndpoint,

    /// Device selector could not be parsed.
    #[error("invalid device {0:?}: expected BUS:ADDRESS")]
    InvalidSelector(String),

    /// Writing the report failed.
    #[error("output error: {0}")]
    Output(#[from] io::Error),
}

/// Result type alias for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;
