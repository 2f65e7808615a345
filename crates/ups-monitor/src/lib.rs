//! UPS monitor
//!
//! Drives the [`ups_protocol`] queries against a device: a [`UpsSession`]
//! owns a [`Transport`], reads the capability descriptor and polls status,
//! and [`write_report`] prints the results.

pub mod error;
pub mod report;
pub mod session;
#[cfg(feature = "usb")]
pub mod usb;

pub use error::*;
pub use report::write_report;
pub use session::{SessionConfig, Snapshot, Transport, UpsSession};
#[cfg(feature = "usb")]
pub use usb::{DeviceSelector, UsbTransport};
