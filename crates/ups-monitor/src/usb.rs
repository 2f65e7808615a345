//! USB transport.
//!
//! Commands are delivered with a standard SET_DESCRIPTOR control request
//! addressed to string descriptor 4. Responses arrive as interrupt IN
//! transfers; their bytes are queued and handed out through [`Read`].

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;
use std::time::Duration;

use futures_lite::future::block_on;
use nusb::transfer::{
    Control, ControlType, Direction, EndpointType, Recipient, RequestBuffer, TransferError,
};
use nusb::{Device, Interface};
use tracing::{debug, trace};

use crate::error::*;
use crate::session::Transport;

/// Standard SET_DESCRIPTOR request.
const REQUEST_SET_DESCRIPTOR: u8 = 0x07;
/// String descriptor type.
const DESCRIPTOR_TYPE_STRING: u8 = 0x03;
/// Descriptor index the UPS treats as its command mailbox.
const COMMAND_DESCRIPTOR_INDEX: u8 = 4;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

/// Identifies a device by bus number and device address, as shown by `lsusb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSelector {
    pub bus: u8,
    pub address: u8,
}

impl FromStr for DeviceSelector {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MonitorError::InvalidSelector(s.to_string());
        let (bus, address) = s.split_once(':').ok_or_else(invalid)?;
        Ok(DeviceSelector {
            bus: bus.trim().parse().map_err(|_| invalid())?,
            address: address.trim().parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}:{:03}", self.bus, self.address)
    }
}

/// Transport over a claimed USB interface.
pub struct UsbTransport {
    interface: Interface,
    endpoint: u8,
    packet_size: usize,
    pending: VecDeque<u8>,
}

impl UsbTransport {
    /// Open the device at `selector` and claim the interface that owns its
    /// interrupt IN endpoint.
    pub fn open(selector: &DeviceSelector) -> MonitorResult<Self> {
        let info = nusb::list_devices()
            .map_err(|e| MonitorError::Usb(e.to_string()))?
            .find(|d| d.bus_number() == selector.bus && d.device_address() == selector.address)
            .ok_or_else(|| MonitorError::DeviceNotFound(selector.to_string()))?;
        debug!(
            vid = info.vendor_id(),
            pid = info.product_id(),
            "opening {}",
            selector
        );

        let device = info.open().map_err(|e| MonitorError::Usb(e.to_string()))?;
        let (number, endpoint, packet_size) = find_interrupt_in(&device)?;
        let interface = device
            .claim_interface(number)
            .map_err(|e| MonitorError::Usb(e.to_string()))?;
        debug!(interface = number, endpoint, packet_size, "claimed interface");

        Ok(UsbTransport {
            interface,
            endpoint,
            packet_size,
            pending: VecDeque::new(),
        })
    }

    fn fill(&mut self) -> io::Result<()> {
        let completion = block_on(
            self.interface
                .interrupt_in(self.endpoint, RequestBuffer::new(self.packet_size)),
        );
        completion.status.map_err(transfer_error)?;
        trace!(len = completion.data.len(), "interrupt transfer");
        self.pending.extend(completion.data);
        Ok(())
    }
}

fn find_interrupt_in(device: &Device) -> MonitorResult<(u8, u8, usize)> {
    let config = device
        .active_configuration()
        .map_err(|e| MonitorError::Usb(e.to_string()))?;
    for alt in config.interface_alt_settings() {
        for ep in alt.endpoints() {
            if ep.transfer_type() == EndpointType::Interrupt && ep.direction() == Direction::In {
                return Ok((alt.interface_number(), ep.address(), ep.max_packet_size()));
            }
        }
    }
    Err(MonitorError::NoInterruptEndpoint)
}

fn transfer_error(err: TransferError) -> io::Error {
    let kind = match err {
        TransferError::Disconnected | TransferError::Cancelled => io::ErrorKind::BrokenPipe,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, err)
}

impl Read for UsbTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending.is_empty() {
            self.fill()?;
        }
        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Transport for UsbTransport {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        let control = Control {
            control_type: ControlType::Standard,
            recipient: Recipient::Device,
            request: REQUEST_SET_DESCRIPTOR,
            value: (u16::from(DESCRIPTOR_TYPE_STRING) << 8) | u16::from(COMMAND_DESCRIPTOR_INDEX),
            index: 0,
        };
        trace!(len = frame.len(), "control out");
        self.interface
            .control_out_blocking(control, frame, CONTROL_TIMEOUT)
            .map_err(transfer_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selector() {
        let sel: DeviceSelector = "1:7".parse().unwrap();
        assert_eq!(sel, DeviceSelector { bus: 1, address: 7 });
        assert_eq!(sel.to_string(), "001:007");
        assert_eq!("003:012".parse::<DeviceSelector>().unwrap().address, 12);
    }

    #[test]
    fn test_parse_selector_invalid() {
        for bad in ["", "1", "1:", ":2", "a:b", "1:300", "/dev/usb/ep5.0"] {
            assert!(
                matches!(bad.parse::<DeviceSelector>(), Err(MonitorError::InvalidSelector(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }
}
