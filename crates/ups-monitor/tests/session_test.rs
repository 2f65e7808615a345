//! Integration tests for the query session against a simulated UPS.
//!
//! The simulated device answers each read request by appending canned
//! response frames to its interrupt stream, optionally with line noise,
//! stale frames and fragmentation.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read};

use ups_monitor::{write_report, MonitorError, SessionConfig, Transport, UpsSession};
use ups_protocol::{
    encode_response, OverallStatus, ProtocolError, Query, TopologyFlag, START_BYTE,
};

/// A fake UPS that replies to read requests from a table.
#[derive(Default)]
struct SimulatedUps {
    replies: HashMap<u8, Vec<u8>>,
    stream: VecDeque<u8>,
    requests: Vec<u8>,
}

impl SimulatedUps {
    /// Reply to `opcode` with `payload` split into frames of at most `chunk` bytes.
    fn reply(mut self, opcode: u8, payload: &[u8], chunk: usize) -> Self {
        let mut bytes = Vec::new();
        let chunks: Vec<&[u8]> = payload.chunks(chunk).collect();
        for (i, part) in chunks.iter().enumerate() {
            bytes.extend(encode_response(opcode, part, i + 1 == chunks.len()));
        }
        self.replies.insert(opcode, bytes);
        self
    }

    /// Reply to `opcode` with exactly these bytes.
    fn reply_raw(mut self, opcode: u8, bytes: Vec<u8>) -> Self {
        self.replies.insert(opcode, bytes);
        self
    }
}

impl Read for SimulatedUps {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Transport for SimulatedUps {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        assert_eq!(frame[0], START_BYTE);
        assert_eq!(frame[1], 1, "only read requests expected");
        assert_eq!(frame.iter().fold(0u8, |s, &b| s.wrapping_add(b)), 0);
        let opcode = frame[2];
        self.requests.push(opcode);
        if let Some(reply) = self.replies.get(&opcode) {
            self.stream.extend(reply.iter().copied());
        }
        Ok(())
    }
}

fn descriptor_payload() -> Vec<u8> {
    let mut p = vec![1, 0x01, 0x02, 0, 0x1E, 0x00, 0x01, 0x00];
    p.push(6);
    p.extend_from_slice(b"PW9130");
    p.extend_from_slice(&[2, 0xA0, 0xA1]); // maps
    p.extend_from_slice(&[1, 0xB0]); // alarms
    p.extend_from_slice(&[0x40, 0x00]); // config block
    p.extend_from_slice(&[3, 1, 2, 3]); // stat map
    p.extend_from_slice(&[0x00, 0x01, 0x80, 0x00, 0x10, 0x00, 0x00]);
    p.extend_from_slice(&[0x20, 0x00, 0x08, 0x00, 0x18, 0x00]);
    p
}

fn ups() -> SimulatedUps {
    SimulatedUps::default()
        .reply(Query::Capabilities.opcode(), &descriptor_payload(), 8)
        .reply(Query::CommandList.opcode(), &[3, 0, 0x31, 0x33, 0x34], 64)
        .reply(Query::Status.opcode(), &[0xF0, 0b0011_1001], 64)
        .reply(Query::Meters.opcode(), &[0xE6, 0x00, 0x78, 0x00, 0x32, 0x00], 4)
}

#[test]
fn test_full_session() {
    let mut session = UpsSession::new(ups());

    let desc = session.capabilities().expect("capabilities");
    assert_eq!(desc.id, "PW9130");
    assert_eq!(desc.va_rating, 1500);
    assert_eq!(desc.map_count, 2);
    assert_eq!(desc.alarm_count, 1);
    assert_eq!(desc.config_block_size, 64);
    assert_eq!(desc.stat_map_size, 3);
    assert_eq!(desc.alarm_log_size, 256);
    assert_eq!(desc.event_log_size, 128);
    assert_eq!(desc.topology_block_size, 16);
    assert_eq!(desc.command_list_size, 32);
    assert_eq!(desc.outlet_block_size, 8);
    assert_eq!(desc.alarm_block_size, 24);

    let snapshot = session.snapshot().expect("snapshot");
    assert_eq!(snapshot.commands.commands, vec![0x31, 0x33, 0x34]);
    assert_eq!(snapshot.status.overall, OverallStatus::OnBattery);
    assert!(snapshot.status.topology.contains(TopologyFlag::OnBattery));
    assert!(snapshot.status.topology.contains(TopologyFlag::InverterOn));
    assert!(!snapshot.status.topology.contains(TopologyFlag::UtilityPresent));
    assert_eq!(snapshot.meters.words().collect::<Vec<_>>(), vec![230, 120, 50]);

    let mut out = Vec::new();
    write_report(&mut out, session.descriptor(), &snapshot).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("1500VA"));
    assert!(text.contains("Overall Status: ON BATTERY"));
    assert!(text.contains(
        "Topology Status: bypass-installed,on-battery,inverter-on,low-battery"
    ));

    let transport = session.into_transport();
    assert_eq!(transport.requests, vec![0x31, 0x40, 0x33, 0x34]);
}

#[test]
fn test_status_through_noise_and_stale_frames() {
    let mut bytes = vec![0x00, 0xFF, START_BYTE, 0x55, 0x12];
    bytes.extend(encode_response(Query::Meters.opcode(), &[1, 2, 3, 4], true));
    bytes.extend(encode_response(Query::Status.opcode(), &[0x50, 0x80], true));
    let ups = SimulatedUps::default().reply_raw(Query::Status.opcode(), bytes);

    let mut session = UpsSession::new(ups);
    let status = session.status().unwrap();
    assert_eq!(status.overall, OverallStatus::SystemNormal);
    assert_eq!(status.topology.to_string(), "utility-present");
}

#[test]
fn test_corrupt_frame_aborts_session() {
    let mut bytes = encode_response(Query::Status.opcode(), &[0x50, 0x80], true);
    bytes[4] ^= 0x01;
    let ups = SimulatedUps::default().reply_raw(Query::Status.opcode(), bytes);

    let mut session = UpsSession::new(ups);
    assert!(matches!(
        session.status(),
        Err(MonitorError::Protocol(ProtocolError::CorruptFrame { opcode: 0x33, .. }))
    ));
}

#[test]
fn test_silent_device_reports_stream_closed() {
    let mut session = UpsSession::new(SimulatedUps::default());
    assert!(matches!(
        session.command_list(),
        Err(MonitorError::Protocol(ProtocolError::StreamClosed))
    ));
}

#[test]
fn test_descriptor_trailing_bytes() {
    let mut payload = descriptor_payload();
    payload.push(0xEE);
    let ups = SimulatedUps::default().reply(Query::Capabilities.opcode(), &payload, 16);

    let mut session = UpsSession::new(ups);
    assert!(matches!(
        session.capabilities(),
        Err(MonitorError::Protocol(ProtocolError::MalformedDescriptor { .. }))
    ));
    assert!(session.descriptor().is_none());
}

#[test]
fn test_descriptor_over_limit() {
    let config = SessionConfig {
        capabilities_max_payload: 16,
        ..Default::default()
    };
    let mut session = UpsSession::with_config(ups(), config);
    assert!(matches!(
        session.capabilities(),
        Err(MonitorError::Protocol(ProtocolError::ResponseTooLarge { max: 16, .. }))
    ));
}
