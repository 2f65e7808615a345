//! Overall status and topology flags reported in response to [`OP_STATUS`].

use std::fmt;

use crate::constants::*;
use crate::error::*;

/// Overall UPS state, keyed by the exact value of the status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverallStatus {
    OnBattery,
    OutputOverload,
    RectifierOverload,
    InverterRampingUp,
    SyncingToBypass,
    RectifierRamping,
    OnMaintenanceBypass,
    OnBuckReducer,
    OnBoostStepUp,
    OnDoubleBoost,
    OnBypass,
    HighEfficiencyMode,
    SystemNormal,
    UpsSupportingLoad,
    UpsOn,
    OutletSwitchOpen,
    OutletBreakerOpen,
    ModuleFailure,
    UpsOff,
    /// Any value not in the table.
    Unknown(u8),
}

impl OverallStatus {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            OverallStatus::OnBattery => "ON BATTERY",
            OverallStatus::OutputOverload => "OUTPUT OVERLOAD",
            OverallStatus::RectifierOverload => "RECTIFIER OVERLOAD",
            OverallStatus::InverterRampingUp => "INVERTER RAMPING UP",
            OverallStatus::SyncingToBypass => "SYNCING TO BYPASS",
            OverallStatus::RectifierRamping => "RECTIFIER RAMPING",
            OverallStatus::OnMaintenanceBypass => "ON MAINTENANCE BYPASS",
            OverallStatus::OnBuckReducer => "ON BUCK/REDUCER",
            OverallStatus::OnBoostStepUp => "ON BOOST/STEP UP",
            OverallStatus::OnDoubleBoost => "ON DOUBLE BOOST",
            OverallStatus::OnBypass => "ON BYPASS",
            OverallStatus::HighEfficiencyMode => "HIGH EFFICIENCY MODE",
            OverallStatus::SystemNormal => "SYSTEM NORMAL",
            OverallStatus::UpsSupportingLoad => "UPS SUPPORTING LOAD",
            OverallStatus::UpsOn => "UPS ON",
            OverallStatus::OutletSwitchOpen => "OUTLET SWITCH OPEN",
            OverallStatus::OutletBreakerOpen => "OUTLET BREAKER OPEN",
            OverallStatus::ModuleFailure => "MODULE FAILURE",
            OverallStatus::UpsOff => "UPS OFF",
            OverallStatus::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for OverallStatus {
    fn from(code: u8) -> Self {
        match code {
            0xF0 => OverallStatus::OnBattery,
            0xE0 => OverallStatus::OutputOverload,
            0xD0 => OverallStatus::RectifierOverload,
            0x90 => OverallStatus::InverterRampingUp,
            0x80 => OverallStatus::SyncingToBypass,
            0x70 => OverallStatus::RectifierRamping,
            0x64 => OverallStatus::OnMaintenanceBypass,
            0x63 => OverallStatus::OnBuckReducer,
            0x62 => OverallStatus::OnBoostStepUp,
            0x61 => OverallStatus::OnDoubleBoost,
            0x60 => OverallStatus::OnBypass,
            0x51 => OverallStatus::HighEfficiencyMode,
            0x50 => OverallStatus::SystemNormal,
            0x40 => OverallStatus::UpsSupportingLoad,
            0x30 => OverallStatus::UpsOn,
            0x21 => OverallStatus::OutletSwitchOpen,
            0x20 => OverallStatus::OutletBreakerOpen,
            0x11 => OverallStatus::ModuleFailure,
            0x10 => OverallStatus::UpsOff,
            _ => OverallStatus::Unknown(code),
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One bit of the topology byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyFlag {
    BypassInstalled,
    OutputBreakerClosed,
    OnBypass,
    OnBattery,
    InverterOn,
    LowBattery,
    RectifierOn,
    UtilityPresent,
}

impl TopologyFlag {
    /// All flags, indexed by bit position.
    pub const ALL: [TopologyFlag; 8] = [
        TopologyFlag::BypassInstalled,
        TopologyFlag::OutputBreakerClosed,
        TopologyFlag::OnBypass,
        TopologyFlag::OnBattery,
        TopologyFlag::InverterOn,
        TopologyFlag::LowBattery,
        TopologyFlag::RectifierOn,
        TopologyFlag::UtilityPresent,
    ];

    /// Bit position within the topology byte.
    pub fn bit(self) -> u8 {
        self as u8
    }

    /// Flag name as printed.
    pub fn name(self) -> &'static str {
        match self {
            TopologyFlag::BypassInstalled => "bypass-installed",
            TopologyFlag::OutputBreakerClosed => "output-breaker-closed",
            TopologyFlag::OnBypass => "on-bypass",
            TopologyFlag::OnBattery => "on-battery",
            TopologyFlag::InverterOn => "inverter-on",
            TopologyFlag::LowBattery => "low-battery",
            TopologyFlag::RectifierOn => "rectifier-on",
            TopologyFlag::UtilityPresent => "utility-present",
        }
    }
}

impl fmt::Display for TopologyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of topology flags carried by one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TopologyFlags(pub u8);

impl TopologyFlags {
    /// Whether `flag` is set.
    pub fn contains(&self, flag: TopologyFlag) -> bool {
        self.0 & (1 << flag.bit()) != 0
    }

    /// Set flags, from bit 0 to bit 7.
    pub fn iter(&self) -> impl Iterator<Item = TopologyFlag> + '_ {
        TopologyFlag::ALL.into_iter().filter(|f| self.contains(*f))
    }

    /// Whether no flag is set.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl From<u8> for TopologyFlags {
    fn from(bits: u8) -> Self {
        TopologyFlags(bits)
    }
}

impl fmt::Display for TopologyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(flag.name())?;
        }
        Ok(())
    }
}

/// Overall status and topology, decoded from one status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub overall: OverallStatus,
    pub topology: TopologyFlags,
}

impl StatusSnapshot {
    /// Decode a status payload: byte 0 is the overall status, byte 1 the
    /// topology bits. Any further bytes are ignored.
    pub fn decode(data: &[u8]) -> ProtocolResult<Self> {
        if data.len() < 2 {
            return Err(ProtocolError::ShortPayload {
                expected: 2,
                actual: data.len(),
            });
        }
        Ok(StatusSnapshot {
            overall: OverallStatus::from(data[0]),
            topology: TopologyFlags::from(data[1]),
        })
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Overall Status: {}", self.overall)?;
        write!(f, "Topology Status: {}", self.topology)
    }
}
