//! Domain records exchanged with the phone.
//!
//! All records are transient: the phone is the system of record and nothing
//! here is cached between operations.

pub mod alarm;
pub mod element;
pub mod message;

use std::fmt;

pub use alarm::Alarm;
pub use element::{Category, ELEMENT_TYPES, Element, ElementType};
pub use message::Message;

/// SIM lock state reported by `AT+CPIN?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PinStatus {
    /// No code required.
    Ready,
    /// Waiting for the SIM PIN.
    SimPin,
    /// Waiting for the SIM PUK.
    SimPuk,
    /// Waiting for PIN2.
    SimPin2,
    /// Waiting for PUK2.
    SimPuk2,
    /// Waiting for the network personalisation code.
    PhNetPin,
}

impl PinStatus {
    /// Match a state name loosely: whitespace and dashes count as
    /// underscores and case is ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .map(|c| {
                if c.is_whitespace() || c == '-' {
                    '_'
                } else {
                    c.to_ascii_uppercase()
                }
            })
            .collect();
        match normalized.as_str() {
            "READY" => Some(Self::Ready),
            "SIM_PIN" => Some(Self::SimPin),
            "SIM_PUK" => Some(Self::SimPuk),
            "SIM_PIN2" => Some(Self::SimPin2),
            "SIM_PUK2" => Some(Self::SimPuk2),
            "PH_NET_PIN" => Some(Self::PhNetPin),
            _ => None,
        }
    }

    /// Name as the phone reports it.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::SimPin => "SIM PIN",
            Self::SimPuk => "SIM PUK",
            Self::SimPin2 => "SIM PIN2",
            Self::SimPuk2 => "SIM PUK2",
            Self::PhNetPin => "PH-NET PIN",
        }
    }
}

impl fmt::Display for PinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Signal report from `AT+CSQ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalQuality {
    /// Received signal strength indicator (0–31, 99 = unknown).
    pub rssi: u8,
    /// Bit error rate (0–7, 99 = unknown).
    pub ber: u8,
}

impl SignalQuality {
    /// Approximate power in dBm, when known.
    pub fn dbm(&self) -> Option<i32> {
        (self.rssi <= 31).then(|| -113 + 2 * i32::from(self.rssi))
    }
}

/// Identification and status of the handset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// Firmware version (`AT+KPSV`).
    pub firmware: Option<String>,
    /// IMEI (`AT+CGSN`).
    pub imei: Option<String>,
    /// Device type / revision (`AT+CGMR`).
    pub device_type: Option<String>,
    /// Own numbers (`AT+CNUM`), comma-joined.
    pub subscriber_numbers: Option<String>,
    /// Signal quality (`AT+CSQ`).
    pub signal: Option<SignalQuality>,
    /// SIM lock state (`AT+CPIN?`).
    pub pin: Option<PinStatus>,
}
