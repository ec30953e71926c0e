//! Channel abstraction over a duplex serial byte stream.
//!
//! The protocol layer never talks to a device directly. It drives a
//! [`Channel`], which can be:
//!
//! - **Native** ([`NativePort`]): a real serial device through the
//!   `serialport` crate
//! - **Simulated** ([`FakePhone`]): an in-memory handset that answers the
//!   AT dialect, used by tests and by the CLI `--fake` switch
//!
//! ```text
//! +-------------------------------+
//! |  Phone / upload / download    |
//! +---------------+---------------+
//!                 |
//!                 v
//! +---------------+---------------+
//! |           Exchange            |
//! +---------------+---------------+
//!                 |
//!                 v
//! +---------------+---------------+
//! |         Channel trait         |
//! +-------+---------------+-------+
//!         |               |
//!         v               v
//!   NativePort        FakePhone
//! ```

pub mod fake;
#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::{Error, Result};

/// Serial port configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyACM0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Timeout of a single blocking read or write.
    pub timeout: Duration,
    /// Data bits (typically 8).
    pub data_bits: DataBits,
    /// Parity (typically None).
    pub parity: Parity,
    /// Stop bits (typically One).
    pub stop_bits: StopBits,
    /// Flow control (typically None).
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115200,
            timeout: Duration::from_millis(100),
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the character framing.
    #[must_use]
    pub fn with_framing(mut self, data_bits: DataBits, parity: Parity, stop_bits: StopBits) -> Self {
        self.data_bits = data_bits;
        self.parity = parity;
        self.stop_bits = stop_bits;
        self
    }

    /// Set the flow control mode.
    #[must_use]
    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }
}

/// Number of data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataBits {
    /// 5 data bits.
    Five,
    /// 6 data bits.
    Six,
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

impl DataBits {
    /// Parse the numeric form (5–8).
    pub fn from_count(bits: u8) -> Option<Self> {
        match bits {
            5 => Some(Self::Five),
            6 => Some(Self::Six),
            7 => Some(Self::Seven),
            8 => Some(Self::Eight),
            _ => None,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
    /// Parity bit always 0.
    Space,
    /// Parity bit always 1.
    Mark,
}

impl Parity {
    /// Parse a parity name (`none`, `even`, `odd`, `space`, `mark`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" | "n" => Some(Self::None),
            "even" | "e" => Some(Self::Even),
            "odd" | "o" => Some(Self::Odd),
            "space" | "s" => Some(Self::Space),
            "mark" | "m" => Some(Self::Mark),
            _ => None,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 1.5 stop bits.
    OnePointFive,
    /// 2 stop bits.
    Two,
}

impl StopBits {
    /// Parse the textual form (`1`, `1.5`, `2`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "1" => Some(Self::One),
            "1.5" => Some(Self::OnePointFive),
            "2" => Some(Self::Two),
            _ => None,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// Software flow control (XON/XOFF).
    Software,
    /// Hardware flow control (RTS/CTS).
    Hardware,
    /// Both software and hardware flow control.
    SoftwareHardware,
}

impl FlowControl {
    /// Parse a flow-control name (`none`, `soft`, `hard`, `soft+hard`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "soft" | "software" | "xon/xoff" => Some(Self::Software),
            "hard" | "hardware" | "rts/cts" => Some(Self::Hardware),
            "soft+hard" | "both" => Some(Self::SoftwareHardware),
            _ => None,
        }
    }
}

/// A duplex byte channel to the phone.
///
/// Implementations must keep the last successfully negotiated
/// [`SerialConfig`] so that [`Channel::reopen`] can reconnect without the
/// caller supplying parameters again.
pub trait Channel: Read + Write + Send {
    /// Open the channel with the given parameters.
    fn open(&mut self, config: &SerialConfig) -> Result<()>;

    /// Close and open again with the last negotiated parameters.
    fn reopen(&mut self) -> Result<()>;

    /// Close the channel and release the device.
    fn close(&mut self) -> Result<()>;

    /// Whether the channel is currently open.
    fn is_open(&self) -> bool;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Number of bytes that can be read without blocking.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Block until data is available or `timeout` elapses.
    ///
    /// Returns `true` when data became available.
    fn wait_readable(&mut self, timeout: Duration) -> bool;

    /// Clear input/output buffers.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Set DTR (Data Terminal Ready) pin state.
    fn set_dtr(&mut self, level: bool) -> Result<()>;

    /// Set RTS (Request To Send) pin state.
    fn set_rts(&mut self, level: bool) -> Result<()>;

    /// Last DTR level set on this channel.
    fn dtr(&self) -> bool;

    /// Last RTS level set on this channel.
    fn rts(&self) -> bool;

    /// Read CTS (Clear To Send) pin state.
    fn cts(&mut self) -> Result<bool>;

    /// Read DSR (Data Set Ready) pin state.
    fn dsr(&mut self) -> Result<bool>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ChannelUnavailable);
        }
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

macro_rules! forward_channel {
    () => {
        fn open(&mut self, config: &SerialConfig) -> Result<()> {
            (**self).open(config)
        }

        fn reopen(&mut self) -> Result<()> {
            (**self).reopen()
        }

        fn close(&mut self) -> Result<()> {
            (**self).close()
        }

        fn is_open(&self) -> bool {
            (**self).is_open()
        }

        fn name(&self) -> &str {
            (**self).name()
        }

        fn bytes_available(&mut self) -> Result<usize> {
            (**self).bytes_available()
        }

        fn wait_readable(&mut self, timeout: Duration) -> bool {
            (**self).wait_readable(timeout)
        }

        fn clear_buffers(&mut self) -> Result<()> {
            (**self).clear_buffers()
        }

        fn set_dtr(&mut self, level: bool) -> Result<()> {
            (**self).set_dtr(level)
        }

        fn set_rts(&mut self, level: bool) -> Result<()> {
            (**self).set_rts(level)
        }

        fn dtr(&self) -> bool {
            (**self).dtr()
        }

        fn rts(&self) -> bool {
            (**self).rts()
        }

        fn cts(&mut self) -> Result<bool> {
            (**self).cts()
        }

        fn dsr(&mut self) -> Result<bool> {
            (**self).dsr()
        }
    };
}

impl<C: Channel + ?Sized> Channel for &mut C {
    forward_channel!();
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    forward_channel!();
}

/// Check that a device path exists before trying to claim it.
///
/// Windows-style names (`COM3`) are not filesystem paths and are passed
/// through to the driver.
pub fn check_device_path(port_name: &str) -> Result<()> {
    if port_name.is_empty() {
        return Err(Error::InvalidParameter("empty port name".into()));
    }
    let windows_style = port_name
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("COM"));
    if !windows_style && !std::path::Path::new(port_name).exists() {
        return Err(Error::PortNotFound(port_name.to_string()));
    }
    Ok(())
}

pub use fake::FakePhone;
#[cfg(feature = "native")]
pub use native::NativePort;
