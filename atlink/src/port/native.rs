//! Native serial port implementation using the `serialport` crate.
//!
//! This module provides the channel implementation for native platforms
//! (Linux, macOS, Windows, FreeBSD, etc.).

use {
    crate::{
        error::{Error, Result},
        port::{
            Channel, DataBits, FlowControl, Parity, SerialConfig, StopBits, check_device_path,
        },
    },
    log::{debug, trace},
    serialport::ClearBuffer,
    std::{
        io::{Read, Write},
        thread,
        time::{Duration, Instant},
    },
};

/// Interval between `bytes_to_read` probes while waiting for data.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Native serial port channel.
///
/// Created closed; [`Channel::open`] claims the device.
pub struct NativePort {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
    config: Option<SerialConfig>,
    dtr: bool,
    rts: bool,
}

impl NativePort {
    /// Create a closed channel for the given device path.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port: None,
            name: port_name.into(),
            config: None,
            dtr: false,
            rts: false,
        }
    }

    /// Create and open a channel with the given configuration.
    pub fn open_with(config: &SerialConfig) -> Result<Self> {
        let mut port = Self::new(config.port_name.clone());
        port.open(config)?;
        Ok(port)
    }

    fn claim(config: &SerialConfig) -> Result<Box<dyn serialport::SerialPort>> {
        check_device_path(&config.port_name)?;

        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(config.data_bits.into())
            .parity(config.parity.try_into()?)
            .stop_bits(config.stop_bits.try_into()?)
            .flow_control(config.flow_control.try_into()?)
            .open()?;
        Ok(port)
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or(Error::ChannelUnavailable)
    }
}

impl Channel for NativePort {
    fn open(&mut self, config: &SerialConfig) -> Result<()> {
        self.port.take();
        debug!(
            "Opening {} at {} baud ({:?}, {:?}, {:?}, {:?})",
            config.port_name,
            config.baud_rate,
            config.data_bits,
            config.parity,
            config.stop_bits,
            config.flow_control
        );
        let port = Self::claim(config)?;
        self.port = Some(port);
        self.name.clone_from(&config.port_name);
        self.config = Some(config.clone());
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        let config = self
            .config
            .clone()
            .ok_or(Error::ChannelUnavailable)?;
        debug!("Reopening {} with previous parameters", config.port_name);
        self.port.take();
        self.port = Some(Self::claim(&config)?);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle releases the device
        self.port.take();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_available(&mut self) -> Result<usize> {
        let n = self.port_mut()?.bytes_to_read()?;
        Ok(usize::try_from(n).unwrap_or(usize::MAX))
    }

    fn wait_readable(&mut self, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            match self.bytes_available() {
                Ok(n) if n > 0 => return true,
                Ok(_) => {},
                Err(_) => return false,
            }
            if crate::is_interrupted_requested() {
                return false;
            }
            thread::sleep(READY_POLL_INTERVAL);
        }
        false
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.port_mut()?.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        trace!("Setting DTR to {level}");
        self.port_mut()?.write_data_terminal_ready(level)?;
        self.dtr = level;
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> Result<()> {
        trace!("Setting RTS to {level}");
        self.port_mut()?.write_request_to_send(level)?;
        self.rts = level;
        Ok(())
    }

    fn dtr(&self) -> bool {
        self.dtr
    }

    fn rts(&self) -> bool {
        self.rts
    }

    fn cts(&mut self) -> Result<bool> {
        Ok(self.port_mut()?.read_clear_to_send()?)
    }

    fn dsr(&mut self) -> Result<bool> {
        Ok(self.port_mut()?.read_data_set_ready()?)
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(|p| p.read(buf))
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(|p| p.write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(std::io::Write::flush)
    }
}

// Type conversions from our types to serialport types

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => Self::Five,
            DataBits::Six => Self::Six,
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

impl TryFrom<Parity> for serialport::Parity {
    type Error = Error;

    fn try_from(parity: Parity) -> Result<Self> {
        match parity {
            Parity::None => Ok(Self::None),
            Parity::Odd => Ok(Self::Odd),
            Parity::Even => Ok(Self::Even),
            Parity::Space | Parity::Mark => Err(Error::Unsupported(format!(
                "{parity:?} parity is not available on this platform"
            ))),
        }
    }
}

impl TryFrom<StopBits> for serialport::StopBits {
    type Error = Error;

    fn try_from(bits: StopBits) -> Result<Self> {
        match bits {
            StopBits::One => Ok(Self::One),
            StopBits::Two => Ok(Self::Two),
            StopBits::OnePointFive => Err(Error::Unsupported(
                "1.5 stop bits are not available on this platform".into(),
            )),
        }
    }
}

impl TryFrom<FlowControl> for serialport::FlowControl {
    type Error = Error;

    fn try_from(flow: FlowControl) -> Result<Self> {
        match flow {
            FlowControl::None => Ok(Self::None),
            FlowControl::Hardware => Ok(Self::Hardware),
            FlowControl::Software => Ok(Self::Software),
            FlowControl::SoftwareHardware => Err(Error::Unsupported(
                "combined software and hardware flow control".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_port_is_closed() {
        let mut port = NativePort::new("/dev/ttyACM9");
        assert!(!port.is_open());
        assert_eq!(port.name(), "/dev/ttyACM9");
        assert!(matches!(port.bytes_available(), Err(Error::ChannelUnavailable)));
        assert!(matches!(port.reopen(), Err(Error::ChannelUnavailable)));
    }

    #[test]
    fn test_open_missing_device_fails() {
        let config = SerialConfig::new("/dev/atlink-missing-device", 115200);
        let mut port = NativePort::new("/dev/atlink-missing-device");
        assert!(matches!(port.open(&config), Err(Error::PortNotFound(_))));
        assert!(!port.is_open());
    }

    #[test]
    fn test_unsupported_settings_rejected() {
        assert!(serialport::Parity::try_from(Parity::Mark).is_err());
        assert!(serialport::StopBits::try_from(StopBits::OnePointFive).is_err());
        assert!(serialport::FlowControl::try_from(FlowControl::SoftwareHardware).is_err());
        assert!(matches!(
            serialport::Parity::try_from(Parity::Even),
            Ok(serialport::Parity::Even)
        ));
    }
}
