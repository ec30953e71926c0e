//! High-level phone operations.
//!
//! [`Phone`] wraps one [`Exchange`] and expresses every supported operation
//! as a short command sequence plus a reply parser. It assumes the channel
//! is already open; opening, closing and locking are the job of
//! [`crate::transfer`].
//!
//! ## Example
//!
//! ```rust
//! use atlink::port::{Channel, FakePhone, SerialConfig};
//! use atlink::model::Category;
//! use atlink::Phone;
//!
//! fn main() -> atlink::Result<()> {
//!     let mut channel = FakePhone::new();
//!     channel.open(&SerialConfig::new("fake", 115200))?;
//!
//!     let mut phone = Phone::new(channel);
//!     phone.test()?;
//!     for element in phone.get_list(Category::Pictures)? {
//!         println!("{element}");
//!     }
//!     Ok(())
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Alarm, Category, DeviceInfo, Element, Message, PinStatus};
use crate::port::Channel;
use crate::protocol::commands::{self, ERROR};
use crate::protocol::download::{self, Download};
use crate::protocol::exchange::{Exchange, ExchangeConfig};
use crate::protocol::reply;
use crate::protocol::upload;

/// Prompt the phone shows before an SMS body.
const SMS_PROMPT: &str = ">";

/// Operations on a connected phone.
pub struct Phone<C: Channel> {
    exchange: Exchange<C>,
}

impl<C: Channel> Phone<C> {
    /// Create a phone over an open channel with default timings.
    pub fn new(channel: C) -> Self {
        Self {
            exchange: Exchange::new(channel),
        }
    }

    /// Create a phone with custom timings.
    pub fn with_config(channel: C, config: ExchangeConfig) -> Self {
        Self {
            exchange: Exchange::with_config(channel, config),
        }
    }

    /// Get a reference to the underlying exchange.
    pub fn exchange(&self) -> &Exchange<C> {
        &self.exchange
    }

    /// Get a mutable reference to the underlying exchange.
    pub fn exchange_mut(&mut self) -> &mut Exchange<C> {
        &mut self.exchange
    }

    /// Consume the phone and return the channel.
    pub fn into_channel(self) -> C {
        self.exchange.into_channel()
    }

    /// Send a command until `accept` takes the reply.
    ///
    /// Silence is already retried by [`Exchange::try_command`]. A reply that
    /// `accept` refuses (an `ERROR`, a missing token) reopens the channel and
    /// sends again, up to `max_trials` attempts; the last refusal is returned.
    fn checked<T>(&mut self, cmd: &str, accept: impl Fn(&str) -> Result<T>) -> Result<T> {
        let max = self.exchange.config().max_trials.max(1);
        let mut attempt = 1;
        loop {
            let reply = self.exchange.try_command(cmd, &[]);
            match accept(&reply) {
                Ok(value) => return Ok(value),
                Err(Error::NoResponse) => return Err(Error::NoResponse),
                Err(e) if attempt >= max || crate::is_interrupted_requested() => return Err(e),
                Err(e) => {
                    warn!(
                        "{} refused: {e} (attempt {attempt}/{max}), reconnecting",
                        cmd.trim()
                    );
                    self.exchange.reconnect();
                    attempt += 1;
                },
            }
        }
    }

    /// Send a command and return a non-empty, non-`ERROR` reply.
    fn query(&mut self, cmd: &str) -> Result<String> {
        self.checked(cmd, |reply| accept_reply(reply).map(str::to_string))
    }

    /// Send a command that must be answered with `OK`.
    fn command(&mut self, cmd: &str) -> Result<()> {
        self.checked(cmd, reply::expect_ok)
    }

    /// Check that the phone answers `AT`.
    pub fn test(&mut self) -> Result<()> {
        self.command(commands::TEST)?;
        info!("Phone on {} is responding", self.exchange.channel().name());
        Ok(())
    }

    /// Identification and status of the phone.
    ///
    /// Fields the phone does not report stay `None`. Fails only when the
    /// phone answers none of the queries.
    pub fn info(&mut self) -> Result<DeviceInfo> {
        let mut answered = false;
        let mut ask = |phone: &mut Self, cmd: &str| {
            let reply = phone.exchange.try_command(cmd, &[]);
            if reply.trim().is_empty() {
                warn!("No reply to {}", cmd.trim());
            } else {
                answered = true;
            }
            reply
        };

        let firmware = reply::parse_firmware(&ask(self, commands::FIRMWARE_VERSION));
        let imei = reply::parse_imei(&ask(self, commands::IMEI), commands::IMEI);
        let device_type = reply::parse_device_type(&ask(self, commands::DEVICE_TYPE));
        let subscriber_numbers =
            reply::parse_subscriber_numbers(&ask(self, commands::SUBSCRIBER_NUMBERS));
        let signal = reply::parse_signal(&ask(self, commands::SIGNAL_QUALITY));
        let pin = reply::parse_pin_status(&ask(self, commands::PIN_STATUS));

        if !answered {
            return Err(Error::NoResponse);
        }
        Ok(DeviceInfo {
            firmware,
            imei,
            device_type,
            subscriber_numbers,
            signal,
            pin,
        })
    }

    /// Visible objects of one category.
    pub fn get_list(&mut self, category: Category) -> Result<Vec<Element>> {
        let reply = self.query(&commands::list(category))?;
        let elements = reply::parse_element_list(&reply);
        debug!("{category}: {} elements", elements.len());
        Ok(elements)
    }

    /// Upload a local file; the extension selects the phone-side type.
    pub fn upload_file<F>(&mut self, path: &Path, progress: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidParameter(path.display().to_string()))?;
        upload::destination(file_name)?;
        let data = fs::read(path)?;
        self.upload_bytes(file_name, &data, progress)
    }

    /// Upload bytes under the given file name.
    pub fn upload_bytes<F>(&mut self, file_name: &str, data: &[u8], progress: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        upload::upload(&mut self.exchange, file_name, data, progress)
    }

    /// Retrieve an object by id.
    pub fn download(&mut self, id: &str) -> Result<Download> {
        download::retrieve(&mut self.exchange, id)
    }

    /// Retrieve an object and write it into `dir`.
    ///
    /// Returns the path written.
    pub fn download_file(&mut self, element: &Element, dir: &Path) -> Result<PathBuf> {
        let download = self.download(element.id())?;
        let path = dir.join(download::file_name(element, download.kind));
        fs::write(&path, &download.data)?;
        info!("Saved {} ({} bytes)", path.display(), download.data.len());
        Ok(path)
    }

    /// Delete an object by id.
    pub fn delete_file(&mut self, id: &str) -> Result<()> {
        self.command(&commands::delete(id))
    }

    /// Alarm slots.
    pub fn get_alarms(&mut self) -> Result<Vec<Alarm>> {
        let reply = self.query(commands::LIST_ALARMS)?;
        Ok(reply::parse_alarms(&reply))
    }

    /// Store an alarm in its slot.
    pub fn add_alarm(&mut self, alarm: &Alarm) -> Result<()> {
        self.command(&commands::set_alarm(alarm))
    }

    /// Clear an alarm slot.
    pub fn delete_alarm(&mut self, number: u32) -> Result<()> {
        self.command(&commands::delete_alarm(number))
    }

    /// Every stored SMS.
    pub fn get_messages(&mut self) -> Result<Vec<Message>> {
        self.command(commands::SMS_TEXT_MODE)?;
        let reply = self.query(commands::LIST_MESSAGES)?;
        Ok(reply::parse_message_list(&reply))
    }

    /// One stored SMS, if the index is in use.
    pub fn read_message(&mut self, id: &str) -> Result<Option<Message>> {
        self.command(commands::SMS_TEXT_MODE)?;
        let reply = self.query(&commands::read_message(id))?;
        Ok(reply::parse_message(&reply))
    }

    /// Send an SMS.
    ///
    /// The body is written once after the `>` prompt; it is not resent on
    /// silence.
    pub fn send_message(&mut self, message: &Message) -> Result<()> {
        let number = message
            .recipient_number()
            .filter(|n| commands::is_dialable(n))
            .ok_or_else(|| Error::InvalidParameter("recipient number".into()))?;

        self.command(commands::SMS_TEXT_MODE)?;
        let prompt = self
            .exchange
            .try_command(&commands::send_message(number), &[SMS_PROMPT]);
        if !prompt.contains(SMS_PROMPT) {
            return Err(Error::from_reply(&prompt));
        }

        self.exchange.send(message.message_string().as_bytes())?;
        let reply = String::from_utf8_lossy(&self.exchange.await_reply(&[])).into_owned();
        reply::expect_ok(&reply)?;
        info!("Message to {number} sent");
        Ok(())
    }

    /// Delete a stored SMS.
    pub fn delete_message(&mut self, id: &str) -> Result<()> {
        self.command(&commands::delete_message(id))
    }

    /// Start a voice call.
    pub fn dial(&mut self, number: &str) -> Result<()> {
        if !commands::is_dialable(number) {
            return Err(Error::InvalidParameter(format!("number {number:?}")));
        }
        self.command(&commands::dial(number))
    }

    /// End the current call.
    pub fn hangup(&mut self) -> Result<()> {
        self.command(commands::HANGUP)
    }

    /// Answer an incoming call.
    pub fn answer(&mut self) -> Result<()> {
        self.command(commands::ANSWER)
    }

    /// Ringer volume.
    pub fn get_volume(&mut self) -> Result<u8> {
        self.checked(commands::GET_VOLUME, |reply| {
            reply::parse_volume(accept_reply(reply)?)
                .ok_or_else(|| Error::UnexpectedReply(reply.trim().to_string()))
        })
    }

    /// Set the ringer volume.
    pub fn set_volume(&mut self, level: u8) -> Result<()> {
        self.command(&commands::set_volume(level))
    }

    /// SIM lock state.
    pub fn pin_status(&mut self) -> Result<PinStatus> {
        self.checked(commands::PIN_STATUS, |reply| {
            reply::parse_pin_status(accept_reply(reply)?)
                .ok_or_else(|| Error::UnexpectedReply(reply.trim().to_string()))
        })
    }

    /// Enter a PIN or PUK.
    ///
    /// Sent once: a refused PIN is not retried, each try counts against the
    /// SIM's attempt limit.
    pub fn enter_pin(&mut self, pin: &str) -> Result<()> {
        if !(4..=8).contains(&pin.len()) || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidParameter("PIN must be 4 to 8 digits".into()));
        }
        let reply = self.exchange.try_command(&commands::enter_pin(pin), &[]);
        reply::expect_ok(&reply)
    }

    /// Send one raw command line and return the reply.
    pub fn run_command(&mut self, line: &str) -> Result<String> {
        let reply = self.exchange.try_command(&commands::raw(line), &[]);
        if reply.trim().is_empty() {
            return Err(Error::NoResponse);
        }
        Ok(reply)
    }

    /// Run every command line of a text file.
    ///
    /// Blank lines and lines starting with `#` are skipped. Stops at the
    /// first command that gets no reply. Returns `(command, reply)` pairs.
    pub fn run_command_file(&mut self, path: &Path) -> Result<Vec<(String, String)>> {
        let script = fs::read_to_string(path)?;
        let mut transcript = Vec::new();
        for line in script.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if crate::is_interrupted_requested() {
                return Err(Error::Interrupted);
            }
            let reply = self.run_command(line)?;
            transcript.push((line.to_string(), reply.trim().to_string()));
        }
        Ok(transcript)
    }
}

/// A non-empty reply without `ERROR`.
fn accept_reply(reply: &str) -> Result<&str> {
    if reply.trim().is_empty() {
        return Err(Error::NoResponse);
    }
    if reply.contains(ERROR) {
        return Err(Error::Rejected(reply.trim().to_string()));
    }
    Ok(reply)
}
