//! Command/response exchange over a [`Channel`].
//!
//! The firmware does not frame its replies. A reply is considered complete
//! when the accumulated text, trimmed, starts or ends with `OK` or `ERROR`,
//! contains `NO CARRIER`, or contains one of the caller's extra terminators.
//! A body that itself contains `OK` at the right place ends the wait early;
//! real firmware relies on this exact rule, so it is kept as is.

use crate::error::{Error, Result};
use crate::port::Channel;
use crate::protocol::commands::{ERROR, NO_CARRIER, OK};
use log::{debug, trace, warn};
use std::thread;
use std::time::Duration;

/// Attempts made by [`Exchange::try_command`] before giving up.
pub const MAX_TRIALS: u32 = 3;

/// Pause before every command so the firmware can settle.
pub const SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Longest wait for the readiness signal in one poll cycle.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Exchange timing and retry options.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Pause before every command.
    pub settle_delay: Duration,
    /// Longest wait for data in one poll cycle.
    pub poll_timeout: Duration,
    /// Attempts per command (and per upload) before giving up.
    pub max_trials: u32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            poll_timeout: POLL_TIMEOUT,
            max_trials: MAX_TRIALS,
        }
    }
}

/// Whether `text` is a complete reply under the terminator heuristic.
pub fn is_complete(text: &str, extra_terminators: &[&str]) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with(OK)
        || trimmed.ends_with(OK)
        || trimmed.starts_with(ERROR)
        || trimmed.ends_with(ERROR)
        || trimmed.contains(NO_CARRIER)
        || extra_terminators
            .iter()
            .any(|t| !t.is_empty() && trimmed.contains(t))
}

fn is_blank(reply: &[u8]) -> bool {
    reply.trim_ascii().is_empty()
}

/// Render bytes for trace logs.
pub(crate) fn printable(bytes: &[u8]) -> String {
    const LIMIT: usize = 160;
    let text = String::from_utf8_lossy(&bytes[..bytes.len().min(LIMIT)])
        .escape_debug()
        .to_string();
    if bytes.len() > LIMIT {
        format!("{text}... ({} bytes)", bytes.len())
    } else {
        text
    }
}

/// Request/response driver for one channel.
pub struct Exchange<C: Channel> {
    channel: C,
    config: ExchangeConfig,
}

impl<C: Channel> Exchange<C> {
    /// Create an exchange with default timings.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            config: ExchangeConfig::default(),
        }
    }

    /// Create an exchange with custom timings.
    pub fn with_config(channel: C, config: ExchangeConfig) -> Self {
        Self { channel, config }
    }

    /// Get the timing and retry options.
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Get a reference to the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Get a mutable reference to the underlying channel.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Consume the exchange and return the channel.
    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Write raw bytes to the channel.
    ///
    /// A failed write is reported as [`Error::ChannelUnavailable`].
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.channel.is_open() {
            return Err(Error::ChannelUnavailable);
        }
        trace!(">>> {}", printable(bytes));
        self.channel.write_all_bytes(bytes).map_err(|e| match e {
            Error::Io(e) => {
                warn!("Write to {} failed: {e}", self.channel.name());
                Error::ChannelUnavailable
            },
            other => other,
        })
    }

    /// Collect reply bytes until the terminator heuristic fires.
    ///
    /// Waits up to the poll timeout whenever nothing is buffered; a poll
    /// window without new data ends the reply. Returns an empty buffer if
    /// the channel is unavailable or fails; the failure is logged.
    pub fn receive(&mut self, extra_terminators: &[&str]) -> Vec<u8> {
        let mut collected = Vec::new();

        loop {
            if !self.channel.is_open() {
                warn!("Channel {} is not available", self.channel.name());
                return Vec::new();
            }
            if crate::is_interrupted_requested() {
                debug!("Receive interrupted");
                break;
            }

            let available = match self.channel.bytes_available() {
                Ok(n) => n,
                Err(e) => {
                    warn!("Cannot query {}: {e}", self.channel.name());
                    return Vec::new();
                },
            };

            if available == 0 {
                if self
                    .channel
                    .wait_readable(self.config.poll_timeout)
                {
                    continue;
                }
                trace!(
                    "No data within {:?} ({} bytes so far)",
                    self.config.poll_timeout,
                    collected.len()
                );
                break;
            }

            let mut chunk = vec![0u8; available];
            match self.channel.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    collected.extend_from_slice(&chunk[..n]);
                    if is_complete(&String::from_utf8_lossy(&collected), extra_terminators) {
                        break;
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {},
                Err(e) => {
                    warn!("Read error on {}: {e}", self.channel.name());
                    return Vec::new();
                },
            }
        }

        if !collected.is_empty() {
            trace!("<<< {}", printable(&collected));
        }
        collected
    }

    /// Poll [`Exchange::receive`] until something arrives, at most
    /// `max_trials` poll windows.
    pub fn await_reply(&mut self, extra_terminators: &[&str]) -> Vec<u8> {
        for _ in 0..self.config.max_trials {
            let reply = self.receive(extra_terminators);
            if !is_blank(&reply) || !self.channel.is_open() {
                return reply;
            }
        }
        Vec::new()
    }

    /// Send a command and return its reply as text, retrying on silence.
    ///
    /// See [`Exchange::try_command_bytes`].
    pub fn try_command(&mut self, cmd: &str, extra_terminators: &[&str]) -> String {
        let reply = self.try_command_bytes(cmd.as_bytes(), extra_terminators);
        String::from_utf8_lossy(&reply).into_owned()
    }

    /// Send a command and return its raw reply, retrying on silence.
    ///
    /// Each attempt waits the settle delay, sends and receives. An empty
    /// reply reopens the channel (same parameters) and tries again, up to
    /// `max_trials` attempts. The last reply is returned even when empty;
    /// callers treat emptiness as failure.
    pub fn try_command_bytes(&mut self, cmd: &[u8], extra_terminators: &[&str]) -> Vec<u8> {
        let max = self.config.max_trials;
        let mut reply = Vec::new();

        for attempt in 1..=max {
            if crate::is_interrupted_requested() {
                debug!("Command {} interrupted", printable(cmd));
                break;
            }

            thread::sleep(self.config.settle_delay);
            reply = match self.send(cmd) {
                Ok(()) => self.receive(extra_terminators),
                Err(e) => {
                    warn!("Cannot send {}: {e}", printable(cmd));
                    Vec::new()
                },
            };

            if !is_blank(&reply) {
                return reply;
            }

            warn!(
                "No reply to {} (attempt {attempt}/{max}), reconnecting",
                printable(cmd)
            );
            self.reconnect();
        }

        reply
    }

    /// Reopen the channel with its last parameters, logging failures.
    pub fn reconnect(&mut self) {
        if let Err(e) = self.channel.reopen() {
            warn!("Reconnect to {} failed: {e}", self.channel.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{FakePhone, SerialConfig};

    fn fast() -> ExchangeConfig {
        ExchangeConfig {
            settle_delay: Duration::ZERO,
            poll_timeout: Duration::from_millis(20),
            max_trials: MAX_TRIALS,
        }
    }

    fn open_fake() -> FakePhone {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut phone = FakePhone::new();
        phone
            .open(&SerialConfig::new("fake", 115200))
            .unwrap();
        phone
    }

    #[test]
    fn test_terminator_heuristic() {
        assert!(is_complete("\r\nOK\r\n", &[]));
        assert!(is_complete("OK then more", &[]));
        assert!(is_complete("+CME ERROR", &[]));
        assert!(is_complete("CONNECT\r\nxyz\r\nNO CARRIER tail", &[]));
        assert!(is_complete("\r\nCONNECT\r\n", &["CONNECT"]));
        assert!(!is_complete("\r\nCONNECT\r\n", &[]));
        assert!(!is_complete("+CSQ: 20,99", &[""]));
        // Body text that happens to end with OK ends the wait early.
        assert!(is_complete("+CMGR: \"REC READ\"\r\nlooks OK", &[]));
    }

    #[test]
    fn test_try_command_single_attempt_on_answer() {
        let mut exchange = Exchange::with_config(open_fake(), fast());
        let reply = exchange.try_command("AT\r", &[]);
        assert_eq!(reply.trim(), "OK");
        assert_eq!(exchange.channel().stats().commands, 1);
        assert_eq!(exchange.channel().stats().reopens, 0);
    }

    #[test]
    fn test_try_command_retries_with_one_reopen_per_failure() {
        let mut phone = open_fake();
        phone.stay_silent_for(2);
        let mut exchange = Exchange::with_config(phone, fast());
        let reply = exchange.try_command("AT\r", &[]);
        assert_eq!(reply.trim(), "OK");
        assert_eq!(exchange.channel().stats().commands, 3);
        assert_eq!(exchange.channel().stats().reopens, 2);
    }

    #[test]
    fn test_try_command_gives_up_after_max_trials() {
        let mut phone = open_fake();
        phone.stay_silent_for(10);
        let mut exchange = Exchange::with_config(phone, fast());
        let reply = exchange.try_command("AT\r", &[]);
        assert!(reply.trim().is_empty());
        assert_eq!(exchange.channel().stats().commands, MAX_TRIALS as usize);
        assert_eq!(exchange.channel().stats().reopens, MAX_TRIALS as usize);
    }

    #[test]
    fn test_send_on_closed_channel_fails() {
        let mut exchange = Exchange::with_config(FakePhone::new(), fast());
        assert!(matches!(exchange.send(b"AT\r"), Err(Error::ChannelUnavailable)));
        assert!(exchange.receive(&[]).is_empty());
    }

    #[test]
    fn test_write_failure_is_channel_error() {
        let mut phone = open_fake();
        phone.break_line(true);
        let mut exchange = Exchange::with_config(phone, fast());
        let err = exchange.send(b"AT\r").unwrap_err();
        assert!(matches!(err, Error::ChannelUnavailable));
        assert_eq!(err.code(), crate::error::codes::NO_RESPONSE);
    }

    #[test]
    fn test_receive_returns_partial_data_after_quiet_window() {
        let mut phone = open_fake();
        phone.reply_to("AT+XPARTIAL", "\r\n+XPARTIAL: 1\r\n");
        let mut exchange = Exchange::with_config(phone, fast());
        exchange.send(b"AT+XPARTIAL\r").unwrap();
        let reply = exchange.receive(&[]);
        assert_eq!(String::from_utf8_lossy(&reply).trim(), "+XPARTIAL: 1");
    }

    #[test]
    fn test_extra_terminator_ends_receive() {
        let mut phone = open_fake();
        phone.reply_to("AT+XWAIT", "\r\n> ");
        let mut exchange = Exchange::with_config(phone, fast());
        let reply = exchange.try_command("AT+XWAIT\r", &[">"]);
        assert_eq!(reply.trim(), ">");
    }
}
