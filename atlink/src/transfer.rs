//! Transfer orchestrator.
//!
//! One call = lock the device, open the channel, run one [`Request`] on a
//! [`Phone`], close the channel, map the result into an [`Outcome`].
//!
//! ```text
//! Transfer::run ──> DeviceLock ──> Channel::open ──> Phone::<op> ──> Channel::close
//!                                                         │
//!                                                         v
//!                                              Outcome { code, response }
//! ```
//!
//! Every operation on one device serializes on the [`DeviceLock`] carried
//! by the [`ConnectionParams`]; concurrent calls queue on it.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::error::{Error, Result, codes};
use crate::model::{Alarm, Category, DeviceInfo, Element, Message, PinStatus};
use crate::phone::Phone;
use crate::port::{Channel, DataBits, FlowControl, Parity, SerialConfig, StopBits};
use crate::protocol::exchange::ExchangeConfig;

/// Mutual-exclusion token shared by every caller driving the same device.
pub type DeviceLock = Arc<Mutex<()>>;

/// Create a fresh device lock.
pub fn new_lock() -> DeviceLock {
    Arc::new(Mutex::new(()))
}

/// Connection parameters for one device.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Port name/path.
    pub port: String,
    /// Baud rate.
    pub speed: u32,
    /// Data bits.
    pub data_bits: DataBits,
    /// Stop bits.
    pub stop_bits: StopBits,
    /// Parity.
    pub parity: Parity,
    /// Flow control.
    pub flow_control: FlowControl,
    /// Device lock held while the channel is driven.
    pub lock: DeviceLock,
}

impl ConnectionParams {
    /// Parameters with 8N1 framing, no flow control and a fresh lock.
    pub fn new(port: impl Into<String>, speed: u32) -> Self {
        Self {
            port: port.into(),
            speed,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            lock: new_lock(),
        }
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

    /// Share an existing device lock.
    #[must_use]
    pub fn with_lock(mut self, lock: DeviceLock) -> Self {
        self.lock = lock;
        self
    }

    /// Check the parameters without touching the device.
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(Error::InvalidParameter("port is empty".into()));
        }
        if self.speed == 0 {
            return Err(Error::InvalidParameter("speed must be positive".into()));
        }
        Ok(())
    }

    /// Serial configuration for [`Channel::open`].
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig::new(self.port.clone(), self.speed)
            .with_framing(self.data_bits, self.parity, self.stop_bits)
            .with_flow_control(self.flow_control)
    }
}

/// Operation families, each with its own error-message table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Liveness check.
    Test,
    /// Identification.
    Info,
    /// Object listing.
    List,
    /// Object upload.
    Upload,
    /// Object download.
    Download,
    /// Object deletion.
    Delete,
    /// Dial, hang up, answer.
    Call,
    /// Ringer volume.
    Volume,
    /// Alarm slots.
    Alarm,
    /// SMS.
    Message,
    /// SIM PIN.
    Pin,
    /// Raw command file.
    CommandFile,
}

impl Operation {
    /// English message for a result code of this operation.
    pub fn msg_for_error(self, code: i32) -> &'static str {
        match (self, code) {
            (_, codes::OK) => "Success",
            (_, codes::NO_RESPONSE) => "The phone does not respond",
            (Self::Pin, codes::REJECTED) => "The phone rejected the PIN",
            (Self::Delete, codes::REJECTED) => "No such object on the phone",
            (_, codes::REJECTED) => "The phone rejected the command",
            (_, codes::UNEXPECTED_REPLY) => "Unexpected reply from the phone",
            (Self::Upload, codes::UNSUPPORTED_TYPE) => "Unsupported file type",
            (Self::Download, codes::UNKNOWN_CONTENT) => "Unrecognized file content",
            (Self::Download, codes::MISSING_TERMINATOR) => "Transfer ended without NO CARRIER",
            (Self::Upload, codes::FILE_IO) => "Cannot read the file to upload",
            (Self::Download, codes::FILE_IO) => "Cannot write the downloaded file",
            (Self::CommandFile, codes::FILE_IO) => "Cannot read the command file",
            (_, codes::FILE_IO) => "Local file error",
            (_, codes::OPEN_FAILED) => "Cannot open the serial port",
            (_, codes::INVALID_PARAMETER) => "Invalid connection parameter or argument",
            (_, codes::INTERRUPTED) => "Interrupted",
            (Self::Upload, codes::UPLOAD_RESET) => "The phone did not reset the object transfer",
            (Self::Upload, codes::UPLOAD_INIT) => "The phone refused to start the object transfer",
            (Self::Upload, codes::UPLOAD_LENGTH) => "The phone refused the file name length",
            (Self::Upload, codes::UPLOAD_NAME) => "The phone refused the file name",
            (Self::Upload, codes::UPLOAD_TYPE_SIZE) => "The phone refused the file type or size",
            (Self::Upload, codes::UPLOAD_PAYLOAD) => "The phone did not accept the file data",
            (Self::Upload, codes::UPLOAD_CLOSE) => "The phone did not store the file",
            _ => "Unknown error",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Test => "test",
            Self::Info => "info",
            Self::List => "list",
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Delete => "delete",
            Self::Call => "call",
            Self::Volume => "volume",
            Self::Alarm => "alarm",
            Self::Message => "message",
            Self::Pin => "pin",
            Self::CommandFile => "command file",
        };
        f.write_str(name)
    }
}

/// One operation to run on the phone.
#[derive(Debug, Clone)]
pub enum Request {
    /// Check that the phone answers.
    Test,
    /// Read identification and status.
    Info,
    /// List the objects of a category.
    List(Category),
    /// Upload a local file.
    Upload(PathBuf),
    /// Download an object into a directory.
    Download {
        /// Object to fetch.
        element: Element,
        /// Destination directory.
        dir: PathBuf,
    },
    /// Delete an object by id.
    Delete(String),
    /// Dial a number.
    Dial(String),
    /// Hang up.
    Hangup,
    /// Answer an incoming call.
    Answer,
    /// Read the ringer volume.
    GetVolume,
    /// Set the ringer volume.
    SetVolume(u8),
    /// Read alarm slots.
    GetAlarms,
    /// Store an alarm.
    AddAlarm(Alarm),
    /// Clear an alarm slot.
    DeleteAlarm(u32),
    /// Read every SMS.
    GetMessages,
    /// Send an SMS.
    SendMessage(Message),
    /// Delete an SMS.
    DeleteMessage(String),
    /// Read the SIM lock state.
    PinStatus,
    /// Enter a PIN or PUK.
    EnterPin(String),
    /// Run a file of raw command lines.
    RunCommandFile(PathBuf),
}

impl Request {
    /// Family used for error messages.
    pub fn operation(&self) -> Operation {
        match self {
            Self::Test => Operation::Test,
            Self::Info => Operation::Info,
            Self::List(_) => Operation::List,
            Self::Upload(_) => Operation::Upload,
            Self::Download { .. } => Operation::Download,
            Self::Delete(_) => Operation::Delete,
            Self::Dial(_) | Self::Hangup | Self::Answer => Operation::Call,
            Self::GetVolume | Self::SetVolume(_) => Operation::Volume,
            Self::GetAlarms | Self::AddAlarm(_) | Self::DeleteAlarm(_) => Operation::Alarm,
            Self::GetMessages | Self::SendMessage(_) | Self::DeleteMessage(_) => Operation::Message,
            Self::PinStatus | Self::EnterPin(_) => Operation::Pin,
            Self::RunCommandFile(_) => Operation::CommandFile,
        }
    }
}

/// Records produced by a successful request.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case", tag = "kind", content = "value"))]
pub enum Response {
    /// Nothing to report.
    Done,
    /// Identification and status.
    Info(DeviceInfo),
    /// Object listing.
    Elements(Vec<Element>),
    /// Path of a downloaded file.
    Saved(PathBuf),
    /// Ringer volume.
    Volume(u8),
    /// Alarm slots.
    Alarms(Vec<Alarm>),
    /// SMS records.
    Messages(Vec<Message>),
    /// SIM lock state.
    Pin(PinStatus),
    /// `(command, reply)` pairs of a command file.
    Transcript(Vec<(String, String)>),
}

/// Result of one orchestrated request.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Outcome {
    /// `0` on success, otherwise a negative code.
    pub code: i32,
    /// Records on success.
    pub response: Option<Response>,
    /// Error description on failure.
    pub error: Option<String>,
}

impl Outcome {
    fn success(response: Response) -> Self {
        Self {
            code: codes::OK,
            response: Some(response),
            error: None,
        }
    }

    fn failure(code: i32, error: &Error) -> Self {
        Self {
            code,
            response: None,
            error: Some(error.to_string()),
        }
    }

    /// Whether the request succeeded.
    pub fn is_success(&self) -> bool {
        self.code == codes::OK
    }
}

/// Orchestrates requests against one device.
#[derive(Debug, Clone)]
pub struct Transfer {
    params: ConnectionParams,
    config: ExchangeConfig,
}

impl Transfer {
    /// Create an orchestrator; fails with [`Error::InvalidParameter`] when
    /// the parameters are unusable.
    pub fn new(params: ConnectionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            config: ExchangeConfig::default(),
        })
    }

    /// Override exchange timings.
    #[must_use]
    pub fn with_exchange_config(mut self, config: ExchangeConfig) -> Self {
        self.config = config;
        self
    }

    /// Connection parameters.
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Run one request on `channel`, holding the device lock throughout.
    pub fn run<C: Channel>(&self, channel: &mut C, request: Request) -> Outcome {
        self.run_with_progress(channel, request, &mut |_, _| {})
    }

    /// Like [`Transfer::run`], reporting upload progress as `(sent, total)`.
    pub fn run_with_progress<C: Channel>(
        &self,
        channel: &mut C,
        request: Request,
        progress: &mut dyn FnMut(usize, usize),
    ) -> Outcome {
        let operation = request.operation();
        let _guard = self
            .params
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        debug!("Acquired device lock for {}", self.params.port);

        if let Err(e) = channel.open(&self.params.serial_config()) {
            warn!("Cannot open {}: {e}", self.params.port);
            let code = match e {
                Error::InvalidParameter(_) => codes::INVALID_PARAMETER,
                _ => codes::OPEN_FAILED,
            };
            return Outcome::failure(code, &e);
        }

        info!("Running {operation} on {}", self.params.port);
        let result = {
            let mut phone = Phone::with_config(&mut *channel, self.config.clone());
            execute(&mut phone, request, progress)
        };

        if let Err(e) = channel.close() {
            warn!("Cannot close {}: {e}", self.params.port);
        }

        match result {
            Ok(response) => {
                info!("{operation} finished");
                Outcome::success(response)
            },
            Err(e) => {
                let code = e.code();
                warn!("{operation} failed ({code}): {e}");
                Outcome::failure(code, &e)
            },
        }
    }

    /// Run one request on its own thread and hand the outcome to `callback`.
    ///
    /// The join handle yields the channel back once the request is done.
    pub fn spawn<C, F>(self, mut channel: C, request: Request, callback: F) -> JoinHandle<C>
    where
        C: Channel + 'static,
        F: FnOnce(Outcome) + Send + 'static,
    {
        thread::spawn(move || {
            let outcome = self.run(&mut channel, request);
            callback(outcome);
            channel
        })
    }
}

fn execute<C: Channel>(
    phone: &mut Phone<C>,
    request: Request,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<Response> {
    let response = match request {
        Request::Test => {
            phone.test()?;
            Response::Done
        },
        Request::Info => Response::Info(phone.info()?),
        Request::List(category) => Response::Elements(phone.get_list(category)?),
        Request::Upload(path) => {
            phone.upload_file(&path, progress)?;
            Response::Done
        },
        Request::Download { element, dir } => Response::Saved(phone.download_file(&element, &dir)?),
        Request::Delete(id) => {
            phone.delete_file(&id)?;
            Response::Done
        },
        Request::Dial(number) => {
            phone.dial(&number)?;
            Response::Done
        },
        Request::Hangup => {
            phone.hangup()?;
            Response::Done
        },
        Request::Answer => {
            phone.answer()?;
            Response::Done
        },
        Request::GetVolume => Response::Volume(phone.get_volume()?),
        Request::SetVolume(level) => {
            phone.set_volume(level)?;
            Response::Done
        },
        Request::GetAlarms => Response::Alarms(phone.get_alarms()?),
        Request::AddAlarm(alarm) => {
            phone.add_alarm(&alarm)?;
            Response::Done
        },
        Request::DeleteAlarm(number) => {
            phone.delete_alarm(number)?;
            Response::Done
        },
        Request::GetMessages => Response::Messages(phone.get_messages()?),
        Request::SendMessage(message) => {
            phone.send_message(&message)?;
            Response::Done
        },
        Request::DeleteMessage(id) => {
            phone.delete_message(&id)?;
            Response::Done
        },
        Request::PinStatus => Response::Pin(phone.pin_status()?),
        Request::EnterPin(pin) => {
            phone.enter_pin(&pin)?;
            Response::Done
        },
        Request::RunCommandFile(path) => Response::Transcript(phone.run_command_file(&path)?),
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::FakePhone;
    use crate::protocol::exchange::MAX_TRIALS;
    use std::sync::mpsc;
    use std::time::Duration;

    fn transfer() -> Transfer {
        Transfer::new(ConnectionParams::new("fake", 115200))
            .unwrap()
            .with_exchange_config(ExchangeConfig {
                settle_delay: Duration::ZERO,
                poll_timeout: Duration::from_millis(20),
                max_trials: MAX_TRIALS,
            })
    }

    #[test]
    fn test_run_opens_and_closes() {
        let mut phone = FakePhone::new();
        let outcome = transfer().run(&mut phone, Request::Test);
        assert!(outcome.is_success());
        assert_eq!(outcome.response, Some(Response::Done));
        let stats = phone.stats();
        assert_eq!((stats.opens, stats.closes), (1, 1));
        assert!(!phone.is_open());
    }

    #[test]
    fn test_run_returns_records() {
        let mut phone = FakePhone::new();
        let outcome = transfer().run(&mut phone, Request::List(Category::Rings));
        match outcome.response {
            Some(Response::Elements(elements)) => {
                assert_eq!(elements.len(), 1);
                assert_eq!(elements[0].kind(), "MIDI");
            },
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_invalid_params() {
        let err = Transfer::new(ConnectionParams::new("", 115200)).unwrap_err();
        assert_eq!(err.code(), codes::INVALID_PARAMETER);
        let err = Transfer::new(ConnectionParams::new("fake", 0)).unwrap_err();
        assert_eq!(err.code(), codes::INVALID_PARAMETER);
    }

    #[test]
    fn test_open_failure_code() {
        let mut phone = FakePhone::new();
        phone.set_unplugged(true);
        let outcome = transfer().run(&mut phone, Request::Test);
        assert_eq!(outcome.code, codes::OPEN_FAILED);
        assert!(outcome.error.is_some());
        assert_eq!(
            Operation::Test.msg_for_error(outcome.code),
            "Cannot open the serial port"
        );
    }

    #[test]
    fn test_upload_error_codes_and_messages() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "x").unwrap();

        let mut phone = FakePhone::new();
        let outcome = transfer().run(&mut phone, Request::Upload(notes));
        assert_eq!(outcome.code, codes::UNSUPPORTED_TYPE);
        assert_eq!(
            Operation::Upload.msg_for_error(outcome.code),
            "Unsupported file type"
        );

        phone.reply_to("AT+KDOBJ=1,0", "\r\nERROR\r\n");
        let pic = dir.path().join("pic.gif");
        std::fs::write(&pic, b"GIF89a").unwrap();
        let outcome = transfer().run(&mut phone, Request::Upload(pic));
        assert_eq!(outcome.code, codes::UPLOAD_CLOSE);
        assert_eq!(
            Operation::Upload.msg_for_error(outcome.code),
            "The phone did not store the file"
        );
    }

    #[test]
    fn test_upload_family_messages_are_distinct() {
        let upload_codes = [
            codes::UNSUPPORTED_TYPE,
            codes::FILE_IO,
            codes::OPEN_FAILED,
            codes::INVALID_PARAMETER,
            codes::UPLOAD_RESET,
            codes::UPLOAD_INIT,
            codes::UPLOAD_LENGTH,
            codes::UPLOAD_NAME,
            codes::UPLOAD_TYPE_SIZE,
            codes::UPLOAD_PAYLOAD,
            codes::UPLOAD_CLOSE,
        ];
        let mut messages: Vec<&str> = upload_codes
            .iter()
            .map(|c| Operation::Upload.msg_for_error(*c))
            .collect();
        messages.sort_unstable();
        messages.dedup();
        assert_eq!(messages.len(), upload_codes.len());
        assert_eq!(Operation::Upload.msg_for_error(-99), "Unknown error");
    }

    #[test]
    fn test_download_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut phone = FakePhone::new();
        let element = phone.objects()[1].element.clone();
        let outcome = transfer().run(
            &mut phone,
            Request::Download {
                element,
                dir: dir.path().to_path_buf(),
            },
        );
        assert_eq!(outcome.response, Some(Response::Saved(dir.path().join("Tune.mid"))));
        assert!(dir.path().join("Tune.mid").exists());
    }

    #[test]
    fn test_spawn_reports_through_callback() {
        let (tx, rx) = mpsc::channel();
        let handle = transfer().spawn(FakePhone::new(), Request::GetVolume, move |outcome| {
            tx.send(outcome).unwrap();
        });
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.response, Some(Response::Volume(3)));
        let phone = handle.join().unwrap();
        assert_eq!(phone.stats().closes, 1);
    }

    #[test]
    fn test_calls_queue_on_device_lock() {
        let transfer = transfer();
        let lock = Arc::clone(&transfer.params().lock);
        let (tx, rx) = mpsc::channel();

        let guard = lock.lock().unwrap();
        let handle = transfer.spawn(FakePhone::new(), Request::Test, move |outcome| {
            tx.send(outcome.code).unwrap();
        });
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(guard);

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), codes::OK);
        handle.join().unwrap();
    }
}
