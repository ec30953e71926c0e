//! Object upload state machine.
//!
//! ```text
//! reset ─> init ─> length ─> name ─> type+size ─> payload ─> close
//!   ^                                                          │
//!   └──────────── reopen + restart on any stage failure ───────┘
//! ```
//!
//! | stage     | command                  | expected reply           |
//! |-----------|--------------------------|--------------------------|
//! | reset     | `AT+KDOBJ=0,0`           | `OK` or `ERROR`          |
//! | init      | `AT+KDOBJ=1,1`           | `OK`                     |
//! | length    | `AT+KFNAME=<chars>`      | `CONNECT`, no `ERROR`    |
//! | name      | raw destination name     | `OK`                     |
//! | type+size | `AT+KPSW=<type>,<bytes>` | `CONNECT`, no `ERROR`    |
//! | payload   | raw bytes, 10 KiB chunks | `OK`                     |
//! | close     | `AT+KDOBJ=1,0`           | `OK`                     |

use std::fmt;

use log::{debug, info, warn};

use crate::error::{Error, Result, codes};
use crate::model::element::{sanitize_filename, upload_type_id};
use crate::port::Channel;
use crate::protocol::commands::{self, CONNECT, ERROR, OK};
use crate::protocol::exchange::Exchange;

/// Payload chunk size.
pub const CHUNK_SIZE: usize = 10 * 1024;

/// One step of the upload state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    /// Abort a leftover transfer.
    Reset,
    /// Enter object transfer mode.
    Init,
    /// Announce the name length.
    Length,
    /// Send the name.
    Name,
    /// Announce type-ID and size.
    TypeSize,
    /// Send the bytes.
    Payload,
    /// Commit the object.
    Close,
}

impl UploadStage {
    /// Result code reported when this stage fails on every attempt.
    pub fn error_code(self) -> i32 {
        match self {
            Self::Reset => codes::UPLOAD_RESET,
            Self::Init => codes::UPLOAD_INIT,
            Self::Length => codes::UPLOAD_LENGTH,
            Self::Name => codes::UPLOAD_NAME,
            Self::TypeSize => codes::UPLOAD_TYPE_SIZE,
            Self::Payload => codes::UPLOAD_PAYLOAD,
            Self::Close => codes::UPLOAD_CLOSE,
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reset => "reset",
            Self::Init => "init",
            Self::Length => "length",
            Self::Name => "name",
            Self::TypeSize => "type+size",
            Self::Payload => "payload",
            Self::Close => "close",
        };
        f.write_str(name)
    }
}

/// Destination name and type-ID for a local file name.
///
/// The stem is sanitized and the extension lowercased; extensions without
/// an upload type-ID are rejected.
pub fn destination(file_name: &str) -> Result<(String, u16)> {
    let (stem, extension) = file_name
        .rsplit_once('.')
        .ok_or_else(|| Error::UnsupportedExtension(String::new()))?;
    let extension = extension.to_ascii_lowercase();
    let type_id =
        upload_type_id(&extension).ok_or_else(|| Error::UnsupportedExtension(extension.clone()))?;
    if stem.is_empty() {
        return Err(Error::InvalidParameter(format!("no name before .{extension}")));
    }
    Ok((format!("{}.{extension}", sanitize_filename(stem)), type_id))
}

fn has(reply: &str, token: &str) -> bool {
    reply.contains(token)
}

fn check(reply: &str, ok: bool, stage: UploadStage) -> std::result::Result<(), UploadStage> {
    if ok {
        debug!("Upload stage {stage} passed");
        Ok(())
    } else {
        warn!("Upload stage {stage} failed: {:?}", reply.trim());
        Err(stage)
    }
}

fn attempt<C, F>(
    exchange: &mut Exchange<C>,
    name: &str,
    type_id: u16,
    data: &[u8],
    progress: &mut F,
) -> std::result::Result<(), UploadStage>
where
    C: Channel,
    F: FnMut(usize, usize),
{
    let reply = exchange.try_command(commands::UPLOAD_RESET, &[]);
    check(&reply, has(&reply, OK) || has(&reply, ERROR), UploadStage::Reset)?;

    let reply = exchange.try_command(commands::UPLOAD_INIT, &[]);
    check(&reply, has(&reply, OK) && !has(&reply, ERROR), UploadStage::Init)?;

    let reply = exchange.try_command(&commands::upload_name_length(name.chars().count()), &[CONNECT]);
    check(&reply, has(&reply, CONNECT) && !has(&reply, ERROR), UploadStage::Length)?;

    let reply = exchange.try_command(name, &[]);
    check(&reply, has(&reply, OK) && !has(&reply, ERROR), UploadStage::Name)?;

    let reply = exchange.try_command(&commands::upload_type_size(type_id, data.len()), &[CONNECT]);
    check(&reply, has(&reply, CONNECT) && !has(&reply, ERROR), UploadStage::TypeSize)?;

    let total = data.len();
    let mut sent = 0;
    for chunk in data.chunks(CHUNK_SIZE) {
        if let Err(e) = exchange.send(chunk) {
            warn!("Payload write failed after {sent}/{total} bytes: {e}");
            return Err(UploadStage::Payload);
        }
        sent += chunk.len();
        progress(sent, total);
    }
    let reply = String::from_utf8_lossy(&exchange.await_reply(&[])).into_owned();
    check(&reply, has(&reply, OK) && !has(&reply, ERROR), UploadStage::Payload)?;

    let reply = exchange.try_command(commands::UPLOAD_CLOSE, &[]);
    check(&reply, has(&reply, OK) && !has(&reply, ERROR), UploadStage::Close)
}

/// Upload `data` under `file_name`.
///
/// `progress` receives `(bytes sent, total)` after each payload chunk. A
/// failed stage reopens the channel and restarts from the reset stage, up
/// to `max_trials` attempts; the error names the stage of the last failure.
pub fn upload<C, F>(exchange: &mut Exchange<C>, file_name: &str, data: &[u8], mut progress: F) -> Result<()>
where
    C: Channel,
    F: FnMut(usize, usize),
{
    let (name, type_id) = destination(file_name)?;
    if data.is_empty() {
        return Err(Error::InvalidParameter(format!("{file_name} is empty")));
    }

    let max = exchange.config().max_trials;
    let mut failed = UploadStage::Reset;
    for attempt_no in 1..=max {
        if crate::is_interrupted_requested() {
            return Err(Error::Interrupted);
        }
        info!(
            "Uploading {name} ({} bytes, type {type_id:#06x}), attempt {attempt_no}/{max}",
            data.len()
        );
        match attempt(exchange, &name, type_id, data, &mut progress) {
            Ok(()) => {
                info!("Uploaded {name}");
                return Ok(());
            },
            Err(stage) => {
                failed = stage;
                if crate::is_interrupted_requested() {
                    return Err(Error::Interrupted);
                }
                warn!("Upload of {name} failed at {stage} stage (attempt {attempt_no}/{max})");
                exchange.reconnect();
            },
        }
    }
    Err(Error::Upload(failed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ELEMENT_TYPES;
    use crate::port::{FakePhone, SerialConfig};
    use crate::protocol::exchange::{ExchangeConfig, MAX_TRIALS};
    use std::time::Duration;

    fn exchange() -> Exchange<FakePhone> {
        let mut phone = FakePhone::empty();
        phone
            .open(&SerialConfig::new("fake", 115200))
            .unwrap();
        Exchange::with_config(
            phone,
            ExchangeConfig {
                settle_delay: Duration::ZERO,
                poll_timeout: Duration::from_millis(20),
                max_trials: MAX_TRIALS,
            },
        )
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_every_upload_extension_round_trips() {
        let mut exchange = exchange();
        let data = payload(3000);
        for row in ELEMENT_TYPES.iter().filter(|t| t.upload_id.is_some()) {
            let file_name = format!("sample {}.{}", row.code, row.extension);
            upload(&mut exchange, &file_name, &data, |_, _| {}).unwrap();

            let stem = sanitize_filename(&format!("sample {}", row.code));
            let stored = exchange
                .channel()
                .object_named(&stem)
                .unwrap_or_else(|| panic!("{file_name} not stored"));
            assert_eq!(stored.data, data, "{file_name}");
            assert_eq!(stored.element.extension(), Some(row.extension), "{file_name}");
        }
    }

    #[test]
    fn test_progress_reports_each_chunk() {
        let mut exchange = exchange();
        let data = payload(CHUNK_SIZE * 2 + 500);
        let mut seen = Vec::new();
        upload(&mut exchange, "big.wav", &data, |sent, total| seen.push((sent, total))).unwrap();
        let total = data.len();
        assert_eq!(
            seen,
            vec![(CHUNK_SIZE, total), (CHUNK_SIZE * 2, total), (total, total)]
        );
        assert_eq!(exchange.channel().stats().reopens, 0);
    }

    #[test]
    fn test_unsupported_extension_rejected_before_io() {
        let mut exchange = exchange();
        let err = upload(&mut exchange, "notes.txt", b"hi", |_, _| {}).unwrap_err();
        assert!(matches!(err, Error::UnsupportedExtension(ref e) if e == "txt"));
        assert_eq!(err.code(), codes::UNSUPPORTED_TYPE);
        assert!(matches!(
            upload(&mut exchange, "noext", b"hi", |_, _| {}),
            Err(Error::UnsupportedExtension(_))
        ));
        assert_eq!(exchange.channel().stats().commands, 0);
    }

    #[test]
    fn test_stage_failure_exhausts_attempts() {
        let mut exchange = exchange();
        exchange
            .channel_mut()
            .reply_to("AT+KPSW=", "\r\nERROR\r\n");
        let err = upload(&mut exchange, "pic.gif", b"GIF89a", |_, _| {}).unwrap_err();
        assert!(matches!(err, Error::Upload(UploadStage::TypeSize)));
        assert_eq!(err.code(), -15);
        assert_eq!(exchange.channel().stats().reopens, MAX_TRIALS as usize);
    }

    #[test]
    fn test_init_failure_code() {
        let mut exchange = exchange();
        exchange
            .channel_mut()
            .reply_to("AT+KDOBJ=1,1", "\r\nERROR\r\n");
        let err = upload(&mut exchange, "pic.png", b"\x89PNG", |_, _| {}).unwrap_err();
        assert_eq!(err.code(), codes::UPLOAD_INIT);
    }

    #[test]
    fn test_destination_name() {
        assert_eq!(destination("My Pic.GIF").unwrap(), ("My_Pic.gif".to_string(), 0x0101));
        assert!(matches!(destination(".gif"), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_stage_codes_are_distinct() {
        let stages = [
            UploadStage::Reset,
            UploadStage::Init,
            UploadStage::Length,
            UploadStage::Name,
            UploadStage::TypeSize,
            UploadStage::Payload,
            UploadStage::Close,
        ];
        let codes: Vec<i32> = stages.iter().map(|s| s.error_code()).collect();
        assert_eq!(codes, vec![-11, -12, -13, -14, -15, -16, -17]);
        assert_eq!(UploadStage::TypeSize.to_string(), "type+size");
    }
}
