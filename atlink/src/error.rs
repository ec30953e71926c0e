//! Error types for atlink.
//!
//! Every error maps to a small negative integer through [`Error::code`]. The
//! numbers are stable: front ends use them as process exit codes and as keys
//! into the per-operation message tables in [`crate::transfer`].

use std::io;
use thiserror::Error;

use crate::protocol::upload::UploadStage;

/// Result type for atlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for atlink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on a local file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The device path does not exist.
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// The channel is closed or was never opened.
    #[error("Channel unavailable")]
    ChannelUnavailable,

    /// The phone sent nothing back, even after reconnecting.
    #[error("No response from phone")]
    NoResponse,

    /// The phone answered `ERROR`.
    #[error("Phone rejected command: {0}")]
    Rejected(String),

    /// The reply did not contain what the command expects.
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    /// The download reply did not contain the `NO CARRIER` terminator.
    #[error("Reply lacks NO CARRIER terminator")]
    MissingTerminator,

    /// The downloaded blob matched no known signature.
    #[error("Unrecognized content")]
    UnknownContent,

    /// The file extension has no upload type-ID.
    #[error("Unsupported file type: {0}")]
    UnsupportedExtension(String),

    /// An upload stage failed on every attempt.
    #[error("Upload failed at {0} stage")]
    Upload(UploadStage),

    /// Connection parameters or an operation argument are invalid.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unsupported serial setting or operation.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The embedding application asked to stop.
    #[error("Interrupted")]
    Interrupted,
}

impl Error {
    /// Stable negative code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::NoResponse | Self::ChannelUnavailable => codes::NO_RESPONSE,
            Self::Rejected(_) => codes::REJECTED,
            Self::UnexpectedReply(_) => codes::UNEXPECTED_REPLY,
            Self::UnsupportedExtension(_) => codes::UNSUPPORTED_TYPE,
            Self::UnknownContent => codes::UNKNOWN_CONTENT,
            Self::MissingTerminator => codes::MISSING_TERMINATOR,
            Self::Io(_) => codes::FILE_IO,
            #[cfg(feature = "native")]
            Self::Serial(_) => codes::OPEN_FAILED,
            Self::PortNotFound(_) | Self::Unsupported(_) => codes::OPEN_FAILED,
            Self::InvalidParameter(_) => codes::INVALID_PARAMETER,
            Self::Interrupted => codes::INTERRUPTED,
            Self::Upload(stage) => stage.error_code(),
        }
    }

    /// Classify a reply that failed a stage check.
    pub(crate) fn from_reply(reply: &str) -> Self {
        let trimmed = reply.trim();
        if trimmed.is_empty() {
            Self::NoResponse
        } else if trimmed.contains("ERROR") {
            Self::Rejected(trimmed.to_string())
        } else {
            Self::UnexpectedReply(trimmed.to_string())
        }
    }
}

/// Result codes shared by every operation family.
pub mod codes {
    /// Success.
    pub const OK: i32 = 0;
    /// No response from the phone.
    pub const NO_RESPONSE: i32 = -1;
    /// The phone answered `ERROR`.
    pub const REJECTED: i32 = -2;
    /// The reply was not understood.
    pub const UNEXPECTED_REPLY: i32 = -3;
    /// Unsupported file type (upload).
    pub const UNSUPPORTED_TYPE: i32 = -4;
    /// Unrecognized content (download).
    pub const UNKNOWN_CONTENT: i32 = -5;
    /// `NO CARRIER` terminator missing (download).
    pub const MISSING_TERMINATOR: i32 = -6;
    /// Local file could not be read or written.
    pub const FILE_IO: i32 = -7;
    /// The serial channel could not be opened.
    pub const OPEN_FAILED: i32 = -8;
    /// Invalid connection parameters or argument.
    pub const INVALID_PARAMETER: i32 = -9;
    /// Interrupted by the embedding application.
    pub const INTERRUPTED: i32 = -10;
    /// Upload reset stage failed.
    pub const UPLOAD_RESET: i32 = -11;
    /// Upload init stage failed.
    pub const UPLOAD_INIT: i32 = -12;
    /// Upload name-length stage failed.
    pub const UPLOAD_LENGTH: i32 = -13;
    /// Upload name stage failed.
    pub const UPLOAD_NAME: i32 = -14;
    /// Upload type+size stage failed.
    pub const UPLOAD_TYPE_SIZE: i32 = -15;
    /// Upload payload stage failed.
    pub const UPLOAD_PAYLOAD: i32 = -16;
    /// Upload close stage failed.
    pub const UPLOAD_CLOSE: i32 = -17;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reply_classifies() {
        assert!(matches!(Error::from_reply("  \r\n"), Error::NoResponse));
        assert!(matches!(Error::from_reply("\r\nERROR\r\n"), Error::Rejected(_)));
        assert!(matches!(Error::from_reply("+CME: 3"), Error::UnexpectedReply(_)));
    }

    #[test]
    fn test_codes_are_negative_and_stable() {
        assert_eq!(Error::NoResponse.code(), -1);
        assert_eq!(Error::ChannelUnavailable.code(), -1);
        assert_eq!(Error::UnknownContent.code(), -5);
        assert_eq!(Error::Upload(UploadStage::Close).code(), -17);
        assert_eq!(
            Error::Io(io::Error::new(io::ErrorKind::NotFound, "x")).code(),
            codes::FILE_IO
        );
    }
}
