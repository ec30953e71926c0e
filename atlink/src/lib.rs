//! # atlink
//!
//! A library for managing feature phones over their AT-command serial link.
//!
//! This crate drives a vendor AT dialect on top of a noisy, unframed serial
//! channel, including:
//!
//! - Command/response exchange with retry-and-reconnect
//! - Object listing, upload and download (pictures, rings, vCards, ...)
//! - SMS, alarms, calls, volume and SIM PIN handling
//! - Content sniffing of downloaded objects
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//! - **Simulated**: [`port::FakePhone`], an in-memory handset for tests and
//!   dry runs
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use atlink::{ConnectionParams, Request, Transfer};
//! use atlink::model::Category;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transfer = Transfer::new(ConnectionParams::new("/dev/ttyACM0", 115200))?;
//!
//!     #[cfg(feature = "native")]
//!     {
//!         let mut port = atlink::NativePort::new("/dev/ttyACM0");
//!         let outcome = transfer.run(&mut port, Request::List(Category::Pictures));
//!         println!("finished with code {}", outcome.code);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod error;
pub mod model;
pub mod phone;
pub mod port;
pub mod protocol;
pub mod transfer;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker used by long-running library loops.
///
/// The checker should return `true` when the current operation should stop
/// (for example after receiving Ctrl-C in CLI applications).
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupted_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

/// Per-thread interrupt flag, so parallel tests do not see each other.
#[cfg(test)]
pub(crate) fn test_set_interrupted(value: bool) {
    use std::cell::Cell;

    thread_local! {
        static TEST_INTERRUPT_FLAG: Cell<bool> = const { Cell::new(false) };
    }
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| set_interrupt_checker(|| TEST_INTERRUPT_FLAG.with(Cell::get)));
    TEST_INTERRUPT_FLAG.with(|flag| flag.set(value));
}

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::NativePort;
pub use {
    error::{Error, Result},
    model::{Alarm, Category, DeviceInfo, Element, Message, PinStatus, SignalQuality},
    phone::Phone,
    port::{Channel, FakePhone, SerialConfig},
    protocol::{ContentKind, Download, Exchange, ExchangeConfig, UploadStage},
    transfer::{ConnectionParams, DeviceLock, Operation, Outcome, Request, Response, Transfer},
};
