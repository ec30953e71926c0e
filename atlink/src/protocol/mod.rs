//! AT dialect: command lines, the exchange primitive, reply parsers and
//! the binary transfer paths layered on top.

pub mod commands;
pub mod download;
pub mod exchange;
pub mod magic;
pub mod reply;
pub mod upload;

// Re-export common types
pub use download::Download;
pub use exchange::{Exchange, ExchangeConfig};
pub use magic::ContentKind;
pub use upload::UploadStage;
