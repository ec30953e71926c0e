//! Object download.

use log::{debug, info};

use crate::error::{Error, Result};
use crate::model::Element;
use crate::port::Channel;
use crate::protocol::commands::{self, CONNECT, ERROR, NO_CARRIER};
use crate::protocol::exchange::Exchange;
use crate::protocol::magic::{self, ContentKind};

/// A retrieved object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Format detected from the content.
    pub kind: ContentKind,
    /// File bytes, signature included.
    pub data: Vec<u8>,
}

/// Retrieve the object with the given id.
pub fn retrieve<C: Channel>(exchange: &mut Exchange<C>, id: &str) -> Result<Download> {
    info!("Downloading object {id}");
    let reply = exchange.try_command_bytes(commands::retrieve(id).as_bytes(), &[NO_CARRIER]);
    if reply.trim_ascii().is_empty() {
        return Err(Error::NoResponse);
    }

    let text = String::from_utf8_lossy(&reply);
    if !text.contains(CONNECT) && text.contains(ERROR) {
        return Err(Error::Rejected(text.trim().to_string()));
    }

    let (kind, data) = magic::extract(&reply)?;
    debug!("Object {id}: {kind}, {} bytes", data.len());
    Ok(Download {
        kind,
        data: data.to_vec(),
    })
}

/// Local file name for a downloaded element.
///
/// The element's format code decides the extension; unknown codes fall back
/// to the extension of the detected content.
pub fn file_name(element: &Element, kind: ContentKind) -> String {
    let extension = element
        .extension()
        .unwrap_or_else(|| kind.extension());
    format!("{}.{extension}", element.filename())
}
