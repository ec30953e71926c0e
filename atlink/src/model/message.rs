//! SMS records.

/// Terminator the firmware expects after an SMS body.
pub const BODY_TERMINATOR: char = '\u{1b}';

/// A short message, as read from or written to the phone.
///
/// Every field is optional: records read from the phone may lack the
/// number or timestamp, and outgoing messages have neither id nor status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    id: Option<String>,
    status: Option<String>,
    recipient_number: Option<String>,
    datetime: Option<String>,
    body: Option<String>,
}

impl Message {
    /// Create an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an outgoing message.
    pub fn outgoing(number: impl Into<String>, body: impl Into<String>) -> Self {
        let mut msg = Self::new();
        msg.set_recipient_number(number);
        msg.set_body(body);
        msg
    }

    /// Storage index on the phone.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Status such as `REC READ` or `STO UNSENT`.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Sender or recipient number.
    pub fn recipient_number(&self) -> Option<&str> {
        self.recipient_number.as_deref()
    }

    /// Timestamp as reported by the phone.
    pub fn datetime(&self) -> Option<&str> {
        self.datetime.as_deref()
    }

    /// Message text.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Set the storage index.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Set the status.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    /// Set the number.
    pub fn set_recipient_number(&mut self, number: impl Into<String>) {
        self.recipient_number = Some(number.into());
    }

    /// Set the timestamp.
    pub fn set_datetime(&mut self, datetime: impl Into<String>) {
        self.datetime = Some(datetime.into());
    }

    /// Set the text.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    /// Body framed for `AT+CMGS`: the text followed by a single ESC.
    pub fn message_string(&self) -> String {
        let mut framed = self.body.clone().unwrap_or_default();
        framed.push(BODY_TERMINATOR);
        framed
    }
}
