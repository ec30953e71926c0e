//! In-memory handset that speaks the AT dialect.
//!
//! [`FakePhone`] keeps a small object store, an SMS folder, alarm slots and
//! call/volume/PIN state, and answers commands the way the firmware does:
//! after `ATE1` every reply is preceded by the echoed command line (echo is
//! off after power-up and `ATZ`). Raw data modes (upload name and payload,
//! SMS body) are driven by byte counts or the ESC terminator.
//!
//! Commands are dispatched through an ordered prefix table, so more specific
//! prefixes (`ATDL`, `ATD>`) must come before general ones (`ATD`).

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::model::element::{ELEMENT_TYPES, sanitize_filename};
use crate::model::message::BODY_TERMINATOR;
use crate::model::{Alarm, Category, Element, Message, PinStatus};
use crate::port::{Channel, SerialConfig};

const ESC: u8 = BODY_TERMINATOR as u8;

/// Output queue shared with [`FakeLine`] handles.
#[derive(Default)]
struct ReadyQueue {
    bytes: Mutex<VecDeque<u8>>,
    ready: Condvar,
}

impl ReadyQueue {
    fn push(&self, data: &[u8]) {
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        bytes.extend(data);
        self.ready.notify_all();
    }

    fn len(&self) -> usize {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn pop_into(&self, buf: &mut [u8]) -> usize {
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        let n = buf.len().min(bytes.len());
        for (slot, byte) in buf.iter_mut().zip(bytes.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn clear(&self) {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn wait(&self, timeout: Duration) -> bool {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        let (bytes, _) = self
            .ready
            .wait_timeout_while(bytes, timeout, |b| b.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        !bytes.is_empty()
    }
}

/// Handle for pushing unsolicited output (e.g. `RING`) from another thread.
#[derive(Clone)]
pub struct FakeLine(Arc<ReadyQueue>);

impl FakeLine {
    /// Queue bytes as if the phone had sent them.
    pub fn push(&self, data: &[u8]) {
        self.0.push(data);
    }
}

/// Counters for assertions in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FakeStats {
    /// Successful opens, including those done by reopen.
    pub opens: usize,
    /// Reopens.
    pub reopens: usize,
    /// Closes.
    pub closes: usize,
    /// Command lines received, including ignored ones.
    pub commands: usize,
}

/// An object in the phone's store.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Listing record.
    pub element: Element,
    /// Storage category.
    pub category: Category,
    /// System objects are stored but not listed.
    pub hidden: bool,
    /// Raw content.
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct PendingUpload {
    name: Option<String>,
    type_id: Option<u16>,
    data: Vec<u8>,
    complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Idle,
    Ringing(String),
    Active(String),
}

enum Mode {
    Command,
    UploadName { len: usize, name: Vec<u8> },
    UploadPayload { remaining: usize },
    SmsBody { number: String, body: Vec<u8> },
}

#[derive(Debug, Clone, Copy)]
enum Handler {
    FirmwareVersion,
    Imei,
    DeviceType,
    SubscriberNumbers,
    SignalQuality,
    PinQuery,
    PinEnter,
    VolumeQuery,
    VolumeSet,
    List,
    Retrieve,
    Delete,
    UploadReset,
    UploadInit,
    UploadClose,
    UploadNameLength,
    UploadTypeSize,
    AlarmQuery,
    AlarmSet,
    AlarmDelete,
    SmsMode,
    SmsList,
    SmsRead,
    SmsDelete,
    SmsSend,
    Redial,
    DialMemory,
    Dial,
    Hangup,
    Answer,
    Reset,
    Echo,
    Attention,
}

const COMMANDS: &[(&str, Handler)] = &[
    ("AT+KPSV", Handler::FirmwareVersion),
    ("AT+CGSN", Handler::Imei),
    ("AT+CGMR", Handler::DeviceType),
    ("AT+CNUM", Handler::SubscriberNumbers),
    ("AT+CSQ", Handler::SignalQuality),
    ("AT+CPIN?", Handler::PinQuery),
    ("AT+CPIN=", Handler::PinEnter),
    ("AT+CLVL?", Handler::VolumeQuery),
    ("AT+CLVL=", Handler::VolumeSet),
    ("AT+KPSL=", Handler::List),
    ("AT+KPSR=", Handler::Retrieve),
    ("AT+KPSD=", Handler::Delete),
    ("AT+KDOBJ=0,0", Handler::UploadReset),
    ("AT+KDOBJ=1,1", Handler::UploadInit),
    ("AT+KDOBJ=1,0", Handler::UploadClose),
    ("AT+KFNAME=", Handler::UploadNameLength),
    ("AT+KPSW=", Handler::UploadTypeSize),
    ("AT+CALA?", Handler::AlarmQuery),
    ("AT+CALA=", Handler::AlarmSet),
    ("AT+CALD=", Handler::AlarmDelete),
    ("AT+CMGF=", Handler::SmsMode),
    ("AT+CMGL", Handler::SmsList),
    ("AT+CMGR=", Handler::SmsRead),
    ("AT+CMGD=", Handler::SmsDelete),
    ("AT+CMGS=", Handler::SmsSend),
    ("ATDL", Handler::Redial),
    ("ATD>", Handler::DialMemory),
    ("ATD", Handler::Dial),
    ("ATH", Handler::Hangup),
    ("ATA", Handler::Answer),
    ("ATZ", Handler::Reset),
    ("ATE", Handler::Echo),
    ("AT", Handler::Attention),
];

const MAX_VOLUME: u8 = 5;
const DEFAULT_PIN: &str = "1234";

fn ok() -> String {
    "\r\nOK\r\n".to_string()
}

fn error() -> String {
    "\r\nERROR\r\n".to_string()
}

fn info(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str("\r\n");
        out.push_str(line);
    }
    if !lines.is_empty() {
        out.push_str("\r\n");
    }
    out.push_str(&ok());
    out
}

fn unquote(arg: &str) -> &str {
    arg.trim().trim_matches('"')
}

/// Simulated handset implementing [`Channel`].
pub struct FakePhone {
    name: String,
    open: bool,
    unplugged: bool,
    broken: bool,
    config: Option<SerialConfig>,
    dtr: bool,
    rts: bool,
    echo: bool,
    input: Vec<u8>,
    output: Arc<ReadyQueue>,
    mode: Mode,
    canned: Vec<(String, String)>,
    silent: usize,
    stats: FakeStats,

    objects: Vec<StoredObject>,
    next_object: u32,
    upload: Option<PendingUpload>,
    messages: Vec<Message>,
    next_message: u32,
    message_ref: u32,
    alarms: Vec<Alarm>,
    volume: u8,
    pin: PinStatus,
    call: Call,
    last_dialed: Option<String>,
}

impl Default for FakePhone {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePhone {
    /// Create a closed phone with a few stored objects, two messages and
    /// one alarm.
    pub fn new() -> Self {
        let mut phone = Self::empty();
        phone.seed();
        phone
    }

    /// Create a closed phone with nothing stored.
    pub fn empty() -> Self {
        Self {
            name: "fake".to_string(),
            open: false,
            unplugged: false,
            broken: false,
            config: None,
            dtr: false,
            rts: false,
            echo: false,
            input: Vec::new(),
            output: Arc::new(ReadyQueue::default()),
            mode: Mode::Command,
            canned: Vec::new(),
            silent: 0,
            stats: FakeStats::default(),
            objects: Vec::new(),
            next_object: 1,
            upload: None,
            messages: Vec::new(),
            next_message: 1,
            message_ref: 0,
            alarms: Vec::new(),
            volume: 3,
            pin: PinStatus::Ready,
            call: Call::Idle,
            last_dialed: None,
        }
    }

    fn seed(&mut self) {
        let mut gif = b"GIF89a\x01\x00\x01\x00\x80\x00\x00".to_vec();
        gif.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0, 0, 0, b';']);
        self.store("Logo", "FGIF", Category::Pictures, false, gif);

        let mut midi = b"MThd\x00\x00\x00\x06\x00\x00\x00\x01\x00\x60".to_vec();
        midi.extend_from_slice(b"MTrk\x00\x00\x00\x04\x00\xFF\x2F\x00");
        self.store("Tune", "MIDI", Category::Rings, false, midi);

        self.store(
            "Contact",
            "VCRD",
            Category::Address,
            false,
            b"BEGIN:VCARD\r\nVERSION:2.1\r\nN:Doe;Jane\r\nTEL:+48600100200\r\nEND:VCARD\r\n"
                .to_vec(),
        );
        self.store(
            "Startup",
            "FGIF",
            Category::Pictures,
            true,
            b"GIF87a\x01\x00\x01\x00".to_vec(),
        );

        let mut first = Message::new();
        first.set_status("REC READ");
        first.set_recipient_number("+48600100200");
        first.set_datetime("23/05/14,10:15:00+08");
        first.set_body("See you at noon");
        self.add_message(first);

        let mut second = Message::new();
        second.set_status("REC UNREAD");
        second.set_recipient_number("+48600300400");
        second.set_datetime("23/05/15,08:00:00+08");
        second.set_body("Call me back");
        self.add_message(second);

        if let Some(time) = chrono::NaiveTime::from_hms_opt(7, 0, 0) {
            self.alarms.push(Alarm::daily(time, 1));
        }
    }

    fn store(&mut self, name: &str, code: &str, category: Category, hidden: bool, data: Vec<u8>) -> String {
        let id = format!("530365000502{:04X}FFFF", self.next_object);
        self.next_object += 1;
        self.objects.push(StoredObject {
            element: Element::new(id.clone(), code, name),
            category,
            hidden,
            data,
        });
        id
    }

    /// Add a message to the SMS folder and return its index.
    pub fn add_message(&mut self, mut message: Message) -> String {
        let id = self.next_message.to_string();
        self.next_message += 1;
        message.set_id(id.clone());
        self.messages.push(message);
        id
    }

    /// Add an object to the store and return its id.
    pub fn add_object(&mut self, name: &str, code: &str, data: Vec<u8>) -> String {
        let category = ELEMENT_TYPES
            .iter()
            .find(|t| t.code == code)
            .map_or(Category::Pictures, |t| t.category);
        self.store(name, code, category, false, data)
    }

    /// Make the phone ring with an incoming call.
    pub fn ring(&mut self, number: &str) {
        self.call = Call::Ringing(number.to_string());
        self.output.push(b"\r\nRING\r\n");
    }

    /// Echo command lines like a freshly reset handset with `ATE1`.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Require a SIM PIN before the phone becomes ready.
    pub fn lock_sim(&mut self) {
        self.pin = PinStatus::SimPin;
    }

    /// Make every subsequent open fail as if the device were gone.
    pub fn set_unplugged(&mut self, unplugged: bool) {
        self.unplugged = unplugged;
    }

    /// Make writes fail with a broken pipe while the port stays open.
    pub fn break_line(&mut self, broken: bool) {
        self.broken = broken;
    }

    /// Answer commands starting with `prefix` with `reply`, verbatim.
    pub fn reply_to(&mut self, prefix: &str, reply: &str) {
        self.canned.push((prefix.to_string(), reply.to_string()));
    }

    /// Swallow the next `count` command lines without replying.
    pub fn stay_silent_for(&mut self, count: usize) {
        self.silent = count;
    }

    /// Handle for pushing unsolicited output from another thread.
    pub fn line(&self) -> FakeLine {
        FakeLine(Arc::clone(&self.output))
    }

    /// Counters for assertions.
    pub fn stats(&self) -> FakeStats {
        self.stats
    }

    /// Every object in the store, hidden ones included.
    pub fn objects(&self) -> &[StoredObject] {
        &self.objects
    }

    /// Stored object by its sanitized base name.
    pub fn object_named(&self, name: &str) -> Option<&StoredObject> {
        self.objects
            .iter()
            .find(|o| o.element.filename() == name)
    }

    /// The SMS folder.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The alarm slots.
    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    /// Current ringer volume.
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Number of the active call, if any.
    pub fn active_call(&self) -> Option<&str> {
        match &self.call {
            Call::Active(number) => Some(number),
            _ => None,
        }
    }

    fn reply(&mut self, text: &str) {
        self.output.push(text.as_bytes());
    }

    fn feed(&mut self, byte: u8) {
        if matches!(self.mode, Mode::Command) {
            if byte == b'\r' {
                let raw = std::mem::take(&mut self.input);
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                if !line.is_empty() {
                    self.command(&line);
                }
            } else {
                self.input.push(byte);
            }
            return;
        }

        match &mut self.mode {
            Mode::Command => {},
            Mode::UploadName { len, name } => {
                name.push(byte);
                if name.len() >= *len {
                    let name = String::from_utf8_lossy(name).into_owned();
                    self.mode = Mode::Command;
                    if let Some(upload) = self.upload.as_mut() {
                        upload.name = Some(name);
                        self.reply(&ok());
                    } else {
                        self.reply(&error());
                    }
                }
            },
            Mode::UploadPayload { remaining } => {
                *remaining -= 1;
                let done = *remaining == 0;
                if let Some(upload) = self.upload.as_mut() {
                    upload.data.push(byte);
                    if done {
                        upload.complete = true;
                    }
                }
                if done {
                    self.mode = Mode::Command;
                    self.reply(&ok());
                }
            },
            Mode::SmsBody { number, body } => {
                if byte == ESC {
                    let number = std::mem::take(number);
                    let body = String::from_utf8_lossy(body).into_owned();
                    self.mode = Mode::Command;
                    self.finish_sms(number, body);
                } else {
                    body.push(byte);
                }
            },
        }
    }

    fn command(&mut self, line: &str) {
        self.stats.commands += 1;
        if self.silent > 0 {
            self.silent -= 1;
            trace!("fake: ignoring {line}");
            return;
        }
        if self.echo {
            self.output.push(format!("{line}\r").as_bytes());
        }

        if let Some((_, reply)) = self
            .canned
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
        {
            let reply = reply.clone();
            self.reply(&reply);
            return;
        }

        let upper = line.to_ascii_uppercase();
        let Some((prefix, handler)) = COMMANDS
            .iter()
            .find(|(prefix, _)| upper.starts_with(prefix))
        else {
            self.reply(&error());
            return;
        };
        let args = &line[prefix.len()..];
        debug!("fake: {handler:?} {args:?}");
        let reply = self.handle(*handler, args);
        self.reply(&reply);
    }

    fn handle(&mut self, handler: Handler, args: &str) -> String {
        match handler {
            Handler::Attention => {
                if args.is_empty() {
                    ok()
                } else {
                    error()
                }
            },
            Handler::Reset => {
                self.echo = false;
                self.mode = Mode::Command;
                ok()
            },
            Handler::Echo => match args {
                "0" => {
                    self.echo = false;
                    ok()
                },
                "" | "1" => {
                    self.echo = true;
                    ok()
                },
                _ => error(),
            },
            Handler::FirmwareVersion => info(&["+KPSV: 1.40.A".to_string()]),
            Handler::Imei => info(&["351234567890123".to_string()]),
            Handler::DeviceType => info(&["+CGMR: myX-8 KP 2.10".to_string()]),
            Handler::SubscriberNumbers => {
                info(&["+CNUM: \"Own\",\"+48600999888\",145".to_string()])
            },
            Handler::SignalQuality => info(&["+CSQ: 21,99".to_string()]),
            Handler::PinQuery => info(&[format!("+CPIN: {}", self.pin)]),
            Handler::PinEnter => {
                if self.pin != PinStatus::Ready && unquote(args) == DEFAULT_PIN {
                    self.pin = PinStatus::Ready;
                    ok()
                } else {
                    error()
                }
            },
            Handler::VolumeQuery => info(&[format!("+CLVL: {}", self.volume)]),
            Handler::VolumeSet => match args.trim().parse::<u8>() {
                Ok(level) if level <= MAX_VOLUME => {
                    self.volume = level;
                    ok()
                },
                _ => error(),
            },
            Handler::List => self.list(args),
            Handler::Retrieve => self.retrieve(unquote(args)),
            Handler::Delete => {
                let id = unquote(args);
                match self.objects.iter().position(|o| o.element.id() == id) {
                    Some(i) => {
                        self.objects.remove(i);
                        ok()
                    },
                    None => error(),
                }
            },
            Handler::UploadReset => {
                if self.upload.take().is_some() {
                    ok()
                } else {
                    error()
                }
            },
            Handler::UploadInit => {
                self.upload = Some(PendingUpload::default());
                ok()
            },
            Handler::UploadNameLength => match (self.upload.is_some(), args.trim().parse()) {
                (true, Ok(len)) if len > 0 => {
                    self.mode = Mode::UploadName {
                        len,
                        name: Vec::new(),
                    };
                    "\r\nCONNECT\r\n".to_string()
                },
                _ => error(),
            },
            Handler::UploadTypeSize => self.begin_payload(args),
            Handler::UploadClose => self.commit_upload(),
            Handler::AlarmQuery => {
                let lines: Vec<String> = self
                    .alarms
                    .iter()
                    .map(|a| format!("+CALA: {}", a.serialize()))
                    .collect();
                info(&lines)
            },
            Handler::AlarmSet => match Alarm::parse(args) {
                Some(alarm) => {
                    self.alarms
                        .retain(|a| a.number() != alarm.number());
                    self.alarms.push(alarm);
                    self.alarms.sort_by_key(Alarm::number);
                    ok()
                },
                None => error(),
            },
            Handler::AlarmDelete => {
                let before = self.alarms.len();
                if let Ok(number) = args.trim().parse::<u32>() {
                    self.alarms.retain(|a| a.number() != number);
                }
                if self.alarms.len() < before {
                    ok()
                } else {
                    error()
                }
            },
            Handler::SmsMode => match args.trim() {
                "0" | "1" => ok(),
                _ => error(),
            },
            Handler::SmsList => self.list_messages(),
            Handler::SmsRead => {
                let id = args.trim();
                match self.messages.iter().find(|m| m.id() == Some(id)) {
                    Some(m) => format!(
                        "\r\n+CMGR: \"{}\",\"{}\",,\"{}\"\r\n{}\r\n{}",
                        m.status().unwrap_or_default(),
                        m.recipient_number().unwrap_or_default(),
                        m.datetime().unwrap_or_default(),
                        m.body().unwrap_or_default(),
                        ok()
                    ),
                    None => error(),
                }
            },
            Handler::SmsDelete => {
                let id = args.trim();
                match self.messages.iter().position(|m| m.id() == Some(id)) {
                    Some(i) => {
                        self.messages.remove(i);
                        ok()
                    },
                    None => error(),
                }
            },
            Handler::SmsSend => {
                let number = unquote(args);
                if number.is_empty() {
                    return error();
                }
                self.mode = Mode::SmsBody {
                    number: number.to_string(),
                    body: Vec::new(),
                };
                "\r\n> ".to_string()
            },
            Handler::Dial => {
                let number = args.trim().trim_end_matches(';');
                if number.is_empty() {
                    return error();
                }
                self.last_dialed = Some(number.to_string());
                self.call = Call::Active(number.to_string());
                ok()
            },
            Handler::Redial => match self.last_dialed.clone() {
                Some(number) => {
                    self.call = Call::Active(number);
                    ok()
                },
                None => error(),
            },
            Handler::DialMemory => {
                let slot = args.trim().trim_end_matches(';');
                if slot.is_empty() {
                    return error();
                }
                self.call = Call::Active(format!(">{slot}"));
                ok()
            },
            Handler::Hangup => {
                self.call = Call::Idle;
                ok()
            },
            Handler::Answer => match std::mem::replace(&mut self.call, Call::Idle) {
                Call::Ringing(number) => {
                    self.call = Call::Active(number);
                    ok()
                },
                other => {
                    self.call = other;
                    "\r\nNO CARRIER\r\n".to_string()
                },
            },
        }
    }

    fn list(&self, args: &str) -> String {
        let category = args
            .split(',')
            .next()
            .map(unquote)
            .and_then(Category::from_name);
        let Some(category) = category else {
            return error();
        };
        let lines: Vec<String> = self
            .objects
            .iter()
            .filter(|o| o.category == category)
            .map(|o| {
                format!(
                    "+KPSL: \"{}\",{},{},\"{}\",\"{}\",\"0000065535\",\"\",\"{}\"",
                    o.element.id(),
                    u8::from(o.hidden),
                    o.data.len(),
                    category.wire_name(),
                    o.element.kind(),
                    o.element.filename()
                )
            })
            .collect();
        info(&lines)
    }

    fn retrieve(&self, id: &str) -> String {
        let Some(object) = self.objects.iter().find(|o| o.element.id() == id) else {
            return error();
        };
        let mut reply = b"\r\nCONNECT\r\n".to_vec();
        reply.extend_from_slice(&object.data);
        reply.extend_from_slice(b"\r\nNO CARRIER\r\n");
        // Binary content is pushed raw; the returned text is empty.
        self.output.push(&reply);
        String::new()
    }

    fn begin_payload(&mut self, args: &str) -> String {
        let mut parts = args.split(',').map(str::trim);
        let type_id = parts.next().and_then(|s| s.parse::<u16>().ok());
        let size = parts.next().and_then(|s| s.parse::<usize>().ok());
        let Some(upload) = self.upload.as_mut() else {
            return error();
        };
        match (type_id, size, upload.name.is_some()) {
            (Some(type_id), Some(size), true) if size > 0 => {
                upload.type_id = Some(type_id);
                upload.data.clear();
                upload.complete = false;
                self.mode = Mode::UploadPayload { remaining: size };
                "\r\nCONNECT\r\n".to_string()
            },
            _ => error(),
        }
    }

    fn commit_upload(&mut self) -> String {
        let Some(upload) = self.upload.take() else {
            return error();
        };
        let (Some(name), Some(type_id), true) = (upload.name, upload.type_id, upload.complete) else {
            return error();
        };
        let (stem, extension) = match name.rsplit_once('.') {
            Some((stem, ext)) => (stem.to_string(), ext.to_string()),
            None => (name.clone(), String::new()),
        };
        let row = ELEMENT_TYPES
            .iter()
            .filter(|t| t.upload_id == Some(type_id))
            .find(|t| t.extension.eq_ignore_ascii_case(&extension))
            .or_else(|| ELEMENT_TYPES.iter().find(|t| t.upload_id == Some(type_id)));
        let Some(row) = row else {
            return error();
        };
        let stem = sanitize_filename(&stem);
        self.objects
            .retain(|o| !(o.element.filename() == stem && o.element.kind() == row.code));
        let id = self.store(&stem, row.code, row.category, false, upload.data);
        debug!("fake: stored {stem} as {id}");
        ok()
    }

    fn list_messages(&self) -> String {
        let mut out = String::new();
        for m in &self.messages {
            out.push_str(&format!(
                "\r\n+CMGL: {},\"{}\",\"{}\",,\"{}\"\r\n{}",
                m.id().unwrap_or_default(),
                m.status().unwrap_or_default(),
                m.recipient_number().unwrap_or_default(),
                m.datetime().unwrap_or_default(),
                m.body().unwrap_or_default()
            ));
        }
        if !self.messages.is_empty() {
            out.push_str("\r\n");
        }
        out.push_str(&ok());
        out
    }

    fn finish_sms(&mut self, number: String, body: String) {
        let mut message = Message::new();
        message.set_status("STO SENT");
        message.set_recipient_number(number);
        message.set_body(body);
        self.add_message(message);
        self.message_ref += 1;
        let reply = format!("\r\n+CMGS: {}\r\n{}", self.message_ref, ok());
        self.reply(&reply);
    }

    fn reset_line(&mut self) {
        self.input.clear();
        self.mode = Mode::Command;
        self.output.clear();
    }
}

impl Channel for FakePhone {
    fn open(&mut self, config: &SerialConfig) -> Result<()> {
        if self.unplugged {
            return Err(Error::PortNotFound(config.port_name.clone()));
        }
        self.name.clone_from(&config.port_name);
        self.config = Some(config.clone());
        self.reset_line();
        self.open = true;
        self.stats.opens += 1;
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        let config = self.config.clone().ok_or(Error::ChannelUnavailable)?;
        self.close()?;
        self.stats.reopens += 1;
        self.open(&config)
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.stats.closes += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_available(&mut self) -> Result<usize> {
        if !self.open {
            return Err(Error::ChannelUnavailable);
        }
        Ok(self.output.len())
    }

    fn wait_readable(&mut self, timeout: Duration) -> bool {
        self.open && self.output.wait(timeout)
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.input.clear();
        self.output.clear();
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.dtr = level;
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> Result<()> {
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
        Ok(self.open)
    }

    fn dsr(&mut self) -> Result<bool> {
        Ok(self.open)
    }
}

impl Read for FakePhone {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "phone closed"));
        }
        match self.output.pop_into(buf) {
            0 => Err(io::Error::new(io::ErrorKind::TimedOut, "no data")),
            n => Ok(n),
        }
    }
}

impl Write for FakePhone {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "phone closed"));
        }
        if self.broken {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "line broken"));
        }
        for &byte in buf {
            self.feed(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
