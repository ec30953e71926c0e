//! AT command lines understood by the firmware.
//!
//! Every command is an ASCII line terminated by `\r`.

use crate::model::{Alarm, Category};

/// Line terminator for commands.
pub const CR: &str = "\r";

/// Reply token: command accepted.
pub const OK: &str = "OK";
/// Reply token: command rejected.
pub const ERROR: &str = "ERROR";
/// Reply token: the phone switched to raw data mode.
pub const CONNECT: &str = "CONNECT";
/// Reply token: raw data mode ended.
pub const NO_CARRIER: &str = "NO CARRIER";

/// Attention / liveness check.
pub const TEST: &str = "AT\r";
/// Firmware version.
pub const FIRMWARE_VERSION: &str = "AT+KPSV\r";
/// IMEI.
pub const IMEI: &str = "AT+CGSN\r";
/// Device type / revision.
pub const DEVICE_TYPE: &str = "AT+CGMR\r";
/// Own subscriber numbers.
pub const SUBSCRIBER_NUMBERS: &str = "AT+CNUM\r";
/// Signal quality.
pub const SIGNAL_QUALITY: &str = "AT+CSQ\r";
/// SIM lock state.
pub const PIN_STATUS: &str = "AT+CPIN?\r";
/// Ringer volume query.
pub const GET_VOLUME: &str = "AT+CLVL?\r";
/// Hang up the current call.
pub const HANGUP: &str = "ATH\r";
/// Answer an incoming call.
pub const ANSWER: &str = "ATA\r";
/// List alarms.
pub const LIST_ALARMS: &str = "AT+CALA?\r";
/// Switch SMS to text mode.
pub const SMS_TEXT_MODE: &str = "AT+CMGF=1\r";
/// List every stored SMS.
pub const LIST_MESSAGES: &str = "AT+CMGL=\"ALL\"\r";

/// Upload: abort any transfer left over from a previous session.
pub const UPLOAD_RESET: &str = "AT+KDOBJ=0,0\r";
/// Upload: enter object transfer mode.
pub const UPLOAD_INIT: &str = "AT+KDOBJ=1,1\r";
/// Upload: leave object transfer mode and commit the object.
pub const UPLOAD_CLOSE: &str = "AT+KDOBJ=1,0\r";

/// List the objects of a category.
pub fn list(category: Category) -> String {
    format!("AT+KPSL=\"{}\",1\r", category.wire_name())
}

/// Retrieve an object by id.
pub fn retrieve(id: &str) -> String {
    format!("AT+KPSR=\"{id}\"\r")
}

/// Delete an object by id.
pub fn delete(id: &str) -> String {
    format!("AT+KPSD=\"{id}\"\r")
}

/// Upload: announce the length of the destination name.
pub fn upload_name_length(chars: usize) -> String {
    format!("AT+KFNAME={chars}\r")
}

/// Upload: announce the type-ID and byte length of the payload.
pub fn upload_type_size(type_id: u16, size: usize) -> String {
    format!("AT+KPSW={type_id},{size}\r")
}

/// Set the ringer volume.
pub fn set_volume(level: u8) -> String {
    format!("AT+CLVL={level}\r")
}

/// Enter a PIN or PUK.
pub fn enter_pin(pin: &str) -> String {
    format!("AT+CPIN=\"{pin}\"\r")
}

/// Dial a voice call.
pub fn dial(number: &str) -> String {
    format!("ATD{number};\r")
}

/// Store an alarm.
pub fn set_alarm(alarm: &Alarm) -> String {
    format!("AT+CALA={}\r", alarm.serialize())
}

/// Delete an alarm slot.
pub fn delete_alarm(number: u32) -> String {
    format!("AT+CALD={number}\r")
}

/// Read one SMS.
pub fn read_message(id: &str) -> String {
    format!("AT+CMGR={id}\r")
}

/// Delete one SMS.
pub fn delete_message(id: &str) -> String {
    format!("AT+CMGD={id}\r")
}

/// Start sending an SMS; the phone answers with a `>` prompt.
pub fn send_message(number: &str) -> String {
    format!("AT+CMGS=\"{number}\"\r")
}

/// Terminate a raw command line read from a file.
pub fn raw(line: &str) -> String {
    let line = line.trim_end_matches(['\r', '\n']);
    format!("{line}{CR}")
}

/// Whether a dial string contains only characters a phone accepts.
pub fn is_dialable(number: &str) -> bool {
    !number.is_empty()
        && number
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '*' | '#' | 'p' | 'P' | 'w' | 'W'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines() {
        assert_eq!(list(Category::Pictures), "AT+KPSL=\"PICTURES\",1\r");
        assert_eq!(retrieve("00A1"), "AT+KPSR=\"00A1\"\r");
        assert_eq!(upload_type_size(257, 1024), "AT+KPSW=257,1024\r");
        assert_eq!(send_message("+4812"), "AT+CMGS=\"+4812\"\r");
        assert_eq!(dial("123"), "ATD123;\r");
        assert_eq!(raw("AT+CSQ\r\n"), "AT+CSQ\r");
    }

    #[test]
    fn test_is_dialable() {
        assert!(is_dialable("+48600100200"));
        assert!(is_dialable("*100#"));
        assert!(!is_dialable(""));
        assert!(!is_dialable("12;ATH"));
    }
}
