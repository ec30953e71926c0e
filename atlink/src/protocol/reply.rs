//! Parsers for structured replies.
//!
//! Replies mix status tokens (`OK`, `ERROR`, `NO CARRIER`), the echoed
//! command and `+XXXX:` records. Every parser here is lenient: a record it
//! cannot read is skipped, and "nothing found" is an empty list or `None`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::model::{Alarm, Element, Message, PinStatus, SignalQuality};
use crate::protocol::commands::{CONNECT, ERROR, NO_CARRIER, OK};

static KPSL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\+KPSL:\s*"([0-9A-Fa-f]+)",\s*(\d+),\s*(\d+),\s*"([^"]*)",\s*"([^"]*)",\s*"([^"]*)",\s*"([^"]*)",\s*"([^"]*)""#,
    )
    .expect("listing pattern is valid")
});

/// Message header shapes, most complete first.
static MESSAGE_SHAPES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        // id, status, number, [alpha,] datetime, body
        Regex::new(
            r#"\+CMG[LR]:\s*(?P<id>\d+)\s*,\s*"(?P<status>[^"]*)"\s*,\s*"(?P<number>[^"]*)"(?:\s*,\s*(?:"[^"]*"|[^,"\r\n]*))?\s*,\s*"(?P<datetime>[^"]*)"[^\r\n]*\r?\n(?P<body>[^\r\n]*)"#,
        )
        .expect("message pattern is valid"),
        // status, number, [alpha,] datetime, body
        Regex::new(
            r#"\+CMG[LR]:\s*"(?P<status>[^"]*)"\s*,\s*"(?P<number>[^"]*)"(?:\s*,\s*(?:"[^"]*"|[^,"\r\n]*))?\s*,\s*"(?P<datetime>[^"]*)"[^\r\n]*\r?\n(?P<body>[^\r\n]*)"#,
        )
        .expect("message pattern is valid"),
        // id, status
        Regex::new(r#"\+CMG[LR]:\s*(?P<id>\d+)\s*,\s*"(?P<status>[^"]*)""#)
            .expect("message pattern is valid"),
        // status
        Regex::new(r#"\+CMG[LR]:\s*"(?P<status>[^"]*)""#).expect("message pattern is valid"),
    ]
});

static CSQ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+CSQ:\s*(\d+)\s*,\s*(\d+)").expect("signal pattern is valid"));

static CLVL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+CLVL:\s*(\d+)").expect("volume pattern is valid"));

static CPIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+CPIN:\s*([^\r\n]+)").expect("pin pattern is valid"));

/// Non-empty lines of a reply, trimmed.
fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
}

fn is_status_line(line: &str) -> bool {
    matches!(line, OK | ERROR | CONNECT | NO_CARRIER) || line.ends_with(ERROR)
}

/// Value of the first line starting with `tag`, with the tag stripped.
fn tagged<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    lines(text)
        .find_map(|l| l.strip_prefix(tag))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Succeed when the reply contains `OK` and no `ERROR`.
pub fn expect_ok(reply: &str) -> Result<()> {
    if reply.contains(OK) && !reply.contains(ERROR) {
        Ok(())
    } else {
        Err(Error::from_reply(reply))
    }
}

/// Visible elements of a `+KPSL` listing.
///
/// Hidden entries (second field non-zero) are skipped.
pub fn parse_element_list(text: &str) -> Vec<Element> {
    KPSL_RE
        .captures_iter(text)
        .filter(|caps| &caps[2] == "0")
        .map(|caps| Element::new(&caps[1], &caps[5], &caps[8]))
        .collect()
}

/// First message record in a `+CMGR`/`+CMGL` reply.
pub fn parse_message(text: &str) -> Option<Message> {
    MESSAGE_SHAPES.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let mut message = Message::new();
        if let Some(id) = caps.name("id") {
            message.set_id(id.as_str());
        }
        if let Some(status) = caps.name("status") {
            message.set_status(status.as_str());
        }
        if let Some(number) = caps.name("number") {
            message.set_recipient_number(number.as_str());
        }
        if let Some(datetime) = caps.name("datetime") {
            message.set_datetime(datetime.as_str());
        }
        if let Some(body) = caps.name("body") {
            message.set_body(body.as_str().trim_end());
        }
        Some(message)
    })
}

/// Every message record of a multi-record reply.
///
/// The reply is cut into chunks at each header line and each chunk is
/// parsed on its own.
pub fn parse_message_list(text: &str) -> Vec<Message> {
    let mut chunks: Vec<String> = Vec::new();
    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        let trimmed = line.trim();
        if trimmed.starts_with("+CMGL:") || trimmed.starts_with("+CMGR:") {
            chunks.push(format!("{trimmed}\n"));
        } else if let Some(chunk) = chunks.last_mut() {
            if trimmed.is_empty() || is_status_line(trimmed) {
                continue;
            }
            chunk.push_str(line);
            chunk.push('\n');
        }
    }
    chunks
        .iter()
        .filter_map(|chunk| parse_message(chunk))
        .collect()
}

/// Alarm records of a `+CALA?` reply.
pub fn parse_alarms(text: &str) -> Vec<Alarm> {
    lines(text)
        .filter(|l| l.starts_with("+CALA:"))
        .filter_map(Alarm::parse)
        .collect()
}

/// Firmware version from `+KPSV: <version>`.
pub fn parse_firmware(text: &str) -> Option<String> {
    tagged(text, "+KPSV:").map(str::to_string)
}

/// IMEI: the first line that is neither the echoed command nor a status
/// token.
pub fn parse_imei(text: &str, echoed: &str) -> Option<String> {
    let echoed = echoed.trim();
    lines(text)
        .find(|l| (echoed.is_empty() || !l.contains(echoed)) && !is_status_line(l))
        .map(str::to_string)
}

/// Device type from `+CGMR: <type>`.
pub fn parse_device_type(text: &str) -> Option<String> {
    tagged(text, "+CGMR:").map(str::to_string)
}

/// Own numbers from `+CNUM:` lines, comma-joined.
pub fn parse_subscriber_numbers(text: &str) -> Option<String> {
    let numbers: Vec<&str> = lines(text)
        .filter_map(|l| l.strip_prefix("+CNUM:"))
        .filter_map(|fields| fields.split(',').nth(1))
        .map(|n| n.trim().trim_matches('"'))
        .filter(|n| !n.is_empty())
        .collect();
    (!numbers.is_empty()).then(|| numbers.join(","))
}

/// Signal report from `+CSQ: <rssi>,<ber>`, found anywhere in the reply.
pub fn parse_signal(text: &str) -> Option<SignalQuality> {
    let caps = CSQ_RE.captures(text)?;
    Some(SignalQuality {
        rssi: caps[1].parse().ok()?,
        ber: caps[2].parse().ok()?,
    })
}

/// SIM lock state from `+CPIN: <state>`.
pub fn parse_pin_status(text: &str) -> Option<PinStatus> {
    let caps = CPIN_RE.captures(text)?;
    PinStatus::from_name(&caps[1])
}

/// Ringer volume from `+CLVL: <n>`.
pub fn parse_volume(text: &str) -> Option<u8> {
    let caps = CLVL_RE.captures(text)?;
    caps[1].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "AT+KPSL=\"PICTURES\",1\r\r\n\
        +KPSL: \"5303650005022001FFFF\",0,2345,\"PICTURES\",\"FGIF\",\"0000065535\",\"\",\"TestPicture\"\r\n\
        +KPSL: \"5303650005022002FFFF\",1,99,\"PICTURES\",\"FGIF\",\"0000065535\",\"\",\"Hidden\"\r\n\
        \r\nOK\r\n";

    #[test]
    fn test_element_list_skips_hidden() {
        let elements = parse_element_list(LISTING);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].id(), "5303650005022001FFFF");
        assert_eq!(elements[0].kind(), "FGIF");
        assert_eq!(elements[0].filename(), "TestPicture");
    }

    #[test]
    fn test_element_list_sanitizes_names() {
        let text = "+KPSL: \"01\",0,1,\"RINGS\",\"MIDI\",\"0\",\"\",\"My tune!\"";
        let elements = parse_element_list(text);
        assert_eq!(elements[0].filename(), "My_tune_");
        assert!(parse_element_list("\r\nOK\r\n").is_empty());
    }

    #[test]
    fn test_message_full_shape_with_id() {
        let text = "+CMGL: 3,\"REC READ\",\"+48600100200\",,\"23/05/14,10:15:00+08\",145,15\r\nSee you at noon\r\n\r\nOK";
        let msg = parse_message(text).unwrap();
        assert_eq!(msg.id(), Some("3"));
        assert_eq!(msg.status(), Some("REC READ"));
        assert_eq!(msg.recipient_number(), Some("+48600100200"));
        assert_eq!(msg.datetime(), Some("23/05/14,10:15:00+08"));
        assert_eq!(msg.body(), Some("See you at noon"));
    }

    #[test]
    fn test_message_full_shape_without_alpha() {
        let text = "+CMGL: 3,\"REC READ\",\"+48600100200\",\"23/05/14,10:15:00+08\",145\r\nHello there\r\n\r\nOK";
        let msg = parse_message(text).unwrap();
        assert_eq!(msg.id(), Some("3"));
        assert_eq!(msg.recipient_number(), Some("+48600100200"));
        assert_eq!(msg.datetime(), Some("23/05/14,10:15:00+08"));
        assert_eq!(msg.body(), Some("Hello there"));
    }

    #[test]
    fn test_message_full_shape_with_quoted_alpha() {
        let text = "+CMGR: \"REC READ\",\"+4812\",\"Bob\",\"23/05/15,08:00:00+08\"\r\nHi\r\nOK";
        let msg = parse_message(text).unwrap();
        assert_eq!(msg.recipient_number(), Some("+4812"));
        assert_eq!(msg.datetime(), Some("23/05/15,08:00:00+08"));
        assert_eq!(msg.body(), Some("Hi"));
    }

    #[test]
    fn test_message_full_shape_without_id() {
        let text = "\r\n+CMGR: \"REC UNREAD\",\"+4812\",,\"23/05/15,08:00:00+08\"\r\nCall me\r\n\r\nOK\r\n";
        let msg = parse_message(text).unwrap();
        assert_eq!(msg.id(), None);
        assert_eq!(msg.status(), Some("REC UNREAD"));
        assert_eq!(msg.body(), Some("Call me"));
    }

    #[test]
    fn test_message_not_full_shapes() {
        let msg = parse_message("+CMGL: 7,\"STO UNSENT\",\"\",").unwrap();
        assert_eq!(msg.id(), Some("7"));
        assert_eq!(msg.status(), Some("STO UNSENT"));
        assert_eq!(msg.body(), None);

        let msg = parse_message("+CMGR: \"STO SENT\"").unwrap();
        assert_eq!(msg.id(), None);
        assert_eq!(msg.status(), Some("STO SENT"));
    }

    #[test]
    fn test_message_no_shape() {
        assert!(parse_message("\r\nOK\r\n").is_none());
        assert!(parse_message("+CMGL: garbage").is_none());
    }

    #[test]
    fn test_message_list_splits_records() {
        let text = "\r\n+CMGL: 1,\"REC READ\",\"+1\",,\"23/01/01,00:00:00+00\"\r\nfirst\r\n\
            +CMGL: 2,\"REC UNREAD\",\"+2\",,\"23/01/02,00:00:00+00\"\r\nsecond\r\n\r\nOK\r\n";
        let messages = parse_message_list(text);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body(), Some("first"));
        assert_eq!(messages[1].id(), Some("2"));
        assert_eq!(messages[1].body(), Some("second"));
    }

    #[test]
    fn test_alarm_list() {
        let text = "+CALA: \"07:00:00\",1,0\r\n+CALA: \"24/12/22,18:00:00\",2,0\r\nOK";
        let alarms = parse_alarms(text);
        assert_eq!(alarms.len(), 2);
        assert!(alarms[0].is_for_all_days());
        assert!(alarms[1].is_one_time());
    }

    #[test]
    fn test_scalar_extractors() {
        assert_eq!(parse_firmware("\r\n+KPSV: 1.40.A\r\nOK").as_deref(), Some("1.40.A"));
        assert_eq!(
            parse_imei("AT+CGSN\r\r\n351234567890123\r\n\r\nOK\r\n", "AT+CGSN\r").as_deref(),
            Some("351234567890123")
        );
        assert_eq!(parse_imei("\r\nERROR\r\n", "AT+CGSN"), None);
        assert_eq!(parse_device_type("+CGMR: myX-8\r\nOK").as_deref(), Some("myX-8"));
        assert_eq!(
            parse_subscriber_numbers("+CNUM: \"Own\",\"+4860\",145\r\n+CNUM: \"Fax\",\"+4861\",145\r\nOK")
                .as_deref(),
            Some("+4860,+4861")
        );
        assert_eq!(parse_subscriber_numbers("OK"), None);
        assert_eq!(
            parse_signal("AT+CSQ\r+CSQ: 21,99\r\nOK"),
            Some(SignalQuality { rssi: 21, ber: 99 })
        );
        assert_eq!(parse_pin_status("+CPIN: SIM PIN\r\nOK"), Some(PinStatus::SimPin));
        assert_eq!(parse_volume("+CLVL:1\r\nOK"), Some(1));
        assert_eq!(parse_volume("OK"), None);
    }

    #[test]
    fn test_expect_ok() {
        assert!(expect_ok("\r\nOK\r\n").is_ok());
        assert!(matches!(expect_ok("\r\nERROR\r\n"), Err(Error::Rejected(_))));
        assert!(matches!(expect_ok(""), Err(Error::NoResponse)));
        assert!(matches!(expect_ok("NO CARRIER"), Err(Error::UnexpectedReply(_))));
    }
}
