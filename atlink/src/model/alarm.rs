//! Alarm records and their command-fragment form.
//!
//! The phone speaks two shapes:
//!
//! ```text
//! "DD/MM/YY,HH:MM:SS",N,0       one-time alarm on a given date
//! "HH:MM:SS",N,0                every day
//! "HH:MM:SS",N,1,3,5            on the listed weekdays (1 = Monday)
//! ```
//!
//! Only whole seconds and a two-digit year survive the trip.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use regex::Regex;

static ALARM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        "(?:(\d{2})/(\d{2})/(\d{2}),)?     # optional DD/MM/YY,
        (\d{1,2}):(\d{2}):(\d{2})"         # HH:MM:SS
        (?:\s*,\s*(\d+))?                  # ,number
        ((?:\s*,\s*\d+)*)                  # ,day,day...
        "#,
    )
    .expect("alarm pattern is valid")
});

/// An alarm slot on the phone.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alarm {
    date: Option<NaiveDate>,
    time: NaiveTime,
    number: u32,
    days: BTreeSet<u8>,
}

impl Alarm {
    /// An alarm that rings once at the given date and time.
    pub fn one_time(date: NaiveDate, time: NaiveTime, number: u32) -> Self {
        Self {
            date: Some(date),
            time: truncate_seconds(time),
            number,
            days: BTreeSet::new(),
        }
    }

    /// An alarm that rings every day.
    pub fn daily(time: NaiveTime, number: u32) -> Self {
        Self {
            date: None,
            time: truncate_seconds(time),
            number,
            days: BTreeSet::new(),
        }
    }

    /// An alarm that rings on the given weekdays (1 = Monday … 7 = Sunday).
    ///
    /// Out-of-range days are dropped; an empty set means every day.
    pub fn weekly(time: NaiveTime, number: u32, days: impl IntoIterator<Item = u8>) -> Self {
        Self {
            date: None,
            time: truncate_seconds(time),
            number,
            days: days
                .into_iter()
                .filter(|d| (1..=7).contains(d))
                .collect(),
        }
    }

    /// Date of a one-time alarm.
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Time of day.
    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// Slot number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Whether the alarm rings only once.
    pub fn is_one_time(&self) -> bool {
        self.date.is_some()
    }

    /// Whether a recurring alarm rings every day.
    pub fn is_for_all_days(&self) -> bool {
        self.date.is_none() && self.days.is_empty()
    }

    /// Weekdays of a recurring alarm, sorted.
    pub fn days(&self) -> &BTreeSet<u8> {
        &self.days
    }

    /// Set the slot number.
    pub fn set_number(&mut self, number: u32) {
        self.number = number;
    }

    /// Command fragment for `AT+CALA=`.
    pub fn serialize(&self) -> String {
        let when = match self.date {
            Some(date) => format!(
                "{:02}/{:02}/{:02},{}",
                date.day(),
                date.month(),
                date.year().rem_euclid(100),
                format_time(self.time)
            ),
            None => format_time(self.time),
        };
        let days = if self.date.is_some() || self.days.is_empty() {
            "0".to_string()
        } else {
            self.days
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        format!("\"{when}\",{},{days}", self.number)
    }

    /// Parse an alarm from a reply line or a serialized fragment.
    ///
    /// A missing date means the alarm recurs every day; a trailing list of
    /// weekdays restricts it.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = ALARM_RE.captures(text)?;
        let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

        let time = NaiveTime::from_hms_opt(num(4)?, num(5)?, num(6)?)?;
        let number = num(7).unwrap_or(0);

        if caps.get(1).is_some() {
            let year = 2000 + i32::try_from(num(3)?).ok()?;
            let date = NaiveDate::from_ymd_opt(year, num(2)?, num(1)?)?;
            return Some(Self::one_time(date, time, number));
        }

        let days = caps
            .get(8)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .filter_map(|d| d.trim().parse::<u8>().ok())
                    .filter(|d| *d != 0)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Some(Self::weekly(time, number, days))
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

fn truncate_seconds(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}

fn format_time(time: NaiveTime) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_serialize_shapes() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 7).unwrap();
        assert_eq!(
            Alarm::one_time(date, hms(6, 30, 0), 1).serialize(),
            "\"07/01/23,06:30:00\",1,0"
        );
        assert_eq!(Alarm::daily(hms(7, 0, 0), 2).serialize(), "\"07:00:00\",2,0");
        assert_eq!(
            Alarm::weekly(hms(7, 15, 5), 3, [5, 1, 3]).serialize(),
            "\"07:15:05\",3,1,3,5"
        );
    }

    #[test]
    fn test_parse_one_time() {
        let alarm = Alarm::parse("+CALA: \"24/12/22,18:00:00\",4").unwrap();
        assert!(alarm.is_one_time());
        assert!(!alarm.is_for_all_days());
        assert_eq!(alarm.date(), NaiveDate::from_ymd_opt(2022, 12, 24));
        assert_eq!(alarm.time(), hms(18, 0, 0));
        assert_eq!(alarm.number(), 4);
    }

    #[test]
    fn test_parse_recurring_without_number() {
        let alarm = Alarm::parse("+CALA: \"06:45:00\"").unwrap();
        assert!(!alarm.is_one_time());
        assert!(alarm.is_for_all_days());
        assert_eq!(alarm.number(), 0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Alarm::parse("OK").is_none());
        assert!(Alarm::parse("\"25:61:00\",1").is_none());
    }

    #[test]
    fn test_round_trip_serializer_output() {
        let date = NaiveDate::from_ymd_opt(2031, 3, 9).unwrap();
        let samples = [
            Alarm::one_time(date, hms(23, 59, 59), 1),
            Alarm::daily(hms(0, 0, 1), 2),
            Alarm::weekly(hms(12, 0, 0), 5, [7, 6]),
            Alarm::weekly(hms(8, 8, 8), 9, [1, 2, 3, 4, 5, 6, 7]),
        ];
        for alarm in samples {
            let text = alarm.serialize();
            let parsed = Alarm::parse(&text).unwrap();
            assert_eq!(parsed.serialize(), text);
            assert_eq!(parsed, alarm);
        }
    }

    #[test]
    fn test_weekly_drops_out_of_range_days() {
        let alarm = Alarm::weekly(hms(9, 0, 0), 1, [0, 8, 2]);
        assert_eq!(alarm.days().iter().copied().collect::<Vec<_>>(), vec![2]);
    }
}
