//! Alarm slots.

use anyhow::Result;
use atlink::error::codes;
use atlink::{Alarm, Request, Response};
use chrono::{NaiveDate, NaiveTime};
use console::style;

use super::{Failed, Session};

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// `alarms`.
pub(crate) fn list(session: &mut Session) -> Result<()> {
    let response = session.call(Request::GetAlarms)?;
    if session.json() {
        return session.print_json(response);
    }
    let Response::Alarms(alarms) = response else {
        return Ok(());
    };

    if alarms.is_empty() && session.chatty() {
        eprintln!("{} No alarms set", style("ℹ").blue());
    }
    for alarm in &alarms {
        println!(
            "#{:<3} {}  {}",
            alarm.number(),
            alarm.time().format("%H:%M:%S"),
            schedule(alarm)
        );
    }
    Ok(())
}

fn schedule(alarm: &Alarm) -> String {
    if let Some(date) = alarm.date() {
        return format!("once on {}", date.format("%Y-%m-%d"));
    }
    if alarm.is_for_all_days() {
        return "every day".to_string();
    }
    alarm
        .days()
        .iter()
        .filter_map(|d| WEEKDAYS.get(usize::from(*d).wrapping_sub(1)))
        .copied()
        .collect::<Vec<_>>()
        .join(",")
}

/// `alarm-add TIME [--date D | --days 1,3] [--slot N]`.
pub(crate) fn add(
    session: &mut Session,
    time: &str,
    date: Option<&str>,
    days: &[u8],
    slot: u32,
) -> Result<()> {
    let alarm = build_alarm(time, date, days, slot)?;
    session.call(Request::AddAlarm(alarm))?;
    session.done(&format!("Alarm {slot} set"))
}

fn build_alarm(time: &str, date: Option<&str>, days: &[u8], slot: u32) -> Result<Alarm, Failed> {
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .map_err(|_| Failed::new(codes::INVALID_PARAMETER, format!("Invalid time: {time}")))?;

    if let Some(date) = date {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| Failed::new(codes::INVALID_PARAMETER, format!("Invalid date: {date}")))?;
        return Ok(Alarm::one_time(date, time, slot));
    }

    if let Some(bad) = days.iter().find(|d| !(1..=7).contains(*d)) {
        return Err(Failed::new(
            codes::INVALID_PARAMETER,
            format!("Invalid weekday: {bad} (1 = Monday ... 7 = Sunday)"),
        ));
    }
    Ok(Alarm::weekly(time, slot, days.iter().copied()))
}

/// `alarm-delete SLOT`.
pub(crate) fn delete(session: &mut Session, slot: u32) -> Result<()> {
    session.call(Request::DeleteAlarm(slot))?;
    session.done(&format!("Alarm {slot} deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_daily_alarm() {
        let alarm = build_alarm("06:30", None, &[], 2).unwrap();
        assert!(alarm.is_for_all_days());
        assert_eq!(alarm.number(), 2);
        assert_eq!(alarm.serialize(), "\"06:30:00\",2,0");
    }

    #[test]
    fn test_build_weekly_alarm() {
        let alarm = build_alarm("21:15:10", None, &[5, 1], 1).unwrap();
        assert_eq!(alarm.serialize(), "\"21:15:10\",1,1,5");
        assert_eq!(schedule(&alarm), "Mon,Fri");
    }

    #[test]
    fn test_build_one_time_alarm() {
        let alarm = build_alarm("07:00", Some("2024-03-09"), &[], 1).unwrap();
        assert!(alarm.is_one_time());
        assert_eq!(schedule(&alarm), "once on 2024-03-09");
    }

    #[test]
    fn test_build_alarm_rejects_bad_input() {
        assert_eq!(
            build_alarm("25:00", None, &[], 1)
                .unwrap_err()
                .exit_status(),
            9
        );
        assert!(build_alarm("07:00", Some("09/03/2024"), &[], 1).is_err());
        assert!(build_alarm("07:00", None, &[0], 1).is_err());
        assert!(build_alarm("07:00", None, &[8], 1).is_err());
    }
}
