//! Liveness, identification, calls, volume, SIM PIN and command files.

use anyhow::Result;
use atlink::{DeviceInfo, Request, Response};
use console::style;
use std::path::Path;

use super::Session;

/// `test`: check that the phone answers.
pub(crate) fn test(session: &mut Session) -> Result<()> {
    session.call(Request::Test)?;
    session.done("Phone responds")
}

/// `info`: identification and status.
pub(crate) fn info(session: &mut Session) -> Result<()> {
    let response = session.call(Request::Info)?;
    if session.json() {
        return session.print_json(response);
    }
    if let Response::Info(info) = response {
        print_info(&info);
    }
    Ok(())
}

fn print_info(info: &DeviceInfo) {
    let field = |label: &str, value: Option<String>| {
        let value = value.unwrap_or_else(|| style("unknown").dim().to_string());
        println!("{:<12} {value}", style(label).bold());
    };
    field("Firmware:", info.firmware.clone());
    field("IMEI:", info.imei.clone());
    field("Device:", info.device_type.clone());
    field("Numbers:", info.subscriber_numbers.clone());
    field(
        "Signal:",
        info.signal.map(|s| match s.dbm() {
            Some(dbm) => format!("{dbm} dBm (rssi {}, ber {})", s.rssi, s.ber),
            None => format!("unknown (rssi {}, ber {})", s.rssi, s.ber),
        }),
    );
    field("SIM:", info.pin.map(|p| p.to_string()));
}

/// `dial`.
pub(crate) fn dial(session: &mut Session, number: &str) -> Result<()> {
    session.call(Request::Dial(number.to_string()))?;
    session.done(&format!("Dialing {number}"))
}

/// `hangup`.
pub(crate) fn hangup(session: &mut Session) -> Result<()> {
    session.call(Request::Hangup)?;
    session.done("Call ended")
}

/// `answer`.
pub(crate) fn answer(session: &mut Session) -> Result<()> {
    session.call(Request::Answer)?;
    session.done("Call answered")
}

/// `volume [LEVEL]`: read or set the ringer volume.
pub(crate) fn volume(session: &mut Session, level: Option<u8>) -> Result<()> {
    if let Some(level) = level {
        session.call(Request::SetVolume(level))?;
        return session.done(&format!("Volume set to {level}"));
    }

    let response = session.call(Request::GetVolume)?;
    if session.json() {
        return session.print_json(response);
    }
    if let Response::Volume(level) = response {
        println!("{level}");
    }
    Ok(())
}

/// `pin [CODE]`: show the SIM lock state or enter a code.
pub(crate) fn pin(session: &mut Session, code: Option<&str>) -> Result<()> {
    if let Some(code) = code {
        session.call(Request::EnterPin(code.to_string()))?;
        return session.done("PIN accepted");
    }

    let response = session.call(Request::PinStatus)?;
    if session.json() {
        return session.print_json(response);
    }
    if let Response::Pin(status) = response {
        println!("{status}");
    }
    Ok(())
}

/// `run FILE`: send each command line and print the replies.
pub(crate) fn run_file(session: &mut Session, file: &Path) -> Result<()> {
    let response = session.call(Request::RunCommandFile(file.to_path_buf()))?;
    if session.json() {
        return session.print_json(response);
    }
    if let Response::Transcript(pairs) = response {
        for (command, reply) in pairs {
            println!("{} {command}", style(">").cyan());
            println!("{reply}");
        }
    }
    Ok(())
}
