//! SMS listing, sending and deletion.

use anyhow::Result;
use atlink::{Message, Request, Response};
use console::style;

use super::Session;

/// `sms-list`.
pub(crate) fn list(session: &mut Session) -> Result<()> {
    let response = session.call(Request::GetMessages)?;
    if session.json() {
        return session.print_json(response);
    }
    let Response::Messages(messages) = response else {
        return Ok(());
    };

    if messages.is_empty() && session.chatty() {
        eprintln!("{} No messages", style("ℹ").blue());
    }
    for message in &messages {
        println!("{}", header(message));
        if let Some(body) = message.body() {
            for line in body.lines() {
                println!("    {line}");
            }
        }
    }
    Ok(())
}

fn header(message: &Message) -> String {
    format!(
        "[{}] {:<10} {:<16} {}",
        message.id().unwrap_or("-"),
        message.status().unwrap_or(""),
        message.recipient_number().unwrap_or(""),
        message.datetime().unwrap_or("")
    )
}

/// `sms-send NUMBER BODY`.
pub(crate) fn send(session: &mut Session, number: &str, body: &str) -> Result<()> {
    session.call(Request::SendMessage(Message::outgoing(number, body)))?;
    session.done(&format!("Message sent to {number}"))
}

/// `sms-delete ID`.
pub(crate) fn delete(session: &mut Session, id: &str) -> Result<()> {
    session.call(Request::DeleteMessage(id.to_string()))?;
    session.done(&format!("Deleted message {id}"))
}
