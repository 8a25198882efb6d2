//! Plain-text rendering of sessions and messages.
//!
//! Model text goes through [`markdown::render`]; user text is printed as typed.

use std::io::{self, Write};

use mmchat_core::images::{decoded_len, parse_data_uri};
use mmchat_types::{ChatMessage, ChatSession, Citation, MessagePart, Role};

use super::markdown;

pub const LOADING_INDICATOR: &str = "Multimodal is thinking...";

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "You:",
        Role::Model => "Multimodal:",
    }
}

/// Writes a message as a labelled block followed by a blank line.
pub fn write_message<W: Write>(out: &mut W, message: &ChatMessage) -> io::Result<()> {
    writeln!(out, "{}", role_label(message.role))?;
    write_parts(out, message.role, &message.parts)?;
    writeln!(out)
}

/// Writes message parts in order, without the role label.
pub fn write_parts<W: Write>(out: &mut W, role: Role, parts: &[MessagePart]) -> io::Result<()> {
    for part in parts {
        match part {
            MessagePart::Text(text) if role == Role::Model => {
                writeln!(out, "{}", markdown::render(text))?;
            }
            MessagePart::Text(text) => writeln!(out, "{text}")?,
            MessagePart::Image(uri) => writeln!(out, "{}", image_placeholder(uri))?,
            MessagePart::Citation(citations) => write_sources(out, citations)?,
        }
    }
    Ok(())
}

fn write_sources<W: Write>(out: &mut W, citations: &[Citation]) -> io::Result<()> {
    writeln!(out, "Sources:")?;
    for citation in citations {
        writeln!(out, "- {} {}", citation.display_label(), citation.uri)?;
    }
    Ok(())
}

/// `[image: <mime>, <n> bytes]` for data URIs, `[image]` for anything else.
pub fn image_placeholder(uri: &str) -> String {
    match parse_data_uri(uri) {
        Some((mime_type, payload)) => {
            format!("[image: {mime_type}, {} bytes]", decoded_len(payload))
        }
        None => "[image]".to_string(),
    }
}

/// Writes a session header followed by every message.
pub fn write_transcript<W: Write>(out: &mut W, session: &ChatSession) -> io::Result<()> {
    writeln!(out, "== {} ({}) ==", session.title, session.id)?;
    if session.messages.is_empty() {
        writeln!(out, "(no messages yet)")?;
        return Ok(());
    }
    writeln!(out)?;
    for message in &session.messages {
        write_message(out, message)?;
    }
    Ok(())
}

/// One line of a session listing; `*` marks the current session.
pub fn session_line(session: &ChatSession, current: bool) -> String {
    let marker = if current { '*' } else { ' ' };
    let count = session.messages.len();
    let noun = if count == 1 { "message" } else { "messages" };
    format!("{marker} {}  {}  ({count} {noun})", session.id, session.title)
}
