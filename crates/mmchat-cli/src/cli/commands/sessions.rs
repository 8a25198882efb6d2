//! Session command handlers.

use anyhow::{Result, bail};
use mmchat_core::store::{FileStore, LoadedHistory, load_history};
use mmchat_types::ChatHistory;

use super::open_controller;
use crate::modes::render;

/// Reads the stored history without creating a session as a side effect.
fn read_history() -> Result<ChatHistory> {
    match load_history(&FileStore::in_home()) {
        LoadedHistory::Restored(history) => Ok(history),
        LoadedHistory::Empty => Ok(ChatHistory::new()),
        LoadedHistory::Unreadable(e) => Err(e.context("read chat history")),
    }
}

pub fn list() -> Result<()> {
    let history = read_history()?;
    if history.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }
    // the latest session is the one a new chat resumes
    let latest = history.last_id();
    for session in history.iter() {
        let is_latest = latest == Some(session.id.as_str());
        println!("{}", render::session_line(session, is_latest));
    }
    Ok(())
}

pub fn show(id: &str) -> Result<()> {
    let history = read_history()?;
    let Some(session) = history.get(id) else {
        bail!("Session '{id}' not found");
    };
    let mut stdout = std::io::stdout().lock();
    render::write_transcript(&mut stdout, session)?;
    Ok(())
}

pub fn delete(id: &str) -> Result<()> {
    // Opening the controller persists a session; only do it for a real id.
    if read_history()?.get(id).is_none() {
        bail!("Session '{id}' not found");
    }
    let mut controller = open_controller();
    controller.delete_session(id);
    println!("Deleted session {id}");
    Ok(())
}

pub fn new_session() {
    let mut controller = open_controller();
    let id = controller.create_session();
    println!("{id}");
}
