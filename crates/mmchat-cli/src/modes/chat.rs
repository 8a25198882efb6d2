//! Interactive chat loop.
//!
//! Reads lines from `input`; lines starting with `:` are commands, anything
//! else is sent to the current session. Exits on `:q` or EOF.

use std::io::{BufRead, Write};

use anyhow::Result;
use mmchat_core::controller::SessionController;
use mmchat_core::gateway::{ModelGateway, ModelTransport};
use mmchat_core::images::ImageAttachment;
use mmchat_core::store::KeyValueStore;

use super::render;

const PROMPT_PREFIX: &str = "you> ";

const HELP: &str = "\
Commands:
  :new             start a new session
  :list            list sessions (* marks the current one)
  :switch <id>     switch to a session
  :delete <id>     delete a session
  :image <path>    attach an image to the next message
  :clear-image     drop the attached image
  :help            show this help
  :q               quit
With an image attached, an empty line sends the image on its own.";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Quit,
    New,
    List,
    Switch(String),
    Delete(String),
    Image(String),
    ClearImage,
    Help,
    Invalid(String),
    Message(String),
}

fn parse_line(line: &str) -> Command {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix(':') else {
        return Command::Message(trimmed.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match (name, arg.is_empty()) {
        ("q" | "quit", _) => Command::Quit,
        ("new", _) => Command::New,
        ("list", _) => Command::List,
        ("help", _) => Command::Help,
        ("clear-image", _) => Command::ClearImage,
        ("switch", false) => Command::Switch(arg.to_string()),
        ("delete", false) => Command::Delete(arg.to_string()),
        ("image", false) => Command::Image(arg.to_string()),
        ("switch" | "delete", true) => Command::Invalid(format!("Usage: :{name} <id>")),
        ("image", true) => Command::Invalid("Usage: :image <path>".to_string()),
        _ => Command::Invalid(format!("Unknown command :{name}. Type :help for commands.")),
    }
}

/// Runs the chat loop until `:q` or end of input.
pub async fn run_chat<S, T, R, W>(
    controller: &mut SessionController<S>,
    gateway: &ModelGateway<T>,
    input: R,
    output: &mut W,
) -> Result<()>
where
    S: KeyValueStore,
    T: ModelTransport,
    R: BufRead,
    W: Write,
{
    let mut staged_image: Option<ImageAttachment> = None;

    writeln!(output, "mmchat {}. Type :help for commands, :q to quit.", env!("CARGO_PKG_VERSION"))?;
    if let Some(session) = controller.current_session() {
        render::write_transcript(output, session)?;
    }
    write!(output, "{PROMPT_PREFIX}")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;

        match parse_line(&line) {
            Command::Quit => {
                writeln!(output, "Goodbye!")?;
                return Ok(());
            }
            Command::Help => writeln!(output, "{HELP}")?,
            Command::Invalid(message) => writeln!(output, "{message}")?,
            Command::New => {
                let id = controller.create_session();
                writeln!(output, "Started {id}.")?;
            }
            Command::List => {
                let current = controller.current_session_id().map(str::to_string);
                for session in controller.sessions() {
                    let is_current = current.as_deref() == Some(session.id.as_str());
                    writeln!(output, "{}", render::session_line(session, is_current))?;
                }
            }
            Command::Switch(id) => {
                controller.select_session(&id);
                match controller.current_session() {
                    Some(session) => render::write_transcript(output, session)?,
                    None => writeln!(
                        output,
                        "No session {id}. Use :list to see sessions or :new to start one."
                    )?,
                }
            }
            Command::Delete(id) => {
                if controller.session(&id).is_none() {
                    writeln!(output, "No session {id}.")?;
                } else {
                    controller.delete_session(&id);
                    writeln!(output, "Deleted {id}.")?;
                    if let Some(session) = controller.current_session() {
                        writeln!(output, "Now in {} ({}).", session.title, session.id)?;
                    }
                }
            }
            Command::Image(path) => match stage_image(&path) {
                Ok((image, mime_type)) => {
                    writeln!(
                        output,
                        "Attached {path} ({mime_type}, {} bytes).",
                        image.bytes.len()
                    )?;
                    staged_image = Some(image);
                }
                Err(message) => writeln!(output, "Could not attach image: {message}")?,
            },
            Command::ClearImage => {
                if staged_image.take().is_some() {
                    writeln!(output, "Image removed.")?;
                }
            }
            Command::Message(text) => {
                if text.is_empty() && staged_image.is_none() {
                    write!(output, "{PROMPT_PREFIX}")?;
                    output.flush()?;
                    continue;
                }

                let turn = match controller.begin_send(&text, staged_image.as_ref()) {
                    Ok(turn) => turn,
                    Err(e) => {
                        writeln!(output, "{e}")?;
                        write!(output, "{PROMPT_PREFIX}")?;
                        output.flush()?;
                        continue;
                    }
                };
                staged_image = None;

                writeln!(output, "{}", render::LOADING_INDICATOR)?;
                output.flush()?;

                let reply = gateway.send_conversation(&turn.history).await;
                writeln!(output)?;
                render::write_message(output, &reply)?;
                controller.finish_send(turn, reply);
            }
        }

        write!(output, "{PROMPT_PREFIX}")?;
        output.flush()?;
    }

    writeln!(output)?;
    Ok(())
}

fn stage_image(path: &str) -> Result<(ImageAttachment, String), String> {
    let image = ImageAttachment::from_path(path).map_err(|e| e.to_string())?;
    let mime_type = image.resolve_mime_type().map_err(|e| e.to_string())?;
    Ok((image, mime_type))
}
