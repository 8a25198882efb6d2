//! Chat data model shared across mmchat crates.
//!
//! The serialized shape of these types is the persisted history record, so
//! field names and tags must stay stable:
//!
//! ```json
//! { "chat_1718000000000": {
//!     "id": "chat_1718000000000",
//!     "title": "What is in this picture?",
//!     "messages": [
//!       { "role": "user", "parts": [
//!           { "type": "text", "content": "What is in this picture?", "citations": [] },
//!           { "type": "image", "content": "data:image/png;base64,iVBO...", "citations": [] }
//!       ] }
//!     ] } }
//! ```

mod history;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use history::ChatHistory;

/// Title given to sessions that have not received a user text yet.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Maximum number of characters kept when deriving a title from user text.
pub const TITLE_MAX_CHARS: usize = 30;

/// A web source the model grounded its answer on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: String,
}

impl Citation {
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
        }
    }

    /// Label to show for this source: the title, else the URI's host, else the URI.
    pub fn display_label(&self) -> String {
        let title = self.title.trim();
        if !title.is_empty() {
            return title.to_string();
        }
        url::Url::parse(&self.uri)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.uri.clone())
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed fragment of a message.
///
/// Persisted as `{ "type", "content", "citations" }` where `citations` is only
/// populated for citation parts and `content` is empty for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPart", into = "RawPart")]
pub enum MessagePart {
    /// Raw text.
    Text(String),
    /// Image encoded as a `data:<mime>;base64,<payload>` URI.
    Image(String),
    /// Non-empty list of sources. Build with [`MessagePart::citation`].
    Citation(Vec<Citation>),
}

impl MessagePart {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn image(data_uri: impl Into<String>) -> Self {
        Self::Image(data_uri.into())
    }

    /// Returns `None` for an empty list; a citation part always carries sources.
    pub fn citation(citations: Vec<Citation>) -> Option<Self> {
        (!citations.is_empty()).then_some(Self::Citation(citations))
    }

    pub fn kind(&self) -> PartKind {
        match self {
            MessagePart::Text(_) => PartKind::Text,
            MessagePart::Image(_) => PartKind::Image,
            MessagePart::Citation(_) => PartKind::Citation,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePart::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Wire tag of a [`MessagePart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    Text,
    Image,
    Citation,
}

#[derive(Serialize, Deserialize)]
struct RawPart {
    #[serde(rename = "type")]
    kind: PartKind,
    #[serde(default)]
    content: String,
    #[serde(default)]
    citations: Vec<Citation>,
}

impl TryFrom<RawPart> for MessagePart {
    type Error = String;

    fn try_from(raw: RawPart) -> Result<Self, Self::Error> {
        match raw.kind {
            PartKind::Text if !raw.citations.is_empty() => {
                Err("text part with citations".to_string())
            }
            PartKind::Image if !raw.citations.is_empty() => {
                Err("image part with citations".to_string())
            }
            PartKind::Text => Ok(Self::Text(raw.content)),
            PartKind::Image => Ok(Self::Image(raw.content)),
            PartKind::Citation => Self::citation(raw.citations)
                .ok_or_else(|| "citation part without citations".to_string()),
        }
    }
}

impl From<MessagePart> for RawPart {
    fn from(part: MessagePart) -> Self {
        let kind = part.kind();
        match part {
            MessagePart::Text(content) | MessagePart::Image(content) => Self {
                kind,
                content,
                citations: Vec::new(),
            },
            MessagePart::Citation(citations) => Self {
                kind,
                content: String::new(),
                citations,
            },
        }
    }
}

/// A role-tagged, ordered list of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    pub fn user(parts: Vec<MessagePart>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(parts: Vec<MessagePart>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }

    /// Model message holding a single text part.
    pub fn model_text(text: impl Into<String>) -> Self {
        Self::model(vec![MessagePart::text(text)])
    }

    /// First text part, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(MessagePart::as_text)
    }

    /// A message needs at least one part before it can be sent.
    pub fn is_sendable(&self) -> bool {
        !self.parts.is_empty()
    }
}

/// One independent conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Creates an empty session titled [`DEFAULT_SESSION_TITLE`].
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: Vec::new(),
        }
    }

    /// Appends a message, deriving the title when it is the first message
    /// and carries user text. Later appends never touch the title.
    pub fn push_message(&mut self, message: ChatMessage) {
        if self.messages.is_empty()
            && message.role == Role::User
            && let Some(text) = message.first_text()
            && !text.is_empty()
        {
            self.title = derive_title(text);
        }
        self.messages.push(message);
    }
}

/// First [`TITLE_MAX_CHARS`] characters of `text`, with `...` appended when cut.
pub fn derive_title(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
