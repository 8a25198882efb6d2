//! Turns raw user input into a structured user message.

use std::fmt;

use mmchat_types::{ChatMessage, MessagePart};

use crate::images::{EncodingError, ImageAttachment};

/// Why a user turn could not be composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// Neither text nor image was supplied.
    Empty,
    /// The image could not be encoded; nothing should be appended.
    Encoding(EncodingError),
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::Empty => write!(f, "Nothing to send: type a message or attach an image"),
            ComposeError::Encoding(e) => write!(f, "Could not attach image: {e}"),
        }
    }
}

impl std::error::Error for ComposeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComposeError::Empty => None,
            ComposeError::Encoding(e) => Some(e),
        }
    }
}

impl From<EncodingError> for ComposeError {
    fn from(e: EncodingError) -> Self {
        Self::Encoding(e)
    }
}

/// Whether a send may be attempted with this input.
pub fn can_send(text: &str, image: Option<&ImageAttachment>) -> bool {
    !text.trim().is_empty() || image.is_some()
}

/// Builds a user message: a trimmed text part (if any) followed by an image part (if any).
///
/// The image is encoded before anything is assembled, so an encoding failure
/// never yields a partial message.
///
/// # Errors
/// Returns [`ComposeError::Empty`] when there is nothing to send and
/// [`ComposeError::Encoding`] when the image cannot be encoded.
pub fn compose(text: &str, image: Option<&ImageAttachment>) -> Result<ChatMessage, ComposeError> {
    if !can_send(text, image) {
        return Err(ComposeError::Empty);
    }

    let image_uri = image.map(ImageAttachment::to_data_uri).transpose()?;

    let mut parts = Vec::with_capacity(2);
    let text = text.trim();
    if !text.is_empty() {
        parts.push(MessagePart::text(text));
    }
    if let Some(uri) = image_uri {
        parts.push(MessagePart::image(uri));
    }

    Ok(ChatMessage::user(parts))
}
