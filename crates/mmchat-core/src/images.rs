//! Image attachments: path normalization, MIME detection and data URIs.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;

/// Normalizes user-provided file paths.
///
/// Handles common drag-and-drop shell escaping (`\ `, `\(`, `\)`) and
/// expands `~/` to the HOME directory when available.
#[must_use]
pub fn normalize_input_path(path: &str) -> PathBuf {
    let unescaped = path
        .trim()
        .replace("\\ ", " ")
        .replace("\\(", "(")
        .replace("\\)", ")");

    let path = Path::new(&unescaped);
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/"))
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(rest);
    }

    path.to_path_buf()
}

/// Returns MIME type inferred from file extension for supported image formats.
#[must_use]
pub fn mime_type_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|e| e.to_str())?;

    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Why an attachment could not be turned into a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingError {
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EncodingError {}

/// A single image attached to a user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub bytes: Vec<u8>,
    /// Declared MIME type; sniffed from the bytes when `None`.
    pub mime_type: Option<String>,
}

impl ImageAttachment {
    pub fn new(bytes: Vec<u8>, mime_type: Option<String>) -> Self {
        Self { bytes, mime_type }
    }

    /// Reads an image file, taking the MIME type from its extension when known.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn from_path(raw_path: &str) -> Result<Self, EncodingError> {
        let path = normalize_input_path(raw_path);
        let bytes = std::fs::read(&path)
            .map_err(|e| EncodingError::new(format!("{}: {e}", path.display())))?;
        let mime_type = mime_type_for_extension(&path).map(str::to_string);
        Ok(Self { bytes, mime_type })
    }

    /// Resolves the MIME type: declared if present, else sniffed.
    ///
    /// # Errors
    /// Returns an error if the payload is empty or not recognizably an image.
    pub fn resolve_mime_type(&self) -> Result<String, EncodingError> {
        if self.bytes.is_empty() {
            return Err(EncodingError::new("Image is empty"));
        }
        if let Some(declared) = self.mime_type.as_deref().map(str::trim)
            && !declared.is_empty()
        {
            if !declared.starts_with("image/") {
                return Err(EncodingError::new(format!(
                    "Unsupported attachment type: {declared}"
                )));
            }
            return Ok(declared.to_string());
        }
        match infer::get(&self.bytes) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
                Ok(kind.mime_type().to_string())
            }
            Some(kind) => Err(EncodingError::new(format!(
                "Unsupported attachment type: {}",
                kind.mime_type()
            ))),
            None => Err(EncodingError::new("Could not detect image type")),
        }
    }

    /// Encodes the attachment as `data:<mime>;base64,<payload>`.
    ///
    /// # Errors
    /// Returns an error if the MIME type cannot be resolved.
    pub fn to_data_uri(&self) -> Result<String, EncodingError> {
        let mime_type = self.resolve_mime_type()?;
        Ok(encode_data_uri(&mime_type, &self.bytes))
    }
}

/// Builds a base64 data URI.
pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{payload}")
}

/// Splits a `data:<mime>;base64,<payload>` URI into `(mime, payload)`.
///
/// Returns `None` for anything else, including non-base64 data URIs.
pub fn parse_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:")?;
    let (mime_type, payload) = rest.split_once(";base64,")?;
    if mime_type.is_empty() {
        return None;
    }
    Some((mime_type, payload))
}

/// Number of bytes a standard base64 payload decodes to, padded or not.
pub fn decoded_len(payload: &str) -> usize {
    payload.trim_end_matches('=').len() * 3 / 4
}
