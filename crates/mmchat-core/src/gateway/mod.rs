//! Model gateway: sends a conversation to the multimodal model and turns the
//! reply (or the failure) into a `model` message.
//!
//! The gateway never fails towards its caller. Transport errors come back as
//! an ordinary model message so history-append logic has a single path.

mod error;
pub mod gemini;

use std::future::Future;

use mmchat_types::{ChatMessage, Citation, MessagePart, Role};
use serde::{Deserialize, Serialize};

pub use error::{GatewayError, GatewayErrorKind, classify_reqwest_error};
pub use gemini::{GeminiClient, GeminiConfig};

use crate::config::Config;
use crate::images::parse_data_uri;

/// Prefix of the model message produced when a request fails.
pub const ERROR_REPLY_PREFIX: &str = "Error: Could not get response from the model.";

// ============================================================================
// Request wire types
// ============================================================================

/// Body of a `generateContent` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "system_instruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

/// One role-tagged turn (or the role-less system instruction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 payload
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Tool {
    #[serde(rename = "google_search")]
    GoogleSearch(GoogleSearch),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GoogleSearch {}

// ============================================================================
// Reply types
// ============================================================================

/// What a transport hands back on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebSource {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl GroundingChunk {
    pub fn web(uri: &str, title: Option<&str>) -> Self {
        Self {
            web: Some(WebSource {
                uri: Some(uri.to_string()),
                title: title.map(str::to_string),
            }),
        }
    }
}

/// External multimodal generation endpoint.
pub trait ModelTransport {
    /// Sends one request and waits for the complete reply.
    fn generate(
        &self,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<ModelReply, GatewayError>>;
}

/// Settings fixed for the lifetime of a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub system_prompt: String,
    pub google_search: bool,
}

impl GatewaySettings {
    /// Persona and search-tool switch taken from config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            system_prompt: config.effective_system_prompt().to_string(),
            google_search: config.google_search,
        }
    }
}

/// Stateless bridge between chat history and a [`ModelTransport`].
pub struct ModelGateway<T> {
    transport: T,
    settings: GatewaySettings,
}

impl<T: ModelTransport> ModelGateway<T> {
    pub fn new(transport: T, settings: GatewaySettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Builds the outgoing request for `history`.
    pub fn build_request(&self, history: &[ChatMessage]) -> GenerateRequest {
        let system = self.settings.system_prompt.trim();
        GenerateRequest {
            contents: build_contents(history),
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part::Text(system.to_string())],
            }),
            tools: if self.settings.google_search {
                vec![Tool::GoogleSearch(GoogleSearch::default())]
            } else {
                Vec::new()
            },
        }
    }

    /// Sends the conversation and returns the model's message.
    ///
    /// Failures are returned as a model message carrying the error text.
    pub async fn send_conversation(&self, history: &[ChatMessage]) -> ChatMessage {
        let request = self.build_request(history);
        tracing::debug!(
            contents = request.contents.len(),
            google_search = self.settings.google_search,
            "sending conversation"
        );

        match self.transport.generate(&request).await {
            Ok(reply) => reply_to_message(reply),
            Err(e) => {
                tracing::warn!(kind = %e.kind, error = %e, "model request failed");
                error_message(&e)
            }
        }
    }
}

/// Translates chat history into request contents.
///
/// Text parts become text segments, image data URIs become inline data, and
/// citation parts are dropped. Messages left without parts are skipped.
pub fn build_contents(history: &[ChatMessage]) -> Vec<Content> {
    history
        .iter()
        .filter_map(|message| {
            let parts: Vec<Part> = message.parts.iter().filter_map(to_request_part).collect();
            (!parts.is_empty()).then(|| Content {
                role: Some(message.role.as_str().to_string()),
                parts,
            })
        })
        .collect()
}

fn to_request_part(part: &MessagePart) -> Option<Part> {
    match part {
        MessagePart::Text(text) => Some(Part::Text(text.clone())),
        MessagePart::Image(uri) => {
            let (mime_type, data) = parse_data_uri(uri)?;
            Some(Part::InlineData(InlineData {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            }))
        }
        MessagePart::Citation(_) => None,
    }
}

/// Keeps grounding chunks with a non-empty web URI; the title falls back to the URI.
pub fn citations_from_grounding(metadata: &GroundingMetadata) -> Vec<Citation> {
    metadata
        .grounding_chunks
        .iter()
        .filter_map(|chunk| {
            let web = chunk.web.as_ref()?;
            let uri = web.uri.as_deref().filter(|uri| !uri.is_empty())?;
            let title = web
                .title
                .as_deref()
                .filter(|title| !title.is_empty())
                .unwrap_or(uri);
            Some(Citation::new(uri, title))
        })
        .collect()
}

/// Converts a successful reply into a model message.
pub fn reply_to_message(reply: ModelReply) -> ChatMessage {
    let mut parts = vec![MessagePart::text(reply.text)];
    if let Some(part) = reply
        .grounding
        .as_ref()
        .map(citations_from_grounding)
        .and_then(MessagePart::citation)
    {
        parts.push(part);
    }
    ChatMessage {
        role: Role::Model,
        parts,
    }
}

/// Model message describing a failed request.
pub fn error_message(error: &GatewayError) -> ChatMessage {
    ChatMessage::model_text(format!("{ERROR_REPLY_PREFIX} {error}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::composer::compose;

    /// Transport returning a canned result and recording the request it saw.
    struct MockTransport {
        result: Result<ModelReply, GatewayError>,
        seen: Mutex<Vec<GenerateRequest>>,
    }

    impl MockTransport {
        fn replying(result: Result<ModelReply, GatewayError>) -> Self {
            Self {
                result,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ModelTransport for MockTransport {
        async fn generate(&self, request: &GenerateRequest) -> Result<ModelReply, GatewayError> {
            self.seen.lock().unwrap().push(request.clone());
            self.result.clone()
        }
    }

    fn gateway(result: Result<ModelReply, GatewayError>) -> ModelGateway<MockTransport> {
        ModelGateway::new(
            MockTransport::replying(result),
            GatewaySettings {
                system_prompt: "You are a test persona.".to_string(),
                google_search: true,
            },
        )
    }

    #[tokio::test]
    async fn test_plain_reply_has_single_text_part() {
        let gateway = gateway(Ok(ModelReply {
            text: "Hi there".to_string(),
            grounding: None,
        }));
        let history = vec![compose("Hello", None).unwrap()];

        let reply = gateway.send_conversation(&history).await;
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({
                "role": "model",
                "parts": [{"type": "text", "content": "Hi there", "citations": []}]
            })
        );
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_model_message() {
        let gateway = gateway(Err(GatewayError::transport("timeout")));
        let history = vec![compose("Hello", None).unwrap()];

        let reply = gateway.send_conversation(&history).await;
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({
                "role": "model",
                "parts": [{
                    "type": "text",
                    "content": "Error: Could not get response from the model. timeout",
                    "citations": []
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_grounded_reply_appends_citation_part() {
        let gateway = gateway(Ok(ModelReply {
            text: "Rust 1.90 is out.".to_string(),
            grounding: Some(GroundingMetadata {
                grounding_chunks: vec![
                    GroundingChunk::web("https://blog.rust-lang.org", Some("Rust Blog")),
                    GroundingChunk::web("https://example.com/untitled", None),
                    GroundingChunk::default(),
                    GroundingChunk::web("", Some("No URI")),
                ],
            }),
        }));

        let reply = gateway.send_conversation(&[compose("news?", None).unwrap()]).await;
        assert_eq!(reply.parts.len(), 2);
        assert_eq!(
            reply.parts[1],
            MessagePart::Citation(vec![
                Citation::new("https://blog.rust-lang.org", "Rust Blog"),
                Citation::new(
                    "https://example.com/untitled",
                    "https://example.com/untitled"
                ),
            ])
        );
    }

    #[test]
    fn test_no_citation_part_without_web_uris() {
        let reply = reply_to_message(ModelReply {
            text: "ok".to_string(),
            grounding: Some(GroundingMetadata {
                grounding_chunks: vec![GroundingChunk::default(), GroundingChunk::web("", None)],
            }),
        });
        assert_eq!(reply.parts, vec![MessagePart::text("ok")]);

        let reply = reply_to_message(ModelReply {
            text: "ok".to_string(),
            grounding: Some(GroundingMetadata::default()),
        });
        assert_eq!(reply.parts.len(), 1);
    }

    #[tokio::test]
    async fn test_request_carries_directive_tool_and_translated_history() {
        let gateway = gateway(Ok(ModelReply::default()));
        let history = vec![
            ChatMessage::user(vec![
                MessagePart::text("What is this?"),
                MessagePart::image("data:image/png;base64,AQID"),
            ]),
            ChatMessage::model(vec![
                MessagePart::text("A pixel."),
                MessagePart::citation(vec![Citation::new("https://a.dev", "A")]).unwrap(),
            ]),
            ChatMessage::model(vec![
                MessagePart::citation(vec![Citation::new("https://b.dev", "B")]).unwrap(),
            ]),
            ChatMessage::user(vec![MessagePart::image("not-a-data-uri")]),
            ChatMessage::user(vec![MessagePart::text("Thanks")]),
        ];

        gateway.send_conversation(&history).await;

        let seen = gateway.transport().seen.lock().unwrap();
        let body = serde_json::to_value(&seen[0]).unwrap();
        assert_eq!(
            body,
            json!({
                "contents": [
                    {"role": "user", "parts": [
                        {"text": "What is this?"},
                        {"inlineData": {"mimeType": "image/png", "data": "AQID"}}
                    ]},
                    {"role": "model", "parts": [{"text": "A pixel."}]},
                    {"role": "user", "parts": [{"text": "Thanks"}]}
                ],
                "system_instruction": {"parts": [{"text": "You are a test persona."}]},
                "tools": [{"google_search": {}}]
            })
        );
    }

    #[test]
    fn test_settings_follow_config() {
        let config = Config {
            system_prompt: Some("Be brief.".to_string()),
            google_search: false,
            ..Config::default()
        };
        assert_eq!(
            GatewaySettings::from_config(&config),
            GatewaySettings {
                system_prompt: "Be brief.".to_string(),
                google_search: false,
            }
        );
    }

    #[test]
    fn test_search_tool_can_be_disabled() {
        let gateway = ModelGateway::new(
            MockTransport::replying(Ok(ModelReply::default())),
            GatewaySettings {
                system_prompt: String::new(),
                google_search: false,
            },
        );
        let request = gateway.build_request(&[]);
        assert!(request.tools.is_empty());
        assert!(request.system_instruction.is_none());
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"contents": []}));
    }
}
