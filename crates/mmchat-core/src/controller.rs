//! Session controller: owns the chat history, the active session and the
//! in-flight flag, and persists the history after every mutation.

use std::fmt;

use mmchat_types::{ChatHistory, ChatMessage, ChatSession};

use crate::composer::{ComposeError, compose};
use crate::gateway::{ModelGateway, ModelTransport};
use crate::images::ImageAttachment;
use crate::store::{KeyValueStore, LoadedHistory, load_history, save_history};

/// Why a send was not started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// A reply is still pending.
    Busy,
    /// The current session id does not name a session.
    NoActiveSession,
    /// The input could not be turned into a message.
    Compose(ComposeError),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Busy => write!(f, "Still waiting for the previous reply"),
            SendError::NoActiveSession => write!(f, "No active chat session"),
            SendError::Compose(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SendError::Compose(e) => Some(e),
            SendError::Busy | SendError::NoActiveSession => None,
        }
    }
}

impl From<ComposeError> for SendError {
    fn from(e: ComposeError) -> Self {
        Self::Compose(e)
    }
}

/// A user turn waiting for its reply.
///
/// The reply goes to `session_id`, the session active when the turn began,
/// even if the user has switched away since.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub session_id: String,
    /// Session messages including the new user message.
    pub history: Vec<ChatMessage>,
}

pub struct SessionController<S> {
    store: S,
    history: ChatHistory,
    current_session_id: Option<String>,
    loading: bool,
}

impl<S: KeyValueStore> SessionController<S> {
    /// Restores the persisted history and selects its last session.
    ///
    /// Absent, empty or unreadable storage starts a fresh session instead.
    pub fn open(store: S) -> Self {
        let mut controller = Self {
            store,
            history: ChatHistory::new(),
            current_session_id: None,
            loading: false,
        };

        match load_history(&controller.store) {
            LoadedHistory::Restored(history) => {
                tracing::debug!(sessions = history.len(), "restored chat history");
                controller.current_session_id = history.last_id().map(str::to_string);
                controller.history = history;
            }
            LoadedHistory::Empty => {
                controller.create_session();
            }
            LoadedHistory::Unreadable(e) => {
                tracing::warn!(error = %format!("{e:#}"), "discarding stored chat history");
                controller.create_session();
            }
        }

        controller
    }

    /// Adds an empty "New Chat" session, makes it current and returns its id.
    pub fn create_session(&mut self) -> String {
        let id = self.next_session_id();
        self.history.insert(ChatSession::new(id.clone()));
        self.current_session_id = Some(id.clone());
        self.persist();
        id
    }

    /// Makes `id` current. An unknown id leaves no session active.
    pub fn select_session(&mut self, id: &str) {
        self.current_session_id = Some(id.to_string());
    }

    /// Removes a session, keeping a valid session selected afterwards.
    pub fn delete_session(&mut self, id: &str) {
        self.history.remove(id);

        if self.current_session_id.as_deref() == Some(id) {
            match self.history.first_id().map(str::to_string) {
                Some(first) => self.current_session_id = Some(first),
                None => {
                    // create_session persists
                    self.create_session();
                    return;
                }
            }
        }

        self.persist();
    }

    /// Appends to a session; returns `false` if the session no longer exists.
    pub fn append_message(&mut self, session_id: &str, message: ChatMessage) -> bool {
        let Some(session) = self.history.get_mut(session_id) else {
            tracing::debug!(session_id, "dropping message for missing session");
            return false;
        };
        session.push_message(message);
        self.persist();
        true
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session_id.as_deref()
    }

    pub fn current_session(&self) -> Option<&ChatSession> {
        self.current_session_id
            .as_deref()
            .and_then(|id| self.history.get(id))
    }

    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.history.get(id)
    }

    /// Sessions in creation order.
    pub fn sessions(&self) -> impl Iterator<Item = &ChatSession> {
        self.history.iter()
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Composes the user turn, appends it to the current session and marks
    /// a reply as pending.
    ///
    /// # Errors
    /// Returns [`SendError::Busy`] while a reply is pending,
    /// [`SendError::NoActiveSession`] without a valid current session, and
    /// [`SendError::Compose`] when the input cannot be composed. State is
    /// unchanged on error.
    pub fn begin_send(
        &mut self,
        text: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<PendingTurn, SendError> {
        if self.loading {
            return Err(SendError::Busy);
        }
        let session_id = self
            .current_session()
            .map(|session| session.id.clone())
            .ok_or(SendError::NoActiveSession)?;

        let message = compose(text, image)?;
        self.append_message(&session_id, message);
        self.loading = true;

        let history = self
            .history
            .get(&session_id)
            .map(|session| session.messages.clone())
            .unwrap_or_default();

        Ok(PendingTurn {
            session_id,
            history,
        })
    }

    /// Delivers the reply to the turn's session and clears the pending flag.
    ///
    /// Returns `false` when the session was deleted in the meantime.
    pub fn finish_send(&mut self, turn: PendingTurn, reply: ChatMessage) -> bool {
        self.loading = false;
        self.append_message(&turn.session_id, reply)
    }

    /// Runs a full turn against `gateway` and returns the model's message.
    ///
    /// # Errors
    /// See [`SessionController::begin_send`]. Gateway failures are not
    /// errors; they arrive as a model message.
    pub async fn send<T: ModelTransport>(
        &mut self,
        gateway: &ModelGateway<T>,
        text: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<ChatMessage, SendError> {
        let turn = self.begin_send(text, image)?;
        let reply = gateway.send_conversation(&turn.history).await;
        self.finish_send(turn, reply.clone());
        Ok(reply)
    }

    fn next_session_id(&self) -> String {
        let mut millis = chrono::Utc::now().timestamp_millis();
        loop {
            let id = format!("chat_{millis}");
            if !self.history.contains(&id) {
                return id;
            }
            millis += 1;
        }
    }

    fn persist(&self) {
        if let Err(e) = save_history(&self.store, &self.history) {
            tracing::warn!(error = %format!("{e:#}"), "failed to persist chat history");
        }
    }
}

#[cfg(test)]
mod tests {
    use mmchat_types::{DEFAULT_SESSION_TITLE, MessagePart, Role};

    use super::*;
    use crate::gateway::{GatewayError, GatewaySettings, GenerateRequest, ModelReply};
    use crate::store::{HISTORY_KEY, MemoryStore};

    struct EchoTransport;

    impl ModelTransport for EchoTransport {
        async fn generate(&self, request: &GenerateRequest) -> Result<ModelReply, GatewayError> {
            Ok(ModelReply {
                text: format!("{} turns", request.contents.len()),
                grounding: None,
            })
        }
    }

    struct FailingTransport;

    impl ModelTransport for FailingTransport {
        async fn generate(&self, _request: &GenerateRequest) -> Result<ModelReply, GatewayError> {
            Err(GatewayError::transport("timeout"))
        }
    }

    fn settings() -> GatewaySettings {
        GatewaySettings {
            system_prompt: "persona".to_string(),
            google_search: false,
        }
    }

    fn assert_current_is_valid<S: KeyValueStore>(controller: &SessionController<S>) {
        let id = controller.current_session_id().unwrap();
        assert!(controller.session(id).is_some(), "{id} is not a session");
    }

    fn stored_history(store: &MemoryStore) -> ChatHistory {
        let raw = store.get(HISTORY_KEY).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn test_fresh_store_starts_with_new_chat() {
        let controller = SessionController::open(MemoryStore::new());
        assert_eq!(controller.history().len(), 1);
        let session = controller.current_session().unwrap();
        assert_eq!(session.title, DEFAULT_SESSION_TITLE);
        assert!(session.messages.is_empty());
        assert!(session.id.starts_with("chat_"));
        assert_eq!(stored_history(controller.store()).len(), 1);
    }

    #[test]
    fn test_created_ids_are_unique() {
        let mut controller = SessionController::open(MemoryStore::new());
        let a = controller.create_session();
        let b = controller.create_session();
        let c = controller.create_session();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(controller.history().len(), 4);
        assert_eq!(controller.current_session_id(), Some(c.as_str()));
    }

    #[test]
    fn test_restore_selects_last_session() {
        let mut history = ChatHistory::new();
        history.insert(ChatSession::new("chat_1"));
        history.insert(ChatSession::new("chat_2"));
        let store = MemoryStore::with_entry(HISTORY_KEY, serde_json::to_string(&history).unwrap());

        let controller = SessionController::open(store);
        assert_eq!(controller.current_session_id(), Some("chat_2"));
        assert_eq!(controller.history(), &history);
    }

    #[test]
    fn test_corrupt_or_empty_storage_falls_back_to_fresh_session() {
        for raw in ["not json", "{}", "[]", r#"{"chat_1": {"id": "chat_9", "title": "x", "messages": []}}"#] {
            let controller = SessionController::open(MemoryStore::with_entry(HISTORY_KEY, raw));
            assert_eq!(controller.history().len(), 1, "input: {raw}");
            assert_eq!(
                controller.current_session().unwrap().title,
                DEFAULT_SESSION_TITLE
            );
        }
    }

    #[test]
    fn test_deleting_only_session_creates_a_new_one() {
        let mut controller = SessionController::open(MemoryStore::new());
        let only = controller.current_session_id().unwrap().to_string();

        controller.delete_session(&only);

        assert_eq!(controller.history().len(), 1);
        assert!(controller.session(&only).is_none());
        assert_eq!(
            controller.current_session().unwrap().title,
            DEFAULT_SESSION_TITLE
        );
        assert_current_is_valid(&controller);
        assert_eq!(stored_history(controller.store()).len(), 1);
    }

    #[test]
    fn test_deleting_current_selects_first_remaining() {
        let mut controller = SessionController::open(MemoryStore::new());
        let first = controller.current_session_id().unwrap().to_string();
        let second = controller.create_session();
        let third = controller.create_session();

        controller.delete_session(&third);
        assert_eq!(controller.current_session_id(), Some(first.as_str()));
        assert!(controller.session(&second).is_some());
        assert_current_is_valid(&controller);
    }

    #[test]
    fn test_deleting_other_session_keeps_current() {
        let mut controller = SessionController::open(MemoryStore::new());
        let first = controller.current_session_id().unwrap().to_string();
        let second = controller.create_session();

        controller.delete_session(&first);
        assert_eq!(controller.current_session_id(), Some(second.as_str()));

        controller.delete_session("chat_unknown");
        assert_eq!(controller.current_session_id(), Some(second.as_str()));
        assert_eq!(controller.history().len(), 1);
    }

    #[test]
    fn test_select_unknown_session_leaves_none_active() {
        let mut controller = SessionController::open(MemoryStore::new());
        controller.select_session("chat_missing");
        assert_eq!(controller.current_session_id(), Some("chat_missing"));
        assert!(controller.current_session().is_none());
        assert_eq!(
            controller.begin_send("hi", None),
            Err(SendError::NoActiveSession)
        );
    }

    #[test]
    fn test_first_user_text_sets_title() {
        let mut controller = SessionController::open(MemoryStore::new());
        let id = controller.current_session_id().unwrap().to_string();

        let long = "This is a very long first question about Rust lifetimes";
        assert!(controller.append_message(&id, ChatMessage::user(vec![MessagePart::text(long)])));
        assert!(controller.append_message(&id, ChatMessage::user(vec![MessagePart::text("later")])));

        let session = controller.session(&id).unwrap();
        assert_eq!(session.title, "This is a very long first ques...");
        assert_eq!(session.messages.len(), 2);
    }

    #[test]
    fn test_image_only_first_message_keeps_default_title() {
        let mut controller = SessionController::open(MemoryStore::new());
        let id = controller.current_session_id().unwrap().to_string();
        controller.append_message(
            &id,
            ChatMessage::user(vec![MessagePart::image("data:image/png;base64,AQID")]),
        );
        controller.append_message(&id, ChatMessage::user(vec![MessagePart::text("caption")]));
        assert_eq!(controller.session(&id).unwrap().title, DEFAULT_SESSION_TITLE);
    }

    #[test]
    fn test_append_to_missing_session_is_ignored() {
        let mut controller = SessionController::open(MemoryStore::new());
        let before = controller.history().clone();
        assert!(!controller.append_message("chat_gone", ChatMessage::model_text("late")));
        assert_eq!(controller.history(), &before);
    }

    #[tokio::test]
    async fn test_send_appends_user_and_model_messages() {
        let mut controller = SessionController::open(MemoryStore::new());
        let gateway = ModelGateway::new(EchoTransport, settings());

        let reply = controller.send(&gateway, "Hello", None).await.unwrap();
        assert_eq!(reply.first_text(), Some("1 turns"));

        let session = controller.current_session().unwrap();
        assert_eq!(session.title, "Hello");
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[1], reply);
        assert!(!controller.is_loading());

        controller.send(&gateway, "Again", None).await.unwrap();
        let session = controller.current_session().unwrap();
        assert_eq!(session.messages[3].first_text(), Some("3 turns"));
        assert_eq!(stored_history(controller.store()), *controller.history());
    }

    #[tokio::test]
    async fn test_gateway_failure_is_appended_as_model_message() {
        let mut controller = SessionController::open(MemoryStore::new());
        let gateway = ModelGateway::new(FailingTransport, settings());

        let reply = controller.send(&gateway, "Hello", None).await.unwrap();
        assert_eq!(
            reply.first_text(),
            Some("Error: Could not get response from the model. timeout")
        );
        assert_eq!(controller.current_session().unwrap().messages.len(), 2);
    }

    #[test]
    fn test_second_send_while_loading_is_refused() {
        let mut controller = SessionController::open(MemoryStore::new());
        let turn = controller.begin_send("first", None).unwrap();
        assert!(controller.is_loading());

        assert_eq!(controller.begin_send("second", None), Err(SendError::Busy));
        assert_eq!(controller.current_session().unwrap().messages.len(), 1);

        controller.finish_send(turn, ChatMessage::model_text("done"));
        assert!(!controller.is_loading());
        assert!(controller.begin_send("second", None).is_ok());
    }

    #[test]
    fn test_reply_goes_to_session_that_started_the_turn() {
        let mut controller = SessionController::open(MemoryStore::new());
        let origin = controller.current_session_id().unwrap().to_string();
        let turn = controller.begin_send("question", None).unwrap();
        assert_eq!(turn.session_id, origin);
        assert_eq!(turn.history.len(), 1);

        let other = controller.create_session();
        assert!(controller.finish_send(turn, ChatMessage::model_text("answer")));

        assert_eq!(controller.current_session_id(), Some(other.as_str()));
        assert!(controller.session(&other).unwrap().messages.is_empty());
        assert_eq!(controller.session(&origin).unwrap().messages.len(), 2);
    }

    #[test]
    fn test_reply_for_deleted_session_is_dropped() {
        let mut controller = SessionController::open(MemoryStore::new());
        let origin = controller.current_session_id().unwrap().to_string();
        let turn = controller.begin_send("question", None).unwrap();

        controller.delete_session(&origin);
        let before = controller.history().clone();

        assert!(!controller.finish_send(turn, ChatMessage::model_text("answer")));
        assert!(!controller.is_loading());
        assert_eq!(controller.history(), &before);
        assert_current_is_valid(&controller);
    }

    #[test]
    fn test_encoding_failure_leaves_state_unchanged() {
        let mut controller = SessionController::open(MemoryStore::new());
        let before = controller.history().clone();
        let image = ImageAttachment::new(b"not an image".to_vec(), None);

        let err = controller.begin_send("caption", Some(&image)).unwrap_err();
        assert!(matches!(err, SendError::Compose(ComposeError::Encoding(_))));
        assert_eq!(controller.history(), &before);
        assert!(!controller.is_loading());

        assert_eq!(
            controller.begin_send("  ", None),
            Err(SendError::Compose(ComposeError::Empty))
        );
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let mut controller = SessionController::open(MemoryStore::failing_writes());
        assert_eq!(controller.history().len(), 1);

        let id = controller.create_session();
        assert!(controller.append_message(&id, ChatMessage::user(vec![MessagePart::text("kept")])));

        assert_eq!(controller.history().len(), 2);
        assert_eq!(controller.session(&id).unwrap().title, "kept");
        assert!(controller.store().get(HISTORY_KEY).unwrap().is_none());
    }
}
