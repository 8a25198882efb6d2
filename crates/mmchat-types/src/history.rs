//! Ordered id → session mapping.

use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::ChatSession;

/// All sessions keyed by id, iterated in creation order.
///
/// Serializes as a JSON object whose key order is the creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatHistory {
    order: Vec<String>,
    sessions: HashMap<String, ChatSession>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ChatSession> {
        self.sessions.get_mut(id)
    }

    /// Inserts a session under its own id.
    ///
    /// Replacing an existing id keeps its original position.
    pub fn insert(&mut self, session: ChatSession) {
        if !self.sessions.contains_key(&session.id) {
            self.order.push(session.id.clone());
        }
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn remove(&mut self, id: &str) -> Option<ChatSession> {
        let removed = self.sessions.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    /// Oldest session id.
    pub fn first_id(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// Most recently inserted session id.
    pub fn last_id(&self) -> Option<&str> {
        self.order.last().map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Sessions in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &ChatSession> {
        self.order.iter().filter_map(|id| self.sessions.get(id))
    }
}

impl Serialize for ChatHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|session| (&session.id, session)))
    }
}

impl<'de> Deserialize<'de> for ChatHistory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // `Map` keeps document order (serde_json `preserve_order`).
        let entries = Map::<String, Value>::deserialize(deserializer)?;
        let mut history = ChatHistory::new();
        for (key, value) in entries {
            let session: ChatSession = serde_json::from_value(value).map_err(D::Error::custom)?;
            if session.id != key {
                return Err(D::Error::custom(format!(
                    "session stored under '{key}' has id '{}'",
                    session.id
                )));
            }
            history.insert(session);
        }
        Ok(history)
    }
}
