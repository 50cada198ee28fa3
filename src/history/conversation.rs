//! Per-conversation message store
//!
//! A `ConversationHistory` is an append-only log of role-tagged messages
//! with creation/update timestamps. Timestamps serialize as RFC-3339
//! strings and tolerate `Z`-suffixed, offset, and naive forms on load.

use crate::types::{rfc3339, ChatMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single message stored in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Message role
    pub role: String,
    /// Message text
    pub content: String,
    /// When the message was recorded
    #[serde(with = "rfc3339")]
    pub timestamp: DateTime<Utc>,
    /// Optional per-message metadata (finish reason, token usage, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl StoredMessage {
    /// Record a message with the current time
    pub fn new(
        role: impl Into<String>,
        content: impl Into<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

impl From<&StoredMessage> for ChatMessage {
    fn from(message: &StoredMessage) -> Self {
        ChatMessage::new(message.role.clone(), message.content.clone())
    }
}

/// An ordered message log for one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    /// Conversation identifier
    pub id: String,
    /// When the conversation was created
    #[serde(with = "rfc3339")]
    pub created_at: DateTime<Utc>,
    /// When the conversation last changed
    #[serde(with = "rfc3339")]
    pub updated_at: DateTime<Utc>,
    /// Messages in insertion order
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
    /// Conversation-level metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ConversationHistory {
    /// Create an empty conversation
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Create an empty conversation with explicit timestamps
    pub(crate) fn with_timestamps(
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            created_at,
            updated_at,
            messages: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Append a message and bump `updated_at`
    pub fn add_message(
        &mut self,
        role: impl Into<String>,
        content: impl Into<String>,
        metadata: Option<Map<String, Value>>,
    ) {
        self.messages.push(StoredMessage::new(role, content, metadata));
        self.updated_at = Utc::now();
    }

    /// Messages in insertion order, optionally filtered by role
    pub fn get_messages(&self, role: Option<&str>) -> Vec<&StoredMessage> {
        match role {
            Some(role) => self
                .messages
                .iter()
                .filter(|message| message.role == role)
                .collect(),
            None => self.messages.iter().collect(),
        }
    }

    /// Number of stored messages
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// The most recently appended message, if any
    pub fn last_message(&self) -> Option<&StoredMessage> {
        self.messages.last()
    }

    /// Remove all messages, keeping the conversation and its metadata
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_conversation_is_empty() {
        let conversation = ConversationHistory::new("conv-1");
        assert_eq!(conversation.id, "conv-1");
        assert_eq!(conversation.message_count(), 0);
        assert!(conversation.last_message().is_none());
        assert_eq!(conversation.created_at, conversation.updated_at);
    }

    #[test]
    fn test_add_message_preserves_order() {
        let mut conversation = ConversationHistory::new("conv-1");
        conversation.add_message("user", "first", None);
        conversation.add_message("assistant", "second", None);
        conversation.add_message("user", "third", None);

        let messages = conversation.get_messages(None);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
        assert_eq!(messages[2].content, "third");
        assert_eq!(conversation.last_message().unwrap().content, "third");
    }

    #[test]
    fn test_add_message_bumps_updated_at() {
        let mut conversation = ConversationHistory::new("conv-1");
        let before = conversation.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        conversation.add_message("user", "hello", None);
        assert!(conversation.updated_at > before);
    }

    #[test]
    fn test_role_filter() {
        let mut conversation = ConversationHistory::new("conv-1");
        conversation.add_message("user", "q1", None);
        conversation.add_message("assistant", "a1", None);
        conversation.add_message("user", "q2", None);

        let users = conversation.get_messages(Some("user"));
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|message| message.role == "user"));
        assert!(conversation.get_messages(Some("tool")).is_empty());
    }

    #[test]
    fn test_clear_messages_keeps_metadata() {
        let mut conversation = ConversationHistory::new("conv-1");
        conversation
            .metadata
            .insert("topic".to_string(), json!("testing"));
        conversation.add_message("user", "hello", None);
        conversation.clear_messages();

        assert_eq!(conversation.message_count(), 0);
        assert_eq!(conversation.metadata["topic"], json!("testing"));
    }

    #[test]
    fn test_message_metadata_round_trip() {
        let mut metadata = Map::new();
        metadata.insert("finish_reason".to_string(), json!("stop"));

        let mut conversation = ConversationHistory::new("conv-1");
        conversation.add_message("assistant", "done", Some(metadata));

        let serialized = serde_json::to_string(&conversation).unwrap();
        let restored: ConversationHistory = serde_json::from_str(&serialized).unwrap();
        assert_eq!(
            restored.messages[0].metadata.as_ref().unwrap()["finish_reason"],
            json!("stop")
        );
    }

    #[test]
    fn test_serde_round_trip_preserves_timestamps() {
        let mut conversation = ConversationHistory::new("conv-1");
        conversation.add_message("user", "hello", None);

        let serialized = serde_json::to_string(&conversation).unwrap();
        let restored: ConversationHistory = serde_json::from_str(&serialized).unwrap();

        assert_eq!(restored.id, conversation.id);
        assert_eq!(restored.created_at, conversation.created_at);
        assert_eq!(restored.updated_at, conversation.updated_at);
        assert_eq!(restored.messages[0].timestamp, conversation.messages[0].timestamp);
    }

    #[test]
    fn test_deserialize_tolerates_naive_timestamps() {
        let raw = json!({
            "id": "conv-legacy",
            "created_at": "2024-01-01T09:00:00",
            "updated_at": "2024-01-02T10:30:00Z",
            "messages": [{
                "role": "user",
                "content": "hi",
                "timestamp": "2024-01-01T09:00:01.500000"
            }]
        });

        let conversation: ConversationHistory = serde_json::from_value(raw).unwrap();
        assert_eq!(conversation.id, "conv-legacy");
        assert_eq!(conversation.messages.len(), 1);
        assert!(conversation.updated_at > conversation.created_at);
    }
}
