//! Conversation bookkeeping across a client's lifetime
//!
//! The manager keys conversations by ID behind one mutex, evicts the
//! least-recently-updated entries past a retention limit, and snapshots
//! the whole map to a JSON file when persistence is configured. Disk
//! failures on save are logged and swallowed so conversation state in
//! memory is never lost to an I/O error.

use crate::chats::ChatRecord;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::history::ConversationHistory;
use crate::types::ChatMessage;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Roles eligible for request context
const CONTEXT_ROLES: [&str; 3] = ["system", "user", "assistant"];

/// Snapshot written to and read from the persistence file
#[derive(Debug, Serialize, Deserialize)]
struct HistorySnapshot {
    #[serde(default)]
    conversations: Map<String, Value>,
    #[serde(default)]
    saved_at: String,
}

/// Summary counters for [`HistoryManager::stats`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStats {
    /// Conversations currently retained
    pub total_conversations: usize,
    /// Messages across all retained conversations
    pub total_messages: usize,
    /// Whether history tracking is enabled at all
    pub enabled: bool,
    /// Persistence file, when configured
    pub persistence_file: Option<PathBuf>,
}

/// Outcome of reconciling local history against a server chat listing
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Whether reconciliation ran (false when history is disabled)
    pub synced: bool,
    /// Number of conversations created locally during this pass
    pub synced_count: usize,
    /// Number of chats the server reported
    pub total_server_chats: usize,
    /// Per-entry failures, as messages
    pub errors: Vec<String>,
}

/// Keyed store of conversation histories with retention and persistence
#[derive(Debug)]
pub struct HistoryManager {
    enabled: bool,
    persistence_file: Option<PathBuf>,
    max_conversations: usize,
    conversations: Mutex<HashMap<String, ConversationHistory>>,
}

impl HistoryManager {
    /// Build a manager from client configuration, loading any persisted
    /// snapshot from disk
    pub fn new(config: &ClientConfig) -> Self {
        let manager = Self {
            enabled: config.enable_history,
            persistence_file: config.history_file.clone(),
            max_conversations: config.max_conversations,
            conversations: Mutex::new(HashMap::new()),
        };
        if manager.enabled {
            manager.load();
        }
        manager
    }

    /// Whether history tracking is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConversationHistory>> {
        // A poisoned lock means a panic elsewhere; the map itself is
        // still structurally valid, so keep serving it.
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create (or return the existing) conversation with the given ID
    ///
    /// With history disabled the conversation is not retained; callers
    /// get an ephemeral value they own.
    pub fn create_conversation(
        &self,
        id: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> ConversationHistory {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| format!("conv_{}", uuid::Uuid::new_v4()));

        let mut conversation = ConversationHistory::new(&id);
        if let Some(metadata) = metadata {
            conversation.metadata = metadata;
        }
        if !self.enabled {
            return conversation;
        }

        let mut conversations = self.lock();
        if let Some(existing) = conversations.get(&id) {
            return existing.clone();
        }
        conversations.insert(id, conversation.clone());
        self.evict_locked(&mut conversations);
        self.save_locked(&conversations);
        conversation
    }

    /// A copy of the conversation, if it exists
    pub fn get_conversation(&self, id: &str) -> Option<ConversationHistory> {
        self.lock().get(id).cloned()
    }

    /// IDs of all retained conversations
    pub fn list_conversations(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Remove a conversation; returns whether it existed
    pub fn delete_conversation(&self, id: &str) -> bool {
        let mut conversations = self.lock();
        let removed = conversations.remove(id).is_some();
        if removed {
            self.save_locked(&conversations);
        }
        removed
    }

    /// Remove every conversation
    pub fn clear_all_conversations(&self) {
        let mut conversations = self.lock();
        conversations.clear();
        self.save_locked(&conversations);
    }

    /// Append a message to a conversation; returns whether it existed
    pub fn add_message(
        &self,
        id: &str,
        role: &str,
        content: &str,
        metadata: Option<Map<String, Value>>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let mut conversations = self.lock();
        match conversations.get_mut(id) {
            Some(conversation) => {
                conversation.add_message(role, content, metadata);
                self.save_locked(&conversations);
                true
            }
            None => false,
        }
    }

    /// Record a completed user/assistant exchange in one step
    ///
    /// Both messages land under a single lock so a snapshot can never
    /// observe the user turn without its reply.
    pub fn append_exchange(
        &self,
        id: &str,
        user_content: &str,
        assistant_content: &str,
        assistant_metadata: Option<Map<String, Value>>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let mut conversations = self.lock();
        match conversations.get_mut(id) {
            Some(conversation) => {
                conversation.add_message("user", user_content, None);
                conversation.add_message("assistant", assistant_content, assistant_metadata);
                self.save_locked(&conversations);
                true
            }
            None => false,
        }
    }

    /// Remove all messages from a conversation; returns whether it existed
    pub fn clear_messages(&self, id: &str) -> bool {
        let mut conversations = self.lock();
        match conversations.get_mut(id) {
            Some(conversation) => {
                conversation.clear_messages();
                self.save_locked(&conversations);
                true
            }
            None => false,
        }
    }

    /// Request-ready context for a conversation
    ///
    /// Keeps the last `max` stored messages (when `max` is set), then
    /// drops any that are not `system`/`user`/`assistant`. Trimming
    /// happens before the role filter, so an ineligible message inside
    /// the window shrinks the context rather than pulling in an older
    /// message.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConversationNotFound` for an unknown ID.
    pub fn conversation_context(&self, id: &str, max: Option<usize>) -> Result<Vec<ChatMessage>> {
        let conversations = self.lock();
        let conversation = conversations
            .get(id)
            .ok_or_else(|| Error::ConversationNotFound(id.to_string()))?;

        let messages = &conversation.messages;
        let window = match max {
            Some(max) if messages.len() > max => &messages[messages.len() - max..],
            _ => &messages[..],
        };

        Ok(window
            .iter()
            .filter(|message| CONTEXT_ROLES.contains(&message.role.as_str()))
            .map(ChatMessage::from)
            .collect())
    }

    /// ID of the most recently updated conversation, if any
    pub fn most_recent_conversation(&self) -> Option<String> {
        self.lock()
            .values()
            .max_by_key(|conversation| conversation.updated_at)
            .map(|conversation| conversation.id.clone())
    }

    /// Summary counters for the current state
    pub fn stats(&self) -> HistoryStats {
        let conversations = self.lock();
        HistoryStats {
            total_conversations: conversations.len(),
            total_messages: conversations
                .values()
                .map(ConversationHistory::message_count)
                .sum(),
            enabled: self.enabled,
            persistence_file: self.persistence_file.clone(),
        }
    }

    /// Create local conversations for server chats we have no record of
    ///
    /// Existing local conversations are left untouched; reconciliation
    /// never deletes or rewrites local state.
    pub fn reconcile(&self, server_chats: &[ChatRecord]) -> SyncReport {
        let mut report = SyncReport {
            total_server_chats: server_chats.len(),
            ..SyncReport::default()
        };
        if !self.enabled {
            return report;
        }
        report.synced = true;

        let mut conversations = self.lock();
        for chat in server_chats {
            if chat.chat_id.is_empty() {
                report.errors.push("server chat without an id".to_string());
                continue;
            }
            if conversations.contains_key(&chat.chat_id) {
                continue;
            }

            let now = Utc::now();
            let created_at = chat.created_at.unwrap_or(now);
            let updated_at = chat.updated_at.unwrap_or(created_at);
            let mut conversation =
                ConversationHistory::with_timestamps(&chat.chat_id, created_at, updated_at);
            conversation
                .metadata
                .insert("synced_from_server".to_string(), json!(true));
            if let Some(title) = &chat.title {
                conversation
                    .metadata
                    .insert("title".to_string(), json!(title));
            }

            conversations.insert(chat.chat_id.clone(), conversation);
            report.synced_count += 1;
        }

        if report.synced_count > 0 {
            self.evict_locked(&mut conversations);
            self.save_locked(&conversations);
        }
        debug!(
            synced = report.synced_count,
            total = report.total_server_chats,
            "reconciled server chats"
        );
        report
    }

    /// Register a conversation for a chat created through the server API
    ///
    /// `from_server` distinguishes a real server chat from a local
    /// fallback ID minted while the endpoint was unavailable.
    pub fn register_server_chat(&self, chat_id: &str, from_server: bool) {
        if !self.enabled {
            return;
        }
        let mut conversations = self.lock();
        if conversations.contains_key(chat_id) {
            return;
        }
        let mut conversation = ConversationHistory::new(chat_id);
        conversation
            .metadata
            .insert("synced_with_server".to_string(), json!(from_server));
        if !from_server {
            conversation
                .metadata
                .insert("local_fallback".to_string(), json!(true));
        }
        conversations.insert(chat_id.to_string(), conversation);
        self.evict_locked(&mut conversations);
        self.save_locked(&conversations);
    }

    /// Write the current state to the persistence file, if one is set
    ///
    /// Failures are logged and swallowed; history stays valid in memory.
    pub fn save(&self) {
        let conversations = self.lock();
        self.save_locked(&conversations);
    }

    fn save_locked(&self, conversations: &HashMap<String, ConversationHistory>) {
        let Some(path) = &self.persistence_file else {
            return;
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(error) = std::fs::create_dir_all(parent) {
                    warn!(path = %parent.display(), %error, "failed to create history directory");
                    return;
                }
            }
        }

        let mut entries = Map::new();
        for (id, conversation) in conversations {
            match serde_json::to_value(conversation) {
                Ok(value) => {
                    entries.insert(id.clone(), value);
                }
                Err(error) => {
                    warn!(%id, %error, "skipping unserializable conversation");
                }
            }
        }
        let snapshot = HistorySnapshot {
            conversations: entries,
            saved_at: Utc::now().to_rfc3339(),
        };

        let result = serde_json::to_string_pretty(&snapshot)
            .map_err(Error::from)
            .and_then(|payload| std::fs::write(path, payload).map_err(Error::from));
        if let Err(error) = result {
            warn!(path = %path.display(), %error, "failed to persist conversation history");
        }
    }

    /// Load persisted conversations, skipping entries that fail to parse
    fn load(&self) {
        let Some(path) = &self.persistence_file else {
            return;
        };
        if !path.exists() {
            return;
        }

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read history file");
                return;
            }
        };
        let snapshot: HistorySnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to parse history file");
                return;
            }
        };

        let mut conversations = self.lock();
        for (id, value) in snapshot.conversations {
            match serde_json::from_value::<ConversationHistory>(value) {
                Ok(conversation) => {
                    conversations.insert(id, conversation);
                }
                Err(error) => {
                    warn!(%id, %error, "skipping corrupted conversation entry");
                }
            }
        }
        self.evict_locked(&mut conversations);
        debug!(
            count = conversations.len(),
            path = %path.display(),
            "loaded conversation history"
        );
    }

    /// Drop the least-recently-updated conversations past the limit
    fn evict_locked(&self, conversations: &mut HashMap<String, ConversationHistory>) {
        while conversations.len() > self.max_conversations {
            let oldest = conversations
                .values()
                .min_by_key(|conversation| conversation.updated_at)
                .map(|conversation| conversation.id.clone());
            match oldest {
                Some(id) => {
                    debug!(%id, "evicting conversation past retention limit");
                    conversations.remove(&id);
                }
                None => break,
            }
        }
    }
}
