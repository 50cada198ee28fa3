//! Local conversation history: per-conversation message logs and the
//! manager that retains, evicts, persists, and reconciles them.

mod conversation;
mod manager;

pub use conversation::{ConversationHistory, StoredMessage};
pub use manager::{HistoryManager, HistoryStats, SyncReport};
