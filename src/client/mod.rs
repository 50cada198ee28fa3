//! Client facades and shared request plumbing
//!
//! The blocking [`Client`] and async [`AsyncClient`] differ only in
//! their transport; URL joining, header assembly, error extraction,
//! conversation-context assembly, and export rendering live here and
//! are shared by both.

mod async_impl;
mod blocking;

pub use async_impl::{AsyncClient, AsyncCompletions};
pub use blocking::{Client, Completions};

use crate::config::ClientConfig;
use crate::error::{status_error, Error, Result};
use crate::history::{ConversationHistory, HistoryManager};
use crate::types::{ChatMessage, CompletionParams, ModelList, Usage};
use serde_json::{json, Map, Value};

/// Options for [`Client::send_message`] / [`AsyncClient::send_message`]
#[derive(Debug, Default)]
pub struct SendMessageOptions {
    /// Conversation to speak in; defaults to the most recently updated
    /// conversation, or a fresh one when none exists
    pub conversation_id: Option<String>,
    /// Cap on the number of history messages included as context
    pub max_history: Option<usize>,
    /// Completion parameters for the request
    pub params: CompletionParams,
}

impl SendMessageOptions {
    /// Target a specific conversation
    pub fn in_conversation(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            ..Self::default()
        }
    }
}

/// Output format for conversation exports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Full conversation as a JSON value
    Json,
    /// `role: content` lines
    Text,
    /// Markdown with a heading per message
    Markdown,
    /// Request-shaped message list
    Messages,
}

/// A rendered conversation export
#[derive(Debug, Clone)]
pub enum ConversationExport {
    Json(Value),
    Text(String),
    Markdown(String),
    Messages(Vec<ChatMessage>),
}

/// Model capability categories recognized by the model listing filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelCategory {
    Vision,
    Audio,
    Coding,
    Reasoning,
    Large,
}

impl ModelCategory {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            ModelCategory::Vision => &["vision", "image"],
            ModelCategory::Audio => &["audio", "voice", "stt", "tts"],
            ModelCategory::Coding => &["code", "coder"],
            ModelCategory::Reasoning => &["reason", "think"],
            ModelCategory::Large => &["large", "max", "xl"],
        }
    }
}

/// User-Agent sent on every request
pub(crate) fn user_agent() -> String {
    format!("Parley/Rust {}", env!("CARGO_PKG_VERSION"))
}

/// Join a request path onto the configured base URL
pub(crate) fn join_url(base_url: &str, path: &str) -> Result<url::Url> {
    let mut base = base_url.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = url::Url::parse(&base)
        .map_err(|error| Error::Config(format!("invalid base_url {}: {}", base_url, error)))?;
    base.join(path.trim_start_matches('/'))
        .map_err(|error| Error::Config(format!("invalid request path {}: {}", path, error)))
}

/// Map an error response to the matching error variant
///
/// Pulls the message out of `{"error": {"message": ...}}` shapes,
/// falling back to the raw body.
pub(crate) fn error_from_body(status: u16, body: &str) -> Error {
    status_error(status, extract_error_message(body))
}

fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
        {
            return message.to_string();
        }
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "request failed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Pick the conversation a message should land in
///
/// An explicit ID wins (created if missing); otherwise the most recently
/// updated conversation is reused, and a fresh one is created only when
/// none exists yet.
pub(crate) fn resolve_conversation_id(
    history: &HistoryManager,
    requested: Option<&str>,
) -> String {
    match requested {
        Some(id) => history.create_conversation(Some(id), None).id,
        None => match history.most_recent_conversation() {
            Some(id) => id,
            None => history.create_conversation(None, None).id,
        },
    }
}

/// Context messages for a request: prior history (trimmed and filtered)
/// plus the new user turn, which is not yet written to the store
pub(crate) fn build_request_context(
    history: &HistoryManager,
    conversation_id: &str,
    max_history: Option<usize>,
    message: &str,
) -> Result<Vec<ChatMessage>> {
    let mut context = history.conversation_context(conversation_id, max_history)?;
    context.push(ChatMessage::user(message));
    Ok(context)
}

/// Metadata recorded with an assistant reply
pub(crate) fn assistant_metadata(
    finish_reason: Option<&str>,
    usage: Option<&Usage>,
) -> Option<Map<String, Value>> {
    let mut metadata = Map::new();
    if let Some(finish_reason) = finish_reason {
        metadata.insert("finish_reason".to_string(), json!(finish_reason));
    }
    if let Some(usage) = usage {
        metadata.insert("prompt_tokens".to_string(), json!(usage.prompt_tokens));
        metadata.insert(
            "completion_tokens".to_string(),
            json!(usage.completion_tokens),
        );
        metadata.insert("total_tokens".to_string(), json!(usage.total_tokens));
    }
    if metadata.is_empty() {
        None
    } else {
        Some(metadata)
    }
}

/// Render a conversation in the requested export format
pub(crate) fn render_export(
    conversation: &ConversationHistory,
    format: ExportFormat,
) -> Result<ConversationExport> {
    match format {
        ExportFormat::Json => Ok(ConversationExport::Json(serde_json::to_value(
            conversation,
        )?)),
        ExportFormat::Text => {
            let lines: Vec<String> = conversation
                .messages
                .iter()
                .map(|message| format!("{}: {}", message.role, message.content))
                .collect();
            Ok(ConversationExport::Text(lines.join("\n")))
        }
        ExportFormat::Markdown => {
            let mut rendered = format!("# Conversation {}\n", conversation.id);
            for message in &conversation.messages {
                rendered.push_str(&format!(
                    "\n## {}\n\n{}\n",
                    message.role, message.content
                ));
            }
            Ok(ConversationExport::Markdown(rendered))
        }
        ExportFormat::Messages => Ok(ConversationExport::Messages(
            conversation.messages.iter().map(ChatMessage::from).collect(),
        )),
    }
}

/// Model IDs, optionally narrowed to a capability category
pub(crate) fn filter_model_ids(models: &ModelList, category: Option<ModelCategory>) -> Vec<String> {
    models
        .data
        .iter()
        .map(|model| model.id.clone())
        .filter(|id| match category {
            None => true,
            Some(category) => {
                let id = id.to_ascii_lowercase();
                category
                    .keywords()
                    .iter()
                    .any(|keyword| id.contains(keyword))
            }
        })
        .collect()
}

/// Shared post-construction logging
pub(crate) fn log_client_ready(config: &ClientConfig, history: &HistoryManager) {
    tracing::info!(
        base_url = %config.base_url,
        history_enabled = history.is_enabled(),
        "client ready"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelData;

    #[test]
    fn test_join_url_handles_slashes() {
        let joined = join_url("http://localhost:8080/v1", "chat/completions").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:8080/v1/chat/completions");

        let joined = join_url("http://localhost:8080/v1/", "/models").unwrap();
        assert_eq!(joined.as_str(), "http://localhost:8080/v1/models");

        let joined = join_url("http://localhost:8080/v1", "chats?page=1&page_size=20").unwrap();
        assert_eq!(
            joined.as_str(),
            "http://localhost:8080/v1/chats?page=1&page_size=20"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        let error = error_from_body(401, r#"{"error": {"message": "bad key"}}"#);
        assert_eq!(error.to_string(), "Authentication error: bad key");

        let error = error_from_body(400, r#"{"error": "no such module"}"#);
        assert!(matches!(error, Error::BadRequest(ref m) if m == "no such module"));

        let error = error_from_body(429, r#"{"message": "slow down"}"#);
        assert!(matches!(error, Error::RateLimit(ref m) if m == "slow down"));

        let error = error_from_body(502, "Bad Gateway");
        assert!(matches!(error, Error::Api { status: 502, ref message } if message == "Bad Gateway"));

        let error = error_from_body(500, "");
        assert!(matches!(error, Error::Api { ref message, .. } if message == "request failed"));
    }

    #[test]
    fn test_resolve_conversation_id() {
        let config = ClientConfig::new("k", "o", "p");
        let history = HistoryManager::new(&config);

        // explicit ID is created on demand
        let id = resolve_conversation_id(&history, Some("conv-x"));
        assert_eq!(id, "conv-x");

        // no ID reuses the most recent conversation
        std::thread::sleep(std::time::Duration::from_millis(2));
        history.create_conversation(Some("conv-y"), None);
        assert_eq!(resolve_conversation_id(&history, None), "conv-y");
    }

    #[test]
    fn test_resolve_creates_fresh_when_empty() {
        let config = ClientConfig::new("k", "o", "p");
        let history = HistoryManager::new(&config);
        let id = resolve_conversation_id(&history, None);
        assert!(id.starts_with("conv_"));
        assert!(history.get_conversation(&id).is_some());
    }

    #[test]
    fn test_build_request_context_appends_user_turn() {
        let config = ClientConfig::new("k", "o", "p");
        let history = HistoryManager::new(&config);
        history.create_conversation(Some("conv-1"), None);
        history.add_message("conv-1", "user", "earlier", None);
        history.add_message("conv-1", "assistant", "reply", None);

        let context = build_request_context(&history, "conv-1", None, "new question").unwrap();
        assert_eq!(context.len(), 3);
        assert_eq!(context[2], ChatMessage::user("new question"));
        // the new turn is context only, not yet stored
        assert_eq!(
            history.get_conversation("conv-1").unwrap().message_count(),
            2
        );
    }

    #[test]
    fn test_assistant_metadata() {
        assert!(assistant_metadata(None, None).is_none());

        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 4,
            total_tokens: 14,
            extra: Map::new(),
        };
        let metadata = assistant_metadata(Some("stop"), Some(&usage)).unwrap();
        assert_eq!(metadata["finish_reason"], json!("stop"));
        assert_eq!(metadata["total_tokens"], json!(14));
    }

    #[test]
    fn test_render_export_formats() {
        let mut conversation = ConversationHistory::new("conv-1");
        conversation.add_message("user", "hello", None);
        conversation.add_message("assistant", "hi there", None);

        match render_export(&conversation, ExportFormat::Text).unwrap() {
            ConversationExport::Text(text) => {
                assert_eq!(text, "user: hello\nassistant: hi there");
            }
            other => panic!("expected text export, got {:?}", other),
        }

        match render_export(&conversation, ExportFormat::Markdown).unwrap() {
            ConversationExport::Markdown(markdown) => {
                assert!(markdown.starts_with("# Conversation conv-1"));
                assert!(markdown.contains("## user"));
                assert!(markdown.contains("hi there"));
            }
            other => panic!("expected markdown export, got {:?}", other),
        }

        match render_export(&conversation, ExportFormat::Messages).unwrap() {
            ConversationExport::Messages(messages) => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0], ChatMessage::user("hello"));
            }
            other => panic!("expected message export, got {:?}", other),
        }

        match render_export(&conversation, ExportFormat::Json).unwrap() {
            ConversationExport::Json(value) => {
                assert_eq!(value["id"], json!("conv-1"));
                assert_eq!(value["messages"].as_array().unwrap().len(), 2);
            }
            other => panic!("expected json export, got {:?}", other),
        }
    }

    #[test]
    fn test_filter_model_ids_by_category() {
        let models = ModelList {
            data: vec![
                model("wizard"),
                model("atlas-vision"),
                model("fabric-voice-stt"),
                model("quill-coder"),
                model("wizard-large"),
            ],
            extra: Map::new(),
        };

        assert_eq!(filter_model_ids(&models, None).len(), 5);
        assert_eq!(
            filter_model_ids(&models, Some(ModelCategory::Vision)),
            vec!["atlas-vision".to_string()]
        );
        assert_eq!(
            filter_model_ids(&models, Some(ModelCategory::Audio)),
            vec!["fabric-voice-stt".to_string()]
        );
        assert_eq!(
            filter_model_ids(&models, Some(ModelCategory::Coding)),
            vec!["quill-coder".to_string()]
        );
        assert_eq!(
            filter_model_ids(&models, Some(ModelCategory::Large)),
            vec!["wizard-large".to_string()]
        );
    }

    fn model(id: &str) -> ModelData {
        ModelData {
            id: id.to_string(),
            object: None,
            created: None,
            owned_by: None,
            extra: Map::new(),
        }
    }
}
