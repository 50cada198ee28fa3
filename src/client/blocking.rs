//! Blocking client

use crate::audio::Audio;
use crate::chats::{ChatCreateParams, Chats};
use crate::client::{
    assistant_metadata, build_request_context, error_from_body, filter_model_ids, join_url,
    log_client_ready, render_export, resolve_conversation_id, user_agent, ConversationExport,
    ExportFormat, ModelCategory, SendMessageOptions,
};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::history::{ConversationHistory, HistoryManager, HistoryStats, SyncReport};
use crate::streaming::{CompletionStream, StreamCallbacks};
use crate::types::{ChatMessage, Completion, CompletionParams, CompletionRequest, ModelList};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::BufReader;
use tracing::debug;

pub(crate) fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let bearer = format!("Bearer {}", config.api_key);
    let mut authorization = HeaderValue::from_str(&bearer)
        .map_err(|_| Error::Config("api_key contains invalid header characters".to_string()))?;
    authorization.set_sensitive(true);
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(
        HeaderName::from_static("openai-organization"),
        HeaderValue::from_str(&config.organization)
            .map_err(|_| Error::Config("organization contains invalid header characters".to_string()))?,
    );
    headers.insert(
        HeaderName::from_static("openai-project"),
        HeaderValue::from_str(&config.project)
            .map_err(|_| Error::Config("project contains invalid header characters".to_string()))?,
    );
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&user_agent())
            .map_err(|_| Error::Config("invalid user agent".to_string()))?,
    );
    Ok(headers)
}

/// Blocking API client
///
/// Owns the HTTP transport and the conversation history for its
/// lifetime; history is flushed to disk on drop when persistence is
/// configured.
pub struct Client {
    pub(crate) http: reqwest::blocking::Client,
    pub(crate) config: ClientConfig,
    history: HistoryManager,
}

impl Client {
    /// Build a client from an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an invalid configuration and
    /// `Error::Transport` if the HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers(&config)?)
            .build()?;
        let history = HistoryManager::new(&config);
        log_client_ready(&config, &history);
        Ok(Self {
            http,
            config,
            history,
        })
    }

    /// Build a client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The conversation history manager
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub(crate) fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = join_url(&self.config.base_url, path)?;
        debug!(%url, "GET");
        let response = self.http.get(url).send()?;
        Self::decode(response)
    }

    pub(crate) fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let url = join_url(&self.config.base_url, path)?;
        debug!(%url, "POST");
        let response = self.http.post(url).json(body).send()?;
        Self::decode(response)
    }

    fn post_raw(&self, path: &str, body: &impl Serialize) -> Result<reqwest::blocking::Response> {
        let url = join_url(&self.config.base_url, path)?;
        debug!(%url, "POST (streaming)");
        let response = self.http.post(url).json(body).send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &text));
        }
        Ok(response)
    }

    fn decode<T: DeserializeOwned>(response: reqwest::blocking::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &text));
        }
        Ok(response.json()?)
    }

    /// Completion requests
    pub fn completions(&self) -> Completions<'_> {
        Completions { client: self }
    }

    /// Chat management on the server
    pub fn chats(&self) -> Chats<'_> {
        Chats { client: self }
    }

    /// Audio transcription and synthesis
    pub fn audio(&self) -> Audio<'_> {
        Audio { client: self }
    }

    /// Send one user message with conversation context and record the
    /// exchange
    ///
    /// The conversation is resolved (explicit ID, else most recently
    /// updated, else a fresh one), prior history is filtered and trimmed
    /// into context, and the user turn plus the assistant reply are
    /// written back only after the request succeeds. A failed request
    /// leaves history untouched.
    ///
    /// # Errors
    ///
    /// Transport and API errors propagate; a response without content
    /// surfaces as `Error::Api`.
    pub fn send_message(&self, message: &str, options: SendMessageOptions) -> Result<String> {
        let (conversation_id, context) = if self.history.is_enabled() {
            let id = resolve_conversation_id(&self.history, options.conversation_id.as_deref());
            let context =
                build_request_context(&self.history, &id, options.max_history, message)?;
            (Some(id), context)
        } else {
            (None, vec![ChatMessage::user(message)])
        };

        let request = CompletionRequest::new(context, &options.params, false);
        let completion: Completion = self.post_json("chat/completions", &request)?;

        let content = completion
            .first_content()
            .ok_or_else(|| Error::Api {
                status: 200,
                message: "completion response carried no content".to_string(),
            })?
            .to_string();

        if let Some(conversation_id) = conversation_id {
            let metadata =
                assistant_metadata(completion.first_finish_reason(), completion.usage.as_ref());
            self.history
                .append_exchange(&conversation_id, message, &content, metadata);
        }
        Ok(content)
    }

    /// Create a conversation (or return an existing one)
    pub fn create_conversation(
        &self,
        id: Option<&str>,
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> ConversationHistory {
        self.history.create_conversation(id, metadata)
    }

    /// A copy of a conversation, if it exists
    pub fn get_conversation(&self, id: &str) -> Option<ConversationHistory> {
        self.history.get_conversation(id)
    }

    /// IDs of all retained conversations
    pub fn list_conversations(&self) -> Vec<String> {
        self.history.list_conversations()
    }

    /// Remove a conversation; returns whether it existed
    pub fn delete_conversation(&self, id: &str) -> bool {
        self.history.delete_conversation(id)
    }

    /// Remove every conversation
    pub fn clear_all_conversations(&self) {
        self.history.clear_all_conversations()
    }

    /// Remove all messages from a conversation; returns whether it existed
    pub fn clear_messages(&self, id: &str) -> bool {
        self.history.clear_messages(id)
    }

    /// History summary counters
    pub fn history_stats(&self) -> HistoryStats {
        self.history.stats()
    }

    /// Render a conversation in the requested export format
    ///
    /// # Errors
    ///
    /// `Error::ConversationNotFound` for an unknown ID.
    pub fn export_conversation(
        &self,
        id: &str,
        format: ExportFormat,
    ) -> Result<ConversationExport> {
        let conversation = self
            .history
            .get_conversation(id)
            .ok_or_else(|| Error::ConversationNotFound(id.to_string()))?;
        render_export(&conversation, format)
    }

    /// Available models
    pub fn models(&self) -> Result<ModelList> {
        self.get_json("models")
    }

    /// Model IDs, optionally narrowed to a capability category
    pub fn list_model_ids(&self, category: Option<ModelCategory>) -> Result<Vec<String>> {
        Ok(filter_model_ids(&self.models()?, category))
    }

    /// Create a server chat and register a matching local conversation
    ///
    /// Returns a `local_`-prefixed ID when the server endpoint is
    /// unavailable.
    pub fn create_server_chat(&self, params: &ChatCreateParams) -> Result<String> {
        let created = self.chats().create(params)?;
        self.history
            .register_server_chat(&created.chat_id, created.from_server);
        Ok(created.chat_id)
    }

    /// Pull the server chat listing and create local conversations for
    /// chats we have no record of
    pub fn sync_with_server(&self) -> Result<SyncReport> {
        let page = self.chats().list(1, 100)?;
        Ok(self.history.reconcile(&page.data))
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.history.save();
    }
}

/// Blocking completion resource, obtained from [`Client::completions`]
pub struct Completions<'a> {
    client: &'a Client,
}

impl Completions<'_> {
    /// One non-streaming completion over explicit messages
    pub fn create(
        &self,
        messages: Vec<ChatMessage>,
        params: &CompletionParams,
    ) -> Result<Completion> {
        let request = CompletionRequest::new(messages, params, false);
        self.client.post_json("chat/completions", &request)
    }

    /// A streaming completion over explicit messages
    pub fn create_stream(
        &self,
        messages: Vec<ChatMessage>,
        params: &CompletionParams,
        callbacks: StreamCallbacks,
    ) -> Result<CompletionStream<BufReader<reqwest::blocking::Response>>> {
        let request = CompletionRequest::new(messages, params, true);
        let response = self.client.post_raw("chat/completions", &request)?;
        Ok(CompletionStream::from_response(response, callbacks))
    }
}
