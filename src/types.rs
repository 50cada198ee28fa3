//! Wire types for the completion API
//!
//! Request types skip unset optional fields. Response types keep a fixed
//! set of known fields plus a flattened extension map, so new fields added
//! by the server are captured without a schema change.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A role-tagged message as it appears in request payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role: `system`, `user`, `assistant` or `tool`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message with an arbitrary role
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Stop sequence specification: a single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequence {
    /// A single stop string
    One(String),
    /// Multiple stop strings
    Many(Vec<String>),
}

/// Optional sampling and tooling knobs for a completion request
///
/// `None` fields are omitted from the serialized payload entirely.
#[derive(Debug, Clone, Default)]
pub struct CompletionParams {
    /// Model identifier; falls back to [`DEFAULT_MODEL`](crate::config::DEFAULT_MODEL)
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter
    pub top_p: Option<f64>,
    /// Frequency penalty
    pub frequency_penalty: Option<f64>,
    /// Presence penalty
    pub presence_penalty: Option<f64>,
    /// Stop sequences
    pub stop: Option<StopSequence>,
    /// Tool definitions forwarded verbatim
    pub tools: Option<Vec<Value>>,
    /// Tool selection strategy forwarded verbatim
    pub tool_choice: Option<Value>,
    /// Response format specification forwarded verbatim
    pub response_format: Option<Value>,
    /// Random seed for reproducibility
    pub seed: Option<i64>,
    /// End-user identifier
    pub user: Option<String>,
}

impl CompletionParams {
    /// Params naming only a model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    pub(crate) fn model_or_default(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| crate::config::DEFAULT_MODEL.to_string())
    }
}

/// Request payload for `/chat/completions`
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Conversation context plus the new user turn
    pub messages: Vec<ChatMessage>,
    /// Whether the response should stream as Server-Sent Events
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl CompletionRequest {
    /// Assemble a request from context messages and optional parameters
    pub fn new(messages: Vec<ChatMessage>, params: &CompletionParams, stream: bool) -> Self {
        Self {
            model: params.model_or_default(),
            messages,
            stream,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            top_p: params.top_p,
            frequency_penalty: params.frequency_penalty,
            presence_penalty: params.presence_penalty,
            stop: params.stop.clone(),
            tools: params.tools.clone(),
            tool_choice: params.tool_choice.clone(),
            response_format: params.response_format.clone(),
            seed: params.seed,
            user: params.user.clone(),
        }
    }
}

/// Assistant message inside a non-streaming completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Message role, usually `assistant`
    #[serde(default)]
    pub role: String,
    /// Message text, absent for pure tool-call responses
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls forwarded verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    /// Fields this SDK does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One choice in a non-streaming completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// The generated message
    pub message: ResponseMessage,
    /// Why generation stopped for this choice
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Token usage statistics reported by the server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens generated in the completion
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total tokens for the request
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Non-streaming completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Server-assigned completion identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Object type marker
    #[serde(default)]
    pub object: Option<String>,
    /// Creation timestamp (Unix seconds)
    #[serde(default)]
    pub created: Option<i64>,
    /// Model that produced the completion
    #[serde(default)]
    pub model: Option<String>,
    /// Generated choices
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    /// Token usage, when reported
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Completion {
    /// Text content of the first choice, if any
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first()?.message.content.as_deref()
    }

    /// Finish reason of the first choice, if any
    pub fn first_finish_reason(&self) -> Option<&str> {
        self.choices.first()?.finish_reason.as_deref()
    }
}

/// A model entry from `/models`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelData {
    /// Model identifier
    pub id: String,
    /// Object type marker
    #[serde(default)]
    pub object: Option<String>,
    /// Creation timestamp (Unix seconds)
    #[serde(default)]
    pub created: Option<i64>,
    /// Owning organization
    #[serde(default)]
    pub owned_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response from `/models`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    /// Available models
    #[serde(default)]
    pub data: Vec<ModelData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parse an ISO-8601 timestamp, tolerating a missing offset marker
///
/// Accepts RFC-3339 strings (`Z` suffix or explicit offset) as well as
/// naive timestamps, which are assumed to be UTC.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Serde adapter for required timestamps stored as ISO-8601 strings
pub(crate) mod rfc3339 {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

/// Serde adapter for optional timestamps stored as ISO-8601 strings
pub(crate) mod rfc3339_opt {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => super::parse_timestamp(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s))),
        }
    }
}
