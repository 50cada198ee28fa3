//! Server-side chat management with graceful degradation
//!
//! Deployments differ in whether the chat-management endpoints exist at
//! all. Rather than making every caller handle that, the transport
//! outcome is classified into [`Endpoint`]: a rejection that signals an
//! absent endpoint degrades to a synthetic local value (an empty page, a
//! `local_`-prefixed chat ID, a placeholder record) so calling code runs
//! unchanged against both kinds of deployment. Every other failure
//! propagates as the error it is. Degradation is scoped to this module
//! only; completions and history never degrade.

use crate::client::{AsyncClient, Client};
use crate::error::{Error, Result};
use crate::types::rfc3339_opt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::Uuid;

/// A server-side chat record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Chat identifier
    #[serde(alias = "id")]
    pub chat_id: String,
    /// Display title
    #[serde(default)]
    pub title: Option<String>,
    /// Creation time, when the server reports one
    #[serde(default, with = "rfc3339_opt")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time, when the server reports one
    #[serde(default, with = "rfc3339_opt")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Message count, when the server reports one
    #[serde(default)]
    pub message_count: Option<u64>,
    /// Preview of the last message, when the server reports one
    #[serde(default)]
    pub last_message: Option<String>,
    /// Server-side metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRecord {
    /// A record with just an ID and title
    pub fn named(chat_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            title: Some(title.into()),
            created_at: None,
            updated_at: None,
            message_count: None,
            last_message: None,
            metadata: None,
            extra: Map::new(),
        }
    }

    fn local_placeholder(chat_id: &str) -> Self {
        let mut record = Self::named(chat_id, "Local Chat");
        record.metadata = Some(local_metadata(&[]));
        record
    }

    fn local_renamed(chat_id: &str, name: &str) -> Self {
        let mut record = Self::named(chat_id, name);
        record.metadata = Some(local_metadata(&["updated_name"]));
        record
    }
}

fn local_metadata(flags: &[&str]) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("local".to_string(), json!(true));
    for flag in flags {
        metadata.insert((*flag).to_string(), json!(true));
    }
    metadata
}

/// One page of a server chat listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPage {
    /// Chat records on this page
    #[serde(default)]
    pub data: Vec<ChatRecord>,
    /// 1-based page number
    #[serde(default)]
    pub page: u32,
    /// Requested page size
    #[serde(default)]
    pub page_size: u32,
    /// Total records across all pages
    #[serde(default)]
    pub total_items: u64,
    /// Total pages
    #[serde(default)]
    pub total_pages: u32,
    /// Whether a later page exists
    #[serde(default)]
    pub has_next: bool,
    /// Whether an earlier page exists
    #[serde(default)]
    pub has_previous: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatPage {
    /// The page shape returned when the listing endpoint is unavailable
    fn empty(page: u32, page_size: u32) -> Self {
        Self {
            data: Vec::new(),
            page,
            page_size,
            total_items: 0,
            total_pages: 0,
            has_next: false,
            has_previous: false,
            extra: Map::new(),
        }
    }
}

/// Module requested when creating a chat, unless overridden
pub const DEFAULT_CHAT_MODULE: &str = "chat";

/// Options for creating a server chat
#[derive(Debug, Clone, Default)]
pub struct ChatCreateParams {
    /// Server module to create the chat under; defaults to
    /// [`DEFAULT_CHAT_MODULE`]
    pub module_id: Option<String>,
    /// Initial message to seed the chat with; defaults to empty
    pub message: Option<String>,
}

/// Result of creating a server chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCreated {
    /// Chat identifier; `local_`-prefixed when the endpoint was unavailable
    pub chat_id: String,
    /// Whether the server actually created this chat
    pub from_server: bool,
}

/// Internal transport outcome: the endpoint answered, or it isn't there
pub(crate) enum Endpoint<T> {
    Available(T),
    NotAvailable,
}

/// Degrade a bad-request rejection to an absent endpoint
pub(crate) fn soften_unavailable<T>(result: Result<T>) -> Result<Endpoint<T>> {
    match result {
        Ok(value) => Ok(Endpoint::Available(value)),
        Err(Error::BadRequest(message)) => {
            warn!(%message, "chat management endpoint unavailable");
            Ok(Endpoint::NotAvailable)
        }
        Err(error) => Err(error),
    }
}

/// Degrade a bad-request or not-found rejection to an absent endpoint
///
/// Per-chat operations also soften 404: a server without chat management
/// reports unknown routes that way.
pub(crate) fn soften_missing<T>(result: Result<T>) -> Result<Endpoint<T>> {
    match result {
        Err(Error::NotFound(message)) => {
            warn!(%message, "chat management endpoint unavailable");
            Ok(Endpoint::NotAvailable)
        }
        other => soften_unavailable(other),
    }
}

fn validate_paging(page: u32, page_size: u32) -> Result<()> {
    if page < 1 {
        return Err(Error::InvalidArgument(format!(
            "page must be >= 1, got {}",
            page
        )));
    }
    if !(1..=100).contains(&page_size) {
        return Err(Error::InvalidArgument(format!(
            "page_size must be between 1 and 100, got {}",
            page_size
        )));
    }
    Ok(())
}

fn list_path(page: u32, page_size: u32) -> String {
    format!("chats?page={}&page_size={}", page, page_size)
}

fn create_body(params: &ChatCreateParams) -> Value {
    json!({
        "module_id": params.module_id.as_deref().unwrap_or(DEFAULT_CHAT_MODULE),
        "message": params.message.as_deref().unwrap_or(""),
    })
}

/// Pull the chat ID out of a create response, whatever its nesting
fn extract_chat_id(value: &Value) -> Option<String> {
    for candidate in [
        value.get("chat_id"),
        value.get("id"),
        value.get("data").and_then(|data| data.get("chat_id")),
        value.get("data").and_then(|data| data.get("id")),
    ]
    .into_iter()
    .flatten()
    {
        if let Some(id) = candidate.as_str() {
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

fn local_chat_id() -> String {
    format!("local_{}", Uuid::new_v4())
}

/// Blocking chat-management resource, obtained from [`Client::chats`]
pub struct Chats<'a> {
    pub(crate) client: &'a Client,
}

impl Chats<'_> {
    /// List server chats, paginated
    ///
    /// Returns an empty page when the endpoint is unavailable.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` for `page < 1` or `page_size` outside
    /// 1..=100; transport and non-degradable API errors propagate.
    pub fn list(&self, page: u32, page_size: u32) -> Result<ChatPage> {
        validate_paging(page, page_size)?;
        match soften_unavailable(self.client.get_json(&list_path(page, page_size)))? {
            Endpoint::Available(chat_page) => Ok(chat_page),
            Endpoint::NotAvailable => Ok(ChatPage::empty(page, page_size)),
        }
    }

    /// Create a server chat
    ///
    /// When the endpoint is unavailable a `local_`-prefixed ID is minted
    /// instead, so callers always get a usable conversation key.
    pub fn create(&self, params: &ChatCreateParams) -> Result<ChatCreated> {
        let result = self.client.post_json::<Value>("chats", &create_body(params));
        match soften_unavailable(result)? {
            Endpoint::Available(body) => match extract_chat_id(&body) {
                Some(chat_id) => Ok(ChatCreated {
                    chat_id,
                    from_server: true,
                }),
                None => Err(Error::Api {
                    status: 200,
                    message: "chat creation response carried no chat id".to_string(),
                }),
            },
            Endpoint::NotAvailable => Ok(ChatCreated {
                chat_id: local_chat_id(),
                from_server: false,
            }),
        }
    }

    /// Fetch one chat record
    ///
    /// Returns a placeholder record when the endpoint is unavailable.
    pub fn get(&self, chat_id: &str) -> Result<ChatRecord> {
        let result = self.client.get_json(&format!("chats/{}", chat_id));
        match soften_missing(result)? {
            Endpoint::Available(record) => Ok(record),
            Endpoint::NotAvailable => Ok(ChatRecord::local_placeholder(chat_id)),
        }
    }

    /// Rename a chat
    ///
    /// Returns a locally renamed record when the endpoint is unavailable.
    pub fn update(&self, chat_id: &str, name: &str) -> Result<ChatRecord> {
        let result = self
            .client
            .post_json(&format!("chats/{}", chat_id), &json!({"name": name}));
        match soften_missing(result)? {
            Endpoint::Available(record) => Ok(record),
            Endpoint::NotAvailable => Ok(ChatRecord::local_renamed(chat_id, name)),
        }
    }

    /// Delete a chat; `false` when the endpoint is unavailable
    pub fn delete(&self, chat_id: &str) -> Result<bool> {
        let result = self
            .client
            .post_json::<Value>(&format!("chats/{}/delete", chat_id), &json!({}));
        match soften_missing(result)? {
            Endpoint::Available(_) => Ok(true),
            Endpoint::NotAvailable => Ok(false),
        }
    }
}

/// Async chat-management resource, obtained from [`AsyncClient::chats`]
pub struct AsyncChats<'a> {
    pub(crate) client: &'a AsyncClient,
}

impl AsyncChats<'_> {
    /// List server chats, paginated
    ///
    /// Returns an empty page when the endpoint is unavailable.
    pub async fn list(&self, page: u32, page_size: u32) -> Result<ChatPage> {
        validate_paging(page, page_size)?;
        let result = self.client.get_json(&list_path(page, page_size)).await;
        match soften_unavailable(result)? {
            Endpoint::Available(chat_page) => Ok(chat_page),
            Endpoint::NotAvailable => Ok(ChatPage::empty(page, page_size)),
        }
    }

    /// Create a server chat, minting a `local_` ID when unavailable
    pub async fn create(&self, params: &ChatCreateParams) -> Result<ChatCreated> {
        let result = self
            .client
            .post_json::<Value>("chats", &create_body(params))
            .await;
        match soften_unavailable(result)? {
            Endpoint::Available(body) => match extract_chat_id(&body) {
                Some(chat_id) => Ok(ChatCreated {
                    chat_id,
                    from_server: true,
                }),
                None => Err(Error::Api {
                    status: 200,
                    message: "chat creation response carried no chat id".to_string(),
                }),
            },
            Endpoint::NotAvailable => Ok(ChatCreated {
                chat_id: local_chat_id(),
                from_server: false,
            }),
        }
    }

    /// Fetch one chat record, with a placeholder when unavailable
    pub async fn get(&self, chat_id: &str) -> Result<ChatRecord> {
        let result = self.client.get_json(&format!("chats/{}", chat_id)).await;
        match soften_missing(result)? {
            Endpoint::Available(record) => Ok(record),
            Endpoint::NotAvailable => Ok(ChatRecord::local_placeholder(chat_id)),
        }
    }

    /// Rename a chat, with a local record when unavailable
    pub async fn update(&self, chat_id: &str, name: &str) -> Result<ChatRecord> {
        let result = self
            .client
            .post_json(&format!("chats/{}", chat_id), &json!({"name": name}))
            .await;
        match soften_missing(result)? {
            Endpoint::Available(record) => Ok(record),
            Endpoint::NotAvailable => Ok(ChatRecord::local_renamed(chat_id, name)),
        }
    }

    /// Delete a chat; `false` when the endpoint is unavailable
    pub async fn delete(&self, chat_id: &str) -> Result<bool> {
        let result = self
            .client
            .post_json::<Value>(&format!("chats/{}/delete", chat_id), &json!({}))
            .await;
        match soften_missing(result)? {
            Endpoint::Available(_) => Ok(true),
            Endpoint::NotAvailable => Ok(false),
        }
    }
}
