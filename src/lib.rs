//! Client SDK for OpenAI-compatible chat completion APIs
//!
//! Parley wraps the chat-completion wire protocol with the bookkeeping a
//! real application needs: local conversation history with retention and
//! persistence, streaming consumption with callbacks, server-side chat
//! management that degrades gracefully when the deployment lacks those
//! endpoints, and audio transcription/synthesis.
//!
//! Both a blocking [`Client`] and an [`AsyncClient`] are provided; they
//! share configuration, history semantics, and the SSE decoder.
//!
//! # Example
//!
//! ```no_run
//! use parley::{Client, ClientConfig, SendMessageOptions};
//!
//! fn main() -> parley::Result<()> {
//!     let config = ClientConfig::new("sk-key", "org-1", "proj-1")
//!         .with_history_file("/tmp/parley-history.json");
//!     let client = Client::new(config)?;
//!
//!     let reply = client.send_message("What is a lifetime?", SendMessageOptions::default())?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod chats;
pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod streaming;
pub mod types;

pub use audio::{SpeechAudio, SpeechParams, Transcription, TranscriptionParams, Voice, VoiceList};
pub use chats::{ChatCreateParams, ChatCreated, ChatPage, ChatRecord, DEFAULT_CHAT_MODULE};
pub use client::{
    AsyncClient, Client, ConversationExport, ExportFormat, ModelCategory, SendMessageOptions,
};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use history::{ConversationHistory, HistoryManager, HistoryStats, StoredMessage, SyncReport};
pub use streaming::{
    AsyncCompletionStream, ChunkChoice, CompletionChunk, CompletionStream, Delta, StreamCallbacks,
};
pub use types::{
    ChatMessage, Completion, CompletionChoice, CompletionParams, ModelData, ModelList,
    ResponseMessage, StopSequence, Usage,
};
