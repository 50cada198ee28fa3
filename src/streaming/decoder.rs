//! Server-Sent Events chunk decoding
//!
//! One state machine handles SSE lines for both the blocking and async
//! consumers: strip the `data:` framing, stop on the `[DONE]` sentinel,
//! skip lines that are not valid chunk JSON, accumulate delta content,
//! and fire user callbacks. The completion callback fires exactly once
//! per stream, on whichever exit path ends it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Incremental message content inside a streaming chunk choice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    /// Role, present on the first chunk of a choice
    #[serde(default)]
    pub role: Option<String>,
    /// Content fragment carried by this chunk
    #[serde(default)]
    pub content: Option<String>,
    /// Tool call fragments forwarded verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One choice in a streaming chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,
    /// Incremental content for this choice
    #[serde(default)]
    pub delta: Delta,
    /// Set on the final chunk of a choice
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A decoded streaming completion chunk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionChunk {
    /// Server-assigned completion identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Object type marker
    #[serde(default)]
    pub object: Option<String>,
    /// Creation timestamp (Unix seconds)
    #[serde(default)]
    pub created: Option<i64>,
    /// Model producing the stream
    #[serde(default)]
    pub model: Option<String>,
    /// Choices carried by this chunk
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompletionChunk {
    /// Content fragment of the first choice, if any
    pub fn delta_content(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }

    /// Finish reason of the first choice, if any
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.first()?.finish_reason.as_deref()
    }
}

type ChunkCallback = Box<dyn FnMut(&CompletionChunk) + Send>;
type ContentCallback = Box<dyn FnMut(&str) + Send>;
type CompleteCallback = Box<dyn FnMut(&str) + Send>;

/// Optional hooks invoked while a stream is consumed
#[derive(Default)]
pub struct StreamCallbacks {
    on_chunk: Option<ChunkCallback>,
    on_content: Option<ContentCallback>,
    on_complete: Option<CompleteCallback>,
}

impl StreamCallbacks {
    /// No callbacks
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `callback` for every decoded chunk
    pub fn on_chunk(mut self, callback: impl FnMut(&CompletionChunk) + Send + 'static) -> Self {
        self.on_chunk = Some(Box::new(callback));
        self
    }

    /// Invoke `callback` for every non-empty content fragment
    pub fn on_content(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_content = Some(Box::new(callback));
        self
    }

    /// Invoke `callback` once with the full accumulated content when the
    /// stream ends, on any exit path
    pub fn on_complete(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for StreamCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCallbacks")
            .field("on_chunk", &self.on_chunk.is_some())
            .field("on_content", &self.on_content.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Outcome of feeding one SSE line to the decoder
#[derive(Debug)]
pub(crate) enum LineOutcome {
    /// Line carried no chunk (framing, comment, or malformed payload)
    Skip,
    /// A decoded chunk
    Chunk(CompletionChunk),
    /// The `[DONE]` sentinel ended the stream
    Done,
}

/// SSE line decoder shared by the blocking and async stream consumers
#[derive(Debug)]
pub(crate) struct ChunkDecoder {
    callbacks: StreamCallbacks,
    accumulated: String,
    completed: bool,
}

impl ChunkDecoder {
    pub(crate) fn new(callbacks: StreamCallbacks) -> Self {
        Self {
            callbacks,
            accumulated: String::new(),
            completed: false,
        }
    }

    /// Content accumulated so far
    pub(crate) fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Feed one line of the response body
    pub(crate) fn process_line(&mut self, line: &str) -> LineOutcome {
        let line = line.trim();
        let Some(payload) = line.strip_prefix("data:") else {
            // event/comment/blank framing lines carry no chunk
            return LineOutcome::Skip;
        };
        let payload = payload.trim();

        if payload == "[DONE]" {
            self.finish();
            return LineOutcome::Done;
        }

        let chunk: CompletionChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(error) => {
                debug!(%error, "skipping malformed stream line");
                return LineOutcome::Skip;
            }
        };

        if let Some(content) = chunk.delta_content() {
            if !content.is_empty() {
                self.accumulated.push_str(content);
                if let Some(on_content) = &mut self.callbacks.on_content {
                    on_content(content);
                }
            }
        }
        if let Some(on_chunk) = &mut self.callbacks.on_chunk {
            on_chunk(&chunk);
        }
        LineOutcome::Chunk(chunk)
    }

    /// End the stream, firing the completion callback if it has not fired
    pub(crate) fn finish(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        if let Some(on_complete) = &mut self.callbacks.on_complete {
            on_complete(&self.accumulated);
        }
    }
}
