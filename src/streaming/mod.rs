//! Streaming completion support
//!
//! One line decoder drives both transports: [`CompletionStream`] wraps a
//! blocking buffered reader, [`AsyncCompletionStream`] wraps an async
//! byte stream.

mod decoder;
mod stream;

pub use decoder::{ChunkChoice, CompletionChunk, Delta, StreamCallbacks};
pub use stream::{AsyncCompletionStream, CompletionStream};
