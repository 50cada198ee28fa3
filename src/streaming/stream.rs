//! Stream consumers over the shared chunk decoder
//!
//! `CompletionStream` drains a blocking `BufRead` body line by line;
//! `AsyncCompletionStream` drains a byte stream, splitting lines itself.
//! Both end the stream (and fire the completion callback) on `[DONE]`
//! or EOF. A transport error ends iteration with the error instead.

use crate::error::Result;
use crate::streaming::decoder::{ChunkDecoder, LineOutcome};
use crate::streaming::{CompletionChunk, StreamCallbacks};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use std::io::{BufRead, BufReader, Write};
use std::pin::Pin;
use tracing::trace;

/// Blocking streaming-completion consumer
///
/// Iterates decoded chunks; framing lines and malformed payloads are
/// skipped silently.
pub struct CompletionStream<R: BufRead> {
    reader: R,
    decoder: ChunkDecoder,
    done: bool,
}

impl CompletionStream<BufReader<reqwest::blocking::Response>> {
    pub(crate) fn from_response(
        response: reqwest::blocking::Response,
        callbacks: StreamCallbacks,
    ) -> Self {
        Self::new(BufReader::new(response), callbacks)
    }
}

impl<R: BufRead> CompletionStream<R> {
    /// Consume SSE lines from any buffered reader
    pub fn new(reader: R, callbacks: StreamCallbacks) -> Self {
        Self {
            reader,
            decoder: ChunkDecoder::new(callbacks),
            done: false,
        }
    }

    /// Content accumulated so far
    pub fn accumulated(&self) -> &str {
        self.decoder.accumulated()
    }

    /// Drain the stream, printing each content fragment to stdout
    ///
    /// Returns the full accumulated content, followed by a trailing
    /// newline on stdout.
    pub fn print_stream(mut self) -> Result<String> {
        let mut stdout = std::io::stdout();
        while let Some(chunk) = self.next() {
            let chunk = chunk?;
            if let Some(content) = chunk.delta_content() {
                print!("{}", content);
                stdout.flush()?;
            }
        }
        println!();
        Ok(self.decoder.accumulated().to_string())
    }

    /// Drain the stream, returning the accumulated content and all chunks
    pub fn collect_all(mut self) -> Result<(String, Vec<CompletionChunk>)> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next() {
            chunks.push(chunk?);
        }
        Ok((self.decoder.accumulated().to_string(), chunks))
    }
}

impl<R: BufRead> Iterator for CompletionStream<R> {
    type Item = Result<CompletionChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    // EOF without [DONE] still ends the stream cleanly
                    self.done = true;
                    self.decoder.finish();
                    return None;
                }
                Ok(_) => match self.decoder.process_line(&line) {
                    LineOutcome::Chunk(chunk) => return Some(Ok(chunk)),
                    LineOutcome::Done => {
                        self.done = true;
                        return None;
                    }
                    LineOutcome::Skip => continue,
                },
                Err(error) => {
                    self.done = true;
                    return Some(Err(error.into()));
                }
            }
        }
        None
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Async streaming-completion consumer
pub struct AsyncCompletionStream {
    bytes: ByteStream,
    buffer: Vec<u8>,
    decoder: ChunkDecoder,
    done: bool,
}

impl std::fmt::Debug for AsyncCompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCompletionStream")
            .field("buffered_bytes", &self.buffer.len())
            .field("accumulated_len", &self.decoder.accumulated().len())
            .field("done", &self.done)
            .finish()
    }
}

impl AsyncCompletionStream {
    pub(crate) fn from_response(response: reqwest::Response, callbacks: StreamCallbacks) -> Self {
        Self::new(response.bytes_stream().boxed(), callbacks)
    }

    /// Consume SSE lines from any byte stream
    pub fn new(
        bytes: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
        callbacks: StreamCallbacks,
    ) -> Self {
        Self {
            bytes: bytes.boxed(),
            buffer: Vec::new(),
            decoder: ChunkDecoder::new(callbacks),
            done: false,
        }
    }

    /// Content accumulated so far
    pub fn accumulated(&self) -> &str {
        self.decoder.accumulated()
    }

    /// Next decoded chunk, or `None` when the stream has ended
    pub async fn next_chunk(&mut self) -> Option<Result<CompletionChunk>> {
        while !self.done {
            if let Some(line) = self.take_line() {
                match self.decoder.process_line(&line) {
                    LineOutcome::Chunk(chunk) => return Some(Ok(chunk)),
                    LineOutcome::Done => {
                        self.done = true;
                        return None;
                    }
                    LineOutcome::Skip => continue,
                }
            }

            match self.bytes.next().await {
                Some(Ok(bytes)) => {
                    trace!(len = bytes.len(), "received stream bytes");
                    self.buffer.extend_from_slice(&bytes);
                }
                Some(Err(error)) => {
                    self.done = true;
                    return Some(Err(error.into()));
                }
                None => {
                    self.done = true;
                    // flush a final unterminated line before finishing
                    if !self.buffer.is_empty() {
                        let line = String::from_utf8_lossy(&self.buffer).into_owned();
                        self.buffer.clear();
                        if let LineOutcome::Chunk(chunk) = self.decoder.process_line(&line) {
                            self.decoder.finish();
                            return Some(Ok(chunk));
                        }
                    }
                    self.decoder.finish();
                    return None;
                }
            }
        }
        None
    }

    /// Drain the stream, printing each content fragment to stdout
    pub async fn print_stream(mut self) -> Result<String> {
        let mut stdout = std::io::stdout();
        while let Some(chunk) = self.next_chunk().await {
            let chunk = chunk?;
            if let Some(content) = chunk.delta_content() {
                print!("{}", content);
                stdout.flush()?;
            }
        }
        println!();
        Ok(self.decoder.accumulated().to_string())
    }

    /// Drain the stream, returning the accumulated content and all chunks
    pub async fn collect_all(mut self) -> Result<(String, Vec<CompletionChunk>)> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            chunks.push(chunk?);
        }
        Ok((self.decoder.accumulated().to_string(), chunks))
    }

    fn take_line(&mut self) -> Option<String> {
        let newline = self.buffer.iter().position(|byte| *byte == b'\n')?;
        let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
        Some(String::from_utf8_lossy(&raw).into_owned())
    }
}
