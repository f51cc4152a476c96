// ABOUTME: Line-buffering SSE parser for LLM streaming responses
// ABOUTME: Handles partial lines across TCP boundaries and multiple events per chunk
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Aurora Chat

//! # SSE Stream Parser
//!
//! A line-buffering parser for Server-Sent Events (SSE) used by the LLM
//! provider. Solves two correctness issues:
//!
//! 1. **Multiple events per TCP chunk**: When network buffers batch several
//!    SSE events into a single `bytes_stream()` chunk, all events are emitted.
//!
//! 2. **Partial JSON across TCP boundaries**: When a payload is split across
//!    two TCP chunks, the line buffer accumulates partial data until a
//!    complete line arrives.
//!
//! The provider supplies a `parse_data` closure that converts raw JSON
//! strings into `StreamChunk` values. The SSE framing (line buffering,
//! `data:` prefix stripping, `[DONE]` detection) is handled once here.

use std::mem;

use bytes::Bytes;
use futures_util::{future, Stream, StreamExt};

use super::{ChatStream, StreamChunk};
use crate::errors::AppError;

/// A parsed SSE event from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the JSON string (prefix stripped)
    Data(String),
    /// The `[DONE]` termination signal (OpenAI convention)
    Done,
}

impl SseEvent {
    /// Parse a single complete SSE line into an event
    ///
    /// Returns `None` for empty lines (event separators) and non-data fields
    /// (`event:`, `id:`, `retry:`, comment lines starting with `:`).
    fn from_line(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == "data: [DONE]" {
            return Some(Self::Done);
        }
        let data = trimmed.strip_prefix("data: ")?;
        if data.trim().is_empty() {
            None
        } else {
            Some(Self::Data(data.to_owned()))
        }
    }
}

/// Line-buffering SSE parser that handles partial lines across TCP chunk
/// boundaries
///
/// SSE streams are newline-delimited. TCP does not guarantee alignment
/// between network chunks and SSE event boundaries, so incomplete lines are
/// buffered and only emitted once a terminating `\n` arrives.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    /// Accumulated bytes not yet terminated by a newline
    buffer: String,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from a TCP chunk, returning any complete SSE events
    ///
    /// Bytes are appended to the internal buffer. Complete lines are
    /// extracted and parsed; any trailing partial line stays buffered for the
    /// next `feed()` call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_owned();
            self.buffer.drain(..=newline_pos);
            if let Some(event) = SseEvent::from_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush any remaining buffered content as a final event
    ///
    /// Called when the byte stream ends with a partial line (no trailing
    /// newline) still in the buffer.
    pub fn flush(&mut self) -> Option<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        SseEvent::from_line(&remaining)
    }
}

/// Create a properly-buffered SSE stream from a raw byte stream
///
/// Wraps a `reqwest` byte stream with SSE line buffering. The `parse_data`
/// closure converts provider-specific JSON strings into `StreamChunk` values;
/// returning `None` skips events that produce no output (metadata-only
/// chunks). Empty deltas are filtered unless they carry the final flag.
pub fn create_sse_stream<S, F>(
    byte_stream: S,
    parse_data: F,
    provider_name: &'static str,
) -> ChatStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut parser = SseLineBuffer::new();
        let mut byte_stream = Box::pin(byte_stream);

        while let Some(next) = byte_stream.next().await {
            match next {
                Ok(bytes) => {
                    for event in parser.feed(&bytes) {
                        match event {
                            SseEvent::Data(json_str) => {
                                if let Some(result) = parse_data(&json_str) {
                                    yield result;
                                }
                            }
                            SseEvent::Done => yield Ok(final_chunk()),
                        }
                    }
                }
                Err(e) => {
                    yield Err(AppError::external_service(
                        provider_name,
                        format!("Stream read error: {e}"),
                    ));
                    return;
                }
            }
        }

        // Byte stream ended without [DONE] - flush whatever is buffered
        match parser.flush() {
            Some(SseEvent::Data(json_str)) => {
                if let Some(result) = parse_data(&json_str) {
                    yield result;
                }
            }
            Some(SseEvent::Done) => yield Ok(final_chunk()),
            None => {}
        }
    };

    // Skip empty deltas unless final
    let filtered = stream.filter(|result| {
        future::ready(
            result
                .as_ref()
                .map_or(true, |chunk| !chunk.delta.is_empty() || chunk.is_final),
        )
    });

    Box::pin(filtered)
}

fn final_chunk() -> StreamChunk {
    StreamChunk {
        delta: String::new(),
        is_final: true,
        finish_reason: Some("stop".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_complete_line_emits_event() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"data: {\"x\":1}\n");
        assert_eq!(events, vec![SseEvent::Data("{\"x\":1}".to_owned())]);
    }

    #[test]
    fn test_partial_line_is_buffered_across_feeds() {
        let mut parser = SseLineBuffer::new();
        assert!(parser.feed(b"data: {\"delta\":\"he").is_empty());
        let events = parser.feed(b"llo\"}\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"delta\":\"hello\"}".to_owned())]
        );
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\ndata: [DONE]\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_owned()),
                SseEvent::Data("{\"b\":2}".to_owned()),
                SseEvent::Done,
            ]
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"data: {\"a\":1}\r\n");
        assert_eq!(events, vec![SseEvent::Data("{\"a\":1}".to_owned())]);
    }

    #[test]
    fn test_non_data_fields_are_ignored() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"event: message\nid: 42\nretry: 100\n: comment\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_flush_returns_trailing_partial_event() {
        let mut parser = SseLineBuffer::new();
        assert!(parser.feed(b"data: {\"tail\":true}").is_empty());
        assert_eq!(
            parser.flush(),
            Some(SseEvent::Data("{\"tail\":true}".to_owned()))
        );
        // Buffer is consumed
        assert_eq!(parser.flush(), None);
    }

    #[tokio::test]
    async fn test_stream_filters_empty_deltas_and_keeps_final() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"d\":\"hi\"}\n")),
            Ok(Bytes::from_static(b"data: {\"d\":\"\"}\n")),
            Ok(Bytes::from_static(b"data: [DONE]\n")),
        ];
        let byte_stream = futures_util::stream::iter(chunks);

        let parse = |json: &str| {
            let value: serde_json::Value = serde_json::from_str(json).ok()?;
            Some(Ok(StreamChunk {
                delta: value.get("d")?.as_str()?.to_owned(),
                is_final: false,
                finish_reason: None,
            }))
        };

        let stream = create_sse_stream(byte_stream, parse, "test");
        let collected: Vec<_> = stream.collect::<Vec<_>>().await;

        assert_eq!(collected.len(), 2);
        assert!(collected[0].as_ref().is_ok_and(|c| c.delta == "hi"));
        assert!(collected[1].as_ref().is_ok_and(|c| c.is_final));
    }
}
