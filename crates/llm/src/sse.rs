//! Server-Sent Events decoding
//!
//! Splits a chat-completions response body into `data:` payloads and decodes
//! them into [`ChatChunk`]s. Lines are buffered as bytes so a multi-byte
//! character split across network reads is never mangled.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use crate::provider::ChunkStream;
use crate::types::{ChatChunk, LlmError};

/// Terminal payload of an OpenAI-style stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Incremental line splitter that yields `data:` payloads.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the payloads of every completed `data:` line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = data_payload(&String::from_utf8_lossy(&line)) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Payload of a final line that had no trailing newline.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        data_payload(&String::from_utf8_lossy(&line))
    }
}

fn data_payload(line: &str) -> Option<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix("data:")?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.is_empty() {
        return None;
    }
    Some(payload.to_string())
}

struct DecodeState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseLineDecoder,
    pending: VecDeque<String>,
    exhausted: bool,
}

/// Turn a byte stream into a stream of decoded chunks.
///
/// The stream ends at `[DONE]` or at end of body. A transport error or a
/// malformed payload is yielded once as an error item.
pub fn decode_chunk_stream<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: SseLineDecoder::new(),
        pending: VecDeque::new(),
        exhausted: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(payload) = state.pending.pop_front() {
                if payload.trim() == DONE_MARKER {
                    return None;
                }
                let parsed = serde_json::from_str::<ChatChunk>(&payload).map_err(|e| {
                    LlmError::ParseError {
                        message: format!("invalid stream chunk: {}", e),
                    }
                });
                return Some((parsed, state));
            }
            if state.exhausted {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let payloads = state.decoder.push(chunk.as_ref());
                    state.pending.extend(payloads);
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    let err = LlmError::NetworkError {
                        message: e.to_string(),
                    };
                    return Some((Err(err), state));
                }
                None => {
                    state.exhausted = true;
                    if let Some(rest) = state.decoder.flush() {
                        state.pending.push_back(rest);
                    }
                }
            }
        }
    }))
}
