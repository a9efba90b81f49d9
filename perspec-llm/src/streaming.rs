//! SSE parser for streamed chat completions.
//!
//! Turns the raw response body into a [`TextStream`] of content deltas.
//! Partial lines and partial UTF-8 sequences are carried over between
//! network chunks. `data: [DONE]` ends the stream, and so does the server
//! closing the connection without it.

use crate::traits::{LlmError, TextStream};
use bytes::Bytes;
use futures::Stream;
use perspec_http::{ByteStream, HttpError};
use serde::Deserialize;
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Debug, Deserialize)]
struct StreamChunkRaw {
    #[serde(default)]
    choices: Vec<StreamChoiceRaw>,
}

#[derive(Debug, Deserialize)]
struct StreamChoiceRaw {
    #[serde(default)]
    delta: Option<DeltaRaw>,
}

#[derive(Debug, Deserialize)]
struct DeltaRaw {
    #[serde(default)]
    content: Option<String>,
}

enum Line {
    Delta(String),
    Done,
}

pub struct SseTextStream<S> {
    inner: Pin<Box<S>>,
    buffer: String,
    pending: Vec<u8>,
    finished: bool,
}

impl<S> SseTextStream<S>
where
    S: Stream<Item = Result<Bytes, HttpError>> + Send,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner: Box::pin(inner),
            buffer: String::new(),
            pending: Vec::new(),
            finished: false,
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), LlmError> {
        self.pending.extend_from_slice(bytes);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Incomplete sequence at the end: keep the tail for the next chunk.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(LlmError::Decode(format!("invalid UTF-8 in stream: {e}")));
            }
        };
        let text = std::str::from_utf8(&self.pending[..valid])
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        self.buffer.push_str(text);
        self.pending.drain(..valid);
        Ok(())
    }
}

/// Wrap a response body as a stream of text deltas.
pub fn text_stream(body: ByteStream) -> TextStream {
    Box::pin(SseTextStream::new(body))
}

impl<S> Stream for SseTextStream<S>
where
    S: Stream<Item = Result<Bytes, HttpError>> + Send,
{
    type Item = Result<String, LlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        loop {
            match next_line(&mut this.buffer, false) {
                Some(Ok(Line::Delta(text))) => return Poll::Ready(Some(Ok(text))),
                Some(Ok(Line::Done)) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => {}
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    if let Err(e) = this.push_bytes(&bytes) {
                        this.finished = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(LlmError::from(e))));
                }
                Poll::Ready(None) => {
                    // Connection closed; a final unterminated line may remain.
                    let tail = next_line(&mut this.buffer, true);
                    this.finished = true;
                    return match tail {
                        Some(Ok(Line::Delta(text))) => Poll::Ready(Some(Ok(text))),
                        Some(Err(e)) => Poll::Ready(Some(Err(e))),
                        Some(Ok(Line::Done)) | None => Poll::Ready(None),
                    };
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Pop complete lines until one carries a non-empty delta or the end marker.
fn next_line(buffer: &mut String, at_eof: bool) -> Option<Result<Line, LlmError>> {
    loop {
        let line: String = match buffer.find('\n') {
            Some(pos) => {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);
                line
            }
            None if at_eof && !buffer.trim().is_empty() => {
                let line = buffer.trim().to_string();
                buffer.clear();
                line
            }
            None => return None,
        };

        // Comments, `event:`, `id:` and blank separators carry no text.
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            return Some(Ok(Line::Done));
        }

        match serde_json::from_str::<StreamChunkRaw>(data) {
            Ok(raw) => {
                let delta = raw
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta)
                    .and_then(|d| d.content)
                    .unwrap_or_default();
                if !delta.is_empty() {
                    return Some(Ok(Line::Delta(delta)));
                }
            }
            Err(e) => {
                let end = data
                    .char_indices()
                    .nth(200)
                    .map(|(i, _)| i)
                    .unwrap_or(data.len());
                return Some(Err(LlmError::Decode(format!(
                    "stream chunk: {e} (data: {})",
                    &data[..end]
                ))));
            }
        }
    }
}
