//! Server-sent-event plumbing for streamed model output.
//!
//! Both providers stream completions as SSE `data:` lines over HTTP.
//! The structures here turn a raw byte stream into a single-pass,
//! pull-driven stream of text fragments that never errors: a mid-stream
//! transport failure is surfaced as one final fragment beginning
//! "Error:", so an HTTP response can forward chunks verbatim.

use futures::stream::Stream;
use futures::StreamExt;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A forward-only, single-consumer stream of analysis text fragments.
pub type AnalysisStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// What a single `data:` payload contributes to the text stream.
pub enum SseFragment {
    Text(String),
    Skip,
    Done,
}

/// A stream holding exactly one fragment (used for immediate errors).
pub fn once(fragment: String) -> AnalysisStream {
    Box::pin(futures::stream::once(async move { fragment }))
}

/// Accumulates raw bytes and yields complete `data:` payloads.
///
/// Partial lines are retained until the closing newline arrives, so
/// payloads split across network chunks reassemble correctly.
#[derive(Default)]
pub struct SseLineBuffer {
    buf: String,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

/// Build an `AnalysisStream` over an SSE response body.
///
/// `extract` maps each `data:` payload to its contribution; it differs
/// per provider (delta shapes are not compatible).
pub fn stream_response<F>(resp: reqwest::Response, extract: F) -> AnalysisStream
where
    F: FnMut(&str) -> SseFragment + Send + Unpin + 'static,
{
    let body = resp
        .bytes_stream()
        .map(|result| result.map(|bytes| bytes.to_vec()).map_err(|e| e.to_string()))
        .boxed();

    Box::pin(SseTextStream {
        body,
        lines: SseLineBuffer::new(),
        pending: VecDeque::new(),
        extract,
        finished: false,
    })
}

struct SseTextStream<F> {
    body: Pin<Box<dyn Stream<Item = Result<Vec<u8>, String>> + Send>>,
    lines: SseLineBuffer,
    pending: VecDeque<String>,
    extract: F,
    finished: bool,
}

impl<F> Stream for SseTextStream<F>
where
    F: FnMut(&str) -> SseFragment + Send + Unpin + 'static,
{
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        let this = self.get_mut();

        loop {
            if let Some(text) = this.pending.pop_front() {
                return Poll::Ready(Some(text));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    this.finished = true;
                }
                Poll::Ready(Some(Err(e))) => {
                    this.finished = true;
                    return Poll::Ready(Some(format!("Error: {e}")));
                }
                Poll::Ready(Some(Ok(chunk))) => {
                    for payload in this.lines.push(&chunk) {
                        match (this.extract)(&payload) {
                            SseFragment::Text(text) => this.pending.push_back(text),
                            SseFragment::Skip => {}
                            SseFragment::Done => {
                                this.finished = true;
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
