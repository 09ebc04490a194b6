//! Mock response object: a small state machine over a buffered or streaming
//! body.
//!
//! State transitions: `NotStarted → HeadersPending → Writing* → Ended`.
//! Headers commit lazily on the first byte-producing call, and no transition
//! leaves `Ended`. Terminal methods fire the completion signal exactly once;
//! a second terminal call is lenient (buffered body text still appends) but
//! never re-fires the signal.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::oneshot;

/// Response lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// Nothing touched yet
    NotStarted,
    /// Status or headers set, no bytes committed
    HeadersPending,
    /// At least one byte committed
    Writing,
    /// Terminal method called
    Ended,
}

/// Callback surface for streaming delivery.
///
/// The contract is three-phase: `on_start` fires exactly once before the
/// first chunk, `on_chunk` per write, `on_end` exactly once after the last
/// chunk.
pub trait StreamSink: Send {
    /// Headers are committed; status line and header map are final.
    fn on_start(&mut self, status_code: u16, status_message: &str, headers: &HashMap<String, String>);

    /// One body chunk.
    fn on_chunk(&mut self, chunk: &[u8]);

    /// The response is complete.
    fn on_end(&mut self);
}

/// Final snapshot of a completed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseParts {
    /// Numeric status
    pub status_code: u16,
    /// Status reason phrase
    pub status_message: String,
    /// Header map with lowercased names
    pub headers: HashMap<String, String>,
    /// Accumulated body (empty for streaming responses; those bytes already
    /// went through the sink)
    pub body: Vec<u8>,
}

/// Receiver for the one-shot completion signal, carrying the snapshot taken
/// at the terminal call.
pub type CompletionReceiver = oneshot::Receiver<ResponseParts>;

enum ResponseBody {
    Buffered(Vec<u8>),
    Streaming(Box<dyn StreamSink>),
}

/// Mock response handed to handler code.
///
/// Construct via [`buffered`](Self::buffered) or
/// [`streaming`](Self::streaming); both return the completion receiver the
/// executor races against the handler timeout. Dropping the response without
/// a terminal call closes that channel, which the executor reports as an
/// incomplete handler.
pub struct MockResponse {
    status_code: u16,
    status_message: String,
    headers: HashMap<String, String>,
    state: ResponseState,
    headers_sent: bool,
    body: ResponseBody,
    done: Option<oneshot::Sender<ResponseParts>>,
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockResponse")
            .field("status_code", &self.status_code)
            .field("state", &self.state)
            .field("headers_sent", &self.headers_sent)
            .finish()
    }
}

impl MockResponse {
    /// Create a buffered response.
    pub fn buffered() -> (Self, CompletionReceiver) {
        Self::with_body(ResponseBody::Buffered(Vec::new()))
    }

    /// Create a streaming response delivering through `sink`.
    pub fn streaming(sink: Box<dyn StreamSink>) -> (Self, CompletionReceiver) {
        Self::with_body(ResponseBody::Streaming(sink))
    }

    fn with_body(body: ResponseBody) -> (Self, CompletionReceiver) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                status_code: 200,
                status_message: status_text(200).to_string(),
                headers: HashMap::new(),
                state: ResponseState::NotStarted,
                headers_sent: false,
                body,
                done: Some(tx),
            },
            rx,
        )
    }

    /// Set the status code (and matching reason phrase). Chainable.
    pub fn status(&mut self, code: u16) -> &mut Self {
        if self.state == ResponseState::NotStarted {
            self.state = ResponseState::HeadersPending;
        }
        if self.headers_sent {
            tracing::warn!(code, "status() after headers were sent has no effect");
            return self;
        }
        self.status_code = code;
        self.status_message = status_text(code).to_string();
        self
    }

    /// Set a header. Names are lowercased. Chainable.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        if self.state == ResponseState::NotStarted {
            self.state = ResponseState::HeadersPending;
        }
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Append a body chunk, committing headers on the first byte.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) {
        if self.state == ResponseState::Ended {
            tracing::warn!("write() after end(); appending to an already-completed response");
        }
        self.push_bytes(chunk.as_ref());
    }

    /// Serialize `value` as JSON and end the response.
    pub fn json<T: Serialize>(&mut self, value: &T) -> serde_json::Result<()> {
        let text = serde_json::to_string(value)?;
        if !self.headers_sent {
            self.headers
                .entry("content-type".to_string())
                .or_insert_with(|| "application/json".to_string());
        }
        self.push_bytes(text.as_bytes());
        self.finish();
        Ok(())
    }

    /// Write `data` and end the response.
    pub fn send(&mut self, data: &str) {
        if !self.headers_sent {
            self.headers
                .entry("content-type".to_string())
                .or_insert_with(|| "text/html; charset=utf-8".to_string());
        }
        self.push_bytes(data.as_bytes());
        self.finish();
    }

    /// End the response, optionally appending a final chunk.
    pub fn end(&mut self, data: Option<&[u8]>) {
        if let Some(data) = data {
            self.push_bytes(data);
        }
        self.finish();
    }

    /// Redirect with an explicit status code.
    pub fn redirect(&mut self, code: u16, location: &str) {
        self.status(code);
        self.set_header("location", location);
        self.finish();
    }

    /// Redirect with the default 302 status.
    pub fn redirect_to(&mut self, location: &str) {
        self.redirect(302, location);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResponseState {
        self.state
    }

    /// Whether headers were committed.
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    /// Whether a terminal method has run.
    pub fn is_ended(&self) -> bool {
        self.state == ResponseState::Ended
    }

    /// Current status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Buffered body bytes; `None` in streaming mode.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            ResponseBody::Buffered(buf) => Some(buf),
            ResponseBody::Streaming(_) => None,
        }
    }

    /// Commit headers and deliver `bytes`.
    fn push_bytes(&mut self, bytes: &[u8]) {
        let ended = self.state == ResponseState::Ended;
        if !self.headers_sent {
            self.commit_headers();
        }
        match &mut self.body {
            ResponseBody::Buffered(buf) => buf.extend_from_slice(bytes),
            ResponseBody::Streaming(sink) => {
                // The sink is closed once on_end has fired
                if !ended {
                    sink.on_chunk(bytes);
                }
            }
        }
        if !ended {
            self.state = ResponseState::Writing;
        }
    }

    fn commit_headers(&mut self) {
        self.headers_sent = true;
        if let ResponseBody::Streaming(sink) = &mut self.body {
            sink.on_start(self.status_code, &self.status_message, &self.headers);
        }
    }

    /// Transition to `Ended` and fire the completion signal once.
    fn finish(&mut self) {
        if self.state == ResponseState::Ended {
            return;
        }
        if !self.headers_sent {
            self.commit_headers();
        }
        self.state = ResponseState::Ended;
        if let ResponseBody::Streaming(sink) = &mut self.body {
            sink.on_end();
        }
        if let Some(done) = self.done.take() {
            let _ = done.send(self.snapshot());
        }
    }

    fn snapshot(&self) -> ResponseParts {
        ResponseParts {
            status_code: self.status_code,
            status_message: self.status_message.clone(),
            headers: self.headers.clone(),
            body: match &self.body {
                ResponseBody::Buffered(buf) => buf.clone(),
                ResponseBody::Streaming(_) => Vec::new(),
            },
        }
    }
}

/// Reason phrase for common status codes.
pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "",
    }
}
