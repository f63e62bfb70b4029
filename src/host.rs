//! Host pipeline seams.
//!
//! The gateway that runs the policy is not part of this crate. These types
//! describe what the mock needs from it: the inbound request head and body
//! stream, a sink accepting the fabricated response, and a per-request
//! context where an alternate backend can be installed.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Method, path, query string and headers of an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Headers,
}

impl RequestHead {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Path plus query string.
    pub fn uri(&self) -> String {
        match self.query.as_deref() {
            Some(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }

    /// Decoded query parameters; the first occurrence of a name wins.
    pub fn query_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        for part in self.query.as_deref().unwrap_or("").split('&') {
            if part.is_empty() {
                continue;
            }
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            params
                .entry(percent_decode(key))
                .or_insert_with(|| percent_decode(value));
        }
        params
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(byte) => {
                        decoded.push(byte);
                        i += 3;
                    }
                    None => {
                        decoded.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Ordered header list with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every header named `name` by a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(index) => {
                self.entries[index].1 = value;
                let mut seen = false;
                self.entries.retain(|(existing, _)| {
                    if !existing.eq_ignore_ascii_case(&name) {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Add a value without replacing existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Inbound request body, delivered chunk by chunk.
///
/// Pulling the first chunk resumes the paused request stream.
#[async_trait]
pub trait BodyStream: Send {
    /// Next chunk, or `None` once the stream has ended.
    async fn read_chunk(&mut self) -> Option<Vec<u8>>;
}

#[async_trait]
impl BodyStream for tokio::sync::mpsc::Receiver<Vec<u8>> {
    async fn read_chunk(&mut self) -> Option<Vec<u8>> {
        self.recv().await
    }
}

#[async_trait]
impl BodyStream for std::vec::IntoIter<Vec<u8>> {
    async fn read_chunk(&mut self) -> Option<Vec<u8>> {
        self.next()
    }
}

/// A request without body.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyBody;

#[async_trait]
impl BodyStream for EmptyBody {
    async fn read_chunk(&mut self) -> Option<Vec<u8>> {
        None
    }
}

/// Receives the response produced by a backend.
///
/// Calls arrive in order: `head`, zero or one `body`, then `end`.
pub trait ResponseSink: Send {
    fn head(&mut self, status: u16, headers: &Headers);
    fn body(&mut self, chunk: Vec<u8>);
    fn end(&mut self);
}

/// A [`ResponseSink`] that keeps everything it receives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedResponse {
    pub status: Option<u16>,
    pub headers: Headers,
    pub chunks: Vec<Vec<u8>>,
    pub ended: bool,
}

impl RecordedResponse {
    /// All body chunks concatenated.
    pub fn body_bytes(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes()).into_owned()
    }
}

impl ResponseSink for RecordedResponse {
    fn head(&mut self, status: u16, headers: &Headers) {
        self.status = Some(status);
        self.headers = headers.clone();
    }

    fn body(&mut self, chunk: Vec<u8>) {
        self.chunks.push(chunk);
    }

    fn end(&mut self) {
        self.ended = true;
    }
}

/// Produces the response for a request in place of the real backend.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        head: &RequestHead,
        body: &mut dyn BodyStream,
        sink: &mut dyn ResponseSink,
    );
}

/// Per-request state shared between policies and the host.
#[derive(Default)]
pub struct ExecutionContext {
    invoker: Option<Arc<dyn Invoker>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an alternate backend for this request.
    pub fn set_invoker(&mut self, invoker: Arc<dyn Invoker>) {
        self.invoker = Some(invoker);
    }

    pub fn invoker(&self) -> Option<Arc<dyn Invoker>> {
        self.invoker.clone()
    }
}
