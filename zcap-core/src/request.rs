//! Framework-agnostic request contract.
//!
//! Adapters (e.g. `zcap-actix`) build one [`CoreRequest`] per incoming request and hand it to the
//! pipeline; nothing here depends on any particular HTTP framework.

use http::Method;

/// An immutable, already-received HTTP request as seen by the verification core.
///
/// Headers are stored lower-cased, insertion order preserved, duplicates kept (some header
/// conventions, like `Digest`, allow repetition).
#[derive(Debug, Clone)]
pub struct CoreRequest {
    method: Method,
    /// Absolute URL, e.g. `https://example.com/documents?x=1`.
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl CoreRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Clears any pre-populated body buffer.
    pub fn clear_body(&mut self) {
        self.body = None;
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path_and_query(&self) -> &str {
        // Strip the scheme+authority prefix, leaving `/path?query`.
        if let Some(idx) = self.url.find("://") {
            let rest = &self.url[idx + 3..];
            rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
        } else {
            &self.url
        }
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// First value of a header, case-insensitively; `None` if absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header, in request order.
    pub fn header_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .filter(move |(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// A request is considered to carry a body when `content-length` or `transfer-encoding` is
    /// present; `content-type` alone is not sufficient.
    pub fn has_body_headers(&self) -> bool {
        self.has_header("content-length") || self.has_header("transfer-encoding")
    }

    /// Default action for the request's method, per a fixed GET/HEAD/OPTIONS→read,
    /// POST/PUT/PATCH/DELETE/CONNECT/TRACE→write table.
    pub fn default_action(&self) -> Option<&'static str> {
        match self.method.as_str() {
            "GET" | "HEAD" | "OPTIONS" => Some("read"),
            "POST" | "PUT" | "PATCH" | "DELETE" | "CONNECT" | "TRACE" => Some("write"),
            _ => None,
        }
    }
}
