use crate::http::content_type::ContentType;
use crate::http::header::{HeaderTable, Position};
use crate::http::segmented::SegmentedBuffer;
use crate::http::url::Url;
use std::collections::TryReserveError;

/// HTTP request methods.
///
/// Anything outside the table parses to `Invalid` instead of failing, so
/// the caller decides how to answer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// TRACE - Loop-back test
    TRACE,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// CONNECT - Establish a tunnel
    CONNECT,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// Not a recognized method token
    Invalid,
}

const METHODS: &[(Method, &str)] = &[
    (Method::GET, "GET"),
    (Method::HEAD, "HEAD"),
    (Method::POST, "POST"),
    (Method::PUT, "PUT"),
    (Method::DELETE, "DELETE"),
    (Method::TRACE, "TRACE"),
    (Method::OPTIONS, "OPTIONS"),
    (Method::CONNECT, "CONNECT"),
    (Method::PATCH, "PATCH"),
];

impl Method {
    /// Parses an HTTP method token (case-sensitive).
    ///
    /// # Example
    ///
    /// ```
    /// # use strand::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Method::GET);
    /// assert_eq!(Method::from_str("get"), Method::Invalid);
    /// ```
    pub fn from_str(s: &str) -> Self {
        METHODS
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(m, _)| *m)
            .unwrap_or(Method::Invalid)
    }

    /// The method token as it appears on the request line.
    ///
    /// # Returns
    ///
    /// `Some(&str)` for known methods, `None` for `Invalid`.
    pub fn as_str(&self) -> Option<&'static str> {
        METHODS.iter().find(|(m, _)| m == self).map(|(_, name)| *name)
    }

    pub fn is_valid(&self) -> bool {
        *self != Method::Invalid
    }
}

/// HTTP protocol versions named on the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
    Http2,
    Http3,
    Invalid,
}

const VERSIONS: &[(Version, &str)] = &[
    (Version::Http10, "HTTP/1.0"),
    (Version::Http11, "HTTP/1.1"),
    (Version::Http2, "HTTP/2"),
    (Version::Http3, "HTTP/3"),
];

impl Version {
    /// Parses the version token of a request line.
    ///
    /// # Arguments
    ///
    /// * `s` - Version token such as `HTTP/1.1` (case-sensitive)
    ///
    /// # Returns
    ///
    /// The matching version, or `Version::Invalid` for anything else.
    pub fn from_str(s: &str) -> Self {
        VERSIONS
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(v, _)| *v)
            .unwrap_or(Version::Invalid)
    }

    pub fn as_str(&self) -> Option<&'static str> {
        VERSIONS.iter().find(|(v, _)| v == self).map(|(_, name)| *name)
    }

    pub fn is_valid(&self) -> bool {
        *self != Version::Invalid
    }
}

/// Where a request is in its parse.
///
/// States only move forward; a finished request is replaced by a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RequestState {
    ReceivingStartLine,
    ReceivingHeaders,
    ReceivingBody,
    Done,
}

/// An HTTP request, possibly still being received.
///
/// Fields are filled in by the parser as lines and body bytes arrive; see
/// `http::parser` for the transitions.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) state: RequestState,
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) version: Version,
    pub(crate) content_type: Option<ContentType>,
    pub(crate) expected_body_size: usize,
    pub(crate) received_body_size: usize,
    pub(crate) headers: HeaderTable,
    pub(crate) body: SegmentedBuffer,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// A request waiting for its start line.
    pub fn new() -> Self {
        Self {
            state: RequestState::ReceivingStartLine,
            method: Method::Invalid,
            url: Url::default(),
            version: Version::Invalid,
            content_type: None,
            expected_body_size: 0,
            received_body_size: 0,
            headers: HeaderTable::new(),
            body: SegmentedBuffer::new(),
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == RequestState::Done
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Path part of the request target.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }

    /// Body size announced by `Content-Length`.
    pub fn expected_body_size(&self) -> usize {
        self.expected_body_size
    }

    pub fn received_body_size(&self) -> usize {
        self.received_body_size
    }

    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    /// Retrieves a header value by name, ignoring ASCII case.
    ///
    /// # Arguments
    ///
    /// * `key` - Header name to look up
    ///
    /// # Returns
    ///
    /// The first value received under `key`, or `None`.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.find(key)
    }

    pub fn body(&self) -> &SegmentedBuffer {
        &self.body
    }

    /// True when both the method and the version were recognized.
    pub fn is_valid(&self) -> bool {
        self.method.is_valid() && self.version.is_valid()
    }

    /// Determines whether the connection should remain open after the response.
    ///
    /// HTTP/1.1 keeps the connection unless `Connection: close` is sent;
    /// HTTP/1.0 closes it unless `Connection: keep-alive` is sent.
    pub fn keep_alive(&self) -> bool {
        match self.header("Connection") {
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version != Version::Http10,
        }
    }
}

/// Builder for complete requests, for handlers exercised outside a
/// connection.
///
/// # Example
///
/// ```
/// # use strand::http::request::{Method, RequestBuilder};
/// let req = RequestBuilder::new(Method::POST, "/api")
///     .header("Content-Type", "text/plain")
///     .body("hello")
///     .build()
///     .unwrap();
/// assert_eq!(req.expected_body_size(), 5);
/// ```
pub struct RequestBuilder {
    method: Method,
    url: Url,
    version: Version,
    headers: HeaderTable,
    chunks: Vec<bytes::Bytes>,
}

impl RequestBuilder {
    /// Starts an `HTTP/1.1` request.
    ///
    /// # Arguments
    ///
    /// * `method` - Request method
    /// * `target` - Request target, path plus optional query
    pub fn new(method: Method, target: &str) -> Self {
        Self {
            method,
            url: Url::parse(target),
            version: Version::Http11,
            headers: HeaderTable::new(),
            chunks: Vec::new(),
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Adds a header; repeated names are all kept.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert_copy(key, value, Position::End);
        self
    }

    /// Appends one body chunk. Chunks are kept separate, as if they had
    /// arrived in separate reads.
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.chunks.push(body.into());
        self
    }

    /// Assembles the request in the `Done` state.
    ///
    /// # Returns
    ///
    /// The request, or the allocation error hit while storing the body.
    pub fn build(self) -> Result<Request, TryReserveError> {
        let mut body = SegmentedBuffer::new();
        for chunk in self.chunks {
            body.append(chunk)?;
        }
        let size = body.byte_len();
        let content_type = self.headers.find("Content-Type").and_then(ContentType::from_str);
        Ok(Request {
            state: RequestState::Done,
            method: self.method,
            url: self.url,
            version: self.version,
            content_type,
            expected_body_size: size,
            received_body_size: size,
            headers: self.headers,
            body,
        })
    }
}
