use crate::http::content_type::ContentType;
use crate::http::header::{HeaderTable, Position};
use crate::http::request::Method;
use bytes::Bytes;
use std::fs::File;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// HTTP status codes the server produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 100 Continue
    Continue,
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 202 Accepted
    Accepted,
    /// 204 No Content
    NoContent,
    /// 206 Partial Content
    PartialContent,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 302 Found
    Found,
    /// 304 Not Modified
    NotModified,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 408 Request Timeout
    RequestTimeout,
    /// 413 Payload Too Large
    PayloadTooLarge,
    /// 414 URI Too Long
    UriTooLong,
    /// 500 Internal Server Error
    InternalServerError,
    /// 501 Not Implemented
    NotImplemented,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// 505 HTTP Version Not Supported
    HttpVersionNotSupported,
}

const STATUS_TABLE: &[(StatusCode, u16, &str)] = &[
    (StatusCode::Continue, 100, "Continue"),
    (StatusCode::Ok, 200, "OK"),
    (StatusCode::Created, 201, "Created"),
    (StatusCode::Accepted, 202, "Accepted"),
    (StatusCode::NoContent, 204, "No Content"),
    (StatusCode::PartialContent, 206, "Partial Content"),
    (StatusCode::MovedPermanently, 301, "Moved Permanently"),
    (StatusCode::Found, 302, "Found"),
    (StatusCode::NotModified, 304, "Not Modified"),
    (StatusCode::BadRequest, 400, "Bad Request"),
    (StatusCode::Forbidden, 403, "Forbidden"),
    (StatusCode::NotFound, 404, "Not Found"),
    (StatusCode::MethodNotAllowed, 405, "Method Not Allowed"),
    (StatusCode::RequestTimeout, 408, "Request Timeout"),
    (StatusCode::PayloadTooLarge, 413, "Payload Too Large"),
    (StatusCode::UriTooLong, 414, "URI Too Long"),
    (StatusCode::InternalServerError, 500, "Internal Server Error"),
    (StatusCode::NotImplemented, 501, "Not Implemented"),
    (StatusCode::ServiceUnavailable, 503, "Service Unavailable"),
    (StatusCode::HttpVersionNotSupported, 505, "HTTP Version Not Supported"),
];

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use strand::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        self.entry().1
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        self.entry().2
    }

    /// Looks up a numeric status code.
    ///
    /// # Returns
    ///
    /// `Some(StatusCode)` for codes in the table, `None` otherwise.
    pub fn from_u16(code: u16) -> Option<Self> {
        STATUS_TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(s, _, _)| *s)
    }

    fn entry(&self) -> &'static (StatusCode, u16, &'static str) {
        // Every variant has a row.
        STATUS_TABLE
            .iter()
            .find(|(s, _, _)| s == self)
            .unwrap_or(&STATUS_TABLE[0])
    }
}

/// What follows the response head on the wire.
#[derive(Debug)]
pub enum Body {
    Empty,
    Bytes(Bytes),
    /// Streamed straight from the file to the socket.
    File { file: File, len: u64 },
    /// `HEAD` answer: the length is advertised, nothing is sent.
    Omitted { len: u64 },
}

impl Body {
    pub fn len(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Bytes(b) => b.len() as u64,
            Body::File { len, .. } | Body::Omitted { len } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A response being populated by a handler.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Handler-supplied headers, sent after the generated ones
    pub headers: HeaderTable,
    content_type: Option<String>,
    accept_ranges: bool,
    body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderTable::new(),
            content_type: None,
            accept_ranges: false,
            body: Body::Empty,
        }
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Adds a header sent after the generated ones.
    ///
    /// A header named like a generated one (`Server`, `Date`,
    /// `Content-Type`, `Accept-Ranges`) replaces it; `Content-Length` is
    /// ignored.
    ///
    /// # Arguments
    ///
    /// * `key` - Header name, matched without regard to ASCII case
    /// * `value` - Header value
    ///
    /// # Example
    ///
    /// ```
    /// # use strand::http::response::{Response, StatusCode};
    /// let mut resp = Response::new(StatusCode::Ok);
    /// resp.set_header("Cache-Control", "no-cache")
    ///     .set_header("X-Request-Id", "42");
    /// assert_eq!(resp.headers.find("cache-control"), Some("no-cache"));
    /// ```
    pub fn set_header(&mut self, key: &str, value: &str) -> &mut Self {
        self.headers.insert_copy(key, value, Position::End);
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn accept_ranges(&self) -> bool {
        self.accept_ranges
    }

    /// Sets an in-memory body with its content type.
    ///
    /// # Arguments
    ///
    /// * `content_type` - Value of the `Content-Type` header
    /// * `text` - Body bytes, moved in without copying when already `Bytes`
    pub fn write_text(&mut self, content_type: ContentType, text: impl Into<Bytes>) -> &mut Self {
        self.content_type = Some(content_type.as_str().to_owned());
        self.accept_ranges = false;
        self.body = Body::Bytes(text.into());
        self
    }

    /// Streams a regular file as the body.
    ///
    /// The content type comes from the file extension. For `HEAD` only the
    /// length is advertised.
    ///
    /// # Arguments
    ///
    /// * `path` - File to send
    /// * `method` - Method of the request being answered
    ///
    /// # Returns
    ///
    /// An error of kind `NotFound` when `path` is missing or is not a
    /// regular file, any other open error as is.
    pub fn send_file(&mut self, path: &Path, method: Method) -> io::Result<&mut Self> {
        let file = File::open(path)?;
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let len = meta.len();
        self.content_type = Some(ContentType::for_path(path));
        self.accept_ranges = true;
        self.body = if method == Method::HEAD {
            Body::Omitted { len }
        } else {
            Body::File { file, len }
        };
        Ok(self)
    }

    pub(crate) fn into_parts(self) -> (StatusCode, HeaderTable, Option<String>, bool, Body) {
        (self.status, self.headers, self.content_type, self.accept_ranges, self.body)
    }
}

/// Headers added to every response, built once at startup.
#[derive(Debug, Clone)]
pub struct ResponseDefaults {
    headers: HeaderTable,
}

impl ResponseDefaults {
    /// Builds the `Server: <hostname> (<server_name>)` default.
    ///
    /// # Arguments
    ///
    /// * `server_name` - Product token, usually `Strand/<version>`
    pub fn new(server_name: &str) -> Self {
        let mut headers = HeaderTable::new();
        headers.insert(
            "Server",
            format!("{} ({})", hostname(), server_name),
            Position::End,
        );
        Self { headers }
    }

    pub fn empty() -> Self {
        Self {
            headers: HeaderTable::new(),
        }
    }

    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    /// Static defaults followed by a fresh `Date` header.
    pub fn apply(&self, target: &mut HeaderTable) {
        target.merge_from(&self.headers);
        target.insert("Date", httpdate::fmt_http_date(SystemTime::now()), Position::End);
    }
}

fn hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: the buffer is valid for `buf.len()` bytes for the whole call.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    match std::str::from_utf8(&buf[..end]) {
        Ok(name) if !name.is_empty() => name.to_owned(),
        _ => "localhost".to_string(),
    }
}
