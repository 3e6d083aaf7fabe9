//! Incremental request parser.
//!
//! The start line and headers arrive one line at a time through
//! [`Request::update_line`]; the body arrives as raw bytes through
//! [`Request::update_body`]. The caller picks the mode from
//! [`Request::state`] after every step.
//!
//! ```text
//! ReceivingStartLine --line--> ReceivingHeaders --""--> Done
//!                                      |                  ^
//!                                      +--""--> ReceivingBody --received == expected
//! ```

use crate::http::content_type::ContentType;
use crate::http::header::{HeaderTable, Position};
use crate::http::request::{Method, Request, RequestState, Version};
use crate::http::url::Url;
use std::collections::TryReserveError;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("request line is missing a token")]
    MissingToken,
    #[error("header line has no colon")]
    MissingColon,
    #[error("header line has an empty name")]
    EmptyHeaderName,
    #[error("invalid Content-Length value")]
    InvalidContentLength,
    #[error("line is not valid UTF-8")]
    InvalidEncoding,
    #[error("line exceeds the receive buffer")]
    LineTooLong,
    #[error("input does not fit the current state {0:?}")]
    UnexpectedInput(RequestState),
    #[error("out of memory while storing the body")]
    Alloc(#[from] TryReserveError),
}

/// Splits one header line into trimmed `(key, value)`.
pub fn parse_header_line(line: &str) -> Result<(&str, &str), ParseError> {
    let (key, value) = line.split_once(':').ok_or(ParseError::MissingColon)?;
    let key = trim_ws(key);
    if key.is_empty() {
        return Err(ParseError::EmptyHeaderName);
    }
    Ok((key, trim_ws(value)))
}

/// Parses a whole header block at once.
///
/// Lines are separated by `\n` or `\r\n`; parsing stops at the first empty
/// line. Produces the same table as feeding the lines one by one through
/// [`Request::update_line`].
pub fn parse_header_block(block: &str) -> Result<HeaderTable, ParseError> {
    let mut headers = HeaderTable::new();
    for line in block.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            break;
        }
        let (key, value) = parse_header_line(line)?;
        headers.insert_copy(key, value, Position::End);
    }
    Ok(headers)
}

fn trim_ws(s: &str) -> &str {
    s.trim_matches(|c| c == ' ' || c == '\t')
}

impl Request {
    /// Feeds one line (without its terminator) to the request.
    ///
    /// Valid in `ReceivingStartLine` and `ReceivingHeaders` only.
    pub fn update_line(&mut self, line: &str) -> Result<(), ParseError> {
        match self.state {
            RequestState::ReceivingStartLine => self.update_start_line(line),
            RequestState::ReceivingHeaders => self.update_headers(line),
            state => Err(ParseError::UnexpectedInput(state)),
        }
    }

    /// Feeds body bytes, taking at most what the request still expects.
    ///
    /// Returns how many bytes of `data` were consumed.
    pub fn update_body(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        if self.state != RequestState::ReceivingBody {
            return Err(ParseError::UnexpectedInput(self.state));
        }

        let take = data.len().min(self.expected_body_size - self.received_body_size);
        if take > 0 {
            self.body.append(bytes::Bytes::copy_from_slice(&data[..take]))?;
            self.received_body_size += take;
        }

        if self.received_body_size == self.expected_body_size {
            self.state = RequestState::Done;
        }
        Ok(take)
    }

    fn update_start_line(&mut self, line: &str) -> Result<(), ParseError> {
        let mut tokens = line.split(' ').filter(|t| !t.is_empty());

        let method = tokens.next().ok_or(ParseError::MissingToken)?;
        let target = tokens.next().ok_or(ParseError::MissingToken)?;
        let version = tokens.next().ok_or(ParseError::MissingToken)?;

        self.method = Method::from_str(method);
        self.url = Url::parse(target);
        self.version = Version::from_str(version);
        self.state = RequestState::ReceivingHeaders;
        Ok(())
    }

    fn update_headers(&mut self, line: &str) -> Result<(), ParseError> {
        if !line.is_empty() {
            let (key, value) = parse_header_line(line)?;
            self.headers.insert_copy(key, value, Position::End);
            return Ok(());
        }

        self.content_type = self.headers.find("Content-Type").and_then(ContentType::from_str);
        self.expected_body_size = match self.headers.find("Content-Length") {
            Some(v) => v.parse().map_err(|_| ParseError::InvalidContentLength)?,
            None => 0,
        };

        self.state = if self.content_type.is_some() && self.expected_body_size > 0 {
            RequestState::ReceivingBody
        } else {
            self.expected_body_size = 0;
            RequestState::Done
        };
        Ok(())
    }
}
