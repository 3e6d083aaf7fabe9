use std::io::{self, Read};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::time::SystemTime;

use tracing::debug;

use crate::http::content_type::ContentType;
use crate::http::handler::{ConnectionInfo, Handler};
use crate::http::parser::ParseError;
use crate::http::request::{Request, RequestState};
use crate::http::response::{Response, ResponseDefaults, StatusCode};
use crate::http::writer::{WriteQueue, serialize_response};

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Parse(#[from] ParseError),
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("handler failed: {0:#}")]
    Handler(anyhow::Error),
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// What the event loop should do with a connection after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Everything owed to the peer has been sent; close now.
    Close,
}

/// Fixed-capacity receive buffer. `level` bytes at the front are valid.
#[derive(Debug)]
pub struct ReceiveBuffer {
    buf: Box<[u8]>,
    level: usize,
}

impl ReceiveBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            level: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn is_full(&self) -> bool {
        self.level == self.buf.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.buf[..self.level]
    }

    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.level..]
    }

    /// Marks `n` more bytes as valid after a read into [`Self::spare_mut`].
    pub fn filled(&mut self, n: usize) {
        self.level = (self.level + n).min(self.buf.len());
    }

    /// Drops the first `n` valid bytes.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.level);
        self.buf.copy_within(n..self.level, 0);
        self.level -= n;
    }

    /// Copies raw bytes in, returning how many fit.
    pub fn extend(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.buf.len() - self.level);
        self.buf[self.level..self.level + n].copy_from_slice(&data[..n]);
        self.level += n;
        n
    }

    /// Takes one `\n` or `\r\n` terminated line, without the terminator.
    pub fn take_line(&mut self) -> Result<Option<String>, ParseError> {
        let Some(pos) = self.data().iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };

        let raw = &self.buf[..pos];
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = std::str::from_utf8(raw)
            .map_err(|_| ParseError::InvalidEncoding)?
            .to_owned();

        self.consume(pos + 1);
        Ok(Some(line))
    }

    pub fn clear(&mut self) {
        self.level = 0;
    }
}

/// One accepted client: its socket, receive buffer, in-progress request
/// and pending writes.
pub struct Connection {
    info: ConnectionInfo,
    stream: TcpStream,
    recv: ReceiveBuffer,
    request: Request,
    queue: WriteQueue,
    close_after_flush: bool,
    read_closed: bool,
}

impl Connection {
    /// Wraps an accepted stream. The stream is expected to be non-blocking.
    pub fn new(id: u64, stream: TcpStream, peer: SocketAddr, receive_buffer: usize) -> Self {
        Self {
            info: ConnectionInfo {
                id,
                peer,
                created_at: SystemTime::now(),
            },
            stream,
            recv: ReceiveBuffer::with_capacity(receive_buffer),
            request: Request::new(),
            queue: WriteQueue::new(),
            close_after_flush: false,
            read_closed: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.info.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.info.peer
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// True while responses are queued but not yet on the wire.
    pub fn wants_write(&self) -> bool {
        !self.queue.is_empty()
    }

    /// False once the peer has shut down its sending side.
    pub fn wants_read(&self) -> bool {
        !self.read_closed
    }

    /// Reads everything available and advances the request parser.
    ///
    /// Completed requests go to `handler`; their responses are queued and
    /// flushed as far as the socket allows. A peer that half-closes after
    /// its request still receives the queued responses.
    pub fn on_readable(
        &mut self,
        handler: &dyn Handler,
        defaults: &ResponseDefaults,
    ) -> Result<Flow, ConnectionError> {
        loop {
            match self.stream.read(self.recv.spare_mut()) {
                Ok(0) if self.wants_write() => {
                    self.read_closed = true;
                    self.close_after_flush = true;
                    break;
                }
                Ok(0) => return Err(ConnectionError::PeerClosed),
                // Input after a close decision is discarded.
                Ok(_) if self.close_after_flush => continue,
                Ok(n) => {
                    self.recv.filled(n);
                    self.process(handler, defaults)?;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if self.wants_write() {
            return self.on_writable();
        }
        Ok(self.idle_flow())
    }

    /// Drains queued writes until the socket would block.
    pub fn on_writable(&mut self) -> Result<Flow, ConnectionError> {
        self.queue.flush(&mut self.stream)?;
        Ok(self.idle_flow())
    }

    fn idle_flow(&self) -> Flow {
        if self.close_after_flush && self.queue.is_empty() {
            Flow::Close
        } else {
            Flow::Continue
        }
    }

    /// Feeds buffered bytes to the parser: lines until the body starts, raw
    /// bytes after.
    pub(crate) fn process(
        &mut self,
        handler: &dyn Handler,
        defaults: &ResponseDefaults,
    ) -> Result<(), ConnectionError> {
        loop {
            match self.request.state() {
                RequestState::Done => {
                    self.complete_request(handler, defaults)?;
                    if self.close_after_flush {
                        self.recv.clear();
                        return Ok(());
                    }
                }
                RequestState::ReceivingBody => {
                    if self.recv.level() == 0 {
                        return Ok(());
                    }
                    let used = self.request.update_body(self.recv.data())?;
                    self.recv.consume(used);
                }
                RequestState::ReceivingStartLine | RequestState::ReceivingHeaders => {
                    match self.recv.take_line()? {
                        Some(line) => self.request.update_line(&line)?,
                        None if self.recv.is_full() => return Err(ParseError::LineTooLong.into()),
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    fn complete_request(
        &mut self,
        handler: &dyn Handler,
        defaults: &ResponseDefaults,
    ) -> Result<(), ConnectionError> {
        let request = mem::take(&mut self.request);
        let mut response = Response::new(StatusCode::Ok);

        if request.is_valid() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                handler.handle(&self.info, &request, &mut response)
            }));
            match outcome {
                Ok(result) => result.map_err(ConnectionError::Handler)?,
                Err(payload) => {
                    return Err(ConnectionError::Handler(anyhow::anyhow!(
                        "handler panicked: {}",
                        panic_message(payload.as_ref())
                    )));
                }
            }
            self.close_after_flush = !request.keep_alive();
        } else {
            response
                .set_status(StatusCode::BadRequest)
                .write_text(ContentType::TextPlain, "400 Bad Request");
            self.close_after_flush = true;
        }

        debug!(
            connection = self.info.id,
            method = ?request.method(),
            path = %request.path(),
            status = response.status.as_u16(),
            "Request handled"
        );

        for op in serialize_response(response, defaults, request.version()) {
            self.queue.enqueue(op);
        }
        Ok(())
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}
