//! Outbound write queue.
//!
//! Responses are turned into [`WriteOp`]s and queued per connection. The
//! event loop drains the queue one step at a time whenever the socket is
//! writable; a step never blocks.

use crate::http::request::Version;
use crate::http::response::{Body, Response, ResponseDefaults};
use crate::http::header::{HeaderTable, Position};
use bytes::Bytes;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Write};
use std::net::TcpStream;

/// Upper bound on a single file transfer call.
const FILE_CHUNK: usize = 256 * 1024;

/// Destination of queued writes.
pub trait Sink {
    /// One non-blocking write.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// One file-to-sink transfer of at most `count` bytes starting at
    /// `*offset`. Advances `*offset` by the amount sent.
    fn send_file(&mut self, file: &File, offset: &mut u64, count: usize) -> io::Result<usize>;
}

impl Sink for TcpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(self, buf)
    }

    #[cfg(target_os = "linux")]
    fn send_file(&mut self, file: &File, offset: &mut u64, count: usize) -> io::Result<usize> {
        use std::os::fd::AsRawFd;

        let mut off = *offset as libc::off_t;
        // SAFETY: both descriptors are open for the duration of the call and
        // `off` is a valid, exclusively borrowed offset.
        let n = unsafe { libc::sendfile(self.as_raw_fd(), file.as_raw_fd(), &mut off, count) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        *offset = off as u64;
        Ok(n as usize)
    }

    #[cfg(not(target_os = "linux"))]
    fn send_file(&mut self, file: &File, offset: &mut u64, count: usize) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;

        let mut buf = vec![0u8; count.min(64 * 1024)];
        let read = file.read_at(&mut buf, *offset)?;
        if read == 0 {
            return Ok(0);
        }
        let n = Write::write(self, &buf[..read])?;
        *offset += n as u64;
        Ok(n)
    }
}

/// One queued unit of outbound data.
#[derive(Debug)]
pub enum WriteOp {
    Bytes {
        buf: Bytes,
        written: usize,
    },
    File {
        file: File,
        offset: u64,
        written: u64,
        total: u64,
    },
}

impl WriteOp {
    pub fn bytes(buf: impl Into<Bytes>) -> Self {
        WriteOp::Bytes {
            buf: buf.into(),
            written: 0,
        }
    }

    /// `total` bytes of `file`, starting at its beginning.
    pub fn file(file: File, total: u64) -> Self {
        WriteOp::File {
            file,
            offset: 0,
            written: 0,
            total,
        }
    }

    pub fn total(&self) -> u64 {
        match self {
            WriteOp::Bytes { buf, .. } => buf.len() as u64,
            WriteOp::File { total, .. } => *total,
        }
    }

    pub fn written(&self) -> u64 {
        match self {
            WriteOp::Bytes { written, .. } => *written as u64,
            WriteOp::File { written, .. } => *written,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.written() == self.total()
    }

    fn step(&mut self, sink: &mut dyn Sink) -> io::Result<usize> {
        match self {
            WriteOp::Bytes { buf, written } => {
                let n = sink.write(&buf[*written..])?;
                if n == 0 {
                    return Err(io::ErrorKind::WriteZero.into());
                }
                *written += n;
                Ok(n)
            }
            WriteOp::File {
                file,
                offset,
                written,
                total,
            } => {
                let count = ((*total - *written) as usize).min(FILE_CHUNK);
                let n = sink.send_file(file, offset, count)?;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "file ended before its advertised length",
                    ));
                }
                *written += n as u64;
                Ok(n)
            }
        }
    }
}

/// Result of a single drain step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStatus {
    /// Nothing queued.
    Empty,
    /// The sink would block; try again on the next writable event.
    Pending,
    /// Bytes went out but the current operation is not finished.
    Progressed,
    /// The current operation finished and was released.
    Complete,
}

/// FIFO queue of write operations. Only the front operation is ever
/// partially written.
#[derive(Debug, Default)]
pub struct WriteQueue {
    ops: VecDeque<WriteOp>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, op: WriteOp) {
        // Zero-length operations would never make progress on the wire.
        if op.total() > 0 {
            self.ops.push_back(op);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Bytes still to be written across all queued operations.
    pub fn remaining(&self) -> u64 {
        self.ops.iter().map(|op| op.total() - op.written()).sum()
    }

    /// Advances the front operation by one write call.
    pub fn drain_step(&mut self, sink: &mut dyn Sink) -> io::Result<DrainStatus> {
        let Some(op) = self.ops.front_mut() else {
            return Ok(DrainStatus::Empty);
        };

        match op.step(sink) {
            Ok(_) if op.is_complete() => {
                self.ops.pop_front();
                Ok(DrainStatus::Complete)
            }
            Ok(_) => Ok(DrainStatus::Progressed),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(DrainStatus::Pending),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(DrainStatus::Progressed),
            Err(e) => Err(e),
        }
    }

    /// Drains until the sink would block or the queue is empty.
    ///
    /// Returns `true` once nothing is left.
    pub fn flush(&mut self, sink: &mut dyn Sink) -> io::Result<bool> {
        loop {
            match self.drain_step(sink)? {
                DrainStatus::Empty => return Ok(true),
                DrainStatus::Pending => return Ok(false),
                DrainStatus::Progressed | DrainStatus::Complete => {}
            }
        }
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

/// Turns a response into write operations: the head (plus any in-memory
/// body) as one buffer, then the file region if the body is a file.
pub fn serialize_response(
    response: Response,
    defaults: &ResponseDefaults,
    version: Version,
) -> Vec<WriteOp> {
    let (status, extra, content_type, accept_ranges, body) = response.into_parts();

    let version = match version {
        Version::Http10 => "HTTP/1.0",
        _ => "HTTP/1.1",
    };

    let mut head = Vec::with_capacity(256);
    head.extend_from_slice(
        format!("{} {} {}\r\n", version, status.as_u16(), status.reason_phrase()).as_bytes(),
    );

    let mut headers = HeaderTable::new();
    defaults.apply(&mut headers);
    if let Some(ct) = content_type {
        headers.append("Content-Type", ct);
    }
    headers.append("Content-Length", body.len().to_string());
    if accept_ranges {
        headers.append("Accept-Ranges", "bytes");
    }
    // Handler headers replace generated ones of the same name. The length
    // is always the generated one.
    let is_length = |key: &str| key.eq_ignore_ascii_case("Content-Length");
    for (key, _) in extra.iter().filter(|(key, _)| !is_length(*key)) {
        headers.remove(key);
    }
    for (key, value) in extra.iter().filter(|(key, _)| !is_length(*key)) {
        headers.insert_copy(key, value, Position::End);
    }
    headers.write_to(&mut head);
    head.extend_from_slice(b"\r\n");

    let mut ops = Vec::with_capacity(2);
    match body {
        Body::Bytes(bytes) => {
            head.extend_from_slice(&bytes);
            ops.push(WriteOp::bytes(head));
        }
        Body::File { file, len } => {
            ops.push(WriteOp::bytes(head));
            ops.push(WriteOp::file(file, len));
        }
        Body::Empty | Body::Omitted { .. } => ops.push(WriteOp::bytes(head)),
    }
    ops
}
