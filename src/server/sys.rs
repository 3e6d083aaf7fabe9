//! Thin wrappers over poll(2).

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

pub use libc::pollfd as PollFd;

pub const READABLE: i16 = libc::POLLIN;
pub const WRITABLE: i16 = libc::POLLOUT;
pub const ERROR: i16 = libc::POLLERR | libc::POLLNVAL;
pub const HANGUP: i16 = libc::POLLHUP;

pub fn poll_fd(fd: RawFd, events: i16) -> PollFd {
    PollFd {
        fd,
        events,
        revents: 0,
    }
}

/// Waits up to `timeout` for events on `fds`. Returns the number of
/// descriptors with events; an interrupted wait counts as zero.
pub fn poll(fds: &mut [PollFd], timeout: Duration) -> io::Result<usize> {
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
    // SAFETY: `fds` is a valid, exclusively borrowed slice of pollfd for the
    // duration of the call and its length is passed alongside.
    let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        return match err.kind() {
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => Ok(0),
            _ => Err(err),
        };
    }
    Ok(rc as usize)
}

/// Waits up to `timeout` for `fd` to become readable.
pub fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut fds = [poll_fd(fd, READABLE)];
    Ok(poll(&mut fds, timeout)? > 0 && fds[0].revents & (READABLE | ERROR | HANGUP) != 0)
}
