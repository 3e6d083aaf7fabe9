//! Socket pools.
//!
//! A pool owns a bounded set of connections and one worker thread that
//! multiplexes them with poll(2). The pool mutex guards membership only: it
//! is taken to snapshot the descriptors, to check ready connections out, and
//! to put them back or remove them. Reads, parsing, handlers and writes run
//! with the mutex released, on connections no other thread can reach.
//!
//! A connection is closed by dropping it while the mutex is held and its
//! slot is removed, so the descriptor cannot be reused by the OS while any
//! pool structure still refers to it.

use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::http::connection::{Connection, ConnectionError, Flow};
use crate::http::handler::Handler;
use crate::http::response::ResponseDefaults;
use crate::server::membership::{MemberKey, Membership};
use crate::server::sys::{self, PollFd};

/// Why a connection left its pool.
#[derive(Debug)]
enum CloseReason {
    Finished,
    SocketError,
    Hangup,
    Failed(ConnectionError),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Finished => f.write_str("response complete"),
            CloseReason::SocketError => f.write_str("socket error"),
            CloseReason::Hangup => f.write_str("peer hung up"),
            CloseReason::Failed(e) => write!(f, "{e}"),
        }
    }
}

struct PoolShared {
    index: usize,
    members: Mutex<Membership<Connection>>,
    shutdown: AtomicBool,
    handler: Arc<dyn Handler>,
    defaults: Arc<ResponseDefaults>,
    poll_timeout: Duration,
}

pub struct SocketPool {
    shared: Arc<PoolShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SocketPool {
    pub fn new(
        index: usize,
        capacity: usize,
        handler: Arc<dyn Handler>,
        defaults: Arc<ResponseDefaults>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                index,
                members: Mutex::new(Membership::with_capacity(capacity)),
                shutdown: AtomicBool::new(false),
                handler,
                defaults,
                poll_timeout,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn index(&self) -> usize {
        self.shared.index
    }

    /// Spawns the worker thread. Calling it again is a no-op.
    pub fn start(&self) -> std::io::Result<()> {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("strand-pool-{}", self.shared.index))
            .spawn(move || shared.run())?;
        *worker = Some(handle);
        Ok(())
    }

    /// Adds a connection. A full pool hands it back.
    pub fn register(&self, conn: Connection) -> Result<MemberKey, Connection> {
        let id = conn.id();
        lock(&self.shared.members).register(id, conn)
    }

    /// Removes and closes a connection. Stale keys are ignored.
    pub fn unregister(&self, key: MemberKey) -> bool {
        lock(&self.shared.members).unregister(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.shared.members).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs a single event-loop iteration on the calling thread.
    pub fn poll_once(&self) -> std::io::Result<()> {
        self.shared.poll_once()
    }

    /// Stops the worker, waits for it and closes every remaining connection.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(handle) = lock(&self.worker).take() {
            if handle.join().is_err() {
                warn!(pool = self.shared.index, "Socket pool worker panicked");
            }
        }
        self.shared.close_all();
    }
}

impl Drop for SocketPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PoolShared {
    fn run(&self) {
        info!(pool = self.index, "Socket pool started");

        while !self.shutdown.load(Ordering::Acquire) {
            if let Err(e) = self.poll_once() {
                warn!(pool = self.index, error = %e, "poll failed");
                thread::sleep(self.poll_timeout);
            }
        }

        self.close_all();
        info!(pool = self.index, "Socket pool stopped");
    }

    fn poll_once(&self) -> std::io::Result<()> {
        let (mut fds, keys) = self.snapshot();

        if sys::poll(&mut fds, self.poll_timeout)? == 0 {
            return Ok(());
        }

        let ready = {
            let mut members = lock(&self.members);
            fds.iter()
                .zip(&keys)
                .filter(|(fd, _)| fd.revents != 0)
                .filter_map(|(fd, key)| members.checkout(*key).map(|c| (*key, fd.revents, c)))
                .collect::<Vec<_>>()
        };

        let outcomes = ready
            .into_iter()
            .map(|(key, revents, mut conn)| {
                let outcome = self.dispatch(&mut conn, revents);
                (key, conn, outcome)
            })
            .collect::<Vec<_>>();

        let mut members = lock(&self.members);
        for (key, conn, outcome) in outcomes {
            match outcome {
                None => {
                    members.checkin(key, conn);
                }
                Some(reason) => {
                    let (id, peer) = (conn.id(), conn.peer());
                    members.unregister(key);
                    drop(conn);
                    match reason {
                        CloseReason::Failed(ConnectionError::Parse(_))
                        | CloseReason::Failed(ConnectionError::Handler(_)) => warn!(
                            pool = self.index,
                            connection = id,
                            %peer,
                            reason = %reason,
                            "Connection closed"
                        ),
                        _ => debug!(
                            pool = self.index,
                            connection = id,
                            %peer,
                            reason = %reason,
                            "Connection closed"
                        ),
                    }
                }
            }
        }
        Ok(())
    }

    /// Builds the poll array from the current membership.
    fn snapshot(&self) -> (Vec<PollFd>, Vec<MemberKey>) {
        let members = lock(&self.members);
        let mut fds = Vec::with_capacity(members.len());
        let mut keys = Vec::with_capacity(members.len());

        for (key, conn) in members.parked() {
            let mut events = 0;
            if conn.wants_read() {
                events |= sys::READABLE;
            }
            if conn.wants_write() {
                events |= sys::WRITABLE;
            }
            fds.push(sys::poll_fd(conn.as_raw_fd(), events));
            keys.push(key);
        }
        (fds, keys)
    }

    /// Handles the events reported for one connection. `Some` means close.
    fn dispatch(&self, conn: &mut Connection, revents: i16) -> Option<CloseReason> {
        if revents & sys::ERROR != 0 {
            return Some(CloseReason::SocketError);
        }

        if revents & sys::READABLE != 0 {
            match conn.on_readable(self.handler.as_ref(), &self.defaults) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) => return Some(CloseReason::Finished),
                Err(ConnectionError::PeerClosed) => return Some(CloseReason::Hangup),
                Err(e) => return Some(CloseReason::Failed(e)),
            }
        } else if revents & sys::HANGUP != 0 {
            return Some(CloseReason::Hangup);
        }

        if revents & sys::WRITABLE != 0 && conn.wants_write() {
            match conn.on_writable() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Close) => return Some(CloseReason::Finished),
                Err(e) => return Some(CloseReason::Failed(e)),
            }
        }
        None
    }

    fn close_all(&self) {
        let closed = lock(&self.members).clear();
        if closed > 0 {
            debug!(pool = self.index, closed, "Closed remaining connections");
        }
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
