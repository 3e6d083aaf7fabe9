use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::http::connection::Connection;
use crate::server::pool::{SocketPool, lock};
use crate::server::sys;

/// Accepts clients and spreads them over the socket pools round-robin.
///
/// The listener is non-blocking; between accepts the acceptor waits on it
/// with a bounded timeout so the shutdown flag is checked regularly.
pub struct Acceptor {
    listener: TcpListener,
    pools: Arc<[Arc<SocketPool>]>,
    next_pool: Mutex<usize>,
    next_id: AtomicU64,
    shutdown: Arc<AtomicBool>,
    receive_buffer: usize,
    poll_timeout: Duration,
}

impl Acceptor {
    pub fn new(
        listener: TcpListener,
        pools: Arc<[Arc<SocketPool>]>,
        shutdown: Arc<AtomicBool>,
        receive_buffer: usize,
        poll_timeout: Duration,
    ) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            pools,
            next_pool: Mutex::new(0),
            next_id: AtomicU64::new(1),
            shutdown,
            receive_buffer,
            poll_timeout,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts until the shutdown flag is raised.
    pub fn run(&self) {
        info!(addr = ?self.listener.local_addr().ok(), "Acceptor started");

        while !self.shutdown.load(Ordering::Acquire) {
            match sys::wait_readable(self.listener.as_raw_fd(), self.poll_timeout) {
                Ok(true) => self.accept_pending(),
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "Waiting on listener failed");
                    std::thread::sleep(self.poll_timeout);
                }
            }
        }

        info!("Acceptor stopped");
    }

    fn accept_pending(&self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.register(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Descriptor exhaustion and the like; retried on the next wakeup.
                    warn!(error = %e, "Accept failed");
                    break;
                }
            }
        }
    }

    fn register(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(%peer, error = %e, "Could not make socket non-blocking");
            return;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let conn = Connection::new(id, stream, peer, self.receive_buffer);
        let pool = self.select_pool();

        match pool.register(conn) {
            Ok(_) => {
                info!(%peer, connection = id, pool = pool.index(), "Accepted connection");
            }
            Err(conn) => {
                warn!(%peer, pool = pool.index(), "Pool full, dropping connection");
                drop(conn);
            }
        }
    }

    fn select_pool(&self) -> &Arc<SocketPool> {
        let mut next = lock(&self.next_pool);
        let index = *next;
        *next = (index + 1) % self.pools.len();
        debug!(pool = index, "Selected pool");
        &self.pools[index]
    }
}
