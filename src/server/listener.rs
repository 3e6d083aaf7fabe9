use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::http::handler::Handler;
use crate::http::response::ResponseDefaults;
use crate::server::acceptor::Acceptor;
use crate::server::pool::{SocketPool, lock};

/// Cloneable handle that asks a running server to stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The listening socket, its socket pools and the acceptor.
pub struct Server {
    local_addr: SocketAddr,
    pools: Arc<[Arc<SocketPool>]>,
    acceptor: Arc<Acceptor>,
    acceptor_thread: Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    stopped: AtomicBool,
}

impl Server {
    /// Binds the listening socket and builds the pools. Nothing runs until
    /// [`Server::start`] or [`Server::serve`].
    pub fn bind(cfg: &Config, handler: Arc<dyn Handler>) -> Result<Self> {
        let listener = TcpListener::bind(&cfg.server.listen_addr)
            .with_context(|| format!("failed to bind {}", cfg.server.listen_addr))?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        let defaults = Arc::new(ResponseDefaults::new(&cfg.server.server_name));
        let pools: Arc<[Arc<SocketPool>]> = (0..cfg.server.pools.max(1))
            .map(|index| {
                Arc::new(SocketPool::new(
                    index,
                    cfg.server.max_connections,
                    Arc::clone(&handler),
                    Arc::clone(&defaults),
                    cfg.server.poll_timeout(),
                ))
            })
            .collect();

        let shutdown = Arc::new(AtomicBool::new(false));
        let acceptor = Acceptor::new(
            listener,
            Arc::clone(&pools),
            Arc::clone(&shutdown),
            cfg.server.receive_buffer,
            cfg.server.poll_timeout(),
        )
        .context("failed to configure listener")?;

        Ok(Self {
            local_addr,
            pools,
            acceptor: Arc::new(acceptor),
            acceptor_thread: Mutex::new(None),
            shutdown,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Connections currently held across all pools.
    pub fn connection_count(&self) -> usize {
        self.pools.iter().map(|p| p.len()).sum()
    }

    /// Starts the pool workers and runs the acceptor on its own thread.
    pub fn start(&self) -> Result<()> {
        let mut slot = lock(&self.acceptor_thread);
        if slot.is_some() {
            anyhow::bail!("acceptor already running");
        }

        self.start_pools()?;
        let acceptor = Arc::clone(&self.acceptor);
        let handle = thread::Builder::new()
            .name("strand-acceptor".to_string())
            .spawn(move || acceptor.run())
            .context("failed to spawn acceptor thread")?;
        *slot = Some(handle);
        Ok(())
    }

    /// Starts the pool workers and runs the acceptor on the calling thread
    /// until a [`ShutdownHandle`] fires. Pools are stopped before returning.
    pub fn serve(&self) -> Result<()> {
        self.start_pools()?;
        self.acceptor.run();
        self.shutdown();
        Ok(())
    }

    fn start_pools(&self) -> Result<()> {
        for pool in self.pools.iter() {
            pool.start()
                .with_context(|| format!("failed to start socket pool {}", pool.index()))?;
        }
        Ok(())
    }

    /// Stops accepting, joins the acceptor, then stops every pool and
    /// closes its connections. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.store(true, Ordering::Release);

        if let Some(handle) = lock(&self.acceptor_thread).take() {
            if handle.join().is_err() {
                warn!("Acceptor thread panicked");
            }
        }
        for pool in self.pools.iter() {
            pool.shutdown();
        }
        info!("Server stopped");
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}
