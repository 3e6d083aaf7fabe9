//! Server configuration
//!
//! Loaded from a YAML file named by `STRAND_CONFIG`, with the listen address
//! overridable through `LISTEN`. Every field has a default, so an empty
//! document (or no file at all) yields a working configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the YAML configuration file
pub const CONFIG_ENV: &str = "STRAND_CONFIG";

/// Environment variable overriding `server.listen_addr`
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    /// Maximum tracing level (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Number of socket pools, each served by one worker thread
    pub pools: usize,
    /// Connection capacity of a single pool
    pub max_connections: usize,
    /// Per-connection receive buffer capacity in bytes
    pub receive_buffer: usize,
    /// Bound on every multiplexer wait, so shutdown is observed promptly
    pub poll_timeout_ms: u64,
    /// Product token advertised in the `Server` header
    pub server_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// First path segment under which files are served
    pub mount: String,
    pub root: PathBuf,
    /// Page sent with every 404 response, when present
    pub not_found_page: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            static_files: StaticFilesConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            pools: 4,
            max_connections: 1024,
            receive_buffer: 1024,
            poll_timeout_ms: 50,
            server_name: concat!("Strand/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            mount: "static".to_string(),
            root: PathBuf::from("./public"),
            not_found_page: None,
        }
    }
}

impl Config {
    /// Loads the configuration from the environment.
    ///
    /// Reads the file named by `STRAND_CONFIG` if set, otherwise starts from
    /// defaults. `LISTEN` overrides the listen address in both cases.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Ok(addr) = std::env::var(LISTEN_ENV) {
            cfg.server.listen_addr = addr;
        }

        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.server.pools == 0 {
            anyhow::bail!("server.pools must be at least 1");
        }
        if self.server.max_connections == 0 {
            anyhow::bail!("server.max_connections must be at least 1");
        }
        // A request line has to fit in the buffer in one piece.
        if self.server.receive_buffer < 64 {
            anyhow::bail!("server.receive_buffer must be at least 64 bytes");
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
