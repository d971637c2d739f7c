//! Configuration for the Gibson client
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{GibsonError, Result};
use crate::reassembly::DEFAULT_MAX_DATA_LENGTH;

/// Port the Gibson server listens on when none is given
pub const DEFAULT_PORT: u16 = 10128;

/// Socket path the Gibson server uses by default
pub const DEFAULT_SOCKET: &str = "/var/run/gibson.sock";

/// Main configuration for a client connection
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Where the server lives (TCP host:port or unix socket path)
    pub address: Address,

    /// Disable Nagle's algorithm (TCP only)
    pub nodelay: bool,

    /// Size of each read from the socket (bytes)
    pub read_buffer_size: usize,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Pipeline Configuration
    // -------------------------------------------------------------------------
    /// Max requests in flight before submit fails (None = unbounded)
    pub max_pipeline_depth: Option<usize>,

    /// Max accepted reply payload size (bytes)
    pub max_data_length: u32,

    /// How long a blocking caller waits for its reply (milliseconds, 0 = forever)
    ///
    /// Expiry only abandons the wait. The request stays queued until its
    /// reply arrives.
    pub reply_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: Address::Unix(PathBuf::from(DEFAULT_SOCKET)),
            nodelay: true,
            read_buffer_size: 8 * 1024,
            write_timeout_ms: 0,
            max_pipeline_depth: Some(1024),
            max_data_length: DEFAULT_MAX_DATA_LENGTH,
            reply_timeout_ms: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server address
    pub fn address(mut self, address: Address) -> Self {
        self.config.address = address;
        self
    }

    /// Parse and set the server address from a connection string
    ///
    /// Accepts `tcp://host:port`, `host:port` and `unix:///path`.
    pub fn connection_string(mut self, s: &str) -> Result<Self> {
        self.config.address = s.parse()?;
        Ok(self)
    }

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the socket read chunk size (in bytes)
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size.max(1);
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the maximum pipeline depth (None for unbounded)
    pub fn max_pipeline_depth(mut self, depth: Option<usize>) -> Self {
        self.config.max_pipeline_depth = depth;
        self
    }

    /// Set the maximum reply payload size (in bytes)
    pub fn max_data_length(mut self, size: u32) -> Self {
        self.config.max_data_length = size;
        self
    }

    /// Set the reply timeout for blocking calls (in milliseconds)
    pub fn reply_timeout_ms(mut self, ms: u64) -> Self {
        self.config.reply_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Server address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// TCP endpoint as `host:port`
    Tcp(String),

    /// Local stream socket path
    Unix(PathBuf),
}

impl FromStr for Address {
    type Err = GibsonError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(GibsonError::Config(format!("Missing socket path in '{}'", s)));
            }
            return Ok(Address::Unix(PathBuf::from(path)));
        }

        let hostport = match s.split_once("://") {
            Some(("tcp", rest)) => rest,
            Some((scheme, _)) => {
                return Err(GibsonError::Config(format!("Unsupported scheme '{}'", scheme)))
            }
            None => s,
        };
        let hostport = hostport.trim_end_matches('/');

        if hostport.is_empty() {
            return Err(GibsonError::Config(format!("Missing host in '{}'", s)));
        }

        match hostport.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                port.parse::<u16>().map_err(|_| {
                    GibsonError::Config(format!("Invalid port '{}' in '{}'", port, s))
                })?;
                Ok(Address::Tcp(hostport.to_string()))
            }
            Some(_) => Err(GibsonError::Config(format!("Missing host in '{}'", s))),
            None => Ok(Address::Tcp(format!("{}:{}", hostport, DEFAULT_PORT))),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp(hostport) => write!(f, "tcp://{}", hostport),
            Address::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}
