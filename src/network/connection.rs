//! Socket Connection
//!
//! The byte stream underneath a client: TCP or a unix domain socket.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::time::Duration;

use crate::config::{Address, Config};
use crate::error::Result;

/// A connected byte stream
#[derive(Debug)]
pub enum Connection {
    Tcp(TcpStream),

    #[cfg(unix)]
    Unix(UnixStream),
}

impl Connection {
    /// Connect to the configured address
    ///
    /// Applies TCP_NODELAY and the write timeout from `config`.
    pub fn connect(config: &Config) -> Result<Self> {
        let conn = match &config.address {
            Address::Tcp(hostport) => {
                let stream = TcpStream::connect(hostport.as_str())?;
                // Disable Nagle's algorithm for low latency
                stream.set_nodelay(config.nodelay)?;
                Connection::Tcp(stream)
            }
            #[cfg(unix)]
            Address::Unix(path) => Connection::Unix(UnixStream::connect(path)?),
            #[cfg(not(unix))]
            Address::Unix(path) => {
                return Err(crate::error::GibsonError::Config(format!(
                    "Unix sockets are not supported on this platform: {}",
                    path.display()
                )))
            }
        };

        conn.set_write_timeout(config.write_timeout_ms)?;
        Ok(conn)
    }

    /// Another handle to the same socket
    pub fn try_clone(&self) -> Result<Self> {
        let conn = match self {
            Connection::Tcp(s) => Connection::Tcp(s.try_clone()?),
            #[cfg(unix)]
            Connection::Unix(s) => Connection::Unix(s.try_clone()?),
        };
        Ok(conn)
    }

    /// Configure the write timeout (0 = block forever)
    pub fn set_write_timeout(&self, ms: u64) -> Result<()> {
        let timeout = (ms > 0).then(|| Duration::from_millis(ms));
        match self {
            Connection::Tcp(s) => s.set_write_timeout(timeout)?,
            #[cfg(unix)]
            Connection::Unix(s) => s.set_write_timeout(timeout)?,
        }
        Ok(())
    }

    /// Shut down both directions, waking up any blocked reader
    pub fn shutdown(&self) -> io::Result<()> {
        let result = match self {
            Connection::Tcp(s) => s.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Connection::Unix(s) => s.shutdown(Shutdown::Both),
        };

        match result {
            // Already shut down by the other side or an earlier call
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    /// Peer address string for logging
    pub fn peer_addr(&self) -> String {
        match self {
            Connection::Tcp(s) => s
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            #[cfg(unix)]
            Connection::Unix(s) => s
                .peer_addr()
                .ok()
                .and_then(|a| a.as_pathname().map(|p| p.display().to_string()))
                .unwrap_or_else(|| "unix socket".to_string()),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Connection::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Connection::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Connection::Unix(s) => s.flush(),
        }
    }
}
