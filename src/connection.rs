//! TCP connection lifecycle: connect with bounded retry, idempotent close,
//! blocking reads and writes under a configured timeout.
//!
//! The connection exclusively owns its socket handle; the engine is fully
//! synchronous, so no locking is involved. Every transport-touching call
//! may block up to the configured timeout, which doubles as the only
//! cancellation mechanism.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default socket timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default bounded retry budget for partial writes.
pub const DEFAULT_WRITE_TRIALS: usize = 10;

/// Default transport read size.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Exclusively-owned TCP transport handle with lifecycle management.
pub struct Connection {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
    connected: bool,
    timeout: Duration,
    write_trials: usize,
    chunk_size: usize,
}

impl Connection {
    /// Create a connection in the disconnected state.
    ///
    /// No socket is opened until [`Connection::connect`].
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            stream: None,
            connected: false,
            timeout,
            write_trials: DEFAULT_WRITE_TRIALS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the bounded retry budget for partial writes.
    pub fn set_write_trials(&mut self, trials: usize) {
        self.write_trials = trials;
    }

    /// Override the transport read size.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size;
    }

    /// Check whether the socket is currently open.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Remote address as `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Open the socket, retrying up to `trials` times with `delay` applied
    /// before each attempt.
    ///
    /// Idempotent: a no-op with a log when already connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] once the retry budget is exhausted.
    pub fn connect(&mut self, trials: usize, delay: Duration) -> Result<()> {
        if self.connected {
            tracing::info!(address = %self.address(), "Already connected, skipping connect");
            return Ok(());
        }

        let mut last_err = None;
        for trial in 1..=trials.max(1) {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            tracing::info!(
                address = %self.address(),
                trial,
                "Attempting connection"
            );
            match self.try_connect() {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    self.stream = Some(stream);
                    self.connected = true;
                    tracing::info!("Socket connected");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(trial, error = %e, "Connection attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(Error::Connection(format!(
            "Could not connect to {} after {} trial(s): {}",
            self.address(),
            trials.max(1),
            last_err.map_or_else(|| "no attempt made".to_string(), |e| e.to_string())
        )))
    }

    /// One connection attempt against every resolved address.
    fn try_connect(&self) -> std::io::Result<TcpStream> {
        let addrs: Vec<_> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address resolved to nothing",
            )
        }))
    }

    /// Close the socket.
    ///
    /// Idempotent: the guard on the connected flag makes a second close a
    /// no-op, so teardown paths can call it unconditionally.
    pub fn close(&mut self) {
        if !self.connected && self.stream.is_none() {
            return;
        }
        tracing::info!("Closing socket connection");
        self.stream = None;
        self.connected = false;
    }

    /// Write all of `bytes` to the socket within the bounded retry budget.
    ///
    /// # Errors
    ///
    /// A write that accepts zero bytes, an I/O failure, or an exhausted
    /// retry budget is fatal: the connection is closed and an error is
    /// returned.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if self.stream.is_none() {
            return Err(Error::Connection("Cannot send: not connected".to_string()));
        }

        let num_bytes = bytes.len();
        let mut sent = 0;
        let mut trials = 0;
        while sent < num_bytes && trials < self.write_trials {
            let Some(stream) = self.stream.as_mut() else {
                break;
            };
            match stream.write(&bytes[sent..]) {
                Ok(0) => {
                    self.close();
                    return Err(Error::Connection(
                        "Socket accepted zero bytes, connection lost".to_string(),
                    ));
                }
                Ok(n) => sent += n,
                Err(e) => {
                    self.close();
                    return Err(Error::Io(e));
                }
            }
            trials += 1;
        }

        if sent < num_bytes {
            tracing::error!(sent, num_bytes, "Did not succeed to write message to socket");
            self.close();
            return Err(Error::Connection(format!(
                "Short write: {sent} of {num_bytes} bytes after {trials} trial(s)"
            )));
        }

        tracing::debug!(num_bytes, trials, "Sent bytes on socket");
        Ok(())
    }

    /// Perform exactly one blocking read, returning the received bytes.
    ///
    /// # Errors
    ///
    /// A zero-byte read means the peer closed the socket and is fatal; so
    /// is any I/O failure, including the read timeout firing.
    pub fn recv(&mut self) -> Result<Vec<u8>> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            Error::Connection("Cannot receive: not connected".to_string())
        })?;

        let mut buf = vec![0u8; self.chunk_size];
        let n = match stream.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                self.close();
                return Err(Error::Io(e));
            }
        };
        if n == 0 {
            self.close();
            return Err(Error::Connection(
                "Peer closed the connection".to_string(),
            ));
        }
        buf.truncate(n);
        Ok(buf)
    }
}
