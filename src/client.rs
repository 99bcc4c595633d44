//! Client builder and synchronous session layer.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring the
//! connection; the [`Client`] implements the strict request/reply contract:
//! every command is queued, flushed in full, and answered by exactly one
//! read before the next command may be issued.
//!
//! # Example
//!
//! ```ignore
//! use verisocks_client::{Client, GetSelector, RunCallback, TimeUnit};
//!
//! let mut client = Client::builder("127.0.0.1", 5100).connect()?;
//! let reply = client.get(GetSelector::SimTime)?;
//! client.run(RunCallback::UntilTime { time: 101.3, unit: TimeUnit::Us })?;
//! client.finish()?;
//! ```

use std::time::Duration;

use serde_json::Value;

use crate::command::{Command, GetSelector, Reply, RunCallback};
use crate::connection::{Connection, DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT, DEFAULT_WRITE_TRIALS};
use crate::error::{Error, Result};
use crate::protocol::{encode_message, Assembler, Payload, Progress, TxQueue};

/// Default number of reassembly trials per reply.
pub const DEFAULT_READ_TRIALS: usize = 10;

/// Default number of connection attempts.
pub const DEFAULT_CONNECT_TRIALS: usize = 1;

/// Builder for configuring and creating a [`Client`].
pub struct ClientBuilder {
    host: String,
    port: u16,
    timeout: Duration,
    connect_trials: usize,
    connect_delay: Duration,
    read_trials: usize,
    write_trials: usize,
    chunk_size: usize,
}

impl ClientBuilder {
    /// Create a builder for the given kernel address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
            connect_trials: DEFAULT_CONNECT_TRIALS,
            connect_delay: Duration::ZERO,
            read_trials: DEFAULT_READ_TRIALS,
            write_trials: DEFAULT_WRITE_TRIALS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the socket timeout applied to connect, read and write.
    ///
    /// Long-running `run` commands block until the kernel answers, so this
    /// must cover the slowest expected simulation phase. Default: 120 s.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of connection attempts. Default: 1.
    pub fn connect_trials(mut self, trials: usize) -> Self {
        self.connect_trials = trials;
        self
    }

    /// Set the delay applied before each connection attempt. Default: none.
    ///
    /// Useful when the simulator process needs a moment to bring its
    /// server up after being spawned.
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Set the reassembly trial budget per reply. Default: 10.
    ///
    /// Each unmet trial performs exactly one more transport read; a reply
    /// still incomplete after the budget indicates a desynchronized
    /// stream, not a slow one (stalls are caught by the socket timeout).
    pub fn read_trials(mut self, trials: usize) -> Self {
        self.read_trials = trials;
        self
    }

    /// Set the bounded retry budget for partial writes. Default: 10.
    pub fn write_trials(mut self, trials: usize) -> Self {
        self.write_trials = trials;
        self
    }

    /// Set the transport read size. Default: 4096.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Build the client without opening the socket.
    pub fn build(self) -> Client {
        let mut conn = Connection::new(self.host, self.port, self.timeout);
        conn.set_write_trials(self.write_trials);
        conn.set_chunk_size(self.chunk_size);
        Client {
            conn,
            tx: TxQueue::new(),
            rx: Assembler::new(),
            pending: 0,
            connect_trials: self.connect_trials,
            connect_delay: self.connect_delay,
            read_trials: self.read_trials,
        }
    }

    /// Build the client and connect immediately.
    pub fn connect(self) -> Result<Client> {
        let mut client = self.build();
        client.connect()?;
        Ok(client)
    }
}

/// Synchronous client for the Verisocks simulation kernel.
///
/// Owns the transport exclusively and enforces one request in flight: a
/// command is sent, then the calling thread blocks until its reply has
/// been reassembled (or the timeout fires). Dropping the client closes
/// the socket unconditionally, so the handle can never leak.
pub struct Client {
    /// Transport handle and lifecycle state.
    conn: Connection,
    /// Outbound frame queue.
    tx: TxQueue,
    /// Inbound message assembler.
    rx: Assembler,
    /// Requests sent but not yet answered. Never negative; under the
    /// one-in-flight contract it is 0 or 1 between calls.
    pending: usize,
    connect_trials: usize,
    connect_delay: Duration,
    read_trials: usize,
}

impl Client {
    /// Create a client builder for the given kernel address.
    pub fn builder(host: impl Into<String>, port: u16) -> ClientBuilder {
        ClientBuilder::new(host, port)
    }

    /// Create a client with default configuration, not yet connected.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ClientBuilder::new(host, port).build()
    }

    /// Open the connection, applying the configured retry policy.
    ///
    /// Idempotent: a no-op with a log when already connected.
    pub fn connect(&mut self) -> Result<()> {
        self.conn.connect(self.connect_trials, self.connect_delay)
    }

    /// Close the connection. Idempotent.
    pub fn close(&mut self) {
        self.conn.close();
    }

    /// Check whether the transport is open.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Number of requests sent but not yet answered.
    pub fn pending_replies(&self) -> usize {
        self.pending
    }

    /// Drop unsent TX frames, buffered RX bytes and the pending-reply
    /// count.
    ///
    /// Recovery hook after a protocol error, when the stream position can
    /// no longer be trusted.
    pub fn reset_buffers(&mut self) {
        tracing::info!("Flushing RX and TX buffers");
        self.tx.clear();
        self.rx.clear();
        self.pending = 0;
    }

    /// Send one command and block for its reply.
    ///
    /// The command is encoded, queued, flushed in full, and answered by
    /// exactly one read. Replies pair with requests strictly in order.
    ///
    /// # Errors
    ///
    /// [`Error::Simulation`] when the kernel rejects the command (the
    /// connection stays usable); connection and protocol errors are
    /// terminal for the session.
    pub fn send(&mut self, command: &Command) -> Result<Reply> {
        tracing::debug!(command = command.name(), "Sending command");
        let message = encode_message(&Payload::Json(command.to_json()))?;
        self.tx.enqueue(&message);
        self.pending += self.tx.flush(&mut self.conn, true)?;

        let reply = self
            .read_reply()
            .and_then(Payload::into_json)
            .and_then(Reply::from_json);

        // finish/exit tear the transport down whatever the reply said.
        if command.closes_transport() {
            self.conn.close();
        }
        reply
    }

    /// Block until one complete message has been reassembled.
    ///
    /// Each trial that finds the buffered bytes insufficient performs
    /// exactly one more transport read; the budget bounds how many reads a
    /// single reply may take.
    fn read_reply(&mut self) -> Result<Payload> {
        if self.pending == 0 {
            return Err(Error::Protocol(
                "No reply expected, cancelling read".to_string(),
            ));
        }
        let mut trials = 0;
        loop {
            let progress = match self.rx.advance() {
                Ok(progress) => progress,
                Err(e) => {
                    self.rx.clear();
                    return Err(e);
                }
            };
            match progress {
                Progress::Complete(payload) => {
                    self.pending -= 1;
                    tracing::info!(
                        pending = self.pending,
                        "Read procedure successful"
                    );
                    return Ok(payload);
                }
                Progress::NeedMoreData => {
                    if trials >= self.read_trials {
                        self.rx.clear();
                        return Err(Error::Protocol(format!(
                            "Message still incomplete after {trials} read trial(s)"
                        )));
                    }
                    let chunk = self.conn.recv()?;
                    self.rx.extend(&chunk);
                    trials += 1;
                }
            }
        }
    }

    /// Read-only query against the simulation.
    pub fn get(&mut self, sel: GetSelector) -> Result<Reply> {
        self.send(&Command::Get(sel))
    }

    /// Write a named object's value (scalar, or an ordered sequence
    /// matching an array-like target's length).
    pub fn set(&mut self, path: impl Into<String>, value: impl Into<Value>) -> Result<Reply> {
        self.send(&Command::Set {
            path: path.into(),
            value: Some(value.into()),
        })
    }

    /// Fire an event-like (trigger) target, which takes no value.
    pub fn set_trigger(&mut self, path: impl Into<String>) -> Result<Reply> {
        self.send(&Command::Set {
            path: path.into(),
            value: None,
        })
    }

    /// Yield control to the kernel until the callback condition is met.
    pub fn run(&mut self, cb: RunCallback) -> Result<Reply> {
        self.send(&Command::Run(cb))
    }

    /// Send an out-of-band diagnostic message.
    pub fn info(&mut self, text: impl Into<String>) -> Result<Reply> {
        self.send(&Command::Info { text: text.into() })
    }

    /// Terminate the remote session and close the local transport.
    pub fn finish(&mut self) -> Result<Reply> {
        self.send(&Command::Finish)
    }

    /// Pause the remote session. The transport stays open, but the remote
    /// session must be externally restarted before further commands are
    /// processed.
    pub fn stop(&mut self) -> Result<Reply> {
        self.send(&Command::Stop)
    }

    /// Hand off and terminate the remote session, closing the local
    /// transport.
    pub fn exit(&mut self) -> Result<Reply> {
        self.send(&Command::Exit)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.conn.close();
    }
}
