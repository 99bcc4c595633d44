//! # verisocks-client
//!
//! Rust client for the Verisocks HDL simulator socket protocol.
//!
//! This crate lets test-automation code drive a remote, event-driven
//! hardware simulator over TCP: advance simulated time, read and write
//! named simulation objects, and synchronize on simulation-internal
//! conditions (time reached, value changed).
//!
//! ## Architecture
//!
//! - **Protocol**: pre-header + JSON header framing, incremental receive
//!   assembler, transmit queue
//! - **Connection**: blocking TCP with bounded connect retry, idempotent
//!   close, per-socket timeouts
//! - **Session**: strict one-request-in-flight command API with typed
//!   commands and classified errors
//!
//! ## Example
//!
//! ```ignore
//! use verisocks_client::{Client, GetSelector, RunCallback, TimeUnit};
//!
//! let mut client = Client::builder("127.0.0.1", 5100)
//!     .connect_trials(3)
//!     .connect()?;
//!
//! client.run(RunCallback::UntilTime { time: 101.3, unit: TimeUnit::Us })?;
//! let reply = client.get(GetSelector::SimTime)?;
//! println!("sim time: {:?}", reply.result().and_then(|r| r.time()));
//!
//! client.finish()?;
//! ```

pub mod command;
pub mod connection;
pub mod error;
pub mod protocol;

mod client;

pub use client::{Client, ClientBuilder, DEFAULT_CONNECT_TRIALS, DEFAULT_READ_TRIALS};
pub use command::{Command, GetSelector, Reply, ResultFields, RunCallback, TimeUnit};
pub use connection::Connection;
pub use error::{Error, Result};
