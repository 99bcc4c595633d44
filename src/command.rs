//! Closed command and reply model.
//!
//! Every request the client can issue is one variant of [`Command`], with
//! required fields checked at compile time; [`Command::to_json`] produces
//! the flat `{"command": ..., ...args}` object the kernel expects. Kernel
//! replies are discriminated by their `type` field into [`Reply::Ack`],
//! [`Reply::Result`] or a [`Simulation`](crate::Error::Simulation) error.

use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// Time unit accepted by the `run` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    /// Seconds.
    S,
    /// Milliseconds.
    Ms,
    /// Microseconds.
    Us,
    /// Nanoseconds.
    Ns,
    /// Picoseconds.
    Ps,
    /// Femtoseconds.
    Fs,
}

impl TimeUnit {
    /// Wire representation, as the kernel spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::S => "s",
            TimeUnit::Ms => "ms",
            TimeUnit::Us => "us",
            TimeUnit::Ns => "ns",
            TimeUnit::Ps => "ps",
            TimeUnit::Fs => "fs",
        }
    }
}

/// Selector for the read-only `get` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetSelector {
    /// Simulator identity (product and version strings).
    SimInfo,
    /// Current simulation time in seconds.
    SimTime,
    /// Value of a named object.
    Value {
        /// Hierarchical path of the object.
        path: String,
    },
    /// VPI type of a named object.
    Type {
        /// Hierarchical path of the object.
        path: String,
    },
}

/// Stopping criterion for the `run` command.
#[derive(Debug, Clone, PartialEq)]
pub enum RunCallback {
    /// Run for a relative duration.
    ForTime {
        /// Duration value.
        time: f64,
        /// Unit of `time`.
        unit: TimeUnit,
    },
    /// Run until an absolute simulation time is reached.
    ///
    /// The kernel rejects targets that already lie in the past.
    UntilTime {
        /// Absolute target time.
        time: f64,
        /// Unit of `time`.
        unit: TimeUnit,
    },
    /// Run until a named object changes, optionally to a required value.
    UntilChange {
        /// Hierarchical path of the object to watch.
        path: String,
        /// Required value, if the change must hit a specific target.
        value: Option<Value>,
    },
    /// Run until the next discrete simulation step begins.
    ToNext,
}

/// One request to the simulation kernel.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Read-only query.
    Get(GetSelector),
    /// Write a named object's value. `value` is `None` only for event-like
    /// (trigger) targets.
    Set {
        /// Hierarchical path of the target.
        path: String,
        /// Scalar, or an ordered sequence for array-like targets.
        value: Option<Value>,
    },
    /// Yield control to the kernel until the callback condition is met.
    Run(RunCallback),
    /// Out-of-band diagnostic, always acknowledged.
    Info {
        /// Message forwarded to the simulator log.
        text: String,
    },
    /// Terminate the remote session.
    Finish,
    /// Pause the remote session, leaving the transport open.
    Stop,
    /// Hand off and terminate the remote session.
    Exit,
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get(_) => "get",
            Command::Set { .. } => "set",
            Command::Run(_) => "run",
            Command::Info { .. } => "info",
            Command::Finish => "finish",
            Command::Stop => "stop",
            Command::Exit => "exit",
        }
    }

    /// Whether the local transport must be closed once the reply to this
    /// command has been processed.
    pub fn closes_transport(&self) -> bool {
        matches!(self, Command::Finish | Command::Exit)
    }

    /// Build the flat JSON object carried as the frame payload.
    pub fn to_json(&self) -> Value {
        let mut obj = match self {
            Command::Get(sel) => match sel {
                GetSelector::SimInfo => json!({"sel": "sim_info"}),
                GetSelector::SimTime => json!({"sel": "sim_time"}),
                GetSelector::Value { path } => json!({"sel": "value", "path": path}),
                GetSelector::Type { path } => json!({"sel": "type", "path": path}),
            },
            Command::Set { path, value } => match value {
                Some(value) => json!({"path": path, "value": value}),
                None => json!({"path": path}),
            },
            Command::Run(cb) => match cb {
                RunCallback::ForTime { time, unit } => {
                    json!({"cb": "for_time", "time": time, "time_unit": unit.as_str()})
                }
                RunCallback::UntilTime { time, unit } => {
                    json!({"cb": "until_time", "time": time, "time_unit": unit.as_str()})
                }
                RunCallback::UntilChange { path, value } => match value {
                    Some(value) => {
                        json!({"cb": "until_change", "path": path, "value": value})
                    }
                    None => json!({"cb": "until_change", "path": path}),
                },
                RunCallback::ToNext => json!({"cb": "to_next"}),
            },
            Command::Info { text } => json!({"value": text}),
            Command::Finish | Command::Stop | Command::Exit => json!({}),
        };
        obj.as_object_mut()
            .expect("json! object literal")
            .insert("command".to_string(), Value::String(self.name().to_string()));
        obj
    }
}

/// Named fields of a `result` reply.
///
/// The field set depends on the selector that produced the reply, so the
/// raw object is kept and exposed through typed accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultFields(Map<String, Value>);

impl ResultFields {
    /// Raw access to a reply field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Simulator product name (from `get sim_info`).
    pub fn product(&self) -> Option<&str> {
        self.field("product").and_then(Value::as_str)
    }

    /// Simulator version string (from `get sim_info`).
    pub fn version(&self) -> Option<&str> {
        self.field("version").and_then(Value::as_str)
    }

    /// Simulation time in seconds (from `get sim_time`).
    pub fn time(&self) -> Option<f64> {
        self.field("time").and_then(Value::as_f64)
    }

    /// Object value (from `get value`).
    pub fn value(&self) -> Option<&Value> {
        self.field("value")
    }

    /// Object VPI type (from `get type`).
    pub fn vpi_type(&self) -> Option<&Value> {
        self.field("vpi_type")
    }
}

/// Decoded kernel reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Plain acknowledgement.
    Ack,
    /// Result carrying selector-specific fields.
    Result(ResultFields),
}

impl Reply {
    /// Classify a decoded JSON reply by its `type` discriminator.
    ///
    /// # Errors
    ///
    /// `type == "error"` becomes [`Error::Simulation`] carrying the
    /// kernel's message; a missing or unknown discriminator is a protocol
    /// error.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(Error::Protocol(format!(
                "Reply is not a JSON object: {value}"
            )));
        };
        let reply_type = fields
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Protocol("Reply is missing the 'type' field".to_string()))?;
        match reply_type {
            "ack" => Ok(Reply::Ack),
            "result" => Ok(Reply::Result(ResultFields(fields))),
            "error" => {
                let message = fields
                    .get("value")
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified simulator error")
                    .to_string();
                Err(Error::Simulation(message))
            }
            other => Err(Error::Protocol(format!(
                "Unknown reply type '{other}'"
            ))),
        }
    }

    /// Result fields, if this is a `result` reply.
    pub fn result(&self) -> Option<&ResultFields> {
        match self {
            Reply::Result(fields) => Some(fields),
            Reply::Ack => None,
        }
    }
}
