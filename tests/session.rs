//! Integration tests for the synchronous session layer.
//!
//! A scripted mock kernel runs on a loopback TCP listener thread. It
//! reassembles commands with the crate's own protocol stack, keeps a
//! simulation-time register, and answers one reply per command in order,
//! exactly like the real simulator-side server.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::{json, Value};
use verisocks_client::protocol::{encode_message, Assembler, Payload, Progress};
use verisocks_client::{Client, Error, GetSelector, RunCallback, TimeUnit};

/// Install the test subscriber so client/kernel traces land in the
/// captured test output. The library itself never installs one.
fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Spawn a mock kernel; returns its port and the serving thread.
fn spawn_kernel() -> (u16, JoinHandle<()>) {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        serve(stream, WriteMode::Whole);
    });
    (port, handle)
}

/// Spawn a mock kernel that writes every reply in `chunk`-byte slices with
/// `delay` between them, exercising reassembly across arbitrary chunking.
fn spawn_dribbling_kernel(chunk: usize, delay: Duration) -> (u16, JoinHandle<()>) {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        serve(stream, WriteMode::Dribble { chunk, delay });
    });
    (port, handle)
}

enum WriteMode {
    Whole,
    Dribble { chunk: usize, delay: Duration },
}

fn serve(mut stream: TcpStream, mode: WriteMode) {
    let mut asm = Assembler::new();
    let mut buf = [0u8; 4096];
    let mut sim_time = 0.0f64;

    loop {
        let command = loop {
            match asm.advance().unwrap() {
                Progress::Complete(Payload::Json(value)) => break value,
                Progress::Complete(other) => panic!("non-JSON command: {other:?}"),
                Progress::NeedMoreData => {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        return;
                    }
                    asm.extend(&buf[..n]);
                }
            }
        };

        let (reply, closing) = handle_command(&command, &mut sim_time);
        let wire = encode_message(&Payload::Json(reply)).unwrap();
        match &mode {
            WriteMode::Whole => stream.write_all(&wire).unwrap(),
            WriteMode::Dribble { chunk, delay } => {
                for piece in wire.chunks((*chunk).max(1)) {
                    // The client may give up mid-reply (budget tests).
                    if stream.write_all(piece).is_err() || stream.flush().is_err() {
                        return;
                    }
                    thread::sleep(*delay);
                }
            }
        }
        if closing {
            return;
        }
    }
}

fn time_unit_factor(unit: &str) -> f64 {
    match unit {
        "s" => 1.0,
        "ms" => 1e-3,
        "us" => 1e-6,
        "ns" => 1e-9,
        "ps" => 1e-12,
        "fs" => 1e-15,
        other => panic!("unknown time unit {other}"),
    }
}

fn ack() -> Value {
    json!({"type": "ack"})
}

fn error_reply(message: &str) -> Value {
    json!({"type": "error", "value": message})
}

fn handle_command(command: &Value, sim_time: &mut f64) -> (Value, bool) {
    match command["command"].as_str().unwrap() {
        "get" => match command["sel"].as_str().unwrap() {
            "sim_info" => (
                json!({
                    "type": "result",
                    "product": "Mock Simulator",
                    "version": "0.1",
                }),
                false,
            ),
            "sim_time" => (json!({"type": "result", "time": *sim_time}), false),
            "value" => match command["path"].as_str().unwrap() {
                "tb.dut.count" => (json!({"type": "result", "value": 7}), false),
                path => (error_reply(&format!("unknown object {path}")), false),
            },
            "type" => (json!({"type": "result", "vpi_type": 36}), false),
            sel => (error_reply(&format!("unknown selector {sel}")), false),
        },
        "set" => (ack(), false),
        "run" => match command["cb"].as_str().unwrap() {
            "until_time" => {
                let factor = time_unit_factor(command["time_unit"].as_str().unwrap());
                let target = command["time"].as_f64().unwrap() * factor;
                if target <= *sim_time {
                    (error_reply("target time lies in the past"), false)
                } else {
                    *sim_time = target;
                    (ack(), false)
                }
            }
            "for_time" => {
                let factor = time_unit_factor(command["time_unit"].as_str().unwrap());
                *sim_time += command["time"].as_f64().unwrap() * factor;
                (ack(), false)
            }
            "until_change" | "to_next" => (ack(), false),
            cb => (error_reply(&format!("unknown callback {cb}")), false),
        },
        "info" => (ack(), false),
        "stop" => (ack(), false),
        "finish" | "exit" => (ack(), true),
        name => (error_reply(&format!("unknown command {name}")), false),
    }
}

fn connect(port: u16) -> Client {
    Client::builder("127.0.0.1", port)
        .timeout(Duration::from_secs(10))
        .connect()
        .unwrap()
}

#[test]
fn test_get_sim_info() {
    let (port, kernel) = spawn_kernel();
    let mut client = connect(port);

    let reply = client.get(GetSelector::SimInfo).unwrap();
    let fields = reply.result().unwrap();
    assert_eq!(fields.product(), Some("Mock Simulator"));
    assert_eq!(fields.version(), Some("0.1"));

    client.finish().unwrap();
    kernel.join().unwrap();
}

#[test]
fn test_sim_time_starts_at_zero() {
    let (port, kernel) = spawn_kernel();
    let mut client = connect(port);

    let reply = client.get(GetSelector::SimTime).unwrap();
    assert_eq!(reply.result().unwrap().time(), Some(0.0));

    client.finish().unwrap();
    kernel.join().unwrap();
}

#[test]
fn test_run_until_time_advances_sim_time() {
    let (port, kernel) = spawn_kernel();
    let mut client = connect(port);

    client
        .run(RunCallback::UntilTime {
            time: 101.3,
            unit: TimeUnit::Us,
        })
        .unwrap();

    let reply = client.get(GetSelector::SimTime).unwrap();
    let time = reply.result().unwrap().time().unwrap();
    assert!((time - 101.3e-6).abs() < 1e-18, "sim time was {time}");

    client.finish().unwrap();
    kernel.join().unwrap();
}

#[test]
fn test_run_until_past_time_is_simulation_error() {
    let (port, kernel) = spawn_kernel();
    let mut client = connect(port);

    client
        .run(RunCallback::UntilTime {
            time: 50.0,
            unit: TimeUnit::Us,
        })
        .unwrap();

    let err = client
        .run(RunCallback::UntilTime {
            time: 10.0,
            unit: TimeUnit::Us,
        })
        .unwrap_err();
    assert!(err.is_simulation());

    // The connection survives an application error.
    let reply = client.get(GetSelector::SimTime).unwrap();
    assert!(reply.result().unwrap().time().is_some());
    assert!(client.is_connected());

    client.finish().unwrap();
    kernel.join().unwrap();
}

#[test]
fn test_get_unknown_object_is_simulation_error() {
    let (port, kernel) = spawn_kernel();
    let mut client = connect(port);

    let err = client
        .get(GetSelector::Value {
            path: "tb.no.such.signal".to_string(),
        })
        .unwrap_err();
    assert!(err.is_simulation());
    assert!(err.to_string().contains("tb.no.such.signal"));

    client.finish().unwrap();
    kernel.join().unwrap();
}

#[test]
fn test_get_set_and_triggers() {
    let (port, kernel) = spawn_kernel();
    let mut client = connect(port);

    let reply = client
        .get(GetSelector::Value {
            path: "tb.dut.count".to_string(),
        })
        .unwrap();
    assert_eq!(reply.result().unwrap().value(), Some(&json!(7)));

    let reply = client
        .get(GetSelector::Type {
            path: "tb.dut.count".to_string(),
        })
        .unwrap();
    assert_eq!(reply.result().unwrap().vpi_type(), Some(&json!(36)));

    client.set("tb.dut.enable", 1).unwrap();
    client.set("tb.dut.mem", json!([1, 2, 3])).unwrap();
    client.set_trigger("tb.dut.start_event").unwrap();
    client
        .run(RunCallback::UntilChange {
            path: "tb.dut.done".to_string(),
            value: Some(json!(1)),
        })
        .unwrap();
    client.run(RunCallback::ToNext).unwrap();
    client.info("checkpoint reached").unwrap();

    client.finish().unwrap();
    kernel.join().unwrap();
}

#[test]
fn test_finish_closes_transport_and_close_is_idempotent() {
    let (port, kernel) = spawn_kernel();
    let mut client = connect(port);

    client.finish().unwrap();
    assert!(!client.is_connected());

    // close() after finish, twice, must not fail.
    client.close();
    client.close();
    kernel.join().unwrap();
}

#[test]
fn test_stop_keeps_transport_open() {
    let (port, kernel) = spawn_kernel();
    let mut client = connect(port);

    client.stop().unwrap();
    assert!(client.is_connected());

    client.finish().unwrap();
    assert!(!client.is_connected());
    kernel.join().unwrap();
}

#[test]
fn test_connect_is_idempotent() {
    let (port, kernel) = spawn_kernel();
    let mut client = connect(port);

    // Second connect on a live client is a logged no-op.
    client.connect().unwrap();
    assert!(client.is_connected());

    client.finish().unwrap();
    kernel.join().unwrap();
}

#[test]
fn test_connect_retries_until_server_appears() {
    init_logging();
    // Reserve a port, then start listening on it only after a delay.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let kernel = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
        let (stream, _) = listener.accept().unwrap();
        serve(stream, WriteMode::Whole);
    });

    let mut client = Client::builder("127.0.0.1", port)
        .timeout(Duration::from_secs(10))
        .connect_trials(20)
        .connect_delay(Duration::from_millis(50))
        .connect()
        .unwrap();

    client.finish().unwrap();
    kernel.join().unwrap();
}

#[test]
fn test_reply_dribbled_byte_by_byte() {
    let (port, kernel) = spawn_dribbling_kernel(1, Duration::from_millis(2));
    let mut client = Client::builder("127.0.0.1", port)
        .timeout(Duration::from_secs(10))
        .read_trials(500)
        .connect()
        .unwrap();

    let reply = client.get(GetSelector::SimTime).unwrap();
    assert_eq!(reply.result().unwrap().time(), Some(0.0));

    client.finish().unwrap();
    kernel.join().unwrap();
}

#[test]
fn test_read_trial_budget_exhaustion_is_protocol_error() {
    // The reply keeps arriving one byte at a time, so the stream is alive
    // but the budget of two reads can never complete a frame.
    let (port, kernel) = spawn_dribbling_kernel(1, Duration::from_millis(80));
    let mut client = Client::builder("127.0.0.1", port)
        .timeout(Duration::from_secs(10))
        .read_trials(2)
        .connect()
        .unwrap();

    let err = client.get(GetSelector::SimTime).unwrap_err();
    assert!(matches!(err, Error::Protocol(_)), "got {err}");
    assert!(err.to_string().contains("incomplete"));

    client.close();
    drop(kernel); // serving thread ends once it notices the closed socket
}

#[test]
fn test_pending_replies_balance_out() {
    let (port, kernel) = spawn_kernel();
    let mut client = connect(port);
    assert_eq!(client.pending_replies(), 0);

    for _ in 0..5 {
        client.get(GetSelector::SimTime).unwrap();
        assert_eq!(client.pending_replies(), 0);
    }

    client.finish().unwrap();
    assert_eq!(client.pending_replies(), 0);
    kernel.join().unwrap();
}
