//! Protocol module - wire format, framing, reassembly and transmit queue.
//!
//! This module implements the Verisocks TCP message format:
//! - 2-byte Big Endian pre-header carrying the header length
//! - JSON header declaring content type, encoding and payload length
//! - payload interpreted per content type

mod message;
mod rx;
mod tx;
mod wire;

pub use message::{decode_payload, encode_message, Payload};
pub use rx::{Assembler, Progress};
pub use tx::TxQueue;
pub use wire::{
    decode_pre_header, encode_pre_header, ContentType, Header, ENCODING_UTF8, MAX_HEADER_SIZE,
    MIME_BINARY, MIME_JSON, MIME_TEXT, PRE_HEADER_SIZE,
};
