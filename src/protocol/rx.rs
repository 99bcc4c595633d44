//! Receive assembler for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management and a state
//! machine for reconstructing exactly one frame from reads of arbitrary
//! size:
//! - `Init`: need the 2-byte pre-header
//! - `PreHeaderScanned`: pre-header consumed, need the JSON header
//! - `HeaderScanned`: header parsed, need `content-length` payload bytes
//!
//! Each transition fires only when enough bytes are buffered; otherwise the
//! assembler reports that it needs more data and the caller performs
//! another transport read. Bytes beyond the current message are never
//! discarded, so message boundaries are independent of network chunking.

use bytes::BytesMut;

use super::message::{decode_payload, Payload};
use super::wire::{decode_pre_header, Header, PRE_HEADER_SIZE};
use crate::error::Result;

/// State machine for message reassembly.
#[derive(Debug, Clone)]
enum RxState {
    /// Waiting for the 2-byte pre-header.
    Init,
    /// Pre-header consumed, waiting for `header_len` header bytes.
    PreHeaderScanned { header_len: usize },
    /// Header parsed, waiting for `content-length` payload bytes.
    HeaderScanned { header: Header },
}

/// Outcome of one [`Assembler::advance`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// A complete message was reconstructed; the assembler is reset and any
    /// surplus bytes are kept for the next message.
    Complete(Payload),
    /// Buffered bytes are insufficient for the next transition; perform one
    /// more transport read and call `advance` again.
    NeedMoreData,
}

/// Incremental reassembler for one in-flight inbound message.
///
/// The assembler is pure over its internal buffer: it never touches the
/// transport. The session read loop owns the trial budget and feeds bytes
/// in via [`Assembler::extend`].
pub struct Assembler {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: RxState,
}

impl Assembler {
    /// Create a new assembler with an empty buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            state: RxState::Init,
        }
    }

    /// Append raw bytes from a transport read.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Advance the state machine as far as the buffered bytes allow.
    ///
    /// # Errors
    ///
    /// Returns a protocol error on a malformed header or undecodable
    /// payload; the assembler must be [`Assembler::clear`]ed before reuse
    /// since the stream position is lost.
    pub fn advance(&mut self) -> Result<Progress> {
        loop {
            match &self.state {
                RxState::Init => {
                    if !self.scan_pre_header() {
                        return Ok(Progress::NeedMoreData);
                    }
                }
                RxState::PreHeaderScanned { .. } => {
                    if !self.scan_header()? {
                        return Ok(Progress::NeedMoreData);
                    }
                }
                RxState::HeaderScanned { .. } => {
                    return match self.scan_content()? {
                        Some(payload) => Ok(Progress::Complete(payload)),
                        None => Ok(Progress::NeedMoreData),
                    };
                }
            }
        }
    }

    /// Init -> PreHeaderScanned: consume 2 bytes, decode the header length.
    fn scan_pre_header(&mut self) -> bool {
        let Some(header_len) = decode_pre_header(&self.buffer) else {
            return false;
        };
        let _ = self.buffer.split_to(PRE_HEADER_SIZE);
        self.state = RxState::PreHeaderScanned { header_len };
        true
    }

    /// PreHeaderScanned -> HeaderScanned: consume and parse the JSON header.
    fn scan_header(&mut self) -> Result<bool> {
        let RxState::PreHeaderScanned { header_len } = self.state else {
            unreachable!("scan_header called outside PreHeaderScanned");
        };
        if self.buffer.len() < header_len {
            return Ok(false);
        }
        let header_bytes = self.buffer.split_to(header_len);
        let header = Header::decode(&header_bytes)?;
        tracing::debug!(
            content_type = %header.content_type,
            content_length = header.content_length,
            "Received message header"
        );
        self.state = RxState::HeaderScanned { header };
        Ok(true)
    }

    /// HeaderScanned -> Done: consume the payload and decode it, then reset
    /// to Init for the next message.
    fn scan_content(&mut self) -> Result<Option<Payload>> {
        let RxState::HeaderScanned { header } = &self.state else {
            unreachable!("scan_content called outside HeaderScanned");
        };
        let content_len = header.content_length;
        if self.buffer.len() < content_len {
            return Ok(None);
        }
        let data = self.buffer.split_to(content_len).freeze();
        let payload = decode_payload(header, data)?;
        self.state = RxState::Init;
        Ok(Some(payload))
    }

    /// Number of buffered bytes not yet consumed.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop all buffered bytes and reset to the initial state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = RxState::Init;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            RxState::Init => "Init",
            RxState::PreHeaderScanned { .. } => "PreHeaderScanned",
            RxState::HeaderScanned { .. } => "HeaderScanned",
        }
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}
