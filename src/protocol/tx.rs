//! Transmit queue for outbound frames.
//!
//! Encoded frames accumulate in a single `BytesMut` buffer while a side
//! list records each frame's byte length, so a flush can send either the
//! whole buffer or exactly the oldest frame without re-parsing anything.

use std::collections::VecDeque;

use bytes::BytesMut;

use crate::connection::Connection;
use crate::error::Result;

/// Buffer of encoded outbound frames with per-frame length bookkeeping.
pub struct TxQueue {
    /// Concatenated wire images of all queued frames.
    buffer: BytesMut,
    /// Byte length of each queued frame, oldest first.
    frame_lens: VecDeque<usize>,
}

impl TxQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            frame_lens: VecDeque::new(),
        }
    }

    /// Append one encoded frame to the queue.
    pub fn enqueue(&mut self, message: &[u8]) {
        self.buffer.extend_from_slice(message);
        self.frame_lens.push_back(message.len());
    }

    /// Write queued frames to the connection.
    ///
    /// With `all` set, the entire buffer is written; otherwise only the
    /// oldest frame. Returns the number of frames written so the session
    /// can bump its pending-reply count. A short write closes the
    /// connection and propagates as a connection error, in which case no
    /// frames are accounted as sent.
    pub fn flush(&mut self, conn: &mut Connection, all: bool) -> Result<usize> {
        if self.frame_lens.is_empty() {
            tracing::warn!("TX queue is empty, nothing to flush");
            return Ok(0);
        }

        let (num_bytes, num_frames) = if all {
            (self.buffer.len(), self.frame_lens.len())
        } else {
            (self.frame_lens[0], 1)
        };

        conn.send(&self.buffer[..num_bytes])?;

        let _ = self.buffer.split_to(num_bytes);
        self.frame_lens.drain(..num_frames);
        Ok(num_frames)
    }

    /// Number of queued frames.
    pub fn queued(&self) -> usize {
        self.frame_lens.len()
    }

    /// Total buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.frame_lens.is_empty()
    }

    /// Drop all queued frames without sending them.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.frame_lens.clear();
    }
}

impl Default for TxQueue {
    fn default() -> Self {
        Self::new()
    }
}
