//! Bounded per-connection read buffer that reassembles frames.
//!
//! Capacity is fixed at construction. The buffer only ever grows up to that
//! capacity; a frame that cannot fit is dropped instead of growing it.

use std::io;

use tracing::trace;

use crate::network::Connection;
use crate::protocol::{Wire, MIN_FRAME_CAPACITY};

/// Result of one [`FrameReader::read`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome<M> {
    /// One complete frame was decoded. More may already be buffered.
    Message(M),
    /// New bytes arrived but no full frame yet. The connection may hold more.
    Partial,
    /// The connection had nothing to offer and no full frame is buffered.
    Idle,
    /// The peer closed its end.
    Closed,
}

/// Per-connection frame reassembly buffer.
pub struct FrameReader {
    buffer: Vec<u8>,
    capacity: usize,
}

enum Fill {
    Full,
    Received,
    WouldBlock,
    Eof,
}

impl FrameReader {
    /// Create a reader holding at most `capacity` bytes.
    ///
    /// Capacities below [`MIN_FRAME_CAPACITY`] are raised to it.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_FRAME_CAPACITY);
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently buffered.
    #[inline(always)]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// One read from `conn`, then at most one decoded frame.
    pub fn read<M, C>(&mut self, conn: &mut C) -> io::Result<ReadOutcome<M>>
    where
        M: Wire,
        C: Connection + ?Sized,
    {
        let fill = self.fill(conn)?;

        // Frames that arrived before the peer closed are still delivered.
        if let Some(message) = self.extract::<M>() {
            return Ok(ReadOutcome::Message(message));
        }

        Ok(match fill {
            Fill::Eof => ReadOutcome::Closed,
            Fill::WouldBlock => ReadOutcome::Idle,
            Fill::Full | Fill::Received => ReadOutcome::Partial,
        })
    }

    /// Whether a `HEADING ... END` span is already buffered.
    pub fn holds_frame<M: Wire>(&self) -> bool {
        self.buffer
            .iter()
            .position(|&b| b == M::HEADING)
            .map_or(false, |start| self.buffer[start + 1..].contains(&M::END))
    }

    fn fill<C: Connection + ?Sized>(&mut self, conn: &mut C) -> io::Result<Fill> {
        let current = self.buffer.len();
        if current >= self.capacity {
            return Ok(Fill::Full);
        }

        self.buffer.resize(self.capacity, 0);
        let result = conn.receive(&mut self.buffer[current..]);
        let added = match &result {
            Ok(n) => *n,
            Err(_) => 0,
        };
        self.buffer.truncate(current + added);

        match result {
            Ok(0) => Ok(Fill::Eof),
            Ok(_) => Ok(Fill::Received),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Fill::WouldBlock),
            Err(e) => Err(e),
        }
    }

    /// Locate and decode the first complete frame in the buffer.
    fn extract<M: Wire>(&mut self) -> Option<M> {
        loop {
            let Some(start) = self.buffer.iter().position(|&b| b == M::HEADING) else {
                if !self.buffer.is_empty() {
                    trace!(bytes = self.buffer.len(), "discarding bytes without heading");
                }
                self.buffer.clear();
                return None;
            };

            let Some(end) = self.buffer[start + 1..]
                .iter()
                .position(|&b| b == M::END)
                .map(|pos| pos + start + 1)
            else {
                if start > 0 {
                    trace!(bytes = start, "discarding bytes before heading");
                    self.buffer.drain(..start);
                }
                if self.buffer.len() >= self.capacity {
                    trace!(bytes = self.buffer.len(), "dropping oversized frame");
                    self.buffer.clear();
                }
                return None;
            };

            match M::decode(&self.buffer[start..=end]) {
                Some((message, consumed)) => {
                    self.buffer.drain(..start + consumed);
                    return Some(message);
                }
                None => {
                    // Skip past this heading so the next scan cannot land on it again.
                    trace!(bytes = start + 1, "undecodable frame, skipping heading");
                    self.buffer.drain(..=start);
                }
            }
        }
    }
}
