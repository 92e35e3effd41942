//! Send-side fragmentation of outgoing messages.

use crate::protocol::{Frame, OpCode};

/// Iterator splitting a message payload into wire frames.
///
/// The first frame carries the message opcode, every later frame is a
/// Continuation, and only the last has fin=1. A payload that fits in one
/// chunk yields a single final frame; an empty payload still yields one.
pub struct Fragmenter<'a> {
    payload: &'a [u8],
    opcode: OpCode,
    chunk_size: usize,
    offset: usize,
    started: bool,
}

impl<'a> Fragmenter<'a> {
    /// Split `payload` into chunks of at most `chunk_size` bytes.
    #[must_use]
    pub fn new(payload: &'a [u8], opcode: OpCode, chunk_size: usize) -> Self {
        Self {
            payload,
            opcode,
            chunk_size: chunk_size.max(1),
            offset: 0,
            started: false,
        }
    }

    /// Bytes not yet emitted.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.offset
    }
}

impl Iterator for Fragmenter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.payload.len() {
            if !self.started {
                self.started = true;
                return Some(Frame::new(true, self.opcode, Vec::new()));
            }
            return None;
        }

        let take = self.remaining().min(self.chunk_size);
        let chunk = self.payload[self.offset..self.offset + take].to_vec();
        self.offset += take;

        let opcode = if self.started {
            OpCode::Continuation
        } else {
            self.started = true;
            self.opcode
        };
        Some(Frame::new(self.offset == self.payload.len(), opcode, chunk))
    }
}
