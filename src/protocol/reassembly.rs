//! Message reassembly: the receive-side fragmentation state machine.
//!
//! A logical message is one Text or Binary frame followed by zero or more
//! Continuation frames, terminated by fin=1. Control frames may arrive
//! between fragments and must not disturb the open message.

use bytes::BytesMut;

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::utf8::Utf8Validator;
use crate::protocol::{Frame, OpCode};

/// A complete reassembled data message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteMessage {
    /// The opcode of the initial frame: Text or Binary.
    pub opcode: OpCode,
    /// Concatenated fragment payloads in arrival order.
    pub payload: Vec<u8>,
}

impl CompleteMessage {
    /// Interpret the payload as UTF-8 text.
    ///
    /// # Errors
    ///
    /// `Error::InvalidUtf8` when the payload is not valid UTF-8.
    pub fn into_text(self) -> Result<String> {
        String::from_utf8(self.payload).map_err(|_| Error::InvalidUtf8)
    }
}

/// Reassembles fragmented messages from a stream of data frames.
///
/// The state machine has two states: idle (`opcode` is `None`) and
/// reassembling (`opcode` holds the initial frame's opcode). Reassembly is
/// STRICT: a Text/Binary frame while a message is open, or a Continuation
/// while idle, is a protocol error rather than a silent reset.
#[derive(Debug)]
pub struct Reassembler {
    buffer: BytesMut,
    opcode: Option<OpCode>,
    fragments: usize,
    utf8: Option<Utf8Validator>,
    limits: Limits,
}

impl Reassembler {
    /// Create a reassembler enforcing the given limits.
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            opcode: None,
            fragments: 0,
            utf8: None,
            limits,
        }
    }

    /// Feed one data or continuation frame.
    ///
    /// Returns `Some` when the frame completes a message (fin=1), `None`
    /// while more fragments are expected. Control frames are ignored and
    /// never touch reassembly state.
    ///
    /// # Errors
    ///
    /// - `Error::UnexpectedContinuation`: Continuation while idle.
    /// - `Error::InterleavedDataFrame`: Text/Binary while reassembling.
    /// - `Error::MessageTooLarge` / `Error::TooManyFragments`: limits.
    /// - `Error::InvalidUtf8`: malformed text, detected incrementally.
    pub fn push(&mut self, frame: Frame) -> Result<Option<CompleteMessage>> {
        if frame.opcode.is_control() {
            return Ok(None);
        }

        match (frame.opcode, self.opcode) {
            (OpCode::Continuation, None) => return Err(Error::UnexpectedContinuation),
            (OpCode::Continuation, Some(_)) => {}
            (opcode, None) => {
                self.opcode = Some(opcode);
                if opcode == OpCode::Text {
                    self.utf8 = Some(Utf8Validator::new());
                }
            }
            (_, Some(_)) => return Err(Error::InterleavedDataFrame),
        }

        self.fragments += 1;
        self.limits.check_fragment_count(self.fragments)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        if let Some(validator) = self.utf8.as_mut() {
            validator.feed(frame.payload(), frame.fin)?;
        }

        self.buffer.extend_from_slice(frame.payload());

        if frame.fin {
            let payload = self.buffer.split().to_vec();
            let opcode = self.opcode.take().unwrap_or(OpCode::Binary);
            self.fragments = 0;
            self.utf8 = None;
            Ok(Some(CompleteMessage { opcode, payload }))
        } else {
            Ok(None)
        }
    }

    /// Whether a fragmented message is currently open.
    #[must_use]
    pub fn is_reassembling(&self) -> bool {
        self.opcode.is_some()
    }

    /// Number of bytes accumulated for the open message.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discard any partially reassembled message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.opcode = None;
        self.fragments = 0;
        self.utf8 = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassembler() -> Reassembler {
        Reassembler::new(Limits::default())
    }

    #[test]
    fn single_frame_message() {
        let mut r = reassembler();
        let msg = r.push(Frame::text(b"Hello".to_vec())).unwrap().unwrap();
        assert_eq!(msg.opcode, OpCode::Text);
        assert_eq!(msg.payload, b"Hello");
        assert!(!r.is_reassembling());
        assert_eq!(r.buffered(), 0);
    }

    #[test]
    fn two_fragments() {
        let mut r = reassembler();
        assert!(r
            .push(Frame::new(false, OpCode::Text, b"abc".to_vec()))
            .unwrap()
            .is_none());
        assert!(r.is_reassembling());

        let msg = r
            .push(Frame::new(true, OpCode::Continuation, b"def".to_vec()))
            .unwrap()
            .unwrap();
        assert_eq!(msg.opcode, OpCode::Text);
        assert_eq!(msg.payload, b"abcdef");
        assert!(!r.is_reassembling());
    }

    #[test]
    fn many_fragments_preserve_order() {
        let mut r = reassembler();
        assert!(r
            .push(Frame::new(false, OpCode::Binary, vec![1, 2]))
            .unwrap()
            .is_none());
        for chunk in [vec![3, 4], vec![5], vec![6, 7]] {
            assert!(r
                .push(Frame::new(false, OpCode::Continuation, chunk))
                .unwrap()
                .is_none());
        }
        let msg = r
            .push(Frame::new(true, OpCode::Continuation, vec![8]))
            .unwrap()
            .unwrap();
        assert_eq!(msg.opcode, OpCode::Binary);
        assert_eq!(msg.payload, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn control_frames_do_not_touch_state() {
        let mut r = reassembler();
        assert!(r
            .push(Frame::new(false, OpCode::Text, b"Hel".to_vec()))
            .unwrap()
            .is_none());
        let before = r.buffered();

        assert!(r.push(Frame::ping(b"keepalive".to_vec())).unwrap().is_none());
        assert!(r.push(Frame::pong(vec![])).unwrap().is_none());
        assert!(r.is_reassembling());
        assert_eq!(r.buffered(), before);

        let msg = r
            .push(Frame::new(true, OpCode::Continuation, b"lo".to_vec()))
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload, b"Hello");
    }

    #[test]
    fn continuation_while_idle_is_error() {
        let mut r = reassembler();
        assert!(matches!(
            r.push(Frame::new(true, OpCode::Continuation, b"x".to_vec())),
            Err(Error::UnexpectedContinuation)
        ));
    }

    #[test]
    fn data_frame_during_reassembly_is_error() {
        let mut r = reassembler();
        r.push(Frame::new(false, OpCode::Text, b"first".to_vec()))
            .unwrap();

        assert!(matches!(
            r.push(Frame::text(b"second".to_vec())),
            Err(Error::InterleavedDataFrame)
        ));
        assert!(matches!(
            r.push(Frame::new(false, OpCode::Binary, vec![0])),
            Err(Error::InterleavedDataFrame)
        ));
    }

    #[test]
    fn message_size_limit() {
        let mut r = Reassembler::new(Limits::new(1024, 100, 8, 1024));
        assert!(matches!(
            r.push(Frame::binary(vec![0u8; 101])),
            Err(Error::MessageTooLarge { size: 101, max: 100 })
        ));
    }

    #[test]
    fn fragment_count_limit() {
        let mut r = Reassembler::new(Limits::new(1024, 1024, 2, 1024));
        r.push(Frame::new(false, OpCode::Binary, vec![1])).unwrap();
        r.push(Frame::new(false, OpCode::Continuation, vec![2]))
            .unwrap();
        assert!(matches!(
            r.push(Frame::new(true, OpCode::Continuation, vec![3])),
            Err(Error::TooManyFragments { count: 3, max: 2 })
        ));
    }

    #[test]
    fn utf8_validated_across_fragments() {
        // 🎉 = F0 9F 8E 89 split in the middle.
        let mut r = reassembler();
        assert!(r
            .push(Frame::new(false, OpCode::Text, vec![0xf0, 0x9f]))
            .unwrap()
            .is_none());
        let msg = r
            .push(Frame::new(true, OpCode::Continuation, vec![0x8e, 0x89]))
            .unwrap()
            .unwrap();
        assert_eq!(msg.into_text().unwrap(), "🎉");
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut r = reassembler();
        assert!(matches!(
            r.push(Frame::new(true, OpCode::Text, vec![0x80, 0x81])),
            Err(Error::InvalidUtf8)
        ));
    }

    #[test]
    fn binary_skips_utf8_validation() {
        let mut r = reassembler();
        let msg = r
            .push(Frame::binary(vec![0x80, 0x81, 0xff]))
            .unwrap()
            .unwrap();
        assert_eq!(msg.payload, vec![0x80, 0x81, 0xff]);
    }

    #[test]
    fn reset_clears_open_message() {
        let mut r = reassembler();
        r.push(Frame::new(false, OpCode::Text, b"partial".to_vec()))
            .unwrap();
        assert!(r.is_reassembling());

        r.reset();
        assert!(!r.is_reassembling());
        assert_eq!(r.buffered(), 0);
        assert!(r.push(Frame::text(b"fresh".to_vec())).unwrap().is_some());
    }

    #[test]
    fn reusable_after_completion() {
        let mut r = reassembler();
        let first = r.push(Frame::text(b"one".to_vec())).unwrap().unwrap();
        assert_eq!(first.payload, b"one");
        let second = r.push(Frame::binary(b"two".to_vec())).unwrap().unwrap();
        assert_eq!(second.opcode, OpCode::Binary);
        assert_eq!(second.payload, b"two");
    }
}
