//! Incremental UTF-8 validation for fragmented text messages.
//!
//! A multi-byte scalar may be split across a fragment boundary, so the
//! validator keeps the incomplete tail of each non-final fragment and
//! prepends it to the next one. Only the final fragment requires every
//! sequence to be complete.

use crate::error::{Error, Result};

/// Incremental UTF-8 validator.
#[derive(Debug, Clone, Default)]
pub struct Utf8Validator {
    /// Unfinished multi-byte sequence carried from the previous fragment.
    pending: [u8; 4],
    pending_len: usize,
}

impl Utf8Validator {
    /// Create a fresh validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment of a text message.
    ///
    /// With `is_final = false`, an incomplete sequence at the end of the
    /// fragment is held back for the next call. With `is_final = true`,
    /// every sequence must be complete.
    ///
    /// # Errors
    ///
    /// `Error::InvalidUtf8` on any malformed sequence.
    pub fn feed(&mut self, data: &[u8], is_final: bool) -> Result<()> {
        let buffered;
        let bytes: &[u8] = if self.pending_len > 0 {
            let mut combined = Vec::with_capacity(self.pending_len + data.len());
            combined.extend_from_slice(&self.pending[..self.pending_len]);
            combined.extend_from_slice(data);
            buffered = combined;
            &buffered
        } else {
            data
        };
        self.pending_len = 0;

        match std::str::from_utf8(bytes) {
            Ok(_) => Ok(()),
            Err(e) => {
                // error_len() is None only when the input ends inside a
                // sequence that could still become valid.
                if !is_final && e.error_len().is_none() {
                    let tail = &bytes[e.valid_up_to()..];
                    if tail.len() <= 4 {
                        self.pending[..tail.len()].copy_from_slice(tail);
                        self.pending_len = tail.len();
                        return Ok(());
                    }
                }
                Err(Error::InvalidUtf8)
            }
        }
    }

    /// Drop any held-back bytes, e.g. after a failed message.
    pub fn reset(&mut self) {
        self.pending_len = 0;
    }

    /// Whether an incomplete sequence is currently held back.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending_len > 0
    }
}

/// Validate a complete buffer as UTF-8.
///
/// # Errors
///
/// `Error::InvalidUtf8` when `data` is not valid UTF-8.
pub fn validate_utf8(data: &[u8]) -> Result<()> {
    std::str::from_utf8(data).map(|_| ()).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_fragments() {
        let mut v = Utf8Validator::new();
        assert!(v.feed(b"plain ascii", true).is_ok());

        let mut v = Utf8Validator::new();
        assert!(v.feed("日本語テキスト".as_bytes(), true).is_ok());
    }

    #[test]
    fn malformed_sequences() {
        // Lone continuation byte.
        assert!(Utf8Validator::new().feed(&[0x80], true).is_err());
        // Overlong encoding of NUL.
        assert!(Utf8Validator::new().feed(&[0xc0, 0x80], true).is_err());
        // Byte that can never start a sequence.
        assert!(Utf8Validator::new().feed(&[0xff], true).is_err());
        // Bad continuation inside a 3-byte sequence.
        assert!(Utf8Validator::new().feed(&[0xe0, 0x80], true).is_err());
    }

    #[test]
    fn split_scalar_across_fragments() {
        // Euro sign E2 82 AC split after the first byte.
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[0xe2], false).is_ok());
        assert!(v.has_pending());
        assert!(v.feed(&[0x82, 0xac], true).is_ok());
        assert!(!v.has_pending());
    }

    #[test]
    fn split_four_byte_scalar() {
        // 🎉 = F0 9F 8E 89 split byte by byte.
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[0xf0], false).is_ok());
        assert!(v.feed(&[0x9f], false).is_ok());
        assert!(v.feed(&[0x8e], false).is_ok());
        assert!(v.feed(&[0x89], true).is_ok());
    }

    #[test]
    fn truncated_scalar_on_final_fragment() {
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[0xe2], false).is_ok());
        assert!(v.feed(&[0x82], true).is_err());
    }

    #[test]
    fn empty_fragments() {
        let mut v = Utf8Validator::new();
        assert!(v.feed(b"", false).is_ok());
        assert!(v.feed(b"", true).is_ok());
    }

    #[test]
    fn reset_discards_pending() {
        let mut v = Utf8Validator::new();
        assert!(v.feed(&[0xe2], false).is_ok());
        v.reset();
        assert!(!v.has_pending());
        assert!(v.feed(b"fresh", true).is_ok());
    }

    #[test]
    fn whole_buffer_helper() {
        assert!(validate_utf8(b"ok").is_ok());
        assert!(validate_utf8(&[0x80, 0x81]).is_err());
    }
}
