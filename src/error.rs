//! Error types for the WebSocket endpoint core.
//!
//! Every failure the core can encounter is a variant here. The core never
//! retries and never swallows an error; the first failure is surfaced and
//! the caller decides between a clean close and dropping the connection.

use thiserror::Error;

use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The stream ended in the middle of a frame.
    ///
    /// Fatal to the connection: framing state cannot be recovered after a
    /// short read. The caller should drop the connection without sending
    /// anything.
    #[error("stream ended mid-frame: {needed} more bytes required")]
    UnexpectedEof {
        /// Number of additional bytes that were required.
        needed: usize,
    },

    /// An I/O operation on the underlying stream failed.
    #[error("i/o error: {0}")]
    Io(String),

    /// The peer closed the stream at a frame boundary, or the connection
    /// was already closed when the operation started.
    #[error("connection closed: {0:?}")]
    ConnectionClosed(Option<u16>),

    /// More data is needed to decode the current frame.
    ///
    /// Not fatal: a buffered reader resumes after more bytes arrive.
    #[error("incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// A server received an unmasked frame from a client (RFC 6455 §5.1).
    #[error("client frame must be masked")]
    UnmaskedClientFrame,

    /// A client received a masked frame from a server (RFC 6455 §5.1).
    #[error("server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved header bits were set without a negotiated extension.
    #[error("reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// A frame used one of the reserved opcodes (0x3-0x7, 0xB-0xF).
    #[error("reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// An opcode value outside the 4-bit range was requested.
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// A control frame had fin=0 (RFC 6455 §5.5).
    #[error("control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// A control frame payload exceeded 125 bytes (RFC 6455 §5.5).
    #[error("control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// A continuation frame arrived with no message in progress.
    #[error("continuation frame without an open message")]
    UnexpectedContinuation,

    /// A Text/Binary frame arrived while a fragmented message was still
    /// open. RFC 6455 §5.4 requires this to be a protocol error.
    #[error("new data frame while a fragmented message is open")]
    InterleavedDataFrame,

    /// A close frame carried a 1-byte payload (must be empty or >= 2 bytes).
    #[error("invalid close frame payload")]
    InvalidCloseFrame,

    /// A close code outside the sendable ranges of RFC 6455 §7.4.1.
    #[error("invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// A text message (or close reason) was not valid UTF-8.
    #[error("invalid UTF-8 in text payload")]
    InvalidUtf8,

    /// The wire declared a payload length this platform cannot buffer.
    #[error("payload length {size} exceeds addressable buffer size")]
    PayloadTooLarge {
        /// Declared payload length from the wire.
        size: u64,
    },

    /// Frame size exceeds the configured maximum.
    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reassembled message size exceeds the configured maximum.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// The opening handshake was malformed or failed verification.
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake data exceeded the configured maximum.
    #[error("handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Actual handshake size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },
}

impl Error {
    /// Suggested close code for notifying the peer before teardown.
    ///
    /// Returns `None` for transport-level failures where sending a close
    /// frame is pointless (the stream is already unusable).
    #[must_use]
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Error::UnmaskedClientFrame
            | Error::MaskedServerFrame
            | Error::ReservedBitsSet
            | Error::ReservedOpcode(_)
            | Error::InvalidOpcode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::UnexpectedContinuation
            | Error::InterleavedDataFrame
            | Error::InvalidCloseFrame
            | Error::InvalidCloseCode(_) => Some(CloseCode::ProtocolError),
            Error::InvalidUtf8 => Some(CloseCode::InvalidPayload),
            Error::PayloadTooLarge { .. }
            | Error::FrameTooLarge { .. }
            | Error::MessageTooLarge { .. }
            | Error::TooManyFragments { .. } => Some(CloseCode::MessageTooBig),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
