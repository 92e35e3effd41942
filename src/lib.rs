//! # wscore: RFC 6455 WebSocket endpoint core
//!
//! The framing codec plus the per-connection receive/send state machine:
//! message fragmentation and reassembly, interleaved control frames, and
//! the role-dependent masking rules, for both server and client endpoints
//! over an already-upgraded duplex byte stream.
//!
//! ## What this crate is
//!
//! - Bit-exact encode/decode of the RFC 6455 frame header, extended
//!   payload lengths, masking key, and XOR masking transform.
//! - A strict receive state machine that reassembles fragmented messages,
//!   surfaces control frames between fragments, and rejects masking and
//!   fragmentation violations with typed errors.
//! - A send path producing single or fragmented frames, masked on the
//!   client side with a fresh key per frame.
//! - The upgrade-handshake adapter for both roles (key generation, accept
//!   hashing, request/response parsing).
//!
//! TLS, connection establishment, and application dispatch are the
//! caller's concern; the core consumes any `AsyncRead + AsyncWrite`
//! stream.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use wscore::{Config, Connection, Message, Role};
//!
//! // `stream` has completed the upgrade handshake already.
//! let mut conn = Connection::new(stream, Role::Client, Config::default());
//!
//! conn.send(Message::text("hello")).await?;
//! while let Some(msg) = conn.recv().await? {
//!     println!("received: {msg:?}");
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod codec;

#[cfg(all(test, feature = "async-tokio"))]
mod test_util;

pub use config::{Config, Limits};
pub use connection::{ConnectionState, Fragmenter, Role};
pub use error::{Error, Result};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{accept_key, Frame, FrameHeader, OpCode, UpgradeRequest, UpgradeResponse};

#[cfg(feature = "async-tokio")]
pub use codec::FrameCodec;
#[cfg(feature = "async-tokio")]
pub use connection::Connection;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn public_types_are_send() {
        assert_send::<Error>();
        assert_send::<Config>();
        assert_send::<Limits>();
        assert_send::<Message>();
        assert_send::<CloseCode>();
        assert_send::<CloseFrame>();
        assert_send::<ConnectionState>();
        assert_send::<Role>();
        assert_send::<Frame>();
        assert_send::<OpCode>();
    }

    #[test]
    fn public_types_are_sync() {
        assert_sync::<Error>();
        assert_sync::<Config>();
        assert_sync::<Limits>();
        assert_sync::<Message>();
        assert_sync::<CloseCode>();
        assert_sync::<CloseFrame>();
        assert_sync::<ConnectionState>();
        assert_sync::<Role>();
        assert_sync::<Frame>();
        assert_sync::<OpCode>();
    }
}
