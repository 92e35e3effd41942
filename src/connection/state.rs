//! Connection lifecycle states (RFC 6455 Section 7).

/// Lifecycle state of a WebSocket connection.
///
/// `Open -> Closing` when either side sends a Close frame; `-> Closed`
/// once the close handshake completes or the stream is dropped. Receiving
/// stays legal in `Closing` so the peer's Close can still be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ConnectionState {
    /// Handshake in progress; no frames may flow yet.
    #[default]
    Connecting,
    /// Ready for data transfer in both directions.
    Open,
    /// A Close frame has been sent; awaiting the peer's Close.
    Closing,
    /// Fully closed.
    Closed,
}

impl ConnectionState {
    /// Whether data or control messages may be sent.
    #[inline]
    #[must_use]
    pub const fn can_send(self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    /// Whether frames may still be received.
    #[inline]
    #[must_use]
    pub const fn can_receive(self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Closing)
    }

    /// Whether the connection has not yet fully closed.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
