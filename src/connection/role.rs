//! Connection role (RFC 6455 Section 5.1 masking obligations).

/// The endpoint's role, fixed for the lifetime of a connection.
///
/// The role decides both masking obligations: a client masks every frame
/// it sends and rejects masked frames from the server; a server sends
/// unmasked and rejects unmasked frames from the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Client endpoint: masks outgoing frames.
    Client,
    /// Server endpoint: sends unmasked frames.
    Server,
}

impl Role {
    /// Whether outgoing frames from this role carry a mask.
    #[inline]
    #[must_use]
    pub const fn must_mask(self) -> bool {
        matches!(self, Role::Client)
    }

    /// Whether incoming frames to this role must carry a mask.
    #[inline]
    #[must_use]
    pub const fn expects_masked(self) -> bool {
        matches!(self, Role::Server)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => f.write_str("client"),
            Role::Server => f.write_str("server"),
        }
    }
}
