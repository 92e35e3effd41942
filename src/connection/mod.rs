//! Connection-level types: role, lifecycle state, send-side
//! fragmentation, and the `Connection` object itself.
//!
//! ## Lifecycle
//!
//! 1. **Open**: after a successful handshake; both directions flow.
//! 2. **Closing**: a Close frame has been sent; receiving continues
//!    until the peer's Close arrives.
//! 3. **Closed**: the close handshake completed or the stream ended.
//!
//! Dropping a `Connection` at any point releases the stream without
//! sending anything.

mod fragment;
mod role;
mod state;

pub use fragment::Fragmenter;
pub use role::Role;
pub use state::ConnectionState;

#[cfg(feature = "async-tokio")]
#[allow(clippy::module_inception)]
mod connection;

#[cfg(feature = "async-tokio")]
pub use connection::Connection;
