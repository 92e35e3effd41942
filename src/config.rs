//! Connection configuration and resource limits.

/// Resource limits for a WebSocket connection.
///
/// Bounds memory use against hostile peers: a declared frame length, a
/// reassembled message, or a handshake that exceeds its limit fails before
/// any allocation of that size happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload size of a single frame in bytes.
    ///
    /// Default: 16 MB.
    pub max_frame_size: usize,

    /// Maximum size of a reassembled message in bytes.
    ///
    /// Default: 64 MB.
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 128.
    pub max_fragment_count: usize,

    /// Maximum size of the opening handshake in bytes.
    ///
    /// Default: 8 KB.
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024,
            max_message_size: 64 * 1024 * 1024,
            max_fragment_count: 128,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create limits with custom values.
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
            max_handshake_size,
        }
    }

    /// Tight limits for constrained environments.
    ///
    /// 64 KB frames, 256 KB messages, 16 fragments, 4 KB handshake.
    #[must_use]
    pub const fn small() -> Self {
        Self {
            max_frame_size: 64 * 1024,
            max_message_size: 256 * 1024,
            max_fragment_count: 16,
            max_handshake_size: 4096,
        }
    }

    /// Validate a frame payload size.
    ///
    /// # Errors
    ///
    /// [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) when over the limit.
    pub const fn check_frame_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_frame_size {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate a reassembled message size.
    ///
    /// # Errors
    ///
    /// [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) when over the limit.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate a fragment count.
    ///
    /// # Errors
    ///
    /// [`Error::TooManyFragments`](crate::Error::TooManyFragments) when over the limit.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        if count > self.max_fragment_count {
            Err(crate::Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }

    /// Validate a handshake size.
    ///
    /// # Errors
    ///
    /// [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) when over the limit.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// WebSocket connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Fragment size for outgoing messages, in bytes.
    ///
    /// Data messages larger than this are split into multiple frames.
    /// Default: 16 KB.
    pub fragment_size: usize,

    /// Accept unmasked frames on the server side.
    ///
    /// RFC 6455 requires clients to mask every frame; this escape hatch
    /// exists for testing only. Default: false.
    pub accept_unmasked_frames: bool,

    /// Initial capacity of the read buffer, in bytes. Default: 8 KB.
    pub read_buffer_size: usize,

    /// Initial capacity of the write buffer, in bytes. Default: 8 KB.
    pub write_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            fragment_size: 16 * 1024,
            accept_unmasked_frames: false,
            read_buffer_size: 8192,
            write_buffer_size: 8192,
        }
    }
}

impl Config {
    /// Create a configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the fragment size for outgoing messages.
    #[must_use]
    pub const fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size;
        self
    }

    /// Set the initial read buffer capacity.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the initial write buffer capacity.
    #[must_use]
    pub const fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_frame_size, 16 * 1024 * 1024);
        assert_eq!(limits.max_message_size, 64 * 1024 * 1024);
        assert_eq!(limits.max_fragment_count, 128);
        assert_eq!(limits.max_handshake_size, 8192);
    }

    #[test]
    fn frame_size_check() {
        let limits = Limits::new(1024, 4096, 8, 1024);
        assert!(limits.check_frame_size(1024).is_ok());
        assert!(matches!(
            limits.check_frame_size(1025),
            Err(Error::FrameTooLarge {
                size: 1025,
                max: 1024
            })
        ));
    }

    #[test]
    fn message_size_check() {
        let limits = Limits::new(1024, 4096, 8, 1024);
        assert!(limits.check_message_size(4096).is_ok());
        assert!(limits.check_message_size(4097).is_err());
    }

    #[test]
    fn fragment_count_check() {
        let limits = Limits::new(1024, 4096, 8, 1024);
        assert!(limits.check_fragment_count(8).is_ok());
        assert!(matches!(
            limits.check_fragment_count(9),
            Err(Error::TooManyFragments { count: 9, max: 8 })
        ));
    }

    #[test]
    fn handshake_size_check() {
        let limits = Limits::small();
        assert!(limits.check_handshake_size(4096).is_ok());
        assert!(limits.check_handshake_size(4097).is_err());
    }

    #[test]
    fn config_builder() {
        let config = Config::new()
            .with_limits(Limits::small())
            .with_fragment_size(4096)
            .with_read_buffer_size(1024)
            .with_write_buffer_size(2048);

        assert_eq!(config.fragment_size, 4096);
        assert_eq!(config.limits.max_frame_size, 64 * 1024);
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.write_buffer_size, 2048);
        assert!(!config.accept_unmasked_frames);
    }
}
