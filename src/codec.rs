//! Buffered frame codec over an async byte stream.
//!
//! `FrameCodec` is the byte I/O layer of the core: it reads whole frames
//! out of a growable buffer and writes serialized frames, applying a fresh
//! mask per outgoing frame when the role requires one. Every read and
//! write is a suspension point; the codec itself holds no locks and spawns
//! nothing.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Config;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::Frame;

/// Seed for the outbound mask generator.
///
/// Unpredictability against same-path attackers is the requirement here,
/// not cryptographic strength (RFC 6455 Section 5.3), so a time-based
/// fallback is acceptable when the entropy source is unavailable.
fn mask_seed() -> u32 {
    let mut seed = [0u8; 4];
    if getrandom::getrandom(&mut seed).is_ok() {
        u32::from_le_bytes(seed)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0xA5A5_5A5A)
    }
}

/// Frame-level encoder/decoder owning the stream.
pub struct FrameCodec<T> {
    io: T,
    read_buf: BytesMut,
    write_buf: BytesMut,
    role: Role,
    config: Config,
    mask_state: u32,
}

impl<T> FrameCodec<T> {
    /// Wrap an upgraded stream.
    #[must_use]
    pub fn new(io: T, role: Role, config: Config) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            write_buf: BytesMut::with_capacity(config.write_buffer_size),
            role,
            config,
            mask_state: mask_seed(),
        }
    }

    /// The connection role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Release the underlying stream.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.io
    }

    /// Next outbound masking key: a counter stepped by the golden-ratio
    /// increment and finalized with an integer hash, seeded per codec.
    fn next_mask(&mut self) -> [u8; 4] {
        self.mask_state = self.mask_state.wrapping_add(0x9E37_79B9);
        let mut x = self.mask_state;
        x ^= x >> 16;
        x = x.wrapping_mul(0x7FEB_352D);
        x ^= x >> 15;
        x = x.wrapping_mul(0x846C_A68B);
        x ^= x >> 16;
        x.to_le_bytes()
    }

    /// Frame-header checks that run before the payload is complete:
    /// mask direction by role, RSV bits, declared size against limits.
    fn precheck_header(&self) -> Result<()> {
        let b0 = self.read_buf[0];
        let b1 = self.read_buf[1];
        let masked = b1 & 0x80 != 0;

        match self.role {
            Role::Server => {
                if !masked && !self.config.accept_unmasked_frames {
                    return Err(Error::UnmaskedClientFrame);
                }
            }
            Role::Client => {
                if masked {
                    return Err(Error::MaskedServerFrame);
                }
            }
        }

        if b0 & 0x70 != 0 {
            return Err(Error::ReservedBitsSet);
        }

        let declared = match b1 & 0x7F {
            len @ 0..=125 => Some(len as usize),
            126 if self.read_buf.len() >= 4 => {
                Some(u16::from_be_bytes([self.read_buf[2], self.read_buf[3]]) as usize)
            }
            127 if self.read_buf.len() >= 10 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&self.read_buf[2..10]);
                let len64 = u64::from_be_bytes(raw);
                Some(
                    usize::try_from(len64)
                        .map_err(|_| Error::PayloadTooLarge { size: len64 })?,
                )
            }
            _ => None,
        };
        if let Some(len) = declared {
            self.config.limits.check_frame_size(len)?;
        }
        Ok(())
    }

    /// Parse one frame from the buffer if it has fully arrived.
    fn try_parse(&mut self) -> Result<Option<Frame>> {
        if self.read_buf.len() < 2 {
            return Ok(None);
        }
        self.precheck_header()?;
        match Frame::parse(&self.read_buf) {
            Ok((frame, consumed)) => {
                self.read_buf.advance(consumed);
                Ok(Some(frame))
            }
            Err(Error::IncompleteFrame { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> FrameCodec<T> {
    /// Read the next frame, suspending until it has fully arrived.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` when the peer closes the stream at a
    ///   frame boundary.
    /// - `Error::UnexpectedEof` when the stream ends mid-frame.
    /// - Mask-direction, RSV, opcode, and size errors as described on
    ///   [`Frame::parse`] and the configured limits.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.try_parse()? {
                return Ok(frame);
            }

            self.read_buf.reserve(self.config.read_buffer_size.max(64));
            let n = self.io.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                if self.read_buf.is_empty() {
                    return Err(Error::ConnectionClosed(None));
                }
                let needed = match Frame::parse(&self.read_buf) {
                    Err(Error::IncompleteFrame { needed }) => needed,
                    _ => 1,
                };
                return Err(Error::UnexpectedEof { needed });
            }
        }
    }

    /// Serialize and write one frame, masking it when the role requires.
    ///
    /// Bytes reach the stream in call order; the caller serializes
    /// concurrent sends.
    ///
    /// # Errors
    ///
    /// `Error::Io` when the write fails.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mask = self.role.must_mask().then(|| self.next_mask());

        let wire_size = frame.wire_size(mask.is_some());
        self.write_buf.clear();
        self.write_buf.resize(wire_size, 0);
        let written = frame.write(&mut self.write_buf, mask)?;

        self.io.write_all(&self.write_buf[..written]).await?;
        Ok(())
    }

    /// Flush buffered writes down the stream.
    ///
    /// # Errors
    ///
    /// `Error::Io` when the flush fails.
    pub async fn flush(&mut self) -> Result<()> {
        self.io.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MockStream;
    use crate::protocol::OpCode;

    fn server_codec(input: Vec<u8>) -> FrameCodec<MockStream> {
        FrameCodec::new(MockStream::new(input), Role::Server, Config::default())
    }

    fn client_codec(input: Vec<u8>) -> FrameCodec<MockStream> {
        FrameCodec::new(MockStream::new(input), Role::Client, Config::default())
    }

    #[tokio::test]
    async fn read_masked_frame_as_server() {
        let codec = &mut server_codec(vec![
            0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
        ]);
        let frame = codec.read_frame().await.unwrap();
        assert!(frame.fin);
        assert_eq!(frame.opcode, OpCode::Text);
        assert_eq!(frame.payload(), b"Hello");
    }

    #[tokio::test]
    async fn server_rejects_unmasked_frame() {
        let codec = &mut server_codec(vec![0x81, 0x05, 0x48, 0x65, 0x6c, 0x6c, 0x6f]);
        assert!(matches!(
            codec.read_frame().await,
            Err(Error::UnmaskedClientFrame)
        ));
    }

    #[tokio::test]
    async fn client_rejects_masked_frame() {
        let codec = &mut client_codec(vec![
            0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
        ]);
        assert!(matches!(
            codec.read_frame().await,
            Err(Error::MaskedServerFrame)
        ));
    }

    #[tokio::test]
    async fn server_escape_hatch_accepts_unmasked() {
        let config = Config {
            accept_unmasked_frames: true,
            ..Config::default()
        };
        let mut codec = FrameCodec::new(
            MockStream::new(vec![0x81, 0x02, 0x48, 0x69]),
            Role::Server,
            config,
        );
        let frame = codec.read_frame().await.unwrap();
        assert_eq!(frame.payload(), b"Hi");
    }

    #[tokio::test]
    async fn rsv_bits_rejected() {
        // 0xc1 = FIN + RSV1 + Text, zero-key mask.
        let codec = &mut server_codec(vec![0xc1, 0x80, 0x00, 0x00, 0x00, 0x00]);
        assert!(matches!(
            codec.read_frame().await,
            Err(Error::ReservedBitsSet)
        ));
    }

    #[tokio::test]
    async fn frame_size_limit_enforced_before_payload() {
        let config = Config::default().with_limits(crate::Limits::new(16, 64, 8, 1024));
        // Declared length 32 > limit 16; payload bytes never sent.
        let mut codec = FrameCodec::new(
            MockStream::new(vec![0x82, 0xA0, 0x00, 0x00, 0x00, 0x00]),
            Role::Server,
            config,
        );
        assert!(matches!(
            codec.read_frame().await,
            Err(Error::FrameTooLarge { size: 32, max: 16 })
        ));
    }

    #[tokio::test]
    async fn consecutive_frames_from_one_buffer() {
        // Text "Hi" masked with 12 34 56 78, then Binary [01 02] masked
        // with aa bb cc dd.
        let codec = &mut server_codec(vec![
            0x81, 0x82, 0x12, 0x34, 0x56, 0x78, 0x5a, 0x5d, //
            0x82, 0x82, 0xaa, 0xbb, 0xcc, 0xdd, 0xab, 0xb9,
        ]);
        let first = codec.read_frame().await.unwrap();
        assert_eq!(first.payload(), b"Hi");
        let second = codec.read_frame().await.unwrap();
        assert_eq!(second.payload(), &[0x01, 0x02]);
    }

    #[tokio::test]
    async fn eof_at_boundary_is_clean_close() {
        let codec = &mut server_codec(vec![]);
        assert!(matches!(
            codec.read_frame().await,
            Err(Error::ConnectionClosed(None))
        ));
    }

    #[tokio::test]
    async fn eof_mid_frame_is_short_read() {
        // Header promises 5 payload bytes; only 2 arrive.
        let codec = &mut server_codec(vec![0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f]);
        assert!(matches!(
            codec.read_frame().await,
            Err(Error::UnexpectedEof { needed: 3 })
        ));
    }

    #[tokio::test]
    async fn server_writes_unmasked() {
        let mut codec = server_codec(vec![]);
        codec.write_frame(&Frame::text(b"Hi".to_vec())).await.unwrap();
        assert_eq!(codec.io.written(), &[0x81, 0x02, 0x48, 0x69]);
    }

    #[tokio::test]
    async fn client_writes_masked() {
        let mut codec = client_codec(vec![]);
        codec.write_frame(&Frame::text(b"Hi".to_vec())).await.unwrap();

        let written = codec.io.written().to_vec();
        assert_eq!(written.len(), 8);
        assert_eq!(written[0], 0x81);
        assert_eq!(written[1], 0x82); // MASK bit + len 2
        let key = [written[2], written[3], written[4], written[5]];
        assert_eq!(written[6] ^ key[0], b'H');
        assert_eq!(written[7] ^ key[1], b'i');
    }

    #[tokio::test]
    async fn masks_vary_between_frames() {
        let mut codec = client_codec(vec![]);
        codec.write_frame(&Frame::text(b"a".to_vec())).await.unwrap();
        codec.write_frame(&Frame::text(b"a".to_vec())).await.unwrap();

        let written = codec.io.written();
        // Two 7-byte frames; compare the two 4-byte keys.
        assert_eq!(written.len(), 14);
        assert_ne!(&written[2..6], &written[9..13]);
    }

    #[tokio::test]
    async fn large_declared_length_reads_fully() {
        let mut data = vec![0x82, 0xFE, 0x01, 0x2C, 0x00, 0x00, 0x00, 0x00];
        data.extend(std::iter::repeat(0xAB).take(300));
        let codec = &mut server_codec(data);
        let frame = codec.read_frame().await.unwrap();
        assert_eq!(frame.payload().len(), 300);
    }
}
