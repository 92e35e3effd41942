//! Frame parsing and serialization (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```

use crate::error::{Error, Result};
use crate::protocol::mask::apply_mask;
use crate::protocol::OpCode;

/// Maximum control-frame payload size (RFC 6455 Section 5.5).
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Parsed metadata of a single frame: everything before the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final-fragment flag.
    pub fin: bool,
    /// Reserved bit 1; zero unless an extension was negotiated.
    pub rsv1: bool,
    /// Reserved bit 2.
    pub rsv2: bool,
    /// Reserved bit 3.
    pub rsv3: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key, present exactly when the MASK bit was set.
    pub mask: Option<[u8; 4]>,
    /// Decoded payload length.
    pub payload_len: usize,
}

impl FrameHeader {
    /// Decode a frame header from the front of `buf`.
    ///
    /// Returns the header and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` when `buf` holds less than a full header;
    ///   the caller buffers more input and retries.
    /// - `Error::ReservedOpcode` for opcodes 0x3-0x7 and 0xB-0xF.
    /// - `Error::PayloadTooLarge` when the 64-bit length has its most
    ///   significant bit set (forbidden by RFC 6455 Section 5.2) or does
    ///   not fit in `usize`.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }

        let b0 = buf[0];
        let b1 = buf[1];

        let fin = b0 & 0x80 != 0;
        let rsv1 = b0 & 0x40 != 0;
        let rsv2 = b0 & 0x20 != 0;
        let rsv3 = b0 & 0x10 != 0;
        let opcode = OpCode::from_u8(b0 & 0x0F)?;
        let masked = b1 & 0x80 != 0;

        let (payload_len, len_end) = match b1 & 0x7F {
            len @ 0..=125 => (len as usize, 2),
            126 => {
                if buf.len() < 4 {
                    return Err(Error::IncompleteFrame {
                        needed: 4 - buf.len(),
                    });
                }
                (u16::from_be_bytes([buf[2], buf[3]]) as usize, 4)
            }
            _ => {
                if buf.len() < 10 {
                    return Err(Error::IncompleteFrame {
                        needed: 10 - buf.len(),
                    });
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[2..10]);
                let len64 = u64::from_be_bytes(raw);
                if len64 & (1 << 63) != 0 {
                    return Err(Error::PayloadTooLarge { size: len64 });
                }
                let len = usize::try_from(len64)
                    .map_err(|_| Error::PayloadTooLarge { size: len64 })?;
                (len, 10)
            }
        };

        let header_len = if masked { len_end + 4 } else { len_end };
        if buf.len() < header_len {
            return Err(Error::IncompleteFrame {
                needed: header_len - buf.len(),
            });
        }

        let mask = if masked {
            Some([buf[len_end], buf[len_end + 1], buf[len_end + 2], buf[len_end + 3]])
        } else {
            None
        };

        Ok((
            Self {
                fin,
                rsv1,
                rsv2,
                rsv3,
                opcode,
                mask,
                payload_len,
            },
            header_len,
        ))
    }

    /// Serialize this header into `out`, using the shortest legal length
    /// encoding, and return the number of bytes written.
    ///
    /// `out` must hold at least [`Self::encoded_len`] bytes; this is an
    /// internal invariant of the send path.
    pub(crate) fn encode(&self, out: &mut [u8]) -> usize {
        let mut b0 = self.opcode.as_u8();
        if self.fin {
            b0 |= 0x80;
        }
        out[0] = b0;

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0 };
        let mut at = 2;
        if self.payload_len <= 125 {
            out[1] = mask_bit | self.payload_len as u8;
        } else if self.payload_len <= u16::MAX as usize {
            out[1] = mask_bit | 126;
            out[2..4].copy_from_slice(&(self.payload_len as u16).to_be_bytes());
            at = 4;
        } else {
            out[1] = mask_bit | 127;
            out[2..10].copy_from_slice(&(self.payload_len as u64).to_be_bytes());
            at = 10;
        }

        if let Some(key) = self.mask {
            out[at..at + 4].copy_from_slice(&key);
            at += 4;
        }
        at
    }

    /// Number of bytes [`Self::encode`] will emit.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let len_field = if self.payload_len <= 125 {
            0
        } else if self.payload_len <= u16::MAX as usize {
            2
        } else {
            8
        };
        let mask_field = if self.mask.is_some() { 4 } else { 0 };
        2 + len_field + mask_field
    }
}

/// One WebSocket frame: header bits plus an owned payload.
///
/// Incoming frames hold the payload already unmasked; outgoing frames hold
/// it in the clear and the mask (if any) is applied during [`Frame::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final-fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Vec<u8>,
}

impl Frame {
    /// Create a frame from raw parts.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            payload,
        }
    }

    /// A single-frame text message.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// A single-frame binary message.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// A close frame. With a code the payload is the big-endian code
    /// followed by the reason bytes; without one the payload is empty.
    #[must_use]
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = match code {
            Some(code) => {
                let mut data = code.to_be_bytes().to_vec();
                data.extend_from_slice(reason.as_bytes());
                data
            }
            None => Vec::new(),
        };
        Self::new(true, OpCode::Close, payload)
    }

    /// A ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Ping, data.into())
    }

    /// A pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Pong, data.into())
    }

    /// Borrow the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Parse one frame from the front of `buf`, unmasking the payload when
    /// a masking key is present. Returns the frame and bytes consumed.
    ///
    /// # Errors
    ///
    /// Everything [`FrameHeader::decode`] can return, plus
    /// `Error::IncompleteFrame` when the payload has not fully arrived.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        let (header, header_len) = FrameHeader::decode(buf)?;

        let total = header_len
            .checked_add(header.payload_len)
            .ok_or(Error::PayloadTooLarge {
                size: header.payload_len as u64,
            })?;
        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        let mut payload = buf[header_len..total].to_vec();
        if let Some(key) = header.mask {
            apply_mask(&mut payload, key);
        }

        Ok((
            Self {
                fin: header.fin,
                opcode: header.opcode,
                payload,
            },
            total,
        ))
    }

    /// Enforce the frame-level rules of RFC 6455 Sections 5.2 and 5.5:
    /// RSV bits are handled at decode time; control frames must be final
    /// and carry at most 125 payload bytes.
    ///
    /// # Errors
    ///
    /// `Error::FragmentedControlFrame` or `Error::ControlFrameTooLarge`.
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedControlFrame);
            }
            if self.payload.len() > MAX_CONTROL_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }
        Ok(())
    }

    /// Serialize the frame into `buf`, masking the payload with `mask` when
    /// given (the frame's own payload is left untouched). Returns the bytes
    /// written.
    ///
    /// # Errors
    ///
    /// `Error::FrameTooLarge` when `buf` is smaller than
    /// [`Frame::wire_size`].
    pub fn write(&self, buf: &mut [u8], mask: Option<[u8; 4]>) -> Result<usize> {
        let total = self.wire_size(mask.is_some());
        if buf.len() < total {
            return Err(Error::FrameTooLarge {
                size: total,
                max: buf.len(),
            });
        }

        let header = FrameHeader {
            fin: self.fin,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            opcode: self.opcode,
            mask,
            payload_len: self.payload.len(),
        };
        let at = header.encode(buf);

        buf[at..at + self.payload.len()].copy_from_slice(&self.payload);
        if let Some(key) = mask {
            apply_mask(&mut buf[at..at + self.payload.len()], key);
        }

        Ok(total)
    }

    /// Size of this frame on the wire, with or without a masking key.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let len_field = if self.payload.len() <= 125 {
            0
        } else if self.payload.len() <= u16::MAX as usize {
            2
        } else {
            8
        };
        let mask_field = if masked { 4 } else { 0 };
        2 + len_field + mask_field + self.payload.len()
    }
}
