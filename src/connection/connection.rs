//! The per-connection receive/send state machine.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::FrameCodec;
use crate::config::Config;
use crate::connection::fragment::Fragmenter;
use crate::connection::{ConnectionState, Role};
use crate::error::{Error, Result};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::protocol::reassembly::{CompleteMessage, Reassembler};
use crate::protocol::{Frame, OpCode};

/// A WebSocket connection over an upgraded stream.
///
/// Owns the stream exclusively until dropped. `recv` yields one complete
/// logical message (or one control frame) at a time; `send` writes one
/// message, fragmenting data messages larger than the configured fragment
/// size. At most one receive and one send may be in flight at a time,
/// which `&mut self` enforces.
///
/// Dropping the connection releases the stream without sending anything;
/// use [`Connection::close`] first for a clean shutdown.
///
/// ## Example
///
/// ```rust,ignore
/// use wscore::{Config, Connection, Message, Role};
///
/// let stream = tokio::net::TcpStream::connect("example.com:80").await?;
/// // ... perform the upgrade handshake over `stream` ...
/// let mut conn = Connection::new(stream, Role::Client, Config::default());
///
/// conn.send(Message::text("hello")).await?;
/// while let Some(msg) = conn.recv().await? {
///     println!("got {msg:?}");
/// }
/// ```
pub struct Connection<T> {
    codec: FrameCodec<T>,
    state: ConnectionState,
    reassembler: Reassembler,
    pending_pong: Option<Vec<u8>>,
}

impl<T> Connection<T> {
    /// Wrap an already-upgraded stream.
    ///
    /// No handshake is performed here; the handshake adapter (or an
    /// external HTTP layer) must have upgraded the stream already. The
    /// connection starts in the `Open` state.
    pub fn new(io: T, role: Role, config: Config) -> Self {
        let reassembler = Reassembler::new(config.limits.clone());
        Self {
            codec: FrameCodec::new(io, role, config),
            state: ConnectionState::Open,
            reassembler,
            pending_pong: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The connection role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.codec.role()
    }

    /// Whether messages can still be sent.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Release the underlying stream without sending anything.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.codec.into_inner()
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    /// Send one message, fragmenting data messages over the configured
    /// fragment size. Control messages are never fragmented.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` unless the state is `Open`.
    /// - `Error::ControlFrameTooLarge` / `Error::FragmentedControlFrame`
    ///   for control payloads over 125 bytes.
    /// - `Error::MessageTooLarge` over the configured message limit.
    /// - `Error::Io` from the stream.
    pub async fn send(&mut self, message: Message) -> Result<()> {
        self.send_no_flush(message).await?;
        self.codec.flush().await
    }

    /// Send without flushing; pair with [`Connection::flush`].
    ///
    /// # Errors
    ///
    /// As [`Connection::send`].
    pub async fn send_no_flush(&mut self, message: Message) -> Result<()> {
        if !self.state.can_send() {
            return Err(Error::ConnectionClosed(None));
        }

        match message {
            Message::Ping(data) => self.write_control(Frame::ping(data)).await,
            Message::Pong(data) => self.write_control(Frame::pong(data)).await,
            Message::Close(close) => {
                let frame = match close {
                    Some(cf) => Frame::close(Some(cf.code.as_u16()), &cf.reason),
                    None => Frame::close(None, ""),
                };
                self.write_control(frame).await
            }
            Message::Text(text) => self.write_data(OpCode::Text, text.as_bytes()).await,
            Message::Binary(data) => self.write_data(OpCode::Binary, &data).await,
        }
    }

    /// Send several messages with a single flush at the end.
    ///
    /// # Errors
    ///
    /// As [`Connection::send`]; stops at the first failure.
    pub async fn send_batch(&mut self, messages: impl IntoIterator<Item = Message>) -> Result<()> {
        for message in messages {
            self.send_no_flush(message).await?;
        }
        self.codec.flush().await
    }

    /// Flush buffered writes down the stream.
    ///
    /// # Errors
    ///
    /// `Error::Io` when the flush fails.
    pub async fn flush(&mut self) -> Result<()> {
        self.codec.flush().await
    }

    async fn write_control(&mut self, frame: Frame) -> Result<()> {
        frame.validate()?;
        self.codec.write_frame(&frame).await
    }

    async fn write_data(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        self.codec.config().limits.check_message_size(payload.len())?;

        let chunk_size = self.codec.config().fragment_size;
        if payload.len() <= chunk_size {
            let frame = Frame::new(true, opcode, payload.to_vec());
            self.codec.write_frame(&frame).await
        } else {
            for frame in Fragmenter::new(payload, opcode, chunk_size) {
                self.codec.write_frame(&frame).await?;
            }
            Ok(())
        }
    }

    /// Receive the next complete message or control frame.
    ///
    /// Frames are pulled from the stream one at a time; fragments
    /// accumulate until fin=1, and control frames interleaved between
    /// fragments are surfaced immediately without touching the pending
    /// reassembly. A received Ping is surfaced and its Pong is queued to
    /// be written at the start of the next `recv` call. The first peer
    /// Close is answered with an echoing Close and surfaced; afterwards
    /// the state is `Closed` and `recv` returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// All framing, masking, reassembly, UTF-8, and size errors of the
    /// layers below (see [`crate::Error`]); each is fatal to the
    /// connection. `Error::close_code()` suggests the close code to send
    /// before dropping.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        if !self.state.can_receive() {
            return Ok(None);
        }

        loop {
            if let Some(payload) = self.pending_pong.take() {
                let pong = Frame::pong(payload);
                self.codec.write_frame(&pong).await?;
                self.codec.flush().await?;
            }

            let frame = match self.codec.read_frame().await {
                Ok(frame) => frame,
                Err(Error::ConnectionClosed(_)) => {
                    self.state = ConnectionState::Closed;
                    return Ok(None);
                }
                Err(e) => return Err(e),
            };
            frame.validate()?;

            match frame.opcode {
                OpCode::Ping => {
                    self.pending_pong = Some(frame.payload().to_vec());
                    return Ok(Some(Message::Ping(frame.into_payload())));
                }
                OpCode::Pong => {
                    return Ok(Some(Message::Pong(frame.into_payload())));
                }
                OpCode::Close => {
                    let close = parse_close_payload(frame.payload())?;

                    if self.state == ConnectionState::Open {
                        // Obligated to answer the first Close before dropping.
                        let echo = match &close {
                            Some(cf) => Frame::close(Some(cf.code.as_u16()), &cf.reason),
                            None => Frame::close(None, ""),
                        };
                        self.state = ConnectionState::Closing;
                        self.codec.write_frame(&echo).await?;
                        self.codec.flush().await?;
                    }
                    self.state = ConnectionState::Closed;
                    return Ok(Some(Message::Close(close)));
                }
                OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                    if let Some(complete) = self.reassembler.push(frame)? {
                        return Ok(Some(complete_to_message(complete)?));
                    }
                }
            }
        }
    }

    /// Send a ping.
    ///
    /// # Errors
    ///
    /// As [`Connection::send`].
    pub async fn ping(&mut self, data: Vec<u8>) -> Result<()> {
        self.send(Message::Ping(data)).await
    }

    /// Send an unsolicited pong.
    ///
    /// # Errors
    ///
    /// As [`Connection::send`].
    pub async fn pong(&mut self, data: Vec<u8>) -> Result<()> {
        self.send(Message::Pong(data)).await
    }

    /// Initiate the close handshake: send a Close frame and move to
    /// `Closing`. Callers wanting a clean shutdown keep calling `recv`
    /// until the peer's Close arrives (or their own deadline fires), then
    /// drop the connection.
    ///
    /// A no-op when the state is not `Open`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidCloseCode` for reserved codes; `Error::Io` from the
    /// stream.
    pub async fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        if self.state != ConnectionState::Open {
            return Ok(());
        }
        if code.is_reserved() {
            return Err(Error::InvalidCloseCode(code.as_u16()));
        }

        self.state = ConnectionState::Closing;
        let frame = Frame::close(Some(code.as_u16()), reason);
        self.codec.write_frame(&frame).await?;
        self.codec.flush().await
    }
}

/// Decode a Close frame payload: empty, or big-endian code plus UTF-8
/// reason. A 1-byte payload is malformed (RFC 6455 Section 5.5.1).
fn parse_close_payload(payload: &[u8]) -> Result<Option<CloseFrame>> {
    match payload.len() {
        0 => Ok(None),
        1 => Err(Error::InvalidCloseFrame),
        _ => {
            let code = u16::from_be_bytes([payload[0], payload[1]]);
            let reason = std::str::from_utf8(&payload[2..])?;
            Ok(Some(CloseFrame::new(CloseCode::from_u16(code), reason)))
        }
    }
}

fn complete_to_message(complete: CompleteMessage) -> Result<Message> {
    match complete.opcode {
        OpCode::Text => Ok(Message::Text(complete.into_text()?)),
        OpCode::Binary => Ok(Message::Binary(complete.payload)),
        other => Err(Error::InvalidOpcode(other.as_u8())),
    }
}
