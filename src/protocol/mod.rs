//! Protocol-level building blocks (RFC 6455): frames, masking, opcodes,
//! message reassembly, UTF-8 validation, and the opening handshake.

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;
pub mod reassembly;
pub mod utf8;

pub use frame::{Frame, FrameHeader, MAX_CONTROL_PAYLOAD};
pub use handshake::{accept_key, UpgradeRequest, UpgradeResponse, WS_GUID};
pub use mask::apply_mask;
pub use opcode::OpCode;
pub use reassembly::{CompleteMessage, Reassembler};
pub use utf8::{validate_utf8, Utf8Validator};
