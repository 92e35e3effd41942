//! Property-based tests for the frame codec and masking transform.

use proptest::prelude::*;
use wscore::protocol::{apply_mask, Frame, OpCode, Reassembler};
use wscore::Limits;

fn data_opcode() -> impl Strategy<Value = OpCode> {
    prop_oneof![Just(OpCode::Text), Just(OpCode::Binary)]
}

proptest! {
    // parse(write(frame)) == frame, without a mask.
    #[test]
    fn roundtrip_unmasked(
        fin in any::<bool>(),
        opcode in data_opcode(),
        payload in prop::collection::vec(any::<u8>(), 0..1000)
    ) {
        let frame = Frame::new(fin, opcode, payload);
        let mut buf = vec![0u8; frame.wire_size(false)];
        let written = frame.write(&mut buf, None).unwrap();

        let (parsed, consumed) = Frame::parse(&buf[..written]).unwrap();
        prop_assert_eq!(consumed, written);
        prop_assert_eq!(parsed, frame);
    }

    // parse(write(frame, key)) == frame for every key: the parser unmasks.
    #[test]
    fn roundtrip_masked(
        fin in any::<bool>(),
        opcode in data_opcode(),
        payload in prop::collection::vec(any::<u8>(), 0..500),
        key in any::<[u8; 4]>()
    ) {
        let frame = Frame::new(fin, opcode, payload);
        let mut buf = vec![0u8; frame.wire_size(true)];
        let written = frame.write(&mut buf, Some(key)).unwrap();

        let (parsed, consumed) = Frame::parse(&buf[..written]).unwrap();
        prop_assert_eq!(consumed, written);
        prop_assert_eq!(parsed, frame);
    }

    // Masking twice with the same key is the identity.
    #[test]
    fn mask_is_involutive(
        data in prop::collection::vec(any::<u8>(), 0..2000),
        key in any::<[u8; 4]>()
    ) {
        let mut masked = data.clone();
        apply_mask(&mut masked, key);
        apply_mask(&mut masked, key);
        prop_assert_eq!(masked, data);
    }

    // The length prefix always uses the shortest legal encoding, and the
    // declared length always survives a roundtrip.
    #[test]
    fn shortest_length_encoding(len in 0usize..70_000) {
        let frame = Frame::binary(vec![0u8; len]);
        let mut buf = vec![0u8; frame.wire_size(false)];
        let written = frame.write(&mut buf, None).unwrap();

        let expected_header = if len <= 125 { 2 } else if len <= 65_535 { 4 } else { 10 };
        prop_assert_eq!(written, expected_header + len);

        let (parsed, _) = Frame::parse(&buf[..written]).unwrap();
        prop_assert_eq!(parsed.payload().len(), len);
    }

    // Reassembling arbitrary splits of a payload restores it byte-for-byte.
    #[test]
    fn reassembly_restores_any_split(
        payload in prop::collection::vec(any::<u8>(), 1..512),
        cut in 1usize..511
    ) {
        let cut = cut.min(payload.len());
        let mut reassembler = Reassembler::new(Limits::default());

        let first = Frame::new(cut == payload.len(), OpCode::Binary, payload[..cut].to_vec());
        let done = reassembler.push(first).unwrap();
        let complete = if cut == payload.len() {
            done.unwrap()
        } else {
            prop_assert!(done.is_none());
            let rest = Frame::new(true, OpCode::Continuation, payload[cut..].to_vec());
            reassembler.push(rest).unwrap().unwrap()
        };

        prop_assert_eq!(complete.opcode, OpCode::Binary);
        prop_assert_eq!(complete.payload, payload);
    }
}

/// The boundary sizes of the three length encodings, exercised exactly.
#[test]
fn length_encoding_boundaries() {
    for (len, header) in [
        (0usize, 2usize),
        (125, 2),
        (126, 4),
        (127, 4),
        (65_535, 4),
        (65_536, 10),
    ] {
        let frame = Frame::binary(vec![0xA5; len]);
        let mut buf = vec![0u8; frame.wire_size(false)];
        let written = frame.write(&mut buf, None).unwrap();
        assert_eq!(written, header + len, "length {len}");

        let (parsed, consumed) = Frame::parse(&buf[..written]).unwrap();
        assert_eq!(consumed, written, "length {len}");
        assert_eq!(parsed.payload().len(), len, "length {len}");
    }
}
