mod common;

use common::*;
use mjo_isa::*;

#[test]
fn decode_empty_is_ok() {
    assert!(decode(&[]).unwrap().is_empty());
}

#[test]
fn decode_invalid_opcode() {
    let err = decode(&[0x2b, 0x08, 0x99, 0x09]).unwrap_err();
    assert_eq!(err, DecodeError::InvalidOpcode { offset: 2, opcode: 0x0999 });
}

#[test]
fn decode_truncated_opcode() {
    let err = decode(&[0x2b]).unwrap_err();
    assert!(matches!(err, DecodeError::Truncated(0)), "got {err}");
}

#[test]
fn decode_truncated_mid_stream() {
    let bytes = encode(&[insn("return"), ldc_i(42)]).unwrap();
    let err = decode(&bytes[..bytes.len() - 1]).unwrap_err();
    assert_eq!(err, DecodeError::Truncated(2), "truncation is reported at the instruction start");
}

#[test]
fn decode_missing_terminator() {
    // ldstr, size 2, "ab" without NUL
    let err = decode(&[0x01, 0x08, 0x02, 0x00, b'a', b'b']).unwrap_err();
    assert_eq!(err, DecodeError::MissingTerminator(2));
}

#[test]
fn decode_zero_size_string() {
    let err = decode(&[0x40, 0x08, 0x00, 0x00]).unwrap_err();
    assert_eq!(err, DecodeError::MissingTerminator(2));
}

#[test]
fn decode_nonzero_reserved() {
    let mut call = insn("callp");
    call.hash = 1;
    let mut bytes = encode(&[call]).unwrap();
    bytes[6] = 1;
    let err = decode(&bytes).unwrap_err();
    assert_eq!(err, DecodeError::NonZeroReserved(6));
}

#[test]
fn decode_invalid_type_tag() {
    // argcheck with one tag of 9
    let err = decode(&[0x36, 0x08, 0x01, 0x00, 0x09]).unwrap_err();
    assert_eq!(err, DecodeError::InvalidType { offset: 4, tag: 9 });
}

#[test]
fn encode_rejects_block_targets() {
    let mut b = insn("br");
    b.jump = Some(Target::Block(3));
    assert!(matches!(encode(&[b]), Err(EncodeError::UnresolvedTarget(_))));
}

#[test]
fn encode_rejects_externalized_string() {
    let mut t = insn("text");
    t.external_key = Some("L1".to_string());
    let err = encode(&[t]).unwrap_err();
    assert_eq!(
        err,
        EncodeError::Externalized { mnemonic: "text".to_string(), key: "L1".to_string() }
    );
}

#[test]
fn encode_rejects_phi() {
    let phi = Instruction::new(opcode::phi());
    assert!(matches!(encode(&[phi]), Err(EncodeError::Synthetic(_))));
}
