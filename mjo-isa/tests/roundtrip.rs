mod common;

use common::*;
use mjo_isa::*;

#[test]
fn load_constant_and_return() {
    let program = [ldc_i(5), insn("return")];
    let bytes = encode(&program).unwrap();
    assert_eq!(bytes, [0x00, 0x08, 0x05, 0x00, 0x00, 0x00, 0x2b, 0x08]);

    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].opcode.mnemonic, "ldc.i");
    assert_eq!(decoded[0].int_value, 5);
    assert_eq!(decoded[0].offset, Some(0));
    assert_eq!(decoded[0].size, Some(6));
    assert_eq!(decoded[1].opcode.value, op::RETURN);
    assert_eq!(decoded[1].offset, Some(6));
}

#[test]
fn roundtrip_variable_access() {
    let flags = Flags::new(MjoType::Int, Scope::Local, Modifier::PostIncrement, InvertMode::None, 0);
    let mut ld = insn("ld");
    ld.flags = flags;
    ld.hash = 0xdead_beef;
    ld.var_offset = 2;
    let mut st = insn("st.i");
    st.flags = flags;
    st.hash = 0x1234_5678;
    st.var_offset = -1;
    assert_roundtrip(&[ld, st, insn("pop")]);
}

#[test]
fn roundtrip_strings_and_floats() {
    let mut s = insn("ldstr");
    s.string = Some("こんにちは".to_string());
    let mut t = insn("text");
    t.string = Some(String::new());
    let mut r = insn("ldc.r");
    r.float_value = 1.5;
    assert_roundtrip(&[s, t, r, insn("conv.i")]);
}

#[test]
fn malformed_shift_jis_survives_a_roundtrip() {
    let bytes = [0x01, 0x08, 0x03, 0x00, b'a', 0xff, 0x00];
    let mut decoded = decode(&bytes).unwrap();
    assert_eq!(decoded[0].string.as_deref(), Some("a\u{fffd}"));
    assert_eq!(decoded[0].raw_string, Some(vec![b'a', 0xff]));
    assert_eq!(encode(&decoded).unwrap(), bytes);

    decoded[0].string = Some("ab".to_string());
    assert_eq!(encode(&decoded).unwrap(), [0x01, 0x08, 0x03, 0x00, b'a', b'b', 0x00]);
}

#[test]
fn string_size_includes_terminator() {
    let mut s = insn("ldstr");
    s.string = Some("ab".to_string());
    let bytes = encode(&[s]).unwrap();
    assert_eq!(bytes, [0x01, 0x08, 0x03, 0x00, b'a', b'b', 0x00]);
}

#[test]
fn roundtrip_calls() {
    let mut call = insn("call");
    call.hash = 0xaabb_ccdd;
    call.arg_count = 2;
    let mut sys = insn("syscallp");
    sys.hash = 0x0102_0304;
    sys.arg_count = 0;
    let bytes = encode(&[call.clone()]).unwrap();
    // opcode, hash, reserved zero, arg count
    assert_eq!(bytes.len(), 2 + 4 + 4 + 2);
    assert_roundtrip(&[call, sys]);
}

#[test]
fn roundtrip_branches_and_switch() {
    let mut switch = insn("switch");
    switch.switch_cases = vec![Target::Offset(0), Target::Offset(-12), Target::Offset(40)];
    let mut line = insn("line");
    line.line_number = 77;
    assert_roundtrip(&[
        br("brfalse", 6),
        br("br", -10),
        br("bsel.5", 0),
        switch,
        line,
    ]);
}

#[test]
fn roundtrip_signatures() {
    let mut argcheck = insn("argcheck");
    argcheck.type_list = vec![MjoType::Int, MjoType::StringArray];
    let mut alloca = insn("alloca");
    alloca.type_list = vec![MjoType::Float];
    assert_roundtrip(&[argcheck, alloca, insn("alloca")]);
}

#[test]
fn roundtrip_element_store() {
    let mut st = insn("stelemp.add.s");
    st.flags = Flags::new(MjoType::StringArray, Scope::Thread, Modifier::None, InvertMode::None, 2);
    st.hash = 7;
    st.var_offset = -1;
    assert_roundtrip(&[st]);
}

#[test]
fn encoded_size_matches_output() {
    let mut s = insn("ctrl");
    s.string = Some("f".to_string());
    let program = [ldc_i(1), s, br("br", 0), insn("proc")];
    let bytes = encode(&program).unwrap();
    let total: u32 = program.iter().map(|i| encoded_size(i).unwrap()).sum();
    assert_eq!(total as usize, bytes.len());
}
