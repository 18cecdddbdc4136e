mod common;

use common::{opcodes, operands, push_all, recode, shape};
use fcode_body::{
    Error, FieldRef, Insn, MethodBody, MethodRef, Operand, PodPools, TypeRef, codec,
};
use fcode_isa::Opcode;

#[test]
fn two_instruction_body_offsets() {
    // ld.int is 3 bytes, so ret lands at offset 3 and the body is 4 bytes.
    let mut body = MethodBody::new(true, false);
    push_all(&mut body, [Insn::load_int(7), Insn::ret()]);
    body.recompute_offsets().unwrap();
    assert_eq!(body.insn(body.id_at(0).unwrap()).offset(), 0);
    assert_eq!(body.insn(body.id_at(1).unwrap()).offset(), 3);

    let mut pools = PodPools::new();
    let bytes = codec::encode(&mut body, &mut pools).unwrap();
    assert_eq!(bytes.len(), 4);
    assert_eq!(bytes[0], Opcode::LoadInt.byte());
    assert_eq!(bytes[3], Opcode::Return.byte());
}

#[test]
fn literal_operands_roundtrip() {
    let mut body = MethodBody::new(true, true);
    push_all(
        &mut body,
        [
            Insn::load_int(-42),
            Insn::load_float(2.5),
            Insn::load_decimal("1.23d"),
            Insn::load_str("hi\nthere"),
            Insn::load_duration(5_000_000),
            Insn::load_uri("/index.html"),
            Insn::load_type(TypeRef::parse("sys::Str?").unwrap()),
            Insn::coerce(TypeRef::obj(), TypeRef::basic("sys", "Int")),
            Insn::ret(),
        ],
    );
    let (decoded, _) = recode(&mut body);
    assert_eq!(operands(&decoded), operands(&body));
    assert_eq!(opcodes(&decoded), opcodes(&body));
}

#[test]
fn reference_operands_roundtrip() {
    let field = FieldRef::parse("(sys::Int)acme::Widget.count").unwrap();
    let method = MethodRef::parse("acme::Widget.resize(sys::Int) -> sys::Bool").unwrap();
    let mut body = MethodBody::new(false, true);
    body.add_local("w", TypeRef::basic("acme", "Widget"));
    push_all(
        &mut body,
        [
            Insn::load_this(),
            Insn::load_instance(field.clone()),
            Insn::pop(TypeRef::basic("sys", "Int")),
            Insn::load_var(fcode_body::VarId(0)),
            Insn::load_int(3),
            Insn::call_virtual(method.clone()),
            Insn::pop(TypeRef::basic("sys", "Bool")),
            Insn::ret(),
        ],
    );
    let (decoded, _) = recode(&mut body);
    assert_eq!(operands(&decoded), operands(&body));
}

#[test]
fn forward_and_backward_jumps_roundtrip() {
    // 0: ld.true  1: jmp.true -> 4  2: nop  3: jmp -> 0  4: ret
    let mut body = MethodBody::new(true, false);
    let head = body.push(Insn::load_true());
    let ret = body.alloc(Insn::ret());
    body.push(Insn::jump_true(ret));
    body.push(Insn::nop());
    body.push(Insn::jump(head));
    let end = body.len();
    body.insert(end, ret);

    let (decoded, bytes) = recode(&mut body);
    assert_eq!(shape(&decoded), shape(&body));

    // Encoding is deterministic.
    let mut pools = PodPools::new();
    assert_eq!(codec::encode(&mut body, &mut pools).unwrap(), bytes);
}

#[test]
fn switch_size_and_roundtrip() {
    // 0: ld.int  3: switch (3 cases)  12: nop  13: nop  14: nop  15: ret
    let mut body = MethodBody::new(true, false);
    body.push(Insn::load_int(1));
    let a = body.alloc(Insn::nop());
    let b = body.alloc(Insn::nop());
    let c = body.alloc(Insn::nop());
    let switch = body.push(Insn::switch(vec![a, b, c]));
    let end = body.len();
    body.insert(end, a);
    body.insert(end + 1, b);
    body.insert(end + 2, c);
    body.push(Insn::ret());

    assert_eq!(body.insn(switch).size(), 9);
    body.recompute_offsets().unwrap();
    assert_eq!(body.insn(body.id_at(2).unwrap()).offset(), 12);

    let (decoded, bytes) = recode(&mut body);
    assert_eq!(shape(&decoded), shape(&body));
    // Count word at the front of the switch payload.
    assert_eq!(&bytes[4..6], &[0, 3]);
}

#[test]
fn instance_register_encoding_reserves_zero() {
    let mut body = MethodBody::new(false, true);
    let p = body.add_parameter("p", TypeRef::obj());
    push_all(&mut body, [Insn::load_this(), Insn::load_var(p), Insn::ret()]);

    let mut pools = PodPools::new();
    let bytes = codec::encode(&mut body, &mut pools).unwrap();
    assert_eq!(&bytes[1..3], &[0, 0]); // this
    assert_eq!(&bytes[4..6], &[0, 1]); // p at index 0, shifted

    let (decoded, _) = recode(&mut body);
    assert_eq!(
        decoded.insn(decoded.id_at(0).unwrap()).operand,
        Operand::Register(None)
    );
    assert_eq!(
        decoded.insn(decoded.id_at(1).unwrap()).operand,
        Operand::Register(Some(fcode_body::VarId(0)))
    );
}

#[test]
fn static_register_encoding_is_direct() {
    let mut body = MethodBody::new(true, true);
    let p = body.add_parameter("p", TypeRef::obj());
    push_all(&mut body, [Insn::load_var(p), Insn::ret()]);
    let mut pools = PodPools::new();
    let bytes = codec::encode(&mut body, &mut pools).unwrap();
    assert_eq!(&bytes[1..3], &[0, 0]);
}

#[test]
fn this_in_static_method_is_rejected() {
    let mut body = MethodBody::new(true, true);
    push_all(&mut body, [Insn::load_this(), Insn::ret()]);
    let mut pools = PodPools::new();
    assert!(matches!(
        codec::encode(&mut body, &mut pools),
        Err(Error::ThisInStatic)
    ));
}

#[test]
fn jump_to_unplaced_node_is_rejected() {
    let mut body = MethodBody::new(true, false);
    let orphan = body.alloc(Insn::ret());
    body.push(Insn::jump(orphan));
    body.push(Insn::ret());
    let mut pools = PodPools::new();
    assert!(matches!(
        codec::encode(&mut body, &mut pools),
        Err(Error::DanglingReference)
    ));
}

#[test]
fn unknown_opcode_is_rejected() {
    let mut body = MethodBody::new(true, true);
    let pools = PodPools::new();
    assert!(matches!(
        codec::decode(&mut body, &[200], &pools),
        Err(Error::UnknownOpcode { byte: 200, offset: 0 })
    ));
}

#[test]
fn truncated_operand_is_rejected() {
    let mut body = MethodBody::new(true, true);
    let pools = PodPools::new();
    // ld.int with one payload byte missing.
    assert!(matches!(
        codec::decode(&mut body, &[Opcode::LoadInt.byte(), 0], &pools),
        Err(Error::Truncated(_))
    ));
}

#[test]
fn jump_into_operand_bytes_is_rejected() {
    let mut body = MethodBody::new(true, true);
    let pools = PodPools::new();
    // jmp -> offset 1, which is inside its own operand.
    let bytes = [Opcode::Jump.byte(), 0, 1, Opcode::Return.byte()];
    assert!(matches!(
        codec::decode(&mut body, &bytes, &pools),
        Err(Error::DanglingJumpOffset(1))
    ));
}

#[test]
fn bad_constant_index_is_rejected() {
    let mut body = MethodBody::new(true, true);
    let pools = PodPools::new();
    let bytes = [Opcode::LoadInt.byte(), 0, 9];
    assert!(matches!(
        codec::decode(&mut body, &bytes, &pools),
        Err(Error::BadConstantIndex { table: "integer", index: 9 })
    ));
}
