use fcode_body::{Insn, MethodBody, Operand, PodPools};
use fcode_isa::Opcode;

/// Opcode plus jump targets as execution-order positions, for comparing
/// bodies whose arenas differ.
#[allow(dead_code)]
pub fn shape(body: &MethodBody) -> Vec<(Opcode, Vec<usize>)> {
    body.sequence()
        .iter()
        .map(|&id| {
            let insn = body.insn(id);
            let targets = insn
                .targets()
                .iter()
                .map(|t| body.position_of(*t).expect("target in order"))
                .collect();
            (insn.opcode, targets)
        })
        .collect()
}

/// Encode `body` and decode the bytes into a fresh body with the same
/// static flag and variables.
#[allow(dead_code)]
pub fn recode(body: &mut MethodBody) -> (MethodBody, Vec<u8>) {
    let mut pools = PodPools::new();
    let bytes = fcode_body::codec::encode(body, &mut pools).expect("encode");
    let mut decoded = MethodBody::new(body.is_static(), body.returns_void());
    for var in body.variables().to_vec() {
        if var.is_param {
            decoded.add_parameter(&var.name, var.typ);
        } else {
            decoded.add_local(&var.name, var.typ);
        }
    }
    fcode_body::codec::decode(&mut decoded, &bytes, &pools).expect("decode");
    (decoded, bytes)
}

/// Operands of the execution order, with jump targets erased (ids are not
/// comparable across bodies; use [`shape`] for targets).
#[allow(dead_code)]
pub fn operands(body: &MethodBody) -> Vec<Operand> {
    body.sequence()
        .iter()
        .map(|&id| match &body.insn(id).operand {
            Operand::Jump(_) | Operand::Switch(_) => Operand::None,
            other => other.clone(),
        })
        .collect()
}

#[allow(dead_code)]
pub fn opcodes(body: &MethodBody) -> Vec<Opcode> {
    body.sequence()
        .iter()
        .map(|&id| body.insn(id).opcode)
        .collect()
}

#[allow(dead_code)]
pub fn push_all(body: &mut MethodBody, insns: impl IntoIterator<Item = Insn>) {
    for insn in insns {
        body.push(insn);
    }
}
