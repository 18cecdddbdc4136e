use fcode_body::MethodBody;
use fcode_isa::Opcode;

/// Route `log` output through the test harness.
#[allow(dead_code)]
pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Opcode plus jump targets as execution-order positions.
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

#[allow(dead_code)]
pub fn opcodes(body: &MethodBody) -> Vec<Opcode> {
    body.sequence()
        .iter()
        .map(|&id| body.insn(id).opcode)
        .collect()
}

/// Try blocks as execution-order positions:
/// `(start, end, handlers, finally)`.
#[allow(dead_code)]
pub fn block_shape(body: &MethodBody) -> Vec<(usize, usize, Vec<usize>, Option<usize>)> {
    body.error_table
        .blocks
        .iter()
        .map(|block| {
            (
                body.position_of(block.start).expect("start in order"),
                body.position_of(block.end).expect("end in order"),
                block
                    .handlers
                    .iter()
                    .map(|(_, h)| body.position_of(*h).expect("handler in order"))
                    .collect(),
                block.finally.map(|f| body.position_of(f).expect("finally in order")),
            )
        })
        .collect()
}
