//! Binary decode/encode of instruction streams and the wire error table.
//!
//! Wire layout: one opcode byte, then big-endian u16 operands — constant
//! table indices for literals and references, byte offsets for jump targets,
//! a count followed by that many offsets for switch. Decode turns offsets
//! back into node ids in a single forward pass, parking unresolved forward
//! jumps in a patch list keyed by target offset.

use std::collections::{HashMap, HashSet};

use byteorder::{BigEndian, ByteOrder};
use fcode_isa::{Opcode, OperandSig};

use crate::body::MethodBody;
use crate::error::{Error, Result};
use crate::error_table::{ErrorTableEntry, TryBlock};
use crate::insn::{Insn, InsnId, Operand};
use crate::pool::{ConstantInterner, ConstantPool};
use crate::refs::TypeRef;
use crate::variable::VarId;

/// A parked reference to a not-yet-decoded target offset.
struct Patch {
    insn: InsnId,
    slot: PatchSlot,
}

enum PatchSlot {
    Jump,
    SwitchCase(usize),
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Result<u8> {
        let b = *self.bytes.get(self.pos).ok_or(Error::Truncated(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self) -> Result<u16> {
        if self.pos + 2 > self.bytes.len() {
            return Err(Error::Truncated(self.pos));
        }
        let v = BigEndian::read_u16(&self.bytes[self.pos..]);
        self.pos += 2;
        Ok(v)
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    let mut buf = [0u8; 2];
    BigEndian::write_u16(&mut buf, value);
    out.extend_from_slice(&buf);
}

/// Decode an instruction stream into `body`, appending to its execution
/// order. Jump operands come out as node ids; a jump to an offset that never
/// becomes an instruction boundary is an error, as is any trailing garbage
/// short of a whole instruction.
pub fn decode(body: &mut MethodBody, bytes: &[u8], pool: &dyn ConstantPool) -> Result<()> {
    if bytes.len() > u16::MAX as usize + 1 {
        return Err(Error::BodyTooLarge(bytes.len()));
    }
    let mut r = Reader { bytes, pos: 0 };
    let mut by_offset: HashMap<u16, InsnId> = HashMap::new();
    let mut pending: HashMap<u16, Vec<Patch>> = HashMap::new();

    while r.pos < bytes.len() {
        let offset = r.pos as u16;
        let byte = r.u8()?;
        let opcode = Opcode::from_byte(byte).ok_or(Error::UnknownOpcode {
            byte,
            offset: offset as usize,
        })?;

        // Jump operands are filled with a placeholder and patched once the
        // target instruction exists (immediately, for backward jumps).
        let mut forward: Vec<(u16, PatchSlot)> = Vec::new();
        let operand = match opcode.signature() {
            OperandSig::None => Operand::None,
            OperandSig::Integer => Operand::Int(pool.integer(r.u16()?)?),
            OperandSig::Float => Operand::Float(pool.float(r.u16()?)?),
            OperandSig::Decimal => Operand::Decimal(pool.decimal(r.u16()?)?.to_string()),
            OperandSig::Str => Operand::Str(pool.string(r.u16()?)?.to_string()),
            OperandSig::Duration => Operand::Duration(pool.duration(r.u16()?)?),
            OperandSig::Uri => Operand::Uri(pool.uri(r.u16()?)?.to_string()),
            OperandSig::Type => Operand::Type(pool.type_ref(r.u16()?)?.clone()),
            OperandSig::TypePair => {
                let a = pool.type_ref(r.u16()?)?.clone();
                let b = pool.type_ref(r.u16()?)?.clone();
                Operand::TypePair(a, b)
            }
            OperandSig::Field => Operand::Field(pool.field_ref(r.u16()?)?.clone()),
            OperandSig::Method => Operand::Method(pool.method_ref(r.u16()?)?.clone()),
            OperandSig::Register => decode_register(r.u16()?, body)?,
            OperandSig::Jump => {
                forward.push((r.u16()?, PatchSlot::Jump));
                Operand::Jump(InsnId(u32::MAX))
            }
            OperandSig::Switch => {
                let count = r.u16()? as usize;
                let mut targets = Vec::with_capacity(count);
                for case in 0..count {
                    forward.push((r.u16()?, PatchSlot::SwitchCase(case)));
                    targets.push(InsnId(u32::MAX));
                }
                Operand::Switch(targets)
            }
        };

        let id = body.push(Insn::new(opcode, operand));
        body.insn_mut(id).offset = offset;
        by_offset.insert(offset, id);
        for (target_offset, slot) in forward {
            match by_offset.get(&target_offset) {
                Some(target) => apply_patch(body, Patch { insn: id, slot }, *target),
                None => pending
                    .entry(target_offset)
                    .or_default()
                    .push(Patch { insn: id, slot }),
            }
        }
        if let Some(patches) = pending.remove(&offset) {
            for patch in patches {
                apply_patch(body, patch, id);
            }
        }
    }

    if let Some(offset) = pending.keys().min() {
        return Err(Error::DanglingJumpOffset(*offset));
    }
    Ok(())
}

fn apply_patch(body: &mut MethodBody, patch: Patch, target: InsnId) {
    match (&mut body.insn_mut(patch.insn).operand, patch.slot) {
        (Operand::Jump(slot), PatchSlot::Jump) => *slot = target,
        (Operand::Switch(targets), PatchSlot::SwitchCase(case)) => targets[case] = target,
        _ => unreachable!("patch slot does not match operand shape"),
    }
}

fn decode_register(raw: u16, body: &MethodBody) -> Result<Operand> {
    let count = body.variables().len();
    if body.is_static() {
        if (raw as usize) < count {
            Ok(Operand::Register(Some(VarId(raw))))
        } else {
            Err(Error::BadRegister(raw))
        }
    } else if raw == 0 {
        Ok(Operand::Register(None))
    } else if (raw as usize) <= count {
        Ok(Operand::Register(Some(VarId(raw - 1))))
    } else {
        Err(Error::BadRegister(raw))
    }
}

/// Encode the execution order back to bytes, interning operand constants.
/// Offsets are recomputed first, so the output is a pure function of the
/// instruction sequence.
pub fn encode(body: &mut MethodBody, pools: &mut dyn ConstantInterner) -> Result<Vec<u8>> {
    body.recompute_offsets()?;
    let in_order: HashSet<InsnId> = body.sequence().iter().copied().collect();
    let mut out = Vec::with_capacity(body.byte_len());

    for &id in body.sequence() {
        let insn = body.insn(id);
        out.push(insn.opcode.byte());
        match &insn.operand {
            Operand::None => {}
            Operand::Int(v) => put_u16(&mut out, pools.intern_integer(*v)),
            Operand::Float(v) => put_u16(&mut out, pools.intern_float(*v)),
            Operand::Decimal(v) => put_u16(&mut out, pools.intern_decimal(v)),
            Operand::Str(v) => put_u16(&mut out, pools.intern_string(v)),
            Operand::Duration(v) => put_u16(&mut out, pools.intern_duration(*v)),
            Operand::Uri(v) => put_u16(&mut out, pools.intern_uri(v)),
            Operand::Type(t) => put_u16(&mut out, pools.intern_type(t)),
            Operand::TypePair(a, b) => {
                put_u16(&mut out, pools.intern_type(a));
                put_u16(&mut out, pools.intern_type(b));
            }
            Operand::Field(f) => put_u16(&mut out, pools.intern_field(f)),
            Operand::Method(m) => put_u16(&mut out, pools.intern_method(m)),
            Operand::Register(var) => {
                put_u16(&mut out, encode_register(*var, body.is_static())?)
            }
            Operand::Jump(target) => {
                put_u16(&mut out, target_offset(body, &in_order, *target)?)
            }
            Operand::Switch(targets) => {
                put_u16(&mut out, targets.len() as u16);
                for target in targets {
                    put_u16(&mut out, target_offset(body, &in_order, *target)?);
                }
            }
        }
    }
    Ok(out)
}

fn encode_register(var: Option<VarId>, is_static: bool) -> Result<u16> {
    match (var, is_static) {
        (None, true) => Err(Error::ThisInStatic),
        (None, false) => Ok(0),
        (Some(v), true) => Ok(v.0),
        (Some(v), false) => Ok(v.0 + 1),
    }
}

fn target_offset(body: &MethodBody, in_order: &HashSet<InsnId>, target: InsnId) -> Result<u16> {
    if !in_order.contains(&target) {
        return Err(Error::DanglingReference);
    }
    Ok(body.insn(target).offset())
}

/// Rebuild [`TryBlock`]s from wire error-table rows. Offsets must refer to
/// the byte stream the body was decoded from; call directly after [`decode`].
///
/// Synthetic rows whose try-start is a catch marker are discarded, rows whose
/// end resolves to `finally.start` become finally pointers, and rows sharing
/// a start/end pair merge into one block.
pub fn decode_error_table(body: &mut MethodBody, entries: &[ErrorTableEntry]) -> Result<()> {
    body.recompute_offsets()?;
    let by_offset: HashMap<u16, InsnId> = body
        .sequence()
        .iter()
        .map(|&id| (body.insn(id).offset(), id))
        .collect();
    let resolve = |offset: u16| {
        by_offset
            .get(&offset)
            .copied()
            .ok_or(Error::BadErrorTableOffset(offset))
    };

    let mut blocks: Vec<TryBlock> = Vec::new();
    for entry in entries {
        let start = resolve(entry.try_start)?;
        if body.insn(start).opcode.is_catch_start() {
            // Synthetic handler-to-finally row; the real block already
            // carries this information.
            log::debug!(
                "dropping synthetic error-table row at offset {}",
                entry.try_start
            );
            continue;
        }
        let end = resolve(entry.try_end)?;
        let handler = resolve(entry.handler)?;

        if body.insn(end).opcode == Opcode::FinallyStart {
            match blocks
                .iter_mut()
                .find(|b| b.start == start && b.finally.is_none())
            {
                Some(block) => block.finally = Some(handler),
                None => {
                    // A try with no catch clauses. Its end is the last
                    // instruction ahead of the finally marker.
                    let fin_pos = body
                        .position_of(handler)
                        .ok_or(Error::BadErrorTableOffset(entry.handler))?;
                    let end = if fin_pos > 0 {
                        body.id_at(fin_pos - 1).ok_or(Error::BadErrorTableOffset(entry.handler))?
                    } else {
                        start
                    };
                    let mut block = TryBlock::new(start, end);
                    block.finally = Some(handler);
                    blocks.push(block);
                }
            }
        } else {
            match blocks.iter_mut().find(|b| b.start == start && b.end == end) {
                Some(block) => block.set_handler(entry.error_type.clone(), handler),
                None => {
                    let mut block = TryBlock::new(start, end);
                    block.set_handler(entry.error_type.clone(), handler);
                    blocks.push(block);
                }
            }
        }
    }

    // A finally row decoded ahead of its catch rows leaves a handler-less
    // twin; fold it into the handler block sharing its start.
    let mut i = 0;
    while i < blocks.len() {
        if blocks[i].handlers.is_empty()
            && blocks[i].finally.is_some()
            && blocks
                .iter()
                .any(|b| !b.handlers.is_empty() && b.start == blocks[i].start)
        {
            let folded = blocks.remove(i);
            if let Some(block) = blocks
                .iter_mut()
                .find(|b| !b.handlers.is_empty() && b.start == folded.start)
            {
                block.finally = folded.finally;
            }
        } else {
            i += 1;
        }
    }

    body.error_table.blocks.extend(blocks);
    Ok(())
}

/// Flatten the body's try blocks back into wire rows.
///
/// A block with a finally emits, besides one row per typed handler, one
/// synthetic row per handler (handler range -> finally) and a final row from
/// the try start to the finally marker guarded by `sys::Err`.
pub fn reconstruct_error_table(body: &mut MethodBody) -> Result<Vec<ErrorTableEntry>> {
    body.recompute_offsets()?;
    let in_order: HashSet<InsnId> = body.sequence().iter().copied().collect();
    let off = |id: InsnId| -> Result<u16> {
        if !in_order.contains(&id) {
            return Err(Error::DanglingReference);
        }
        Ok(body.insn(id).offset())
    };

    let mut entries = Vec::new();
    for block in &body.error_table.blocks {
        let try_start = off(block.start)?;
        let try_end = off(block.end)?;
        for (typ, handler) in &block.handlers {
            entries.push(ErrorTableEntry {
                try_start,
                try_end,
                handler: off(*handler)?,
                error_type: typ.clone(),
            });
        }
        if let Some(finally) = block.finally {
            let finally_off = off(finally)?;
            for (typ, handler) in &block.handlers {
                let catch_end = catch_end_of(body, *handler).unwrap_or(finally);
                entries.push(ErrorTableEntry {
                    try_start: off(*handler)?,
                    try_end: off(catch_end)?,
                    handler: finally_off,
                    error_type: typ.clone(),
                });
            }
            entries.push(ErrorTableEntry {
                try_start,
                try_end: finally_off,
                handler: finally_off,
                error_type: TypeRef::err(),
            });
        }
    }
    Ok(entries)
}

/// The `catch.end` marker closing the handler that starts at `handler`,
/// skipping over nested handlers.
fn catch_end_of(body: &MethodBody, handler: InsnId) -> Option<InsnId> {
    let start = body.position_of(handler)?;
    let mut depth = 1usize;
    for &id in &body.sequence()[start + 1..] {
        let opcode = body.insn(id).opcode;
        if opcode.is_catch_start() {
            depth += 1;
        } else if opcode == Opcode::CatchEnd {
            depth -= 1;
            if depth == 0 {
                return Some(id);
            }
        }
    }
    log::warn!("handler without a catch.end marker");
    None
}
