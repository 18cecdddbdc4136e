//! Instructions and operand payloads.

use fcode_isa::{Opcode, OperandSig};

use crate::refs::{FieldRef, MethodRef, TypeRef};
use crate::variable::VarId;

/// Stable identity of an instruction node within one [`MethodBody`]'s arena.
/// Ids survive reordering, insertion and removal; they are never reused while
/// the body is alive.
///
/// [`MethodBody`]: crate::MethodBody
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InsnId(pub(crate) u32);

impl InsnId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An instruction operand. The variant in play is dictated by the opcode's
/// [`OperandSig`]; jump and switch targets are node ids, not byte offsets.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    None,
    Int(i64),
    Float(f64),
    /// Decimal literals are kept as their source text.
    Decimal(String),
    Str(String),
    /// Nanosecond ticks.
    Duration(i64),
    Uri(String),
    Type(TypeRef),
    TypePair(TypeRef, TypeRef),
    Field(FieldRef),
    Method(MethodRef),
    /// A variable register; `None` is the implicit `this` receiver.
    Register(Option<VarId>),
    Jump(InsnId),
    Switch(Vec<InsnId>),
}

/// One instruction: opcode, operand, and the byte offset assigned by the
/// last offset recomputation (stale after edits until recomputed).
#[derive(Clone, Debug, PartialEq)]
pub struct Insn {
    pub opcode: Opcode,
    pub operand: Operand,
    pub(crate) offset: u16,
}

impl Insn {
    pub fn new(opcode: Opcode, operand: Operand) -> Insn {
        Insn {
            opcode,
            operand,
            offset: 0,
        }
    }

    /// Byte offset from the last [`MethodBody::recompute_offsets`] pass.
    ///
    /// [`MethodBody::recompute_offsets`]: crate::MethodBody::recompute_offsets
    pub fn offset(&self) -> u16 {
        self.offset
    }

    /// Encoded size in bytes: 1 with no operand, 5 for a type pair,
    /// `3 + 2n` for a switch with `n` targets, otherwise 3.
    pub fn size(&self) -> usize {
        match self.opcode.signature() {
            OperandSig::None => 1,
            OperandSig::TypePair => 5,
            OperandSig::Switch => match &self.operand {
                Operand::Switch(targets) => 3 + 2 * targets.len(),
                _ => 3,
            },
            _ => 3,
        }
    }

    pub fn jump_target(&self) -> Option<InsnId> {
        match self.operand {
            Operand::Jump(target) => Some(target),
            _ => None,
        }
    }

    /// All node ids this instruction refers to.
    pub fn targets(&self) -> &[InsnId] {
        match &self.operand {
            Operand::Jump(target) => std::slice::from_ref(target),
            Operand::Switch(targets) => targets,
            _ => &[],
        }
    }
}

// Constructors, one per opcode, matching assembly mnemonics.
impl Insn {
    pub fn nop() -> Insn {
        Insn::new(Opcode::Nop, Operand::None)
    }
    pub fn load_null() -> Insn {
        Insn::new(Opcode::LoadNull, Operand::None)
    }
    pub fn load_false() -> Insn {
        Insn::new(Opcode::LoadFalse, Operand::None)
    }
    pub fn load_true() -> Insn {
        Insn::new(Opcode::LoadTrue, Operand::None)
    }
    pub fn load_int(value: i64) -> Insn {
        Insn::new(Opcode::LoadInt, Operand::Int(value))
    }
    pub fn load_float(value: f64) -> Insn {
        Insn::new(Opcode::LoadFloat, Operand::Float(value))
    }
    pub fn load_decimal(literal: &str) -> Insn {
        Insn::new(Opcode::LoadDecimal, Operand::Decimal(literal.to_string()))
    }
    pub fn load_str(value: &str) -> Insn {
        Insn::new(Opcode::LoadStr, Operand::Str(value.to_string()))
    }
    pub fn load_duration(ticks: i64) -> Insn {
        Insn::new(Opcode::LoadDuration, Operand::Duration(ticks))
    }
    pub fn load_type(typ: TypeRef) -> Insn {
        Insn::new(Opcode::LoadType, Operand::Type(typ))
    }
    pub fn load_uri(value: &str) -> Insn {
        Insn::new(Opcode::LoadUri, Operand::Uri(value.to_string()))
    }
    pub fn load_this() -> Insn {
        Insn::new(Opcode::LoadVar, Operand::Register(None))
    }
    pub fn load_var(var: VarId) -> Insn {
        Insn::new(Opcode::LoadVar, Operand::Register(Some(var)))
    }
    pub fn store_var(var: VarId) -> Insn {
        Insn::new(Opcode::StoreVar, Operand::Register(Some(var)))
    }
    pub fn load_instance(field: FieldRef) -> Insn {
        Insn::new(Opcode::LoadInstance, Operand::Field(field))
    }
    pub fn store_instance(field: FieldRef) -> Insn {
        Insn::new(Opcode::StoreInstance, Operand::Field(field))
    }
    pub fn load_static(field: FieldRef) -> Insn {
        Insn::new(Opcode::LoadStatic, Operand::Field(field))
    }
    pub fn store_static(field: FieldRef) -> Insn {
        Insn::new(Opcode::StoreStatic, Operand::Field(field))
    }
    pub fn load_mixin_static(field: FieldRef) -> Insn {
        Insn::new(Opcode::LoadMixinStatic, Operand::Field(field))
    }
    pub fn store_mixin_static(field: FieldRef) -> Insn {
        Insn::new(Opcode::StoreMixinStatic, Operand::Field(field))
    }
    pub fn call_new(method: MethodRef) -> Insn {
        Insn::new(Opcode::CallNew, Operand::Method(method))
    }
    pub fn call_ctor(method: MethodRef) -> Insn {
        Insn::new(Opcode::CallCtor, Operand::Method(method))
    }
    pub fn call_static(method: MethodRef) -> Insn {
        Insn::new(Opcode::CallStatic, Operand::Method(method))
    }
    pub fn call_virtual(method: MethodRef) -> Insn {
        Insn::new(Opcode::CallVirtual, Operand::Method(method))
    }
    pub fn call_non_virtual(method: MethodRef) -> Insn {
        Insn::new(Opcode::CallNonVirtual, Operand::Method(method))
    }
    pub fn call_mixin_static(method: MethodRef) -> Insn {
        Insn::new(Opcode::CallMixinStatic, Operand::Method(method))
    }
    pub fn call_mixin_virtual(method: MethodRef) -> Insn {
        Insn::new(Opcode::CallMixinVirtual, Operand::Method(method))
    }
    pub fn call_mixin_non_virtual(method: MethodRef) -> Insn {
        Insn::new(Opcode::CallMixinNonVirtual, Operand::Method(method))
    }
    pub fn jump(target: InsnId) -> Insn {
        Insn::new(Opcode::Jump, Operand::Jump(target))
    }
    pub fn jump_true(target: InsnId) -> Insn {
        Insn::new(Opcode::JumpTrue, Operand::Jump(target))
    }
    pub fn jump_false(target: InsnId) -> Insn {
        Insn::new(Opcode::JumpFalse, Operand::Jump(target))
    }
    pub fn compare_eq(a: TypeRef, b: TypeRef) -> Insn {
        Insn::new(Opcode::CompareEq, Operand::TypePair(a, b))
    }
    pub fn compare_ne(a: TypeRef, b: TypeRef) -> Insn {
        Insn::new(Opcode::CompareNe, Operand::TypePair(a, b))
    }
    pub fn compare(a: TypeRef, b: TypeRef) -> Insn {
        Insn::new(Opcode::Compare, Operand::TypePair(a, b))
    }
    pub fn compare_le(a: TypeRef, b: TypeRef) -> Insn {
        Insn::new(Opcode::CompareLe, Operand::TypePair(a, b))
    }
    pub fn compare_lt(a: TypeRef, b: TypeRef) -> Insn {
        Insn::new(Opcode::CompareLt, Operand::TypePair(a, b))
    }
    pub fn compare_gt(a: TypeRef, b: TypeRef) -> Insn {
        Insn::new(Opcode::CompareGt, Operand::TypePair(a, b))
    }
    pub fn compare_ge(a: TypeRef, b: TypeRef) -> Insn {
        Insn::new(Opcode::CompareGe, Operand::TypePair(a, b))
    }
    pub fn compare_same() -> Insn {
        Insn::new(Opcode::CompareSame, Operand::None)
    }
    pub fn compare_not_same() -> Insn {
        Insn::new(Opcode::CompareNotSame, Operand::None)
    }
    pub fn compare_null(typ: TypeRef) -> Insn {
        Insn::new(Opcode::CompareNull, Operand::Type(typ))
    }
    pub fn compare_not_null(typ: TypeRef) -> Insn {
        Insn::new(Opcode::CompareNotNull, Operand::Type(typ))
    }
    pub fn ret() -> Insn {
        Insn::new(Opcode::Return, Operand::None)
    }
    pub fn pop(typ: TypeRef) -> Insn {
        Insn::new(Opcode::Pop, Operand::Type(typ))
    }
    pub fn dup(typ: TypeRef) -> Insn {
        Insn::new(Opcode::Dup, Operand::Type(typ))
    }
    pub fn is(typ: TypeRef) -> Insn {
        Insn::new(Opcode::Is, Operand::Type(typ))
    }
    pub fn as_type(typ: TypeRef) -> Insn {
        Insn::new(Opcode::As, Operand::Type(typ))
    }
    pub fn coerce(from: TypeRef, to: TypeRef) -> Insn {
        Insn::new(Opcode::Coerce, Operand::TypePair(from, to))
    }
    pub fn switch(targets: Vec<InsnId>) -> Insn {
        Insn::new(Opcode::Switch, Operand::Switch(targets))
    }
    pub fn throw() -> Insn {
        Insn::new(Opcode::Throw, Operand::None)
    }
    pub fn leave(target: InsnId) -> Insn {
        Insn::new(Opcode::Leave, Operand::Jump(target))
    }
    pub fn jump_finally(target: InsnId) -> Insn {
        Insn::new(Opcode::JumpFinally, Operand::Jump(target))
    }
    pub fn catch_all_start() -> Insn {
        Insn::new(Opcode::CatchAllStart, Operand::None)
    }
    pub fn catch_err_start(typ: TypeRef) -> Insn {
        Insn::new(Opcode::CatchErrStart, Operand::Type(typ))
    }
    pub fn catch_end() -> Insn {
        Insn::new(Opcode::CatchEnd, Operand::None)
    }
    pub fn finally_start() -> Insn {
        Insn::new(Opcode::FinallyStart, Operand::None)
    }
    pub fn finally_end() -> Insn {
        Insn::new(Opcode::FinallyEnd, Operand::None)
    }
}
