//! Fantom fcode instruction set definitions.
//!
//! This crate provides the opcode table for the fcode bytecode format: the
//! 56 operations, their wire-level byte values, assembly mnemonics, and
//! operand signatures. Byte values are fixed by existing compiled pods and
//! must never be renumbered.

pub mod duration;

/// The operand signature of an operation: what payload follows the opcode
/// byte on the wire and after the mnemonic in assembly text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperandSig {
    /// No operand. One byte on the wire.
    None,
    /// 64-bit integer, interned in the pod integer table.
    Integer,
    /// 64-bit float, interned in the pod float table.
    Float,
    /// Decimal literal, stored as a string in the pod decimal table.
    Decimal,
    /// String, interned in the pod string table.
    Str,
    /// Duration in nanosecond ticks, interned in the pod duration table.
    Duration,
    /// A single type reference.
    Type,
    /// URI, stored as a string in the pod URI table.
    Uri,
    /// A method variable (register) index; absent means the implicit `this`.
    Register,
    /// A field reference.
    Field,
    /// A method reference.
    Method,
    /// A jump target (another instruction in the same body).
    Jump,
    /// Two type references.
    TypePair,
    /// A u16 count followed by that many jump targets.
    Switch,
}

macro_rules! opcodes {
    ($(($variant:ident, $byte:literal, $mnemonic:literal, $sig:ident),)*) => {
        /// An fcode operation. The discriminant is the wire-level opcode byte.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($variant = $byte,)*
        }

        impl Opcode {
            /// Every opcode, in wire-byte order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            /// Look up an opcode by its wire byte value.
            pub fn from_byte(byte: u8) -> Option<Opcode> {
                match byte {
                    $($byte => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            /// Look up an opcode by its assembly mnemonic.
            pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
                match mnemonic {
                    $($mnemonic => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            /// The assembly mnemonic for this opcode.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $mnemonic,)*
                }
            }

            /// The operand signature for this opcode.
            pub fn signature(self) -> OperandSig {
                match self {
                    $(Opcode::$variant => OperandSig::$sig,)*
                }
            }
        }
    };
}

opcodes! {
    (Nop, 0, "nop", None),
    (LoadNull, 1, "ld.null", None),
    (LoadFalse, 2, "ld.false", None),
    (LoadTrue, 3, "ld.true", None),
    (LoadInt, 4, "ld.int", Integer),
    (LoadFloat, 5, "ld.float", Float),
    (LoadDecimal, 6, "ld.decimal", Decimal),
    (LoadStr, 7, "ld.str", Str),
    (LoadDuration, 8, "ld.duration", Duration),
    (LoadType, 9, "ld.type", Type),
    (LoadUri, 10, "ld.uri", Uri),
    (LoadVar, 11, "ld.var", Register),
    (StoreVar, 12, "st.var", Register),
    (LoadInstance, 13, "ld.instance", Field),
    (StoreInstance, 14, "st.instance", Field),
    (LoadStatic, 15, "ld.static", Field),
    (StoreStatic, 16, "st.static", Field),
    (LoadMixinStatic, 17, "ld.mixin", Field),
    (StoreMixinStatic, 18, "st.mixin", Field),
    (CallNew, 19, "new", Method),
    (CallCtor, 20, "ctor", Method),
    (CallStatic, 21, "call.static", Method),
    (CallVirtual, 22, "call.virtual", Method),
    (CallNonVirtual, 23, "call", Method),
    (CallMixinStatic, 24, "call.mixin.static", Method),
    (CallMixinVirtual, 25, "call.mixin.virtual", Method),
    (CallMixinNonVirtual, 26, "call.mixin", Method),
    (Jump, 27, "jmp", Jump),
    (JumpTrue, 28, "jmp.true", Jump),
    (JumpFalse, 29, "jmp.false", Jump),
    (CompareEq, 30, "cmp.eq", TypePair),
    (CompareNe, 31, "cmp.ne", TypePair),
    (Compare, 32, "cmp", TypePair),
    (CompareLe, 33, "cmp.le", TypePair),
    (CompareLt, 34, "cmp.lt", TypePair),
    (CompareGt, 35, "cmp.gt", TypePair),
    (CompareGe, 36, "cmp.ge", TypePair),
    (CompareSame, 37, "cmp.same", None),
    (CompareNotSame, 38, "cmp.different", None),
    (CompareNull, 39, "cmp.null", Type),
    (CompareNotNull, 40, "cmp.notnull", Type),
    (Return, 41, "ret", None),
    (Pop, 42, "pop", Type),
    (Dup, 43, "dup", Type),
    (Is, 44, "is", Type),
    (As, 45, "as", Type),
    (Coerce, 46, "coerce", TypePair),
    (Switch, 47, "switch", Switch),
    (Throw, 48, "throw", None),
    (Leave, 49, "leave", Jump),
    (JumpFinally, 50, "jmp.finally", Jump),
    (CatchAllStart, 51, "catch.all", None),
    (CatchErrStart, 52, "catch.err", Type),
    (CatchEnd, 53, "catch.end", None),
    (FinallyStart, 54, "finally.start", None),
    (FinallyEnd, 55, "finally.end", None),
}

impl Opcode {
    /// The wire byte value of this opcode.
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// True for the two catch-entry marker opcodes.
    pub fn is_catch_start(self) -> bool {
        matches!(self, Opcode::CatchAllStart | Opcode::CatchErrStart)
    }

    /// True for jump-signature opcodes (`jmp`, `jmp.true`, `jmp.false`,
    /// `leave`, `jmp.finally`).
    pub fn is_jump(self) -> bool {
        self.signature() == OperandSig::Jump
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_values_are_dense_and_stable() {
        assert_eq!(Opcode::ALL.len(), 56);
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.byte() as usize, i);
            assert_eq!(Opcode::from_byte(i as u8), Some(*op));
        }
        assert_eq!(Opcode::from_byte(56), None);
    }

    #[test]
    fn mnemonic_lookup_is_inverse() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(*op));
        }
        assert_eq!(Opcode::from_mnemonic("ld.bogus"), None);
    }

    #[test]
    fn comparison_opcode_order_matches_wire() {
        // gt sits below ge in the wire table; existing pods depend on it.
        assert_eq!(Opcode::CompareGt.byte(), 35);
        assert_eq!(Opcode::CompareGe.byte(), 36);
    }
}
