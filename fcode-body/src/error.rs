use thiserror::Error;

/// Errors from decoding, encoding and structural edits of method bodies.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown opcode byte {byte:#04x} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    #[error("truncated instruction stream at offset {0}")]
    Truncated(usize),

    #[error("jump to offset {0} does not land on an instruction boundary")]
    DanglingJumpOffset(u16),

    #[error("{table} table index {index} out of range")]
    BadConstantIndex { table: &'static str, index: u16 },

    #[error("register index {0} out of range for method variables")]
    BadRegister(u16),

    #[error("static method cannot reference the implicit `this` register")]
    ThisInStatic,

    #[error("error-table offset {0} does not name an instruction")]
    BadErrorTableOffset(u16),

    #[error("encoded body exceeds the 64 KiB offset range ({0} bytes)")]
    BodyTooLarge(usize),

    #[error("instruction references a node that is not in the execution order")]
    DanglingReference,

    #[error("variable is still referenced by an instruction")]
    VariableInUse,

    #[error("seek found no matching instruction")]
    SeekFailed,

    #[error("cursor is past the last instruction")]
    CursorAtEnd,

    #[error("malformed type reference {0:?}")]
    MalformedType(String),

    #[error("malformed field reference {0:?}")]
    MalformedField(String),

    #[error("malformed method reference {0:?}")]
    MalformedMethod(String),
}

pub type Result<T> = std::result::Result<T, Error>;
