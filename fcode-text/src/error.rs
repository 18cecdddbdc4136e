use thiserror::Error;

/// Assembly errors. Each carries the offending source line where there is
/// one; assembly is all-or-nothing, so any error means nothing was spliced
/// into the execution order.
#[derive(Debug, Error)]
pub enum AsmError {
    #[error("unknown mnemonic {mnemonic:?} in line {line:?}")]
    UnknownMnemonic { mnemonic: String, line: String },

    #[error("missing operand in line {line:?}")]
    MissingOperand { line: String },

    #[error("malformed operand in line {line:?}: {reason}")]
    MalformedOperand { line: String, reason: String },

    #[error("duplicate variable {name:?} in line {line:?}")]
    DuplicateVariable { name: String, line: String },

    #[error("unknown variable {name:?} in line {line:?}")]
    UnknownVariable { name: String, line: String },

    #[error("duplicate label {name:?}")]
    DuplicateLabel { name: String },

    #[error("label {name:?} is never defined")]
    UnresolvedLabel { name: String },

    #[error("label {name:?} has no instruction to bind to")]
    TrailingLabel { name: String },

    #[error("unmatched `}}` in line {line:?}")]
    UnmatchedClose { line: String },

    #[error("{count} block(s) left open at end of input")]
    UnclosedBlocks { count: usize },

    #[error("`{clause}` without a preceding try block in line {line:?}")]
    MisplacedHandler { clause: &'static str, line: String },

    #[error("try block contains no instructions")]
    EmptyTry,

    #[error("switch cases must count up from 0 in line {line:?}")]
    SwitchCaseOrder { line: String },

    #[error("switch block is missing its closing `}}`")]
    UnclosedSwitch,

    #[error(transparent)]
    Body(#[from] fcode_body::Error),
}

pub type Result<T> = std::result::Result<T, AsmError>;
