//! Textual surface for Fantom fcode method bodies: an assembler, a
//! disassembler whose output assembles back to the same instructions, and a
//! best-effort statement-folding decompiler layered over the disassembly.

pub mod asm;
pub mod cursor_ext;
pub mod decompile;
pub mod dis;
pub mod error;
pub mod strings;

pub use asm::{Fragment, assemble, assemble_fragment};
pub use cursor_ext::CursorAsmExt;
pub use dis::{disassemble, disassemble_range, disassemble_with_guesses};
pub use error::{AsmError, Result};
