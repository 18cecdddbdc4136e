//! Fantom fcode method bodies.
//!
//! A [`MethodBody`] is an instruction graph: nodes live in an arena keyed by
//! [`InsnId`], execution order is a separate sequence, and jump operands and
//! try blocks point at node ids rather than byte offsets. The [`codec`]
//! module converts between the graph and the binary wire form, resolving
//! offsets on the way in and regenerating them on the way out; the
//! [`Cursor`] edits the graph in place while keeping references intact.

pub mod body;
pub mod codec;
pub mod cursor;
pub mod error;
pub mod error_table;
pub mod insn;
pub mod pool;
pub mod refs;
pub mod variable;

pub use body::MethodBody;
pub use cursor::{Cursor, InsertRetarget, RemoveRetarget, SeekDirection, SeekMode};
pub use error::{Error, Result};
pub use error_table::{ErrorTable, ErrorTableEntry, TryBlock};
pub use insn::{Insn, InsnId, Operand};
pub use pool::{ConstantInterner, ConstantPool, PodPools};
pub use refs::{FieldRef, MethodRef, TypeRef};
pub use variable::{MethodVariable, VarId};
