//! Try/catch/finally region model.

use crate::insn::InsnId;
use crate::refs::TypeRef;

/// One protected region: the try range, its typed handlers in declaration
/// order, and an optional finally entry point. All positions are node ids;
/// `end` is the last instruction inside the try range, not one past it.
#[derive(Clone, Debug, PartialEq)]
pub struct TryBlock {
    pub start: InsnId,
    pub end: InsnId,
    /// Handler entry points keyed by error type, in declaration order.
    /// Each entry point is the handler's `catch.all` / `catch.err` marker.
    pub handlers: Vec<(TypeRef, InsnId)>,
    /// The `finally.start` marker, when the block has a finally.
    pub finally: Option<InsnId>,
}

impl TryBlock {
    pub fn new(start: InsnId, end: InsnId) -> TryBlock {
        TryBlock {
            start,
            end,
            handlers: Vec::new(),
            finally: None,
        }
    }

    pub fn handler_for(&self, typ: &TypeRef) -> Option<InsnId> {
        self.handlers
            .iter()
            .find(|(t, _)| t == typ)
            .map(|(_, h)| *h)
    }

    /// Add or replace the handler for a type, keeping declaration order for
    /// types not already present.
    pub fn set_handler(&mut self, typ: TypeRef, entry: InsnId) {
        match self.handlers.iter_mut().find(|(t, _)| *t == typ) {
            Some(slot) => slot.1 = entry,
            None => self.handlers.push((typ, entry)),
        }
    }

    /// Every node id the block points at.
    pub fn targets(&self) -> impl Iterator<Item = InsnId> + '_ {
        [self.start, self.end]
            .into_iter()
            .chain(self.handlers.iter().map(|(_, h)| *h))
            .chain(self.finally)
    }
}

/// The method's protected regions, in wire emission order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorTable {
    pub blocks: Vec<TryBlock>,
}

impl ErrorTable {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// One row of the wire-format error table: byte offsets into the encoded
/// instruction stream plus the guarded error type.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorTableEntry {
    pub try_start: u16,
    pub try_end: u16,
    pub handler: u16,
    pub error_type: TypeRef,
}
