//! The method body: an instruction arena plus an execution order.
//!
//! Instructions live in an append-only arena addressed by [`InsnId`]; the
//! execution order is a separate vector of ids. Jump operands and try blocks
//! point at ids, so reordering, inserting and removing instructions never
//! invalidates control flow — byte offsets are derived state, recomputed
//! before encoding.

use crate::error::{Error, Result};
use crate::error_table::ErrorTable;
use crate::insn::{Insn, InsnId, Operand};
use crate::refs::TypeRef;
use crate::variable::{MethodVariable, VarId};

pub struct MethodBody {
    nodes: Vec<Insn>,
    order: Vec<InsnId>,
    variables: Vec<MethodVariable>,
    pub error_table: ErrorTable,
    is_static: bool,
    returns_void: bool,
}

impl MethodBody {
    pub fn new(is_static: bool, returns_void: bool) -> MethodBody {
        MethodBody {
            nodes: Vec::new(),
            order: Vec::new(),
            variables: Vec::new(),
            error_table: ErrorTable::default(),
            is_static,
            returns_void,
        }
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn returns_void(&self) -> bool {
        self.returns_void
    }

    // ---- instructions ----

    /// Add a node to the arena without placing it in the execution order.
    pub fn alloc(&mut self, insn: Insn) -> InsnId {
        let id = InsnId(self.nodes.len() as u32);
        self.nodes.push(insn);
        id
    }

    /// Append an instruction at the end of the execution order.
    pub fn push(&mut self, insn: Insn) -> InsnId {
        let id = self.alloc(insn);
        self.order.push(id);
        id
    }

    /// Place an already-allocated node at `position` in the execution order.
    pub fn insert(&mut self, position: usize, id: InsnId) {
        self.order.insert(position, id);
    }

    /// Remove the instruction at `position` from the execution order. The
    /// node stays in the arena; references to it are the caller's problem.
    pub fn remove(&mut self, position: usize) -> InsnId {
        self.order.remove(position)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The execution order.
    pub fn sequence(&self) -> &[InsnId] {
        &self.order
    }

    pub fn id_at(&self, position: usize) -> Option<InsnId> {
        self.order.get(position).copied()
    }

    pub fn position_of(&self, id: InsnId) -> Option<usize> {
        self.order.iter().position(|x| *x == id)
    }

    pub fn insn(&self, id: InsnId) -> &Insn {
        &self.nodes[id.index()]
    }

    pub fn insn_mut(&mut self, id: InsnId) -> &mut Insn {
        &mut self.nodes[id.index()]
    }

    // ---- variables ----

    pub fn variables(&self) -> &[MethodVariable] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> &MethodVariable {
        &self.variables[id.0 as usize]
    }

    pub fn find_variable(&self, name: &str) -> Option<VarId> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(|i| VarId(i as u16))
    }

    pub fn find_parameter(&self, name: &str) -> Option<VarId> {
        self.variables
            .iter()
            .position(|v| v.is_param && v.name == name)
            .map(|i| VarId(i as u16))
    }

    pub fn parameter_count(&self) -> usize {
        self.variables.iter().filter(|v| v.is_param).count()
    }

    /// Append a parameter after the existing parameters, renumbering every
    /// register operand that pointed at a shifted local.
    pub fn add_parameter(&mut self, name: &str, typ: TypeRef) -> VarId {
        let position = self.parameter_count() as u16;
        self.variables
            .insert(position as usize, MethodVariable::param(name, typ));
        for insn in &mut self.nodes {
            if let Operand::Register(Some(var)) = &mut insn.operand
                && var.0 >= position
            {
                var.0 += 1;
            }
        }
        VarId(position)
    }

    /// Append a local after all existing variables.
    pub fn add_local(&mut self, name: &str, typ: TypeRef) -> VarId {
        self.variables.push(MethodVariable::local(name, typ));
        VarId((self.variables.len() - 1) as u16)
    }

    /// Remove a variable, renumbering register operands past it. Fails
    /// without modifying anything if an instruction still references it.
    pub fn remove_variable(&mut self, id: VarId) -> Result<()> {
        let referenced = self
            .nodes
            .iter()
            .any(|insn| matches!(insn.operand, Operand::Register(Some(var)) if var == id));
        if referenced {
            return Err(Error::VariableInUse);
        }
        self.variables.remove(id.0 as usize);
        for insn in &mut self.nodes {
            if let Operand::Register(Some(var)) = &mut insn.operand
                && var.0 > id.0
            {
                var.0 -= 1;
            }
        }
        Ok(())
    }

    // ---- references ----

    /// True if any jump, switch or try block points at `id`.
    pub fn has_references_to(&self, id: InsnId) -> bool {
        let in_insns = self
            .order
            .iter()
            .any(|x| self.insn(*x).targets().contains(&id));
        let in_table = self
            .error_table
            .blocks
            .iter()
            .any(|block| block.targets().any(|t| t == id));
        in_insns || in_table
    }

    /// Rewrite every reference to `from` (jumps, switches, try blocks) to
    /// point at `to`.
    pub fn retarget_references(&mut self, from: InsnId, to: InsnId) {
        for insn in &mut self.nodes {
            match &mut insn.operand {
                Operand::Jump(target) if *target == from => *target = to,
                Operand::Switch(targets) => {
                    for target in targets {
                        if *target == from {
                            *target = to;
                        }
                    }
                }
                _ => {}
            }
        }
        for block in &mut self.error_table.blocks {
            if block.start == from {
                block.start = to;
            }
            if block.end == from {
                block.end = to;
            }
            for (_, handler) in &mut block.handlers {
                if *handler == from {
                    *handler = to;
                }
            }
            if block.finally == Some(from) {
                block.finally = Some(to);
            }
        }
    }

    // ---- offsets ----

    /// Walk the execution order and assign each instruction its byte offset.
    /// Must run before encoding or reading [`Insn::offset`].
    pub fn recompute_offsets(&mut self) -> Result<()> {
        let mut offset = 0usize;
        for i in 0..self.order.len() {
            let id = self.order[i];
            let size = self.nodes[id.index()].size();
            if offset + size > u16::MAX as usize + 1 {
                return Err(Error::BodyTooLarge(offset + size));
            }
            self.nodes[id.index()].offset = offset as u16;
            offset += size;
        }
        Ok(())
    }

    /// Total encoded size in bytes, from current instruction sizes.
    pub fn byte_len(&self) -> usize {
        self.order.iter().map(|id| self.insn(*id).size()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insn::Insn;

    #[test]
    fn offsets_follow_sizes() {
        let mut body = MethodBody::new(true, false);
        body.push(Insn::load_int(7)); // 3 bytes
        body.push(Insn::nop()); // 1 byte
        let ret = body.push(Insn::ret());
        body.recompute_offsets().unwrap();
        assert_eq!(body.insn(body.id_at(0).unwrap()).offset(), 0);
        assert_eq!(body.insn(body.id_at(1).unwrap()).offset(), 3);
        assert_eq!(body.insn(ret).offset(), 4);
        assert_eq!(body.byte_len(), 5);
    }

    #[test]
    fn add_parameter_renumbers_locals() {
        let mut body = MethodBody::new(true, true);
        let a = body.add_parameter("a", TypeRef::basic("sys", "Int"));
        let tmp = body.add_local("tmp", TypeRef::obj());
        body.push(Insn::load_var(tmp));
        body.push(Insn::load_var(a));

        let b = body.add_parameter("b", TypeRef::basic("sys", "Int"));
        assert_eq!(b, VarId(1));
        assert_eq!(body.find_variable("tmp"), Some(VarId(2)));
        // The ld.var that pointed at tmp moved with it; a stayed put.
        assert_eq!(
            body.insn(body.id_at(0).unwrap()).operand,
            Operand::Register(Some(VarId(2)))
        );
        assert_eq!(
            body.insn(body.id_at(1).unwrap()).operand,
            Operand::Register(Some(VarId(0)))
        );
    }

    #[test]
    fn remove_variable_refuses_while_referenced() {
        let mut body = MethodBody::new(true, true);
        let x = body.add_local("x", TypeRef::obj());
        let y = body.add_local("y", TypeRef::obj());
        body.push(Insn::load_var(y));
        assert!(matches!(
            body.remove_variable(y),
            Err(Error::VariableInUse)
        ));
        body.remove_variable(x).unwrap();
        // y shifted down and the operand followed.
        assert_eq!(
            body.insn(body.id_at(0).unwrap()).operand,
            Operand::Register(Some(VarId(0)))
        );
    }

    #[test]
    fn retarget_rewrites_jumps_and_table() {
        let mut body = MethodBody::new(true, true);
        let first = body.push(Insn::nop());
        let second = body.push(Insn::nop());
        let jmp = body.push(Insn::jump(first));
        body.error_table.blocks.push(crate::TryBlock::new(first, jmp));

        body.retarget_references(first, second);
        assert_eq!(body.insn(jmp).jump_target(), Some(second));
        assert_eq!(body.error_table.blocks[0].start, second);
        assert!(!body.has_references_to(first));
        assert!(body.has_references_to(second));
    }
}
