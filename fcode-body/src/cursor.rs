//! Position-based structural editing of a method body.

use crate::body::MethodBody;
use crate::error::{Error, Result};
use crate::insn::{Insn, InsnId};

/// Where [`Cursor::seek`] leaves the cursor relative to the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekMode {
    Before,
    After,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
}

/// What [`Cursor::remove`] does when other instructions or try blocks still
/// point at the removed instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveRetarget {
    /// Refuse, leaving the body untouched.
    Fail,
    /// Repoint them at the following instruction.
    ToNext,
}

/// What [`Cursor::insert`] does with references to the instruction the
/// cursor is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertRetarget {
    /// Jumps to the current instruction keep their target; the insertion is
    /// skipped by anything that branches there.
    KeepTarget,
    /// Jumps to the current instruction are repointed at the inserted one,
    /// putting the insertion on every path that branched there.
    ToInserted,
}

/// An editing position within a body's execution order. Holds the body
/// mutably; offsets are not maintained during editing.
pub struct Cursor<'a> {
    body: &'a mut MethodBody,
    pos: usize,
}

impl MethodBody {
    pub fn cursor(&mut self) -> Cursor<'_> {
        Cursor { body: self, pos: 0 }
    }
}

impl<'a> Cursor<'a> {
    pub fn body(&mut self) -> &mut MethodBody {
        self.body
    }

    pub fn index(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.body.len()
    }

    /// The instruction under the cursor, unless the cursor is past the end.
    pub fn current(&self) -> Option<InsnId> {
        self.body.id_at(self.pos)
    }

    pub fn insn(&self) -> Option<&Insn> {
        self.current().map(|id| self.body.insn(id))
    }

    pub fn advance(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.body.len());
    }

    /// Move to the first instruction matching `predicate`, scanning from the
    /// current position (inclusive) in `direction`. `mode` decides whether
    /// the cursor lands on the match or just past it.
    pub fn seek(
        &mut self,
        mode: SeekMode,
        direction: SeekDirection,
        predicate: impl Fn(&Insn) -> bool,
    ) -> Result<()> {
        let found = match direction {
            SeekDirection::Forward => (self.pos..self.body.len())
                .find(|&i| predicate(self.body.insn(self.body.sequence()[i]))),
            SeekDirection::Backward => (0..=self.pos.min(self.body.len().saturating_sub(1)))
                .rev()
                .find(|&i| {
                    !self.body.is_empty() && predicate(self.body.insn(self.body.sequence()[i]))
                }),
        };
        match found {
            Some(i) => {
                self.pos = match mode {
                    SeekMode::Before => i,
                    SeekMode::After => i + 1,
                };
                Ok(())
            }
            None => Err(Error::SeekFailed),
        }
    }

    /// Swap the current instruction for a new one. Everything that pointed
    /// at the old instruction points at the replacement.
    pub fn replace(&mut self, insn: Insn) -> Result<InsnId> {
        let old = self.current().ok_or(Error::CursorAtEnd)?;
        let new = self.body.alloc(insn);
        self.body.retarget_references(old, new);
        self.body.remove(self.pos);
        self.body.insert(self.pos, new);
        Ok(new)
    }

    /// Remove the current instruction. With [`RemoveRetarget::Fail`] the body
    /// is left unmodified if anything still references it; with
    /// [`RemoveRetarget::ToNext`] references move to the next instruction,
    /// failing only when there is none.
    pub fn remove(&mut self, retarget: RemoveRetarget) -> Result<InsnId> {
        let old = self.current().ok_or(Error::CursorAtEnd)?;
        if self.body.has_references_to(old) {
            match retarget {
                RemoveRetarget::Fail => return Err(Error::DanglingReference),
                RemoveRetarget::ToNext => {
                    let next = self
                        .body
                        .id_at(self.pos + 1)
                        .ok_or(Error::DanglingReference)?;
                    self.body.retarget_references(old, next);
                }
            }
        }
        self.body.remove(self.pos);
        Ok(old)
    }

    /// Insert an instruction ahead of the current one (append when past the
    /// end). With `advance` the cursor keeps pointing at the instruction it
    /// was on; without it the cursor lands on the inserted instruction.
    pub fn insert(&mut self, insn: Insn, advance: bool, retarget: InsertRetarget) -> InsnId {
        let new = self.body.alloc(insn);
        if retarget == InsertRetarget::ToInserted
            && let Some(current) = self.current()
        {
            self.body.retarget_references(current, new);
        }
        self.body.insert(self.pos, new);
        if advance {
            self.pos += 1;
        }
        new
    }

    /// Insert a sequence ahead of the current instruction. With
    /// [`InsertRetarget::ToInserted`], references to the current instruction
    /// land on the first inserted one; without `advance` the cursor lands
    /// there too.
    pub fn insert_all(
        &mut self,
        insns: impl IntoIterator<Item = Insn>,
        advance: bool,
        retarget: InsertRetarget,
    ) -> Vec<InsnId> {
        let mut ids = Vec::new();
        let mut retarget = retarget;
        for insn in insns {
            ids.push(self.insert(insn, true, retarget));
            retarget = InsertRetarget::KeepTarget;
        }
        if !advance {
            self.pos -= ids.len();
        }
        ids
    }

    /// Place already-allocated nodes ahead of the current instruction, used
    /// when a caller has built a fragment against this body's arena.
    pub fn splice(&mut self, ids: &[InsnId], retarget: InsertRetarget) {
        if retarget == InsertRetarget::ToInserted
            && let (Some(first), Some(current)) = (ids.first(), self.current())
        {
            self.body.retarget_references(current, *first);
        }
        for &id in ids {
            self.body.insert(self.pos, id);
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insn::Operand;
    use crate::refs::TypeRef;
    use fcode_isa::Opcode;

    fn jump_body() -> (MethodBody, InsnId, InsnId) {
        // 0: ld.true  1: jmp.true -> 3  2: nop  3: ret
        let mut body = MethodBody::new(true, false);
        body.push(Insn::load_true());
        let nop = body.alloc(Insn::nop());
        let ret = body.alloc(Insn::ret());
        body.push(Insn::jump_true(ret));
        let pos = body.len();
        body.insert(pos, nop);
        body.insert(pos + 1, ret);
        (body, nop, ret)
    }

    #[test]
    fn seek_lands_before_and_after() {
        let (mut body, _, _) = jump_body();
        let mut cursor = body.cursor();
        cursor
            .seek(SeekMode::Before, SeekDirection::Forward, |i| {
                i.opcode == Opcode::Nop
            })
            .unwrap();
        assert_eq!(cursor.index(), 2);
        cursor
            .seek(SeekMode::After, SeekDirection::Forward, |i| {
                i.opcode == Opcode::Nop
            })
            .unwrap();
        assert_eq!(cursor.index(), 3);
        cursor
            .seek(SeekMode::Before, SeekDirection::Backward, |i| {
                i.opcode == Opcode::LoadTrue
            })
            .unwrap();
        assert_eq!(cursor.index(), 0);
        assert!(matches!(
            cursor.seek(SeekMode::Before, SeekDirection::Backward, |i| {
                i.opcode == Opcode::Throw
            }),
            Err(Error::SeekFailed)
        ));
    }

    #[test]
    fn replace_retargets_jumps() {
        let (mut body, _, ret) = jump_body();
        let mut cursor = body.cursor();
        cursor
            .seek(SeekMode::Before, SeekDirection::Forward, |i| {
                i.opcode == Opcode::Return
            })
            .unwrap();
        let new_ret = cursor.replace(Insn::throw()).unwrap();
        assert_ne!(new_ret, ret);
        let jump = body.id_at(1).unwrap();
        assert_eq!(body.insn(jump).jump_target(), Some(new_ret));
        assert!(!body.has_references_to(ret));
    }

    #[test]
    fn remove_fail_policy_leaves_body_intact() {
        let (mut body, _, _) = jump_body();
        let before: Vec<_> = body.sequence().to_vec();
        let mut cursor = body.cursor();
        cursor
            .seek(SeekMode::Before, SeekDirection::Forward, |i| {
                i.opcode == Opcode::Return
            })
            .unwrap();
        assert!(matches!(
            cursor.remove(RemoveRetarget::Fail),
            Err(Error::DanglingReference)
        ));
        assert_eq!(body.sequence(), &before[..]);
    }

    #[test]
    fn remove_retargets_to_next() {
        // 0: ld.true  1: jmp.true -> 2  2: nop  3: ret
        let mut body = MethodBody::new(true, false);
        body.push(Insn::load_true());
        let nop = body.alloc(Insn::nop());
        body.push(Insn::jump_true(nop));
        let pos = body.len();
        body.insert(pos, nop);
        let ret = body.push(Insn::ret());

        let mut cursor = body.cursor();
        cursor
            .seek(SeekMode::Before, SeekDirection::Forward, |i| {
                i.opcode == Opcode::Nop
            })
            .unwrap();
        cursor.remove(RemoveRetarget::ToNext).unwrap();
        let jump = body.id_at(1).unwrap();
        assert_eq!(body.insn(jump).jump_target(), Some(ret));
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn insert_retarget_modes() {
        let (mut body, nop, _) = jump_body();
        // Point the jump at nop so insertion ahead of nop is observable.
        let jump = body.id_at(1).unwrap();
        body.insn_mut(jump).operand = Operand::Jump(nop);

        let mut cursor = body.cursor();
        cursor
            .seek(SeekMode::Before, SeekDirection::Forward, |i| {
                i.opcode == Opcode::Nop
            })
            .unwrap();
        cursor.insert(
            Insn::pop(TypeRef::obj()),
            true,
            InsertRetarget::KeepTarget,
        );
        assert_eq!(body.insn(jump).jump_target(), Some(nop));

        let mut cursor = body.cursor();
        cursor
            .seek(SeekMode::Before, SeekDirection::Forward, |i| {
                i.opcode == Opcode::Nop
            })
            .unwrap();
        let inserted = cursor.insert(Insn::pop(TypeRef::obj()), true, InsertRetarget::ToInserted);
        // Cursor still sits on the nop it was at.
        assert_eq!(cursor.insn().map(|i| i.opcode), Some(Opcode::Nop));
        assert_eq!(body.insn(jump).jump_target(), Some(inserted));
    }

    #[test]
    fn insert_without_advancing_lands_on_the_inserted_instruction() {
        let (mut body, _, _) = jump_body();
        let mut cursor = body.cursor();
        cursor
            .seek(SeekMode::Before, SeekDirection::Forward, |i| {
                i.opcode == Opcode::Nop
            })
            .unwrap();
        let inserted = cursor.insert(Insn::throw(), false, InsertRetarget::KeepTarget);
        assert_eq!(cursor.current(), Some(inserted));
        assert_eq!(cursor.insn().map(|i| i.opcode), Some(Opcode::Throw));

        let ids = cursor.insert_all(
            [Insn::nop(), Insn::nop()],
            false,
            InsertRetarget::KeepTarget,
        );
        assert_eq!(cursor.current(), Some(ids[0]));
    }
}
