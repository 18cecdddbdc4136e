//! Assembly splicing at a cursor position.

use fcode_body::{Cursor, InsertRetarget};

use crate::asm::{self, Fragment};
use crate::error::Result;

/// Assemble text straight into a cursor position.
pub trait CursorAsmExt {
    /// Assemble `text` and insert the instructions ahead of the current one.
    /// Inside the fragment, `$FIN` labels the instruction the cursor is on,
    /// so spliced code can jump past itself. Retargeting applies as in
    /// [`Cursor::insert`]: with [`InsertRetarget::ToInserted`], jumps to the
    /// current instruction land on the fragment's first instruction instead.
    ///
    /// On error nothing is spliced and the execution order is unchanged.
    fn insert_assembly(&mut self, text: &str, retarget: InsertRetarget) -> Result<Fragment>;
}

impl CursorAsmExt for Cursor<'_> {
    fn insert_assembly(&mut self, text: &str, retarget: InsertRetarget) -> Result<Fragment> {
        let finish = self.current();
        let fragment = asm::assemble_fragment(self.body(), text, finish)?;
        self.splice(&fragment.insns, retarget);
        Ok(fragment)
    }
}
