//! The fcode assembler.
//!
//! Line grammar:
//!
//! ```text
//! .local name, sys::Type          declare a local
//! label: ld.int 4                 labels prefix instructions and stack
//! jmp label                       jumps name labels; `$FIN` is pre-bound
//! switch {                        cases count up from 0
//!     0 -> first
//!     1 -> second
//! }
//! try {                           regions nest; catch/finally follow the
//!     call.static ...             closing brace of their try
//! } catch (e, sys::IOErr) {
//!     ...
//! } finally {
//!     ...
//! }
//! ```
//!
//! `/* ... */` comments are stripped per line, string literals excepted.
//! Typed catch clauses declare their binding as a fresh local and expand to
//! `catch.err` + `st.var`; block braces expand to the marker instructions,
//! so assembling the disassembler's output reproduces the instruction
//! sequence exactly.

use std::collections::HashMap;

use fcode_body::{
    FieldRef, Insn, InsnId, MethodBody, MethodRef, Operand, TryBlock, TypeRef, VarId,
};
use fcode_isa::{Opcode, OperandSig, duration};

use crate::error::{AsmError, Result};
use crate::strings;

/// What a fragment assembly produced: arena nodes in textual order (not yet
/// in any execution order) and the locals the text declared.
#[derive(Debug)]
pub struct Fragment {
    pub insns: Vec<InsnId>,
    pub new_locals: Vec<VarId>,
}

/// Assemble `text` and append the instructions to the end of the body's
/// execution order. Try blocks and locals land in the body as a side effect;
/// on error the execution order is untouched.
pub fn assemble(body: &mut MethodBody, text: &str) -> Result<Fragment> {
    let fragment = assemble_fragment(body, text, None)?;
    let base = body.len();
    for (i, &id) in fragment.insns.iter().enumerate() {
        body.insert(base + i, id);
    }
    Ok(fragment)
}

/// Assemble `text` into arena nodes without splicing them anywhere, for
/// callers that position the result themselves (the cursor). When `finish`
/// is given, the label `$FIN` resolves to it, and labels left trailing at
/// the end of the text bind to it too, letting a fragment jump to an
/// existing instruction.
pub fn assemble_fragment(
    body: &mut MethodBody,
    text: &str,
    finish: Option<InsnId>,
) -> Result<Fragment> {
    let mut asm = Assembler {
        body,
        insns: Vec::new(),
        labels: HashMap::new(),
        pending: HashMap::new(),
        deferred: Vec::new(),
        open: Vec::new(),
        partial: Vec::new(),
        last_block: None,
        staged_locals: Vec::new(),
        finish,
    };
    if let Some(finish) = finish {
        asm.labels.insert("$FIN".to_string(), finish);
    }
    asm.run(text)?;
    asm.finish()
}

/// A jump or switch-case operand waiting for its label.
struct PendingRef {
    insn: InsnId,
    case: Option<usize>,
}

/// Work bound to the next appended instruction.
enum Deferred {
    Label(String),
    TryStart(usize),
}

#[derive(Clone, Copy)]
enum BlockKind {
    Try,
    Catch,
    Finally,
}

#[derive(Default)]
struct PartialBlock {
    start: Option<InsnId>,
    end: Option<InsnId>,
    handlers: Vec<(TypeRef, InsnId)>,
    finally: Option<InsnId>,
}

struct Assembler<'a> {
    body: &'a mut MethodBody,
    insns: Vec<InsnId>,
    labels: HashMap<String, InsnId>,
    pending: HashMap<String, Vec<PendingRef>>,
    deferred: Vec<Deferred>,
    /// Open block stack; the index points into `partial`.
    open: Vec<(BlockKind, usize)>,
    partial: Vec<PartialBlock>,
    /// The block a `catch`/`finally` clause attaches to: the last one whose
    /// brace closed.
    last_block: Option<usize>,
    /// Locals declared by the text, committed to the body only on success.
    staged_locals: Vec<(String, TypeRef)>,
    finish: Option<InsnId>,
}

impl Assembler<'_> {
    fn run(&mut self, text: &str) -> Result<()> {
        let lines: Vec<String> = text
            .lines()
            .map(strings::strip_comments)
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        let mut i = 0;
        while i < lines.len() {
            let line = &lines[i];
            let mut rest = line.as_str();
            while let Some((name, tail)) = take_label(rest) {
                self.deferred.push(Deferred::Label(name.to_string()));
                rest = tail;
            }
            let rest = rest.trim();
            if rest.is_empty() {
                i += 1;
                continue;
            }
            let (op, params) = split_op(rest);
            match op {
                ".local" => self.local_decl(params, line)?,
                "try" => {
                    expect_open_brace(params, line)?;
                    let idx = self.partial.len();
                    self.partial.push(PartialBlock::default());
                    self.deferred.push(Deferred::TryStart(idx));
                    self.open.push((BlockKind::Try, idx));
                }
                "}" => {
                    self.close_block(line)?;
                    // A clause can share the closing brace's line:
                    // `} catch {`, `} catch (e, T) {`, `} finally {`.
                    let mut rest = params;
                    while !rest.is_empty() {
                        let (op, tail) = split_op(rest);
                        match op {
                            "catch" => {
                                self.open_catch(tail, line)?;
                                rest = "";
                            }
                            "finally" => {
                                self.open_finally(tail, line)?;
                                rest = "";
                            }
                            "}" => {
                                self.close_block(line)?;
                                rest = tail;
                            }
                            _ => {
                                return Err(AsmError::MalformedOperand {
                                    line: line.to_string(),
                                    reason: "expected `catch`, `finally` or `}` after `}`"
                                        .to_string(),
                                });
                            }
                        }
                    }
                }
                "catch" => self.open_catch(params, line)?,
                "finally" => self.open_finally(params, line)?,
                "switch" => {
                    i = self.switch_block(params, &lines, i, line)?;
                    continue;
                }
                _ => self.instruction(op, params, line)?,
            }
            i += 1;
        }
        Ok(())
    }

    fn append(&mut self, insn: Insn) -> Result<InsnId> {
        let id = self.body.alloc(insn);
        for deferred in std::mem::take(&mut self.deferred) {
            match deferred {
                Deferred::Label(name) => self.define_label(name, id)?,
                Deferred::TryStart(idx) => self.partial[idx].start = Some(id),
            }
        }
        self.insns.push(id);
        Ok(id)
    }

    fn define_label(&mut self, name: String, id: InsnId) -> Result<()> {
        if self.labels.contains_key(&name) {
            return Err(AsmError::DuplicateLabel { name });
        }
        if let Some(refs) = self.pending.remove(&name) {
            for pending in refs {
                patch(self.body, &pending, id);
            }
        }
        self.labels.insert(name, id);
        Ok(())
    }

    fn pend(&mut self, name: &str, insn: InsnId, case: Option<usize>) {
        let pending = PendingRef { insn, case };
        match self.labels.get(name) {
            Some(&target) => patch(self.body, &pending, target),
            None => self
                .pending
                .entry(name.to_string())
                .or_default()
                .push(pending),
        }
    }

    fn local_decl(&mut self, params: &str, line: &str) -> Result<()> {
        let (name, typ) = params.split_once(',').ok_or_else(|| AsmError::MalformedOperand {
            line: line.to_string(),
            reason: "expected `.local name, type`".to_string(),
        })?;
        let typ = TypeRef::parse(typ.trim())?;
        self.declare_local(name.trim(), typ, line)?;
        Ok(())
    }

    /// Stage a local declaration, reserving the register index it will get
    /// when the assembly succeeds and commits it to the body.
    fn declare_local(&mut self, name: &str, typ: TypeRef, line: &str) -> Result<VarId> {
        if self.lookup_variable(name).is_some() {
            return Err(AsmError::DuplicateVariable {
                name: name.to_string(),
                line: line.to_string(),
            });
        }
        let id = VarId((self.body.variables().len() + self.staged_locals.len()) as u16);
        self.staged_locals.push((name.to_string(), typ));
        Ok(id)
    }

    fn lookup_variable(&self, name: &str) -> Option<VarId> {
        self.body.find_variable(name).or_else(|| {
            self.staged_locals
                .iter()
                .position(|(n, _)| n == name)
                .map(|i| VarId((self.body.variables().len() + i) as u16))
        })
    }

    fn close_block(&mut self, line: &str) -> Result<()> {
        let (kind, idx) = self.open.pop().ok_or_else(|| AsmError::UnmatchedClose {
            line: line.to_string(),
        })?;
        match kind {
            BlockKind::Try => {
                if self.partial[idx].start.is_none() {
                    return Err(AsmError::EmptyTry);
                }
                // The last appended instruction is the last one inside the
                // region.
                self.partial[idx].end = self.insns.last().copied();
            }
            BlockKind::Catch => {
                self.append(Insn::catch_end())?;
            }
            BlockKind::Finally => {
                self.append(Insn::finally_end())?;
            }
        }
        self.last_block = Some(idx);
        Ok(())
    }

    fn open_catch(&mut self, params: &str, line: &str) -> Result<()> {
        let idx = self.last_block.ok_or_else(|| AsmError::MisplacedHandler {
            clause: "catch",
            line: line.to_string(),
        })?;
        if params == "{" {
            let entry = self.append(Insn::catch_all_start())?;
            self.partial[idx].handlers.push((TypeRef::err(), entry));
        } else {
            let malformed = || AsmError::MalformedOperand {
                line: line.to_string(),
                reason: "expected `catch (name, type) {`".to_string(),
            };
            let inner = params.strip_prefix('(').ok_or_else(malformed)?;
            let close = inner.find(')').ok_or_else(malformed)?;
            if inner[close + 1..].trim() != "{" {
                return Err(malformed());
            }
            let (name, typ) = inner[..close].split_once(',').ok_or_else(malformed)?;
            let typ = TypeRef::parse(typ.trim())?;
            let var = self.declare_local(name.trim(), typ.clone(), line)?;
            let entry = self.append(Insn::catch_err_start(typ.clone()))?;
            self.append(Insn::store_var(var))?;
            self.partial[idx].handlers.push((typ, entry));
        }
        self.open.push((BlockKind::Catch, idx));
        Ok(())
    }

    fn open_finally(&mut self, params: &str, line: &str) -> Result<()> {
        let idx = self.last_block.ok_or_else(|| AsmError::MisplacedHandler {
            clause: "finally",
            line: line.to_string(),
        })?;
        expect_open_brace(params, line)?;
        let entry = self.append(Insn::finally_start())?;
        self.partial[idx].finally = Some(entry);
        self.open.push((BlockKind::Finally, idx));
        Ok(())
    }

    /// Consume the case lines after `switch {` and return the index of the
    /// line after the closing brace.
    fn switch_block(
        &mut self,
        params: &str,
        lines: &[String],
        at: usize,
        line: &str,
    ) -> Result<usize> {
        expect_open_brace(params, line)?;
        let id = self.append(Insn::switch(Vec::new()))?;
        let mut case = 0usize;
        let mut i = at + 1;
        loop {
            let case_line = lines.get(i).ok_or(AsmError::UnclosedSwitch)?;
            if case_line == "}" {
                break;
            }
            let (num, label) =
                case_line
                    .split_once("->")
                    .ok_or_else(|| AsmError::MalformedOperand {
                        line: case_line.clone(),
                        reason: "expected `case -> label`".to_string(),
                    })?;
            let num: usize = num.trim().parse().map_err(|_| AsmError::MalformedOperand {
                line: case_line.clone(),
                reason: "case index is not a number".to_string(),
            })?;
            if num != case {
                return Err(AsmError::SwitchCaseOrder {
                    line: case_line.clone(),
                });
            }
            if let Operand::Switch(targets) = &mut self.body.insn_mut(id).operand {
                // Self-reference until the label resolves.
                targets.push(id);
            }
            self.pend(label.trim(), id, Some(case));
            case += 1;
            i += 1;
        }
        Ok(i + 1)
    }

    fn instruction(&mut self, op: &str, params: &str, line: &str) -> Result<()> {
        let opcode = Opcode::from_mnemonic(op).ok_or_else(|| AsmError::UnknownMnemonic {
            mnemonic: op.to_string(),
            line: line.to_string(),
        })?;
        let malformed = |reason: &str| AsmError::MalformedOperand {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        if opcode.signature() == OperandSig::Jump {
            let name = need(params, line)?.to_string();
            // Target is the instruction itself until the label resolves.
            let id = self.append(Insn::new(opcode, Operand::None))?;
            self.body.insn_mut(id).operand = Operand::Jump(id);
            self.pend(&name, id, None);
            return Ok(());
        }

        let operand = match opcode.signature() {
            OperandSig::None => Operand::None,
            OperandSig::Integer => Operand::Int(
                need(params, line)?
                    .replace('_', "")
                    .parse()
                    .map_err(|_| malformed("invalid integer literal"))?,
            ),
            OperandSig::Float => Operand::Float(
                need(params, line)?
                    .replace('_', "")
                    .parse()
                    .map_err(|_| malformed("invalid float literal"))?,
            ),
            OperandSig::Decimal => Operand::Decimal(need(params, line)?.to_string()),
            OperandSig::Str => Operand::Str(
                strings::unquote(need(params, line)?).ok_or_else(|| malformed("invalid string literal"))?,
            ),
            OperandSig::Uri => Operand::Uri(
                strings::unquote(need(params, line)?).ok_or_else(|| malformed("invalid uri literal"))?,
            ),
            OperandSig::Duration => Operand::Duration(
                duration::parse_ticks(need(params, line)?)
                    .map_err(|e| malformed(&e.to_string()))?,
            ),
            OperandSig::Type => Operand::Type(TypeRef::parse(need(params, line)?)?),
            OperandSig::TypePair => {
                let (a, b) = need(params, line)?
                    .split_once(';')
                    .ok_or_else(|| malformed("expected two types separated by `;`"))?;
                Operand::TypePair(TypeRef::parse(a.trim())?, TypeRef::parse(b.trim())?)
            }
            OperandSig::Field => Operand::Field(FieldRef::parse(need(params, line)?)?),
            OperandSig::Method => Operand::Method(MethodRef::parse(need(params, line)?)?),
            OperandSig::Register => {
                let name = need(params, line)?;
                if name == "this" {
                    Operand::Register(None)
                } else {
                    let var = self.lookup_variable(name).ok_or_else(|| {
                        AsmError::UnknownVariable {
                            name: name.to_string(),
                            line: line.to_string(),
                        }
                    })?;
                    Operand::Register(Some(var))
                }
            }
            OperandSig::Jump | OperandSig::Switch => unreachable!("handled above"),
        };
        self.append(Insn::new(opcode, operand))?;
        Ok(())
    }

    fn finish(mut self) -> Result<Fragment> {
        match self.finish {
            // Deferred work left at the end of the text binds to the
            // continuation instruction, so `jmp done ... done:` can name the
            // instruction the fragment is spliced ahead of.
            Some(fin) => {
                for deferred in std::mem::take(&mut self.deferred) {
                    match deferred {
                        Deferred::Label(name) => self.define_label(name, fin)?,
                        Deferred::TryStart(idx) => self.partial[idx].start = Some(fin),
                    }
                }
            }
            None => {
                for deferred in &self.deferred {
                    if let Deferred::Label(name) = deferred {
                        return Err(AsmError::TrailingLabel { name: name.clone() });
                    }
                }
            }
        }
        if !self.open.is_empty() {
            return Err(AsmError::UnclosedBlocks {
                count: self.open.len(),
            });
        }
        if let Some(name) = self.pending.keys().next() {
            return Err(AsmError::UnresolvedLabel { name: name.clone() });
        }
        let mut blocks = Vec::with_capacity(self.partial.len());
        for partial in std::mem::take(&mut self.partial) {
            let (Some(start), Some(end)) = (partial.start, partial.end) else {
                return Err(AsmError::EmptyTry);
            };
            let mut block = TryBlock::new(start, end);
            block.handlers = partial.handlers;
            block.finally = partial.finally;
            blocks.push(block);
        }
        // All checks passed; commit locals and try blocks to the body.
        let mut new_locals = Vec::with_capacity(self.staged_locals.len());
        for (name, typ) in std::mem::take(&mut self.staged_locals) {
            new_locals.push(self.body.add_local(&name, typ));
        }
        self.body.error_table.blocks.extend(blocks);
        Ok(Fragment {
            insns: self.insns,
            new_locals,
        })
    }
}

fn patch(body: &mut MethodBody, pending: &PendingRef, target: InsnId) {
    match (&mut body.insn_mut(pending.insn).operand, pending.case) {
        (Operand::Jump(slot), None) => *slot = target,
        (Operand::Switch(targets), Some(case)) => targets[case] = target,
        _ => unreachable!("pending reference does not match operand shape"),
    }
}

fn split_op(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((op, params)) => (op, params.trim()),
        None => (line, ""),
    }
}

/// The operand text, or [`AsmError::MissingOperand`] when there is none.
fn need<'a>(params: &'a str, line: &str) -> Result<&'a str> {
    if params.is_empty() {
        Err(AsmError::MissingOperand {
            line: line.to_string(),
        })
    } else {
        Ok(params)
    }
}

fn expect_open_brace(params: &str, line: &str) -> Result<()> {
    if params == "{" {
        Ok(())
    } else {
        Err(AsmError::MalformedOperand {
            line: line.to_string(),
            reason: "expected `{`".to_string(),
        })
    }
}

/// Split a leading `name:` label off a line; `::` is never a label.
fn take_label(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    let end = line
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(line.len());
    if end == 0 {
        return None;
    }
    let tail = &line[end..];
    if tail.starts_with(':') && !tail.starts_with("::") {
        Some((&line[..end], &tail[1..]))
    } else {
        None
    }
}
