//! Best-effort statement folding over disassembly lines.
//!
//! The folder shadows the disassembler line by line, simulating the operand
//! stack as expression text. When an instruction ends a statement (a store,
//! a return, a void call on an empty stack, ...) the accumulated raw lines
//! are wrapped in `/* BEGIN: <statement> */ ... /* END */`. Anything it does
//! not understand falls back to the raw lines untouched; the folder never
//! fails and never changes the instruction text itself.
//!
//! Two compiler idioms for null-safety are recognized so they read as source
//! operators instead of branch spaghetti: the `?.` skeleton
//! (`dup; cmp.null; jmp.true SKIP; <access>; jmp NEXT; SKIP: pop;
//! [ld.null]`) marks the receiver with `?`, and the `?:` skeleton
//! (`dup; cmp.null; jmp.true ON_NULL; jmp DONE; ON_NULL: pop; <alt>`)
//! folds to `(a ?: b)` when control reaches the join.

use std::collections::HashMap;

use fcode_body::{InsnId, MethodBody, MethodRef, Operand};
use fcode_isa::Opcode;

use crate::strings;

#[derive(Clone, Copy, PartialEq)]
enum Idiom {
    Idle,
    /// Saw `dup` with a receiver on the stack.
    Dup,
    /// ... then `cmp.null`.
    NullCheck,
    /// ... then `jmp.true`; the next instruction picks the idiom.
    Branch,
    /// Safe-access body; receiver already carries `?`.
    Body,
    /// Saw the jump over the null path.
    AfterJump,
    /// Saw the null path's `pop`; an `ld.null` may follow.
    AfterPop,
    /// Elvis: waiting for the null path's `pop`.
    ElvisExpectPop(InsnId),
    /// Elvis: folding the alternative until the join instruction.
    ElvisAlt(InsnId),
}

pub struct StatementFolder {
    void_method: bool,
    stack: Vec<String>,
    raw: String,
    pad: String,
    idiom: Idiom,
    /// A completed void-call statement held open while a null-safe access
    /// skeleton finishes.
    held: Option<String>,
}

impl StatementFolder {
    pub fn new(void_method: bool) -> StatementFolder {
        StatementFolder {
            void_method,
            stack: Vec::new(),
            raw: String::new(),
            pad: String::new(),
            idiom: Idiom::Idle,
            held: None,
        }
    }

    /// Emit whatever has accumulated, without a statement guess. Called at
    /// block boundaries and end of input.
    pub fn end_statement(&mut self) -> Option<String> {
        self.flush()
    }

    /// Consume one rendered instruction line. Returns text to append to the
    /// output, or `None` while a statement is still accumulating.
    pub fn feed(
        &mut self,
        body: &MethodBody,
        labels: &HashMap<InsnId, String>,
        id: InsnId,
        line: &str,
        pad: &str,
    ) -> Option<String> {
        if self.raw.is_empty() {
            self.pad = pad.to_string();
        }
        self.raw.push_str(line);
        self.raw.push('\n');

        // An elvis fold completes when control reaches the join point.
        if let Idiom::ElvisAlt(join) = self.idiom
            && id == join
        {
            if self.stack.len() < 2 {
                return self.flush();
            }
            let alt = self.stack.pop()?;
            let receiver = self.stack.pop()?;
            self.stack.push(format!("({receiver} ?: {alt})"));
            self.idiom = Idiom::Idle;
        }

        let insn = body.insn(id);
        match (self.idiom, insn.opcode) {
            (Idiom::Idle, _) => {}
            (Idiom::Dup, Opcode::CompareNull) => {
                self.idiom = Idiom::NullCheck;
                return None;
            }
            (Idiom::NullCheck, Opcode::JumpTrue) => {
                self.idiom = Idiom::Branch;
                return None;
            }
            (Idiom::Branch, Opcode::Jump) => {
                let Operand::Jump(join) = insn.operand else {
                    return self.flush();
                };
                self.idiom = Idiom::ElvisExpectPop(join);
                return None;
            }
            (Idiom::Branch, _) => {
                // Safe access: the receiver gets the `?` and the access body
                // folds as usual.
                match self.stack.last_mut() {
                    Some(receiver) => receiver.push('?'),
                    None => return self.flush(),
                }
                self.idiom = Idiom::Body;
            }
            (Idiom::ElvisExpectPop(join), Opcode::Pop) => {
                self.idiom = Idiom::ElvisAlt(join);
                return None;
            }
            (Idiom::Body, Opcode::Jump) => {
                self.idiom = Idiom::AfterJump;
                return None;
            }
            (Idiom::AfterJump, Opcode::Pop) => {
                if let Some(stmt) = self.held.take() {
                    // Void call: the skeleton ends at the pop.
                    return self.comment(stmt);
                }
                self.idiom = Idiom::AfterPop;
                return None;
            }
            (Idiom::AfterPop, Opcode::LoadNull) => {
                self.idiom = Idiom::Idle;
                return None;
            }
            (Idiom::AfterPop, _) => {
                self.idiom = Idiom::Idle;
            }
            (Idiom::Body, _) | (Idiom::ElvisAlt(_), _) => {}
            (_, _) => return self.flush(),
        }

        self.process(body, labels, id)
    }

    /// Ordinary stack simulation for one instruction.
    fn process(
        &mut self,
        body: &MethodBody,
        labels: &HashMap<InsnId, String>,
        id: InsnId,
    ) -> Option<String> {
        let insn = body.insn(id);
        let op = insn.opcode;
        match op {
            Opcode::Nop | Opcode::Coerce => None,
            Opcode::Dup => {
                if self.stack.is_empty() || self.idiom != Idiom::Idle {
                    return self.flush();
                }
                self.idiom = Idiom::Dup;
                None
            }
            Opcode::LoadNull => self.push("null".to_string()),
            Opcode::LoadFalse => self.push("false".to_string()),
            Opcode::LoadTrue => self.push("true".to_string()),
            Opcode::LoadInt => match &insn.operand {
                Operand::Int(v) => self.push(v.to_string()),
                _ => self.flush(),
            },
            Opcode::LoadFloat => match &insn.operand {
                Operand::Float(v) => self.push(v.to_string()),
                _ => self.flush(),
            },
            Opcode::LoadDecimal => match &insn.operand {
                Operand::Decimal(v) => self.push(v.clone()),
                _ => self.flush(),
            },
            Opcode::LoadStr => match &insn.operand {
                Operand::Str(v) => self.push(strings::quote(v)),
                _ => self.flush(),
            },
            Opcode::LoadDuration => match &insn.operand {
                Operand::Duration(t) => self.push(fcode_isa::duration::format_ticks(*t)),
                _ => self.flush(),
            },
            Opcode::LoadUri => match &insn.operand {
                Operand::Uri(v) => self.push(strings::quote(v)),
                _ => self.flush(),
            },
            Opcode::LoadType => match &insn.operand {
                Operand::Type(t) => self.push(t.to_string()),
                _ => self.flush(),
            },
            Opcode::LoadVar => match &insn.operand {
                Operand::Register(None) => self.push("this".to_string()),
                Operand::Register(Some(v)) => self.push(body.variable(*v).name.clone()),
                _ => self.flush(),
            },
            Opcode::LoadInstance => {
                let Operand::Field(field) = &insn.operand else {
                    return self.flush();
                };
                let Some(receiver) = self.stack.pop() else {
                    return self.flush();
                };
                self.push(format!("{receiver}.{}", field.name))
            }
            Opcode::LoadStatic | Opcode::LoadMixinStatic => match &insn.operand {
                Operand::Field(field) => {
                    self.push(format!("{}.{}", field.parent, field.name))
                }
                _ => self.flush(),
            },
            Opcode::StoreVar => {
                let Operand::Register(var) = &insn.operand else {
                    return self.flush();
                };
                let name = match var {
                    None => "this".to_string(),
                    Some(v) => body.variable(*v).name.clone(),
                };
                self.statement_needing(1, |args| format!("{name} = {}", args[0]))
            }
            Opcode::StoreInstance => {
                let Operand::Field(field) = &insn.operand else {
                    return self.flush();
                };
                let name = field.name.clone();
                self.statement_needing(2, |args| format!("{}.{name} = {}", args[0], args[1]))
            }
            Opcode::StoreStatic | Opcode::StoreMixinStatic => {
                let Operand::Field(field) = &insn.operand else {
                    return self.flush();
                };
                let target = format!("{}.{}", field.parent, field.name);
                self.statement_needing(1, |args| format!("{target} = {}", args[0]))
            }
            Opcode::CallNew
            | Opcode::CallCtor
            | Opcode::CallStatic
            | Opcode::CallVirtual
            | Opcode::CallNonVirtual
            | Opcode::CallMixinStatic
            | Opcode::CallMixinVirtual
            | Opcode::CallMixinNonVirtual => self.call(op, &insn.operand),
            Opcode::CompareEq => self.binary("=="),
            Opcode::CompareNe => self.binary("!="),
            Opcode::Compare => self.binary("<=>"),
            Opcode::CompareLt => self.binary("<"),
            Opcode::CompareLe => self.binary("<="),
            Opcode::CompareGt => self.binary(">"),
            Opcode::CompareGe => self.binary(">="),
            Opcode::CompareSame => self.binary("==="),
            Opcode::CompareNotSame => self.binary("!=="),
            Opcode::CompareNull => self.unary_suffix(" == null"),
            Opcode::CompareNotNull => self.unary_suffix(" != null"),
            Opcode::Is => match &insn.operand {
                Operand::Type(t) => self.unary_suffix(&format!(" is {t}")),
                _ => self.flush(),
            },
            Opcode::As => match &insn.operand {
                Operand::Type(t) => self.unary_suffix(&format!(" as {t}")),
                _ => self.flush(),
            },
            Opcode::Return => {
                if self.void_method {
                    if self.stack.is_empty() {
                        self.comment("return".to_string())
                    } else {
                        self.flush()
                    }
                } else {
                    self.statement_needing(1, |args| format!("return {}", args[0]))
                }
            }
            Opcode::Jump => {
                // A jump straight to a return is a return.
                let Operand::Jump(target) = insn.operand else {
                    return self.flush();
                };
                if body.insn(target).opcode != Opcode::Return {
                    return self.flush();
                }
                match self.stack.len() {
                    0 => self.comment("return".to_string()),
                    1 => self.statement_needing(1, |args| format!("return {}", args[0])),
                    _ => self.flush(),
                }
            }
            Opcode::JumpTrue | Opcode::JumpFalse => {
                let Operand::Jump(target) = insn.operand else {
                    return self.flush();
                };
                let label = match labels.get(&target) {
                    Some(l) => l.clone(),
                    None => return self.flush(),
                };
                let negate = if op == Opcode::JumpFalse { "!" } else { "" };
                self.statement_needing(1, |args| {
                    format!("if ({negate}{}) jump {label}", args[0])
                })
            }
            Opcode::Switch => {
                self.statement_needing(1, |args| format!("switch ({})", args[0]))
            }
            Opcode::Pop => self.statement_needing(1, |args| args[0].clone()),
            Opcode::Throw => self.statement_needing(1, |args| format!("throw {}", args[0])),
            _ => self.flush(),
        }
    }

    fn call(&mut self, op: Opcode, operand: &Operand) -> Option<String> {
        let Operand::Method(method) = operand else {
            return self.flush();
        };
        let has_receiver = matches!(
            op,
            Opcode::CallCtor
                | Opcode::CallVirtual
                | Opcode::CallNonVirtual
                | Opcode::CallMixinVirtual
                | Opcode::CallMixinNonVirtual
        );
        let argc = method.params.len();
        let needed = argc + usize::from(has_receiver);
        if self.stack.len() < needed {
            return self.flush();
        }
        let args: Vec<String> = self.stack.split_off(self.stack.len() - argc);
        let text = if has_receiver {
            let receiver = self.stack.pop()?;
            render_call(&receiver, method, &args)
        } else {
            render_call(&method.parent.to_string(), method, &args)
        };
        if !method.returns_void() {
            return self.push(text);
        }
        if self.idiom != Idiom::Idle {
            self.held = Some(text);
            return None;
        }
        if self.stack.is_empty() {
            self.comment(text)
        } else {
            self.flush()
        }
    }

    fn binary(&mut self, operator: &str) -> Option<String> {
        if self.stack.len() < 2 {
            return self.flush();
        }
        let rhs = self.stack.pop()?;
        let lhs = self.stack.pop()?;
        self.push(format!("({lhs} {operator} {rhs})"))
    }

    fn unary_suffix(&mut self, suffix: &str) -> Option<String> {
        match self.stack.pop() {
            Some(value) => self.push(format!("({value}{suffix})")),
            None => self.flush(),
        }
    }

    fn push(&mut self, text: String) -> Option<String> {
        self.stack.push(text);
        None
    }

    /// Complete a statement built from exactly `count` stacked expressions,
    /// or fall back when the stack depth disagrees.
    fn statement_needing(
        &mut self,
        count: usize,
        build: impl FnOnce(&[String]) -> String,
    ) -> Option<String> {
        if self.stack.len() != count {
            return self.flush();
        }
        let args = std::mem::take(&mut self.stack);
        let stmt = build(&args);
        self.comment(stmt)
    }

    fn comment(&mut self, statement: String) -> Option<String> {
        let raw = std::mem::take(&mut self.raw);
        let pad = std::mem::take(&mut self.pad);
        self.reset();
        Some(format!(
            "{pad}/* BEGIN: {statement} */\n{raw}{pad}/* END */\n"
        ))
    }

    fn flush(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.raw);
        self.pad.clear();
        self.reset();
        if raw.is_empty() { None } else { Some(raw) }
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.idiom = Idiom::Idle;
        self.held = None;
    }
}

fn render_call(receiver: &str, method: &MethodRef, args: &[String]) -> String {
    format!("{receiver}.{}({})", method.name, args.join(", "))
}
