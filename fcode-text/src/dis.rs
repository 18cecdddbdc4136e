//! Disassembly: label synthesis, operand rendering, and re-assemblable
//! try/catch/finally region rendering.
//!
//! The output is designed to assemble back to the same instruction sequence
//! and error table: marker instructions are folded into block braces, typed
//! handlers print as `catch (name, type) {`, and every jump target gets a
//! synthesized label. Blocks whose markers do not follow the assembler's
//! shapes are left out of the region rendering; their markers print as plain
//! mnemonic lines.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::ops::Range;

use fcode_body::{Insn, InsnId, MethodBody, Operand, VarId};
use fcode_isa::{Opcode, duration};

use crate::decompile::StatementFolder;
use crate::strings;

const INDENT: &str = "    ";

/// Plain disassembly of the whole body.
pub fn disassemble(body: &MethodBody) -> String {
    render(body, false)
}

/// Disassembly with best-effort statement comments folded in.
pub fn disassemble_with_guesses(body: &MethodBody) -> String {
    render(body, true)
}

/// Plain lines for a sub-range of the execution order, with the same labels
/// the full disassembly would use. No region rendering; meant for inspecting
/// an edit site.
pub fn disassemble_range(body: &MethodBody, range: Range<usize>) -> String {
    let labels = synthesize_labels(body);
    let mut out = String::new();
    for &id in body.sequence()[range.start.min(body.len())..range.end.min(body.len())].iter() {
        for line in insn_lines(body, &labels, id, 0) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

/// Name every instruction that needs a label: the first instruction is
/// `start`, return targets count up as `RET0, RET1, ...`, everything else as
/// `L0, L1, ...`, in the order jump sites are scanned.
pub fn synthesize_labels(body: &MethodBody) -> HashMap<InsnId, String> {
    let mut labels = HashMap::new();
    if let Some(&first) = body.sequence().first() {
        labels.insert(first, "start".to_string());
    }
    let mut next_l = 0usize;
    let mut next_ret = 0usize;
    for &id in body.sequence() {
        for &target in body.insn(id).targets() {
            if labels.contains_key(&target) {
                continue;
            }
            let name = if body.insn(target).opcode == Opcode::Return {
                let name = format!("RET{next_ret}");
                next_ret += 1;
                name
            } else {
                let name = format!("L{next_l}");
                next_l += 1;
                name
            };
            labels.insert(target, name);
        }
    }
    labels
}

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    /// Inside the try body.
    Try,
    /// Inside a catch body.
    Catch,
    /// Between a closed catch and whatever follows (another catch, a
    /// finally, or nothing).
    Between,
    /// Inside the finally body.
    Finally,
}

struct Region {
    block: usize,
    phase: Phase,
}

/// A validated, renderable handler entry.
struct HandlerEntry {
    block: usize,
    header: String,
    /// The `st.var` to fold into a typed header.
    skip: Option<InsnId>,
}

fn render(body: &MethodBody, guesses: bool) -> String {
    let labels = synthesize_labels(body);
    let mut folder = guesses.then(|| StatementFolder::new(body.returns_void()));

    // Region maps, built only from blocks the brace syntax can express.
    let mut opens: HashMap<InsnId, Vec<usize>> = HashMap::new();
    let mut handler_at: HashMap<InsnId, HandlerEntry> = HashMap::new();
    let mut finally_at: HashMap<InsnId, usize> = HashMap::new();
    for (index, block) in body.error_table.blocks.iter().enumerate() {
        match renderable_handlers(body, &labels, index) {
            Some(handlers) => {
                opens.entry(block.start).or_default().push(index);
                for (entry, handler) in handlers {
                    handler_at.insert(entry, handler);
                }
                if let Some(finally) = block.finally {
                    finally_at.insert(finally, index);
                }
            }
            None => {
                log::warn!("try block {index} does not fit the block syntax; markers print raw");
            }
        }
    }
    // Widest region opens first at a shared start.
    for starts in opens.values_mut() {
        starts.sort_by_key(|&index| {
            let block = &body.error_table.blocks[index];
            std::cmp::Reverse(body.position_of(block.end).unwrap_or(0))
        });
    }

    let mut out = String::new();
    let mut stack: Vec<Region> = Vec::new();
    let mut skip: HashSet<InsnId> = HashSet::new();

    // Locals declared by typed catch clauses are bound by their headers;
    // everything else needs a `.local` so the text assembles back.
    let catch_bound: HashSet<VarId> = handler_at
        .values()
        .filter_map(|handler| handler.skip)
        .filter_map(|store| match body.insn(store).operand {
            Operand::Register(Some(var)) => Some(var),
            _ => None,
        })
        .collect();
    for (index, var) in body.variables().iter().enumerate() {
        if var.is_param || catch_bound.contains(&VarId(index as u16)) {
            continue;
        }
        let _ = writeln!(out, ".local {}, {}", var.name, var.typ);
    }

    let mut structural = |out: &mut String,
                          folder: &mut Option<StatementFolder>,
                          depth: usize,
                          text: &str| {
        if let Some(folder) = folder
            && let Some(chunk) = folder.end_statement()
        {
            out.push_str(&chunk);
        }
        let _ = writeln!(out, "{}{}", INDENT.repeat(depth), text);
    };

    let positions: Vec<InsnId> = body.sequence().to_vec();
    for &id in &positions {
        if skip.contains(&id) {
            continue;
        }

        // Finished regions (no further clause) unwind silently.
        while let Some(top) = stack.last() {
            if top.phase != Phase::Between {
                break;
            }
            let continues = handler_at.get(&id).is_some_and(|h| h.block == top.block)
                || finally_at.get(&id).is_some_and(|b| *b == top.block);
            if continues {
                break;
            }
            stack.pop();
        }

        if let Some(blocks) = opens.remove(&id) {
            for block in blocks {
                structural(&mut out, &mut folder, stack.len(), "try {");
                stack.push(Region {
                    block,
                    phase: Phase::Try,
                });
            }
        }

        let insn = body.insn(id);

        if let Some(handler) = handler_at.get(&id)
            && stack.last().is_some_and(|top| top.block == handler.block)
        {
            let depth = stack.len() - 1;
            if stack.last().is_some_and(|top| top.phase == Phase::Try) {
                structural(&mut out, &mut folder, depth, "}");
            }
            if let Some(label) = labels.get(&id) {
                structural(&mut out, &mut folder, depth, &format!("{label}:"));
            }
            structural(&mut out, &mut folder, depth, &handler.header);
            if let Some(top) = stack.last_mut() {
                top.phase = Phase::Catch;
            }
            if let Some(folded) = handler.skip {
                skip.insert(folded);
            }
            continue;
        }

        if let Some(&block) = finally_at.get(&id)
            && stack.last().is_some_and(|top| top.block == block)
        {
            let depth = stack.len() - 1;
            if stack.last().is_some_and(|top| top.phase == Phase::Try) {
                structural(&mut out, &mut folder, depth, "}");
            }
            if let Some(label) = labels.get(&id) {
                structural(&mut out, &mut folder, depth, &format!("{label}:"));
            }
            structural(&mut out, &mut folder, depth, "finally {");
            if let Some(top) = stack.last_mut() {
                top.phase = Phase::Finally;
            }
            continue;
        }

        if insn.opcode == Opcode::CatchEnd
            && stack.last().is_some_and(|top| top.phase == Phase::Catch)
        {
            let depth = stack.len() - 1;
            if let Some(label) = labels.get(&id) {
                structural(&mut out, &mut folder, depth, &format!("{label}:"));
            }
            structural(&mut out, &mut folder, depth, "}");
            if let Some(top) = stack.last_mut() {
                top.phase = Phase::Between;
            }
            continue;
        }

        if insn.opcode == Opcode::FinallyEnd
            && stack.last().is_some_and(|top| top.phase == Phase::Finally)
        {
            let depth = stack.len() - 1;
            if let Some(label) = labels.get(&id) {
                structural(&mut out, &mut folder, depth, &format!("{label}:"));
            }
            structural(&mut out, &mut folder, depth, "}");
            stack.pop();
            continue;
        }

        let depth = stack.len();
        let lines = insn_lines(body, &labels, id, depth);
        let chunk = lines.join("\n");
        match &mut folder {
            Some(folder) => {
                if let Some(text) =
                    folder.feed(body, &labels, id, &chunk, &INDENT.repeat(depth))
                {
                    out.push_str(&text);
                }
            }
            None => {
                out.push_str(&chunk);
                out.push('\n');
            }
        }
    }

    if let Some(folder) = &mut folder
        && let Some(chunk) = folder.end_statement()
    {
        out.push_str(&chunk);
    }
    for region in stack {
        if region.phase != Phase::Between {
            log::warn!("try block {} never closed in the instruction stream", region.block);
        }
    }
    out
}

/// Check one try block against the assembler's marker shapes and build its
/// catch headers. `None` if any handler cannot be expressed as block syntax.
fn renderable_handlers(
    body: &MethodBody,
    labels: &HashMap<InsnId, String>,
    index: usize,
) -> Option<Vec<(InsnId, HandlerEntry)>> {
    let block = &body.error_table.blocks[index];
    let start = body.position_of(block.start)?;
    let end = body.position_of(block.end)?;
    if start > end {
        return None;
    }
    if let Some(finally) = block.finally
        && body.insn(finally).opcode != Opcode::FinallyStart
    {
        return None;
    }
    let mut handlers = Vec::new();
    for (typ, entry) in &block.handlers {
        let pos = body.position_of(*entry)?;
        if pos <= end {
            return None;
        }
        let header = match body.insn(*entry).opcode {
            Opcode::CatchAllStart => HandlerEntry {
                block: index,
                header: "catch {".to_string(),
                skip: None,
            },
            Opcode::CatchErrStart => {
                let store = body.id_at(pos + 1)?;
                if body.insn(store).opcode != Opcode::StoreVar || labels.contains_key(&store) {
                    return None;
                }
                let Operand::Register(Some(var)) = body.insn(store).operand else {
                    return None;
                };
                HandlerEntry {
                    block: index,
                    header: format!("catch ({}, {typ}) {{", body.variable(var).name),
                    skip: Some(store),
                }
            }
            _ => return None,
        };
        handlers.push((*entry, header));
    }
    Some(handlers)
}

/// Render one instruction (plus label) as output lines; switch takes
/// several.
fn insn_lines(
    body: &MethodBody,
    labels: &HashMap<InsnId, String>,
    id: InsnId,
    depth: usize,
) -> Vec<String> {
    let insn = body.insn(id);
    let pad = INDENT.repeat(depth);
    let prefix = match labels.get(&id) {
        Some(label) => format!("{pad}{label}: "),
        None => pad.clone(),
    };
    if let Operand::Switch(targets) = &insn.operand {
        let mut lines = vec![format!("{prefix}switch {{")];
        for (case, target) in targets.iter().enumerate() {
            let name = labels
                .get(target)
                .cloned()
                .unwrap_or_else(|| "?".to_string());
            lines.push(format!("{pad}{INDENT}{case} -> {name}"));
        }
        lines.push(format!("{pad}}}"));
        return lines;
    }
    match operand_text(body, labels, insn) {
        Some(operand) => vec![format!("{prefix}{} {operand}", insn.opcode.mnemonic())],
        None => vec![format!("{prefix}{}", insn.opcode.mnemonic())],
    }
}

fn operand_text(
    body: &MethodBody,
    labels: &HashMap<InsnId, String>,
    insn: &Insn,
) -> Option<String> {
    match &insn.operand {
        Operand::None | Operand::Switch(_) => None,
        Operand::Int(v) => Some(v.to_string()),
        Operand::Float(v) => Some(v.to_string()),
        Operand::Decimal(v) => Some(v.clone()),
        Operand::Str(v) | Operand::Uri(v) => Some(strings::quote(v)),
        Operand::Duration(t) => Some(duration::format_ticks(*t)),
        Operand::Type(t) => Some(t.to_string()),
        Operand::TypePair(a, b) => Some(format!("{a}; {b}")),
        Operand::Field(f) => Some(f.to_string()),
        Operand::Method(m) => Some(m.to_string()),
        Operand::Register(None) => Some("this".to_string()),
        Operand::Register(Some(var)) => Some(body.variable(*var).name.clone()),
        Operand::Jump(target) => Some(
            labels
                .get(target)
                .cloned()
                .unwrap_or_else(|| "?".to_string()),
        ),
    }
}
