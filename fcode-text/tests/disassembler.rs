mod common;

use common::{block_shape, shape};
use fcode_body::{Insn, MethodBody, TryBlock, TypeRef};
use fcode_text::{assemble, disassemble, disassemble_range, disassemble_with_guesses};

fn assembled(is_static: bool, returns_void: bool, text: &str) -> MethodBody {
    let mut body = MethodBody::new(is_static, returns_void);
    assemble(&mut body, text).unwrap();
    body
}

/// Disassembly must assemble back to the same instructions and try blocks.
fn assert_reassembles(body: &MethodBody) -> String {
    let text = disassemble(body);
    let mut again = MethodBody::new(body.is_static(), body.returns_void());
    assemble(&mut again, &text).unwrap_or_else(|e| panic!("reassembly failed: {e}\n{text}"));
    assert_eq!(shape(&again), shape(body), "instructions differ:\n{text}");
    assert_eq!(block_shape(&again), block_shape(body), "blocks differ:\n{text}");
    text
}

#[test]
fn first_instruction_is_labeled_start() {
    let body = assembled(true, false, "ld.int 7\nret");
    let text = disassemble(&body);
    assert!(text.starts_with("start: ld.int 7"), "{text}");
}

#[test]
fn jump_targets_get_synthesized_labels() {
    let body = assembled(
        true,
        false,
        "
        ld.true
        jmp.true over
        nop
        jmp end
        over: nop
        end: ret
        ",
    );
    let text = assert_reassembles(&body);
    // The nop target scans first, the return target second.
    assert!(text.contains("jmp.true L0"), "{text}");
    assert!(text.contains("L0: nop"), "{text}");
    assert!(text.contains("jmp RET0"), "{text}");
    assert!(text.contains("RET0: ret"), "{text}");
}

#[test]
fn label_synthesis_is_deterministic() {
    let body = assembled(true, false, "a: nop\njmp.true a\njmp b\nb: ret");
    let mut body2 = MethodBody::new(true, false);
    assemble(&mut body2, &disassemble(&body)).unwrap();
    assert_eq!(disassemble(&body), disassemble(&body2));
}

#[test]
fn switch_renders_and_reassembles() {
    let body = assembled(
        true,
        false,
        "
        ld.int 1
        switch {
            0 -> zero
            1 -> one
        }
        zero: nop
        one: ret
        ",
    );
    let text = assert_reassembles(&body);
    assert!(text.contains("switch {"), "{text}");
    assert!(text.contains("0 -> L0"), "{text}");
    assert!(text.contains("1 -> RET0"), "{text}");
}

#[test]
fn operands_render_in_reparseable_form() {
    let body = assembled(
        true,
        true,
        r#"
        .local w, acme::Widget
        ld.str "a\nb"
        ld.duration 5 ms
        ld.float 2.5
        cmp.eq sys::Int; sys::Int
        ld.instance (sys::Int)acme::Widget.count
        call.static acme::Widget.make(sys::Int) -> acme::Widget
        st.var w
        ret
        "#,
    );
    let text = assert_reassembles(&body);
    assert!(text.contains("ld.str \"a\\nb\""), "{text}");
    assert!(text.contains("ld.duration 5 ms"), "{text}");
    assert!(text.contains("ld.instance (sys::Int)acme::Widget.count"), "{text}");
    assert!(
        text.contains("call.static acme::Widget.make(sys::Int) -> acme::Widget"),
        "{text}"
    );
    assert!(text.contains("st.var w"), "{text}");
}

#[test]
fn try_catch_finally_renders_as_blocks() {
    let body = assembled(
        true,
        true,
        "
        try {
            ld.int 1
            pop sys::Int
        } catch (e, sys::IOErr) {
            ld.var e
            pop sys::IOErr
        } catch {
            nop
        } finally {
            nop
        }
        ret
        ",
    );
    let text = assert_reassembles(&body);
    assert!(text.contains("try {"), "{text}");
    assert!(text.contains("catch (e, sys::IOErr) {"), "{text}");
    assert!(text.contains("catch {"), "{text}");
    assert!(text.contains("finally {"), "{text}");
    // Markers fold into the syntax instead of printing raw.
    assert!(!text.contains("catch.err"), "{text}");
    assert!(!text.contains("finally.start"), "{text}");
}

#[test]
fn nested_regions_open_widest_first() {
    let body = assembled(
        true,
        true,
        "
        try {
            try {
                nop
            } catch {
                nop
            }
            nop
        } catch {
            nop
        }
        ret
        ",
    );
    let text = assert_reassembles(&body);
    // Both regions start at the same instruction; the outer one must open
    // first for the nesting to reassemble.
    let first = text.find("try {").unwrap();
    let second = text[first + 1..].find("try {").unwrap();
    assert!(second > 0, "{text}");
}

#[test]
fn unshaped_handler_markers_print_raw() {
    common::init_logs();
    // A typed handler with no st.var after its marker has no clause form,
    // so the block is skipped and its markers print as plain lines.
    let mut body = MethodBody::new(true, true);
    let start = body.push(Insn::nop());
    let handler = body.push(Insn::catch_err_start(TypeRef::basic("sys", "IOErr")));
    body.push(Insn::catch_end());
    body.push(Insn::ret());
    let mut block = TryBlock::new(start, start);
    block.set_handler(TypeRef::basic("sys", "IOErr"), handler);
    body.error_table.blocks.push(block);

    let text = disassemble(&body);
    assert!(text.contains("catch.err sys::IOErr"), "{text}");
    assert!(text.contains("catch.end"), "{text}");
    assert!(!text.contains("try {"), "{text}");
}

#[test]
fn range_rendering_keeps_full_body_labels() {
    let body = assembled(true, false, "ld.true\njmp.true skip\nnop\nskip: ret");
    let text = disassemble_range(&body, 2..4);
    assert!(text.contains("nop"), "{text}");
    assert!(text.contains("RET0: ret"), "{text}");
    assert!(!text.contains("ld.true"), "{text}");
}

#[test]
fn guesses_fold_simple_statements() {
    let body = assembled(
        true,
        true,
        "
        .local x, sys::Int
        ld.int 4
        st.var x
        ret
        ",
    );
    let text = disassemble_with_guesses(&body);
    assert!(text.contains("/* BEGIN: x = 4 */"), "{text}");
    assert!(text.contains("/* BEGIN: return */"), "{text}");
    assert!(text.contains("st.var x"), "{text}");
}

#[test]
fn guesses_fold_calls_and_comparisons() {
    let body = assembled(
        true,
        true,
        "
        .local w, acme::Widget
        .local ok, sys::Bool
        ld.var w
        ld.int 3
        call.virtual acme::Widget.resize(sys::Int) -> sys::Bool
        st.var ok
        ld.var ok
        jmp.true done
        ld.var w
        call.virtual acme::Widget.clear()
        done: ret
        ",
    );
    let text = disassemble_with_guesses(&body);
    assert!(text.contains("/* BEGIN: ok = w.resize(3) */"), "{text}");
    assert!(text.contains("/* BEGIN: if (ok) jump RET0 */"), "{text}");
    assert!(text.contains("/* BEGIN: w.clear() */"), "{text}");
}

#[test]
fn safe_call_idiom_reads_as_question_mark() {
    let body = assembled(
        true,
        true,
        "
        .local a, acme::Widget?
        .local r, sys::Str?
        ld.var a
        dup acme::Widget?
        cmp.null acme::Widget?
        jmp.true skip
        call.virtual acme::Widget.name() -> sys::Str
        jmp next
        skip: pop acme::Widget?
        ld.null
        next: st.var r
        ret
        ",
    );
    let text = disassemble_with_guesses(&body);
    assert!(text.contains("/* BEGIN: r = a?.name() */"), "{text}");
}

#[test]
fn safe_void_call_is_held_until_the_skeleton_ends() {
    let body = assembled(
        true,
        true,
        "
        .local a, acme::Widget?
        ld.var a
        dup acme::Widget?
        cmp.null acme::Widget?
        jmp.true skip
        call.virtual acme::Widget.clear()
        jmp next
        skip: pop acme::Widget?
        next: ret
        ",
    );
    let text = disassemble_with_guesses(&body);
    assert!(text.contains("/* BEGIN: a?.clear() */"), "{text}");
}

#[test]
fn elvis_idiom_reads_as_fallback() {
    let body = assembled(
        true,
        true,
        r#"
        .local a, sys::Str?
        .local r, sys::Str
        ld.var a
        dup sys::Str?
        cmp.null sys::Str?
        jmp.true onnull
        jmp done
        onnull: pop sys::Str?
        ld.str "fallback"
        done: st.var r
        ret
        "#,
    );
    let text = disassemble_with_guesses(&body);
    assert!(
        text.contains("/* BEGIN: r = (a ?: \"fallback\") */"),
        "{text}"
    );
}

#[test]
fn unrecognized_sequences_fall_back_to_raw_lines() {
    // A pop with nothing on the simulated stack cannot be a statement.
    let body = assembled(true, true, "pop sys::Obj\nret");
    let text = disassemble_with_guesses(&body);
    assert!(text.contains("pop sys::Obj"), "{text}");
    assert!(!text.contains("BEGIN: sys::Obj"), "{text}");
}

#[test]
fn guesses_never_change_the_instruction_lines() {
    let source = "
        try {
            ld.int 1
            pop sys::Int
        } catch {
            nop
        }
        ret
        ";
    let body = assembled(true, true, source);
    let plain = disassemble(&body);
    let guessed = disassemble_with_guesses(&body);
    for line in plain.lines() {
        assert!(guessed.contains(line), "missing {line:?} in:\n{guessed}");
    }
}
