//! Property-based tests using proptest.
//!
//! These check the arithmetic and register-file laws over random operands,
//! and that canonical line text parses back to the same line.

use attsim::{
    LabelTable, MachineState, OpSize, ParserSession, Register, Statement, evaluate,
};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

fn arb_size() -> impl Strategy<Value = OpSize> {
    prop::sample::select(OpSize::ALL.to_vec())
}

/// Valid instruction lines drawn from a curated pool.
fn valid_line() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "addq %rax, %rbx",
        "subl $-5, %ecx",
        "imulw %dx, %si",
        "cmpb $0x7f, %al",
        "orq 8(%rsp), %r8",
        "andl %r9d, -4(%rbp)",
        "testb %ah, %bh",
        "xorq %rdi, %rdi",
        "salq $3, %rax",
        "shrl %cl, %edx",
        "sarw $15, (%rax,%rbx,2)",
        "movq $0x00ff, %r15",
        "movzbq (%rsi), %rax",
        "movswl %ax, %r10d",
        "leaq -16(%rbp,%rcx,8), %rdx",
        "idivl %ecx",
        "incb %dil",
        "decw 2(%rax)",
        "negq %r11",
        "notl %r12d",
        "pushq $-1",
        "popq %r13",
        "setne %r14b",
        "jge loop",
        "jmp done",
        "callq helper",
        "retq",
        "cltq",
        "loop:",
        "# comment only",
        "movq %rax, %rbx # trailing",
    ])
}

fn evaluate_line(text: &str, state: &MachineState) -> MachineState {
    let mut session = ParserSession::new();
    let line = session.parse_line(text).unwrap();
    evaluate(&line, state, &LabelTable::new()).unwrap()
}

// ── Arithmetic ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn truncate_is_idempotent(value in any::<i64>(), size in arb_size()) {
        let once = size.truncate(value as i128);
        prop_assert_eq!(size.truncate(once), once);
        prop_assert!(size.fits(once));
    }

    #[test]
    fn add_wraps_at_width(a in any::<u64>(), b in any::<u64>(), size in arb_size()) {
        let src = Register::RBX.with_size(size);
        let dst = Register::RAX.with_size(size);
        let text = format!("add{} {}, {}", size.suffix(), src, dst);
        let state = MachineState::default()
            .with_register(Register::RAX, a)
            .with_register(Register::RBX, b);

        let next = evaluate_line(&text, &state);

        let expected = a.wrapping_add(b) & size.mask();
        prop_assert_eq!(next.read_register_bits(dst), expected);
        // bytes above the operand width are untouched
        prop_assert_eq!(
            next.read_register_bits(Register::RAX) & !size.mask(),
            a & !size.mask()
        );
    }

    #[test]
    fn sub_matches_wrapping(a in any::<u64>(), b in any::<u64>()) {
        let state = MachineState::default()
            .with_register(Register::RCX, a)
            .with_register(Register::RDX, b);

        let next = evaluate_line("subq %rdx, %rcx", &state);

        prop_assert_eq!(next.read_register_bits(Register::RCX), a.wrapping_sub(b));
        prop_assert_eq!(next.flags().contains(attsim::Flags::CF), a < b);
        prop_assert_eq!(next.flags().contains(attsim::Flags::ZF), a == b);
    }

    #[test]
    fn cmp_matches_sub_flags(a in any::<u64>(), b in any::<u64>(), size in arb_size()) {
        let src = Register::RSI.with_size(size);
        let dst = Register::RDI.with_size(size);
        let state = MachineState::default()
            .with_register(Register::RDI, a)
            .with_register(Register::RSI, b);

        let compared = evaluate_line(&format!("cmp{} {}, {}", size.suffix(), src, dst), &state);
        let subtracted = evaluate_line(&format!("sub{} {}, {}", size.suffix(), src, dst), &state);

        prop_assert_eq!(compared.flags(), subtracted.flags());
        prop_assert_eq!(compared.read_register_bits(Register::RDI), a);
    }

    #[test]
    fn imul_matches_wrapping(a in any::<u64>(), b in any::<u64>()) {
        let state = MachineState::default()
            .with_register(Register::R8, a)
            .with_register(Register::R9, b);

        let next = evaluate_line("imulq %r9, %r8", &state);

        prop_assert_eq!(next.read_register_bits(Register::R8), a.wrapping_mul(b));
        let wide = (a as i64 as i128) * (b as i64 as i128);
        let overflowed = wide != (a.wrapping_mul(b) as i64 as i128);
        prop_assert_eq!(next.flags().contains(attsim::Flags::OF), overflowed);
    }
}

// ── Register file ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sub_register_write_is_isolated(
        initial in any::<u64>(),
        value in any::<u64>(),
        index in 0usize..Register::ALL.len(),
    ) {
        let reg = Register::ALL[index];
        let parent = reg.parent_64();
        let state = MachineState::default().with_register(parent, initial);

        let next = state.with_register(reg, value);

        let shift = if reg.is_high_byte() { 8 } else { 0 };
        let mask = reg.size().mask() << shift;
        let full = next.read_register_bits(parent);
        prop_assert_eq!(full & !mask, initial & !mask);
        prop_assert_eq!(next.read_register_bits(reg), value & reg.size().mask());
        // every other register is untouched
        for other in Register::QUADS.into_iter().filter(|r| *r != parent) {
            prop_assert_eq!(next.read_register_bits(other), state.read_register_bits(other));
        }
    }

    #[test]
    fn mov_register_only_touches_destination(value in any::<u64>(), size in arb_size()) {
        let dst = Register::R10.with_size(size);
        let src = Register::R11.with_size(size);
        let state = MachineState::default()
            .with_register(Register::R10, u64::MAX)
            .with_register(Register::R11, value);

        let next = evaluate_line(&format!("mov{} {}, {}", size.suffix(), src, dst), &state);

        prop_assert_eq!(next.read_register_bits(dst), value & size.mask());
        prop_assert_eq!(next.read_register_bits(Register::R11), value);
        prop_assert_eq!(next.flags(), state.flags());
    }
}

// ── Parser ──────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn canonical_text_reparses(text in valid_line()) {
        let first = ParserSession::new().parse_line(text).unwrap();
        let canonical = first.to_string();
        let second = ParserSession::new().parse_line(&canonical).unwrap();

        prop_assert_eq!(second.to_string(), canonical);
        match (&first.statement, &second.statement) {
            (Statement::Label { name: a, .. }, Statement::Label { name: b, .. }) => {
                prop_assert_eq!(a, b)
            }
            (a, b) => prop_assert_eq!(a, b),
        }
    }

    #[test]
    fn parser_never_panics(text in "[ -~]{0,40}") {
        let _ = ParserSession::new().parse_line(&text);
    }

    #[test]
    fn decimal_constant_bounds(value in any::<i64>(), size in arb_size()) {
        let dst = Register::RAX.with_size(size);
        let text = format!("mov{} ${}, {}", size.suffix(), value, dst);
        let accepted = ParserSession::new().parse_line(&text).is_ok();

        prop_assert_eq!(accepted, size.fits(value as i128));
    }
}
