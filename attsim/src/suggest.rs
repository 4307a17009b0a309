//! Typo suggestions for mnemonics and register names.

use crate::cpu::Register;
use crate::instruction::all_mnemonics;
use crate::size::OpSize;
use strsim::jaro_winkler;

/// Minimum Jaro-Winkler similarity for a candidate to be suggested.
pub const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Closest valid mnemonic to `input`. Among equally similar candidates the
/// one whose suffix matches `size_hint` wins, then the first in catalog order.
pub fn suggest_mnemonic(input: &str, size_hint: Option<OpSize>) -> Option<String> {
    let mut best: Option<(f64, bool, String)> = None;
    for (candidate, size) in all_mnemonics() {
        let score = jaro_winkler(input, &candidate);
        if score < SUGGESTION_THRESHOLD {
            continue;
        }
        let hinted = size_hint.is_some() && size == size_hint;
        let better = match &best {
            None => true,
            Some((s, h, _)) => score > *s || (score == *s && hinted && !*h),
        };
        if better {
            best = Some((score, hinted, candidate));
        }
    }
    best.map(|(_, _, candidate)| candidate)
}

/// Closest register name to `input` (without `%`).
pub fn suggest_register(input: &str) -> Option<Register> {
    let input = input.to_ascii_lowercase();
    let mut best: Option<(f64, Register)> = None;
    for reg in Register::ALL {
        let score = jaro_winkler(&input, reg.name());
        if score >= SUGGESTION_THRESHOLD && best.is_none_or(|(s, _)| score > s) {
            best = Some((score, reg));
        }
    }
    best.map(|(_, reg)| reg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jaro_winkler_known_values() {
        assert_eq!(jaro_winkler("movl", "movl"), 1.0);
        let score = jaro_winkler("movk", "movl");
        assert!((score - 0.8833).abs() < 1e-3, "got {score}");
        let martha = jaro_winkler("martha", "marhta");
        assert!((martha - 0.9611).abs() < 1e-3, "got {martha}");
    }

    #[test]
    fn test_mnemonic_suggestion_uses_size_hint() {
        assert_eq!(suggest_mnemonic("movk", Some(OpSize::Long)).as_deref(), Some("movl"));
        assert_eq!(suggest_mnemonic("movk", Some(OpSize::Quad)).as_deref(), Some("movq"));
        assert_eq!(suggest_mnemonic("adq", None).as_deref(), Some("addq"));
        assert_eq!(suggest_mnemonic("zzzz", None), None);
    }

    #[test]
    fn test_register_suggestion() {
        assert_eq!(suggest_register("raxx"), Some(Register::RAX));
        assert_eq!(suggest_register("r10x"), Some(Register::R10));
        assert_eq!(suggest_register("qqq"), None);
    }
}
