//! Plain-text rendering of simulation state for the terminal.

use attsim::{
    MachineState, RegisterView, SourceError, StackEntry, carry_flag, overflow_flag, sign_flag,
    zero_flag,
};
use colored::*;
use std::io::{self, Write};

/// Registers touched this recently are highlighted.
const RECENT_RANK: usize = 3;

fn rank_color(text: String, rank: Option<usize>) -> ColoredString {
    match rank {
        Some(0) => text.bright_green().bold(),
        Some(r) if r < RECENT_RANK => text.green(),
        _ => text.normal(),
    }
}

/// Two registers per row, most recently used ones highlighted.
pub fn write_registers<W: Write>(out: &mut W, registers: &[RegisterView]) -> io::Result<()> {
    for pair in registers.chunks(2) {
        let cells: Vec<String> = pair
            .iter()
            .map(|view| {
                format!(
                    "{:>5} {}",
                    view.name,
                    rank_color(view.hex.clone(), view.rank)
                )
            })
            .collect();
        writeln!(out, "  {}", cells.join("   "))?;
    }
    Ok(())
}

pub fn write_flags<W: Write>(out: &mut W, state: &MachineState) -> io::Result<()> {
    let flag = |name: &str, set: bool| {
        let text = format!("{}={}", name, set as u8);
        if set {
            text.bright_cyan().to_string()
        } else {
            text.bright_black().to_string()
        }
    };
    writeln!(
        out,
        "  {} {} {} {}",
        flag("ZF", zero_flag(state)),
        flag("SF", sign_flag(state)),
        flag("OF", overflow_flag(state)),
        flag("CF", carry_flag(state)),
    )
}

/// Highest address first, the way a stack is usually drawn.
pub fn write_stack<W: Write>(out: &mut W, entries: &[StackEntry]) -> io::Result<()> {
    if entries.is_empty() {
        return writeln!(out, "  {}", "(empty)".bright_black());
    }
    for entry in entries.iter().rev() {
        writeln!(
            out,
            "  {}  {}",
            format!("0x{:016x}", entry.start).yellow(),
            rank_color(entry.hex.clone(), entry.rank)
        )?;
    }
    Ok(())
}

/// The offending line with the error span underlined.
pub fn format_parse_error(error: &SourceError) -> String {
    let ParseSpan { start, width } = ParseSpan::of(error);
    format!(
        "{} line {}: {}\n  {}\n  {}{}",
        "error:".red().bold(),
        error.line,
        error.error.message,
        error.text,
        " ".repeat(start),
        "^".repeat(width).red().bold()
    )
}

struct ParseSpan {
    start: usize,
    width: usize,
}

impl ParseSpan {
    fn of(error: &SourceError) -> Self {
        let len = error.text.chars().count();
        let start = error.error.start.min(len);
        let end = error.error.end.clamp(start, len);
        ParseSpan {
            start,
            width: (end - start).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attsim::{NoHooks, Program, Simulation, SimulationConfig};

    #[test]
    fn test_format_parse_error_underlines_span() {
        colored::control::set_override(false);
        let errors = Program::from_source("movq %eax, %rbx").unwrap_err();
        let text = format_parse_error(&errors[0]);
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("error: line 0:"));
        assert_eq!(lines[1], "  movq %eax, %rbx");
        assert_eq!(lines[2], "       ^^^^");
    }

    #[test]
    fn test_write_stack() {
        colored::control::set_override(false);
        let mut sim = Simulation::new(
            Program::from_source("pushq $1\npushq $2").unwrap(),
            SimulationConfig::default(),
        );
        sim.run(&mut NoHooks).unwrap();

        let mut out = Vec::new();
        write_stack(&mut out, &sim.stack()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("0x0000000000000001"));
        assert!(lines[1].ends_with("0x0000000000000002"));
    }

    #[test]
    fn test_write_registers_rows() {
        colored::control::set_override(false);
        let sim = Simulation::new(Program::new(), SimulationConfig::default());

        let mut out = Vec::new();
        write_registers(&mut out, &sim.registers()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), 8);
        assert!(text.contains(" %rsp 0x00007ffff0000000"));
    }
}
