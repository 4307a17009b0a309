use attsim::{
    Flags, HookAction, HookManager, MachineState, ProgramLine, Register, RuntimeFault,
};
use colored::*;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Skip,
}

/// Actions keyed by line number.
pub type LineActions = BTreeMap<usize, Vec<LineAction>>;

/// Hook that applies configured line actions and, when enabled, prints
/// every evaluated line with the registers and flags it changed.
pub struct LineTracer {
    enabled: bool,
    line_count: usize,
    actions: LineActions,
    output: Box<dyn Write>,
}

impl LineTracer {
    pub fn new(enabled: bool, actions: LineActions) -> Self {
        Self::new_with_output(enabled, actions, Box::new(std::io::stdout()))
    }

    pub fn new_with_output(enabled: bool, actions: LineActions, output: Box<dyn Write>) -> Self {
        LineTracer {
            enabled,
            line_count: 0,
            actions,
            output,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    fn is_skipped(&self, line: usize) -> bool {
        self.actions
            .get(&line)
            .is_some_and(|actions| actions.contains(&LineAction::Skip))
    }

    fn emit(&mut self, text: std::fmt::Arguments<'_>) {
        if let Err(e) = self.output.write_fmt(text).and_then(|_| self.output.write_all(b"\n")) {
            warn!("Failed to write trace output: {}", e);
        }
    }
}

/// `name=old->new` for every 64-bit register whose value differs.
fn changed_registers(before: &MachineState, after: &MachineState) -> Vec<String> {
    Register::QUADS
        .into_iter()
        .filter(|&reg| before.read_register_bits(reg) != after.read_register_bits(reg))
        .map(|reg| {
            format!(
                "{}={:x}->{:x}",
                reg.name().to_uppercase(),
                before.read_register_bits(reg),
                after.read_register_bits(reg)
            )
        })
        .collect()
}

fn flag_string(flags: Flags) -> String {
    [
        (Flags::ZF, 'Z'),
        (Flags::SF, 'S'),
        (Flags::OF, 'O'),
        (Flags::CF, 'C'),
    ]
    .iter()
    .map(|&(flag, c)| if flags.contains(flag) { c } else { '-' })
    .collect()
}

impl HookManager for LineTracer {
    fn on_line(&mut self, line: &ProgramLine, _state: &MachineState) -> HookAction {
        if self.is_skipped(line.number) {
            debug!("Skipping line {}", line.number);
            return HookAction::Skip;
        }
        HookAction::Continue
    }

    fn on_step(&mut self, line: &ProgramLine, before: &MachineState, after: &MachineState) {
        self.line_count += 1;
        if !self.enabled || !line.is_instruction() {
            return;
        }

        let text = if self.is_skipped(line.number) {
            format!("{} (skipped)", line).bright_black()
        } else {
            line.to_string().red().bold()
        };
        let changes = changed_registers(before, after).join(" ");
        let flags = if before.flags() != after.flags() {
            flag_string(after.flags()).bright_cyan().to_string()
        } else {
            String::new()
        };

        let count = format!("[{:06}]", self.line_count).bright_black();
        let number = format!("{:>4}", line.number).yellow();
        self.emit(format_args!(
            "{} {}: {:<32} | {} {}",
            count,
            number,
            text,
            changes.bright_blue(),
            flags
        ));
    }

    fn on_fault(&mut self, fault: &RuntimeFault) {
        if !self.enabled {
            return;
        }
        self.emit(format_args!("{} {}", "[FAULT]".red().bold(), fault));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attsim::{Program, Simulation, SimulationConfig};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn simulation(source: &str) -> Simulation {
        Simulation::new(
            Program::from_source(source).unwrap(),
            SimulationConfig::default(),
        )
    }

    #[test]
    fn test_skip_action() {
        let mut sim = simulation("movq $1, %rax\nmovq $2, %rax");
        let mut actions = LineActions::new();
        actions.insert(1, vec![LineAction::Skip]);
        let mut tracer = LineTracer::new_with_output(false, actions, Box::new(std::io::sink()));

        sim.run(&mut tracer).unwrap();

        assert_eq!(sim.state().read_register(Register::RAX), 1);
        assert_eq!(tracer.line_count(), 2);
    }

    #[test]
    fn test_trace_output() {
        colored::control::set_override(false);
        let buffer = SharedBuffer::default();
        let mut sim = simulation("movq $5, %rbx\n# note\ncmpq $5, %rbx");
        let mut tracer =
            LineTracer::new_with_output(true, LineActions::new(), Box::new(buffer.clone()));

        sim.run(&mut tracer).unwrap();

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("movq $5, %rbx"));
        assert!(lines[0].contains("RBX=0->5"));
        assert!(lines[1].contains("Z---"));
    }

    #[test]
    fn test_fault_output() {
        colored::control::set_override(false);
        let buffer = SharedBuffer::default();
        let mut sim = simulation("jmp nowhere");
        let mut tracer =
            LineTracer::new_with_output(true, LineActions::new(), Box::new(buffer.clone()));

        assert!(sim.run(&mut tracer).is_err());

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("[FAULT] line 0: Label 'nowhere' is not defined"));
    }

    #[test]
    fn test_flag_string() {
        assert_eq!(flag_string(Flags::empty()), "----");
        assert_eq!(flag_string(Flags::ZF | Flags::CF), "Z--C");
    }
}
