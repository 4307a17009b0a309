use attsim::{
    DEFAULT_STACK_BASE, FaultKind, HookAction, HookManager, MachineState, NoHooks, ParseErrorKind,
    Program, ProgramLine, Register, RunOutcome, RuntimeFault, Simulation, SimulationConfig,
    StepOutcome,
};

fn simulation(source: &str) -> Simulation {
    let program = Program::from_source(source).unwrap();
    Simulation::new(program, SimulationConfig::default())
}

#[test]
fn test_step_forward_and_back() {
    let mut sim = simulation("movq $1, %rax\nmovq $2, %rbx\naddq %rax, %rbx");
    let initial = sim.state().clone();

    assert_eq!(sim.step_forward().unwrap(), StepOutcome::Stepped);
    let after_first = sim.state().clone();
    assert_eq!(sim.step_forward().unwrap(), StepOutcome::Stepped);
    assert_eq!(sim.step_forward().unwrap(), StepOutcome::Stepped);
    assert_eq!(sim.state().read_register(Register::RBX), 3);
    assert!(sim.is_finished());
    assert_eq!(sim.step_forward().unwrap(), StepOutcome::Finished);
    assert_eq!(sim.history().len(), 4);

    assert!(sim.step_backward());
    assert!(sim.step_backward());
    assert_eq!(sim.state(), &after_first);
    assert!(sim.step_backward());
    assert_eq!(sim.state(), &initial);
    // nothing left to undo
    assert!(!sim.step_backward());
    assert_eq!(sim.history().len(), 1);
}

#[test]
fn test_undo_restores_memory() {
    let mut sim = simulation("pushq $5\npushq $6");
    sim.run(&mut NoHooks).unwrap();
    assert_eq!(sim.stack().len(), 2);

    sim.step_backward();
    assert_eq!(sim.stack().len(), 1);
    assert_eq!(sim.state().memory().len(), 8);
}

#[test]
fn test_fault_repeats_until_edit() {
    let mut sim = simulation("movq $0, %rcx\nidivq %rcx\nmovq $1, %rax");
    sim.step_forward().unwrap();

    let first = sim.step_forward().unwrap_err();
    let second = sim.step_forward().unwrap_err();
    assert_eq!(first, second);
    assert_eq!(first.kind, FaultKind::DivisionByZero);
    assert_eq!(sim.fault(), Some(&first));
    assert_eq!(sim.history().len(), 2);

    // fix the faulting line in place
    sim.replace_line(1, "movq $2, %rcx").unwrap();
    assert!(sim.fault().is_none());
    sim.run(&mut NoHooks).unwrap();

    let state = sim.state();
    assert_eq!(state.read_register(Register::RCX), 2);
    assert_eq!(state.read_register(Register::RAX), 1);
}

#[test]
fn test_replace_line_keeps_old_on_error() {
    let mut sim = simulation("movq $1, %rax\nmovq $2, %rbx");
    assert!(sim.toggle_breakpoint(1));

    let err = sim.replace_line(1, "movq $2").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::WrongOperandCount);
    assert_eq!(sim.program().line(1).unwrap().to_string(), "movq $2, %rbx");

    sim.replace_line(1, "movq $3, %rbx").unwrap();
    // breakpoint survives the edit
    assert!(sim.program().is_breakpoint(1));
}

#[test]
fn test_insert_and_remove_lines_relink_labels() {
    let mut sim = simulation("jmp end\nmovq $1, %rax\nend:");
    sim.insert_line(1, "movq $2, %rbx").unwrap();

    let program = sim.program();
    assert_eq!(program.len(), 4);
    let numbers: Vec<usize> = program.lines().iter().map(|l| l.number).collect();
    assert_eq!(numbers, vec![0, 1, 2, 3]);
    let end = program.labels().lookup("end").unwrap();
    assert_eq!(program.labels().line(end), Some(3));

    sim.run(&mut NoHooks).unwrap();
    assert_eq!(sim.state().read_register(Register::RBX), 0);
    assert_eq!(sim.state().rip(), 4);

    assert!(sim.remove_line(0));
    sim.restart();
    sim.run(&mut NoHooks).unwrap();
    assert_eq!(sim.state().read_register(Register::RBX), 2);
    assert_eq!(sim.state().read_register(Register::RAX), 1);
}

#[test]
fn test_removing_label_definition() {
    let mut sim = simulation("jmp end\nend:");
    assert!(sim.remove_line(1));

    let fault = sim.run(&mut NoHooks).unwrap_err();
    assert_eq!(fault.kind, FaultKind::UnresolvedLabel("end".to_string()));

    // defining it again fixes the jump
    sim.insert_line(1, "end:").unwrap();
    assert_eq!(sim.run(&mut NoHooks).unwrap(), RunOutcome::Finished);
}

#[test]
fn test_restart_keeps_program() {
    let mut sim = simulation("movq $7, %rax");
    sim.run(&mut NoHooks).unwrap();
    sim.restart();

    assert_eq!(sim.history().len(), 1);
    assert_eq!(sim.state().read_register(Register::RAX), 0);
    assert_eq!(sim.program().len(), 1);
}

#[test]
fn test_empty_program_is_finished() {
    let mut sim = Simulation::new(Program::new(), SimulationConfig::default());

    assert!(sim.is_finished());
    assert_eq!(sim.step_forward().unwrap(), StepOutcome::Finished);
    assert_eq!(sim.run(&mut NoHooks).unwrap(), RunOutcome::Finished);
}

#[test]
fn test_custom_initial_state() {
    let initial = MachineState::new(DEFAULT_STACK_BASE).with_register(Register::RDI, 21);
    let program = Program::from_source("movq %rdi, %rax\naddq %rdi, %rax").unwrap();
    let mut sim = Simulation::with_initial_state(program, initial, SimulationConfig::default());
    sim.run(&mut NoHooks).unwrap();

    assert_eq!(sim.state().read_register(Register::RAX), 42);
}

#[test]
fn test_register_view_ranks() {
    let mut sim = simulation("movq $1, %rax\nmovq $2, %rbx\nmovq $-1, %r15");
    sim.run(&mut NoHooks).unwrap();
    let registers = sim.registers();

    assert_eq!(registers.len(), 16);
    let view = |reg: Register| registers.iter().find(|r| r.register == reg).unwrap();
    assert_eq!(view(Register::R15).rank, Some(0));
    assert_eq!(view(Register::RBX).rank, Some(1));
    assert_eq!(view(Register::RAX).rank, Some(2));
    assert_eq!(view(Register::RCX).rank, None);
    assert_eq!(view(Register::RAX).hex, "0x0000000000000001");
    assert_eq!(view(Register::R15).value, u64::MAX);
    assert_eq!(view(Register::RAX).name, "%rax");
}

#[test]
fn test_push_marks_rsp_used() {
    let mut sim = simulation("pushq $1");
    sim.run(&mut NoHooks).unwrap();

    let rsp = sim
        .registers()
        .into_iter()
        .find(|r| r.register == Register::RSP)
        .unwrap();
    assert_eq!(rsp.rank, Some(0));
}

#[test]
fn test_stack_view() {
    let mut sim = simulation("pushq $1\npushq $2");
    sim.run(&mut NoHooks).unwrap();
    let stack = sim.stack();

    assert_eq!(stack.len(), 2);
    assert_eq!(stack[0].start, DEFAULT_STACK_BASE - 16);
    assert_eq!(stack[0].end, DEFAULT_STACK_BASE - 8);
    assert_eq!(stack[0].value, 2);
    assert_eq!(stack[0].rank, Some(0));
    assert_eq!(stack[1].value, 1);
    assert_eq!(stack[1].rank, Some(1));
}

#[test]
fn test_stack_slot_never_written() {
    // moving rsp down without pushing leaves unwritten slots
    let mut sim = simulation("subq $16, %rsp");
    sim.run(&mut NoHooks).unwrap();
    let stack = sim.stack();

    assert_eq!(stack.len(), 2);
    assert!(stack.iter().all(|entry| entry.value == 0 && entry.rank.is_none()));
}

#[derive(Default)]
struct Recorder {
    seen: Vec<usize>,
    stepped: Vec<(usize, usize, usize)>,
    skip: Vec<usize>,
    stop_at: Option<usize>,
    faults: Vec<RuntimeFault>,
}

impl HookManager for Recorder {
    fn on_line(&mut self, line: &ProgramLine, _state: &MachineState) -> HookAction {
        self.seen.push(line.number);
        if Some(line.number) == self.stop_at {
            HookAction::Stop
        } else if self.skip.contains(&line.number) {
            HookAction::Skip
        } else {
            HookAction::Continue
        }
    }

    fn on_step(&mut self, line: &ProgramLine, before: &MachineState, after: &MachineState) {
        self.stepped.push((line.number, before.rip(), after.rip()));
    }

    fn on_fault(&mut self, fault: &RuntimeFault) {
        self.faults.push(fault.clone());
    }
}

#[test]
fn test_hooks_observe_each_line() {
    let mut sim = simulation("movq $1, %rax\nmovq $2, %rbx");
    let mut hooks = Recorder::default();
    sim.run(&mut hooks).unwrap();

    assert_eq!(hooks.seen, vec![0, 1]);
    assert_eq!(hooks.stepped, vec![(0, 0, 1), (1, 1, 2)]);
}

#[test]
fn test_hook_skip() {
    let mut sim = simulation("movq $1, %rax\nmovq $2, %rax\nmovq $3, %rbx");
    let mut hooks = Recorder {
        skip: vec![1],
        ..Recorder::default()
    };

    assert_eq!(sim.run(&mut hooks).unwrap(), RunOutcome::Finished);
    assert_eq!(sim.state().read_register(Register::RAX), 1);
    assert_eq!(sim.state().read_register(Register::RBX), 3);
    assert_eq!(sim.state().step(), 3);
}

#[test]
fn test_hook_stop() {
    let mut sim = simulation("movq $1, %rax\nmovq $2, %rbx\nmovq $3, %rcx");
    let mut hooks = Recorder {
        stop_at: Some(1),
        ..Recorder::default()
    };

    assert_eq!(sim.run(&mut hooks).unwrap(), RunOutcome::Stopped);
    assert_eq!(sim.state().rip(), 1);
    assert_eq!(sim.state().read_register(Register::RBX), 0);
}

#[test]
fn test_hook_sees_fault() {
    let mut sim = simulation("jmp missing");
    let mut hooks = Recorder::default();

    assert!(sim.run(&mut hooks).is_err());
    assert_eq!(hooks.faults.len(), 1);
    assert_eq!(hooks.faults[0].line, 0);
}
