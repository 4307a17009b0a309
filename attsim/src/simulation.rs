use crate::cpu::Register;
use crate::display::{RegisterView, StackEntry, registers_for_display, stack_entries_for_display};
use crate::engine::evaluate;
use crate::error::{FaultKind, ParseError, RuntimeFault};
use crate::hooks::{HookAction, HookManager};
use crate::instruction::InstructionKind;
use crate::line::ProgramLine;
use crate::program::Program;
use crate::state::MachineState;
use crate::{DEFAULT_MAX_STEPS_PER_RUN, DEFAULT_STACK_BASE};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Upper bound on lines evaluated by a single [`Simulation::run`].
    pub max_steps_per_run: usize,
    /// Initial `%rsp`; the stack view covers `%rsp..stack_base`.
    pub stack_base: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_steps_per_run: DEFAULT_MAX_STEPS_PER_RUN,
            stack_base: DEFAULT_STACK_BASE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Stepped,
    /// The program had already finished; nothing was evaluated.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    /// Stopped before evaluating the breakpoint line.
    Breakpoint(usize),
    /// The per-run step budget ran out.
    StepLimit,
    /// A hook asked to stop.
    Stopped,
}

/// A program together with the history of states it has gone through.
///
/// The history always holds at least the initial state. Stepping forward
/// appends, stepping backward pops.
#[derive(Debug, Clone)]
pub struct Simulation {
    program: Program,
    history: Vec<MachineState>,
    /// Registers used by the line evaluated to reach `history[i + 1]`.
    usage: Vec<BTreeSet<Register>>,
    fault: Option<RuntimeFault>,
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(program: Program, config: SimulationConfig) -> Self {
        let initial = MachineState::new(config.stack_base);
        Self::with_initial_state(program, initial, config)
    }

    pub fn with_initial_state(
        program: Program,
        initial: MachineState,
        config: SimulationConfig,
    ) -> Self {
        Self {
            program,
            history: vec![initial],
            usage: Vec::new(),
            fault: None,
            config,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn state(&self) -> &MachineState {
        // history is never empty
        &self.history[self.history.len() - 1]
    }

    pub fn history(&self) -> &[MachineState] {
        &self.history
    }

    pub fn usage_history(&self) -> &[BTreeSet<Register>] {
        &self.usage
    }

    /// The fault raised by the most recent forward step, if any.
    pub fn fault(&self) -> Option<&RuntimeFault> {
        self.fault.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished(self.program.len())
    }

    /// Evaluates the line at RIP. A faulting line leaves the history
    /// untouched and raises again on every further attempt.
    pub fn step_forward(&mut self) -> Result<StepOutcome, RuntimeFault> {
        if self.is_finished() {
            return Ok(StepOutcome::Finished);
        }
        let state = self.state();
        let Some(line) = self.program.line(state.rip()) else {
            return Ok(StepOutcome::Finished);
        };
        let evaluated = evaluate(line, state, self.program.labels())
            .and_then(|next| check_return_line(line, next, self.program.len()));
        match evaluated {
            Ok(next) => {
                let used = line.used_registers();
                debug!(line = line.number, rip = next.rip(), "stepped");
                self.history.push(next);
                self.usage.push(used);
                self.fault = None;
                Ok(StepOutcome::Stepped)
            }
            Err(fault) => {
                warn!("{}", fault);
                self.fault = Some(fault.clone());
                Err(fault)
            }
        }
    }

    /// Undoes the last step. Returns false at the initial state.
    pub fn step_backward(&mut self) -> bool {
        if self.history.len() <= 1 {
            return false;
        }
        self.history.pop();
        self.usage.pop();
        self.fault = None;
        true
    }

    /// Steps forward until the program finishes, a breakpoint is reached,
    /// a hook stops the run, or `max_steps_per_run` lines have run. A
    /// breakpoint on the line execution starts from does not stop the run.
    pub fn run<H: HookManager>(&mut self, hooks: &mut H) -> Result<RunOutcome, RuntimeFault> {
        let outcome = self.run_inner(hooks);
        match &outcome {
            Ok(outcome) => info!(?outcome, rip = self.state().rip(), "run stopped"),
            Err(fault) => hooks.on_fault(fault),
        }
        outcome
    }

    fn run_inner<H: HookManager>(&mut self, hooks: &mut H) -> Result<RunOutcome, RuntimeFault> {
        for taken in 0..self.config.max_steps_per_run {
            if self.is_finished() {
                return Ok(RunOutcome::Finished);
            }
            let rip = self.state().rip();
            if taken > 0 && self.program.is_breakpoint(rip) {
                return Ok(RunOutcome::Breakpoint(rip));
            }
            let Some(line) = self.program.line(rip).cloned() else {
                return Ok(RunOutcome::Finished);
            };
            match hooks.on_line(&line, self.state()) {
                HookAction::Continue => {
                    self.step_forward()?;
                }
                HookAction::Skip => {
                    let skipped = self.state().advance().count_step();
                    self.history.push(skipped);
                    self.usage.push(BTreeSet::new());
                }
                HookAction::Stop => return Ok(RunOutcome::Stopped),
            }
            let (before, after) = match self.history.as_slice() {
                [.., before, after] => (before, after),
                _ => continue,
            };
            hooks.on_step(&line, before, after);
        }
        if self.is_finished() {
            Ok(RunOutcome::Finished)
        } else {
            Ok(RunOutcome::StepLimit)
        }
    }

    /// Back to the initial state, keeping the program.
    pub fn restart(&mut self) {
        self.history.truncate(1);
        self.usage.clear();
        self.fault = None;
    }

    pub fn insert_line(&mut self, index: usize, text: &str) -> Result<(), ParseError> {
        self.program.insert_line(index, text)?;
        self.fault = None;
        Ok(())
    }

    pub fn replace_line(&mut self, index: usize, text: &str) -> Result<(), ParseError> {
        self.program.replace_line(index, text)?;
        self.fault = None;
        Ok(())
    }

    pub fn remove_line(&mut self, index: usize) -> bool {
        let removed = self.program.remove_line(index).is_some();
        if removed {
            self.fault = None;
        }
        removed
    }

    pub fn toggle_breakpoint(&mut self, index: usize) -> bool {
        self.program.toggle_breakpoint(index)
    }

    pub fn registers(&self) -> Vec<RegisterView> {
        registers_for_display(self.state(), &self.usage)
    }

    pub fn stack(&self) -> Vec<StackEntry> {
        stack_entries_for_display(self.state())
    }
}

/// Faults a RET whose popped line is not a line of the program. The
/// top-level RET leaves the call depth negative and is not checked.
fn check_return_line(
    line: &ProgramLine,
    next: MachineState,
    program_len: usize,
) -> Result<MachineState, RuntimeFault> {
    let is_ret = line
        .instruction()
        .is_some_and(|inst| inst.kind == InstructionKind::Ret);
    if is_ret && next.call_depth() >= 0 && next.rip() >= program_len {
        return Err(RuntimeFault {
            line: line.number,
            kind: FaultKind::InvalidReturnAddress(next.rip() as i128),
        });
    }
    Ok(next)
}
