use crate::error::RuntimeFault;
use crate::line::ProgramLine;
use crate::state::MachineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// Continue normal execution
    Continue,
    /// Skip the current line (advance RIP but don't evaluate)
    Skip,
    /// Stop the run before this line
    Stop,
}

/// Observer for [`Simulation::run`](crate::Simulation::run).
pub trait HookManager {
    /// Called before the line at RIP is evaluated.
    fn on_line(&mut self, line: &ProgramLine, state: &MachineState) -> HookAction {
        let _ = (line, state);
        HookAction::Continue
    }

    /// Called after a line has been evaluated (or skipped).
    fn on_step(&mut self, line: &ProgramLine, before: &MachineState, after: &MachineState) {
        let _ = (line, before, after);
    }

    fn on_fault(&mut self, fault: &RuntimeFault) {
        let _ = fault;
    }
}

/// Default no-op hook manager that does nothing for all hook events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl HookManager for NoHooks {}
