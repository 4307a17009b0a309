pub mod cpu;
pub mod display;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod instruction;
pub mod label;
pub mod line;
pub mod memory;
pub mod operand;
pub mod parser;
pub mod program;
pub mod simulation;
pub mod size;
pub mod state;
pub mod suggest;

pub use cpu::{FlagUpdate, Flags, Register};
pub use display::{
    RegisterView, StackEntry, carry_flag, overflow_flag, registers_for_display, sign_flag,
    stack_entries_for_display, zero_flag,
};
pub use engine::evaluate;
pub use error::{FaultKind, ParseError, ParseErrorKind, RuntimeFault, SourceError};
pub use hooks::{HookAction, HookManager, NoHooks};
pub use instruction::{Condition, InstructionKind, OperandRequirements};
pub use label::{LabelId, LabelTable};
pub use line::{Instruction, Operands, ProgramLine, Statement};
pub use operand::{Constant, LabelRef, MemoryOperand, Operand, Radix};
pub use parser::ParserSession;
pub use program::Program;
pub use simulation::{RunOutcome, Simulation, SimulationConfig, StepOutcome};
pub use size::OpSize;
pub use state::MachineState;

/// Initial `%rsp`, and the upper end of the stack view.
pub const DEFAULT_STACK_BASE: u64 = 0x7fff_f000_0000;

/// Lines evaluated by one bounded run.
pub const DEFAULT_MAX_STEPS_PER_RUN: usize = 100;
