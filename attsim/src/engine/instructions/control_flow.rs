use crate::cpu::Register;
use crate::engine::ExecutionContext;
use crate::error::{FaultKind, Result};
use crate::line::Instruction;
use crate::size::OpSize;
use crate::state::MachineState;

impl ExecutionContext<'_> {
    /// Jcc and JMP. The label is only resolved when the branch is taken.
    pub(crate) fn execute_jcc(&self, inst: &Instruction, condition: bool) -> Result<MachineState> {
        if !condition {
            return Ok(self.state.advance());
        }
        let target = self.branch_target(inst)?;
        Ok(self.state.jump_to(target))
    }

    pub(crate) fn execute_call(&self, inst: &Instruction) -> Result<MachineState> {
        let target = self.branch_target(inst)?;
        let return_line = self.state.rip() as i128 + 1;

        let mut next = self.state.clone();
        let rsp = next.read_register_bits(Register::RSP).wrapping_sub(8);
        next.set_register(Register::RSP, rsp as i128);
        next.store(rsp, return_line, OpSize::Quad);
        next.adjust_call_depth(1);
        next.set_rip(target);
        Ok(next)
    }

    /// RET at depth 0 is the program's own exit and finishes execution.
    pub(crate) fn execute_ret(&self) -> Result<MachineState> {
        let mut next = self.state.clone();
        if self.state.call_depth() <= 0 {
            next.adjust_call_depth(-1);
            return Ok(next);
        }

        let rsp = self.state.read_register_bits(Register::RSP);
        if rsp >= self.state.stack_base() {
            return Err(FaultKind::StackUnderflow);
        }
        let return_line = self.state.read_memory(rsp, OpSize::Quad);
        let return_line =
            usize::try_from(return_line).map_err(|_| FaultKind::InvalidReturnAddress(return_line))?;

        next.set_register(Register::RSP, rsp.wrapping_add(8) as i128);
        next.adjust_call_depth(-1);
        next.set_rip(return_line);
        Ok(next)
    }

    fn branch_target(&self, inst: &Instruction) -> Result<usize> {
        let label = self.unary(inst)?;
        let line = self.read(label, OpSize::Quad)?;
        usize::try_from(line)
            .map_err(|_| FaultKind::Internal(format!("label resolved to line {}", line)))
    }
}
