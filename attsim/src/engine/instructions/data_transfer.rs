use crate::cpu::{FlagUpdate, Register};
use crate::engine::ExecutionContext;
use crate::error::{FaultKind, Result};
use crate::line::Instruction;
use crate::operand::Operand;
use crate::size::OpSize;
use crate::state::MachineState;

impl ExecutionContext<'_> {
    pub(crate) fn execute_mov(&self, inst: &Instruction) -> Result<MachineState> {
        let (src, dst) = self.binary(inst)?;
        let value = self.read(src, inst.size)?;
        dst.write(self.state, Some(value), inst.size, FlagUpdate::none(), true)
    }

    pub(crate) fn execute_movz(&self, inst: &Instruction) -> Result<MachineState> {
        let (src, dst) = self.binary(inst)?;
        let value = inst
            .source_size
            .zero_extend(self.read(src, inst.source_size)?);
        dst.write(self.state, Some(value), inst.size, FlagUpdate::none(), true)
    }

    pub(crate) fn execute_movs(&self, inst: &Instruction) -> Result<MachineState> {
        let (src, dst) = self.binary(inst)?;
        // reads are already sign-extended
        let value = self.read(src, inst.source_size)?;
        dst.write(self.state, Some(value), inst.size, FlagUpdate::none(), true)
    }

    pub(crate) fn execute_lea(&self, inst: &Instruction) -> Result<MachineState> {
        let (src, dst) = self.binary(inst)?;
        let Operand::Memory(mem) = src else {
            return Err(FaultKind::Internal(format!(
                "lea source must be a memory operand, got {}",
                src
            )));
        };
        let address = inst.size.truncate(mem.address(self.state) as i128);
        dst.write(self.state, Some(address), inst.size, FlagUpdate::none(), true)
    }

    pub(crate) fn execute_push(&self, inst: &Instruction) -> Result<MachineState> {
        let src = self.unary(inst)?;
        let value = self.read(src, OpSize::Quad)?;
        let mut next = self.state.clone();
        let rsp = next.read_register_bits(Register::RSP).wrapping_sub(8);
        next.set_register(Register::RSP, rsp as i128);
        next.store(rsp, value, OpSize::Quad);
        next.finish_write(FlagUpdate::none(), true);
        Ok(next)
    }

    pub(crate) fn execute_pop(&self, inst: &Instruction) -> Result<MachineState> {
        let dst = self.unary(inst)?;
        let rsp = self.state.read_register_bits(Register::RSP);
        let value = self.state.read_memory(rsp, OpSize::Quad);
        let popped = self.state.write_register(
            Register::RSP,
            Some(rsp.wrapping_add(8) as i128),
            FlagUpdate::none(),
            false,
        );
        dst.write(&popped, Some(value), OpSize::Quad, FlagUpdate::none(), true)
    }

    /// `cltq`: sign-extend `%eax` into `%rax`.
    pub(crate) fn execute_clt(&self) -> Result<MachineState> {
        let value = self.state.read_register(Register::EAX);
        Ok(self
            .state
            .write_register(Register::RAX, Some(value), FlagUpdate::none(), true))
    }
}
