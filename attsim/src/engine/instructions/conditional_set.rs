use crate::cpu::FlagUpdate;
use crate::engine::ExecutionContext;
use crate::error::Result;
use crate::line::Instruction;
use crate::size::OpSize;
use crate::state::MachineState;

impl ExecutionContext<'_> {
    pub(crate) fn execute_setcc(&self, inst: &Instruction, condition: bool) -> Result<MachineState> {
        let dst = self.unary(inst)?;
        dst.write(
            self.state,
            Some(condition as i128),
            OpSize::Byte,
            FlagUpdate::none(),
            true,
        )
    }
}
