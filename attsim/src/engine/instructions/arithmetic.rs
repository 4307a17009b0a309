use crate::cpu::{FlagUpdate, Flags, Register};
use crate::engine::{ExecutionContext, arithmetic_flags, overflows};
use crate::error::{FaultKind, Result};
use crate::line::Instruction;
use crate::size::OpSize;
use crate::state::MachineState;

impl ExecutionContext<'_> {
    pub(crate) fn execute_add(&self, inst: &Instruction) -> Result<MachineState> {
        let (src, dst) = self.binary(inst)?;
        let size = inst.size;
        let dst_value = self.read(dst, size)?;
        let src_value = self.read(src, size)?;
        let result = dst_value + src_value;
        let truncated = size.truncate(result);

        // Unsigned carry out of the top bit
        let carry = (dst_value < 0 && src_value < 0)
            || ((dst_value < 0) != (src_value < 0) && truncated >= 0);

        let flags = arithmetic_flags(result, size).with(Flags::CF, carry);
        dst.write(self.state, Some(truncated), size, flags, true)
    }

    pub(crate) fn execute_sub(&self, inst: &Instruction) -> Result<MachineState> {
        let (_, dst) = self.binary(inst)?;
        let (result, flags) = self.subtract(inst)?;
        dst.write(self.state, Some(inst.size.truncate(result)), inst.size, flags, true)
    }

    pub(crate) fn execute_cmp(&self, inst: &Instruction) -> Result<MachineState> {
        let (_, flags) = self.subtract(inst)?;
        Ok(self.state.with_flags(flags, true))
    }

    /// `dst - src` and its flags, shared by SUB and CMP.
    fn subtract(&self, inst: &Instruction) -> Result<(i128, FlagUpdate)> {
        let (src, dst) = self.binary(inst)?;
        let size = inst.size;
        let minuend = self.read(dst, size)?;
        let subtrahend = self.read(src, size)?;
        let result = minuend - subtrahend;

        // Unsigned borrow
        let borrow = ((minuend < 0) == (subtrahend < 0) && minuend < subtrahend)
            || (minuend >= 0 && subtrahend < 0);

        Ok((result, arithmetic_flags(result, size).with(Flags::CF, borrow)))
    }

    pub(crate) fn execute_imul(&self, inst: &Instruction) -> Result<MachineState> {
        let (src, dst) = self.binary(inst)?;
        let size = inst.size;
        let result = self.read(dst, size)? * self.read(src, size)?;
        let flags = arithmetic_flags(result, size).with(Flags::CF, overflows(result, size));
        dst.write(self.state, Some(size.truncate(result)), size, flags, true)
    }

    pub(crate) fn execute_inc(&self, inst: &Instruction) -> Result<MachineState> {
        self.step_by(inst, 1)
    }

    pub(crate) fn execute_dec(&self, inst: &Instruction) -> Result<MachineState> {
        self.step_by(inst, -1)
    }

    /// INC/DEC: CF is left alone.
    fn step_by(&self, inst: &Instruction, delta: i128) -> Result<MachineState> {
        let dst = self.unary(inst)?;
        let size = inst.size;
        let result = self.read(dst, size)? + delta;
        dst.write(
            self.state,
            Some(size.truncate(result)),
            size,
            arithmetic_flags(result, size),
            true,
        )
    }

    pub(crate) fn execute_neg(&self, inst: &Instruction) -> Result<MachineState> {
        let dst = self.unary(inst)?;
        let size = inst.size;
        let value = self.read(dst, size)?;
        let result = -value;
        let flags = arithmetic_flags(result, size).with(Flags::CF, value != 0);
        dst.write(self.state, Some(size.truncate(result)), size, flags, true)
    }

    pub(crate) fn execute_idiv(&self, inst: &Instruction) -> Result<MachineState> {
        let divisor_op = self.unary(inst)?;
        let size = inst.size;

        // (high half / remainder, low half / quotient)
        let (high, low) = match size {
            OpSize::Byte => (Register::AH, Register::AL),
            OpSize::Word => (Register::DX, Register::AX),
            OpSize::Long => (Register::EDX, Register::EAX),
            OpSize::Quad => (Register::RDX, Register::RAX),
        };

        let divisor = self.read(divisor_op, size)?;
        if divisor == 0 {
            return Err(FaultKind::DivisionByZero);
        }

        let dividend = (self.state.read_register(high) << size.bits())
            | self.state.read_register_bits(low) as i128;
        let quotient = dividend
            .checked_div(divisor)
            .ok_or(FaultKind::DivisionOverflow)?;
        let remainder = dividend
            .checked_rem(divisor)
            .ok_or(FaultKind::DivisionOverflow)?;
        if !size.fits(quotient) {
            return Err(FaultKind::DivisionOverflow);
        }

        let mut next = self.state.clone();
        next.set_register(low, quotient);
        next.set_register(high, remainder);
        next.finish_write(FlagUpdate::none(), true);
        Ok(next)
    }
}
