use crate::cpu::{FlagUpdate, Flags};
use crate::engine::{ExecutionContext, logical_flags};
use crate::error::Result;
use crate::line::Instruction;
use crate::operand::Operand;
use crate::size::OpSize;
use crate::state::MachineState;

impl ExecutionContext<'_> {
    /// AND, OR, XOR and TEST. TEST sets flags without writing back.
    pub(crate) fn execute_logical(
        &self,
        inst: &Instruction,
        op: fn(i128, i128) -> i128,
        write_back: bool,
    ) -> Result<MachineState> {
        let (src, dst) = self.binary(inst)?;
        let size = inst.size;
        let result = size.truncate(op(self.read(dst, size)?, self.read(src, size)?));
        let flags = logical_flags(result);
        if write_back {
            dst.write(self.state, Some(result), size, flags, true)
        } else {
            Ok(self.state.with_flags(flags, true))
        }
    }

    pub(crate) fn execute_not(&self, inst: &Instruction) -> Result<MachineState> {
        let dst = self.unary(inst)?;
        let size = inst.size;
        let result = size.truncate(!self.read(dst, size)?);
        dst.write(self.state, Some(result), size, FlagUpdate::none(), true)
    }

    pub(crate) fn execute_shl(&self, inst: &Instruction) -> Result<MachineState> {
        let (count, dst, value) = self.shift_operands(inst)?;
        let size = inst.size;
        let bits = size.bits();
        let unsigned = size.zero_extend(value);
        let result = size.truncate(value << count);

        let mut flags = FlagUpdate::zero_sign(result).with(
            Flags::OF,
            count == 1 && ((unsigned >> (bits - 1)) ^ (unsigned >> (bits - 2))) & 1 == 1,
        );
        if count > 0 {
            let carry = count <= bits && (unsigned >> (bits - count)) & 1 == 1;
            flags = flags.with(Flags::CF, carry);
        }
        dst.write(self.state, Some(result), size, flags, true)
    }

    pub(crate) fn execute_sar(&self, inst: &Instruction) -> Result<MachineState> {
        let (count, dst, value) = self.shift_operands(inst)?;
        let result = inst.size.truncate(value >> count);
        self.finish_right_shift(inst, dst, value, count, result)
    }

    pub(crate) fn execute_shr(&self, inst: &Instruction) -> Result<MachineState> {
        let (count, dst, value) = self.shift_operands(inst)?;
        let unsigned = inst.size.zero_extend(value);
        let result = inst.size.truncate(unsigned >> count);
        self.finish_right_shift(inst, dst, unsigned, count, result)
    }

    /// `shifted` is the value the bits were shifted out of: sign-extended
    /// for SAR, zero-extended for SHR.
    fn finish_right_shift(
        &self,
        inst: &Instruction,
        dst: &Operand,
        shifted: i128,
        count: u32,
        result: i128,
    ) -> Result<MachineState> {
        // OF is defined as clear for every right shift
        let mut flags = FlagUpdate::zero_sign(result).with(Flags::OF, false);
        if count > 0 {
            flags = flags.with(Flags::CF, (shifted >> (count - 1)) & 1 == 1);
        }
        dst.write(self.state, Some(result), inst.size, flags, true)
    }

    /// Shift count (mod 64), destination, and the destination's value.
    fn shift_operands<'i>(&self, inst: &'i Instruction) -> Result<(u32, &'i Operand, i128)> {
        let (count_op, dst) = self.binary(inst)?;
        let count = (OpSize::Byte.zero_extend(self.read(count_op, OpSize::Byte)?) % 64) as u32;
        let value = self.read(dst, inst.size)?;
        Ok((count, dst, value))
    }
}
