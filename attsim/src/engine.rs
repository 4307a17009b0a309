mod instructions;

use crate::cpu::{FlagUpdate, Flags};
use crate::error::{FaultKind, Result, RuntimeFault};
use crate::instruction::InstructionKind;
use crate::label::LabelTable;
use crate::line::{Instruction, Operands, ProgramLine};
use crate::operand::Operand;
use crate::size::OpSize;
use crate::state::MachineState;
use tracing::{debug, error};

/// Evaluates one program line against `state`, returning the successor
/// state. Blank, comment and label lines only advance RIP.
///
/// A fault never yields a partially updated state.
pub fn evaluate(
    line: &ProgramLine,
    state: &MachineState,
    labels: &LabelTable,
) -> std::result::Result<MachineState, RuntimeFault> {
    let next = match line.instruction() {
        None => state.advance(),
        Some(inst) => {
            debug!(line = line.number, rip = state.rip(), instruction = %inst, "evaluating");
            let ctx = ExecutionContext { state, labels };
            ctx.execute_instruction(inst).map_err(|kind| {
                if let FaultKind::Internal(message) = &kind {
                    error!(line = line.number, "internal evaluator error: {}", message);
                }
                RuntimeFault {
                    line: line.number,
                    kind,
                }
            })?
        }
    };
    Ok(next.count_step())
}

struct ExecutionContext<'a> {
    state: &'a MachineState,
    labels: &'a LabelTable,
}

impl ExecutionContext<'_> {
    fn execute_instruction(&self, inst: &Instruction) -> Result<MachineState> {
        match inst.kind {
            InstructionKind::Add => self.execute_add(inst),
            InstructionKind::Sub => self.execute_sub(inst),
            InstructionKind::Cmp => self.execute_cmp(inst),
            InstructionKind::Imul => self.execute_imul(inst),
            InstructionKind::Idiv => self.execute_idiv(inst),
            InstructionKind::Inc => self.execute_inc(inst),
            InstructionKind::Dec => self.execute_dec(inst),
            InstructionKind::Neg => self.execute_neg(inst),
            InstructionKind::And => self.execute_logical(inst, |a, b| a & b, true),
            InstructionKind::Or => self.execute_logical(inst, |a, b| a | b, true),
            InstructionKind::Xor => self.execute_logical(inst, |a, b| a ^ b, true),
            InstructionKind::Test => self.execute_logical(inst, |a, b| a & b, false),
            InstructionKind::Not => self.execute_not(inst),
            InstructionKind::Sal | InstructionKind::Shl => self.execute_shl(inst),
            InstructionKind::Sar => self.execute_sar(inst),
            InstructionKind::Shr => self.execute_shr(inst),
            InstructionKind::Mov => self.execute_mov(inst),
            InstructionKind::Movz => self.execute_movz(inst),
            InstructionKind::Movs => self.execute_movs(inst),
            InstructionKind::Lea => self.execute_lea(inst),
            InstructionKind::Push => self.execute_push(inst),
            InstructionKind::Pop => self.execute_pop(inst),
            InstructionKind::Clt => self.execute_clt(),
            InstructionKind::Set(cc) => self.execute_setcc(inst, cc.holds(self.flags())),
            InstructionKind::J(cc) => self.execute_jcc(inst, cc.holds(self.flags())),
            InstructionKind::Jmp => self.execute_jcc(inst, true),
            InstructionKind::Call => self.execute_call(inst),
            InstructionKind::Ret => self.execute_ret(),
        }
    }

    fn flags(&self) -> Flags {
        self.state.flags()
    }

    fn read(&self, operand: &Operand, size: OpSize) -> Result<i128> {
        operand.read(self.state, size, self.labels)
    }

    fn unary<'i>(&self, inst: &'i Instruction) -> Result<&'i Operand> {
        match &inst.operands {
            Operands::Unary(op) => Ok(op),
            other => Err(operand_count_mismatch(inst, other)),
        }
    }

    fn binary<'i>(&self, inst: &'i Instruction) -> Result<(&'i Operand, &'i Operand)> {
        match &inst.operands {
            Operands::Binary {
                source,
                destination,
            } => Ok((source, destination)),
            other => Err(operand_count_mismatch(inst, other)),
        }
    }
}

fn operand_count_mismatch(inst: &Instruction, operands: &Operands) -> FaultKind {
    FaultKind::Internal(format!(
        "{} evaluated with {} operand(s)",
        inst.mnemonic(),
        operands.len()
    ))
}

/// Whether an untruncated result needs more bits than `size` provides.
fn overflows(result: i128, size: OpSize) -> bool {
    !size.fits(result)
}

/// ZF/SF from the truncated result, OF from the untruncated one.
fn arithmetic_flags(result: i128, size: OpSize) -> FlagUpdate {
    FlagUpdate::zero_sign(size.truncate(result)).with(Flags::OF, overflows(result, size))
}

fn logical_flags(result: i128) -> FlagUpdate {
    FlagUpdate::zero_sign(result)
        .with(Flags::OF, false)
        .with(Flags::CF, false)
}
