use crate::cpu::{FlagUpdate, Register};
use crate::error::{FaultKind, Result};
use crate::label::{LabelId, LabelTable};
use crate::size::OpSize;
use crate::state::MachineState;
use std::collections::BTreeSet;
use std::fmt;

/// How an immediate was spelled, kept so the canonical text re-parses to the
/// same width check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Radix {
    Decimal,
    Hex { digits: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constant {
    pub value: i128,
    pub radix: Radix,
}

/// `offset(%base, %index, scale)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryOperand {
    pub offset: i64,
    pub base: Register,
    pub index: Option<Register>,
    pub scale: u8,
}

impl MemoryOperand {
    pub fn address(&self, state: &MachineState) -> u64 {
        let base = state.read_register_bits(self.base);
        let index = self
            .index
            .map_or(0, |reg| state.read_register_bits(reg).wrapping_mul(self.scale as u64));
        base.wrapping_add(index).wrapping_add(self.offset as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelRef {
    pub id: LabelId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Constant(Constant),
    Register(Register),
    Memory(MemoryOperand),
    Label(LabelRef),
}

impl Operand {
    /// Signed value of the operand at `size`. A label reads as the line
    /// number it names.
    pub fn read(&self, state: &MachineState, size: OpSize, labels: &LabelTable) -> Result<i128> {
        match self {
            Operand::Constant(c) => Ok(size.truncate(c.value)),
            Operand::Register(reg) => Ok(state.read_register(*reg)),
            Operand::Memory(mem) => Ok(state.read_memory(mem.address(state), size)),
            Operand::Label(label) => {
                let line = labels
                    .line(label.id)
                    .ok_or_else(|| FaultKind::UnresolvedLabel(label.name.clone()))?;
                tracing::trace!(label = %label.name, line, "resolved label");
                Ok(line as i128)
            }
        }
    }

    /// Stores `value` (if any) into this location, merges `flags` and
    /// optionally advances RIP.
    pub fn write(
        &self,
        state: &MachineState,
        value: Option<i128>,
        size: OpSize,
        flags: FlagUpdate,
        advance_rip: bool,
    ) -> Result<MachineState> {
        match self {
            Operand::Register(reg) => Ok(state.write_register(*reg, value, flags, advance_rip)),
            Operand::Memory(mem) => {
                Ok(state.write_memory(mem.address(state), value, size, flags, advance_rip))
            }
            Operand::Constant(c) => Err(FaultKind::Internal(format!(
                "cannot write to constant {}",
                Operand::Constant(*c)
            ))),
            Operand::Label(label) => Err(FaultKind::Internal(format!(
                "cannot write to label {}",
                label.name
            ))),
        }
    }

    /// Canonical 64-bit registers this operand reads or writes.
    pub fn used_registers(&self) -> BTreeSet<Register> {
        match self {
            Operand::Register(reg) => BTreeSet::from([reg.parent_64()]),
            Operand::Memory(mem) => std::iter::once(mem.base)
                .chain(mem.index)
                .map(|r| r.parent_64())
                .collect(),
            Operand::Constant(_) | Operand::Label(_) => BTreeSet::new(),
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Operand::Memory(_))
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.value < 0 { "-" } else { "" };
        let magnitude = self.value.unsigned_abs();
        match self.radix {
            Radix::Decimal => write!(f, "${}{}", sign, magnitude),
            Radix::Hex { digits } => write!(f, "${}0x{:0width$x}", sign, magnitude, width = digits),
        }
    }
}

impl fmt::Display for MemoryOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset != 0 {
            write!(f, "{}", self.offset)?;
        }
        write!(f, "({}", self.base)?;
        if let Some(index) = self.index {
            write!(f, ",{}", index)?;
            if self.scale != 1 {
                write!(f, ",{}", self.scale)?;
            }
        }
        write!(f, ")")
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Constant(c) => write!(f, "{}", c),
            Operand::Register(reg) => write!(f, "{}", reg),
            Operand::Memory(mem) => write!(f, "{}", mem),
            Operand::Label(label) => write!(f, "{}", label.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(offset: i64, base: Register, index: Option<Register>, scale: u8) -> Operand {
        Operand::Memory(MemoryOperand {
            offset,
            base,
            index,
            scale,
        })
    }

    #[test]
    fn test_effective_address() {
        let state = MachineState::new(0x1000)
            .with_register(Register::RAX, 0x100)
            .with_register(Register::RBX, 3);
        let Operand::Memory(m) = mem(-8, Register::RAX, Some(Register::RBX), 4) else {
            unreachable!()
        };
        assert_eq!(m.address(&state), 0x100 + 12 - 8);
    }

    #[test]
    fn test_constant_reads_at_size() {
        let state = MachineState::default();
        let labels = LabelTable::new();
        let ff = Operand::Constant(Constant {
            value: 0xff,
            radix: Radix::Hex { digits: 2 },
        });
        assert_eq!(ff.read(&state, OpSize::Byte, &labels), Ok(-1));
        assert_eq!(ff.read(&state, OpSize::Word, &labels), Ok(0xff));
    }

    #[test]
    fn test_constant_is_not_writable() {
        let state = MachineState::default();
        let c = Operand::Constant(Constant {
            value: 1,
            radix: Radix::Decimal,
        });
        assert!(matches!(
            c.write(&state, Some(2), OpSize::Quad, FlagUpdate::none(), true),
            Err(FaultKind::Internal(_))
        ));
    }

    #[test]
    fn test_unresolved_label() {
        let mut labels = LabelTable::new();
        let id = labels.intern("done");
        let op = Operand::Label(LabelRef {
            id,
            name: "done".into(),
        });
        let state = MachineState::default();
        assert_eq!(
            op.read(&state, OpSize::Quad, &labels),
            Err(FaultKind::UnresolvedLabel("done".into()))
        );
        labels.define(id, 7);
        assert_eq!(op.read(&state, OpSize::Quad, &labels), Ok(7));
    }

    #[test]
    fn test_used_registers_are_canonical() {
        let op = mem(0, Register::RSP, Some(Register::R9), 8);
        assert_eq!(op.used_registers(), BTreeSet::from([Register::RSP, Register::R9]));
        assert_eq!(
            Operand::Register(Register::AH).used_registers(),
            BTreeSet::from([Register::RAX])
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(mem(8, Register::RBP, None, 1).to_string(), "8(%rbp)");
        assert_eq!(
            mem(-16, Register::RAX, Some(Register::RCX), 8).to_string(),
            "-16(%rax,%rcx,8)"
        );
        let c = Constant {
            value: -16,
            radix: Radix::Hex { digits: 2 },
        };
        assert_eq!(c.to_string(), "$-0x10");
    }
}
