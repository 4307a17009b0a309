use crate::cpu::Register;
use crate::instruction::InstructionKind;
use crate::label::LabelId;
use crate::operand::Operand;
use crate::size::OpSize;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operands {
    Nullary,
    Unary(Operand),
    Binary { source: Operand, destination: Operand },
}

impl Operands {
    pub fn len(&self) -> usize {
        match self {
            Operands::Nullary => 0,
            Operands::Unary(_) => 1,
            Operands::Binary { .. } => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Operands::Nullary)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operand> {
        let (a, b) = match self {
            Operands::Nullary => (None, None),
            Operands::Unary(op) => (Some(op), None),
            Operands::Binary {
                source,
                destination,
            } => (Some(source), Some(destination)),
        };
        a.into_iter().chain(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstructionKind,
    /// Width of the destination (or only) operand.
    pub size: OpSize,
    /// Width of the source operand; differs from `size` only for MOVZ/MOVS.
    pub source_size: OpSize,
    pub operands: Operands,
}

impl Instruction {
    pub fn mnemonic(&self) -> String {
        self.kind.mnemonic(self.size, self.source_size)
    }

    /// Canonical registers read or written, including implicit ones.
    pub fn used_registers(&self) -> BTreeSet<Register> {
        let mut used: BTreeSet<Register> =
            self.operands.iter().flat_map(|op| op.used_registers()).collect();
        match self.kind {
            InstructionKind::Push
            | InstructionKind::Pop
            | InstructionKind::Call
            | InstructionKind::Ret => {
                used.insert(Register::RSP);
            }
            InstructionKind::Idiv => {
                used.insert(Register::RAX);
                if self.size != OpSize::Byte {
                    used.insert(Register::RDX);
                }
            }
            InstructionKind::Clt => {
                used.insert(Register::RAX);
            }
            _ => {}
        }
        used
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;
        match &self.operands {
            Operands::Nullary => Ok(()),
            Operands::Unary(op) => write!(f, " {}", op),
            Operands::Binary {
                source,
                destination,
            } => write!(f, " {}, {}", source, destination),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Blank,
    /// A line holding only a comment.
    Comment,
    Label { id: LabelId, name: String },
    Instruction(Instruction),
}

/// One parsed source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLine {
    pub number: usize,
    pub statement: Statement,
    /// Text after `#`, without the `#` itself.
    pub comment: Option<String>,
    pub breakpoint: bool,
}

impl ProgramLine {
    pub fn instruction(&self) -> Option<&Instruction> {
        match &self.statement {
            Statement::Instruction(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn is_instruction(&self) -> bool {
        self.instruction().is_some()
    }

    pub fn used_registers(&self) -> BTreeSet<Register> {
        self.instruction()
            .map(Instruction::used_registers)
            .unwrap_or_default()
    }
}

impl fmt::Display for ProgramLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.statement {
            Statement::Blank | Statement::Comment => String::new(),
            Statement::Label { name, .. } => format!("{}:", name),
            Statement::Instruction(inst) => inst.to_string(),
        };
        match &self.comment {
            Some(comment) if body.is_empty() => write!(f, "#{}", comment),
            Some(comment) => write!(f, "{} #{}", body, comment),
            None => write!(f, "{}", body),
        }
    }
}
