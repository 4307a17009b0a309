use crate::cpu::Flags;
use crate::size::OpSize;
use std::fmt;

/// Condition codes usable by `set<cc>` and `j<cc>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    E,
    Ne,
    S,
    Ns,
    G,
    Ge,
    L,
    Le,
    A,
    Ae,
    B,
    Be,
}

impl Condition {
    pub const ALL: [Condition; 12] = [
        Condition::E,
        Condition::Ne,
        Condition::S,
        Condition::Ns,
        Condition::G,
        Condition::Ge,
        Condition::L,
        Condition::Le,
        Condition::A,
        Condition::Ae,
        Condition::B,
        Condition::Be,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Condition::E => "e",
            Condition::Ne => "ne",
            Condition::S => "s",
            Condition::Ns => "ns",
            Condition::G => "g",
            Condition::Ge => "ge",
            Condition::L => "l",
            Condition::Le => "le",
            Condition::A => "a",
            Condition::Ae => "ae",
            Condition::B => "b",
            Condition::Be => "be",
        }
    }

    pub fn from_name(name: &str) -> Option<Condition> {
        Condition::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn holds(self, flags: Flags) -> bool {
        let zf = flags.contains(Flags::ZF);
        let sf = flags.contains(Flags::SF);
        let of = flags.contains(Flags::OF);
        let cf = flags.contains(Flags::CF);
        match self {
            Condition::E => zf,
            Condition::Ne => !zf,
            Condition::S => sf,
            Condition::Ns => !sf,
            Condition::G => !zf && (sf == of),
            Condition::Ge => sf == of,
            Condition::L => sf != of,
            Condition::Le => zf || (sf != of),
            Condition::A => !cf && !zf,
            Condition::Ae => !cf,
            Condition::B => cf,
            Condition::Be => cf || zf,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Add,
    Sub,
    Imul,
    Cmp,
    Or,
    And,
    Test,
    Xor,
    Sal,
    Shl,
    Sar,
    Shr,
    Mov,
    Movz,
    Movs,
    Lea,
    Idiv,
    Inc,
    Dec,
    Neg,
    Not,
    Push,
    Pop,
    Set(Condition),
    J(Condition),
    Jmp,
    Call,
    Ret,
    Clt,
}

/// Instructions spelled `<base><b|w|l|q>`.
pub(crate) const ONE_SUFFIX: [InstructionKind; 18] = [
    InstructionKind::Add,
    InstructionKind::Sub,
    InstructionKind::Imul,
    InstructionKind::Cmp,
    InstructionKind::Or,
    InstructionKind::And,
    InstructionKind::Test,
    InstructionKind::Xor,
    InstructionKind::Sal,
    InstructionKind::Shl,
    InstructionKind::Sar,
    InstructionKind::Shr,
    InstructionKind::Mov,
    InstructionKind::Idiv,
    InstructionKind::Inc,
    InstructionKind::Dec,
    InstructionKind::Neg,
    InstructionKind::Not,
];

/// Instructions that only exist with the `q` suffix.
pub(crate) const QUAD_ONLY: [InstructionKind; 6] = [
    InstructionKind::Lea,
    InstructionKind::Push,
    InstructionKind::Pop,
    InstructionKind::Call,
    InstructionKind::Ret,
    InstructionKind::Clt,
];

/// Instructions spelled `<base><source suffix><destination suffix>`.
pub(crate) const TWO_SUFFIX: [InstructionKind; 2] = [InstructionKind::Movz, InstructionKind::Movs];

impl InstructionKind {
    /// Mnemonic without any size suffix (`"add"`, `"movz"`, `"jge"`).
    pub fn base_name(self) -> String {
        match self {
            InstructionKind::Set(cc) => format!("set{}", cc.name()),
            InstructionKind::J(cc) => format!("j{}", cc.name()),
            other => other.plain_name().to_string(),
        }
    }

    fn plain_name(self) -> &'static str {
        match self {
            InstructionKind::Add => "add",
            InstructionKind::Sub => "sub",
            InstructionKind::Imul => "imul",
            InstructionKind::Cmp => "cmp",
            InstructionKind::Or => "or",
            InstructionKind::And => "and",
            InstructionKind::Test => "test",
            InstructionKind::Xor => "xor",
            InstructionKind::Sal => "sal",
            InstructionKind::Shl => "shl",
            InstructionKind::Sar => "sar",
            InstructionKind::Shr => "shr",
            InstructionKind::Mov => "mov",
            InstructionKind::Movz => "movz",
            InstructionKind::Movs => "movs",
            InstructionKind::Lea => "lea",
            InstructionKind::Idiv => "idiv",
            InstructionKind::Inc => "inc",
            InstructionKind::Dec => "dec",
            InstructionKind::Neg => "neg",
            InstructionKind::Not => "not",
            InstructionKind::Push => "push",
            InstructionKind::Pop => "pop",
            InstructionKind::Jmp => "jmp",
            InstructionKind::Call => "call",
            InstructionKind::Ret => "ret",
            InstructionKind::Clt => "clt",
            InstructionKind::Set(_) => "set",
            InstructionKind::J(_) => "j",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            InstructionKind::Ret | InstructionKind::Clt => 0,
            InstructionKind::Idiv
            | InstructionKind::Inc
            | InstructionKind::Dec
            | InstructionKind::Neg
            | InstructionKind::Not
            | InstructionKind::Push
            | InstructionKind::Pop
            | InstructionKind::Set(_)
            | InstructionKind::J(_)
            | InstructionKind::Jmp
            | InstructionKind::Call => 1,
            _ => 2,
        }
    }

    pub fn is_conditional_family(self) -> bool {
        matches!(
            self,
            InstructionKind::Set(_) | InstructionKind::J(_) | InstructionKind::Jmp
        )
    }

    /// Full mnemonic as written in source, e.g. `addq`, `movzbl`, `jne`.
    pub fn mnemonic(self, size: OpSize, source_size: OpSize) -> String {
        if self.is_conditional_family() {
            self.base_name()
        } else if TWO_SUFFIX.contains(&self) {
            format!("{}{}{}", self.plain_name(), source_size.suffix(), size.suffix())
        } else {
            format!("{}{}", self.plain_name(), size.suffix())
        }
    }

    /// What each operand slot accepts, given the sizes decoded from the
    /// mnemonic. For binary instructions the source slot comes first.
    pub fn requirements(self, size: OpSize, source_size: OpSize) -> Vec<OperandRequirements> {
        use InstructionKind::*;
        match self {
            Add | Sub | Imul | Cmp | Or | And | Test | Xor | Mov => vec![
                OperandRequirements::value(size),
                OperandRequirements::location(size),
            ],
            Sal | Shl | Sar | Shr => vec![
                OperandRequirements {
                    size: OpSize::Byte,
                    constant: true,
                    register: true,
                    memory: false,
                    label: false,
                },
                OperandRequirements::location(size),
            ],
            Movz | Movs => vec![
                OperandRequirements::location(source_size),
                OperandRequirements::register_only(size),
            ],
            Lea => vec![
                OperandRequirements {
                    size,
                    constant: false,
                    register: false,
                    memory: true,
                    label: false,
                },
                OperandRequirements::register_only(size),
            ],
            Idiv | Inc | Dec | Neg | Not | Pop | Set(_) => {
                vec![OperandRequirements::location(size)]
            }
            Push => vec![OperandRequirements::value(size)],
            J(_) | Jmp | Call => vec![OperandRequirements::label()],
            Ret | Clt => vec![],
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base_name())
    }
}

/// What a single operand slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandRequirements {
    pub size: OpSize,
    pub constant: bool,
    pub register: bool,
    pub memory: bool,
    pub label: bool,
}

impl OperandRequirements {
    fn value(size: OpSize) -> Self {
        Self {
            size,
            constant: true,
            register: true,
            memory: true,
            label: false,
        }
    }

    fn location(size: OpSize) -> Self {
        Self {
            size,
            constant: false,
            register: true,
            memory: true,
            label: false,
        }
    }

    fn register_only(size: OpSize) -> Self {
        Self {
            size,
            constant: false,
            register: true,
            memory: false,
            label: false,
        }
    }

    fn label() -> Self {
        Self {
            size: OpSize::Byte,
            constant: false,
            register: false,
            memory: false,
            label: true,
        }
    }
}

/// Every mnemonic the parser accepts, paired with the destination size its
/// suffix denotes (`None` for the conditional family).
pub fn all_mnemonics() -> Vec<(String, Option<OpSize>)> {
    let mut out = Vec::new();
    for kind in ONE_SUFFIX {
        for size in OpSize::ALL {
            out.push((kind.mnemonic(size, size), Some(size)));
        }
    }
    for kind in QUAD_ONLY {
        out.push((kind.mnemonic(OpSize::Quad, OpSize::Quad), Some(OpSize::Quad)));
    }
    for kind in TWO_SUFFIX {
        for source in OpSize::ALL {
            for dest in OpSize::ALL.into_iter().filter(|d| *d > source) {
                out.push((kind.mnemonic(dest, source), Some(dest)));
            }
        }
    }
    for cc in Condition::ALL {
        out.push((InstructionKind::Set(cc).base_name(), None));
        out.push((InstructionKind::J(cc).base_name(), None));
    }
    out.push(("jmp".to_string(), None));
    out
}
