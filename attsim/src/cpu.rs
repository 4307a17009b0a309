use crate::size::OpSize;
use bitflags::bitflags;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Register {
    RAX,
    RBX,
    RCX,
    RDX,
    RSI,
    RDI,
    RBP,
    RSP,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    EAX,
    EBX,
    ECX,
    EDX,
    ESI,
    EDI,
    EBP,
    ESP,
    R8D,
    R9D,
    R10D,
    R11D,
    R12D,
    R13D,
    R14D,
    R15D,
    AX,
    BX,
    CX,
    DX,
    SI,
    DI,
    BP,
    SP,
    R8W,
    R9W,
    R10W,
    R11W,
    R12W,
    R13W,
    R14W,
    R15W,
    AL,
    BL,
    CL,
    DL,
    SIL,
    DIL,
    BPL,
    SPL,
    R8B,
    R9B,
    R10B,
    R11B,
    R12B,
    R13B,
    R14B,
    R15B,
    AH,
    BH,
    CH,
    DH,
}

impl Register {
    /// The sixteen canonical 64-bit registers in display order.
    pub const QUADS: [Register; 16] = [
        Register::RAX,
        Register::RBX,
        Register::RCX,
        Register::RDX,
        Register::RSI,
        Register::RDI,
        Register::RBP,
        Register::RSP,
        Register::R8,
        Register::R9,
        Register::R10,
        Register::R11,
        Register::R12,
        Register::R13,
        Register::R14,
        Register::R15,
    ];

    pub const ALL: [Register; 68] = {
        use Register::*;
        [
            RAX, RBX, RCX, RDX, RSI, RDI, RBP, RSP, R8, R9, R10, R11, R12, R13, R14, R15, EAX, EBX,
            ECX, EDX, ESI, EDI, EBP, ESP, R8D, R9D, R10D, R11D, R12D, R13D, R14D, R15D, AX, BX, CX,
            DX, SI, DI, BP, SP, R8W, R9W, R10W, R11W, R12W, R13W, R14W, R15W, AL, BL, CL, DL, SIL,
            DIL, BPL, SPL, R8B, R9B, R10B, R11B, R12B, R13B, R14B, R15B, AH, BH, CH, DH,
        ]
    };

    pub fn size(&self) -> OpSize {
        use Register::*;
        match self {
            RAX | RBX | RCX | RDX | RSI | RDI | RBP | RSP | R8 | R9 | R10 | R11 | R12 | R13
            | R14 | R15 => OpSize::Quad,
            EAX | EBX | ECX | EDX | ESI | EDI | EBP | ESP | R8D | R9D | R10D | R11D | R12D
            | R13D | R14D | R15D => OpSize::Long,
            AX | BX | CX | DX | SI | DI | BP | SP | R8W | R9W | R10W | R11W | R12W | R13W
            | R14W | R15W => OpSize::Word,
            AL | BL | CL | DL | SIL | DIL | BPL | SPL | R8B | R9B | R10B | R11B | R12B | R13B
            | R14B | R15B | AH | BH | CH | DH => OpSize::Byte,
        }
    }

    pub fn parent_64(&self) -> Register {
        use Register::*;
        match self {
            RAX | EAX | AX | AL | AH => RAX,
            RBX | EBX | BX | BL | BH => RBX,
            RCX | ECX | CX | CL | CH => RCX,
            RDX | EDX | DX | DL | DH => RDX,
            RSI | ESI | SI | SIL => RSI,
            RDI | EDI | DI | DIL => RDI,
            RBP | EBP | BP | BPL => RBP,
            RSP | ESP | SP | SPL => RSP,
            R8 | R8D | R8W | R8B => R8,
            R9 | R9D | R9W | R9B => R9,
            R10 | R10D | R10W | R10B => R10,
            R11 | R11D | R11W | R11B => R11,
            R12 | R12D | R12W | R12B => R12,
            R13 | R13D | R13W | R13B => R13,
            R14 | R14D | R14W | R14B => R14,
            R15 | R15D | R15W | R15B => R15,
        }
    }

    pub fn is_high_byte(&self) -> bool {
        matches!(self, Register::AH | Register::BH | Register::CH | Register::DH)
    }

    /// Bit offset of this view inside its 64-bit parent.
    fn shift(&self) -> u32 {
        if self.is_high_byte() { 8 } else { 0 }
    }

    /// The view of this register's family with the given width. High-byte
    /// registers resolve through their parent, so `AH` at `Word` is `AX`.
    pub fn with_size(&self, size: OpSize) -> Register {
        let parent = self.parent_64();
        Register::ALL
            .into_iter()
            .find(|r| r.parent_64() == parent && r.size() == size && !r.is_high_byte())
            .unwrap_or(parent)
    }

    pub fn name(&self) -> &'static str {
        use Register::*;
        match self {
            RAX => "rax",
            RBX => "rbx",
            RCX => "rcx",
            RDX => "rdx",
            RSI => "rsi",
            RDI => "rdi",
            RBP => "rbp",
            RSP => "rsp",
            R8 => "r8",
            R9 => "r9",
            R10 => "r10",
            R11 => "r11",
            R12 => "r12",
            R13 => "r13",
            R14 => "r14",
            R15 => "r15",
            EAX => "eax",
            EBX => "ebx",
            ECX => "ecx",
            EDX => "edx",
            ESI => "esi",
            EDI => "edi",
            EBP => "ebp",
            ESP => "esp",
            R8D => "r8d",
            R9D => "r9d",
            R10D => "r10d",
            R11D => "r11d",
            R12D => "r12d",
            R13D => "r13d",
            R14D => "r14d",
            R15D => "r15d",
            AX => "ax",
            BX => "bx",
            CX => "cx",
            DX => "dx",
            SI => "si",
            DI => "di",
            BP => "bp",
            SP => "sp",
            R8W => "r8w",
            R9W => "r9w",
            R10W => "r10w",
            R11W => "r11w",
            R12W => "r12w",
            R13W => "r13w",
            R14W => "r14w",
            R15W => "r15w",
            AL => "al",
            BL => "bl",
            CL => "cl",
            DL => "dl",
            SIL => "sil",
            DIL => "dil",
            BPL => "bpl",
            SPL => "spl",
            R8B => "r8b",
            R9B => "r9b",
            R10B => "r10b",
            R11B => "r11b",
            R12B => "r12b",
            R13B => "r13b",
            R14B => "r14b",
            R15B => "r15b",
            AH => "ah",
            BH => "bh",
            CH => "ch",
            DH => "dh",
        }
    }

    /// Looks up a register by its name without the `%` sigil, ignoring case.
    pub fn from_name(name: &str) -> Option<Register> {
        let lower = name.to_ascii_lowercase();
        Register::ALL.into_iter().find(|r| r.name() == lower)
    }

    /// Slot of the canonical register in `CpuState::regs`.
    fn index(&self) -> usize {
        use Register::*;
        match self.parent_64() {
            RAX => 0,
            RCX => 1,
            RDX => 2,
            RBX => 3,
            RSP => 4,
            RBP => 5,
            RSI => 6,
            RDI => 7,
            R8 => 8,
            R9 => 9,
            R10 => 10,
            R11 => 11,
            R12 => 12,
            R13 => 13,
            R14 => 14,
            _ => 15,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.name())
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u64 {
        const CF = 1 << 0;     // Carry Flag
        const ZF = 1 << 6;     // Zero Flag
        const SF = 1 << 7;     // Sign Flag
        const OF = 1 << 11;    // Overflow Flag
    }
}

/// A partial assignment to the status flags. Flags outside `mask` keep the
/// value they had in the previous state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagUpdate {
    mask: Flags,
    values: Flags,
}

impl Default for FlagUpdate {
    fn default() -> Self {
        Self::none()
    }
}

impl FlagUpdate {
    pub fn none() -> Self {
        Self {
            mask: Flags::empty(),
            values: Flags::empty(),
        }
    }

    /// ZF and SF derived from an already-truncated result.
    pub fn zero_sign(result: i128) -> Self {
        Self::none()
            .with(Flags::ZF, result == 0)
            .with(Flags::SF, result < 0)
    }

    pub fn with(mut self, flag: Flags, value: bool) -> Self {
        self.mask.insert(flag);
        self.values.set(flag, value);
        self
    }

    pub fn touches(&self, flag: Flags) -> bool {
        self.mask.contains(flag)
    }

    pub fn apply(&self, flags: Flags) -> Flags {
        (flags & !self.mask) | (self.values & self.mask)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuState {
    pub regs: [u64; 16],
    /// Index of the next program line to execute.
    pub rip: usize,
    pub rflags: Flags,
    /// Number of CALLs not yet matched by a RET; negative once the
    /// top-level RET has run.
    pub call_depth: i64,
}

impl Default for CpuState {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuState {
    pub fn new() -> Self {
        Self {
            regs: [0; 16],
            rip: 0,
            rflags: Flags::empty(),
            call_depth: 0,
        }
    }

    /// Raw bits of the register view, zero-extended.
    pub fn read_reg(&self, reg: Register) -> u64 {
        let full = self.regs[reg.index()];
        (full >> reg.shift()) & reg.size().mask()
    }

    /// Splices the low bits of `value` into the view's byte range. Bytes
    /// outside the view are left untouched, for every width.
    pub fn write_reg(&mut self, reg: Register, value: u64) {
        let mask = reg.size().mask() << reg.shift();
        let slot = &mut self.regs[reg.index()];
        *slot = (*slot & !mask) | ((value << reg.shift()) & mask);
    }
}

impl fmt::Display for CpuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CPU State:")?;
        for pair in Register::QUADS.chunks(2) {
            writeln!(
                f,
                "  {:<4} {:#018x}  {:<4} {:#018x}",
                format!("{}:", pair[0].name().to_uppercase()),
                self.read_reg(pair[0]),
                format!("{}:", pair[1].name().to_uppercase()),
                self.read_reg(pair[1])
            )?;
        }
        writeln!(f, "  RIP: line {}  depth: {}", self.rip, self.call_depth)?;
        write!(
            f,
            "  FLAGS: ZF={} SF={} OF={} CF={}",
            self.rflags.contains(Flags::ZF) as u8,
            self.rflags.contains(Flags::SF) as u8,
            self.rflags.contains(Flags::OF) as u8,
            self.rflags.contains(Flags::CF) as u8
        )
    }
}
