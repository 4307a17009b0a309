use crate::DEFAULT_STACK_BASE;
use crate::cpu::{CpuState, FlagUpdate, Flags, Register};
use crate::memory::SparseMemory;
use crate::size::OpSize;
use std::fmt;

/// A complete, immutable snapshot of the simulated machine.
///
/// Every mutator returns a fresh state; the receiver is left untouched so
/// that a history of snapshots can be kept for stepping backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineState {
    cpu: CpuState,
    memory: SparseMemory,
    /// Number of lines evaluated to reach this state.
    step: usize,
    stack_base: u64,
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_BASE)
    }
}

impl MachineState {
    /// Zeroed registers and memory, `%rsp` pointing at `stack_base`.
    pub fn new(stack_base: u64) -> Self {
        let mut cpu = CpuState::new();
        cpu.write_reg(Register::RSP, stack_base);
        Self {
            cpu,
            memory: SparseMemory::new(),
            step: 0,
            stack_base,
        }
    }

    pub fn cpu(&self) -> &CpuState {
        &self.cpu
    }

    pub fn memory(&self) -> &SparseMemory {
        &self.memory
    }

    pub fn rip(&self) -> usize {
        self.cpu.rip
    }

    pub fn call_depth(&self) -> i64 {
        self.cpu.call_depth
    }

    pub fn flags(&self) -> Flags {
        self.cpu.rflags
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn stack_base(&self) -> u64 {
        self.stack_base
    }

    /// Whether execution has run off the end of a program of
    /// `program_len` lines or returned from the top level.
    pub fn is_finished(&self, program_len: usize) -> bool {
        self.cpu.rip >= program_len || self.cpu.call_depth < 0
    }

    /// Signed value of a register view.
    pub fn read_register(&self, reg: Register) -> i128 {
        reg.size().truncate(self.cpu.read_reg(reg) as i128)
    }

    /// Raw bits of a register view.
    pub fn read_register_bits(&self, reg: Register) -> u64 {
        self.cpu.read_reg(reg)
    }

    /// Signed little-endian value of `size` bytes at `address`.
    pub fn read_memory(&self, address: u64, size: OpSize) -> i128 {
        let mut buf = [0u8; 8];
        self.memory.read(address, &mut buf[..size.bytes()]);
        size.truncate(u64::from_le_bytes(buf) as i128)
    }

    pub fn write_register(
        &self,
        reg: Register,
        value: Option<i128>,
        flags: FlagUpdate,
        advance_rip: bool,
    ) -> MachineState {
        let mut next = self.clone();
        if let Some(value) = value {
            next.set_register(reg, value);
        }
        next.finish_write(flags, advance_rip);
        next
    }

    pub fn write_memory(
        &self,
        address: u64,
        value: Option<i128>,
        size: OpSize,
        flags: FlagUpdate,
        advance_rip: bool,
    ) -> MachineState {
        let mut next = self.clone();
        if let Some(value) = value {
            next.store(address, value, size);
        }
        next.finish_write(flags, advance_rip);
        next
    }

    /// Flags and RIP only.
    pub fn with_flags(&self, flags: FlagUpdate, advance_rip: bool) -> MachineState {
        let mut next = self.clone();
        next.finish_write(flags, advance_rip);
        next
    }

    pub fn advance(&self) -> MachineState {
        self.with_flags(FlagUpdate::none(), true)
    }

    pub fn jump_to(&self, line: usize) -> MachineState {
        let mut next = self.clone();
        next.cpu.rip = line;
        next
    }

    /// Returns a copy with one register replaced, for seeding initial
    /// states. RIP and flags are unchanged.
    pub fn with_register(&self, reg: Register, value: u64) -> MachineState {
        let mut next = self.clone();
        next.cpu.write_reg(reg, value);
        next
    }

    pub(crate) fn set_register(&mut self, reg: Register, value: i128) {
        self.cpu.write_reg(reg, value as u64);
    }

    pub(crate) fn store(&mut self, address: u64, value: i128, size: OpSize) {
        let bytes = (value as u64).to_le_bytes();
        self.memory.write(address, &bytes[..size.bytes()], self.step);
    }

    pub(crate) fn set_rip(&mut self, line: usize) {
        self.cpu.rip = line;
    }

    pub(crate) fn adjust_call_depth(&mut self, delta: i64) {
        self.cpu.call_depth += delta;
    }

    pub(crate) fn finish_write(&mut self, flags: FlagUpdate, advance_rip: bool) {
        self.cpu.rflags = flags.apply(self.cpu.rflags);
        if advance_rip {
            self.cpu.rip += 1;
        }
    }

    pub(crate) fn count_step(mut self) -> MachineState {
        self.step += 1;
        self
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.cpu)?;
        write!(f, "  memory: {} byte(s) written, step {}", self.memory.len(), self.step)
    }
}
