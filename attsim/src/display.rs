//! Read-only views of a machine state for front-ends.

use crate::cpu::{Flags, Register};
use crate::size::OpSize;
use crate::state::MachineState;
use std::collections::BTreeSet;

/// Stack views are cut off after this many 8-byte slots.
pub const MAX_STACK_ENTRIES: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterView {
    pub register: Register,
    pub name: String,
    /// Not serialized, `hex` carries the same bits.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub value: u64,
    pub hex: String,
    /// 0 if used by the most recent step, 1 for the one before, and so on.
    pub rank: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StackEntry {
    pub start: u64,
    /// Exclusive.
    pub end: u64,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub value: u64,
    pub hex: String,
    /// Steps since any byte of the slot was last written.
    pub rank: Option<usize>,
}

/// The sixteen 64-bit registers in fixed order. `usage_history[i]` holds
/// the registers used by step `i`; the last entry is the most recent step.
pub fn registers_for_display(
    state: &MachineState,
    usage_history: &[BTreeSet<Register>],
) -> Vec<RegisterView> {
    Register::QUADS
        .into_iter()
        .map(|register| {
            let value = state.read_register_bits(register);
            let rank = usage_history
                .iter()
                .rev()
                .position(|used| used.contains(&register));
            RegisterView {
                register,
                name: register.to_string(),
                value,
                hex: format!("{:#018x}", value),
                rank,
            }
        })
        .collect()
}

/// 8-byte slots from `%rsp` up to the stack base, lowest address first.
pub fn stack_entries_for_display(state: &MachineState) -> Vec<StackEntry> {
    let base = state.stack_base();
    let mut address = state.read_register_bits(Register::RSP);
    let mut entries = Vec::new();
    while address < base && entries.len() < MAX_STACK_ENTRIES {
        let value = state.read_memory(address, OpSize::Quad) as u64;
        let rank = state
            .memory()
            .last_write(address, 8)
            .map(|written| state.step().saturating_sub(written + 1));
        entries.push(StackEntry {
            start: address,
            end: address.saturating_add(8),
            value,
            hex: format!("{:#018x}", value),
            rank,
        });
        address = address.saturating_add(8);
    }
    entries
}

pub fn zero_flag(state: &MachineState) -> bool {
    state.flags().contains(Flags::ZF)
}

pub fn sign_flag(state: &MachineState) -> bool {
    state.flags().contains(Flags::SF)
}

pub fn overflow_flag(state: &MachineState) -> bool {
    state.flags().contains(Flags::OF)
}

pub fn carry_flag(state: &MachineState) -> bool {
    state.flags().contains(Flags::CF)
}
