use std::collections::BTreeMap;

/// Byte-addressed memory that only stores bytes that have been written.
/// Unwritten addresses read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseMemory {
    bytes: BTreeMap<u64, u8>,
    /// Step index of the most recent write to each address.
    written_at: BTreeMap<u64, usize>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, address: u64, buf: &mut [u8]) {
        for (offset, byte) in buf.iter_mut().enumerate() {
            let addr = address.wrapping_add(offset as u64);
            *byte = self.bytes.get(&addr).copied().unwrap_or(0);
        }
    }

    pub fn write(&mut self, address: u64, data: &[u8], step: usize) {
        for (offset, byte) in data.iter().enumerate() {
            let addr = address.wrapping_add(offset as u64);
            self.bytes.insert(addr, *byte);
            self.written_at.insert(addr, step);
        }
    }

    /// Latest write step over `len` bytes starting at `address`.
    pub fn last_write(&self, address: u64, len: usize) -> Option<usize> {
        (0..len as u64)
            .filter_map(|offset| self.written_at.get(&address.wrapping_add(offset)))
            .copied()
            .max()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Written bytes in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u8)> + '_ {
        self.bytes.iter().map(|(a, b)| (*a, *b))
    }
}
