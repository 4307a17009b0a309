use std::fmt;

/// Operand width of an instruction, named after its AT&T suffix letter.
///
/// Ordering follows the width, so `OpSize::Byte < OpSize::Quad`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpSize {
    Byte,
    Word,
    Long,
    Quad,
}

impl OpSize {
    pub const ALL: [OpSize; 4] = [OpSize::Byte, OpSize::Word, OpSize::Long, OpSize::Quad];

    pub fn bytes(self) -> usize {
        match self {
            OpSize::Byte => 1,
            OpSize::Word => 2,
            OpSize::Long => 4,
            OpSize::Quad => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    pub fn suffix(self) -> char {
        match self {
            OpSize::Byte => 'b',
            OpSize::Word => 'w',
            OpSize::Long => 'l',
            OpSize::Quad => 'q',
        }
    }

    pub fn from_suffix(c: char) -> Option<OpSize> {
        match c {
            'b' => Some(OpSize::Byte),
            'w' => Some(OpSize::Word),
            'l' => Some(OpSize::Long),
            'q' => Some(OpSize::Quad),
            _ => None,
        }
    }

    pub fn mask(self) -> u64 {
        match self {
            OpSize::Quad => u64::MAX,
            _ => (1u64 << self.bits()) - 1,
        }
    }

    /// Keeps the low `bits()` bits of `value` and reinterprets them as a
    /// signed two's-complement number of this width.
    pub fn truncate(self, value: i128) -> i128 {
        let shift = 128 - self.bits();
        (value << shift) >> shift
    }

    /// Keeps the low `bits()` bits of `value` as an unsigned number.
    pub fn zero_extend(self, value: i128) -> i128 {
        value & self.mask() as i128
    }

    /// Whether `value` is representable as a signed number of this width.
    pub fn fits(self, value: i128) -> bool {
        bit_length(value) + 1 <= self.bits()
    }
}

impl fmt::Display for OpSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

/// Number of bits in the minimal two's-complement representation of
/// `value`, excluding the sign bit.
pub fn bit_length(value: i128) -> u32 {
    if value >= 0 {
        128 - value.leading_zeros()
    } else {
        128 - (!value).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_length() {
        assert_eq!(bit_length(0), 0);
        assert_eq!(bit_length(1), 1);
        assert_eq!(bit_length(-1), 0);
        assert_eq!(bit_length(127), 7);
        assert_eq!(bit_length(-128), 7);
        assert_eq!(bit_length(128), 8);
        assert_eq!(bit_length(0x8000_0000), 32);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OpSize::Byte.truncate(0xff), -1);
        assert_eq!(OpSize::Byte.truncate(0x180), -128);
        assert_eq!(OpSize::Word.truncate(0x1_2345), 0x2345);
        assert_eq!(OpSize::Long.truncate(0x8000_0000), -0x8000_0000);
        assert_eq!(OpSize::Quad.truncate(u64::MAX as i128), -1);
        assert_eq!(OpSize::Quad.truncate(-5), -5);
    }

    #[test]
    fn test_fits() {
        assert!(OpSize::Byte.fits(127));
        assert!(OpSize::Byte.fits(-128));
        assert!(!OpSize::Byte.fits(128));
        assert!(!OpSize::Byte.fits(255));
        assert!(OpSize::Quad.fits(i64::MIN as i128));
        assert!(!OpSize::Quad.fits(i64::MAX as i128 + 1));
    }

    #[test]
    fn test_suffix_roundtrip_and_order() {
        for size in OpSize::ALL {
            assert_eq!(OpSize::from_suffix(size.suffix()), Some(size));
        }
        assert_eq!(OpSize::from_suffix('x'), None);
        assert!(OpSize::Byte < OpSize::Word && OpSize::Long < OpSize::Quad);
    }
}
