//! # Word Order Handling
//!
//! 32-bit values occupy two consecutive holding registers. Each register is
//! big-endian on the wire; what varies between devices is the order of the
//! two words.
//!
//! For the 32-bit value `0x12345678`:
//! - `HighFirst (ABCD)`: registers \[0x1234, 0x5678\]
//! - `LowFirst (CDAB)`: registers \[0x5678, 0x1234\] (KOSTAL default)

use std::fmt;

/// Order of the two 16-bit words of a 32-bit value.
///
/// # Example
///
/// ```rust
/// use plenticore_modbus::WordOrder;
///
/// let order = WordOrder::default();
/// assert_eq!(order, WordOrder::LowFirst);
/// assert!(order.is_swapped());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WordOrder {
    /// ABCD: high word transmitted first
    HighFirst,
    /// CDAB: high word transmitted second ("word-swapped")
    #[default]
    LowFirst,
}

impl WordOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighFirst => "ABCD (high word first)",
            Self::LowFirst => "CDAB (low word first)",
        }
    }

    /// True when the device order is the reverse of standard big-endian.
    #[inline]
    pub fn is_swapped(&self) -> bool {
        matches!(self, Self::LowFirst)
    }
}

impl fmt::Display for WordOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Register to Numeric Conversions
// ============================================================================

/// Assemble two registers in device order into big-endian bytes.
///
/// ```rust
/// use plenticore_modbus::{regs_to_bytes_4, WordOrder};
///
/// let regs = [0x5678, 0x1234];
/// assert_eq!(regs_to_bytes_4(&regs, WordOrder::LowFirst), [0x12, 0x34, 0x56, 0x78]);
/// ```
#[inline]
pub fn regs_to_bytes_4(regs: &[u16; 2], order: WordOrder) -> [u8; 4] {
    let (high, low) = match order {
        WordOrder::HighFirst => (regs[0], regs[1]),
        WordOrder::LowFirst => (regs[1], regs[0]),
    };
    let [a, b] = high.to_be_bytes();
    let [c, d] = low.to_be_bytes();
    [a, b, c, d]
}

/// Split big-endian bytes into two registers in device order.
#[inline]
pub fn bytes_4_to_regs(bytes: &[u8; 4], order: WordOrder) -> [u16; 2] {
    let high = u16::from_be_bytes([bytes[0], bytes[1]]);
    let low = u16::from_be_bytes([bytes[2], bytes[3]]);
    match order {
        WordOrder::HighFirst => [high, low],
        WordOrder::LowFirst => [low, high],
    }
}

#[inline]
pub fn regs_to_u32(regs: &[u16; 2], order: WordOrder) -> u32 {
    u32::from_be_bytes(regs_to_bytes_4(regs, order))
}

#[inline]
pub fn regs_to_f32(regs: &[u16; 2], order: WordOrder) -> f32 {
    f32::from_be_bytes(regs_to_bytes_4(regs, order))
}

#[inline]
pub fn u32_to_regs(value: u32, order: WordOrder) -> [u16; 2] {
    bytes_4_to_regs(&value.to_be_bytes(), order)
}

#[inline]
pub fn f32_to_regs(value: f32, order: WordOrder) -> [u16; 2] {
    bytes_4_to_regs(&value.to_be_bytes(), order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_swapped() {
        assert_eq!(WordOrder::default(), WordOrder::LowFirst);
        assert!(!WordOrder::HighFirst.is_swapped());
    }

    #[test]
    fn test_regs_to_u32() {
        let regs = [0x1234, 0x5678];
        assert_eq!(regs_to_u32(&regs, WordOrder::HighFirst), 0x1234_5678);
        assert_eq!(regs_to_u32(&regs, WordOrder::LowFirst), 0x5678_1234);
    }

    #[test]
    fn test_regs_to_f32_swapped() {
        // 25.0 = 0x41C80000, low word first on the wire
        let regs = [0x0000, 0x41C8];
        assert_eq!(regs_to_f32(&regs, WordOrder::LowFirst), 25.0);
    }

    #[test]
    fn test_u32_to_regs_inverse() {
        for order in [WordOrder::HighFirst, WordOrder::LowFirst] {
            let regs = u32_to_regs(0xDEAD_BEEF, order);
            assert_eq!(regs_to_u32(&regs, order), 0xDEAD_BEEF, "{:?}", order);
        }
        assert_eq!(u32_to_regs(0x0001_0002, WordOrder::LowFirst), [0x0002, 0x0001]);
    }
}
