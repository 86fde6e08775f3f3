//! # Register Value Types
//!
//! The closed set of datatypes found in the inverter's register map and the
//! typed values decoded from them.
//!
//! | Datatype | Registers | Wire layout |
//! |----------|-----------|-------------|
//! | U16 | 1 | single word |
//! | I16 | 1 | single word, two's complement |
//! | U32 | 2 | word-swapped (low word first) |
//! | F32 | 2 | word-swapped IEEE-754 |

use std::fmt;

/// Datatype of a holding register (or register pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    /// Unsigned 16-bit integer (1 register)
    U16,
    /// Signed 16-bit integer (1 register)
    I16,
    /// Unsigned 32-bit integer (2 registers)
    U32,
    /// IEEE-754 single precision float (2 registers)
    F32,
}

impl Datatype {
    /// Number of 16-bit registers occupied.
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Datatype::U16 | Datatype::I16 => 1,
            Datatype::U32 | Datatype::F32 => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Datatype::U16 => "uint16",
            Datatype::I16 => "int16",
            Datatype::U32 => "uint32",
            Datatype::F32 => "float32",
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded register value.
///
/// # Example
///
/// ```rust
/// use plenticore_modbus::{Datatype, RegisterValue};
///
/// let power = RegisterValue::F32(1532.5);
/// assert_eq!(power.datatype(), Datatype::F32);
/// assert_eq!(power.register_count(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterValue {
    U16(u16),
    I16(i16),
    U32(u32),
    F32(f32),
}

impl RegisterValue {
    /// Convert to f64 for uniform numeric handling.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match self {
            RegisterValue::U16(v) => f64::from(*v),
            RegisterValue::I16(v) => f64::from(*v),
            RegisterValue::U32(v) => f64::from(*v),
            RegisterValue::F32(v) => f64::from(*v),
        }
    }

    /// The datatype this value encodes to.
    #[inline]
    pub fn datatype(&self) -> Datatype {
        match self {
            RegisterValue::U16(_) => Datatype::U16,
            RegisterValue::I16(_) => Datatype::I16,
            RegisterValue::U32(_) => Datatype::U32,
            RegisterValue::F32(_) => Datatype::F32,
        }
    }

    /// Number of 16-bit registers required for this value.
    #[inline]
    pub fn register_count(&self) -> usize {
        self.datatype().width()
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::U16(v) => write!(f, "{}", v),
            RegisterValue::I16(v) => write!(f, "{}", v),
            RegisterValue::U32(v) => write!(f, "{}", v),
            RegisterValue::F32(v) => write!(f, "{}", v),
        }
    }
}

impl From<u16> for RegisterValue {
    fn from(v: u16) -> Self {
        RegisterValue::U16(v)
    }
}

impl From<i16> for RegisterValue {
    fn from(v: i16) -> Self {
        RegisterValue::I16(v)
    }
}

impl From<u32> for RegisterValue {
    fn from(v: u32) -> Self {
        RegisterValue::U32(v)
    }
}

impl From<f32> for RegisterValue {
    fn from(v: f32) -> Self {
        RegisterValue::F32(v)
    }
}
