//! # Modbus Codec
//!
//! Conversion between raw holding-register words and typed values, plus the
//! PDU helpers for the two function codes the bridge speaks.
//!
//! ## Supported Data Types
//!
//! | Type | Registers | Notes |
//! |------|-----------|-------|
//! | u16 | 1 | |
//! | i16 | 1 | two's complement |
//! | u32 | 2 | word-swapped on the device |
//! | f32 | 2 | word-swapped IEEE-754 on the device |
//!
//! Every datatype is handled through one dispatch table ([`TypeCodec`]), so
//! adding a type means adding one table row.

use crate::bytes::{f32_to_regs, regs_to_f32, regs_to_u32, u32_to_regs, WordOrder};
use crate::constants::{
    EXCEPTION_FLAG, FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS,
};
use crate::error::{CodecError, ModbusError, ModbusResult};
use crate::pdu::{ModbusPdu, PduBuilder};
use crate::value::{Datatype, RegisterValue};

/// Word order used by the inverter for all 32-bit values.
pub const DEVICE_WORD_ORDER: WordOrder = WordOrder::LowFirst;

/// Modbus codec for PDU encoding/decoding.
pub struct ModbusCodec;

// ============================================================================
// Dispatch Table
// ============================================================================

/// Width and conversion functions of one datatype.
///
/// `decode` receives exactly `width` words. `encode` returns `None` when the
/// value variant does not belong to this datatype.
pub struct TypeCodec {
    pub width: usize,
    pub decode: fn(&[u16], WordOrder) -> RegisterValue,
    pub encode: fn(&RegisterValue, WordOrder) -> Option<Vec<u16>>,
}

static U16_CODEC: TypeCodec = TypeCodec {
    width: 1,
    decode: decode_u16,
    encode: encode_u16,
};

static I16_CODEC: TypeCodec = TypeCodec {
    width: 1,
    decode: decode_i16,
    encode: encode_i16,
};

static U32_CODEC: TypeCodec = TypeCodec {
    width: 2,
    decode: decode_u32,
    encode: encode_u32,
};

static F32_CODEC: TypeCodec = TypeCodec {
    width: 2,
    decode: decode_f32,
    encode: encode_f32,
};

/// Table row for a datatype.
#[inline]
pub fn type_codec(datatype: Datatype) -> &'static TypeCodec {
    match datatype {
        Datatype::U16 => &U16_CODEC,
        Datatype::I16 => &I16_CODEC,
        Datatype::U32 => &U32_CODEC,
        Datatype::F32 => &F32_CODEC,
    }
}

fn decode_u16(words: &[u16], _order: WordOrder) -> RegisterValue {
    RegisterValue::U16(words[0])
}

fn decode_i16(words: &[u16], _order: WordOrder) -> RegisterValue {
    RegisterValue::I16(words[0] as i16)
}

fn decode_u32(words: &[u16], order: WordOrder) -> RegisterValue {
    RegisterValue::U32(regs_to_u32(&[words[0], words[1]], order))
}

fn decode_f32(words: &[u16], order: WordOrder) -> RegisterValue {
    RegisterValue::F32(regs_to_f32(&[words[0], words[1]], order))
}

fn encode_u16(value: &RegisterValue, _order: WordOrder) -> Option<Vec<u16>> {
    match value {
        RegisterValue::U16(v) => Some(vec![*v]),
        _ => None,
    }
}

fn encode_i16(value: &RegisterValue, _order: WordOrder) -> Option<Vec<u16>> {
    match value {
        RegisterValue::I16(v) => Some(vec![*v as u16]),
        _ => None,
    }
}

fn encode_u32(value: &RegisterValue, order: WordOrder) -> Option<Vec<u16>> {
    match value {
        RegisterValue::U32(v) => Some(u32_to_regs(*v, order).to_vec()),
        _ => None,
    }
}

fn encode_f32(value: &RegisterValue, order: WordOrder) -> Option<Vec<u16>> {
    match value {
        RegisterValue::F32(v) => Some(f32_to_regs(*v, order).to_vec()),
        _ => None,
    }
}

// ============================================================================
// Decoding Functions
// ============================================================================

/// Decode register words in device word order.
///
/// The slice must hold exactly as many words as the datatype occupies.
///
/// # Example
///
/// ```rust
/// use plenticore_modbus::{decode, Datatype, RegisterValue};
///
/// // 25.0 = 0x41C80000, low word first on the wire
/// let value = decode(&[0x0000, 0x41C8], Datatype::F32).unwrap();
/// assert_eq!(value, RegisterValue::F32(25.0));
/// ```
pub fn decode(words: &[u16], datatype: Datatype) -> Result<RegisterValue, CodecError> {
    decode_with_order(words, datatype, DEVICE_WORD_ORDER)
}

/// Decode register words with an explicit word order.
pub fn decode_with_order(
    words: &[u16],
    datatype: Datatype,
    order: WordOrder,
) -> Result<RegisterValue, CodecError> {
    let codec = type_codec(datatype);
    if words.len() != codec.width {
        return Err(CodecError::WordCount {
            datatype,
            expected: codec.width,
            actual: words.len(),
        });
    }
    Ok((codec.decode)(words, order))
}

// ============================================================================
// Encoding Functions
// ============================================================================

/// Encode a typed value into register words in device word order.
///
/// Exact inverse of [`decode`]. The value variant must match the datatype.
pub fn encode(value: &RegisterValue, datatype: Datatype) -> Result<Vec<u16>, CodecError> {
    encode_with_order(value, datatype, DEVICE_WORD_ORDER)
}

/// Encode a typed value with an explicit word order.
pub fn encode_with_order(
    value: &RegisterValue,
    datatype: Datatype,
    order: WordOrder,
) -> Result<Vec<u16>, CodecError> {
    (type_codec(datatype).encode)(value, order).ok_or_else(|| CodecError::TypeMismatch {
        datatype,
        value: format!("{:?}", value),
    })
}

/// Convert a numeric value into the typed value of a datatype.
///
/// Integer types round to the nearest integer and reject anything outside
/// the type's range. Non-finite input is rejected for every type.
///
/// ```rust
/// use plenticore_modbus::{value_from_f64, Datatype, RegisterValue};
///
/// assert_eq!(value_from_f64(20.0, Datatype::F32).unwrap(), RegisterValue::F32(20.0));
/// assert!(value_from_f64(-1.0, Datatype::U16).is_err());
/// ```
pub fn value_from_f64(value: f64, datatype: Datatype) -> Result<RegisterValue, CodecError> {
    let out_of_range = || CodecError::OutOfRange { datatype, value };

    if !value.is_finite() {
        return Err(out_of_range());
    }

    let (min, max): (f64, f64) = match datatype {
        Datatype::U16 => (0.0, f64::from(u16::MAX)),
        Datatype::I16 => (f64::from(i16::MIN), f64::from(i16::MAX)),
        Datatype::U32 => (0.0, f64::from(u32::MAX)),
        Datatype::F32 => (f64::from(f32::MIN), f64::from(f32::MAX)),
    };

    let value = match datatype {
        Datatype::F32 => value,
        _ => value.round(),
    };
    if value < min || value > max {
        return Err(out_of_range());
    }

    Ok(match datatype {
        Datatype::U16 => RegisterValue::U16(value as u16),
        Datatype::I16 => RegisterValue::I16(value as i16),
        Datatype::U32 => RegisterValue::U32(value as u32),
        Datatype::F32 => RegisterValue::F32(value as f32),
    })
}

/// Number of registers occupied by a datatype.
#[inline]
pub fn registers_for_type(datatype: Datatype) -> usize {
    type_codec(datatype).width
}

// ============================================================================
// PDU Functions
// ============================================================================

impl ModbusCodec {
    /// Build request PDU for FC03 (Read Holding Registers).
    pub fn build_fc03_pdu(start_address: u16, quantity: u16) -> ModbusResult<ModbusPdu> {
        PduBuilder::build_read_holding_registers(start_address, quantity)
    }

    /// Build request PDU for FC16 (Write Multiple Registers).
    pub fn build_fc16_pdu(start_address: u16, values: &[u16]) -> ModbusResult<ModbusPdu> {
        PduBuilder::build_write_multiple_registers(start_address, values)
    }

    /// Parse an FC03 response PDU into register words.
    ///
    /// The byte count must match both the PDU length and the requested
    /// quantity; a short or padded response is a protocol error.
    pub fn parse_fc03_response(pdu: &ModbusPdu, expected_count: u16) -> ModbusResult<Vec<u16>> {
        Self::check_function(pdu, FC_READ_HOLDING_REGISTERS)?;

        let data = pdu.as_slice();
        if data.len() < 2 {
            return Err(ModbusError::protocol("FC03 response missing byte count"));
        }

        let byte_count = data[1] as usize;
        if byte_count != data.len() - 2 {
            return Err(ModbusError::protocol(format!(
                "FC03 byte count {} does not match payload length {}",
                byte_count,
                data.len() - 2
            )));
        }
        if byte_count != expected_count as usize * 2 {
            return Err(ModbusError::protocol(format!(
                "FC03 returned {} bytes, expected {} registers",
                byte_count, expected_count
            )));
        }

        Ok(data[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Parse an FC16 response PDU, which echoes the address and quantity.
    pub fn parse_fc16_response(pdu: &ModbusPdu, address: u16, quantity: u16) -> ModbusResult<()> {
        Self::check_function(pdu, FC_WRITE_MULTIPLE_REGISTERS)?;

        match (pdu.u16_at(1), pdu.u16_at(3)) {
            (Some(echo_address), Some(echo_quantity))
                if echo_address == address && echo_quantity == quantity =>
            {
                Ok(())
            }
            (Some(echo_address), Some(echo_quantity)) => Err(ModbusError::protocol(format!(
                "FC16 echo mismatch: wrote {}x{}, device acknowledged {}x{}",
                address, quantity, echo_address, echo_quantity
            ))),
            _ => Err(ModbusError::protocol("FC16 response too short")),
        }
    }

    /// Turn exception responses into errors and verify the function code.
    fn check_function(pdu: &ModbusPdu, expected_fc: u8) -> ModbusResult<()> {
        let fc = pdu
            .function_code()
            .ok_or_else(|| ModbusError::protocol("Empty response PDU"))?;

        if pdu.is_exception() {
            return Err(ModbusError::exception(
                fc & !EXCEPTION_FLAG,
                pdu.exception_code().unwrap_or(0),
            ));
        }

        if fc != expected_fc {
            return Err(ModbusError::protocol(format!(
                "Function code mismatch: expected {:02X}, got {:02X}",
                expected_fc, fc
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_uint16() {
        assert_eq!(decode(&[0x1234], Datatype::U16).unwrap(), RegisterValue::U16(0x1234));
    }

    #[test]
    fn test_decode_int16_twos_complement() {
        assert_eq!(decode(&[0xFFFF], Datatype::I16).unwrap(), RegisterValue::I16(-1));
        assert_eq!(decode(&[0x8000], Datatype::I16).unwrap(), RegisterValue::I16(i16::MIN));
    }

    #[test]
    fn test_decode_float32_word_swapped() {
        // Device sends the low word first
        let value = decode(&[0x0FDB, 0x4049], Datatype::F32).unwrap();
        match value {
            RegisterValue::F32(f) => {
                assert_eq!(f.to_bits(), 0x4049_0FDB);
                assert!((f - std::f32::consts::PI).abs() < 1e-6);
            }
            other => panic!("expected F32, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_uint32_word_swapped() {
        assert_eq!(
            decode(&[0x0006, 0x0000], Datatype::U32).unwrap(),
            RegisterValue::U32(6)
        );
        assert_eq!(
            decode_with_order(&[0x1234, 0x5678], Datatype::U32, WordOrder::HighFirst).unwrap(),
            RegisterValue::U32(0x1234_5678)
        );
    }

    #[test]
    fn test_decode_wrong_word_count() {
        let err = decode(&[0x0000], Datatype::F32).unwrap_err();
        assert_eq!(
            err,
            CodecError::WordCount {
                datatype: Datatype::F32,
                expected: 2,
                actual: 1
            }
        );
        assert!(decode(&[0, 0], Datatype::U16).is_err());
    }

    #[test]
    fn test_encode_float32_word_swapped() {
        let words = encode(&RegisterValue::F32(20.0), Datatype::F32).unwrap();
        // 20.0 = 0x41A00000
        assert_eq!(words, vec![0x0000, 0x41A0]);
    }

    #[test]
    fn test_encode_int16() {
        assert_eq!(encode(&RegisterValue::I16(-2), Datatype::I16).unwrap(), vec![0xFFFE]);
    }

    #[test]
    fn test_encode_type_mismatch() {
        let err = encode(&RegisterValue::U16(5), Datatype::F32).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { datatype: Datatype::F32, .. }));
    }

    #[test]
    fn test_value_from_f64_ranges() {
        assert_eq!(value_from_f64(12.6, Datatype::U16).unwrap(), RegisterValue::U16(13));
        assert_eq!(value_from_f64(-3000.0, Datatype::I16).unwrap(), RegisterValue::I16(-3000));
        assert!(value_from_f64(70000.0, Datatype::U16).is_err());
        assert!(value_from_f64(-40000.0, Datatype::I16).is_err());
        assert!(value_from_f64(f64::NAN, Datatype::F32).is_err());
        assert!(value_from_f64(f64::INFINITY, Datatype::F32).is_err());
        assert!(value_from_f64(1e40, Datatype::F32).is_err());
    }

    #[test]
    fn test_registers_for_type() {
        assert_eq!(registers_for_type(Datatype::I16), 1);
        assert_eq!(registers_for_type(Datatype::U32), 2);
    }

    #[test]
    fn test_parse_fc03_response() {
        let pdu = ModbusPdu::from_slice(&[0x03, 0x04, 0x0F, 0xDB, 0x40, 0x49]).unwrap();
        let regs = ModbusCodec::parse_fc03_response(&pdu, 2).unwrap();
        assert_eq!(regs, vec![0x0FDB, 0x4049]);
    }

    #[test]
    fn test_parse_fc03_response_short() {
        let pdu = ModbusPdu::from_slice(&[0x03, 0x04, 0x0F, 0xDB]).unwrap();
        assert!(ModbusCodec::parse_fc03_response(&pdu, 2).is_err());

        let pdu = ModbusPdu::from_slice(&[0x03, 0x02, 0x0F, 0xDB]).unwrap();
        assert!(ModbusCodec::parse_fc03_response(&pdu, 2).is_err());
    }

    #[test]
    fn test_parse_exception_response() {
        let pdu = ModbusPdu::from_slice(&[0x83, 0x02]).unwrap();
        let err = ModbusCodec::parse_fc03_response(&pdu, 2).unwrap_err();
        assert!(matches!(err, ModbusError::Exception { function: 0x03, code: 0x02, .. }));
    }

    #[test]
    fn test_parse_fc16_response() {
        let pdu = ModbusPdu::from_slice(&[0x10, 0x04, 0x12, 0x00, 0x02]).unwrap();
        assert!(ModbusCodec::parse_fc16_response(&pdu, 1042, 2).is_ok());
        assert!(ModbusCodec::parse_fc16_response(&pdu, 1044, 2).is_err());
    }

    #[test]
    fn test_build_fc16_pdu() {
        let pdu = ModbusCodec::build_fc16_pdu(0x0100, &[0x1234, 0x5678]).unwrap();
        assert_eq!(
            pdu.as_slice(),
            &[0x10, 0x01, 0x00, 0x00, 0x02, 0x04, 0x12, 0x34, 0x56, 0x78]
        );
    }

    proptest! {
        #[test]
        fn prop_float32_roundtrip_is_bit_exact(bits in any::<u32>()) {
            let value = RegisterValue::F32(f32::from_bits(bits));
            let words = encode(&value, Datatype::F32).unwrap();
            match decode(&words, Datatype::F32).unwrap() {
                RegisterValue::F32(back) => prop_assert_eq!(back.to_bits(), bits),
                other => prop_assert!(false, "expected F32, got {:?}", other),
            }
        }

        #[test]
        fn prop_int16_roundtrip(v in any::<i16>()) {
            let words = encode(&RegisterValue::I16(v), Datatype::I16).unwrap();
            prop_assert_eq!(decode(&words, Datatype::I16).unwrap(), RegisterValue::I16(v));
        }
    }
}
