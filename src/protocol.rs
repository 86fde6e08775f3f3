//! Request/response types exchanged between client and transport.

use std::fmt;

use crate::codec::ModbusCodec;
use crate::constants::{FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS};
use crate::error::{ModbusError, ModbusResult};
use crate::pdu::ModbusPdu;

/// Modbus unit identifier (1-247 on a gateway, 71 on KOSTAL inverters).
pub type SlaveId = u8;

/// Function codes spoken by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModbusFunction {
    ReadHoldingRegisters,
    WriteMultipleRegisters,
}

impl ModbusFunction {
    #[inline]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ReadHoldingRegisters => FC_READ_HOLDING_REGISTERS,
            Self::WriteMultipleRegisters => FC_WRITE_MULTIPLE_REGISTERS,
        }
    }

    pub fn from_u8(code: u8) -> ModbusResult<Self> {
        match code {
            FC_READ_HOLDING_REGISTERS => Ok(Self::ReadHoldingRegisters),
            FC_WRITE_MULTIPLE_REGISTERS => Ok(Self::WriteMultipleRegisters),
            _ => Err(ModbusError::invalid_function(code)),
        }
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ModbusPdu::function_code_description(self.to_u8()))
    }
}

/// One outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusRequest {
    pub slave_id: SlaveId,
    pub function: ModbusFunction,
    pub address: u16,
    pub quantity: u16,
    /// Register values for writes; empty for reads.
    pub values: Vec<u16>,
}

impl ModbusRequest {
    pub fn read_holding_registers(slave_id: SlaveId, address: u16, quantity: u16) -> Self {
        Self {
            slave_id,
            function: ModbusFunction::ReadHoldingRegisters,
            address,
            quantity,
            values: Vec::new(),
        }
    }

    pub fn write_multiple_registers(slave_id: SlaveId, address: u16, values: &[u16]) -> Self {
        Self {
            slave_id,
            function: ModbusFunction::WriteMultipleRegisters,
            address,
            quantity: values.len() as u16,
            values: values.to_vec(),
        }
    }

    /// Encode the request PDU.
    pub fn to_pdu(&self) -> ModbusResult<ModbusPdu> {
        match self.function {
            ModbusFunction::ReadHoldingRegisters => {
                ModbusCodec::build_fc03_pdu(self.address, self.quantity)
            }
            ModbusFunction::WriteMultipleRegisters => {
                ModbusCodec::build_fc16_pdu(self.address, &self.values)
            }
        }
    }
}

/// A successful (non-exception) response.
///
/// Exception responses never reach this type; the transport turns them into
/// [`ModbusError::Exception`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusResponse {
    pub slave_id: SlaveId,
    pub function: ModbusFunction,
    pdu: ModbusPdu,
}

impl ModbusResponse {
    /// Build a response from the PDU bytes that follow the function code.
    ///
    /// Fails if function code and data exceed the maximum PDU size.
    pub fn new_success(
        slave_id: SlaveId,
        function: ModbusFunction,
        data: &[u8],
    ) -> ModbusResult<Self> {
        let mut pdu = ModbusPdu::new();
        pdu.push(function.to_u8())?;
        for &byte in data {
            pdu.push(byte)?;
        }
        Ok(Self {
            slave_id,
            function,
            pdu,
        })
    }

    pub fn from_pdu(slave_id: SlaveId, pdu: ModbusPdu) -> ModbusResult<Self> {
        let code = pdu
            .function_code()
            .ok_or_else(|| ModbusError::protocol("Empty response PDU"))?;
        Ok(Self {
            slave_id,
            function: ModbusFunction::from_u8(code)?,
            pdu,
        })
    }

    /// Bytes after the function code.
    pub fn data(&self) -> &[u8] {
        self.pdu.as_slice().get(1..).unwrap_or(&[])
    }

    pub fn pdu(&self) -> &ModbusPdu {
        &self.pdu
    }

    /// Register words of an FC03 response, checked against the quantity asked for.
    pub fn parse_registers(&self, expected_count: u16) -> ModbusResult<Vec<u16>> {
        ModbusCodec::parse_fc03_response(&self.pdu, expected_count)
    }

    /// Verify the FC16 echo of address and quantity.
    pub fn check_write_echo(&self, address: u16, quantity: u16) -> ModbusResult<()> {
        ModbusCodec::parse_fc16_response(&self.pdu, address, quantity)
    }
}
