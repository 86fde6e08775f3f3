//! Modbus client
//!
//! The application layer (request construction, response validation) lives
//! in [`GenericModbusClient`] and works over any [`ModbusTransport`]; the
//! TCP client is a thin wrapper around it.
//!
//! # API Naming Convention
//!
//! | Function Code | Primary Name | Semantic Alias |
//! |---------------|--------------|----------------|
//! | 0x03 | `read_03()` | `read_holding_registers()` |
//! | 0x10 | `write_10()` | `write_multiple_registers()` |
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use plenticore_modbus::{Endpoint, ModbusClient, ModbusResult, ModbusTcpClient, Timeouts};
//!
//! #[tokio::main]
//! async fn main() -> ModbusResult<()> {
//!     let endpoint: Endpoint = "192.168.1.50:1502".parse()?;
//!     let mut client = ModbusTcpClient::connect(&endpoint, &Timeouts::default()).await?;
//!
//!     // inverter state, controller temperature
//!     let registers = client.read_03(71, 56, 44).await?;
//!     println!("Registers: {:?}", registers);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;

use crate::config::{Endpoint, Timeouts};
use crate::constants::{MAX_READ_REGISTERS, MAX_WRITE_REGISTERS};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{ModbusRequest, ModbusResponse, SlaveId};
use crate::transport::{ModbusTransport, TcpTransport, TransportStats};

/// Holding-register operations against one device.
///
/// | Operation | Limit |
/// |-----------|-------|
/// | Read Holding Registers (0x03) | 125 registers |
/// | Write Multiple Registers (0x10) | 123 registers |
pub trait ModbusClient: Send + Sync {
    /// Read holding registers (function code 0x03).
    ///
    /// # Arguments
    ///
    /// * `slave_id` - The Modbus unit ID
    /// * `address` - Starting register address (0-65535)
    /// * `quantity` - Number of registers to read (1-125)
    ///
    /// Returns exactly `quantity` words or an error.
    fn read_03(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send;

    /// Write multiple registers (function code 0x10).
    ///
    /// # Arguments
    ///
    /// * `slave_id` - The Modbus unit ID
    /// * `address` - Starting register address (0-65535)
    /// * `values` - Words to write (1-123 registers)
    fn write_10(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<()>> + Send;

    fn is_connected(&self) -> bool;

    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    fn get_stats(&self) -> TransportStats;

    /// Alias for [`read_03`](Self::read_03).
    fn read_holding_registers(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send {
        self.read_03(slave_id, address, quantity)
    }

    /// Alias for [`write_10`](Self::write_10).
    fn write_multiple_registers(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        self.write_10(slave_id, address, values)
    }
}

/// Client over any transport.
pub struct GenericModbusClient<T: ModbusTransport> {
    transport: T,
}

impl<T: ModbusTransport> GenericModbusClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Execute a raw request
    pub async fn execute_request(&mut self, request: ModbusRequest) -> ModbusResult<ModbusResponse> {
        self.transport.request(&request).await
    }
}

impl<T: ModbusTransport + Send + Sync> ModbusClient for GenericModbusClient<T> {
    async fn read_03(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> ModbusResult<Vec<u16>> {
        if quantity == 0 || quantity as usize > MAX_READ_REGISTERS {
            return Err(ModbusError::invalid_data(format!(
                "Invalid quantity {} for FC03",
                quantity
            )));
        }

        let request = ModbusRequest::read_holding_registers(slave_id, address, quantity);
        let response = self.execute_request(request).await?;
        response.parse_registers(quantity)
    }

    async fn write_10(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[u16],
    ) -> ModbusResult<()> {
        if values.is_empty() || values.len() > MAX_WRITE_REGISTERS {
            return Err(ModbusError::invalid_data(format!(
                "Invalid quantity {} for FC16",
                values.len()
            )));
        }

        let request = ModbusRequest::write_multiple_registers(slave_id, address, values);
        let response = self.execute_request(request).await?;
        response.check_write_echo(address, values.len() as u16)
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        self.transport.close().await
    }

    fn get_stats(&self) -> TransportStats {
        self.transport.get_stats()
    }
}

/// Client over one Modbus/TCP connection.
pub type ModbusTcpClient = GenericModbusClient<TcpTransport>;

impl GenericModbusClient<TcpTransport> {
    /// Open the connection. The socket lives until `close` or drop.
    pub async fn connect(endpoint: &Endpoint, timeouts: &Timeouts) -> ModbusResult<Self> {
        let transport = TcpTransport::connect(endpoint, timeouts).await?;
        Ok(Self::new(transport))
    }

    pub fn server_address(&self) -> SocketAddr {
        self.transport.address
    }

    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.transport.set_packet_logging(enabled);
    }
}
