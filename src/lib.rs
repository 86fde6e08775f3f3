//! # Plenticore Modbus - Polling Bridge for KOSTAL Plenticore Inverters
//!
//! Periodically reads the inverter's holding registers over Modbus/TCP in a
//! few large batched requests, keeps the latest register image in memory
//! and serves typed values out of it. Settings such as the battery's minimum
//! state of charge are written back with a single FC16 request.
//!
//! ## Features
//!
//! - **Batched Reads**: the register catalog is merged into at most a handful
//!   of FC03 requests of up to 125 registers
//! - **Word-Swapped Decoding**: 32-bit values come low word first
//! - **Partial Failure**: one failed block never discards the others
//! - **Snapshot Store**: readers never block the polling cycle
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Client |
//! |------|----------|--------|
//! | 0x03 | Read Holding Registers | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plenticore_modbus::{BridgeConfig, InverterBridge};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = InverterBridge::new(BridgeConfig::new("192.168.1.50"))?;
//!
//!     let snapshot = bridge.poll().await;
//!     println!("Inverter is {} ({})", snapshot.inverter_state, snapshot.status);
//!     println!("Home consumption: {} W", bridge.read_float32(116)?);
//!
//!     bridge.set_min_soc(20.0).await?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus protocol constants
pub mod constants;

/// PDU with stack-allocated fixed array
pub mod pdu;

/// Request and response types
pub mod protocol;

/// Modbus/TCP transport
pub mod transport;

/// Modbus client implementations
pub mod client;

/// Subscriber setup for binaries
pub mod logging;

// ============================================================================
// Data modules
// ============================================================================

/// Register datatypes and decoded values
pub mod value;

/// Word order handling for 32-bit values
pub mod bytes;

/// Encoding and decoding of register values
pub mod codec;

/// Device-specific protocol limits
pub mod device_limits;

// ============================================================================
// Bridge modules
// ============================================================================

/// Endpoint, timeouts and bridge settings
pub mod config;

/// Plenticore register catalog
pub mod catalog;

/// Batched read planning
pub mod plan;

/// Register image and snapshot store
pub mod snapshot;

/// One polling cycle
pub mod session;

/// Register writes
pub mod writer;

/// Per-device bridge
pub mod bridge;

#[cfg(test)]
mod mock;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime ===
pub use tokio;

// === Bridge API ===
pub use bridge::InverterBridge;
pub use config::{BridgeConfig, Endpoint, Timeouts};
pub use snapshot::{CycleStats, DeviceStatus, InverterState, Snapshot, SnapshotStore};

// === Core client API ===
pub use client::{GenericModbusClient, ModbusClient, ModbusTcpClient};
pub use session::{Connector, CycleOutcome, PollSession, TcpConnector};

// === Error handling ===
pub use error::{BlockReadError, CodecError, CycleError, ModbusError, ModbusResult, WriteError};

// === Core types ===
pub use bytes::WordOrder;
pub use catalog::{Access, RegisterCatalog, RegisterDescriptor};
pub use plan::{ReadBlock, ReadPlan};
pub use protocol::{ModbusFunction, ModbusRequest, ModbusResponse, SlaveId};
pub use value::{Datatype, RegisterValue};

// === Codec ===
pub use codec::{decode, encode, value_from_f64, ModbusCodec, DEVICE_WORD_ORDER};
pub use device_limits::DeviceLimits;
pub use writer::{write_f64, write_value};

// === Monitoring ===
pub use transport::{ModbusTransport, TcpTransport, TransportStats};

// === Protocol limits ===
pub use constants::{MAX_PDU_SIZE, MAX_READ_REGISTERS, MAX_WRITE_REGISTERS};

// === Logging ===
pub use logging::LogLevel;

// === PDU (advanced usage) ===
pub use pdu::{ModbusPdu, PduBuilder};

#[doc(hidden)]
pub use bytes::{regs_to_bytes_4, regs_to_f32, regs_to_u32};
#[doc(hidden)]
pub use codec::registers_for_type;

/// Plenticore Modbus/TCP default port
pub const DEFAULT_TCP_PORT: u16 = config::DEFAULT_PORT;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!(
        "Plenticore Modbus v{} - Modbus/TCP polling bridge for KOSTAL Plenticore inverters",
        VERSION
    )
}
