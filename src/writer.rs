//! # Write Operator
//!
//! Writes one catalog value over its own short-lived connection. Writes
//! never touch the snapshot store; the new value shows up after the next
//! polling cycle reads it back.

use tracing::{error, info};

use crate::catalog::RegisterDescriptor;
use crate::client::ModbusClient;
use crate::codec::{encode, value_from_f64};
use crate::device_limits::DeviceLimits;
use crate::error::WriteError;
use crate::protocol::SlaveId;
use crate::session::Connector;
use crate::value::RegisterValue;

/// Encode `value` and write it with FC16 at the descriptor's address.
///
/// The connection is closed whether or not the write succeeds. Failures are
/// logged and returned, never retried.
pub async fn write_value<C: Connector>(
    connector: &C,
    unit_id: SlaveId,
    limits: &DeviceLimits,
    descriptor: &RegisterDescriptor,
    value: RegisterValue,
) -> Result<(), WriteError> {
    if !descriptor.is_writable() {
        return Err(WriteError::ReadOnly {
            name: descriptor.name,
        });
    }

    let words = encode(&value, descriptor.datatype)?;
    if words.len() > limits.max_write_registers as usize {
        return Err(WriteError::TooLarge {
            count: words.len(),
            max: limits.max_write_registers,
        });
    }

    let mut client = connector.connect().await.map_err(|source| {
        error!("Write of {} failed, cannot connect: {}", descriptor.name, source);
        WriteError::Connect {
            endpoint: connector.endpoint(),
            source,
        }
    })?;

    let result = client.write_10(unit_id, descriptor.address, &words).await;
    if let Err(e) = client.close().await {
        error!("Close after write failed: {}", e);
    }

    match result {
        Ok(()) => {
            info!("Wrote {} = {} at {}", descriptor.name, value, descriptor.address);
            Ok(())
        }
        Err(source) => {
            error!("Error writing registers: addr={} count={}: {}", descriptor.address, words.len(), source);
            Err(WriteError::Rejected {
                address: descriptor.address,
                count: words.len(),
                source,
            })
        }
    }
}

/// Range-check a numeric value against the descriptor's datatype, then write it.
pub async fn write_f64<C: Connector>(
    connector: &C,
    unit_id: SlaveId,
    limits: &DeviceLimits,
    descriptor: &RegisterDescriptor,
    value: f64,
) -> Result<(), WriteError> {
    if !descriptor.is_writable() {
        return Err(WriteError::ReadOnly {
            name: descriptor.name,
        });
    }
    let value = value_from_f64(value, descriptor.datatype)?;
    write_value(connector, unit_id, limits, descriptor, value).await
}
