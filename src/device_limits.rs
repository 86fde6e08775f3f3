//! # Device Limits
//!
//! Per-device caps on request sizes and pacing.
//!
//! | Operation | Protocol maximum | Used by |
//! |-----------|------------------|---------|
//! | FC03 read | 125 registers | read plan block size |
//! | FC16 write | 123 registers | write operator |
//!
//! Some firmware answers large reads slowly or not at all; lower caps and an
//! inter-request delay trade more round trips for reliability.

use crate::constants::{MAX_READ_REGISTERS, MAX_WRITE_REGISTERS};
use crate::error::{ModbusError, ModbusResult};

/// Default maximum registers per read request.
pub const DEFAULT_MAX_READ_REGISTERS: u16 = MAX_READ_REGISTERS as u16;

/// Default maximum registers per write request.
pub const DEFAULT_MAX_WRITE_REGISTERS: u16 = MAX_WRITE_REGISTERS as u16;

/// Default pause between consecutive block reads.
pub const DEFAULT_INTER_REQUEST_DELAY_MS: u64 = 0;

/// Request-size and pacing limits of one device.
///
/// # Example
///
/// ```rust
/// use plenticore_modbus::DeviceLimits;
///
/// let limits = DeviceLimits::new()
///     .with_max_read_registers(64)
///     .with_inter_request_delay_ms(20);
///
/// assert_eq!(limits.max_read_registers, 64);
/// assert!(limits.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Maximum registers per FC03 request.
    pub max_read_registers: u16,
    /// Maximum registers per FC16 request.
    pub max_write_registers: u16,
    /// Minimum delay between requests on one connection (milliseconds).
    pub inter_request_delay_ms: u64,
}

impl DeviceLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits for slow or unreliable links: 50-register requests, 10ms gaps.
    pub fn conservative() -> Self {
        Self {
            max_read_registers: 50,
            max_write_registers: 50,
            inter_request_delay_ms: 10,
        }
    }

    pub fn with_max_read_registers(mut self, count: u16) -> Self {
        self.max_read_registers = count;
        self
    }

    pub fn with_max_write_registers(mut self, count: u16) -> Self {
        self.max_write_registers = count;
        self
    }

    pub fn with_inter_request_delay_ms(mut self, delay_ms: u64) -> Self {
        self.inter_request_delay_ms = delay_ms;
        self
    }

    /// Check if a read request is within limits.
    #[inline]
    pub fn is_read_within_limits(&self, register_count: u16) -> bool {
        register_count <= self.max_read_registers
    }

    /// Check if a write request is within limits.
    #[inline]
    pub fn is_write_within_limits(&self, register_count: u16) -> bool {
        register_count <= self.max_write_registers
    }

    /// Reject zero caps and caps above the protocol maxima.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.max_read_registers == 0 || self.max_read_registers > DEFAULT_MAX_READ_REGISTERS {
            return Err(ModbusError::configuration(format!(
                "max_read_registers must be 1-{}, got {}",
                DEFAULT_MAX_READ_REGISTERS, self.max_read_registers
            )));
        }
        if self.max_write_registers == 0 || self.max_write_registers > DEFAULT_MAX_WRITE_REGISTERS
        {
            return Err(ModbusError::configuration(format!(
                "max_write_registers must be 1-{}, got {}",
                DEFAULT_MAX_WRITE_REGISTERS, self.max_write_registers
            )));
        }
        Ok(())
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_read_registers: DEFAULT_MAX_READ_REGISTERS,
            max_write_registers: DEFAULT_MAX_WRITE_REGISTERS,
            inter_request_delay_ms: DEFAULT_INTER_REQUEST_DELAY_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = DeviceLimits::default();
        assert_eq!(limits.max_read_registers, 125);
        assert_eq!(limits.max_write_registers, 123);
        assert_eq!(limits.inter_request_delay_ms, 0);
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_conservative_limits() {
        let limits = DeviceLimits::conservative();
        assert_eq!(limits.max_read_registers, 50);
        assert_eq!(limits.inter_request_delay_ms, 10);
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_within_limits() {
        let limits = DeviceLimits::new()
            .with_max_read_registers(100)
            .with_max_write_registers(2);

        assert!(limits.is_read_within_limits(100));
        assert!(!limits.is_read_within_limits(101));
        assert!(limits.is_write_within_limits(2));
        assert!(!limits.is_write_within_limits(3));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        assert!(DeviceLimits::new().with_max_read_registers(0).validate().is_err());
        assert!(DeviceLimits::new().with_max_read_registers(126).validate().is_err());
        assert!(DeviceLimits::new().with_max_write_registers(124).validate().is_err());
    }
}
