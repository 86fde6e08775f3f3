//! # Bridge Configuration
//!
//! Everything needed to reach and poll one inverter.
//!
//! | Setting | Default |
//! |---------|---------|
//! | port | 1502 |
//! | unit id | 71 |
//! | poll interval | 15 s |
//! | connect timeout | 5 s |
//! | request timeout | 3 s |

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::device_limits::DeviceLimits;
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::SlaveId;

/// Modbus/TCP port used by KOSTAL inverters.
pub const DEFAULT_PORT: u16 = 1502;

/// Unit id the inverter answers to.
pub const DEFAULT_UNIT_ID: SlaveId = 71;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(3000);

/// Network address of the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parses `host`, `host:port`, `[v6]` or `[v6]:port`.
impl FromStr for Endpoint {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ModbusError::configuration("empty endpoint"));
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| ModbusError::configuration(format!("unterminated '[' in {}", s)))?;
            match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => {
                    return Err(ModbusError::configuration(format!("invalid endpoint: {}", s)))
                }
            }
        } else if s.matches(':').count() == 1 {
            let (host, port) = s
                .split_once(':')
                .ok_or_else(|| ModbusError::configuration(format!("invalid endpoint: {}", s)))?;
            (host, Some(port))
        } else {
            // bare IPv6 literal or plain host name
            (s, None)
        };

        if host.is_empty() {
            return Err(ModbusError::configuration(format!("missing host in {}", s)));
        }

        let port = match port {
            Some(p) => p
                .parse::<u16>()
                .map_err(|e| ModbusError::configuration(format!("invalid port '{}': {}", p, e)))?,
            None => DEFAULT_PORT,
        };

        Ok(Endpoint::new(host, port))
    }
}

/// Bounds on every network operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect.
    pub connect: Duration,
    /// One request/response exchange.
    pub request: Duration,
}

impl Timeouts {
    /// Same bound for connect and requests.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            connect: timeout,
            request: timeout,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            request: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Configuration of one inverter bridge.
///
/// # Example
///
/// ```rust
/// use plenticore_modbus::BridgeConfig;
/// use std::time::Duration;
///
/// let config = BridgeConfig::new("192.168.1.50")
///     .with_unit_id(71)
///     .with_poll_interval(Duration::from_secs(10));
///
/// assert_eq!(config.endpoint.port, 1502);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub endpoint: Endpoint,
    pub unit_id: SlaveId,
    pub timeouts: Timeouts,
    pub poll_interval: Duration,
    pub limits: DeviceLimits,
    /// Hex-dump every frame at trace level.
    pub packet_logging: bool,
}

impl BridgeConfig {
    /// Defaults for a device at `host` on port 1502.
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_endpoint(Endpoint::new(host, DEFAULT_PORT))
    }

    pub fn with_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            unit_id: DEFAULT_UNIT_ID,
            timeouts: Timeouts::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            limits: DeviceLimits::default(),
            packet_logging: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.endpoint.port = port;
        self
    }

    pub fn with_unit_id(mut self, unit_id: SlaveId) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }

    pub fn validate(&self) -> ModbusResult<()> {
        if self.endpoint.host.is_empty() {
            return Err(ModbusError::configuration("host must not be empty"));
        }
        if !(1..=247).contains(&self.unit_id) {
            return Err(ModbusError::configuration(format!(
                "unit id must be 1-247, got {}",
                self.unit_id
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(ModbusError::configuration("poll interval must be non-zero"));
        }
        if self.timeouts.connect.is_zero() || self.timeouts.request.is_zero() {
            return Err(ModbusError::configuration("timeouts must be non-zero"));
        }
        self.limits.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_endpoint_parse() {
        assert_eq!(
            "192.168.1.50".parse::<Endpoint>().unwrap(),
            Endpoint::new("192.168.1.50", 1502)
        );
        assert_eq!(
            "inverter.local:502".parse::<Endpoint>().unwrap(),
            Endpoint::new("inverter.local", 502)
        );
        assert_eq!("[::1]:1503".parse::<Endpoint>().unwrap(), Endpoint::new("::1", 1503));
        assert_eq!("fe80::1".parse::<Endpoint>().unwrap(), Endpoint::new("fe80::1", 1502));
    }

    #[test]
    fn test_endpoint_parse_errors() {
        assert!("".parse::<Endpoint>().is_err());
        assert!(":1502".parse::<Endpoint>().is_err());
        assert!("host:port".parse::<Endpoint>().is_err());
        assert!("host:70000".parse::<Endpoint>().is_err());
        assert!("[::1".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::new("10.0.0.2", 1502).to_string(), "10.0.0.2:1502");
        assert_eq!(Endpoint::new("::1", 1502).to_string(), "[::1]:1502");
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::new("10.0.0.2");
        assert_eq!(config.unit_id, 71);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.timeouts, Timeouts::default());
        assert!(!config.packet_logging);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert_ok!(BridgeConfig::new("h").with_unit_id(247).validate());
        assert_err!(BridgeConfig::new("h").with_unit_id(0).validate());
        assert_err!(BridgeConfig::new("h").with_unit_id(248).validate());
        assert_err!(BridgeConfig::new("h")
            .with_poll_interval(Duration::ZERO)
            .validate());
        assert_err!(BridgeConfig::new("h")
            .with_request_timeout(Duration::ZERO)
            .validate());
        assert_err!(BridgeConfig::new("h")
            .with_limits(DeviceLimits::new().with_max_read_registers(200))
            .validate());
        assert_err!(BridgeConfig::new("").validate());
    }
}
