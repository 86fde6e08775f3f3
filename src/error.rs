//! Error types
//!
//! Errors are split by the layer that produces them:
//!
//! | Type | Raised by | Effect |
//! |------|-----------|--------|
//! | [`ModbusError`] | transport / client | wire-level failure of one request |
//! | [`CycleError`] | poll session | connection failed, cycle aborted |
//! | [`BlockReadError`] | poll session | one block failed, cycle continues |
//! | [`CodecError`] | codec / snapshot getters | malformed word count or value |
//! | [`WriteError`] | write operator | write failed or was rejected |

use thiserror::Error;

use crate::value::Datatype;

/// Result type for wire-level operations.
pub type ModbusResult<T> = Result<T, ModbusError>;

/// Wire-level Modbus errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModbusError {
    /// Endpoint unreachable, refused or dropped the connection
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Operation did not complete in time
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Socket I/O failure
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Malformed or unexpected frame
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Device answered with an exception response
    #[error("Modbus exception: function=0x{function:02X}, code=0x{code:02X} ({message})")]
    Exception {
        function: u8,
        code: u8,
        message: String,
    },

    /// Function code not supported by this client
    #[error("Invalid function code: 0x{code:02X}")]
    InvalidFunction { code: u8 },

    /// Request parameters out of range
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Bad endpoint or limits configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ModbusError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn exception(function: u8, code: u8) -> Self {
        Self::Exception {
            function,
            code,
            message: crate::constants::exception_description(code).to_string(),
        }
    }

    pub fn invalid_function(code: u8) -> Self {
        Self::InvalidFunction { code }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True when the socket can no longer be used for further requests.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Io { .. })
    }

    /// True for timeouts at any stage.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => ModbusError::connection(err.to_string()),
            _ => ModbusError::io(err.to_string()),
        }
    }
}

/// Failure of a whole polling cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CycleError {
    /// Endpoint unreachable or handshake failed; no block was read.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: ModbusError,
    },
}

/// Failure of a single read block inside a cycle.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("read of {count} registers at {start} failed: {source}")]
pub struct BlockReadError {
    pub start: u16,
    pub count: u16,
    #[source]
    pub source: ModbusError,
}

/// Decode/encode failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("{datatype} needs {expected} register(s), got {actual}")]
    WordCount {
        datatype: Datatype,
        expected: usize,
        actual: usize,
    },

    #[error("{value} cannot be encoded as {datatype}")]
    TypeMismatch { datatype: Datatype, value: String },

    #[error("{value} is out of range for {datatype}")]
    OutOfRange { datatype: Datatype, value: f64 },

    #[error("registers {address}..{end} are outside the register image (len {len})")]
    OutOfImage { address: u16, end: usize, len: usize },
}

/// Failures of the write operator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WriteError {
    #[error("register '{name}' is read-only")]
    ReadOnly { name: &'static str },

    #[error("unknown register '{name}'")]
    UnknownRegister { name: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("write of {count} registers exceeds the device limit of {max}")]
    TooLarge { count: usize, max: u16 },

    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: ModbusError,
    },

    #[error("write of {count} registers at {address} failed: {source}")]
    Rejected {
        address: u16,
        count: usize,
        #[source]
        source: ModbusError,
    },
}
