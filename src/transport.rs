//! # Modbus/TCP Transport
//!
//! MBAP framing over a `TcpStream`:
//!
//! ```text
//! [Transaction ID(2)][Protocol ID(2)][Length(2)][Unit ID(1)][PDU(N)]
//! ```
//!
//! The receive path reads the 6-byte header first, validates the length
//! field, then reads exactly `length` more bytes. Responses are matched
//! against the request by transaction id and unit id.
//!
//! After an I/O error, a timeout or a malformed frame the stream can no
//! longer be trusted and is dropped; later requests on the same transport
//! fail fast with a connection error.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::config::{Endpoint, Timeouts};
use crate::constants::{MAX_MBAP_LENGTH, MBAP_HEADER_LEN, MODBUS_PROTOCOL_ID};
use crate::error::{ModbusError, ModbusResult};
use crate::pdu::ModbusPdu;
use crate::protocol::{ModbusRequest, ModbusResponse};

/// Per-connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// A request/response channel to one device.
pub trait ModbusTransport: Send + Sync {
    /// Send a request and wait for its response.
    ///
    /// Exception responses are returned as [`ModbusError::Exception`].
    fn request(
        &mut self,
        request: &ModbusRequest,
    ) -> impl Future<Output = ModbusResult<ModbusResponse>> + Send;

    fn is_connected(&self) -> bool;

    /// Close the underlying connection. Closing twice is not an error.
    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send;

    fn get_stats(&self) -> TransportStats;
}

/// Modbus/TCP transport over a single socket.
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    pub address: SocketAddr,
    request_timeout: Duration,
    transaction_id: u16,
    stats: TransportStats,
    packet_logging: bool,
}

impl TcpTransport {
    /// Resolve and connect, bounded by `timeouts.connect`.
    pub async fn connect(endpoint: &Endpoint, timeouts: &Timeouts) -> ModbusResult<Self> {
        debug!("TCP connecting: {}", endpoint);

        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        let stream = match timeout(timeouts.connect, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("TCP connect failed: {} - {}", endpoint, e);
                return Err(ModbusError::connection(format!(
                    "Failed to connect to {}: {}",
                    endpoint, e
                )));
            }
            Err(_) => {
                warn!("TCP connect timeout: {}", endpoint);
                return Err(ModbusError::timeout(
                    format!("connect to {}", endpoint),
                    timeouts.connect.as_millis() as u64,
                ));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("TCP_NODELAY: {}", e);
        }
        let address = stream.peer_addr()?;

        info!("TCP connected: {}", address);
        Ok(Self {
            stream: Some(stream),
            address,
            request_timeout: timeouts.request,
            transaction_id: 0,
            stats: TransportStats::default(),
            packet_logging: false,
        })
    }

    /// Hex-dump every frame at trace level.
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    fn next_transaction_id(&mut self) -> u16 {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        self.transaction_id
    }

    fn encode_frame(transaction_id: u16, unit_id: u8, pdu: &ModbusPdu) -> BytesMut {
        let mut frame = BytesMut::with_capacity(MBAP_HEADER_LEN + 1 + pdu.len());
        frame.put_u16(transaction_id);
        frame.put_u16(MODBUS_PROTOCOL_ID);
        frame.put_u16((pdu.len() + 1) as u16);
        frame.put_u8(unit_id);
        frame.put_slice(pdu.as_slice());
        frame
    }

    async fn exchange(&mut self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        let pdu = request.to_pdu()?;
        let transaction_id = self.next_transaction_id();
        let frame = Self::encode_frame(transaction_id, request.slave_id, &pdu);
        let request_timeout = self.request_timeout;
        let timeout_ms = request_timeout.as_millis() as u64;

        if self.packet_logging {
            trace!("TX [{}]: {}", self.address, hex(&frame));
        }

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ModbusError::connection("Not connected"))?;

        match timeout(request_timeout, stream.write_all(&frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ModbusError::timeout("send request", timeout_ms)),
        }
        self.stats.requests_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;

        let mut header = [0u8; MBAP_HEADER_LEN];
        match timeout(request_timeout, stream.read_exact(&mut header)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ModbusError::timeout("read response header", timeout_ms)),
        }

        let rx_transaction_id = u16::from_be_bytes([header[0], header[1]]);
        let protocol_id = u16::from_be_bytes([header[2], header[3]]);
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;

        // unit id + function code at minimum
        if !(2..=MAX_MBAP_LENGTH).contains(&length) {
            return Err(ModbusError::protocol(format!(
                "Invalid MBAP length: {}",
                length
            )));
        }

        let mut body = vec![0u8; length];
        match timeout(request_timeout, stream.read_exact(&mut body)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ModbusError::timeout("read response PDU", timeout_ms)),
        }
        self.stats.bytes_received += (MBAP_HEADER_LEN + length) as u64;

        if self.packet_logging {
            trace!("RX [{}]: {} {}", self.address, hex(&header), hex(&body));
        }

        if protocol_id != MODBUS_PROTOCOL_ID {
            return Err(ModbusError::protocol(format!(
                "Unexpected protocol id: {}",
                protocol_id
            )));
        }
        if rx_transaction_id != transaction_id {
            return Err(ModbusError::protocol(format!(
                "Transaction id mismatch: sent {}, received {}",
                transaction_id, rx_transaction_id
            )));
        }
        if body[0] != request.slave_id {
            return Err(ModbusError::protocol(format!(
                "Unit id mismatch: sent {}, received {}",
                request.slave_id, body[0]
            )));
        }

        let pdu = ModbusPdu::from_slice(&body[1..])?;
        self.stats.responses_received += 1;

        if let Some(code) = pdu.exception_code() {
            let function = pdu.function_code().unwrap_or(0) & 0x7F;
            return Err(ModbusError::exception(function, code));
        }

        ModbusResponse::from_pdu(body[0], pdu)
    }
}

impl ModbusTransport for TcpTransport {
    async fn request(&mut self, request: &ModbusRequest) -> ModbusResult<ModbusResponse> {
        let result = self.exchange(request).await;

        if let Err(ref e) = result {
            self.stats.errors += 1;
            if e.is_timeout() {
                self.stats.timeouts += 1;
            }
            match e {
                ModbusError::Exception { .. } | ModbusError::InvalidData { .. } => {
                    debug!("Request rejected: {} @{}: {}", request.function, request.address, e);
                }
                _ => {
                    if self.stream.take().is_some() {
                        error!("Dropping connection to {} after: {}", self.address, e);
                    }
                }
            }
        }

        result
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn close(&mut self) -> ModbusResult<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("TCP shutdown: {}", e);
            }
            info!("TCP closed: {}", self.address);
        }
        debug!("Transport stats for {}: {:?}", self.address, self.stats);
        Ok(())
    }

    fn get_stats(&self) -> TransportStats {
        self.stats
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
