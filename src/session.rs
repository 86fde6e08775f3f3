//! # Poll Session
//!
//! One polling cycle: connect, read every block of the plan in ascending
//! order, close.
//!
//! | Failure | Effect |
//! |---------|--------|
//! | connect | [`CycleError::Connect`], nothing read |
//! | one block | [`BlockReadError`] recorded, its words keep their prior values |
//! | connection dropped by a block | one reconnect, later blocks read on it |
//! | that reconnect | every later block recorded as failed |
//! | state decode | prior operating state kept |
//!
//! The block loop never returns early, so every connection it opened is
//! closed. A panic inside the loop drops the client, which closes the
//! socket.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::catalog::{RegisterCatalog, RegisterDescriptor};
use crate::client::{ModbusClient, ModbusTcpClient};
use crate::codec::decode;
use crate::config::{Endpoint, Timeouts};
use crate::device_limits::DeviceLimits;
use crate::error::{BlockReadError, CycleError, ModbusError, ModbusResult};
use crate::plan::{ReadBlock, ReadPlan};
use crate::protocol::SlaveId;
use crate::snapshot::{InverterState, RegisterImage, Snapshot};
use crate::value::RegisterValue;

/// Opens client connections to the device.
///
/// Each cycle and each write acquires its own connection through this.
pub trait Connector: Send + Sync {
    type Client: ModbusClient;

    fn connect(&self) -> impl Future<Output = ModbusResult<Self::Client>> + Send;

    /// Printable target for logs and errors.
    fn endpoint(&self) -> String;
}

/// Connects over Modbus/TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    endpoint: Endpoint,
    timeouts: Timeouts,
    packet_logging: bool,
}

impl TcpConnector {
    pub fn new(endpoint: Endpoint, timeouts: Timeouts) -> Self {
        Self {
            endpoint,
            timeouts,
            packet_logging: false,
        }
    }

    pub fn with_packet_logging(mut self, enabled: bool) -> Self {
        self.packet_logging = enabled;
        self
    }
}

impl Connector for TcpConnector {
    type Client = ModbusTcpClient;

    async fn connect(&self) -> ModbusResult<ModbusTcpClient> {
        let mut client = ModbusTcpClient::connect(&self.endpoint, &self.timeouts).await?;
        client.set_packet_logging(self.packet_logging);
        Ok(client)
    }

    fn endpoint(&self) -> String {
        self.endpoint.to_string()
    }
}

/// Result of a cycle that got a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// Prior image with every successfully read block merged in.
    pub image: RegisterImage,
    /// Freshly decoded state, or the prior one if its block failed.
    pub inverter_state: InverterState,
    pub failures: Vec<BlockReadError>,
    pub blocks_ok: usize,
    pub duration: Duration,
}

impl CycleOutcome {
    /// At least one block was read.
    pub fn is_online(&self) -> bool {
        self.blocks_ok > 0
    }
}

/// Executes the read plan against one unit.
#[derive(Debug, Clone)]
pub struct PollSession {
    plan: ReadPlan,
    unit_id: SlaveId,
    limits: DeviceLimits,
    state_register: Option<RegisterDescriptor>,
}

impl PollSession {
    pub fn new(plan: ReadPlan, unit_id: SlaveId, limits: DeviceLimits) -> Self {
        Self {
            plan,
            unit_id,
            limits,
            state_register: None,
        }
    }

    /// Session over a catalog, decoding its operating-state register.
    pub fn for_catalog(catalog: &RegisterCatalog, unit_id: SlaveId, limits: DeviceLimits) -> Self {
        let plan = ReadPlan::for_catalog(catalog, &limits);
        let mut session = Self::new(plan, unit_id, limits);
        session.state_register = catalog.inverter_state().copied();
        session
    }

    pub fn with_state_register(mut self, descriptor: RegisterDescriptor) -> Self {
        self.state_register = Some(descriptor);
        self
    }

    pub fn plan(&self) -> &ReadPlan {
        &self.plan
    }

    pub fn unit_id(&self) -> SlaveId {
        self.unit_id
    }

    /// Run one cycle on top of `prior`.
    pub async fn run<C: Connector>(
        &self,
        connector: &C,
        prior: &Snapshot,
    ) -> Result<CycleOutcome, CycleError> {
        let started = Instant::now();

        let client = connector.connect().await.map_err(|source| {
            warn!("Cycle aborted, cannot connect to {}: {}", connector.endpoint(), source);
            CycleError::Connect {
                endpoint: connector.endpoint(),
                source,
            }
        })?;

        let mut image = prior.image.clone();
        image.ensure_len(self.plan.end_address());
        let mut inverter_state = prior.inverter_state;
        let mut failures = Vec::new();
        let mut blocks_ok = 0;

        let mut client = Some(client);
        let mut reconnected = false;
        let mut reconnect_error: Option<ModbusError> = None;
        let blocks = self.plan.blocks();

        for (index, block) in blocks.iter().enumerate() {
            if index > 0 && self.limits.inter_request_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.limits.inter_request_delay_ms)).await;
            }

            let result = match client.as_mut() {
                Some(client) => self.read_block(client, block, &mut image).await,
                None => Err(reconnect_error
                    .clone()
                    .unwrap_or_else(|| ModbusError::connection("Not connected"))),
            };

            match result {
                Ok(()) => {
                    blocks_ok += 1;
                    if let Some(state) = self.refresh_state(block, &image) {
                        inverter_state = state;
                    }
                }
                Err(source) => {
                    warn!(
                        "Error reading registers: addr={} count={}: {}",
                        block.start, block.count, source
                    );
                    failures.push(BlockReadError {
                        start: block.start,
                        count: block.count,
                        source,
                    });
                }
            }

            // The transport drops its stream after a timeout or I/O error.
            // Reconnect once so the remaining blocks still reach the device.
            let dropped = client.as_ref().is_some_and(|c| !c.is_connected());
            if dropped && !reconnected && index + 1 < blocks.len() {
                reconnected = true;
                if let Some(mut stale) = client.take() {
                    if let Err(e) = stale.close().await {
                        debug!("Close of dropped connection failed: {}", e);
                    }
                }
                match connector.connect().await {
                    Ok(fresh) => {
                        info!("Reconnected to {} after block {}", connector.endpoint(), block.start);
                        client = Some(fresh);
                    }
                    Err(e) => {
                        warn!("Reconnect to {} failed: {}", connector.endpoint(), e);
                        reconnect_error = Some(e);
                    }
                }
            }
        }

        if let Some(mut client) = client {
            if let Err(e) = client.close().await {
                debug!("Close after cycle failed: {}", e);
            }
        }

        let duration = started.elapsed();
        info!(
            "Cycle complete: {}/{} blocks in {:?}",
            blocks_ok,
            self.plan.len(),
            duration
        );

        Ok(CycleOutcome {
            image,
            inverter_state,
            failures,
            blocks_ok,
            duration,
        })
    }

    async fn read_block<T: ModbusClient>(
        &self,
        client: &mut T,
        block: &ReadBlock,
        image: &mut RegisterImage,
    ) -> ModbusResult<()> {
        let words = client.read_03(self.unit_id, block.start, block.count).await?;
        image
            .write_block(block.start, &words)
            .map_err(|e| ModbusError::invalid_data(e.to_string()))
    }

    /// Decode the operating state if `block` holds it.
    fn refresh_state(&self, block: &ReadBlock, image: &RegisterImage) -> Option<InverterState> {
        let descriptor = self
            .state_register
            .filter(|d| block.contains(d.address, d.width()))?;

        let decoded = image
            .words(descriptor.address, descriptor.datatype.width())
            .and_then(|words| decode(words, descriptor.datatype));

        match decoded {
            Ok(RegisterValue::U32(code)) => Some(InverterState::from_code(code)),
            Ok(RegisterValue::U16(code)) => Some(InverterState::from_code(u32::from(code))),
            Ok(other) => {
                warn!("Operating state has unexpected type: {:?}", other);
                None
            }
            Err(e) => {
                warn!("Operating state decode failed: {}", e);
                None
            }
        }
    }
}
