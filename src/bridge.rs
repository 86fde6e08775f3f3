//! # Inverter Bridge
//!
//! The per-device object handed to the host: it owns the endpoint, the
//! catalog, the precomputed read plan and the snapshot store.
//!
//! ```rust,no_run
//! use plenticore_modbus::{BridgeConfig, InverterBridge};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bridge = InverterBridge::new(BridgeConfig::new("192.168.1.50"))?;
//!
//! let snapshot = bridge.poll().await;
//! println!("{} / {}", snapshot.status, snapshot.inverter_state);
//! println!("PV power: {} W", bridge.read_float32(100)?);
//!
//! bridge.set_min_soc(15.0).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::catalog::{RegisterCatalog, RegisterDescriptor, MINIMUM_SOC_ADDRESS};
use crate::config::BridgeConfig;
use crate::error::{CodecError, ModbusResult, WriteError};
use crate::plan::ReadPlan;
use crate::session::{Connector, PollSession, TcpConnector};
use crate::snapshot::{CycleStats, DeviceStatus, InverterState, Snapshot, SnapshotStore};
use crate::value::RegisterValue;
use crate::writer::write_f64;

/// Polling bridge for one inverter.
pub struct InverterBridge<C: Connector = TcpConnector> {
    config: BridgeConfig,
    connector: C,
    catalog: RegisterCatalog,
    session: PollSession,
    store: SnapshotStore,
    cycle_lock: Mutex<()>,
}

impl InverterBridge<TcpConnector> {
    /// Validate the configuration and prepare a Modbus/TCP bridge.
    ///
    /// Nothing is sent until the first [`poll`](Self::poll).
    pub fn new(config: BridgeConfig) -> ModbusResult<Self> {
        let connector = TcpConnector::new(config.endpoint.clone(), config.timeouts)
            .with_packet_logging(config.packet_logging);
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> InverterBridge<C> {
    /// Bridge over a custom connector, using the Plenticore catalog.
    pub fn with_connector(config: BridgeConfig, connector: C) -> ModbusResult<Self> {
        Self::with_catalog(config, connector, RegisterCatalog::plenticore())
    }

    /// Fails if `config` does not validate.
    pub fn with_catalog(
        config: BridgeConfig,
        connector: C,
        catalog: RegisterCatalog,
    ) -> ModbusResult<Self> {
        config.validate()?;
        let session = PollSession::for_catalog(&catalog, config.unit_id, config.limits);
        let store = SnapshotStore::new(Snapshot::offline(session.plan().end_address()));
        info!(
            "Bridge for {} (unit {}): {} registers in {} blocks",
            config.endpoint,
            config.unit_id,
            session.plan().total_registers(),
            session.plan().len()
        );
        Ok(Self {
            config,
            connector,
            catalog,
            session,
            store,
            cycle_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn catalog(&self) -> &RegisterCatalog {
        &self.catalog
    }

    pub fn plan(&self) -> &ReadPlan {
        self.session.plan()
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// Run one cycle and publish its snapshot.
    ///
    /// A call made while another cycle is running waits for it to finish.
    /// Connection failure republishes the previous data with status OFFLINE.
    pub async fn poll(&self) -> Arc<Snapshot> {
        let _cycle = self.cycle_lock.lock().await;
        let prior = self.store.read();

        let snapshot = match self.session.run(&self.connector, &prior).await {
            Ok(outcome) => {
                let online = outcome.is_online();
                if !online {
                    warn!("No block could be read from {}", self.config.endpoint);
                }
                Snapshot {
                    status: if online {
                        DeviceStatus::Online
                    } else {
                        DeviceStatus::Offline
                    },
                    updated_at: if online { Some(Utc::now()) } else { prior.updated_at },
                    last_cycle: CycleStats {
                        blocks_ok: outcome.blocks_ok,
                        blocks_failed: outcome.failures.len(),
                        duration: outcome.duration,
                    },
                    image: outcome.image,
                    inverter_state: outcome.inverter_state,
                }
            }
            Err(e) => {
                error!("Connection failed: {}", e);
                let mut offline = (*prior).clone();
                offline.status = DeviceStatus::Offline;
                offline.last_cycle = CycleStats {
                    blocks_ok: 0,
                    blocks_failed: self.session.plan().len(),
                    duration: Default::default(),
                };
                offline
            }
        };

        self.store.replace(snapshot)
    }

    /// Poll every `poll_interval` until `shutdown` completes.
    ///
    /// Ticks missed while a slow cycle runs are skipped, so cycles never
    /// overlap or burst.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            "Polling {} every {:?}",
            self.config.endpoint, self.config.poll_interval
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.poll().await;
                }
            }
        }

        info!("Polling of {} stopped", self.config.endpoint);
    }

    /// Mark the device offline without polling, e.g. when the host unloads it.
    pub fn mark_offline(&self) -> Arc<Snapshot> {
        self.store.mark_offline()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.read()
    }

    /// Receiver woken after every cycle.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.store.subscribe()
    }

    pub fn status(&self) -> DeviceStatus {
        self.store.read().status
    }

    pub fn inverter_state(&self) -> InverterState {
        self.store.read().inverter_state
    }

    pub fn read_float32(&self, address: u16) -> Result<f32, CodecError> {
        self.store.read().read_float32(address)
    }

    pub fn read_uint16(&self, address: u16) -> Result<u16, CodecError> {
        self.store.read().read_uint16(address)
    }

    pub fn read_int16(&self, address: u16) -> Result<i16, CodecError> {
        self.store.read().read_int16(address)
    }

    pub fn read_uint32(&self, address: u16) -> Result<u32, CodecError> {
        self.store.read().read_uint32(address)
    }

    pub fn read(&self, descriptor: &RegisterDescriptor) -> Result<RegisterValue, CodecError> {
        self.store.read().read(descriptor)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write a value to a read-write register.
    pub async fn set_value(
        &self,
        descriptor: &RegisterDescriptor,
        value: f64,
    ) -> Result<(), WriteError> {
        write_f64(
            &self.connector,
            self.config.unit_id,
            &self.config.limits,
            descriptor,
            value,
        )
        .await
    }

    /// Write a value to a register looked up by name.
    pub async fn set_named(&self, name: &str, value: f64) -> Result<(), WriteError> {
        let descriptor = self
            .catalog
            .describe(name)
            .ok_or_else(|| WriteError::UnknownRegister {
                name: name.to_string(),
            })?;
        self.set_value(descriptor, value).await
    }

    /// Set the battery's minimum state of charge (percent).
    pub async fn set_min_soc(&self, percent: f32) -> Result<(), WriteError> {
        let descriptor = self
            .catalog
            .at_address(MINIMUM_SOC_ADDRESS)
            .ok_or_else(|| WriteError::UnknownRegister {
                name: "minimum_soc".to_string(),
            })?;
        self.set_value(descriptor, f64::from(percent)).await
    }
}
