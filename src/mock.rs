//! In-memory device for unit tests.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::bytes::f32_to_regs;
use crate::client::ModbusClient;
use crate::codec::DEVICE_WORD_ORDER;
use crate::constants::{EXCEPTION_ILLEGAL_DATA_ADDRESS, EXCEPTION_SERVER_DEVICE_FAILURE};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::SlaveId;
use crate::session::Connector;
use crate::transport::TransportStats;

#[derive(Debug, Default)]
pub struct MockDevice {
    pub registers: Vec<u16>,
    /// Block start addresses answered with an exception.
    pub failing_blocks: HashSet<u16>,
    /// Block start addresses that time out and drop the connection.
    pub stalling_blocks: HashSet<u16>,
    pub refuse_connect: bool,
    /// Connections accepted before further attempts are refused.
    pub max_connects: Option<usize>,
    pub reject_writes: bool,
    pub reads: Vec<(u16, u16)>,
    pub writes: Vec<(SlaveId, u16, Vec<u16>)>,
    pub connects: usize,
    pub closes: usize,
}

#[derive(Debug, Clone)]
pub struct MockConnector {
    device: Arc<Mutex<MockDevice>>,
}

impl MockConnector {
    pub fn new(registers: usize) -> Self {
        Self {
            device: Arc::new(Mutex::new(MockDevice {
                registers: vec![0; registers],
                ..MockDevice::default()
            })),
        }
    }

    pub fn device(&self) -> MutexGuard<'_, MockDevice> {
        self.device.lock().unwrap()
    }

    pub fn set_words(&self, address: u16, words: &[u16]) {
        let start = address as usize;
        self.device().registers[start..start + words.len()].copy_from_slice(words);
    }

    pub fn set_f32(&self, address: u16, value: f32) {
        self.set_words(address, &f32_to_regs(value, DEVICE_WORD_ORDER));
    }

    pub fn fail_block(&self, start: u16) {
        self.device().failing_blocks.insert(start);
    }

    pub fn stall_block(&self, start: u16) {
        self.device().stalling_blocks.insert(start);
    }

    pub fn limit_connects(&self, max: usize) {
        self.device().max_connects = Some(max);
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.device().refuse_connect = refuse;
    }

    pub fn reject_writes(&self, reject: bool) {
        self.device().reject_writes = reject;
    }
}

impl Connector for MockConnector {
    type Client = MockClient;

    fn connect(&self) -> impl Future<Output = ModbusResult<MockClient>> + Send {
        let result = {
            let mut device = self.device();
            let exhausted = device.max_connects.is_some_and(|max| device.connects >= max);
            if device.refuse_connect || exhausted {
                Err(ModbusError::connection("Connection refused"))
            } else {
                device.connects += 1;
                Ok(MockClient {
                    device: Arc::clone(&self.device),
                    connected: true,
                })
            }
        };
        async move { result }
    }

    fn endpoint(&self) -> String {
        "mock:1502".to_string()
    }
}

#[derive(Debug)]
pub struct MockClient {
    device: Arc<Mutex<MockDevice>>,
    connected: bool,
}

impl ModbusClient for MockClient {
    fn read_03(
        &mut self,
        _slave_id: SlaveId,
        address: u16,
        quantity: u16,
    ) -> impl Future<Output = ModbusResult<Vec<u16>>> + Send {
        let result = if !self.connected {
            Err(ModbusError::connection("Not connected"))
        } else {
            let mut device = self.device.lock().unwrap();
            device.reads.push((address, quantity));
            let start = address as usize;
            let end = start + quantity as usize;
            if device.stalling_blocks.contains(&address) {
                Err(ModbusError::timeout("read response header", 3000))
            } else if device.failing_blocks.contains(&address) || end > device.registers.len() {
                Err(ModbusError::exception(0x03, EXCEPTION_ILLEGAL_DATA_ADDRESS))
            } else {
                Ok(device.registers[start..end].to_vec())
            }
        };
        // a timed-out transport drops its stream
        if result.as_ref().is_err_and(|e| e.is_timeout()) {
            self.connected = false;
        }
        async move { result }
    }

    fn write_10(
        &mut self,
        slave_id: SlaveId,
        address: u16,
        values: &[u16],
    ) -> impl Future<Output = ModbusResult<()>> + Send {
        let result = {
            let mut device = self.device.lock().unwrap();
            if device.reject_writes {
                Err(ModbusError::exception(0x10, EXCEPTION_SERVER_DEVICE_FAILURE))
            } else {
                device.writes.push((slave_id, address, values.to_vec()));
                let start = address as usize;
                device.registers[start..start + values.len()].copy_from_slice(values);
                Ok(())
            }
        };
        async move { result }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) -> impl Future<Output = ModbusResult<()>> + Send {
        if self.connected {
            self.connected = false;
            self.device.lock().unwrap().closes += 1;
        }
        async { Ok(()) }
    }

    fn get_stats(&self) -> TransportStats {
        TransportStats::default()
    }
}
