//! Modbus/TCP device simulator for integration tests.
//!
//! Serves FC03 and FC16 from an in-memory register bank on a random local
//! port. Reads starting at a "failing" address are answered with exception
//! 0x02.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use plenticore_modbus::bytes::f32_to_regs;
use plenticore_modbus::{BridgeConfig, Endpoint, Timeouts, DEVICE_WORD_ORDER};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct SimState {
    pub registers: Vec<u16>,
    pub failing: HashSet<u16>,
    /// Reads starting here are answered only after the delay.
    pub stalling: HashMap<u16, Duration>,
    pub reads: Vec<(u16, u16)>,
    pub writes: Vec<(u8, u16, Vec<u16>)>,
    pub connections: usize,
}

pub struct Simulator {
    pub addr: SocketAddr,
    state: Arc<Mutex<SimState>>,
    accept_task: JoinHandle<()>,
}

impl Simulator {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(SimState {
            registers: vec![0; 1100],
            ..SimState::default()
        }));

        let shared = Arc::clone(&state);
        let accept_task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                shared.lock().unwrap().connections += 1;
                tokio::spawn(serve(socket, Arc::clone(&shared)));
            }
        });

        Self {
            addr,
            state,
            accept_task,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap()
    }

    pub fn set_words(&self, address: u16, words: &[u16]) {
        let start = address as usize;
        self.state().registers[start..start + words.len()].copy_from_slice(words);
    }

    pub fn set_f32(&self, address: u16, value: f32) {
        self.set_words(address, &f32_to_regs(value, DEVICE_WORD_ORDER));
    }

    pub fn fail_reads_at(&self, address: u16) {
        self.state().failing.insert(address);
    }

    pub fn stall_reads_at(&self, address: u16, delay: Duration) {
        self.state().stalling.insert(address, delay);
    }

    /// Stop accepting connections; later connects are refused.
    pub async fn stop(self) {
        self.accept_task.abort();
        let _ = self.accept_task.await;
    }

    pub fn config(&self) -> BridgeConfig {
        BridgeConfig::with_endpoint(Endpoint::new("127.0.0.1", self.addr.port()))
            .with_timeouts(Timeouts::uniform(Duration::from_secs(1)))
    }
}

async fn serve(mut socket: TcpStream, state: Arc<Mutex<SimState>>) {
    loop {
        let mut header = [0u8; 6];
        if socket.read_exact(&mut header).await.is_err() {
            return;
        }
        let len = u16::from_be_bytes([header[4], header[5]]) as usize;
        let mut body = vec![0u8; len];
        if socket.read_exact(&mut body).await.is_err() {
            return;
        }

        let unit = body[0];
        let stall = record_read(&body[1..], &state);
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        let pdu = respond(&body[1..], unit, &state);

        let mut frame = Vec::with_capacity(7 + pdu.len());
        frame.extend_from_slice(&header[0..4]);
        frame.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
        frame.push(unit);
        frame.extend_from_slice(&pdu);
        if socket.write_all(&frame).await.is_err() {
            return;
        }
    }
}

/// Log an FC03 request on arrival and return its stall delay, if any.
fn record_read(request: &[u8], state: &Mutex<SimState>) -> Option<Duration> {
    if request[0] != 0x03 {
        return None;
    }
    let address = u16::from_be_bytes([request[1], request[2]]);
    let quantity = u16::from_be_bytes([request[3], request[4]]);
    let mut state = state.lock().unwrap();
    state.reads.push((address, quantity));
    state.stalling.get(&address).copied()
}

fn respond(request: &[u8], unit: u8, state: &Mutex<SimState>) -> Vec<u8> {
    let function = request[0];
    let address = u16::from_be_bytes([request[1], request[2]]);
    let quantity = u16::from_be_bytes([request[3], request[4]]);
    let start = address as usize;
    let end = start + quantity as usize;

    let mut state = state.lock().unwrap();
    match function {
        0x03 => {
            if state.failing.contains(&address) || end > state.registers.len() {
                return vec![0x83, 0x02];
            }
            let mut pdu = vec![0x03, (quantity * 2) as u8];
            for word in &state.registers[start..end] {
                pdu.extend_from_slice(&word.to_be_bytes());
            }
            pdu
        }
        0x10 => {
            if end > state.registers.len() {
                return vec![0x90, 0x02];
            }
            let values: Vec<u16> = request[6..]
                .chunks(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            state.registers[start..end].copy_from_slice(&values);
            state.writes.push((unit, address, values));
            request[0..5].to_vec()
        }
        other => vec![other | 0x80, 0x01],
    }
}
