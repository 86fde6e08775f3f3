//! # Snapshot Store
//!
//! The latest decoded view of the device. A [`Snapshot`] is immutable once
//! published; each polling cycle builds a new one and swaps it in whole, so
//! readers see either the previous image or the next one, never a mix.
//!
//! The store is a `tokio::sync::watch` channel of `Arc<Snapshot>`: pulling
//! the current value is a cheap `Arc` clone and subscribers are woken on
//! every replacement.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::catalog::RegisterDescriptor;
use crate::codec::decode;
use crate::error::CodecError;
use crate::value::{Datatype, RegisterValue};

// ============================================================================
// Register Image
// ============================================================================

/// Flat register array indexed by absolute address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterImage {
    words: Vec<u16>,
}

impl RegisterImage {
    /// An all-zero image covering addresses `0..len`.
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.words
    }

    /// Grow with zero words up to `len`; never shrinks.
    pub fn ensure_len(&mut self, len: usize) {
        if self.words.len() < len {
            self.words.resize(len, 0);
        }
    }

    /// Words `address..address + width`.
    pub fn words(&self, address: u16, width: usize) -> Result<&[u16], CodecError> {
        let start = address as usize;
        let end = start + width;
        self.words.get(start..end).ok_or(CodecError::OutOfImage {
            address,
            end,
            len: self.words.len(),
        })
    }

    /// Overwrite the words of one block.
    pub fn write_block(&mut self, start: u16, block: &[u16]) -> Result<(), CodecError> {
        let begin = start as usize;
        let end = begin + block.len();
        let len = self.words.len();
        let target = self.words.get_mut(begin..end).ok_or(CodecError::OutOfImage {
            address: start,
            end,
            len,
        })?;
        target.copy_from_slice(block);
        Ok(())
    }

    fn decode_at(&self, address: u16, datatype: Datatype) -> Result<RegisterValue, CodecError> {
        decode(self.words(address, datatype.width())?, datatype)
    }
}

// ============================================================================
// Inverter State
// ============================================================================

/// Operating state reported in register 56.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InverterState {
    Off,
    Init,
    IsoMeas,
    GridCheck,
    StartUp,
    /// Code 5 has no documented meaning.
    Reserved,
    FeedIn,
    Throttled,
    ExtSwitchOff,
    Update,
    Standby,
    GridSync,
    GridPreCheck,
    GridSwitchOff,
    Overheating,
    Shutdown,
    ImproperDcVoltage,
    Esb,
    #[default]
    Unknown,
}

impl InverterState {
    const ALL: [InverterState; 19] = [
        Self::Off,
        Self::Init,
        Self::IsoMeas,
        Self::GridCheck,
        Self::StartUp,
        Self::Reserved,
        Self::FeedIn,
        Self::Throttled,
        Self::ExtSwitchOff,
        Self::Update,
        Self::Standby,
        Self::GridSync,
        Self::GridPreCheck,
        Self::GridSwitchOff,
        Self::Overheating,
        Self::Shutdown,
        Self::ImproperDcVoltage,
        Self::Esb,
        Self::Unknown,
    ];

    /// Codes outside 0..=18 map to `Unknown`.
    pub fn from_code(code: u32) -> Self {
        Self::ALL
            .get(code as usize)
            .copied()
            .unwrap_or(Self::Unknown)
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Name as shown by the inverter's own UI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Init => "Init",
            Self::IsoMeas => "IsoMeas",
            Self::GridCheck => "GridCheck",
            Self::StartUp => "StartUp",
            Self::Reserved => "-",
            Self::FeedIn => "FeedIn",
            Self::Throttled => "Throttled",
            Self::ExtSwitchOff => "ExtSwitchOff",
            Self::Update => "Update",
            Self::Standby => "Standby",
            Self::GridSync => "GridSync",
            Self::GridPreCheck => "GridPreCheck",
            Self::GridSwitchOff => "GridSwitchOff",
            Self::Overheating => "Overheating",
            Self::Shutdown => "Shutdown",
            Self::ImproperDcVoltage => "ImproperDcVoltage",
            Self::Esb => "ESB",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for InverterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Reachability of the device as of the last cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceStatus {
    #[default]
    Offline,
    Online,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceStatus::Offline => "offline",
            DeviceStatus::Online => "online",
        })
    }
}

/// Outcome counters of the most recent cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleStats {
    pub blocks_ok: usize,
    pub blocks_failed: usize,
    pub duration: Duration,
}

/// Immutable view of the device after one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub image: RegisterImage,
    pub inverter_state: InverterState,
    pub status: DeviceStatus,
    /// Completion time of the last cycle that read at least one block.
    pub updated_at: Option<DateTime<Utc>>,
    pub last_cycle: CycleStats,
}

impl Snapshot {
    /// Startup sentinel: zeroed image, unknown state, never updated.
    pub fn offline(image_len: usize) -> Self {
        Self {
            image: RegisterImage::zeroed(image_len),
            inverter_state: InverterState::Unknown,
            status: DeviceStatus::Offline,
            updated_at: None,
            last_cycle: CycleStats::default(),
        }
    }

    #[inline]
    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }

    pub fn read_float32(&self, address: u16) -> Result<f32, CodecError> {
        match self.image.decode_at(address, Datatype::F32)? {
            RegisterValue::F32(v) => Ok(v),
            other => Err(mismatch(Datatype::F32, other)),
        }
    }

    pub fn read_uint16(&self, address: u16) -> Result<u16, CodecError> {
        match self.image.decode_at(address, Datatype::U16)? {
            RegisterValue::U16(v) => Ok(v),
            other => Err(mismatch(Datatype::U16, other)),
        }
    }

    pub fn read_int16(&self, address: u16) -> Result<i16, CodecError> {
        match self.image.decode_at(address, Datatype::I16)? {
            RegisterValue::I16(v) => Ok(v),
            other => Err(mismatch(Datatype::I16, other)),
        }
    }

    pub fn read_uint32(&self, address: u16) -> Result<u32, CodecError> {
        match self.image.decode_at(address, Datatype::U32)? {
            RegisterValue::U32(v) => Ok(v),
            other => Err(mismatch(Datatype::U32, other)),
        }
    }

    /// Decode a catalog entry with its declared datatype.
    pub fn read(&self, descriptor: &RegisterDescriptor) -> Result<RegisterValue, CodecError> {
        self.image.decode_at(descriptor.address, descriptor.datatype)
    }
}

fn mismatch(datatype: Datatype, value: RegisterValue) -> CodecError {
    CodecError::TypeMismatch {
        datatype,
        value: value.to_string(),
    }
}

// ============================================================================
// Store
// ============================================================================

/// Single-writer, many-reader holder of the current snapshot.
#[derive(Debug)]
pub struct SnapshotStore {
    tx: watch::Sender<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(initial: Snapshot) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    /// Publish a new snapshot, waking all subscribers.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.tx.send_replace(Arc::clone(&snapshot));
        snapshot
    }

    /// The current snapshot.
    pub fn read(&self) -> Arc<Snapshot> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    /// Republish the current snapshot with status OFFLINE, keeping its data.
    pub fn mark_offline(&self) -> Arc<Snapshot> {
        let current = self.read();
        if !current.is_online() {
            return current;
        }
        let mut next = (*current).clone();
        next.status = DeviceStatus::Offline;
        self.replace(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverter_state_codes() {
        assert_eq!(InverterState::from_code(0), InverterState::Off);
        assert_eq!(InverterState::from_code(6), InverterState::FeedIn);
        assert_eq!(InverterState::from_code(17), InverterState::Esb);
        assert_eq!(InverterState::from_code(18), InverterState::Unknown);
        assert_eq!(InverterState::from_code(19), InverterState::Unknown);
        assert_eq!(InverterState::from_code(u32::MAX), InverterState::Unknown);
        assert_eq!(InverterState::Reserved.as_str(), "-");
        assert_eq!(InverterState::default().code(), 18);
        for (code, state) in InverterState::ALL.iter().enumerate() {
            assert_eq!(state.code(), code as u32);
        }
    }

    #[test]
    fn test_offline_sentinel() {
        let snapshot = Snapshot::offline(1080);
        assert_eq!(snapshot.image.len(), 1080);
        assert_eq!(snapshot.inverter_state, InverterState::Unknown);
        assert_eq!(snapshot.status, DeviceStatus::Offline);
        assert!(snapshot.updated_at.is_none());
        assert_eq!(snapshot.read_float32(1042).unwrap(), 0.0);
    }

    #[test]
    fn test_typed_getters() {
        let mut snapshot = Snapshot::offline(1080);
        snapshot.image.write_block(56, &[0x0006, 0x0000]).unwrap();
        snapshot.image.write_block(210, &[87]).unwrap();
        snapshot.image.write_block(1024, &[0xF830]).unwrap();
        snapshot.image.write_block(1042, &[0x0000, 0x41A0]).unwrap();

        assert_eq!(snapshot.read_uint32(56).unwrap(), 6);
        assert_eq!(snapshot.read_uint16(210).unwrap(), 87);
        assert_eq!(snapshot.read_int16(1024).unwrap(), -2000);
        assert_eq!(snapshot.read_float32(1042).unwrap(), 20.0);
    }

    #[test]
    fn test_out_of_image() {
        let snapshot = Snapshot::offline(10);
        assert_eq!(
            snapshot.read_float32(9).unwrap_err(),
            CodecError::OutOfImage {
                address: 9,
                end: 11,
                len: 10
            }
        );
        let mut image = RegisterImage::zeroed(4);
        assert!(image.write_block(3, &[1, 2]).is_err());
        assert_eq!(image.as_slice(), &[0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_store_replace_and_subscribe() {
        let store = SnapshotStore::new(Snapshot::offline(4));
        let mut rx = store.subscribe();

        let mut next = Snapshot::offline(4);
        next.status = DeviceStatus::Online;
        next.image.write_block(0, &[1, 2, 3, 4]).unwrap();
        store.replace(next);

        rx.changed().await.unwrap();
        assert!(rx.borrow().is_online());
        assert_eq!(store.read().image.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_store_mark_offline_keeps_data() {
        let store = SnapshotStore::new(Snapshot::offline(2));
        let mut online = Snapshot::offline(2);
        online.status = DeviceStatus::Online;
        online.image.write_block(0, &[7, 8]).unwrap();
        online.inverter_state = InverterState::FeedIn;
        store.replace(online);

        let offline = store.mark_offline();
        assert_eq!(offline.status, DeviceStatus::Offline);
        assert_eq!(offline.image.as_slice(), &[7, 8]);
        assert_eq!(offline.inverter_state, InverterState::FeedIn);
    }
}
