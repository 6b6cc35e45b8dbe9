//! Durable key/value slots holding one whole JSON document each.
//!
//! Every slot value is an envelope `{"version": N, "data": ...}`. A bare JSON
//! value (what the browser apps wrote) reads as version 0.

use crate::errors::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotWrite {
    pub key: String,
    pub value: String,
}

impl SlotWrite {
    pub fn encode<T: Serialize>(key: &str, data: &T) -> AppResult<Self> {
        let envelope = EnvelopeRef {
            version: FORMAT_VERSION,
            data,
        };
        Ok(Self {
            key: key.to_string(),
            value: serde_json::to_string(&envelope)?,
        })
    }
}

pub trait SlotStorage: Send + Sync {
    fn read_slot(&self, key: &str) -> AppResult<Option<String>>;

    /// Writes every slot or none of them.
    fn write_slots(&self, writes: &[SlotWrite]) -> AppResult<()>;
}

#[derive(Debug, Default)]
pub struct MemorySlots {
    slots: Mutex<BTreeMap<String, String>>,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(key: &str, raw: &str) -> Self {
        let storage = Self::default();
        if let Ok(mut slots) = storage.slots.lock() {
            slots.insert(key.to_string(), raw.to_string());
        }
        storage
    }

    pub fn keys(&self) -> AppResult<Vec<String>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| AppError::Internal("slot mutex poisoned".to_string()))?;
        Ok(slots.keys().cloned().collect())
    }
}

impl SlotStorage for MemorySlots {
    fn read_slot(&self, key: &str) -> AppResult<Option<String>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| AppError::Internal("slot mutex poisoned".to_string()))?;
        Ok(slots.get(key).cloned())
    }

    fn write_slots(&self, writes: &[SlotWrite]) -> AppResult<()> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| AppError::Internal("slot mutex poisoned".to_string()))?;
        for write in writes {
            slots.insert(write.key.clone(), write.value.clone());
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    data: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum SlotDecodeError {
    #[error("malformed slot data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("slot written by newer format version {0}")]
    FutureVersion(u32),
}

pub fn decode_slot<T: DeserializeOwned>(raw: &str) -> Result<T, SlotDecodeError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let is_envelope = matches!(
        &value,
        serde_json::Value::Object(map) if map.len() == 2 && map.contains_key("version") && map.contains_key("data")
    );

    let payload = if is_envelope {
        let envelope: Envelope = serde_json::from_value(value)?;
        if envelope.version > FORMAT_VERSION {
            return Err(SlotDecodeError::FutureVersion(envelope.version));
        }
        envelope.data
    } else {
        value
    };

    Ok(serde_json::from_value(payload)?)
}
