//! Record codec
//!
//! Serializes a `(key, value)` pair into a slot payload and back.
//!
//! The payload carries the logical key so that a bucket file can be
//! re-indexed from its slots alone. The 2-byte slot header limits a payload
//! to [`MAX_RECORD_SIZE`] bytes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SlotError};

/// Largest payload a slot header can describe
pub const MAX_RECORD_SIZE: usize = u16::MAX as usize;

/// Pluggable payload formatter
pub trait RecordFormat: Send + Sync + 'static {
    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>>;

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T>;
}

/// Compact binary payloads (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct Bincode;

impl RecordFormat for Bincode {
    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| SlotError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes).map_err(|e| SlotError::CorruptRecord(e.to_string()))
    }
}

/// JSON payloads, readable with a hex dump
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl RecordFormat for Json {
    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| SlotError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| SlotError::CorruptRecord(e.to_string()))
    }
}

#[derive(Serialize)]
struct RecordRef<'a, V> {
    key: &'a str,
    value: &'a V,
}

/// A decoded slot payload
#[derive(Debug, Deserialize)]
pub struct Record<V> {
    pub key: String,
    pub value: V,
}

/// Serialize a record, rejecting payloads the slot header cannot describe
pub fn encode_record<F: RecordFormat, V: Serialize>(key: &str, value: &V) -> Result<Vec<u8>> {
    let payload = F::serialize(&RecordRef { key, value })?;
    if payload.len() > MAX_RECORD_SIZE {
        return Err(SlotError::RecordTooLarge {
            size: payload.len(),
            max: MAX_RECORD_SIZE,
        });
    }
    Ok(payload)
}

/// Deserialize a slot payload
pub fn decode_record<F: RecordFormat, V: DeserializeOwned>(payload: &[u8]) -> Result<Record<V>> {
    F::deserialize(payload)
}

/// Decode only the key of a slot payload
pub fn decode_key<F: RecordFormat>(payload: &[u8]) -> Result<String> {
    #[derive(Deserialize)]
    struct KeyOnly {
        key: String,
    }

    Ok(F::deserialize::<KeyOnly>(payload)?.key)
}
