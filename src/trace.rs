//! Register write traces
//!
//! A trace is the ordered list of byte stores a program made into the VSU
//! window, kept as JSON:
//!
//! ```json
//! { "writes": [ { "address": "0x01000400", "value": 128 } ] }
//! ```
//!
//! Addresses may be JSON numbers or hex strings.

use std::path::Path;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::backend::AudioBackend;
use crate::bus::SoundMemory;
use crate::vsu::SoundEngine;
use crate::{Result, VsuError};

/// One byte store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWrite {
    /// Bus address
    #[serde(deserialize_with = "deserialize_address")]
    pub address: u32,
    /// Byte stored
    pub value: u8,
}

/// Ordered register writes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterTrace {
    /// Writes in program order
    pub writes: Vec<RegisterWrite>,
}

impl RegisterTrace {
    /// Empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON trace
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VsuError::TraceError(e.to_string()))
    }

    /// Load a JSON trace from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
            .map_err(|e| VsuError::TraceError(format!("{}: {e}", path.display())))
    }

    /// Encode as pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Append a write
    pub fn push(&mut self, address: u32, value: u8) {
        self.writes.push(RegisterWrite { address, value });
    }

    /// Number of writes
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// No writes recorded
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Store every byte into `memory` and notify `engine`, in order.
    ///
    /// Returns the number of writes replayed.
    pub fn replay<B: AudioBackend>(
        &self,
        engine: &mut SoundEngine<B>,
        memory: &mut SoundMemory,
    ) -> usize {
        for write in &self.writes {
            memory.write_byte(write.address, write.value);
            engine.notify_register_write(&*memory, write.address);
        }
        self.writes.len()
    }
}

fn parse_address(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16).ok(),
        None => text.parse().ok(),
    }
}

fn deserialize_address<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Address {
        Number(u32),
        Text(String),
    }

    match Address::deserialize(deserializer)? {
        Address::Number(n) => Ok(n),
        Address::Text(s) => {
            parse_address(&s).ok_or_else(|| D::Error::custom(format!("invalid address {s:?}")))
        }
    }
}
