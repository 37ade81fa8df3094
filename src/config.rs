//! Decoder configuration.
//!
//! The configuration picks the row extraction and row decoding strategies,
//! the per-file timeout and a few policy knobs. It is usually read from a
//! JSON file; every field has a default so `{}` is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Strategy used for a pipeline stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Structural implementation working on the binary matrix.
    #[default]
    Algorithmic,
    /// Implementation driven by an external classifier.
    Classifier,
}

/// What to do with a strip whose checksum never validates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumPolicy {
    /// Keep the unvalidated payload and continue with the next strip.
    #[default]
    Lenient,
    /// Abort the file with `ChecksumInvalid`.
    Strict,
}

/// Bit and byte order of the strip data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireOrder {
    /// Bits packed MSB-first, multi-byte fields big-endian.
    #[default]
    MsbFirst,
    /// Bits packed LSB-first, multi-byte fields little-endian.
    LsbFirst,
}

impl WireOrder {
    /// Pack up to eight bits (`0`/`1` values) into one byte.
    pub fn pack(self, bits: &[u8]) -> u8 {
        let mut byte = 0u8;
        for (i, &bit) in bits.iter().take(8).enumerate() {
            if bit != 0 {
                byte |= match self {
                    WireOrder::MsbFirst => 0x80 >> i,
                    WireOrder::LsbFirst => 1 << i,
                };
            }
        }
        byte
    }

    /// Split a byte into eight bits in stream order.
    pub fn unpack(self, byte: u8) -> [u8; 8] {
        let mut bits = [0u8; 8];
        for (i, bit) in bits.iter_mut().enumerate() {
            let mask = match self {
                WireOrder::MsbFirst => 0x80 >> i,
                WireOrder::LsbFirst => 1 << i,
            };
            *bit = u8::from(byte & mask != 0);
        }
        bits
    }

    /// Interpret a multi-byte field.
    pub fn parse_multi_byte(self, bytes: &[u8]) -> u32 {
        let fold = |acc: u32, &b: &u8| (acc << 8) | b as u32;
        match self {
            WireOrder::MsbFirst => bytes.iter().fold(0, fold),
            WireOrder::LsbFirst => bytes.iter().rev().fold(0, fold),
        }
    }

    /// Encode `value` into `width` bytes.
    pub fn encode_multi_byte(self, value: u32, width: usize) -> Vec<u8> {
        let mut bytes: Vec<u8> = (0..width).map(|i| (value >> (8 * i)) as u8).collect();
        if self == WireOrder::MsbFirst {
            bytes.reverse();
        }
        bytes
    }
}

/// Pipeline configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub row_extractor: Strategy,
    pub row_decoder: Strategy,
    /// Per-file timeout in minutes; `None` disables it.
    pub timeout: Option<u64>,
    pub checksum_policy: ChecksumPolicy,
    pub wire_order: WireOrder,
    pub parallel_strips: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            row_extractor: Strategy::Algorithmic,
            row_decoder: Strategy::Algorithmic,
            timeout: Some(5),
            checksum_policy: ChecksumPolicy::Lenient,
            wire_order: WireOrder::MsbFirst,
            parallel_strips: true,
        }
    }
}

impl DecoderConfig {
    /// Parse a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Apply `SOFTSTRIP_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(minutes) = parse_env_u64("SOFTSTRIP_TIMEOUT_MINUTES") {
            self.timeout = Some(minutes);
        }
        if let Some(strategy) = parse_env_strategy("SOFTSTRIP_ROW_EXTRACTOR") {
            self.row_extractor = strategy;
        }
        if let Some(strategy) = parse_env_strategy("SOFTSTRIP_ROW_DECODER") {
            self.row_decoder = strategy;
        }
        self
    }

    /// Timeout as a duration.
    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(|minutes| Duration::from_secs(minutes * 60))
    }
}

fn parse_env_u64(name: &str) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn parse_env_strategy(name: &str) -> Option<Strategy> {
    match std::env::var(name).ok()?.trim() {
        "algorithmic" | "0" => Some(Strategy::Algorithmic),
        "classifier" | "1" => Some(Strategy::Classifier),
        _ => None,
    }
}
