//! Host cadence and state hashing.
//!
//! A host runs every unit once per tick. Within a tick, the work cycle, the
//! recipe check, and the progress push each run on their own cadence,
//! expressed in ticks and injected through [`HostConfig`].

use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed64, Ticks};

// ---------------------------------------------------------------------------
// Host configuration
// ---------------------------------------------------------------------------

/// Cadences, in ticks. An interval of 0 behaves as 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Ticks between work cycle attempts.
    pub work_interval: Ticks,
    /// Ticks between periodic recipe checks.
    pub recipe_check_interval: Ticks,
    /// Ticks between progress pushes to observers.
    pub sync_interval: Ticks,
    /// Capacity of the event ring buffer.
    pub event_capacity: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            work_interval: 1,
            recipe_check_interval: 20,
            sync_interval: 10,
            event_capacity: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Simulation state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    /// Incremented by 1 for each step.
    pub tick: Ticks,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// 64-bit FNV-1a over host state, compared between peers to catch
/// desyncs. Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    /// Absent values hash differently from every present value.
    pub fn write_opt_u32(&mut self, v: Option<u32>) {
        match v {
            Some(v) => {
                self.write_u32(1);
                self.write_u32(v);
            }
            None => self.write_u32(0),
        }
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
