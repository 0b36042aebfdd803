//! Narrow progress mirror.
//!
//! The authoritative side pushes the two progress counters to observers on
//! a coarse cadence. Observers overwrite their local copy with whatever
//! arrives; there is no merge and no acknowledgement.

use serde::{Deserialize, Serialize};

use crate::fixed::scale;
use crate::unit::ProcessingUnit;

/// Which progress counter an update carries. The discriminants are the
/// channel indices observers see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressField {
    Remaining = 0,
    Total = 1,
}

impl ProgressField {
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(ProgressField::Remaining),
            1 => Some(ProgressField::Total),
            _ => None,
        }
    }
}

/// One pushed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub field: ProgressField,
    pub value: u32,
}

impl ProgressUpdate {
    /// Parse a raw `(index, value)` pair. Unknown indices are ignored.
    pub fn from_raw(index: u8, value: i32) -> Option<Self> {
        Some(Self {
            field: ProgressField::from_index(index)?,
            value: u32::try_from(value).unwrap_or(0),
        })
    }

    pub fn to_raw(self) -> (u8, i32) {
        (self.field.index(), i32::try_from(self.value).unwrap_or(i32::MAX))
    }

    /// Both counters of `unit`, remaining first.
    pub fn snapshot(unit: &ProcessingUnit) -> [ProgressUpdate; 2] {
        [
            ProgressUpdate {
                field: ProgressField::Remaining,
                value: unit.progress_remaining(),
            },
            ProgressUpdate {
                field: ProgressField::Total,
                value: unit.progress_total(),
            },
        ]
    }
}

/// Observer-side copy of the progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressMirror {
    pub remaining: u32,
    pub total: u32,
}

impl ProgressMirror {
    /// Last write wins.
    pub fn apply(&mut self, update: ProgressUpdate) {
        match update.field {
            ProgressField::Remaining => self.remaining = update.value,
            ProgressField::Total => self.total = update.value,
        }
    }

    /// Same rule as [`ProcessingUnit::progress_scaled`]: counts down, and
    /// degrades to `max` before any total has arrived. Updates may arrive
    /// out of step, so `remaining` is bounded by `total` here.
    pub fn progress_scaled(&self, max: i32) -> i32 {
        scale(self.remaining.min(self.total), self.total, max)
    }
}

/// True on ticks that fall on an `interval`-tick cadence. An interval of 0
/// is treated as 1.
pub fn on_cadence(tick: u64, interval: u64) -> bool {
    tick % interval.max(1) == 0
}
