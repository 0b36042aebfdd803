//! Energy buffering for powered units.
//!
//! A host block receives energy from outside (generators, cables) and spends
//! a fixed amount for each work cycle step that actually does work. The
//! store only bounds and accounts; arbitration between providers lives with
//! the caller.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

/// Limits of an energy store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Maximum stored energy.
    pub capacity: Fixed64,
    /// Maximum accepted per `receive` call.
    pub max_receive: Fixed64,
    /// Energy spent by one productive work cycle step.
    pub cost_per_work: Fixed64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            capacity: Fixed64::from_num(800),
            max_receive: Fixed64::from_num(110),
            cost_per_work: Fixed64::from_num(5),
        }
    }
}

/// Stored energy. Clamped to `[0, capacity]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyStore {
    stored: Fixed64,
    config: EnergyConfig,
}

impl EnergyStore {
    pub fn new(config: EnergyConfig) -> Self {
        Self {
            stored: Fixed64::ZERO,
            config,
        }
    }

    pub fn stored(&self) -> Fixed64 {
        self.stored
    }

    pub fn config(&self) -> &EnergyConfig {
        &self.config
    }

    /// Accept up to `amount`, bounded by `max_receive` and free capacity.
    /// Returns the accepted amount.
    pub fn receive(&mut self, amount: Fixed64, commit: bool) -> Fixed64 {
        if amount <= Fixed64::ZERO {
            return Fixed64::ZERO;
        }
        let room = (self.config.capacity - self.stored).max(Fixed64::ZERO);
        let accepted = amount.min(self.config.max_receive).min(room);
        if commit {
            self.stored += accepted;
        }
        accepted
    }

    /// Whether one work step is affordable.
    pub fn can_work(&self) -> bool {
        self.stored >= self.config.cost_per_work
    }

    /// Spend the per-work cost. Returns false (and spends nothing) when the
    /// store is short.
    pub fn consume_work(&mut self) -> bool {
        if !self.can_work() {
            return false;
        }
        self.stored -= self.config.cost_per_work;
        true
    }

    /// Restore a persisted level, clamped to capacity.
    pub(crate) fn restore(&mut self, stored: Fixed64) {
        self.stored = stored.clamp(Fixed64::ZERO, self.config.capacity);
    }
}
