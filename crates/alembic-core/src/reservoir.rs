use crate::id::ResourceKind;
use crate::registry::ResourceSpec;
use serde::{Deserialize, Serialize};

/// A capacity-bounded container of a single resource kind.
///
/// Invariants: `amount <= capacity`, and `kind` is `None` exactly when
/// `amount == 0`. Fill and drain are total: they move less than requested
/// rather than fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservoir {
    kind: Option<ResourceKind>,
    amount: u32,
    capacity: u32,
}

impl Reservoir {
    /// An empty reservoir. A capacity of 0 is clamped to 1.
    pub fn new(capacity: u32) -> Self {
        Self {
            kind: None,
            amount: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        self.kind
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }

    pub fn free_space(&self) -> u32 {
        self.capacity - self.amount
    }

    /// Current contents, or `None` when empty.
    pub fn contents(&self) -> Option<ResourceSpec> {
        self.kind.map(|kind| ResourceSpec::new(kind, self.amount))
    }

    /// Accept up to `resource.amount`. With `commit == false` nothing is
    /// mutated and the would-be accepted amount is returned.
    #[must_use = "returns the amount actually accepted, which may be less than offered"]
    pub fn fill(&mut self, resource: &ResourceSpec, commit: bool) -> u32 {
        if self.kind.is_some_and(|kind| kind != resource.kind) {
            return 0;
        }
        let accepted = resource.amount.min(self.free_space());
        if commit && accepted > 0 {
            self.kind = Some(resource.kind);
            self.amount += accepted;
        }
        accepted
    }

    /// Remove up to `max_amount` of the current kind and return what was
    /// removed.
    #[must_use = "returns the resource actually removed, which may be less than requested"]
    pub fn drain(&mut self, max_amount: u32, commit: bool) -> Option<ResourceSpec> {
        let kind = self.kind?;
        let drained = max_amount.min(self.amount);
        if drained == 0 {
            return None;
        }
        if commit {
            self.amount -= drained;
            if self.amount == 0 {
                self.kind = None;
            }
        }
        Some(ResourceSpec::new(kind, drained))
    }

    /// Empty the reservoir.
    pub fn clear(&mut self) {
        self.kind = None;
        self.amount = 0;
    }

    /// `amount * max / capacity`.
    pub fn scaled(&self, max: i32) -> i32 {
        crate::fixed::scale(self.amount, self.capacity, max)
    }

    /// Coarse fill level for indicator lights and automation triggers.
    pub fn level(&self) -> TankLevel {
        TankLevel::rate(self.scaled(100))
    }

    /// Replace the contents wholesale, clamping to capacity. Used when
    /// restoring persisted state.
    pub(crate) fn restore(&mut self, contents: Option<ResourceSpec>) {
        match contents {
            Some(spec) if spec.amount > 0 => {
                self.kind = Some(spec.kind);
                self.amount = spec.amount.min(self.capacity);
            }
            _ => self.clear(),
        }
    }
}

/// A coarse rating of how full a reservoir is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TankLevel {
    Empty,
    Low,
    Medium,
    High,
    Maximum,
}

impl TankLevel {
    /// Rate a fill percentage (0..=100).
    pub fn rate(percent: i32) -> Self {
        match percent {
            p if p < 5 => TankLevel::Empty,
            p if p < 30 => TankLevel::Low,
            p if p < 60 => TankLevel::Medium,
            p if p < 90 => TankLevel::High,
            _ => TankLevel::Maximum,
        }
    }
}
