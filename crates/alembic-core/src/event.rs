//! Unit events with a pre-allocated ring buffer.
//!
//! Events fire on transitions only: a unit that stays stalled for a hundred
//! ticks reports `ErrorChanged` once. The host collects them during
//! [`Engine::step`](crate::engine::Engine::step) and the caller drains them.

use crate::fixed::Ticks;
use crate::id::{RecipeId, UnitId};
use crate::unit::ErrorCode;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A unit event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitEvent {
    UnitAdded {
        unit: UnitId,
        tick: Ticks,
    },
    UnitRemoved {
        unit: UnitId,
        tick: Ticks,
    },
    CycleStarted {
        unit: UnitId,
        recipe: RecipeId,
        batch: u32,
        tick: Ticks,
    },
    CycleCompleted {
        unit: UnitId,
        recipe: RecipeId,
        tick: Ticks,
    },
    RecipeChanged {
        unit: UnitId,
        from: Option<RecipeId>,
        to: Option<RecipeId>,
        tick: Ticks,
    },
    ErrorChanged {
        unit: UnitId,
        from: ErrorCode,
        to: ErrorCode,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    UnitAdded,
    UnitRemoved,
    CycleStarted,
    CycleCompleted,
    RecipeChanged,
    ErrorChanged,
}

const EVENT_KIND_COUNT: usize = 6;

impl UnitEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UnitEvent::UnitAdded { .. } => EventKind::UnitAdded,
            UnitEvent::UnitRemoved { .. } => EventKind::UnitRemoved,
            UnitEvent::CycleStarted { .. } => EventKind::CycleStarted,
            UnitEvent::CycleCompleted { .. } => EventKind::CycleCompleted,
            UnitEvent::RecipeChanged { .. } => EventKind::RecipeChanged,
            UnitEvent::ErrorChanged { .. } => EventKind::ErrorChanged,
        }
    }

    pub fn unit(&self) -> UnitId {
        match *self {
            UnitEvent::UnitAdded { unit, .. }
            | UnitEvent::UnitRemoved { unit, .. }
            | UnitEvent::CycleStarted { unit, .. }
            | UnitEvent::CycleCompleted { unit, .. }
            | UnitEvent::RecipeChanged { unit, .. }
            | UnitEvent::ErrorChanged { unit, .. } => unit,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer. Fixed capacity; when full, the oldest
/// events are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<UnitEvent>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
    /// Events overwritten before anyone drained them.
    dropped: u64,
    suppressed: [bool; EVENT_KIND_COUNT],
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
            dropped: 0,
            suppressed: [false; EVENT_KIND_COUNT],
        }
    }

    /// Stop recording `kind`. Suppressed events cost nothing.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    pub fn push(&mut self, event: UnitEvent) {
        if self.is_suppressed(event.kind()) {
            return;
        }
        let capacity = self.capacity();
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % capacity;
        if self.len < capacity {
            self.len += 1;
        } else {
            self.dropped += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Events lost because the buffer was full when they arrived.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &UnitEvent> {
        let capacity = self.capacity();
        // Once wrapped, head points at the oldest entry.
        let start = if self.len < capacity { 0 } else { self.head };
        (0..self.len).filter_map(move |offset| self.events[(start + offset) % capacity].as_ref())
    }

    /// Remove and return every stored event, oldest first.
    pub fn drain(&mut self) -> Vec<UnitEvent> {
        let capacity = self.capacity();
        let start = if self.len < capacity { 0 } else { self.head };
        let drained = (0..self.len)
            .filter_map(|offset| self.events[(start + offset) % capacity].take())
            .collect();
        self.head = 0;
        self.len = 0;
        drained
    }
}
