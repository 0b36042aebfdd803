//! Alembic Core -- the recipe-driven processing unit engine.
//!
//! A processing unit is a tick-scheduled machine that turns one resource
//! into another: it matches the contents of its input reservoir against a
//! frozen recipe registry, drains a batch, and then emits output into its
//! output reservoir a little each tick until the batch is spent. Item
//! containers in a small slot buffer are exchanged against the reservoirs
//! before every work cycle.
//!
//! # Per-Tick Pipeline
//!
//! Each call to [`engine::Engine::step`] runs, for every hosted unit:
//!
//! 1. **Exchange** -- filled containers are poured into the input reservoir
//!    and output is bottled into empty containers.
//! 2. **Recipe check** -- on the recipe cadence the current recipe is
//!    re-resolved and stale `NoRecipe` codes are cleared.
//! 3. **Work** -- on the work cadence, and only if enough energy is stored,
//!    one work cycle step runs.
//! 4. **Sync** -- on the sync cadence the two progress counters are pushed
//!    to observers.
//!
//! # Key Types
//!
//! - [`registry::Registry`] -- Immutable recipe and container table (frozen
//!   at startup by [`registry::RegistryBuilder`]).
//! - [`reservoir::Reservoir`] -- Capacity-bounded single-resource tank.
//! - [`buffer::ItemBuffer`] -- Fixed role-indexed item slots.
//! - [`unit::ProcessingUnit`] -- The work-cycle state machine.
//! - [`codec`] -- Durable records and versioned binary snapshots.
//! - [`sync`] -- Narrow progress mirror for observers.

pub mod buffer;
pub mod codec;
pub mod energy;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod id;
pub mod registry;
pub mod reservoir;
pub mod sim;
pub mod sync;
pub mod unit;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
