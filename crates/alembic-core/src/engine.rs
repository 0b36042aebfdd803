use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slotmap::{Key, SecondaryMap, SlotMap};
use tracing::debug;

use crate::codec::{self, DeserializeError, ENGINE_MAGIC, SerializeError, SnapshotHeader, UnitRecord};
use crate::energy::EnergyStore;
use crate::event::{EventBuffer, UnitEvent};
use crate::fixed::{Fixed64, Ticks};
use crate::id::UnitId;
use crate::registry::Registry;
use crate::sim::{HostConfig, SimState, StateHash};
use crate::sync::{ProgressUpdate, on_cadence};
use crate::unit::{CycleOutcome, ProcessingUnit, UnitConfig};

// ---------------------------------------------------------------------------
// Hosted unit
// ---------------------------------------------------------------------------

/// A processing unit together with the energy store of its host block.
#[derive(Debug, Clone)]
pub struct HostedUnit {
    pub unit: ProcessingUnit,
    pub energy: EnergyStore,
}

/// Which phases run on a given tick.
#[derive(Debug, Clone, Copy)]
struct Cadence {
    recipe_check: bool,
    work: bool,
    sync: bool,
}

impl Cadence {
    fn at(tick: Ticks, config: &HostConfig) -> Self {
        Self {
            recipe_check: on_cadence(tick, config.recipe_check_interval),
            work: on_cadence(tick, config.work_interval),
            sync: on_cadence(tick, config.sync_interval),
        }
    }
}

/// What one unit produced during a step. Collected per unit so that the
/// parallel and sequential paths emit in the same order.
#[derive(Debug, Default)]
struct StepReport {
    events: Vec<UnitEvent>,
    sync: Option<[ProgressUpdate; 2]>,
}

fn step_unit(id: UnitId, hosted: &mut HostedUnit, tick: Ticks, cadence: Cadence) -> StepReport {
    let unit = &mut hosted.unit;
    let recipe_before = unit.current_recipe();
    let error_before = unit.error_state();

    // Phase 1: exchange.
    unit.exchange_buffer();

    // Phase 2: periodic recipe check.
    if cadence.recipe_check {
        unit.refresh_recipe();
    }

    // Phase 3: energy-gated work.
    let mut outcome = CycleOutcome::Idle;
    if cadence.work && hosted.energy.can_work() {
        outcome = unit.work_cycle();
        if outcome.did_work() {
            hosted.energy.consume_work();
        }
    }

    let mut report = StepReport::default();
    let recipe_after = unit.current_recipe();
    if recipe_after != recipe_before {
        report.events.push(UnitEvent::RecipeChanged {
            unit: id,
            from: recipe_before,
            to: recipe_after,
            tick,
        });
    }
    if let Some(recipe) = recipe_after {
        match outcome {
            CycleOutcome::Started { batch } => report.events.push(UnitEvent::CycleStarted {
                unit: id,
                recipe,
                batch,
                tick,
            }),
            CycleOutcome::Continued { completed: true } => {
                report.events.push(UnitEvent::CycleCompleted { unit: id, recipe, tick })
            }
            _ => {}
        }
    }
    let error_after = unit.error_state();
    if error_after != error_before {
        report.events.push(UnitEvent::ErrorChanged {
            unit: id,
            from: error_before,
            to: error_after,
            tick,
        });
    }

    // Phase 4: progress push.
    if cadence.sync {
        report.sync = Some(ProgressUpdate::snapshot(unit));
    }

    report
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Hosts many independent processing units sharing one registry.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<Registry>,
    config: HostConfig,
    sim_state: SimState,
    ids: SlotMap<UnitId, ()>,
    units: SecondaryMap<UnitId, HostedUnit>,
    events: EventBuffer,
    sync_outbox: Vec<(UnitId, ProgressUpdate)>,
}

impl Engine {
    pub fn new(registry: Arc<Registry>, config: HostConfig) -> Self {
        Self {
            events: EventBuffer::new(config.event_capacity as usize),
            registry,
            config,
            sim_state: SimState::default(),
            ids: SlotMap::with_key(),
            units: SecondaryMap::new(),
            sync_outbox: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The registry shared by every hosted unit.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Cadences this engine steps with.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Number of completed steps.
    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    /// Number of hosted units.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Unit ids in slot order.
    pub fn unit_ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.ids.keys()
    }

    /// Look up a hosted unit. `None` for removed or unknown ids.
    pub fn unit(&self, id: UnitId) -> Option<&ProcessingUnit> {
        self.units.get(id).map(|h| &h.unit)
    }

    /// Mutable access for world interactions (routing, manual fills).
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut ProcessingUnit> {
        self.units.get_mut(id).map(|h| &mut h.unit)
    }

    /// The energy store of a unit's host block.
    pub fn energy(&self, id: UnitId) -> Option<&EnergyStore> {
        self.units.get(id).map(|h| &h.energy)
    }

    /// The event buffer, for suppression and inspection.
    pub fn events(&self) -> &EventBuffer {
        &self.events
    }

    /// Mutable event buffer, to suppress or unsuppress event kinds.
    pub fn events_mut(&mut self) -> &mut EventBuffer {
        &mut self.events
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Place a new, empty unit with its own energy store. Emits
    /// [`UnitEvent::UnitAdded`].
    pub fn add_unit(&mut self, config: UnitConfig) -> UnitId {
        let energy = EnergyStore::new(config.energy.clone());
        let unit = ProcessingUnit::new(Arc::clone(&self.registry), config);
        let id = self.ids.insert(());
        self.units.insert(id, HostedUnit { unit, energy });
        debug!(unit = ?id, "unit added");
        self.events.push(UnitEvent::UnitAdded {
            unit: id,
            tick: self.sim_state.tick,
        });
        id
    }

    /// Remove a unit. Its contents are returned so the caller can drop
    /// them into the world.
    pub fn remove_unit(&mut self, id: UnitId) -> Option<HostedUnit> {
        self.ids.remove(id)?;
        let hosted = self.units.remove(id)?;
        debug!(unit = ?id, "unit removed");
        self.events.push(UnitEvent::UnitRemoved {
            unit: id,
            tick: self.sim_state.tick,
        });
        Some(hosted)
    }

    /// Offer energy to a unit's store. Returns the accepted amount; unknown
    /// ids accept nothing.
    pub fn supply_energy(&mut self, id: UnitId, amount: Fixed64) -> Fixed64 {
        self.units
            .get_mut(id)
            .map_or(Fixed64::ZERO, |h| h.energy.receive(amount, true))
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Advance every unit by one tick.
    pub fn step(&mut self) {
        let tick = self.sim_state.tick;
        let cadence = Cadence::at(tick, &self.config);
        let entries: Vec<(UnitId, &mut HostedUnit)> = self.units.iter_mut().collect();

        #[cfg(feature = "parallel")]
        let reports: Vec<(UnitId, StepReport)> = {
            use rayon::prelude::*;
            entries
                .into_par_iter()
                .map(|(id, hosted)| (id, step_unit(id, hosted, tick, cadence)))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let reports: Vec<(UnitId, StepReport)> = entries
            .into_iter()
            .map(|(id, hosted)| (id, step_unit(id, hosted, tick, cadence)))
            .collect();

        for (id, report) in reports {
            for event in report.events {
                self.events.push(event);
            }
            if let Some(updates) = report.sync {
                self.sync_outbox.extend(updates.into_iter().map(|u| (id, u)));
            }
        }

        self.sim_state.tick += 1;
    }

    /// Run `n` steps.
    pub fn run(&mut self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Take every event recorded since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<UnitEvent> {
        self.events.drain()
    }

    /// Take every pending progress update, in unit order.
    pub fn drain_sync(&mut self) -> Vec<(UnitId, ProgressUpdate)> {
        std::mem::take(&mut self.sync_outbox)
    }

    // -----------------------------------------------------------------------
    // State hash
    // -----------------------------------------------------------------------

    /// Deterministic hash of all authoritative unit state. Two engines fed
    /// the same inputs hash equal after every step.
    ///
    /// The recipe and error code are left out: they are re-derived on load
    /// and would make a restored engine hash differently from its source.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.sim_state.tick);
        h.write_u64(self.units.len() as u64);
        for (id, hosted) in self.units.iter() {
            let unit = &hosted.unit;
            h.write_u64(id.data().as_ffi());
            for reservoir in [unit.input(), unit.output()] {
                h.write_opt_u32(reservoir.kind().map(|k| k.0));
                h.write_u32(reservoir.amount());
            }
            for slot in unit.buffer().slots() {
                h.write_opt_u32(slot.map(|s| s.item.0));
                h.write_u32(slot.map_or(0, |s| s.count));
            }
            h.write_u32(unit.progress_remaining());
            h.write_u32(unit.progress_total());
            h.write_fixed64(hosted.energy.stored());
        }
        h.finish()
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Serialize every hosted unit with a versioned header. Unit ids survive
    /// the round trip.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let mut units = SecondaryMap::new();
        for (id, hosted) in self.units.iter() {
            units.insert(
                id,
                HostedRecord {
                    record: codec::serialize(&hosted.unit),
                    config: hosted.unit.config().clone(),
                    energy: hosted.energy.stored(),
                },
            );
        }
        let snapshot = EngineSnapshot {
            header: SnapshotHeader::new(ENGINE_MAGIC, self.sim_state.tick),
            config: self.config.clone(),
            sim_state: self.sim_state.clone(),
            ids: self.ids.clone(),
            units,
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Rebuild an engine from [`Engine::serialize`] output against `registry`.
    /// Recipes are re-resolved; event and sync outboxes start empty.
    pub fn deserialize(data: &[u8], registry: Arc<Registry>) -> Result<Self, DeserializeError> {
        let snapshot: EngineSnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate(ENGINE_MAGIC)?;

        let mut engine = Engine::new(registry, snapshot.config);
        engine.sim_state = snapshot.sim_state;
        engine.ids = snapshot.ids;
        for (id, hosted) in snapshot.units {
            if !engine.ids.contains_key(id) {
                continue;
            }
            let mut energy = EnergyStore::new(hosted.config.energy.clone());
            energy.restore(hosted.energy);
            let unit = codec::deserialize(&hosted.record, Arc::clone(&engine.registry), hosted.config);
            engine.units.insert(id, HostedUnit { unit, energy });
        }
        // Ids without a record would never step; release them.
        let orphaned: Vec<UnitId> = engine
            .ids
            .keys()
            .filter(|id| !engine.units.contains_key(*id))
            .collect();
        for id in orphaned {
            engine.ids.remove(id);
        }
        Ok(engine)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HostedRecord {
    record: UnitRecord,
    config: UnitConfig,
    energy: Fixed64,
}

#[derive(Debug, Serialize, Deserialize)]
struct EngineSnapshot {
    header: SnapshotHeader,
    config: HostConfig,
    sim_state: SimState,
    ids: SlotMap<UnitId, ()>,
    units: SecondaryMap<UnitId, HostedRecord>,
}

// ===========================================================================
// Tests
// ===========================================================================
