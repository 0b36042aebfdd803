//! Durable records for processing units.
//!
//! A [`UnitRecord`] carries only the authoritative state: both progress
//! counters, both reservoirs, the item buffer, and, while a cycle is in
//! flight, the kind of resource committed to it. The current recipe and the
//! committed-resource snapshot are re-derived on load against whatever
//! registry is live at that time.
//!
//! Loading never fails on content: out-of-range values are clamped, unknown
//! ids are dropped, and every repair is logged with `warn!`. Only the binary
//! envelope (magic, version, bitcode payload) can reject input.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::buffer::ItemStack;
use crate::id::{ItemKindId, ResourceKind};
use crate::registry::{Registry, ResourceSpec};
use crate::unit::{ProcessingUnit, UnitConfig};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a single-unit snapshot.
pub const UNIT_MAGIC: u32 = 0xA1E3_0001;

/// Magic number identifying a whole-engine snapshot.
pub const ENGINE_MAGIC: u32 = 0xA1E3_0002;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during serialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur during deserialization.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{expected:08X}, got 0x{found:08X}")]
    InvalidMagic { expected: u32, found: u32 },
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header prepended to every binary snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Host tick at the time the snapshot was taken (0 for detached units).
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(magic: u32, tick: u64) -> Self {
        Self {
            magic,
            version: FORMAT_VERSION,
            tick,
        }
    }

    /// Check magic and version against what this build reads.
    pub fn validate(&self, expected_magic: u32) -> Result<(), DeserializeError> {
        if self.magic != expected_magic {
            return Err(DeserializeError::InvalidMagic {
                expected: expected_magic,
                found: self.magic,
            });
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A persisted reservoir. Empty reservoirs are written as an absent record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservoirRecord {
    pub type_id: i32,
    pub amount: i32,
}

/// A persisted, non-empty buffer slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotRecord {
    pub item_id: i32,
    pub count: i32,
}

/// The durable compound for one processing unit. Every field may be absent
/// in self-describing formats; absent means empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitRecord {
    pub progress_remaining: i32,
    pub progress_total: i32,
    pub input_reservoir: Option<ReservoirRecord>,
    pub output_reservoir: Option<ReservoirRecord>,
    pub buffer: Vec<Option<SlotRecord>>,
    /// Resource kind drained by the in-flight cycle. Lets the cycle resolve
    /// its recipe on load even when it emptied the input reservoir. Absent
    /// in records written by hosts that do not track it.
    pub committed_type_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UnitSnapshot {
    header: SnapshotHeader,
    record: UnitRecord,
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_u32(value: i32, field: &'static str) -> u32 {
    u32::try_from(value).unwrap_or_else(|_| {
        warn!(field, value, "negative value in unit record, using 0");
        0
    })
}

// ---------------------------------------------------------------------------
// Serialize
// ---------------------------------------------------------------------------

fn reservoir_record(contents: Option<ResourceSpec>) -> Option<ReservoirRecord> {
    contents.map(|spec| ReservoirRecord {
        type_id: to_i32(spec.kind.0),
        amount: to_i32(spec.amount),
    })
}

/// Capture a unit's authoritative state.
pub fn serialize(unit: &ProcessingUnit) -> UnitRecord {
    UnitRecord {
        progress_remaining: to_i32(unit.progress_remaining),
        progress_total: to_i32(unit.progress_total),
        input_reservoir: reservoir_record(unit.input.contents()),
        output_reservoir: reservoir_record(unit.output.contents()),
        buffer: unit
            .buffer
            .slots()
            .iter()
            .map(|slot| {
                slot.map(|stack| SlotRecord {
                    item_id: to_i32(stack.item.0),
                    count: to_i32(stack.count),
                })
            })
            .collect(),
        committed_type_id: unit
            .buffered
            .filter(|_| unit.progress_remaining > 0)
            .map(|committed| to_i32(committed.kind.0)),
    }
}

// ---------------------------------------------------------------------------
// Deserialize
// ---------------------------------------------------------------------------

fn restore_reservoir(
    record: Option<&ReservoirRecord>,
    registry: &Registry,
    capacity: u32,
    which: &'static str,
) -> Option<ResourceSpec> {
    let record = record?;
    let amount = to_u32(record.amount, "reservoir.amount");
    if amount == 0 {
        return None;
    }
    let kind = match u32::try_from(record.type_id) {
        Ok(id) if (id as usize) < registry.resource_count() => ResourceKind(id),
        _ => {
            warn!(reservoir = which, type_id = record.type_id, amount, "unknown resource kind, reservoir emptied");
            return None;
        }
    };
    if amount > capacity {
        warn!(reservoir = which, amount, capacity, "reservoir over capacity, clamped");
    }
    Some(ResourceSpec::new(kind, amount.min(capacity)))
}

fn restore_slot(index: usize, record: &SlotRecord, registry: &Registry, stack_limit: u32) -> Option<ItemStack> {
    let count = to_u32(record.count, "slot.count");
    if count == 0 {
        return None;
    }
    let item = match u32::try_from(record.item_id) {
        Ok(id) if (id as usize) < registry.item_count() => ItemKindId(id),
        _ => {
            warn!(slot = index, item_id = record.item_id, "unknown item kind, slot emptied");
            return None;
        }
    };
    let limit = registry.max_stack(item).min(stack_limit);
    if count > limit {
        warn!(slot = index, count, limit, "oversized stack, clamped");
    }
    Some(ItemStack::new(item, count.min(limit)))
}

fn restore_committed(record: &UnitRecord, registry: &Registry) -> Option<ResourceKind> {
    let type_id = record.committed_type_id?;
    match u32::try_from(type_id) {
        Ok(id) if (id as usize) < registry.resource_count() => Some(ResourceKind(id)),
        _ => {
            warn!(type_id, "unknown committed resource kind, ignored");
            None
        }
    }
}

/// Rebuild a unit from its record. The committed resource is rebuilt from
/// the recorded kind and `progress_remaining`, and the recipe resolves from
/// it while a cycle is in flight. Otherwise, or for records without a
/// committed kind, the recipe resolves from the restored input reservoir.
pub fn deserialize(record: &UnitRecord, registry: Arc<Registry>, config: UnitConfig) -> ProcessingUnit {
    let mut unit = ProcessingUnit::new(registry, config);
    let capacity = unit.config.reservoir_capacity;

    unit.input.restore(restore_reservoir(
        record.input_reservoir.as_ref(),
        &unit.registry,
        capacity,
        "input",
    ));
    unit.output.restore(restore_reservoir(
        record.output_reservoir.as_ref(),
        &unit.registry,
        capacity,
        "output",
    ));

    if record.buffer.len() > unit.buffer.len() {
        warn!(
            slots = record.buffer.len(),
            expected = unit.buffer.len(),
            "extra buffer slots in unit record dropped"
        );
    }
    let stack_limit = unit.buffer.stack_limit();
    for (index, slot) in record.buffer.iter().enumerate().take(unit.buffer.len()) {
        let stack = slot
            .as_ref()
            .and_then(|s| restore_slot(index, s, &unit.registry, stack_limit));
        unit.buffer.set(index, stack);
    }

    let total = to_u32(record.progress_total, "progress_total");
    let mut remaining = to_u32(record.progress_remaining, "progress_remaining");
    if remaining > total {
        warn!(remaining, total, "progress exceeds total, clamped");
        remaining = total;
    }
    unit.progress_total = total;
    unit.progress_remaining = remaining;

    let committed = restore_committed(record, &unit.registry)
        .filter(|_| remaining > 0)
        .map(|kind| ResourceSpec::new(kind, remaining));
    unit.current_recipe = committed
        .as_ref()
        .and_then(|spec| unit.registry.find_matching(Some(spec)))
        .or_else(|| unit.registry.find_matching(unit.input.contents().as_ref()));
    if remaining > 0
        && let Some(recipe) = unit.current_recipe.and_then(|id| unit.registry.recipe(id))
    {
        unit.buffered = Some(ResourceSpec::new(recipe.input.kind, remaining));
    }

    unit
}

// ---------------------------------------------------------------------------
// Binary form
// ---------------------------------------------------------------------------

/// Encode a unit record with a versioned header.
pub fn encode(unit: &ProcessingUnit) -> Result<Vec<u8>, SerializeError> {
    let snapshot = UnitSnapshot {
        header: SnapshotHeader::new(UNIT_MAGIC, 0),
        record: serialize(unit),
    };
    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode bytes produced by [`encode`].
pub fn decode(
    data: &[u8],
    registry: Arc<Registry>,
    config: UnitConfig,
) -> Result<ProcessingUnit, DeserializeError> {
    let snapshot: UnitSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate(UNIT_MAGIC)?;
    Ok(deserialize(&snapshot.record, registry, config))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SlotRole;
    use crate::test_utils::*;
    use crate::unit::UnitPhase;

    fn assert_same_state(a: &ProcessingUnit, b: &ProcessingUnit) {
        assert_eq!(a.input(), b.input());
        assert_eq!(a.output(), b.output());
        assert_eq!(a.buffer(), b.buffer());
        assert_eq!(a.progress_remaining(), b.progress_remaining());
        assert_eq!(a.progress_total(), b.progress_total());
    }

    #[test]
    fn idle_unit_round_trips() {
        let content = still_content();
        let unit = ProcessingUnit::new(content.registry.clone(), UnitConfig::default());
        let record = serialize(&unit);
        assert_eq!(record.input_reservoir, None);
        assert_eq!(record.buffer.len(), 3);

        let back = deserialize(&record, content.registry.clone(), UnitConfig::default());
        assert_same_state(&unit, &back);
        assert_eq!(back.current_recipe(), None);
    }

    #[test]
    fn in_flight_cycle_resumes_after_reload() {
        let content = still_content();
        let mut unit = primed_unit(&content, content.water, 30);
        run_cycles(&mut unit, 1);
        unit.buffer_mut()
            .set(SlotRole::Resource.index(), Some(ItemStack::new(content.can, 5)));

        let back = deserialize(&serialize(&unit), content.registry.clone(), UnitConfig::default());
        assert_same_state(&unit, &back);
        assert_eq!(back.current_recipe(), unit.current_recipe());
        assert_eq!(back.buffered_resource(), Some(ResourceSpec::new(content.water, 2)));
        assert_eq!(back.phase(), UnitPhase::Working);
    }

    #[test]
    fn cycle_that_emptied_its_input_resumes_after_reload() {
        let (registry, water, steam) = water_only_registry();
        let mut unit = ProcessingUnit::new(registry.clone(), UnitConfig::default());
        let _ = unit.input_mut().fill(&ResourceSpec::new(water, 2), true);
        assert!(unit.advance_work_cycle());
        assert!(unit.input().is_empty());

        let record = serialize(&unit);
        assert_eq!(record.committed_type_id, Some(water.0 as i32));
        let mut back = deserialize(&record, registry.clone(), UnitConfig::default());
        assert_same_state(&unit, &back);
        assert_eq!(back.current_recipe(), unit.current_recipe());
        assert_eq!(back.buffered_resource(), Some(ResourceSpec::new(water, 2)));
        assert_eq!(back.phase(), UnitPhase::Working);

        for _ in 0..2 {
            assert_eq!(back.work_cycle(), unit.work_cycle());
            assert_same_state(&unit, &back);
        }
        assert_eq!(back.output().contents(), Some(ResourceSpec::new(steam, 2)));
        assert_eq!(back.progress_remaining(), 0);
    }

    #[test]
    fn committed_kind_is_written_only_in_flight() {
        let content = still_content();
        let mut unit = primed_unit(&content, content.water, 2);
        assert_eq!(serialize(&unit).committed_type_id, None);
        run_cycles(&mut unit, 1);
        assert_eq!(serialize(&unit).committed_type_id, Some(content.water.0 as i32));
        run_cycles(&mut unit, 2);
        assert_eq!(unit.progress_remaining(), 0);
        assert_eq!(serialize(&unit).committed_type_id, None);
    }

    #[test]
    fn recipe_resolves_from_live_registry_on_load() {
        let content = still_content();
        let unit = primed_unit(&content, content.mash, 40);
        let back = deserialize(&serialize(&unit), content.registry.clone(), UnitConfig::default());
        assert_eq!(back.current_recipe(), Some(content.ferment_mash));
    }

    #[test]
    fn orphaned_progress_is_discarded_on_next_resolution() {
        let content = still_content();
        let record = UnitRecord {
            progress_remaining: 6,
            progress_total: 10,
            ..UnitRecord::default()
        };
        let mut unit = deserialize(&record, content.registry.clone(), UnitConfig::default());
        assert_eq!(unit.progress_remaining(), 6);
        assert_eq!(unit.current_recipe(), None);

        assert!(!unit.advance_work_cycle());
        assert_eq!(unit.progress_remaining(), 0);
        assert_eq!(unit.progress_total(), 0);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let record: UnitRecord = serde_json::from_str(r#"{ "progress_total": 4 }"#).unwrap();
        assert_eq!(record.progress_remaining, 0);
        assert_eq!(record.input_reservoir, None);
        assert!(record.buffer.is_empty());

        let partial: UnitRecord =
            serde_json::from_str(r#"{ "input_reservoir": { "type_id": 0 } }"#).unwrap();
        let content = still_content();
        let unit = deserialize(&partial, content.registry.clone(), UnitConfig::default());
        assert!(unit.input().is_empty());
        assert_eq!(unit.buffer().len(), 3);
    }

    #[test]
    fn bad_values_are_repaired() {
        let content = still_content();
        let record = UnitRecord {
            progress_remaining: 50,
            progress_total: -3,
            input_reservoir: Some(ReservoirRecord {
                type_id: 0,
                amount: 99_999,
            }),
            output_reservoir: Some(ReservoirRecord {
                type_id: 77,
                amount: 10,
            }),
            buffer: vec![
                Some(SlotRecord { item_id: 2, count: 500 }),
                Some(SlotRecord { item_id: 900, count: 1 }),
                None,
                Some(SlotRecord { item_id: 0, count: 1 }),
            ],
            committed_type_id: Some(42),
        };
        let unit = deserialize(&record, content.registry.clone(), UnitConfig::default());
        assert_eq!(unit.progress_total(), 0);
        assert_eq!(unit.progress_remaining(), 0);
        assert_eq!(unit.input().amount(), 10_000);
        assert!(unit.output().is_empty());
        assert_eq!(
            unit.buffer().get(0).copied(),
            Some(ItemStack::new(content.steam_can, 16))
        );
        assert!(unit.buffer().get(1).is_none());
        assert_eq!(unit.buffer().len(), 3);
    }

    #[test]
    fn binary_round_trip() {
        let content = still_content();
        let mut unit = primed_unit(&content, content.water, 9);
        run_cycles(&mut unit, 3);
        let bytes = encode(&unit).unwrap();
        let back = decode(&bytes, content.registry.clone(), UnitConfig::default()).unwrap();
        assert_same_state(&unit, &back);
    }

    #[test]
    fn header_validation() {
        let header = SnapshotHeader::new(UNIT_MAGIC, 0);
        assert!(header.validate(UNIT_MAGIC).is_ok());
        assert!(matches!(
            header.validate(ENGINE_MAGIC),
            Err(DeserializeError::InvalidMagic { .. })
        ));

        let future = SnapshotHeader {
            version: FORMAT_VERSION + 1,
            ..header.clone()
        };
        assert!(matches!(
            future.validate(UNIT_MAGIC),
            Err(DeserializeError::FutureVersion(_))
        ));

        let old = SnapshotHeader { version: 0, ..header };
        assert!(matches!(
            old.validate(UNIT_MAGIC),
            Err(DeserializeError::UnsupportedVersion(0))
        ));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let content = still_content();
        let result = decode(&[1, 2, 3], content.registry.clone(), UnitConfig::default());
        assert!(matches!(result, Err(DeserializeError::Decode(_))));
    }
}
