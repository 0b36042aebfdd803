//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::sync::Arc;

use crate::fixed::Fixed64;
use crate::id::{ItemKindId, RecipeId, ResourceKind};
use crate::registry::{ContainerDef, Registry, RegistryBuilder, ResourceSpec};
use crate::unit::{ProcessingUnit, UnitConfig};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Still content
// ===========================================================================

/// A small distillery: water boils to steam, mash ferments to wash, and a
/// can carries 1000 units of water, steam, or mash.
#[derive(Debug, Clone)]
pub struct StillContent {
    pub registry: Arc<Registry>,
    pub water: ResourceKind,
    pub steam: ResourceKind,
    pub mash: ResourceKind,
    pub wash: ResourceKind,
    pub can: ItemKindId,
    pub water_can: ItemKindId,
    pub steam_can: ItemKindId,
    pub mash_can: ItemKindId,
    /// `time=2, {water,1} -> {steam,1}`: batch of 2.
    pub distill_water: RecipeId,
    /// `time=5, {mash,2} -> {wash,1}`: batch of 10.
    pub ferment_mash: RecipeId,
}

/// Can capacity in every registered container.
pub const CAN_VOLUME: u32 = 1_000;

pub fn still_content() -> StillContent {
    let mut b = RegistryBuilder::new();
    let water = b.register_resource("water");
    let steam = b.register_resource("steam");
    let mash = b.register_resource("mash");
    let wash = b.register_resource("wash");

    let can = b.register_item("can", 64);
    let water_can = b.register_item("water_can", 16);
    let steam_can = b.register_item("steam_can", 16);
    let mash_can = b.register_item("mash_can", 16);

    let distill_water = b
        .register_recipe(2, Some(ResourceSpec::new(water, 1)), Some(ResourceSpec::new(steam, 1)))
        .expect("valid recipe");
    let ferment_mash = b
        .register_recipe(5, Some(ResourceSpec::new(mash, 2)), Some(ResourceSpec::new(wash, 1)))
        .expect("valid recipe");

    for (filled, kind) in [(water_can, water), (steam_can, steam), (mash_can, mash)] {
        b.register_container(ContainerDef {
            filled,
            empty: Some(can),
            contents: ResourceSpec::new(kind, CAN_VOLUME),
        })
        .expect("valid container");
    }

    StillContent {
        registry: Arc::new(b.build().expect("registry builds")),
        water,
        steam,
        mash,
        wash,
        can,
        water_can,
        steam_can,
        mash_can,
        distill_water,
        ferment_mash,
    }
}

/// The reference distillation registry: one recipe
/// `time=2, {water,1} -> {steam,1}` and nothing else.
pub fn water_only_registry() -> (Arc<Registry>, ResourceKind, ResourceKind) {
    let mut b = RegistryBuilder::new();
    let water = b.register_resource("water");
    let steam = b.register_resource("steam");
    b.register_recipe(2, Some(ResourceSpec::new(water, 1)), Some(ResourceSpec::new(steam, 1)))
        .expect("valid recipe");
    (Arc::new(b.build().expect("registry builds")), water, steam)
}

// ===========================================================================
// Unit constructors
// ===========================================================================

pub fn config_with_capacity(reservoir_capacity: u32) -> UnitConfig {
    UnitConfig {
        reservoir_capacity,
        ..UnitConfig::default()
    }
}

/// A still unit with `amount` of `kind` already in its input reservoir.
pub fn primed_unit(content: &StillContent, kind: ResourceKind, amount: u32) -> ProcessingUnit {
    let mut unit = ProcessingUnit::new(content.registry.clone(), UnitConfig::default());
    let _ = unit.input_mut().fill(&ResourceSpec::new(kind, amount), true);
    unit
}

/// Run `n` work cycle steps, returning how many did work.
pub fn run_cycles(unit: &mut ProcessingUnit, n: usize) -> usize {
    (0..n).filter(|_| unit.advance_work_cycle()).count()
}
