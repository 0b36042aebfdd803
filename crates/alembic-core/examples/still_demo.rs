//! A single powered still: boils a can of water, bottles the steam, and
//! survives a save/load halfway through.
//!
//! Run with: `RUST_LOG=debug cargo run -p alembic-core --example still_demo --features test-utils`

use alembic_core::buffer::{ItemStack, SlotRole};
use alembic_core::engine::Engine;
use alembic_core::event::UnitEvent;
use alembic_core::id::Side;
use alembic_core::sim::HostConfig;
use alembic_core::sync::ProgressMirror;
use alembic_core::test_utils::{fixed, still_content};
use alembic_core::unit::{ReservoirRole, UnitConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let content = still_content();
    let mut engine = Engine::new(content.registry.clone(), HostConfig::default());
    let still = engine.add_unit(UnitConfig::default());

    if let Some(unit) = engine.unit_mut(still) {
        let accepted = unit.insert_item(ItemStack::new(content.water_can, 1), true, Side::Up);
        let _ = unit.insert_item(ItemStack::new(content.can, 1), true, Side::Up);
        println!("Loaded {accepted} water can(s)");
    }

    let mut mirror = ProgressMirror::default();
    let mut saved = None;

    for tick in 0..1_600u64 {
        let _ = engine.supply_energy(still, fixed(110.0));
        engine.step();

        for (_, update) in engine.drain_sync() {
            mirror.apply(update);
        }
        for event in engine.drain_events() {
            if let UnitEvent::CycleCompleted { tick, .. } = event
                && tick % 300 == 2
            {
                println!("tick {tick:>4}: cycle completed, bar at {}/16", mirror.progress_scaled(16));
            }
        }

        if tick == 750 {
            saved = Some(engine.serialize()?);
        }
    }

    if let Some(unit) = engine.unit(still) {
        println!(
            "Done: input {:?}, output {:?}, product slot {:?}",
            unit.tank_level(ReservoirRole::Input),
            unit.tank_level(ReservoirRole::Output),
            unit.buffer().role(SlotRole::Product)
        );
    }

    if let Some(bytes) = saved {
        let restored = Engine::deserialize(&bytes, content.registry.clone())?;
        if let Some(unit) = restored.unit(still) {
            println!(
                "Snapshot at tick {}: {} bytes, {} water left, phase {:?}",
                restored.tick(),
                bytes.len(),
                unit.input().amount(),
                unit.phase()
            );
        }
    }

    Ok(())
}
