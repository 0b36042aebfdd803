//! Criterion benchmarks for hosted processing units.
//!
//! Two benchmark groups:
//! - `still_bank`: 1000 powered stills stepping through full cycles
//! - `snapshot`: engine serialize / deserialize at the same scale

use alembic_core::buffer::ItemStack;
use alembic_core::engine::Engine;
use alembic_core::id::Side;
use alembic_core::registry::ResourceSpec;
use alembic_core::sim::HostConfig;
use alembic_core::test_utils::*;
use alembic_core::unit::UnitConfig;
use criterion::{Criterion, criterion_group, criterion_main};

/// Half the stills boil water, half ferment mash. Every tenth still also
/// bottles its output into cans.
fn build_still_bank(content: &StillContent, count: usize) -> Engine {
    let mut engine = Engine::new(content.registry.clone(), HostConfig::default());
    for i in 0..count {
        let id = engine.add_unit(UnitConfig::default());
        let kind = if i % 2 == 0 { content.water } else { content.mash };
        if let Some(unit) = engine.unit_mut(id) {
            let _ = unit.fill(Side::Up, &ResourceSpec::new(kind, 8_000), true);
            if i % 10 == 0 {
                let _ = unit.insert_item(ItemStack::new(content.can, 64), true, Side::Up);
            }
        }
    }
    engine
}

fn power_all(engine: &mut Engine) {
    let ids: Vec<_> = engine.unit_ids().collect();
    for id in ids {
        let _ = engine.supply_energy(id, fixed(110.0));
    }
}

fn bench_still_bank(c: &mut Criterion) {
    let content = still_content();
    let mut group = c.benchmark_group("still_bank");

    let mut engine = build_still_bank(&content, 1000);
    group.bench_function("step_1000_units", |b| {
        b.iter(|| {
            power_all(&mut engine);
            engine.step();
        });
    });

    group.bench_function("state_hash_1000_units", |b| {
        b.iter(|| engine.state_hash());
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let content = still_content();
    let mut group = c.benchmark_group("snapshot");

    let mut engine = build_still_bank(&content, 1000);
    power_all(&mut engine);
    engine.run(5);

    group.bench_function("serialize_1000_units", |b| {
        b.iter(|| engine.serialize().unwrap());
    });

    let data = engine.serialize().unwrap();
    group.bench_function("deserialize_1000_units", |b| {
        b.iter(|| Engine::deserialize(&data, content.registry.clone()).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_still_bank, bench_snapshot);
criterion_main!(benches);
