//! Loads the bundled still content and runs it on a host.

use std::path::{Path, PathBuf};

use alembic_core::buffer::ItemStack;
use alembic_core::engine::Engine;
use alembic_core::fixed::Fixed64;
use alembic_core::id::Side;
use alembic_core::registry::ResourceSpec;
use alembic_core::sim::HostConfig;
use alembic_core::unit::UnitConfig;
use alembic_data::load_content;

fn still_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("content/still")
}

#[test]
fn bundled_content_loads() {
    let content = load_content(&still_dir()).unwrap();
    assert_eq!(content.registry.resource_count(), 4);
    assert_eq!(content.registry.item_count(), 4);
    assert_eq!(content.registry.recipe_count(), 2);
    assert_eq!(content.registry.container_count(), 3);
    assert_eq!(content.unit, UnitConfig::default());
    assert_eq!(content.host, HostConfig::default());

    let mash = content.registry.resource_id("mash").unwrap();
    let recipe = content
        .registry
        .find_matching(Some(&ResourceSpec::new(mash, 1)))
        .and_then(|id| content.registry.recipe(id))
        .unwrap();
    assert_eq!(recipe.batch_size(), 10);
}

#[test]
fn loaded_still_boils_a_can() {
    let content = load_content(&still_dir()).unwrap();
    let water_can = content.registry.item_id("water_can").unwrap();
    let steam = content.registry.resource_id("steam").unwrap();

    let mut engine = Engine::new(content.registry.clone(), content.host.clone());
    let still = engine.add_unit(content.unit.clone());
    let accepted = engine
        .unit_mut(still)
        .map(|unit| unit.insert_item(ItemStack::new(water_can, 1), true, Side::Up));
    assert_eq!(accepted, Some(1));

    for _ in 0..20 {
        let _ = engine.supply_energy(still, Fixed64::from_num(110));
        engine.step();
    }

    let unit = engine.unit(still).unwrap();
    assert_eq!(unit.output().kind(), Some(steam));
    assert!(unit.output().amount() > 0);
    // Nothing but the one can of water ever entered the still.
    assert_eq!(
        unit.input().amount() + unit.progress_remaining() + unit.output().amount(),
        1000
    );
}
