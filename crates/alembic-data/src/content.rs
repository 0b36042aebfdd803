//! Assembles a [`Registry`] and machine settings from a content directory.
//!
//! Load order follows the reference graph: resources, then items, then
//! recipes and containers, which name the former two.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use alembic_core::id::{ItemKindId, ResourceKind};
use alembic_core::registry::{ContainerDef, Registry, RegistryBuilder, ResourceSpec};
use alembic_core::sim::HostConfig;
use alembic_core::unit::UnitConfig;
use tracing::info;

use crate::loader::{
    DataLoadError, deserialize_file, deserialize_list, find_data_file, insert_unique,
    require_data_file, resolve_name,
};
use crate::schema::{
    ContainerData, ItemData, MachineData, RecipeData, ResourceAmountData, ResourceData,
};

/// Everything a host needs to start: the frozen registry plus the settings
/// for new units and for the engine.
#[derive(Debug, Clone)]
pub struct Content {
    pub registry: Arc<Registry>,
    pub unit: UnitConfig,
    pub host: HostConfig,
}

fn resolve_amount(
    data: &ResourceAmountData,
    resources: &HashMap<String, ResourceKind>,
    file: &Path,
) -> Result<ResourceSpec, DataLoadError> {
    let kind = resolve_name(resources, data.resource(), file, "resource")?;
    Ok(ResourceSpec::new(kind, data.amount()))
}

/// Load all content from `dir`.
///
/// `resources` and `recipes` are required. `items`, `containers`, `machine`
/// and `host` fall back to empty lists or defaults when absent.
pub fn load_content(dir: &Path) -> Result<Content, DataLoadError> {
    let mut builder = RegistryBuilder::new();

    // Resources.
    let resources_path = require_data_file(dir, "resources")?;
    let resource_data: Vec<ResourceData> = deserialize_list(&resources_path, "resources")?;
    let mut resources: HashMap<String, ResourceKind> = HashMap::new();
    for data in &resource_data {
        let id = builder.register_resource(&data.name);
        insert_unique(&mut resources, &data.name, id, &resources_path)?;
    }

    // Items.
    let mut items: HashMap<String, ItemKindId> = HashMap::new();
    if let Some(items_path) = find_data_file(dir, "items")? {
        let item_data: Vec<ItemData> = deserialize_list(&items_path, "items")?;
        for data in &item_data {
            let id = builder.register_item(&data.name, data.max_stack);
            insert_unique(&mut items, &data.name, id, &items_path)?;
        }
    }

    // Recipes.
    let recipes_path = require_data_file(dir, "recipes")?;
    let recipe_data: Vec<RecipeData> = deserialize_list(&recipes_path, "recipes")?;
    for data in &recipe_data {
        let input = data
            .input
            .as_ref()
            .map(|amount| resolve_amount(amount, &resources, &recipes_path))
            .transpose()?;
        let output = data
            .output
            .as_ref()
            .map(|amount| resolve_amount(amount, &resources, &recipes_path))
            .transpose()?;
        builder
            .register_recipe(data.time_per_unit, input, output)
            .map_err(|source| DataLoadError::Invalid {
                file: recipes_path.clone(),
                source,
            })?;
    }

    // Containers.
    let mut container_count = 0;
    if let Some(containers_path) = find_data_file(dir, "containers")? {
        let container_data: Vec<ContainerData> =
            deserialize_list(&containers_path, "containers")?;
        let mut seen: HashMap<String, ()> = HashMap::new();
        for data in &container_data {
            insert_unique(&mut seen, &data.filled, (), &containers_path)?;
            let filled = resolve_name(&items, &data.filled, &containers_path, "item")?;
            let empty = data
                .empty
                .as_deref()
                .map(|name| resolve_name(&items, name, &containers_path, "item"))
                .transpose()?;
            let contents = resolve_amount(&data.contents, &resources, &containers_path)?;
            builder
                .register_container(ContainerDef {
                    filled,
                    empty,
                    contents,
                })
                .map_err(|source| DataLoadError::Invalid {
                    file: containers_path.clone(),
                    source,
                })?;
        }
        container_count = container_data.len();
    }

    // Settings.
    let unit = match find_data_file(dir, "machine")? {
        Some(path) => UnitConfig::try_from(deserialize_file::<MachineData>(&path)?)
            .map_err(|source| DataLoadError::OutOfRange { file: path, source })?,
        None => UnitConfig::default(),
    };
    let host = match find_data_file(dir, "host")? {
        Some(path) => deserialize_file::<HostConfig>(&path)?,
        None => HostConfig::default(),
    };

    let registry = builder.build().map_err(|source| DataLoadError::Invalid {
        file: dir.to_path_buf(),
        source,
    })?;

    info!(
        dir = %dir.display(),
        resources = resources.len(),
        items = items.len(),
        recipes = recipe_data.len(),
        containers = container_count,
        "content loaded"
    );

    Ok(Content {
        registry: Arc::new(registry),
        unit,
        host,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alembic_core::fixed::Fixed64;
    use alembic_core::id::Side;
    use alembic_core::registry::RegistryError;
    use std::fs;
    use std::path::PathBuf;

    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "alembic_content_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    fn write_ron_still(dir: &Path) {
        fs::write(dir.join("resources.ron"), r#"[(name: "water"), (name: "steam")]"#).unwrap();
        fs::write(
            dir.join("items.ron"),
            r#"[(name: "can"), (name: "water_can", max_stack: 16)]"#,
        )
        .unwrap();
        fs::write(
            dir.join("recipes.ron"),
            r#"[(time_per_unit: 2, input: Some(("water", 1)), output: Some(("steam", 1)))]"#,
        )
        .unwrap();
        fs::write(
            dir.join("containers.ron"),
            r#"[(filled: "water_can", empty: Some("can"), contents: ("water", 1000))]"#,
        )
        .unwrap();
    }

    #[test]
    fn load_ron_content() {
        let dir = make_test_dir("ron");
        write_ron_still(&dir);

        let content = load_content(&dir).unwrap();
        let registry = &content.registry;
        assert_eq!(registry.resource_count(), 2);
        assert_eq!(registry.item_count(), 2);
        assert_eq!(registry.recipe_count(), 1);
        assert_eq!(registry.container_count(), 1);

        let water = registry.resource_id("water").unwrap();
        let can = registry.item_id("can").unwrap();
        let water_can = registry.item_id("water_can").unwrap();
        assert_eq!(registry.max_stack(can), 64);
        assert_eq!(registry.max_stack(water_can), 16);
        assert!(registry.find_matching(Some(&ResourceSpec::new(water, 1))).is_some());
        let container = registry.container_for(can, water).unwrap();
        assert_eq!(container.filled, water_can);
        assert_eq!(container.contents.amount, 1000);

        assert_eq!(content.unit, UnitConfig::default());
        assert_eq!(content.host, HostConfig::default());
        cleanup(&dir);
    }

    #[test]
    fn load_json_content_with_settings() {
        let dir = make_test_dir("json");
        fs::write(dir.join("resources.json"), r#"[{"name": "mash"}, {"name": "wash"}]"#).unwrap();
        fs::write(
            dir.join("recipes.json"),
            r#"[{"time_per_unit": 5,
                 "input": {"resource": "mash", "amount": 2},
                 "output": {"resource": "wash", "amount": 1}}]"#,
        )
        .unwrap();
        fs::write(
            dir.join("machine.json"),
            r#"{"reservoir_capacity": 2000, "sealed_sides": ["down"], "energy": {"capacity": 100.5}}"#,
        )
        .unwrap();
        fs::write(dir.join("host.json"), r#"{"recipe_check_interval": 5}"#).unwrap();

        let content = load_content(&dir).unwrap();
        let mash = content.registry.resource_id("mash").unwrap();
        let recipe_id = content
            .registry
            .find_matching(Some(&ResourceSpec::new(mash, 1)))
            .unwrap();
        assert_eq!(content.registry.recipe(recipe_id).unwrap().batch_size(), 10);
        assert_eq!(content.registry.item_count(), 0);

        assert_eq!(content.unit.reservoir_capacity, 2000);
        assert_eq!(content.unit.sealed_sides, vec![Side::Down]);
        assert_eq!(content.unit.energy.capacity, Fixed64::from_num(100.5));
        assert_eq!(content.host.recipe_check_interval, 5);
        assert_eq!(content.host.sync_interval, HostConfig::default().sync_interval);
        cleanup(&dir);
    }

    #[test]
    fn load_toml_content() {
        let dir = make_test_dir("toml");
        fs::write(
            dir.join("resources.toml"),
            "[[resources]]\nname = \"water\"\n\n[[resources]]\nname = \"steam\"\n",
        )
        .unwrap();
        fs::write(
            dir.join("recipes.toml"),
            "[[recipes]]\ntime_per_unit = 3\ninput = { resource = \"water\", amount = 1 }\noutput = { resource = \"steam\", amount = 2 }\n",
        )
        .unwrap();
        fs::write(dir.join("host.toml"), "work_interval = 2\n").unwrap();

        let content = load_content(&dir).unwrap();
        assert_eq!(content.registry.recipe_count(), 1);
        assert_eq!(content.host.work_interval, 2);
        cleanup(&dir);
    }

    #[test]
    fn oversized_machine_energy_is_an_error() {
        let dir = make_test_dir("out_of_range");
        write_ron_still(&dir);
        fs::write(dir.join("machine.toml"), "[energy]\ncapacity = 5000000000.0\n").unwrap();
        match load_content(&dir) {
            Err(DataLoadError::OutOfRange { file, source }) => {
                assert_eq!(file, dir.join("machine.toml"));
                assert_eq!(source.field, "energy.capacity");
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }
        cleanup(&dir);
    }

    #[test]
    fn missing_required_file() {
        let dir = make_test_dir("missing");
        fs::write(dir.join("resources.ron"), r#"[(name: "water")]"#).unwrap();
        assert!(matches!(
            load_content(&dir),
            Err(DataLoadError::MissingRequired { ref file, .. }) if file == "recipes"
        ));
        cleanup(&dir);
    }

    #[test]
    fn unresolved_resource_in_recipe() {
        let dir = make_test_dir("unresolved");
        fs::write(dir.join("resources.ron"), r#"[(name: "water")]"#).unwrap();
        fs::write(
            dir.join("recipes.ron"),
            r#"[(time_per_unit: 1, input: Some(("water", 1)), output: Some(("brine", 1)))]"#,
        )
        .unwrap();
        match load_content(&dir) {
            Err(DataLoadError::UnresolvedRef {
                name,
                expected_kind,
                ..
            }) => {
                assert_eq!(name, "brine");
                assert_eq!(expected_kind, "resource");
            }
            other => panic!("expected UnresolvedRef, got {other:?}"),
        }
        cleanup(&dir);
    }

    #[test]
    fn unresolved_item_in_container() {
        let dir = make_test_dir("unresolved_item");
        write_ron_still(&dir);
        fs::write(
            dir.join("containers.ron"),
            r#"[(filled: "steam_can", empty: Some("can"), contents: ("steam", 1000))]"#,
        )
        .unwrap();
        assert!(matches!(
            load_content(&dir),
            Err(DataLoadError::UnresolvedRef { expected_kind: "item", .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = make_test_dir("duplicate");
        fs::write(dir.join("resources.ron"), r#"[(name: "water"), (name: "water")]"#).unwrap();
        fs::write(dir.join("recipes.ron"), "[]").unwrap();
        assert!(matches!(
            load_content(&dir),
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "water"
        ));
        cleanup(&dir);
    }

    #[test]
    fn recipe_without_output_is_invalid() {
        let dir = make_test_dir("invalid");
        fs::write(dir.join("resources.ron"), r#"[(name: "water")]"#).unwrap();
        fs::write(
            dir.join("recipes.ron"),
            r#"[(time_per_unit: 1, input: Some(("water", 1)))]"#,
        )
        .unwrap();
        assert!(matches!(
            load_content(&dir),
            Err(DataLoadError::Invalid {
                source: RegistryError::InvalidRecipe(_),
                ..
            })
        ));
        cleanup(&dir);
    }

    #[test]
    fn empty_container_contents_are_invalid() {
        let dir = make_test_dir("invalid_container");
        write_ron_still(&dir);
        fs::write(
            dir.join("containers.ron"),
            r#"[(filled: "water_can", contents: ("water", 0))]"#,
        )
        .unwrap();
        assert!(matches!(
            load_content(&dir),
            Err(DataLoadError::Invalid {
                source: RegistryError::InvalidContainer(_),
                ..
            })
        ));
        cleanup(&dir);
    }
}
