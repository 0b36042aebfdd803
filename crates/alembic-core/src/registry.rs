use crate::id::{ItemKindId, RecipeId, ResourceKind};
use std::collections::HashMap;

/// An amount of one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub amount: u32,
}

impl ResourceSpec {
    pub fn new(kind: ResourceKind, amount: u32) -> Self {
        Self { kind, amount }
    }

    /// Kind equality only. Amounts are not compared when matching recipes.
    pub fn same_kind(&self, other: &ResourceSpec) -> bool {
        self.kind == other.kind
    }
}

/// A single transformation: `input` is consumed in batches of
/// `time_per_unit * input.amount` and `output` is emitted once per tick of
/// the resulting cycle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Recipe {
    pub time_per_unit: u32,
    pub input: ResourceSpec,
    pub output: ResourceSpec,
}

impl Recipe {
    /// Build a recipe. Absent input or output, a zero `time_per_unit`, and
    /// zero amounts are all rejected.
    pub fn new(
        time_per_unit: u32,
        input: Option<ResourceSpec>,
        output: Option<ResourceSpec>,
    ) -> Result<Self, RegistryError> {
        let input = input.ok_or(RegistryError::InvalidRecipe(
            "recipes need an input, input was absent",
        ))?;
        let output = output.ok_or(RegistryError::InvalidRecipe(
            "recipes need an output, output was absent",
        ))?;
        if time_per_unit == 0 {
            return Err(RegistryError::InvalidRecipe("time per unit must be positive"));
        }
        if input.amount == 0 || output.amount == 0 {
            return Err(RegistryError::InvalidRecipe("resource amounts must be positive"));
        }
        Ok(Self {
            time_per_unit,
            input,
            output,
        })
    }

    /// Whether `resource` is accepted as this recipe's input.
    pub fn matches(&self, resource: Option<&ResourceSpec>) -> bool {
        match resource {
            Some(res) => self.input.same_kind(res),
            // Inputs are never empty, so an empty reservoir matches nothing.
            None => false,
        }
    }

    /// Resource drained from the input reservoir to start one cycle.
    pub fn batch_size(&self) -> u32 {
        self.time_per_unit.saturating_mul(self.input.amount)
    }
}

/// A discrete item kind.
#[derive(Debug, Clone)]
pub struct ItemKindDef {
    pub name: String,
    /// Largest stack a single slot may hold of this item.
    pub max_stack: u32,
}

/// A container item that carries a fixed amount of resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDef {
    /// The item when full.
    pub filled: ItemKindId,
    /// The item when empty, if the container can be refilled.
    pub empty: Option<ItemKindId>,
    /// What one filled container holds.
    pub contents: ResourceSpec,
}

/// Builder for constructing an immutable Registry.
/// Registration happens entirely before any unit ticks.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    resources: Vec<String>,
    resource_name_to_id: HashMap<String, ResourceKind>,
    items: Vec<ItemKindDef>,
    item_name_to_id: HashMap<String, ItemKindId>,
    recipes: Vec<Recipe>,
    containers: Vec<ContainerDef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource kind. Returns its id.
    pub fn register_resource(&mut self, name: &str) -> ResourceKind {
        let id = ResourceKind(self.resources.len() as u32);
        self.resources.push(name.to_string());
        self.resource_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Register an item kind. Returns its id.
    pub fn register_item(&mut self, name: &str, max_stack: u32) -> ItemKindId {
        let id = ItemKindId(self.items.len() as u32);
        self.items.push(ItemKindDef {
            name: name.to_string(),
            max_stack: max_stack.max(1),
        });
        self.item_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Append a recipe. No de-duplication: when two recipes share an input
    /// kind the earlier one always wins.
    pub fn register_recipe(
        &mut self,
        time_per_unit: u32,
        input: Option<ResourceSpec>,
        output: Option<ResourceSpec>,
    ) -> Result<RecipeId, RegistryError> {
        let recipe = Recipe::new(time_per_unit, input, output)?;
        let id = RecipeId(self.recipes.len() as u32);
        self.recipes.push(recipe);
        Ok(id)
    }

    /// Register a container item. Filled items should map to a single
    /// definition; the first registration wins on lookup.
    pub fn register_container(&mut self, container: ContainerDef) -> Result<(), RegistryError> {
        if container.contents.amount == 0 {
            return Err(RegistryError::InvalidContainer(container.filled));
        }
        self.containers.push(container);
        Ok(())
    }

    pub fn resource_id(&self, name: &str) -> Option<ResourceKind> {
        self.resource_name_to_id.get(name).copied()
    }

    pub fn item_id(&self, name: &str) -> Option<ItemKindId> {
        self.item_name_to_id.get(name).copied()
    }

    /// Finalize and build the immutable registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let resource_known = |kind: ResourceKind| (kind.0 as usize) < self.resources.len();
        let item_known = |item: ItemKindId| (item.0 as usize) < self.items.len();

        for recipe in &self.recipes {
            for spec in [recipe.input, recipe.output] {
                if !resource_known(spec.kind) {
                    return Err(RegistryError::UnknownResource(spec.kind));
                }
            }
        }
        for container in &self.containers {
            if !resource_known(container.contents.kind) {
                return Err(RegistryError::UnknownResource(container.contents.kind));
            }
            for item in std::iter::once(container.filled).chain(container.empty) {
                if !item_known(item) {
                    return Err(RegistryError::UnknownItem(item));
                }
            }
        }

        Ok(Registry {
            resources: self.resources,
            resource_name_to_id: self.resource_name_to_id,
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            recipes: self.recipes,
            containers: self.containers,
        })
    }
}

/// Immutable registry. Frozen after build(). Thread-safe to share.
#[derive(Debug)]
pub struct Registry {
    resources: Vec<String>,
    resource_name_to_id: HashMap<String, ResourceKind>,
    items: Vec<ItemKindDef>,
    item_name_to_id: HashMap<String, ItemKindId>,
    recipes: Vec<Recipe>,
    containers: Vec<ContainerDef>,
}

impl Registry {
    /// First registered recipe whose input kind matches `resource`.
    pub fn find_matching(&self, resource: Option<&ResourceSpec>) -> Option<RecipeId> {
        self.recipes
            .iter()
            .position(|recipe| recipe.matches(resource))
            .map(|index| RecipeId(index as u32))
    }

    /// Whether some recipe consumes `resource`.
    pub fn is_input(&self, resource: Option<&ResourceSpec>) -> bool {
        self.find_matching(resource).is_some()
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(id.0 as usize)
    }

    /// All recipes in registration order, as (input, output) pairs.
    pub fn recipes(&self) -> impl Iterator<Item = (&ResourceSpec, &ResourceSpec)> {
        self.recipes.iter().map(|r| (&r.input, &r.output))
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    pub fn resource_name(&self, kind: ResourceKind) -> Option<&str> {
        self.resources.get(kind.0 as usize).map(String::as_str)
    }

    pub fn resource_id(&self, name: &str) -> Option<ResourceKind> {
        self.resource_name_to_id.get(name).copied()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn item(&self, id: ItemKindId) -> Option<&ItemKindDef> {
        self.items.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemKindId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Largest stack of `item` a slot may hold. Unknown items stack to 1.
    pub fn max_stack(&self, item: ItemKindId) -> u32 {
        self.item(item).map(|def| def.max_stack).unwrap_or(1)
    }

    /// The container definition for a filled container item.
    pub fn filled_container(&self, item: ItemKindId) -> Option<&ContainerDef> {
        self.containers.iter().find(|c| c.filled == item)
    }

    /// Whether `item` is the empty form of some container.
    pub fn is_empty_container(&self, item: ItemKindId) -> bool {
        self.containers.iter().any(|c| c.empty == Some(item))
    }

    /// The container that `empty` becomes when filled with `kind`.
    pub fn container_for(&self, empty: ItemKindId, kind: ResourceKind) -> Option<&ContainerDef> {
        self.containers
            .iter()
            .find(|c| c.empty == Some(empty) && c.contents.kind == kind)
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid recipe: {0}")]
    InvalidRecipe(&'static str),
    #[error("invalid container {0:?}: contents must be a positive amount")]
    InvalidContainer(ItemKindId),
    #[error("unknown resource kind: {0:?}")]
    UnknownResource(ResourceKind),
    #[error("unknown item kind: {0:?}")]
    UnknownItem(ItemKindId),
}
