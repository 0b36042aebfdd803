use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::{ItemBuffer, ItemStack, SlotRole};
use crate::energy::EnergyConfig;
use crate::fixed::scale;
use crate::id::{RecipeId, Side};
use crate::registry::{Recipe, Registry, ResourceSpec};
use crate::reservoir::{Reservoir, TankLevel};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Per-machine configuration, fixed at placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// Capacity of both the input and the output reservoir.
    pub reservoir_capacity: u32,
    /// Per-slot stack ceiling of the item buffer.
    pub stack_limit: u32,
    /// Faces that refuse all automation access.
    pub sealed_sides: Vec<Side>,
    pub energy: EnergyConfig,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            reservoir_capacity: 10_000,
            stack_limit: 64,
            sealed_sides: Vec::new(),
            energy: EnergyConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Observable state
// ---------------------------------------------------------------------------

/// Advisory error code. Never blocks a transition; the tick always completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[default]
    Ok,
    /// The input reservoir holds nothing any recipe accepts.
    NoRecipe,
    /// A recipe matched but the input reservoir holds less than one batch.
    NoResource,
}

/// Coarse state derived from the recipe and progress counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitPhase {
    /// No recipe resolved.
    Idle,
    /// A cycle is in flight.
    Working,
    /// A recipe is resolved but no cycle is running: waiting on resource or
    /// on output room.
    Stalled,
}

/// Which reservoir an observation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservoirRole {
    Input,
    Output,
}

/// What a single work cycle step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing happened this step.
    Idle,
    /// A new batch was drained from the input reservoir.
    Started { batch: u32 },
    /// An in-flight cycle advanced; `completed` when it just ran out.
    Continued { completed: bool },
}

impl CycleOutcome {
    pub fn did_work(&self) -> bool {
        !matches!(self, CycleOutcome::Idle)
    }
}

// ---------------------------------------------------------------------------
// Processing unit
// ---------------------------------------------------------------------------

/// A recipe-driven processing unit.
///
/// Owns its reservoirs and item buffer exclusively. The registry is shared
/// read-only with every other unit.
#[derive(Debug, Clone)]
pub struct ProcessingUnit {
    pub(crate) registry: Arc<Registry>,
    pub(crate) config: UnitConfig,
    pub(crate) input: Reservoir,
    pub(crate) output: Reservoir,
    pub(crate) buffer: ItemBuffer,
    pub(crate) current_recipe: Option<RecipeId>,
    pub(crate) progress_remaining: u32,
    pub(crate) progress_total: u32,
    /// The exact resource committed to the in-flight cycle. Lets resolution
    /// keep finding the cycle's recipe after the input reservoir has been
    /// drained.
    pub(crate) buffered: Option<ResourceSpec>,
    pub(crate) error_state: ErrorCode,
}

impl ProcessingUnit {
    /// An idle unit with empty reservoirs and buffer, sized by `config`.
    pub fn new(registry: Arc<Registry>, config: UnitConfig) -> Self {
        Self {
            input: Reservoir::new(config.reservoir_capacity),
            output: Reservoir::new(config.reservoir_capacity),
            buffer: ItemBuffer::with_roles(config.stack_limit),
            registry,
            config,
            current_recipe: None,
            progress_remaining: 0,
            progress_total: 0,
            buffered: None,
            error_state: ErrorCode::Ok,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The shared recipe and container table.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Settings fixed at placement.
    pub fn config(&self) -> &UnitConfig {
        &self.config
    }

    /// The reservoir recipes draw from.
    pub fn input(&self) -> &Reservoir {
        &self.input
    }

    /// The reservoir cycles emit into.
    pub fn output(&self) -> &Reservoir {
        &self.output
    }

    /// Direct reservoir access for the owning host (world interactions that
    /// bypass the side-aware routing API).
    pub fn input_mut(&mut self) -> &mut Reservoir {
        &mut self.input
    }

    /// See [`ProcessingUnit::input_mut`].
    pub fn output_mut(&mut self) -> &mut Reservoir {
        &mut self.output
    }

    /// Either reservoir, by role.
    pub fn reservoir(&self, which: ReservoirRole) -> &Reservoir {
        match which {
            ReservoirRole::Input => &self.input,
            ReservoirRole::Output => &self.output,
        }
    }

    /// The role-indexed item slots.
    pub fn buffer(&self) -> &ItemBuffer {
        &self.buffer
    }

    /// Direct slot access, bypassing the routing policy.
    pub fn buffer_mut(&mut self) -> &mut ItemBuffer {
        &mut self.buffer
    }

    /// The recipe from the last resolution, if any.
    pub fn current_recipe(&self) -> Option<RecipeId> {
        self.current_recipe
    }

    /// Work left in the in-flight cycle; 0 when none is running.
    pub fn progress_remaining(&self) -> u32 {
        self.progress_remaining
    }

    /// Size of the last started batch. Cleared on a recipe change.
    pub fn progress_total(&self) -> u32 {
        self.progress_total
    }

    /// The resource committed to the in-flight cycle.
    pub fn buffered_resource(&self) -> Option<ResourceSpec> {
        self.buffered
    }

    /// Advisory code from the last resolution or work step.
    pub fn error_state(&self) -> ErrorCode {
        self.error_state
    }

    fn recipe_def(&self) -> Option<&Recipe> {
        self.current_recipe.and_then(|id| self.registry.recipe(id))
    }

    /// Coarse state for observers. See [`UnitPhase`].
    pub fn phase(&self) -> UnitPhase {
        match self.current_recipe {
            None => UnitPhase::Idle,
            Some(_) if self.progress_remaining > 0 => UnitPhase::Working,
            Some(_) => UnitPhase::Stalled,
        }
    }

    // -----------------------------------------------------------------------
    // Recipe resolution
    // -----------------------------------------------------------------------

    /// Re-derive the current recipe from the live input reservoir, falling
    /// back to the committed resource while a cycle is in flight. A changed
    /// recipe (including to or from none) discards in-flight progress.
    pub fn resolve_recipe(&mut self) -> Option<RecipeId> {
        let mut resolved = self.registry.find_matching(self.input.contents().as_ref());

        if resolved.is_none()
            && self.progress_remaining > 0
            && let Some(committed) = self.buffered
        {
            let remaining = ResourceSpec::new(committed.kind, self.progress_remaining);
            resolved = self.registry.find_matching(Some(&remaining));
        }

        if resolved.is_none() {
            self.error_state = ErrorCode::NoRecipe;
        }

        // Progress with no recipe behind it (e.g. restored from a record
        // whose input reservoir was empty) cannot be resumed.
        let orphaned = resolved.is_none() && self.progress_remaining > 0;

        if resolved != self.current_recipe || orphaned {
            debug!(
                from = ?self.current_recipe,
                to = ?resolved,
                discarded = self.progress_remaining,
                "recipe changed"
            );
            self.current_recipe = resolved;
            self.reset_cycle();
        }

        resolved
    }

    /// The periodic recipe check: re-resolve and drop a stale `NoRecipe`.
    pub fn refresh_recipe(&mut self) {
        self.resolve_recipe();
        if self.error_state == ErrorCode::NoRecipe && self.current_recipe.is_some() {
            self.error_state = ErrorCode::Ok;
        }
    }

    fn reset_cycle(&mut self) {
        self.progress_remaining = 0;
        self.progress_total = 0;
        self.buffered = None;
    }

    // -----------------------------------------------------------------------
    // Work cycle
    // -----------------------------------------------------------------------

    /// Run one work cycle step. Returns whether any work was done.
    pub fn advance_work_cycle(&mut self) -> bool {
        self.work_cycle().did_work()
    }

    /// Run one work cycle step and report what it did.
    pub fn work_cycle(&mut self) -> CycleOutcome {
        let registry = Arc::clone(&self.registry);
        let recipe = self.resolve_recipe().and_then(|id| registry.recipe(id));

        if let Some(recipe) = recipe {
            // Ongoing cycle.
            if self.progress_remaining > 0 {
                self.progress_remaining = self.progress_remaining.saturating_sub(recipe.input.amount);
                // Output that does not fit is simply not produced.
                let _ = self.output.fill(&recipe.output, true);
                self.error_state = ErrorCode::Ok;
                let completed = self.progress_remaining == 0;
                if completed {
                    debug!(recipe = ?self.current_recipe, "cycle completed");
                }
                return CycleOutcome::Continued { completed };
            }

            // Start the next cycle if there is room for one batch of output.
            if self.output.free_space() >= recipe.output.amount {
                let batch = recipe.batch_size();
                if self.input.amount() >= batch {
                    self.buffered = self.input.drain(batch, true);
                    self.progress_remaining = batch;
                    self.progress_total = batch;
                    self.error_state = ErrorCode::Ok;
                    debug!(recipe = ?self.current_recipe, batch, "cycle started");
                    return CycleOutcome::Started { batch };
                }
                self.error_state = ErrorCode::NoResource;
            }
        }

        self.buffered = None;
        CycleOutcome::Idle
    }

    /// Whether a work step now would do something: a recipe is resolved,
    /// a cycle is in flight or a full batch is available, and there is room
    /// for one more batch of output.
    pub fn has_pending_work(&self) -> bool {
        let Some(recipe) = self.recipe_def() else {
            return false;
        };
        (self.progress_remaining > 0 || self.input.amount() >= recipe.batch_size())
            && self.output.free_space() >= recipe.output.amount
    }

    /// Cycle in flight, or a recipe with room for one batch of output.
    pub fn is_working(&self) -> bool {
        self.progress_remaining > 0
            || self
                .recipe_def()
                .is_some_and(|recipe| self.output.free_space() >= recipe.output.amount)
    }

    /// Recipe resolved and idle only because the output reservoir is full.
    /// This stall carries no error code.
    pub fn output_blocked(&self) -> bool {
        self.progress_remaining == 0
            && self
                .recipe_def()
                .is_some_and(|recipe| self.output.free_space() < recipe.output.amount)
    }

    // -----------------------------------------------------------------------
    // Buffer exchange
    // -----------------------------------------------------------------------

    /// Pour filled containers into the input reservoir and bottle output into
    /// empty containers. Runs each direction until it can make no further
    /// progress, so a second call in the same tick changes nothing.
    ///
    /// Returns whether anything moved.
    pub fn exchange_buffer(&mut self) -> bool {
        let poured = self.pour_containers();
        let bottled = self.bottle_output();
        poured || bottled
    }

    fn pour_containers(&mut self) -> bool {
        let slot = SlotRole::Container.index();
        let mut changed = false;
        while let Some(stack) = self.buffer.get(slot).copied() {
            let Some(container) = self.registry.filled_container(stack.item) else {
                break;
            };
            let contents = container.contents;
            if !self.registry.is_input(Some(&contents)) {
                break;
            }
            // Containers are only emptied whole.
            if self.input.fill(&contents, false) < contents.amount {
                break;
            }
            let _ = self.input.fill(&contents, true);
            self.buffer.take(slot, 1);
            changed = true;
        }
        changed
    }

    fn bottle_output(&mut self) -> bool {
        let source = SlotRole::Resource.index();
        let product = SlotRole::Product.index();
        let mut changed = false;
        while let (Some(empty), Some(kind)) = (self.buffer.get(source).copied(), self.output.kind()) {
            let Some(container) = self.registry.container_for(empty.item, kind) else {
                break;
            };
            let filled = ItemStack::new(container.filled, 1);
            let amount = container.contents.amount;
            if self.output.amount() < amount {
                break;
            }
            let max_stack = self.registry.max_stack(filled.item);
            if self.buffer.add(product, filled, max_stack, 1, false) == 0 {
                break;
            }
            let _ = self.output.drain(amount, true);
            self.buffer.take(source, 1);
            let _ = self.buffer.add(product, filled, max_stack, 1, true);
            changed = true;
        }
        changed
    }

    // -----------------------------------------------------------------------
    // External routing
    // -----------------------------------------------------------------------

    fn is_sealed(&self, side: Side) -> bool {
        self.config.sealed_sides.contains(&side)
    }

    /// The slot an incoming stack would be routed to, if any.
    fn routing_slot(&self, item: &ItemStack) -> Option<SlotRole> {
        if self.accepts_as_input(item) {
            Some(SlotRole::Container)
        } else if self.registry.is_empty_container(item.item) {
            Some(SlotRole::Resource)
        } else {
            None
        }
    }

    fn accepts_as_input(&self, item: &ItemStack) -> bool {
        self.registry
            .filled_container(item.item)
            .is_some_and(|container| self.registry.is_input(Some(&container.contents)))
    }

    /// Whether automation on `side` may insert `item` into `slot_index`.
    pub fn can_accept(&self, slot_index: usize, item: &ItemStack, side: Side) -> bool {
        if self.is_sealed(side) {
            return false;
        }
        match SlotRole::from_index(slot_index) {
            Some(SlotRole::Resource) => self.registry.is_empty_container(item.item),
            Some(SlotRole::Container) => self.accepts_as_input(item),
            Some(SlotRole::Product) | None => false,
        }
    }

    /// Whether automation on `side` may extract from `slot_index`. Only the
    /// product slot is extractable.
    pub fn can_remove(&self, slot_index: usize, _item: &ItemStack, side: Side) -> bool {
        !self.is_sealed(side) && SlotRole::from_index(slot_index) == Some(SlotRole::Product)
    }

    /// Route an incoming stack to its slot. Returns how many items were (or
    /// would be) accepted.
    pub fn insert_item(&mut self, stack: ItemStack, commit: bool, side: Side) -> u32 {
        if self.is_sealed(side) || stack.count == 0 {
            return 0;
        }
        let Some(role) = self.routing_slot(&stack) else {
            return 0;
        };
        let max_stack = self.registry.max_stack(stack.item);
        self.buffer.add(role.index(), stack, max_stack, u32::MAX, commit)
    }

    /// Take one filled product container.
    pub fn extract_item(&mut self, commit: bool, side: Side) -> Option<ItemStack> {
        if self.is_sealed(side) {
            return None;
        }
        let index = SlotRole::Product.index();
        if commit {
            self.buffer.take(index, 1)
        } else {
            self.buffer.get(index).map(|s| ItemStack::new(s.item, 1))
        }
    }

    /// Pipe resource into the input reservoir. Only recipe inputs are accepted.
    pub fn fill(&mut self, side: Side, resource: &ResourceSpec, commit: bool) -> u32 {
        if self.is_sealed(side) || !self.registry.is_input(Some(resource)) {
            return 0;
        }
        self.input.fill(resource, commit)
    }

    /// Pipe resource out of the output reservoir.
    pub fn drain(&mut self, side: Side, max_amount: u32, commit: bool) -> Option<ResourceSpec> {
        if self.is_sealed(side) {
            return None;
        }
        self.output.drain(max_amount, commit)
    }

    // -----------------------------------------------------------------------
    // Progress observation
    // -----------------------------------------------------------------------

    /// Remaining progress on `0..=max`, counting down as the cycle runs.
    /// Returns `max` when no cycle has been started.
    pub fn progress_scaled(&self, max: i32) -> i32 {
        scale(self.progress_remaining, self.progress_total, max)
    }

    /// Fill level of a reservoir on `0..=max`.
    pub fn reservoir_scaled(&self, which: ReservoirRole, max: i32) -> i32 {
        self.reservoir(which).scaled(max)
    }

    /// Coarse fill rating of a reservoir.
    pub fn tank_level(&self, which: ReservoirRole) -> TankLevel {
        self.reservoir(which).level()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
