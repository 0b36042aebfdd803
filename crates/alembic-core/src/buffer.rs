use crate::id::ItemKindId;
use serde::{Deserialize, Serialize};

/// A stack of identical discrete items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: ItemKindId,
    pub count: u32,
}

impl ItemStack {
    pub fn new(item: ItemKindId, count: u32) -> Self {
        Self { item, count }
    }
}

/// The fixed meaning of each buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotRole {
    /// Filled product containers, the only slot automation may extract from.
    Product = 0,
    /// Empty containers waiting to be filled from the output reservoir.
    Resource = 1,
    /// Filled containers whose contents feed the input reservoir.
    Container = 2,
}

impl SlotRole {
    pub const ALL: [SlotRole; 3] = [SlotRole::Product, SlotRole::Resource, SlotRole::Container];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Ordered, fixed-length slot array. A stack with zero count is never
/// stored; it is normalized to an empty slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBuffer {
    slots: Vec<Option<ItemStack>>,
    /// Per-slot ceiling, applied on top of each item's own max stack.
    stack_limit: u32,
}

impl ItemBuffer {
    pub fn new(slot_count: usize, stack_limit: u32) -> Self {
        Self {
            slots: vec![None; slot_count],
            stack_limit: stack_limit.max(1),
        }
    }

    /// A buffer with one slot per [`SlotRole`].
    pub fn with_roles(stack_limit: u32) -> Self {
        Self::new(SlotRole::ALL.len(), stack_limit)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn stack_limit(&self) -> u32 {
        self.stack_limit
    }

    pub fn get(&self, index: usize) -> Option<&ItemStack> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn role(&self, role: SlotRole) -> Option<&ItemStack> {
        self.get(role.index())
    }

    pub fn slots(&self) -> &[Option<ItemStack>] {
        &self.slots
    }

    /// Overwrite a slot. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, stack: Option<ItemStack>) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = stack.filter(|s| s.count > 0);
        }
    }

    /// Remove up to `count` items from a slot and return them.
    pub fn take(&mut self, index: usize, count: u32) -> Option<ItemStack> {
        let slot = self.slots.get_mut(index)?;
        let stack = slot.as_mut()?;
        let taken = count.min(stack.count);
        if taken == 0 {
            return None;
        }
        stack.count -= taken;
        let item = stack.item;
        if stack.count == 0 {
            *slot = None;
        }
        Some(ItemStack::new(item, taken))
    }

    /// Room left in a slot for `item`, given the item's own max stack.
    /// Zero if the slot holds a different item.
    pub fn space_for(&self, index: usize, item: ItemKindId, max_stack: u32) -> u32 {
        let limit = self.stack_limit.min(max_stack);
        match self.slots.get(index) {
            None => 0,
            Some(None) => limit,
            Some(Some(stack)) if stack.item == item => limit.saturating_sub(stack.count),
            Some(Some(_)) => 0,
        }
    }

    /// Merge up to `max_count` of `stack` into a slot. Returns how many were
    /// (or, with `commit == false`, would be) accepted.
    #[must_use = "returns the count actually accepted"]
    pub fn add(&mut self, index: usize, stack: ItemStack, max_stack: u32, max_count: u32, commit: bool) -> u32 {
        let accepted = stack
            .count
            .min(max_count)
            .min(self.space_for(index, stack.item, max_stack));
        if commit && accepted > 0 {
            let slot = &mut self.slots[index];
            match slot {
                Some(existing) => existing.count += accepted,
                None => *slot = Some(ItemStack::new(stack.item, accepted)),
            }
        }
        accepted
    }

    /// Empty every slot.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}
