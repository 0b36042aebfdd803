use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a processing unit hosted by an [`Engine`](crate::engine::Engine).
    pub struct UnitId;
}

/// Identifies a resource kind (a fluid, in game terms). Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKind(pub u32);

/// Identifies a discrete item kind in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKindId(pub u32);

/// Identifies a recipe in the registry. Recipes are never removed, so an id
/// stays valid for the lifetime of its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);

/// The face of a host block that external automation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Side {
    pub const ALL: [Side; 6] = [
        Side::Down,
        Side::Up,
        Side::North,
        Side::South,
        Side::West,
        Side::East,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_kind_equality() {
        assert_eq!(ResourceKind(3), ResourceKind(3));
        assert_ne!(ResourceKind(3), ResourceKind(4));
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ResourceKind(0), "water");
        map.insert(ResourceKind(1), "steam");
        assert_eq!(map[&ResourceKind(1)], "steam");
    }

    #[test]
    fn side_names_round_trip_through_json() {
        let json = serde_json::to_string(&Side::North).unwrap();
        assert_eq!(json, "\"north\"");
        let back: Side = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Side::North);
    }
}
