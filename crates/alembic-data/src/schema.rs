//! On-disk content structs. Names here are resolved into registry ids by
//! [`crate::content`].

use alembic_core::energy::EnergyConfig;
use alembic_core::fixed::{Fixed64, f64_to_fixed64};
use alembic_core::id::Side;
use alembic_core::unit::UnitConfig;
use serde::Deserialize;

// ===========================================================================
// Registry content
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceData {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
}

fn default_max_stack() -> u32 {
    64
}

/// An amount of a named resource: `("water", 1)` or
/// `{ resource: "water", amount: 1 }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResourceAmountData {
    Short(String, u32),
    Full { resource: String, amount: u32 },
}

impl ResourceAmountData {
    pub fn resource(&self) -> &str {
        match self {
            ResourceAmountData::Short(name, _) => name,
            ResourceAmountData::Full { resource, .. } => resource,
        }
    }

    pub fn amount(&self) -> u32 {
        match *self {
            ResourceAmountData::Short(_, amount) | ResourceAmountData::Full { amount, .. } => amount,
        }
    }
}

/// A recipe. Input and output are optional here so that a recipe missing
/// either is reported by the registry rather than as a parse error.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub time_per_unit: u32,
    #[serde(default)]
    pub input: Option<ResourceAmountData>,
    #[serde(default)]
    pub output: Option<ResourceAmountData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerData {
    /// The filled item.
    pub filled: String,
    /// The empty item, if the container can be refilled.
    #[serde(default)]
    pub empty: Option<String>,
    pub contents: ResourceAmountData,
}

// ===========================================================================
// Machine settings
// ===========================================================================

/// A machine setting that does not fit the fixed-point energy range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field} = {value} is outside the fixed-point energy range")]
pub struct OutOfRange {
    pub field: &'static str,
    pub value: f64,
}

fn energy_value(field: &'static str, value: f64) -> Result<Fixed64, OutOfRange> {
    // Negative limits mean "none".
    f64_to_fixed64(value.max(0.0)).ok_or(OutOfRange { field, value })
}

/// Energy limits in plain numbers; converted to fixed point on load.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnergyData {
    pub capacity: f64,
    pub max_receive: f64,
    pub cost_per_work: f64,
}

impl Default for EnergyData {
    fn default() -> Self {
        Self {
            capacity: 800.0,
            max_receive: 110.0,
            cost_per_work: 5.0,
        }
    }
}

impl TryFrom<EnergyData> for EnergyConfig {
    type Error = OutOfRange;

    fn try_from(data: EnergyData) -> Result<Self, Self::Error> {
        Ok(EnergyConfig {
            capacity: energy_value("energy.capacity", data.capacity)?,
            max_receive: energy_value("energy.max_receive", data.max_receive)?,
            cost_per_work: energy_value("energy.cost_per_work", data.cost_per_work)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MachineData {
    pub reservoir_capacity: u32,
    pub stack_limit: u32,
    pub sealed_sides: Vec<Side>,
    pub energy: EnergyData,
}

impl Default for MachineData {
    fn default() -> Self {
        let unit = UnitConfig::default();
        Self {
            reservoir_capacity: unit.reservoir_capacity,
            stack_limit: unit.stack_limit,
            sealed_sides: unit.sealed_sides,
            energy: EnergyData::default(),
        }
    }
}

impl TryFrom<MachineData> for UnitConfig {
    type Error = OutOfRange;

    fn try_from(data: MachineData) -> Result<Self, Self::Error> {
        Ok(UnitConfig {
            reservoir_capacity: data.reservoir_capacity,
            stack_limit: data.stack_limit,
            sealed_sides: data.sealed_sides,
            energy: data.energy.try_into()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_amount_forms() {
        let short: ResourceAmountData = ron::from_str(r#"("water", 3)"#).unwrap();
        let full: ResourceAmountData =
            serde_json::from_str(r#"{ "resource": "water", "amount": 3 }"#).unwrap();
        for parsed in [short, full] {
            assert_eq!(parsed.resource(), "water");
            assert_eq!(parsed.amount(), 3);
        }
    }

    #[test]
    fn machine_defaults_match_unit_defaults() {
        let config = UnitConfig::try_from(MachineData::default()).unwrap();
        assert_eq!(config, UnitConfig::default());
    }

    #[test]
    fn partial_machine_file() {
        let data: MachineData =
            toml::from_str("reservoir_capacity = 4000\nsealed_sides = [\"up\"]\n\n[energy]\ncost_per_work = 2.5\n")
                .unwrap();
        let config = UnitConfig::try_from(data).unwrap();
        assert_eq!(config.reservoir_capacity, 4000);
        assert_eq!(config.stack_limit, 64);
        assert_eq!(config.sealed_sides, vec![Side::Up]);
        assert_eq!(config.energy.cost_per_work, Fixed64::from_num(2.5));
        assert_eq!(config.energy.capacity, Fixed64::from_num(800));
    }

    #[test]
    fn oversized_energy_is_out_of_range() {
        let data: MachineData =
            toml::from_str("[energy]\ncapacity = 5000000000.0\n").unwrap();
        let err = UnitConfig::try_from(data).unwrap_err();
        assert_eq!(err.field, "energy.capacity");
        assert_eq!(err.value, 5_000_000_000.0);

        let data = MachineData {
            energy: EnergyData {
                max_receive: f64::INFINITY,
                ..EnergyData::default()
            },
            ..MachineData::default()
        };
        assert_eq!(UnitConfig::try_from(data).unwrap_err().field, "energy.max_receive");
    }

    #[test]
    fn negative_energy_means_none() {
        let data = MachineData {
            energy: EnergyData {
                cost_per_work: -3.0,
                ..EnergyData::default()
            },
            ..MachineData::default()
        };
        let config = UnitConfig::try_from(data).unwrap();
        assert_eq!(config.energy.cost_per_work, Fixed64::ZERO);
    }
}
