use tracing::debug;

use crate::types::{ActivityDescriptor, QuantityType};

/// Static registry row. Declaration order is the tie-break for partial
/// matches and must stay fixed.
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub key: &'static str,
    pub canonical_id: &'static str,
    pub quantity_type: QuantityType,
    pub default_unit: &'static str,
    pub fallback_ids: &'static [&'static str],
    pub algorithm_factor: f64,
}

impl RegistryEntry {
    pub fn descriptor(&self) -> ActivityDescriptor {
        ActivityDescriptor {
            canonical_id: self.canonical_id.to_string(),
            quantity_type: self.quantity_type,
            default_unit: self.default_unit.to_string(),
            fallback_ids: self.fallback_ids.iter().map(|id| id.to_string()).collect(),
            algorithm_factor: self.algorithm_factor,
        }
    }
}

pub const ACTIVITY_REGISTRY: [RegistryEntry; 5] = [
    RegistryEntry {
        key: "electricity",
        canonical_id: "electricity",
        quantity_type: QuantityType::Energy,
        default_unit: "kWh",
        fallback_ids: &["electricity-energy"],
        algorithm_factor: 1.05,
    },
    RegistryEntry {
        key: "car",
        canonical_id: "passenger_vehicle-car",
        quantity_type: QuantityType::Distance,
        default_unit: "km",
        fallback_ids: &["car-generic"],
        algorithm_factor: 1.2,
    },
    RegistryEntry {
        key: "bus",
        canonical_id: "passenger_vehicle-bus",
        quantity_type: QuantityType::Distance,
        default_unit: "km",
        fallback_ids: &["bus-generic"],
        algorithm_factor: 0.9,
    },
    RegistryEntry {
        key: "natural_gas",
        canonical_id: "natural_gas",
        quantity_type: QuantityType::Energy,
        default_unit: "kWh",
        fallback_ids: &["heating-gas"],
        algorithm_factor: 1.15,
    },
    RegistryEntry {
        key: "rail",
        canonical_id: "passenger_train",
        quantity_type: QuantityType::Distance,
        default_unit: "km",
        fallback_ids: &["train-generic"],
        algorithm_factor: 0.85,
    },
];

/// Descriptor used when no activity type is given at all.
pub fn default_descriptor() -> ActivityDescriptor {
    ActivityDescriptor {
        canonical_id: "electricity".to_string(),
        quantity_type: QuantityType::Energy,
        default_unit: "kWh".to_string(),
        fallback_ids: Vec::new(),
        algorithm_factor: 1.0,
    }
}

/// Registry entry for a free-text type: exact key first, then the first
/// key (in declared order) contained in the input or containing it.
pub fn lookup(activity_type: &str) -> Option<&'static RegistryEntry> {
    let normalized = activity_type.trim().to_lowercase();

    if let Some(entry) = ACTIVITY_REGISTRY.iter().find(|e| e.key == normalized) {
        return Some(entry);
    }

    let entry = ACTIVITY_REGISTRY
        .iter()
        .find(|e| normalized.contains(e.key) || e.key.contains(normalized.as_str()))?;
    debug!("Partial match: {} -> {}", normalized, entry.key);
    Some(entry)
}

/// Reverse lookup by canonical id, e.g. `passenger_train` -> rail.
pub fn entry_for_id(activity_id: &str) -> Option<&'static RegistryEntry> {
    let id = activity_id.trim();
    ACTIVITY_REGISTRY.iter().find(|e| e.canonical_id == id)
}

/// Resolve an activity type to its descriptor. Never fails: unknown types
/// get a synthetic energy descriptor named after the input.
pub fn resolve(activity_type: Option<&str>) -> ActivityDescriptor {
    let Some(raw) = activity_type.filter(|t| !t.is_empty()) else {
        return default_descriptor();
    };

    match lookup(raw) {
        Some(entry) => entry.descriptor(),
        None => ActivityDescriptor::synthetic(raw.trim().to_lowercase()),
    }
}

/// Best activity type for a request that only carries an id.
pub fn infer_activity_type(activity_id: &str) -> String {
    entry_for_id(activity_id)
        .or_else(|| lookup(activity_id))
        .map(|e| e.key.to_string())
        .unwrap_or_else(|| activity_id.trim().to_lowercase())
}
