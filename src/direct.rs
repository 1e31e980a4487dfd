use crate::error::EstimateError;
use crate::types::Parameters;
use crate::units::{distance_to_km, energy_to_kwh, quantity_param, unit_param};

/// Returned for activities the factor tables cannot price.
pub const UNKNOWN_ACTIVITY_FLOOR_KG: f64 = 10.0;
/// Factor for activity types with no table at all.
pub const UNKNOWN_TYPE_FACTOR: f64 = 0.1;

/// How the direct estimator measures an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityClass {
    /// kg CO2e per km.
    Transport,
    /// kg CO2e per kWh.
    Energy,
}

pub fn activity_class(activity_type: &str) -> Option<ActivityClass> {
    match activity_type {
        "bus" | "car" | "rail" => Some(ActivityClass::Transport),
        "electricity" | "natural_gas" => Some(ActivityClass::Energy),
        _ => None,
    }
}

// Per-region flat factors; every row carries a GLOBAL entry.
fn factor_row(activity_type: &str) -> Option<&'static [(&'static str, f64)]> {
    let row: &'static [(&'static str, f64)] = match activity_type {
        "bus" => &[
            ("US", 0.105),
            ("EU", 0.08),
            ("UK", 0.075),
            ("CA", 0.09),
            ("CN", 0.12),
            ("GLOBAL", 0.1),
        ],
        "car" => &[
            ("US", 0.185),
            ("EU", 0.15),
            ("UK", 0.15),
            ("CA", 0.17),
            ("CN", 0.21),
            ("GLOBAL", 0.18),
        ],
        "rail" => &[
            ("US", 0.04),
            ("EU", 0.03),
            ("UK", 0.035),
            ("CA", 0.04),
            ("CN", 0.06),
            ("GLOBAL", 0.045),
        ],
        "electricity" => &[
            ("US", 0.38),
            ("EU", 0.25),
            ("UK", 0.23),
            ("CA", 0.15),
            ("CN", 0.6),
            ("GLOBAL", 0.42),
        ],
        "natural_gas" => &[
            ("US", 0.2),
            ("EU", 0.19),
            ("UK", 0.19),
            ("CA", 0.18),
            ("CN", 0.22),
            ("GLOBAL", 0.2),
        ],
        _ => return None,
    };
    Some(row)
}

/// Flat emission factor for a type and region. Unknown regions use the
/// type's GLOBAL factor; unknown types use 0.1.
pub fn emission_factor(activity_type: &str, region: &str) -> f64 {
    let Some(row) = factor_row(&activity_type.to_lowercase()) else {
        return UNKNOWN_TYPE_FACTOR;
    };
    let lookup = |code: &str| row.iter().find(|(r, _)| *r == code).map(|(_, f)| *f);
    lookup(region)
        .or_else(|| lookup("GLOBAL"))
        .unwrap_or(UNKNOWN_TYPE_FACTOR)
}

/// Direct emissions (kg) from the static regional tables.
///
/// Transport types read `distance` (km unless `distance_unit` says miles),
/// energy types read `energy` (kWh unless MWh/GWh). An unknown type or a
/// missing quantity key yields the 10 kg floor.
pub fn estimate_direct(
    activity_type: &str,
    params: &Parameters,
    region: &str,
) -> Result<f64, EstimateError> {
    let kind = activity_type.to_lowercase();
    let factor = emission_factor(&kind, region);

    match activity_class(&kind) {
        Some(ActivityClass::Transport) => {
            if let Some(distance) = quantity_param(params, "distance")? {
                let unit = unit_param(params, "distance_unit", "km")?;
                return Ok(distance_to_km(distance, unit) * factor);
            }
        }
        Some(ActivityClass::Energy) => {
            if let Some(energy) = quantity_param(params, "energy")? {
                let unit = unit_param(params, "energy_unit", "kWh")?;
                return Ok(energy_to_kwh(energy, unit) * factor);
            }
        }
        None => {}
    }

    Ok(UNKNOWN_ACTIVITY_FLOOR_KG)
}
