use serde_json::Value;

use crate::error::EstimateError;
use crate::types::{NormalizedParameters, Parameters, QuantityType};

/// Kilometres per statute mile.
pub const KM_PER_MILE: f64 = 1.60934;

/// Reference conversion table into each quantity's canonical unit
/// (kWh, km, kg, L). Unit names are matched exactly.
pub fn conversion_factor(quantity: QuantityType, unit: &str) -> Option<f64> {
    let factor = match (quantity, unit) {
        (QuantityType::Energy, "kWh") => 1.0,
        (QuantityType::Energy, "MWh") => 1000.0,
        (QuantityType::Energy, "GWh") => 1_000_000.0,
        (QuantityType::Energy, "J") => 0.000278,
        (QuantityType::Energy, "MJ") => 0.278,
        (QuantityType::Distance, "km") => 1.0,
        (QuantityType::Distance, "mi" | "mile" | "miles") => KM_PER_MILE,
        (QuantityType::Weight, "kg") => 1.0,
        (QuantityType::Weight, "t") => 1000.0,
        (QuantityType::Weight, "lb") => 0.453592,
        (QuantityType::Weight, "g") => 0.001,
        (QuantityType::Volume, "L" | "l") => 1.0,
        (QuantityType::Volume, "gal") => 3.78541,
        (QuantityType::Volume, "m3") => 1000.0,
        _ => return None,
    };
    Some(factor)
}

/// Distance in km; only mile spellings are converted, anything else passes.
pub fn distance_to_km(value: f64, unit: &str) -> f64 {
    match unit.to_lowercase().as_str() {
        "mi" | "mile" | "miles" => value * KM_PER_MILE,
        _ => value,
    }
}

/// Energy in kWh; only MWh and GWh are scaled, anything else passes.
pub fn energy_to_kwh(value: f64, unit: &str) -> f64 {
    match unit.to_lowercase().as_str() {
        "mwh" => value * 1000.0,
        "gwh" => value * 1_000_000.0,
        _ => value,
    }
}

/// Numeric coercion of a parameter. Strings holding a number and booleans
/// are accepted; anything else present under `key` is an error.
pub fn number_param(params: &Parameters, key: &str) -> Result<Option<f64>, EstimateError> {
    let Some(raw) = params.get(key) else {
        return Ok(None);
    };
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    match parsed {
        Some(v) => Ok(Some(v)),
        None => Err(EstimateError::NotNumeric {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// A physical magnitude: numeric, finite and never negative.
pub fn quantity_param(params: &Parameters, key: &str) -> Result<Option<f64>, EstimateError> {
    match number_param(params, key)? {
        Some(v) if !v.is_finite() => Err(EstimateError::NonFiniteQuantity {
            key: key.to_string(),
        }),
        Some(v) if v < 0.0 => Err(EstimateError::NegativeQuantity {
            key: key.to_string(),
            value: v,
        }),
        other => Ok(other),
    }
}

/// Unit string under `key`, or `default` when absent.
pub fn unit_param<'a>(
    params: &'a Parameters,
    key: &str,
    default: &'a str,
) -> Result<&'a str, EstimateError> {
    match params.get(key) {
        None => Ok(default),
        Some(Value::String(unit)) => Ok(unit.as_str()),
        Some(_) => Err(EstimateError::InvalidUnit {
            key: key.to_string(),
        }),
    }
}

/// Normalize raw parameters into the descriptor's canonical unit.
///
/// Distance and energy are converted when the descriptor measures that
/// quantity and the matching key is present. Everything else (weight,
/// volume, unknown keys) is copied through unchanged.
pub fn convert(
    params: &Parameters,
    quantity: QuantityType,
    default_unit: &str,
) -> Result<NormalizedParameters, EstimateError> {
    let converted = match quantity {
        QuantityType::Distance => match quantity_param(params, "distance")? {
            Some(d) => {
                let unit = unit_param(params, "distance_unit", default_unit)?;
                Some(distance_to_km(d, unit))
            }
            None => None,
        },
        QuantityType::Energy => match quantity_param(params, "energy")? {
            Some(e) => {
                let unit = unit_param(params, "energy_unit", default_unit)?;
                Some(energy_to_kwh(e, unit))
            }
            None => None,
        },
        QuantityType::Weight | QuantityType::Volume => None,
    };

    Ok(match converted {
        Some(value) => NormalizedParameters::Canonical { quantity, value },
        None => NormalizedParameters::Passthrough(params.clone()),
    })
}
