use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw activity parameters: `distance`, `distance_unit`, `energy`, ...
pub type Parameters = BTreeMap<String, Value>;

/// Unit carried by every per-activity estimate.
pub const ESTIMATE_UNIT: &str = "kg";
/// Unit carried by batch totals.
pub const REPORT_UNIT: &str = "kg CO2e";

// ---- Activity input ------------------------------------------------------

/// One reportable activity as received at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
}

impl ActivityRequest {
    pub fn activity_type(&self) -> Option<&str> {
        non_empty(&self.activity_type)
    }

    pub fn activity_id(&self) -> Option<&str> {
        non_empty(&self.activity_id)
    }

    pub fn region(&self) -> Option<&str> {
        non_empty(&self.region)
    }

    /// Parameters, if present and non-empty.
    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref().filter(|p| !p.is_empty())
    }

    /// Name used in reports; positions are 1-based.
    pub fn display_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("Activity {}", index + 1),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Physical quantity an activity is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityType {
    Energy,
    Distance,
    Weight,
    Volume,
}

impl QuantityType {
    /// Parameter key holding the magnitude.
    pub fn key(self) -> &'static str {
        match self {
            QuantityType::Energy => "energy",
            QuantityType::Distance => "distance",
            QuantityType::Weight => "weight",
            QuantityType::Volume => "volume",
        }
    }

    /// Parameter key holding the unit string.
    pub fn unit_key(self) -> &'static str {
        match self {
            QuantityType::Energy => "energy_unit",
            QuantityType::Distance => "distance_unit",
            QuantityType::Weight => "weight_unit",
            QuantityType::Volume => "volume_unit",
        }
    }

    pub fn canonical_unit(self) -> &'static str {
        match self {
            QuantityType::Energy => "kWh",
            QuantityType::Distance => "km",
            QuantityType::Weight => "kg",
            QuantityType::Volume => "L",
        }
    }
}

/// Canonical description of an activity kind, looked up from the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityDescriptor {
    pub canonical_id: String,
    pub quantity_type: QuantityType,
    pub default_unit: String,
    pub fallback_ids: Vec<String>,
    pub algorithm_factor: f64,
}

impl ActivityDescriptor {
    /// Descriptor for anything the registry does not know.
    pub fn synthetic(canonical_id: impl Into<String>) -> Self {
        ActivityDescriptor {
            canonical_id: canonical_id.into(),
            quantity_type: QuantityType::Energy,
            default_unit: QuantityType::Energy.canonical_unit().to_string(),
            fallback_ids: Vec::new(),
            algorithm_factor: 1.0,
        }
    }

    /// Candidate ids for a factor lookup: canonical first, then fallbacks.
    pub fn lookup_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_id.as_str())
            .chain(self.fallback_ids.iter().map(String::as_str))
    }
}

/// Parameters after unit normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedParameters {
    /// A single quantity expressed in its canonical unit.
    Canonical { quantity: QuantityType, value: f64 },
    /// Unmodeled quantities are copied through untouched.
    Passthrough(Parameters),
}

impl NormalizedParameters {
    pub fn canonical_value(&self) -> Option<f64> {
        match self {
            NormalizedParameters::Canonical { value, .. } => Some(*value),
            NormalizedParameters::Passthrough(_) => None,
        }
    }

    /// Map form, e.g. `{"distance": 80.467, "distance_unit": "km"}`.
    pub fn to_map(&self) -> Parameters {
        match self {
            NormalizedParameters::Canonical { quantity, value } => {
                let mut map = Parameters::new();
                map.insert(quantity.key().to_string(), Value::from(*value));
                map.insert(
                    quantity.unit_key().to_string(),
                    Value::from(quantity.canonical_unit()),
                );
                map
            }
            NormalizedParameters::Passthrough(params) => params.clone(),
        }
    }
}

impl Serialize for NormalizedParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.to_map())
    }
}

// ---- Estimates -----------------------------------------------------------

/// Where a baseline estimate's factor came from.
#[derive(Debug, Clone, PartialEq)]
pub enum FactorOrigin {
    DefaultTables,
    LiveSource { activity_id: String },
}

/// Baseline emissions for one activity.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionEstimate {
    pub value: f64,
    pub unit: &'static str,
    pub origin: FactorOrigin,
}

impl EmissionEstimate {
    pub fn from_default_tables(value: f64) -> Self {
        EmissionEstimate {
            value,
            unit: ESTIMATE_UNIT,
            origin: FactorOrigin::DefaultTables,
        }
    }

    pub fn from_live_source(value: f64, activity_id: impl Into<String>) -> Self {
        EmissionEstimate {
            value,
            unit: ESTIMATE_UNIT,
            origin: FactorOrigin::LiveSource {
                activity_id: activity_id.into(),
            },
        }
    }

    pub fn note(&self) -> String {
        match &self.origin {
            FactorOrigin::DefaultTables => "Calculated using default emission factors".to_string(),
            FactorOrigin::LiveSource { activity_id } => {
                format!("Calculated using live emission factor ({activity_id})")
            }
        }
    }
}

/// Divergence of a candidate estimate from a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub difference: f64,
    pub percent_difference: f64,
    pub algorithm_is_higher: bool,
}

// ---- Results -------------------------------------------------------------

/// A rejected or failed activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFailure {
    pub error: String,
    pub name: String,
}

/// A successfully estimated activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEstimate {
    pub name: String,
    pub activity_id: String,
    pub region: String,
    pub api_emissions: f64,
    pub algorithm_emissions: f64,
    pub unit: String,
    pub comparison: ComparisonResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivityResult {
    Failed(ActivityFailure),
    Estimated(ActivityEstimate),
}

impl ActivityResult {
    pub fn failed(name: impl Into<String>, error: impl ToString) -> Self {
        ActivityResult::Failed(ActivityFailure {
            error: error.to_string(),
            name: name.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActivityResult::Failed(_))
    }

    pub fn name(&self) -> &str {
        match self {
            ActivityResult::Failed(f) => &f.name,
            ActivityResult::Estimated(e) => &e.name,
        }
    }

    pub fn as_estimate(&self) -> Option<&ActivityEstimate> {
        match self {
            ActivityResult::Estimated(e) => Some(e),
            ActivityResult::Failed(_) => None,
        }
    }
}

/// Aggregated output of one batch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub api_emissions: f64,
    pub algorithm_emissions: f64,
    pub unit: String,
    pub comparison: ComparisonResult,
    pub errors: usize,
    pub activities: Vec<ActivityResult>,
}

impl BatchReport {
    pub fn empty() -> Self {
        BatchReport {
            api_emissions: 0.0,
            algorithm_emissions: 0.0,
            unit: REPORT_UNIT.to_string(),
            comparison: ComparisonResult::default(),
            errors: 0,
            activities: Vec::new(),
        }
    }
}

/// Top-level payload accepted at the invocation boundary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BatchInput {
    /// Kept as raw JSON so one mis-shaped activity fails alone.
    pub activities: Option<Vec<Value>>,
    pub api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults_and_blank_fields() {
        let req: ActivityRequest = serde_json::from_value(json!({
            "activity_type": "",
            "activity_id": "passenger_train",
            "parameters": {}
        }))
        .unwrap();
        assert_eq!(req.activity_type(), None);
        assert_eq!(req.activity_id(), Some("passenger_train"));
        assert!(req.parameters().is_none());
        assert_eq!(req.display_name(2), "Activity 3");
    }

    #[test]
    fn result_records_serialize_flat() {
        let failed = ActivityResult::failed("Bus", "Parameters required");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"error": "Parameters required", "name": "Bus"})
        );

        let ok = ActivityResult::Estimated(ActivityEstimate {
            name: "Car".into(),
            activity_id: "passenger_vehicle-car".into(),
            region: "US".into(),
            api_emissions: 9.25,
            algorithm_emissions: 10.0,
            unit: ESTIMATE_UNIT.into(),
            comparison: ComparisonResult::default(),
            note: None,
        });
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["activity_id"], "passenger_vehicle-car");
        assert!(v.get("note").is_none());
        assert!(v.get("error").is_none());
    }

    #[test]
    fn normalized_parameters_map_form() {
        let n = NormalizedParameters::Canonical {
            quantity: QuantityType::Distance,
            value: 80.467,
        };
        assert_eq!(
            serde_json::to_value(&n).unwrap(),
            json!({"distance": 80.467, "distance_unit": "km"})
        );
    }
}
