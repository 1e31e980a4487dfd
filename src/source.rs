use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, SourceError};
use crate::types::{ActivityDescriptor, QuantityType};
use crate::units::conversion_factor;

/// Optional collaborator that can quote a live emission factor.
///
/// Factors are kg CO2e per canonical unit of `quantity` (per km, per kWh).
/// The engine works without one; the static tables in `direct` are
/// authoritative whenever a source has nothing to offer.
pub trait EmissionFactorSource: Send + Sync {
    fn emission_factor(
        &self,
        activity_id: &str,
        quantity: QuantityType,
        region: &str,
    ) -> Result<Option<f64>, SourceError>;
}

/// No data source at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSource;

impl EmissionFactorSource for OfflineSource {
    fn emission_factor(
        &self,
        _activity_id: &str,
        _quantity: QuantityType,
        _region: &str,
    ) -> Result<Option<f64>, SourceError> {
        Ok(None)
    }
}

/// One quoted factor. `unit` is what the factor is quoted per; when absent
/// the factor is already per canonical unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorEntry {
    pub activity_id: String,
    #[serde(default)]
    pub region: Option<String>,
    pub factor: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

/// In-memory factor table, typically loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct StaticFactorSource {
    entries: Vec<FactorEntry>,
}

impl StaticFactorSource {
    pub fn new(entries: Vec<FactorEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::FactorFile {
            path: shown.clone(),
            source,
        })?;
        let table = Self::from_json_str(&raw)
            .map_err(|source| ConfigError::FactorParse { path: shown, source })?;
        debug!("Loaded {} emission factors from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Region-specific entry first, then any entry for the id.
    fn find(&self, activity_id: &str, region: &str) -> Option<&FactorEntry> {
        self.entries
            .iter()
            .find(|e| e.activity_id == activity_id && e.region.as_deref() == Some(region))
            .or_else(|| self.entries.iter().find(|e| e.activity_id == activity_id))
    }
}

impl EmissionFactorSource for StaticFactorSource {
    fn emission_factor(
        &self,
        activity_id: &str,
        quantity: QuantityType,
        region: &str,
    ) -> Result<Option<f64>, SourceError> {
        let Some(entry) = self.find(activity_id, region) else {
            return Ok(None);
        };
        if !entry.factor.is_finite() || entry.factor < 0.0 {
            return Err(SourceError::InvalidFactor {
                activity_id: activity_id.to_string(),
                factor: entry.factor,
            });
        }
        match entry.unit.as_deref() {
            None => Ok(Some(entry.factor)),
            Some(unit) => match conversion_factor(quantity, unit) {
                Some(scale) => Ok(Some(entry.factor / scale)),
                None => Err(SourceError::UnknownUnit {
                    activity_id: activity_id.to_string(),
                    unit: unit.to_string(),
                }),
            },
        }
    }
}

/// Ask the source for the descriptor's canonical id, then each fallback id
/// in order. Source failures are logged and skipped.
pub fn live_factor<S>(
    source: &S,
    descriptor: &ActivityDescriptor,
    region: &str,
) -> Option<(String, f64)>
where
    S: EmissionFactorSource + ?Sized,
{
    for id in descriptor.lookup_ids() {
        match source.emission_factor(id, descriptor.quantity_type, region) {
            Ok(Some(factor)) => return Some((id.to_string(), factor)),
            Ok(None) => {}
            Err(e) => warn!("Emission factor lookup for {} failed: {}", id, e),
        }
    }
    None
}
