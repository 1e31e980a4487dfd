use rayon::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::algorithm::estimate_algorithmic;
use crate::compare::compare;
use crate::config::EngineConfig;
use crate::direct::estimate_direct;
use crate::error::{BoundaryError, EstimateError};
use crate::guards::InputGuard;
use crate::registry;
use crate::round_dp;
use crate::source::{live_factor, EmissionFactorSource, OfflineSource};
use crate::types::{
    ActivityDescriptor, ActivityEstimate, ActivityRequest, ActivityResult, BatchInput,
    BatchReport, EmissionEstimate, NormalizedParameters, Parameters, REPORT_UNIT,
};
use crate::units;

/// Batch orchestrator: resolve, normalize, estimate both ways, compare.
///
/// Activities are independent; a failure in one is recorded in its result
/// and never aborts the batch.
pub struct CarbonEngine<S: EmissionFactorSource = OfflineSource> {
    config: EngineConfig,
    source: S,
}

impl CarbonEngine<OfflineSource> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_source(config, OfflineSource)
    }
}

impl<S: EmissionFactorSource> CarbonEngine<S> {
    pub fn with_source(config: EngineConfig, source: S) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- Invocation boundary ---------------------------------------------

    /// Entry point: checks the activity list and credential, then processes.
    pub fn calculate(
        &self,
        activities: Option<&[ActivityRequest]>,
        credential: Option<&str>,
    ) -> Result<BatchReport, BoundaryError> {
        let activities = InputGuard::validate_batch(activities)?;
        InputGuard::validate_credential(credential, self.config.credential.as_deref())?;
        Ok(log_totals(self.process(activities)))
    }

    /// Same as [`calculate`](Self::calculate) for activities still in raw
    /// JSON form; each one is decoded on its own.
    pub fn calculate_input(&self, input: &BatchInput) -> Result<BatchReport, BoundaryError> {
        let activities = InputGuard::validate_batch(input.activities.as_deref())?;
        InputGuard::validate_credential(
            input.api_key.as_deref(),
            self.config.credential.as_deref(),
        )?;
        Ok(log_totals(self.process_values(activities)))
    }

    /// JSON in, JSON out. Boundary failures become `{"error": "..."}`.
    pub fn run_json(&self, input: &str) -> Value {
        let outcome = serde_json::from_str::<BatchInput>(input)
            .map_err(BoundaryError::from)
            .and_then(|input| self.calculate_input(&input))
            .and_then(|report| serde_json::to_value(report).map_err(BoundaryError::Encode));

        match outcome {
            Ok(value) => value,
            Err(e) => {
                error!("Carbon footprint calculation failed: {}", e);
                json!({ "error": e.to_string() })
            }
        }
    }

    // ---- Batch processing ------------------------------------------------

    /// Process every activity in input order and aggregate the totals.
    pub fn process(&self, activities: &[ActivityRequest]) -> BatchReport {
        self.process_each(activities, |index, activity| {
            self.process_activity(index, activity)
        })
    }

    /// Like [`process`](Self::process), decoding each raw activity first.
    pub fn process_values(&self, activities: &[Value]) -> BatchReport {
        self.process_each(activities, |index, raw| self.process_raw(index, raw))
    }

    fn process_each<T, F>(&self, activities: &[T], run: F) -> BatchReport
    where
        T: Sync,
        F: Fn(usize, &T) -> ActivityResult + Send + Sync,
    {
        if activities.is_empty() {
            return BatchReport::empty();
        }

        let results: Vec<ActivityResult> = if self.config.parallel {
            activities
                .par_iter()
                .enumerate()
                .map(|(index, activity)| run(index, activity))
                .collect()
        } else {
            activities
                .iter()
                .enumerate()
                .map(|(index, activity)| run(index, activity))
                .collect()
        };

        summarize(results)
    }

    /// Decode one raw activity. A shape error is recorded under the
    /// activity's name when it has a usable one.
    pub fn process_raw(&self, index: usize, raw: &Value) -> ActivityResult {
        match ActivityRequest::deserialize(raw) {
            Ok(activity) => self.process_activity(index, &activity),
            Err(e) => {
                let name = raw
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Activity {}", index + 1));
                let e = EstimateError::MalformedActivity(e.to_string());
                warn!("Rejected {}: {}", name, e);
                ActivityResult::failed(name, e)
            }
        }
    }

    /// One activity; `index` is its position in the batch.
    pub fn process_activity(&self, index: usize, activity: &ActivityRequest) -> ActivityResult {
        let name = activity.display_name(index);
        info!("Processing: {}", name);

        match self.estimate_activity(&name, activity) {
            Ok(estimate) => ActivityResult::Estimated(estimate),
            Err(e) => {
                if e.is_validation() {
                    warn!("Rejected {}: {}", name, e);
                } else {
                    error!("Error processing activity {}: {}", index + 1, e);
                }
                ActivityResult::failed(name, e)
            }
        }
    }

    fn estimate_activity(
        &self,
        name: &str,
        activity: &ActivityRequest,
    ) -> Result<ActivityEstimate, EstimateError> {
        let params = InputGuard::validate_activity(activity)?;

        let activity_type = match activity.activity_type() {
            Some(t) => t.to_string(),
            None => registry::infer_activity_type(activity.activity_id().unwrap_or_default()),
        };
        let region = activity
            .region()
            .unwrap_or(&self.config.default_region)
            .to_string();

        let descriptor = registry::resolve(Some(activity_type.as_str()));
        let activity_id = activity
            .activity_id()
            .map(str::to_string)
            .unwrap_or_else(|| descriptor.canonical_id.clone());

        let normalized =
            units::convert(params, descriptor.quantity_type, &descriptor.default_unit)?;
        debug!("Normalized parameters for {}: {:?}", name, normalized.to_map());

        let baseline = self.baseline(&activity_type, &descriptor, &normalized, params, &region)?;
        if !baseline.value.is_finite() {
            return Err(EstimateError::NonFiniteEstimate);
        }
        info!("Direct calculation result: {} kg CO2e", baseline.value);

        let algorithm_emissions = estimate_algorithmic(
            baseline.value,
            &region,
            &activity_type,
            descriptor.algorithm_factor,
            self.config.month,
        );
        if !algorithm_emissions.is_finite() {
            return Err(EstimateError::NonFiniteEstimate);
        }

        Ok(ActivityEstimate {
            name: name.to_string(),
            activity_id,
            region,
            api_emissions: baseline.value,
            algorithm_emissions,
            unit: baseline.unit.to_string(),
            comparison: compare(baseline.value, algorithm_emissions),
            note: Some(baseline.note()),
        })
    }

    // A live factor applies to the normalized quantity; otherwise the static
    // tables price the raw parameters.
    fn baseline(
        &self,
        activity_type: &str,
        descriptor: &ActivityDescriptor,
        normalized: &NormalizedParameters,
        params: &Parameters,
        region: &str,
    ) -> Result<EmissionEstimate, EstimateError> {
        if let Some(quantity) = normalized.canonical_value() {
            if let Some((id, factor)) = live_factor(&self.source, descriptor, region) {
                return Ok(EmissionEstimate::from_live_source(quantity * factor, id));
            }
        }
        let kg = estimate_direct(activity_type, params, region)?;
        Ok(EmissionEstimate::from_default_tables(kg))
    }
}

fn log_totals(report: BatchReport) -> BatchReport {
    info!("API emissions: {} {}", report.api_emissions, report.unit);
    info!("Algorithm emissions: {} {}", report.algorithm_emissions, report.unit);
    info!("Difference: {}%", report.comparison.percent_difference);
    report
}

/// Totals are summed in input order so sequential and parallel runs agree.
fn summarize(activities: Vec<ActivityResult>) -> BatchReport {
    let mut api_total = 0.0;
    let mut algorithm_total = 0.0;
    let mut errors = 0;

    for result in &activities {
        match result {
            ActivityResult::Estimated(e) => {
                api_total += e.api_emissions;
                algorithm_total += e.algorithm_emissions;
            }
            ActivityResult::Failed(_) => errors += 1,
        }
    }

    BatchReport {
        api_emissions: round_dp(api_total, 2),
        algorithm_emissions: round_dp(algorithm_total, 2),
        unit: REPORT_UNIT.to_string(),
        comparison: compare(api_total, algorithm_total),
        errors,
        activities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::seasonal_factor;
    use crate::error::SourceError;
    use crate::source::{FactorEntry, StaticFactorSource};
    use crate::types::QuantityType;
    use chrono::Month;

    fn engine() -> CarbonEngine {
        CarbonEngine::new(EngineConfig::default().with_month(Month::March))
    }

    fn requests(v: Value) -> Vec<ActivityRequest> {
        serde_json::from_value(v).unwrap()
    }

    fn demo_batch() -> Vec<ActivityRequest> {
        requests(json!([
            {"name": "Electricity Usage", "activity_type": "electricity", "region": "US",
             "parameters": {"energy": 100, "energy_unit": "kWh"}},
            {"name": "Car Travel", "activity_type": "car", "region": "US",
             "parameters": {"distance": 50, "distance_unit": "km"}},
            {"name": "Bus Travel", "activity_type": "bus", "region": "US",
             "parameters": {"distance": 30, "distance_unit": "km"}},
            {"name": "Natural Gas Heating", "activity_type": "natural_gas", "region": "US",
             "parameters": {"energy": 200, "energy_unit": "kWh"}},
            {"name": "Train Travel", "activity_type": "rail", "region": "US",
             "parameters": {"distance": 100, "distance_unit": "km"}}
        ]))
    }

    #[test]
    fn electricity_scenario() {
        let report = engine().process(&requests(json!([
            {"activity_type": "electricity", "region": "US",
             "parameters": {"energy": 100, "energy_unit": "kWh"}}
        ])));
        let e = report.activities[0].as_estimate().unwrap();
        assert_eq!(e.name, "Activity 1");
        assert_eq!(e.activity_id, "electricity");
        assert_eq!(e.unit, "kg");
        assert!((e.api_emissions - 38.0).abs() < 1e-9);
        let expected = round_dp(38.0 * 1.05 * 1.0 * seasonal_factor(Month::March) * 0.98 * 0.93, 2);
        assert_eq!(e.algorithm_emissions, expected);
        assert_eq!(e.note.as_deref(), Some("Calculated using default emission factors"));
        assert_eq!(report.errors, 0);
    }

    #[test]
    fn empty_batch_is_all_zero() {
        let report = engine().process(&[]);
        assert_eq!(report, BatchReport::empty());
        assert_eq!(report.unit, "kg CO2e");
    }

    #[test]
    fn one_bad_activity_does_not_abort_the_batch() {
        let mut batch = demo_batch();
        batch.insert(2, requests(json!([{"name": "Broken", "activity_type": "bus"}])).remove(0));

        let report = engine().process(&batch);
        assert_eq!(report.activities.len(), 6);
        assert_eq!(report.errors, 1);
        assert_eq!(
            report.activities[2],
            ActivityResult::failed("Broken", "Parameters required")
        );

        let clean = engine().process(&demo_batch());
        assert_eq!(report.api_emissions, clean.api_emissions);
        assert_eq!(report.algorithm_emissions, clean.algorithm_emissions);
    }

    #[test]
    fn computation_errors_are_recorded_inline() {
        let report = engine().process(&requests(json!([
            {"name": "Bad", "activity_type": "electricity", "parameters": {"energy": "lots"}},
            {"name": "No id", "parameters": {"energy": 1}},
            {"name": "Good", "activity_type": "car", "parameters": {"distance": 10}}
        ])));
        assert_eq!(report.errors, 2);
        match &report.activities[0] {
            ActivityResult::Failed(f) => assert!(f.error.contains("energy")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(
            report.activities[1],
            ActivityResult::failed("No id", "Activity type or ID required")
        );
        assert!((report.api_emissions - round_dp(10.0 * 0.185, 2)).abs() < 1e-9);
    }

    #[test]
    fn totals_and_comparison_cover_successes() {
        let report = engine().process(&demo_batch());
        let api: f64 = report
            .activities
            .iter()
            .filter_map(ActivityResult::as_estimate)
            .map(|e| e.api_emissions)
            .sum();
        assert_eq!(report.api_emissions, round_dp(api, 2));
        // 38 + 9.25 + 3.15 + 40 + 4
        assert_eq!(report.api_emissions, 94.4);

        let algorithm: f64 = report
            .activities
            .iter()
            .filter_map(ActivityResult::as_estimate)
            .map(|e| e.algorithm_emissions)
            .sum();
        assert_eq!(report.comparison, compare(api, algorithm));
    }

    #[test]
    fn processing_is_idempotent_and_parallel_agrees() {
        let batch = demo_batch();
        let sequential = engine();
        assert_eq!(sequential.process(&batch), sequential.process(&batch));

        let parallel =
            CarbonEngine::new(EngineConfig::default().with_month(Month::March).with_parallel(true));
        assert_eq!(parallel.process(&batch), sequential.process(&batch));
    }

    #[test]
    fn miles_and_unknown_types() {
        let report = engine().process(&requests(json!([
            {"activity_type": "car", "parameters": {"distance": 50, "distance_unit": "mi"}},
            {"activity_type": "compost", "parameters": {"weight": 5}}
        ])));
        let car = report.activities[0].as_estimate().unwrap();
        assert!((car.api_emissions - 80.467 * 0.185).abs() < 1e-6);
        assert_eq!(car.region, "US");

        let compost = report.activities[1].as_estimate().unwrap();
        assert_eq!(compost.api_emissions, 10.0);
        assert_eq!(compost.activity_id, "compost");
    }

    #[test]
    fn id_only_requests_infer_their_type() {
        let report = engine().process(&requests(json!([
            {"activity_id": "passenger_train", "region": "EU", "parameters": {"distance": 100}}
        ])));
        let rail = report.activities[0].as_estimate().unwrap();
        assert_eq!(rail.activity_id, "passenger_train");
        assert!((rail.api_emissions - 3.0).abs() < 1e-9);
    }

    #[test]
    fn default_region_comes_from_config() {
        let engine = CarbonEngine::new(
            EngineConfig::default()
                .with_month(Month::March)
                .with_default_region("CN"),
        );
        let report = engine.process(&requests(json!([
            {"activity_type": "electricity", "parameters": {"energy": 10}}
        ])));
        let e = report.activities[0].as_estimate().unwrap();
        assert_eq!(e.region, "CN");
        assert!((e.api_emissions - 6.0).abs() < 1e-9);
    }

    #[test]
    fn live_factor_replaces_static_tables() {
        let source = StaticFactorSource::new(vec![FactorEntry {
            activity_id: "car-generic".into(),
            region: None,
            factor: 0.2,
            unit: None,
        }]);
        let engine =
            CarbonEngine::with_source(EngineConfig::default().with_month(Month::March), source);
        let report = engine.process(&requests(json!([
            {"activity_type": "car", "parameters": {"distance": 10, "distance_unit": "miles"}},
            {"activity_type": "electricity", "parameters": {"energy": 100}}
        ])));

        let car = report.activities[0].as_estimate().unwrap();
        assert!((car.api_emissions - 16.0934 * 0.2).abs() < 1e-9);
        assert_eq!(
            car.note.as_deref(),
            Some("Calculated using live emission factor (car-generic)")
        );

        let power = report.activities[1].as_estimate().unwrap();
        assert!((power.api_emissions - 38.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_quantities_fail_alone() {
        let report = engine().process(&requests(json!([
            {"name": "Good", "activity_type": "car", "parameters": {"distance": 10}},
            {"name": "NaN trip", "activity_type": "car", "parameters": {"distance": "NaN"}},
            {"activity_type": "electricity", "parameters": {"energy": "inf"}},
            {"activity_type": "electricity", "parameters": {"energy": 1e305, "energy_unit": "GWh"}}
        ])));
        assert_eq!(report.errors, 3);
        assert_eq!(
            report.activities[1],
            ActivityResult::failed("NaN trip", "parameter 'distance' must be a finite number")
        );
        assert_eq!(
            report.activities[3],
            ActivityResult::failed("Activity 4", "emission estimate is not a finite number")
        );
        assert!((report.api_emissions - 1.85).abs() < 1e-9);
        assert!(report.algorithm_emissions.is_finite());

        let encoded = serde_json::to_value(&report).unwrap();
        let decoded: BatchReport = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.errors, 3);
    }

    #[test]
    fn mis_shaped_activity_is_recorded_inline() {
        let input: BatchInput = serde_json::from_value(json!({
            "api_key": "k",
            "activities": [
                {"name": "Good", "activity_type": "car", "parameters": {"distance": 10}},
                {"name": "bad", "activity_type": 7, "parameters": {"distance": 10}},
                {"activity_type": "bus", "region": 5, "parameters": {"distance": 1}},
                "not an object"
            ]
        }))
        .unwrap();
        let report = engine().calculate_input(&input).unwrap();

        assert_eq!(report.errors, 3);
        assert_eq!(report.activities[0].as_estimate().unwrap().name, "Good");
        let names: Vec<&str> = report.activities.iter().map(|a| a.name()).collect();
        assert_eq!(names, ["Good", "bad", "Activity 3", "Activity 4"]);
        match &report.activities[1] {
            ActivityResult::Failed(f) => assert!(f.error.starts_with("Invalid activity")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!((report.api_emissions - 1.85).abs() < 1e-9);
    }

    #[test]
    fn raw_and_typed_batches_agree() {
        let raw: Vec<Value> = demo_batch()
            .iter()
            .map(|a| serde_json::to_value(a).unwrap())
            .collect();
        let parallel =
            CarbonEngine::new(EngineConfig::default().with_month(Month::March).with_parallel(true));
        assert_eq!(parallel.process_values(&raw), engine().process(&demo_batch()));
    }

    struct DownSource;

    impl EmissionFactorSource for DownSource {
        fn emission_factor(
            &self,
            _activity_id: &str,
            _quantity: QuantityType,
            _region: &str,
        ) -> Result<Option<f64>, SourceError> {
            Err(SourceError::Unavailable("connection refused".into()))
        }
    }

    #[test]
    fn failing_source_falls_back_to_tables() {
        let engine =
            CarbonEngine::with_source(EngineConfig::default().with_month(Month::March), DownSource);
        let report = engine.process(&demo_batch());
        assert_eq!(report, self::engine().process(&demo_batch()));
    }

    #[test]
    fn boundary_errors_short_circuit() {
        let engine = engine();
        let batch = demo_batch();
        assert!(matches!(
            engine.calculate(None, Some("key")),
            Err(BoundaryError::NoActivities)
        ));
        assert!(matches!(
            engine.calculate(Some(batch.as_slice()), None),
            Err(BoundaryError::MissingCredential)
        ));

        let malformed = engine.run_json("{not json");
        assert!(malformed["error"]
            .as_str()
            .unwrap()
            .starts_with("Error processing input"));
        assert_eq!(
            engine.run_json(r#"{"activities": [], "api_key": "k"}"#),
            json!({"error": "No activities provided"})
        );
        assert_eq!(
            engine.run_json(r#"{"activities": [{"activity_type": "car"}]}"#),
            json!({"error": "API key required"})
        );
    }

    #[test]
    fn configured_credential_is_accepted() {
        let engine = CarbonEngine::new(
            EngineConfig::default()
                .with_month(Month::March)
                .with_credential("from-env"),
        );
        let batch = demo_batch();
        let report = engine.calculate(Some(batch.as_slice()), None).unwrap();
        assert_eq!(report.activities.len(), 5);
    }
}
