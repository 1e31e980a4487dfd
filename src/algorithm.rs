use chrono::Month;

use crate::round_dp;

/// Products above this are dampened.
pub const DAMPENING_THRESHOLD_KG: f64 = 100.0;

/// Regional correction, tuned independently of the direct factor tables.
pub fn regional_factor(region: &str) -> f64 {
    match region {
        "US" => 1.0,
        "CA" => 0.92,
        "CN" => 1.12,
        "EU" => 0.95,
        "UK" => 0.94,
        "AU" => 1.08,
        "IN" => 1.12,
        _ => 1.02, // GLOBAL
    }
}

/// Monthly multiplier, peaking in winter.
pub fn seasonal_factor(month: Month) -> f64 {
    match month {
        Month::January => 1.05,
        Month::February => 1.04,
        Month::March => 1.02,
        Month::April => 0.98,
        Month::May => 0.96,
        Month::June => 0.95,
        Month::July => 0.94,
        Month::August => 0.95,
        Month::September => 0.97,
        Month::October => 1.0,
        Month::November => 1.03,
        Month::December => 1.04,
    }
}

pub fn activity_adjustment(activity_type: &str) -> f64 {
    match activity_type.to_lowercase().as_str() {
        "electricity" => 0.98,
        "car" => 0.95,
        "bus" => 1.05,
        "rail" => 1.02,
        "natural_gas" => 0.97,
        _ => 1.0,
    }
}

/// Large magnitudes grow sub-linearly: `p*0.95 + 5*ln(p/100)` above 100 kg.
pub fn dampen(product: f64) -> f64 {
    if product > DAMPENING_THRESHOLD_KG {
        product * 0.95 + 5.0 * (product / DAMPENING_THRESHOLD_KG).ln()
    } else {
        product
    }
}

pub fn global_alignment(activity_type: &str) -> f64 {
    if activity_type.eq_ignore_ascii_case("electricity") {
        0.93
    } else {
        0.98
    }
}

/// Rescale a baseline (kg) with the algorithm, regional, seasonal and
/// activity factors, dampen large values, align, and round to 2 places.
/// Non-positive baselines give exactly 0.0.
pub fn estimate_algorithmic(
    baseline_kg: f64,
    region: &str,
    activity_type: &str,
    algorithm_factor: f64,
    month: Month,
) -> f64 {
    if baseline_kg <= 0.0 {
        return 0.0;
    }

    let product = baseline_kg
        * algorithm_factor
        * regional_factor(region)
        * seasonal_factor(month)
        * activity_adjustment(activity_type);

    round_dp(dampen(product) * global_alignment(activity_type), 2)
}
