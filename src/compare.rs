use crate::round_dp;
use crate::types::ComparisonResult;

/// Divergence of `candidate` from `baseline`. A non-positive baseline has no
/// meaningful percentage, so the result is all zeros.
pub fn compare(baseline: f64, candidate: f64) -> ComparisonResult {
    if baseline <= 0.0 {
        return ComparisonResult::default();
    }

    let difference = candidate - baseline;
    ComparisonResult {
        difference: round_dp(difference, 2),
        percent_difference: round_dp(difference / baseline * 100.0, 1),
        algorithm_is_higher: candidate > baseline,
    }
}
