use crate::error::{BoundaryError, EstimateError};
use crate::types::{ActivityRequest, Parameters};

/// InputGuard: structural checks on what crosses the boundary, run before
/// any estimation.
pub struct InputGuard;

impl InputGuard {
    /// Per-activity check, identifier first. Hands back the parameters.
    pub fn validate_activity(activity: &ActivityRequest) -> Result<&Parameters, EstimateError> {
        if activity.activity_type().is_none() && activity.activity_id().is_none() {
            return Err(EstimateError::MissingIdentifier);
        }
        activity.parameters().ok_or(EstimateError::MissingParameters)
    }

    /// Whole-call check on the activity list.
    pub fn validate_batch<T>(activities: Option<&[T]>) -> Result<&[T], BoundaryError> {
        match activities {
            Some(list) if !list.is_empty() => Ok(list),
            _ => Err(BoundaryError::NoActivities),
        }
    }

    /// First non-blank credential wins: the caller's, then the configured one.
    pub fn validate_credential<'a>(
        supplied: Option<&'a str>,
        configured: Option<&'a str>,
    ) -> Result<&'a str, BoundaryError> {
        supplied
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .or_else(|| configured.map(str::trim).filter(|c| !c.is_empty()))
            .ok_or(BoundaryError::MissingCredential)
    }
}
