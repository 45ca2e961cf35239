use crate::services::metrics::{record_outcome, Outcome};
use crate::startup::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use service_core::utils::verify_access_key;

pub const ACCESS_KEY_HEADER: &str = "x-access-key";

/// Proof that the request carried the configured `x-access-key`.
///
/// Runs before any body extractor, so a denied request is answered without
/// reading the upload. A repeated header counts as a mismatch.
#[derive(Debug, Clone, Copy)]
pub struct AccessGranted;

#[async_trait]
impl FromRequestParts<AppState> for AccessGranted {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let mut values = parts.headers.get_all(ACCESS_KEY_HEADER).iter();
        let presented = match (values.next(), values.next()) {
            (Some(value), None) => Some(value.as_bytes()),
            _ => None,
        };

        if verify_access_key(presented, state.config.access_key().as_bytes()) {
            return Ok(AccessGranted);
        }

        tracing::warn!(
            key_present = presented.is_some(),
            "Rejected request with invalid access key"
        );
        record_outcome(Outcome::Denied);

        Err(AppError::AccessDenied)
    }
}
