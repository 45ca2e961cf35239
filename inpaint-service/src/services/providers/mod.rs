//! Image generation provider abstraction.
//!
//! The handler only sees `ImageProvider`, so the hosted backend can be swapped
//! for the in-process mock in tests and local runs.

pub mod mock;
pub mod workers_ai;

use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Serialize, Serializer};
use service_core::error::AppError;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(_) => AppError::ServiceUnavailable,
            ProviderError::RateLimited => {
                AppError::TooManyRequests("Inference provider rate limited".to_string(), None)
            }
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

/// Input for an inpainting / image-to-image run.
///
/// Files travel as arrays of byte values. Absent optionals are omitted, and
/// whole numbers are written as JSON integers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InpaintInput {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<Vec<u8>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_number"
    )]
    pub width: Option<f64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_number"
    )]
    pub height: Option<f64>,
    #[serde(serialize_with = "serialize_number")]
    pub guidance: f64,
    #[serde(serialize_with = "serialize_number")]
    pub strength: f64,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_number"
    )]
    pub seed: Option<f64>,
}

/// Largest magnitude at which every integer is exactly representable in f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

fn serialize_optional_number<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(number) => serialize_number(number, serializer),
        None => serializer.serialize_none(),
    }
}

/// Trait for image generation backends.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Model identifier runs are submitted to.
    fn model(&self) -> &str;

    /// Run the model and return the encoded image.
    async fn generate(&self, input: &InpaintInput) -> Result<Bytes, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
