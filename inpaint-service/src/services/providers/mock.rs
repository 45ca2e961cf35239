//! Mock provider implementation for testing and local development.

use super::{ImageProvider, InpaintInput, ProviderError};
use async_trait::async_trait;
use axum::body::Bytes;
use tokio::sync::Mutex;

/// 1x1 transparent PNG.
pub const MOCK_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Mock image provider. Returns `MOCK_PNG` and remembers every input.
pub struct MockImageProvider {
    enabled: bool,
    model: String,
    calls: Mutex<Vec<InpaintInput>>,
}

impl MockImageProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            model: "mock-inpainting".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Inputs received so far, oldest first.
    pub async fn calls(&self) -> Vec<InpaintInput> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, input: &InpaintInput) -> Result<Bytes, ProviderError> {
        self.calls.lock().await.push(input.clone());

        if !self.enabled {
            return Err(ProviderError::ApiError(
                "Mock image provider not enabled".to_string(),
            ));
        }

        Ok(Bytes::from_static(MOCK_PNG))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured(
                "Mock image provider not enabled".to_string(),
            ))
        }
    }
}
