//! Cloudflare Workers AI provider.
//!
//! Runs text-to-image and inpainting models through the Workers AI REST API.
//! Image models answer a successful run with the raw image bytes.

use super::{ImageProvider, InpaintInput, ProviderError};
use crate::config::WorkersAiConfig;
use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use std::time::Duration;

/// Workers AI provider.
pub struct WorkersAiProvider {
    config: WorkersAiConfig,
    client: Client,
}

impl WorkersAiProvider {
    pub fn new(config: WorkersAiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// URL of the run endpoint for the configured model.
    fn run_url(&self) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_id,
            self.config.model
        )
    }

    fn verify_url(&self) -> String {
        format!(
            "{}/user/tokens/verify",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ImageProvider for WorkersAiProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, input: &InpaintInput) -> Result<Bytes, ProviderError> {
        tracing::debug!(
            model = %self.config.model,
            prompt_len = input.prompt.len(),
            image_bytes = input.image.as_ref().map(Vec::len).unwrap_or(0),
            mask_bytes = input.mask.as_ref().map(Vec::len).unwrap_or(0),
            "Sending run request to Workers AI"
        );

        let response = self
            .client
            .post(self.run_url())
            .bearer_auth(self.config.api_token.expose_secret())
            .json(input)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Workers AI error {}: {}",
                status, error_text
            )));
        }

        let image = response
            .bytes()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if image.is_empty() {
            return Err(ProviderError::ApiError(
                "Workers AI returned an empty image".to_string(),
            ));
        }

        Ok(image)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.account_id.is_empty() || self.config.api_token.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Workers AI account or API token not configured".to_string(),
            ));
        }

        let response = self
            .client
            .get(self.verify_url())
            .bearer_auth(self.config.api_token.expose_secret())
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}
