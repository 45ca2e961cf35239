#![allow(dead_code)]

use inpaint_service::config::InpaintConfig;
use inpaint_service::services::providers::mock::MockImageProvider;
use inpaint_service::startup::Application;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

pub const TEST_ACCESS_KEY: &str = "secret123";
pub const VALID_PROMPT: &str = "a photorealistic cat on a sofa";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub provider: Arc<MockImageProvider>,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn the service on a random port with a mock inference provider.
    pub async fn spawn() -> Self {
        Self::spawn_with_provider(MockImageProvider::new(true)).await
    }

    pub async fn spawn_with_provider(provider: MockImageProvider) -> Self {
        Self::spawn_with_config(test_config(), provider).await
    }

    /// Spawn with a request body limit of `max_body_bytes`.
    pub async fn spawn_with_body_limit(max_body_bytes: usize) -> Self {
        let mut config = test_config();
        config.limits.max_body_bytes = max_body_bytes;
        Self::spawn_with_config(config, MockImageProvider::new(true)).await
    }

    async fn spawn_with_config(config: InpaintConfig, provider: MockImageProvider) -> Self {
        let provider = Arc::new(provider);
        let app = Application::build_with_provider(config, provider.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();

        // Wait for the server to accept connections
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            provider,
            client,
        }
    }

    /// POST a form to the generation endpoint with the given access key.
    pub async fn generate(
        &self,
        access_key: Option<&str>,
        form: reqwest::multipart::Form,
    ) -> reqwest::Response {
        let mut request = self.client.post(&self.address).multipart(form);
        if let Some(key) = access_key {
            request = request.header("x-access-key", key);
        }
        request.send().await.expect("Failed to execute request")
    }
}

fn test_config() -> InpaintConfig {
    let mut config = InpaintConfig::with_access_key(TEST_ACCESS_KEY);
    config.common.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.common.port = 0; // Random port for testing
    config
}

pub fn prompt_form(prompt: &str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new().text("prompt", prompt.to_string())
}

pub fn image_part(data: Vec<u8>, mime: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(data)
        .file_name("image.png")
        .mime_str(mime)
        .expect("Invalid mime type")
}

/// Field-level issues from a 422 response body, as (field, message) pairs.
pub async fn issues(response: reqwest::Response) -> Vec<(String, String)> {
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Validation error");
    body["issues"]
        .as_array()
        .expect("issues missing")
        .iter()
        .map(|issue| {
            (
                issue["field"].as_str().unwrap_or_default().to_string(),
                issue["message"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}
