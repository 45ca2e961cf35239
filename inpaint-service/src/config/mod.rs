use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Workers AI REST root.
const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Inpainting-capable diffusion model served by Workers AI.
pub const DEFAULT_MODEL: &str = "@cf/runwayml/stable-diffusion-v1-5-inpainting";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Room for a prompt, two maximum-size images and multipart framing.
const DEFAULT_MAX_BODY_BYTES: usize = 100_000_000;

#[derive(Debug, Clone, Deserialize)]
pub struct InpaintConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub access: AccessConfig,
    pub workers_ai: WorkersAiConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    /// Shared secret expected in the `x-access-key` header.
    pub key: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkersAiConfig {
    pub account_id: String,
    pub api_token: Secret<String>,
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub max_body_bytes: usize,
}

impl InpaintConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let access_key = get_env("ACCESS_KEY", None, is_prod)?;
        if access_key.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ACCESS_KEY must not be empty"
            )));
        }

        Ok(InpaintConfig {
            common: common_config,
            access: AccessConfig {
                key: Secret::new(access_key),
            },
            workers_ai: WorkersAiConfig {
                account_id: get_env("WORKERS_AI_ACCOUNT_ID", None, is_prod)?,
                api_token: Secret::new(get_env("WORKERS_AI_API_TOKEN", None, is_prod)?),
                api_base: get_env("WORKERS_AI_API_BASE", Some(DEFAULT_API_BASE), is_prod)?,
                model: get_env("INPAINT_MODEL", Some(DEFAULT_MODEL), is_prod)?,
                timeout_secs: parse_env(
                    "INFERENCE_TIMEOUT_SECS",
                    DEFAULT_TIMEOUT_SECS,
                    is_prod,
                )?,
            },
            limits: LimitsConfig {
                max_body_bytes: parse_env("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES, is_prod)?,
            },
        })
    }

    /// Configuration for tests and local runs against a non-Workers provider.
    pub fn with_access_key(access_key: &str) -> Self {
        InpaintConfig {
            common: core_config::Config::default(),
            access: AccessConfig {
                key: Secret::new(access_key.to_string()),
            },
            workers_ai: WorkersAiConfig {
                account_id: String::new(),
                api_token: Secret::new(String::new()),
                api_base: DEFAULT_API_BASE.to_string(),
                model: DEFAULT_MODEL.to_string(),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            limits: LimitsConfig {
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            },
        }
    }

    pub fn access_key(&self) -> &str {
        self.access.key.expose_secret()
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr + ToString,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(&default.to_string()), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("Invalid {}: {}", key, e)))
}
