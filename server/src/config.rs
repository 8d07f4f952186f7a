use anyhow::bail;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use vision::{VisionConfig, TARGET_LANGUAGE_PLACEHOLDER};

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub prompt_template: Option<String>,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_openai_base_url() -> String {
    vision::DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    vision::DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    vision::DEFAULT_MAX_TOKENS
}

fn default_request_timeout_secs() -> u64 {
    vision::DEFAULT_TIMEOUT.as_secs()
}

fn default_database_url() -> String {
    "sqlite://usage_stats.db".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

impl AppConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.openai_api_key.trim().is_empty() {
            bail!("openai_api_key is empty; set OPENAI_API_KEY");
        }
        if let Some(template) = &self.prompt_template {
            if !template.contains(TARGET_LANGUAGE_PLACEHOLDER) {
                bail!("prompt_template must contain {TARGET_LANGUAGE_PLACEHOLDER}");
            }
        }
        Ok(())
    }

    pub fn vision_config(&self) -> VisionConfig {
        let mut vision_config = VisionConfig::new(self.openai_api_key.clone());
        vision_config.base_url = self.openai_base_url.clone();
        vision_config.model = self.model.clone();
        vision_config.max_tokens = self.max_tokens;
        vision_config.timeout = Duration::from_secs(self.request_timeout_secs);
        if let Some(template) = &self.prompt_template {
            vision_config.prompt_template = template.clone();
        }
        vision_config
    }
}

/// Loads `KEY=value` lines from `path` into the process environment without
/// overriding variables that are already set. A missing file is not an error.
pub fn load_env_file(path: impl AsRef<Path>) -> anyhow::Result<bool> {
    match dotenvy::from_filename(path.as_ref()) {
        Ok(_) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub async fn load_config(config_file: &str) -> anyhow::Result<AppConfig> {
    let app_config: AppConfig = Config::builder()
        .add_source(File::with_name(config_file).required(false))
        .add_source(Environment::default())
        .build()?
        .try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}
