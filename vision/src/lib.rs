use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-2024-05-13";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const TARGET_LANGUAGE_PLACEHOLDER: &str = "{target_language}";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are an expert menu translator with a background in food and cuisine. \
The image shows a restaurant menu. Translate it into {target_language} following these rules:
1. Extract all text visible in the image.
2. Translate every piece of extracted text into {target_language}.
3. Keep the original structure: sections, dish order and line breaks.
4. When a dish or term is culturally specific and has no direct equivalent, keep it and add a short explanation in parentheses.
5. Leave numbers and prices exactly as written.
6. Preserve special symbols such as currency signs, asterisks and dietary icons.
7. Put [UNCERTAIN] right after any translation you are not confident about.";

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("failed to reach the vision model")]
    Transport(#[from] reqwest::Error),

    #[error("vision model returned {status}: {body}")]
    Upstream {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected response from the vision model: {0}")]
    MalformedResponse(String),
}

impl VisionError {
    /// Only transport failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VisionError::Transport(_))
    }
}

/// Base64 text for embedding raw image bytes in a JSON payload.
pub fn encode_image(image: &[u8]) -> String {
    general_purpose::STANDARD.encode(image)
}

/// Every upload is labeled JPEG; the model sniffs the real format itself.
pub fn image_data_uri(encoded: &str) -> String {
    format!("data:image/jpeg;base64,{encoded}")
}

/// Drops control characters so a label cannot open new instruction lines.
pub fn sanitize_label(label: &str) -> String {
    label.chars().filter(|c| !c.is_control()).collect()
}

pub fn build_instruction(template: &str, target_language: &str) -> String {
    template.replace(TARGET_LANGUAGE_PLACEHOLDER, &sanitize_label(target_language))
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub prompt_template: String,
}

impl VisionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelPayload {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub role: &'static str,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
    pub detail: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct VisionClient {
    client: reqwest::Client,
    config: VisionConfig,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn build_payload(&self, image: &[u8], target_language: &str) -> ModelPayload {
        ModelPayload {
            model: self.config.model.clone(),
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: build_instruction(&self.config.prompt_template, target_language),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_data_uri(&encode_image(image)),
                            detail: "high",
                        },
                    },
                ],
            }],
            max_tokens: self.config.max_tokens,
        }
    }

    /// Sends one OCR-and-translate request. There is no retry; a timeout
    /// surfaces as [`VisionError::Transport`].
    pub async fn translate(
        &self,
        image: &[u8],
        target_language: &str,
    ) -> Result<String, VisionError> {
        let payload = self.build_payload(image, target_language);
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        log::debug!(
            "Sending {} byte image to {} (model {})",
            image.len(),
            url,
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::warn!("Vision model returned {status}");
            return Err(VisionError::Upstream { status, body });
        }

        let body = response.text().await?;
        extract_text(&body)
    }
}

/// Pulls `choices[0].message.content` out of a chat completion envelope.
pub fn extract_text(body: &str) -> Result<String, VisionError> {
    let envelope: ChatResponse = serde_json::from_str(body)
        .map_err(|e| VisionError::MalformedResponse(format!("invalid envelope: {e}")))?;
    let choice = envelope
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| VisionError::MalformedResponse("empty choice list".to_string()))?;
    let content = choice
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| VisionError::MalformedResponse("missing message content".to_string()))?;
    Ok(content.trim().to_string())
}
