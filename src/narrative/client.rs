//! HTTP narrative gateway
//!
//! Talks to an OpenAI-compatible API:
//! - chat completions for narration
//! - image generations for scene pictures

use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{NarrativeGateway, FALLBACK_NARRATIVE};
use crate::error::{GameError, GameResult};

/// Narrator persona sent with every chat request
const NARRATOR_INSTRUCTION: &str = "You are a D&D Narrator Agent. Generate vivid, engaging narrative descriptions of scenes, actions, and outcomes. Write in second-person present tense for player actions. Use vivid sensory details and match the tone to the scene. Be concise (2-4 sentences). Do NOT output markdown.";

/// Connection settings for the generation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub image_model: String,
    pub image_size: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.venice.ai/api/v1".to_string(),
            api_key: None,
            chat_model: "llama-3.3-70b".to_string(),
            image_model: "fluently-xl".to_string(),
            image_size: "1024x576".to_string(),
            max_tokens: 300,
            temperature: 0.8,
            timeout_secs: 60,
        }
    }
}

impl GatewayConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Chat message for LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: String,
    n: u32,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

/// Wrap a bare prompt in the house art style
pub fn styled_image_prompt(prompt: &str) -> String {
    format!(
        "A D&D fantasy scene. {}. Style: semi-realistic fantasy art, detailed, dramatic lighting.",
        prompt
    )
}

/// Generation service client
#[derive(Debug)]
pub struct ChatGateway {
    client: Client,
    config: GatewayConfig,
}

impl ChatGateway {
    pub fn new(config: GatewayConfig) -> GameResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GameError::GatewayFailure(format!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn api_key(&self) -> GameResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GameError::GatewayFailure("API key not configured".to_string()))
    }

    /// Send a chat completion request
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> GameResult<String> {
        let api_key = self.api_key()?;

        let request = ChatRequest {
            model: &self.config.chat_model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(model = request.model, "Sending chat request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GameError::GatewayFailure(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Generation API error: {} - {}", status, body);
            return Err(GameError::GatewayFailure(format!("API error: {}", status)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| GameError::GatewayFailure(format!("bad response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| GameError::GatewayFailure("empty completion".to_string()))
    }

    /// Generate an image, returning its URL or a PNG data URL
    pub async fn image(&self, prompt: &str) -> GameResult<String> {
        let api_key = self.api_key()?;

        let request = ImageRequest {
            model: &self.config.image_model,
            prompt: styled_image_prompt(prompt),
            n: 1,
            size: &self.config.image_size,
        };

        debug!(model = request.model, "Sending image generation request");

        let response = self
            .client
            .post(format!("{}/images/generations", self.config.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GameError::GatewayFailure(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Generation API error: {} - {}", status, body);
            return Err(GameError::GatewayFailure(format!("API error: {}", status)));
        }

        let image_response: ImageResponse = response
            .json()
            .await
            .map_err(|e| GameError::GatewayFailure(format!("bad response: {}", e)))?;

        let image = image_response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| GameError::GatewayFailure("no image generated".to_string()))?;
        image_reference(image)
    }
}

fn image_reference(image: ImageData) -> GameResult<String> {
    if let Some(encoded) = image.b64_json {
        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| GameError::GatewayFailure(format!("bad image payload: {}", e)))?;
        return Ok(format!("data:image/png;base64,{}", encoded));
    }
    image
        .url
        .ok_or_else(|| GameError::GatewayFailure("image without url or data".to_string()))
}

#[async_trait]
impl NarrativeGateway for ChatGateway {
    async fn generate_narrative(&self, prompt: &str) -> String {
        let messages = vec![
            ChatMessage::system(NARRATOR_INSTRUCTION),
            ChatMessage::user(prompt),
        ];
        match self.chat(messages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Narrative generation failed, using fallback");
                FALLBACK_NARRATIVE.to_string()
            }
        }
    }

    async fn generate_image(&self, prompt: &str) -> Option<String> {
        match self.image(prompt).await {
            Ok(reference) => Some(reference),
            Err(e) => {
                warn!(error = %e, "Image generation failed");
                None
            }
        }
    }
}
