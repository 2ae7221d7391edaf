//! Model-completion collaborator contract (§6): `do(ctx, request) ->
//! response`. `HttpModelClient` is a direct HTTP JSON implementation —
//! the teacher's CLI client shapes its request/response structs the same
//! way (serde-derived, a held client, errors folded into the crate error
//! enum), but talks to a subprocess; this one talks to a service.

use crate::config::ModelConfig;
use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolChoice {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ModelRequest {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub system: Vec<String>,
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,
    #[serde(default)]
    pub tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelResponse {
    pub content: Vec<ContentItem>,
    pub stop_reason: String,
    #[serde(default)]
    pub usage: Usage,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn do_completion(&self, request: ModelRequest) -> Result<ModelResponse>;
}

pub struct HttpModelClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpModelClient {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        }
    }

    /// Convenience for single-shot yes/no/name prompts (the JIT installer's
    /// safety question). Returns the model's raw text reply.
    pub async fn ask(&self, prompt: impl Into<String>) -> Result<String> {
        let request = ModelRequest {
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.into(),
            }],
            ..Default::default()
        };
        let response = self.do_completion(request).await?;
        Ok(response
            .content
            .into_iter()
            .find_map(|item| match item {
                ContentItem::Text { text } => Some(text),
                _ => None,
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn do_completion(&self, request: ModelRequest) -> Result<ModelResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ForgeError::Transient(format!("model request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ForgeError::Transient(format!(
                "model returned status {}",
                response.status()
            )));
        }

        response
            .json::<ModelResponse>()
            .await
            .map_err(|e| ForgeError::Transient(format!("model response decode failed: {e}")))
    }
}
