use crate::config::{LlmConfig, DUMMY_API_KEY};
use crate::error::{GenieError, Result};
use crate::prompt::ExplanationRequest;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

pub const EMPTY_RESPONSE_TEXT: &str = "No valid text content returned by the model.";

/// Anything that turns a prompt into prose.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
            max_tokens: 300,
            temperature: 0.7,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.api_key == DUMMY_API_KEY
    }

    pub async fn call_llm(&self, prompt: &str) -> Result<String> {
        // No real key configured: answer locally so the rest of the flow still works
        if self.is_offline() {
            return Ok(offline_explanation(prompt));
        }

        let client = reqwest::Client::new();
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens
        });

        info!("Requesting explanation from {}", self.model);
        let response = client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenieError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        let response_json: Value = response
            .json()
            .await
            .map_err(|e| GenieError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if !status.is_success() {
            let message = response_json["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            return Err(GenieError::Llm(format!("LLM API returned {}: {}", status, message)));
        }

        Ok(extract_text(&response_json).unwrap_or_else(|| EMPTY_RESPONSE_TEXT.to_string()))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.call_llm(prompt).await
    }
}

/// Pull the text out of a model response.
///
/// Understands chat-completions (`choices[0].message.content`), messages-style
/// (`content[]` text blocks) and converse-style (`output.message.content[]`) bodies.
pub fn extract_text(response: &Value) -> Option<String> {
    if let Some(content) = response["choices"][0]["message"]["content"].as_str() {
        let content = content.trim();
        if !content.is_empty() {
            return Some(content.to_string());
        }
    }

    join_text_blocks(&response["content"])
        .or_else(|| join_text_blocks(&response["output"]["message"]["content"]))
}

fn join_text_blocks(blocks: &Value) -> Option<String> {
    let text = blocks
        .as_array()?
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"))
        .filter_map(|block| block["text"].as_str())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

fn offline_explanation(prompt: &str) -> String {
    let companies = prompt
        .lines()
        .find_map(|line| line.strip_prefix("Recommended Companies: "))
        .unwrap_or("N/A");
    format!(
        "These picks ({}) were chosen to match your sector and risk preferences. \
         Treat them as a starting point rather than a guarantee: spread your money \
         across several holdings and do your own due diligence before investing.",
        companies
    )
}

/// Generate the explanation for one request. Generator failures come back as a
/// readable message rather than an error, so callers can always show something.
pub async fn explain(generator: &dyn TextGenerator, request: &ExplanationRequest) -> String {
    match generator.generate(&request.to_prompt()).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Explanation generation failed: {}", e);
            format!("Error while generating explanation: {}", e)
        }
    }
}
