//! Messages-API provider for the generation backend.
//!
//! Takes the engine's `{role, content}` window plus a separate system
//! string and returns the reply text. Adjacent same-role messages are
//! merged because the API requires strict user/assistant alternation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::providers::{build_http_client, ProviderError};
use crate::traits::{ModelProvider, ProviderResponse};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AnthropicProvider {
    pub fn new(api_key: &str, base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_http_client(DEFAULT_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Merge adjacent messages with the same role; the API rejects
    /// consecutive turns from one side.
    fn merge_adjacent_roles(messages: &[Value]) -> Vec<Value> {
        let mut merged: Vec<Value> = Vec::new();
        for msg in messages {
            let role = msg["role"].as_str().unwrap_or("user");
            let content = msg["content"].as_str().unwrap_or("");
            if let Some(last) = merged.last_mut() {
                if last["role"] == role {
                    let combined = format!("{}\n\n{}", last["content"].as_str().unwrap_or(""), content);
                    last["content"] = json!(combined);
                    continue;
                }
            }
            merged.push(json!({ "role": role, "content": content }));
        }
        merged
    }

    fn extract_text(body: &Value) -> String {
        body["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    async fn chat(
        &self,
        messages: &[Value],
        system: &str,
        model: &str,
    ) -> anyhow::Result<ProviderResponse> {
        let merged = Self::merge_adjacent_roles(messages);

        let mut body = json!({
            "model": model,
            "max_tokens": MAX_TOKENS,
            "messages": merged,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }

        debug!(model, url = %self.base_url, "calling generation backend");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::network(&e))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), &text).into());
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("unparseable backend response: {e}"))?;
        let content = Self::extract_text(&parsed);
        if content.is_empty() {
            anyhow::bail!("backend returned no text content");
        }

        Ok(ProviderResponse { content })
    }
}
