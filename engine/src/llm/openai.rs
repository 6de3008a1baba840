//! OpenAI-compatible chat-completions provider

use super::{ModelError, ModelProvider, ModelReply, ModelRequest};
use crate::config::ModelConfig;
use crate::secrets::SecretString;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

/// Provider speaking the OpenAI chat-completions wire format.
pub struct OpenAiProvider {
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a provider with explicit parts. `api_key = None` makes every
    /// call fail fast with [`ModelError::MissingCredential`] before any I/O.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Create a provider from config, reading the credential from the
    /// configured environment variable.
    pub fn from_config(config: &ModelConfig) -> Self {
        let api_key = SecretString::from_env(&config.api_key_env);
        if api_key.is_none() {
            debug!(var = %config.api_key_env, "no API credential in environment, delegated mode will fail fast");
        }
        Self::new(config.base_url.clone(), config.model.clone(), api_key)
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn check_health(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &ModelRequest) -> super::Result<ModelReply> {
        let api_key = self.api_key.as_ref().ok_or(ModelError::MissingCredential)?;

        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = vec![json!({
            "role": "system",
            "content": request.instruction,
        })];
        for entry in &request.history {
            messages.push(json!({
                "role": entry.role.to_string(),
                "content": entry.content,
            }));
        }

        let payload = json!({
            "model": self.model,
            "temperature": request.temperature.clamp(0.0, 1.0),
            "messages": messages,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key.unsecure()))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Http { status, message });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| ModelError::Parse("no message content in response".to_string()))?;

        if content.trim().is_empty() {
            return Err(ModelError::EmptyReply);
        }

        Ok(ModelReply {
            text: content.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credential_fails_before_any_io() {
        // Unroutable base URL: if the provider tried the network, the error
        // would be Network, not MissingCredential.
        let provider = OpenAiProvider::new("http://127.0.0.1:1", "gpt-4o-mini", None);
        let request = ModelRequest {
            instruction: "test".to_string(),
            history: vec![],
            temperature: 0.4,
        };
        let err = provider.complete(&request).await.unwrap_err();
        assert!(matches!(err, ModelError::MissingCredential));
        assert!(!provider.check_health().await);
    }
}
