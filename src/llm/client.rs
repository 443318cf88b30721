//! Blocking client for OpenAI-compatible chat-completion endpoints.
//!
//! Used with Groq by default (`https://api.groq.com/openai/v1`), but any
//! endpoint that speaks `POST /chat/completions` works.

use std::time::Duration;

use crate::config::LlmConfig;

use super::{Completion, LlmError, LlmResult};

/// Client for a chat-completions endpoint.
pub struct ChatClient {
    config: LlmConfig,
    api_key: String,
    agent: ureq::Agent,
}

impl ChatClient {
    /// Create a client, reading the API key from the configured environment variable.
    pub fn from_env(config: LlmConfig) -> LlmResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey {
                var: config.api_key_env.clone(),
            })?;
        Ok(Self::with_api_key(config, api_key))
    }

    /// Create a client with an explicit API key.
    pub fn with_api_key(config: LlmConfig, api_key: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            config,
            api_key: api_key.into(),
            agent,
        }
    }

    /// Full URL of the completions endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Get the model name being used.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, system: &str, user: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        })
    }
}

impl Completion for ChatClient {
    fn complete(&self, system: &str, user: &str) -> LlmResult<String> {
        let body = self.request_body(system, user);
        let body_str = serde_json::to_string(&body).map_err(|e| LlmError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let resp = self
            .agent
            .post(&self.endpoint())
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_string(&body_str)
            .map_err(map_transport_error)?;

        let resp_str = resp.into_string().map_err(|e| LlmError::Envelope {
            message: e.to_string(),
        })?;
        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| LlmError::Envelope {
                message: e.to_string(),
            })?;

        read_choice(&json)
    }
}

/// Map a ureq failure onto the collaborator error taxonomy.
fn map_transport_error(err: ureq::Error) -> LlmError {
    match err {
        ureq::Error::Status(429, resp) => {
            let retry_after = resp.header("retry-after").map(str::to_string);
            let body = resp.into_string().unwrap_or_default();
            LlmError::RateLimited {
                message: match retry_after {
                    Some(secs) => format!("retry after {secs}s: {}", super::parse::excerpt(&body)),
                    None => super::parse::excerpt(&body),
                },
            }
        }
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            LlmError::RequestFailed {
                message: format!("HTTP {code}: {}", super::parse::excerpt(&body)),
            }
        }
        other => LlmError::RequestFailed {
            message: other.to_string(),
        },
    }
}

/// Pull the first choice's content out of a completion response.
fn read_choice(json: &serde_json::Value) -> LlmResult<String> {
    let choice = json["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .ok_or_else(|| LlmError::Envelope {
            message: "missing 'choices' array".into(),
        })?;

    if let Some(reason) = choice["finish_reason"].as_str() {
        if reason != "stop" {
            tracing::warn!(finish_reason = reason, "completion did not finish normally");
        }
    }

    Ok(choice["message"]["content"]
        .as_str()
        .unwrap_or("")
        .trim()
        .to_string())
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}
