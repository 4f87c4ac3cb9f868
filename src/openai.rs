//! Minimal chat-completions client for the generation provider.
//!
//! One POST per call; the mode picks the system role, temperature and token
//! ceiling. Failures are classified into the pipeline error taxonomy so the
//! orchestrator can special-case the rate-limit condition.
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::{Prompts, ProviderSettings};
use crate::error::{Error, Result};

/// What the caller is asking the provider to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationMode {
  /// A fresh problem item: higher creativity, lower token ceiling.
  Item,
  /// A full solution: precision over creativity, higher token ceiling.
  Solution,
}

impl GenerationMode {
  fn temperature(&self) -> f32 {
    match self {
      GenerationMode::Item => 0.9,
      GenerationMode::Solution => 0.2,
    }
  }

  fn max_tokens(&self) -> u32 {
    match self {
      GenerationMode::Item => 900,
      GenerationMode::Solution => 2200,
    }
  }

  fn system_role<'a>(&self, prompts: &'a Prompts) -> &'a str {
    match self {
      GenerationMode::Item => &prompts.item_system,
      GenerationMode::Solution => &prompts.solution_system,
    }
  }

  fn as_str(&self) -> &'static str {
    match self {
      GenerationMode::Item => "item",
      GenerationMode::Solution => "solution",
    }
  }
}

#[derive(Clone)]
pub struct OpenAI {
  client: reqwest::Client,
  api_key: String,
  base_url: String,
  model: String,
}

impl OpenAI {
  /// Build a client from explicit settings. Fails with `Error::Config` when
  /// the credential is blank, before any network call is possible.
  pub fn new(settings: ProviderSettings) -> Result<Self> {
    if settings.api_key.trim().is_empty() {
      return Err(Error::Config);
    }
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self {
      client,
      api_key: settings.api_key,
      base_url: settings.base_url,
      model: settings.model,
    })
  }

  /// Convenience constructor from environment variables.
  pub fn from_env() -> Result<Self> {
    Self::new(ProviderSettings::from_env()?)
  }

  /// One chat completion. Returns the raw text payload; parsing into
  /// structured fields happens in `parser`.
  #[instrument(level = "info", skip(self, prompts, prompt), fields(model = %self.model, mode = mode.as_str(), prompt_len = prompt.len()))]
  pub async fn generate(
    &self,
    prompts: &Prompts,
    prompt: &str,
    mode: GenerationMode,
  ) -> Result<String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: mode.system_role(prompts).into() },
        ChatMessageReq { role: "user".into(), content: prompt.into() },
      ],
      temperature: mode.temperature(),
      max_tokens: mode.max_tokens(),
    };

    let start = std::time::Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "probgen/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      return Err(classify_http_failure(status, &body));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|_| Error::MalformedResponse)?;
    if let Some(usage) = &body.usage {
      info!(
        prompt_tokens = ?usage.prompt_tokens,
        completion_tokens = ?usage.completion_tokens,
        total_tokens = ?usage.total_tokens,
        "provider usage"
      );
    }

    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.as_deref())
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or(Error::MalformedResponse)?
      .to_string();

    info!(elapsed = ?start.elapsed(), response_len = text.len(), "generation succeeded");
    Ok(text)
  }
}

/// Map a non-2xx response to the taxonomy. HTTP 429 and provider error codes
/// naming the rate limit become `RateLimited`; everything else is `Provider`.
fn classify_http_failure(status: u16, body: &str) -> Error {
  let detail = extract_provider_error(body);
  let is_rate_limit = status == 429
    || detail
      .as_ref()
      .map(|d| d.code.as_deref().unwrap_or_default().contains("rate_limit"))
      .unwrap_or(false);

  if is_rate_limit {
    return Error::RateLimited;
  }
  Error::Provider {
    status,
    body: detail.map(|d| d.message).unwrap_or_else(|| crate::util::trunc_for_log(body, 300)),
  }
}

struct ProviderErrorDetail {
  message: String,
  code: Option<String>,
}

/// Try to extract a clean error message from a provider error body.
fn extract_provider_error(body: &str) -> Option<ProviderErrorDetail> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
    #[serde(default)]
    code: Option<String>,
  }
  serde_json::from_str::<EWrap>(body)
    .ok()
    .map(|w| ProviderErrorDetail { message: w.error.message, code: w.error.code })
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  max_tokens: u32,
}
#[derive(Serialize)]
struct ChatMessageReq {
  role: String,
  content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)]
  usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessageResp,
}
#[derive(Deserialize)]
struct ChatMessageResp {
  content: Option<String>,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)]
  prompt_tokens: Option<u32>,
  #[serde(default)]
  completion_tokens: Option<u32>,
  #[serde(default)]
  total_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_429_classifies_as_rate_limited() {
    assert!(matches!(classify_http_failure(429, ""), Error::RateLimited));
  }

  #[test]
  fn rate_limit_error_code_classifies_as_rate_limited() {
    let body = r#"{"error":{"message":"Too many requests","code":"rate_limit_exceeded"}}"#;
    assert!(matches!(classify_http_failure(400, body), Error::RateLimited));
  }

  #[test]
  fn other_failures_keep_status_and_clean_message() {
    let body = r#"{"error":{"message":"model not found","code":"model_not_found"}}"#;
    match classify_http_failure(404, body) {
      Error::Provider { status, body } => {
        assert_eq!(status, 404);
        assert_eq!(body, "model not found");
      }
      other => panic!("unexpected: {other:?}"),
    }
  }

  #[test]
  fn unstructured_error_bodies_are_truncated_not_dropped() {
    match classify_http_failure(500, "<html>gateway timeout</html>") {
      Error::Provider { status, body } => {
        assert_eq!(status, 500);
        assert!(body.contains("gateway timeout"));
      }
      other => panic!("unexpected: {other:?}"),
    }
  }

  #[test]
  fn blank_credential_fails_before_any_network_io() {
    let settings = ProviderSettings {
      api_key: "  ".into(),
      base_url: "https://api.openai.com/v1".into(),
      model: "gpt-4o-mini".into(),
    };
    assert!(matches!(OpenAI::new(settings), Err(Error::Config)));
  }
}
