//! Multi-part backend adapter.
//!
//! Speaks the `generateContent` wire format: the prompt text and each file
//! travel as separate parts of a single content entry, so binary files ride
//! along as inline base64 data instead of being flattened into text.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::prompt::{AssembledPrompt, PromptPart};

use super::{error_message_from_body, Provider};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct GenerateRequest {
  contents: Vec<Content>,
  #[serde(rename = "generationConfig")]
  generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
  parts: Vec<Part>,
}

/// Exactly one of `text` / `inline_data` is set per part.
#[derive(Serialize)]
struct Part {
  #[serde(skip_serializing_if = "Option::is_none")]
  text: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  inline_data: Option<InlineData>,
}

#[derive(Serialize)]
struct InlineData {
  mime_type: String,
  data: String,
}

#[derive(Serialize)]
struct GenerationConfig {
  #[serde(rename = "responseMimeType")]
  response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
  content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
  text: Option<String>,
}

pub struct GeminiProvider {
  config: ProviderConfig,
  client: reqwest::Client,
}

impl GeminiProvider {
  pub fn new(config: ProviderConfig) -> Self {
    Self {
      config,
      client: reqwest::Client::new(),
    }
  }

  fn build_parts(prompt: &AssembledPrompt) -> Vec<Part> {
    let mut parts = Vec::with_capacity(1 + prompt.parts.len());
    parts.push(Part {
      text: Some(prompt.text.clone()),
      inline_data: None,
    });
    for part in &prompt.parts {
      match part {
        PromptPart::Text(t) => parts.push(Part {
          text: Some(t.clone()),
          inline_data: None,
        }),
        PromptPart::Inline {
          name,
          media_type,
          data,
          ..
        } => {
          // Office formats are not accepted inline by this backend; the
          // request will still go through but the model may ignore the part.
          if media_type.starts_with("application/vnd") || *media_type == "application/msword" {
            warn!(
              target: "mastery_backend",
              file = %name,
              media_type,
              "Inline part media type is unlikely to be accepted by the backend"
            );
          }
          parts.push(Part {
            text: None,
            inline_data: Some(InlineData {
              mime_type: (*media_type).to_string(),
              data: data.clone(),
            }),
          });
        }
      }
    }
    parts
  }
}

#[async_trait::async_trait]
impl Provider for GeminiProvider {
  fn name(&self) -> &'static str {
    "gemini"
  }

  #[instrument(level = "info", skip_all, fields(level = prompt.level, parts = prompt.parts.len()))]
  async fn generate(&self, prompt: &AssembledPrompt) -> Result<String, ProviderError> {
    if self.config.api_key.is_empty() {
      return Err(ProviderError::Configuration("Gemini"));
    }

    let endpoint = format!(
      "{}/{}:generateContent",
      self.config.base_url, self.config.model
    );
    let request = GenerateRequest {
      contents: vec![Content {
        parts: Self::build_parts(prompt),
      }],
      generation_config: GenerationConfig {
        response_mime_type: "application/json",
      },
    };

    let response = self
      .client
      .post(&endpoint)
      .query(&[("key", self.config.api_key.as_str())])
      .json(&request)
      .timeout(REQUEST_TIMEOUT)
      .send()
      .await
      .map_err(|source| ProviderError::Network {
        endpoint: endpoint.clone(),
        source,
      })?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(ProviderError::Http {
        status: status.as_u16(),
        message: error_message_from_body(&body),
      });
    }

    let parsed: GenerateResponse =
      response
        .json()
        .await
        .map_err(|source| ProviderError::Network { endpoint, source })?;

    let text: String = parsed
      .candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .map(|c| {
        c.parts
          .iter()
          .filter_map(|p| p.text.as_deref())
          .collect::<Vec<_>>()
          .join("")
      })
      .unwrap_or_default();

    if text.trim().is_empty() {
      return Err(ProviderError::EmptyResponse);
    }
    debug!(target: "mastery_backend", chars = text.len(), "Generation response received");
    Ok(text)
  }
}
