//! Flattened chat backend adapter.
//!
//! Speaks the chat-completions wire format in JSON mode. This transport is
//! text-only: text file parts are appended to the single user message, and
//! binary parts degrade to an explicit placeholder line so the model (and the
//! logs) can see that an attachment was dropped rather than silently lost.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::prompt::{AssembledPrompt, PromptPart};

use super::{error_message_from_body, Provider};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// JSON mode requires the instruction in the conversation itself, not just
/// the response_format flag; level templates are overridable, so it cannot
/// be left to the user text.
const SYSTEM_INSTRUCTION: &str =
  "You are a study-content generator. You must answer with a single valid JSON object \
   and nothing else: no prose, no markdown fences, no commentary outside the JSON.";

#[derive(Serialize)]
struct ChatRequest {
  model: String,
  messages: Vec<ChatMessage>,
  response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
  role: &'static str,
  content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
  #[serde(default)]
  choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
  message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
  content: Option<String>,
}

pub struct OpenAiProvider {
  config: ProviderConfig,
  client: reqwest::Client,
}

impl OpenAiProvider {
  pub fn new(config: ProviderConfig) -> Self {
    Self {
      config,
      client: reqwest::Client::new(),
    }
  }

  /// Fold the prompt and all file parts into one user-message string.
  fn flatten(prompt: &AssembledPrompt) -> String {
    let mut out = prompt.text.clone();
    for part in &prompt.parts {
      out.push_str("\n\n");
      match part {
        PromptPart::Text(t) => out.push_str(t),
        PromptPart::Inline {
          label,
          name,
          media_type,
          ..
        } => {
          warn!(
            target: "mastery_backend",
            file = %name,
            media_type,
            "Dropping binary file from text-only prompt"
          );
          out.push_str(&format!(
            "[{label} '{name}' ({media_type}) was provided but cannot be included in a text-only prompt.]",
            label = label,
            name = name,
            media_type = media_type,
          ));
        }
      }
    }
    out
  }

  fn build_messages(prompt: &AssembledPrompt) -> Vec<ChatMessage> {
    vec![
      ChatMessage {
        role: "system",
        content: SYSTEM_INSTRUCTION.to_string(),
      },
      ChatMessage {
        role: "user",
        content: Self::flatten(prompt),
      },
    ]
  }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
  fn name(&self) -> &'static str {
    "openai"
  }

  #[instrument(level = "info", skip_all, fields(level = prompt.level, parts = prompt.parts.len()))]
  async fn generate(&self, prompt: &AssembledPrompt) -> Result<String, ProviderError> {
    if self.config.api_key.is_empty() {
      return Err(ProviderError::Configuration("OpenAI"));
    }

    let endpoint = format!("{}/chat/completions", self.config.base_url);
    let request = ChatRequest {
      model: self.config.model.clone(),
      messages: Self::build_messages(prompt),
      response_format: ResponseFormat {
        format_type: "json_object",
      },
    };

    let response = self
      .client
      .post(&endpoint)
      .bearer_auth(&self.config.api_key)
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

    let parsed: ChatResponse =
      response
        .json()
        .await
        .map_err(|source| ProviderError::Network { endpoint, source })?;

    let text = parsed
      .choices
      .first()
      .and_then(|c| c.message.as_ref())
      .and_then(|m| m.content.clone())
      .unwrap_or_default();

    if text.trim().is_empty() {
      return Err(ProviderError::EmptyResponse);
    }
    debug!(target: "mastery_backend", chars = text.len(), "Generation response received");
    Ok(text)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn request_carries_the_json_system_instruction() {
    let prompt = AssembledPrompt {
      level: 0,
      text: "build the overview".into(),
      parts: vec![],
    };
    let messages = OpenAiProvider::build_messages(&prompt);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "system");
    assert!(messages[0].content.contains("JSON"));
    assert_eq!(messages[1].role, "user");
    // The instruction must not depend on the (overridable) level template.
    assert!(!messages[1].content.contains(SYSTEM_INSTRUCTION));
  }

  #[test]
  fn flatten_appends_text_and_degrades_binary() {
    let prompt = AssembledPrompt {
      level: 1,
      text: "instructions".into(),
      parts: vec![
        PromptPart::Text("--- Assignment File: a.txt ---\n\nbody\n\n--- End Assignment File ---".into()),
        PromptPart::Inline {
          label: "Resource File",
          name: "deck.pdf".into(),
          media_type: "application/pdf",
          data: "aGVsbG8=".into(),
        },
      ],
    };
    let flat = OpenAiProvider::flatten(&prompt);
    assert!(flat.starts_with("instructions"));
    assert!(flat.contains("body"));
    assert!(flat.contains("deck.pdf"));
    // Base64 payload must not leak into the text prompt.
    assert!(!flat.contains("aGVsbG8="));
  }
}
