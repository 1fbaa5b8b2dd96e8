//! Generative-backend adapters.
//!
//! Both backends sit behind the `Provider` trait: they receive the one
//! already-assembled prompt and return raw response text. Prompt assembly and
//! response parsing live outside the adapters, so adding a backend means
//! writing transport code only.

pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ProviderError;
use crate::prompt::AssembledPrompt;
use crate::util::trunc_for_log;

/// One generation call against a concrete backend.
#[async_trait]
pub trait Provider: Send + Sync {
  /// Backend name for logs and error messages.
  fn name(&self) -> &'static str;

  /// Send the assembled prompt and return the raw response text, untouched.
  async fn generate(&self, prompt: &AssembledPrompt) -> Result<String, ProviderError>;
}

/// Instantiate the adapter the configuration selects.
pub fn select_provider(config: &ProviderConfig) -> Box<dyn Provider> {
  match config.kind {
    ProviderKind::Gemini => Box::new(gemini::GeminiProvider::new(config.clone())),
    ProviderKind::OpenAi => Box::new(openai::OpenAiProvider::new(config.clone())),
  }
}

/// Pull the human-readable message out of a provider error body. Both
/// backends use the `{"error": {"message": ...}}` shape; anything else is
/// returned truncated as-is.
pub(crate) fn error_message_from_body(body: &str) -> String {
  if let Ok(v) = serde_json::from_str::<Value>(body) {
    if let Some(msg) = v
      .get("error")
      .and_then(|e| e.get("message"))
      .and_then(Value::as_str)
    {
      return msg.to_string();
    }
  }
  trunc_for_log(body, 300)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn error_body_message_is_extracted_when_present() {
    let body = r#"{"error":{"message":"quota exceeded","code":429}}"#;
    assert_eq!(error_message_from_body(body), "quota exceeded");
  }

  #[test]
  fn non_json_error_body_is_passed_through_truncated() {
    assert_eq!(error_message_from_body("Bad Gateway"), "Bad Gateway");
    assert!(error_message_from_body(&"x".repeat(500)).contains("500 bytes total"));
  }
}
