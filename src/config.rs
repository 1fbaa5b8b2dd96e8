//! Configuration: backend provider selection (env) and the level template
//! store (built-in defaults, optionally overridden from TOML).
//!
//! See `ProviderConfig` and `LevelTemplates` for expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{MAX_LEVEL, MIN_LEVEL};
use crate::error::SessionError;

/// Placeholder token in the level-6 template that is replaced verbatim with
/// the learner's submitted answers document.
pub const ANSWERS_DOCUMENT_TOKEN: &str = "{{ANSWERS_DOCUMENT}}";

/// Which generative backend to call. Both speak the same adapter contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
  Gemini,
  OpenAi,
}

/// Provider settings resolved from the environment. The API key may be empty;
/// adapters check it per call and fail with a configuration error instead of
/// refusing to start.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
  pub kind: ProviderKind,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl ProviderConfig {
  /// Resolve from env:
  ///   PROVIDER          : "gemini" (default) or "openai"
  ///   GEMINI_API_KEY    : Gemini credential
  ///   GEMINI_BASE_URL   : default "https://generativelanguage.googleapis.com/v1beta/models"
  ///   GEMINI_MODEL      : default "gemini-1.5-flash-latest"
  ///   OPENAI_API_KEY    : OpenAI credential
  ///   OPENAI_BASE_URL   : default "https://api.openai.com/v1"
  ///   OPENAI_MODEL      : default "gpt-4o-mini"
  pub fn from_env() -> Self {
    let kind = match std::env::var("PROVIDER").as_deref() {
      Ok("openai") => ProviderKind::OpenAi,
      Ok("gemini") | Err(_) => ProviderKind::Gemini,
      Ok(other) => {
        error!(target: "mastery_backend", provider = %other, "Unknown PROVIDER value; defaulting to gemini");
        ProviderKind::Gemini
      }
    };

    match kind {
      ProviderKind::Gemini => Self {
        kind,
        api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
        base_url: std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
          "https://generativelanguage.googleapis.com/v1beta/models".into()
        }),
        model: std::env::var("GEMINI_MODEL")
          .unwrap_or_else(|_| "gemini-1.5-flash-latest".into()),
      },
      ProviderKind::OpenAi => Self {
        kind,
        api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
        base_url: std::env::var("OPENAI_BASE_URL")
          .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
        model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
      },
    }
  }
}

/// Level template store, addressable by level number 0-6.
/// Defaults are sensible for assignment coaching; override them in TOML if
/// you need to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
pub struct LevelTemplates {
  pub level0: String,
  pub level1: String,
  pub level2: String,
  pub level3: String,
  pub level4: String,
  pub level5: String,
  pub level6: String,
}

impl Default for LevelTemplates {
  fn default() -> Self {
    let schema_note = "Respond with a single JSON object with fields: status, \
      main_content_md, flashcards (array of {heading, flashcard_content}), \
      assessment_questions (array of {id, concept_focus, type (MCQ or MAQ), \
      question_text, options, correct_answers}).";
    Self {
      level0: format!(
        "You are a study coach. Read the attached assignment and resource files and \
         produce a high-level overview of what the assignment asks for, plus an \
         assignment_summary_md field. Set status to LEVEL_0_OVERVIEW. {}",
        schema_note
      ),
      level1: format!(
        "Build basic-understanding material for the attached assignment: core terms, \
         definitions, and orientation. Set status to LEVEL_1_BASIC_UNDERSTANDING. {}",
        schema_note
      ),
      level2: format!(
        "Build advanced-understanding material: deeper mechanisms and relationships \
         between the concepts the assignment relies on. Include feedback_md commenting \
         on the learner's previous answers. Set status to \
         LEVEL_2_ADVANCED_UNDERSTANDING. {}",
        schema_note
      ),
      level3: format!(
        "Build practical-application material: worked examples applying the concepts \
         to problems like the assignment. Include feedback_md on the previous answers. \
         Set status to LEVEL_3_PRACTICAL_APPLICATION. {}",
        schema_note
      ),
      level4: format!(
        "Build expert-implementation guidance: pitfalls, edge cases, and quality \
         criteria for a strong submission. Include feedback_md on the previous \
         answers. Set status to LEVEL_4_EXPERT_IMPLEMENTATION. {}",
        schema_note
      ),
      level5: format!(
        "Build mastery material. In addition to main_content_md, include \
         practice_assignment_md (a practice task mirroring the real assignment) and \
         solution_md (a model solution). Include feedback_md on the previous answers. \
         Set status to LEVEL_5_MASTERY. {}",
        schema_note
      ),
      level6: format!(
        "The learner has completed the assignment. Their submitted work follows:\n\n\
         {}\n\nReview it against the attached assignment and resources. Produce \
         main_content_md with a detailed evaluation: strengths, weaknesses, and \
         concrete improvements. Do not produce flashcards or assessment_questions. \
         Set status to LEVEL_6_FINAL_REVIEW. {}",
        ANSWERS_DOCUMENT_TOKEN, schema_note
      ),
    }
  }
}

impl LevelTemplates {
  /// Template text for a level, or `InvalidLevel` outside [0, 6].
  pub fn template_for(&self, level: i64) -> Result<&str, SessionError> {
    if level < MIN_LEVEL as i64 || level > MAX_LEVEL as i64 {
      return Err(SessionError::InvalidLevel(level));
    }
    Ok(match level {
      0 => &self.level0,
      1 => &self.level1,
      2 => &self.level2,
      3 => &self.level3,
      4 => &self.level4,
      5 => &self.level5,
      _ => &self.level6,
    })
  }
}

/// TOML schema: `[templates]` table with level0..level6 keys.
#[derive(Debug, Deserialize)]
struct StudyConfig {
  templates: LevelTemplates,
}

/// Attempt to load templates from STUDY_CONFIG_PATH. On any parsing/IO error,
/// returns None and the built-in defaults apply.
pub fn load_templates_from_env() -> Option<LevelTemplates> {
  let path = std::env::var("STUDY_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<StudyConfig>(&s) {
      Ok(cfg) => {
        info!(target: "mastery_backend", %path, "Loaded level templates (TOML)");
        Some(cfg.templates)
      }
      Err(e) => {
        error!(target: "mastery_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "mastery_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// Human-readable status message keyed to the level being fetched, surfaced
/// while the single in-flight generation call is pending.
pub fn loading_message(level: u8) -> &'static str {
  match level {
    0 => "Analyzing your assignment materials...",
    1 => "Building your basic understanding content...",
    2 => "Developing advanced concepts for your assignment...",
    3 => "Creating practical application examples...",
    4 => "Generating expert implementation guidance...",
    5 => "Preparing mastery level content...",
    6 => "Evaluating your submitted assignment...",
    _ => "Processing your request...",
  }
}
