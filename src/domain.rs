//! Domain models: uploaded files, assessment questions, flashcards, and the
//! canonical parsed output of one level's generation call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lowest valid level.
pub const MIN_LEVEL: u8 = 0;
/// Highest valid level: the final review of the learner's submitted work.
pub const MAX_LEVEL: u8 = 6;

/// How a file's `content` string is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEncoding {
  Text,
  Base64,
}

/// One normalized uploaded document. Immutable once built.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileAsset {
  pub name: String,
  pub content: String,
  pub encoding: FileEncoding,
}

/// Normalized set of uploaded documents: one assignment plus N resources.
/// Built once per upload session; read by every level request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileBundle {
  pub assignment: FileAsset,
  #[serde(default)]
  pub resources: Vec<FileAsset>,
}

/// The learner's final submitted work, consumed only by the level-6 review.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswersDocument {
  pub name: String,
  pub content: String,
  #[serde(rename = "type")]
  pub doc_type: String,
}

/// Single-answer vs multi-answer question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
  #[serde(rename = "MCQ")]
  Mcq,
  #[serde(rename = "MAQ")]
  Maq,
}

/// One quiz question produced for level N and consumed as input (with the
/// learner's answers) when requesting level N+1.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssessmentQuestion {
  pub id: String,
  #[serde(default)]
  pub concept_focus: String,
  #[serde(rename = "type")]
  pub question_type: QuestionType,
  pub question_text: String,
  pub options: Vec<String>,
  #[serde(default)]
  pub correct_answers: Vec<String>,
}

/// Question id -> ordered set of selected option strings.
/// MCQ entries hold exactly one element; MAQ entries hold zero or more.
pub type AnswerMap = BTreeMap<String, Vec<String>>;

/// A single concept card.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flashcard {
  pub heading: String,
  // The generative backends emit `flashcard_content`; accept both spellings.
  #[serde(alias = "flashcard_content")]
  pub content: String,
}

/// Sentinel status for content that carries a diagnostic instead of material.
pub const STATUS_ERROR: &str = "error";

/// Canonical output of parsing one level response. All downstream phases
/// operate only on this shape, including the error case.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelContent {
  pub status: String,
  #[serde(default)]
  pub main_content: String,
  #[serde(default)]
  pub assignment_summary: String,
  #[serde(default)]
  pub feedback: String,
  #[serde(default)]
  pub flashcards: Vec<Flashcard>,
  #[serde(default)]
  pub assessment_questions: Vec<AssessmentQuestion>,
}

impl LevelContent {
  /// Error-status content carrying a user-visible diagnostic. This renders in
  /// the same content slot as a successful level, never as an exception.
  pub fn error(diagnostic: impl Into<String>) -> Self {
    Self {
      status: STATUS_ERROR.into(),
      main_content: diagnostic.into(),
      assignment_summary: String::new(),
      feedback: String::new(),
      flashcards: Vec::new(),
      assessment_questions: Vec::new(),
    }
  }

  pub fn is_error(&self) -> bool {
    self.status == STATUS_ERROR
  }
}

/// Default status tag when a response doesn't carry one.
pub fn level_status_tag(level: u8) -> String {
  format!("LEVEL_{}_OVERVIEW", level)
}

/// Human-readable title for a level, for logs and the UI contract.
pub fn level_title(level: u8) -> &'static str {
  match level {
    0 => "Assignment Overview",
    1 => "Basic Understanding",
    2 => "Advanced Understanding",
    3 => "Practical Application",
    4 => "Expert Implementation",
    5 => "Mastery",
    _ => "Final Review",
  }
}

/// Questions and answers carried from the just-completed level into the next
/// level's request. Consumed once and not retained further.
#[derive(Clone, Debug, Default)]
pub struct PriorAssessment {
  pub questions: Vec<AssessmentQuestion>,
  pub answers: AnswerMap,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_tag_is_level_derived() {
    assert_eq!(level_status_tag(2), "LEVEL_2_OVERVIEW");
  }

  #[test]
  fn flashcard_accepts_wire_alias() {
    let card: Flashcard =
      serde_json::from_str(r#"{"heading":"H","flashcard_content":"C"}"#).unwrap();
    assert_eq!(card.content, "C");
    let card: Flashcard = serde_json::from_str(r#"{"heading":"H","content":"C"}"#).unwrap();
    assert_eq!(card.content, "C");
  }

  #[test]
  fn error_content_is_flagged() {
    let c = LevelContent::error("boom");
    assert!(c.is_error());
    assert_eq!(c.main_content, "boom");
    assert!(c.flashcards.is_empty() && c.assessment_questions.is_empty());
  }
}
