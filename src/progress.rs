//! Within-level progression: reading -> flashcards -> questions -> completed,
//! with sequential question reveal and answer recording rules.
//!
//! The rules encoded here:
//!   - question i+1 stays hidden until question i has a recorded answer
//!   - an MCQ answer is recorded once, with exactly one selected option
//!   - an MAQ answer may be re-recorded freely, including an empty selection
//!     (recording an empty selection still counts the question as answered)
//!   - the final-review level is reading-only; its cards/questions/feedback
//!     are stripped at install time
//!   - error-status content installs like any other content and sits in the
//!     reading phase with nothing to advance to except completion

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::domain::{AnswerMap, AssessmentQuestion, LevelContent, QuestionType};
use crate::error::ProgressError;

/// Study mode: same machinery, different level ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
  /// Full progression through level 6 (final review of submitted work).
  MasterIt,
  /// Condensed progression, levels 0-3.
  LearnFast,
  /// Orientation only, levels 0-1.
  QuickStart,
}

impl Mode {
  pub fn max_level(self) -> u8 {
    match self {
      Mode::MasterIt => 6,
      Mode::LearnFast => 3,
      Mode::QuickStart => 1,
    }
  }

  /// Only the full mode ends in the reading-only review of submitted work.
  pub fn has_final_review(self) -> bool {
    self == Mode::MasterIt
  }
}

/// Where the learner is inside the current level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Reading,
  Flashcards,
  Questions,
  Completed,
}

impl Phase {
  fn name(self) -> &'static str {
    match self {
      Phase::Reading => "reading",
      Phase::Flashcards => "flashcards",
      Phase::Questions => "questions",
      Phase::Completed => "completed",
    }
  }
}

/// The single fetch slot. At most one generation call is pending per session;
/// everything else is idle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Operation {
  Idle,
  Fetching { level: u8 },
}

/// One level's installed content plus the learner's position within it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelSession {
  pub level: u8,
  pub content: LevelContent,
  pub phase: Phase,
  pub flashcard_index: usize,
  pub answers: AnswerMap,
}

impl LevelSession {
  /// Install freshly parsed content. The full mode's final level is a
  /// reading-only review, so interactive material is stripped before it can
  /// leak into the phase machine.
  #[instrument(level = "info", skip(content), fields(level, status = %content.status))]
  pub fn install(level: u8, mut content: LevelContent, mode: Mode) -> Self {
    if mode.has_final_review() && level == mode.max_level() {
      content.flashcards.clear();
      content.assessment_questions.clear();
      content.feedback.clear();
    }
    info!(
      target: "progress",
      level,
      flashcards = content.flashcards.len(),
      questions = content.assessment_questions.len(),
      error = content.is_error(),
      "Level content installed"
    );
    Self {
      level,
      content,
      phase: Phase::Reading,
      flashcard_index: 0,
      answers: AnswerMap::new(),
    }
  }

  fn question(&self, id: &str) -> Result<(usize, &AssessmentQuestion), ProgressError> {
    self
      .content
      .assessment_questions
      .iter()
      .enumerate()
      .find(|(_, q)| q.id == id)
      .ok_or_else(|| ProgressError::UnknownQuestion(id.to_string()))
  }

  fn is_answered(&self, q: &AssessmentQuestion) -> bool {
    self.answers.contains_key(&q.id)
  }

  /// Questions revealed so far: the prefix of answered questions plus the
  /// first unanswered one.
  pub fn visible_questions(&self) -> &[AssessmentQuestion] {
    let qs = &self.content.assessment_questions;
    let mut visible = 0;
    for q in qs {
      visible += 1;
      if !self.is_answered(q) {
        break;
      }
    }
    &qs[..visible]
  }

  pub fn all_answered(&self) -> bool {
    self
      .content
      .assessment_questions
      .iter()
      .all(|q| self.is_answered(q))
  }

  /// Record the learner's selection for one question.
  #[instrument(level = "debug", skip(self, selection), fields(level = self.level, id, picked = selection.len()))]
  pub fn record_answer(
    &mut self,
    id: &str,
    selection: Vec<String>,
  ) -> Result<(), ProgressError> {
    if self.phase != Phase::Questions {
      return Err(ProgressError::WrongPhase(self.phase.name()));
    }
    let (index, question) = self.question(id)?;

    // Sequential reveal: every preceding question must already be answered.
    let hidden = self.content.assessment_questions[..index]
      .iter()
      .any(|q| !self.is_answered(q));
    if hidden {
      return Err(ProgressError::QuestionHidden(id.to_string()));
    }

    if selection
      .iter()
      .any(|choice| !question.options.contains(choice))
    {
      return Err(ProgressError::InvalidSelection);
    }

    match question.question_type {
      QuestionType::Mcq => {
        if self.is_answered(question) {
          return Err(ProgressError::AlreadyAnswered(id.to_string()));
        }
        if selection.len() != 1 {
          return Err(ProgressError::InvalidSelection);
        }
      }
      QuestionType::Maq => {
        // Re-recordable; an empty selection is a valid, final-for-now answer.
      }
    }

    self.answers.insert(id.to_string(), selection);
    debug!(target: "progress", id, answered = self.answers.len(), "Answer recorded");
    Ok(())
  }

  /// Move to the next phase. Empty sections are skipped; leaving the
  /// questions phase requires every question answered.
  #[instrument(level = "info", skip(self), fields(level = self.level, from = self.phase.name()))]
  pub fn advance_phase(&mut self) -> Result<Phase, ProgressError> {
    let next = match self.phase {
      Phase::Reading => {
        if !self.content.flashcards.is_empty() {
          Phase::Flashcards
        } else if !self.content.assessment_questions.is_empty() {
          Phase::Questions
        } else {
          Phase::Completed
        }
      }
      Phase::Flashcards => {
        if !self.content.assessment_questions.is_empty() {
          Phase::Questions
        } else {
          Phase::Completed
        }
      }
      Phase::Questions => {
        if !self.all_answered() {
          return Err(ProgressError::NotCompleted);
        }
        Phase::Completed
      }
      Phase::Completed => return Err(ProgressError::WrongPhase("completed")),
    };
    info!(target: "progress", to = next.name(), "Phase advanced");
    self.phase = next;
    Ok(next)
  }

  /// Step forward through the flashcards. Stepping past the last card
  /// advances the phase instead.
  pub fn flashcard_next(&mut self) -> Result<Phase, ProgressError> {
    if self.phase != Phase::Flashcards {
      return Err(ProgressError::WrongPhase(self.phase.name()));
    }
    if self.flashcard_index + 1 < self.content.flashcards.len() {
      self.flashcard_index += 1;
      Ok(Phase::Flashcards)
    } else {
      self.advance_phase()
    }
  }

  /// Step backward; stays on the first card rather than wrapping.
  pub fn flashcard_prev(&mut self) -> Result<usize, ProgressError> {
    if self.phase != Phase::Flashcards {
      return Err(ProgressError::WrongPhase(self.phase.name()));
    }
    self.flashcard_index = self.flashcard_index.saturating_sub(1);
    Ok(self.flashcard_index)
  }

  pub fn is_completed(&self) -> bool {
    self.phase == Phase::Completed
  }
}

const MCQ_HINTS: [&str; 4] = [
  "Eliminate the options that contradict the main content first.",
  "Re-read the section of the material this concept came from.",
  "Only one option is fully consistent with the definitions given.",
  "Watch for an option that is true in general but not for this assignment.",
];

const MAQ_HINTS: [&str; 4] = [
  "More than one option may apply; judge each one on its own.",
  "Check every option against the material; do not stop at the first match.",
  "Some options are partially right; select only the fully correct ones.",
  "An empty selection is allowed, but make sure nothing applies first.",
];

/// Deterministic hint for a question: the id's character codes pick a hint
/// from the pool for the question's type. Same question, same hint, always.
pub fn hint_for(question: &AssessmentQuestion) -> &'static str {
  let sum: u32 = question.id.chars().map(|c| c as u32).sum();
  let pool = match question.question_type {
    QuestionType::Mcq => &MCQ_HINTS,
    QuestionType::Maq => &MAQ_HINTS,
  };
  pool[(sum % pool.len() as u32) as usize]
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Flashcard;

  fn mcq(id: &str) -> AssessmentQuestion {
    AssessmentQuestion {
      id: id.into(),
      concept_focus: "focus".into(),
      question_type: QuestionType::Mcq,
      question_text: "Pick one".into(),
      options: vec!["a".into(), "b".into(), "c".into()],
      correct_answers: vec!["a".into()],
    }
  }

  fn maq(id: &str) -> AssessmentQuestion {
    AssessmentQuestion {
      question_type: QuestionType::Maq,
      correct_answers: vec!["a".into(), "b".into()],
      ..mcq(id)
    }
  }

  fn content(cards: usize, questions: Vec<AssessmentQuestion>) -> LevelContent {
    LevelContent {
      status: "LEVEL_1_OVERVIEW".into(),
      main_content: "material".into(),
      assignment_summary: String::new(),
      feedback: String::new(),
      flashcards: (0..cards)
        .map(|i| Flashcard {
          heading: format!("card {}", i),
          content: "body".into(),
        })
        .collect(),
      assessment_questions: questions,
    }
  }

  fn in_questions(questions: Vec<AssessmentQuestion>) -> LevelSession {
    let mut s = LevelSession::install(1, content(0, questions), Mode::MasterIt);
    s.advance_phase().unwrap();
    s
  }

  #[test]
  fn sequential_reveal_blocks_later_questions() {
    let mut s = in_questions(vec![mcq("q1"), mcq("q2"), mcq("q3")]);
    assert_eq!(s.visible_questions().len(), 1);

    // q2 before q1 is rejected, q3 is not exposed, phase unchanged.
    assert!(matches!(
      s.record_answer("q2", vec!["a".into()]),
      Err(ProgressError::QuestionHidden(_))
    ));
    assert_eq!(s.visible_questions().len(), 1);
    assert_eq!(s.phase, Phase::Questions);

    s.record_answer("q1", vec!["a".into()]).unwrap();
    assert_eq!(s.visible_questions().len(), 2);
    s.record_answer("q2", vec!["b".into()]).unwrap();
    assert_eq!(s.visible_questions().len(), 3);
  }

  #[test]
  fn mcq_is_recorded_once_with_exactly_one_option() {
    let mut s = in_questions(vec![mcq("q1")]);
    assert!(matches!(
      s.record_answer("q1", vec![]),
      Err(ProgressError::InvalidSelection)
    ));
    assert!(matches!(
      s.record_answer("q1", vec!["a".into(), "b".into()]),
      Err(ProgressError::InvalidSelection)
    ));
    s.record_answer("q1", vec!["a".into()]).unwrap();
    assert!(matches!(
      s.record_answer("q1", vec!["b".into()]),
      Err(ProgressError::AlreadyAnswered(_))
    ));
    assert_eq!(s.answers.get("q1").unwrap(), &vec!["a".to_string()]);
  }

  #[test]
  fn maq_allows_empty_selection_and_rerecording() {
    let mut s = in_questions(vec![maq("q1")]);
    s.record_answer("q1", vec![]).unwrap();
    assert!(s.all_answered());
    s.record_answer("q1", vec!["a".into(), "c".into()]).unwrap();
    assert_eq!(
      s.answers.get("q1").unwrap(),
      &vec!["a".to_string(), "c".to_string()]
    );
  }

  #[test]
  fn selections_must_come_from_the_options() {
    let mut s = in_questions(vec![mcq("q1")]);
    assert!(matches!(
      s.record_answer("q1", vec!["not an option".into()]),
      Err(ProgressError::InvalidSelection)
    ));
  }

  #[test]
  fn unknown_question_is_rejected() {
    let mut s = in_questions(vec![mcq("q1")]);
    assert!(matches!(
      s.record_answer("zz", vec!["a".into()]),
      Err(ProgressError::UnknownQuestion(_))
    ));
  }

  #[test]
  fn phases_skip_empty_sections() {
    let mut s = LevelSession::install(1, content(0, vec![]), Mode::MasterIt);
    assert_eq!(s.advance_phase().unwrap(), Phase::Completed);

    let mut s = LevelSession::install(1, content(2, vec![]), Mode::MasterIt);
    assert_eq!(s.advance_phase().unwrap(), Phase::Flashcards);
    assert_eq!(s.advance_phase().unwrap(), Phase::Completed);
  }

  #[test]
  fn questions_phase_requires_all_answers_to_leave() {
    let mut s = in_questions(vec![mcq("q1"), mcq("q2")]);
    assert!(matches!(s.advance_phase(), Err(ProgressError::NotCompleted)));
    s.record_answer("q1", vec!["a".into()]).unwrap();
    s.record_answer("q2", vec!["b".into()]).unwrap();
    assert_eq!(s.advance_phase().unwrap(), Phase::Completed);
    assert!(matches!(s.advance_phase(), Err(ProgressError::WrongPhase(_))));
  }

  #[test]
  fn flashcard_navigation_is_bounded_and_advances_at_the_end() {
    let mut s = LevelSession::install(1, content(2, vec![mcq("q1")]), Mode::MasterIt);
    s.advance_phase().unwrap();
    assert_eq!(s.phase, Phase::Flashcards);

    // prev at the first card stays put
    assert_eq!(s.flashcard_prev().unwrap(), 0);
    assert_eq!(s.flashcard_next().unwrap(), Phase::Flashcards);
    assert_eq!(s.flashcard_index, 1);
    // next past the last card moves on to the questions
    assert_eq!(s.flashcard_next().unwrap(), Phase::Questions);
  }

  #[test]
  fn flashcard_navigation_outside_its_phase_is_rejected() {
    let mut s = LevelSession::install(1, content(2, vec![]), Mode::MasterIt);
    assert!(matches!(s.flashcard_next(), Err(ProgressError::WrongPhase(_))));
    assert!(matches!(s.flashcard_prev(), Err(ProgressError::WrongPhase(_))));
  }

  #[test]
  fn final_review_level_is_stripped_to_reading_only() {
    let c = content(3, vec![mcq("q1")]);
    let mut s = LevelSession::install(6, c.clone(), Mode::MasterIt);
    assert!(s.content.flashcards.is_empty());
    assert!(s.content.assessment_questions.is_empty());
    assert_eq!(s.advance_phase().unwrap(), Phase::Completed);

    // Other modes never strip: their ceiling is a normal level.
    let s = LevelSession::install(3, c.clone(), Mode::LearnFast);
    assert_eq!(s.content.flashcards.len(), 3);
    let s = LevelSession::install(1, c, Mode::QuickStart);
    assert_eq!(s.content.assessment_questions.len(), 1);
  }

  #[test]
  fn error_content_installs_and_completes_without_interaction() {
    let mut s = LevelSession::install(
      2,
      LevelContent::error("backend unavailable"),
      Mode::MasterIt,
    );
    assert_eq!(s.phase, Phase::Reading);
    assert!(s.content.is_error());
    assert_eq!(s.advance_phase().unwrap(), Phase::Completed);
  }

  #[test]
  fn hints_are_deterministic_and_type_specific() {
    let q = mcq("q2-1");
    assert_eq!(hint_for(&q), hint_for(&q));
    assert!(MCQ_HINTS.contains(&hint_for(&q)));
    assert!(MAQ_HINTS.contains(&hint_for(&maq("q2-1"))));

    // Different ids may map to different pool entries.
    let sum: u32 = "q2-1".chars().map(|c| c as u32).sum();
    assert_eq!(hint_for(&mcq("q2-1")), MCQ_HINTS[(sum % 4) as usize]);
  }
}
