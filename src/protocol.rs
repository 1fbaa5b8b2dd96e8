//! HTTP wire types and the error -> status-code mapping.
//!
//! `SessionView`/`LevelView` are projections: the client sees only the
//! questions revealed so far, never the full list up front.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::config::loading_message;
use crate::domain::{level_title, AnswersDocument, AssessmentQuestion, Flashcard};
use crate::error::{ProgressError, SessionError};
use crate::files::RawUpload;
use crate::progress::{LevelSession, Mode, Operation, Phase};
use crate::session::SessionRecord;

#[derive(Debug, Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct AckOut {
  pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
  pub mode: Mode,
  pub files: Vec<RawUpload>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
  pub session_id: String,
  pub mode: Mode,
  pub assignment: String,
  pub resources: usize,
}

/// Body for session-scoped POSTs that need no other input.
#[derive(Debug, Deserialize)]
pub struct SessionRef {
  pub session_id: String,
}

/// Query string for session-scoped GETs.
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
  pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
  pub session_id: String,
  pub question_id: String,
  #[serde(default)]
  pub selection: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswersDocumentRequest {
  pub session_id: String,
  pub document: AnswersDocument,
}

#[derive(Debug, Deserialize)]
pub struct HintQuery {
  pub session_id: String,
  pub question_id: String,
}

#[derive(Debug, Serialize)]
pub struct HintResponse {
  pub question_id: String,
  pub hint: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PhaseResponse {
  pub phase: Phase,
  pub flashcard_index: usize,
}

/// One level as the client is allowed to see it.
#[derive(Debug, Serialize)]
pub struct LevelView {
  pub level: u8,
  pub title: &'static str,
  pub status: String,
  pub error: bool,
  pub main_content: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  pub assignment_summary: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  pub feedback: String,
  pub phase: Phase,
  pub flashcards: Vec<Flashcard>,
  pub flashcard_index: usize,
  /// Only the revealed prefix; later questions stay server-side.
  pub questions: Vec<AssessmentQuestion>,
  pub total_questions: usize,
  pub answered: usize,
  pub completed: bool,
}

impl LevelView {
  pub fn from_session(session: &LevelSession) -> Self {
    Self {
      level: session.level,
      title: level_title(session.level),
      status: session.content.status.clone(),
      error: session.content.is_error(),
      main_content: session.content.main_content.clone(),
      assignment_summary: session.content.assignment_summary.clone(),
      feedback: session.content.feedback.clone(),
      phase: session.phase,
      flashcards: session.content.flashcards.clone(),
      flashcard_index: session.flashcard_index,
      questions: session.visible_questions().to_vec(),
      total_questions: session.content.assessment_questions.len(),
      answered: session.answers.len(),
      completed: session.is_completed(),
    }
  }
}

/// The session as reported by GET /level: the current fetch slot plus the
/// installed level, if any.
#[derive(Debug, Serialize)]
pub struct SessionView {
  pub operation: Operation,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub loading: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub level: Option<LevelView>,
}

impl SessionView {
  pub fn from_record(record: &SessionRecord) -> Result<Self, SessionError> {
    let loading = match record.operation {
      Operation::Fetching { level } => Some(loading_message(level)),
      Operation::Idle => None,
    };
    let level = record.current.as_ref().map(LevelView::from_session);
    if level.is_none() && loading.is_none() {
      return Err(SessionError::NoLevelInstalled);
    }
    Ok(Self {
      operation: record.operation,
      loading,
      level,
    })
  }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
  error: String,
}

fn status_for(err: &SessionError) -> StatusCode {
  match err {
    SessionError::UnknownSession(_) => StatusCode::NOT_FOUND,
    SessionError::InvalidLevel(_) | SessionError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
    SessionError::NoLevelInstalled
    | SessionError::MissingAnswersDocument
    | SessionError::RequestInFlight => StatusCode::CONFLICT,
    SessionError::Progress(p) => match p {
      ProgressError::UnknownQuestion(_) => StatusCode::NOT_FOUND,
      ProgressError::InvalidSelection => StatusCode::BAD_REQUEST,
      _ => StatusCode::CONFLICT,
    },
  }
}

impl IntoResponse for SessionError {
  fn into_response(self) -> Response {
    let status = status_for(&self);
    (
      status,
      Json(ErrorBody {
        error: self.to_string(),
      }),
    )
      .into_response()
  }
}
