//! HTTP endpoint handlers. These are thin wrappers that forward to the
//! session store and the level engine; all gating decisions live below them.

use axum::{
  extract::{Query, State},
  Json,
};
use tracing::{info, instrument};

use crate::error::{ProgressError, SessionError};
use crate::files::build_bundle;
use crate::progress::hint_for;
use crate::protocol::*;
use crate::state::SharedState;

#[instrument(level = "info")]
pub async fn http_health() -> Json<HealthOut> {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body), fields(?body.mode, files = body.files.len()))]
pub async fn http_post_upload(
  State(state): State<SharedState>,
  Json(body): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, SessionError> {
  let bundle = build_bundle(body.files)?;
  let assignment = bundle.assignment.name.clone();
  let resources = bundle.resources.len();
  let session_id = state.sessions.create(body.mode, bundle).await;
  info!(target: "mastery_backend", session = %session_id, %assignment, resources, "Upload accepted");
  Ok(Json(UploadResponse {
    session_id,
    mode: body.mode,
    assignment,
    resources,
  }))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_post_start(
  State(state): State<SharedState>,
  Json(body): Json<SessionRef>,
) -> Result<Json<LevelView>, SessionError> {
  let installed = state.engine.advance(&state.sessions, &body.session_id).await?;
  info!(target: "mastery_backend", session = %body.session_id, level = installed.level, "Course started");
  Ok(Json(LevelView::from_session(&installed)))
}

#[instrument(level = "info", skip(state), fields(session = %q.session_id))]
pub async fn http_get_level(
  State(state): State<SharedState>,
  Query(q): Query<SessionQuery>,
) -> Result<Json<SessionView>, SessionError> {
  let view = state
    .sessions
    .with(&q.session_id, SessionView::from_record)
    .await??;
  Ok(Json(view))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_post_phase_advance(
  State(state): State<SharedState>,
  Json(body): Json<SessionRef>,
) -> Result<Json<PhaseResponse>, SessionError> {
  let response = state
    .sessions
    .with_mut(&body.session_id, |s| {
      let current = s.current.as_mut().ok_or(SessionError::NoLevelInstalled)?;
      let phase = current.advance_phase()?;
      Ok::<_, SessionError>(PhaseResponse {
        phase,
        flashcard_index: current.flashcard_index,
      })
    })
    .await??;
  Ok(Json(response))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_post_flashcard_next(
  State(state): State<SharedState>,
  Json(body): Json<SessionRef>,
) -> Result<Json<PhaseResponse>, SessionError> {
  let response = state
    .sessions
    .with_mut(&body.session_id, |s| {
      let current = s.current.as_mut().ok_or(SessionError::NoLevelInstalled)?;
      let phase = current.flashcard_next()?;
      Ok::<_, SessionError>(PhaseResponse {
        phase,
        flashcard_index: current.flashcard_index,
      })
    })
    .await??;
  Ok(Json(response))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_post_flashcard_prev(
  State(state): State<SharedState>,
  Json(body): Json<SessionRef>,
) -> Result<Json<PhaseResponse>, SessionError> {
  let response = state
    .sessions
    .with_mut(&body.session_id, |s| {
      let current = s.current.as_mut().ok_or(SessionError::NoLevelInstalled)?;
      let flashcard_index = current.flashcard_prev()?;
      Ok::<_, SessionError>(PhaseResponse {
        phase: current.phase,
        flashcard_index,
      })
    })
    .await??;
  Ok(Json(response))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id, question = %body.question_id, picked = body.selection.len()))]
pub async fn http_post_answer(
  State(state): State<SharedState>,
  Json(body): Json<AnswerRequest>,
) -> Result<Json<LevelView>, SessionError> {
  let AnswerRequest {
    session_id,
    question_id,
    selection,
  } = body;
  let view = state
    .sessions
    .with_mut(&session_id, |s| {
      let current = s.current.as_mut().ok_or(SessionError::NoLevelInstalled)?;
      current.record_answer(&question_id, selection)?;
      Ok::<_, SessionError>(LevelView::from_session(current))
    })
    .await??;
  info!(target: "progress", session = %session_id, question = %question_id, "Answer recorded");
  Ok(Json(view))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_post_submit(
  State(state): State<SharedState>,
  Json(body): Json<SessionRef>,
) -> Result<Json<LevelView>, SessionError> {
  let installed = state.engine.advance(&state.sessions, &body.session_id).await?;
  info!(target: "mastery_backend", session = %body.session_id, level = installed.level, "Advanced to next level");
  Ok(Json(LevelView::from_session(&installed)))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id))]
pub async fn http_post_retry(
  State(state): State<SharedState>,
  Json(body): Json<SessionRef>,
) -> Result<Json<LevelView>, SessionError> {
  let installed = state.engine.retry(&state.sessions, &body.session_id).await?;
  info!(target: "mastery_backend", session = %body.session_id, level = installed.level, "Level refetched");
  Ok(Json(LevelView::from_session(&installed)))
}

#[instrument(level = "info", skip(state, body), fields(session = %body.session_id, doc = %body.document.name))]
pub async fn http_post_answers_document(
  State(state): State<SharedState>,
  Json(body): Json<AnswersDocumentRequest>,
) -> Result<Json<AckOut>, SessionError> {
  if body.document.content.trim().is_empty() {
    return Err(SessionError::InvalidUpload(
      "answers document content is empty".into(),
    ));
  }
  state
    .sessions
    .with_mut(&body.session_id, |s| {
      s.answers_document = Some(body.document.clone());
    })
    .await?;
  info!(target: "mastery_backend", session = %body.session_id, "Answers document stored");
  Ok(Json(AckOut { ok: true }))
}

#[instrument(level = "info", skip(state), fields(session = %q.session_id, question = %q.question_id))]
pub async fn http_get_hint(
  State(state): State<SharedState>,
  Query(q): Query<HintQuery>,
) -> Result<Json<HintResponse>, SessionError> {
  let hint = state
    .sessions
    .with(&q.session_id, |s| {
      let current = s.current.as_ref().ok_or(SessionError::NoLevelInstalled)?;
      let question = current
        .content
        .assessment_questions
        .iter()
        .find(|question| question.id == q.question_id)
        .ok_or_else(|| ProgressError::UnknownQuestion(q.question_id.clone()))?;
      // Hints are only handed out for questions the learner can see.
      if !current.visible_questions().iter().any(|v| v.id == question.id) {
        return Err(ProgressError::QuestionHidden(q.question_id.clone()).into());
      }
      Ok::<_, SessionError>(hint_for(question))
    })
    .await??;
  Ok(Json(HintResponse {
    question_id: q.question_id,
    hint,
  }))
}
