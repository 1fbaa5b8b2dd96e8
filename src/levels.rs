//! Level orchestration: the generate -> parse -> install pipeline plus the
//! between-level transitions.
//!
//! Transition rules enforced here:
//!   - at most one generation call in flight per session (`Operation` slot)
//!   - advancing requires the current level completed, below the mode ceiling,
//!     and not holding an error diagnostic (those are retried, not advanced)
//!   - the final review requires a stored answers document, checked before
//!     any network activity
//!   - the final-review request never carries the previous level's Q&A
//!   - provider failures fold into `"error"`-status content; only session
//!     preconditions surface as errors

use tracing::{info, instrument, warn};

use crate::config::{loading_message, LevelTemplates};
use crate::domain::{
  AnswersDocument, FileBundle, LevelContent, PriorAssessment, MAX_LEVEL,
};
use crate::error::{ProgressError, SessionError};
use crate::parse::parse_level_response;
use crate::progress::{LevelSession, Operation};
use crate::prompt::assemble_prompt;
use crate::provider::Provider;
use crate::session::SessionStore;

pub struct LevelEngine {
  provider: Box<dyn Provider>,
  templates: LevelTemplates,
}

impl LevelEngine {
  pub fn new(provider: Box<dyn Provider>, templates: LevelTemplates) -> Self {
    Self {
      provider,
      templates,
    }
  }

  /// One generation round trip. Never fails: provider and parse problems
  /// come back as `"error"`-status content for inline rendering.
  #[instrument(level = "info", skip_all, fields(level, backend = self.provider.name()))]
  async fn render(
    &self,
    level: u8,
    bundle: &FileBundle,
    prior: Option<&PriorAssessment>,
    answers_document: Option<&AnswersDocument>,
  ) -> LevelContent {
    let template = match self.templates.template_for(level as i64) {
      Ok(t) => t,
      // Levels are validated before the fetch slot is claimed; this is a
      // second line of defense only.
      Err(e) => return LevelContent::error(e.to_string()),
    };

    // The final review judges the submitted document, not the quiz history.
    let prior = if level == MAX_LEVEL { None } else { prior };

    let prompt = assemble_prompt(template, level, bundle, prior, answers_document);
    info!(
      target: "mastery_backend",
      level,
      status = loading_message(level),
      prompt_chars = prompt.text.len(),
      "Requesting level content"
    );

    match self.provider.generate(&prompt).await {
      Ok(raw) => parse_level_response(&raw, level),
      Err(e) => {
        warn!(target: "mastery_backend", level, error = %e, "Generation call failed");
        LevelContent::error(format!(
          "The {} backend request for level {} failed: {}.\n\nYou can retry this level.",
          self.provider.name(),
          level,
          e
        ))
      }
    }
  }

  /// Claim the session's fetch slot, run one generation, install the result.
  /// The store lock is never held across the network call.
  async fn fetch_into(
    &self,
    store: &SessionStore,
    session_id: &str,
    level: u8,
    prior: Option<PriorAssessment>,
  ) -> Result<LevelSession, SessionError> {
    let (bundle, answers_document) = store
      .with_mut(session_id, |s| {
        if s.operation != Operation::Idle {
          return Err(SessionError::RequestInFlight);
        }
        if level > s.mode.max_level() {
          return Err(ProgressError::CourseFinished.into());
        }
        // Final-review precondition, before any network activity.
        if s.mode.has_final_review()
          && level == s.mode.max_level()
          && s.answers_document.is_none()
        {
          return Err(SessionError::MissingAnswersDocument);
        }
        s.operation = Operation::Fetching { level };
        Ok((s.bundle.clone(), s.answers_document.clone()))
      })
      .await??;

    let content = self
      .render(level, &bundle, prior.as_ref(), answers_document.as_ref())
      .await;

    store
      .with_mut(session_id, |s| {
        let installed = LevelSession::install(level, content, s.mode);
        s.current = Some(installed.clone());
        s.last_prior = prior;
        s.operation = Operation::Idle;
        installed
      })
      .await
  }

  /// Fetch the next level: level 0 for a fresh session, otherwise the level
  /// after the (completed) current one, carrying its Q&A forward.
  #[instrument(level = "info", skip(self, store), fields(session = %session_id))]
  pub async fn advance(
    &self,
    store: &SessionStore,
    session_id: &str,
  ) -> Result<LevelSession, SessionError> {
    let (next, prior) = store
      .with(session_id, |s| match &s.current {
        None => Ok((0u8, None)),
        Some(current) => {
          if current.content.is_error() {
            return Err(SessionError::Progress(ProgressError::LevelInError));
          }
          if !current.is_completed() {
            return Err(ProgressError::NotCompleted.into());
          }
          if current.level >= s.mode.max_level() {
            return Err(ProgressError::CourseFinished.into());
          }
          let next = current.level + 1;
          let prior = PriorAssessment {
            questions: current.content.assessment_questions.clone(),
            answers: current.answers.clone(),
          };
          Ok((next, Some(prior)))
        }
      })
      .await??;
    self.fetch_into(store, session_id, next, prior).await
  }

  /// Re-issue the most recent fetch, reusing the Q&A payload it carried.
  /// Intended for error-status levels but valid for any installed level.
  #[instrument(level = "info", skip(self, store), fields(session = %session_id))]
  pub async fn retry(
    &self,
    store: &SessionStore,
    session_id: &str,
  ) -> Result<LevelSession, SessionError> {
    let (level, prior) = store
      .with(session_id, |s| {
        let level = s.current.as_ref().map(|c| c.level).unwrap_or(0);
        (level, s.last_prior.clone())
      })
      .await?;
    self.fetch_into(store, session_id, level, prior).await
  }
}
