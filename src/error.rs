//! Error taxonomy.
//!
//! Two propagation paths exist and they are deliberately different:
//!   - Provider and parse failures are representable as content: callers fold
//!     them into an `"error"`-status `LevelContent` so the UI renders the
//!     diagnostic in the normal content slot with a retry affordance.
//!   - Precondition and gating failures (`SessionError`) are not representable
//!     as content and are returned to the caller, which must navigate
//!     (e.g. redirect back to upload, or back to level 5).

use thiserror::Error;

/// Failure of a single generation call against a concrete backend.
/// Adapters never panic past their boundary; every outcome is one of these.
#[derive(Debug, Error)]
pub enum ProviderError {
  /// The API credential for the selected backend is empty or missing.
  /// Detected before any network call is made.
  #[error("configuration error: {0} API key is missing")]
  Configuration(&'static str),

  /// The request never produced an HTTP response.
  #[error("network error calling {endpoint}: {source}")]
  Network {
    endpoint: String,
    #[source]
    source: reqwest::Error,
  },

  /// Non-2xx response; `message` is the best-available provider error text.
  #[error("provider returned HTTP {status}: {message}")]
  Http { status: u16, message: String },

  /// A 2xx response with no usable text content.
  #[error("provider returned an empty response")]
  EmptyResponse,
}

/// Internal outcome of the parser chain. Never escapes `parse.rs`: the public
/// entry point folds it into an `"error"`-status `LevelContent`.
#[derive(Debug, Error)]
pub enum ParseFailure {
  #[error("no usable content could be extracted from the response")]
  NoUsableContent,
}

/// A within-level gating violation. These are caller mistakes (or UI races),
/// not pipeline failures.
#[derive(Debug, Error)]
pub enum ProgressError {
  #[error("unknown question id: {0}")]
  UnknownQuestion(String),

  /// Sequential MCQ gating: the preceding question has no recorded answer yet.
  #[error("question {0} is not yet revealed")]
  QuestionHidden(String),

  /// MCQ answers are recorded once; MAQ answers may be re-recorded freely.
  #[error("question {0} already has a recorded answer")]
  AlreadyAnswered(String),

  #[error("an MCQ answer must select exactly one option")]
  InvalidSelection,

  #[error("operation not valid in phase {0}")]
  WrongPhase(&'static str),

  #[error("not all questions have been answered yet")]
  NotCompleted,

  /// The current level holds an error diagnostic instead of material; it can
  /// be retried but not advanced past.
  #[error("the current level failed to load; retry it instead of advancing")]
  LevelInError,

  /// The final level of the active mode has been reached; there is nothing
  /// left to advance to.
  #[error("the course is finished; no further level exists")]
  CourseFinished,
}

/// Session-level precondition failures. Thrown to the caller since they
/// require navigation, not inline rendering.
#[derive(Debug, Error)]
pub enum SessionError {
  #[error("invalid level {0}: must be between 0 and 6")]
  InvalidLevel(i64),

  #[error("no level content has been fetched for this session yet")]
  NoLevelInstalled,

  #[error("no answers document has been stored; level 6 requires one")]
  MissingAnswersDocument,

  #[error("unknown session id: {0}")]
  UnknownSession(String),

  /// At-most-one-in-flight guarantee: a generation call is already pending
  /// for this session.
  #[error("a generation request is already in flight for this session")]
  RequestInFlight,

  #[error("invalid upload: {0}")]
  InvalidUpload(String),

  #[error(transparent)]
  Progress(#[from] ProgressError),
}
