//! Session store: one record per learner session, keyed by a generated id,
//! behind a shared async lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{AnswersDocument, FileBundle, PriorAssessment};
use crate::error::SessionError;
use crate::progress::{LevelSession, Mode, Operation};

/// Everything the server keeps for one learner session.
#[derive(Clone, Debug)]
pub struct SessionRecord {
  pub mode: Mode,
  pub bundle: FileBundle,
  /// The learner's submitted work; required before the final review level.
  pub answers_document: Option<AnswersDocument>,
  /// The installed content for the current level, if any fetch completed.
  pub current: Option<LevelSession>,
  /// The single fetch slot for this session.
  pub operation: Operation,
  /// The prior-assessment payload used for the most recent fetch, retained
  /// so an explicit retry can re-issue the same request.
  pub last_prior: Option<PriorAssessment>,
}

impl SessionRecord {
  fn new(mode: Mode, bundle: FileBundle) -> Self {
    Self {
      mode,
      bundle,
      answers_document: None,
      current: None,
      operation: Operation::Idle,
      last_prior: None,
    }
  }
}

/// Shared map of live sessions.
#[derive(Clone, Default)]
pub struct SessionStore {
  inner: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl SessionStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a session from an uploaded bundle and return its id.
  #[instrument(level = "info", skip(self, bundle), fields(?mode))]
  pub async fn create(&self, mode: Mode, bundle: FileBundle) -> String {
    let id = Uuid::new_v4().to_string();
    let mut sessions = self.inner.write().await;
    sessions.insert(id.clone(), SessionRecord::new(mode, bundle));
    info!(target: "mastery_backend", session = %id, total = sessions.len(), "Session created");
    id
  }

  /// Read access to one session.
  pub async fn with<T>(
    &self,
    id: &str,
    f: impl FnOnce(&SessionRecord) -> T,
  ) -> Result<T, SessionError> {
    let sessions = self.inner.read().await;
    let record = sessions
      .get(id)
      .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
    Ok(f(record))
  }

  /// Write access to one session. The lock is held only for the closure;
  /// never call this around an await point.
  pub async fn with_mut<T>(
    &self,
    id: &str,
    f: impl FnOnce(&mut SessionRecord) -> T,
  ) -> Result<T, SessionError> {
    let mut sessions = self.inner.write().await;
    let record = sessions
      .get_mut(id)
      .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
    Ok(f(record))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{FileAsset, FileEncoding};

  fn bundle() -> FileBundle {
    FileBundle {
      assignment: FileAsset {
        name: "a.txt".into(),
        content: "task".into(),
        encoding: FileEncoding::Text,
      },
      resources: vec![],
    }
  }

  #[tokio::test]
  async fn sessions_are_isolated_by_id() {
    let store = SessionStore::new();
    let a = store.create(Mode::MasterIt, bundle()).await;
    let b = store.create(Mode::QuickStart, bundle()).await;
    assert_ne!(a, b);

    let mode_a = store.with(&a, |s| s.mode).await.unwrap();
    let mode_b = store.with(&b, |s| s.mode).await.unwrap();
    assert_eq!(mode_a, Mode::MasterIt);
    assert_eq!(mode_b, Mode::QuickStart);
  }

  #[tokio::test]
  async fn unknown_session_is_an_error() {
    let store = SessionStore::new();
    assert!(matches!(
      store.with("nope", |_| ()).await,
      Err(SessionError::UnknownSession(_))
    ));
    assert!(matches!(
      store.with_mut("nope", |_| ()).await,
      Err(SessionError::UnknownSession(_))
    ));
  }

  #[tokio::test]
  async fn mutation_persists() {
    let store = SessionStore::new();
    let id = store.create(Mode::MasterIt, bundle()).await;
    store
      .with_mut(&id, |s| s.operation = Operation::Fetching { level: 0 })
      .await
      .unwrap();
    let op = store.with(&id, |s| s.operation).await.unwrap();
    assert_eq!(op, Operation::Fetching { level: 0 });
  }
}
