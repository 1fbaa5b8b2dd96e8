//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::levels::LevelEngine;
use crate::session::SessionStore;

pub struct AppState {
  pub sessions: SessionStore,
  pub engine: LevelEngine,
}

pub type SharedState = Arc<AppState>;

impl AppState {
  pub fn new(engine: LevelEngine) -> SharedState {
    Arc::new(Self {
      sessions: SessionStore::new(),
      engine,
    })
  }
}
