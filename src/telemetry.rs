//! Tracing setup.
//!
//! `LOG_LEVEL` takes a tracing filter ("debug", or full directives per
//! target); `LOG_FORMAT=json` switches to structured output for log
//! shippers. The per-request HTTP spans come from the router's TraceLayer;
//! this configures everything underneath.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str =
  "info,progress=debug,mastery_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
  let filter =
    EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));

  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_file(true)
    .with_line_number(true);

  if json {
    builder.json().init();
  } else {
    builder.init();
  }
}
