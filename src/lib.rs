//! Records landing page waitlist signups in a Google Sheet, next to a small
//! status-check API backed by Postgres.

pub mod app;
pub mod config;
pub mod database;
mod error;
pub mod sheets;
pub mod web;

// re-exports
pub use app::{App, AppState};
pub use error::{Error, Result};
pub use sheets::SignupSink;
pub use web::serve;

use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Compact, human readable logs for local development.
pub fn init_dbg_tracing() {
    tracing_subscriber::fmt()
        .without_time()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .compact()
        .init();
}

/// JSON logs for production, one object per line.
pub fn init_production_tracing() {
    tracing_subscriber::fmt()
        .json()
        .with_current_span(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
