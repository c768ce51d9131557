//! Environment-driven runtime configuration.

use std::env;

/// Fallback listen port when `PORT`/`SERVER_PORT` are unset or unparsable.
const DEFAULT_PORT: u16 = 8080;
/// Voting window applied when a create request omits the duration.
pub const DEFAULT_POLL_DURATION_SECS: i64 = 60;
/// Default HTTP history page size.
pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
/// History page size served over the realtime channel.
pub const SOCKET_HISTORY_LIMIT: i64 = 20;
/// Upper bound on the student roster returned to teachers.
pub const STUDENT_LIST_LIMIT: i64 = 100;

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Postgres connection string, absent when running storage-free.
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Load the configuration from environment variables.
    pub fn load() -> Self {
        let port = env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let database_url = env::var("DATABASE_URL").ok();

        Self { port, database_url }
    }
}
