//! Application state for API handlers

use pond_engine::CommandInterpreter;
use pond_storage::PondStorage;
use std::sync::Arc;
use std::time::Duration;

/// Interpreter over whichever storage backend was configured.
pub type Interpreter = CommandInterpreter<dyn PondStorage>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Command interpreter
    pub interpreter: Arc<Interpreter>,

    /// Time budget for one webhook request
    pub request_timeout: Duration,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(interpreter: Arc<Interpreter>, request_timeout: Duration) -> Self {
        Self {
            interpreter,
            request_timeout,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let secs = (chrono::Utc::now() - self.started_at).num_seconds().max(0);
        let (days, hours, minutes, seconds) =
            (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60, secs % 60);
        if days > 0 {
            format!("{days}d {hours}h {minutes}m {seconds}s")
        } else if hours > 0 {
            format!("{hours}h {minutes}m {seconds}s")
        } else if minutes > 0 {
            format!("{minutes}m {seconds}s")
        } else {
            format!("{seconds}s")
        }
    }
}
