//! Structured logging configuration.
//!
//! The engine logs through the `log` facade; the subscriber installed here
//! picks those records up alongside the server's own `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use tourney_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log an organizer command that was refused
///
/// # Arguments
///
/// * `path` - Request path
/// * `roles` - Roles presented by the caller
/// * `reason` - Why the command was refused
pub fn log_organizer_denied(path: &str, roles: &[&str], reason: &str) {
    tracing::warn!(
        http_path = path,
        roles = ?roles,
        "ORGANIZER: command refused: {}",
        reason
    );
}

/// Log an accepted organizer command
pub fn log_organizer_command(command: &str, tournament_id: &str, request_id: &str) {
    tracing::info!(
        command = command,
        tournament_id = tournament_id,
        request_id = request_id,
        "Organizer command applied"
    );
}

/// Log an organizer change to the engine settings
pub fn log_settings_change(setting: &str, request_id: &str) {
    tracing::info!(
        setting = setting,
        request_id = request_id,
        "Engine settings changed"
    );
}

/// Log API request/response
///
/// # Arguments
///
/// * `method` - HTTP method
/// * `path` - Request path
/// * `status_code` - Response status code
/// * `duration_ms` - Request duration in milliseconds
pub fn log_api_request(method: &str, path: &str, status_code: u16, duration_ms: u64) {
    if duration_ms > 1000 {
        tracing::warn!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "PERFORMANCE: Slow request"
        );
    } else {
        tracing::debug!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "API request completed"
        );
    }
}
