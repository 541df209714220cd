//! Organizer authorization middleware.
//!
//! Organizer commands (closing registration, deciding matches, ending the
//! tournament) are only accepted from callers presenting one of the
//! configured organizer roles in the `x-organizer-role` header. Several roles
//! may be given, comma separated.
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::post, middleware};
//! # use tourney_server::api::middleware::organizer_middleware;
//! # use tourney_server::api::AppState;
//! # async fn handler() {}
//! # let state: AppState = unimplemented!();
//!
//! let organizer_routes: Router<AppState> = Router::new()
//!     .route("/tournaments/{id}/end", post(handler))
//!     .layer(middleware::from_fn_with_state(state.clone(), organizer_middleware));
//! # let _ = organizer_routes;
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{AppState, tournaments::ApiError};
use crate::logging;

/// Header carrying the caller's roles
pub const ORGANIZER_ROLE_HEADER: &str = "x-organizer-role";

/// Roles listed in the organizer header, blanks dropped
fn roles_from_headers(headers: &axum::http::HeaderMap) -> Vec<&str> {
    headers
        .get_all(ORGANIZER_ROLE_HEADER)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .collect()
}

/// Organizer middleware that checks the caller's roles.
///
/// # Behavior
///
/// - **Organizer role present**: Calls next handler
/// - **Missing header or no matching role**: Returns `403 Forbidden`
/// - **No organizer roles configured**: Returns `503 Service Unavailable`
///   with the configuration error, so a missing binding never lets everyone through
pub async fn organizer_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let settings = state.manager.settings().await;
    let allowed = {
        let roles = roles_from_headers(request.headers());
        match settings.is_organizer(&roles) {
            Ok(true) => Ok(()),
            Ok(false) => {
                logging::log_organizer_denied(&path, &roles, "no organizer role");
                Err(ApiError::Forbidden)
            }
            Err(e) => {
                logging::log_organizer_denied(&path, &roles, &e.to_string());
                Err(ApiError::Engine(e.into()))
            }
        }
    };

    match allowed {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
