//! HTTP API for the tournament server.
//!
//! Exposes the registration surface, the organizer command surface and the
//! inbound play events of the bracket engine.
//!
//! # Modules
//!
//! - [`tournaments`]: Tournament, registration, match and vote handlers
//! - [`middleware`]: Organizer role check for organizer commands
//! - [`settings`]: Runtime changes to channel bindings and organizer roles
//! - [`request_id`]: Request correlation and request metrics
//!
//! # Endpoints Overview
//!
//! Every `{id}` accepts `current` as an alias for the current tournament.
//!
//! ## Public
//! - `GET /health` - Server health status
//! - `GET /api/v1/tournaments` - List tournaments
//! - `GET /api/v1/tournaments/{id}` - Bracket snapshot
//! - `POST /api/v1/tournaments/{id}/participants` - Register
//! - `DELETE /api/v1/tournaments/{id}/participants/{participant_id}` - Unregister
//! - `POST /api/v1/tournaments/{id}/matches/{match_id}/posts` - Participant post
//! - `POST /api/v1/tournaments/{id}/channels/{channel_id}/posts` - Post in a battle channel
//! - `POST /api/v1/tournaments/{id}/matches/{match_id}/votes` - Cast a vote
//!
//! ## Organizer (`x-organizer-role` header)
//! - `POST /api/v1/tournaments` - Create a tournament
//! - `POST /api/v1/tournaments/{id}/current` - Make a tournament current
//! - `POST /api/v1/tournaments/{id}/registration/open` - Announce open registration
//! - `POST /api/v1/tournaments/{id}/registration/close` - Build the bracket
//! - `POST /api/v1/tournaments/{id}/rounds/{round_index}/fixtures` - Assign battle channels
//! - `POST /api/v1/tournaments/{id}/matches/{match_id}/vote` - Open a vote window
//! - `POST /api/v1/tournaments/{id}/matches/{match_id}/end` - Decide a match
//! - `POST /api/v1/tournaments/{id}/end` - End the tournament
//! - `GET /api/v1/settings` - Engine settings
//! - `PUT /api/v1/settings/battle-channels` - Replace battle channels
//! - `PUT /api/v1/settings/organizer-roles` - Replace organizer roles
//! - `PUT /api/v1/settings/channels/{name}` - Rebind a named channel
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tourney::{InMemoryStore, TournamentManager, lifecycle::EngineSettings};
//! use tourney_server::api::{AppState, create_router};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let manager = TournamentManager::new(Arc::new(InMemoryStore::new()), EngineSettings::default())?;
//! let state = AppState {
//!     manager: Arc::new(manager),
//!     organizer_routes: true,
//! };
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod middleware;
pub mod request_id;
pub mod settings;
pub mod tournaments;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
};
use serde_json::json;
use std::sync::Arc;
use tourney::TournamentManager;
use tower_http::cors::CorsLayer;

use crate::metrics;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request (cheap due to the Arc wrapper).
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<TournamentManager>,
    /// Mount the organizer command routes
    pub organizer_routes: bool,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Arguments
///
/// - `state`: Application state with the tournament manager
///
/// # Returns
///
/// Configured Axum router ready to serve requests
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router with all versioned endpoints.
fn create_v1_router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/tournaments", get(tournaments::list_tournaments))
        .route("/tournaments/{id}", get(tournaments::get_tournament))
        .route(
            "/tournaments/{id}/participants",
            post(tournaments::register),
        )
        .route(
            "/tournaments/{id}/participants/{participant_id}",
            delete(tournaments::unregister),
        )
        .route(
            "/tournaments/{id}/matches/{match_id}/posts",
            post(tournaments::participant_post),
        )
        .route(
            "/tournaments/{id}/channels/{channel_id}/posts",
            post(tournaments::channel_post),
        )
        .route(
            "/tournaments/{id}/matches/{match_id}/votes",
            post(tournaments::cast_vote),
        );

    if !state.organizer_routes {
        return public_routes;
    }

    let organizer_routes = Router::new()
        .route("/tournaments", post(tournaments::create_tournament))
        .route("/tournaments/{id}/current", post(tournaments::set_current))
        .route(
            "/tournaments/{id}/registration/open",
            post(tournaments::open_registration),
        )
        .route(
            "/tournaments/{id}/registration/close",
            post(tournaments::close_registration),
        )
        .route(
            "/tournaments/{id}/rounds/{round_index}/fixtures",
            post(tournaments::assign_fixtures),
        )
        .route(
            "/tournaments/{id}/matches/{match_id}/vote",
            post(tournaments::open_vote),
        )
        .route(
            "/tournaments/{id}/matches/{match_id}/end",
            post(tournaments::end_match),
        )
        .route("/tournaments/{id}/end", post(tournaments::end_tournament))
        .route("/settings", get(settings::get_settings))
        .route(
            "/settings/battle-channels",
            put(settings::set_battle_channels),
        )
        .route(
            "/settings/organizer-roles",
            put(settings::set_organizer_roles),
        )
        .route("/settings/channels/{name}", put(settings::set_channel))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::organizer_middleware,
        ));

    Router::new().merge(public_routes).merge(organizer_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the store is reachable, `503 Service Unavailable`
/// otherwise.
///
/// # Example
///
/// ```bash
/// curl http://localhost:3000/health
/// # {"status":"healthy","store":true,"tournaments":{"active_count":1},"timestamp":"..."}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = state.manager.store().health_check().await.is_ok();
    let active_count = state.manager.active_count().await;
    metrics::active_tournaments(active_count);

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "tournaments": {
            "active_count": active_count
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
