//! Organizer endpoints for the engine settings.
//!
//! Battle channels, organizer roles and the named channel bindings can be
//! changed while the server runs. Every update is validated as a whole and
//! applies to the next command each tournament handles.
//!
//! # Example
//!
//! ```bash
//! curl -X PUT http://localhost:6969/api/v1/settings/battle-channels \
//!   -H "x-organizer-role: organizer" \
//!   -H "Content-Type: application/json" \
//!   -d '{"channels": ["battle-1", "battle-2"]}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tourney::lifecycle::EngineSettings;

use super::{AppState, request_id::RequestId, tournaments::ApiResult};
use crate::logging;

#[derive(Debug, Deserialize)]
pub struct BattleChannelsRequest {
    pub channels: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrganizerRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelBindingRequest {
    /// New channel, absent or null to clear the binding
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// Current settings.
pub async fn get_settings(State(state): State<AppState>) -> Json<EngineSettings> {
    let settings = state.manager.settings().await;
    Json(EngineSettings::clone(&settings))
}

/// Replace the battle channels.
pub async fn set_battle_channels(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<BattleChannelsRequest>,
) -> ApiResult<Json<EngineSettings>> {
    let settings = state.manager.set_battle_channels(request.channels).await?;

    logging::log_settings_change("battle_channels", request_id.as_str());
    Ok(Json(EngineSettings::clone(&settings)))
}

/// Replace the organizer roles.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: No usable role in the list
pub async fn set_organizer_roles(
    State(state): State<AppState>,
    request_id: RequestId,
    Json(request): Json<OrganizerRolesRequest>,
) -> ApiResult<Json<EngineSettings>> {
    let settings = state.manager.set_organizer_roles(request.roles).await?;

    logging::log_settings_change("organizer_roles", request_id.as_str());
    Ok(Json(EngineSettings::clone(&settings)))
}

/// Rebind the bracket, registration, announce or vote channel.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Unknown binding name
pub async fn set_channel(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(name): Path<String>,
    Json(request): Json<ChannelBindingRequest>,
) -> ApiResult<Json<EngineSettings>> {
    let settings = state.manager.set_channel(&name, request.channel_id).await?;

    logging::log_settings_change(&name, request_id.as_str());
    Ok(Json(EngineSettings::clone(&settings)))
}
