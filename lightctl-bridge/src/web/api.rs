//! API endpoints for reading and switching accessories.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::accessory::{AccessoryId, AccessoryRegistry, BindingError};
use crate::dispatch::DispatchOutcome;

/// Body of a set request.
#[derive(Debug, Deserialize)]
pub struct SetStateRequest {
    pub on: bool,
}

/// Response to a set request.
#[derive(Debug, Serialize, Deserialize)]
pub struct SetStateResponse {
    /// State the accessory now reads as.
    pub on: bool,
    /// Whether the command reached the serial link.
    pub dispatched: bool,
}

/// Lookups by id only ever fail with an unknown accessory.
fn not_found(id: AccessoryId) -> axum::response::Response {
    let message = BindingError::UnknownAccessory(id).to_string();
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}

/// List every bound accessory.
pub async fn get_accessories(State(registry): State<Arc<AccessoryRegistry>>) -> impl IntoResponse {
    Json(registry.accessories())
}

/// Read one accessory; `on` is the current table value.
pub async fn get_accessory(
    State(registry): State<Arc<AccessoryRegistry>>,
    Path(id): Path<AccessoryId>,
) -> impl IntoResponse {
    let (Ok(on), Some(mut snapshot)) = (registry.handle_get(id), registry.get(id)) else {
        return not_found(id);
    };
    snapshot.on = on;
    Json(snapshot).into_response()
}

/// Switch one accessory.
pub async fn set_accessory(
    State(registry): State<Arc<AccessoryRegistry>>,
    Path(id): Path<AccessoryId>,
    Json(request): Json<SetStateRequest>,
) -> impl IntoResponse {
    let Ok(outcome) = registry.handle_set(id, request.on).await else {
        return not_found(id);
    };
    let on = registry.handle_get(id).unwrap_or(false);

    Json(SetStateResponse {
        on,
        dispatched: outcome == DispatchOutcome::Sent,
    })
    .into_response()
}

/// Raw channel table.
pub async fn get_channels(State(registry): State<Arc<AccessoryRegistry>>) -> impl IntoResponse {
    Json(json!({ "channels": registry.table().snapshot() }))
}
