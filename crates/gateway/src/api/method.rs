//! Method session endpoints.
//!
//! - `POST   /method/create`        create (or replace) the caller's session
//! - `GET    /method/create`        session summary
//! - `DELETE /method/create`        drop the session
//! - `GET    /method/control`       start the method
//! - `POST   /method/control`       answer the pending request
//! - `GET    /method/interaction`   interaction types (population methods)
//! - `POST   /method/interaction`   switch the interaction type

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::auth::Owner;
use crate::api::error::ApiError;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request bodies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    pub problem_id: u64,
    pub method: String,
}

#[derive(Debug, Deserialize)]
pub struct ControlBody {
    /// The client's answer. Its shape depends on the method family and
    /// `preference_type`.
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub preference_type: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionBody {
    pub interaction_type: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// /method/create
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn create(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
    body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let created = state
        .controller
        .create(&owner, body.problem_id, &body.method)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "method": created.method,
            "owner": created.owner,
            "session_id": created.session_id,
        })),
    ))
}

pub async fn summary(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.controller.summary(&owner)?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
) -> Result<impl IntoResponse, ApiError> {
    state.controller.delete(&owner).await?;
    Ok(Json(json!({ "deleted": true })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// /method/control
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn start(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.controller.start(&owner).await?))
}

pub async fn iterate(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
    body: Result<Json<ControlBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let rendered = state
        .controller
        .iterate(&owner, body.response, body.preference_type)
        .await?;
    Ok(Json(rendered))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// /method/interaction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn interaction_types(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.controller.interaction_types(&owner)?))
}

pub async fn set_interaction_type(
    State(state): State<AppState>,
    Extension(Owner(owner)): Extension<Owner>,
    body: Result<Json<InteractionBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let rendered = state
        .controller
        .set_interaction_type(&owner, &body.interaction_type)
        .await?;
    Ok(Json(rendered))
}
