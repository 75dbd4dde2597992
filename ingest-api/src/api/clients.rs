//! Client registration and profile endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use ingest_common::{Client, ClientInfo};
use serde::Serialize;
use serde_json::{json, Value};

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    #[serde(rename = "clientID")]
    pub client_id: String,
}

fn client_info(payload: std::result::Result<Json<ClientInfo>, JsonRejection>) -> Result<ClientInfo> {
    payload
        .map(|Json(info)| info)
        .map_err(|rejection| Error::BadRequest(rejection.body_text()))
}

/// POST /api/v1/register
pub async fn register_client(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: std::result::Result<Json<ClientInfo>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let info = client_info(payload)?;
    let client_id = state.clients.create(&ctx, info).await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { client_id })))
}

/// GET /api/v1/client/:id
pub async fn get_client(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Client>> {
    Ok(Json(state.clients.get(&ctx, &id).await?))
}

/// PUT /api/v1/client/:id
pub async fn update_client(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: std::result::Result<Json<ClientInfo>, JsonRejection>,
) -> Result<Json<Value>> {
    let info = client_info(payload)?;
    state.clients.update(&ctx, &id, info).await?;

    Ok(Json(json!({ "status": "ok" })))
}

/// DELETE /api/v1/client/:id
pub async fn delete_client(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.clients.delete(&ctx, &id).await?;

    Ok(Json(json!({ "status": "ok" })))
}
