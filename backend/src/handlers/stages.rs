//! HTTP handlers for workflow stages

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::CurrentUser,
    services::{DocumentService, WorkflowService},
    AppState,
};
use shared::{parse_stage_key, stage_catalog, StageKey, StageUpdateRequest};

fn stage_from_path(raw: &str) -> AppResult<StageKey> {
    parse_stage_key(raw).map_err(|message| AppError::Validation {
        field: "stage_key".to_string(),
        message: format!("{}: {}", message, raw),
    })
}

/// The stage catalog in workflow order
pub async fn list_stages() -> impl IntoResponse {
    Json(stage_catalog())
}

/// Submit a stage update or regenerate its documents
pub async fn submit_stage_update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((order_id, stage_key)): Path<(Uuid, String)>,
    Json(request): Json<StageUpdateRequest>,
) -> AppResult<impl IntoResponse> {
    let stage_key = stage_from_path(&stage_key)?;
    let service = WorkflowService::new(state.db, state.renderer);
    let response = service
        .submit_stage_update(order_id, stage_key, request, user.user_id)
        .await?;
    Ok(Json(response))
}

/// Document history of one stage, newest first
pub async fn list_stage_documents(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path((order_id, stage_key)): Path<(Uuid, String)>,
) -> AppResult<impl IntoResponse> {
    let stage_key = stage_from_path(&stage_key)?;
    let service = DocumentService::new(state.db, state.renderer);
    let documents = service.list_for_stage(order_id, stage_key).await?;
    Ok(Json(documents))
}
