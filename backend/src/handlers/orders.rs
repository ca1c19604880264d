//! HTTP handlers for manufacturing orders

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::CurrentUser,
    services::{DocumentService, OrderService},
    AppState,
};
use shared::{CreateOrderInput, UpdateOrderInput};

/// Create an order with its stages
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<impl IntoResponse> {
    tracing::debug!(user_id = %user.user_id, order_number = %input.order_number, "Creating order");
    let service = OrderService::new(state.db);
    let view = service.create_order(input).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Get the order page: header, stages, stage data and documents
pub async fn get_order(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = OrderService::new(state.db);
    let view = service.get_order_view(order_id).await?;
    Ok(Json(view))
}

/// Edit an order header
pub async fn update_order(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> AppResult<impl IntoResponse> {
    let service = OrderService::new(state.db);
    let order = service.update_order(order_id, input).await?;
    Ok(Json(order))
}

/// Delete an order and its stored documents
pub async fn delete_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    tracing::debug!(user_id = %user.user_id, order_id = %order_id, "Deleting order");
    let service = OrderService::new(state.db);
    service.delete_order(order_id, state.renderer).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Render the full order report as a PDF download
pub async fn get_order_report(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = DocumentService::new(state.db, state.renderer);
    let report = service.render_full_report(order_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", report.file_name),
            ),
        ],
        report.bytes,
    ))
}
