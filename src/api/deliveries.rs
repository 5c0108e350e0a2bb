use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use super::error::{ApiError, ErrorBody};
use super::transactions::ActorRequest;
use crate::infrastructure::AppState;
use crate::models::Delivery;

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeliverRequest {
    pub actor_id: i32,
    pub notes: Option<String>,
}

#[utoipa::path(
    put,
    path = "/api/deliveries/{id}/pickup",
    tag = "deliveries",
    params(("id" = i32, Path, description = "Delivery ID")),
    request_body = ActorRequest,
    responses(
        (status = 200, description = "Picked up", body = Delivery),
        (status = 403, description = "Not the assignee", body = ErrorBody),
        (status = 409, description = "Not Pending", body = ErrorBody)
    )
)]
pub async fn pickup_delivery(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ActorRequest>,
) -> Result<Json<Delivery>, ApiError> {
    Ok(Json(state.transactions.pickup(id, payload.actor_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/deliveries/{id}/deliver",
    tag = "deliveries",
    params(("id" = i32, Path, description = "Delivery ID")),
    request_body = DeliverRequest,
    responses(
        (status = 200, description = "Delivered; the transfer is completed", body = Delivery),
        (status = 403, description = "Not the assignee", body = ErrorBody),
        (status = 409, description = "Not In-Progress", body = ErrorBody)
    )
)]
pub async fn deliver_delivery(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<DeliverRequest>,
) -> Result<Json<Delivery>, ApiError> {
    Ok(Json(
        state
            .transactions
            .deliver(id, payload.actor_id, payload.notes)
            .await?,
    ))
}
