use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use super::error::{ApiError, ErrorBody};
use crate::infrastructure::AppState;
use crate::models::{Delivery, ReturnCondition, Transaction};
use crate::services::{NewTransaction, ReturnRequest, TransactionFilter, TransactionView};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveRequest {
    pub approver_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequest {
    pub approver_id: i32,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnItemRequest {
    pub actor_id: i32,
    pub return_store_id: i32,
    pub condition: ReturnCondition,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActorRequest {
    pub actor_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelRequest {
    pub actor_id: i32,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignDeliveryRequest {
    pub actor_id: i32,
    pub assignee_id: i32,
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/transactions",
    tag = "transactions",
    request_body = NewTransaction,
    responses(
        (status = 201, description = "Transaction created in Pending", body = Transaction),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 422, description = "Return without a matching borrow", body = ErrorBody)
    )
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(payload): Json<NewTransaction>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let created = state.transactions.create(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "transactions",
    params(TransactionFilter),
    responses(
        (status = 200, description = "Matching transactions, newest first", body = [TransactionView])
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<Vec<TransactionView>>, ApiError> {
    Ok(Json(state.transactions.list(filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/transactions/overdue",
    tag = "transactions",
    responses(
        (status = 200, description = "Overdue transactions after a fresh sweep", body = [TransactionView])
    )
)]
pub async fn list_overdue(
    State(state): State<AppState>,
) -> Result<Json<Vec<TransactionView>>, ApiError> {
    Ok(Json(state.transactions.list_overdue().await?))
}

#[utoipa::path(
    get,
    path = "/api/transactions/{id}",
    tag = "transactions",
    params(("id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction, reclassified if overdue", body = TransactionView),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<TransactionView>, ApiError> {
    Ok(Json(state.transactions.get(id).await?))
}

#[utoipa::path(
    put,
    path = "/api/transactions/{id}/approve",
    tag = "transactions",
    params(("id" = i32, Path, description = "Transaction ID")),
    request_body = ApproveRequest,
    responses(
        (status = 200, description = "Approved", body = Transaction),
        (status = 403, description = "Approver lacks the capability", body = ErrorBody),
        (status = 409, description = "Not Pending", body = ErrorBody)
    )
)]
pub async fn approve_transaction(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ApproveRequest>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(state.transactions.approve(id, payload.approver_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/transactions/{id}/reject",
    tag = "transactions",
    params(("id" = i32, Path, description = "Transaction ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Rejected", body = Transaction),
        (status = 400, description = "Missing reason", body = ErrorBody),
        (status = 409, description = "Not Pending", body = ErrorBody)
    )
)]
pub async fn reject_transaction(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(
        state
            .transactions
            .reject(id, payload.approver_id, &payload.reason)
            .await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/transactions/{id}/return",
    tag = "transactions",
    params(("id" = i32, Path, description = "Borrow transaction ID")),
    request_body = ReturnItemRequest,
    responses(
        (status = 200, description = "Returned and completed", body = Transaction),
        (status = 409, description = "Not an open borrow", body = ErrorBody),
        (status = 422, description = "Wrong store", body = ErrorBody)
    )
)]
pub async fn return_transaction(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ReturnItemRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let request = ReturnRequest {
        return_store_id: payload.return_store_id,
        condition: payload.condition,
        notes: payload.notes,
    };
    Ok(Json(
        state
            .transactions
            .process_return(id, payload.actor_id, request)
            .await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/transactions/{id}/complete",
    tag = "transactions",
    params(("id" = i32, Path, description = "Transaction ID")),
    request_body = ActorRequest,
    responses(
        (status = 200, description = "Completed", body = Transaction),
        (status = 409, description = "Not Approved, or a Transfer", body = ErrorBody)
    )
)]
pub async fn complete_transaction(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ActorRequest>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(state.transactions.complete(id, payload.actor_id).await?))
}

#[utoipa::path(
    put,
    path = "/api/transactions/{id}/cancel",
    tag = "transactions",
    params(("id" = i32, Path, description = "Transaction ID")),
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Cancelled", body = Transaction),
        (status = 409, description = "Not Pending or Approved", body = ErrorBody)
    )
)]
pub async fn cancel_transaction(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(
        state
            .transactions
            .cancel(id, payload.actor_id, &payload.reason)
            .await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/transactions/{id}/delivery",
    tag = "deliveries",
    params(("id" = i32, Path, description = "Transfer transaction ID")),
    request_body = AssignDeliveryRequest,
    responses(
        (status = 201, description = "Delivery assigned", body = Delivery),
        (status = 409, description = "Not an approved transfer, or already assigned", body = ErrorBody)
    )
)]
pub async fn assign_delivery(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<AssignDeliveryRequest>,
) -> Result<(StatusCode, Json<Delivery>), ApiError> {
    let created = state
        .transactions
        .assign_delivery(id, payload.actor_id, payload.assignee_id, payload.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}
