use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::error::{ApiError, ErrorBody};
use crate::domain::DomainError;
use crate::infrastructure::AppState;
use crate::models::{AuditLogEntry, UserRole};
use crate::services::{AuditFilter, AuditStat, IntegrityIssue};

const DEFAULT_STATS_DAYS: i64 = 30;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    /// Trailing period in days (default 30)
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PurgeQuery {
    /// Must be an Admin
    pub actor_id: i32,
    pub older_than_days: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeResponse {
    pub deleted: u64,
}

#[utoipa::path(
    get,
    path = "/api/audit-logs",
    tag = "audit",
    params(AuditFilter),
    responses(
        (status = 200, description = "Matching entries, newest first", body = [AuditLogEntry]),
        (status = 400, description = "Bad time bound", body = ErrorBody)
    )
)]
pub async fn search_audit_logs(
    State(state): State<AppState>,
    Query(filter): Query<AuditFilter>,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError> {
    Ok(Json(state.audit.search(filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/audit-logs/stats",
    tag = "audit",
    params(StatsQuery),
    responses(
        (status = 200, description = "Counts per action type and table", body = [AuditStat])
    )
)]
pub async fn audit_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Vec<AuditStat>>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_STATS_DAYS);
    Ok(Json(state.audit.stats(days, Utc::now()).await?))
}

#[utoipa::path(
    get,
    path = "/api/audit-logs/integrity",
    tag = "audit",
    responses(
        (status = 200, description = "Entries with an unknown actor or no timestamp", body = [IntegrityIssue])
    )
)]
pub async fn audit_integrity(
    State(state): State<AppState>,
) -> Result<Json<Vec<IntegrityIssue>>, ApiError> {
    Ok(Json(state.audit.integrity_check().await?))
}

#[utoipa::path(
    delete,
    path = "/api/audit-logs",
    tag = "audit",
    params(PurgeQuery),
    responses(
        (status = 200, description = "Number of entries deleted", body = PurgeResponse),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn purge_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<PurgeQuery>,
) -> Result<Json<PurgeResponse>, ApiError> {
    if !state.authorizer.has_role(query.actor_id, UserRole::Admin).await? {
        return Err(DomainError::Authorization {
            actor_id: query.actor_id,
            action: "purge the audit trail",
        }
        .into());
    }

    let deleted = state
        .audit
        .purge_older_than(query.older_than_days, Utc::now())
        .await?;
    tracing::info!(actor = query.actor_id, deleted, "Audit retention cleanup");

    Ok(Json(PurgeResponse { deleted }))
}
