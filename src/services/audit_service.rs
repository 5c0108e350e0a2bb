//! Audit Service - append-only trail of tracked mutations
//!
//! Recording is best-effort: a failed insert is logged and swallowed so it can
//! never block or roll back the change being audited.

use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::DomainError;
use crate::models::audit_log::{self, Entity as AuditLog};
use crate::models::user;
use crate::utils::time::{self, format_timestamp};

/// Known values of `audit_logs.action_type`.
pub mod actions {
    pub const INSERT: &str = "INSERT";
    pub const UPDATE: &str = "UPDATE";
    pub const DELETE: &str = "DELETE";
    pub const BORROW: &str = "BORROW";
    pub const RETURN: &str = "RETURN";
    pub const TRANSFER: &str = "TRANSFER";
    pub const PURCHASE: &str = "PURCHASE";
    pub const DAMAGE_REPORT: &str = "DAMAGE_REPORT";
    pub const APPROVE: &str = "APPROVE";
    pub const REJECT: &str = "REJECT";
    pub const CANCEL: &str = "CANCEL";
    pub const OVERDUE: &str = "OVERDUE";
    pub const COMPLETE: &str = "COMPLETE";
}

/// Search parameters; every field narrows the result.
#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditFilter {
    pub actor_id: Option<i32>,
    /// Substring of the action type
    pub action: Option<String>,
    pub target_table: Option<String>,
    /// Inclusive lower bound, RFC 3339
    pub from: Option<String>,
    /// Inclusive upper bound, RFC 3339
    pub to: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult, ToSchema)]
pub struct AuditStat {
    pub action_type: String,
    pub target_table: String,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityProblem {
    MissingTimestamp,
    UnknownActor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct IntegrityIssue {
    pub audit_id: i32,
    pub problem: IntegrityProblem,
}

#[derive(Clone)]
pub struct AuditRecorder {
    db: DatabaseConnection,
}

impl AuditRecorder {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Appends one entry stamped with the current time.
    ///
    /// Returns `None` when the insert fails; the failure is logged, never raised.
    pub async fn record(
        &self,
        actor_id: Option<i32>,
        action_type: &str,
        target_table: &str,
        target_id: i32,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Option<audit_log::Model> {
        let entry = audit_log::ActiveModel {
            actor_id: Set(actor_id),
            action_type: Set(action_type.to_owned()),
            target_table: Set(target_table.to_owned()),
            target_id: Set(target_id),
            old_value: Set(old_value),
            new_value: Set(new_value),
            created_at: Set(Some(time::now())),
            ..Default::default()
        };

        match entry.insert(&self.db).await {
            Ok(saved) => Some(saved),
            Err(e) => {
                tracing::error!(
                    action = action_type,
                    table = target_table,
                    target_id,
                    "❌ Audit write failed: {}",
                    e
                );
                None
            }
        }
    }

    /// [`record`](Self::record) with JSON snapshots of any serializable rows.
    pub async fn record_change<T: Serialize>(
        &self,
        actor_id: Option<i32>,
        action_type: &str,
        target_table: &str,
        target_id: i32,
        old: Option<&T>,
        new: Option<&T>,
    ) -> Option<audit_log::Model> {
        self.record(
            actor_id,
            action_type,
            target_table,
            target_id,
            old.and_then(snapshot),
            new.and_then(snapshot),
        )
        .await
    }

    pub async fn search(&self, filter: AuditFilter) -> Result<Vec<audit_log::Model>, DomainError> {
        let mut condition = Condition::all();

        if let Some(actor_id) = filter.actor_id {
            condition = condition.add(audit_log::Column::ActorId.eq(actor_id));
        }
        if let Some(action) = filter.action.filter(|a| !a.is_empty()) {
            condition = condition.add(audit_log::Column::ActionType.contains(&action));
        }
        if let Some(table) = filter.target_table {
            condition = condition.add(audit_log::Column::TargetTable.eq(table));
        }
        if let Some(from) = filter.from {
            condition = condition.add(audit_log::Column::CreatedAt.gte(normalize_bound(&from)?));
        }
        if let Some(to) = filter.to {
            condition = condition.add(audit_log::Column::CreatedAt.lte(normalize_bound(&to)?));
        }

        let mut query = AuditLog::find()
            .filter(condition)
            .order_by_desc(audit_log::Column::Id);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        Ok(query.all(&self.db).await?)
    }

    /// Entry counts per (action type, target table) over the trailing `period_days`.
    pub async fn stats(
        &self,
        period_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<AuditStat>, DomainError> {
        if period_days < 1 {
            return Err(DomainError::validation("days", "must be at least 1"));
        }
        let since = format_timestamp(now - Duration::days(period_days));

        let stats = AuditLog::find()
            .select_only()
            .column(audit_log::Column::ActionType)
            .column(audit_log::Column::TargetTable)
            .column_as(Expr::col(audit_log::Column::Id).count(), "count")
            .filter(audit_log::Column::CreatedAt.gte(since))
            .group_by(audit_log::Column::ActionType)
            .group_by(audit_log::Column::TargetTable)
            .order_by_asc(audit_log::Column::ActionType)
            .order_by_asc(audit_log::Column::TargetTable)
            .into_model::<AuditStat>()
            .all(&self.db)
            .await?;

        Ok(stats)
    }

    /// Flags entries with no timestamp and entries whose actor is not a known user.
    pub async fn integrity_check(&self) -> Result<Vec<IntegrityIssue>, DomainError> {
        let untimed = AuditLog::find()
            .filter(
                Condition::any()
                    .add(audit_log::Column::CreatedAt.is_null())
                    .add(audit_log::Column::CreatedAt.eq("")),
            )
            .order_by_asc(audit_log::Column::Id)
            .all(&self.db)
            .await?;

        let orphaned = AuditLog::find()
            .filter(audit_log::Column::ActorId.is_not_null())
            .filter(
                audit_log::Column::ActorId.not_in_subquery(
                    Query::select()
                        .column(user::Column::Id)
                        .from(user::Entity)
                        .to_owned(),
                ),
            )
            .order_by_asc(audit_log::Column::Id)
            .all(&self.db)
            .await?;

        let mut issues: Vec<IntegrityIssue> = untimed
            .into_iter()
            .map(|e| IntegrityIssue {
                audit_id: e.id,
                problem: IntegrityProblem::MissingTimestamp,
            })
            .chain(orphaned.into_iter().map(|e| IntegrityIssue {
                audit_id: e.id,
                problem: IntegrityProblem::UnknownActor,
            }))
            .collect();
        issues.sort_by_key(|i| i.audit_id);

        Ok(issues)
    }

    /// Retention cleanup: deletes entries older than `days` and returns how many went.
    pub async fn purge_older_than(&self, days: i64, now: DateTime<Utc>) -> Result<u64, DomainError> {
        if days < 0 {
            return Err(DomainError::validation("older_than_days", "must not be negative"));
        }
        let cutoff = format_timestamp(now - Duration::days(days));

        let result = AuditLog::delete_many()
            .filter(audit_log::Column::CreatedAt.lt(cutoff))
            .exec(&self.db)
            .await?;

        tracing::info!(days, deleted = result.rows_affected, "🧹 Purged audit entries");
        Ok(result.rows_affected)
    }
}

fn snapshot<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value).ok()
}

/// Accepts any RFC 3339 bound and rewrites it to the stored UTC form so the
/// string comparison in SQL stays chronological.
fn normalize_bound(value: &str) -> Result<String, DomainError> {
    time::parse_timestamp(value)
        .map(format_timestamp)
        .ok_or_else(|| DomainError::validation("from/to", format!("not an RFC 3339 timestamp: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_rewritten_to_utc() {
        assert_eq!(
            normalize_bound("2026-05-01T12:00:00+02:00").unwrap(),
            "2026-05-01T10:00:00Z"
        );
        assert!(matches!(
            normalize_bound("last week"),
            Err(DomainError::Validation { .. })
        ));
    }

    #[test]
    fn snapshots_are_json() {
        #[derive(Serialize)]
        struct Row {
            id: i32,
            status: &'static str,
        }
        assert_eq!(
            snapshot(&Row { id: 3, status: "Approved" }).unwrap(),
            r#"{"id":3,"status":"Approved"}"#
        );
    }
}
