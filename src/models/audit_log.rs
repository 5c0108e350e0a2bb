use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Append-only. Rows are only ever inserted, except by the retention purge.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = AuditLogEntry)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// `None` for system-initiated changes (overdue sweep).
    pub actor_id: Option<i32>,
    pub action_type: String, // BORROW, RETURN, APPROVE, OVERDUE, UPDATE, ...
    pub target_table: String,
    pub target_id: i32,
    pub old_value: Option<String>, // JSON snapshot
    pub new_value: Option<String>, // JSON snapshot
    pub created_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
