//! Collaborator trait definitions
//!
//! The transaction core consults these without knowing how they are backed.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use serde::Serialize;

use super::DomainError;
use crate::models::UserRole;

/// Centralised capability check consulted before approve, reject, cancel and
/// delivery operations.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Whether the user may approve or reject requests
    async fn can_approve(&self, user_id: i32) -> Result<bool, DomainError>;

    /// Whether the user holds the given role
    async fn has_role(&self, user_id: i32, role: UserRole) -> Result<bool, DomainError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Approved,
    Rejected,
    Overdue,
    LowStock,
    DeliveryAssigned,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Approved => "approved",
            NotificationKind::Rejected => "rejected",
            NotificationKind::Overdue => "overdue",
            NotificationKind::LowStock => "low_stock",
            NotificationKind::DeliveryAssigned => "delivery_assigned",
        }
    }
}

/// Fire-and-forget user notifications. Callers never wait on delivery and a
/// failed notification never affects the operation that triggered it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: i32, message: String, kind: NotificationKind);
}
