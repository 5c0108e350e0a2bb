//! Application state containing services and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::domain::{Authorizer, Notifier};
use crate::infrastructure::{LogNotifier, SeaOrmAuthorizer};
use crate::services::{AuditRecorder, TransactionService};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    /// Transaction façade
    pub transactions: TransactionService,
    /// Audit trail queries and retention
    pub audit: AuditRecorder,
    /// Role checks for endpoints outside the façade (audit purge)
    pub authorizer: Arc<dyn Authorizer>,
}

impl AppState {
    /// Wires the production collaborators: role checks from `users.role` and
    /// notifications to the log.
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_notifier(db, Arc::new(LogNotifier))
    }

    /// Same as [`new`](Self::new) with a caller-supplied notifier.
    pub fn with_notifier(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        let audit = AuditRecorder::new(db.clone());
        let authorizer: Arc<dyn Authorizer> = Arc::new(SeaOrmAuthorizer::new(db.clone()));
        let transactions =
            TransactionService::new(db.clone(), audit.clone(), authorizer.clone(), notifier);

        Self {
            db,
            transactions,
            audit,
            authorizer,
        }
    }
}

// Implement FromRef to allow extracting DatabaseConnection from AppState
impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
