pub mod audit;
pub mod deliveries;
pub mod error;
pub mod health;
pub mod transactions;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::infrastructure::AppState;

pub use error::ApiError;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Transactions
        .route(
            "/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route("/transactions/overdue", get(transactions::list_overdue))
        .route("/transactions/:id", get(transactions::get_transaction))
        .route("/transactions/:id/approve", put(transactions::approve_transaction))
        .route("/transactions/:id/reject", put(transactions::reject_transaction))
        .route("/transactions/:id/return", put(transactions::return_transaction))
        .route("/transactions/:id/complete", put(transactions::complete_transaction))
        .route("/transactions/:id/cancel", put(transactions::cancel_transaction))
        // Deliveries
        .route("/transactions/:id/delivery", post(transactions::assign_delivery))
        .route("/deliveries/:id/pickup", put(deliveries::pickup_delivery))
        .route("/deliveries/:id/deliver", put(deliveries::deliver_delivery))
        // Audit trail
        .route(
            "/audit-logs",
            get(audit::search_audit_logs).delete(audit::purge_audit_logs),
        )
        .route("/audit-logs/stats", get(audit::audit_stats))
        .route("/audit-logs/integrity", get(audit::audit_integrity))
        .with_state(state)
}
