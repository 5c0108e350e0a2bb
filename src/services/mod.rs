//! Services Layer
//!
//! Business logic with no HTTP types. Handlers and the background sweeper call
//! into [`TransactionService`] and [`AuditRecorder`]; the other modules are the
//! building blocks those two compose.

pub mod audit_service;
pub mod delivery;
pub mod item_store;
pub mod overdue;
pub mod state_machine;
pub mod store_consistency;
pub mod transaction_service;

// Re-export for convenience
pub use audit_service::{AuditFilter, AuditRecorder, AuditStat, IntegrityIssue, IntegrityProblem};
pub use transaction_service::{
    NewTransaction, ReturnRequest, TransactionFilter, TransactionService, TransactionView,
};
