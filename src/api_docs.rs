use crate::api;
use crate::models;
use crate::services;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::transactions::create_transaction,
        api::transactions::list_transactions,
        api::transactions::list_overdue,
        api::transactions::get_transaction,
        api::transactions::approve_transaction,
        api::transactions::reject_transaction,
        api::transactions::return_transaction,
        api::transactions::complete_transaction,
        api::transactions::cancel_transaction,
        api::transactions::assign_delivery,
        api::deliveries::pickup_delivery,
        api::deliveries::deliver_delivery,
        api::audit::search_audit_logs,
        api::audit::audit_stats,
        api::audit::audit_integrity,
        api::audit::purge_audit_logs,
    ),
    components(
        schemas(
            models::transaction::Model,
            models::delivery::Model,
            models::audit_log::Model,
            models::TransactionType,
            models::TransactionStatus,
            models::ReturnCondition,
            models::DeliveryStatus,
            services::NewTransaction,
            services::TransactionView,
            services::AuditStat,
            services::IntegrityIssue,
            services::IntegrityProblem,
            api::transactions::ApproveRequest,
            api::transactions::RejectRequest,
            api::transactions::ReturnItemRequest,
            api::transactions::ActorRequest,
            api::transactions::CancelRequest,
            api::transactions::AssignDeliveryRequest,
            api::deliveries::DeliverRequest,
            api::audit::PurgeResponse,
            api::error::ErrorBody,
            api::error::ErrorDetail,
        )
    ),
    tags(
        (name = "transactions", description = "Borrow, return, transfer and purchase requests"),
        (name = "deliveries", description = "Transfer deliveries"),
        (name = "audit", description = "Audit trail reporting and retention"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;
