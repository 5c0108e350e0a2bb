//! Transaction Service - the single entry point for transaction operations
//!
//! Composes the state machine, store-consistency validator, overdue detection and
//! audit recorder. Every operation takes the acting user explicitly. Multi-row
//! changes run in one database transaction; audit entries and notifications
//! follow the commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::audit_service::{actions, AuditRecorder};
use super::delivery::{self as deliveries, DeliveryStep};
use super::item_store::{self, ItemChange};
use super::overdue;
use super::state_machine::{self, Transition};
use super::store_consistency;
use crate::domain::errors::is_unique_violation;
use crate::domain::{Authorizer, DomainError, NotificationKind, Notifier};
use crate::models::damage::{self, DamageStatus};
use crate::models::transaction::{self, Entity as Transaction};
use crate::models::user::Entity as User;
use crate::models::{
    delivery, DeliveryStatus, ReturnCondition, TransactionStatus, TransactionType, UserRole,
};
use crate::utils::time::{self, format_timestamp};

const TRANSACTIONS: &str = "transactions";
const ITEMS: &str = "items";
const DELIVERIES: &str = "deliveries";
const DAMAGES: &str = "damages";

const OPEN_TRANSFER: [TransactionStatus; 2] =
    [TransactionStatus::Pending, TransactionStatus::Approved];

/// Statuses that count as an open borrow when a new one is requested.
const OPEN_BORROW: [TransactionStatus; 3] = [
    TransactionStatus::Pending,
    TransactionStatus::Approved,
    TransactionStatus::Overdue,
];

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewTransaction {
    pub requester_id: i32,
    pub item_id: i32,
    pub transaction_type: TransactionType,
    pub quantity: i32,
    pub origin_store_id: Option<i32>,
    pub destination_store_id: Option<i32>,
    /// RFC 3339
    pub due_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReturnRequest {
    pub return_store_id: i32,
    pub condition: ReturnCondition,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub requester_id: Option<i32>,
    pub item_id: Option<i32>,
}

/// A transaction as seen at read time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: crate::models::Transaction,
    /// Whole days past due, rounded up; absent unless overdue
    pub overdue_days: Option<i64>,
}

#[derive(Clone)]
pub struct TransactionService {
    db: DatabaseConnection,
    audit: AuditRecorder,
    authorizer: Arc<dyn Authorizer>,
    notifier: Arc<dyn Notifier>,
}

impl TransactionService {
    pub fn new(
        db: DatabaseConnection,
        audit: AuditRecorder,
        authorizer: Arc<dyn Authorizer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            audit,
            authorizer,
            notifier,
        }
    }

    /// Opens a new request in `Pending`.
    pub async fn create(&self, new: NewTransaction) -> Result<transaction::Model, DomainError> {
        if new.quantity < 1 {
            return Err(DomainError::validation("quantity", "must be at least 1"));
        }
        if new.due_date.is_some() && new.transaction_type != TransactionType::Borrow {
            return Err(DomainError::validation("due_date", "only a borrow has a due date"));
        }
        let due_date = match new.due_date.as_deref() {
            Some(raw) => Some(
                time::parse_timestamp(raw)
                    .map(format_timestamp)
                    .ok_or_else(|| {
                        DomainError::validation("due_date", format!("not an RFC 3339 timestamp: {raw}"))
                    })?,
            ),
            None => None,
        };

        let item = item_store::get(&self.db, new.item_id)
            .await
            .map_err(|e| match e {
                DomainError::NotFound { id, .. } => {
                    DomainError::validation("item_id", format!("item {id} does not exist"))
                }
                other => other,
            })?;
        if User::find_by_id(new.requester_id).one(&self.db).await?.is_none() {
            return Err(DomainError::validation(
                "requester_id",
                format!("user {} does not exist", new.requester_id),
            ));
        }

        let (origin, destination) = match new.transaction_type {
            TransactionType::Borrow => {
                let origin = new.origin_store_id.unwrap_or(item.store_id);
                if origin != item.store_id {
                    return Err(DomainError::validation(
                        "origin_store_id",
                        format!("item {} is held by store {}", item.id, item.store_id),
                    ));
                }
                if !item.status.is_lendable() {
                    return Err(DomainError::validation(
                        "item_id",
                        format!("item {} is {} and cannot be borrowed", item.id, item.status),
                    ));
                }
                check_stock(&item, new.quantity)?;
                if let Some(transfer) = open_transfer(&self.db, item.id).await? {
                    return Err(transfer_in_flight(item.id, transfer.id));
                }
                let open = Transaction::find()
                    .filter(transaction::Column::TransactionType.eq(TransactionType::Borrow))
                    .filter(transaction::Column::ItemId.eq(item.id))
                    .filter(transaction::Column::RequesterId.eq(new.requester_id))
                    .filter(transaction::Column::Status.is_in(OPEN_BORROW))
                    .one(&self.db)
                    .await?;
                if let Some(open) = open {
                    return Err(duplicate_borrow(item.id, Some(open.id)));
                }
                (Some(origin), None)
            }
            TransactionType::Return => {
                let destination = new.destination_store_id.ok_or_else(|| {
                    DomainError::validation("destination_store_id", "required for a return")
                })?;
                let borrow = store_consistency::validate_return(
                    &self.db,
                    item.id,
                    new.requester_id,
                    destination,
                )
                .await?;
                if new.quantity != borrow.quantity {
                    return Err(DomainError::validation(
                        "quantity",
                        format!(
                            "borrow {} was for {} unit(s), not {}",
                            borrow.id, borrow.quantity, new.quantity
                        ),
                    ));
                }
                (None, Some(destination))
            }
            TransactionType::Transfer => {
                let origin = new.origin_store_id.ok_or_else(|| {
                    DomainError::validation("origin_store_id", "required for a transfer")
                })?;
                let destination = new.destination_store_id.ok_or_else(|| {
                    DomainError::validation("destination_store_id", "required for a transfer")
                })?;
                if origin == destination {
                    return Err(DomainError::validation(
                        "destination_store_id",
                        "must differ from the origin store",
                    ));
                }
                if origin != item.store_id {
                    return Err(DomainError::validation(
                        "origin_store_id",
                        format!("item {} is held by store {}", item.id, item.store_id),
                    ));
                }
                if !item.status.is_lendable() {
                    return Err(DomainError::validation(
                        "item_id",
                        format!("item {} is {} and cannot be transferred", item.id, item.status),
                    ));
                }
                check_whole_row(&item, new.quantity)?;
                if let Some(transfer) = open_transfer(&self.db, item.id).await? {
                    return Err(transfer_in_flight(item.id, transfer.id));
                }
                if let Some(borrow) = borrow_out(&self.db, item.id).await? {
                    return Err(on_loan(item.id, borrow.id));
                }
                (Some(origin), Some(destination))
            }
            TransactionType::Purchase => {
                let destination = new.destination_store_id.unwrap_or(item.store_id);
                if destination != item.store_id {
                    return Err(DomainError::validation(
                        "destination_store_id",
                        format!("item {} is held by store {}", item.id, item.store_id),
                    ));
                }
                (None, Some(destination))
            }
        };

        let now = time::now();
        let new_tx = transaction::ActiveModel {
            transaction_type: Set(new.transaction_type),
            requester_id: Set(new.requester_id),
            item_id: Set(item.id),
            quantity: Set(new.quantity),
            origin_store_id: Set(origin),
            destination_store_id: Set(destination),
            due_date: Set(due_date),
            status: Set(TransactionStatus::Pending),
            notes: Set(new.notes),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        // The partial unique index catches a borrow that raced past the check above.
        let saved = match new_tx.insert(&self.db).await {
            Ok(saved) => saved,
            Err(e) if is_unique_violation(&e) => return Err(duplicate_borrow(item.id, None)),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            transaction_id = saved.id,
            kind = %saved.transaction_type,
            requester = saved.requester_id,
            item = saved.item_id,
            "📝 Transaction created"
        );
        self.audit
            .record_change(
                Some(saved.requester_id),
                creation_action(saved.transaction_type),
                TRANSACTIONS,
                saved.id,
                None,
                Some(&saved),
            )
            .await;

        Ok(saved)
    }

    /// Pending -> Approved. A Borrow takes its units out of stock here.
    pub async fn approve(
        &self,
        transaction_id: i32,
        approver_id: i32,
    ) -> Result<transaction::Model, DomainError> {
        let current = self.load(transaction_id).await?;
        self.require_approver(approver_id, "approve transactions").await?;
        state_machine::check(&current, Transition::Approve)?;

        let now = time::now();
        let txn = self.db.begin().await?;
        let changes = transaction::ActiveModel {
            approved_by: Set(Some(approver_id)),
            approved_at: Set(Some(now.clone())),
            ..Default::default()
        };
        let approved = state_machine::apply(&txn, &current, Transition::Approve, changes, &now).await?;

        let item_change = match approved.transaction_type {
            TransactionType::Borrow => {
                let item = item_store::get(&txn, approved.item_id).await?;
                if !item.status.is_lendable() {
                    return Err(DomainError::validation(
                        "item_id",
                        format!("item {} is {} and cannot be borrowed", item.id, item.status),
                    ));
                }
                if let Some(transfer) = open_transfer(&txn, item.id).await? {
                    return Err(transfer_in_flight(item.id, transfer.id));
                }
                Some(item_store::adjust_quantity(&txn, item.id, -approved.quantity, &now).await?)
            }
            TransactionType::Transfer => {
                // Stock may have moved since the request was made
                let item = item_store::get(&txn, approved.item_id).await?;
                if let Some(borrow) = borrow_out(&txn, item.id).await? {
                    return Err(on_loan(item.id, borrow.id));
                }
                check_whole_row(&item, approved.quantity)?;
                None
            }
            TransactionType::Return | TransactionType::Purchase => None,
        };
        txn.commit().await?;

        log_transition(&current, &approved, approver_id);
        self.audit_transition(approver_id, actions::APPROVE, &current, &approved)
            .await;
        if let Some(change) = &item_change {
            self.audit_item(Some(approver_id), change).await;
        }

        self.notify(
            approved.requester_id,
            format!("Your {} request #{} was approved", approved.transaction_type, approved.id),
            NotificationKind::Approved,
        );
        if let Some(ItemChange { after, .. }) = &item_change {
            if after.quantity <= after.low_stock_threshold {
                self.notify(
                    approver_id,
                    format!(
                        "Item {} ({}) is low on stock: {} left",
                        after.id, after.name, after.quantity
                    ),
                    NotificationKind::LowStock,
                );
            }
        }

        Ok(approved)
    }

    /// Pending -> Rejected. The reason is mandatory.
    pub async fn reject(
        &self,
        transaction_id: i32,
        approver_id: i32,
        reason: &str,
    ) -> Result<transaction::Model, DomainError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("reason", "a rejection reason is required"));
        }
        let current = self.load(transaction_id).await?;
        self.require_approver(approver_id, "reject transactions").await?;

        let now = time::now();
        let changes = transaction::ActiveModel {
            approved_by: Set(Some(approver_id)),
            rejection_reason: Set(Some(reason.to_owned())),
            ..Default::default()
        };
        let rejected =
            state_machine::apply(&self.db, &current, Transition::Reject, changes, &now).await?;

        log_transition(&current, &rejected, approver_id);
        self.audit_transition(approver_id, actions::REJECT, &current, &rejected)
            .await;
        self.notify(
            rejected.requester_id,
            format!("Your {} request #{} was rejected: {}", rejected.transaction_type, rejected.id, reason),
            NotificationKind::Rejected,
        );

        Ok(rejected)
    }

    /// Brings a borrowed item back. Approved|Overdue -> Completed, Borrow only.
    ///
    /// The item must go back to the store it was borrowed from. A `Damaged` return
    /// is recorded as a damage report instead of going back into stock.
    pub async fn process_return(
        &self,
        transaction_id: i32,
        actor_id: i32,
        request: ReturnRequest,
    ) -> Result<transaction::Model, DomainError> {
        let current = self.load(transaction_id).await?;
        self.require_party(&current, actor_id, "return this item").await?;
        state_machine::check(&current, Transition::Return)?;
        store_consistency::validate_return(
            &self.db,
            current.item_id,
            current.requester_id,
            request.return_store_id,
        )
        .await?;

        let now = time::now();
        let txn = self.db.begin().await?;
        let mut changes = transaction::ActiveModel {
            return_date: Set(Some(now.clone())),
            return_condition: Set(Some(request.condition)),
            ..Default::default()
        };
        if request.notes.is_some() {
            changes.notes = Set(request.notes.clone());
        }
        let returned = state_machine::apply(&txn, &current, Transition::Return, changes, &now).await?;

        let (item_change, damage) = if request.condition == ReturnCondition::Damaged {
            let report = damage::ActiveModel {
                item_id: Set(returned.item_id),
                transaction_id: Set(Some(returned.id)),
                reported_by: Set(Some(actor_id)),
                quantity: Set(returned.quantity),
                description: Set(request.notes),
                status: Set(DamageStatus::Reported),
                created_at: Set(now.clone()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            (None, Some(report))
        } else {
            let change =
                item_store::adjust_quantity(&txn, returned.item_id, returned.quantity, &now).await?;
            (Some(change), None)
        };
        txn.commit().await?;

        log_transition(&current, &returned, actor_id);
        self.audit_transition(actor_id, actions::RETURN, &current, &returned)
            .await;
        if let Some(change) = &item_change {
            self.audit_item(Some(actor_id), change).await;
        }
        if let Some(report) = &damage {
            tracing::warn!(
                transaction_id = returned.id,
                item = report.item_id,
                quantity = report.quantity,
                "⚠️ Item returned damaged"
            );
            self.audit
                .record_change(
                    Some(actor_id),
                    actions::DAMAGE_REPORT,
                    DAMAGES,
                    report.id,
                    None,
                    Some(report),
                )
                .await;
        }

        Ok(returned)
    }

    /// Approved -> Completed, with the stock effect of the transaction's type.
    ///
    /// - Borrow: closes the borrow; the units stay with the borrower.
    /// - Purchase: adds the units to stock.
    /// - Return: completes the matching open borrow and puts its units back.
    /// - Transfer: only completes through its delivery.
    pub async fn complete(
        &self,
        transaction_id: i32,
        actor_id: i32,
    ) -> Result<transaction::Model, DomainError> {
        let current = self.load(transaction_id).await?;
        self.require_party(&current, actor_id, "complete this transaction")
            .await?;
        state_machine::check(&current, Transition::Complete)?;
        if current.transaction_type == TransactionType::Transfer {
            return Err(DomainError::InvalidState {
                entity: "transaction",
                id: current.id,
                state: format!("{} ({})", current.status, current.transaction_type),
                action: "complete outside its delivery",
            });
        }

        let now = time::now();
        let txn = self.db.begin().await?;
        let mut item_changes = Vec::new();
        let mut closed_borrow = None;

        match current.transaction_type {
            TransactionType::Purchase => {
                let in_flight = open_transfer(&txn, current.item_id)
                    .await?
                    .filter(|t| t.status == TransactionStatus::Approved);
                if let Some(transfer) = in_flight {
                    return Err(transfer_in_flight(current.item_id, transfer.id));
                }
                item_changes.push(
                    item_store::adjust_quantity(&txn, current.item_id, current.quantity, &now)
                        .await?,
                );
            }
            TransactionType::Return => {
                let returned_to = current.destination_store_id.ok_or_else(|| {
                    DomainError::validation("destination_store_id", "required for a return")
                })?;
                let borrow = store_consistency::validate_return(
                    &txn,
                    current.item_id,
                    current.requester_id,
                    returned_to,
                )
                .await?;
                let changes = transaction::ActiveModel {
                    return_date: Set(Some(now.clone())),
                    return_condition: Set(Some(ReturnCondition::Good)),
                    ..Default::default()
                };
                let after =
                    state_machine::apply(&txn, &borrow, Transition::Return, changes, &now).await?;
                item_changes.push(
                    item_store::adjust_quantity(&txn, borrow.item_id, borrow.quantity, &now).await?,
                );
                closed_borrow = Some((borrow, after));
            }
            TransactionType::Borrow | TransactionType::Transfer => {}
        }

        let completed = state_machine::apply(
            &txn,
            &current,
            Transition::Complete,
            <transaction::ActiveModel as Default>::default(),
            &now,
        )
        .await?;
        txn.commit().await?;

        if let Some((before, after)) = &closed_borrow {
            log_transition(before, after, actor_id);
            self.audit_transition(actor_id, actions::RETURN, before, after)
                .await;
        }
        log_transition(&current, &completed, actor_id);
        self.audit_transition(actor_id, actions::COMPLETE, &current, &completed)
            .await;
        for change in &item_changes {
            self.audit_item(Some(actor_id), change).await;
        }

        Ok(completed)
    }

    /// Pending|Approved -> Cancelled. Cancelling an approved borrow puts its
    /// units back; a transfer already on the road cannot be cancelled.
    pub async fn cancel(
        &self,
        transaction_id: i32,
        actor_id: i32,
        reason: &str,
    ) -> Result<transaction::Model, DomainError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("reason", "a cancellation reason is required"));
        }
        let current = self.load(transaction_id).await?;
        self.require_party(&current, actor_id, "cancel this transaction")
            .await?;
        state_machine::check(&current, Transition::Cancel)?;
        if let Some(delivery) = deliveries::for_transaction(&self.db, current.id).await? {
            if delivery.status != DeliveryStatus::Pending {
                return Err(DomainError::InvalidState {
                    entity: "transaction",
                    id: current.id,
                    state: format!("{} with delivery {}", current.status, delivery.status),
                    action: "cancel",
                });
            }
        }

        let now = time::now();
        let txn = self.db.begin().await?;
        let changes = transaction::ActiveModel {
            cancellation_reason: Set(Some(reason.to_owned())),
            ..Default::default()
        };
        let cancelled = state_machine::apply(&txn, &current, Transition::Cancel, changes, &now).await?;
        let item_change = if current.transaction_type == TransactionType::Borrow
            && current.status == TransactionStatus::Approved
        {
            Some(item_store::adjust_quantity(&txn, current.item_id, current.quantity, &now).await?)
        } else {
            None
        };
        txn.commit().await?;

        log_transition(&current, &cancelled, actor_id);
        self.audit_transition(actor_id, actions::CANCEL, &current, &cancelled)
            .await;
        if let Some(change) = &item_change {
            self.audit_item(Some(actor_id), change).await;
        }

        Ok(cancelled)
    }

    pub async fn get(&self, transaction_id: i32) -> Result<TransactionView, DomainError> {
        self.get_at(transaction_id, Utc::now()).await
    }

    /// Reads one transaction, persisting the overdue reclassification if its due
    /// date has passed.
    pub async fn get_at(
        &self,
        transaction_id: i32,
        now: DateTime<Utc>,
    ) -> Result<TransactionView, DomainError> {
        let current = self.load(transaction_id).await?;
        let tx = match self.mark_overdue(&current, now).await? {
            Some(marked) => marked,
            // Lost the race to another reader or the sweep
            None if overdue::is_due(&current, now) => self.load(transaction_id).await?,
            None => current,
        };
        Ok(view(tx, now))
    }

    pub async fn list(&self, filter: TransactionFilter) -> Result<Vec<TransactionView>, DomainError> {
        let mut condition = Condition::all();

        if let Some(status) = filter.status {
            condition = condition.add(transaction::Column::Status.eq(status));
        }
        if let Some(kind) = filter.transaction_type {
            condition = condition.add(transaction::Column::TransactionType.eq(kind));
        }
        if let Some(requester_id) = filter.requester_id {
            condition = condition.add(transaction::Column::RequesterId.eq(requester_id));
        }
        if let Some(item_id) = filter.item_id {
            condition = condition.add(transaction::Column::ItemId.eq(item_id));
        }

        let rows = Transaction::find()
            .filter(condition)
            .order_by_desc(transaction::Column::CreatedAt)
            .order_by_desc(transaction::Column::Id)
            .all(&self.db)
            .await?;

        let now = Utc::now();
        Ok(rows.into_iter().map(|tx| view(tx, now)).collect())
    }

    /// Sweeps, then lists everything Overdue.
    pub async fn list_overdue(&self) -> Result<Vec<TransactionView>, DomainError> {
        self.sweep_overdue().await?;
        self.list(TransactionFilter {
            status: Some(TransactionStatus::Overdue),
            ..Default::default()
        })
        .await
    }

    pub async fn sweep_overdue(&self) -> Result<usize, DomainError> {
        self.sweep_overdue_at(Utc::now()).await
    }

    /// Reclassifies every Approved Borrow whose due date is before `now`.
    /// Returns how many were moved to Overdue by this call.
    pub async fn sweep_overdue_at(&self, now: DateTime<Utc>) -> Result<usize, DomainError> {
        let candidates = Transaction::find()
            .filter(transaction::Column::TransactionType.eq(TransactionType::Borrow))
            .filter(transaction::Column::Status.eq(TransactionStatus::Approved))
            .filter(transaction::Column::DueDate.is_not_null())
            .filter(transaction::Column::DueDate.lt(format_timestamp(now)))
            .order_by_asc(transaction::Column::Id)
            .all(&self.db)
            .await?;

        let mut marked = 0;
        for tx in &candidates {
            if self.mark_overdue(tx, now).await?.is_some() {
                marked += 1;
            }
        }
        if marked > 0 {
            tracing::info!(marked, "⏰ Overdue sweep reclassified transactions");
        }
        Ok(marked)
    }

    /// Assigns delivery staff to an approved Transfer.
    pub async fn assign_delivery(
        &self,
        transaction_id: i32,
        actor_id: i32,
        assignee_id: i32,
        notes: Option<String>,
    ) -> Result<delivery::Model, DomainError> {
        let tx = self.load(transaction_id).await?;
        self.require_approver(actor_id, "assign deliveries").await?;
        if !self
            .authorizer
            .has_role(assignee_id, UserRole::DeliveryStaff)
            .await?
        {
            return Err(DomainError::validation(
                "assignee_id",
                format!("user {assignee_id} is not delivery staff"),
            ));
        }
        if tx.transaction_type != TransactionType::Transfer
            || tx.status != TransactionStatus::Approved
        {
            return Err(DomainError::InvalidState {
                entity: "transaction",
                id: tx.id,
                state: format!("{} ({})", tx.status, tx.transaction_type),
                action: "be assigned a delivery",
            });
        }
        if let Some(existing) = deliveries::for_transaction(&self.db, tx.id).await? {
            return Err(already_assigned(&tx, existing.id));
        }

        let now = time::now();
        let created = match deliveries::create(&self.db, tx.id, assignee_id, notes, &now).await {
            Ok(created) => created,
            Err(DomainError::Persistence(message)) => {
                // Lost a race on the one-delivery-per-transaction index.
                return match deliveries::for_transaction(&self.db, tx.id).await? {
                    Some(existing) => Err(already_assigned(&tx, existing.id)),
                    None => Err(DomainError::Persistence(message)),
                };
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            delivery_id = created.id,
            transaction_id = tx.id,
            assignee = assignee_id,
            actor = actor_id,
            "🚚 Delivery assigned"
        );
        self.audit
            .record_change(Some(actor_id), actions::INSERT, DELIVERIES, created.id, None, Some(&created))
            .await;
        self.notify(
            assignee_id,
            format!("Delivery #{} assigned for transfer #{}", created.id, tx.id),
            NotificationKind::DeliveryAssigned,
        );

        Ok(created)
    }

    /// Pending -> In-Progress. Only the assignee picks up.
    pub async fn pickup(&self, delivery_id: i32, actor_id: i32) -> Result<delivery::Model, DomainError> {
        let current = deliveries::get(&self.db, delivery_id).await?;
        require_assignee(&current, actor_id, "pick up this delivery")?;
        let tx = self.load(current.transaction_id).await?;
        if tx.status != TransactionStatus::Approved {
            return Err(DomainError::InvalidState {
                entity: "transaction",
                id: tx.id,
                state: tx.status.to_string(),
                action: "be picked up",
            });
        }

        let now = time::now();
        let picked = deliveries::advance(&self.db, &current, DeliveryStep::Pickup, None, &now).await?;

        tracing::info!(
            delivery_id = picked.id,
            from = %current.status,
            to = %picked.status,
            actor = actor_id,
            "🚚 Delivery picked up"
        );
        self.audit
            .record_change(Some(actor_id), actions::UPDATE, DELIVERIES, picked.id, Some(&current), Some(&picked))
            .await;

        Ok(picked)
    }

    /// In-Progress -> Completed. Re-homes the item at the destination store and
    /// completes the Transfer, all in one database transaction.
    pub async fn deliver(
        &self,
        delivery_id: i32,
        actor_id: i32,
        notes: Option<String>,
    ) -> Result<delivery::Model, DomainError> {
        let current = deliveries::get(&self.db, delivery_id).await?;
        require_assignee(&current, actor_id, "deliver this delivery")?;
        let tx = self.load(current.transaction_id).await?;
        state_machine::check(&tx, Transition::Complete)?;
        let destination = tx.destination_store_id.ok_or_else(|| {
            DomainError::validation("destination_store_id", "required for a transfer")
        })?;

        let now = time::now();
        let txn = self.db.begin().await?;
        let delivered =
            deliveries::advance(&txn, &current, DeliveryStep::Deliver, notes, &now).await?;
        check_whole_row(&item_store::get(&txn, tx.item_id).await?, tx.quantity)?;
        let item_change = item_store::relocate(&txn, tx.item_id, destination, &now).await?;
        let completed = state_machine::apply(
            &txn,
            &tx,
            Transition::Complete,
            <transaction::ActiveModel as Default>::default(),
            &now,
        )
        .await?;
        txn.commit().await?;

        tracing::info!(
            delivery_id = delivered.id,
            item = tx.item_id,
            destination,
            actor = actor_id,
            "📦 Delivery completed"
        );
        log_transition(&tx, &completed, actor_id);
        self.audit
            .record_change(Some(actor_id), actions::UPDATE, DELIVERIES, delivered.id, Some(&current), Some(&delivered))
            .await;
        self.audit_transition(actor_id, actions::TRANSFER, &tx, &completed)
            .await;
        self.audit_item(Some(actor_id), &item_change).await;

        Ok(delivered)
    }

    async fn load(&self, transaction_id: i32) -> Result<transaction::Model, DomainError> {
        Transaction::find_by_id(transaction_id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound {
                resource: "transaction",
                id: transaction_id,
            })
    }

    /// Persists what [`overdue::detect_overdue`] sees at `now`. `None` when the
    /// transaction is not overdue or another caller moved the row first.
    async fn mark_overdue(
        &self,
        tx: &transaction::Model,
        now: DateTime<Utc>,
    ) -> Result<Option<transaction::Model>, DomainError> {
        if overdue::detect_overdue(tx, now).status != TransactionStatus::Overdue
            || tx.status == TransactionStatus::Overdue
        {
            return Ok(None);
        }
        let stamp = format_timestamp(now);
        let marked = match state_machine::apply(
            &self.db,
            tx,
            Transition::MarkOverdue,
            <transaction::ActiveModel as Default>::default(),
            &stamp,
        )
        .await
        {
            Ok(marked) => marked,
            Err(DomainError::InvalidState { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let days = overdue::overdue_days(&marked, now).unwrap_or(0);
        tracing::info!(
            transaction_id = marked.id,
            from = %tx.status,
            to = %marked.status,
            overdue_days = days,
            "⏰ Transaction overdue"
        );
        self.audit
            .record_change(None, actions::OVERDUE, TRANSACTIONS, marked.id, Some(tx), Some(&marked))
            .await;
        self.notify(
            marked.requester_id,
            format!(
                "Your {} #{} is overdue by {} day(s)",
                marked.transaction_type, marked.id, days
            ),
            NotificationKind::Overdue,
        );

        Ok(Some(marked))
    }

    async fn require_approver(&self, actor_id: i32, action: &'static str) -> Result<(), DomainError> {
        if self.authorizer.can_approve(actor_id).await? {
            Ok(())
        } else {
            Err(DomainError::Authorization { actor_id, action })
        }
    }

    /// The requester, or anyone who can approve.
    async fn require_party(
        &self,
        tx: &transaction::Model,
        actor_id: i32,
        action: &'static str,
    ) -> Result<(), DomainError> {
        if tx.requester_id == actor_id {
            return Ok(());
        }
        self.require_approver(actor_id, action).await
    }

    async fn audit_transition(
        &self,
        actor_id: i32,
        action: &str,
        before: &transaction::Model,
        after: &transaction::Model,
    ) {
        self.audit
            .record_change(Some(actor_id), action, TRANSACTIONS, after.id, Some(before), Some(after))
            .await;
    }

    async fn audit_item(&self, actor_id: Option<i32>, change: &ItemChange) {
        self.audit
            .record_change(
                actor_id,
                actions::UPDATE,
                ITEMS,
                change.after.id,
                Some(&change.before),
                Some(&change.after),
            )
            .await;
    }

    /// Fire and forget: the caller never waits on delivery.
    fn notify(&self, user_id: i32, message: String, kind: NotificationKind) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            notifier.notify(user_id, message, kind).await;
        });
    }
}

fn view(tx: transaction::Model, now: DateTime<Utc>) -> TransactionView {
    TransactionView {
        overdue_days: overdue::overdue_days(&tx, now),
        transaction: tx,
    }
}

fn check_stock(item: &crate::models::item::Model, quantity: i32) -> Result<(), DomainError> {
    if quantity > item.quantity {
        return Err(DomainError::validation(
            "quantity",
            format!(
                "insufficient stock for item {}: requested {}, available {}",
                item.id, quantity, item.quantity
            ),
        ));
    }
    Ok(())
}

/// A transfer moves the whole item row, so it must cover the on-hand stock exactly.
fn check_whole_row(item: &crate::models::item::Model, quantity: i32) -> Result<(), DomainError> {
    if quantity != item.quantity {
        return Err(DomainError::validation(
            "quantity",
            format!(
                "a transfer moves all {} unit(s) of item {}, not {}",
                item.quantity, item.id, quantity
            ),
        ));
    }
    Ok(())
}

/// The item's Pending or Approved Transfer, if any.
async fn open_transfer<C: ConnectionTrait>(
    conn: &C,
    item_id: i32,
) -> Result<Option<transaction::Model>, DomainError> {
    Ok(Transaction::find()
        .filter(transaction::Column::TransactionType.eq(TransactionType::Transfer))
        .filter(transaction::Column::ItemId.eq(item_id))
        .filter(transaction::Column::Status.is_in(OPEN_TRANSFER))
        .one(conn)
        .await?)
}

/// Any Borrow of the item whose units are still with a borrower.
async fn borrow_out<C: ConnectionTrait>(
    conn: &C,
    item_id: i32,
) -> Result<Option<transaction::Model>, DomainError> {
    Ok(Transaction::find()
        .filter(transaction::Column::TransactionType.eq(TransactionType::Borrow))
        .filter(transaction::Column::ItemId.eq(item_id))
        .filter(transaction::Column::Status.is_in(store_consistency::OUT_ON_LOAN))
        .one(conn)
        .await?)
}

fn transfer_in_flight(item_id: i32, transfer_id: i32) -> DomainError {
    DomainError::validation(
        "item_id",
        format!("item {item_id} has an open transfer (#{transfer_id})"),
    )
}

fn on_loan(item_id: i32, borrow_id: i32) -> DomainError {
    DomainError::validation(
        "item_id",
        format!("item {item_id} is out on borrow #{borrow_id}"),
    )
}

fn duplicate_borrow(item_id: i32, existing: Option<i32>) -> DomainError {
    let message = match existing {
        Some(id) => format!("an open borrow of item {item_id} already exists (#{id})"),
        None => format!("an open borrow of item {item_id} already exists"),
    };
    DomainError::validation("item_id", message)
}

fn already_assigned(tx: &transaction::Model, delivery_id: i32) -> DomainError {
    DomainError::InvalidState {
        entity: "transaction",
        id: tx.id,
        state: format!("{} with delivery {}", tx.status, delivery_id),
        action: "be assigned a delivery",
    }
}

fn require_assignee(
    delivery: &delivery::Model,
    actor_id: i32,
    action: &'static str,
) -> Result<(), DomainError> {
    if delivery.assignee_id == actor_id {
        Ok(())
    } else {
        Err(DomainError::Authorization { actor_id, action })
    }
}

fn creation_action(kind: TransactionType) -> &'static str {
    match kind {
        TransactionType::Borrow => actions::BORROW,
        TransactionType::Return => actions::RETURN,
        TransactionType::Transfer => actions::TRANSFER,
        TransactionType::Purchase => actions::PURCHASE,
    }
}

fn log_transition(before: &transaction::Model, after: &transaction::Model, actor_id: i32) {
    tracing::info!(
        transaction_id = after.id,
        from = %before.status,
        to = %after.status,
        actor = actor_id,
        "🔁 Transaction transition"
    );
}
