//! Transaction state machine.
//!
//! [`check`] is the pure transition table. [`apply`] persists a transition as a
//! single conditional update keyed on the status the caller observed, so two
//! concurrent callers can never both move the same row.

use sea_orm::{ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::domain::DomainError;
use crate::models::transaction::{self, Entity as Transaction};
use crate::models::{TransactionStatus, TransactionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Reject,
    Complete,
    Return,
    MarkOverdue,
    Cancel,
}

impl Transition {
    pub const ALL: [Transition; 6] = [
        Transition::Approve,
        Transition::Reject,
        Transition::Complete,
        Transition::Return,
        Transition::MarkOverdue,
        Transition::Cancel,
    ];

    pub fn verb(self) -> &'static str {
        match self {
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Complete => "complete",
            Transition::Return => "return",
            Transition::MarkOverdue => "become overdue",
            Transition::Cancel => "cancel",
        }
    }

    /// Statuses this transition may leave from.
    pub fn sources(self) -> &'static [TransactionStatus] {
        use TransactionStatus::*;
        match self {
            Transition::Approve | Transition::Reject => &[Pending],
            Transition::Complete | Transition::MarkOverdue => &[Approved],
            Transition::Return => &[Approved, Overdue],
            Transition::Cancel => &[Pending, Approved],
        }
    }

    pub fn target(self) -> TransactionStatus {
        match self {
            Transition::Approve => TransactionStatus::Approved,
            Transition::Reject => TransactionStatus::Rejected,
            Transition::Complete | Transition::Return => TransactionStatus::Completed,
            Transition::MarkOverdue => TransactionStatus::Overdue,
            Transition::Cancel => TransactionStatus::Cancelled,
        }
    }

    fn applies_to(self, kind: TransactionType) -> bool {
        match self {
            Transition::Return => kind == TransactionType::Borrow,
            _ => true,
        }
    }
}

/// Returns the status `transition` leads to from the transaction's current
/// status, or `InvalidState` if no edge exists.
pub fn check(
    tx: &transaction::Model,
    transition: Transition,
) -> Result<TransactionStatus, DomainError> {
    if !transition.applies_to(tx.transaction_type) {
        return Err(DomainError::InvalidState {
            entity: "transaction",
            id: tx.id,
            state: format!("{} ({})", tx.status, tx.transaction_type),
            action: transition.verb(),
        });
    }
    if !transition.sources().contains(&tx.status) {
        return Err(invalid_state(tx, transition));
    }
    Ok(transition.target())
}

fn invalid_state(tx: &transaction::Model, transition: Transition) -> DomainError {
    DomainError::InvalidState {
        entity: "transaction",
        id: tx.id,
        state: tx.status.to_string(),
        action: transition.verb(),
    }
}

/// Persists `transition` together with the extra column `changes`.
///
/// The update only matches while the row still holds `current.status`. Zero rows
/// affected means another caller moved it first: the row is re-read and the
/// result is `InvalidState` against its actual status.
pub async fn apply<C: ConnectionTrait>(
    conn: &C,
    current: &transaction::Model,
    transition: Transition,
    mut changes: transaction::ActiveModel,
    now: &str,
) -> Result<transaction::Model, DomainError> {
    let target = check(current, transition)?;
    changes.status = Set(target);
    changes.updated_at = Set(now.to_owned());

    let result = Transaction::update_many()
        .set(changes)
        .filter(transaction::Column::Id.eq(current.id))
        .filter(transaction::Column::Status.eq(current.status))
        .exec(conn)
        .await?;

    let latest = Transaction::find_by_id(current.id)
        .one(conn)
        .await?
        .ok_or(DomainError::NotFound {
            resource: "transaction",
            id: current.id,
        })?;

    if result.rows_affected == 0 {
        return Err(invalid_state(&latest, transition));
    }

    Ok(latest)
}
