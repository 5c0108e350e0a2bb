//! Store-consistency rule: an item goes back to the store it was borrowed from.
//!
//! At most one open borrow exists per item and requester (enforced when borrows
//! are created), so the lookup below is unambiguous. Transfers never pass
//! through here; their destination differs from their origin by definition.

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::domain::DomainError;
use crate::models::transaction::{self, Entity as Transaction};
use crate::models::{TransactionStatus, TransactionType};

/// Statuses in which a borrowed item is still out with the requester.
pub const OUT_ON_LOAN: [TransactionStatus; 2] =
    [TransactionStatus::Approved, TransactionStatus::Overdue];

/// Most recent Borrow of `item_id` by `requester_id` that is still out.
pub async fn find_open_borrow<C: ConnectionTrait>(
    conn: &C,
    item_id: i32,
    requester_id: i32,
) -> Result<Option<transaction::Model>, DomainError> {
    let borrow = Transaction::find()
        .filter(transaction::Column::TransactionType.eq(TransactionType::Borrow))
        .filter(transaction::Column::ItemId.eq(item_id))
        .filter(transaction::Column::RequesterId.eq(requester_id))
        .filter(transaction::Column::Status.is_in(OUT_ON_LOAN))
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_desc(transaction::Column::Id)
        .one(conn)
        .await?;
    Ok(borrow)
}

/// Compares the borrow's origin store with the store the item is coming back to.
pub fn check_store(borrow: &transaction::Model, returned_to: i32) -> Result<(), DomainError> {
    let borrowed_from = borrow.origin_store_id.ok_or_else(|| {
        DomainError::validation(
            "origin_store_id",
            format!("borrow {} has no origin store", borrow.id),
        )
    })?;
    if borrowed_from != returned_to {
        return Err(DomainError::StoreMismatch {
            borrowed_from,
            returned_to,
        });
    }
    Ok(())
}

/// Finds the open borrow a return refers to and checks it targets the right store.
pub async fn validate_return<C: ConnectionTrait>(
    conn: &C,
    item_id: i32,
    requester_id: i32,
    returned_to: i32,
) -> Result<transaction::Model, DomainError> {
    let borrow = find_open_borrow(conn, item_id, requester_id)
        .await?
        .ok_or(DomainError::NoOpenBorrow {
            item_id,
            requester_id,
        })?;
    check_store(&borrow, returned_to)?;
    Ok(borrow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn borrow_from(origin: Option<i32>) -> transaction::Model {
        transaction::Model {
            id: 9,
            transaction_type: TransactionType::Borrow,
            requester_id: 4,
            item_id: 2,
            quantity: 1,
            origin_store_id: origin,
            destination_store_id: None,
            due_date: None,
            status: TransactionStatus::Approved,
            approved_by: Some(1),
            approved_at: None,
            rejection_reason: None,
            return_date: None,
            return_condition: None,
            notes: None,
            cancellation_reason: None,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn same_store_is_accepted() {
        assert!(check_store(&borrow_from(Some(1)), 1).is_ok());
    }

    #[test]
    fn other_store_is_a_mismatch_naming_both() {
        let err = check_store(&borrow_from(Some(1)), 2).unwrap_err();
        assert!(matches!(
            err,
            DomainError::StoreMismatch {
                borrowed_from: 1,
                returned_to: 2
            }
        ));
    }

    #[test]
    fn borrow_without_origin_cannot_be_checked() {
        let err = check_store(&borrow_from(None), 1).unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "origin_store_id", .. }));
    }
}
