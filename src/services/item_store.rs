//! Item data access used by transaction completion.
//!
//! All writes are meant to run on the same database transaction as the status
//! change that caused them, so the item and the transaction commit or roll back
//! together.

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::domain::DomainError;
use crate::models::item::{self, Entity as Item};
use crate::models::ItemStatus;

/// Before/after snapshots of one item write, kept for the audit trail.
#[derive(Debug, Clone)]
pub struct ItemChange {
    pub before: item::Model,
    pub after: item::Model,
}

pub async fn get<C: ConnectionTrait>(conn: &C, item_id: i32) -> Result<item::Model, DomainError> {
    Item::find_by_id(item_id)
        .one(conn)
        .await?
        .ok_or(DomainError::NotFound {
            resource: "item",
            id: item_id,
        })
}

/// Adds `delta` units (negative to take stock out) with a guarded update that
/// refuses to go below zero, then brings the status in line with the new stock.
pub async fn adjust_quantity<C: ConnectionTrait>(
    conn: &C,
    item_id: i32,
    delta: i32,
    now: &str,
) -> Result<ItemChange, DomainError> {
    let before = get(conn, item_id).await?;

    let mut update = Item::update_many()
        .col_expr(
            item::Column::Quantity,
            Expr::col(item::Column::Quantity).add(delta),
        )
        .col_expr(item::Column::UpdatedAt, Expr::value(now.to_owned()))
        .filter(item::Column::Id.eq(item_id));
    if delta < 0 {
        update = update.filter(item::Column::Quantity.gte(-delta));
    }

    let result = update.exec(conn).await?;
    if result.rows_affected == 0 {
        let current = get(conn, item_id).await?;
        return Err(DomainError::validation(
            "quantity",
            format!(
                "insufficient stock for item {}: requested {}, available {}",
                item_id, -delta, current.quantity
            ),
        ));
    }

    let mut after = get(conn, item_id).await?;
    let follow = match (after.status, after.quantity) {
        (ItemStatus::Available, 0) => Some(ItemStatus::Borrowed),
        (ItemStatus::Borrowed, q) if q > 0 => Some(ItemStatus::Available),
        _ => None,
    };
    if let Some(status) = follow {
        set_status(conn, item_id, status, now).await?;
        after.status = status;
    }

    Ok(ItemChange { before, after })
}

pub async fn set_status<C: ConnectionTrait>(
    conn: &C,
    item_id: i32,
    status: ItemStatus,
    now: &str,
) -> Result<(), DomainError> {
    Item::update_many()
        .col_expr(item::Column::Status, Expr::value(status))
        .col_expr(item::Column::UpdatedAt, Expr::value(now.to_owned()))
        .filter(item::Column::Id.eq(item_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Moves the item to another store (Transfer completion).
pub async fn relocate<C: ConnectionTrait>(
    conn: &C,
    item_id: i32,
    store_id: i32,
    now: &str,
) -> Result<ItemChange, DomainError> {
    let before = get(conn, item_id).await?;
    Item::update_many()
        .col_expr(item::Column::StoreId, Expr::value(store_id))
        .col_expr(item::Column::UpdatedAt, Expr::value(now.to_owned()))
        .filter(item::Column::Id.eq(item_id))
        .exec(conn)
        .await?;
    let after = get(conn, item_id).await?;
    Ok(ItemChange { before, after })
}
