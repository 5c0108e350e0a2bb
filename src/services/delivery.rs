//! Delivery records for Transfer transactions.
//!
//! `Pending -> In-Progress -> Completed`, each step a conditional update on the
//! observed status, same as transaction transitions.

use sea_orm::*;

use crate::domain::DomainError;
use crate::models::delivery::{self, Entity as Delivery};
use crate::models::DeliveryStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStep {
    Pickup,
    Deliver,
}

impl DeliveryStep {
    pub fn verb(self) -> &'static str {
        match self {
            DeliveryStep::Pickup => "be picked up",
            DeliveryStep::Deliver => "be delivered",
        }
    }

    pub fn source(self) -> DeliveryStatus {
        match self {
            DeliveryStep::Pickup => DeliveryStatus::Pending,
            DeliveryStep::Deliver => DeliveryStatus::InProgress,
        }
    }

    pub fn target(self) -> DeliveryStatus {
        match self {
            DeliveryStep::Pickup => DeliveryStatus::InProgress,
            DeliveryStep::Deliver => DeliveryStatus::Completed,
        }
    }
}

pub async fn get<C: ConnectionTrait>(conn: &C, id: i32) -> Result<delivery::Model, DomainError> {
    Delivery::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(DomainError::NotFound {
            resource: "delivery",
            id,
        })
}

pub async fn for_transaction<C: ConnectionTrait>(
    conn: &C,
    transaction_id: i32,
) -> Result<Option<delivery::Model>, DomainError> {
    Ok(Delivery::find()
        .filter(delivery::Column::TransactionId.eq(transaction_id))
        .one(conn)
        .await?)
}

pub async fn create<C: ConnectionTrait>(
    conn: &C,
    transaction_id: i32,
    assignee_id: i32,
    notes: Option<String>,
    now: &str,
) -> Result<delivery::Model, DomainError> {
    let new_delivery = delivery::ActiveModel {
        transaction_id: Set(transaction_id),
        assignee_id: Set(assignee_id),
        status: Set(DeliveryStatus::Pending),
        pickup_at: Set(None),
        delivered_at: Set(None),
        notes: Set(notes),
        created_at: Set(now.to_owned()),
        updated_at: Set(now.to_owned()),
        ..Default::default()
    };
    Ok(new_delivery.insert(conn).await?)
}

/// Moves the delivery one step forward, stamping the pickup or delivery time.
pub async fn advance<C: ConnectionTrait>(
    conn: &C,
    current: &delivery::Model,
    step: DeliveryStep,
    notes: Option<String>,
    now: &str,
) -> Result<delivery::Model, DomainError> {
    if current.status != step.source() {
        return Err(invalid_state(current, step));
    }

    let mut changes = delivery::ActiveModel {
        status: Set(step.target()),
        updated_at: Set(now.to_owned()),
        ..Default::default()
    };
    match step {
        DeliveryStep::Pickup => changes.pickup_at = Set(Some(now.to_owned())),
        DeliveryStep::Deliver => changes.delivered_at = Set(Some(now.to_owned())),
    }
    if notes.is_some() {
        changes.notes = Set(notes);
    }

    let result = Delivery::update_many()
        .set(changes)
        .filter(delivery::Column::Id.eq(current.id))
        .filter(delivery::Column::Status.eq(current.status))
        .exec(conn)
        .await?;

    let latest = get(conn, current.id).await?;
    if result.rows_affected == 0 {
        return Err(invalid_state(&latest, step));
    }
    Ok(latest)
}

fn invalid_state(delivery: &delivery::Model, step: DeliveryStep) -> DomainError {
    DomainError::InvalidState {
        entity: "delivery",
        id: delivery.id,
        state: delivery.status.to_string(),
        action: step.verb(),
    }
}
