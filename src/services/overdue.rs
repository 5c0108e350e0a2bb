//! Overdue detection.
//!
//! Pure functions over a transaction and an evaluation time. Persisting the
//! reclassification is the façade's job (on read and in the scheduled sweep).

use chrono::{DateTime, Utc};

use crate::models::transaction;
use crate::models::{TransactionStatus, TransactionType};
use crate::utils::time::parse_timestamp;

const SECONDS_PER_DAY: i64 = 86_400;

/// Whether the transaction is an Approved Borrow with a due date strictly before `now`.
pub fn is_due(tx: &transaction::Model, now: DateTime<Utc>) -> bool {
    tx.transaction_type == TransactionType::Borrow
        && tx.status == TransactionStatus::Approved
        && due_date(tx).is_some_and(|due| due < now)
}

/// Returns the transaction as it should be seen at `now`: an Approved Borrow past
/// its due date comes back Overdue, anything else comes back unchanged.
pub fn detect_overdue(tx: &transaction::Model, now: DateTime<Utc>) -> transaction::Model {
    let mut seen = tx.clone();
    if is_due(tx, now) {
        seen.status = TransactionStatus::Overdue;
    }
    seen
}

/// Whole days past due, rounded up. `None` unless the transaction is Overdue
/// (or would be at `now`) and has a due date.
pub fn overdue_days(tx: &transaction::Model, now: DateTime<Utc>) -> Option<i64> {
    if !(tx.status == TransactionStatus::Overdue || is_due(tx, now)) {
        return None;
    }
    let due = due_date(tx)?;
    let late = (now - due).num_seconds().max(0);
    Some((late + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY)
}

fn due_date(tx: &transaction::Model) -> Option<DateTime<Utc>> {
    tx.due_date.as_deref().and_then(parse_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::format_timestamp;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, 9, 0, 0).unwrap()
    }

    fn borrow(status: TransactionStatus, due: Option<DateTime<Utc>>) -> transaction::Model {
        transaction::Model {
            id: 1,
            transaction_type: TransactionType::Borrow,
            requester_id: 3,
            item_id: 1,
            quantity: 1,
            origin_store_id: Some(1),
            destination_store_id: None,
            due_date: due.map(format_timestamp),
            status,
            approved_by: Some(2),
            approved_at: None,
            rejection_reason: None,
            return_date: None,
            return_condition: None,
            notes: None,
            cancellation_reason: None,
            created_at: "2026-06-01T09:00:00Z".into(),
            updated_at: "2026-06-01T09:00:00Z".into(),
        }
    }

    #[test]
    fn approved_past_due_becomes_overdue() {
        let tx = borrow(TransactionStatus::Approved, Some(now() - Duration::days(1)));
        let seen = detect_overdue(&tx, now());
        assert_eq!(seen.status, TransactionStatus::Overdue);
        assert_eq!(overdue_days(&seen, now()), Some(1));
    }

    #[test]
    fn partial_days_round_up() {
        let tx = borrow(
            TransactionStatus::Approved,
            Some(now() - Duration::days(2) - Duration::hours(3)),
        );
        assert_eq!(overdue_days(&tx, now()), Some(3));
    }

    #[test]
    fn due_exactly_now_is_not_overdue() {
        let tx = borrow(TransactionStatus::Approved, Some(now()));
        assert_eq!(detect_overdue(&tx, now()), tx);
        assert_eq!(overdue_days(&tx, now()), None);
    }

    #[test]
    fn other_states_are_left_alone() {
        let past = Some(now() - Duration::days(5));
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Rejected,
            TransactionStatus::Completed,
            TransactionStatus::Cancelled,
        ] {
            let tx = borrow(status, past);
            assert_eq!(detect_overdue(&tx, now()), tx);
            assert_eq!(overdue_days(&tx, now()), None);
        }
        assert_eq!(
            detect_overdue(&borrow(TransactionStatus::Approved, None), now()).status,
            TransactionStatus::Approved
        );
    }

    #[test]
    fn only_borrows_go_overdue() {
        for kind in [
            TransactionType::Return,
            TransactionType::Transfer,
            TransactionType::Purchase,
        ] {
            let mut tx = borrow(TransactionStatus::Approved, Some(now() - Duration::days(3)));
            tx.transaction_type = kind;
            assert_eq!(detect_overdue(&tx, now()).status, TransactionStatus::Approved);
            assert_eq!(overdue_days(&tx, now()), None);
        }
    }

    #[test]
    fn detection_is_idempotent() {
        let tx = borrow(TransactionStatus::Approved, Some(now() - Duration::hours(30)));
        let once = detect_overdue(&tx, now());
        let twice = detect_overdue(&once, now());
        assert_eq!(once, twice);
        assert_eq!(overdue_days(&once, now()), overdue_days(&twice, now()));
        assert_eq!(overdue_days(&twice, now()), Some(2));
    }
}
