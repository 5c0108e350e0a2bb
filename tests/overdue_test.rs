mod common;

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, Set};

use common::Fixture;
use stockroom::domain::NotificationKind;
use stockroom::infrastructure::sweeper;
use stockroom::models::{item, transaction, TransactionStatus, TransactionType};
use stockroom::utils::time::format_timestamp;

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

async fn borrow_due(fx: &Fixture, item: &item::Model, due: DateTime<Utc>) -> transaction::Model {
    let mut request = fx.borrow_request(item, 1);
    request.due_date = Some(format_timestamp(due));
    let created = fx.service().create(request).await.unwrap();
    fx.service().approve(created.id, fx.keeper).await.unwrap()
}

#[tokio::test]
async fn test_sweep_marks_only_past_due_approved_borrows() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 5, fx.store_a).await;
    let drill = fx.add_item("drill", 5, fx.store_a).await;
    let saw = fx.add_item("saw", 5, fx.store_a).await;

    let late = borrow_due(&fx, &laptop, noon() - Duration::days(2)).await;
    let on_time = borrow_due(&fx, &drill, noon() + Duration::days(2)).await;

    // Pending requests never go overdue
    let mut pending = fx.borrow_request(&saw, 1);
    pending.due_date = Some(format_timestamp(noon() - Duration::days(5)));
    let pending = fx.service().create(pending).await.unwrap();

    let marked = fx.service().sweep_overdue_at(noon()).await.unwrap();
    assert_eq!(marked, 1);

    assert_eq!(fx.transaction(late.id).await.status, TransactionStatus::Overdue);
    assert_eq!(fx.transaction(on_time.id).await.status, TransactionStatus::Approved);
    assert_eq!(fx.transaction(pending.id).await.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 5, fx.store_a).await;
    borrow_due(&fx, &laptop, noon() - Duration::hours(1)).await;

    assert_eq!(fx.service().sweep_overdue_at(noon()).await.unwrap(), 1);
    assert_eq!(fx.service().sweep_overdue_at(noon()).await.unwrap(), 0);
    assert_eq!(
        fx.service()
            .sweep_overdue_at(noon() + Duration::days(3))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_due_exactly_now_is_not_overdue() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 5, fx.store_a).await;
    let borrow = borrow_due(&fx, &laptop, noon()).await;

    assert_eq!(fx.service().sweep_overdue_at(noon()).await.unwrap(), 0);
    let view = fx.service().get_at(borrow.id, noon()).await.unwrap();
    assert_eq!(view.transaction.status, TransactionStatus::Approved);
    assert_eq!(view.overdue_days, None);
}

#[tokio::test]
async fn test_overdue_days_round_up() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 5, fx.store_a).await;
    let borrow = borrow_due(&fx, &laptop, noon()).await;

    let view = fx
        .service()
        .get_at(borrow.id, noon() + Duration::days(2) + Duration::minutes(1))
        .await
        .unwrap();
    assert_eq!(view.transaction.status, TransactionStatus::Overdue);
    assert_eq!(view.overdue_days, Some(3));
}

#[tokio::test]
async fn test_sweep_notifies_requester_and_audits_without_actor() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 5, fx.store_a).await;
    let borrow = borrow_due(&fx, &laptop, noon() - Duration::days(1)).await;

    fx.service().sweep_overdue_at(noon()).await.unwrap();

    // Approved + Overdue
    fx.notifier.wait_for(2).await;
    let kinds = fx.notifier.kinds_for(fx.employee);
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&NotificationKind::Approved));
    assert!(kinds.contains(&NotificationKind::Overdue));

    let entries = fx
        .state
        .audit
        .search(stockroom::services::AuditFilter {
            action: Some("OVERDUE".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].target_id, borrow.id);
    assert_eq!(entries[0].actor_id, None);
}

#[tokio::test]
async fn test_background_sweeper_runs_on_its_interval() {
    let fx = Fixture::new().await;
    let laptop = fx.add_item("laptop", 5, fx.store_a).await;
    let borrow = borrow_due(&fx, &laptop, Utc::now() - Duration::days(1)).await;

    let handle = tokio::spawn(sweeper::run_overdue_sweeper(
        fx.service().clone(),
        StdDuration::from_secs(60),
    ));

    let mut status = TransactionStatus::Approved;
    for _ in 0..50 {
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        status = fx.transaction(borrow.id).await.status;
        if status == TransactionStatus::Overdue {
            break;
        }
    }
    handle.abort();

    assert_eq!(status, TransactionStatus::Overdue);
}

#[tokio::test]
async fn test_sweep_leaves_dated_non_borrows_alone() {
    let fx = Fixture::new().await;
    let chairs = fx.add_item("chairs", 4, fx.store_a).await;
    // Rows written before due dates were limited to borrows
    let stamp = format_timestamp(noon() - Duration::days(10));
    let transfer = transaction::ActiveModel {
        transaction_type: Set(TransactionType::Transfer),
        requester_id: Set(fx.keeper),
        item_id: Set(chairs.id),
        quantity: Set(4),
        origin_store_id: Set(Some(fx.store_a)),
        destination_store_id: Set(Some(fx.store_b)),
        due_date: Set(Some(format_timestamp(noon() - Duration::days(3)))),
        status: Set(TransactionStatus::Approved),
        created_at: Set(stamp.clone()),
        updated_at: Set(stamp),
        ..Default::default()
    }
    .insert(&fx.db)
    .await
    .unwrap();

    assert_eq!(fx.service().sweep_overdue_at(noon()).await.unwrap(), 0);
    let view = fx.service().get_at(transfer.id, noon()).await.unwrap();
    assert_eq!(view.transaction.status, TransactionStatus::Approved);
    assert!(view.overdue_days.is_none());
}
