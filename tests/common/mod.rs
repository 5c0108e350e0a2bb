#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use stockroom::db;
use stockroom::domain::{NotificationKind, Notifier};
use stockroom::infrastructure::AppState;
use stockroom::models::{item, store, transaction, user, ItemStatus, TransactionType, UserRole};
use stockroom::services::{NewTransaction, TransactionService};
use stockroom::utils::time;

/// Keeps every notification so tests can assert on them.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(i32, String, NotificationKind)>>,
}

impl RecordingNotifier {
    pub fn kinds_for(&self, user_id: i32) -> Vec<NotificationKind> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _, _)| *to == user_id)
            .map(|(_, _, kind)| *kind)
            .collect()
    }

    /// Notifications are spawned, so give them a moment to land.
    pub async fn wait_for(&self, count: usize) {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: i32, message: String, kind: NotificationKind) {
        self.sent.lock().unwrap().push((user_id, message, kind));
    }
}

pub struct Fixture {
    pub db: DatabaseConnection,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
    pub store_a: i32,
    pub store_b: i32,
    pub admin: i32,
    pub keeper: i32,
    pub employee: i32,
    pub other_employee: i32,
    pub courier: i32,
}

impl Fixture {
    pub async fn new() -> Self {
        let db = db::init_db("sqlite::memory:")
            .await
            .expect("Failed to init DB");
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::with_notifier(db.clone(), notifier.clone());

        let store_a = create_store(&db, "Store A").await;
        let store_b = create_store(&db, "Store B").await;

        Self {
            admin: create_user(&db, "admin", UserRole::Admin).await,
            keeper: create_user(&db, "keeper", UserRole::StoreKeeper).await,
            employee: create_user(&db, "alice", UserRole::Employee).await,
            other_employee: create_user(&db, "bob", UserRole::Employee).await,
            courier: create_user(&db, "courier", UserRole::DeliveryStaff).await,
            db,
            state,
            notifier,
            store_a,
            store_b,
        }
    }

    pub fn service(&self) -> &TransactionService {
        &self.state.transactions
    }

    pub async fn add_item(&self, name: &str, quantity: i32, store_id: i32) -> item::Model {
        let now = time::now();
        item::ActiveModel {
            name: Set(name.to_string()),
            quantity: Set(quantity),
            low_stock_threshold: Set(0),
            status: Set(ItemStatus::Available),
            store_id: Set(store_id),
            category_id: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to create item")
    }

    pub async fn item(&self, id: i32) -> item::Model {
        item::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .unwrap()
            .expect("item exists")
    }

    pub async fn transaction(&self, id: i32) -> transaction::Model {
        transaction::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .unwrap()
            .expect("transaction exists")
    }

    pub fn borrow_request(&self, item: &item::Model, quantity: i32) -> NewTransaction {
        NewTransaction {
            requester_id: self.employee,
            item_id: item.id,
            transaction_type: TransactionType::Borrow,
            quantity,
            origin_store_id: Some(item.store_id),
            destination_store_id: None,
            due_date: None,
            notes: None,
        }
    }

    /// Creates and approves a borrow by `employee`.
    pub async fn approved_borrow(&self, item: &item::Model, quantity: i32) -> transaction::Model {
        let created = self
            .service()
            .create(self.borrow_request(item, quantity))
            .await
            .expect("borrow created");
        self.service()
            .approve(created.id, self.keeper)
            .await
            .expect("borrow approved")
    }
}

async fn create_store(db: &DatabaseConnection, name: &str) -> i32 {
    store::ActiveModel {
        name: Set(name.to_string()),
        location: Set(None),
        created_at: Set(time::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create store")
    .id
}

async fn create_user(db: &DatabaseConnection, username: &str, role: UserRole) -> i32 {
    user::ActiveModel {
        username: Set(username.to_string()),
        role: Set(role),
        created_at: Set(time::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create user")
    .id
}
