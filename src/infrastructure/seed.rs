use crate::models::{item, store, user, ItemStatus, UserRole};
use crate::utils::time;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;

/// Inserts two stores, one user per role and three items. Skips everything if
/// any store already exists, so restarting with `SEED_DEMO` set is harmless.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    if store::Entity::find().count(db).await? > 0 {
        tracing::debug!("Demo data already present, skipping seed");
        return Ok(());
    }
    let now = time::now();

    // 1. Create Users
    let users = [
        ("admin", UserRole::Admin),
        ("keeper", UserRole::StoreKeeper),
        ("employee", UserRole::Employee),
        ("courier", UserRole::DeliveryStaff),
    ];
    for (username, role) in users {
        let model = user::ActiveModel {
            username: Set(username.to_owned()),
            role: Set(role),
            created_at: Set(now.clone()),
            ..Default::default()
        };
        let inserted = user::Entity::insert(model)
            .on_conflict(
                OnConflict::column(user::Column::Username)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await;
        match inserted {
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }

    // 2. Create Stores
    let mut store_ids = Vec::new();
    for (name, location) in [("Main Store", "Building A"), ("Annex", "Building B")] {
        let saved = store::ActiveModel {
            name: Set(name.to_owned()),
            location: Set(Some(location.to_owned())),
            created_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        store_ids.push(saved.id);
    }

    // 3. Create Items
    let items = [
        ("Laptop", 5, 1, store_ids[0]),
        ("Projector", 2, 1, store_ids[0]),
        ("Drill", 3, 0, store_ids[1]),
    ];
    for (name, quantity, threshold, store_id) in items {
        item::ActiveModel {
            name: Set(name.to_owned()),
            quantity: Set(quantity),
            low_stock_threshold: Set(threshold),
            status: Set(ItemStatus::Available),
            store_id: Set(store_id),
            category_id: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    tracing::info!("🌱 Demo data seeded");
    Ok(())
}
