use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

/// Idempotent schema bootstrap. Status columns hold the exact enum names the
/// entities map to; the CHECK lists must stay in sync with the models.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL
            CHECK (role IN ('Admin', 'Store Keeper', 'Employee', 'Delivery Staff')),
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stores (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        location TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        low_stock_threshold INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'Available'
            CHECK (status IN ('Available', 'Borrowed', 'Maintenance', 'Damaged', 'Reserved')),
        store_id INTEGER NOT NULL REFERENCES stores(id),
        category_id INTEGER,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        transaction_type TEXT NOT NULL
            CHECK (transaction_type IN ('Borrow', 'Return', 'Transfer', 'Purchase')),
        requester_id INTEGER NOT NULL REFERENCES users(id),
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE RESTRICT,
        quantity INTEGER NOT NULL CHECK (quantity >= 1),
        origin_store_id INTEGER REFERENCES stores(id),
        destination_store_id INTEGER REFERENCES stores(id),
        due_date TEXT,
        status TEXT NOT NULL DEFAULT 'Pending'
            CHECK (status IN ('Pending', 'Approved', 'Rejected', 'Completed', 'Overdue', 'Cancelled')),
        approved_by INTEGER REFERENCES users(id),
        approved_at TEXT,
        rejection_reason TEXT,
        return_date TEXT,
        return_condition TEXT CHECK (return_condition IN ('Good', 'Fair', 'Poor', 'Damaged')),
        notes TEXT,
        cancellation_reason TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    // One open borrow per item and requester
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_open_borrow
        ON transactions (item_id, requester_id)
        WHERE transaction_type = 'Borrow' AND status IN ('Pending', 'Approved', 'Overdue')
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_transactions_status_due
        ON transactions (status, due_date)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS deliveries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        transaction_id INTEGER NOT NULL UNIQUE REFERENCES transactions(id) ON DELETE CASCADE,
        assignee_id INTEGER NOT NULL REFERENCES users(id),
        status TEXT NOT NULL DEFAULT 'Pending'
            CHECK (status IN ('Pending', 'In-Progress', 'Completed')),
        pickup_at TEXT,
        delivered_at TEXT,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS damages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL REFERENCES items(id),
        transaction_id INTEGER REFERENCES transactions(id),
        reported_by INTEGER REFERENCES users(id),
        quantity INTEGER NOT NULL CHECK (quantity >= 1),
        description TEXT,
        status TEXT NOT NULL DEFAULT 'Reported'
            CHECK (status IN ('Reported', 'Under Repair', 'Resolved', 'Written Off')),
        created_at TEXT NOT NULL
    )
    "#,
    // No foreign key on actor_id; the audit integrity check reports orphans.
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        actor_id INTEGER,
        action_type TEXT NOT NULL,
        target_table TEXT NOT NULL,
        target_id INTEGER NOT NULL,
        old_value TEXT,
        new_value TEXT,
        created_at TEXT
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_audit_logs_created_at
        ON audit_logs (created_at)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_audit_logs_target
        ON audit_logs (target_table, target_id)
    "#,
];

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    for sql in SCHEMA {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_string(),
        ))
        .await?;
    }

    tracing::debug!("Schema ready ({} statements)", SCHEMA.len());
    Ok(())
}
