pub mod audit_log;
pub mod damage;
pub mod delivery;
pub mod item;
pub mod store;
pub mod transaction;
pub mod user;

pub use delivery::DeliveryStatus;
pub use item::ItemStatus;
pub use transaction::{ReturnCondition, TransactionStatus, TransactionType};
pub use user::UserRole;

// Names the OpenAPI document uses for the entity rows.
pub type AuditLogEntry = audit_log::Model;
pub type Delivery = delivery::Model;
pub type Transaction = transaction::Model;
