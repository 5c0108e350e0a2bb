use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    pub role: UserRole,
    pub created_at: String,
}

/// Roles stored verbatim in `users.role`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum UserRole {
    #[sea_orm(string_value = "Admin")]
    Admin,
    #[sea_orm(string_value = "Store Keeper")]
    #[serde(rename = "Store Keeper")]
    StoreKeeper,
    #[sea_orm(string_value = "Employee")]
    Employee,
    #[sea_orm(string_value = "Delivery Staff")]
    #[serde(rename = "Delivery Staff")]
    DeliveryStaff,
}

impl UserRole {
    /// Roles allowed to approve, reject and assign deliveries.
    pub fn can_approve(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::StoreKeeper)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
