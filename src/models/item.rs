use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// Units on hand in the owning store. Never negative.
    pub quantity: i32,
    pub low_stock_threshold: i32,
    /// Changed only as a side effect of transaction completion:
    /// - `Available` -> `Borrowed` when an approval takes the last unit
    /// - `Borrowed` -> `Available` when stock comes back
    ///
    /// `Maintenance`, `Damaged` and `Reserved` are set by catalog management.
    pub status: ItemStatus,
    pub store_id: i32,
    pub category_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum ItemStatus {
    #[sea_orm(string_value = "Available")]
    Available,
    #[sea_orm(string_value = "Borrowed")]
    Borrowed,
    #[sea_orm(string_value = "Maintenance")]
    Maintenance,
    #[sea_orm(string_value = "Damaged")]
    Damaged,
    #[sea_orm(string_value = "Reserved")]
    Reserved,
}

impl ItemStatus {
    /// Whether new borrow or transfer requests may draw on this item.
    pub fn is_lendable(self) -> bool {
        matches!(self, ItemStatus::Available | ItemStatus::Borrowed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id"
    )]
    Store,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
