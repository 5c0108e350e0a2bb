//! Role-based [`Authorizer`] backed by `users.role`.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::domain::{Authorizer, DomainError};
use crate::models::user::{self, Entity as User};
use crate::models::UserRole;

#[derive(Clone)]
pub struct SeaOrmAuthorizer {
    db: DatabaseConnection,
}

impl SeaOrmAuthorizer {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn role_of(&self, user_id: i32) -> Result<Option<UserRole>, DomainError> {
        let found: Option<user::Model> = User::find_by_id(user_id).one(&self.db).await?;
        Ok(found.map(|u| u.role))
    }
}

#[async_trait]
impl Authorizer for SeaOrmAuthorizer {
    async fn can_approve(&self, user_id: i32) -> Result<bool, DomainError> {
        Ok(self.role_of(user_id).await?.is_some_and(UserRole::can_approve))
    }

    async fn has_role(&self, user_id: i32, role: UserRole) -> Result<bool, DomainError> {
        Ok(self.role_of(user_id).await? == Some(role))
    }
}
