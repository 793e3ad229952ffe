use async_trait::async_trait;
use uuid::Uuid;

use crate::models::user::{PublicUser, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error>;
    async fn find_public_user_by_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<PublicUser>, sqlx::Error>;
    /// Invite-flow lookup: returns the existing user for the email or creates
    /// a placeholder account (username = email). The bool is true when a new
    /// row was inserted.
    async fn get_or_create_by_email(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<(User, bool), sqlx::Error>;
    async fn update_user_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error>;
    async fn is_username_taken(&self, username: &str) -> Result<bool, sqlx::Error>;
    async fn is_email_taken(&self, email: &str) -> Result<bool, sqlx::Error>;
}
