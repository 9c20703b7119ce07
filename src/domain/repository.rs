use crate::domain::user::User;
use async_trait::async_trait;

/// Persistence contract for users.
///
/// Failures never surface to callers: they are logged by the implementation
/// and collapse to `false`, `None` or an empty list.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn save(&self, user: &User) -> bool;
    async fn delete_by_id(&self, user_id: i64) -> bool;
    async fn update(&self, user: &User) -> bool;
    async fn get_by_id(&self, user_id: i64) -> Option<User>;
    /// Returns the first matching row; names and passwords are not unique.
    async fn get_by_name_and_password(&self, name: &str, password: &str) -> Option<User>;
    async fn get_all(&self) -> Vec<User>;
    /// Drops and recreates the `users` table.
    async fn init_table(&self) -> bool;
}
