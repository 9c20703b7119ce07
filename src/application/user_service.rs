use crate::domain::repository::UserRepository;
use crate::domain::user::User;
use std::sync::Arc;
use tracing::{info, instrument};

/// Business facade over the user repository. Every call is forwarded as is.
pub struct UserService<R: UserRepository> {
    user_repository: Arc<R>,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(user_repository: Arc<R>) -> Self {
        Self { user_repository }
    }

    #[instrument(skip(self, user), fields(name = ?user.name, email = ?user.email))]
    pub async fn register(&self, user: &User) -> bool {
        let registered = self.user_repository.save(user).await;
        info!(registered = registered, "Registration processed");
        registered
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn deregister(&self, user: &User) -> bool {
        self.user_repository.delete_by_id(user.id).await
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn update(&self, user: &User) -> bool {
        self.user_repository.update(user).await
    }

    #[instrument(skip(self))]
    pub async fn query_all_users(&self) -> Vec<User> {
        self.user_repository.get_all().await
    }

    #[instrument(skip(self))]
    pub async fn query_user_by_id(&self, id: i64) -> Option<User> {
        self.user_repository.get_by_id(id).await
    }

    #[instrument(skip(self, password))]
    pub async fn query_user_by_name_and_password(
        &self,
        name: &str,
        password: &str,
    ) -> Option<User> {
        self.user_repository
            .get_by_name_and_password(name, password)
            .await
    }

    #[instrument(skip(self))]
    pub async fn init_table(&self) -> bool {
        let initialized = self.user_repository.init_table().await;
        info!(initialized = initialized, "Users table initialization processed");
        initialized
    }
}
