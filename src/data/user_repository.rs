use crate::data::error::DataError;
use crate::data::mapping::{Column, Entity, SqlType, SqlValue};
use crate::data::template::{SqlTemplate, map_all, map_first};
use crate::domain::repository::UserRepository;
use crate::domain::user::User;
use async_trait::async_trait;
use tracing::{debug, error, instrument, trace, warn};

pub const QUERY_ALL_USERS_SQL: &str = "SELECT id,name,password,email,phoneNumber FROM users";

pub const QUERY_USER_BY_NAME_AND_PASSWORD_SQL: &str =
    "SELECT id,name,password,email,phoneNumber FROM users WHERE name=?1 and password=?2";

pub const DROP_USERS_TABLE_DDL_SQL: &str = "DROP TABLE IF EXISTS users";

pub const CREATE_USERS_TABLE_DDL_SQL: &str = "CREATE TABLE users(\
    id INTEGER PRIMARY KEY AUTOINCREMENT, \
    name VARCHAR(16) NOT NULL, \
    password VARCHAR(64) NOT NULL, \
    email VARCHAR(64) NOT NULL, \
    phoneNumber VARCHAR(64) NOT NULL)";

static USER_COLUMNS: [Column<User>; 5] = [
    Column {
        name: "id",
        kind: SqlType::Long,
        primary_key: true,
        get: |user| user.id.into(),
        set: |user, value| {
            user.id = value.into_long("id")?.unwrap_or_default();
            Ok(())
        },
    },
    Column {
        name: "name",
        kind: SqlType::Text,
        primary_key: false,
        get: |user| user.name.clone().into(),
        set: |user, value| {
            user.name = value.into_text("name")?;
            Ok(())
        },
    },
    Column {
        name: "password",
        kind: SqlType::Text,
        primary_key: false,
        get: |user| user.password.clone().into(),
        set: |user, value| {
            user.password = value.into_text("password")?;
            Ok(())
        },
    },
    Column {
        name: "email",
        kind: SqlType::Text,
        primary_key: false,
        get: |user| user.email.clone().into(),
        set: |user, value| {
            user.email = value.into_text("email")?;
            Ok(())
        },
    },
    Column {
        name: "phoneNumber",
        kind: SqlType::Text,
        primary_key: false,
        get: |user| user.phone_number.clone().into(),
        set: |user, value| {
            user.phone_number = value.into_text("phoneNumber")?;
            Ok(())
        },
    },
];

impl Entity for User {
    const TABLE: &'static str = "users";

    fn columns() -> &'static [Column<Self>] {
        &USER_COLUMNS
    }
}

/// Shared handler for every repository call: log and swallow.
fn log_data_error(e: &DataError) {
    error!(error = %e, "Database operation failed");
}

#[derive(Clone)]
pub struct DatabaseUserRepository {
    template: SqlTemplate,
}

impl DatabaseUserRepository {
    pub fn new(template: SqlTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl UserRepository for DatabaseUserRepository {
    #[instrument(skip(self, user), fields(name = ?user.name, email = ?user.email))]
    async fn save(&self, user: &User) -> bool {
        trace!("Inserting user");
        let saved = self
            .template
            .execute_insert(user, log_data_error)
            .await
            .unwrap_or(false);
        debug!(saved = saved, "User insert finished");
        saved
    }

    async fn delete_by_id(&self, user_id: i64) -> bool {
        trace!(user_id = user_id, "Delete by id is not supported");
        false
    }

    async fn update(&self, user: &User) -> bool {
        trace!(user_id = user.id, "Update is not supported");
        false
    }

    async fn get_by_id(&self, user_id: i64) -> Option<User> {
        trace!(user_id = user_id, "Lookup by id is not supported");
        None
    }

    #[instrument(skip(self, password), fields(name = name))]
    async fn get_by_name_and_password(&self, name: &str, password: &str) -> Option<User> {
        trace!("Looking up user by name and password");
        let user = self
            .template
            .execute_query(
                QUERY_USER_BY_NAME_AND_PASSWORD_SQL,
                &[SqlValue::from(name), SqlValue::from(password)],
                map_first::<User>,
                log_data_error,
            )
            .await
            .flatten();
        match &user {
            Some(u) => debug!(user_id = u.id, "User found"),
            None => trace!("No user matches name and password"),
        }
        user
    }

    #[instrument(skip(self))]
    async fn get_all(&self) -> Vec<User> {
        let users = self
            .template
            .execute_query(QUERY_ALL_USERS_SQL, &[], map_all::<User>, log_data_error)
            .await
            .unwrap_or_default();
        debug!(count = users.len(), "Loaded users");
        users
    }

    #[instrument(skip(self))]
    async fn init_table(&self) -> bool {
        let ddl = format!("{DROP_USERS_TABLE_DDL_SQL}; {CREATE_USERS_TABLE_DDL_SQL};");
        let created = self
            .template
            .execute_batch(&ddl, log_data_error)
            .await
            .is_some();
        if created {
            debug!("Users table initialized");
        } else {
            warn!("Users table initialization failed");
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::connection::{DataSource, DbConnectionManager};
    use crate::data::mapping::{field_mapping, insert_sql};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn repository() -> DatabaseUserRepository {
        let manager = DbConnectionManager::open(DataSource::Memory).unwrap();
        DatabaseUserRepository::new(SqlTemplate::new(Arc::new(manager)))
    }

    async fn initialized_repository() -> DatabaseUserRepository {
        let repo = repository();
        assert!(repo.init_table().await);
        repo
    }

    fn user(name: &str, password: &str, email: &str) -> User {
        User {
            id: 0,
            name: Some(name.to_string()),
            password: Some(password.to_string()),
            email: Some(email.to_string()),
            phone_number: Some("13800000000".to_string()),
        }
    }

    #[test]
    fn test_user_insert_statement_matches_users_table() {
        assert_eq!(
            insert_sql::<User>().unwrap(),
            "INSERT INTO users (name, password, email, phoneNumber) VALUES (?1, ?2, ?3, ?4)"
        );
    }

    #[tokio::test]
    async fn test_save_user_saves_user_correctly() {
        let repo = initialized_repository().await;

        assert!(repo.save(&user("alice", "secret", "alice@example.com")).await);

        let users = repo.get_all().await;
        assert_eq!(users.len(), 1);
        let saved = &users[0];
        assert_eq!(saved.id, 1);
        assert_eq!(saved.name.as_deref(), Some("alice"));
        assert_eq!(saved.password.as_deref(), Some("secret"));
        assert_eq!(saved.email.as_deref(), Some("alice@example.com"));
        assert_eq!(saved.phone_number.as_deref(), Some("13800000000"));
    }

    #[tokio::test]
    async fn test_save_ignores_caller_supplied_id() {
        let repo = initialized_repository().await;
        let mut first = user("bob", "pw", "bob@example.com");
        first.id = 42;

        assert!(repo.save(&first).await);

        assert_eq!(repo.get_all().await[0].id, 1);
    }

    #[tokio::test]
    async fn test_save_returns_false_when_required_column_is_missing() {
        let repo = initialized_repository().await;
        let incomplete = User {
            email: Some("only@example.com".to_string()),
            password: Some("pw".to_string()),
            ..User::default()
        };

        assert!(!repo.save(&incomplete).await);
        assert!(repo.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_save_returns_false_without_table() {
        let repo = repository();

        assert!(!repo.save(&user("carol", "pw", "carol@example.com")).await);
    }

    #[tokio::test]
    async fn test_get_by_name_and_password_returns_first_match() {
        let repo = initialized_repository().await;
        repo.save(&user("dave", "pw", "first@example.com")).await;
        repo.save(&user("dave", "pw", "second@example.com")).await;

        let found = repo.get_by_name_and_password("dave", "pw").await.unwrap();
        assert_eq!(found.id, 1);
        assert_eq!(found.email.as_deref(), Some("first@example.com"));
    }

    #[tokio::test]
    async fn test_get_by_name_and_password_requires_both_to_match() {
        let repo = initialized_repository().await;
        repo.save(&user("erin", "right", "erin@example.com")).await;

        assert!(repo.get_by_name_and_password("erin", "wrong").await.is_none());
        assert!(repo.get_by_name_and_password("Erin", "right").await.is_none());
    }

    #[tokio::test]
    async fn test_get_all_returns_empty_when_query_fails() {
        let repo = repository();

        assert!(repo.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_init_table_drops_existing_rows() {
        let repo = initialized_repository().await;
        repo.save(&user("frank", "pw", "frank@example.com")).await;

        assert!(repo.init_table().await);
        assert!(repo.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_operations_return_placeholders() {
        let repo = initialized_repository().await;
        let saved = user("gina", "pw", "gina@example.com");
        repo.save(&saved).await;

        assert!(!repo.delete_by_id(1).await);
        assert!(!repo.update(&saved).await);
        assert!(repo.get_by_id(1).await.is_none());
        assert_eq!(repo.get_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writes() {
        let repo = initialized_repository().await;

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let repo_clone = repo.clone();
                let new_user = user(
                    &format!("user{}", i),
                    &format!("pw{}", i),
                    &format!("user{}@example.com", i),
                );
                tokio::spawn(async move { repo_clone.save(&new_user).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap());
        }

        let users = repo.get_all().await;
        assert_eq!(users.len(), 10);
        for i in 0..10 {
            let found = repo
                .get_by_name_and_password(&format!("user{}", i), &format!("pw{}", i))
                .await;
            assert_eq!(
                found.unwrap().email,
                Some(format!("user{}@example.com", i))
            );
        }
    }

    #[test]
    fn test_text_in_id_column_is_a_mapping_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_USERS_TABLE_DDL_SQL).unwrap();
        conn.execute(
            "INSERT INTO users (name, password, email, phoneNumber) VALUES ('h', 'pw', 'h@example.com', '1')",
            [],
        )
        .unwrap();

        let mut stmt = conn
            .prepare("SELECT 'abc' AS id, name, password, email, phoneNumber FROM users")
            .unwrap();
        let result = stmt
            .query_row([], |row| Ok(field_mapping::<User>(row)))
            .unwrap();

        assert!(matches!(
            result,
            Err(DataError::Mapping {
                column: "id",
                expected: SqlType::Long,
                found: "TEXT",
            })
        ));
    }

    #[tokio::test]
    async fn test_save_on_locked_database_keeps_runtime_responsive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.db");
        let manager = DbConnectionManager::open(DataSource::File(path.clone())).unwrap();
        let repo = DatabaseUserRepository::new(SqlTemplate::new(Arc::new(manager)));
        assert!(repo.init_table().await);

        // A second connection holds the write lock for a while
        let locker = rusqlite::Connection::open(&path).unwrap();
        locker.execute_batch("BEGIN EXCLUSIVE;").unwrap();
        let unlock = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            locker.execute_batch("COMMIT;").unwrap();
        });

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_millis(10));
                loop {
                    interval.tick().await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let saved = repo.save(&user("ivan", "pw", "ivan@example.com")).await;
        let ticks_during_save = ticks.load(Ordering::SeqCst);
        ticker.abort();
        unlock.join().unwrap();

        assert!(saved);
        assert!(
            ticks_during_save >= 5,
            "runtime stalled while waiting for the lock: {} ticks",
            ticks_during_save
        );
        assert_eq!(repo.get_all().await.len(), 1);
    }
}
