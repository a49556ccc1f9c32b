use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::repo_types::User, db::PgRepo};

/// Credential store.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Inserts the user unless the username exists. `None` means it was taken;
    /// the check and the insert are a single atomic statement.
    async fn create_user(&self, username: &str, password_hash: &str)
        -> anyhow::Result<Option<User>>;

    /// Case-sensitive exact lookup.
    async fn find_user(&self, username: &str) -> anyhow::Result<Option<User>>;
}

#[async_trait]
impl UserRepo for PgRepo {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (username) DO NOTHING
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }

    async fn find_user(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await?;
        Ok(user)
    }
}
