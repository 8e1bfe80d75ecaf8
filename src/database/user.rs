use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::user::{User, UserProfile};
use chrono::{DateTime, Utc};
use tracing::info;

#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Create the user keyed by `profile.subject`, or refresh name, picture and
    /// last login of the existing one. Returns the user id.
    async fn upsert_user(&self, profile: &UserProfile, now: DateTime<Utc>) -> Result<String, AppError>;
    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError>;
}

#[async_trait::async_trait]
impl UserDirectory for PostgresRepository {
    async fn upsert_user(&self, profile: &UserProfile, now: DateTime<Utc>) -> Result<String, AppError> {
        // xmax is zero only for a freshly inserted tuple
        let (id, inserted) = sqlx::query_as::<_, (String, bool)>(
            r#"
            INSERT INTO users (id, email, name, picture, created_at, last_login)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                picture = EXCLUDED.picture,
                last_login = EXCLUDED.last_login
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
        .bind(&profile.subject)
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(&profile.picture)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to upsert user", e))?;

        if inserted {
            info!(user_id = %id, email = %profile.email, "new user registered");
        } else {
            info!(user_id = %id, email = %profile.email, "user signed in");
        }

        Ok(id)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, picture, created_at, last_login
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to load user", e))?;

        Ok(user)
    }
}
