use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::session::Session;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Durable session rows. A missing row is reported as `None`/no-op, never as an error.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<(), AppError>;
    async fn get_session(&self, id: &Uuid) -> Result<Option<Session>, AppError>;
    async fn delete_session(&self, id: &Uuid) -> Result<(), AppError>;
    /// Moves `expires_at` forward to `expires_at`; an earlier value is ignored.
    async fn update_session_expiry(&self, id: &Uuid, expires_at: DateTime<Utc>) -> Result<(), AppError>;
    /// Deletes every row with `expires_at < now` and returns how many went.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
    async fn count_active_sessions(&self, user_id: &str, now: DateTime<Utc>) -> Result<i64, AppError>;
}

#[async_trait::async_trait]
impl SessionStore for PostgresRepository {
    async fn create_session(&self, session: &Session) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO user_session (id, user_id, expires_at, ip, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.id)
        .bind(&session.user_id)
        .bind(session.expires_at)
        .bind(&session.ip)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to create session", e))?;

        Ok(())
    }

    async fn get_session(&self, id: &Uuid) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, expires_at, ip, user_agent, created_at
            FROM user_session
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::persistence("Failed to load session", e))?;

        Ok(session)
    }

    async fn delete_session(&self, id: &Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_session WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::persistence("Failed to delete session", e))?;

        Ok(())
    }

    async fn update_session_expiry(&self, id: &Uuid, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE user_session SET expires_at = GREATEST(expires_at, $2) WHERE id = $1")
            .bind(id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::persistence("Failed to update session expiry", e))?;

        Ok(())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM user_session WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::persistence("Failed to delete expired sessions", e))?;

        Ok(result.rows_affected())
    }

    async fn count_active_sessions(&self, user_id: &str, now: DateTime<Utc>) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_session WHERE user_id = $1 AND expires_at > $2")
            .bind(user_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::persistence("Failed to count active sessions", e))?;

        Ok(count)
    }
}
