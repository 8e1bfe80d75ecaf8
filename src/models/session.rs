use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Where a persisted session stands relative to the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Expired,
    Absent,
}

impl SessionState {
    /// A session is alive strictly before its expiry instant.
    pub fn of(session: Option<&Session>, now: DateTime<Utc>) -> Self {
        match session {
            None => SessionState::Absent,
            Some(s) if s.expires_at > now => SessionState::Active,
            Some(_) => SessionState::Expired,
        }
    }
}

/// Handle returned to the caller after a successful issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
}
