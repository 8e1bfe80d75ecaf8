use crate::config::SessionConfig;
use crate::database::session::SessionStore;
use crate::error::app_error::AppError;
use crate::models::session::{IssuedSession, Session, SessionState};
use crate::service::clock::Clock;
use crate::service::tasks::TaskRunner;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub ttl: Duration,
    /// When set, a future identity-token expiry replaces `ttl` for newly issued sessions.
    pub honor_token_expiry: bool,
}

impl From<&SessionConfig> for SessionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            ttl: config.ttl(),
            honor_token_expiry: config.honor_token_expiry,
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

/// Issues, validates, refreshes and revokes persisted sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    tasks: Arc<dyn TaskRunner>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, tasks: Arc<dyn TaskRunner>, policy: SessionPolicy) -> Self {
        Self {
            store,
            clock,
            tasks,
            policy,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn expiry_for_issue(&self, now: DateTime<Utc>, token_expiry_hint: Option<DateTime<Utc>>) -> DateTime<Utc> {
        match token_expiry_hint {
            Some(hint) if self.policy.honor_token_expiry && hint > now => hint,
            _ => now + self.policy.ttl,
        }
    }

    /// Persists a new session for `user_id`, then sweeps expired sessions in the background.
    pub async fn issue(
        &self,
        user_id: &str,
        ip: Option<String>,
        user_agent: Option<String>,
        token_expiry_hint: Option<DateTime<Utc>>,
    ) -> Result<IssuedSession, AppError> {
        let now = self.clock.now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            expires_at: self.expiry_for_issue(now, token_expiry_hint),
            ip,
            user_agent,
            created_at: now,
        };

        self.store.create_session(&session).await?;
        info!(user_id = %user_id, session_id = %session.id, expires_at = %session.expires_at, "session issued");

        let store = self.store.clone();
        self.tasks
            .submit(
                "expired session sweep",
                Box::pin(async move {
                    let removed = store.delete_expired_sessions(now).await?;
                    if removed > 0 {
                        info!(removed, "expired sessions swept");
                    }
                    Ok(())
                }),
            )
            .await;

        Ok(IssuedSession {
            id: session.id,
            expires_at: session.expires_at,
        })
    }

    /// True only while the stored session's expiry lies in the future. A stale row
    /// is deleted on sight; failure to delete does not change the answer.
    pub async fn validate(&self, session_id: &Uuid) -> Result<bool, AppError> {
        let session = self.store.get_session(session_id).await?;
        let now = self.clock.now();

        match SessionState::of(session.as_ref(), now) {
            SessionState::Active => Ok(true),
            SessionState::Absent => {
                debug!(session_id = %session_id, "session not found");
                Ok(false)
            }
            SessionState::Expired => {
                debug!(session_id = %session_id, "session expired");
                if let Err(err) = self.store.delete_session(session_id).await {
                    warn!(session_id = %session_id, error = ?err, "failed to delete expired session");
                }
                Ok(false)
            }
        }
    }

    /// Extends the session to `now + ttl`. Never shortens it.
    pub async fn refresh(&self, session_id: &Uuid) -> Result<(), AppError> {
        let expires_at = self.clock.now() + self.policy.ttl;
        self.store.update_session_expiry(session_id, expires_at).await
    }

    pub async fn schedule_refresh(&self, session_id: Uuid) {
        let manager = self.clone();
        self.tasks
            .submit("session refresh", Box::pin(async move { manager.refresh(&session_id).await }))
            .await;
    }

    pub async fn revoke(&self, session_id: &Uuid) -> Result<(), AppError> {
        self.store.delete_session(session_id).await?;
        info!(session_id = %session_id, "session revoked");
        Ok(())
    }

    pub async fn count_active(&self, user_id: &str) -> Result<i64, AppError> {
        self.store.count_active_sessions(user_id, self.clock.now()).await
    }
}
