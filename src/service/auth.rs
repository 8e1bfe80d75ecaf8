use crate::database::user::UserDirectory;
use crate::error::app_error::AppError;
use crate::models::session::IssuedSession;
use crate::service::identity::{Claims, IdentityVerifier};
use crate::service::session::SessionManager;
use std::sync::Arc;
use tracing::warn;

/// Everything a successful sign-in produced.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user_id: String,
    pub claims: Claims,
    pub session: IssuedSession,
    pub active_sessions: i64,
}

/// Request metadata recorded on the session row.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub struct AuthService {
    pub verifier: Arc<dyn IdentityVerifier>,
    pub users: Arc<dyn UserDirectory>,
    pub sessions: SessionManager,
}

impl AuthService {
    pub fn new(verifier: Arc<dyn IdentityVerifier>, users: Arc<dyn UserDirectory>, sessions: SessionManager) -> Self {
        Self { verifier, users, sessions }
    }

    /// Verify the token, reconcile the user and open a new session.
    pub async fn login(&self, credential: &str, client: ClientInfo) -> Result<LoginOutcome, AppError> {
        let claims = self.verifier.verify(credential).await?;
        let user_id = self.users.upsert_user(&claims.profile(), self.sessions.now()).await?;
        let session = self
            .sessions
            .issue(&user_id, client.ip, client.user_agent, Some(claims.expires_at))
            .await?;
        let active_sessions = self.active_sessions(&user_id).await;

        Ok(LoginOutcome {
            user_id,
            claims,
            session,
            active_sessions,
        })
    }

    /// Informational count; a lookup failure shows as zero rather than failing the request.
    pub async fn active_sessions(&self, user_id: &str) -> i64 {
        match self.sessions.count_active(user_id).await {
            Ok(count) => count,
            Err(err) => {
                warn!(user_id = %user_id, error = ?err, "failed to count active sessions");
                0
            }
        }
    }

    /// Revoke a session during logout. Failures are logged only.
    pub async fn logout(&self, session_id: &uuid::Uuid) {
        if let Err(err) = self.sessions.revoke(session_id).await {
            warn!(session_id = %session_id, error = ?err, "failed to revoke session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::session::SessionStore;
    use crate::service::clock::Clock;
    use crate::service::session::SessionPolicy;
    use crate::service::tasks::InlineTaskRunner;
    use crate::test_utils::{ManualClock, MemoryRepository, StaticVerifier, sample_claims};
    use chrono::Duration;

    fn service(repo: Arc<MemoryRepository>, clock: Arc<ManualClock>) -> AuthService {
        let verifier = StaticVerifier::default().with_token("good.token.sig", sample_claims("g-123", "a@b.com", "A B"));
        let sessions = SessionManager::new(repo.clone(), clock, Arc::new(InlineTaskRunner), SessionPolicy::default());
        AuthService::new(Arc::new(verifier), repo, sessions)
    }

    #[tokio::test]
    async fn first_login_creates_user_and_session() {
        let repo = Arc::new(MemoryRepository::default());
        let clock = Arc::new(ManualClock::default());
        let auth = service(repo.clone(), clock.clone());

        let outcome = auth.login("good.token.sig", ClientInfo::default()).await.unwrap();

        assert_eq!(outcome.user_id, "g-123");
        assert_eq!(outcome.claims.email, "a@b.com");
        assert_eq!(outcome.active_sessions, 1);
        assert_eq!(outcome.session.expires_at, clock.now() + Duration::days(30));
        let stored = repo.get_session(&outcome.session.id).await.unwrap().expect("session row");
        assert_eq!(stored.user_id, "g-123");
    }

    #[tokio::test]
    async fn second_login_reuses_user_and_adds_session() {
        let repo = Arc::new(MemoryRepository::default());
        let clock = Arc::new(ManualClock::default());
        let auth = service(repo.clone(), clock.clone());

        let first = auth.login("good.token.sig", ClientInfo::default()).await.unwrap();
        clock.advance(Duration::hours(3));
        let second = auth.login("good.token.sig", ClientInfo::default()).await.unwrap();

        assert_eq!(repo.user_count(), 1);
        assert_ne!(first.session.id, second.session.id);
        assert_eq!(second.active_sessions, 2);
        let user = repo.get_user("g-123").await.unwrap().unwrap();
        assert_eq!(user.last_login, clock.now());
    }

    #[tokio::test]
    async fn rejected_token_creates_nothing() {
        let repo = Arc::new(MemoryRepository::default());
        let auth = service(repo.clone(), Arc::new(ManualClock::default()));

        let result = auth.login("forged.token.sig", ClientInfo::default()).await;

        assert!(matches!(result, Err(AppError::InvalidToken { .. })));
        assert_eq!(repo.user_count(), 0);
        assert!(repo.session_ids().is_empty());
    }

    #[tokio::test]
    async fn logout_swallows_store_failures() {
        let repo = Arc::new(MemoryRepository::default());
        let auth = service(repo.clone(), Arc::new(ManualClock::default()));
        let outcome = auth.login("good.token.sig", ClientInfo::default()).await.unwrap();

        repo.fail_deletes(true);
        auth.logout(&outcome.session.id).await;
        assert!(repo.get_session(&outcome.session.id).await.unwrap().is_some());

        repo.fail_deletes(false);
        auth.logout(&outcome.session.id).await;
        assert!(repo.get_session(&outcome.session.id).await.unwrap().is_none());
    }
}
