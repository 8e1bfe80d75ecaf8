use crate::config::{Config, DatabaseConfig};
use crate::database::session::SessionStore;
use crate::database::user::UserDirectory;
use crate::error::app_error::AppError;
use crate::models::session::Session;
use crate::models::user::{User, UserProfile};
use crate::service::auth::AuthService;
use crate::service::clock::Clock;
use crate::service::identity::{Claims, IdentityVerifier};
use crate::service::session::{SessionManager, SessionPolicy};
use crate::service::tasks::InlineTaskRunner;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rocket::local::asynchronous::Client;
use rocket::{Build, Rocket};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

fn store_error(what: &str) -> AppError {
    AppError::persistence(what, sqlx::Error::Protocol(what.to_string()))
}

/// In-memory user directory and session store with the same semantics as Postgres,
/// minus the foreign key from sessions to users.
#[derive(Default)]
pub struct MemoryRepository {
    users: Mutex<HashMap<String, User>>,
    sessions: Mutex<HashMap<Uuid, Session>>,
    fail_deletes: AtomicBool,
}

impl MemoryRepository {
    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn session_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.sessions.lock().unwrap().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Make `delete_session` fail until switched back.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl UserDirectory for MemoryRepository {
    async fn upsert_user(&self, profile: &UserProfile, now: DateTime<Utc>) -> Result<String, AppError> {
        let mut users = self.users.lock().unwrap();

        if let Some(user) = users.get_mut(&profile.subject) {
            user.name = profile.name.clone();
            user.picture = profile.picture.clone();
            user.last_login = now;
            return Ok(user.id.clone());
        }

        if users.values().any(|u| u.email == profile.email) {
            return Err(store_error("duplicate key value violates unique constraint \"users_email_key\""));
        }

        users.insert(
            profile.subject.clone(),
            User {
                id: profile.subject.clone(),
                email: profile.email.clone(),
                name: profile.name.clone(),
                picture: profile.picture.clone(),
                created_at: now,
                last_login: now,
            },
        );
        Ok(profile.subject.clone())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryRepository {
    async fn create_session(&self, session: &Session) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(&session.id) {
            return Err(store_error("duplicate key value violates unique constraint \"user_session_pkey\""));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &Uuid) -> Result<Option<Session>, AppError> {
        Ok(self.sessions.lock().unwrap().get(id).cloned())
    }

    async fn delete_session(&self, id: &Uuid) -> Result<(), AppError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(store_error("connection reset"));
        }
        self.sessions.lock().unwrap().remove(id);
        Ok(())
    }

    async fn update_session_expiry(&self, id: &Uuid, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(id) {
            session.expires_at = session.expires_at.max(expires_at);
        }
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at >= now);
        Ok((before - sessions.len()) as u64)
    }

    async fn count_active_sessions(&self, user_id: &str, now: DateTime<Utc>) -> Result<i64, AppError> {
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions.values().filter(|s| s.user_id == user_id && s.expires_at > now).count() as i64)
    }
}

/// A session store whose every call fails, as if the database were down.
pub struct FailingStore;

#[async_trait::async_trait]
impl SessionStore for FailingStore {
    async fn create_session(&self, _session: &Session) -> Result<(), AppError> {
        Err(store_error("database unavailable"))
    }

    async fn get_session(&self, _id: &Uuid) -> Result<Option<Session>, AppError> {
        Err(store_error("database unavailable"))
    }

    async fn delete_session(&self, _id: &Uuid) -> Result<(), AppError> {
        Err(store_error("database unavailable"))
    }

    async fn update_session_expiry(&self, _id: &Uuid, _expires_at: DateTime<Utc>) -> Result<(), AppError> {
        Err(store_error("database unavailable"))
    }

    async fn delete_expired_sessions(&self, _now: DateTime<Utc>) -> Result<u64, AppError> {
        Err(store_error("database unavailable"))
    }

    async fn count_active_sessions(&self, _user_id: &str, _now: DateTime<Utc>) -> Result<i64, AppError> {
        Err(store_error("database unavailable"))
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()),
        }
    }
}

impl ManualClock {
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Accepts a fixed set of tokens and rejects everything else.
#[derive(Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, Claims>,
}

impl StaticVerifier {
    pub fn with_token(mut self, token: &str, claims: Claims) -> Self {
        self.tokens.insert(token.to_string(), claims);
        self
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AppError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::invalid_token("token not recognised by verifier"))
    }
}

pub fn sample_claims(subject: &str, email: &str, name: &str) -> Claims {
    Claims {
        subject: subject.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        picture: format!("https://example.com/{}.png", subject),
        email_verified: true,
        expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn sample_profile(subject: &str) -> UserProfile {
    UserProfile {
        subject: subject.to_string(),
        email: format!("{}@example.com", subject),
        name: "Test User".to_string(),
        picture: String::new(),
    }
}

pub fn sample_session(user_id: &str, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Session {
    Session {
        id: Uuid::new_v4(),
        user_id: user_id.to_string(),
        expires_at,
        ip: Some("127.0.0.1".to_string()),
        user_agent: Some("test-agent".to_string()),
        created_at,
    }
}

/// Pool for `#[ignore = "requires database"]` tests, migrated on connect.
pub async fn connect_test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let config = DatabaseConfig {
        url,
        max_connections: 2,
        min_connections: 1,
        ..DatabaseConfig::default()
    };
    crate::db::init_pool(&config).await.expect("test database reachable")
}

/// Shared state behind one or more test clients.
pub struct TestApp {
    pub repo: Arc<MemoryRepository>,
    pub clock: Arc<ManualClock>,
    pub verifier: Arc<StaticVerifier>,
}

impl TestApp {
    pub fn new(verifier: StaticVerifier) -> Self {
        Self {
            repo: Arc::new(MemoryRepository::default()),
            clock: Arc::new(ManualClock::default()),
            verifier: Arc::new(verifier),
        }
    }

    pub fn auth_service(&self) -> AuthService {
        let sessions = SessionManager::new(self.repo.clone(), self.clock.clone(), Arc::new(InlineTaskRunner), SessionPolicy::default());
        AuthService::new(self.verifier.clone(), self.repo.clone(), sessions)
    }
}

/// The full API over in-memory services, as mounted in production.
pub fn test_rocket(app: &TestApp) -> Rocket<Build> {
    crate::build_rocket_with_services(Config::default(), app.auth_service())
}

/// Accepts `good.token.sig` for `g-123` / `a@b.com` / `A B`.
pub async fn test_client() -> (Client, TestApp) {
    test_client_with(StaticVerifier::default().with_token("good.token.sig", sample_claims("g-123", "a@b.com", "A B"))).await
}

pub async fn test_client_with(verifier: StaticVerifier) -> (Client, TestApp) {
    let app = TestApp::new(verifier);
    let client = Client::tracked(test_rocket(&app)).await.expect("valid rocket instance");
    (client, app)
}
