use crate::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::session::SessionStore;
use crate::db::init_pool;
use crate::service::clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy)]
pub struct SweepResult {
    pub sessions_removed: u64,
}

/// Delete every session whose expiry has passed. Safe to run alongside the API.
pub async fn sweep_expired_sessions(config: &Config) -> Result<SweepResult, String> {
    let pool = init_pool(&config.database)
        .await
        .map_err(|err| format!("Failed to initialize database pool: {err}"))?;

    let repo = PostgresRepository { pool: pool.clone() };
    let result = sweep(&repo, &SystemClock).await;

    pool.close().await;
    result
}

async fn sweep(store: &dyn SessionStore, clock: &dyn Clock) -> Result<SweepResult, String> {
    let sessions_removed = store
        .delete_expired_sessions(clock.now())
        .await
        .map_err(|err| format!("Failed to delete expired sessions: {err:?}"))?;

    Ok(SweepResult { sessions_removed })
}
