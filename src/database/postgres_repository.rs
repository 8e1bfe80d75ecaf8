use sqlx::PgPool;

/// Postgres-backed implementation of the user directory and session store.
#[derive(Clone)]
pub struct PostgresRepository {
    pub pool: PgPool,
}
