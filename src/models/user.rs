use chrono::{DateTime, Utc};
use serde::Serialize;

/// Local directory entry for an externally authenticated subject.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    /// Subject id asserted by the identity provider.
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

/// Profile fields carried by a verified identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: String,
}
