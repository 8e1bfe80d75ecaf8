use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct TokenRequest {
    /// Identity token issued by the sign-in client.
    #[serde(default)]
    #[validate(length(min = 1, message = "credential is required"))]
    pub credential: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct LoginResponse {
    pub email: String,
    pub name: String,
    pub picture: String,
    #[serde(rename = "isLoggedIn")]
    pub is_logged_in: bool,
    pub expire_session: DateTime<Utc>,
    #[serde(rename = "activeSessions")]
    pub active_sessions: i64,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct LogoutResponse {
    pub logout: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ProfileResponse {
    pub email: String,
    pub name: String,
    pub picture: String,
    #[serde(rename = "activeSessions")]
    pub active_sessions: i64,
}

/// Contents of the encrypted `user-session` cookie. Display cache only;
/// `session_id` is re-validated against the store on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub auth: bool,
    pub session_id: String,
}
