use crate::auth::{CookieState, CurrentSession, clear_session_cookie, read_session_cookie, session_cookie};
use crate::config::Config;
use crate::error::app_error::AppError;
use crate::middleware::{ClientIp, UserAgent};
use crate::models::auth::{LoginResponse, LogoutResponse, ProfileResponse, SessionCookie, TokenRequest};
use crate::service::auth::{AuthService, ClientInfo};
use rocket::http::CookieJar;
use rocket::serde::json::{self, Json};
use rocket::{State, get, post};
use rocket_okapi::openapi;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

/// Exchange a Google identity token for a session cookie.
#[openapi(tag = "Authentication")]
#[post("/login/google", data = "<payload>")]
pub async fn login_google(
    auth: &State<AuthService>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
    client_ip: ClientIp,
    user_agent: UserAgent,
    payload: Result<Json<TokenRequest>, json::Error<'_>>,
) -> Result<Json<LoginResponse>, AppError> {
    let payload = payload.map_err(|err| {
        debug!(error = %err, "unreadable login body");
        AppError::InvalidInput("malformed request body".to_string())
    })?;
    payload.validate()?;

    let client = ClientInfo {
        ip: client_ip.0,
        user_agent: user_agent.0,
    };
    let outcome = auth.login(&payload.credential, client).await?;

    let remaining = (outcome.session.expires_at - auth.sessions.now()).num_seconds();
    let max_age = if remaining > 0 {
        remaining
    } else {
        auth.sessions.policy().ttl.num_seconds()
    };

    let cookie = SessionCookie {
        user_id: outcome.user_id.clone(),
        email: outcome.claims.email.clone(),
        name: outcome.claims.name.clone(),
        picture: outcome.claims.picture.clone(),
        auth: true,
        session_id: outcome.session.id.to_string(),
    };
    cookies.add_private(session_cookie(&cookie, max_age, config.session.cookie_secure)?);

    Ok(Json(LoginResponse {
        email: outcome.claims.email,
        name: outcome.claims.name,
        picture: outcome.claims.picture,
        is_logged_in: true,
        expire_session: outcome.session.expires_at,
        active_sessions: outcome.active_sessions,
    }))
}

/// Revoke the caller's session, if any, and drop the cookie.
#[openapi(tag = "Authentication")]
#[get("/logout")]
pub async fn logout(auth: &State<AuthService>, cookies: &CookieJar<'_>) -> Json<LogoutResponse> {
    match read_session_cookie(cookies) {
        CookieState::Present(payload) => match Uuid::parse_str(&payload.session_id) {
            Ok(session_id) => auth.logout(&session_id).await,
            Err(_) => debug!("logout with malformed session id"),
        },
        CookieState::Unreadable => debug!("logout with unreadable session cookie"),
        CookieState::Missing => {}
    }

    clear_session_cookie(cookies);
    Json(LogoutResponse { logout: true })
}

#[openapi(tag = "Authentication")]
#[get("/profile")]
pub async fn profile(auth: &State<AuthService>, current: Result<CurrentSession, AppError>) -> Result<Json<ProfileResponse>, AppError> {
    let current = current?;
    let active_sessions = auth.active_sessions(&current.user_id).await;

    Ok(Json(ProfileResponse {
        email: current.email,
        name: current.name,
        picture: current.picture,
        active_sessions,
    }))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![login_google, logout, profile]
}
