use crate::error::app_error::AppError;
use crate::models::auth::SessionCookie;
use crate::service::auth::AuthService;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{Object, Responses, SecurityRequirement, SecurityScheme, SecuritySchemeData};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "user-session";

/// An authenticated caller whose session was just validated against the store.
/// Profile fields come from the cookie and are for display only.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentSession {
    pub session_id: Uuid,
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
}

#[derive(Debug)]
pub(crate) enum CookieState {
    Missing,
    /// Present but failed decryption or decoding.
    Unreadable,
    Present(SessionCookie),
}

pub(crate) fn read_session_cookie(cookies: &CookieJar<'_>) -> CookieState {
    if cookies.get(SESSION_COOKIE).is_none() {
        return CookieState::Missing;
    }

    match cookies.get_private(SESSION_COOKIE) {
        Some(cookie) => match serde_json::from_str::<SessionCookie>(cookie.value()) {
            Ok(payload) => CookieState::Present(payload),
            Err(_) => CookieState::Unreadable,
        },
        None => CookieState::Unreadable,
    }
}

pub(crate) fn session_cookie(payload: &SessionCookie, max_age_secs: i64, secure: bool) -> Result<Cookie<'static>, AppError> {
    let value = serde_json::to_string(payload).map_err(|e| AppError::configuration(format!("failed to encode session cookie: {}", e)))?;

    Ok(Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(rocket::time::Duration::seconds(max_age_secs))
        .build())
}

/// Tell the client to drop the session cookie immediately.
pub(crate) fn clear_session_cookie(cookies: &CookieJar<'_>) {
    cookies.remove_private(Cookie::build(SESSION_COOKIE).path("/").build());
}

fn reject(status: Status, error: AppError) -> RequestOutcome<CurrentSession, AppError> {
    Outcome::Error((status, error))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentSession {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let cookies = req.cookies();

        let payload = match read_session_cookie(cookies) {
            CookieState::Missing => return reject(Status::Unauthorized, AppError::Unauthorized),
            CookieState::Unreadable => {
                debug!("discarding unreadable session cookie");
                clear_session_cookie(cookies);
                return reject(Status::Unauthorized, AppError::Unauthorized);
            }
            CookieState::Present(payload) => payload,
        };

        // cached flag only; nothing is trusted until the store agrees
        if !payload.auth {
            return reject(Status::Unauthorized, AppError::Unauthorized);
        }

        let Ok(session_id) = Uuid::parse_str(&payload.session_id) else {
            clear_session_cookie(cookies);
            return reject(Status::Unauthorized, AppError::SessionInvalid);
        };

        let auth = match req.rocket().state::<AuthService>() {
            Some(auth) => auth,
            None => return reject(Status::InternalServerError, AppError::configuration("auth service is not managed")),
        };

        match auth.sessions.validate(&session_id).await {
            Ok(true) => {
                auth.sessions.schedule_refresh(session_id).await;

                let current = CurrentSession {
                    session_id,
                    user_id: payload.user_id,
                    email: payload.email,
                    name: payload.name,
                    picture: payload.picture,
                };
                req.local_cache(|| Some(current.clone()));
                Outcome::Success(current)
            }
            Ok(false) => {
                clear_session_cookie(cookies);
                reject(Status::Unauthorized, AppError::SessionInvalid)
            }
            Err(err) => reject(Status::InternalServerError, err),
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for CurrentSession {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        let security_scheme = SecurityScheme {
            description: Some("Encrypted session cookie. Sign in via POST /api/login/google to obtain it.".to_string()),
            data: SecuritySchemeData::ApiKey {
                name: SESSION_COOKIE.to_string(),
                location: "cookie".to_string(),
            },
            extensions: Object::default(),
        };

        let mut security_req = SecurityRequirement::new();
        security_req.insert("sessionCookie".to_string(), Vec::new());

        Ok(RequestHeaderInput::Security("sessionCookie".to_string(), security_scheme, security_req))
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response};
        let mut responses = Responses::default();
        responses.responses.insert(
            "401".to_string(),
            RefOr::Object(Response {
                description: "Unauthorized - no session, or the session expired or was revoked".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}
