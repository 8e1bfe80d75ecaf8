use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::{Data, Response};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use tracing::{info, warn};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Correlates every log line written while serving one request.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    fn generate() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }

    /// Reuse a caller-supplied id when it is a well-formed UUID.
    fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim).and_then(|v| Uuid::parse_str(v).ok()) {
            Some(id) => RequestId(id.to_string()),
            None => RequestId::generate(),
        }
    }
}

/// Assigns the request id and logs each request and its outcome.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let request_id = RequestId::from_header(request.headers().get_one(REQUEST_ID_HEADER));
        request.local_cache(|| Some(request_id.clone()));

        info!(
            request_id = %request_id.0,
            method = %request.method(),
            uri = %request.uri(),
            "incoming request"
        );
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let request_id = request
            .local_cache(|| None::<RequestId>)
            .as_ref()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let status = response.status();
        let method = request.method();
        let uri = request.uri();

        response.set_header(Header::new(REQUEST_ID_HEADER, request_id.clone()));

        // session responses must never be cached by intermediaries
        response.set_header(Header::new("X-Content-Type-Options", "nosniff"));
        response.set_header(Header::new("X-Frame-Options", "DENY"));
        response.set_header(Header::new("Cache-Control", "no-store"));

        if status.class().is_server_error() || status.class().is_client_error() {
            warn!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = %status.code,
                "request completed with error"
            );
        } else {
            info!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = %status.code,
                "request completed"
            );
        }
    }
}

/// `User-Agent` header, recorded on new sessions.
pub struct UserAgent(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserAgent {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        let ua = req.headers().get_one("User-Agent").map(|s| s.to_string());
        Outcome::Success(UserAgent(ua))
    }
}

impl<'a> OpenApiFromRequest<'a> for UserAgent {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

/// Remote address as Rocket resolves it (honours the configured IP header).
pub struct ClientIp(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        let ip = req.client_ip().map(|ip| ip.to_string());
        Outcome::Success(ClientIp(ip))
    }
}

impl<'a> OpenApiFromRequest<'a> for ClientIp {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_uuids() {
        let id1 = RequestId::generate();
        let id2 = RequestId::generate();
        assert!(Uuid::parse_str(&id1.0).is_ok());
        assert_ne!(id1.0, id2.0);
    }

    #[test]
    fn caller_supplied_uuid_is_kept() {
        let supplied = "6f1c3a52-2d7e-4c1b-9a55-0b7f2b7c9e10";
        assert_eq!(RequestId::from_header(Some(supplied)).0, supplied);
    }

    #[test]
    fn malformed_header_gets_fresh_id() {
        let id = RequestId::from_header(Some("drop table; --"));
        assert_ne!(id.0, "drop table; --");
        assert!(Uuid::parse_str(&id.0).is_ok());
        assert!(Uuid::parse_str(&RequestId::from_header(None).0).is_ok());
    }

    #[rocket::async_test]
    async fn request_id_is_echoed_on_error_responses() {
        let (client, _) = crate::test_utils::test_client().await;
        let supplied = "6f1c3a52-2d7e-4c1b-9a55-0b7f2b7c9e10";

        let response = client
            .get("/api/profile")
            .header(Header::new(REQUEST_ID_HEADER, supplied))
            .dispatch()
            .await;

        assert_eq!(response.status(), rocket::http::Status::Unauthorized);
        assert_eq!(response.headers().get_one(REQUEST_ID_HEADER), Some(supplied));
        assert_eq!(response.headers().get_one("Cache-Control"), Some("no-store"));
    }

    #[rocket::async_test]
    async fn request_id_is_assigned_when_absent() {
        let (client, _) = crate::test_utils::test_client().await;
        let response = client.get("/api/health").dispatch().await;
        let id = response.headers().get_one(REQUEST_ID_HEADER).expect("request id header");
        assert!(Uuid::parse_str(id).is_ok());
    }
}
