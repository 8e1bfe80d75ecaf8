use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{Request, Response};
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use std::io::Cursor;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

/// Every failure the service can surface. Display strings are what callers see;
/// `message`/`source` carry the detail that only goes to the log.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid credential")]
    InvalidToken {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },
    #[error("Internal server error")]
    Persistence {
        message: String,
        #[source]
        source: sqlx::error::Error,
    },
    #[error("Session expired or revoked")]
    SessionInvalid,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Internal server error")]
    ConfigurationError { message: String },
}

impl AppError {
    pub fn persistence(message: impl Into<String>, source: sqlx::error::Error) -> Self {
        Self::Persistence {
            message: message.into(),
            source,
        }
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
            source: None,
        }
    }

    pub fn authority(message: impl Into<String>, source: reqwest::Error) -> Self {
        Self::InvalidToken {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError { message: message.into() }
    }
}

impl From<&AppError> for Status {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::InvalidInput(_) => Status::BadRequest,
            AppError::InvalidToken { .. } => Status::Unauthorized,
            AppError::Persistence { .. } => Status::InternalServerError,
            AppError::SessionInvalid => Status::Unauthorized,
            AppError::Unauthorized => Status::Unauthorized,
            AppError::ConfigurationError { .. } => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let method = req.method();
        let uri = req.uri();

        let request_id = req
            .local_cache(|| None::<crate::middleware::RequestId>)
            .as_ref()
            .map(|r| r.0.as_str())
            .unwrap_or("unknown");

        let user_id = req
            .local_cache(|| None::<crate::auth::CurrentSession>)
            .as_ref()
            .map(|s| s.user_id.clone())
            .unwrap_or_else(|| "anonymous".to_string());

        error!(
            error = ?self,
            request_id = %request_id,
            user_id = %user_id,
            method = %method,
            uri = %uri,
            "request failed"
        );

        let status = Status::from(&self);
        let body = serde_json::json!({ "error": self.to_string() }).to_string();

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl OpenApiResponderInner for AppError {
    fn responses(_gen: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse};
        let mut responses = Responses::default();
        for (code, description) in [
            ("400", "Bad Request"),
            ("401", "Unauthorized - missing, invalid or expired session"),
            ("500", "Internal Server Error"),
        ] {
            responses.responses.insert(
                code.to_string(),
                RefOr::Object(OpenApiResponse {
                    description: description.to_string(),
                    ..Default::default()
                }),
            );
        }
        Ok(responses)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(e: ValidationErrors) -> Self {
        AppError::InvalidInput(e.to_string())
    }
}
