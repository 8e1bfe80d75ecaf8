use crate::config::IdentityConfig;
use crate::error::app_error::AppError;
use crate::models::user::UserProfile;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

/// Verified assertions extracted from an identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub picture: String,
    pub email_verified: bool,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            subject: self.subject.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            picture: self.picture.clone(),
        }
    }
}

#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Every failure mode is reported as `AppError::InvalidToken`.
    async fn verify(&self, token: &str) -> Result<Claims, AppError>;
}

/// Issuer and audience a token must carry to be accepted.
#[derive(Debug, Clone)]
pub struct Expectations {
    pub issuer: String,
    pub audience: String,
}

/// Delegates signature and expiry checks to the issuer's tokeninfo endpoint,
/// then applies issuer, audience and verified-email checks locally.
pub struct TokenInfoVerifier {
    client: reqwest::Client,
    endpoint: Url,
    expected: Expectations,
}

impl TokenInfoVerifier {
    pub fn new(config: &IdentityConfig) -> Result<Self, AppError> {
        let audience = config.resolve_client_id()?;
        let endpoint =
            Url::parse(&config.tokeninfo_url).map_err(|e| AppError::configuration(format!("invalid identity.tokeninfo_url: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| AppError::configuration(format!("failed to build identity http client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            expected: Expectations {
                issuer: config.issuer.clone(),
                audience,
            },
        })
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for TokenInfoVerifier {
    async fn verify(&self, token: &str) -> Result<Claims, AppError> {
        if !is_compact_token(token) {
            return Err(AppError::invalid_token("malformed token"));
        }

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("id_token", token);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::authority("verification authority unreachable", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::invalid_token(format!("verification authority rejected token: {}", status)));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| AppError::authority("unreadable claims from verification authority", e))?;

        check_claims(info, &self.expected)
    }
}

/// Three non-empty base64url segments separated by dots.
pub(crate) fn is_compact_token(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3
        && segments
            .iter()
            .all(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'=')))
}

/// Claims as the authority reports them. Booleans and timestamps may arrive as strings.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenInfo {
    pub iss: Option<String>,
    pub aud: Option<String>,
    pub sub: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub email_verified: Option<LooseBool>,
    pub exp: Option<LooseInt>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LooseBool {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LooseInt {
    Int(i64),
    Text(String),
}

impl LooseBool {
    fn value(&self) -> Option<bool> {
        match self {
            LooseBool::Bool(b) => Some(*b),
            LooseBool::Text(s) => s.parse().ok(),
        }
    }
}

impl LooseInt {
    fn value(&self) -> Option<i64> {
        match self {
            LooseInt::Int(i) => Some(*i),
            LooseInt::Text(s) => s.parse().ok(),
        }
    }
}

pub(crate) fn check_claims(info: TokenInfo, expected: &Expectations) -> Result<Claims, AppError> {
    match info.iss.as_deref() {
        Some(iss) if iss == expected.issuer => {}
        other => return Err(AppError::invalid_token(format!("invalid token issuer: {:?}", other))),
    }

    match info.aud.as_deref() {
        Some(aud) if aud == expected.audience => {}
        other => return Err(AppError::invalid_token(format!("invalid audience: {:?}", other))),
    }

    match info.email_verified.as_ref().map(LooseBool::value) {
        Some(Some(true)) => {}
        Some(None) => return Err(AppError::invalid_token("email_verified claim is not a boolean")),
        _ => return Err(AppError::invalid_token("email not verified")),
    }

    let subject = info
        .sub
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::invalid_token("missing sub claim"))?;
    let email = info
        .email
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::invalid_token("missing email claim"))?;
    let expires_at = info
        .exp
        .as_ref()
        .and_then(LooseInt::value)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .ok_or_else(|| AppError::invalid_token("missing or malformed exp claim"))?;

    Ok(Claims {
        subject,
        email,
        name: info.name.unwrap_or_default(),
        picture: info.picture.unwrap_or_default(),
        email_verified: true,
        expires_at,
    })
}
