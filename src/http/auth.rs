//! Caller identity
//!
//! Access tokens are HS256 JWTs carried in `Authorization: Bearer` or the
//! `access_token` cookie. Issuing and refreshing them belongs to the session
//! service; this module only verifies them.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ErrorBody;
use super::AppState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self { encoding: EncodingKey::from_secret(secret), decoding: DecodingKey::from_secret(secret), ttl }
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims { sub: user_id, role, iat: now.timestamp(), exp: (now + self.ttl).timestamp() };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected access token");
                None
            }
        }
    }
}

/// An authenticated customer.
#[derive(Debug, Clone, Copy)]
pub struct Customer(pub Uuid);

/// An authenticated administrator.
#[derive(Debug, Clone, Copy)]
pub struct Admin(pub Uuid);

#[derive(Debug)]
pub enum AuthRejection {
    Unauthorized,
    WrongRole,
    /// Browsing session with a refresh token: send the caller to log in again.
    Login(String),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody { kind: "UNAUTHORIZED", message: "Missing or invalid session".into() }),
            ).into_response(),
            Self::WrongRole => (
                StatusCode::FORBIDDEN,
                Json(ErrorBody { kind: "FORBIDDEN", message: "Role not allowed".into() }),
            ).into_response(),
            Self::Login(to) => Redirect::temporary(&to).into_response(),
        }
    }
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

fn cookie<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get_all(header::COOKIE).iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

fn authenticate(parts: &Parts, keys: &TokenKeys, role: Role, login_path: &str) -> Result<Uuid, AuthRejection> {
    let claims = bearer(parts).or_else(|| cookie(parts, "access_token")).and_then(|t| keys.verify(t));
    match claims {
        Some(c) if c.role == role => Ok(c.sub),
        Some(_) => Err(AuthRejection::WrongRole),
        None if cookie(parts, "refresh_token").is_some() => {
            let original = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
            let next: String = url::form_urlencoded::byte_serialize(original.as_bytes()).collect();
            Err(AuthRejection::Login(format!("{login_path}?next={next}")))
        }
        None => Err(AuthRejection::Unauthorized),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Customer {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, &state.tokens, Role::User, "/user/login").map(Customer)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Admin {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, &state.tokens, Role::Admin, "/admin/login").map(Admin)
    }
}
