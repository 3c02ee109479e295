//! DTOs for the platform's authentication endpoints

use serde::{Deserialize, Serialize};

use crate::{session::Role, token::BearerToken};

/// The login request body
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    /// The account email
    pub email: &'a str,
    /// The account password
    pub password: &'a str,
}

/// The body returned by `POST /auth/{role}/login`
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    /// The issued bearer token
    pub token: BearerToken,
    /// The platform user record
    pub user: serde_json::Value,
}

/// The body returned by `GET /auth/me`
#[derive(Debug, Deserialize)]
pub struct MeResponse {
    /// The platform user record
    pub user: serde_json::Value,
    /// The principal's role
    #[serde(rename = "userType")]
    pub user_type: Role,
}

/// The body returned by `POST /auth/refresh`
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    /// The replacement bearer token
    pub token: BearerToken,
    /// The platform user record
    pub user: serde_json::Value,
    /// The principal's role, when the platform includes it
    #[serde(rename = "userType", default)]
    pub user_type: Option<Role>,
}

/// The error envelope the platform wraps failures in
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
}
