use serde::{Deserialize, Serialize};

use crate::auth::extractors::AuthIdentity;
use crate::users::dto::PublicUser;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for changing the current user's password.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Response returned after login or register.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: PublicUser,
}

/// Response returned after a token refresh.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub message: String,
    pub token: String,
}

/// Plain confirmation message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response for the authentication probe route.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub message: String,
    pub user: AuthIdentity,
}
