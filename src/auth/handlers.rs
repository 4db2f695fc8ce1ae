use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, LoginRequest, MeResponse, MessageResponse,
            RegisterRequest, TokenResponse,
        },
        extractors::AuthUser,
        services,
    },
    error::ApiError,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(change_password))
        .route("/auth/me", get(me))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let (token, user) = services::login(&state, &payload.email, &payload.password).await?;
    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        token,
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let (token, user) = services::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Registration successful".into(),
            token,
            user,
        }),
    ))
}

#[instrument(skip(state, identity))]
pub async fn refresh(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = services::refresh(&state, &identity).await?;
    Ok(Json(TokenResponse {
        message: "Token refreshed".into(),
        token,
    }))
}

/// Tokens are not revocable server-side; the client discards its copy.
#[instrument(skip(identity))]
pub async fn logout(AuthUser(identity): AuthUser) -> Json<MessageResponse> {
    info!(user_id = %identity.id, "user logged out");
    Json(MessageResponse {
        message: "Logout successful".into(),
    })
}

#[instrument(skip(state, identity, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::change_password(
        &state,
        identity.id,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully".into(),
    }))
}

/// Authentication probe; echoes the resolved identity.
#[instrument(skip(identity))]
pub async fn me(AuthUser(identity): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        message: "Authentication successful".into(),
        user: identity,
    })
}
