use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::RegisterRequest,
        extractors::AuthIdentity,
        jwt::JwtKeys,
        password::{check_strength, verify_password},
    },
    directory::{NewUser, Role, UserUpdate},
    error::ApiError,
    state::AppState,
    users::dto::PublicUser,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub async fn login(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<(String, PublicUser), ApiError> {
    let email = email.trim().to_lowercase();

    // Unknown email and wrong password fail the same way on purpose.
    let user = state
        .directory
        .find_by_email(&email)
        .await
        .ok_or(ApiError::InvalidCredentials)?;

    if !user.is_active {
        warn!(email = %email, user_id = %user.id, "login attempt on disabled account");
        return Err(ApiError::AccountDisabled);
    }

    if !verify_password(password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let user = state
        .directory
        .touch_last_login(user.id)
        .await
        .unwrap_or(user);

    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(&user)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((token, PublicUser::from(user)))
}

pub async fn register(
    state: &AppState,
    payload: RegisterRequest,
) -> Result<(String, PublicUser), ApiError> {
    let email = payload.email.trim().to_lowercase();

    if !is_valid_email(&email) {
        warn!(email = %email, "register invalid email");
        return Err(ApiError::Validation("invalid email address".into()));
    }
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(ApiError::Validation("first and last name are required".into()));
    }

    let strength = check_strength(&payload.password);
    if !strength.valid {
        warn!(email = %email, "register weak password");
        return Err(ApiError::WeakPassword(strength.violations));
    }

    let user = state
        .directory
        .create(NewUser {
            email,
            password: payload.password,
            first_name: payload.first_name.trim().to_string(),
            last_name: payload.last_name.trim().to_string(),
            role: Role::User,
            avatar: None,
        })
        .await?;

    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(&user)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((token, PublicUser::from(user)))
}

/// Issues a fresh token for an already-authenticated identity. The account
/// must still exist and be active.
pub async fn refresh(state: &AppState, identity: &AuthIdentity) -> Result<String, ApiError> {
    let user = state
        .directory
        .find_by_id(identity.id)
        .await
        .filter(|u| u.is_active)
        .ok_or(ApiError::Unauthorized)?;

    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(&user)?;
    info!(user_id = %user.id, "token refreshed");
    Ok(token)
}

pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    current: &str,
    new: &str,
) -> Result<(), ApiError> {
    let user = state
        .directory
        .find_by_id(user_id)
        .await
        .ok_or(ApiError::NotFound)?;

    if !verify_password(current, &user.password_hash)? {
        warn!(user_id = %user_id, "change password with wrong current password");
        return Err(ApiError::InvalidCredentials);
    }

    let strength = check_strength(new);
    if !strength.valid {
        return Err(ApiError::WeakPassword(strength.violations));
    }

    state
        .directory
        .update(
            user_id,
            UserUpdate {
                password: Some(new.to_string()),
                ..Default::default()
            },
        )
        .await?;
    info!(user_id = %user_id, "password changed");
    Ok(())
}
