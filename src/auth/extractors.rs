use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::jwt::{extract_bearer, JwtKeys},
    directory::Role,
    error::ApiError,
    state::AppState,
};

/// Identity attached to a request once the bearer token checks out; never
/// carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthIdentity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

impl AuthIdentity {
    /// Role gate; `allowed` is a fixed set, checked by membership.
    pub fn require_any(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// Validates the bearer token and resolves the current user.
///
/// The chain per request: Authorization header present, `Bearer ` scheme,
/// signature and expiry valid, subject still present and active in the
/// directory. Each step rejects with its own error; there are no retries.
#[derive(Debug)]
pub struct AuthUser(pub AuthIdentity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::MalformedAuthHeader)?;
        let token = extract_bearer(header)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token)?;

        // Claims are not re-derived from current state, but the subject must
        // still exist and be active.
        let user = state
            .directory
            .find_by_id(claims.sub)
            .await
            .filter(|u| u.is_active)
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token subject missing or disabled");
                ApiError::Unauthorized
            })?;

        Ok(AuthUser(AuthIdentity {
            id: user.id,
            email: user.email,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
        }))
    }
}

/// `AuthUser` plus the admin role requirement.
#[derive(Debug)]
pub struct AdminUser(pub AuthIdentity);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        identity.require_any(&[Role::Admin])?;
        Ok(AdminUser(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{NewUser, UserUpdate};
    use axum::http::Request;

    async fn state_with_user(role: Role, active: bool) -> (AppState, String) {
        let state = AppState::fake();
        let user = state
            .directory
            .create(NewUser {
                email: "guard@example.com".into(),
                password: "Abcdef1!".into(),
                first_name: "Guard".into(),
                last_name: "Case".into(),
                role,
                avatar: None,
            })
            .await
            .expect("create user");
        if !active {
            state
                .directory
                .update(
                    user.id,
                    UserUpdate {
                        is_active: Some(false),
                        ..Default::default()
                    },
                )
                .await
                .expect("deactivate");
        }
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign(&user).expect("sign");
        (state, token)
    }

    fn parts_with_header(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(axum::http::header::AUTHORIZATION, v);
        }
        let (parts, _) = builder.body(()).expect("request").into_parts();
        parts
    }

    #[tokio::test]
    async fn resolves_an_active_user() {
        let (state, token) = state_with_user(Role::User, true).await;
        let mut parts = parts_with_header(Some(&format!("Bearer {}", token)));
        let AuthUser(identity) = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .expect("guard should pass");
        assert_eq!(identity.email, "guard@example.com");
        assert_eq!(identity.role, Role::User);
    }

    #[tokio::test]
    async fn rejects_a_valid_token_for_a_deactivated_user() {
        let (state, token) = state_with_user(Role::User, false).await;
        let mut parts = parts_with_header(Some(&format!("Bearer {}", token)));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_headers() {
        let (state, token) = state_with_user(Role::User, true).await;

        let mut parts = parts_with_header(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MalformedAuthHeader));

        let mut parts = parts_with_header(Some(&format!("Token {}", token)));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MalformedAuthHeader));
    }

    #[tokio::test]
    async fn user_role_is_forbidden_on_the_admin_guard() {
        let (state, token) = state_with_user(Role::User, true).await;
        let mut parts = parts_with_header(Some(&format!("Bearer {}", token)));
        let err = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[tokio::test]
    async fn admin_role_passes_the_admin_guard() {
        let (state, token) = state_with_user(Role::Admin, true).await;
        let mut parts = parts_with_header(Some(&format!("Bearer {}", token)));
        let AdminUser(identity) = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .expect("admin should pass");
        assert_eq!(identity.role, Role::Admin);
    }
}
