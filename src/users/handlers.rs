use axum::{
    extract::State,
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::MessageResponse,
        extractors::{AdminUser, AuthUser},
        services::is_valid_email,
    },
    directory::UserUpdate,
    error::ApiError,
    state::AppState,
    users::dto::{
        ProfileResponse, PublicUser, StatsResponse, UpdateProfileRequest, UpdatedProfileResponse,
        UserListResponse,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/profile", get(get_profile).put(update_profile))
        .route("/user/account", delete(delete_account))
        .route("/user/all", get(get_all_users))
        .route("/user/stats", get(get_user_stats))
}

#[instrument(skip(state, identity))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state
        .directory
        .find_by_id(identity.id)
        .await
        .ok_or(ApiError::NotFound)?;
    Ok(Json(ProfileResponse { user: user.into() }))
}

#[instrument(skip(state, identity, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UpdatedProfileResponse>, ApiError> {
    if let Some(first_name) = &payload.first_name {
        if first_name.trim().is_empty() {
            return Err(ApiError::Validation("first name cannot be empty".into()));
        }
    }
    if let Some(last_name) = &payload.last_name {
        if last_name.trim().is_empty() {
            return Err(ApiError::Validation("last name cannot be empty".into()));
        }
    }
    if let Some(email) = &payload.email {
        if !is_valid_email(email.trim()) {
            return Err(ApiError::Validation("invalid email address".into()));
        }
    }

    let updated = state
        .directory
        .update(
            identity.id,
            UserUpdate {
                email: payload.email,
                first_name: payload.first_name,
                last_name: payload.last_name,
                avatar: payload.avatar,
                ..Default::default()
            },
        )
        .await?;
    info!(user_id = %updated.id, "profile updated");
    Ok(Json(UpdatedProfileResponse {
        message: "Profile updated successfully".into(),
        user: updated.into(),
    }))
}

#[instrument(skip(state, identity))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    state.directory.delete(identity.id).await?;
    info!(user_id = %identity.id, email = %identity.email, "account deleted");
    Ok(Json(MessageResponse {
        message: "Account deleted successfully".into(),
    }))
}

#[instrument(skip(state, _admin))]
pub async fn get_all_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<UserListResponse>, ApiError> {
    let users: Vec<PublicUser> = state
        .directory
        .list_all()
        .await
        .into_iter()
        .map(PublicUser::from)
        .collect();
    let total = users.len();
    Ok(Json(UserListResponse { users, total }))
}

#[instrument(skip(state, _admin))]
pub async fn get_user_stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<StatsResponse>, ApiError> {
    Ok(Json(StatsResponse {
        stats: state.directory.stats().await,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractors::AuthIdentity;
    use crate::auth::{dto::RegisterRequest, services};

    async fn registered_identity(state: &AppState, email: &str) -> AuthIdentity {
        let (_, user) = services::register(
            state,
            RegisterRequest {
                email: email.into(),
                password: "Abcdef1!".into(),
                first_name: "Pat".into(),
                last_name: "Doe".into(),
            },
        )
        .await
        .expect("register");
        AuthIdentity {
            id: user.id,
            email: user.email,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }

    #[tokio::test]
    async fn update_profile_rejects_an_email_taken_by_another_account() {
        let state = AppState::fake();
        registered_identity(&state, "taken@example.com").await;
        let identity = registered_identity(&state, "mover@example.com").await;

        let err = update_profile(
            State(state.clone()),
            AuthUser(identity),
            Json(UpdateProfileRequest {
                first_name: None,
                last_name: None,
                email: Some("taken@example.com".into()),
                avatar: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::DuplicateEmail));
    }

    #[tokio::test]
    async fn update_profile_rejects_empty_names() {
        let state = AppState::fake();
        let identity = registered_identity(&state, "named@example.com").await;

        let err = update_profile(
            State(state.clone()),
            AuthUser(identity),
            Json(UpdateProfileRequest {
                first_name: Some("   ".into()),
                last_name: None,
                email: None,
                avatar: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn update_profile_applies_partial_changes() {
        let state = AppState::fake();
        let identity = registered_identity(&state, "partial@example.com").await;
        let id = identity.id;

        let Json(response) = update_profile(
            State(state.clone()),
            AuthUser(identity),
            Json(UpdateProfileRequest {
                first_name: Some("Greta".into()),
                last_name: None,
                email: None,
                avatar: Some("https://cdn.example.com/a.png".into()),
            }),
        )
        .await
        .expect("update");

        assert_eq!(response.user.first_name, "Greta");
        assert_eq!(response.user.last_name, "Doe");
        assert_eq!(
            response.user.avatar.as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(response.user.id, id);
    }

    #[tokio::test]
    async fn delete_account_removes_the_user() {
        let state = AppState::fake();
        let identity = registered_identity(&state, "leaver@example.com").await;
        let id = identity.id;

        delete_account(State(state.clone()), AuthUser(identity))
            .await
            .expect("delete");
        assert!(state.directory.find_by_id(id).await.is_none());
    }

    #[tokio::test]
    async fn admin_listing_strips_password_hashes() {
        let state = AppState::fake();
        // the guard itself is covered in extractors; hand the handler an
        // admin identity directly
        let mut admin = registered_identity(&state, "boss@example.com").await;
        admin.role = crate::directory::Role::Admin;

        let Json(listing) = get_all_users(State(state.clone()), AdminUser(admin))
            .await
            .expect("list");
        assert_eq!(listing.total, 1);
        let value = serde_json::to_value(&listing.users).expect("serialize");
        let first = &value[0];
        assert!(first.get("passwordHash").is_none());
        assert!(first.get("password").is_none());
    }

    #[tokio::test]
    async fn stats_reflect_the_directory() {
        let state = AppState::fake();
        let mut admin = registered_identity(&state, "count@example.com").await;
        admin.role = crate::directory::Role::Admin;
        registered_identity(&state, "other@example.com").await;

        let Json(response) = get_user_stats(State(state.clone()), AdminUser(admin))
            .await
            .expect("stats");
        assert_eq!(response.stats.total_users, 2);
        assert_eq!(response.stats.active_users, 2);
    }
}
