use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::directory::{Role, User, UserStats};

/// Public part of a user returned to the client; never carries the hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub avatar: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    pub is_active: bool,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            avatar: user.avatar,
            created_at: user.created_at,
            last_login: user.last_login,
            is_active: user.is_active,
        }
    }
}

/// Request body for profile updates; every field is optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

/// Response for GET /user/profile.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: PublicUser,
}

/// Response for PUT /user/profile.
#[derive(Debug, Serialize)]
pub struct UpdatedProfileResponse {
    pub message: String,
    pub user: PublicUser,
}

/// Response for GET /user/all.
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<PublicUser>,
    pub total: usize,
}

/// Response for GET /user/stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: UserStats,
}
