use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::auth::password::hash_password;

/// Coarse authorization tier gating admin-only operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// User record held by the directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String, // lowercase, unique
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
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

/// Data for a new account; `password` is plaintext and hashed on create.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub avatar: Option<String>,
}

/// Partial update; `password` is plaintext and re-hashed by the directory.
#[derive(Debug, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub is_active: Option<bool>,
}

/// Aggregate counters for the admin dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: usize,
    pub active_users: usize,
    pub admin_users: usize,
    pub recent_registrations: usize, // created within the last 7 days
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("email already in use")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Keyed store of user records, injected at the application root so the
/// auth core can be exercised against any backing implementation.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Case-insensitive lookup by email.
    async fn find_by_email(&self, email: &str) -> Option<User>;
    async fn find_by_id(&self, id: Uuid) -> Option<User>;
    /// Fails with `DuplicateEmail` if the email key is already present.
    async fn create(&self, data: NewUser) -> Result<User, DirectoryError>;
    /// Re-keys the record on email change; re-hashes `password` if present.
    async fn update(&self, id: Uuid, changes: UserUpdate) -> Result<User, DirectoryError>;
    /// Hard delete.
    async fn delete(&self, id: Uuid) -> Result<(), DirectoryError>;
    /// Stamps `last_login` and returns the updated record.
    async fn touch_last_login(&self, id: Uuid) -> Option<User>;
    async fn list_all(&self) -> Vec<User>;
    async fn stats(&self) -> UserStats;
}

/// Process-local directory keyed by lowercase email.
///
/// Every check-then-mutate sequence runs under one write guard, so a
/// duplicate-email check cannot race a concurrent create of the same email.
pub struct InMemoryDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Directory pre-seeded with the two demo accounts the dashboard ships
    /// with (both use the password `password`).
    pub async fn with_default_users() -> anyhow::Result<Self> {
        let dir = Self::new();
        dir.create(NewUser {
            email: "admin@example.com".into(),
            password: "password".into(),
            first_name: "Admin".into(),
            last_name: "User".into(),
            role: Role::Admin,
            avatar: None,
        })
        .await?;
        dir.create(NewUser {
            email: "user@example.com".into(),
            password: "password".into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            role: Role::User,
            avatar: None,
        })
        .await?;
        Ok(dir)
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_email(&self, email: &str) -> Option<User> {
        let users = self.users.read().await;
        users.get(&email.trim().to_lowercase()).cloned()
    }

    async fn find_by_id(&self, id: Uuid) -> Option<User> {
        let users = self.users.read().await;
        users.values().find(|u| u.id == id).cloned()
    }

    async fn create(&self, data: NewUser) -> Result<User, DirectoryError> {
        let email = data.email.trim().to_lowercase();
        // Hash outside the lock; only the check-and-insert needs serializing.
        let password_hash = hash_password(&data.password)?;

        let mut users = self.users.write().await;
        if users.contains_key(&email) {
            return Err(DirectoryError::DuplicateEmail);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.clone(),
            password_hash,
            first_name: data.first_name,
            last_name: data.last_name,
            role: data.role,
            avatar: data.avatar,
            created_at: OffsetDateTime::now_utc(),
            last_login: None,
            is_active: true,
        };
        users.insert(email, user.clone());
        debug!(user_id = %user.id, email = %user.email, "user created");
        Ok(user)
    }

    async fn update(&self, id: Uuid, changes: UserUpdate) -> Result<User, DirectoryError> {
        let new_hash = match &changes.password {
            Some(plain) => Some(hash_password(plain)?),
            None => None,
        };
        let new_email = changes.email.map(|e| e.trim().to_lowercase());

        let mut users = self.users.write().await;
        let current_email = users
            .values()
            .find(|u| u.id == id)
            .map(|u| u.email.clone())
            .ok_or(DirectoryError::NotFound)?;

        if let Some(email) = &new_email {
            if *email != current_email && users.contains_key(email) {
                return Err(DirectoryError::DuplicateEmail);
            }
        }

        let mut user = match users.remove(&current_email) {
            Some(u) => u,
            None => return Err(DirectoryError::NotFound),
        };
        if let Some(email) = new_email {
            user.email = email;
        }
        if let Some(hash) = new_hash {
            user.password_hash = hash;
        }
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        if let Some(avatar) = changes.avatar {
            user.avatar = Some(avatar);
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        users.insert(user.email.clone(), user.clone());
        debug!(user_id = %user.id, "user updated");
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> Result<(), DirectoryError> {
        let mut users = self.users.write().await;
        let email = users
            .values()
            .find(|u| u.id == id)
            .map(|u| u.email.clone())
            .ok_or(DirectoryError::NotFound)?;
        users.remove(&email);
        debug!(user_id = %id, "user deleted");
        Ok(())
    }

    async fn touch_last_login(&self, id: Uuid) -> Option<User> {
        let mut users = self.users.write().await;
        let user = users.values_mut().find(|u| u.id == id)?;
        user.last_login = Some(OffsetDateTime::now_utc());
        Some(user.clone())
    }

    async fn list_all(&self) -> Vec<User> {
        let users = self.users.read().await;
        users.values().cloned().collect()
    }

    async fn stats(&self) -> UserStats {
        let users = self.users.read().await;
        let week_ago = OffsetDateTime::now_utc() - Duration::days(7);
        UserStats {
            total_users: users.len(),
            active_users: users.values().filter(|u| u.is_active).count(),
            admin_users: users.values().filter(|u| u.role == Role::Admin).count(),
            recent_registrations: users.values().filter(|u| u.created_at > week_ago).count(),
        }
    }
}
