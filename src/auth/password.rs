use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// Characters that satisfy the special-character rule.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

const MIN_PASSWORD_LENGTH: usize = 8;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Outcome of the strength policy; lists every violated rule, not just the
/// first, so a client can show all problems at once.
#[derive(Debug)]
pub struct PasswordStrength {
    pub valid: bool,
    pub violations: Vec<String>,
}

pub fn check_strength(password: &str) -> PasswordStrength {
    let mut violations = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        violations.push(format!(
            "password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        violations.push("password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        violations.push("password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push("password must contain at least one digit".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        violations.push("password must contain at least one special character".to_string());
    }

    PasswordStrength {
        valid: violations.is_empty(),
        violations,
    }
}
