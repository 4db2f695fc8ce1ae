use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::claims::Claims, config::JwtConfig, directory::User, error::ApiError, state::AppState,
};

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            secret,
            issuer,
            audience,
            ttl_hours,
        } = state.config.jwt.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_hours as u64) * 3600),
        }
    }
}

impl JwtKeys {
    /// Issues a token carrying the user's identity claims.
    pub fn sign(&self, user: &User) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, "jwt signed");
        Ok(token)
    }

    /// Claims are trusted only if the signature checks out; an expired token
    /// is reported distinctly from a bad one.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data =
            decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ApiError::ExpiredToken,
                _ => ApiError::InvalidToken,
            })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

/// Pulls the raw token out of an `Authorization` header value. The scheme
/// must be exactly `Bearer `.
pub fn extract_bearer(header: &str) -> Result<&str, ApiError> {
    header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::MalformedAuthHeader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Role;
    use uuid::Uuid;

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl: Duration::from_secs(3600),
        }
    }

    fn make_user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: "jwt@example.com".into(),
            password_hash: "unused".into(),
            first_name: "Jay".into(),
            last_name: "Token".into(),
            role,
            avatar: None,
            created_at: OffsetDateTime::now_utc(),
            last_login: None,
            is_active: true,
        }
    }

    #[test]
    fn sign_and_verify_roundtrips_the_claims() {
        let keys = make_keys("dev-secret");
        let user = make_user(Role::Admin);
        let token = keys.sign(&user).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[test]
    fn verify_rejects_a_forged_signature() {
        let keys = make_keys("dev-secret");
        let forger = make_keys("other-secret");
        let token = forger.sign(&make_user(Role::User)).expect("sign");
        let err = keys.verify(&token).unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[test]
    fn verify_rejects_garbage_tokens() {
        let keys = make_keys("dev-secret");
        let err = keys.verify("not.a.jwt").unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[test]
    fn verify_reports_expiry_distinctly() {
        let keys = make_keys("dev-secret");
        let user = make_user(Role::User);
        // well past the default validation leeway
        let past = OffsetDateTime::now_utc() - TimeDuration::days(2);
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: past.unix_timestamp() as usize,
            exp: (past + TimeDuration::hours(1)).unix_timestamp() as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).expect("encode");
        let err = keys.verify(&token).unwrap_err();
        assert!(matches!(err, ApiError::ExpiredToken));
    }

    #[test]
    fn bearer_extraction_requires_the_exact_scheme() {
        assert_eq!(extract_bearer("Bearer abc.def.ghi").expect("ok"), "abc.def.ghi");
        assert!(matches!(
            extract_bearer("bearer abc").unwrap_err(),
            ApiError::MalformedAuthHeader
        ));
        assert!(matches!(
            extract_bearer("Token abc").unwrap_err(),
            ApiError::MalformedAuthHeader
        ));
        assert!(matches!(
            extract_bearer("Bearer").unwrap_err(),
            ApiError::MalformedAuthHeader
        ));
    }
}
