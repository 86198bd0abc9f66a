use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::{claims::Claims, repo_types::User};
use crate::{config::JwtConfig, error::AuthError, state::AppState};

/// Signs and verifies session tokens with one shared HS256 secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }

    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %user.id, "jwt signed");
        Ok(token)
    }

    /// Checks signature, then expiry, issuer and audience. No claim field is
    /// trusted before the signature verifies.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::ImmatureSignature
                | ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            }
        })?;
        debug!(user_id = %data.claims.user_id, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn jwt_config(secret: &str, issuer: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: "test-aud".into(),
            ttl_minutes: 60,
        }
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn sign_raw(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn issued_token_verifies_with_one_hour_window() {
        let keys = JwtKeys::new(&jwt_config("dev-secret", "iss"));
        let u = user();
        let token = keys.issue(&u).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.user_id, u.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            user_id: Uuid::new_v4(),
            username: "bob".into(),
            iat: now - 7200,
            exp: now - 3600,
            iss: "iss".into(),
            aud: "test-aud".into(),
        };
        let keys = JwtKeys::new(&jwt_config("dev-secret", "iss"));
        let token = sign_raw("dev-secret", &claims);
        assert_eq!(keys.verify(&token).unwrap_err(), AuthError::Expired);
    }

    #[test]
    fn foreign_secret_is_invalid_signature() {
        let ours = JwtKeys::new(&jwt_config("ours", "iss"));
        let theirs = JwtKeys::new(&jwt_config("theirs", "iss"));
        let token = theirs.issue(&user()).unwrap();
        assert_eq!(ours.verify(&token).unwrap_err(), AuthError::InvalidSignature);
    }

    #[test]
    fn signature_checked_before_expiry() {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            user_id: Uuid::new_v4(),
            username: "mallory".into(),
            iat: now - 7200,
            exp: now - 3600,
            iss: "iss".into(),
            aud: "test-aud".into(),
        };
        let keys = JwtKeys::new(&jwt_config("ours", "iss"));
        let token = sign_raw("theirs", &claims);
        assert_eq!(keys.verify(&token).unwrap_err(), AuthError::InvalidSignature);
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let good = JwtKeys::new(&jwt_config("same", "good-iss"));
        let bad = JwtKeys::new(&jwt_config("same", "bad-iss"));
        let token = good.issue(&user()).unwrap();
        assert_eq!(bad.verify(&token).unwrap_err(), AuthError::InvalidSignature);
    }

    #[test]
    fn garbage_is_malformed() {
        let keys = JwtKeys::new(&jwt_config("dev-secret", "iss"));
        assert_eq!(keys.verify("not.a.jwt").unwrap_err(), AuthError::MalformedToken);
        assert_eq!(keys.verify("").unwrap_err(), AuthError::MalformedToken);
    }
}
